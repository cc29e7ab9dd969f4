//! Rebuild artifacts that were shipped as fixed-size chunks.
//!
//! A large file `svd_qi.npy` may arrive as `svd_qi.npy.part000`,
//! `svd_qi.npy.part001`, ... The parts are concatenated in lexicographic
//! order into a temporary file next to the target, which is then renamed into
//! place. A reader never sees a half-written target.

use crate::error::{Result, io_error};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const FIRST_PART_SUFFIX: &str = ".part000";

/// Chunk files belonging to `target`, sorted by name
fn parts_of(target: &Path) -> Result<Vec<PathBuf>> {
    let (Some(dir), Some(name)) = (target.parent(), target.file_name()) else {
        return Ok(Vec::new());
    };
    let dir = if dir.as_os_str().is_empty() { Path::new(".") } else { dir };
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let prefix = format!("{}.part", name.to_string_lossy());

    let mut parts = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_error(dir))? {
        let entry = entry.map_err(io_error(dir))?;
        if entry.file_name().to_string_lossy().starts_with(&prefix) {
            parts.push(entry.path());
        }
    }
    parts.sort();
    Ok(parts)
}

fn concatenate(parts: &[PathBuf], out: &Path) -> io::Result<u64> {
    let mut writer = BufWriter::new(File::create(out)?);
    let mut total = 0;
    for part in parts {
        let mut reader = File::open(part)?;
        total += io::copy(&mut reader, &mut writer)?;
    }
    writer.flush()?;
    Ok(total)
}

/// Reconstruct `target` from its parts.
///
/// Returns `Ok(false)` without touching anything when the target already
/// exists or when no parts are present.
pub fn join_file(target: &Path) -> Result<bool> {
    if target.exists() {
        debug!(target = %target.display(), "Target exists, skipping join");
        return Ok(false);
    }
    let parts = parts_of(target)?;
    if parts.is_empty() {
        return Ok(false);
    }

    let mut tmp_name = target.as_os_str().to_owned();
    tmp_name.push(".joining");
    let tmp = PathBuf::from(tmp_name);

    match concatenate(&parts, &tmp) {
        Ok(bytes) => {
            fs::rename(&tmp, target).map_err(io_error(target))?;
            info!(
                target = %target.display(),
                parts = parts.len(),
                bytes,
                "Reconstructed artifact from chunks"
            );
            Ok(true)
        }
        Err(e) => {
            if let Err(cleanup) = fs::remove_file(&tmp) {
                warn!(path = %tmp.display(), error = %cleanup, "Could not remove partial file");
            }
            Err(io_error(target)(e))
        }
    }
}

/// Reconstruct every chunked file below `dir`, recursively.
///
/// Returns the number of files rebuilt.
pub fn join_all_in_directory(dir: &Path) -> Result<usize> {
    let mut rebuilt = 0;
    if !dir.is_dir() {
        return Ok(rebuilt);
    }

    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let mut entries: Vec<PathBuf> = fs::read_dir(&current)
            .map_err(io_error(&current))?
            .map(|e| e.map(|e| e.path()))
            .collect::<io::Result<_>>()
            .map_err(io_error(&current))?;
        entries.sort();

        for path in entries {
            if path.is_dir() {
                pending.push(path);
                continue;
            }
            let name = path.to_string_lossy();
            if let Some(target) = name.strip_suffix(FIRST_PART_SUFFIX) {
                if join_file(Path::new(target))? {
                    rebuilt += 1;
                }
            }
        }
    }

    Ok(rebuilt)
}
