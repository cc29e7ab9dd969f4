//! Memory-mapped NumPy `.npy` arrays.
//!
//! The trainer exports its matrices with `numpy.save`, so the artifacts are
//! `.npy` files: a magic string, a version, a Python-dict header and the raw
//! little-endian values. `NpyArray` maps the file read-only and decodes values
//! straight out of the page cache; nothing is copied into the heap except the
//! K values of a row a caller asks for.
//!
//! Only C-order `<f8` and `<f4` arrays are accepted. Anything else is a
//! malformed artifact.

use crate::error::{FactorStoreError, Result, io_error};
use memmap2::Mmap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const MAGIC: &[u8] = b"\x93NUMPY";

/// Header plus preamble length is padded to a multiple of this
const HEADER_ALIGN: usize = 64;

/// Element type of an array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dtype {
    F4,
    F8,
}

impl Dtype {
    fn from_descr(descr: &str) -> Option<Self> {
        match descr {
            "<f8" => Some(Dtype::F8),
            "<f4" => Some(Dtype::F4),
            _ => None,
        }
    }

    pub fn size(&self) -> usize {
        match self {
            Dtype::F4 => 4,
            Dtype::F8 => 8,
        }
    }
}

/// A read-only `.npy` array backed by a memory map
#[derive(Debug)]
pub struct NpyArray {
    mmap: Mmap,
    data_offset: usize,
    dtype: Dtype,
    shape: Vec<usize>,
    len: usize,
    path: PathBuf,
}

impl NpyArray {
    /// Map an `.npy` file and validate its header against its length
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(io_error(path))?;
        // Safety: the file is opened read-only and artifacts are never
        // rewritten in place (materialization renames a finished file over
        // the target), so the mapped bytes do not change underneath us.
        let mmap = unsafe { Mmap::map(&file) }.map_err(io_error(path))?;

        let header = parse_header(&mmap).map_err(|reason| FactorStoreError::MalformedArray {
            path: path.to_path_buf(),
            reason,
        })?;

        let expected = header.byte_len;
        let available = mmap.len().saturating_sub(header.data_offset);
        if available < expected {
            return Err(FactorStoreError::MalformedArray {
                path: path.to_path_buf(),
                reason: format!(
                    "truncated: shape {:?} needs {} bytes, file has {}",
                    header.shape, expected, available
                ),
            });
        }

        Ok(Self {
            mmap,
            data_offset: header.data_offset,
            dtype: header.dtype,
            shape: header.shape,
            len: header.len,
            path: path.to_path_buf(),
        })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn dtype(&self) -> Dtype {
        self.dtype
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total number of elements
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at a flat (row-major) index
    pub fn get(&self, index: usize) -> Option<f64> {
        if index < self.len() {
            Some(self.value(index))
        } else {
            None
        }
    }

    /// Element at a flat index. Panics when out of range.
    #[inline]
    pub(crate) fn value(&self, index: usize) -> f64 {
        let start = self.data_offset + index * self.dtype.size();
        match self.dtype {
            Dtype::F8 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&self.mmap[start..start + 8]);
                f64::from_le_bytes(buf)
            }
            Dtype::F4 => {
                let mut buf = [0u8; 4];
                buf.copy_from_slice(&self.mmap[start..start + 4]);
                f64::from(f32::from_le_bytes(buf))
            }
        }
    }

    /// Number of columns of a 2-D array (1 for vectors)
    fn row_width(&self) -> usize {
        self.shape.get(1).copied().unwrap_or(1)
    }

    /// Copy row `row` of a 2-D array into `out` (`out.len()` values)
    #[inline]
    pub fn row_into(&self, row: usize, out: &mut [f64]) {
        let base = row * self.row_width();
        for (k, slot) in out.iter_mut().enumerate() {
            *slot = self.value(base + k);
        }
    }

    /// Dot product of row `row` with `v`, summed left to right
    #[inline]
    pub fn dot_row(&self, row: usize, v: &[f64]) -> f64 {
        let base = row * self.row_width();
        let mut acc = 0.0;
        for (k, x) in v.iter().enumerate() {
            acc += self.value(base + k) * x;
        }
        acc
    }
}

struct Header {
    dtype: Dtype,
    shape: Vec<usize>,
    /// Element count
    len: usize,
    byte_len: usize,
    data_offset: usize,
}

fn parse_header(bytes: &[u8]) -> std::result::Result<Header, String> {
    if bytes.len() < 10 || &bytes[..MAGIC.len()] != MAGIC {
        return Err("missing NUMPY magic".to_string());
    }
    let (header_len, start) = match bytes[6] {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 => {
            if bytes.len() < 12 {
                return Err("truncated preamble".to_string());
            }
            let len = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
            (len as usize, 12)
        }
        v => return Err(format!("unsupported format version {}", v)),
    };
    let end = start + header_len;
    if bytes.len() < end {
        return Err("truncated header".to_string());
    }
    let header = std::str::from_utf8(&bytes[start..end])
        .map_err(|e| format!("header is not text: {}", e))?;

    let descr = dict_value(header, "descr").ok_or("missing 'descr'")?;
    let descr = unquote(descr).ok_or("unreadable 'descr'")?;
    let dtype = Dtype::from_descr(descr).ok_or_else(|| format!("unsupported dtype '{}'", descr))?;

    let fortran = dict_value(header, "fortran_order").ok_or("missing 'fortran_order'")?;
    if fortran.starts_with("True") {
        return Err("Fortran-ordered arrays are not supported".to_string());
    }

    let shape = dict_value(header, "shape").ok_or("missing 'shape'")?;
    let shape = parse_shape(shape)?;

    let len = shape
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| format!("shape {:?} overflows the address space", shape))?;
    let byte_len = len
        .checked_mul(dtype.size())
        .ok_or_else(|| format!("shape {:?} overflows the address space", shape))?;

    Ok(Header {
        dtype,
        shape,
        len,
        byte_len,
        data_offset: end,
    })
}

/// Text following `'key':` in the header dict
fn dict_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let quoted = format!("'{}'", key);
    let at = header.find(&quoted)? + quoted.len();
    let rest = header[at..].trim_start();
    Some(rest.strip_prefix(':')?.trim_start())
}

fn unquote(value: &str) -> Option<&str> {
    let quote = value.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    let rest = &value[1..];
    let close = rest.find(quote)?;
    Some(&rest[..close])
}

fn parse_shape(value: &str) -> std::result::Result<Vec<usize>, String> {
    let inner = value
        .strip_prefix('(')
        .and_then(|v| v.find(')').map(|close| &v[..close]))
        .ok_or("unreadable 'shape'")?;
    inner
        .split(',')
        .map(|d| d.trim())
        .filter(|d| !d.is_empty())
        .map(|d| d.parse::<usize>().map_err(|e| format!("bad dimension '{}': {}", d, e)))
        .collect()
}

/// Python tuple literal for a shape: `()`, `(3,)`, `(3, 2)`
fn shape_literal(shape: &[usize]) -> String {
    match shape {
        [] => "()".to_string(),
        [n] => format!("({},)", n),
        dims => format!(
            "({})",
            dims.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(", ")
        ),
    }
}

/// Write a C-order `<f8` array in `.npy` format (version 1.0)
pub fn write_f64(path: &Path, shape: &[usize], data: &[f64]) -> Result<()> {
    let expected: usize = shape.iter().product();
    if expected != data.len() {
        return Err(FactorStoreError::DimensionMismatch(format!(
            "{}: shape {:?} holds {} values, got {}",
            path.display(),
            shape,
            expected,
            data.len()
        )));
    }

    let mut header = format!(
        "{{'descr': '<f8', 'fortran_order': False, 'shape': {}, }}",
        shape_literal(shape)
    );
    // magic(6) + version(2) + length(2) + header + '\n'
    let unpadded = 10 + header.len() + 1;
    let padding = (HEADER_ALIGN - unpadded % HEADER_ALIGN) % HEADER_ALIGN;
    header.push_str(&" ".repeat(padding));
    header.push('\n');

    let file = File::create(path).map_err(io_error(path))?;
    let mut writer = BufWriter::new(file);
    let write_all = |writer: &mut BufWriter<File>| -> std::io::Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_all(&[1, 0])?;
        writer.write_all(&(header.len() as u16).to_le_bytes())?;
        writer.write_all(header.as_bytes())?;
        for v in data {
            writer.write_all(&v.to_le_bytes())?;
        }
        writer.flush()
    };
    write_all(&mut writer).map_err(io_error(path))
}
