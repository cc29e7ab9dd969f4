//! The loaded factor model.
//!
//! `FactorStore` owns the memory-mapped item-side arrays and the id tables.
//! It is built once at startup and then only read, so an `Arc<FactorStore>`
//! can be handed to every request without locks.

use crate::error::{FactorStoreError, Result};
use crate::id_map::{self, IdMap, MappingTables};
use crate::npy::{self, NpyArray};
use data_loader::RawId;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, instrument, warn};

pub const ITEM_FACTORS_FILE: &str = "svd_qi.npy";
pub const ITEM_BIAS_FILE: &str = "svd_bi.npy";
pub const USER_FACTORS_FILE: &str = "svd_pu.npy";
pub const USER_BIAS_FILE: &str = "svd_bu.npy";
pub const GLOBAL_MEAN_FILE: &str = "svd_global_mean.npy";
pub const MAPPINGS_FILE: &str = "svd_mappings.json";

/// Locations of the artifacts the store reads
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub item_factors: PathBuf,
    pub item_bias: PathBuf,
    pub global_mean: PathBuf,
    pub mappings: PathBuf,
}

impl ArtifactPaths {
    /// Standard file names inside `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            item_factors: dir.join(ITEM_FACTORS_FILE),
            item_bias: dir.join(ITEM_BIAS_FILE),
            global_mean: dir.join(GLOBAL_MEAN_FILE),
            mappings: dir.join(MAPPINGS_FILE),
        }
    }

    /// Paths that do not exist on disk
    pub fn missing(&self) -> Vec<PathBuf> {
        [
            &self.item_factors,
            &self.item_bias,
            &self.global_mean,
            &self.mappings,
        ]
        .into_iter()
        .filter(|p| !p.exists())
        .cloned()
        .collect()
    }
}

/// Whether the optimized artifacts could be loaded
#[derive(Debug)]
pub enum Availability {
    Ready(FactorStore),
    /// Some artifact is absent; use the legacy model instead
    Unavailable { missing: Vec<String> },
}

#[derive(Debug)]
pub struct FactorStore {
    item_factors: NpyArray,
    item_bias: NpyArray,
    global_mean: f64,
    id_map: IdMap,
    n_items: usize,
    n_factors: usize,
}

impl FactorStore {
    /// Load the artifacts from `dir` using the standard file names
    pub fn load(dir: &Path) -> Result<Availability> {
        Self::load_paths(&ArtifactPaths::in_dir(dir))
    }

    /// Load the artifacts at explicit paths.
    ///
    /// A missing file (or a mapping file without one of its tables) yields
    /// `Availability::Unavailable`. Files that exist but disagree with each
    /// other are an error.
    #[instrument(skip(paths), fields(dir = ?paths.item_factors.parent()))]
    pub fn load_paths(paths: &ArtifactPaths) -> Result<Availability> {
        let start = Instant::now();

        let missing = paths.missing();
        if !missing.is_empty() {
            let missing: Vec<String> = missing.iter().map(|p| p.display().to_string()).collect();
            warn!(?missing, "Optimized artifacts unavailable");
            return Ok(Availability::Unavailable { missing });
        }

        let id_map = match id_map::load_mappings(&paths.mappings)? {
            MappingTables::Complete(map) => map,
            MappingTables::MissingTable(table) => {
                let missing = vec![format!("{} ({} table)", paths.mappings.display(), table)];
                warn!(?missing, "Optimized artifacts unavailable");
                return Ok(Availability::Unavailable { missing });
            }
        };

        let item_factors = NpyArray::open(&paths.item_factors)?;
        let item_bias = NpyArray::open(&paths.item_bias)?;
        let global_mean_array = NpyArray::open(&paths.global_mean)?;

        let store = Self::assemble(item_factors, item_bias, &global_mean_array, id_map)?;

        info!(
            items = store.n_items,
            factors = store.n_factors,
            users = store.id_map.users().len(),
            global_mean = store.global_mean,
            "Loaded factor store in {:?}",
            start.elapsed()
        );

        Ok(Availability::Ready(store))
    }

    fn assemble(
        item_factors: NpyArray,
        item_bias: NpyArray,
        global_mean: &NpyArray,
        id_map: IdMap,
    ) -> Result<Self> {
        let (n_items, n_factors) = match item_factors.shape() {
            &[rows, cols] => (rows, cols),
            other => {
                return Err(FactorStoreError::DimensionMismatch(format!(
                    "item factors must be 2-D, got shape {:?}",
                    other
                )));
            }
        };

        if item_bias.shape() != [n_items] {
            return Err(FactorStoreError::DimensionMismatch(format!(
                "item bias has shape {:?}, expected [{}]",
                item_bias.shape(),
                n_items
            )));
        }

        if global_mean.len() != 1 {
            return Err(FactorStoreError::DimensionMismatch(format!(
                "global mean must hold one value, got shape {:?}",
                global_mean.shape()
            )));
        }
        let mean = global_mean.value(0);
        if !mean.is_finite() {
            return Err(FactorStoreError::DimensionMismatch(format!(
                "global mean is not finite: {}",
                mean
            )));
        }

        if id_map.items().len() != n_items {
            return Err(FactorStoreError::DimensionMismatch(format!(
                "item mapping has {} entries but item factors have {} rows",
                id_map.items().len(),
                n_items
            )));
        }

        Ok(Self {
            item_factors,
            item_bias,
            global_mean: mean,
            id_map,
            n_items,
            n_factors,
        })
    }

    pub fn n_items(&self) -> usize {
        self.n_items
    }

    /// K, the latent dimension
    pub fn n_factors(&self) -> usize {
        self.n_factors
    }

    pub fn global_mean(&self) -> f64 {
        self.global_mean
    }

    /// Bias of inner item `i`. Panics when `i >= n_items()`.
    #[inline]
    pub fn item_bias(&self, i: usize) -> f64 {
        self.item_bias.value(i)
    }

    /// Copy the factor row of inner item `i` into `out`
    #[inline]
    pub fn item_factors_into(&self, i: usize, out: &mut [f64]) {
        debug_assert_eq!(out.len(), self.n_factors);
        self.item_factors.row_into(i, out);
    }

    /// `dot(item_factors[i], user)`
    #[inline]
    pub fn dot_item(&self, i: usize, user: &[f64]) -> f64 {
        debug_assert_eq!(user.len(), self.n_factors);
        self.item_factors.dot_row(i, user)
    }

    pub fn resolve_inner_id(&self, raw: &RawId) -> Option<usize> {
        self.id_map.items().resolve(raw)
    }

    pub fn id_map(&self) -> &IdMap {
        &self.id_map
    }
}

/// Everything needed to write a complete artifact directory
#[derive(Debug, Clone)]
pub struct ArtifactSet {
    pub n_factors: usize,
    /// Row-major `[n_users × n_factors]`
    pub user_factors: Vec<f64>,
    pub user_bias: Vec<f64>,
    /// Row-major `[n_items × n_factors]`
    pub item_factors: Vec<f64>,
    pub item_bias: Vec<f64>,
    pub global_mean: f64,
    pub id_map: IdMap,
}

/// Write all six artifacts into `dir`, creating it if needed
pub fn write_artifacts(dir: &Path, set: &ArtifactSet) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(crate::error::io_error(dir))?;

    let n_users = set.id_map.users().len();
    let n_items = set.id_map.items().len();

    npy::write_f64(
        &dir.join(USER_FACTORS_FILE),
        &[n_users, set.n_factors],
        &set.user_factors,
    )?;
    npy::write_f64(&dir.join(USER_BIAS_FILE), &[n_users], &set.user_bias)?;
    npy::write_f64(
        &dir.join(ITEM_FACTORS_FILE),
        &[n_items, set.n_factors],
        &set.item_factors,
    )?;
    npy::write_f64(&dir.join(ITEM_BIAS_FILE), &[n_items], &set.item_bias)?;
    npy::write_f64(&dir.join(GLOBAL_MEAN_FILE), &[1], &[set.global_mean])?;
    id_map::write_mappings(&dir.join(MAPPINGS_FILE), &set.id_map)?;

    info!(
        dir = %dir.display(),
        users = n_users,
        items = n_items,
        factors = set.n_factors,
        "Wrote factor artifacts"
    );
    Ok(())
}
