//! The trained model object, used as-is when the optimized artifacts are
//! missing.
//!
//! The trainer saves the full biased-SVD model as JSON (`svd_model.json`):
//!
//! ```json
//! {
//!   "global_mean": 3.52,
//!   "n_factors": 2,
//!   "users": [{"id": 1, "bias": 0.1, "factors": [0.3, -0.2]}],
//!   "items": [{"id": 318, "bias": 0.4, "factors": [0.1, 0.0]}]
//! }
//! ```
//!
//! Entry order is inner-index order. The model answers one `(user, item)`
//! estimate at a time and can export itself as the optimized artifact set.

use crate::error::{FactorStoreError, Result, io_error};
use crate::id_map::{IdMap, InnerIdTable};
use crate::store::{ArtifactSet, write_artifacts};
use data_loader::RawId;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{info, instrument};

/// One trained user or item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedEntry {
    pub id: RawId,
    pub bias: f64,
    pub factors: Vec<f64>,
}

#[derive(Serialize, Deserialize)]
struct SvdModelFile {
    global_mean: f64,
    n_factors: usize,
    users: Vec<TrainedEntry>,
    items: Vec<TrainedEntry>,
}

#[derive(Debug, Clone)]
pub struct SvdModel {
    global_mean: f64,
    n_factors: usize,
    users: Vec<TrainedEntry>,
    items: Vec<TrainedEntry>,
    id_map: IdMap,
}

impl SvdModel {
    /// Build a model, checking every factor vector has length `n_factors`
    pub fn new(
        global_mean: f64,
        n_factors: usize,
        users: Vec<TrainedEntry>,
        items: Vec<TrainedEntry>,
    ) -> Result<Self> {
        for (namespace, entries) in [("user", &users), ("item", &items)] {
            if let Some(bad) = entries.iter().find(|e| e.factors.len() != n_factors) {
                return Err(FactorStoreError::DimensionMismatch(format!(
                    "{} {} has {} factors, model has {}",
                    namespace,
                    bad.id,
                    bad.factors.len(),
                    n_factors
                )));
            }
        }

        let id_map = IdMap::new(
            InnerIdTable::from_ordered("users", users.iter().map(|e| e.id.clone()).collect())?,
            InnerIdTable::from_ordered("items", items.iter().map(|e| e.id.clone()).collect())?,
        );

        Ok(Self {
            global_mean,
            n_factors,
            users,
            items,
            id_map,
        })
    }

    #[instrument]
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(io_error(path))?;
        let parsed: SvdModelFile =
            serde_json::from_reader(BufReader::new(file)).map_err(|source| {
                FactorStoreError::Json {
                    path: path.to_path_buf(),
                    source,
                }
            })?;
        let model = Self::new(parsed.global_mean, parsed.n_factors, parsed.users, parsed.items)?;
        info!(
            users = model.users.len(),
            items = model.items.len(),
            factors = model.n_factors,
            "Loaded legacy SVD model"
        );
        Ok(model)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = SvdModelFile {
            global_mean: self.global_mean,
            n_factors: self.n_factors,
            users: self.users.clone(),
            items: self.items.clone(),
        };
        let out = File::create(path).map_err(io_error(path))?;
        let mut writer = BufWriter::new(out);
        serde_json::to_writer(&mut writer, &file).map_err(|source| FactorStoreError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        writer.flush().map_err(io_error(path))
    }

    pub fn global_mean(&self) -> f64 {
        self.global_mean
    }

    pub fn n_factors(&self) -> usize {
        self.n_factors
    }

    /// Unclipped rating estimate for `(user, item)`.
    ///
    /// Unknown users or items fall back to the terms that are known: the
    /// global mean plus whichever biases exist. The dot product only counts
    /// when both sides are known.
    pub fn estimate(&self, user: &RawId, item: &RawId) -> f64 {
        let user = self.id_map.users().resolve(user).map(|u| &self.users[u]);
        let item = self.id_map.items().resolve(item).map(|i| &self.items[i]);

        match (user, item) {
            (Some(u), Some(i)) => {
                let dot: f64 = i.factors.iter().zip(&u.factors).map(|(q, p)| q * p).sum();
                self.global_mean + u.bias + i.bias + dot
            }
            (Some(u), None) => self.global_mean + u.bias,
            (None, Some(i)) => self.global_mean + i.bias,
            (None, None) => self.global_mean,
        }
    }

    /// Write the optimized artifact set for this model into `dir`
    #[instrument(skip(self))]
    pub fn export_artifacts(&self, dir: &Path) -> Result<()> {
        let flatten = |entries: &[TrainedEntry]| -> Vec<f64> {
            entries.iter().flat_map(|e| e.factors.iter().copied()).collect()
        };
        let set = ArtifactSet {
            n_factors: self.n_factors,
            user_factors: flatten(&self.users),
            user_bias: self.users.iter().map(|e| e.bias).collect(),
            item_factors: flatten(&self.items),
            item_bias: self.items.iter().map(|e| e.bias).collect(),
            global_mean: self.global_mean,
            id_map: self.id_map.clone(),
        };
        write_artifacts(dir, &set)
    }
}
