//! Fold-in: estimate a user's latent vector from their current ratings.
//!
//! The trained model only knows users that existed at training time, and
//! only their ratings as of then. Fold-in fits a fresh `(factors, bias)` pair
//! against the fixed item-side arrays with a few epochs of plain SGD. It is
//! recomputed on every request and never written back.
//!
//! ## Determinism
//! The initial vector is drawn from `N(0, init_std)` with a ChaCha RNG seeded
//! from `FoldInConfig::seed`, the same seed for every user. Ratings are
//! visited in the order the rating store returns them. Same ratings, same
//! order, same config: same profile, bit for bit.

use crate::types::UserProfile;
use anyhow::{Result, anyhow, bail};
use data_loader::Rating;
use factor_store::FactorStore;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Fold-in hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FoldInConfig {
    pub n_epochs: usize,
    pub learning_rate: f64,
    pub regularization: f64,
    pub seed: u64,
    /// Standard deviation of the initial factors
    pub init_std: f64,
}

impl Default for FoldInConfig {
    fn default() -> Self {
        Self {
            n_epochs: 20,
            learning_rate: 0.005,
            regularization: 0.02,
            seed: 42,
            init_std: 0.1,
        }
    }
}

impl FoldInConfig {
    pub fn with_epochs(mut self, n_epochs: usize) -> Self {
        self.n_epochs = n_epochs;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_regularization(mut self, regularization: f64) -> Self {
        self.regularization = regularization;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_init_std(mut self, init_std: f64) -> Self {
        self.init_std = init_std;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.learning_rate.is_finite() || self.learning_rate < 0.0 {
            bail!("learning rate must be finite and non-negative, got {}", self.learning_rate);
        }
        if !self.regularization.is_finite() || self.regularization < 0.0 {
            bail!("regularization must be finite and non-negative, got {}", self.regularization);
        }
        if !self.init_std.is_finite() || self.init_std < 0.0 {
            bail!("init_std must be finite and non-negative, got {}", self.init_std);
        }
        Ok(())
    }
}

/// `k` draws from `N(0, std)` using a ChaCha8 stream seeded with `seed`
pub fn initial_factors(k: usize, std: f64, seed: u64) -> Result<Vec<f64>> {
    let normal = Normal::new(0.0, std).map_err(|e| anyhow!("invalid init_std {}: {}", std, e))?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    Ok((0..k).map(|_| normal.sample(&mut rng)).collect())
}

#[derive(Debug, Clone, Default)]
pub struct FoldInSolver {
    config: FoldInConfig,
}

impl FoldInSolver {
    pub fn new(config: FoldInConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &FoldInConfig {
        &self.config
    }

    /// Fit a profile for `ratings` against the store's item arrays.
    ///
    /// An empty rating set returns the zero profile. Ratings whose item the
    /// store cannot resolve are skipped.
    #[instrument(skip_all, fields(ratings = ratings.len()))]
    pub fn fold_in(&self, store: &FactorStore, ratings: &[Rating]) -> Result<UserProfile> {
        let k = store.n_factors();
        if ratings.is_empty() {
            return Ok(UserProfile::cold_start(k));
        }

        let FoldInConfig {
            n_epochs,
            learning_rate: lr,
            regularization: reg,
            seed,
            init_std,
        } = self.config;

        // Resolve once; the epochs then only touch inner indices
        let resolved: Vec<(usize, f64)> = ratings
            .iter()
            .filter_map(|r| store.resolve_inner_id(&r.movie_id).map(|i| (i, r.rating)))
            .collect();
        if resolved.len() < ratings.len() {
            debug!(
                skipped = ratings.len() - resolved.len(),
                "Ratings for items unknown to the model"
            );
        }

        let mut factors = initial_factors(k, init_std, seed)?;
        let mut bias = 0.0;
        let mut item = vec![0.0; k];
        let global_mean = store.global_mean();

        for _ in 0..n_epochs {
            for &(i, rating) in &resolved {
                store.item_factors_into(i, &mut item);
                let dot: f64 = item.iter().zip(&factors).map(|(q, p)| q * p).sum();
                let prediction = global_mean + bias + store.item_bias(i) + dot;
                let err = rating - prediction;

                bias += lr * (err - reg * bias);
                for (p, q) in factors.iter_mut().zip(&item) {
                    *p += lr * (err * q - reg * *p);
                }
            }
        }

        Ok(UserProfile { factors, bias })
    }
}
