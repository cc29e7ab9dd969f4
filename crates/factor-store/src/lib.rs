//! # Factor Store Crate
//!
//! Read-only access to a trained biased-SVD model:
//!
//! - **npy**: memory-mapped `.npy` arrays, plus a writer for exports
//! - **id_map**: raw ↔ inner id tables
//! - **store**: `FactorStore`, the optimized item-side artifacts
//! - **legacy**: `SvdModel`, the whole trained model used as a fallback
//! - **materialize**: rebuilding artifacts shipped in chunks
//!
//! ```ignore
//! use factor_store::{Availability, FactorStore};
//!
//! match FactorStore::load(Path::new("models"))? {
//!     Availability::Ready(store) => println!("K = {}", store.n_factors()),
//!     Availability::Unavailable { missing } => println!("missing {:?}", missing),
//! }
//! ```

pub mod error;
pub mod id_map;
pub mod legacy;
pub mod materialize;
pub mod npy;
pub mod store;

pub use error::{FactorStoreError, Result};
pub use id_map::{IdMap, InnerIdTable, MappingTables};
pub use legacy::{SvdModel, TrainedEntry};
pub use npy::NpyArray;
pub use store::{ArtifactPaths, ArtifactSet, Availability, FactorStore, write_artifacts};
