//! Server crate for the ReelRecs recommendation engine.
//!
//! This crate contains the engine configuration and the
//! `RecommendationEngine` that selects a scoring path at startup and serves
//! requests with it.

pub mod config;
pub mod engine;

pub use config::EngineConfig;
pub use engine::{RecommendationEngine, ScoringPath};
