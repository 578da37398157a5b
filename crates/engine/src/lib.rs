//! # Engine Crate
//!
//! The serving core of the pen intelligence engine: an immutable snapshot
//! of catalog plus trained models, the hybrid scorer that blends content
//! and collaborative signal, and the `PenIntelligence` facade a transport
//! layer would call.
//!
//! ## Main Components
//!
//! - **snapshot**: `EngineSnapshot`, one consistent generation of state
//! - **scorer**: Hybrid blending with per-request min-max normalization
//! - **service**: `PenIntelligence` (recommend / suggest_design / retrain)
//!
//! ## Example Usage
//!
//! ```ignore
//! use engine::{EngineConfig, PenIntelligence, SyntheticProvider};
//! use std::sync::Arc;
//!
//! let service = PenIntelligence::new(
//!     Arc::new(SyntheticProvider::new(42)),
//!     EngineConfig::default(),
//! )?;
//! let ranked = service.recommend(17, &[1, 7, 23], 3)?;
//! let design = service.suggest_design(17)?;
//! ```
//!
//! ## Design Notes
//!
//! - Readers never block on training; they hold the old Arc until the new
//!   snapshot is swapped in under the write lock
//! - Retrain failure is an outcome, not a panic: the previous snapshot
//!   keeps serving

pub mod scorer;
pub mod service;
pub mod snapshot;

pub use scorer::{HybridConfig, Recommendation};
pub use service::{
    CatalogProvider, EngineConfig, PenIntelligence, RetrainOutcome, RetrainStatus,
    SyntheticProvider,
};
pub use snapshot::EngineSnapshot;
