//! # Models Crate
//!
//! Trained models for the pen intelligence engine: the collaborative
//! filtering recommender and the conditional design suggestion generator,
//! plus fingerprint-checked artifact persistence.
//!
//! ## Main Components
//!
//! - **cf**: Biased matrix factorization (`CfModel`) trained by SGD
//! - **designer**: Softmax category heads behind `DesignSuggester`
//! - **persistence**: `ModelStore` with atomic JSON artifacts
//! - **error**: `ModelError` covering training, staleness, and persistence
//!
//! ## Example Usage
//!
//! ```ignore
//! use models::{CfConfig, CfModel, DesignSuggester, DesignerConfig};
//!
//! let cf = CfModel::train(&catalog, &CfConfig::default())?;
//! let score = cf.predict(user_id, pen_id);
//!
//! let suggester = DesignSuggester::prepare(&catalog, &DesignerConfig::default())?;
//! let design = suggester.suggest(user_id, &catalog)?;
//! ```
//!
//! ## Design Notes
//!
//! - Models are deterministic given (catalog, config): seeded init and
//!   seeded shuffles, nothing draws from ambient entropy
//! - A model is only ever paired with the catalog it was trained on; the
//!   fingerprint check turns silent misalignment into a `Stale` error

pub mod cf;
pub mod designer;
pub mod error;
pub mod persistence;

pub use cf::{CfConfig, CfModel};
pub use designer::{DesignSuggester, DesignSuggestion, DesignerConfig};
pub use error::{ModelError, Result};
pub use persistence::{Artifact, ModelStore};
