//! # Features Crate
//!
//! Turns catalog records into the numeric representations the models
//! consume: fixed-width component vectors, composite pen vectors, and a
//! precomputed pairwise similarity index.
//!
//! ## Main Components
//!
//! - **encoder**: Vocabulary/scaler fitting and the composite `PenEncoder`
//! - **similarity**: Pairwise cosine `SimilarityMatrix` with neighbor lookup
//!
//! ## Example Usage
//!
//! ```ignore
//! use features::{PenEncoder, SimilarityMatrix};
//!
//! let encoder = PenEncoder::fit(&catalog)?;
//! let features = encoder.encode_all(&catalog)?;
//! let sim = SimilarityMatrix::compute(&features);
//! let neighbors = sim.nearest_neighbors(&[1, 7], &Default::default(), 3);
//! ```
//!
//! ## Design Notes
//!
//! - Encoders are fitted once per snapshot and never refit per request, so
//!   the same input always encodes to the same vector
//! - Unseen category values map to a reserved "unknown" slot instead of
//!   failing; missing component references DO fail, loudly

pub mod encoder;
pub mod similarity;

pub use encoder::{ComponentEncoder, Encodable, NumericScaler, PenEncoder, PenFeatureMatrix, Vocabulary};
pub use similarity::SimilarityMatrix;
