//! # Catalog Crate
//!
//! This crate holds the component, pen, and interaction tables for the pen
//! intelligence engine, plus a seeded synthetic generator that stands in
//! for the warehouse feed.
//!
//! ## Main Components
//!
//! - **types**: Core domain types (component records, Pen, Interaction)
//! - **index**: CatalogIndex with validation and derived statistics
//! - **synthetic**: Deterministic catalog generation
//! - **error**: Data-integrity error types
//!
//! ## Example Usage
//!
//! ```ignore
//! use catalog::SyntheticCatalog;
//!
//! let index = SyntheticCatalog::new(42).generate()?;
//! let pen = index.pen(1).unwrap();
//! let liked = index.liked_pens(17);
//! println!("Pen {} costs {}, user 17 likes {} pens", pen.id, pen.price, liked.len());
//! ```
//!
//! ## Design Notes
//!
//! - Tables live in `BTreeMap`s so every derived artifact is reproducible
//! - `validate()` fails fast on dangling component references; nothing is
//!   silently dropped
//! - The catalog fingerprint ties persisted model artifacts to the tables
//!   they were trained on

// Public modules
pub mod error;
pub mod index;
pub mod synthetic;
pub mod types;

// Re-export commonly used types for convenience
pub use error::{CatalogError, Result};
pub use index::CatalogIndex;
pub use synthetic::{CatalogShape, SyntheticCatalog};
pub use types::{
    // Type aliases
    ComponentId,
    PenId,
    UserId,
    // Core types
    BarrelConfig,
    CapConfig,
    Coating,
    DesignTemplate,
    Engraving,
    InkConfig,
    Interaction,
    InteractionKind,
    Material,
    NibConfig,
    Pen,
    PenStats,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_catalog() {
        let index = CatalogIndex::new();
        let (pens, users, interactions) = index.counts();
        assert_eq!(pens, 0);
        assert_eq!(users, 0);
        assert_eq!(interactions, 0);
        assert!(index.validate().is_ok());
        assert!(index.pen(1).is_none());
        assert!(index.interactions_for_user(1).is_empty());
    }

    #[test]
    fn test_interaction_positivity() {
        let base = Interaction {
            user_id: 1,
            pen_id: 1,
            kind: InteractionKind::View,
            strength: 2.0,
            timestamp: 0,
        };
        assert!(!base.is_positive());

        let strong_view = Interaction {
            strength: 4.5,
            ..base
        };
        assert!(strong_view.is_positive());

        let purchase = Interaction {
            kind: InteractionKind::Purchase,
            strength: 1.0,
            ..base
        };
        assert!(purchase.is_positive());
    }
}
