//! Error types for the catalog crate.
//!
//! Data-integrity problems are never corrected silently: a pen that
//! references a component id missing from its table is a hard failure at
//! feature-construction time, with enough context to find the bad row.

use thiserror::Error;

/// Errors raised while building or validating catalog tables
#[derive(Error, Debug)]
pub enum CatalogError {
    /// A pen references a component id that does not exist in its table
    #[error("Dangling reference: pen {pen_id} references {table} id {component_id} which does not exist")]
    DanglingReference {
        table: &'static str,
        component_id: u32,
        pen_id: u32,
    },

    /// A table required for encoding has no rows
    #[error("Table {table} is empty")]
    EmptyTable { table: &'static str },

    /// A record field had an invalid value
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    /// An interaction references a pen that does not exist
    #[error("Interaction for user {user_id} references unknown pen {pen_id}")]
    UnknownInteractionPen { user_id: u32, pen_id: u32 },
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, CatalogError>;
