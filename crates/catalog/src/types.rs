//! Core domain types for the pen catalog.
//!
//! Every component table is a bag of named attributes: categorical fields
//! are plain strings (the feature encoder freezes them into a vocabulary at
//! fit time; unseen values route to an explicit "unknown" bucket), numeric
//! fields are `f32`. Ids are stable integers, unique within each table.

use serde::{Deserialize, Serialize};

// =============================================================================
// Type Aliases
// =============================================================================
// These make the domain clearer and prevent mixing up user ids with pen ids

/// Unique identifier for a user
pub type UserId = u32;

/// Unique identifier for a pen
pub type PenId = u32;

/// Unique identifier for a component within its own table
pub type ComponentId = u32;

// =============================================================================
// Component Tables
// =============================================================================

/// Barrel/cap stock material (resin, ebonite, brass, ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    pub id: ComponentId,
    pub name: String,
    pub kind: String,
    pub finish: String,
    pub density: f32,
    pub cost_per_gram: f32,
}

/// Ink configuration offered with a pen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InkConfig {
    pub id: ComponentId,
    pub color_family: String,
    pub sheen: String,
    pub viscosity: f32,
    pub cost: f32,
}

/// Barrel geometry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarrelConfig {
    pub id: ComponentId,
    pub shape: String,
    pub diameter_mm: f32,
    pub length_mm: f32,
    pub cost: f32,
}

/// Cap configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapConfig {
    pub id: ComponentId,
    pub closure: String,
    pub band_style: String,
    pub weight_g: f32,
    pub cost: f32,
}

/// Nib configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NibConfig {
    pub id: ComponentId,
    pub size: String,
    pub grind: String,
    pub flexibility: String,
    pub cost: f32,
}

/// Surface coating applied over the material
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coating {
    pub id: ComponentId,
    pub kind: String,
    pub gloss: String,
    pub durability: f32,
    pub cost: f32,
}

/// Decorative engraving pattern
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Engraving {
    pub id: ComponentId,
    pub style: String,
    pub depth_mm: f32,
    pub cost: f32,
}

/// Overall silhouette template a custom design starts from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesignTemplate {
    pub id: ComponentId,
    pub name: String,
    pub silhouette: String,
    pub base_cost: f32,
}

// =============================================================================
// Pen
// =============================================================================

/// A manufactured pen: a composite referencing exactly one id from each of
/// the material/ink/barrel/cap/nib tables plus zero or more engravings.
///
/// Referenced ids must exist in their tables; `CatalogIndex::validate`
/// rejects dangling references before any feature construction happens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pen {
    pub id: PenId,
    pub material_id: ComponentId,
    pub ink_id: ComponentId,
    pub barrel_id: ComponentId,
    pub cap_id: ComponentId,
    pub nib_id: ComponentId,
    pub engraving_ids: Vec<ComponentId>,
    pub price: f32,
    pub weight_g: f32,
}

// =============================================================================
// Interactions
// =============================================================================

/// What kind of implicit signal an interaction carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InteractionKind {
    View,
    Like,
    Purchase,
    Rating,
}

/// A single observed user-pen interaction.
///
/// Multiple interactions per (user, pen) are allowed; consumers aggregate
/// by taking the maximum strength.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Interaction {
    pub user_id: UserId,
    pub pen_id: PenId,
    pub kind: InteractionKind,
    /// Implicit signal strength on a 1.0-5.0 scale
    pub strength: f32,
    /// Unix timestamp when the interaction was observed
    pub timestamp: i64,
}

impl Interaction {
    /// Whether this interaction counts as positive engagement for the
    /// liked-pen set consumed by the design suggester.
    pub fn is_positive(&self) -> bool {
        matches!(self.kind, InteractionKind::Like | InteractionKind::Purchase)
            || self.strength >= 4.0
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Precomputed statistics for a pen, derived from its interactions.
///
/// Computed once when the catalog is built; used for the population-level
/// fallback ranking when a request carries no visited pens.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PenStats {
    pub interaction_count: u32,
    pub mean_strength: f32,
    /// Popularity score derived from count and mean strength
    pub popularity_score: f32,
}
