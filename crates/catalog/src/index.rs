//! CatalogIndex - the in-memory database of component and pen tables.
//!
//! The index owns every table plus interaction indices keyed by user and by
//! pen. Tables live in `BTreeMap`s so iteration order is deterministic,
//! which keeps every derived artifact (feature matrices, similarity rows,
//! id-to-row maps) reproducible across runs.

use crate::error::{CatalogError, Result};
use crate::types::*;
use rayon::prelude::*;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};

/// Main data structure holding all catalog tables and indices.
///
/// Provides O(log n) id lookups on the component tables and O(1) access to
/// the interaction lists for a user or a pen.
#[derive(Debug, Default)]
pub struct CatalogIndex {
    // Primary component tables, keyed by id
    pub(crate) materials: BTreeMap<ComponentId, Material>,
    pub(crate) inks: BTreeMap<ComponentId, InkConfig>,
    pub(crate) barrels: BTreeMap<ComponentId, BarrelConfig>,
    pub(crate) caps: BTreeMap<ComponentId, CapConfig>,
    pub(crate) nibs: BTreeMap<ComponentId, NibConfig>,
    pub(crate) coatings: BTreeMap<ComponentId, Coating>,
    pub(crate) engravings: BTreeMap<ComponentId, Engraving>,
    pub(crate) templates: BTreeMap<ComponentId, DesignTemplate>,
    pub(crate) pens: BTreeMap<PenId, Pen>,

    // Interaction indices for fast lookups
    /// All interactions made by each user
    pub(crate) user_interactions: HashMap<UserId, Vec<Interaction>>,
    /// All interactions received by each pen
    pub(crate) pen_interactions: HashMap<PenId, Vec<Interaction>>,

    // Precomputed statistics
    pub(crate) pen_stats: HashMap<PenId, PenStats>,
}

impl CatalogIndex {
    /// Creates a new, empty CatalogIndex
    pub fn new() -> Self {
        Self::default()
    }

    // Getters - return references, the index keeps ownership

    pub fn material(&self, id: ComponentId) -> Option<&Material> {
        self.materials.get(&id)
    }

    pub fn ink(&self, id: ComponentId) -> Option<&InkConfig> {
        self.inks.get(&id)
    }

    pub fn barrel(&self, id: ComponentId) -> Option<&BarrelConfig> {
        self.barrels.get(&id)
    }

    pub fn cap(&self, id: ComponentId) -> Option<&CapConfig> {
        self.caps.get(&id)
    }

    pub fn nib(&self, id: ComponentId) -> Option<&NibConfig> {
        self.nibs.get(&id)
    }

    pub fn coating(&self, id: ComponentId) -> Option<&Coating> {
        self.coatings.get(&id)
    }

    pub fn engraving(&self, id: ComponentId) -> Option<&Engraving> {
        self.engravings.get(&id)
    }

    pub fn template(&self, id: ComponentId) -> Option<&DesignTemplate> {
        self.templates.get(&id)
    }

    pub fn pen(&self, id: PenId) -> Option<&Pen> {
        self.pens.get(&id)
    }

    /// Pens in ascending id order
    pub fn pens(&self) -> impl Iterator<Item = &Pen> {
        self.pens.values()
    }

    /// All pen ids, ascending
    pub fn pen_ids(&self) -> Vec<PenId> {
        self.pens.keys().copied().collect()
    }

    pub fn materials(&self) -> impl Iterator<Item = &Material> {
        self.materials.values()
    }

    pub fn inks(&self) -> impl Iterator<Item = &InkConfig> {
        self.inks.values()
    }

    pub fn barrels(&self) -> impl Iterator<Item = &BarrelConfig> {
        self.barrels.values()
    }

    pub fn caps(&self) -> impl Iterator<Item = &CapConfig> {
        self.caps.values()
    }

    pub fn nibs(&self) -> impl Iterator<Item = &NibConfig> {
        self.nibs.values()
    }

    pub fn coatings(&self) -> impl Iterator<Item = &Coating> {
        self.coatings.values()
    }

    pub fn engravings(&self) -> impl Iterator<Item = &Engraving> {
        self.engravings.values()
    }

    pub fn templates(&self) -> impl Iterator<Item = &DesignTemplate> {
        self.templates.values()
    }

    /// Get all interactions made by a user.
    ///
    /// Returns an empty slice if the user has no history.
    pub fn interactions_for_user(&self, user_id: UserId) -> &[Interaction] {
        self.user_interactions
            .get(&user_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Get all interactions received by a pen
    pub fn interactions_for_pen(&self, pen_id: PenId) -> &[Interaction] {
        self.pen_interactions
            .get(&pen_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// All interactions, flattened. Order follows ascending user id, then
    /// insertion order within a user.
    pub fn all_interactions(&self) -> Vec<Interaction> {
        let mut user_ids: Vec<UserId> = self.user_interactions.keys().copied().collect();
        user_ids.sort_unstable();
        user_ids
            .into_iter()
            .flat_map(|uid| self.user_interactions[&uid].iter().copied())
            .collect()
    }

    /// Get precomputed statistics for a pen
    pub fn pen_stats(&self, pen_id: PenId) -> Option<&PenStats> {
        self.pen_stats.get(&pen_id)
    }

    /// Pens the user has positively engaged with, in ascending pen id order
    /// with duplicates removed. Derived, not stored.
    pub fn liked_pens(&self, user_id: UserId) -> Vec<PenId> {
        let mut liked: Vec<PenId> = self
            .interactions_for_user(user_id)
            .iter()
            .filter(|i| i.is_positive())
            .map(|i| i.pen_id)
            .collect();
        liked.sort_unstable();
        liked.dedup();
        liked
    }

    // Mutators - used while assembling a catalog

    pub fn insert_material(&mut self, m: Material) {
        self.materials.insert(m.id, m);
    }

    pub fn insert_ink(&mut self, i: InkConfig) {
        self.inks.insert(i.id, i);
    }

    pub fn insert_barrel(&mut self, b: BarrelConfig) {
        self.barrels.insert(b.id, b);
    }

    pub fn insert_cap(&mut self, c: CapConfig) {
        self.caps.insert(c.id, c);
    }

    pub fn insert_nib(&mut self, n: NibConfig) {
        self.nibs.insert(n.id, n);
    }

    pub fn insert_coating(&mut self, c: Coating) {
        self.coatings.insert(c.id, c);
    }

    pub fn insert_engraving(&mut self, e: Engraving) {
        self.engravings.insert(e.id, e);
    }

    pub fn insert_template(&mut self, t: DesignTemplate) {
        self.templates.insert(t.id, t);
    }

    pub fn insert_pen(&mut self, pen: Pen) {
        self.pens.insert(pen.id, pen);
    }

    /// Insert an interaction and update both indices
    pub fn insert_interaction(&mut self, interaction: Interaction) {
        self.user_interactions
            .entry(interaction.user_id)
            .or_default()
            .push(interaction);
        self.pen_interactions
            .entry(interaction.pen_id)
            .or_default()
            .push(interaction);
    }

    /// Validate referential integrity.
    ///
    /// Every pen must reference existing component ids and every interaction
    /// an existing pen. Fails fast on the first violation; nothing is
    /// dropped or patched up.
    pub fn validate(&self) -> Result<()> {
        for pen in self.pens.values() {
            if !self.materials.contains_key(&pen.material_id) {
                return Err(CatalogError::DanglingReference {
                    table: "materials",
                    component_id: pen.material_id,
                    pen_id: pen.id,
                });
            }
            if !self.inks.contains_key(&pen.ink_id) {
                return Err(CatalogError::DanglingReference {
                    table: "ink_configs",
                    component_id: pen.ink_id,
                    pen_id: pen.id,
                });
            }
            if !self.barrels.contains_key(&pen.barrel_id) {
                return Err(CatalogError::DanglingReference {
                    table: "barrel_configs",
                    component_id: pen.barrel_id,
                    pen_id: pen.id,
                });
            }
            if !self.caps.contains_key(&pen.cap_id) {
                return Err(CatalogError::DanglingReference {
                    table: "cap_configs",
                    component_id: pen.cap_id,
                    pen_id: pen.id,
                });
            }
            if !self.nibs.contains_key(&pen.nib_id) {
                return Err(CatalogError::DanglingReference {
                    table: "nib_configs",
                    component_id: pen.nib_id,
                    pen_id: pen.id,
                });
            }
            for &engraving_id in &pen.engraving_ids {
                if !self.engravings.contains_key(&engraving_id) {
                    return Err(CatalogError::DanglingReference {
                        table: "engravings",
                        component_id: engraving_id,
                        pen_id: pen.id,
                    });
                }
            }
        }

        for (user_id, interactions) in &self.user_interactions {
            for interaction in interactions {
                if !self.pens.contains_key(&interaction.pen_id) {
                    return Err(CatalogError::UnknownInteractionPen {
                        user_id: *user_id,
                        pen_id: interaction.pen_id,
                    });
                }
            }
        }

        Ok(())
    }

    /// Compute aggregate statistics for all pens in parallel
    pub fn compute_pen_stats(&mut self) {
        let pen_stats = self
            .pen_interactions
            .par_iter()
            .map(|(&pen_id, interactions)| {
                let interaction_count = interactions.len() as u32;
                let mean_strength = if interaction_count > 0 {
                    let total: f32 = interactions.iter().map(|i| i.strength).sum();
                    total / interaction_count as f32
                } else {
                    0.0
                };
                let popularity_score = popularity_score(mean_strength, interaction_count);

                (
                    pen_id,
                    PenStats {
                        interaction_count,
                        mean_strength,
                        popularity_score,
                    },
                )
            })
            .collect();
        self.pen_stats = pen_stats;
    }

    /// Population-level ranking: pens by descending popularity score, ties
    /// broken by ascending pen id. Pens without interactions rank last.
    pub fn popularity_ranking(&self) -> Vec<(PenId, f32)> {
        let mut ranking: Vec<(PenId, f32)> = self
            .pens
            .keys()
            .map(|&pen_id| {
                let score = self
                    .pen_stats
                    .get(&pen_id)
                    .map(|s| s.popularity_score)
                    .unwrap_or(0.0);
                (pen_id, score)
            })
            .collect();
        ranking.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        ranking
    }

    /// Stable hash over table ids and sizes.
    ///
    /// A persisted model artifact carries the fingerprint of the catalog it
    /// was trained on; a mismatch at load time means the model is stale and
    /// must be retrained instead of served against a changed vocabulary.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        for (name, ids) in [
            ("materials", self.materials.keys().collect::<Vec<_>>()),
            ("inks", self.inks.keys().collect()),
            ("barrels", self.barrels.keys().collect()),
            ("caps", self.caps.keys().collect()),
            ("nibs", self.nibs.keys().collect()),
            ("coatings", self.coatings.keys().collect()),
            ("engravings", self.engravings.keys().collect()),
            ("templates", self.templates.keys().collect()),
            ("pens", self.pens.keys().collect()),
        ] {
            name.hash(&mut hasher);
            ids.hash(&mut hasher);
        }
        hasher.finish()
    }

    /// Get counts for debugging/validation: (pens, users, interactions)
    pub fn counts(&self) -> (usize, usize, usize) {
        let total_interactions = self.user_interactions.values().map(|v| v.len()).sum();
        (self.pens.len(), self.user_interactions.len(), total_interactions)
    }
}

/// Helper function to compute a popularity score.
///
/// `mean_strength * ln(count + 1)` rewards both strong signals and many of
/// them, without letting a single 5.0 view dominate.
fn popularity_score(mean_strength: f32, interaction_count: u32) -> f32 {
    mean_strength * (interaction_count as f32 + 1.0).ln()
}
