//! Seeded synthetic catalog generation.
//!
//! The serving process has no real warehouse feed; tables are generated
//! in-process at startup and regenerated on retrain. Everything is driven
//! by a single `StdRng` seed so two generators with the same seed produce
//! byte-identical catalogs, which the determinism tests rely on.

use crate::error::Result;
use crate::index::CatalogIndex;
use crate::types::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const MATERIAL_KINDS: &[&str] = &["resin", "ebonite", "brass", "titanium", "wood"];
const FINISHES: &[&str] = &["matte", "polished", "brushed", "satin"];
const COLOR_FAMILIES: &[&str] = &["blue", "black", "sepia", "green", "burgundy", "turquoise"];
const SHEENS: &[&str] = &["none", "low", "high"];
const BARREL_SHAPES: &[&str] = &["cigar", "flat-top", "torpedo", "faceted"];
const CAP_CLOSURES: &[&str] = &["snap", "screw", "magnetic"];
const BAND_STYLES: &[&str] = &["plain", "rolled", "engraved"];
const NIB_SIZES: &[&str] = &["EF", "F", "M", "B", "stub"];
const NIB_GRINDS: &[&str] = &["round", "italic", "architect"];
const NIB_FLEX: &[&str] = &["firm", "soft", "flex"];
const COATING_KINDS: &[&str] = &["lacquer", "PVD", "anodized"];
const GLOSS_LEVELS: &[&str] = &["matte", "semi", "high"];
const ENGRAVING_STYLES: &[&str] = &["floral", "geometric", "monogram", "scrollwork"];
const SILHOUETTES: &[&str] = &["zeus", "athena", "poseidon", "hermes"];

/// Default table sizes, matching the shapes the serving process expects
#[derive(Debug, Clone, Copy)]
pub struct CatalogShape {
    pub materials: u32,
    pub templates: u32,
    pub coatings: u32,
    pub inks: u32,
    pub nibs: u32,
    pub barrels: u32,
    pub caps: u32,
    pub engravings: u32,
    pub pens: u32,
    pub users: u32,
}

impl Default for CatalogShape {
    fn default() -> Self {
        Self {
            materials: 10,
            templates: 8,
            coatings: 6,
            inks: 10,
            nibs: 12,
            barrels: 15,
            caps: 12,
            engravings: 12,
            pens: 50,
            users: 500,
        }
    }
}

/// Deterministic catalog generator
pub struct SyntheticCatalog {
    seed: u64,
    shape: CatalogShape,
}

impl SyntheticCatalog {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            shape: CatalogShape::default(),
        }
    }

    /// Override table sizes (mostly useful in tests)
    pub fn with_shape(mut self, shape: CatalogShape) -> Self {
        self.shape = shape;
        self
    }

    /// Generate a full, validated catalog with precomputed pen statistics
    pub fn generate(&self) -> Result<CatalogIndex> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let shape = self.shape;
        let mut index = CatalogIndex::new();

        for id in 1..=shape.materials {
            let kind = pick(&mut rng, MATERIAL_KINDS);
            index.insert_material(Material {
                id,
                name: format!("{} {}", capitalize(kind), id),
                kind: kind.to_string(),
                finish: pick(&mut rng, FINISHES).to_string(),
                density: rng.random_range(0.9..8.5),
                cost_per_gram: rng.random_range(0.1..2.5),
            });
        }

        for id in 1..=shape.templates {
            let silhouette = pick(&mut rng, SILHOUETTES);
            index.insert_template(DesignTemplate {
                id,
                name: format!("{} {}", capitalize(silhouette), id),
                silhouette: silhouette.to_string(),
                base_cost: rng.random_range(40.0..400.0),
            });
        }

        for id in 1..=shape.coatings {
            index.insert_coating(Coating {
                id,
                kind: pick(&mut rng, COATING_KINDS).to_string(),
                gloss: pick(&mut rng, GLOSS_LEVELS).to_string(),
                durability: rng.random_range(1.0..10.0),
                cost: rng.random_range(5.0..80.0),
            });
        }

        for id in 1..=shape.inks {
            index.insert_ink(InkConfig {
                id,
                color_family: pick(&mut rng, COLOR_FAMILIES).to_string(),
                sheen: pick(&mut rng, SHEENS).to_string(),
                viscosity: rng.random_range(0.8..2.0),
                cost: rng.random_range(8.0..35.0),
            });
        }

        for id in 1..=shape.nibs {
            index.insert_nib(NibConfig {
                id,
                size: pick(&mut rng, NIB_SIZES).to_string(),
                grind: pick(&mut rng, NIB_GRINDS).to_string(),
                flexibility: pick(&mut rng, NIB_FLEX).to_string(),
                cost: rng.random_range(15.0..120.0),
            });
        }

        for id in 1..=shape.barrels {
            index.insert_barrel(BarrelConfig {
                id,
                shape: pick(&mut rng, BARREL_SHAPES).to_string(),
                diameter_mm: rng.random_range(9.0..16.0),
                length_mm: rng.random_range(110.0..150.0),
                cost: rng.random_range(20.0..90.0),
            });
        }

        for id in 1..=shape.caps {
            index.insert_cap(CapConfig {
                id,
                closure: pick(&mut rng, CAP_CLOSURES).to_string(),
                band_style: pick(&mut rng, BAND_STYLES).to_string(),
                weight_g: rng.random_range(4.0..15.0),
                cost: rng.random_range(10.0..60.0),
            });
        }

        for id in 1..=shape.engravings {
            index.insert_engraving(Engraving {
                id,
                style: pick(&mut rng, ENGRAVING_STYLES).to_string(),
                depth_mm: rng.random_range(0.1..0.8),
                cost: rng.random_range(10.0..70.0),
            });
        }

        for id in 1..=shape.pens {
            let engraving_ids = match rng.random_range(0..10) {
                0..=5 => vec![],
                6..=8 => vec![rng.random_range(1..=shape.engravings)],
                _ => {
                    let a = rng.random_range(1..=shape.engravings);
                    let b = rng.random_range(1..=shape.engravings);
                    if a == b { vec![a] } else { vec![a, b] }
                }
            };
            index.insert_pen(Pen {
                id,
                material_id: rng.random_range(1..=shape.materials),
                ink_id: rng.random_range(1..=shape.inks),
                barrel_id: rng.random_range(1..=shape.barrels),
                cap_id: rng.random_range(1..=shape.caps),
                nib_id: rng.random_range(1..=shape.nibs),
                engraving_ids,
                price: rng.random_range(60.0..900.0),
                weight_g: rng.random_range(15.0..45.0),
            });
        }

        let mut timestamp = 1_700_000_000_i64;
        for user_id in 1..=shape.users {
            let n_interactions = rng.random_range(1..=8);
            for _ in 0..n_interactions {
                let pen_id = rng.random_range(1..=shape.pens);
                let (kind, strength) = match rng.random_range(0..100) {
                    0..=49 => (InteractionKind::View, rng.random_range(1.0..3.0)),
                    50..=74 => (InteractionKind::Like, rng.random_range(3.5..4.5)),
                    75..=89 => (InteractionKind::Rating, rng.random_range(1.0..5.0)),
                    _ => (InteractionKind::Purchase, rng.random_range(4.5..5.0)),
                };
                timestamp += rng.random_range(1..3600);
                index.insert_interaction(Interaction {
                    user_id,
                    pen_id,
                    kind,
                    strength,
                    timestamp,
                });
            }
        }

        index.validate()?;
        index.compute_pen_stats();
        Ok(index)
    }
}

fn pick<'a>(rng: &mut StdRng, values: &'a [&'a str]) -> &'a str {
    values[rng.random_range(0..values.len())]
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
