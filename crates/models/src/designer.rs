//! Conditional design suggestion generator.
//!
//! For each component category that pens actually reference (material, ink,
//! barrel, cap, nib, engraving) a linear softmax head is trained to predict
//! the referenced component from the pen's composite feature vector. At
//! suggestion time the user's preference vector (mean of liked-pen vectors,
//! or the catalog centroid on cold start) is pushed through every head and
//! each argmax maps back to a real component id. Coatings and design
//! templates have no pen linkage, so they are chosen by snapping the
//! preference-derived cost level to the nearest real component.

use crate::error::{ModelError, Result};
use catalog::{
    BarrelConfig, CapConfig, CatalogIndex, Coating, ComponentId, DesignTemplate, Engraving,
    InkConfig, Material, NibConfig, UserId,
};
use features::{NumericScaler, PenEncoder, PenFeatureMatrix};
use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Training hyperparameters for the category heads.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DesignerConfig {
    pub learning_rate: f32,
    pub epochs: usize,
    pub seed: u64,
}

impl Default for DesignerConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            epochs: 200,
            seed: 7,
        }
    }
}

/// A complete suggested pen design. Every id references an existing
/// component in the catalog the suggester was prepared against.
#[derive(Debug, Clone, Serialize)]
pub struct DesignSuggestion {
    pub material: Material,
    pub ink: InkConfig,
    pub barrel: BarrelConfig,
    pub cap: CapConfig,
    pub nib: NibConfig,
    pub coating: Coating,
    pub template: DesignTemplate,
    pub engravings: Vec<Engraving>,
    pub estimated_price: f32,
}

// =============================================================================
// Softmax head
// =============================================================================

/// Linear softmax classifier over one component table.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CategoryHead {
    /// Component id per output class, ascending
    ids: Vec<ComponentId>,
    /// classes x input_dim
    weights: Array2<f32>,
    bias: Array1<f32>,
}

impl CategoryHead {
    /// Train by per-sample SGD on cross-entropy, samples reshuffled each
    /// epoch from the shared seeded rng.
    fn train(
        ids: Vec<ComponentId>,
        features: &Array2<f32>,
        targets: &[usize],
        config: &DesignerConfig,
        rng: &mut StdRng,
    ) -> Result<Self> {
        if ids.is_empty() || targets.is_empty() {
            return Err(ModelError::Training(
                "category head has no classes or no samples".into(),
            ));
        }
        let classes = ids.len();
        let dim = features.ncols();
        let mut weights =
            Array2::from_shape_fn((classes, dim), |_| rng.random_range(-0.01..0.01));
        let mut bias: Array1<f32> = Array1::zeros(classes);

        let mut order: Vec<usize> = (0..targets.len()).collect();
        for _epoch in 0..config.epochs {
            for i in (1..order.len()).rev() {
                let j = rng.random_range(0..=i);
                order.swap(i, j);
            }
            for &s in &order {
                let x = features.row(s);
                let probs = softmax(&(weights.dot(&x) + &bias));
                // Gradient of cross-entropy w.r.t. logits is probs - onehot
                for c in 0..classes {
                    let grad = probs[c] - if c == targets[s] { 1.0 } else { 0.0 };
                    bias[c] -= config.learning_rate * grad;
                    for (w, &xv) in weights.row_mut(c).iter_mut().zip(x.iter()) {
                        *w -= config.learning_rate * grad * xv;
                    }
                }
            }
        }

        Ok(Self { ids, weights, bias })
    }

    fn probabilities(&self, x: ArrayView1<'_, f32>) -> Array1<f32> {
        softmax(&(self.weights.dot(&x) + &self.bias))
    }

    /// Winning component id and its probability, ties broken by the lower
    /// class index (ascending component id)
    fn best(&self, x: ArrayView1<'_, f32>) -> (ComponentId, f32) {
        let probs = self.probabilities(x);
        let mut best = 0usize;
        for c in 1..probs.len() {
            if probs[c] > probs[best] {
                best = c;
            }
        }
        (self.ids[best], probs[best])
    }

    fn class_count(&self) -> usize {
        self.ids.len()
    }
}

fn softmax(logits: &Array1<f32>) -> Array1<f32> {
    let max = logits.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let exps = logits.mapv(|v| (v - max).exp());
    let total = exps.sum();
    if total > 0.0 {
        exps / total
    } else {
        Array1::from_elem(logits.len(), 1.0 / logits.len() as f32)
    }
}

// =============================================================================
// Suggester
// =============================================================================

/// Trained design suggester, paired with the catalog it was prepared on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesignSuggester {
    encoder: PenEncoder,
    pen_features: PenFeatureMatrix,
    material_head: CategoryHead,
    ink_head: CategoryHead,
    barrel_head: CategoryHead,
    cap_head: CategoryHead,
    nib_head: CategoryHead,
    /// None when no pen in the catalog carries an engraving
    engraving_head: Option<CategoryHead>,
    /// (id, scaled cost) per coating, ascending id
    coating_costs: Vec<(ComponentId, f32)>,
    /// (id, scaled base cost) per template, ascending id
    template_costs: Vec<(ComponentId, f32)>,
    mean_pen_price: f32,
    fingerprint: u64,
}

impl DesignSuggester {
    /// Fit encoders and train every category head from the catalog.
    ///
    /// Returns the ready suggester; there is no untrained intermediate
    /// state to call by accident.
    pub fn prepare(catalog: &CatalogIndex, config: &DesignerConfig) -> Result<Self> {
        let encoder = PenEncoder::fit(catalog)?;
        let pen_features = encoder.encode_all(catalog)?;
        let mut rng = StdRng::seed_from_u64(config.seed);

        info!(
            pens = pen_features.len(),
            dim = encoder.feature_dim(),
            "training design suggestion heads"
        );

        // Per-category targets follow the pen row order of the feature
        // matrix, so head training sees exactly the vectors it will score
        let pens: Vec<&catalog::Pen> = pen_features
            .pen_ids
            .iter()
            .filter_map(|&id| catalog.pen(id))
            .collect();
        if pens.len() != pen_features.len() {
            return Err(ModelError::Training(
                "feature matrix references pens missing from the catalog".into(),
            ));
        }

        let material_head = Self::train_head(
            catalog.materials().map(|m| m.id).collect(),
            &pen_features.features,
            &pens.iter().map(|p| p.material_id).collect::<Vec<_>>(),
            config,
            &mut rng,
        )?;
        let ink_head = Self::train_head(
            catalog.inks().map(|i| i.id).collect(),
            &pen_features.features,
            &pens.iter().map(|p| p.ink_id).collect::<Vec<_>>(),
            config,
            &mut rng,
        )?;
        let barrel_head = Self::train_head(
            catalog.barrels().map(|b| b.id).collect(),
            &pen_features.features,
            &pens.iter().map(|p| p.barrel_id).collect::<Vec<_>>(),
            config,
            &mut rng,
        )?;
        let cap_head = Self::train_head(
            catalog.caps().map(|c| c.id).collect(),
            &pen_features.features,
            &pens.iter().map(|p| p.cap_id).collect::<Vec<_>>(),
            config,
            &mut rng,
        )?;
        let nib_head = Self::train_head(
            catalog.nibs().map(|n| n.id).collect(),
            &pen_features.features,
            &pens.iter().map(|p| p.nib_id).collect::<Vec<_>>(),
            config,
            &mut rng,
        )?;

        // The engraving head trains only on pens that carry one; a catalog
        // where nothing is engraved simply has no head
        let engraved_rows: Vec<usize> = pens
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.engraving_ids.is_empty())
            .map(|(i, _)| i)
            .collect();
        let engraving_head = if engraved_rows.is_empty() {
            None
        } else {
            let ids: Vec<ComponentId> = catalog.engravings().map(|e| e.id).collect();
            let mut subset = Array2::zeros((engraved_rows.len(), pen_features.features.ncols()));
            let mut referenced = Vec::with_capacity(engraved_rows.len());
            for (row, &i) in engraved_rows.iter().enumerate() {
                subset.row_mut(row).assign(&pen_features.features.row(i));
                referenced.push(pens[i].engraving_ids[0]);
            }
            Some(Self::train_head(ids, &subset, &referenced, config, &mut rng)?)
        };

        let coating_scaler = NumericScaler::fit(catalog.coatings().map(|c| c.cost));
        let coating_costs: Vec<(ComponentId, f32)> = catalog
            .coatings()
            .map(|c| (c.id, coating_scaler.scale(c.cost)))
            .collect();
        let template_scaler = NumericScaler::fit(catalog.templates().map(|t| t.base_cost));
        let template_costs: Vec<(ComponentId, f32)> = catalog
            .templates()
            .map(|t| (t.id, template_scaler.scale(t.base_cost)))
            .collect();
        if coating_costs.is_empty() {
            return Err(ModelError::Catalog(catalog::CatalogError::EmptyTable {
                table: "coatings",
            }));
        }
        if template_costs.is_empty() {
            return Err(ModelError::Catalog(catalog::CatalogError::EmptyTable {
                table: "design_templates",
            }));
        }

        let pen_count = pens.len() as f32;
        let mean_pen_price = pens.iter().map(|p| p.price).sum::<f32>() / pen_count;

        Ok(Self {
            encoder,
            pen_features,
            material_head,
            ink_head,
            barrel_head,
            cap_head,
            nib_head,
            engraving_head,
            coating_costs,
            template_costs,
            mean_pen_price,
            fingerprint: catalog.fingerprint(),
        })
    }

    fn train_head(
        ids: Vec<ComponentId>,
        features: &Array2<f32>,
        referenced: &[ComponentId],
        config: &DesignerConfig,
        rng: &mut StdRng,
    ) -> Result<CategoryHead> {
        let targets: Vec<usize> = referenced
            .iter()
            .map(|id| {
                ids.iter().position(|i| i == id).ok_or_else(|| {
                    ModelError::Training(format!("pen references component {id} outside its table"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        CategoryHead::train(ids, features, &targets, config, rng)
    }

    /// Catalog fingerprint this suggester was prepared against
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Suggest a complete design for a user.
    ///
    /// The preference vector is the mean of the user's liked pens' composite
    /// vectors; a user with no likes gets the catalog centroid, so every
    /// history-less user receives the same deterministic cold-start design.
    #[instrument(skip(self, catalog))]
    pub fn suggest(&self, user_id: UserId, catalog: &CatalogIndex) -> Result<DesignSuggestion> {
        if catalog.fingerprint() != self.fingerprint {
            return Err(ModelError::Stale {
                expected: self.fingerprint,
                found: catalog.fingerprint(),
            });
        }

        let liked = catalog.liked_pens(user_id);
        let liked_rows: Vec<ArrayView1<'_, f32>> = liked
            .iter()
            .filter_map(|&id| self.pen_features.row(id))
            .collect();

        let (preference, estimated_price) = if liked_rows.is_empty() {
            debug!(user_id, "cold start, using catalog centroid");
            (self.pen_features.centroid(), self.mean_pen_price)
        } else {
            let mut mean: Array1<f32> = Array1::zeros(self.encoder.feature_dim());
            for row in &liked_rows {
                mean += row;
            }
            mean /= liked_rows.len() as f32;
            let prices: Vec<f32> = liked
                .iter()
                .filter_map(|&id| catalog.pen(id).map(|p| p.price))
                .collect();
            let price = prices.iter().sum::<f32>() / prices.len() as f32;
            (mean, price)
        };
        let x = preference.view();

        let (material_id, _) = self.material_head.best(x);
        let (ink_id, _) = self.ink_head.best(x);
        let (barrel_id, _) = self.barrel_head.best(x);
        let (cap_id, _) = self.cap_head.best(x);
        let (nib_id, _) = self.nib_head.best(x);

        // Engraving only makes the cut when the head is more confident
        // than a uniform guess
        let mut engravings = Vec::new();
        if let Some(head) = &self.engraving_head {
            let (engraving_id, prob) = head.best(x);
            if prob > 1.0 / head.class_count() as f32 {
                engravings.push(self.lookup(catalog.engraving(engraving_id).cloned())?);
            }
        }

        let cost_level = self.encoder.scale_price(estimated_price);
        let coating_id = nearest_by_cost(&self.coating_costs, cost_level);
        let template_id = nearest_by_cost(&self.template_costs, cost_level);

        Ok(DesignSuggestion {
            material: self.lookup(catalog.material(material_id).cloned())?,
            ink: self.lookup(catalog.ink(ink_id).cloned())?,
            barrel: self.lookup(catalog.barrel(barrel_id).cloned())?,
            cap: self.lookup(catalog.cap(cap_id).cloned())?,
            nib: self.lookup(catalog.nib(nib_id).cloned())?,
            coating: self.lookup(catalog.coating(coating_id).cloned())?,
            template: self.lookup(catalog.template(template_id).cloned())?,
            engravings,
            estimated_price,
        })
    }

    /// Head outputs come from the catalog the fingerprint check already
    /// matched, so a miss here means real inconsistency
    fn lookup<T>(&self, found: Option<T>) -> Result<T> {
        found.ok_or(ModelError::Stale {
            expected: self.fingerprint,
            found: self.fingerprint,
        })
    }
}

/// Component whose scaled cost sits closest to the target level, ties
/// broken by the earlier (lower-id) entry
fn nearest_by_cost(costs: &[(ComponentId, f32)], target: f32) -> ComponentId {
    let mut best = costs[0];
    for &(id, cost) in &costs[1..] {
        if (cost - target).abs() < (best.1 - target).abs() {
            best = (id, cost);
        }
    }
    best.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog::{Interaction, InteractionKind, SyntheticCatalog};

    fn prepared() -> (CatalogIndex, DesignSuggester) {
        let catalog = SyntheticCatalog::new(17).generate().unwrap();
        let suggester = DesignSuggester::prepare(&catalog, &DesignerConfig::default()).unwrap();
        (catalog, suggester)
    }

    #[test]
    fn test_suggestion_references_existing_components() {
        let (catalog, suggester) = prepared();
        let suggestion = suggester.suggest(42, &catalog).unwrap();

        assert!(catalog.material(suggestion.material.id).is_some());
        assert!(catalog.ink(suggestion.ink.id).is_some());
        assert!(catalog.barrel(suggestion.barrel.id).is_some());
        assert!(catalog.cap(suggestion.cap.id).is_some());
        assert!(catalog.nib(suggestion.nib.id).is_some());
        assert!(catalog.coating(suggestion.coating.id).is_some());
        assert!(catalog.template(suggestion.template.id).is_some());
        for engraving in &suggestion.engravings {
            assert!(catalog.engraving(engraving.id).is_some());
        }
        assert!(suggestion.estimated_price > 0.0);
    }

    #[test]
    fn test_cold_start_is_identical_across_unknown_users() {
        let (catalog, suggester) = prepared();
        // Neither user has any history
        let a = suggester.suggest(900_001, &catalog).unwrap();
        let b = suggester.suggest(900_002, &catalog).unwrap();

        assert_eq!(a.material.id, b.material.id);
        assert_eq!(a.ink.id, b.ink.id);
        assert_eq!(a.barrel.id, b.barrel.id);
        assert_eq!(a.cap.id, b.cap.id);
        assert_eq!(a.nib.id, b.nib.id);
        assert_eq!(a.coating.id, b.coating.id);
        assert_eq!(a.template.id, b.template.id);
        assert_eq!(a.estimated_price, b.estimated_price);
    }

    #[test]
    fn test_suggest_is_deterministic_for_known_user() {
        let (catalog, suggester) = prepared();
        let a = suggester.suggest(3, &catalog).unwrap();
        let b = suggester.suggest(3, &catalog).unwrap();
        assert_eq!(a.material.id, b.material.id);
        assert_eq!(a.nib.id, b.nib.id);
        assert_eq!(a.estimated_price, b.estimated_price);
    }

    #[test]
    fn test_estimated_price_tracks_liked_pens() {
        let (mut catalog, _) = prepared();
        // Give a fresh user strong likes on two known pens
        for pen_id in [1, 2] {
            catalog.insert_interaction(Interaction {
                user_id: 800_000,
                pen_id,
                kind: InteractionKind::Like,
                strength: 4.0,
                timestamp: 0,
            });
        }
        let suggester = DesignSuggester::prepare(&catalog, &DesignerConfig::default()).unwrap();
        let suggestion = suggester.suggest(800_000, &catalog).unwrap();

        let expected =
            (catalog.pen(1).unwrap().price + catalog.pen(2).unwrap().price) / 2.0;
        assert!((suggestion.estimated_price - expected).abs() < 1e-3);
    }

    #[test]
    fn test_stale_catalog_is_rejected() {
        let (catalog, suggester) = prepared();
        let other = SyntheticCatalog::new(17)
            .with_shape(catalog::CatalogShape {
                pens: 10,
                ..Default::default()
            })
            .generate()
            .unwrap();

        assert!(matches!(
            suggester.suggest(1, &other),
            Err(ModelError::Stale { .. })
        ));
    }

    #[test]
    fn test_nearest_by_cost_snapping() {
        let costs = vec![(1, 0.1), (2, 0.5), (3, 0.9)];
        assert_eq!(nearest_by_cost(&costs, 0.0), 1);
        assert_eq!(nearest_by_cost(&costs, 0.55), 2);
        assert_eq!(nearest_by_cost(&costs, 1.0), 3);
    }
}
