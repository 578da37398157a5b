//! Collaborative filtering via biased matrix factorization.
//!
//! Interaction strengths are aggregated to max per (user, pen) pair, then a
//! latent factor model is fitted by stochastic gradient descent:
//!
//! ```text
//! prediction = global_bias + user_bias + pen_bias + dot(user_factors, pen_factors)
//! ```
//!
//! Initialization and batch shuffling both come from one seeded `StdRng`,
//! so training the same catalog with the same config is reproducible.
//! Prediction is a pure read and never fails; unknown users or pens fall
//! back to the global mean plus whichever bias is known.

use crate::error::{ModelError, Result};
use catalog::{CatalogIndex, PenId, UserId};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Training hyperparameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CfConfig {
    /// Latent dimensionality of user and pen factors
    pub factors: usize,
    pub learning_rate: f32,
    /// L2 penalty on biases and factors
    pub regularization: f32,
    pub epochs: usize,
    /// Samples per shuffled batch
    pub batch_size: usize,
    pub seed: u64,
}

impl Default for CfConfig {
    fn default() -> Self {
        Self {
            factors: 16,
            learning_rate: 0.01,
            regularization: 0.05,
            epochs: 30,
            batch_size: 64,
            seed: 42,
        }
    }
}

/// Trained matrix factorization model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CfModel {
    user_factors: Array2<f32>,
    pen_factors: Array2<f32>,
    user_bias: Array1<f32>,
    pen_bias: Array1<f32>,
    global_bias: f32,
    user_rows: HashMap<UserId, usize>,
    pen_rows: HashMap<PenId, usize>,
}

impl CfModel {
    /// Train a model from the catalog's interaction tables.
    ///
    /// Fails with `Training` when there are no interactions, or when the
    /// epoch loss goes non-finite (divergence); a diverged model is never
    /// returned, let alone persisted.
    pub fn train(catalog: &CatalogIndex, config: &CfConfig) -> Result<Self> {
        // Max-strength aggregation per (user, pen); BTreeMap keeps the
        // sample order deterministic
        let mut ratings: BTreeMap<(UserId, PenId), f32> = BTreeMap::new();
        for interaction in catalog.all_interactions() {
            ratings
                .entry((interaction.user_id, interaction.pen_id))
                .and_modify(|s| *s = s.max(interaction.strength))
                .or_insert(interaction.strength);
        }
        if ratings.is_empty() {
            return Err(ModelError::Training("no interactions to train on".into()));
        }

        let mut user_ids: Vec<UserId> = ratings.keys().map(|&(u, _)| u).collect();
        user_ids.dedup();
        let mut pen_ids: Vec<PenId> = ratings.keys().map(|&(_, p)| p).collect();
        pen_ids.sort_unstable();
        pen_ids.dedup();

        let user_rows: HashMap<UserId, usize> =
            user_ids.iter().enumerate().map(|(i, &u)| (u, i)).collect();
        let pen_rows: HashMap<PenId, usize> =
            pen_ids.iter().enumerate().map(|(i, &p)| (p, i)).collect();

        let samples: Vec<(usize, usize, f32)> = ratings
            .iter()
            .map(|(&(u, p), &r)| (user_rows[&u], pen_rows[&p], r))
            .collect();
        let global_bias = samples.iter().map(|s| s.2).sum::<f32>() / samples.len() as f32;

        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut user_factors = Array2::from_shape_fn((user_ids.len(), config.factors), |_| {
            rng.random_range(-0.05..0.05)
        });
        let mut pen_factors = Array2::from_shape_fn((pen_ids.len(), config.factors), |_| {
            rng.random_range(-0.05..0.05)
        });
        let mut user_bias: Array1<f32> = Array1::zeros(user_ids.len());
        let mut pen_bias: Array1<f32> = Array1::zeros(pen_ids.len());

        info!(
            users = user_ids.len(),
            pens = pen_ids.len(),
            samples = samples.len(),
            factors = config.factors,
            "training cf model"
        );

        let lr = config.learning_rate;
        let reg = config.regularization;
        let mut order: Vec<usize> = (0..samples.len()).collect();
        for epoch in 0..config.epochs {
            // Fisher-Yates reshuffle each epoch
            for i in (1..order.len()).rev() {
                let j = rng.random_range(0..=i);
                order.swap(i, j);
            }

            let mut squared_error = 0.0f32;
            for batch in order.chunks(config.batch_size.max(1)) {
                for &s in batch {
                    let (u, p, rating) = samples[s];
                    let dot = user_factors.row(u).dot(&pen_factors.row(p));
                    let err = global_bias + user_bias[u] + pen_bias[p] + dot - rating;
                    squared_error += err * err;

                    user_bias[u] -= lr * (err + reg * user_bias[u]);
                    pen_bias[p] -= lr * (err + reg * pen_bias[p]);
                    for k in 0..config.factors {
                        let pu = user_factors[[u, k]];
                        let qp = pen_factors[[p, k]];
                        user_factors[[u, k]] -= lr * (err * qp + reg * pu);
                        pen_factors[[p, k]] -= lr * (err * pu + reg * qp);
                    }
                }
            }

            let mse = squared_error / samples.len() as f32;
            if !mse.is_finite() {
                return Err(ModelError::Training(format!(
                    "diverged at epoch {epoch}: loss is not finite"
                )));
            }
            debug!(epoch, mse, "cf epoch complete");
        }

        Ok(Self {
            user_factors,
            pen_factors,
            user_bias,
            pen_bias,
            global_bias,
            user_rows,
            pen_rows,
        })
    }

    /// Predicted interaction strength for a (user, pen) pair.
    ///
    /// Never errors: an unknown user and/or pen degrades to the global mean
    /// plus whichever bias is known.
    pub fn predict(&self, user_id: UserId, pen_id: PenId) -> f32 {
        match (self.user_rows.get(&user_id), self.pen_rows.get(&pen_id)) {
            (Some(&u), Some(&p)) => {
                self.global_bias
                    + self.user_bias[u]
                    + self.pen_bias[p]
                    + self.user_factors.row(u).dot(&self.pen_factors.row(p))
            }
            (Some(&u), None) => self.global_bias + self.user_bias[u],
            (None, Some(&p)) => self.global_bias + self.pen_bias[p],
            (None, None) => self.global_bias,
        }
    }

    pub fn knows_user(&self, user_id: UserId) -> bool {
        self.user_rows.contains_key(&user_id)
    }

    /// Check internal consistency between the id maps and the factor
    /// matrices. Run after deserializing a persisted artifact; a hand-edited
    /// or truncated file must fail here instead of panicking on an index.
    pub fn validate(&self) -> Result<()> {
        let users = self.user_rows.len();
        let pens = self.pen_rows.len();
        if self.user_factors.nrows() != users || self.user_bias.len() != users {
            return Err(ModelError::ShapeMismatch(format!(
                "{} users mapped but {} factor rows, {} biases",
                users,
                self.user_factors.nrows(),
                self.user_bias.len()
            )));
        }
        if self.pen_factors.nrows() != pens || self.pen_bias.len() != pens {
            return Err(ModelError::ShapeMismatch(format!(
                "{} pens mapped but {} factor rows, {} biases",
                pens,
                self.pen_factors.nrows(),
                self.pen_bias.len()
            )));
        }
        if self.user_factors.ncols() != self.pen_factors.ncols() {
            return Err(ModelError::ShapeMismatch(format!(
                "user factor dim {} != pen factor dim {}",
                self.user_factors.ncols(),
                self.pen_factors.ncols()
            )));
        }
        if self.user_rows.values().any(|&i| i >= users)
            || self.pen_rows.values().any(|&i| i >= pens)
        {
            return Err(ModelError::ShapeMismatch(
                "row index out of bounds".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog::{
        BarrelConfig, CapConfig, Interaction, InteractionKind, Material, NibConfig, Pen,
        SyntheticCatalog,
    };

    fn tiny_catalog() -> CatalogIndex {
        let mut index = CatalogIndex::new();
        index.insert_material(Material {
            id: 1,
            name: "Resin 1".to_string(),
            kind: "resin".to_string(),
            finish: "matte".to_string(),
            density: 1.2,
            cost_per_gram: 0.3,
        });
        index.insert_ink(catalog::InkConfig {
            id: 1,
            color_family: "blue".to_string(),
            sheen: "none".to_string(),
            viscosity: 1.0,
            cost: 10.0,
        });
        index.insert_barrel(BarrelConfig {
            id: 1,
            shape: "cigar".to_string(),
            diameter_mm: 12.0,
            length_mm: 130.0,
            cost: 25.0,
        });
        index.insert_cap(CapConfig {
            id: 1,
            closure: "screw".to_string(),
            band_style: "plain".to_string(),
            weight_g: 7.0,
            cost: 12.0,
        });
        index.insert_nib(NibConfig {
            id: 1,
            size: "M".to_string(),
            grind: "round".to_string(),
            flexibility: "firm".to_string(),
            cost: 30.0,
        });
        for id in 1..=3 {
            index.insert_pen(Pen {
                id,
                material_id: 1,
                ink_id: 1,
                barrel_id: 1,
                cap_id: 1,
                nib_id: 1,
                engraving_ids: vec![],
                price: 100.0,
                weight_g: 25.0,
            });
        }
        index
    }

    #[test]
    fn test_train_empty_interactions_fails() {
        let catalog = tiny_catalog();
        let err = CfModel::train(&catalog, &CfConfig::default()).unwrap_err();
        assert!(matches!(err, ModelError::Training(_)));
    }

    #[test]
    fn test_high_signal_pen_outranks_uninteracted() {
        let mut catalog = tiny_catalog();
        // User 1 repeatedly purchases pen 1 and barely glances at pen 2
        for t in 0..5 {
            catalog.insert_interaction(Interaction {
                user_id: 1,
                pen_id: 1,
                kind: InteractionKind::Purchase,
                strength: 5.0,
                timestamp: t,
            });
        }
        catalog.insert_interaction(Interaction {
            user_id: 1,
            pen_id: 2,
            kind: InteractionKind::View,
            strength: 1.0,
            timestamp: 10,
        });

        let model = CfModel::train(&catalog, &CfConfig::default()).unwrap();
        // Pen 3 has no interactions at all and falls back
        assert!(model.predict(1, 1) > model.predict(1, 3));
        assert!(model.predict(1, 1) > model.predict(1, 2));
    }

    #[test]
    fn test_training_is_deterministic() {
        let catalog = SyntheticCatalog::new(21).generate().unwrap();
        let config = CfConfig::default();
        let a = CfModel::train(&catalog, &config).unwrap();
        let b = CfModel::train(&catalog, &config).unwrap();

        for user_id in [1, 10, 100] {
            for pen_id in [1, 25, 50] {
                assert_eq!(a.predict(user_id, pen_id), b.predict(user_id, pen_id));
            }
        }
    }

    #[test]
    fn test_unknown_ids_fall_back() {
        let catalog = SyntheticCatalog::new(21).generate().unwrap();
        let model = CfModel::train(&catalog, &CfConfig::default()).unwrap();

        // Neither id was ever seen; prediction is the global mean
        let fallback = model.predict(999_999, 999_999);
        assert!(fallback.is_finite());
        assert!(fallback > 0.0);
        assert!(!model.knows_user(999_999));
    }

    #[test]
    fn test_validate_accepts_trained_model() {
        let catalog = SyntheticCatalog::new(21).generate().unwrap();
        let model = CfModel::train(&catalog, &CfConfig::default()).unwrap();
        assert!(model.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_truncated_factors() {
        let catalog = SyntheticCatalog::new(21).generate().unwrap();
        let mut model = CfModel::train(&catalog, &CfConfig::default()).unwrap();
        // Simulate a corrupted artifact: drop a factor row but keep the map
        let rows = model.user_factors.nrows();
        model.user_factors = model
            .user_factors
            .slice(ndarray::s![..rows - 1, ..])
            .to_owned();

        assert!(matches!(
            model.validate(),
            Err(ModelError::ShapeMismatch(_))
        ));
    }
}
