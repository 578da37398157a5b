//! Content similarity index over pen feature vectors.
//!
//! Built once per snapshot: rows of the pen feature matrix are L2
//! normalized, and the full pairwise cosine matrix falls out of a single
//! gram-matrix product. Lookups at serving time are then just row reads
//! and a sort, with no per-request linear algebra beyond the aggregation.

use crate::encoder::PenFeatureMatrix;
use catalog::PenId;
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Precomputed pairwise cosine similarity between all pens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityMatrix {
    pen_ids: Vec<PenId>,
    row_of: HashMap<PenId, usize>,
    matrix: Array2<f32>,
}

impl SimilarityMatrix {
    /// Compute the full pairwise cosine matrix.
    ///
    /// An all-zero feature vector has no direction; its similarity to
    /// everything is defined as 0.0 rather than NaN. The diagonal is
    /// forced to exactly 1.0 so self-similarity never suffers float drift.
    pub fn compute(features: &PenFeatureMatrix) -> Self {
        let n = features.len();
        let dim = features.features.ncols();

        // Normalize rows in parallel; zero rows stay zero
        let normalized_rows: Vec<Array1<f32>> = (0..n)
            .into_par_iter()
            .map(|i| {
                let row = features.features.row(i);
                let norm = row.dot(&row).sqrt();
                if norm > 0.0 {
                    row.mapv(|v| v / norm)
                } else {
                    Array1::zeros(dim)
                }
            })
            .collect();

        let mut normalized = Array2::zeros((n, dim));
        for (i, row) in normalized_rows.into_iter().enumerate() {
            normalized.row_mut(i).assign(&row);
        }

        let mut matrix = normalized.dot(&normalized.t());
        for i in 0..n {
            matrix[[i, i]] = 1.0;
        }

        let row_of: HashMap<PenId, usize> = features
            .pen_ids
            .iter()
            .enumerate()
            .map(|(i, &id)| (id, i))
            .collect();

        debug!(pens = n, dim, "computed pairwise similarity matrix");

        Self {
            pen_ids: features.pen_ids.clone(),
            row_of,
            matrix,
        }
    }

    pub fn len(&self) -> usize {
        self.pen_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pen_ids.is_empty()
    }

    /// Cosine similarity between two pens; None if either id is unknown
    pub fn similarity(&self, a: PenId, b: PenId) -> Option<f32> {
        let i = self.row_of.get(&a)?;
        let j = self.row_of.get(&b)?;
        Some(self.matrix[[*i, *j]])
    }

    /// Pens most similar to a reference set.
    ///
    /// Each candidate's score is the mean similarity to the known
    /// reference pens (unknown ids are skipped). The reference pens and
    /// everything in `exclude` are not candidates. Results come back in
    /// descending score order, ties broken by ascending pen id; an empty
    /// or fully-unknown reference set yields an empty list.
    pub fn nearest_neighbors(
        &self,
        reference: &[PenId],
        exclude: &HashSet<PenId>,
        top_n: usize,
    ) -> Vec<(PenId, f32)> {
        let reference_rows: Vec<usize> = reference
            .iter()
            .filter_map(|id| self.row_of.get(id).copied())
            .collect();
        if reference_rows.is_empty() || top_n == 0 {
            return Vec::new();
        }

        let reference_set: HashSet<PenId> = reference.iter().copied().collect();
        let mut scored: Vec<(PenId, f32)> = self
            .pen_ids
            .iter()
            .enumerate()
            .filter(|(_, id)| !reference_set.contains(id) && !exclude.contains(id))
            .map(|(j, &id)| {
                let total: f32 = reference_rows.iter().map(|&i| self.matrix[[i, j]]).sum();
                (id, total / reference_rows.len() as f32)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(top_n);
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::PenEncoder;
    use catalog::{CatalogShape, SyntheticCatalog};

    fn build_matrix(seed: u64) -> SimilarityMatrix {
        let catalog = SyntheticCatalog::new(seed).generate().unwrap();
        let encoder = PenEncoder::fit(&catalog).unwrap();
        let features = encoder.encode_all(&catalog).unwrap();
        SimilarityMatrix::compute(&features)
    }

    #[test]
    fn test_diagonal_is_one() {
        let sim = build_matrix(5);
        for &pen_id in &sim.pen_ids.clone() {
            assert_eq!(sim.similarity(pen_id, pen_id), Some(1.0));
        }
    }

    #[test]
    fn test_symmetry() {
        let sim = build_matrix(5);
        let ids = sim.pen_ids.clone();
        for &a in ids.iter().take(10) {
            for &b in ids.iter().take(10) {
                let ab = sim.similarity(a, b).unwrap();
                let ba = sim.similarity(b, a).unwrap();
                assert!((ab - ba).abs() < 1e-5, "sim({a},{b}) != sim({b},{a})");
            }
        }
    }

    #[test]
    fn test_values_in_range() {
        let sim = build_matrix(8);
        let ids = sim.pen_ids.clone();
        for &a in &ids {
            for &b in &ids {
                let v = sim.similarity(a, b).unwrap();
                assert!((-1.0..=1.0001).contains(&v), "sim({a},{b}) = {v}");
            }
        }
    }

    #[test]
    fn test_compute_is_deterministic() {
        let a = build_matrix(13);
        let b = build_matrix(13);
        for &x in a.pen_ids.iter().take(10) {
            for &y in a.pen_ids.iter().take(10) {
                assert_eq!(a.similarity(x, y), b.similarity(x, y));
            }
        }
    }

    #[test]
    fn test_identical_pens_are_most_similar() {
        // Three pens share every component and attribute; the twin of the
        // reference pen must outrank everything else
        let shape = CatalogShape {
            pens: 10,
            users: 20,
            ..CatalogShape::default()
        };
        let mut catalog = SyntheticCatalog::new(3).with_shape(shape).generate().unwrap();

        let template = catalog.pen(1).unwrap().clone();
        for id in [2, 3] {
            let mut twin = template.clone();
            twin.id = id;
            catalog.insert_pen(twin);
        }

        let encoder = PenEncoder::fit(&catalog).unwrap();
        let features = encoder.encode_all(&catalog).unwrap();
        let sim = SimilarityMatrix::compute(&features);

        assert!((sim.similarity(1, 2).unwrap() - 1.0).abs() < 1e-5);
        let neighbors = sim.nearest_neighbors(&[1], &HashSet::new(), 3);
        // Both twins lead, in ascending id order
        assert_eq!(neighbors[0].0, 2);
        assert_eq!(neighbors[1].0, 3);
    }

    #[test]
    fn test_neighbors_exclude_reference_and_visited() {
        let sim = build_matrix(5);
        let exclude: HashSet<PenId> = [4, 5].into_iter().collect();
        let neighbors = sim.nearest_neighbors(&[1, 2], &exclude, 50);

        for (pen_id, _) in &neighbors {
            assert!(![1, 2, 4, 5].contains(pen_id));
        }
    }

    #[test]
    fn test_neighbors_empty_reference() {
        let sim = build_matrix(5);
        assert!(sim.nearest_neighbors(&[], &HashSet::new(), 5).is_empty());
        // Unknown reference ids are skipped, leaving nothing to aggregate
        assert!(
            sim.nearest_neighbors(&[9999], &HashSet::new(), 5)
                .is_empty()
        );
    }

    #[test]
    fn test_neighbors_respect_top_n() {
        let sim = build_matrix(5);
        let neighbors = sim.nearest_neighbors(&[1], &HashSet::new(), 3);
        assert_eq!(neighbors.len(), 3);
        // Descending score
        assert!(neighbors[0].1 >= neighbors[1].1);
        assert!(neighbors[1].1 >= neighbors[2].1);
    }
}
