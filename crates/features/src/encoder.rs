//! Component feature encoding.
//!
//! Heterogeneous attribute tables become fixed-width numeric vectors:
//! categorical fields are one-hot encoded against a vocabulary frozen at
//! fit time (slot 0 is the explicit "unknown" bucket, so unseen values at
//! encode time never raise), numeric fields are min-max scaled with
//! statistics captured at fit time. Nothing is refit per request, which is
//! what makes two encodes of the same input bit-identical.

use catalog::{CatalogError, CatalogIndex, Pen, PenId, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

// =============================================================================
// Building blocks
// =============================================================================

/// Frozen category-string to index mapping.
///
/// Index 0 is reserved for "unknown"; observed categories occupy 1..width
/// in sorted order so the layout does not depend on iteration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vocabulary {
    index: HashMap<String, usize>,
    width: usize,
}

impl Vocabulary {
    pub fn fit<'a>(values: impl Iterator<Item = &'a str>) -> Self {
        let unique: BTreeSet<&str> = values.collect();
        let index: HashMap<String, usize> = unique
            .iter()
            .enumerate()
            .map(|(i, v)| (v.to_string(), i + 1))
            .collect();
        let width = index.len() + 1;
        Self { index, width }
    }

    /// One-hot width, including the unknown slot
    pub fn width(&self) -> usize {
        self.width
    }

    /// Slot for a value; unseen values land in the unknown slot
    pub fn index_of(&self, value: &str) -> usize {
        self.index.get(value).copied().unwrap_or(0)
    }

    fn encode_into(&self, value: &str, out: &mut Vec<f32>) {
        let hot = self.index_of(value);
        for slot in 0..self.width {
            out.push(if slot == hot { 1.0 } else { 0.0 });
        }
    }
}

/// Min-max scaler with fit-time statistics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NumericScaler {
    min: f32,
    max: f32,
}

impl NumericScaler {
    pub fn fit(values: impl Iterator<Item = f32>) -> Self {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for v in values.filter(|v| v.is_finite()) {
            min = min.min(v);
            max = max.max(v);
        }
        if !min.is_finite() || !max.is_finite() {
            // Empty or all-NaN column; everything scales to the imputed 0.0
            return Self { min: 0.0, max: 0.0 };
        }
        Self { min, max }
    }

    /// Scale into [0, 1]. Non-finite input imputes to 0.0; a constant
    /// column scales to 0.0 rather than dividing by zero.
    pub fn scale(&self, value: f32) -> f32 {
        if !value.is_finite() {
            return 0.0;
        }
        if self.max > self.min {
            ((value - self.min) / (self.max - self.min)).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

// =============================================================================
// Record access
// =============================================================================

/// Uniform field access for component records.
///
/// Field order within each list is fixed by the implementation and is part
/// of the encoding contract: it determines the vector layout.
pub trait Encodable {
    /// Table name, used in error messages
    const TABLE: &'static str;

    fn categorical(&self) -> Vec<&str>;
    fn numeric(&self) -> Vec<f32>;
}

impl Encodable for catalog::Material {
    const TABLE: &'static str = "materials";

    fn categorical(&self) -> Vec<&str> {
        vec![&self.kind, &self.finish]
    }

    fn numeric(&self) -> Vec<f32> {
        vec![self.density, self.cost_per_gram]
    }
}

impl Encodable for catalog::InkConfig {
    const TABLE: &'static str = "ink_configs";

    fn categorical(&self) -> Vec<&str> {
        vec![&self.color_family, &self.sheen]
    }

    fn numeric(&self) -> Vec<f32> {
        vec![self.viscosity, self.cost]
    }
}

impl Encodable for catalog::BarrelConfig {
    const TABLE: &'static str = "barrel_configs";

    fn categorical(&self) -> Vec<&str> {
        vec![&self.shape]
    }

    fn numeric(&self) -> Vec<f32> {
        vec![self.diameter_mm, self.length_mm, self.cost]
    }
}

impl Encodable for catalog::CapConfig {
    const TABLE: &'static str = "cap_configs";

    fn categorical(&self) -> Vec<&str> {
        vec![&self.closure, &self.band_style]
    }

    fn numeric(&self) -> Vec<f32> {
        vec![self.weight_g, self.cost]
    }
}

impl Encodable for catalog::NibConfig {
    const TABLE: &'static str = "nib_configs";

    fn categorical(&self) -> Vec<&str> {
        vec![&self.size, &self.grind, &self.flexibility]
    }

    fn numeric(&self) -> Vec<f32> {
        vec![self.cost]
    }
}

impl Encodable for catalog::Coating {
    const TABLE: &'static str = "coatings";

    fn categorical(&self) -> Vec<&str> {
        vec![&self.kind, &self.gloss]
    }

    fn numeric(&self) -> Vec<f32> {
        vec![self.durability, self.cost]
    }
}

impl Encodable for catalog::Engraving {
    const TABLE: &'static str = "engravings";

    fn categorical(&self) -> Vec<&str> {
        vec![&self.style]
    }

    fn numeric(&self) -> Vec<f32> {
        vec![self.depth_mm, self.cost]
    }
}

impl Encodable for catalog::DesignTemplate {
    const TABLE: &'static str = "design_templates";

    fn categorical(&self) -> Vec<&str> {
        vec![&self.silhouette]
    }

    fn numeric(&self) -> Vec<f32> {
        vec![self.base_cost]
    }
}

// =============================================================================
// Per-table encoder
// =============================================================================

/// Fitted encoder for one component table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentEncoder {
    vocabularies: Vec<Vocabulary>,
    scalers: Vec<NumericScaler>,
    width: usize,
}

impl ComponentEncoder {
    /// Fit vocabularies and scalers from a table's records.
    ///
    /// Fails with `EmptyTable` when there is nothing to fit from; an
    /// encoder with no observed categories would map everything to
    /// "unknown" and defeat similarity comparisons.
    pub fn fit<R: Encodable>(records: &[&R]) -> Result<Self> {
        let first = records
            .first()
            .ok_or(CatalogError::EmptyTable { table: R::TABLE })?;

        let n_categorical = first.categorical().len();
        let n_numeric = first.numeric().len();

        let vocabularies: Vec<Vocabulary> = (0..n_categorical)
            .map(|j| Vocabulary::fit(records.iter().map(|r| r.categorical()[j])))
            .collect();
        let scalers: Vec<NumericScaler> = (0..n_numeric)
            .map(|j| NumericScaler::fit(records.iter().map(|r| r.numeric()[j])))
            .collect();

        let width = vocabularies.iter().map(|v| v.width()).sum::<usize>() + n_numeric;
        Ok(Self {
            vocabularies,
            scalers,
            width,
        })
    }

    /// Fixed output width for this table
    pub fn width(&self) -> usize {
        self.width
    }

    /// Encode one record: one-hot categorical blocks, then scaled numerics
    pub fn encode<R: Encodable>(&self, record: &R) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.width);
        for (vocab, value) in self.vocabularies.iter().zip(record.categorical()) {
            vocab.encode_into(value, &mut out);
        }
        for (scaler, value) in self.scalers.iter().zip(record.numeric()) {
            out.push(scaler.scale(value));
        }
        out
    }

    /// Encode a whole table into a matrix, rows in the given record order
    pub fn encode_table<R: Encodable>(&self, records: &[&R]) -> Array2<f32> {
        let mut matrix = Array2::zeros((records.len(), self.width));
        for (i, record) in records.iter().enumerate() {
            let row = self.encode(*record);
            for (j, v) in row.into_iter().enumerate() {
                matrix[[i, j]] = v;
            }
        }
        matrix
    }
}

// =============================================================================
// Composite pen encoder
// =============================================================================

/// Feature matrix over all pens, with the row ordering that every consumer
/// (similarity index, design suggester) shares.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PenFeatureMatrix {
    pub pen_ids: Vec<PenId>,
    row_of: HashMap<PenId, usize>,
    pub features: Array2<f32>,
}

impl PenFeatureMatrix {
    pub fn row(&self, pen_id: PenId) -> Option<ArrayView1<'_, f32>> {
        self.row_of.get(&pen_id).map(|&i| self.features.row(i))
    }

    pub fn row_index(&self, pen_id: PenId) -> Option<usize> {
        self.row_of.get(&pen_id).copied()
    }

    pub fn len(&self) -> usize {
        self.pen_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pen_ids.is_empty()
    }

    /// Mean feature vector across all pens
    pub fn centroid(&self) -> Array1<f32> {
        self.features
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(self.features.ncols()))
    }
}

/// Fitted composite encoder producing one vector per pen.
///
/// Concatenation order is fixed and documented: material block, ink block,
/// barrel block, cap block, nib block, mean-pooled engraving block (zeros
/// when a pen has no engravings), then scaled [price, weight]. Changing
/// this order invalidates every similarity comparison, so it only changes
/// together with a full snapshot rebuild.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PenEncoder {
    material: ComponentEncoder,
    ink: ComponentEncoder,
    barrel: ComponentEncoder,
    cap: ComponentEncoder,
    nib: ComponentEncoder,
    engraving: ComponentEncoder,
    price: NumericScaler,
    weight: NumericScaler,
    dim: usize,
}

impl PenEncoder {
    /// Fit per-table encoders and the pen-attribute scalers from a catalog
    pub fn fit(catalog: &CatalogIndex) -> Result<Self> {
        let material = ComponentEncoder::fit(&catalog.materials().collect::<Vec<_>>())?;
        let ink = ComponentEncoder::fit(&catalog.inks().collect::<Vec<_>>())?;
        let barrel = ComponentEncoder::fit(&catalog.barrels().collect::<Vec<_>>())?;
        let cap = ComponentEncoder::fit(&catalog.caps().collect::<Vec<_>>())?;
        let nib = ComponentEncoder::fit(&catalog.nibs().collect::<Vec<_>>())?;
        let engraving = ComponentEncoder::fit(&catalog.engravings().collect::<Vec<_>>())?;

        if catalog.pens().next().is_none() {
            return Err(CatalogError::EmptyTable { table: "pens" });
        }
        let price = NumericScaler::fit(catalog.pens().map(|p| p.price));
        let weight = NumericScaler::fit(catalog.pens().map(|p| p.weight_g));

        let dim = material.width()
            + ink.width()
            + barrel.width()
            + cap.width()
            + nib.width()
            + engraving.width()
            + 2;

        Ok(Self {
            material,
            ink,
            barrel,
            cap,
            nib,
            engraving,
            price,
            weight,
            dim,
        })
    }

    /// Fixed composite vector length
    pub fn feature_dim(&self) -> usize {
        self.dim
    }

    /// Scale a raw price with the fit-time pen price statistics
    pub fn scale_price(&self, price: f32) -> f32 {
        self.price.scale(price)
    }

    /// Encode one pen. Fails with `DanglingReference` when a referenced
    /// component id is missing from its table.
    pub fn encode_pen(&self, pen: &Pen, catalog: &CatalogIndex) -> Result<Vec<f32>> {
        let material = catalog
            .material(pen.material_id)
            .ok_or(CatalogError::DanglingReference {
                table: "materials",
                component_id: pen.material_id,
                pen_id: pen.id,
            })?;
        let ink = catalog
            .ink(pen.ink_id)
            .ok_or(CatalogError::DanglingReference {
                table: "ink_configs",
                component_id: pen.ink_id,
                pen_id: pen.id,
            })?;
        let barrel = catalog
            .barrel(pen.barrel_id)
            .ok_or(CatalogError::DanglingReference {
                table: "barrel_configs",
                component_id: pen.barrel_id,
                pen_id: pen.id,
            })?;
        let cap = catalog
            .cap(pen.cap_id)
            .ok_or(CatalogError::DanglingReference {
                table: "cap_configs",
                component_id: pen.cap_id,
                pen_id: pen.id,
            })?;
        let nib = catalog
            .nib(pen.nib_id)
            .ok_or(CatalogError::DanglingReference {
                table: "nib_configs",
                component_id: pen.nib_id,
                pen_id: pen.id,
            })?;

        let mut out = Vec::with_capacity(self.dim);
        out.extend(self.material.encode(material));
        out.extend(self.ink.encode(ink));
        out.extend(self.barrel.encode(barrel));
        out.extend(self.cap.encode(cap));
        out.extend(self.nib.encode(nib));

        // Mean-pool the engraving block; a pen without engravings
        // contributes zeros so the slot layout stays fixed
        let mut pooled = vec![0.0f32; self.engraving.width()];
        if !pen.engraving_ids.is_empty() {
            for &engraving_id in &pen.engraving_ids {
                let engraving =
                    catalog
                        .engraving(engraving_id)
                        .ok_or(CatalogError::DanglingReference {
                            table: "engravings",
                            component_id: engraving_id,
                            pen_id: pen.id,
                        })?;
                for (slot, v) in pooled.iter_mut().zip(self.engraving.encode(engraving)) {
                    *slot += v;
                }
            }
            let n = pen.engraving_ids.len() as f32;
            for slot in pooled.iter_mut() {
                *slot /= n;
            }
        }
        out.extend(pooled);

        out.push(self.price.scale(pen.price));
        out.push(self.weight.scale(pen.weight_g));
        Ok(out)
    }

    /// Encode every pen in the catalog, rows ordered by ascending pen id
    pub fn encode_all(&self, catalog: &CatalogIndex) -> Result<PenFeatureMatrix> {
        let pens: Vec<&Pen> = catalog.pens().collect();
        let rows: Vec<Vec<f32>> = pens
            .par_iter()
            .map(|pen| self.encode_pen(pen, catalog))
            .collect::<Result<Vec<_>>>()?;

        let pen_ids: Vec<PenId> = pens.iter().map(|p| p.id).collect();
        let row_of: HashMap<PenId, usize> =
            pen_ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();

        let mut features = Array2::zeros((pen_ids.len(), self.dim));
        for (i, row) in rows.into_iter().enumerate() {
            for (j, v) in row.into_iter().enumerate() {
                features[[i, j]] = v;
            }
        }

        Ok(PenFeatureMatrix {
            pen_ids,
            row_of,
            features,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog::SyntheticCatalog;

    #[test]
    fn test_vocabulary_unknown_bucket() {
        let vocab = Vocabulary::fit(["blue", "black", "blue"].into_iter());
        assert_eq!(vocab.width(), 3);
        assert_eq!(vocab.index_of("never-seen"), 0);
        assert_ne!(vocab.index_of("blue"), 0);
        assert_ne!(vocab.index_of("blue"), vocab.index_of("black"));
    }

    #[test]
    fn test_vocabulary_layout_is_sorted() {
        // "black" < "blue" lexicographically, regardless of fit order
        let a = Vocabulary::fit(["blue", "black"].into_iter());
        let b = Vocabulary::fit(["black", "blue"].into_iter());
        assert_eq!(a.index_of("black"), b.index_of("black"));
        assert_eq!(a.index_of("blue"), b.index_of("blue"));
    }

    #[test]
    fn test_scaler_range_and_nan_imputation() {
        let scaler = NumericScaler::fit([10.0, 20.0, 30.0].into_iter());
        assert_eq!(scaler.scale(10.0), 0.0);
        assert_eq!(scaler.scale(30.0), 1.0);
        assert!((scaler.scale(20.0) - 0.5).abs() < 1e-6);
        // Out-of-range values clamp, NaN imputes to zero
        assert_eq!(scaler.scale(1000.0), 1.0);
        assert_eq!(scaler.scale(f32::NAN), 0.0);
    }

    #[test]
    fn test_scaler_constant_column() {
        let scaler = NumericScaler::fit([5.0, 5.0].into_iter());
        assert_eq!(scaler.scale(5.0), 0.0);
    }

    #[test]
    fn test_encoder_is_deterministic() {
        let catalog = SyntheticCatalog::new(11).generate().unwrap();
        let encoder = PenEncoder::fit(&catalog).unwrap();

        let a = encoder.encode_all(&catalog).unwrap();
        let b = encoder.encode_all(&catalog).unwrap();
        assert_eq!(a.pen_ids, b.pen_ids);
        assert_eq!(a.features, b.features);
    }

    #[test]
    fn test_feature_dim_is_fixed() {
        let catalog = SyntheticCatalog::new(11).generate().unwrap();
        let encoder = PenEncoder::fit(&catalog).unwrap();
        let matrix = encoder.encode_all(&catalog).unwrap();
        assert_eq!(matrix.features.ncols(), encoder.feature_dim());
        assert_eq!(matrix.features.nrows(), catalog.counts().0);
    }

    #[test]
    fn test_encode_pen_dangling_reference_fails() {
        let catalog = SyntheticCatalog::new(11).generate().unwrap();
        let encoder = PenEncoder::fit(&catalog).unwrap();

        let mut pen = catalog.pen(1).unwrap().clone();
        pen.ink_id = 9999;
        let err = encoder.encode_pen(&pen, &catalog).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::DanglingReference {
                table: "ink_configs",
                ..
            }
        ));
    }

    #[test]
    fn test_rows_ordered_by_pen_id() {
        let catalog = SyntheticCatalog::new(11).generate().unwrap();
        let encoder = PenEncoder::fit(&catalog).unwrap();
        let matrix = encoder.encode_all(&catalog).unwrap();

        let mut sorted = matrix.pen_ids.clone();
        sorted.sort_unstable();
        assert_eq!(matrix.pen_ids, sorted);
        for (i, &pen_id) in matrix.pen_ids.iter().enumerate() {
            assert_eq!(matrix.row_index(pen_id), Some(i));
        }
    }
}
