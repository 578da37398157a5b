//! Immutable serving snapshot.
//!
//! Everything a request touches (catalog, similarity index, CF model,
//! design suggester) is built together and published as one `Arc`. A
//! request clones the Arc once and sees a single consistent state for its
//! whole lifetime; retraining builds a complete replacement and swaps it
//! in, it never mutates the snapshot a reader holds.

use catalog::CatalogIndex;
use features::{PenEncoder, SimilarityMatrix};
use models::{CfConfig, CfModel, DesignSuggester, DesignerConfig};
use tracing::info;

/// One consistent generation of serving state.
#[derive(Debug)]
pub struct EngineSnapshot {
    pub catalog: CatalogIndex,
    pub similarity: SimilarityMatrix,
    pub cf: CfModel,
    pub suggester: DesignSuggester,
    /// Monotonic generation counter, bumped on every successful retrain
    pub epoch: u64,
}

impl EngineSnapshot {
    /// Build a full snapshot from a catalog, training both models.
    pub fn build(
        catalog: CatalogIndex,
        cf_config: &CfConfig,
        designer_config: &DesignerConfig,
        epoch: u64,
    ) -> models::Result<Self> {
        let cf = CfModel::train(&catalog, cf_config)?;
        Self::assemble(catalog, cf, designer_config, epoch)
    }

    /// Build a snapshot around an already-trained CF model, used when a
    /// persisted artifact for this exact catalog was loaded at startup.
    pub fn assemble(
        catalog: CatalogIndex,
        cf: CfModel,
        designer_config: &DesignerConfig,
        epoch: u64,
    ) -> models::Result<Self> {
        let encoder = PenEncoder::fit(&catalog)?;
        let pen_features = encoder.encode_all(&catalog)?;
        let similarity = SimilarityMatrix::compute(&pen_features);
        let suggester = DesignSuggester::prepare(&catalog, designer_config)?;

        let (pens, users, interactions) = catalog.counts();
        info!(epoch, pens, users, interactions, "assembled engine snapshot");

        Ok(Self {
            catalog,
            similarity,
            cf,
            suggester,
            epoch,
        })
    }
}
