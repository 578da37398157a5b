//! The `PenIntelligence` service facade.
//!
//! Owns the serving snapshot, the model store, and the retrain discipline:
//! requests read an `Arc<EngineSnapshot>` out of a `RwLock` (one clone,
//! consistent for the request's lifetime), retrains build a complete new
//! snapshot on the blocking pool and swap it in atomically. Per-model
//! mutexes serialize concurrent retrains of the same model; a failed
//! retrain leaves the previous snapshot serving untouched.

use crate::scorer::{self, HybridConfig, Recommendation};
use crate::snapshot::EngineSnapshot;
use anyhow::{Context, Result};
use catalog::{CatalogIndex, PenId, SyntheticCatalog, UserId};
use models::{CfConfig, CfModel, DesignSuggestion, DesignerConfig, ModelStore};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::{info, warn};

const CF_ARTIFACT: &str = "cf-model";

/// Source of catalog data for initial build and retrains.
pub trait CatalogProvider: Send + Sync + 'static {
    fn fresh_catalog(&self) -> catalog::Result<CatalogIndex>;
}

/// Provider backed by the synthetic generator. Each call advances the
/// seed so a retrain sees fresh interactions, the way the upstream feed
/// would have moved on.
pub struct SyntheticProvider {
    base_seed: u64,
    generation: AtomicU64,
}

impl SyntheticProvider {
    pub fn new(base_seed: u64) -> Self {
        Self {
            base_seed,
            generation: AtomicU64::new(0),
        }
    }
}

impl CatalogProvider for SyntheticProvider {
    fn fresh_catalog(&self) -> catalog::Result<CatalogIndex> {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        SyntheticCatalog::new(self.base_seed.wrapping_add(generation)).generate()
    }
}

/// Engine-wide configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub cf: CfConfig,
    pub designer: DesignerConfig,
    pub hybrid: HybridConfig,
    /// Directory for persisted model artifacts
    pub store_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cf: CfConfig::default(),
            designer: DesignerConfig::default(),
            hybrid: HybridConfig::default(),
            store_dir: PathBuf::from("model-store"),
        }
    }
}

/// Outcome of a retrain request
#[derive(Debug, Clone, Serialize)]
pub struct RetrainOutcome {
    pub status: RetrainStatus,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RetrainStatus {
    Completed,
    Failed,
}

/// Main service handle. Cheap to share behind an `Arc`.
pub struct PenIntelligence {
    snapshot: RwLock<Arc<EngineSnapshot>>,
    recommender_guard: Mutex<()>,
    designer_guard: Mutex<()>,
    store: ModelStore,
    provider: Arc<dyn CatalogProvider>,
    config: EngineConfig,
    epoch: AtomicU64,
}

impl PenIntelligence {
    /// Build the initial snapshot.
    ///
    /// A persisted CF artifact matching the catalog fingerprint is reused;
    /// anything else (missing, stale, corrupt, shape-mismatched) falls back
    /// to training from scratch and re-persisting.
    pub fn new(provider: Arc<dyn CatalogProvider>, config: EngineConfig) -> Result<Self> {
        let store = ModelStore::new(&config.store_dir);
        let catalog = provider
            .fresh_catalog()
            .context("building initial catalog")?;
        let fingerprint = catalog.fingerprint();

        let loaded_cf = store
            .load::<CfModel>(CF_ARTIFACT, fingerprint)
            .and_then(|model| {
                model.validate()?;
                Ok(model)
            });
        let snapshot = match loaded_cf {
            Ok(cf) => {
                info!("reusing persisted cf model");
                EngineSnapshot::assemble(catalog, cf, &config.designer, 0)
            }
            Err(err) => {
                info!(%err, "no usable cf artifact, training from scratch");
                let snapshot = EngineSnapshot::build(catalog, &config.cf, &config.designer, 0)?;
                store.save(CF_ARTIFACT, fingerprint, &snapshot.cf)?;
                Ok(snapshot)
            }
        }
        .context("building initial engine snapshot")?;

        Ok(Self {
            snapshot: RwLock::new(Arc::new(snapshot)),
            recommender_guard: Mutex::new(()),
            designer_guard: Mutex::new(()),
            store,
            provider,
            config,
            epoch: AtomicU64::new(0),
        })
    }

    /// Current serving snapshot; one Arc clone, never a partial state
    pub fn current_snapshot(&self) -> Arc<EngineSnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Hybrid recommendations for a user given recently visited pens
    pub fn recommend(
        &self,
        user_id: UserId,
        visited: &[PenId],
        top_n: usize,
    ) -> Result<Vec<Recommendation>> {
        let snapshot = self.current_snapshot();
        Ok(scorer::recommend(
            &snapshot,
            &self.config.hybrid,
            user_id,
            visited,
            top_n,
        ))
    }

    /// A complete suggested design for a user
    pub fn suggest_design(&self, user_id: UserId) -> Result<DesignSuggestion> {
        let snapshot = self.current_snapshot();
        snapshot
            .suggester
            .suggest(user_id, &snapshot.catalog)
            .with_context(|| format!("suggesting design for user {user_id}"))
    }

    /// Retrain the recommendation side (catalog, similarity, CF).
    pub async fn retrain_recommender(&self) -> RetrainOutcome {
        let _guard = self.recommender_guard.lock().await;
        self.retrain("recommender").await
    }

    /// Retrain the design suggestion side.
    pub async fn retrain_designer(&self) -> RetrainOutcome {
        let _guard = self.designer_guard.lock().await;
        self.retrain("designer").await
    }

    /// Both models train against the same catalog and share one snapshot,
    /// so either retrain rebuilds the whole generation. The caller's guard
    /// serializes same-model retrains; the swap itself is atomic.
    async fn retrain(&self, target: &str) -> RetrainOutcome {
        let provider = Arc::clone(&self.provider);
        let store = self.store.clone();
        let cf_config = self.config.cf;
        let designer_config = self.config.designer;
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;

        let built = tokio::task::spawn_blocking(move || -> Result<EngineSnapshot> {
            let catalog = provider.fresh_catalog().context("building fresh catalog")?;
            let fingerprint = catalog.fingerprint();
            let snapshot = EngineSnapshot::build(catalog, &cf_config, &designer_config, epoch)
                .context("training new snapshot")?;
            store.save(CF_ARTIFACT, fingerprint, &snapshot.cf)?;
            Ok(snapshot)
        })
        .await;

        match built {
            Ok(Ok(snapshot)) => {
                let epoch = snapshot.epoch;
                *self
                    .snapshot
                    .write()
                    .unwrap_or_else(|poisoned| poisoned.into_inner()) = Arc::new(snapshot);
                info!(target, epoch, "retrain complete, snapshot swapped");
                RetrainOutcome {
                    status: RetrainStatus::Completed,
                    message: format!("{target} retrained, serving epoch {epoch}"),
                }
            }
            Ok(Err(err)) => {
                warn!(target, error = %err, "retrain failed, keeping previous snapshot");
                RetrainOutcome {
                    status: RetrainStatus::Failed,
                    message: format!("{target} retrain failed: {err:#}"),
                }
            }
            Err(join_err) => {
                warn!(target, error = %join_err, "retrain task panicked");
                RetrainOutcome {
                    status: RetrainStatus::Failed,
                    message: format!("{target} retrain task failed: {join_err}"),
                }
            }
        }
    }
}
