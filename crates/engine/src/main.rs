//! Serving harness.
//!
//! Builds the engine against a synthetic catalog and drives a sample
//! session end to end (recommend, suggest, retrain, recommend again),
//! mirroring the calls a transport layer would make.

use anyhow::Result;
use engine::{EngineConfig, PenIntelligence, SyntheticProvider};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("building pen intelligence engine");
    let service = PenIntelligence::new(
        Arc::new(SyntheticProvider::new(42)),
        EngineConfig::default(),
    )?;

    let user_id = 17;
    let visited = [1, 7, 23];

    let ranked = service.recommend(user_id, &visited, 3)?;
    for rec in &ranked {
        info!(pen_id = rec.pen_id, score = rec.score, "recommended");
    }

    let design = service.suggest_design(user_id)?;
    info!(
        material = %design.material.name,
        nib = %design.nib.size,
        template = %design.template.name,
        estimated_price = design.estimated_price,
        engravings = design.engravings.len(),
        "suggested design"
    );

    let outcome = service.retrain_recommender().await;
    info!(status = ?outcome.status, message = %outcome.message, "retrain finished");

    let ranked = service.recommend(user_id, &visited, 3)?;
    for rec in &ranked {
        info!(pen_id = rec.pen_id, score = rec.score, "recommended after retrain");
    }

    Ok(())
}
