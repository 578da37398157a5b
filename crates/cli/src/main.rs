use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use engine::{EngineConfig, PenIntelligence, RetrainStatus, SyntheticProvider};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// pen-intel - Pen Recommendation and Design Suggestion Engine
#[derive(Parser)]
#[command(name = "pen-intel")]
#[command(about = "Pen recommendation engine with hybrid scoring and design suggestion", long_about = None)]
struct Cli {
    /// Seed for the synthetic catalog
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Directory for persisted model artifacts
    #[arg(long, default_value = "model-store")]
    store_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Get pen recommendations for a user
    Recommend {
        /// User ID to recommend for
        #[arg(long)]
        user_id: u32,

        /// Recently visited pen ids, most recent first (comma separated)
        #[arg(long, value_delimiter = ',')]
        visited: Vec<u32>,

        /// Number of recommendations to return
        #[arg(long, default_value = "3")]
        top_n: usize,
    },

    /// Suggest a custom pen design for a user
    Suggest {
        /// User ID to suggest for
        #[arg(long)]
        user_id: u32,
    },

    /// Retrain a model and swap in the new snapshot
    Retrain {
        /// Which model to retrain
        #[arg(long, value_enum)]
        target: RetrainTarget,
    },

    /// Show catalog table sizes and the most popular pens
    Catalog,
}

#[derive(Clone, Copy, ValueEnum)]
enum RetrainTarget {
    Recommender,
    Designer,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    // Build the engine (trains or loads models, may take a moment)
    println!("Building engine from synthetic catalog (seed {})...", cli.seed);
    let start = Instant::now();
    let config = EngineConfig {
        store_dir: cli.store_dir,
        ..EngineConfig::default()
    };
    let service = PenIntelligence::new(Arc::new(SyntheticProvider::new(cli.seed)), config)?;
    println!("{} Engine ready in {:?}", "✓".green(), start.elapsed());

    // Dispatch to appropriate command handler
    match cli.command {
        Commands::Recommend {
            user_id,
            visited,
            top_n,
        } => handle_recommend(&service, user_id, &visited, top_n)?,
        Commands::Suggest { user_id } => handle_suggest(&service, user_id)?,
        Commands::Retrain { target } => handle_retrain(&service, target).await,
        Commands::Catalog => handle_catalog(&service),
    }

    Ok(())
}

/// Handle the 'recommend' command
fn handle_recommend(
    service: &PenIntelligence,
    user_id: u32,
    visited: &[u32],
    top_n: usize,
) -> Result<()> {
    let start = Instant::now();
    let ranked = service.recommend(user_id, visited, top_n)?;
    let elapsed = start.elapsed();

    println!(
        "\n{} for user {} ({} visited, {:?})",
        "Recommendations".bold().underline(),
        user_id,
        visited.len(),
        elapsed
    );
    if ranked.is_empty() {
        println!("  {}", "no candidates".yellow());
    }
    for (rank, rec) in ranked.iter().enumerate() {
        println!(
            "  {}. pen {:>3}  score {:.4}",
            rank + 1,
            rec.pen_id.to_string().cyan(),
            rec.score
        );
    }
    Ok(())
}

/// Handle the 'suggest' command
fn handle_suggest(service: &PenIntelligence, user_id: u32) -> Result<()> {
    let design = service.suggest_design(user_id)?;

    println!(
        "\n{} for user {}",
        "Suggested design".bold().underline(),
        user_id
    );
    println!(
        "  material:  {} ({}, {})",
        design.material.name.cyan(),
        design.material.kind,
        design.material.finish
    );
    println!(
        "  ink:       {} / {} sheen",
        design.ink.color_family.cyan(),
        design.ink.sheen
    );
    println!(
        "  barrel:    {} ({:.1}mm x {:.0}mm)",
        design.barrel.shape.cyan(),
        design.barrel.diameter_mm,
        design.barrel.length_mm
    );
    println!(
        "  cap:       {} closure, {} band",
        design.cap.closure.cyan(),
        design.cap.band_style
    );
    println!(
        "  nib:       {} {} ({})",
        design.nib.size.cyan(),
        design.nib.grind,
        design.nib.flexibility
    );
    println!(
        "  coating:   {} ({} gloss)",
        design.coating.kind.cyan(),
        design.coating.gloss
    );
    println!(
        "  template:  {} ({})",
        design.template.name.cyan(),
        design.template.silhouette
    );
    if design.engravings.is_empty() {
        println!("  engraving: none");
    } else {
        for engraving in &design.engravings {
            println!(
                "  engraving: {} ({:.2}mm)",
                engraving.style.cyan(),
                engraving.depth_mm
            );
        }
    }
    println!(
        "  estimated price: {}",
        format!("{:.2}", design.estimated_price).bold()
    );
    Ok(())
}

/// Handle the 'retrain' command
async fn handle_retrain(service: &PenIntelligence, target: RetrainTarget) {
    let start = Instant::now();
    let outcome = match target {
        RetrainTarget::Recommender => service.retrain_recommender().await,
        RetrainTarget::Designer => service.retrain_designer().await,
    };
    match outcome.status {
        RetrainStatus::Completed => println!(
            "{} {} ({:?})",
            "✓".green(),
            outcome.message,
            start.elapsed()
        ),
        RetrainStatus::Failed => println!("{} {}", "✗".red(), outcome.message),
    }
}

/// Handle the 'catalog' command
fn handle_catalog(service: &PenIntelligence) {
    let snapshot = service.current_snapshot();
    let catalog = &snapshot.catalog;
    let (pens, users, interactions) = catalog.counts();

    println!("\n{}", "Catalog".bold().underline());
    println!("  pens: {pens}  users: {users}  interactions: {interactions}");
    println!(
        "  materials: {}  inks: {}  barrels: {}  caps: {}  nibs: {}",
        catalog.materials().count(),
        catalog.inks().count(),
        catalog.barrels().count(),
        catalog.caps().count(),
        catalog.nibs().count()
    );
    println!(
        "  coatings: {}  engravings: {}  templates: {}",
        catalog.coatings().count(),
        catalog.engravings().count(),
        catalog.templates().count()
    );
    println!("  fingerprint: {:#018x}", catalog.fingerprint());

    println!("\n{}", "Most popular pens".bold());
    for (pen_id, score) in catalog.popularity_ranking().into_iter().take(5) {
        println!(
            "  pen {:>3}  popularity {:.3}",
            pen_id.to_string().cyan(),
            score
        );
    }
}
