//! Engram CLI - command line front end for the cognition engine
//!
//! Usage:
//!   engram remember "content" --schema a,b,c   Store an experience
//!   engram recall <words..>                    Recall from explicit centers
//!   engram recall --text "free text"           Recall from the best-connected token
//!   engram prime                               Recall from the graph's hubs
//!   engram edges <word>                        Show ranked out-edges of a concept
//!   engram stats                               Show statistics

use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use engram::{
    CognitionSystem, EngineConfig, Engram, EngramType, Mind, RecallMode, RecallQuery,
};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "engram")]
#[command(about = "Engram - Associative memory for AI agents")]
#[command(version)]
struct Cli {
    /// Path to data directory
    #[arg(short, long, env = "ENGRAM_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// JSON engine config; --data-dir overrides its data_dir
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Recall mode
    #[arg(short, long, value_enum)]
    mode: Option<CliMode>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store an experience and link its concepts
    Remember {
        /// Experience content
        content: String,

        /// Ordered concept words, comma separated
        #[arg(short, long, value_delimiter = ',', required = true)]
        schema: Vec<String>,

        /// Engram type
        #[arg(short = 't', long = "type", value_enum, default_value = "atomic")]
        engram_type: CliEngramType,

        /// Strength (0.0-1.0)
        #[arg(long)]
        strength: Option<f32>,
    },

    /// Recall memories related to the given concepts
    Recall {
        /// Center words
        words: Vec<String>,

        /// Free-text query instead of explicit centers
        #[arg(long, conflicts_with = "words")]
        text: Option<String>,

        /// Maximum results
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Recall without a query, starting from the strongest hubs
    Prime {
        /// Maximum results
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a concept's out-edges ranked by the weight strategy
    Edges {
        word: String,
    },

    /// Get statistics
    Stats,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum CliEngramType {
    Atomic,
    Link,
    Pattern,
}

impl From<CliEngramType> for EngramType {
    fn from(cli: CliEngramType) -> Self {
        match cli {
            CliEngramType::Atomic => EngramType::Atomic,
            CliEngramType::Link => EngramType::Link,
            CliEngramType::Pattern => EngramType::Pattern,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum CliMode {
    Creative,
    Balanced,
    Focused,
}

impl From<CliMode> for RecallMode {
    fn from(cli: CliMode) -> Self {
        match cli {
            CliMode::Creative => RecallMode::Creative,
            CliMode::Balanced => RecallMode::Balanced,
            CliMode::Focused => RecallMode::Focused,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "info,engram=debug"
    } else {
        "warn"
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = load_config(&cli)?;
    let system = CognitionSystem::with_config(config).await?;

    let result = match cli.command {
        Commands::Remember {
            content,
            schema,
            engram_type,
            strength,
        } => cmd_remember(&system, content, schema, engram_type, strength).await,
        Commands::Recall {
            words,
            text,
            limit,
            json,
        } => {
            let query = match text {
                Some(text) => RecallQuery::Text(text),
                None => RecallQuery::Words(words),
            };
            cmd_recall(&system, query, limit, json).await
        }
        Commands::Prime { limit, json } => cmd_recall(&system, RecallQuery::Prime, limit, json).await,
        Commands::Edges { word } => cmd_edges(&system, word).await,
        Commands::Stats => cmd_stats(&system).await,
    };

    system.close().await?;
    result
}

fn load_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(mode) = cli.mode {
        config.recall.mode = mode.into();
    }
    Ok(config)
}

async fn cmd_remember(
    system: &CognitionSystem,
    content: String,
    schema: Vec<String>,
    engram_type: CliEngramType,
    strength: Option<f32>,
) -> anyhow::Result<()> {
    let mut engram = Engram::new(content, schema, engram_type.into());
    if let Some(s) = strength {
        engram = engram.with_strength(s);
    }

    let outcome = system.remember(engram).await?;

    println!("{}", "Engram remembered".green().bold());
    println!("  ID: {}", outcome.engram_id.cyan());
    for update in &outcome.cue_updates {
        println!(
            "  {} {} {} ({})",
            update.from,
            "->".dimmed(),
            update.to,
            format!("{:.4e}", update.weight).dimmed()
        );
    }
    if !outcome.stored {
        println!("{}", "  (already stored; graph unchanged)".yellow());
    }
    Ok(())
}

async fn cmd_recall(
    system: &CognitionSystem,
    query: RecallQuery,
    limit: Option<usize>,
    json: bool,
) -> anyhow::Result<()> {
    let mut options = system.config().recall.clone();
    if let Some(limit) = limit {
        options = options.with_total_limit(limit);
    }

    let Some(mind) = system.recall_with(query, &options).await? else {
        println!("{}", "Nothing to recall from".yellow());
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&mind)?);
        return Ok(());
    }
    print_mind(&mind);
    Ok(())
}

fn print_mind(mind: &Mind) {
    println!(
        "{} {}",
        "Centers:".bold(),
        mind.centers.join(", ").cyan()
    );
    println!(
        "Activated {} concepts in {} cycles",
        mind.activation_count(),
        mind.cycles
    );
    for (word, depth) in mind.activated_by_depth() {
        println!("  {}{}", "  ".repeat(depth.saturating_sub(1) as usize), word);
    }

    if mind.engrams.is_empty() {
        println!("{}", "No engrams found".yellow());
        return;
    }

    println!();
    println!(
        "{}",
        format!("Recalled {} engrams:", mind.engrams.len()).bold().green()
    );
    for (i, ranked) in mind.engrams.iter().enumerate() {
        let engram = &ranked.engram;
        let weight_color = if ranked.weight >= 1.0 {
            "green"
        } else if ranked.weight >= 0.7 {
            "yellow"
        } else {
            "red"
        };
        println!(
            "{}. {} ({} - via {} - weight: {})",
            i + 1,
            engram.content.chars().take(60).collect::<String>(),
            engram.engram_type.to_string().cyan(),
            ranked.activated_by.dimmed(),
            format!("{:.3}", ranked.weight).color(weight_color)
        );
    }
}

async fn cmd_edges(system: &CognitionSystem, word: String) -> anyhow::Result<()> {
    let ranked = system.rank_edges(&word).await;
    if ranked.is_empty() {
        println!("{}", format!("No edges from '{}'", word).yellow());
        return Ok(());
    }

    println!("{}", format!("Edges from '{}':", word).bold().green());
    for edge in ranked {
        println!(
            "  {:<24} {:>6.1}%  {}",
            edge.target,
            edge.probability * 100.0,
            format!("w={:.4e}", edge.weight).dimmed()
        );
    }
    Ok(())
}

async fn cmd_stats(system: &CognitionSystem) -> anyhow::Result<()> {
    let stats = system.stats().await?;

    println!("{}", "Engram Statistics".bold().green());
    println!();
    println!("Network:");
    println!("  Cues: {}", stats.network.cues.to_string().cyan());
    println!("  Edges: {}", stats.network.edges.to_string().cyan());
    println!("  Max out-degree: {}", stats.network.max_out_degree);
    println!();
    println!("Store:");
    println!("  Engrams: {}", stats.store.total.to_string().cyan());
    for (engram_type, count) in &stats.store.by_type {
        println!("  {}: {}", engram_type, count);
    }
    Ok(())
}
