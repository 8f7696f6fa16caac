//! CLI entry point for the verse search engine.
//!
//! Provides commands for building the index and querying it by similarity,
//! topic cluster and entity centrality.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use shahnameh::display::{
    THEME, Theme, create_build_table, create_cluster_table, create_entity_table, create_hits_table,
    with_spinner,
};
use shahnameh::embedding::FastEmbedEncoder;
use shahnameh::{EngineError, SearchContext, Settings, Strategy, TextEncoder};

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Multi-signal verse search
#[derive(Parser)]
#[command(
    name = "shahnameh",
    version = env!("CARGO_PKG_VERSION"),
    about = "Search the Shahnameh by meaning, topic and characters",
    long_about = "Build sharded embeddings, topic clusters and entity graphs over a labeled verse corpus, then query them.",
    next_line_help = true,
    styles = clap_cargo_style()
)]
struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
enum Commands {
    /// Initialize project
    #[command(about = "Set up .shahnameh directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show current configuration settings
    #[command(about = "Display active settings")]
    Config,

    /// Build every index that is missing or stale
    #[command(about = "Build shards, the cluster model and entity graphs")]
    Build {
        /// Number of threads to use (overrides config)
        #[arg(short, long)]
        threads: Option<usize>,

        /// Output the build report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Similarity search under one strategy
    #[command(
        after_help = "Examples:\n  shahnameh search \"رستم و سهراب\"\n  shahnameh search \"رستم و سهراب\" --method sentence --limit 5 --json"
    )]
    Search {
        query: String,

        /// lexical, boolean, word-vector or sentence
        #[arg(short, long, default_value = "lexical")]
        method: Strategy,

        #[arg(short, long, default_value_t = 10)]
        limit: usize,

        #[arg(long)]
        json: bool,
    },

    /// Topic cluster of a query
    Cluster {
        query: String,

        #[arg(long)]
        json: bool,
    },

    /// Characters and places a query mentions, with their centrality
    Entities {
        query: String,

        #[arg(long)]
        json: bool,
    },

    /// Every signal at once
    Retrieve {
        query: String,

        #[arg(short, long, default_value_t = 10)]
        limit: usize,

        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Serialize)]
struct ErrorOutput {
    status: String,
    error: String,
    suggestions: Vec<&'static str>,
}

fn main() {
    let cli = Cli::parse();
    let json = matches!(
        cli.command,
        Commands::Build { json: true, .. }
            | Commands::Search { json: true, .. }
            | Commands::Cluster { json: true, .. }
            | Commands::Entities { json: true, .. }
            | Commands::Retrieve { json: true, .. }
    );

    if let Err(e) = run(cli) {
        report_error(&e, json);
        std::process::exit(1);
    }
}

fn report_error(error: &anyhow::Error, json: bool) {
    let engine = error.downcast_ref::<EngineError>();
    if json {
        let output = ErrorOutput {
            status: engine.map_or_else(|| "GENERAL_ERROR".to_string(), EngineError::status_code),
            error: format!("{error:#}"),
            suggestions: engine.map(EngineError::recovery_suggestions).unwrap_or_default(),
        };
        if let Ok(text) = serde_json::to_string_pretty(&output) {
            println!("{text}");
        }
        return;
    }

    eprintln!("{}", THEME.error_with_icon(&format!("{error:#}")));
    for suggestion in engine.map(EngineError::recovery_suggestions).unwrap_or_default() {
        eprintln!("  {}", THEME.apply(&THEME.dim, suggestion));
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path)
            .map_err(EngineError::from)
            .with_context(|| format!("loading {}", path.display()))?,
        None => Settings::load().map_err(EngineError::from)?,
    };
    settings.debug |= cli.debug;
    init_tracing(settings.debug);

    match cli.command {
        Commands::Init { force } => {
            let path = Settings::init_config_file(force)
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            println!("Edit {} to point at your corpus.", path.display());
            Ok(())
        }

        Commands::Config => {
            println!("Current Configuration:");
            println!("{}", "=".repeat(50));
            println!("{}", toml::to_string_pretty(&settings)?);
            Ok(())
        }

        Commands::Build { threads, json } => {
            if let Some(threads) = threads {
                settings.embeddings.threads = threads;
            }
            let context = open_context(settings, !json)?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(context.build_report())?
                );
                return Ok(());
            }

            println!("{}", create_build_table(context.build_report()));
            if let Some(model) = context.cluster_engine().and_then(|e| e.model()) {
                println!(
                    "{}",
                    THEME.success_with_icon(&format!("Cluster model: {} clusters", model.k()))
                );
            }
            for ranker in context.rankers() {
                println!(
                    "{}",
                    THEME.success_with_icon(&format!(
                        "{}: {} entities, {} links",
                        ranker.category(),
                        ranker.len(),
                        ranker.link_count()
                    ))
                );
            }
            for (strategy, reason) in context.unavailable_strategies() {
                println!("{}", THEME.warning_with_icon(&format!("{strategy}: {reason}")));
            }
            Ok(())
        }

        Commands::Search {
            query,
            method,
            limit,
            json,
        } => {
            let context = open_context(settings, false)?;
            let hits = context.search(&query, method, limit)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else if hits.is_empty() {
                println!("{}", THEME.warning_with_icon("No results"));
            } else {
                println!("{}", create_hits_table(&hits));
            }
            Ok(())
        }

        Commands::Cluster { query, json } => {
            let context = open_context(settings, false)?;
            let prediction = context.predict_cluster(&query)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&prediction)?);
                return Ok(());
            }
            match prediction {
                Some(prediction) => println!("{}", create_cluster_table(&prediction)),
                None => println!("{}", THEME.warning_with_icon("The corpus is empty")),
            }
            Ok(())
        }

        Commands::Entities { query, json } => {
            let context = open_context(settings, false)?;
            let entities = context.entity_ranks(&query);
            if json {
                println!("{}", serde_json::to_string_pretty(&entities)?);
            } else if entities.is_empty() {
                println!("{}", THEME.warning_with_icon("No known entity in the query"));
            } else {
                println!("{}", create_entity_table(&entities));
            }
            Ok(())
        }

        Commands::Retrieve { query, limit, json } => {
            let context = open_context(settings, false)?;
            let response = context.retrieve(&query, limit)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
                return Ok(());
            }

            for results in &response.results {
                println!("{}", THEME.apply(&THEME.header, results.strategy));
                println!("{}", create_hits_table(&results.hits));
            }
            for missing in &response.unavailable {
                println!(
                    "{}",
                    THEME.warning_with_icon(&format!("{}: {}", missing.strategy, missing.reason))
                );
            }
            if let Some(cluster) = &response.cluster {
                println!("{}", THEME.apply(&THEME.header, "cluster"));
                println!("{}", create_cluster_table(cluster));
            }
            if let Some(reason) = &response.cluster_unavailable {
                println!("{}", THEME.warning_with_icon(&format!("cluster: {reason}")));
            }
            if !response.entities.is_empty() {
                println!("{}", THEME.apply(&THEME.header, "entities"));
                println!("{}", create_entity_table(&response.entities));
            }
            Ok(())
        }
    }
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Sizes the worker pool, loads the sentence model when something needs
/// it, and runs every offline build.
fn open_context(settings: Settings, show_progress: bool) -> Result<SearchContext> {
    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(settings.embeddings.threads.max(1))
        .build_global()
    {
        tracing::debug!("Worker pool already configured: {e}");
    }

    let needs_sentence =
        settings.embeddings.is_enabled(Strategy::Sentence) || settings.clustering.enabled;
    let encoder: Option<Arc<dyn TextEncoder>> = if needs_sentence {
        let load = || {
            FastEmbedEncoder::new(
                &settings.embeddings.model,
                &settings.model_cache_dir(),
                settings.embeddings.neural_batch_size,
            )
        };
        let loaded = if show_progress && !Theme::should_disable_colors() {
            with_spinner("Loading sentence model", load)
        } else {
            load()
        };
        match loaded {
            Ok(encoder) => Some(Arc::new(encoder) as Arc<dyn TextEncoder>),
            Err(e) => {
                tracing::warn!("Sentence model unavailable: {e}");
                None
            }
        }
    } else {
        None
    };

    let mut builder = SearchContext::builder(settings).show_progress(show_progress);
    if let Some(encoder) = encoder {
        builder = builder.sentence_encoder(encoder);
    }
    Ok(builder.build()?)
}
