use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hunter_core::{
    load_config, validate_config, EpisodeRef, History, JackettProvider, MemoryEpisodeStore,
    PackedStatus, Quality, QualityProfile, SanitizedConfig, SceneChecker, SearchConfig,
    SearchEngine, SearchOptions, Show, Snatcher, SqliteHistory, Status,
};

#[derive(Parser)]
#[command(name = "hunter", version, about = "Search, rank and snatch TV episodes")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, env = "HUNTER_CONFIG", default_value = "hunter.toml", global = true)]
    config: PathBuf,

    /// Log as JSON lines.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Look a release up in the scene reputation services.
    CheckScene { release: String },

    /// Search the configured providers for episodes of one show.
    Search {
        #[arg(long)]
        show_id: u64,
        #[arg(long)]
        name: String,
        #[arg(long)]
        season: u32,
        #[arg(long = "episode", required = true)]
        episodes: Vec<u32>,
        #[arg(long = "quality-any", value_parser = parse_quality, default_values = ["hdtv", "hd_web_dl"])]
        quality_any: Vec<Quality>,
        #[arg(long = "quality-best", value_parser = parse_quality)]
        quality_best: Vec<Quality>,
        #[arg(long)]
        anime: bool,
        /// Send the winners to the configured download clients.
        #[arg(long)]
        snatch: bool,
    },

    /// Print the effective configuration with secrets redacted.
    ShowConfig,
}

fn parse_quality(s: &str) -> Result<Quality, String> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|_| format!("unknown quality: {}", s))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.json);

    if let Err(e) = run(cli).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn load(path: &Path) -> Result<SearchConfig> {
    info!("Loading configuration from {:?}", path);
    let config =
        load_config(path).with_context(|| format!("Failed to load config from {:?}", path))?;
    validate_config(&config).context("Configuration validation failed")?;
    Ok(config)
}

async fn run(cli: Cli) -> Result<()> {
    let config = load(&cli.config)?;

    match cli.command {
        Command::ShowConfig => {
            let sanitized = SanitizedConfig::from(&config);
            println!("{}", serde_json::to_string_pretty(&sanitized)?);
        }
        Command::CheckScene { release } => {
            let checker = SceneChecker::from_config(&config.reputation)
                .context("Failed to create reputation clients")?;
            let status = checker.check(&release).await;
            if status.reason().is_empty() {
                println!("{}: {}", release, status.label());
            } else {
                println!("{}: {} ({})", release, status.label(), status.reason());
            }
        }
        Command::Search {
            show_id,
            name,
            season,
            episodes,
            quality_any,
            quality_best,
            anime,
            snatch,
        } => {
            let mut show = Show::new(show_id, name, QualityProfile::new(quality_any, quality_best));
            show.is_anime = anime;
            let episodes: Vec<EpisodeRef> = episodes
                .into_iter()
                .map(|e| EpisodeRef::new(show_id, season, e))
                .collect();
            search(config, show, episodes, snatch).await?;
        }
    }
    Ok(())
}

async fn search(config: SearchConfig, show: Show, episodes: Vec<EpisodeRef>, snatch: bool) -> Result<()> {
    let config = Arc::new(config);

    let Some(jackett) = config.jackett.as_ref() else {
        bail!("No [jackett] section configured");
    };
    let providers = JackettProvider::from_config(jackett).context("Failed to create providers")?;
    info!("Searching {} provider(s)", providers.len());

    let store = Arc::new(MemoryEpisodeStore::new());
    store.add_show(show.clone())?;
    for ep in &episodes {
        store.add_episode(*ep, PackedStatus::compose(Status::Wanted, Quality::None), None)?;
    }

    let history: Arc<dyn History> = Arc::new(
        SqliteHistory::new(&config.database.path).context("Failed to open history database")?,
    );

    let mut engine = SearchEngine::new(
        Arc::clone(&config),
        providers,
        store.clone(),
        Arc::clone(&history),
    );
    match SceneChecker::from_config(&config.reputation) {
        Ok(checker) => engine = engine.with_scene(Arc::new(checker)),
        Err(e) => warn!("Scene checks disabled: {}", e),
    }

    let opts = SearchOptions {
        manual: true,
        ..SearchOptions::default()
    };
    let mut winners = engine.search_providers(&show, &episodes, &opts).await;
    if winners.is_empty() {
        println!("No results");
        return Ok(());
    }

    for result in &winners {
        let covered: Vec<String> = result.episodes.iter().map(|ep| ep.to_string()).collect();
        println!(
            "{}\t{}\t{}\t{}",
            covered.join(","),
            result.quality,
            result.provider_id(),
            result.name
        );
    }

    if snatch {
        let snatcher = Snatcher::from_config(Arc::clone(&config), store, history)
            .context("Failed to create download clients")?;
        for result in &mut winners {
            if snatcher.snatch(result).await {
                println!("Snatched {}", result.name);
            } else {
                println!("Failed to snatch {}", result.name);
            }
        }
    }
    Ok(())
}
