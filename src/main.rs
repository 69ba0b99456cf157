use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use shulker::app::Config;
use shulker::classify::LineClassifier;
use shulker::ingest::{self, Ingestion};

/// Records queued between the classifier and the relay task
const RELAY_BUFFER: usize = 256;

/// Shulker - relays Minecraft chat from server console output
#[derive(Parser)]
#[command(name = "shulker")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.config/shulker/config.toml)
    #[arg(short, long, env = "SHULKER_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long)]
    log_level: Option<String>,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest console lines and relay chat records (default)
    Run,
    /// Validate the configuration and print the effective settings
    Check,
    /// Classify lines given as arguments (or read from stdin) and print the results
    Classify {
        /// Raw console lines
        lines: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    // ログ初期化
    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    init_logging(level, config.debug, cli.log_file.as_deref())?;

    if cli.config.is_none() {
        match Config::save_default_if_missing() {
            Ok(Some(path)) => info!("Wrote default config to {}", path.display()),
            Ok(None) => {}
            Err(e) => warn!("Failed to save default config: {}", e),
        }
    }

    match cli.command {
        Some(Commands::Check) => check(&config),
        Some(Commands::Classify { lines }) => classify_lines(&config, lines),
        Some(Commands::Run) | None => run(config),
    }
}

fn init_logging(level: &str, debug: bool, log_file: Option<&Path>) -> Result<()> {
    let directives = if debug {
        format!("{},shulker=debug", level)
    } else {
        level.to_string()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

    let file_layer = match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create log file: {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(file),
            )
        }
        None => None,
    };
    let stderr_layer = file_layer
        .is_none()
        .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();

    Ok(())
}

fn run(config: Config) -> Result<()> {
    let patterns = config.patterns().context("Invalid pattern configuration")?;
    let classifier = LineClassifier::new(patterns);

    info!("Shulker starting");

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let (consumer, records) = ingest::channel_consumer(RELAY_BUFFER);
        tokio::spawn(async move {
            if let Err(e) = ingest::write_json_lines(records, tokio::io::stdout()).await {
                tracing::error!("Relay stopped: {}", e);
            }
        });

        let source = ingest::source_from_config(&config)
            .await
            .context("Failed to start line source")?;
        let ingestion = Ingestion::new(classifier, consumer);

        tokio::select! {
            result = ingestion.run(source) => result.context("Line source stopped")?,
            _ = tokio::signal::ctrl_c() => info!("Shutting down"),
        }

        Ok::<_, anyhow::Error>(())
    })
}

fn check(config: &Config) -> Result<()> {
    let patterns = config.patterns().context("Invalid pattern configuration")?;

    if config.is_local_file {
        println!(
            "source:         file {} ({})",
            config.file.path.display(),
            if config.file.use_polling { "polling" } else { "events" }
        );
    } else {
        println!(
            "source:         webhook POST {} on port {}",
            config.webhook.route_path(),
            config.webhook_port()
        );
    }
    println!("server prefix:  {}", patterns.server_prefix());
    println!("chat:           {}", config.patterns.chat);
    println!("show /me:       {}", patterns.show_player_me());
    println!("whitelist:      {}", config.patterns.whitelisted_console);
    println!("server name:    {}", patterns.server_name());
    Ok(())
}

fn classify_lines(config: &Config, lines: Vec<String>) -> Result<()> {
    let classifier = LineClassifier::new(config.patterns().context("Invalid pattern configuration")?);

    let lines = if lines.is_empty() {
        std::io::stdin()
            .lock()
            .lines()
            .collect::<std::io::Result<Vec<_>>>()?
    } else {
        lines
    };

    for line in &lines {
        let record = classifier.classify(line);
        println!("{}", serde_json::to_string(&record)?);
    }
    Ok(())
}
