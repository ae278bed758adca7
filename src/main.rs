//! valuetrack - oracle tracker runner
//!
//! Builds the configured trackers, runs one cycle of each against the
//! configured data sources, and prints the value every pre-specified
//! request would currently report.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Configuration or runtime error

use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use valuetrack::cli::{Args, OutputFormat};
use valuetrack::config::{Config, DEFAULT_CONFIG_FILE};
use valuetrack::store::MemoryStore;
use valuetrack::tracker::{self, HttpFetcher, StaticChainSource, TrackerContext};
use valuetrack::report;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("valuetrack v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(args).await {
        error!("Run failed: {:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .valuetrack.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!("{} already exists. Remove it first or edit it manually.", DEFAULT_CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("Created {} with default settings.", DEFAULT_CONFIG_FILE);
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level())
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Build the trackers, run one cycle and print the value report.
async fn run(args: Args) -> Result<()> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate()?;

    let trackers = tracker::build_trackers(&config.general.trackers, &config)?;
    info!(
        "Built {} tracker(s) from {:?}",
        trackers.len(),
        config.general.trackers
    );

    if args.dry_run {
        for t in &trackers {
            println!("{}", t.name());
        }
        return Ok(());
    }

    let store = Arc::new(MemoryStore::new());
    let fetcher = Arc::new(HttpFetcher::new(config.fetch_timeout())?);
    let mut ctx = TrackerContext::new(store.clone(), fetcher);

    if let Some(ref path) = args.chain_snapshot {
        let chain = StaticChainSource::load(path)?;
        ctx = ctx.with_chain(Arc::new(chain));
    }

    let outcomes = tracker::run_cycle(&trackers, &ctx).await;
    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    if failed > 0 {
        warn!("{} of {} trackers failed", failed, outcomes.len());
    }

    let requests = config.prespecified_requests();
    let reports = report::collect_reports(&requests, store.as_ref(), Utc::now());

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&reports)?,
        OutputFormat::Text => report::generate_text_report(&reports),
    };
    print!("{}", output);

    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default()? {
        Some(config) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        None => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
    }
}
