//! funnelstat - conversion statistics for sales-funnel event exports
//!
//! A CLI tool that loads a table of funnel events, computes conversion
//! rates, hourly distributions and performance counts, and renders them
//! as a Markdown or JSON report.
//!
//! Exit codes:
//!   0 - Success, or no input file selected
//!   1 - Fatal error (file not found, malformed input, bad config, etc.)

mod analysis;
mod cli;
mod config;
mod error;
mod loader;
mod models;
mod report;
mod source;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::Args;
use config::{Config, CONFIG_FILE_NAME};
use loader::LoadOptions;
use models::ReportMetadata;
use source::{FixedPath, PathSupplier, PromptPath};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Where the effective configuration came from.
enum ConfigSource {
    Explicit(PathBuf),
    Default,
    Builtin,
    /// The default file exists but could not be used.
    DefaultUnusable(String),
}

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    let loaded = load_config(&args);

    let verbose = matches!(&loaded, Ok((config, _)) if config.general.verbose);
    init_logging(&args, verbose);

    info!("funnelstat v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    let outcome = loaded.and_then(|(mut config, source)| {
        match source {
            ConfigSource::Explicit(path) => info!("Loaded config from: {}", path.display()),
            ConfigSource::Default => info!("Loaded default config from {}", CONFIG_FILE_NAME),
            ConfigSource::Builtin => debug!("No config file found, using defaults"),
            ConfigSource::DefaultUnusable(e) => warn!("Failed to load config: {}", e),
        }

        config.merge_with_args(&args);
        config.validate()?;
        run(&args, &config)
    });

    match outcome {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .funnelstat.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize column names, windows and report options.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// `RUST_LOG` takes precedence when set. Logs go to stderr so a report
/// written to stdout stays clean.
fn init_logging(args: &Args, config_verbose: bool) {
    let level = if config_verbose && !args.quiet {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: failed to set tracing subscriber: {}", e);
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<(Config, ConfigSource)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, ConfigSource::Explicit(config_path.clone())));
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok((config, ConfigSource::Default)),
        Ok(None) => Ok((Config::default(), ConfigSource::Builtin)),
        Err(e) => Ok((
            Config::default(),
            ConfigSource::DefaultUnusable(format!("{:#}", e)),
        )),
    }
}

/// Run the load, aggregate and render pipeline. Returns the exit code.
fn run(args: &Args, config: &Config) -> Result<i32> {
    let start_time = Instant::now();

    // Step 1: Pick the input file
    let supplier: Box<dyn PathSupplier> = match args.input {
        Some(ref path) => Box::new(FixedPath(path.clone())),
        None => Box::new(PromptPath::new(
            std::io::stdin().lock(),
            std::io::stderr(),
            "Select input file:",
        )),
    };

    let input = match source::select_input(supplier)? {
        Some(path) => path,
        None => {
            println!("No file selected. Exiting.");
            return Ok(0);
        }
    };

    // Step 2: Load and validate
    let load_options = LoadOptions {
        show_progress: !args.quiet,
        ..LoadOptions::from(config)
    };
    let table = if input.as_os_str() == "-" {
        info!("Loading events from stdin");
        loader::load_from_reader(std::io::stdin().lock(), "<stdin>", &load_options)?
    } else {
        loader::load_events(&input, &load_options)?
    };

    if table.is_empty() {
        warn!("{} contains a header but no rows", input.display());
    }

    // Step 3: Aggregate
    let analysis_options = analysis::AnalysisOptions::from(config);
    let analysis = analysis::analyze(&table, &analysis_options);

    // Step 4: Render and write
    let metadata = ReportMetadata {
        input: input.display().to_string(),
        generated_at: Utc::now(),
        windows: analysis_options.windows.clone(),
        strict_non_negative: analysis_options.strict_non_negative,
        duration_seconds: start_time.elapsed().as_secs_f64(),
    };

    let renderer = report::renderer_for(&config.general.format, config.report.bar_width)?;
    let output = renderer.render(&analysis, &metadata)?;
    report::write_report(&output, &config.general.output)?;

    if let Some(notice) = completion_notice(&config.general.output) {
        info!("Report written to {}", config.general.output);
        println!("{}", notice);
    }

    Ok(0)
}

/// Closing line for a report written to a file. Stdout reports get none.
fn completion_notice(destination: &str) -> Option<String> {
    if destination == "-" {
        None
    } else {
        Some(format!("\n✅ Analysis complete! Report saved to: {}", destination))
    }
}
