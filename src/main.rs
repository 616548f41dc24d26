//! Annotask - Mechanical Turk tooling for music-grouping annotation studies
//!
//! `publish` posts an ExternalQuestion HIT and polls it for submissions.
//! `aggregate` groups collected response logs and extracts marker timestamps.
//!
//! Exit codes:
//!   0 - Success (including quitting the poll loop with `q`)
//!   1 - Any error (configuration, task service, malformed data)

mod aggregator;
mod cli;
mod config;
mod error;
mod publisher;
mod report;

use anyhow::{Context, Result};
use cli::{Args, Command, OutputFormat};
use config::{Config, CONFIG_FILE_NAME};
use error::AnnotaskError;
use publisher::{
    describe_published, HitConfig, MturkService, OperatorPrompt, Publisher, PublisherConfig,
};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle init-config early (no logging needed)
    if matches!(args.command, Command::InitConfig) {
        return handle_init_config();
    }

    init_logging(&args);

    info!("Annotask v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    let result = match load_config(&args) {
        Ok(mut config) => {
            config.merge_with_args(&args);
            match &args.command {
                Command::Publish {
                    question_xml_filename,
                    live,
                    ..
                } => run_publish(&config, question_xml_filename, *live, args.quiet).await,
                Command::Aggregate {
                    responses,
                    format,
                    flat,
                    output,
                    ..
                } => run_aggregate(&config, responses, *format, *flat, output.as_deref()),
                Command::InitConfig => Ok(()),
            }
        }
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        error!("Run failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        if let Some(tip) = e.downcast_ref::<AnnotaskError>().and_then(error_tip) {
            eprintln!("   Tip: {}", tip);
        }
        std::process::exit(1);
    }

    Ok(())
}

/// Handle init-config: generate a default .annotask.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE_NAME);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize the HIT, credential profile, and blacklist.");
    Ok(())
}

fn error_tip(err: &AnnotaskError) -> Option<&'static str> {
    if err.is_data_format() {
        Some("Each trial needs experiment_id, url and data.final_response with numeric timestamps")
    } else if err.is_config() {
        Some("Run `annotask init-config` to generate a default configuration")
    } else {
        None
    }
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
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

/// Post the HIT, report it, then poll until the operator quits.
async fn run_publish(config: &Config, question_path: &Path, live: bool, quiet: bool) -> Result<()> {
    let policy = config.publisher.environment_policy;
    let environment = policy.select(live);
    if live && !environment.is_live() {
        warn!("--live ignored: environment_policy is sandbox-only");
    }

    // Read the question before touching the network
    let question = publisher::load_question(question_path)?;
    let hit = HitConfig::new(&config.hit, environment, question);

    println!("📤 Posting HIT to MTurk ({})", environment.name);
    println!("   Profile: {}", config.publisher.profile_name);
    println!("   Reward: ${}", hit.reward);

    let service = MturkService::connect(
        &config.publisher.profile_name,
        &config.publisher.region,
        environment,
    )
    .await?;

    let publisher = Publisher::new(
        PublisherConfig {
            environment,
            propagation_delay: Duration::from_secs(config.publisher.propagation_delay_secs),
            show_progress: !quiet,
        },
        service,
    );

    let published = publisher.publish(&hit).await?;
    println!("{}", describe_published(&published));

    let mut prompt = OperatorPrompt::stdio();
    let polls = publisher
        .poll(&published.handle.hit_id, &mut prompt, |listing| {
            match serde_json::to_string_pretty(listing) {
                Ok(pretty) => println!("{}", pretty),
                Err(_) => println!("{:#?}", listing),
            }
        })
        .await?;

    info!("Done after {} polls", polls);
    Ok(())
}

/// Load, group, extract and report a response log.
fn run_aggregate(
    config: &Config,
    responses: &Path,
    format: OutputFormat,
    flat: bool,
    output: Option<&Path>,
) -> Result<()> {
    let report = report::build_aggregate_report(&config.aggregator, responses, flat)?;

    let rendered = match format {
        OutputFormat::Summary => report::generate_summary_text(&report),
        OutputFormat::Json => report::generate_json_report(&report)?,
    };

    match output {
        Some(path) => {
            report::write_report(&rendered, path)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            println!("✅ Report saved to: {}", path.display());
        }
        None => println!("{}", rendered),
    }

    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Ok(Config::load(config_path)?);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
