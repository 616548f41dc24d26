//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::aggregator::GroupKey;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Annotask - post music-grouping HITs and aggregate their responses
///
/// Posts an ExternalQuestion HIT to Mechanical Turk and polls it for
/// submissions, or groups collected response logs by experiment or URL.
///
/// Examples:
///   annotask publish question.xml
///   annotask publish question.xml --profile_name lab --live
///   annotask aggregate responses.json --by url
///   annotask aggregate responses.json --format json --flat --output times.json
///   annotask init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    ///
    /// If not specified, looks for .annotask.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Post a HIT and poll it for submitted assignments
    ///
    /// At the prompt, press enter to poll; type q to stop. Closing stdin
    /// before typing q is reported as an error.
    Publish {
        /// XML file containing the details of the ExternalQuestion
        question_xml_filename: PathBuf,

        /// Profile name in the AWS credentials file
        #[arg(
            short = 'p',
            long = "profile_name",
            visible_alias = "profile-name",
            value_name = "NAME",
            env = "ANNOTASK_PROFILE"
        )]
        profile_name: Option<String>,

        /// Post real HITs instead of sandbox HITs
        ///
        /// Only honoured when the config sets environment_policy = "follow-flag".
        #[arg(short, long)]
        live: bool,

        /// Skip the propagation wait after creating the HIT
        #[arg(long)]
        no_wait: bool,
    },

    /// Group a response log and extract final-response timestamps
    Aggregate {
        /// JSON file holding an array of trial records
        responses: PathBuf,

        /// Field to group trials by (defaults to the config, then experiment)
        #[arg(long, value_name = "KEY")]
        by: Option<GroupKey>,

        /// Output format (summary, json)
        #[arg(long, default_value = "summary", value_name = "FORMAT")]
        format: OutputFormat,

        /// Pool all trials into one list instead of grouping them (json only)
        #[arg(long)]
        flat: bool,

        /// Write the report to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Experiment ids to exclude (comma-separated), replacing the configured list
        #[arg(long, value_name = "IDS", value_delimiter = ',')]
        blacklist: Option<Vec<String>>,
    },

    /// Generate a default .annotask.toml configuration file
    InitConfig,
}

/// Output format for the aggregate report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Per-group summary (default)
    #[default]
    Summary,
    /// Extracted timestamps as JSON
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        match &self.command {
            Command::Publish {
                question_xml_filename,
                profile_name,
                ..
            } => {
                require_file(question_xml_filename, "Question file")?;
                if let Some(profile) = profile_name {
                    if profile.trim().is_empty() {
                        return Err("Profile name cannot be empty".to_string());
                    }
                }
            }
            Command::Aggregate {
                responses,
                format,
                flat,
                ..
            } => {
                require_file(responses, "Responses file")?;
                if *flat && *format != OutputFormat::Json {
                    return Err("--flat requires --format json".to_string());
                }
            }
            Command::InitConfig => {}
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

fn require_file(path: &Path, what: &str) -> Result<(), String> {
    if !path.exists() {
        return Err(format!("{} does not exist: {}", what, path.display()));
    }
    if !path.is_file() {
        return Err(format!("{} is not a file: {}", what, path.display()));
    }
    Ok(())
}
