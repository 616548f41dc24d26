//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.annotask.toml` files.

use crate::aggregator::{Blacklist, GroupKey, DEFAULT_BLACKLIST};
use crate::cli::{Args, Command};
use crate::error::{AnnotaskError, Result};
use crate::publisher::EnvironmentPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".annotask.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Publisher settings.
    #[serde(default)]
    pub publisher: PublisherSettings,

    /// HIT parameters.
    #[serde(default)]
    pub hit: HitSettings,

    /// Aggregator settings.
    #[serde(default)]
    pub aggregator: AggregatorSettings,
}

/// How and where HITs are posted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublisherSettings {
    /// Profile name in the local AWS credentials file.
    #[serde(default = "default_profile_name")]
    pub profile_name: String,

    /// AWS region of the MTurk requester endpoint.
    #[serde(default = "default_region")]
    pub region: String,

    /// Whether `--live` selects the production environment.
    #[serde(default)]
    pub environment_policy: EnvironmentPolicy,

    /// Seconds to wait after creation before reporting the HIT.
    #[serde(default = "default_propagation_delay")]
    pub propagation_delay_secs: u64,
}

impl Default for PublisherSettings {
    fn default() -> Self {
        Self {
            profile_name: default_profile_name(),
            region: default_region(),
            environment_policy: EnvironmentPolicy::default(),
            propagation_delay_secs: default_propagation_delay(),
        }
    }
}

fn default_profile_name() -> String {
    "mturk_peter".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_propagation_delay() -> u64 {
    10
}

/// Parameters of the posted HIT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitSettings {
    #[serde(default = "default_max_assignments")]
    pub max_assignments: i32,

    /// Time the HIT stays available for acceptance.
    #[serde(default = "default_lifetime")]
    pub lifetime_seconds: i64,

    /// Time a worker has to complete the HIT once accepted.
    #[serde(default = "default_assignment_duration")]
    pub assignment_duration_seconds: i64,

    /// Time before submissions are approved automatically.
    #[serde(default = "default_auto_approval_delay")]
    pub auto_approval_delay_seconds: i64,

    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default = "default_keywords")]
    pub keywords: String,

    /// Description; the interface version is appended.
    #[serde(default = "default_description_text")]
    pub description_text: String,

    #[serde(default)]
    pub major_version: u32,

    #[serde(default)]
    pub minor_version: u32,

    /// Minimum approval rate (percent) required to preview the HIT.
    #[serde(default = "default_min_approval_rate")]
    pub min_approval_rate: i32,
}

impl Default for HitSettings {
    fn default() -> Self {
        Self {
            max_assignments: default_max_assignments(),
            lifetime_seconds: default_lifetime(),
            assignment_duration_seconds: default_assignment_duration(),
            auto_approval_delay_seconds: default_auto_approval_delay(),
            title: default_title(),
            keywords: default_keywords(),
            description_text: default_description_text(),
            major_version: 0,
            minor_version: 0,
            min_approval_rate: default_min_approval_rate(),
        }
    }
}

fn default_max_assignments() -> i32 {
    1
}

fn default_lifetime() -> i64 {
    240
}

fn default_assignment_duration() -> i64 {
    15 * 3 * 60
}

fn default_auto_approval_delay() -> i64 {
    60 * 60 * 24
}

fn default_title() -> String {
    "Annotate Groupings in Music Clips".to_string()
}

fn default_keywords() -> String {
    "data, music, audio, listening, easy, research".to_string()
}

fn default_description_text() -> String {
    "Listen to 10 samples of music, each 8 seconds long, and annotate the different groupings."
        .to_string()
}

fn default_min_approval_rate() -> i32 {
    80
}

/// Response aggregation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatorSettings {
    /// Experiment ids whose trials are dropped.
    #[serde(default = "default_blacklist")]
    pub blacklist: Vec<String>,

    /// Default grouping key.
    #[serde(default)]
    pub group_by: GroupKey,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            blacklist: default_blacklist(),
            group_by: GroupKey::default(),
        }
    }
}

fn default_blacklist() -> Vec<String> {
    DEFAULT_BLACKLIST.iter().map(|id| id.to_string()).collect()
}

impl AggregatorSettings {
    pub fn blacklist(&self) -> Blacklist {
        Blacklist::new(self.blacklist.iter().cloned())
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AnnotaskError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        toml::from_str(&content).map_err(|e| {
            AnnotaskError::Config(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.annotask.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &Args) {
        match &args.command {
            Command::Publish {
                profile_name,
                no_wait,
                ..
            } => {
                if let Some(profile) = profile_name {
                    self.publisher.profile_name = profile.clone();
                }
                if *no_wait {
                    self.publisher.propagation_delay_secs = 0;
                }
            }
            Command::Aggregate { by, blacklist, .. } => {
                if let Some(key) = by {
                    self.aggregator.group_by = *key;
                }
                if let Some(ids) = blacklist {
                    self.aggregator.blacklist = ids.clone();
                }
            }
            Command::InitConfig => {}
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::OutputFormat;
    use std::path::PathBuf;

    fn publish_args(profile_name: Option<&str>, no_wait: bool) -> Args {
        Args {
            command: Command::Publish {
                question_xml_filename: PathBuf::from("question.xml"),
                profile_name: profile_name.map(String::from),
                live: false,
                no_wait,
            },
            config: None,
            verbose: false,
            quiet: false,
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.publisher.profile_name, "mturk_peter");
        assert_eq!(config.publisher.environment_policy, EnvironmentPolicy::SandboxOnly);
        assert_eq!(config.publisher.propagation_delay_secs, 10);
        assert_eq!(config.hit.assignment_duration_seconds, 2700);
        assert_eq!(config.aggregator.blacklist.len(), 3);
        assert_eq!(config.aggregator.group_by, GroupKey::Experiment);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[publisher]
profile_name = "lab"
environment_policy = "follow-flag"

[hit]
lifetime_seconds = 3600
major_version = 1
minor_version = 4

[aggregator]
blacklist = ["bad-session"]
group_by = "url"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.publisher.profile_name, "lab");
        assert_eq!(config.publisher.environment_policy, EnvironmentPolicy::FollowFlag);
        assert_eq!(config.publisher.region, "us-east-1");
        assert_eq!(config.hit.lifetime_seconds, 3600);
        assert_eq!(config.hit.major_version, 1);
        assert_eq!(config.hit.title, "Annotate Groupings in Music Clips");
        assert!(config.aggregator.blacklist().contains("bad-session"));
        assert_eq!(config.aggregator.blacklist().len(), 1);
        assert_eq!(config.aggregator.group_by, GroupKey::Url);
    }

    #[test]
    fn test_default_toml_roundtrips() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[publisher]"));
        assert!(toml_str.contains("[hit]"));
        assert!(toml_str.contains("[aggregator]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_merge_publish_args() {
        let mut config = Config::default();
        config.merge_with_args(&publish_args(None, false));
        assert_eq!(config.publisher.profile_name, "mturk_peter");
        assert_eq!(config.publisher.propagation_delay_secs, 10);

        config.merge_with_args(&publish_args(Some("lab"), true));
        assert_eq!(config.publisher.profile_name, "lab");
        assert_eq!(config.publisher.propagation_delay_secs, 0);
    }

    #[test]
    fn test_merge_aggregate_args() {
        let mut config = Config::default();
        let args = Args {
            command: Command::Aggregate {
                responses: PathBuf::from("responses.json"),
                by: Some(GroupKey::Url),
                format: OutputFormat::Summary,
                flat: false,
                output: None,
                blacklist: Some(vec!["x".to_string()]),
            },
            config: None,
            verbose: false,
            quiet: false,
        };

        config.merge_with_args(&args);
        assert_eq!(config.aggregator.group_by, GroupKey::Url);
        assert_eq!(config.aggregator.blacklist, vec!["x"]);
    }

    #[test]
    fn test_load_invalid_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[publisher\nprofile_name = 3").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(err.is_config());
        assert!(Config::load_from_dir(dir.path()).is_err());
    }

    #[test]
    fn test_load_from_dir_missing() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(Config::load_from_dir(dir.path()).unwrap().is_none());
    }
}
