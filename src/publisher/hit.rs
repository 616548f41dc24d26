//! HIT posting parameters.
//!
//! This module holds the two MTurk environments, the qualification rule
//! and the value object handed to the task service's create call.

use crate::config::HitSettings;
use crate::error::{AnnotaskError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Built-in qualification type tracking a worker's assignment approval rate.
pub const APPROVAL_RATE_QUALIFICATION: &str = "000000000000000000L0";

/// One MTurk deployment: API endpoint, worker and requester UIs, default reward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub name: &'static str,
    pub endpoint: &'static str,
    pub preview_url: &'static str,
    pub manage_url: &'static str,
    pub reward: &'static str,
}

pub const LIVE: Environment = Environment {
    name: "live",
    endpoint: "https://mturk-requester.us-east-1.amazonaws.com",
    preview_url: "https://www.mturk.com/mturk/preview",
    manage_url: "https://requester.mturk.com/mturk/manageHITs",
    reward: "0.00",
};

pub const SANDBOX: Environment = Environment {
    name: "sandbox",
    endpoint: "https://mturk-requester-sandbox.us-east-1.amazonaws.com",
    preview_url: "https://workersandbox.mturk.com/mturk/preview",
    manage_url: "https://requestersandbox.mturk.com/mturk/manageHITs",
    reward: "0.50",
};

impl Environment {
    /// Worker-facing preview link for a HIT type.
    pub fn preview_link(&self, hit_type_id: &str) -> String {
        format!("{}?groupId={}", self.preview_url, hit_type_id)
    }

    pub fn is_live(&self) -> bool {
        self.name == LIVE.name
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.endpoint)
    }
}

/// How the `--live` flag maps to an environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnvironmentPolicy {
    /// Always post to the sandbox; `--live` is recorded but has no effect.
    #[default]
    SandboxOnly,
    /// Post to production when `--live` is given.
    FollowFlag,
}

impl EnvironmentPolicy {
    pub fn select(&self, live: bool) -> &'static Environment {
        match self {
            EnvironmentPolicy::SandboxOnly => &SANDBOX,
            EnvironmentPolicy::FollowFlag if live => &LIVE,
            EnvironmentPolicy::FollowFlag => &SANDBOX,
        }
    }
}

/// Comparison applied between a worker's qualification value and the threshold.
#[allow(dead_code)] // Full MTurk comparator set; the approval-rate rule needs only one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    LessThan,
    LessThanOrEqualTo,
    GreaterThan,
    GreaterThanOrEqualTo,
    EqualTo,
    NotEqualTo,
}

/// A requirement workers must meet to see or accept the HIT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualificationRule {
    pub qualification_type_id: String,
    pub comparator: Comparator,
    pub integer_values: Vec<i32>,
    pub required_to_preview: bool,
}

impl QualificationRule {
    /// Require at least `percent` approved assignments, enforced before preview.
    pub fn min_approval_rate(percent: i32) -> Self {
        Self {
            qualification_type_id: APPROVAL_RATE_QUALIFICATION.to_string(),
            comparator: Comparator::GreaterThanOrEqualTo,
            integer_values: vec![percent],
            required_to_preview: true,
        }
    }
}

/// Everything the create call needs. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HitConfig {
    pub max_assignments: i32,
    pub lifetime_seconds: i64,
    pub assignment_duration_seconds: i64,
    pub reward: String,
    pub title: String,
    pub keywords: String,
    pub description: String,
    pub qualification_requirements: Vec<QualificationRule>,
    pub question_payload: String,
    pub auto_approval_delay_seconds: i64,
}

impl HitConfig {
    pub fn new(settings: &HitSettings, environment: &Environment, question_payload: String) -> Self {
        Self {
            max_assignments: settings.max_assignments,
            lifetime_seconds: settings.lifetime_seconds,
            assignment_duration_seconds: settings.assignment_duration_seconds,
            reward: environment.reward.to_string(),
            title: settings.title.clone(),
            keywords: settings.keywords.clone(),
            description: describe(
                &settings.description_text,
                settings.major_version,
                settings.minor_version,
            ),
            qualification_requirements: vec![QualificationRule::min_approval_rate(
                settings.min_approval_rate,
            )],
            question_payload,
            auto_approval_delay_seconds: settings.auto_approval_delay_seconds,
        }
    }
}

/// Identifiers returned by the create call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HitHandle {
    pub hit_id: String,
    pub hit_type_id: String,
}

/// Task description with the interface version appended.
pub fn describe(text: &str, major_version: u32, minor_version: u32) -> String {
    format!("{}\n version: {}.{}", text, major_version, minor_version)
}

/// Read the ExternalQuestion document. The content is passed through untouched.
pub fn load_question(path: &Path) -> Result<String> {
    let content = std::fs::read_to_string(path).map_err(|e| AnnotaskError::QuestionFile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    debug!("Loaded question XML ({} bytes)", content.len());
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_sandbox_only_ignores_live_flag() {
        let policy = EnvironmentPolicy::default();
        assert_eq!(policy.select(false), &SANDBOX);
        assert_eq!(policy.select(true), &SANDBOX);
        assert_eq!(policy.select(false).reward, "0.50");
    }

    #[test]
    fn test_follow_flag_policy() {
        let policy = EnvironmentPolicy::FollowFlag;
        assert_eq!(policy.select(true), &LIVE);
        assert!(policy.select(true).is_live());
        assert_eq!(policy.select(false), &SANDBOX);
    }

    #[test]
    fn test_preview_link() {
        assert_eq!(
            SANDBOX.preview_link("3ABC"),
            "https://workersandbox.mturk.com/mturk/preview?groupId=3ABC"
        );
    }

    #[test]
    fn test_hit_config_from_defaults() {
        let config = HitConfig::new(&HitSettings::default(), &SANDBOX, "<xml/>".to_string());

        assert_eq!(config.max_assignments, 1);
        assert_eq!(config.lifetime_seconds, 240);
        assert_eq!(config.assignment_duration_seconds, 2700);
        assert_eq!(config.auto_approval_delay_seconds, 86400);
        assert_eq!(config.reward, "0.50");
        assert_eq!(config.title, "Annotate Groupings in Music Clips");
        assert!(config.description.ends_with("\n version: 0.0"));
        assert_eq!(config.question_payload, "<xml/>");
        assert_eq!(
            config.qualification_requirements,
            vec![QualificationRule {
                qualification_type_id: "000000000000000000L0".to_string(),
                comparator: Comparator::GreaterThanOrEqualTo,
                integer_values: vec![80],
                required_to_preview: true,
            }]
        );
    }

    #[test]
    fn test_live_reward() {
        let config = HitConfig::new(&HitSettings::default(), &LIVE, String::new());
        assert_eq!(config.reward, "0.00");
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe("Listen.", 1, 2), "Listen.\n version: 1.2");
    }

    #[test]
    fn test_load_question_verbatim() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let xml = "<ExternalQuestion>\n  <ExternalURL>https://example.org</ExternalURL>\n</ExternalQuestion>\n";
        file.write_all(xml.as_bytes()).unwrap();

        assert_eq!(load_question(file.path()).unwrap(), xml);
    }

    #[test]
    fn test_load_question_missing() {
        let err = load_question(Path::new("/nonexistent/question.xml")).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("/nonexistent/question.xml"));
    }
}
