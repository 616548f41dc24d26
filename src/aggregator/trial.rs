//! Data models for submitted trials.
//!
//! A trial is one listener's response to one audio sample. Only the fields
//! the aggregator needs are typed; everything else is kept verbatim.

use crate::error::{AnnotaskError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::debug;

/// One submitted trial record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    /// Identifier of the experiment (session) that produced the trial.
    pub experiment_id: String,
    /// URL of the audio sample that was annotated.
    pub url: String,
    /// Response payload. Validated lazily by [`Trial::final_response`].
    #[serde(default)]
    pub data: Value,
    /// Any other fields of the record.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Relative size of a placed marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerSize {
    Large,
    Small,
    #[serde(other)]
    Unknown,
}

/// A timestamp as it appears in the log: usually a numeric string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Number(f64),
    Text(String),
}

impl RawTimestamp {
    /// Parse the timestamp as seconds. NaN and infinities are rejected.
    pub fn seconds(&self) -> std::result::Result<f64, String> {
        let value = match self {
            RawTimestamp::Number(value) => *value,
            RawTimestamp::Text(text) => text
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("non-numeric timestamp {:?}", text))?,
        };

        if value.is_finite() {
            Ok(value)
        } else {
            Err(format!("non-finite timestamp {}", value))
        }
    }
}

/// A marker the listener left on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub timestamp: RawTimestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<MarkerSize>,
}

impl Trial {
    /// Markers from `data.final_response`, in recorded order.
    pub fn final_response(&self) -> Result<Vec<Marker>> {
        let entries = self
            .data
            .get("final_response")
            .ok_or_else(|| {
                AnnotaskError::DataFormat(format!(
                    "trial from experiment '{}' has no data.final_response",
                    self.experiment_id
                ))
            })?
            .as_array()
            .ok_or_else(|| {
                AnnotaskError::DataFormat(format!(
                    "data.final_response of experiment '{}' is not an array",
                    self.experiment_id
                ))
            })?;

        entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                Marker::deserialize(entry).map_err(|e| {
                    AnnotaskError::DataFormat(format!(
                        "final_response[{}] of experiment '{}': {}",
                        i, self.experiment_id, e
                    ))
                })
            })
            .collect()
    }

    /// Marker timestamps of this trial as seconds.
    pub fn final_response_times(&self) -> Result<ResponseTimes> {
        self.final_response()?
            .iter()
            .enumerate()
            .map(|(i, marker)| {
                marker.timestamp.seconds().map_err(|reason| {
                    AnnotaskError::DataFormat(format!(
                        "final_response[{}] of experiment '{}': {}",
                        i, self.experiment_id, reason
                    ))
                })
            })
            .collect()
    }
}

/// Ordered timestamps (seconds) of one trial's final response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseTimes(Vec<f64>);

impl ResponseTimes {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[allow(dead_code)] // Pairs with len()
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, f64> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

impl FromIterator<f64> for ResponseTimes {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Vec<f64>> for ResponseTimes {
    fn from(times: Vec<f64>) -> Self {
        Self(times)
    }
}

/// Parse a JSON document holding an array of trials.
pub fn parse_trials(content: &str) -> Result<Vec<Trial>> {
    let trials: Vec<Trial> = serde_json::from_str(content)?;
    debug!("Parsed {} trials", trials.len());
    Ok(trials)
}

/// Load the trials stored in a response log file.
pub fn load_trials(path: &Path) -> Result<Vec<Trial>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        AnnotaskError::Config(format!(
            "Failed to read responses file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_trials(&content).map_err(|e| match e {
        AnnotaskError::DataFormat(reason) => {
            AnnotaskError::DataFormat(format!("{}: {}", path.display(), reason))
        }
        other => other,
    })
}
