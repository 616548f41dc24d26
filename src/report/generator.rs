//! Aggregate report generation.
//!
//! Renders grouped response times either as a plain-text summary for the
//! terminal or as JSON for downstream analysis.

use crate::aggregator::{self, GroupKey, GroupStats, Grouping, ResponseTimes};
use crate::config::AggregatorSettings;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};

/// Metadata about one aggregation run.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    /// Response log the trials were loaded from.
    pub source: String,
    pub generated_at: DateTime<Utc>,
    pub group_by: GroupKey,
    pub trials_loaded: usize,
    /// Trials dropped because their experiment is blacklisted.
    pub trials_blacklisted: usize,
    pub groups: usize,
    /// Markers across every kept trial.
    pub total_markers: usize,
}

/// Extracted timestamps, grouped or pooled.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ResponseTimesPayload {
    Grouped(Grouping<ResponseTimes>),
    Flat(Vec<ResponseTimes>),
}

/// The complete aggregation report.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateReport {
    pub metadata: ReportMetadata,
    pub groups: Vec<GroupStats>,
    pub response_times: ResponseTimesPayload,
}

/// Load a response log and run it through blacklist filtering, grouping and extraction.
///
/// With `flat`, response times are pooled into one list of per-trial sequences.
pub fn build_aggregate_report(
    settings: &AggregatorSettings,
    responses: &Path,
    flat: bool,
) -> crate::error::Result<AggregateReport> {
    let key = settings.group_by;
    let blacklist = settings.blacklist();

    let trials = aggregator::load_trials(responses)?;
    info!("Loaded {} trials from {}", trials.len(), responses.display());
    debug!("Blacklist holds {} experiment ids", blacklist.len());

    let grouped = match key {
        GroupKey::Experiment => aggregator::group_by_experiment(&trials, &blacklist),
        GroupKey::Url => aggregator::group_by_url(&trials, &blacklist),
    };
    if grouped.is_empty() {
        warn!("No trials left after blacklist filtering");
    }
    debug!("Groups: {:?}", grouped.keys().collect::<Vec<_>>());

    let times = aggregator::extract_final_response_times(&grouped)?;
    let groups = aggregator::group_stats(&times);
    let pooled = aggregator::flatten(&times);
    let total_markers = aggregator::flatten_timestamps(&pooled).len();

    Ok(AggregateReport {
        metadata: ReportMetadata {
            source: responses.display().to_string(),
            generated_at: Utc::now(),
            group_by: key,
            trials_loaded: trials.len(),
            trials_blacklisted: trials.len() - grouped.total_values(),
            groups: grouped.len(),
            total_markers,
        },
        groups,
        response_times: if flat {
            ResponseTimesPayload::Flat(pooled)
        } else {
            ResponseTimesPayload::Grouped(times)
        },
    })
}

/// Generate a plain-text summary of the report.
pub fn generate_summary_text(report: &AggregateReport) -> String {
    let mut output = String::new();
    let metadata = &report.metadata;

    output.push_str(&format!("Source: {}\n", metadata.source));
    output.push_str(&format!(
        "Trials: {} loaded, {} blacklisted\n",
        metadata.trials_loaded, metadata.trials_blacklisted
    ));
    output.push_str(&format!(
        "Groups by {}: {}\n",
        metadata.group_by, metadata.groups
    ));

    if report.groups.is_empty() {
        output.push_str("\nNo trials left after filtering.\n");
        return output;
    }

    output.push('\n');
    for stats in &report.groups {
        output.push_str(&generate_group_line(stats));
    }

    output.push_str(&format!("\nTotal markers: {}\n", metadata.total_markers));

    output
}

fn generate_group_line(stats: &GroupStats) -> String {
    let span = match stats.span {
        Some((first, last)) => format!("{:.2}s-{:.2}s", first, last),
        None => "-".to_string(),
    };

    format!(
        "  {}: {} trials, {} markers ({:.1}/trial), span {}\n",
        stats.key,
        stats.trials,
        stats.markers,
        stats.mean_markers_per_trial(),
        span
    )
}

/// Generate a JSON report.
pub fn generate_json_report(report: &AggregateReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Write rendered report content to a file.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(content.as_bytes())?;

    Ok(())
}
