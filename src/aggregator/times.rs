//! Response-time extraction and pooling.

use crate::aggregator::grouping::Grouping;
use crate::aggregator::trial::{ResponseTimes, Trial};
use crate::error::{AnnotaskError, Result};
use serde::Serialize;

/// Convert every grouped trial to its final-response timestamps.
///
/// Fails on the first trial that lacks `data.final_response` or has a
/// timestamp that is missing or not numeric; no partial result is returned.
pub fn extract_final_response_times(grouped: &Grouping<Trial>) -> Result<Grouping<ResponseTimes>> {
    grouped.try_map(|key, trial| {
        trial.final_response_times().map_err(|e| match e {
            AnnotaskError::DataFormat(reason) => {
                AnnotaskError::DataFormat(format!("group '{}': {}", key, reason))
            }
            other => other,
        })
    })
}

/// Pool all per-trial sequences, in group order then trial order.
pub fn flatten(grouped_times: &Grouping<ResponseTimes>) -> Vec<ResponseTimes> {
    grouped_times
        .iter()
        .flat_map(|(_, times)| times.iter().cloned())
        .collect()
}

/// Concatenate per-trial sequences into one sequence of timestamps.
pub fn flatten_timestamps(sequences: &[ResponseTimes]) -> ResponseTimes {
    let mut all = Vec::with_capacity(sequences.iter().map(ResponseTimes::len).sum());
    for times in sequences {
        all.extend_from_slice(times.as_slice());
    }
    ResponseTimes::from(all)
}

/// Per-group counts for the aggregate summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupStats {
    pub key: String,
    pub trials: usize,
    pub markers: usize,
    /// Earliest and latest marker, when the group has any.
    pub span: Option<(f64, f64)>,
}

impl GroupStats {
    pub fn mean_markers_per_trial(&self) -> f64 {
        if self.trials == 0 {
            0.0
        } else {
            self.markers as f64 / self.trials as f64
        }
    }
}

/// Compute per-group statistics, in group order.
pub fn group_stats(grouped_times: &Grouping<ResponseTimes>) -> Vec<GroupStats> {
    grouped_times
        .iter()
        .map(|(key, times)| {
            let span = times
                .iter()
                .flat_map(|t| t.iter().copied())
                .fold(None, |acc: Option<(f64, f64)>, t| match acc {
                    Some((lo, hi)) => Some((lo.min(t), hi.max(t))),
                    None => Some((t, t)),
                });

            GroupStats {
                key: key.to_string(),
                trials: times.len(),
                markers: times.iter().map(ResponseTimes::len).sum(),
                span,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::grouping::{group_by_experiment, group_by_url, Blacklist};
    use crate::aggregator::trial::parse_trials;

    const SCENARIO: &str = r#"[
        {"experiment_id": "E1", "url": "u1",
         "data": {"final_response": [{"timestamp": "1.0"}, {"timestamp": "2.0"}]}},
        {"experiment_id": "19::57::dc::4f::38::63::58::ee::e8", "url": "u2",
         "data": {"final_response": [{"timestamp": "9.9"}]}}
    ]"#;

    #[test]
    fn test_blacklisted_scenario() {
        let trials = parse_trials(SCENARIO).unwrap();
        let grouped = group_by_experiment(&trials, &Blacklist::default());

        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped.get("E1").unwrap(), &trials[..1]);

        let times = extract_final_response_times(&grouped).unwrap();
        assert_eq!(
            times.get("E1").unwrap(),
            &[ResponseTimes::from(vec![1.0, 2.0])]
        );

        let flat = flatten(&times);
        assert_eq!(flat, vec![ResponseTimes::from(vec![1.0, 2.0])]);
        assert_eq!(flatten_timestamps(&flat).as_slice(), &[1.0, 2.0]);
    }

    #[test]
    fn test_flatten_length_matches_marker_count() {
        let trials = parse_trials(
            r#"[
            {"experiment_id": "A", "url": "u1", "data": {"final_response": [{"timestamp": "1"}]}},
            {"experiment_id": "B", "url": "u1", "data": {"final_response": [{"timestamp": "2"}, {"timestamp": "3"}]}},
            {"experiment_id": "A", "url": "u2", "data": {"final_response": []}},
            {"experiment_id": "8d::67::f5::cd::1b::8c::07::78::e4", "url": "u2", "data": {"final_response": [{"timestamp": "4"}]}}
        ]"#,
        )
        .unwrap();

        let times = extract_final_response_times(&group_by_experiment(&trials, &Blacklist::default()))
            .unwrap();
        let flat = flatten(&times);

        assert_eq!(flat.len(), 3);
        assert_eq!(flatten_timestamps(&flat).as_slice(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_flatten_follows_group_order() {
        let trials = parse_trials(
            r#"[
            {"experiment_id": "A", "url": "u2", "data": {"final_response": [{"timestamp": "1"}]}},
            {"experiment_id": "B", "url": "u1", "data": {"final_response": [{"timestamp": "2"}]}},
            {"experiment_id": "C", "url": "u2", "data": {"final_response": [{"timestamp": "3"}]}}
        ]"#,
        )
        .unwrap();

        let times = extract_final_response_times(&group_by_url(&trials, &Blacklist::default()))
            .unwrap();
        assert_eq!(flatten_timestamps(&flatten(&times)).as_slice(), &[1.0, 3.0, 2.0]);
    }

    #[test]
    fn test_single_bad_trial_aborts_extraction() {
        let trials = parse_trials(
            r#"[
            {"experiment_id": "A", "url": "u1", "data": {"final_response": [{"timestamp": "1"}]}},
            {"experiment_id": "B", "url": "u1", "data": {"final_response": [{"timestamp": "abc"}]}}
        ]"#,
        )
        .unwrap();

        let err = extract_final_response_times(&group_by_experiment(&trials, &Blacklist::default()))
            .unwrap_err();
        assert!(err.is_data_format());
        assert!(err.to_string().contains("group 'B'"));
    }

    #[test]
    fn test_fixture_log() {
        let trials = parse_trials(include_str!("../../fixtures/responses.json")).unwrap();
        assert_eq!(trials.len(), 4);

        let by_url = extract_final_response_times(&group_by_url(&trials, &Blacklist::default()))
            .unwrap();
        let stats = group_stats(&by_url);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].trials, 1);
        assert_eq!(stats[0].span, Some((3.412, 12.230)));
        assert_eq!(stats[1].markers, 1);

        let by_experiment =
            extract_final_response_times(&group_by_experiment(&trials, &Blacklist::default()))
                .unwrap();
        assert_eq!(by_experiment.len(), 2);
        assert_eq!(flatten(&by_experiment).len(), 3);
    }

    #[test]
    fn test_group_stats() {
        let mut times = Grouping::new();
        times.push("A", ResponseTimes::from(vec![0.5, 4.0]));
        times.push("A", ResponseTimes::from(vec![2.0]));
        times.push("B", ResponseTimes::default());

        let stats = group_stats(&times);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].markers, 3);
        assert_eq!(stats[0].span, Some((0.5, 4.0)));
        assert_eq!(stats[0].mean_markers_per_trial(), 1.5);
        assert_eq!(stats[1].span, None);
        assert_eq!(stats[1].mean_markers_per_trial(), 0.0);
    }
}
