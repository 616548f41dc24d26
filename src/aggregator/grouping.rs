//! Trial grouping and blacklist filtering.
//!
//! Groups keep the order in which their key first appeared in the input,
//! and values keep input order within a group.

use crate::aggregator::trial::Trial;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

/// Experiment ids whose trials are excluded unless configured otherwise.
pub const DEFAULT_BLACKLIST: &[&str] = &[
    "19::57::dc::4f::38::63::58::ee::e8",
    "79::71::78:: c::b9::1b::5c::3b",
    "8d::67::f5::cd::1b::8c::07::78::e4",
];

/// Set of experiment ids excluded from every grouping.
///
/// Matching is exact string equality; ids are not trimmed or normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blacklist {
    ids: HashSet<String>,
}

impl Default for Blacklist {
    fn default() -> Self {
        DEFAULT_BLACKLIST.iter().copied().collect()
    }
}

impl Blacklist {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, experiment_id: &str) -> bool {
        self.ids.contains(experiment_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }
}

impl<S: Into<String>> FromIterator<S> for Blacklist {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// Field trials are grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GroupKey {
    /// Group by experiment id (default)
    #[default]
    Experiment,
    /// Group by audio sample URL
    Url,
}

impl GroupKey {
    fn key_of<'a>(&self, trial: &'a Trial) -> &'a str {
        match self {
            GroupKey::Experiment => &trial.experiment_id,
            GroupKey::Url => &trial.url,
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Experiment => write!(f, "experiment"),
            GroupKey::Url => write!(f, "url"),
        }
    }
}

/// Insertion-ordered mapping from a group key to its values.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct Grouping<T> {
    groups: IndexMap<String, Vec<T>>,
}

impl<T> Default for Grouping<T> {
    fn default() -> Self {
        Self {
            groups: IndexMap::new(),
        }
    }
}

// Equality is order-sensitive, unlike IndexMap's own.
impl<T: PartialEq> PartialEq for Grouping<T> {
    fn eq(&self, other: &Self) -> bool {
        self.groups.len() == other.groups.len() && self.groups.iter().eq(other.groups.iter())
    }
}

impl<T> Grouping<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value to the group for `key`, creating the group if needed.
    pub fn push(&mut self, key: &str, value: T) {
        match self.groups.get_mut(key) {
            Some(values) => values.push(value),
            None => {
                self.groups.insert(key.to_string(), vec![value]);
            }
        }
    }

    #[allow(dead_code)] // Lookup for callers that know the group key
    pub fn get(&self, key: &str) -> Option<&[T]> {
        self.groups.get(key).map(Vec::as_slice)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[T])> {
        self.groups
            .iter()
            .map(|(key, values)| (key.as_str(), values.as_slice()))
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of values across all groups.
    pub fn total_values(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    /// Convert every value, keeping group and value order. Stops at the first error.
    pub fn try_map<U, E, F>(&self, mut f: F) -> Result<Grouping<U>, E>
    where
        F: FnMut(&str, &T) -> Result<U, E>,
    {
        let mut groups = IndexMap::with_capacity(self.groups.len());

        for (key, values) in &self.groups {
            let converted = values
                .iter()
                .map(|value| f(key, value))
                .collect::<Result<Vec<U>, E>>()?;
            groups.insert(key.clone(), converted);
        }

        Ok(Grouping { groups })
    }
}

/// Group trials by the chosen key, skipping blacklisted experiments.
pub fn group_trials(trials: &[Trial], key: GroupKey, blacklist: &Blacklist) -> Grouping<Trial> {
    let mut grouped = Grouping::new();
    let mut skipped = 0usize;

    for trial in trials {
        if blacklist.contains(&trial.experiment_id) {
            skipped += 1;
            continue;
        }
        grouped.push(key.key_of(trial), trial.clone());
    }

    debug!(
        "Grouped {} trials into {} groups by {} ({} blacklisted)",
        trials.len() - skipped,
        grouped.len(),
        key,
        skipped
    );

    grouped
}

/// Group trials by experiment id.
pub fn group_by_experiment(trials: &[Trial], blacklist: &Blacklist) -> Grouping<Trial> {
    group_trials(trials, GroupKey::Experiment, blacklist)
}

/// Group trials by audio URL. The blacklist still applies to experiment ids.
pub fn group_by_url(trials: &[Trial], blacklist: &Blacklist) -> Grouping<Trial> {
    group_trials(trials, GroupKey::Url, blacklist)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_test_trial(experiment_id: &str, url: &str) -> Trial {
        serde_json::from_value(json!({
            "experiment_id": experiment_id,
            "url": url,
            "data": { "final_response": [] },
        }))
        .unwrap()
    }

    fn sample_trials() -> Vec<Trial> {
        vec![
            create_test_trial("B", "u2"),
            create_test_trial("A", "u1"),
            create_test_trial(DEFAULT_BLACKLIST[0], "u1"),
            create_test_trial("B", "u1"),
            create_test_trial(DEFAULT_BLACKLIST[2], "u3"),
            create_test_trial("A", "u2"),
        ]
    }

    #[test]
    fn test_default_blacklist() {
        let blacklist = Blacklist::default();
        assert_eq!(blacklist.len(), 3);
        assert!(blacklist.contains("79::71::78:: c::b9::1b::5c::3b"));
        assert!(!blacklist.contains("79::71::78::c::b9::1b::5c::3b"));
    }

    #[test]
    fn test_group_by_experiment_first_occurrence_order() {
        let grouped = group_by_experiment(&sample_trials(), &Blacklist::default());

        assert_eq!(grouped.keys().collect::<Vec<_>>(), vec!["B", "A"]);
        let urls: Vec<&str> = grouped
            .get("B")
            .unwrap()
            .iter()
            .map(|t| t.url.as_str())
            .collect();
        assert_eq!(urls, vec!["u2", "u1"]);
        assert_eq!(grouped.total_values(), 4);
    }

    #[test]
    fn test_group_by_url_applies_blacklist_to_experiment() {
        let grouped = group_by_url(&sample_trials(), &Blacklist::default());

        assert_eq!(grouped.keys().collect::<Vec<_>>(), vec!["u2", "u1"]);
        assert!(grouped.get("u3").is_none());
        for (_, trials) in grouped.iter() {
            assert!(trials
                .iter()
                .all(|t| !Blacklist::default().contains(&t.experiment_id)));
        }
    }

    #[test]
    fn test_empty_blacklist_keeps_everything() {
        let grouped = group_by_experiment(&sample_trials(), &Blacklist::new(Vec::<String>::new()));
        assert_eq!(grouped.len(), 4);
        assert_eq!(grouped.total_values(), 6);
    }

    #[test]
    fn test_custom_blacklist() {
        let blacklist = Blacklist::new(["A"]);
        let grouped = group_by_experiment(&sample_trials(), &blacklist);
        assert_eq!(
            grouped.keys().collect::<Vec<_>>(),
            vec!["B", DEFAULT_BLACKLIST[0], DEFAULT_BLACKLIST[2]]
        );
    }

    #[test]
    fn test_grouping_is_deterministic() {
        let trials = sample_trials();
        let first = group_by_url(&trials, &Blacklist::default());
        let second = group_by_url(&trials, &Blacklist::default());
        assert_eq!(first, second);
    }

    #[test]
    fn test_serialize_preserves_key_order() {
        let mut grouped = Grouping::new();
        grouped.push("zeta", 1);
        grouped.push("alpha", 2);
        grouped.push("zeta", 3);

        let json = serde_json::to_string(&grouped).unwrap();
        assert_eq!(json, r#"{"zeta":[1,3],"alpha":[2]}"#);
    }

    #[test]
    fn test_equality_respects_group_order() {
        let mut first = Grouping::new();
        first.push("a", 1);
        first.push("b", 2);

        let mut second = Grouping::new();
        second.push("b", 2);
        second.push("a", 1);

        assert_ne!(first, second);
        assert_eq!(first.clone(), first);
    }

    #[test]
    fn test_try_map_stops_on_error() {
        let mut grouped = Grouping::new();
        grouped.push("a", 1);
        grouped.push("b", -1);

        let result: Result<Grouping<u32>, String> = grouped.try_map(|key, v| {
            u32::try_from(*v).map_err(|_| format!("negative value in {}", key))
        });
        assert_eq!(result.unwrap_err(), "negative value in b");
    }
}
