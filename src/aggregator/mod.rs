//! Response aggregation.
//!
//! Loads trial logs, drops blacklisted experiments, groups trials by
//! experiment or URL, and turns final responses into timestamp sequences.

pub mod grouping;
pub mod times;
pub mod trial;

pub use grouping::{
    group_by_experiment, group_by_url, Blacklist, GroupKey, Grouping, DEFAULT_BLACKLIST,
};
pub use times::{extract_final_response_times, flatten, flatten_timestamps, group_stats, GroupStats};
pub use trial::{load_trials, ResponseTimes, Trial};
