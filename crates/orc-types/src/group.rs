use serde::{Deserialize, Serialize};

/// How the aggregator picks a single result out of a group of parallel workers (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    FirstSuccess,
    LastSuccess,
    Concat,
}
