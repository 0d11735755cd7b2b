use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Advisory complexity bucket used by the router's complexity mapping (spec §4.6 rule 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityHint {
    Trivial,
    Simple,
    Moderate,
    Complex,
}

/// Immutable description of a unit of work handed to the core by the master orchestrator.
///
/// `TaskSpec` is never mutated after construction; the router, pool, and
/// worker all read it by shared reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub id: String,
    pub description: String,
    pub estimated_tokens: u64,
    #[serde(default)]
    pub touched_files: BTreeSet<String>,
    pub complexity_hint: ComplexityHint,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub max_cost: Option<f64>,
    #[serde(default)]
    pub preferred_provider: Option<String>,
}

impl TaskSpec {
    pub fn new(id: impl Into<String>, description: impl Into<String>, estimated_tokens: u64) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            estimated_tokens,
            touched_files: BTreeSet::new(),
            complexity_hint: ComplexityHint::Simple,
            deadline: None,
            max_cost: None,
            preferred_provider: None,
        }
    }

    pub fn with_complexity(mut self, hint: ComplexityHint) -> Self {
        self.complexity_hint = hint;
        self
    }

    pub fn with_max_cost(mut self, max_cost: f64) -> Self {
        self.max_cost = Some(max_cost);
        self
    }

    pub fn with_preferred_provider(mut self, name: impl Into<String>) -> Self {
        self.preferred_provider = Some(name.into());
        self
    }

    /// Default expected output size used by the router's budget gate when the
    /// caller has not supplied one: `min(estimated_tokens, 2048)` per spec §4.6 rule 4.
    pub fn default_expected_output_tokens(&self) -> u64 {
        self.estimated_tokens.min(2048)
    }
}
