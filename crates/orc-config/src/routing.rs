use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use orc_types::ComplexityHint;

use crate::error::ConfigError;

/// Global/per-task budget caps (spec §6 "budget caps").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BudgetCaps {
    #[serde(default)]
    pub remaining_budget_usd: Option<f64>,
}

/// Optional overrides layered on top of the router's built-in complexity
/// mapping (spec §4.6 rule 3, spec §6).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingConfig {
    #[serde(default)]
    pub complexity_kind: BTreeMap<ComplexityHint, orc_types::ProviderKind>,
    #[serde(default)]
    pub provider_weights: BTreeMap<String, f64>,
    #[serde(default)]
    pub budget: BudgetCaps,
}

pub(crate) fn load_routing_str(raw: &str) -> Result<RoutingConfig, ConfigError> {
    Ok(serde_yaml::from_str(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_parses_to_default_via_explicit_empty_map() {
        let parsed = load_routing_str("complexity_kind: {}\n").unwrap();
        assert_eq!(parsed, RoutingConfig::default());
    }

    #[test]
    fn rejects_unknown_top_level_keys() {
        assert!(load_routing_str("typo_field: 1\n").is_err());
    }

    #[test]
    fn parses_overrides() {
        let doc = r#"
complexity_kind:
  complex: cli
provider_weights:
  fast-api: 0.5
budget:
  remaining_budget_usd: 12.5
"#;
        let parsed = load_routing_str(doc).unwrap();
        assert_eq!(parsed.budget.remaining_budget_usd, Some(12.5));
        assert_eq!(parsed.provider_weights.get("fast-api"), Some(&0.5));
    }
}
