use serde::Deserialize;

use orc_types::{Provider, ProviderCatalog};

use crate::error::ConfigError;
use crate::interpolate::interpolate_env;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProvidersFile {
    providers: Vec<Provider>,
}

/// Parses an in-memory `providers.yaml` document. Split from
/// [`crate::load_providers`] so tests can exercise parsing without touching
/// the filesystem.
pub fn load_providers_str(raw: &str) -> Result<ProviderCatalog, ConfigError> {
    let parsed: ProvidersFile = serde_yaml::from_str(raw)?;

    let mut seen = std::collections::BTreeSet::new();
    let mut providers = Vec::with_capacity(parsed.providers.len());
    for mut provider in parsed.providers {
        if !seen.insert(provider.name.clone()) {
            return Err(ConfigError::DuplicateProvider(provider.name));
        }
        if provider.max_concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency(provider.name));
        }
        if let Some(endpoint) = &provider.endpoint {
            provider.endpoint = Some(interpolate_env(&provider.name, endpoint)?);
        }
        if let Some(config_path) = &provider.config_path {
            provider.config_path = Some(interpolate_env(&provider.name, config_path)?);
        }
        providers.push(provider);
    }

    Ok(ProviderCatalog::new(providers))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
providers:
  - name: cheap-api
    kind: api-openai-compat
    model_id: gpt-4o-mini
    context_window: 8192
    cost_per_input_token: 0.000001
    cost_per_output_token: 0.000002
    max_concurrency: 4
    endpoint: "https://api.example.com"
    tags: ["cheap"]
"#;

    #[test]
    fn parses_minimal_catalog() {
        let catalog = load_providers_str(DOC).unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(catalog.get("cheap-api").is_some());
    }

    #[test]
    fn rejects_unknown_keys() {
        let doc = format!("{DOC}\nbogus_top_level_key: true\n");
        assert!(load_providers_str(&doc).is_err());
    }

    #[test]
    fn rejects_duplicate_names() {
        let doc = format!(
            "providers:\n{body}\n{body}\n",
            body = "  - name: dup\n    kind: cli\n    model_id: m\n    context_window: 1\n    cost_per_input_token: 0\n    cost_per_output_token: 0\n    max_concurrency: 1"
        );
        assert!(matches!(
            load_providers_str(&doc),
            Err(ConfigError::DuplicateProvider(_))
        ));
    }

    #[test]
    fn rejects_zero_concurrency() {
        let doc = "providers:\n  - name: p\n    kind: cli\n    model_id: m\n    context_window: 1\n    cost_per_input_token: 0\n    cost_per_output_token: 0\n    max_concurrency: 0\n";
        assert!(matches!(
            load_providers_str(doc),
            Err(ConfigError::ZeroConcurrency(_))
        ));
    }
}
