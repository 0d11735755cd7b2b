use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::worker::WorkerMethod;

/// Backend modality a `Provider` record binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    Acp,
    Cli,
    ApiAnthropic,
    ApiOpenaiCompat,
}

impl ProviderKind {
    /// The `method` a provider of this kind is dispatched through when the
    /// router picks it via manual override without an explicit method.
    pub fn preferred_method(self) -> WorkerMethod {
        match self {
            ProviderKind::Acp => WorkerMethod::Acp,
            ProviderKind::Cli => WorkerMethod::Cli,
            ProviderKind::ApiAnthropic | ProviderKind::ApiOpenaiCompat => WorkerMethod::Api,
        }
    }
}

/// A catalog record binding a backend kind to a model, pricing, and
/// concurrency cap. Loaded once at startup and treated as read-only
/// (spec §3 "Providers are loaded once; the catalog is treated as read-only
/// at runtime").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub name: String,
    pub kind: ProviderKind,
    pub model_id: String,
    pub context_window: u64,
    pub cost_per_input_token: f64,
    pub cost_per_output_token: f64,
    pub max_concurrency: u32,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub config_path: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Provider {
    pub fn estimated_cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        input_tokens as f64 * self.cost_per_input_token
            + output_tokens as f64 * self.cost_per_output_token
    }
}

/// Read-only collection of providers, indexed by name. Built once at startup
/// from `providers.yaml` by `orc-config` and handed to the router and pool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderCatalog {
    providers: BTreeMap<String, Provider>,
}

impl ProviderCatalog {
    pub fn new(providers: impl IntoIterator<Item = Provider>) -> Self {
        Self {
            providers: providers.into_iter().map(|p| (p.name.clone(), p)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Provider> {
        self.providers.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Provider> {
        self.providers.values()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
