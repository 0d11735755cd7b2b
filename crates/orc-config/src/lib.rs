#![forbid(unsafe_code)]
//! Startup configuration for the worker orchestration core (spec §6
//! "Configuration"): `providers.yaml` (a list of `Provider` records, with
//! `${VAR}` interpolation in endpoints) and an optional `routing.yaml`
//! (complexity→kind table, per-provider weights, budget caps). Unknown keys
//! are rejected at load time.
//!
//! Grounded on `mcp/runtime.rs::resolve_streamable_http`'s
//! `${VAR}`-into-bearer-token resolution in the codex wrapper workspace, widened
//! into a general string-interpolation pass over every provider's
//! `endpoint`/`config_path` field.

mod error;
mod interpolate;
mod providers;
mod routing;

pub use error::ConfigError;
pub use providers::load_providers_str;
pub use routing::{BudgetCaps, RoutingConfig};

use std::path::Path;

use orc_types::ProviderCatalog;

/// Loads and validates `providers.yaml` from disk, interpolating `${VAR}`
/// references against the process environment.
pub fn load_providers(path: impl AsRef<Path>) -> Result<ProviderCatalog, ConfigError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    load_providers_str(&raw)
}

/// Loads `routing.yaml` if present; returns `RoutingConfig::default()` when
/// the file is absent, since routing overrides are optional (spec §6).
pub fn load_routing(path: impl AsRef<Path>) -> Result<RoutingConfig, ConfigError> {
    let path = path.as_ref();
    match std::fs::read_to_string(path) {
        Ok(raw) => routing::load_routing_str(&raw),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(RoutingConfig::default()),
        Err(source) => Err(ConfigError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}
