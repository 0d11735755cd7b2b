use std::path::PathBuf;

use orc_types::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("provider `{name}` references undefined environment variable `${{{var}}}`")]
    MissingEnvVar { name: String, var: String },
    #[error("duplicate provider name `{0}`")]
    DuplicateProvider(String),
    #[error("provider `{0}` has max_concurrency of 0")]
    ZeroConcurrency(String),
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ConfigInvalid
    }
}
