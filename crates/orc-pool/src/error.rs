use orc_types::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("provider `{0}` is not registered with this pool")]
    UnknownProvider(String),
    #[error("provider `{0}` or the global pool is saturated")]
    Saturated(String),
}

impl PoolError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Saturated
    }
}
