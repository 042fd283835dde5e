use thiserror::Error;

use crate::app::builder::BuildError;
use crate::ports::{BrokerError, StoreError};
use crate::typed::RegistryError;

#[derive(Debug, Error)]
pub enum LaneworkError {
    /// Rejected input; never retried.
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Build(#[from] BuildError),
}

impl LaneworkError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
