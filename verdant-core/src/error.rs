use thiserror::Error;

use crate::identify::IdentifyError;
use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum VerdantError {
    #[error("Identification error: {0}")]
    Identify(#[from] IdentifyError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
}
