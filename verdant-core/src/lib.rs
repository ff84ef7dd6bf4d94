pub mod capture;
pub mod config;
pub mod error;
pub mod history;
pub mod identify;
pub mod models;
pub mod storage;

pub use capture::{identify_and_record, identify_and_save, Capture};
pub use config::VerdantConfig;
pub use error::VerdantError;
pub use history::{HistoryStore, RetentionPolicy, DEFAULT_STORAGE_KEY};
pub use identify::{ClientConfig, IdentifyError, Identifier, PlantIdClient};
pub use models::{HistoryEntry, HistoryEntryInput, IdentificationResult, SimilarImage};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
