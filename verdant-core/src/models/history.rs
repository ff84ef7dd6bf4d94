use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::IdentificationResult;

/// What a caller hands to the history store; `id` and `created_at` are assigned on append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntryInput {
    pub image_reference: String,
    pub result: IdentificationResult,
}

/// One persisted identification. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    #[serde(default)]
    pub image_reference: String,
    pub result: IdentificationResult,
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    /// Entries without an image reference are kept on disk but hidden from listings.
    pub fn is_usable(&self) -> bool {
        !self.image_reference.trim().is_empty()
    }
}
