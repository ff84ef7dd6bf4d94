//! Identify-then-record flow used after a photo is taken.
//!
//! Showing the result and persisting it are independent: a storage failure,
//! including failing to open the history at all, is reported alongside the
//! result, never instead of it.

use crate::config::VerdantConfig;
use crate::error::VerdantError;
use crate::history::HistoryStore;
use crate::identify::{IdentifyError, Identifier};
use crate::models::{HistoryEntry, HistoryEntryInput, IdentificationResult};

#[derive(Debug)]
pub struct Capture {
    pub result: IdentificationResult,
    pub entry: Option<HistoryEntry>,
    pub persist_error: Option<VerdantError>,
}

impl Capture {
    pub fn new(result: IdentificationResult) -> Self {
        Self {
            result,
            entry: None,
            persist_error: None,
        }
    }

    /// Append this result to `history`, keeping any failure on the capture.
    pub async fn record(&mut self, history: &HistoryStore, image_reference: &str) {
        let input = HistoryEntryInput {
            image_reference: image_reference.to_string(),
            result: self.result.clone(),
        };
        match history.append(input).await {
            Ok(entry) => self.entry = Some(entry),
            Err(e) => self.record_failed(e.into()),
        }
    }

    pub fn record_failed(&mut self, error: VerdantError) {
        tracing::warn!(
            error = %error,
            "Identification succeeded but could not be saved to history"
        );
        self.persist_error = Some(error);
    }
}

/// Identify `image` and, when a history is given, append the result to it.
pub async fn identify_and_record(
    identifier: &dyn Identifier,
    history: Option<&HistoryStore>,
    image: &[u8],
    image_reference: &str,
) -> Result<Capture, IdentifyError> {
    let result = identifier.identify(image).await?;
    tracing::debug!(backend = identifier.name(), "Identification complete");

    let mut capture = Capture::new(result);
    if let Some(history) = history {
        capture.record(history, image_reference).await;
    }
    Ok(capture)
}

/// Identify first, then open the configured history only if `save` is set.
///
/// The history is opened after the identification has succeeded, so an
/// unusable data directory costs the save and nothing else.
pub async fn identify_and_save(
    config: &VerdantConfig,
    identifier: &dyn Identifier,
    image: &[u8],
    image_reference: &str,
    save: bool,
) -> Result<Capture, IdentifyError> {
    let mut capture = identify_and_record(identifier, None, image, image_reference).await?;
    if save {
        match config.open_history().await {
            Ok(history) => capture.record(&history, image_reference).await,
            Err(e) => capture.record_failed(e),
        }
    }
    Ok(capture)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NO_DESCRIPTION;
    use crate::storage::{KeyValueStore, MemoryStore, StorageError};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct FixedIdentifier(Option<IdentificationResult>);

    #[async_trait]
    impl Identifier for FixedIdentifier {
        async fn identify(&self, _image: &[u8]) -> Result<IdentificationResult, IdentifyError> {
            self.0.clone().ok_or(IdentifyError::Upstream {
                status_code: 503,
                body: "busy".to_string(),
            })
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct ReadOnlyStore;

    #[async_trait]
    impl KeyValueStore for ReadOnlyStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Ok(None)
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Backend("read-only".to_string()))
        }

        async fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Ok(())
        }
    }

    fn fern() -> IdentificationResult {
        IdentificationResult {
            species_name: "Nephrolepis exaltata".to_string(),
            probability: 0.74,
            scientific_name: "Nephrolepis exaltata".to_string(),
            common_names: vec!["Boston fern".to_string()],
            description: NO_DESCRIPTION.to_string(),
            reference_url: String::new(),
            similar_images: vec![],
        }
    }

    #[tokio::test]
    async fn test_records_successful_identification() {
        let history = HistoryStore::new(Arc::new(MemoryStore::new()));
        let identifier = FixedIdentifier(Some(fern()));

        let capture = identify_and_record(&identifier, Some(&history), b"img", "file:///fern.jpg")
            .await
            .unwrap();

        assert_eq!(capture.result, fern());
        assert!(capture.persist_error.is_none());
        let entry = capture.entry.unwrap();
        assert_eq!(history.list().await.unwrap(), vec![entry]);
    }

    #[tokio::test]
    async fn test_without_history_records_nothing() {
        let identifier = FixedIdentifier(Some(fern()));

        let capture = identify_and_record(&identifier, None, b"img", "fern.jpg")
            .await
            .unwrap();

        assert_eq!(capture.result, fern());
        assert!(capture.entry.is_none());
        assert!(capture.persist_error.is_none());
    }

    #[tokio::test]
    async fn test_storage_failure_still_returns_result() {
        let history = HistoryStore::new(Arc::new(ReadOnlyStore));
        let identifier = FixedIdentifier(Some(fern()));

        let capture = identify_and_record(&identifier, Some(&history), b"img", "fern.jpg")
            .await
            .unwrap();

        assert_eq!(capture.result.species_name, "Nephrolepis exaltata");
        assert!(capture.entry.is_none());
        assert!(matches!(
            capture.persist_error,
            Some(VerdantError::Storage(StorageError::Backend(_)))
        ));
    }

    #[tokio::test]
    async fn test_identify_failure_records_nothing() {
        let history = HistoryStore::new(Arc::new(MemoryStore::new()));
        let identifier = FixedIdentifier(None);

        let err = identify_and_record(&identifier, Some(&history), b"img", "fern.jpg")
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), Some(503));
        assert!(history.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_unopenable_data_dir_still_returns_result() {
        let blocker = tempfile::NamedTempFile::new().unwrap();
        let mut config = VerdantConfig::default();
        config.history.data_dir = blocker.path().join("sub");
        let identifier = FixedIdentifier(Some(fern()));

        let capture = identify_and_save(&config, &identifier, b"img", "fern.jpg", true)
            .await
            .unwrap();

        assert_eq!(capture.result, fern());
        assert!(capture.entry.is_none());
        assert!(matches!(
            capture.persist_error,
            Some(VerdantError::Storage(StorageError::Io(_)))
        ));
    }

    #[tokio::test]
    async fn test_no_save_never_opens_history() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = VerdantConfig::default();
        config.history.data_dir = dir.path().join("history");
        let identifier = FixedIdentifier(Some(fern()));

        let capture = identify_and_save(&config, &identifier, b"img", "fern.jpg", false)
            .await
            .unwrap();

        assert!(capture.entry.is_none());
        assert!(capture.persist_error.is_none());
        assert!(!dir.path().join("history").exists());
    }

    #[tokio::test]
    async fn test_identify_and_save_writes_to_configured_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = VerdantConfig::default();
        config.history.data_dir = dir.path().to_path_buf();
        let identifier = FixedIdentifier(Some(fern()));

        let capture = identify_and_save(&config, &identifier, b"img", "fern.jpg", true)
            .await
            .unwrap();

        let entry = capture.entry.unwrap();
        let history = config.open_history().await.unwrap();
        assert_eq!(history.list().await.unwrap(), vec![entry]);
    }
}
