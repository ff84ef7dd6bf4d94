pub mod history;
pub mod identification;

pub use history::{HistoryEntry, HistoryEntryInput};
pub use identification::{IdentificationResult, SimilarImage, NO_DESCRIPTION};
