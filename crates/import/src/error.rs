use reckon_core::StoreError;
use thiserror::Error;

use crate::normalize::CsvError;

/// Call-level failures. Each one aborts the call before any row is written.
/// Owner resolution happens before the engine is called; an [`reckon_core::OwnerId`]
/// is always a resolved owner.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Unreadable input: {0}")]
    UnreadableInput(#[from] CsvError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}
