use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Identity of the ledger owner every record is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: &str) -> Result<Self, AuthError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(AuthError::Unauthenticated);
        }
        Ok(OwnerId(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Unauthenticated")]
    Unauthenticated,
    #[error("Malformed credential: {0}")]
    MalformedCredential(String),
}

/// Maps a caller credential (e.g. a bearer token) to the owner it acts for.
pub trait OwnerResolver: Send + Sync {
    fn resolve(&self, credential: Option<&str>) -> Result<OwnerId, AuthError>;
}
