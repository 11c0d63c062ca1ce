use std::collections::HashMap;

use reckon_core::{AuthError, OwnerId, OwnerResolver};
use sha2::{Digest, Sha256};

use crate::config::OwnerToken;

/// Resolves `Authorization: Bearer <token>` by the SHA-256 of the token.
/// Only digests are held in memory.
#[derive(Debug, Clone, Default)]
pub struct TokenOwnerResolver {
    owners_by_digest: HashMap<String, OwnerId>,
}

impl TokenOwnerResolver {
    pub fn from_tokens(tokens: &[OwnerToken]) -> Result<Self, AuthError> {
        let mut owners_by_digest = HashMap::new();
        for token in tokens {
            owners_by_digest.insert(
                token.token_sha256.trim().to_lowercase(),
                OwnerId::new(&token.id)?,
            );
        }
        Ok(Self { owners_by_digest })
    }

    pub fn is_empty(&self) -> bool {
        self.owners_by_digest.is_empty()
    }
}

pub fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

impl OwnerResolver for TokenOwnerResolver {
    fn resolve(&self, credential: Option<&str>) -> Result<OwnerId, AuthError> {
        let credential = credential.ok_or(AuthError::Unauthenticated)?;
        let (scheme, token) = credential
            .trim()
            .split_once(' ')
            .ok_or_else(|| AuthError::MalformedCredential("expected a bearer token".into()))?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return Err(AuthError::MalformedCredential(format!(
                "unsupported scheme '{scheme}'"
            )));
        }
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::MalformedCredential("empty token".into()));
        }
        self.owners_by_digest
            .get(&token_digest(token))
            .cloned()
            .ok_or(AuthError::Unauthenticated)
    }
}
