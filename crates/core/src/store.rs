use async_trait::async_trait;
use thiserror::Error;

use super::batch::{Batch, BatchId, NewBatch};
use super::owner::OwnerId;
use super::taxonomy::{Category, CategoryId, Subcategory};
use super::transaction::{Classification, NewTransaction, Transaction};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write, e.g. a `unique_id` that
    /// another batch committed first.
    #[error("Unique constraint violated: {0}")]
    Conflict(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid stored data: {0}")]
    InvalidData(String),
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

/// Persistence boundary for ledgers, taxonomies and batches.
///
/// Implementations must enforce uniqueness of `(owner, unique_id)` on
/// transactions and of `(owner, lower(name))` on categories and subcategories,
/// reporting a rejected transaction insert as [`StoreError::Conflict`].
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn find_transaction(
        &self,
        owner: &OwnerId,
        unique_id: &str,
    ) -> Result<Option<Transaction>, StoreError>;

    async fn create_transaction(&self, tx: &NewTransaction) -> Result<Transaction, StoreError>;

    /// Returns `false` when no transaction with `unique_id` exists for `owner`.
    async fn update_classification(
        &self,
        owner: &OwnerId,
        unique_id: &str,
        classification: &Classification,
    ) -> Result<bool, StoreError>;

    /// All of the owner's transactions in insertion order.
    async fn list_transactions(&self, owner: &OwnerId) -> Result<Vec<Transaction>, StoreError>;

    async fn delete_transaction(&self, owner: &OwnerId, unique_id: &str)
        -> Result<bool, StoreError>;

    /// Deletes every transaction and batch of the owner. Taxonomy is kept.
    async fn clear_ledger(&self, owner: &OwnerId) -> Result<u64, StoreError>;

    async fn list_categories(&self, owner: &OwnerId) -> Result<Vec<Category>, StoreError>;

    async fn list_subcategories(&self, owner: &OwnerId) -> Result<Vec<Subcategory>, StoreError>;

    /// Idempotent on the case-insensitive name; returns the stored row.
    async fn upsert_category(&self, owner: &OwnerId, name: &str) -> Result<Category, StoreError>;

    /// Idempotent on the case-insensitive name. Fails with
    /// [`StoreError::NotFound`] when `category_id` is not owned by `owner`.
    async fn upsert_subcategory(
        &self,
        owner: &OwnerId,
        name: &str,
        category_id: CategoryId,
    ) -> Result<Subcategory, StoreError>;

    async fn create_batch(&self, batch: &NewBatch) -> Result<Batch, StoreError>;

    async fn update_batch_row_count(&self, batch_id: BatchId, new_rows: i64)
        -> Result<(), StoreError>;

    /// Batches that added at least one row, newest first.
    async fn list_batches(&self, owner: &OwnerId) -> Result<Vec<Batch>, StoreError>;
}
