//! A SQLite-backed store with switchable faults for exercising the engine's
//! failure paths.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use reckon_core::{
    name_key, Batch, BatchId, Category, CategoryId, Classification, LedgerStore, NewBatch,
    NewTransaction, OwnerId, StoreError, Subcategory, Transaction,
};
use reckon_storage::SqliteLedger;

pub struct FaultyLedger {
    inner: SqliteLedger,
    blind_dedup: bool,
    fail_create: HashSet<String>,
    fail_category: HashSet<String>,
    fail_batch_update: bool,
}

impl FaultyLedger {
    pub async fn open(path: &Path) -> Self {
        FaultyLedger {
            inner: SqliteLedger::open(path).await.unwrap(),
            blind_dedup: false,
            fail_create: HashSet::new(),
            fail_category: HashSet::new(),
            fail_batch_update: false,
        }
    }

    /// Lookups always miss, as if a concurrent batch committed in between.
    pub fn blind_dedup(mut self) -> Self {
        self.blind_dedup = true;
        self
    }

    pub fn fail_create_for(mut self, unique_id: &str) -> Self {
        self.fail_create.insert(unique_id.to_string());
        self
    }

    pub fn fail_category(mut self, name: &str) -> Self {
        self.fail_category.insert(name_key(name));
        self
    }

    pub fn fail_batch_update(mut self) -> Self {
        self.fail_batch_update = true;
        self
    }
}

fn injected() -> StoreError {
    StoreError::Backend("injected failure".to_string())
}

#[async_trait]
impl LedgerStore for FaultyLedger {
    async fn find_transaction(
        &self,
        owner: &OwnerId,
        unique_id: &str,
    ) -> Result<Option<Transaction>, StoreError> {
        if self.blind_dedup {
            return Ok(None);
        }
        self.inner.find_transaction(owner, unique_id).await
    }

    async fn create_transaction(&self, tx: &NewTransaction) -> Result<Transaction, StoreError> {
        if self.fail_create.contains(&tx.unique_id) {
            return Err(injected());
        }
        self.inner.create_transaction(tx).await
    }

    async fn update_classification(
        &self,
        owner: &OwnerId,
        unique_id: &str,
        classification: &Classification,
    ) -> Result<bool, StoreError> {
        self.inner
            .update_classification(owner, unique_id, classification)
            .await
    }

    async fn list_transactions(&self, owner: &OwnerId) -> Result<Vec<Transaction>, StoreError> {
        self.inner.list_transactions(owner).await
    }

    async fn delete_transaction(
        &self,
        owner: &OwnerId,
        unique_id: &str,
    ) -> Result<bool, StoreError> {
        self.inner.delete_transaction(owner, unique_id).await
    }

    async fn clear_ledger(&self, owner: &OwnerId) -> Result<u64, StoreError> {
        self.inner.clear_ledger(owner).await
    }

    async fn list_categories(&self, owner: &OwnerId) -> Result<Vec<Category>, StoreError> {
        self.inner.list_categories(owner).await
    }

    async fn list_subcategories(&self, owner: &OwnerId) -> Result<Vec<Subcategory>, StoreError> {
        self.inner.list_subcategories(owner).await
    }

    async fn upsert_category(&self, owner: &OwnerId, name: &str) -> Result<Category, StoreError> {
        if self.fail_category.contains(&name_key(name)) {
            return Err(injected());
        }
        self.inner.upsert_category(owner, name).await
    }

    async fn upsert_subcategory(
        &self,
        owner: &OwnerId,
        name: &str,
        category_id: CategoryId,
    ) -> Result<Subcategory, StoreError> {
        self.inner.upsert_subcategory(owner, name, category_id).await
    }

    async fn create_batch(&self, batch: &NewBatch) -> Result<Batch, StoreError> {
        self.inner.create_batch(batch).await
    }

    async fn update_batch_row_count(
        &self,
        batch_id: BatchId,
        new_rows: i64,
    ) -> Result<(), StoreError> {
        if self.fail_batch_update {
            return Err(injected());
        }
        self.inner.update_batch_row_count(batch_id, new_rows).await
    }

    async fn list_batches(&self, owner: &OwnerId) -> Result<Vec<Batch>, StoreError> {
        self.inner.list_batches(owner).await
    }
}
