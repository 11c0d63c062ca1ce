use async_trait::async_trait;
use reckon_core::{
    Batch, BatchId, Category, CategoryId, Classification, LedgerStore, NewBatch, NewTransaction,
    OwnerId, StoreError, Subcategory, Transaction,
};
use std::path::Path;

use crate::db::{self, store_error, DbPool};

/// [`LedgerStore`] backed by a SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteLedger {
    pool: DbPool,
}

impl SqliteLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let pool = db::create_db(path).await.map_err(store_error)?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl LedgerStore for SqliteLedger {
    async fn find_transaction(
        &self,
        owner: &OwnerId,
        unique_id: &str,
    ) -> Result<Option<Transaction>, StoreError> {
        db::get_transaction(&self.pool, owner, unique_id).await
    }

    async fn create_transaction(&self, tx: &NewTransaction) -> Result<Transaction, StoreError> {
        db::insert_transaction(&self.pool, tx).await
    }

    async fn update_classification(
        &self,
        owner: &OwnerId,
        unique_id: &str,
        classification: &Classification,
    ) -> Result<bool, StoreError> {
        db::set_transaction_classification(&self.pool, owner, unique_id, classification).await
    }

    async fn list_transactions(&self, owner: &OwnerId) -> Result<Vec<Transaction>, StoreError> {
        db::get_owner_transactions(&self.pool, owner).await
    }

    async fn delete_transaction(
        &self,
        owner: &OwnerId,
        unique_id: &str,
    ) -> Result<bool, StoreError> {
        db::delete_transaction(&self.pool, owner, unique_id).await
    }

    async fn clear_ledger(&self, owner: &OwnerId) -> Result<u64, StoreError> {
        db::clear_owner_ledger(&self.pool, owner).await
    }

    async fn list_categories(&self, owner: &OwnerId) -> Result<Vec<Category>, StoreError> {
        db::get_owner_categories(&self.pool, owner).await
    }

    async fn list_subcategories(&self, owner: &OwnerId) -> Result<Vec<Subcategory>, StoreError> {
        db::get_owner_subcategories(&self.pool, owner).await
    }

    async fn upsert_category(&self, owner: &OwnerId, name: &str) -> Result<Category, StoreError> {
        db::upsert_category(&self.pool, owner, name).await
    }

    async fn upsert_subcategory(
        &self,
        owner: &OwnerId,
        name: &str,
        category_id: CategoryId,
    ) -> Result<Subcategory, StoreError> {
        db::upsert_subcategory(&self.pool, owner, name, category_id).await
    }

    async fn create_batch(&self, batch: &NewBatch) -> Result<Batch, StoreError> {
        db::insert_batch(&self.pool, batch).await
    }

    async fn update_batch_row_count(
        &self,
        batch_id: BatchId,
        new_rows: i64,
    ) -> Result<(), StoreError> {
        db::set_batch_row_count(&self.pool, batch_id, new_rows).await
    }

    async fn list_batches(&self, owner: &OwnerId) -> Result<Vec<Batch>, StoreError> {
        db::get_batch_history(&self.pool, owner).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, Utc};
    use reckon_core::Amount;

    async fn test_ledger() -> (tempfile::TempDir, SqliteLedger) {
        let dir = tempfile::tempdir().unwrap();
        let ledger = SqliteLedger::open(&dir.path().join("test.db")).await.unwrap();
        (dir, ledger)
    }

    fn owner(id: &str) -> OwnerId {
        OwnerId::new(id).unwrap()
    }

    async fn batch(ledger: &SqliteLedger, owner_id: &OwnerId) -> Batch {
        ledger
            .create_batch(&NewBatch::now(owner_id.clone(), "upload.csv"))
            .await
            .unwrap()
    }

    fn new_tx(owner_id: &OwnerId, batch_id: BatchId, unique_id: &str) -> NewTransaction {
        NewTransaction {
            unique_id: unique_id.to_string(),
            owner_id: owner_id.clone(),
            batch_id,
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            account: "Checking".to_string(),
            kind: "Expense".to_string(),
            classification: Classification::new(Some("Food".into()), Some("Dining".into())),
            notes: Some("coffee shop".to_string()),
            amount: Amount::parse("-4.50").unwrap(),
            linked_transaction_id: Some("link-1".to_string()),
        }
    }

    #[tokio::test]
    async fn create_then_find_round_trips() {
        let (_dir, ledger) = test_ledger().await;
        let o = owner("alice");
        let b = batch(&ledger, &o).await;

        let created = ledger.create_transaction(&new_tx(&o, b.id, "tx-1")).await.unwrap();
        let found = ledger.find_transaction(&o, "tx-1").await.unwrap().unwrap();

        assert_eq!(created, found);
        assert_eq!(found.amount, Amount::parse("-4.5").unwrap());
        assert_eq!(found.linked_transaction_id.as_deref(), Some("link-1"));
        assert_eq!(found.batch_id, b.id);
    }

    #[tokio::test]
    async fn duplicate_unique_id_is_conflict() {
        let (_dir, ledger) = test_ledger().await;
        let o = owner("alice");
        let b = batch(&ledger, &o).await;

        ledger.create_transaction(&new_tx(&o, b.id, "tx-1")).await.unwrap();
        let err = ledger
            .create_transaction(&new_tx(&o, b.id, "tx-1"))
            .await
            .unwrap_err();

        assert!(err.is_conflict(), "got {err:?}");
        assert_eq!(ledger.list_transactions(&o).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unique_id_is_scoped_per_owner() {
        let (_dir, ledger) = test_ledger().await;
        let (a, b) = (owner("alice"), owner("bob"));
        let batch_a = batch(&ledger, &a).await;
        let batch_b = batch(&ledger, &b).await;

        ledger.create_transaction(&new_tx(&a, batch_a.id, "tx-1")).await.unwrap();
        ledger.create_transaction(&new_tx(&b, batch_b.id, "tx-1")).await.unwrap();

        assert!(ledger.find_transaction(&a, "tx-1").await.unwrap().is_some());
        assert!(ledger.find_transaction(&b, "tx-1").await.unwrap().is_some());
        assert!(ledger.find_transaction(&owner("carol"), "tx-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_transactions_keeps_insertion_order() {
        let (_dir, ledger) = test_ledger().await;
        let o = owner("alice");
        let b = batch(&ledger, &o).await;
        for id in ["c", "a", "b"] {
            ledger.create_transaction(&new_tx(&o, b.id, id)).await.unwrap();
        }
        let ids: Vec<_> = ledger
            .list_transactions(&o)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.unique_id)
            .collect();
        assert_eq!(ids, ["c", "a", "b"]);
    }

    #[tokio::test]
    async fn update_classification_touches_only_labels() {
        let (_dir, ledger) = test_ledger().await;
        let o = owner("alice");
        let b = batch(&ledger, &o).await;
        let before = ledger.create_transaction(&new_tx(&o, b.id, "tx-1")).await.unwrap();

        let updated = ledger
            .update_classification(
                &o,
                "tx-1",
                &Classification::new(Some("Travel".into()), None),
            )
            .await
            .unwrap();
        assert!(updated);

        let after = ledger.find_transaction(&o, "tx-1").await.unwrap().unwrap();
        assert_eq!(after.category.as_deref(), Some("Travel"));
        assert_eq!(after.subcategory, None);
        assert_eq!(after.amount, before.amount);
        assert_eq!(after.notes, before.notes);
        assert_eq!(after.date, before.date);
    }

    #[tokio::test]
    async fn update_classification_unknown_id_returns_false() {
        let (_dir, ledger) = test_ledger().await;
        let updated = ledger
            .update_classification(&owner("alice"), "nope", &Classification::unclassified())
            .await
            .unwrap();
        assert!(!updated);
    }

    #[tokio::test]
    async fn delete_is_owner_scoped() {
        let (_dir, ledger) = test_ledger().await;
        let (a, b) = (owner("alice"), owner("bob"));
        let batch_a = batch(&ledger, &a).await;
        ledger.create_transaction(&new_tx(&a, batch_a.id, "tx-1")).await.unwrap();

        assert!(!ledger.delete_transaction(&b, "tx-1").await.unwrap());
        assert!(ledger.delete_transaction(&a, "tx-1").await.unwrap());
        assert!(ledger.find_transaction(&a, "tx-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clear_ledger_keeps_taxonomy_and_other_owners() {
        let (_dir, ledger) = test_ledger().await;
        let (a, b) = (owner("alice"), owner("bob"));
        let batch_a = batch(&ledger, &a).await;
        let batch_b = batch(&ledger, &b).await;
        ledger.create_transaction(&new_tx(&a, batch_a.id, "1")).await.unwrap();
        ledger.create_transaction(&new_tx(&a, batch_a.id, "2")).await.unwrap();
        ledger.create_transaction(&new_tx(&b, batch_b.id, "1")).await.unwrap();
        ledger.update_batch_row_count(batch_a.id, 2).await.unwrap();
        ledger.upsert_category(&a, "Food").await.unwrap();

        assert_eq!(ledger.clear_ledger(&a).await.unwrap(), 2);

        assert!(ledger.list_transactions(&a).await.unwrap().is_empty());
        assert!(ledger.list_batches(&a).await.unwrap().is_empty());
        assert_eq!(ledger.list_categories(&a).await.unwrap().len(), 1);
        assert_eq!(ledger.list_transactions(&b).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn category_upsert_is_case_insensitive_and_case_preserving() {
        let (_dir, ledger) = test_ledger().await;
        let o = owner("alice");

        let first = ledger.upsert_category(&o, "Food").await.unwrap();
        let second = ledger.upsert_category(&o, "FOOD").await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "Food");
        assert_eq!(ledger.list_categories(&o).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn categories_are_per_owner() {
        let (_dir, ledger) = test_ledger().await;
        let a = ledger.upsert_category(&owner("alice"), "Food").await.unwrap();
        let b = ledger.upsert_category(&owner("bob"), "Food").await.unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn subcategory_upsert_requires_same_owner_parent() {
        let (_dir, ledger) = test_ledger().await;
        let (a, b) = (owner("alice"), owner("bob"));
        let food = ledger.upsert_category(&a, "Food").await.unwrap();

        let err = ledger.upsert_subcategory(&b, "Dining", food.id).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));

        let dining = ledger.upsert_subcategory(&a, "Dining", food.id).await.unwrap();
        let again = ledger.upsert_subcategory(&a, "dining", food.id).await.unwrap();
        assert_eq!(dining.id, again.id);
        assert_eq!(again.name, "Dining");
        assert_eq!(again.category_id, food.id);
        assert!(ledger.list_subcategories(&b).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn batch_history_lists_only_batches_with_rows_newest_first() {
        let (_dir, ledger) = test_ledger().await;
        let o = owner("alice");
        let now = Utc::now();
        let mut ids = Vec::new();
        for (i, name) in ["jan.csv", "feb.csv", "empty.csv"].iter().enumerate() {
            let b = ledger
                .create_batch(&NewBatch {
                    owner_id: o.clone(),
                    source_name: name.to_string(),
                    created_at: now + Duration::seconds(i as i64),
                })
                .await
                .unwrap();
            assert_eq!(b.new_rows, 0);
            ids.push(b.id);
        }
        ledger.update_batch_row_count(ids[0], 3).await.unwrap();
        ledger.update_batch_row_count(ids[1], 1).await.unwrap();

        let history = ledger.list_batches(&o).await.unwrap();
        let names: Vec<_> = history.iter().map(|b| b.source_name.as_str()).collect();
        assert_eq!(names, ["feb.csv", "jan.csv"]);
        assert_eq!(history[1].new_rows, 3);
    }

    #[tokio::test]
    async fn update_unknown_batch_is_not_found() {
        let (_dir, ledger) = test_ledger().await;
        let err = ledger.update_batch_row_count(BatchId(404), 1).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
