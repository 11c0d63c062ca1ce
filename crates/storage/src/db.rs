use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use reckon_core::{
    Amount, Batch, BatchId, Category, CategoryId, Classification, NewBatch, NewTransaction,
    OwnerId, StoreError, Subcategory, SubcategoryId, Transaction,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::time::Duration;

pub type DbPool = Pool<Sqlite>;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub async fn create_db(path: &Path) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5))
        .pragma("cache_size", "-32000");

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS batches (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id TEXT NOT NULL,
            source_name TEXT NOT NULL,
            created_at TEXT NOT NULL,
            new_rows INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id TEXT NOT NULL,
            name TEXT NOT NULL COLLATE NOCASE,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE (owner_id, name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS subcategories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id TEXT NOT NULL,
            category_id INTEGER NOT NULL,
            name TEXT NOT NULL COLLATE NOCASE,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE (owner_id, name),
            FOREIGN KEY (category_id) REFERENCES categories(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // (owner_id, unique_id) is the dedup guarantee; concurrent batches rely on it.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id TEXT NOT NULL,
            unique_id TEXT NOT NULL,
            batch_id INTEGER NOT NULL,
            date TEXT NOT NULL,
            account TEXT NOT NULL,
            kind TEXT NOT NULL,
            category TEXT,
            subcategory TEXT,
            notes TEXT,
            amount TEXT NOT NULL,
            linked_transaction_id TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE (owner_id, unique_id),
            FOREIGN KEY (batch_id) REFERENCES batches(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_batches_owner ON batches (owner_id, created_at)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Maps a sqlx error onto the store boundary, surfacing unique violations as
/// [`StoreError::Conflict`].
pub(crate) fn store_error(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(db.message().to_string())
        }
        _ => StoreError::Backend(e.to_string()),
    }
}

// ── Transactions ──────────────────────────────────────────────────────────────

type TransactionRow = (
    i64,
    String,
    String,
    i64,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    String,
    Option<String>,
);

const TRANSACTION_COLUMNS: &str = "id, owner_id, unique_id, batch_id, date, account, kind, \
     category, subcategory, notes, amount, linked_transaction_id";

fn owner_from_row(raw: &str) -> Result<OwnerId, StoreError> {
    OwnerId::new(raw).map_err(|_| StoreError::InvalidData(format!("blank owner id: '{raw}'")))
}

fn transaction_from_row(r: TransactionRow) -> Result<Transaction, StoreError> {
    let date = NaiveDate::parse_from_str(&r.4, DATE_FORMAT)
        .map_err(|_| StoreError::InvalidData(format!("date '{}' on transaction {}", r.4, r.2)))?;
    let amount = Amount::parse(&r.10)
        .map_err(|_| StoreError::InvalidData(format!("amount '{}' on transaction {}", r.10, r.2)))?;

    Ok(Transaction {
        id: r.0,
        owner_id: owner_from_row(&r.1)?,
        unique_id: r.2,
        batch_id: BatchId(r.3),
        date,
        account: r.5,
        kind: r.6,
        category: r.7,
        subcategory: r.8,
        notes: r.9,
        amount,
        linked_transaction_id: r.11,
    })
}

pub async fn get_transaction(
    pool: &DbPool,
    owner: &OwnerId,
    unique_id: &str,
) -> Result<Option<Transaction>, StoreError> {
    let row = sqlx::query_as::<_, TransactionRow>(&format!(
        "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE owner_id = ? AND unique_id = ?"
    ))
    .bind(owner.as_str())
    .bind(unique_id)
    .fetch_optional(pool)
    .await
    .map_err(store_error)?;

    row.map(transaction_from_row).transpose()
}

pub async fn insert_transaction(
    pool: &DbPool,
    tx: &NewTransaction,
) -> Result<Transaction, StoreError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO transactions (owner_id, unique_id, batch_id, date, account, kind, category, subcategory, notes, amount, linked_transaction_id) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(tx.owner_id.as_str())
    .bind(&tx.unique_id)
    .bind(tx.batch_id.0)
    .bind(tx.date.format(DATE_FORMAT).to_string())
    .bind(&tx.account)
    .bind(&tx.kind)
    .bind(&tx.classification.category)
    .bind(&tx.classification.subcategory)
    .bind(&tx.notes)
    .bind(tx.amount.to_string())
    .bind(&tx.linked_transaction_id)
    .fetch_one(pool)
    .await
    .map_err(store_error)?;

    Ok(Transaction::from_new(id, tx.clone()))
}

pub async fn set_transaction_classification(
    pool: &DbPool,
    owner: &OwnerId,
    unique_id: &str,
    classification: &Classification,
) -> Result<bool, StoreError> {
    let result = sqlx::query(
        "UPDATE transactions SET category = ?, subcategory = ? WHERE owner_id = ? AND unique_id = ?",
    )
    .bind(&classification.category)
    .bind(&classification.subcategory)
    .bind(owner.as_str())
    .bind(unique_id)
    .execute(pool)
    .await
    .map_err(store_error)?;

    Ok(result.rows_affected() > 0)
}

pub async fn get_owner_transactions(
    pool: &DbPool,
    owner: &OwnerId,
) -> Result<Vec<Transaction>, StoreError> {
    let rows = sqlx::query_as::<_, TransactionRow>(&format!(
        "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE owner_id = ? ORDER BY id"
    ))
    .bind(owner.as_str())
    .fetch_all(pool)
    .await
    .map_err(store_error)?;

    rows.into_iter().map(transaction_from_row).collect()
}

pub async fn delete_transaction(
    pool: &DbPool,
    owner: &OwnerId,
    unique_id: &str,
) -> Result<bool, StoreError> {
    let result = sqlx::query("DELETE FROM transactions WHERE owner_id = ? AND unique_id = ?")
        .bind(owner.as_str())
        .bind(unique_id)
        .execute(pool)
        .await
        .map_err(store_error)?;

    Ok(result.rows_affected() > 0)
}

pub async fn clear_owner_ledger(pool: &DbPool, owner: &OwnerId) -> Result<u64, StoreError> {
    let mut db_tx = pool.begin().await.map_err(store_error)?;

    let removed = sqlx::query("DELETE FROM transactions WHERE owner_id = ?")
        .bind(owner.as_str())
        .execute(&mut *db_tx)
        .await
        .map_err(store_error)?
        .rows_affected();

    sqlx::query("DELETE FROM batches WHERE owner_id = ?")
        .bind(owner.as_str())
        .execute(&mut *db_tx)
        .await
        .map_err(store_error)?;

    db_tx.commit().await.map_err(store_error)?;

    Ok(removed)
}

// ── Taxonomy ──────────────────────────────────────────────────────────────────

pub async fn get_owner_categories(
    pool: &DbPool,
    owner: &OwnerId,
) -> Result<Vec<Category>, StoreError> {
    let rows = sqlx::query_as::<_, (i64, String)>(
        "SELECT id, name FROM categories WHERE owner_id = ? ORDER BY id",
    )
    .bind(owner.as_str())
    .fetch_all(pool)
    .await
    .map_err(store_error)?;

    Ok(rows
        .into_iter()
        .map(|r| Category {
            id: CategoryId(r.0),
            owner_id: owner.clone(),
            name: r.1,
        })
        .collect())
}

pub async fn get_category_by_id(
    pool: &DbPool,
    owner: &OwnerId,
    category_id: CategoryId,
) -> Result<Option<Category>, StoreError> {
    let row = sqlx::query_as::<_, (i64, String)>(
        "SELECT id, name FROM categories WHERE owner_id = ? AND id = ?",
    )
    .bind(owner.as_str())
    .bind(category_id.0)
    .fetch_optional(pool)
    .await
    .map_err(store_error)?;

    Ok(row.map(|r| Category {
        id: CategoryId(r.0),
        owner_id: owner.clone(),
        name: r.1,
    }))
}

pub async fn upsert_category(
    pool: &DbPool,
    owner: &OwnerId,
    name: &str,
) -> Result<Category, StoreError> {
    sqlx::query("INSERT OR IGNORE INTO categories (owner_id, name) VALUES (?, ?)")
        .bind(owner.as_str())
        .bind(name)
        .execute(pool)
        .await
        .map_err(store_error)?;

    // `name` carries NOCASE collation, so this finds the row whichever casing won.
    let row = sqlx::query_as::<_, (i64, String)>(
        "SELECT id, name FROM categories WHERE owner_id = ? AND name = ?",
    )
    .bind(owner.as_str())
    .bind(name)
    .fetch_optional(pool)
    .await
    .map_err(store_error)?
    .ok_or_else(|| StoreError::NotFound(format!("category '{name}' after upsert")))?;

    Ok(Category {
        id: CategoryId(row.0),
        owner_id: owner.clone(),
        name: row.1,
    })
}

pub async fn get_owner_subcategories(
    pool: &DbPool,
    owner: &OwnerId,
) -> Result<Vec<Subcategory>, StoreError> {
    let rows = sqlx::query_as::<_, (i64, i64, String)>(
        "SELECT id, category_id, name FROM subcategories WHERE owner_id = ? ORDER BY id",
    )
    .bind(owner.as_str())
    .fetch_all(pool)
    .await
    .map_err(store_error)?;

    Ok(rows
        .into_iter()
        .map(|r| Subcategory {
            id: SubcategoryId(r.0),
            owner_id: owner.clone(),
            category_id: CategoryId(r.1),
            name: r.2,
        })
        .collect())
}

pub async fn upsert_subcategory(
    pool: &DbPool,
    owner: &OwnerId,
    name: &str,
    category_id: CategoryId,
) -> Result<Subcategory, StoreError> {
    if get_category_by_id(pool, owner, category_id).await?.is_none() {
        return Err(StoreError::NotFound(format!(
            "category {category_id} for owner {owner}"
        )));
    }

    sqlx::query("INSERT OR IGNORE INTO subcategories (owner_id, category_id, name) VALUES (?, ?, ?)")
        .bind(owner.as_str())
        .bind(category_id.0)
        .bind(name)
        .execute(pool)
        .await
        .map_err(store_error)?;

    let row = sqlx::query_as::<_, (i64, i64, String)>(
        "SELECT id, category_id, name FROM subcategories WHERE owner_id = ? AND name = ?",
    )
    .bind(owner.as_str())
    .bind(name)
    .fetch_optional(pool)
    .await
    .map_err(store_error)?
    .ok_or_else(|| StoreError::NotFound(format!("subcategory '{name}' after upsert")))?;

    Ok(Subcategory {
        id: SubcategoryId(row.0),
        owner_id: owner.clone(),
        category_id: CategoryId(row.1),
        name: row.2,
    })
}

// ── Batches ───────────────────────────────────────────────────────────────────

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StoreError::InvalidData(format!("batch timestamp '{raw}'")))
}

pub async fn insert_batch(pool: &DbPool, batch: &NewBatch) -> Result<Batch, StoreError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO batches (owner_id, source_name, created_at, new_rows) VALUES (?, ?, ?, 0) RETURNING id",
    )
    .bind(batch.owner_id.as_str())
    .bind(&batch.source_name)
    .bind(batch.created_at.to_rfc3339_opts(SecondsFormat::Micros, true))
    .fetch_one(pool)
    .await
    .map_err(store_error)?;

    Ok(Batch {
        id: BatchId(id),
        owner_id: batch.owner_id.clone(),
        source_name: batch.source_name.clone(),
        created_at: batch.created_at,
        new_rows: 0,
    })
}

pub async fn set_batch_row_count(
    pool: &DbPool,
    batch_id: BatchId,
    new_rows: i64,
) -> Result<(), StoreError> {
    let result = sqlx::query("UPDATE batches SET new_rows = ? WHERE id = ?")
        .bind(new_rows)
        .bind(batch_id.0)
        .execute(pool)
        .await
        .map_err(store_error)?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(format!("batch {batch_id}")));
    }
    Ok(())
}

pub async fn get_batch_history(pool: &DbPool, owner: &OwnerId) -> Result<Vec<Batch>, StoreError> {
    let rows = sqlx::query_as::<_, (i64, String, String, i64)>(
        "SELECT id, source_name, created_at, new_rows FROM batches WHERE owner_id = ? AND new_rows > 0 ORDER BY created_at DESC, id DESC",
    )
    .bind(owner.as_str())
    .fetch_all(pool)
    .await
    .map_err(store_error)?;

    rows.into_iter()
        .map(|r| {
            Ok(Batch {
                id: BatchId(r.0),
                owner_id: owner.clone(),
                source_name: r.1,
                created_at: parse_timestamp(&r.2)?,
                new_rows: r.3,
            })
        })
        .collect()
}
