use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::amount::Amount;
use super::batch::BatchId;
use super::owner::OwnerId;

/// Category/subcategory labels attached to a transaction. The only part of a
/// transaction that may change after it is written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub category: Option<String>,
    pub subcategory: Option<String>,
}

impl Classification {
    pub fn new(category: Option<String>, subcategory: Option<String>) -> Self {
        Classification {
            category: non_blank(category),
            subcategory: non_blank(subcategory),
        }
    }

    pub fn unclassified() -> Self {
        Classification::default()
    }

    pub fn is_empty(&self) -> bool {
        self.category.is_none() && self.subcategory.is_none()
    }
}

/// Trims an optional label, mapping empty strings to `None`.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransaction {
    pub unique_id: String,
    pub owner_id: OwnerId,
    pub batch_id: BatchId,
    pub date: NaiveDate,
    pub account: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub classification: Classification,
    pub notes: Option<String>,
    pub amount: Amount,
    pub linked_transaction_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: i64,
    pub unique_id: String,
    pub owner_id: OwnerId,
    pub batch_id: BatchId,
    pub date: NaiveDate,
    pub account: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub notes: Option<String>,
    pub amount: Amount,
    pub linked_transaction_id: Option<String>,
}

impl Transaction {
    pub fn from_new(id: i64, tx: NewTransaction) -> Self {
        Transaction {
            id,
            unique_id: tx.unique_id,
            owner_id: tx.owner_id,
            batch_id: tx.batch_id,
            date: tx.date,
            account: tx.account,
            kind: tx.kind,
            category: tx.classification.category,
            subcategory: tx.classification.subcategory,
            notes: tx.notes,
            amount: tx.amount,
            linked_transaction_id: tx.linked_transaction_id,
        }
    }

    pub fn classification(&self) -> Classification {
        Classification {
            category: self.category.clone(),
            subcategory: self.subcategory.clone(),
        }
    }
}
