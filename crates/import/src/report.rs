use std::collections::HashSet;

use chrono::NaiveDate;
use reckon_core::{name_key, Amount, BatchId, Transaction};
use serde::{Deserialize, Serialize};

/// Labels in first-seen order, deduplicated case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSet {
    keys: HashSet<String>,
    labels: Vec<String>,
}

impl LabelSet {
    pub fn insert(&mut self, label: String) -> bool {
        if self.keys.insert(name_key(&label)) {
            self.labels.push(label);
            true
        } else {
            false
        }
    }

    pub fn into_vec(self) -> Vec<String> {
        self.labels
    }
}

/// Classification detail for one added row, enough for a review step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowResult {
    pub id: String,
    pub date: NaiveDate,
    pub account: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub notes: Option<String>,
    pub amount: Amount,
    pub auto_suggested: bool,
}

impl RowResult {
    pub fn from_transaction(tx: Transaction, auto_suggested: bool) -> Self {
        RowResult {
            id: tx.unique_id,
            date: tx.date,
            account: tx.account,
            kind: tx.kind,
            category: tx.category,
            subcategory: tx.subcategory,
            notes: tx.notes,
            amount: tx.amount,
            auto_suggested,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub batch_id: BatchId,
    pub total_rows: usize,
    pub added: usize,
    pub skipped: usize,
    pub skipped_ids: Vec<String>,
    pub per_row_result: Vec<RowResult>,
    pub new_category_suggestions: Vec<String>,
    pub new_subcategory_suggestions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkReport {
    pub added: usize,
    pub skipped: usize,
    pub skipped_ids: Vec<String>,
}

impl From<IngestReport> for BulkReport {
    fn from(report: IngestReport) -> Self {
        BulkReport {
            added: report.added,
            skipped: report.skipped,
            skipped_ids: report.skipped_ids,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewItem {
    pub id: String,
    pub category: Option<String>,
    pub subcategory: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Updated,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewOutcome {
    pub id: String,
    pub status: ReviewStatus,
}
