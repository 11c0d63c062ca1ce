//! The per-row pipeline shared by every entry point: dedup gate, keyword
//! classification, taxonomy synchronisation and the ledger write.
//!
//! Rows are folded one at a time into a [`BatchTally`]. Each row's writes are
//! awaited before the next row starts.

use reckon_core::{BatchId, LedgerStore, OwnerId};
use tracing::{debug, warn};

use crate::classify::KeywordMap;
use crate::normalize::{NormalizedRow, Rejected};
use crate::report::{LabelSet, RowResult};
use crate::taxonomy::TaxonomySync;

/// Where a batch's rows came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowSource {
    /// Parsed from an uploaded file. Unclassified rows go through the keyword map.
    Upload,
    /// Fully specified rows. Labels are taken as given.
    Structured,
}

/// Accumulator threaded through a batch.
#[derive(Debug, Clone, Default)]
pub struct BatchTally {
    pub total_rows: usize,
    pub added: Vec<RowResult>,
    pub skipped_ids: Vec<String>,
    pub new_categories: LabelSet,
    pub new_subcategories: LabelSet,
}

impl BatchTally {
    fn skip(mut self, id: String) -> Self {
        self.skipped_ids.push(id);
        self
    }
}

pub struct Reconciler<'a, S: ?Sized> {
    store: &'a S,
    owner: &'a OwnerId,
    batch_id: BatchId,
    source: RowSource,
    keywords: KeywordMap,
    taxonomy: TaxonomySync<'a, S>,
}

impl<'a, S: LedgerStore + ?Sized> Reconciler<'a, S> {
    pub fn new(
        store: &'a S,
        owner: &'a OwnerId,
        batch_id: BatchId,
        source: RowSource,
        keywords: KeywordMap,
        taxonomy: TaxonomySync<'a, S>,
    ) -> Self {
        Self {
            store,
            owner,
            batch_id,
            source,
            keywords,
            taxonomy,
        }
    }

    pub async fn run<I>(mut self, rows: I) -> BatchTally
    where
        I: IntoIterator<Item = Result<NormalizedRow, Rejected>>,
    {
        let mut tally = BatchTally::default();
        for row in rows {
            tally = self.step(tally, row).await;
        }
        tally
    }

    pub async fn step(
        &mut self,
        mut tally: BatchTally,
        row: Result<NormalizedRow, Rejected>,
    ) -> BatchTally {
        tally.total_rows += 1;

        let row = match row {
            Ok(row) => row,
            Err(rejected) => {
                warn!(id = %rejected.id, error = %rejected.error, "row rejected");
                return tally.skip(rejected.id);
            }
        };

        match self.store.find_transaction(self.owner, &row.unique_id).await {
            Ok(Some(_)) => {
                debug!(id = %row.unique_id, "already in ledger");
                return tally.skip(row.unique_id);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(id = %row.unique_id, error = %e, "dedup lookup failed");
                return tally.skip(row.unique_id);
            }
        }

        let (requested, auto_suggested) = match self.source {
            RowSource::Upload => {
                let suggestion = self
                    .keywords
                    .classify(row.notes.as_deref(), row.classification.clone());
                (suggestion.classification, suggestion.auto_suggested)
            }
            RowSource::Structured => (row.classification.clone(), false),
        };

        let outcome = self.taxonomy.resolve(requested).await;
        if let Some(name) = outcome.new_category {
            tally.new_categories.insert(name);
        }
        if let Some(name) = outcome.new_subcategory {
            tally.new_subcategories.insert(name);
        }

        let id = row.unique_id.clone();
        let new_tx = row.into_new_transaction(self.owner, self.batch_id, outcome.classification);
        match self.store.create_transaction(&new_tx).await {
            Ok(tx) => {
                debug!(id = %tx.unique_id, auto_suggested, "row added");
                tally.added.push(RowResult::from_transaction(tx, auto_suggested));
                tally
            }
            Err(e) if e.is_conflict() => {
                debug!(id = %id, "lost insert race; skipping");
                tally.skip(id)
            }
            Err(e) => {
                warn!(id = %id, error = %e, "row write failed");
                tally.skip(id)
            }
        }
    }
}
