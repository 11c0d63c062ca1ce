use std::io::Read;

use reckon_core::{
    build_tree, Category, CategoryId, CategoryNode, Classification, LedgerStore, NewBatch,
    OwnerId, Subcategory,
};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::classify::KeywordMap;
use crate::error::IngestError;
use crate::normalize::{
    read_raw_rows, IngestOptions, NormalizedRow, Normalizer, RawRow, Rejected, StructuredRow,
};
use crate::reconcile::{Reconciler, RowSource};
use crate::report::{BulkReport, IngestReport, ReviewItem, ReviewOutcome, ReviewStatus};
use crate::taxonomy::{TaxonomySnapshot, TaxonomySync};

/// Entry points of the ingestion engine over a [`LedgerStore`].
///
/// Holds no per-owner state: every call builds its own keyword map and
/// taxonomy snapshot.
pub struct Ingestor<S> {
    store: S,
    normalizer: Normalizer,
}

impl<S: LedgerStore> Ingestor<S> {
    pub fn new(store: S, options: &IngestOptions) -> Self {
        Self {
            store,
            normalizer: Normalizer::new(options),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Parses a headered CSV stream and reconciles it into the owner's ledger.
    ///
    /// An unreadable stream fails the call before anything is written.
    pub async fn ingest_csv<R: Read>(
        &self,
        owner: &OwnerId,
        source_name: &str,
        data: R,
    ) -> Result<IngestReport, IngestError> {
        let rows = read_raw_rows(data)?;
        self.ingest_raw_rows(owner, source_name, rows).await
    }

    pub async fn ingest_raw_rows(
        &self,
        owner: &OwnerId,
        source_name: &str,
        rows: Vec<RawRow>,
    ) -> Result<IngestReport, IngestError> {
        let rows = rows
            .iter()
            .map(|row| self.normalizer.normalize_raw(row))
            .collect();
        self.run_batch(owner, source_name, RowSource::Upload, rows).await
    }

    /// Reconciles fully specified rows. No keyword classification is applied.
    pub async fn bulk_ingest(
        &self,
        owner: &OwnerId,
        source_name: &str,
        rows: Vec<StructuredRow>,
    ) -> Result<BulkReport, IngestError> {
        let rows = rows
            .iter()
            .map(|row| self.normalizer.normalize_structured(row))
            .collect();
        let report = self
            .run_batch(owner, source_name, RowSource::Structured, rows)
            .await?;
        Ok(report.into())
    }

    async fn run_batch(
        &self,
        owner: &OwnerId,
        source_name: &str,
        source: RowSource,
        rows: Vec<Result<NormalizedRow, Rejected>>,
    ) -> Result<IngestReport, IngestError> {
        let span = info_span!(
            "ingest",
            owner = %owner,
            source = %source_name,
            correlation_id = %Uuid::new_v4(),
        );
        self.reconcile_batch(owner, source_name, source, rows)
            .instrument(span)
            .await
    }

    async fn reconcile_batch(
        &self,
        owner: &OwnerId,
        source_name: &str,
        source: RowSource,
        rows: Vec<Result<NormalizedRow, Rejected>>,
    ) -> Result<IngestReport, IngestError> {
        info!(rows = rows.len(), ?source, "batch started");

        let keywords = match source {
            RowSource::Upload => KeywordMap::from_history(&self.store.list_transactions(owner).await?),
            RowSource::Structured => KeywordMap::default(),
        };
        let snapshot = TaxonomySnapshot::load(&self.store, owner).await?;
        let batch = self
            .store
            .create_batch(&NewBatch::now(owner.clone(), source_name))
            .await?;

        let taxonomy = TaxonomySync::new(&self.store, owner, snapshot);
        let tally = Reconciler::new(&self.store, owner, batch.id, source, keywords, taxonomy)
            .run(rows)
            .await;

        let added = tally.added.len();
        if let Err(e) = self
            .store
            .update_batch_row_count(batch.id, added as i64)
            .await
        {
            warn!(batch_id = %batch.id, error = %e, "failed to record batch row count");
        }

        info!(
            batch_id = %batch.id,
            total = tally.total_rows,
            added,
            skipped = tally.skipped_ids.len(),
            "batch finished"
        );

        Ok(IngestReport {
            batch_id: batch.id,
            total_rows: tally.total_rows,
            added,
            skipped: tally.skipped_ids.len(),
            skipped_ids: tally.skipped_ids,
            per_row_result: tally.added,
            new_category_suggestions: tally.new_categories.into_vec(),
            new_subcategory_suggestions: tally.new_subcategories.into_vec(),
        })
    }

    /// Applies reviewed labels to existing transactions. Creates no rows and no
    /// taxonomy entries; an unknown id fails only its own item.
    pub async fn commit_review(
        &self,
        owner: &OwnerId,
        items: Vec<ReviewItem>,
    ) -> Vec<ReviewOutcome> {
        let mut outcomes = Vec::with_capacity(items.len());
        for item in items {
            let id = item.id.trim().to_string();
            let status = if id.is_empty() {
                ReviewStatus::Error
            } else {
                let classification = Classification::new(item.category, item.subcategory);
                match self
                    .store
                    .update_classification(owner, &id, &classification)
                    .await
                {
                    Ok(true) => ReviewStatus::Updated,
                    Ok(false) => ReviewStatus::Error,
                    Err(e) => {
                        warn!(id = %id, error = %e, "review update failed");
                        ReviewStatus::Error
                    }
                }
            };
            outcomes.push(ReviewOutcome { id, status });
        }
        outcomes
    }

    pub async fn category_tree(&self, owner: &OwnerId) -> Result<Vec<CategoryNode>, IngestError> {
        let categories = self.store.list_categories(owner).await?;
        let subcategories = self.store.list_subcategories(owner).await?;
        Ok(build_tree(&categories, &subcategories))
    }

    pub async fn create_category(
        &self,
        owner: &OwnerId,
        name: &str,
    ) -> Result<Category, IngestError> {
        let name = required_name(name, "category")?;
        Ok(self.store.upsert_category(owner, name).await?)
    }

    /// Fails with [`reckon_core::StoreError::NotFound`] unless `category_id` belongs to `owner`.
    pub async fn create_subcategory(
        &self,
        owner: &OwnerId,
        name: &str,
        category_id: CategoryId,
    ) -> Result<Subcategory, IngestError> {
        let name = required_name(name, "subcategory")?;
        Ok(self
            .store
            .upsert_subcategory(owner, name, category_id)
            .await?)
    }
}

fn required_name<'n>(name: &'n str, what: &str) -> Result<&'n str, IngestError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(IngestError::InvalidRequest(format!("{what} name is required")));
    }
    Ok(name)
}
