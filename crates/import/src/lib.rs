pub mod classify;
pub mod error;
pub mod ingest;
pub mod normalize;
pub mod reconcile;
pub mod report;
pub mod taxonomy;

#[cfg(test)]
mod test_support;

pub use classify::{tokenize, KeywordMap, Suggestion};
pub use error::IngestError;
pub use ingest::Ingestor;
pub use normalize::{
    read_raw_rows, CsvError, IngestOptions, NormalizedRow, Normalizer, RawRow, Rejected, RowError,
    StructuredRow, MISSING_ID,
};
pub use reconcile::{BatchTally, Reconciler, RowSource};
pub use report::{
    BulkReport, IngestReport, LabelSet, ReviewItem, ReviewOutcome, ReviewStatus, RowResult,
};
pub use taxonomy::{TaxonomyOutcome, TaxonomySnapshot, TaxonomySync};
