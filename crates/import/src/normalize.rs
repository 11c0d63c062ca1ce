use chrono::{DateTime, NaiveDate, NaiveDateTime};
use reckon_core::{non_blank, Amount, BatchId, Classification, NewTransaction, OwnerId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use thiserror::Error;

pub const DATE_HEADER: &str = "date";
pub const ACCOUNT_HEADER: &str = "account";
pub const TYPE_HEADER: &str = "type";
pub const CATEGORY_HEADER: &str = "category";
pub const SUBCATEGORY_HEADER: &str = "subcategory";
pub const NOTES_HEADER: &str = "notes";
pub const AMOUNT_HEADER: &str = "amount";
pub const UNIQUE_ID_HEADER: &str = "unique id";
pub const LINKED_ID_HEADER: &str = "linked transaction id";

/// Identifier recorded in the skipped list when a row has no unique id.
pub const MISSING_ID: &str = "missing-id";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestOptions {
    /// chrono formats tried in order before the RFC 3339 / timestamp fallbacks.
    pub date_formats: Vec<String>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            date_formats: [
                "%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y", "%Y/%m/%d", "%m-%d-%Y", "%d-%m-%Y", "%d.%m.%Y",
            ]
            .iter()
            .map(|f| f.to_string())
            .collect(),
        }
    }
}

#[derive(Error, Debug)]
pub enum CsvError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Missing header row")]
    MissingHeader,
}

/// Why a single row was rejected. Never fatal to the batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid date: {0}")]
    InvalidDate(String),
}

/// A rejected row together with the identifier it is reported under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
    pub id: String,
    pub error: RowError,
}

/// One CSV record keyed by trimmed, lower-cased header name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow(HashMap<String, String>);

impl RawRow {
    pub fn from_pairs<K: AsRef<str>, V: Into<String>>(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        RawRow(
            pairs
                .into_iter()
                .map(|(k, v)| (normalize_header(k.as_ref()), v.into()))
                .collect(),
        )
    }

    pub fn get(&self, header: &str) -> Option<&str> {
        self.0.get(header).map(String::as_str)
    }

    fn field(&self, header: &str) -> Option<String> {
        non_blank(self.get(header).map(str::to_string))
    }
}

/// A pre-structured row as accepted by the bulk entry point.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StructuredRow {
    pub id: Option<String>,
    pub date: Option<String>,
    pub account: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub notes: Option<String>,
    /// JSON number or string.
    pub amount: Option<serde_json::Value>,
    pub linked_transaction_id: Option<String>,
}

/// A validated row in canonical form.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub unique_id: String,
    pub date: NaiveDate,
    pub account: String,
    pub kind: String,
    pub classification: Classification,
    pub notes: Option<String>,
    pub amount: Amount,
    pub linked_transaction_id: Option<String>,
}

impl NormalizedRow {
    pub fn into_new_transaction(
        self,
        owner: &OwnerId,
        batch_id: BatchId,
        classification: Classification,
    ) -> NewTransaction {
        NewTransaction {
            unique_id: self.unique_id,
            owner_id: owner.clone(),
            batch_id,
            date: self.date,
            account: self.account,
            kind: self.kind,
            classification,
            notes: self.notes,
            amount: self.amount,
            linked_transaction_id: self.linked_transaction_id,
        }
    }
}

/// The source-independent field set both entry points reduce their rows to.
#[derive(Debug, Default)]
struct Fields {
    unique_id: Option<String>,
    date: Option<String>,
    account: Option<String>,
    kind: Option<String>,
    category: Option<String>,
    subcategory: Option<String>,
    notes: Option<String>,
    amount: Option<String>,
    linked_transaction_id: Option<String>,
}

impl From<&RawRow> for Fields {
    fn from(row: &RawRow) -> Self {
        Fields {
            unique_id: row.field(UNIQUE_ID_HEADER),
            date: row.field(DATE_HEADER),
            account: row.field(ACCOUNT_HEADER),
            kind: row.field(TYPE_HEADER),
            category: row.field(CATEGORY_HEADER),
            subcategory: row.field(SUBCATEGORY_HEADER),
            notes: row.field(NOTES_HEADER),
            amount: row.field(AMOUNT_HEADER),
            linked_transaction_id: row.field(LINKED_ID_HEADER),
        }
    }
}

impl From<&StructuredRow> for Fields {
    fn from(row: &StructuredRow) -> Self {
        let amount = row.amount.as_ref().and_then(|v| match v {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        });
        Fields {
            unique_id: non_blank(row.id.clone()),
            date: non_blank(row.date.clone()),
            account: non_blank(row.account.clone()),
            kind: non_blank(row.kind.clone()),
            category: non_blank(row.category.clone()),
            subcategory: non_blank(row.subcategory.clone()),
            notes: non_blank(row.notes.clone()),
            amount: non_blank(amount),
            linked_transaction_id: non_blank(row.linked_transaction_id.clone()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    date_formats: Vec<String>,
}

impl Normalizer {
    pub fn new(options: &IngestOptions) -> Self {
        Self {
            date_formats: options.date_formats.clone(),
        }
    }

    pub fn normalize_raw(&self, row: &RawRow) -> Result<NormalizedRow, Rejected> {
        self.normalize(Fields::from(row))
    }

    pub fn normalize_structured(&self, row: &StructuredRow) -> Result<NormalizedRow, Rejected> {
        self.normalize(Fields::from(row))
    }

    fn normalize(&self, fields: Fields) -> Result<NormalizedRow, Rejected> {
        let id = fields
            .unique_id
            .clone()
            .unwrap_or_else(|| MISSING_ID.to_string());
        let reject = |error: RowError| Rejected { id: id.clone(), error };

        let unique_id = fields
            .unique_id
            .ok_or_else(|| reject(RowError::MissingField(UNIQUE_ID_HEADER)))?;
        let raw_date = fields
            .date
            .ok_or_else(|| reject(RowError::MissingField(DATE_HEADER)))?;
        let account = fields
            .account
            .ok_or_else(|| reject(RowError::MissingField(ACCOUNT_HEADER)))?;
        let kind = fields
            .kind
            .ok_or_else(|| reject(RowError::MissingField(TYPE_HEADER)))?;
        let raw_amount = fields
            .amount
            .ok_or_else(|| reject(RowError::MissingField(AMOUNT_HEADER)))?;

        let amount = Amount::parse(&raw_amount)
            .map_err(|_| reject(RowError::InvalidAmount(raw_amount.clone())))?;
        let date = parse_date(&raw_date, &self.date_formats)
            .ok_or_else(|| reject(RowError::InvalidDate(raw_date.clone())))?;

        Ok(NormalizedRow {
            unique_id,
            date,
            account,
            kind,
            classification: Classification::new(fields.category, fields.subcategory),
            notes: fields.notes,
            amount,
            linked_transaction_id: fields.linked_transaction_id,
        })
    }
}

pub fn normalize_header(header: &str) -> String {
    header.trim_start_matches('\u{feff}').trim().to_lowercase()
}

/// Reads a headered CSV stream into raw rows. Lines whose fields are all
/// blank are dropped. Bytes that are not valid UTF-8 are replaced rather than
/// failing the stream, so one mis-encoded field only affects its own row.
pub fn read_raw_rows<R: Read>(data: R) -> Result<Vec<RawRow>, CsvError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data);

    let headers: Vec<String> = reader
        .byte_headers()?
        .iter()
        .map(|h| normalize_header(&String::from_utf8_lossy(h)))
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(CsvError::MissingHeader);
    }

    let mut rows = Vec::new();
    for result in reader.byte_records() {
        let record = result?;
        let fields: Vec<String> = record
            .iter()
            .map(|field| String::from_utf8_lossy(field).into_owned())
            .collect();
        if fields.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        let row = headers
            .iter()
            .zip(fields)
            .filter(|(header, _)| !header.is_empty())
            .map(|(header, value)| (header.clone(), value))
            .collect();
        rows.push(RawRow(row));
    }

    Ok(rows)
}

fn parse_date(s: &str, formats: &[String]) -> Option<NaiveDate> {
    let s = s.trim();

    for fmt in formats {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(date);
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }

    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> Normalizer {
        Normalizer::new(&IngestOptions::default())
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn full_row() -> RawRow {
        RawRow::from_pairs([
            ("date", "2024-01-15"),
            ("account", "Checking"),
            ("type", "Expense"),
            ("category", " Food "),
            ("subcategory", ""),
            ("notes", "coffee shop"),
            ("amount", "-4.50"),
            ("unique id", "tx-1"),
        ])
    }

    // ── parse_date ────────────────────────────────────────────────────────────

    #[test]
    fn parse_date_iso() {
        let formats = IngestOptions::default().date_formats;
        assert_eq!(parse_date("2024-01-15", &formats), Some(date(2024, 1, 15)));
    }

    #[test]
    fn parse_date_us_slash_before_eu() {
        let formats = IngestOptions::default().date_formats;
        assert_eq!(parse_date("01/02/2024", &formats), Some(date(2024, 1, 2)));
        assert_eq!(parse_date("15/01/2024", &formats), Some(date(2024, 1, 15)));
    }

    #[test]
    fn parse_date_timestamps() {
        let formats = IngestOptions::default().date_formats;
        assert_eq!(parse_date("2024-01-15T10:30:00Z", &formats), Some(date(2024, 1, 15)));
        assert_eq!(parse_date("2024-01-15 10:30:00", &formats), Some(date(2024, 1, 15)));
    }

    #[test]
    fn parse_date_invalid() {
        let formats = IngestOptions::default().date_formats;
        assert_eq!(parse_date("not-a-date", &formats), None);
        assert_eq!(parse_date("2024-02-30", &formats), None);
    }

    // ── normalize ─────────────────────────────────────────────────────────────

    #[test]
    fn normalizes_complete_row() {
        let row = normalizer().normalize_raw(&full_row()).unwrap();
        assert_eq!(row.unique_id, "tx-1");
        assert_eq!(row.date, date(2024, 1, 15));
        assert_eq!(row.amount, Amount::parse("-4.5").unwrap());
        assert_eq!(row.classification.category.as_deref(), Some("Food"));
        assert_eq!(row.classification.subcategory, None);
        assert_eq!(row.notes.as_deref(), Some("coffee shop"));
        assert_eq!(row.linked_transaction_id, None);
    }

    #[test]
    fn missing_amount_is_rejected_under_its_id() {
        let mut row = full_row();
        row.0.remove("amount");
        let rejected = normalizer().normalize_raw(&row).unwrap_err();
        assert_eq!(rejected.id, "tx-1");
        assert_eq!(rejected.error, RowError::MissingField("amount"));
    }

    #[test]
    fn blank_required_field_counts_as_missing() {
        let mut row = full_row();
        row.0.insert("account".into(), "   ".into());
        let rejected = normalizer().normalize_raw(&row).unwrap_err();
        assert_eq!(rejected.error, RowError::MissingField("account"));
    }

    #[test]
    fn missing_id_uses_placeholder() {
        let mut row = full_row();
        row.0.remove("unique id");
        let rejected = normalizer().normalize_raw(&row).unwrap_err();
        assert_eq!(rejected.id, MISSING_ID);
    }

    #[test]
    fn unparsable_amount_is_rejected() {
        let mut row = full_row();
        row.0.insert("amount".into(), "twelve".into());
        let rejected = normalizer().normalize_raw(&row).unwrap_err();
        assert_eq!(rejected.error, RowError::InvalidAmount("twelve".into()));
    }

    #[test]
    fn unparsable_date_is_rejected() {
        let mut row = full_row();
        row.0.insert("date".into(), "yesterday".into());
        let rejected = normalizer().normalize_raw(&row).unwrap_err();
        assert_eq!(rejected.error, RowError::InvalidDate("yesterday".into()));
    }

    #[test]
    fn custom_date_formats_take_precedence() {
        let options = IngestOptions {
            date_formats: vec!["%d/%m/%Y".to_string()],
        };
        let mut row = full_row();
        row.0.insert("date".into(), "01/02/2024".into());
        let normalized = Normalizer::new(&options).normalize_raw(&row).unwrap();
        assert_eq!(normalized.date, date(2024, 2, 1));
    }

    #[test]
    fn structured_row_accepts_numeric_amount() {
        let row: StructuredRow = serde_json::from_value(serde_json::json!({
            "id": "b-1",
            "date": "2024-03-01",
            "account": "Savings",
            "type": "Income",
            "amount": 1250.75,
            "linkedTransactionId": "b-0"
        }))
        .unwrap();
        let normalized = normalizer().normalize_structured(&row).unwrap();
        assert_eq!(normalized.amount, Amount::parse("1250.75").unwrap());
        assert_eq!(normalized.kind, "Income");
        assert_eq!(normalized.linked_transaction_id.as_deref(), Some("b-0"));
        assert!(normalized.classification.is_empty());
    }

    #[test]
    fn structured_row_without_id_uses_placeholder() {
        let row = StructuredRow {
            date: Some("2024-03-01".into()),
            amount: Some(serde_json::json!("5")),
            ..Default::default()
        };
        let rejected = normalizer().normalize_structured(&row).unwrap_err();
        assert_eq!(rejected.id, MISSING_ID);
    }

    // ── read_raw_rows ─────────────────────────────────────────────────────────

    #[test]
    fn read_raw_rows_lowercases_and_trims_headers() {
        let data = "\u{feff} Date ,Account,TYPE,Amount,Unique ID,Notes\n2024-01-15,Checking,Expense,-5.00,a1,Coffee\n";
        let rows = read_raw_rows(data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("date"), Some("2024-01-15"));
        assert_eq!(rows[0].get("unique id"), Some("a1"));
        assert_eq!(rows[0].get("type"), Some("Expense"));
    }

    #[test]
    fn read_raw_rows_skips_blank_lines() {
        let data = b"date,amount\n2024-01-15,1\n\n,\n2024-01-16,2\n";
        let rows = read_raw_rows(data.as_ref()).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn read_raw_rows_tolerates_short_records() {
        let data = b"date,amount,notes\n2024-01-15,1\n";
        let rows = read_raw_rows(data.as_ref()).unwrap();
        assert_eq!(rows[0].get("notes"), None);
    }

    #[test]
    fn read_raw_rows_header_only_is_empty() {
        assert!(read_raw_rows(b"date,amount\n".as_ref()).unwrap().is_empty());
    }

    #[test]
    fn read_raw_rows_rejects_empty_input() {
        assert!(matches!(
            read_raw_rows(b"".as_ref()),
            Err(CsvError::MissingHeader)
        ));
    }

    #[test]
    fn read_raw_rows_decodes_invalid_utf8_lossily() {
        let data: &[u8] = b"date,notes\n2024-01-15,caf\xe9\n2024-01-16,tea\n";
        let rows = read_raw_rows(data).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("notes"), Some("caf\u{fffd}"));
        assert_eq!(rows[1].get("notes"), Some("tea"));
    }
}
