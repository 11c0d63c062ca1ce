use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, FromRequestParts, Path, Request, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use reckon_core::{
    AuthError, Batch, CategoryId, CategoryNode, LedgerStore, OwnerId, OwnerResolver,
    SubcategoryNode, Transaction,
};
use reckon_import::{
    BulkReport, IngestReport, Ingestor, ReviewItem, ReviewOutcome, StructuredRow,
};
use reckon_storage::SqliteLedger;
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::error::ApiError;

pub const FILE_NAME_HEADER: &str = "x-file-name";
const DEFAULT_UPLOAD_NAME: &str = "upload.csv";
const BULK_SOURCE_NAME: &str = "bulk";

#[derive(Clone)]
pub struct AppState {
    pub ingestor: Arc<Ingestor<SqliteLedger>>,
    pub resolver: Arc<dyn OwnerResolver>,
}

impl AppState {
    pub fn new(ingestor: Ingestor<SqliteLedger>, resolver: impl OwnerResolver + 'static) -> Self {
        Self {
            ingestor: Arc::new(ingestor),
            resolver: Arc::new(resolver),
        }
    }

    fn store(&self) -> &SqliteLedger {
        self.ingestor.store()
    }
}

/// The authenticated owner of the request.
pub struct Owner(pub OwnerId);

impl FromRequestParts<AppState> for Owner {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let credential = match parts.headers.get(header::AUTHORIZATION) {
            Some(value) => Some(value.to_str().map_err(|_| {
                AuthError::MalformedCredential("authorization header is not ASCII".into())
            })?),
            None => None,
        };
        Ok(Owner(state.resolver.resolve(credential)?))
    }
}

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(flatten)]
    pub body: T,
}

impl<T> Envelope<T> {
    fn ok(body: T) -> Json<Self> {
        Json(Envelope {
            success: true,
            body,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct Results {
    pub results: Vec<ReviewOutcome>,
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub deleted: u64,
}

#[derive(Debug, Serialize)]
pub struct Empty {}

#[derive(Debug, Serialize)]
pub struct TransactionList {
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Serialize)]
pub struct UploadHistory {
    pub uploads: Vec<Batch>,
}

#[derive(Debug, Serialize)]
pub struct Taxonomy {
    pub full: Vec<CategoryNode>,
}

#[derive(Debug, Serialize)]
pub struct CreatedCategory {
    pub category: CategoryNode,
}

#[derive(Debug, Serialize)]
pub struct CreatedSubcategory {
    pub subcategory: SubcategoryNode,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub transactions: Vec<ReviewItem>,
}

#[derive(Debug, Deserialize)]
pub struct NewCategoryRequest {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubcategoryRequest {
    #[serde(default)]
    pub name: String,
    pub category_id: Option<i64>,
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/api/upload", post(upload))
        .route("/api/upload/history", get(upload_history))
        .route(
            "/api/transactions",
            get(list_transactions).post(commit_review),
        )
        .route("/api/transactions/save", post(bulk_save))
        .route("/api/transactions/clear", delete(clear_ledger))
        .route("/api/transactions/{id}", delete(delete_transaction))
        .route("/api/categories", get(list_categories).post(create_category))
        .route("/api/subcategories", post(create_subcategory))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %Uuid::new_v4(),
                )
            }),
        )
        .with_state(state)
}

fn is_csv(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("text/csv"))
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid request format: {}", e.body_text())))
}

async fn upload(
    State(state): State<AppState>,
    Owner(owner): Owner,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Envelope<IngestReport>>, ApiError> {
    if !is_csv(&headers) {
        return Err(ApiError::BadRequest(
            "Invalid file type. Please upload a CSV.".into(),
        ));
    }
    if body.is_empty() {
        return Err(ApiError::BadRequest("No file uploaded.".into()));
    }
    let source_name = headers
        .get(FILE_NAME_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_UPLOAD_NAME);

    let report = state
        .ingestor
        .ingest_csv(&owner, source_name, body.as_ref())
        .await?;
    Ok(Envelope::ok(report))
}

async fn commit_review(
    State(state): State<AppState>,
    Owner(owner): Owner,
    payload: Result<Json<ReviewRequest>, JsonRejection>,
) -> Result<Json<Envelope<Results>>, ApiError> {
    let request = json_body(payload)?;
    let results = state
        .ingestor
        .commit_review(&owner, request.transactions)
        .await;
    Ok(Envelope::ok(Results { results }))
}

async fn bulk_save(
    State(state): State<AppState>,
    Owner(owner): Owner,
    payload: Result<Json<Vec<StructuredRow>>, JsonRejection>,
) -> Result<Json<Envelope<BulkReport>>, ApiError> {
    let rows = json_body(payload)?;
    let report = state
        .ingestor
        .bulk_ingest(&owner, BULK_SOURCE_NAME, rows)
        .await?;
    Ok(Envelope::ok(report))
}

async fn list_transactions(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> Result<Json<TransactionList>, ApiError> {
    let transactions = state.store().list_transactions(&owner).await?;
    Ok(Json(TransactionList { transactions }))
}

async fn delete_transaction(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Empty>>, ApiError> {
    if !state.store().delete_transaction(&owner, &id).await? {
        return Err(ApiError::NotFound("Transaction not found".into()));
    }
    Ok(Envelope::ok(Empty {}))
}

async fn clear_ledger(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> Result<Json<Envelope<Deleted>>, ApiError> {
    let deleted = state.store().clear_ledger(&owner).await?;
    tracing::info!(owner = %owner, deleted, "ledger cleared");
    Ok(Envelope::ok(Deleted { deleted }))
}

async fn upload_history(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> Result<Json<UploadHistory>, ApiError> {
    let uploads = state.store().list_batches(&owner).await?;
    Ok(Json(UploadHistory { uploads }))
}

async fn list_categories(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> Result<Json<Taxonomy>, ApiError> {
    let full = state.ingestor.category_tree(&owner).await?;
    Ok(Json(Taxonomy { full }))
}

async fn create_category(
    State(state): State<AppState>,
    Owner(owner): Owner,
    payload: Result<Json<NewCategoryRequest>, JsonRejection>,
) -> Result<Json<CreatedCategory>, ApiError> {
    let request = json_body(payload)?;
    let category = state.ingestor.create_category(&owner, &request.name).await?;
    Ok(Json(CreatedCategory {
        category: CategoryNode {
            id: category.id,
            name: category.name,
            subcategories: Vec::new(),
        },
    }))
}

async fn create_subcategory(
    State(state): State<AppState>,
    Owner(owner): Owner,
    payload: Result<Json<NewSubcategoryRequest>, JsonRejection>,
) -> Result<Json<CreatedSubcategory>, ApiError> {
    let request = json_body(payload)?;
    let category_id = request
        .category_id
        .map(CategoryId)
        .ok_or_else(|| ApiError::BadRequest("Name and categoryId are required".into()))?;
    let subcategory = state
        .ingestor
        .create_subcategory(&owner, &request.name, category_id)
        .await?;
    Ok(Json(CreatedSubcategory {
        subcategory: SubcategoryNode {
            id: subcategory.id,
            name: subcategory.name,
        },
    }))
}
