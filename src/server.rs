//! HTTP boundary: upload form, dataset replacement, and query endpoints.
//!
//! Every query endpoint is request-scoped: it opens the active database,
//! runs one collection pass, and drops the connection. The server runs on a
//! current-thread runtime; all storage work is blocking and bounded by the
//! dataset size and the result cap.

use crate::collector::{self, SampleQuery};
use crate::dataset::{ActiveDataset, ReplaceReceipt};
use crate::error::ServiceError;
use crate::metrics::Sample;
use crate::storage::{self, TableInfo, SOURCE_TABLES};
use crate::util::config::AppConfig;
use anyhow::{Context, Result};
use axum::extract::multipart::Field;
use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use log::{error, info};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

const UPLOAD_EXTENSIONS: [&str; 3] = [".sqlite", ".db", ".sql"];

pub struct AppState {
    pub config: AppConfig,
    pub dataset: ActiveDataset,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match self {
            ServiceError::NoDatabase
            | ServiceError::InvalidRange { .. }
            | ServiceError::BadUpload(_) => StatusCode::BAD_REQUEST,
            ServiceError::NoRecords => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Optional filters shared by the upload and latest-style endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct CollectParams {
    pub start_ms: Option<i64>,
    pub end_ms: Option<i64>,
    pub package_name: Option<String>,
    pub uid: Option<String>,
    pub limit: Option<usize>,
}

impl CollectParams {
    fn into_query(self, config: &AppConfig) -> SampleQuery {
        SampleQuery {
            start_ms: self.start_ms,
            end_ms: self.end_ms,
            limit: config.clamp_limit(self.limit),
            package_name: self.package_name.filter(|s| !s.is_empty()),
            uid: self.uid.filter(|s| !s.is_empty()),
        }
    }
}

/// Range query parameters; both bounds are required here.
#[derive(Debug, Deserialize)]
pub struct RangeParams {
    pub start_ms: i64,
    pub end_ms: i64,
    pub package_name: Option<String>,
    pub uid: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct DebugSampleParams {
    pub limit: Option<usize>,
}

#[derive(Debug, serde::Serialize)]
pub struct UploadResponse {
    pub saved_as: PathBuf,
    pub uploaded_at: DateTime<Utc>,
    pub generation: u64,
    pub count: usize,
    pub results: Vec<Sample>,
}

async fn home() -> Html<&'static str> {
    Html(
        r#"<!doctype html><html><head><meta charset="utf-8"><title>Upload DB</title>
<style>body{font:14px system-ui;margin:40px}.card{max-width:620px;margin:auto;padding:24px;border:1px solid #ddd;border-radius:12px}</style>
</head><body><div class="card">
  <h2>Upload a SQLite database</h2>
  <form action="/upload-db" method="post" enctype="multipart/form-data">
    <p>File (.sqlite / .db): <input type="file" name="file" required></p>
    <p>start_ms (optional): <input type="text" name="start_ms"></p>
    <p>end_ms (optional): <input type="text" name="end_ms"></p>
    <p>package_name (optional): <input type="text" name="package_name"></p>
    <p>uid (optional): <input type="text" name="uid"></p>
    <p>limit (default 1000): <input type="number" name="limit" value="1000"></p>
    <button type="submit">Upload and process</button>
  </form>
</div></body></html>
"#,
    )
}

fn has_upload_extension(filename: &str) -> bool {
    let lower = filename.to_ascii_lowercase();
    UPLOAD_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

async fn text_field(field: Field<'_>) -> Result<Option<String>, ServiceError> {
    let text = field
        .text()
        .await
        .map_err(|e| ServiceError::BadUpload(e.to_string()))?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Ok(None)
    } else {
        Ok(Some(trimmed.to_string()))
    }
}

async fn upload_db(
    State(state): State<Arc<AppState>>,
    Query(query_params): Query<CollectParams>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ServiceError> {
    let mut params = query_params;
    let mut upload: Option<(String, Vec<u8>)> = None;

    // The HTML form posts its filter inputs as multipart parts; they win
    // over the query string when both are present.
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::BadUpload(e.to_string()))?
    {
        match field.name().unwrap_or("") {
            "file" => {
                let filename = field.file_name().unwrap_or("").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ServiceError::BadUpload(e.to_string()))?;
                upload = Some((filename, bytes.to_vec()));
            }
            "start_ms" => {
                if let Some(v) = text_field(field).await? {
                    params.start_ms = v.parse().ok();
                }
            }
            "end_ms" => {
                if let Some(v) = text_field(field).await? {
                    params.end_ms = v.parse().ok();
                }
            }
            "package_name" => params.package_name = text_field(field).await?,
            "uid" => params.uid = text_field(field).await?,
            "limit" => {
                if let Some(v) = text_field(field).await? {
                    params.limit = v.parse().ok();
                }
            }
            _ => {}
        }
    }

    let (filename, bytes) = upload
        .ok_or_else(|| ServiceError::BadUpload("missing multipart field \"file\"".to_string()))?;
    if !has_upload_extension(&filename) {
        return Err(ServiceError::BadUpload(format!(
            "unsupported file name {:?}; expected a .sqlite, .db or .sql file",
            filename
        )));
    }

    let query = params.into_query(&state.config);
    query.validate()?;

    let receipt: ReplaceReceipt = state.dataset.replace(&bytes)?;
    let conn = state.dataset.open()?;
    let results = collector::collect(&conn, &query)?;
    info!(
        "upload {:?} processed: {} samples returned",
        filename,
        results.len()
    );

    Ok(Json(UploadResponse {
        saved_as: receipt.saved_as,
        uploaded_at: receipt.uploaded_at,
        generation: receipt.generation,
        count: results.len(),
        results,
    }))
}

async fn processes(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RangeParams>,
) -> Result<Json<Vec<Sample>>, ServiceError> {
    let query = SampleQuery {
        start_ms: Some(params.start_ms),
        end_ms: Some(params.end_ms),
        limit: state.config.clamp_limit(params.limit),
        package_name: params.package_name.filter(|s| !s.is_empty()),
        uid: params.uid.filter(|s| !s.is_empty()),
    };
    // Range validation comes before the storage precondition so an inverted
    // range is reported even when nothing was uploaded yet.
    query.validate()?;
    let conn = state.dataset.open()?;
    let results = collector::collect(&conn, &query)?;
    Ok(Json(results))
}

async fn processes_latest(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CollectParams>,
) -> Result<Json<Vec<Sample>>, ServiceError> {
    let query = SampleQuery {
        start_ms: None,
        end_ms: None,
        ..params.into_query(&state.config)
    };
    let conn = state.dataset.open()?;
    let results = collector::collect(&conn, &query)?;
    if results.is_empty() {
        return Err(ServiceError::NoRecords);
    }
    Ok(Json(results))
}

async fn debug_tables(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<TableInfo>>, ServiceError> {
    let conn = state.dataset.open()?;
    Ok(Json(storage::list_tables(&conn)?))
}

async fn debug_sample(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DebugSampleParams>,
) -> Result<Json<Value>, ServiceError> {
    let limit = params.limit.unwrap_or(3);
    let conn = state.dataset.open()?;
    let mut out = serde_json::Map::new();
    for table in SOURCE_TABLES {
        let value = if storage::table_exists(&conn, table)? {
            serde_json::to_value(storage::sample_rows(&conn, table, limit)?)?
        } else {
            Value::String("table not found".to_string())
        };
        out.insert(table.to_string(), value);
    }
    Ok(Json(Value::Object(out)))
}

pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_upload_bytes;
    Router::new()
        .route("/", get(home))
        .route("/upload-db", post(upload_db))
        .route("/processes", get(processes))
        .route("/processes-latest", get(processes_latest))
        .route("/debug/tables", get(debug_tables))
        .route("/debug/sample", get(debug_sample))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Bring the service up and block until it exits.
pub fn serve(config: AppConfig) -> Result<()> {
    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("invalid listen_addr {:?}", config.listen_addr))?;
    let dataset = ActiveDataset::new(&config.data_dir)?;
    let state = Arc::new(AppState { config, dataset });
    let app = router(state);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")?;
    rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("bind {}", addr))?;
        info!("listening on http://{}", addr);
        axum::serve(listener, app).await.context("serve http")
    })
}
