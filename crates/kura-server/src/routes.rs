//! HTTP routes.
//!
//! Thin adapter over [`Storage`]: parse query/form, call the engine, map the
//! outcome to a status. Upload and update hold the engine lock for the whole
//! content transfer; download releases it once the file is open.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::multipart::Field;
use axum::extract::{DefaultBodyLimit, Multipart, Query, Request, State};
use axum::http::header::{ACCEPT_RANGES, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use kura_store::{Disk, ListEntry, Storage, StorageError};
use serde::Deserialize;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{Instrument, debug, warn};

use crate::constants::FILE_FIELD;
use crate::error::ApiError;

/// `?path=`
#[derive(Debug, Deserialize)]
pub struct PathQuery {
    pub path: String,
}

/// `?src=&dest=`
#[derive(Debug, Deserialize)]
pub struct TransferQuery {
    pub src: String,
    pub dest: String,
}

/// Build the router over an injected engine.
pub fn router<D: Disk + 'static>(storage: Arc<Storage<D>>, max_upload_bytes: usize) -> Router {
    let content_routes = Router::new()
        .route("/upload", post(upload::<D>))
        .route("/update", put(update::<D>))
        .layer(DefaultBodyLimit::max(max_upload_bytes));

    Router::new()
        .route("/download", get(download::<D>))
        .route("/directory", post(create_directory::<D>))
        .route("/delete", delete(remove::<D>))
        .route("/list", get(list::<D>))
        .route("/move", put(move_item::<D>))
        .route("/copy", put(copy::<D>))
        .merge(content_routes)
        .layer(middleware::from_fn(trace_request))
        .with_state(storage)
}

/// Run each request in an `http.request` span, linked to the caller's trace.
async fn trace_request(request: Request, next: Next) -> Response {
    let (traceparent, tracestate) = trace_headers(&request);
    let span = kura_telemetry::request_span(
        request.method().as_str(),
        request.uri().path(),
        &traceparent,
        &tracestate,
    );

    let response = next.run(request).instrument(span.clone()).await;
    span.in_scope(|| debug!(status = response.status().as_u16(), "served"));
    response
}

/// W3C `traceparent` and `tracestate`, empty when absent or not ASCII.
fn trace_headers(request: &Request) -> (String, String) {
    let header = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    (header("traceparent"), header("tracestate"))
}

// POST /upload?path
async fn upload<D: Disk>(
    State(storage): State<Arc<Storage<D>>>,
    Query(query): Query<PathQuery>,
    multipart: Multipart,
) -> Result<&'static str, ApiError> {
    receive_file(&storage, &query.path, multipart, WriteMode::Create).await?;
    Ok("file upload success")
}

// PUT /update?path
async fn update<D: Disk>(
    State(storage): State<Arc<Storage<D>>>,
    Query(query): Query<PathQuery>,
    multipart: Multipart,
) -> Result<&'static str, ApiError> {
    receive_file(&storage, &query.path, multipart, WriteMode::Replace).await?;
    Ok("file update success")
}

// GET /download?path
async fn download<D: Disk>(
    State(storage): State<Arc<Storage<D>>>,
    Query(query): Query<PathQuery>,
) -> Result<Response, ApiError> {
    let file = storage.get_file(&query.path).await?;
    let len = file
        .metadata()
        .await
        .map_err(|e| StorageError::io(format!("can't stat {}", query.path), e))?
        .len();

    let name = query.path.rsplit('/').next().unwrap_or_default().replace('"', "_");
    let headers = [
        (CONTENT_TYPE, "application/octet-stream".to_string()),
        (CONTENT_DISPOSITION, format!("attachment; filename=\"{name}\"")),
        (ACCEPT_RANGES, "bytes".to_string()),
        (CONTENT_LENGTH, len.to_string()),
    ];
    Ok((headers, Body::from_stream(ReaderStream::new(file))).into_response())
}

// POST /directory?path
async fn create_directory<D: Disk>(
    State(storage): State<Arc<Storage<D>>>,
    Query(query): Query<PathQuery>,
) -> Result<&'static str, ApiError> {
    storage.create_directory(&query.path).await?;
    Ok("create directory success")
}

// DELETE /delete?path
async fn remove<D: Disk>(
    State(storage): State<Arc<Storage<D>>>,
    Query(query): Query<PathQuery>,
) -> Result<&'static str, ApiError> {
    storage.delete(&query.path).await?;
    Ok("delete success")
}

// GET /list?path
async fn list<D: Disk>(
    State(storage): State<Arc<Storage<D>>>,
    Query(query): Query<PathQuery>,
) -> Result<Json<Vec<ListEntry>>, ApiError> {
    Ok(Json(storage.list(&query.path).await?))
}

// PUT /move?src&dest
async fn move_item<D: Disk>(
    State(storage): State<Arc<Storage<D>>>,
    Query(query): Query<TransferQuery>,
) -> Result<&'static str, ApiError> {
    storage.move_item(&query.dest, &query.src).await?;
    Ok("move success")
}

// PUT /copy?src&dest
async fn copy<D: Disk>(
    State(storage): State<Arc<Storage<D>>>,
    Query(query): Query<TransferQuery>,
) -> Result<&'static str, ApiError> {
    storage.copy(&query.dest, &query.src).await?;
    Ok("copy success")
}

#[derive(Debug, Clone, Copy)]
enum WriteMode {
    /// New file; fails if the path exists.
    Create,
    /// Existing file, truncated first.
    Replace,
}

/// Find the `file` field and stream it to `path`, holding the engine lock
/// for the whole transfer.
///
/// A failed write into a newly created file removes it again. A failed
/// replace leaves the truncated file in place.
async fn receive_file<D: Disk>(
    storage: &Storage<D>,
    path: &str,
    mut multipart: Multipart,
    mode: WriteMode,
) -> Result<u64, ApiError> {
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let mut guard = storage.lock().await;
        return match mode {
            WriteMode::Create => {
                let mut file = guard.create_file(path).await?;
                let written = write_field(&mut field, &mut file).await;
                if written.is_err() {
                    drop(file);
                    if let Err(cleanup) = guard.delete(path).await {
                        warn!("can't remove partial upload {}: {}", path, cleanup);
                    }
                }
                written
            }
            WriteMode::Replace => {
                let mut file = guard.replace_file(path).await?;
                write_field(&mut field, &mut file).await
            }
        };
    }
    Err(ApiError::MissingField(FILE_FIELD))
}

/// Stream a multipart field into `file`. Returns the byte count.
async fn write_field(field: &mut Field<'_>, file: &mut File) -> Result<u64, ApiError> {
    let write_err = |e| StorageError::io("can't write file content", e);

    let mut written = 0u64;
    while let Some(chunk) = field.chunk().await? {
        file.write_all(&chunk).await.map_err(write_err)?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(write_err)?;

    debug!(bytes = written, "wrote file content");
    Ok(written)
}
