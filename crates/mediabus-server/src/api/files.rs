//! `/api/files/*` — browse, upload, download, delete, mkdir, rename.
//!
//! Every handler authenticates the session first, resolves `path` beneath the
//! shared folder, then checks visibility and the relevant policy toggle in
//! that order, matching the precedence the host's own admission path uses.

use std::io::SeekFrom;
use std::path::PathBuf;

use axum::body::Body;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::extract::CookieJar;
use futures_util::StreamExt;
use std::net::SocketAddr;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

use crate::api::auth::{client_ip, require_session};
use crate::api::policy;
use crate::dto::{
    DownloadQuery, FileEntry, ListQuery, ListResponse, MkdirQuery, MkdirResponse, RenameQuery, RenameResponse,
    UploadQuery, UploadResponse,
};
use crate::error::ApiError;
use crate::paths::{resolve, resolve_existing, split_segments, unique_name};
use crate::state::AppState;
use crate::zipstream;
use mediabus_core::types::Direction;

pub async fn list(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
    jar: CookieJar,
) -> Result<Json<ListResponse>, ApiError> {
    let ip = client_ip(&headers, addr);
    let device_id = require_session(&state, &jar, &ip).await?;
    let settings = state.runtime.settings();
    let segments = split_segments(&query.path)?;
    policy::require_visible(&settings, &segments)?;
    let root = policy::shared_folder(&settings)?;
    let dir = resolve_existing(&root, &segments)?;
    if !dir.is_dir() {
        return Err(ApiError::validation("path is not a directory"));
    }

    let mut items = Vec::new();
    let mut read_dir = tokio::fs::read_dir(&dir).await?;
    while let Some(entry) = read_dir.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        if !settings.show_hidden_files && name.starts_with('.') {
            continue;
        }
        let metadata = entry.metadata().await?;
        let last_modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let mut child_segments = segments.clone();
        child_segments.push(name.clone());
        items.push(FileEntry {
            name,
            path: child_segments.join("/"),
            directory: metadata.is_dir(),
            size: metadata.len(),
            last_modified,
        });
    }
    items.sort_by(|a, b| {
        b.directory.cmp(&a.directory).then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });

    Ok(Json(ListResponse {
        device_id,
        path: segments.join("/"),
        items,
        show_hidden_files: settings.show_hidden_files,
    }))
}

pub async fn download(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(query): Query<DownloadQuery>,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    let ip = client_ip(&headers, addr);
    let device_id = require_session(&state, &jar, &ip).await?;
    let settings = state.runtime.settings();
    let segments = split_segments(&query.path)?;
    policy::require_visible(&settings, &segments)?;
    policy::require_download(&settings)?;
    let root = policy::shared_folder(&settings)?;
    let file_path = resolve_existing(&root, &segments)?;
    if file_path.is_dir() {
        return Err(ApiError::validation("path is a directory; use download-zip"));
    }

    let metadata = tokio::fs::metadata(&file_path).await?;
    let file = tokio::fs::File::open(&file_path).await?;
    let ticket = state
        .runtime
        .begin_transfer(&device_id, Direction::Downloading, metadata.len(), None, 1, metadata.len(), 0)
        .await
        .ok_or(ApiError::NotAuthorized)?;

    let name = segments.last().cloned().unwrap_or_default();
    let body = streamed_file_body(file, ticket);
    let disposition = content_disposition(&name);
    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

pub async fn download_zip(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(query): Query<DownloadQuery>,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    let ip = client_ip(&headers, addr);
    let device_id = require_session(&state, &jar, &ip).await?;
    let settings = state.runtime.settings();
    let segments = split_segments(&query.path)?;
    policy::require_visible(&settings, &segments)?;
    policy::require_download(&settings)?;
    let root = policy::shared_folder(&settings)?;
    let dir = resolve_existing(&root, &segments)?;
    if !dir.is_dir() {
        return Err(ApiError::validation("path is not a directory"));
    }

    let ticket = state
        .runtime
        .begin_transfer(&device_id, Direction::Downloading, 0, None, 1, 0, 0)
        .await
        .ok_or(ApiError::NotAuthorized)?;

    let name = segments.last().cloned().unwrap_or_else(|| "shared".to_string());
    let result = zipstream::zip_directory(&dir, settings.show_hidden_files, &ticket).await;
    ticket.close().await;
    let bytes = result?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, content_disposition(&format!("{name}.zip"))),
        ],
        bytes,
    )
        .into_response())
}

pub async fn download_zip_batch(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(query): Query<BatchDownloadQuery>,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    let ip = client_ip(&headers, addr);
    let device_id = require_session(&state, &jar, &ip).await?;
    let settings = state.runtime.settings();
    policy::require_download(&settings)?;
    let root = policy::shared_folder(&settings)?;

    let mut resolved = Vec::new();
    for raw in query.paths.split(',').filter(|p| !p.is_empty()) {
        let segments = split_segments(raw)?;
        policy::require_visible(&settings, &segments)?;
        let path = resolve_existing(&root, &segments)?;
        let label = segments.last().cloned().unwrap_or_default();
        resolved.push((label, path));
    }

    let ticket = state
        .runtime
        .begin_transfer(&device_id, Direction::Downloading, 0, None, resolved.len() as u32, 0, 0)
        .await
        .ok_or(ApiError::NotAuthorized)?;

    let result = zipstream::zip_entries(&resolved, settings.show_hidden_files, &ticket).await;
    ticket.close().await;
    let bytes = result?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, content_disposition("selection.zip")),
        ],
        bytes,
    )
        .into_response())
}

#[derive(Debug, serde::Deserialize)]
pub struct BatchDownloadQuery {
    pub paths: String,
}

pub async fn upload(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(query): Query<UploadQuery>,
    jar: CookieJar,
    body: Body,
) -> Result<Json<UploadResponse>, ApiError> {
    let ip = client_ip(&headers, addr);
    let device_id = require_session(&state, &jar, &ip).await?;
    let settings = state.runtime.settings();
    let segments = split_segments(&query.path)?;
    policy::require_visible(&settings, &segments)?;
    policy::require_upload(&settings)?;
    let root = policy::shared_folder(&settings)?;
    let dir = resolve(&root, &segments, true)?;
    if !dir.is_dir() {
        return Err(ApiError::validation("path is not a directory"));
    }

    let final_name = unique_name(&dir, &query.name);
    let dest = dir.join(&final_name);
    let content_length = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);

    let ticket = state
        .runtime
        .begin_transfer(
            &device_id,
            Direction::Uploading,
            content_length,
            query.batch_id.clone(),
            query.batch_total_files.unwrap_or(1),
            query.batch_total_bytes.unwrap_or(content_length),
            query.batch_completed_files.unwrap_or(0),
        )
        .await
        .ok_or(ApiError::NotAuthorized)?;

    let result = write_upload_body(body, &dest, &ticket).await;
    ticket.close().await;

    match result {
        Ok(()) => Ok(Json(UploadResponse { status: "ok", name: final_name })),
        Err(err) => {
            let _ = tokio::fs::remove_file(&dest).await;
            Err(err)
        }
    }
}

async fn write_upload_body(body: Body, dest: &PathBuf, ticket: &mediabus_core::TransferTicket) -> Result<(), ApiError> {
    let mut file = tokio::fs::File::create(dest).await?;
    let mut stream = body.into_data_stream();
    while let Some(chunk) = stream.next().await {
        if ticket.cancelled().await {
            return Err(ApiError::ClientAborted);
        }
        let chunk = chunk.map_err(|e| ApiError::internal(e.to_string()))?;
        file.write_all(&chunk).await?;
        ticket.add_progress(chunk.len() as u64).await;
    }
    file.flush().await?;
    Ok(())
}

pub async fn delete(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(query): Query<DownloadQuery>,
    jar: CookieJar,
) -> Result<Json<serde_json::Value>, ApiError> {
    let ip = client_ip(&headers, addr);
    require_session(&state, &jar, &ip).await?;
    let settings = state.runtime.settings();
    let segments = split_segments(&query.path)?;
    policy::require_visible(&settings, &segments)?;
    policy::require_delete(&settings)?;
    let root = policy::shared_folder(&settings)?;
    let target = resolve_existing(&root, &segments)?;

    if target.is_dir() {
        tokio::fs::remove_dir_all(&target).await?;
    } else {
        tokio::fs::remove_file(&target).await?;
    }
    Ok(Json(serde_json::json!({ "status": "ok" })))
}

pub async fn mkdir(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(query): Query<MkdirQuery>,
    jar: CookieJar,
) -> Result<Json<MkdirResponse>, ApiError> {
    let ip = client_ip(&headers, addr);
    require_session(&state, &jar, &ip).await?;
    let settings = state.runtime.settings();
    let mut segments = split_segments(&query.path)?;
    policy::require_visible(&settings, &segments)?;
    policy::require_upload(&settings)?;
    let root = policy::shared_folder(&settings)?;
    let parent = resolve(&root, &segments, false)?;
    if !parent.exists() {
        tokio::fs::create_dir_all(&parent).await?;
    }
    let name = split_segments(&query.name)?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::validation("invalid directory name"))?;
    if parent.join(&name).exists() {
        return Err(ApiError::Conflict);
    }
    tokio::fs::create_dir(parent.join(&name)).await?;
    segments.push(name);
    Ok(Json(MkdirResponse { path: segments.join("/") }))
}

pub async fn rename(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(query): Query<RenameQuery>,
    jar: CookieJar,
) -> Result<Json<RenameResponse>, ApiError> {
    let ip = client_ip(&headers, addr);
    require_session(&state, &jar, &ip).await?;
    let settings = state.runtime.settings();
    let segments = split_segments(&query.path)?;
    policy::require_visible(&settings, &segments)?;
    policy::require_upload(&settings)?;
    let root = policy::shared_folder(&settings)?;
    let source = resolve_existing(&root, &segments)?;
    let parent = source.parent().unwrap_or(&root);

    let requested = split_segments(&query.name)?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::validation("invalid name"))?;
    if parent.join(&requested).exists() {
        return Err(ApiError::Conflict);
    }
    tokio::fs::rename(&source, parent.join(&requested)).await?;

    let mut renamed_segments = segments[..segments.len() - 1].to_vec();
    renamed_segments.push(requested);
    Ok(Json(RenameResponse { path: segments.join("/"), renamed: renamed_segments.join("/") }))
}

/// Streams `file` to the client in a background task so the ticket's device
/// lock is released exactly once, after the last byte is sent or the
/// transfer is cancelled mid-flight.
fn streamed_file_body(mut file: tokio::fs::File, ticket: mediabus_core::TransferTicket) -> Body {
    let (tx, rx) = tokio::sync::mpsc::channel::<std::io::Result<bytes::Bytes>>(4);
    tokio::spawn(async move {
        let _ = file.seek(SeekFrom::Start(0)).await;
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            if ticket.cancelled().await {
                break;
            }
            match tokio::io::AsyncReadExt::read(&mut file, &mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    ticket.add_progress(n as u64).await;
                    if tx.send(Ok(bytes::Bytes::copy_from_slice(&buf[..n]))).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    break;
                }
            }
        }
        ticket.close().await;
    });
    Body::from_stream(tokio_stream::wrappers::ReceiverStream::new(rx))
}

fn content_disposition(name: &str) -> String {
    let escaped = name.replace('"', "");
    format!("attachment; filename=\"{escaped}\"")
}
