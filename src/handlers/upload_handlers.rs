//! HTTP handlers for the direct-upload flow and media serving.
//!
//! Clients first POST `/uploads` to obtain a presigned upload URL plus the
//! key/URL pair they will later attach to a listing, then PUT the bytes
//! against that URL. Listing mutations never touch this path.

use crate::{errors::AppError, handlers::auth::ActingUser, state::AppState};
use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::io;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

const MAX_EXTENSION_LEN: usize = 8;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignReq {
    pub file_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignResp {
    pub upload_url: String,
    pub image_key: String,
    pub image_url: String,
}

/// Lowercased alphanumeric extension of the original filename, if usable.
fn sanitized_extension(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    if ext.is_empty() || ext.len() > MAX_EXTENSION_LEN {
        return None;
    }
    if !ext.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// POST `/uploads` — issue a presigned upload URL for a fresh key under
/// the acting user's prefix.
pub async fn presign_upload(
    State(app): State<AppState>,
    actor: ActingUser,
    Json(req): Json<PresignReq>,
) -> Result<Json<PresignResp>, AppError> {
    let key = match sanitized_extension(&req.file_name) {
        Some(ext) => format!("{}/{}.{}", actor.id, Uuid::new_v4(), ext),
        None => format!("{}/{}", actor.id, Uuid::new_v4()),
    };

    let token = app.store.presign_upload(&key)?;
    Ok(Json(PresignResp {
        upload_url: format!("{}/uploads/{}", app.public_base_url, token),
        image_url: format!("{}/media/{}", app.public_base_url, key),
        image_key: key,
    }))
}

/// PUT `/uploads/{token}` — stream the request body into the blob the
/// token grants access to. No auth headers needed; the token is the grant.
pub async fn put_upload(
    State(app): State<AppState>,
    Path(token): Path<String>,
    body: Body,
) -> Result<impl IntoResponse, AppError> {
    let key = app.store.verify_upload_token(&token)?;

    let stream = body
        .into_data_stream()
        .map(|chunk| chunk.map_err(|err| io::Error::new(io::ErrorKind::Other, err)));
    let blob = app.store.put_object_stream(&key, stream).await?;

    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::OK;
    if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", blob.etag)) {
        response.headers_mut().insert(header::ETAG, value);
    }
    Ok(response)
}

/// GET `/media/{*key}` — stream a stored blob back.
pub async fn serve_media(
    State(app): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    let (file, len) = app.store.open_object(&key).await?;

    let mut response = Response::new(Body::from_stream(ReaderStream::new(file)));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(content_type_for(&key)),
    );
    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&len.to_string()).unwrap_or_else(|_| HeaderValue::from_static("0")),
    );
    Ok(response)
}

fn content_type_for(key: &str) -> &'static str {
    match key.rsplit_once('.').map(|(_, ext)| ext) {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
