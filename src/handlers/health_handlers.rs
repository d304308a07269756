//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks DB connectivity and disk I/O

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;
use tokio::fs;
use uuid::Uuid;

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct CheckResult {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckResult>,
}

/// `GET /healthz`
///
/// Very small liveness probe — always returns 200 OK with a plain JSON body.
/// This endpoint should be cheap and never perform I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Readiness probe that:
/// 1. Runs a lightweight query against SQLite (`SELECT 1`).
/// 2. Performs a best-effort write/read/delete against the blob store root.
///
/// Returns JSON describing each check. HTTP 200 when all checks pass,
/// HTTP 503 when any check fails.
pub async fn readyz(State(app): State<AppState>) -> impl IntoResponse {
    // 1) SQLite check
    let sqlite_check = match sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&*app.listings.db)
        .await
    {
        Ok(1) => CheckResult {
            ok: true,
            detail: None,
        },
        Ok(other) => CheckResult {
            ok: false,
            detail: Some(format!("unexpected result: {}", other)),
        },
        Err(err) => CheckResult {
            ok: false,
            detail: Some(format!("error: {}", err)),
        },
    };

    // 2) Disk write/read/delete check under the blob store root
    let tmp_path = app
        .store
        .base_path
        .join(format!(".readyz-{}", Uuid::new_v4()));
    let disk_check = match fs::write(&tmp_path, b"readyz").await {
        Ok(_) => match fs::read(&tmp_path).await {
            Ok(bytes) if bytes == b"readyz" => {
                let detail = fs::remove_file(&tmp_path)
                    .await
                    .err()
                    .map(|err| format!("could not remove tmp file: {}", err));
                CheckResult { ok: true, detail }
            }
            Ok(_) => {
                let _ = fs::remove_file(&tmp_path).await;
                CheckResult {
                    ok: false,
                    detail: Some("file content mismatch".into()),
                }
            }
            Err(err) => {
                let _ = fs::remove_file(&tmp_path).await;
                CheckResult {
                    ok: false,
                    detail: Some(format!("could not read tmp file: {}", err)),
                }
            }
        },
        Err(err) => CheckResult {
            ok: false,
            detail: Some(format!("could not write tmp file: {}", err)),
        },
    };

    let all_ok = sqlite_check.ok && disk_check.ok;
    let mut checks = HashMap::new();
    checks.insert("sqlite", sqlite_check);
    checks.insert("disk", disk_check);

    let status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(ReadyResponse {
            status: if all_ok { "ready".into() } else { "degraded".into() },
            checks,
        }),
    )
}
