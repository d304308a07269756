//! HTTP handlers for categories and the user mirror.

use crate::{
    errors::AppError,
    handlers::auth::ActingUser,
    models::{category::Category, user::User},
    state::AppState,
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CreateCategoryReq {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertUserReq {
    pub display_name: String,
}

/// GET `/categories`
pub async fn list_categories(
    State(app): State<AppState>,
) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(app.listings.list_categories().await?))
}

/// POST `/categories` — admin only.
pub async fn create_category(
    State(app): State<AppState>,
    actor: ActingUser,
    Json(req): Json<CreateCategoryReq>,
) -> Result<impl IntoResponse, AppError> {
    if !actor.privileged {
        return Err(AppError::new(
            StatusCode::FORBIDDEN,
            "only admins can create categories",
        ));
    }
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("category name cannot be empty"));
    }

    let category = app.listings.create_category(name).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// PUT `/users/me` — record the acting user locally so privileged listing
/// creation can reference them by id.
pub async fn upsert_me(
    State(app): State<AppState>,
    actor: ActingUser,
    Json(req): Json<UpsertUserReq>,
) -> Result<Json<User>, AppError> {
    let user = app.listings.upsert_user(actor.id, &req.display_name).await?;
    Ok(Json(user))
}
