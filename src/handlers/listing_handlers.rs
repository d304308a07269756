//! HTTP handlers for product and service listings.
//!
//! The same handlers back both `/products` and `/services`; the kind is
//! injected per route tree as an `Extension`, so a product id can never be
//! addressed through the services routes.

use crate::{
    errors::AppError,
    handlers::auth::ActingUser,
    models::{
        image::ListingImage,
        listing::{Listing, ListingKind, Price},
    },
    services::listing_service::{ImageInput, ListListingsParams, ListingPatch, NewListing},
    state::AppState,
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 100;

/// One image as sent by clients: the URL/key pair returned by the presign
/// endpoint. Array order is display order.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageReq {
    pub image_url: String,
    pub image_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateListingReq {
    pub name: String,
    pub description: String,
    pub category: String,
    pub price: String,
    pub images: Option<Vec<ImageReq>>,
    /// Admin-only: create on behalf of this user.
    pub owner_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateListingReq {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<String>,
    /// Complete desired final image set, not a delta.
    pub images: Option<Vec<ImageReq>>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub category: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Listing plus its ordered image set, the `GET /{kind}/{id}` body.
#[derive(Debug, Serialize)]
pub struct ListingDetail {
    #[serde(flatten)]
    pub listing: Listing,
    pub images: Vec<ListingImage>,
}

fn parse_price(raw: &str) -> Result<Price, AppError> {
    Price::parse(raw).map_err(|err| AppError::bad_request(err.to_string()))
}

fn map_images(images: Option<Vec<ImageReq>>) -> Vec<ImageInput> {
    images
        .unwrap_or_default()
        .into_iter()
        .map(|img| ImageInput {
            image_url: img.image_url,
            image_key: img.image_key,
        })
        .collect()
}

/// POST `/{kind}` — create a listing with its image set.
pub async fn create_listing(
    State(app): State<AppState>,
    Extension(kind): Extension<ListingKind>,
    actor: ActingUser,
    Json(req): Json<CreateListingReq>,
) -> Result<impl IntoResponse, AppError> {
    let input = NewListing {
        name: req.name,
        description: req.description,
        category_name: req.category,
        price: parse_price(&req.price)?,
        images: map_images(req.images),
        owner_override: req.owner_id,
    };

    let listing = app
        .listings
        .create_listing(kind, actor.id, actor.privileged, input)
        .await?;
    Ok((StatusCode::CREATED, Json(listing)))
}

/// GET `/{kind}` — list listings, supports ?category=&limit=&offset=
pub async fn list_listings(
    State(app): State<AppState>,
    Extension(kind): Extension<ListingKind>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Vec<Listing>>, AppError> {
    let params = ListListingsParams {
        category: q.category,
        limit: q.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        offset: q.offset.unwrap_or(0).max(0),
    };
    let listings = app.listings.list_listings(kind, params).await?;
    Ok(Json(listings))
}

/// GET `/{kind}/{id}` — one listing with its images.
pub async fn get_listing(
    State(app): State<AppState>,
    Extension(kind): Extension<ListingKind>,
    Path(id): Path<Uuid>,
) -> Result<Json<ListingDetail>, AppError> {
    let (listing, images) = app.listings.get_listing(kind, id).await?;
    Ok(Json(ListingDetail { listing, images }))
}

/// PATCH `/{kind}/{id}` — sparse update; replaces the image set when
/// `images` is present.
pub async fn update_listing(
    State(app): State<AppState>,
    Extension(kind): Extension<ListingKind>,
    Path(id): Path<Uuid>,
    actor: ActingUser,
    Json(req): Json<UpdateListingReq>,
) -> Result<Json<Listing>, AppError> {
    let patch = ListingPatch {
        name: req.name,
        description: req.description,
        category_name: req.category,
        price: req.price.as_deref().map(parse_price).transpose()?,
        images: req.images.map(|images| map_images(Some(images))),
    };

    let listing = app
        .listings
        .update_listing(kind, id, actor.id, actor.privileged, patch)
        .await?;
    Ok(Json(listing))
}

/// DELETE `/{kind}/{id}` — remove the listing, its image rows, and
/// (best-effort) its blobs. Returns the deleted record.
pub async fn delete_listing(
    State(app): State<AppState>,
    Extension(kind): Extension<ListingKind>,
    Path(id): Path<Uuid>,
    actor: ActingUser,
) -> Result<Json<Listing>, AppError> {
    let listing = app
        .listings
        .delete_listing(kind, id, actor.id, actor.privileged)
        .await?;
    Ok(Json(listing))
}
