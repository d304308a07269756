//! Defines routes for the marketplace REST surface.
//!
//! ## Structure
//! - **Listing endpoints** (mounted twice, once per kind)
//!   - `GET    /products`, `GET /services` — list (category filter, paging)
//!   - `POST   /products`, ... — create listing with image set
//!   - `GET    /products/{id}` — listing plus ordered images
//!   - `PATCH  /products/{id}` — sparse update / image-set replace
//!   - `DELETE /products/{id}` — cascade delete
//!
//! - **Catalog endpoints**
//!   - `GET/POST /categories`
//!   - `PUT      /users/me`
//!
//! - **Upload endpoints**
//!   - `POST /uploads` — presign
//!   - `PUT  /uploads/{token}` — direct upload
//!   - `GET  /media/{*key}` — serve blob
//!
//! The product/service split is an `Extension<ListingKind>` layered onto
//! each mounted tree, so the two namespaces share handler code.

use crate::{
    handlers::{
        catalog_handlers::{create_category, list_categories, upsert_me},
        health_handlers::{healthz, readyz},
        listing_handlers::{
            create_listing, delete_listing, get_listing, list_listings, update_listing,
        },
        upload_handlers::{presign_upload, put_upload, serve_media},
    },
    models::listing::ListingKind,
    state::AppState,
};
use axum::{
    Extension, Router,
    routing::{get, post, put},
};

fn listing_routes(kind: ListingKind) -> Router<AppState> {
    Router::new()
        .route("/", get(list_listings).post(create_listing))
        .route(
            "/{id}",
            get(get_listing).patch(update_listing).delete(delete_listing),
        )
        .layer(Extension(kind))
}

/// Build and return the router for the whole REST surface.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // catalog
        .route("/categories", get(list_categories).post(create_category))
        .route("/users/me", put(upsert_me))
        // uploads & media
        .route("/uploads", post(presign_upload))
        .route("/uploads/{token}", put(put_upload))
        .route("/media/{*key}", get(serve_media))
        // listings, one tree per kind
        .nest("/products", listing_routes(ListingKind::Product))
        .nest("/services", listing_routes(ListingKind::Service))
}
