//! Shared handler state, constructed once at startup and cloned per request.

use crate::services::{listing_service::ListingService, object_store::DiskObjectStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// Catalog persistence (listings, images, categories, users).
    pub listings: ListingService,

    /// Concrete blob store; also injected into the service as `dyn ObjectStore`.
    pub store: Arc<DiskObjectStore>,

    /// Base URL used when building upload and media URLs for clients.
    pub public_base_url: String,
}
