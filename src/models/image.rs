//! Represents one picture attached to a listing.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A member of a listing's ordered image set.
///
/// The blob itself lives in the object store under `image_key`; the row only
/// carries the public URL and the display position. The whole set is rewritten
/// on every image update, so positions are always dense `0..n-1`.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ListingImage {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// Foreign key to the parent listing. Never nullable.
    pub listing_id: Uuid,

    /// Public/CDN-resolvable location of the picture.
    pub image_url: String,

    /// Object-store key, used for blob deletion. Always paired with the URL
    /// when exposed to clients.
    pub image_key: String,

    /// Zero-based display order among siblings.
    pub position: i64,
}
