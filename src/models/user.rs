//! Local mirror of an externally-authenticated account.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A marketplace user. Authentication happens upstream; this row exists so
/// privileged listing creation can verify an explicit owner id.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Id assigned by the identity provider.
    pub id: Uuid,

    pub display_name: String,

    pub created_at: DateTime<Utc>,
}
