//! Represents a category listings are filed under.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A category, referenced by listings through its unique name.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,

    /// Unique human-readable name, the value listings store.
    pub name: String,

    pub created_at: DateTime<Utc>,
}
