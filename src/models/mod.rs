//! Core data models for the marketplace catalog.
//!
//! These entities mirror the relational tables one-to-one. They map to rows
//! via `sqlx::FromRow` and serialize naturally as JSON via `serde`.

pub mod category;
pub mod image;
pub mod listing;
pub mod user;
