//! HTTP layer: request parsing, identity extraction, and status mapping.
//! All business rules live in the service layer.

pub mod auth;
pub mod catalog_handlers;
pub mod health_handlers;
pub mod listing_handlers;
pub mod upload_handlers;
