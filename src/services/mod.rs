//! Service layer: catalog persistence and blob storage.

pub mod listing_service;
pub mod object_store;
