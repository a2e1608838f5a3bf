//! ABOUTME: Domain records for tenants, users, documents, audit, and memory
//! ABOUTME: Serde-serializable value types shared across storage and tools

pub mod api_key;
pub mod audit;
pub mod document;
pub mod memory;
pub mod template;
pub mod tenant;
pub mod user;
