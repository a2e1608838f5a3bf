//! Relational adapter implementations.
//!
//! The embedded backend keeps typed tables in process and emulates row-level
//! security by validating every tenant-addressed call against the request
//! context. The `postgres` feature swaps in the RLS-backed adapter, which
//! sets `app.current_tenant_id` / `app.current_role` session variables so the
//! database-level predicates filter by tenant.

pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;
