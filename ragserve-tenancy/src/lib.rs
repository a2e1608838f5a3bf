//! ABOUTME: Tenant lifecycle and per-tenant resource provisioning
//! ABOUTME: Registration, templates, tiers, soft/hard delete, usage metrics

pub mod manager;
pub mod templates;
pub mod usage;

pub use manager::{RegisteredTenant, TenantManager};
pub use templates::builtin_templates;
pub use usage::TenantUsageMetrics;
