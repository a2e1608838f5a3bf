//! ABOUTME: Core types, errors, and backend traits for ragserve
//! ABOUTME: Foundation layer shared by every other crate in the workspace

pub mod context;
pub mod error;
pub mod ids;
pub mod model;
pub mod permissions;
pub mod traits;

// Re-export commonly used types
pub use context::RequestContext;
pub use error::{ErrorEnvelope, ErrorKind, RagError, Result};
pub use model::{
    audit::{AuditQuery, AuditRecord},
    api_key::TenantApiKey,
    document::{Document, DocumentVersion},
    memory::MemoryEntry,
    template::{DomainType, Template},
    tenant::{RateLimitConfig, SubscriptionTier, Tenant, TenantConfiguration},
    user::{AuthMethod, Role, User},
};
pub use traits::relational::Repositories;
