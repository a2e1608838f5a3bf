//! ABOUTME: Error types and handling for ragserve
//! ABOUTME: Provides the RagError taxonomy, wire envelope, and Result alias

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error taxonomy for all ragserve operations.
///
/// Every variant maps to a stable `error_kind` on the wire and an HTTP status
/// on the transport. Constructors exist for the common shapes so call sites
/// stay terse.
#[derive(Debug, Error)]
pub enum RagError {
    #[error("{message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("{message}")]
    Authentication { message: String },

    #[error("{message}")]
    Authorization { message: String },

    #[error("{message}")]
    TenantIsolation { message: String },

    #[error("{message}")]
    NotFound { message: String },

    #[error("{message}")]
    Conflict { message: String },

    #[error("{message}")]
    RateLimited {
        message: String,
        retry_after_secs: Option<u64>,
    },

    #[error("{message}")]
    Transient { message: String },

    #[error("{message}")]
    Internal { message: String },
}

/// Stable error kind discriminant, serialized in the wire envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Authentication,
    Authorization,
    TenantIsolation,
    NotFound,
    Conflict,
    RateLimited,
    Transient,
    Internal,
}

impl ErrorKind {
    /// Wire name of the kind
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Authentication => "authentication",
            Self::Authorization => "authorization",
            Self::TenantIsolation => "tenant_isolation",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::RateLimited => "rate_limited",
            Self::Transient => "transient",
            Self::Internal => "internal",
        }
    }
}

impl RagError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            message: message.into(),
        }
    }

    pub fn tenant_isolation(message: impl Into<String>) -> Self {
        Self::TenantIsolation {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn rate_limited(message: impl Into<String>, retry_after_secs: Option<u64>) -> Self {
        Self::RateLimited {
            message: message.into(),
            retry_after_secs,
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Kind discriminant for this error
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Authentication { .. } => ErrorKind::Authentication,
            Self::Authorization { .. } => ErrorKind::Authorization,
            Self::TenantIsolation { .. } => ErrorKind::TenantIsolation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::Transient { .. } => ErrorKind::Transient,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Whether a retry with backoff may succeed
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// HTTP status the transport maps this error to
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 400,
            ErrorKind::Authentication => 401,
            ErrorKind::Authorization | ErrorKind::TenantIsolation => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::RateLimited => 429,
            ErrorKind::Transient => 503,
            ErrorKind::Internal => 500,
        }
    }

    /// Stable machine-readable code for the kind
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Validation => "FR-VALIDATION-001",
            ErrorKind::Authentication => "FR-AUTH-001",
            ErrorKind::Authorization => "FR-AUTH-002",
            ErrorKind::TenantIsolation => "FR-TENANT-001",
            ErrorKind::NotFound => "FR-RESOURCE-001",
            ErrorKind::Conflict => "FR-CONFLICT-001",
            ErrorKind::RateLimited => "FR-RATE-001",
            ErrorKind::Transient => "FR-BACKEND-001",
            ErrorKind::Internal => "FR-INTERNAL-001",
        }
    }

    /// Wire envelope for this error
    #[must_use]
    pub fn envelope(&self) -> ErrorEnvelope {
        let field = match self {
            Self::Validation { field, .. } => field.clone(),
            _ => None,
        };
        ErrorEnvelope {
            error_kind: self.kind(),
            error_code: self.error_code().to_string(),
            message: self.to_string(),
            field,
        }
    }
}

/// Wire shape of an error, as returned by the transport
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error_kind: ErrorKind,
    pub error_code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping() {
        assert_eq!(RagError::validation("x").http_status(), 400);
        assert_eq!(RagError::authentication("x").http_status(), 401);
        assert_eq!(RagError::authorization("x").http_status(), 403);
        assert_eq!(RagError::tenant_isolation("x").http_status(), 403);
        assert_eq!(RagError::not_found("x").http_status(), 404);
        assert_eq!(RagError::conflict("x").http_status(), 409);
        assert_eq!(RagError::rate_limited("x", None).http_status(), 429);
        assert_eq!(RagError::transient("x").http_status(), 503);
        assert_eq!(RagError::internal("x").http_status(), 500);
    }

    #[test]
    fn envelope_carries_field_for_validation() {
        let err = RagError::validation_field("query text cannot be empty", "query_text");
        let env = err.envelope();
        assert_eq!(env.error_kind, ErrorKind::Validation);
        assert_eq!(env.field.as_deref(), Some("query_text"));

        let env = RagError::conflict("duplicate").envelope();
        assert!(env.field.is_none());
    }

    #[test]
    fn envelope_serializes_kind_as_snake_case() {
        let env = RagError::tenant_isolation("cross-tenant access").envelope();
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["error_kind"], "tenant_isolation");
    }
}
