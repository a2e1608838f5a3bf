//! User identity, roles, and authentication method

use crate::error::{RagError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Roles in the system, broadest first.
///
/// `uber_admin` holds platform-level access across tenants; `tenant_admin`
/// administers a single tenant; `project_admin` can write documents;
/// `end_user` is read-only plus user-scoped memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    UberAdmin,
    TenantAdmin,
    ProjectAdmin,
    EndUser,
}

impl Role {
    /// Wire name of the role
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UberAdmin => "uber_admin",
            Self::TenantAdmin => "tenant_admin",
            Self::ProjectAdmin => "project_admin",
            Self::EndUser => "end_user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = RagError;

    /// Case-insensitive, trims whitespace. Legacy role strings `"user"` and
    /// `"viewer"` map to `end_user`.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "uber_admin" => Ok(Self::UberAdmin),
            "tenant_admin" => Ok(Self::TenantAdmin),
            "project_admin" => Ok(Self::ProjectAdmin),
            "end_user" | "user" | "viewer" => Ok(Self::EndUser),
            other => Err(RagError::validation_field(
                format!("invalid role: {other}"),
                "role",
            )),
        }
    }
}

/// How a principal authenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    ApiKey,
    Jwt,
}

impl AuthMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ApiKey => "api_key",
            Self::Jwt => "jwt",
        }
    }
}

/// Tenant-scoped user identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    /// Globally unique across tenants
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub fn new(tenant_id: Uuid, email: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            tenant_id,
            email: email.into(),
            role,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parsing_handles_legacy_names() {
        assert_eq!("user".parse::<Role>().unwrap(), Role::EndUser);
        assert_eq!("viewer".parse::<Role>().unwrap(), Role::EndUser);
        assert_eq!("  Uber_Admin ".parse::<Role>().unwrap(), Role::UberAdmin);
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn role_serializes_snake_case() {
        let json = serde_json::to_value(Role::TenantAdmin).unwrap();
        assert_eq!(json, "tenant_admin");
    }
}
