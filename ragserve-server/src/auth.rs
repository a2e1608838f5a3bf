//! Authentication: API keys (salted hashes) and JWT bearer tokens.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use ragserve_core::model::user::{AuthMethod, Role};
use ragserve_core::traits::relational::{ApiKeyStore, UserStore};
use ragserve_core::{RagError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Resolved principal after a successful authentication
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
    pub auth_method: AuthMethod,
    /// Tenant the credential is bound to: the key's owning tenant, or the
    /// token's tenant claim
    pub tenant_id: Option<Uuid>,
}

/// JWT claim shape. `role` accepts legacy names (`user`, `viewer`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// User id
    pub sub: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<Uuid>,
    pub iss: String,
    pub exp: i64,
}

/// Authenticates transport credentials into a [`Principal`]
pub struct Authenticator {
    api_keys: Arc<dyn ApiKeyStore>,
    users: Arc<dyn UserStore>,
    jwt_secret: String,
    jwt_issuer: String,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("jwt_issuer", &self.jwt_issuer)
            .finish_non_exhaustive()
    }
}

impl Authenticator {
    #[must_use]
    pub fn new(
        api_keys: Arc<dyn ApiKeyStore>,
        users: Arc<dyn UserStore>,
        jwt_secret: impl Into<String>,
        jwt_issuer: impl Into<String>,
    ) -> Self {
        Self {
            api_keys,
            users,
            jwt_secret: jwt_secret.into(),
            jwt_issuer: jwt_issuer.into(),
        }
    }

    /// Resolve the presented credential. Exactly one of `api_key` /
    /// `bearer_token` is honored, the API key first.
    pub async fn authenticate(
        &self,
        api_key: Option<&str>,
        bearer_token: Option<&str>,
    ) -> Result<Principal> {
        if let Some(presented) = api_key {
            return self.authenticate_api_key(presented).await;
        }
        if let Some(token) = bearer_token {
            return self.authenticate_jwt(token);
        }
        Err(RagError::authentication("missing credentials"))
    }

    /// Hash the presented key per stored salt and match against the stored
    /// salted hashes. Expired keys never match.
    async fn authenticate_api_key(&self, presented: &str) -> Result<Principal> {
        let keys = self.api_keys.all_keys().await?;
        let matched = keys.iter().find(|k| k.verify(presented));
        let Some(key) = matched else {
            return Err(RagError::authentication("invalid API key"));
        };
        let user = self
            .users
            .get_user(key.user_id)
            .await?
            .ok_or_else(|| RagError::authentication("API key principal no longer exists"))?;
        debug!(tenant_id = %key.tenant_id, user_id = %user.user_id, "authenticated via API key");
        Ok(Principal {
            user_id: user.user_id,
            role: user.role,
            auth_method: AuthMethod::ApiKey,
            tenant_id: Some(key.tenant_id),
        })
    }

    fn authenticate_jwt(&self, token: &str) -> Result<Principal> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.jwt_issuer.as_str()]);
        let data = decode::<JwtClaims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| RagError::authentication(format!("invalid token: {e}")))?;

        let user_id: Uuid = data
            .claims
            .sub
            .parse()
            .map_err(|_| RagError::authentication("invalid subject claim"))?;
        let role = Role::from_str(&data.claims.role)
            .map_err(|_| RagError::authentication("invalid role claim"))?;
        debug!(user_id = %user_id, role = %role, "authenticated via JWT");
        Ok(Principal {
            user_id,
            role,
            auth_method: AuthMethod::Jwt,
            tenant_id: data.claims.tenant_id,
        })
    }

    /// Mint a token for this issuer. Used by operator tooling and tests.
    pub fn issue_token(
        &self,
        user_id: Uuid,
        role: Role,
        tenant_id: Option<Uuid>,
        ttl: chrono::Duration,
    ) -> Result<String> {
        let claims = JwtClaims {
            sub: user_id.to_string(),
            role: role.as_str().to_string(),
            tenant_id,
            iss: self.jwt_issuer.clone(),
            exp: (chrono::Utc::now() + ttl).timestamp(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| RagError::internal(format!("cannot issue token: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragserve_core::model::api_key::TenantApiKey;
    use ragserve_core::model::user::User;
    use ragserve_storage::MemoryRelational;

    fn authenticator(store: &Arc<MemoryRelational>) -> Authenticator {
        Authenticator::new(store.clone(), store.clone(), "test-secret", "ragserve")
    }

    #[tokio::test]
    async fn api_key_resolves_to_owning_tenant_and_user_role() {
        let store = MemoryRelational::new();
        let tenant = Uuid::new_v4();
        let user = User::new(tenant, "ops@acme.example", Role::TenantAdmin);
        let key = TenantApiKey::new(tenant, user.user_id, "ci", "ab12", "rsk-secret");
        ragserve_core::traits::relational::UserStore::insert_user(store.as_ref(), user.clone())
            .await
            .unwrap();
        ragserve_core::traits::relational::ApiKeyStore::insert_key(store.as_ref(), key)
            .await
            .unwrap();

        let auth = authenticator(&store);
        let principal = auth.authenticate(Some("rsk-secret"), None).await.unwrap();
        assert_eq!(principal.tenant_id, Some(tenant));
        assert_eq!(principal.role, Role::TenantAdmin);
        assert_eq!(principal.auth_method, AuthMethod::ApiKey);

        let err = auth.authenticate(Some("rsk-wrong"), None).await.unwrap_err();
        assert_eq!(err.kind(), ragserve_core::ErrorKind::Authentication);
    }

    #[tokio::test]
    async fn jwt_round_trip_and_issuer_check() {
        let store = MemoryRelational::new();
        let auth = authenticator(&store);
        let user_id = Uuid::new_v4();
        let tenant = Uuid::new_v4();

        let token = auth
            .issue_token(user_id, Role::EndUser, Some(tenant), chrono::Duration::hours(1))
            .unwrap();
        let principal = auth.authenticate(None, Some(&token)).await.unwrap();
        assert_eq!(principal.user_id, user_id);
        assert_eq!(principal.tenant_id, Some(tenant));
        assert_eq!(principal.auth_method, AuthMethod::Jwt);

        let other = Authenticator::new(store.clone(), store.clone(), "test-secret", "someone-else");
        let foreign = other
            .issue_token(user_id, Role::EndUser, None, chrono::Duration::hours(1))
            .unwrap();
        let err = auth.authenticate(None, Some(&foreign)).await.unwrap_err();
        assert_eq!(err.kind(), ragserve_core::ErrorKind::Authentication);
    }

    #[tokio::test]
    async fn missing_credentials_are_rejected() {
        let store = MemoryRelational::new();
        let auth = authenticator(&store);
        let err = auth.authenticate(None, None).await.unwrap_err();
        assert_eq!(err.kind(), ragserve_core::ErrorKind::Authentication);
    }
}
