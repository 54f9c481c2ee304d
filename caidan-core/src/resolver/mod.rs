//! Role resolution: identity signal in, role (and optional menu grant) out.

pub mod http;

pub use http::HttpRoleLookup;

use crate::access::AuthorizationTable;
use crate::error::{CaidanError, Result};
use crate::types::{Destination, DestinationId, IdentitySignal, Role};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What a backend "who am I" call returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LookupResponse {
    pub role: Option<String>,
    #[serde(default)]
    pub destinations: Vec<Destination>,
    pub token: Option<String>,
}

#[async_trait]
pub trait RoleLookup: Send + Sync {
    async fn lookup(&self, identity: &IdentitySignal) -> Result<LookupResponse>;
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub role: Role,
    /// Destinations the backend granted, when it sent a menu. Narrows the
    /// role's table row; public destinations always stay visible.
    pub grant: Option<Vec<DestinationId>>,
    /// Token newly issued by the backend, to be persisted.
    pub issued_token: Option<String>,
}

impl Resolution {
    pub fn anonymous() -> Self {
        Self::with_role(Role::Unauthenticated)
    }

    pub fn with_role(role: Role) -> Self {
        Self {
            role,
            grant: None,
            issued_token: None,
        }
    }
}

pub struct RoleResolver {
    lookup: Option<Arc<dyn RoleLookup>>,
    default_role: Role,
    role_override: RwLock<Option<Role>>,
}

impl Default for RoleResolver {
    fn default() -> Self {
        Self::new(Role::User)
    }
}

impl RoleResolver {
    /// Resolver without a backend; every present identity gets `default_role`.
    pub fn new(default_role: Role) -> Self {
        Self {
            lookup: None,
            default_role,
            role_override: RwLock::new(None),
        }
    }

    pub fn with_lookup(lookup: Arc<dyn RoleLookup>) -> Self {
        Self {
            lookup: Some(lookup),
            ..Self::default()
        }
    }

    pub fn default_role(&self) -> Role {
        self.default_role
    }

    pub fn has_lookup(&self) -> bool {
        self.lookup.is_some()
    }

    /// Demo/test hook: force every present identity to `role`.
    pub fn set_override(&self, role: Option<Role>) {
        *self.role_override.write() = role;
    }

    pub fn role_override(&self) -> Option<Role> {
        *self.role_override.read()
    }

    pub async fn resolve(
        &self,
        identity: &IdentitySignal,
        table: &AuthorizationTable,
    ) -> Result<Resolution> {
        if !identity.is_present() {
            return Ok(Resolution::anonymous());
        }

        if let Some(role) = self.role_override() {
            tracing::debug!("Role override '{}' applied to {}", role, identity.describe());
            return Ok(Resolution::with_role(role));
        }

        let Some(lookup) = &self.lookup else {
            return Ok(Resolution::with_role(self.default_role));
        };

        let response = lookup.lookup(identity).await.map_err(|e| match e {
            CaidanError::RoleLookupFailed(_) => e,
            other => CaidanError::lookup(other.to_string()),
        })?;

        let role_name = response
            .role
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .ok_or_else(|| CaidanError::lookup("Response is missing the role field"))?;
        let role: Role = role_name
            .parse()
            .map_err(|_| CaidanError::lookup(format!("Unknown role '{}'", role_name)))?;

        let grant = if response.destinations.is_empty() {
            None
        } else {
            Some(map_grant(&response.destinations, table))
        };

        Ok(Resolution {
            role,
            grant,
            issued_token: response.token.filter(|t| !t.is_empty()),
        })
    }
}

/// Match backend menu entries to known destinations by path.
fn map_grant(menus: &[Destination], table: &AuthorizationTable) -> Vec<DestinationId> {
    let mut granted = Vec::new();
    for menu in menus {
        match table.universe().iter().find(|d| d.path == menu.path) {
            Some(destination) if !granted.contains(&destination.id) => {
                granted.push(destination.id.clone())
            }
            Some(_) => {}
            None => tracing::debug!("Ignoring unknown menu path from backend: {}", menu.path),
        }
    }
    granted
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedLookup(Result<LookupResponse>);

    #[async_trait]
    impl RoleLookup for FixedLookup {
        async fn lookup(&self, _identity: &IdentitySignal) -> Result<LookupResponse> {
            match &self.0 {
                Ok(response) => Ok(response.clone()),
                Err(e) => Err(CaidanError::http(e.to_string())),
            }
        }
    }

    fn resolver(response: Result<LookupResponse>) -> RoleResolver {
        RoleResolver::with_lookup(Arc::new(FixedLookup(response)))
    }

    #[tokio::test]
    async fn test_no_identity_is_unauthenticated() {
        let table = AuthorizationTable::default();
        let resolver = RoleResolver::default();
        let resolution = resolver
            .resolve(&IdentitySignal::wallet(""), &table)
            .await
            .unwrap();
        assert_eq!(resolution, Resolution::anonymous());
    }

    #[tokio::test]
    async fn test_default_role_without_backend() {
        let table = AuthorizationTable::default();
        let resolver = RoleResolver::default();
        let resolution = resolver
            .resolve(&IdentitySignal::wallet("0xabc"), &table)
            .await
            .unwrap();
        assert_eq!(resolution.role, Role::User);
    }

    #[tokio::test]
    async fn test_override_wins_over_backend() {
        let table = AuthorizationTable::default();
        let resolver = resolver(Err(CaidanError::http("unreachable")));
        resolver.set_override(Some(Role::Admin));
        let resolution = resolver
            .resolve(&IdentitySignal::token("t"), &table)
            .await
            .unwrap();
        assert_eq!(resolution.role, Role::Admin);

        resolver.set_override(None);
        assert!(resolver
            .resolve(&IdentitySignal::token("t"), &table)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_backend_role_and_grant() {
        let table = AuthorizationTable::default();
        let resolver = resolver(Ok(LookupResponse {
            role: Some("issuer".to_string()),
            destinations: vec![
                Destination::new("1", "Lottery", "/lottery"),
                Destination::new("2", "Mystery", "/mystery"),
                Destination::new("3", "Lottery again", "/lottery"),
            ],
            token: Some("jwt".to_string()),
        }));

        let resolution = resolver
            .resolve(&IdentitySignal::wallet("0xabc"), &table)
            .await
            .unwrap();
        assert_eq!(resolution.role, Role::Issuer);
        assert_eq!(resolution.grant, Some(vec![DestinationId::from("lottery")]));
        assert_eq!(resolution.issued_token.as_deref(), Some("jwt"));
    }

    #[tokio::test]
    async fn test_missing_role_fails() {
        let table = AuthorizationTable::default();
        let resolver = resolver(Ok(LookupResponse::default()));
        let err = resolver
            .resolve(&IdentitySignal::wallet("0xabc"), &table)
            .await
            .unwrap_err();
        assert!(matches!(err, CaidanError::RoleLookupFailed(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_unknown_role_fails() {
        let table = AuthorizationTable::default();
        let resolver = resolver(Ok(LookupResponse {
            role: Some("croupier".to_string()),
            ..LookupResponse::default()
        }));
        assert!(matches!(
            resolver
                .resolve(&IdentitySignal::wallet("0xabc"), &table)
                .await,
            Err(CaidanError::RoleLookupFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_transport_error_becomes_lookup_failure() {
        let table = AuthorizationTable::default();
        let resolver = resolver(Err(CaidanError::http("connection refused")));
        let err = resolver
            .resolve(&IdentitySignal::wallet("0xabc"), &table)
            .await
            .unwrap_err();
        assert!(matches!(err, CaidanError::RoleLookupFailed(_)));
    }
}
