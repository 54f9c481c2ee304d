//! Static menu authorization: which destinations each role may open.

pub mod config;

pub use config::AccessConfig;

use crate::error::Result;
use crate::types::{Destination, DestinationId, Role};
use std::collections::HashSet;

/// Validated role -> destination mapping.
///
/// Rows are stored as id sets; results are always produced in the declaration
/// order of the destination universe, so repeated calls return identical
/// sequences.
#[derive(Debug, Clone)]
pub struct AuthorizationTable {
    destinations: Vec<Destination>,
    public: HashSet<DestinationId>,
    user: HashSet<DestinationId>,
    issuer: HashSet<DestinationId>,
    admin: HashSet<DestinationId>,
    default_id: DestinationId,
}

impl Default for AuthorizationTable {
    fn default() -> Self {
        let config = AccessConfig::default();
        Self::build(&config)
    }
}

impl AuthorizationTable {
    pub fn from_config(config: &AccessConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: &AccessConfig) -> Self {
        let row = |role| config.row(role).iter().cloned().collect::<HashSet<_>>();
        let public = row(Role::Unauthenticated);
        let default_id = config
            .destinations
            .iter()
            .find(|d| public.contains(&d.id))
            .map(|d| d.id.clone())
            .unwrap_or_else(|| config.public[0].clone());
        Self {
            destinations: config.destinations.clone(),
            public,
            user: row(Role::User),
            issuer: row(Role::Issuer),
            admin: row(Role::Admin),
            default_id,
        }
    }

    fn row(&self, role: Role) -> &HashSet<DestinationId> {
        match role {
            Role::Unauthenticated => &self.public,
            Role::User => &self.user,
            Role::Issuer => &self.issuer,
            Role::Admin => &self.admin,
        }
    }

    /// Every destination, in declaration order.
    pub fn universe(&self) -> &[Destination] {
        &self.destinations
    }

    pub fn visible_destinations(&self, role: Role) -> Vec<Destination> {
        let row = self.row(role);
        self.destinations
            .iter()
            .filter(|d| row.contains(&d.id))
            .cloned()
            .collect()
    }

    /// Like [`visible_destinations`](Self::visible_destinations) for a raw role
    /// name; names that do not parse get the public set.
    pub fn visible_for_name(&self, role: &str) -> Vec<Destination> {
        let role = role.parse().unwrap_or(Role::Unauthenticated);
        self.visible_destinations(role)
    }

    pub fn is_visible(&self, role: Role, id: &DestinationId) -> bool {
        self.row(role).contains(id)
    }

    pub fn is_public(&self, id: &DestinationId) -> bool {
        self.public.contains(id)
    }

    pub fn get(&self, id: &str) -> Option<&Destination> {
        self.destinations.iter().find(|d| d.id == id)
    }

    /// Map a route to its destination. Exact matches win over nested routes,
    /// and the longest prefix wins among nested routes.
    pub fn resolve_path(&self, path: &str) -> Option<&Destination> {
        let path = match path.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };
        if let Some(exact) = self.destinations.iter().find(|d| d.path == path) {
            return Some(exact);
        }
        self.destinations
            .iter()
            .filter(|d| d.matches_path(path))
            .max_by_key(|d| d.path.len())
    }

    /// First entry of the public set; the target of every forced redirect.
    pub fn default_destination(&self) -> &Destination {
        self.destinations
            .iter()
            .find(|d| d.id == self.default_id)
            .unwrap_or(&self.destinations[0])
    }
}
