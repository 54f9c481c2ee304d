use crate::error::{CaidanError, Result};
use crate::types::{Destination, DestinationId, Role};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Serializable description of the destination universe and per-role menus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessConfig {
    pub destinations: Vec<Destination>,
    pub public: Vec<DestinationId>,
    pub user: Vec<DestinationId>,
    pub issuer: Vec<DestinationId>,
    pub admin: Vec<DestinationId>,
}

fn ids(list: &[&str]) -> Vec<DestinationId> {
    list.iter().map(|id| DestinationId::from(*id)).collect()
}

impl Default for AccessConfig {
    fn default() -> Self {
        let destinations = vec![
            Destination::new("home", "Home", "/"),
            Destination::new("lottery", "Lottery", "/lottery"),
            Destination::new("results", "Results", "/results"),
            Destination::new("history", "History", "/history"),
            Destination::new("wallet", "Wallet", "/wallet"),
            Destination::new("governance", "Governance", "/governance"),
            Destination::new("lottery-management", "Lottery Management", "/lottery-management"),
            Destination::new("analytics", "Analytics", "/analytics"),
            Destination::new("settings", "Settings", "/settings"),
            Destination::new("polls", "Polls", "/polls"),
            Destination::new("poll", "Poll", "/poll"),
            Destination::new("login", "Login", "/login"),
        ];
        let admin = destinations.iter().map(|d| d.id.clone()).collect();

        Self {
            destinations,
            public: ids(&["home", "results", "login"]),
            user: ids(&[
                "home",
                "lottery",
                "results",
                "history",
                "wallet",
                "governance",
                "settings",
                "polls",
                "poll",
                "login",
            ]),
            issuer: ids(&[
                "home",
                "lottery",
                "results",
                "history",
                "wallet",
                "lottery-management",
                "analytics",
                "settings",
                "login",
            ]),
            admin,
        }
    }
}

impl AccessConfig {
    /// Variant where anonymous visitors land on a dedicated login page.
    /// The first public destination in declaration order is the landing
    /// page, so this moves `login` to the front.
    pub fn with_login_landing() -> Self {
        let mut config = Self::default();
        if let Some(index) = config.destinations.iter().position(|d| d.id == "login") {
            let login = config.destinations.remove(index);
            config.destinations.insert(0, login);
        }
        config
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path).await?;
        Self::from_json(&json)
    }

    pub fn row(&self, role: Role) -> &[DestinationId] {
        match role {
            Role::Unauthenticated => &self.public,
            Role::User => &self.user,
            Role::Issuer => &self.issuer,
            Role::Admin => &self.admin,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.destinations.is_empty() {
            return Err(CaidanError::config("Destination list cannot be empty"));
        }

        let mut seen_ids = HashSet::new();
        let mut seen_paths = HashSet::new();
        for destination in &self.destinations {
            if !destination.path.starts_with('/') {
                return Err(CaidanError::config(format!(
                    "Path of '{}' must start with '/': {}",
                    destination.id, destination.path
                )));
            }
            if !seen_ids.insert(destination.id.clone()) {
                return Err(CaidanError::config(format!(
                    "Duplicate destination id: {}",
                    destination.id
                )));
            }
            if !seen_paths.insert(destination.path.as_str()) {
                return Err(CaidanError::config(format!(
                    "Duplicate destination path: {}",
                    destination.path
                )));
            }
        }

        for role in Role::ALL {
            let row = self.row(role);
            if row.is_empty() {
                return Err(CaidanError::config(format!(
                    "Menu for role '{}' cannot be empty",
                    role
                )));
            }
            if let Some(unknown) = row.iter().find(|id| !seen_ids.contains(*id)) {
                return Err(CaidanError::config(format!(
                    "Menu for role '{}' references unknown destination '{}'",
                    role, unknown
                )));
            }
            if let Some(missing) = self.public.iter().find(|id| !row.contains(id)) {
                return Err(CaidanError::config(format!(
                    "Public destination '{}' missing from menu of role '{}'",
                    missing, role
                )));
            }
        }

        if self.admin.len() != seen_ids.len()
            || seen_ids.iter().any(|id| !self.admin.contains(id))
        {
            return Err(CaidanError::config(
                "Admin menu must contain every destination",
            ));
        }

        Ok(())
    }
}
