use crate::error::{CaidanError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(rename = "unlogged", alias = "unauthenticated")]
    Unauthenticated,
    User,
    Issuer,
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Unauthenticated, Role::User, Role::Issuer, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Unauthenticated => "unlogged",
            Role::User => "user",
            Role::Issuer => "issuer",
            Role::Admin => "admin",
        }
    }

    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Role::Unauthenticated)
    }
}

impl FromStr for Role {
    type Err = CaidanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "unlogged" | "unauthenticated" => Ok(Role::Unauthenticated),
            "user" => Ok(Role::User),
            "issuer" => Ok(Role::Issuer),
            "admin" => Ok(Role::Admin),
            _ => Err(CaidanError::UnknownRole(s.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable key of a navigable location, e.g. `lottery-management`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DestinationId(String);

impl DestinationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DestinationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DestinationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl PartialEq<str> for DestinationId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for DestinationId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub id: DestinationId,
    pub label: String,
    pub path: String,
}

impl Destination {
    pub fn new(id: &str, label: &str, path: &str) -> Self {
        Self {
            id: DestinationId::new(id),
            label: label.to_string(),
            path: path.to_string(),
        }
    }

    /// True when `path` is this destination or a nested route under it.
    pub fn matches_path(&self, path: &str) -> bool {
        if self.path == path {
            return true;
        }
        if self.path == "/" {
            return false;
        }
        path.strip_prefix(self.path.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }
}

/// Authentication signal coming from the wallet connector or a stored session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum IdentitySignal {
    #[default]
    None,
    Wallet {
        address: String,
    },
    Token {
        token: String,
    },
}

impl IdentitySignal {
    pub fn wallet(address: impl Into<String>) -> Self {
        Self::Wallet {
            address: address.into(),
        }
    }

    pub fn token(token: impl Into<String>) -> Self {
        Self::Token {
            token: token.into(),
        }
    }

    /// Empty addresses and tokens carry no identity.
    pub fn is_present(&self) -> bool {
        match self {
            IdentitySignal::None => false,
            IdentitySignal::Wallet { address } => !address.trim().is_empty(),
            IdentitySignal::Token { token } => !token.trim().is_empty(),
        }
    }

    /// Log-safe description; tokens are reduced to a fingerprint.
    pub fn describe(&self) -> String {
        match self {
            IdentitySignal::None => "none".to_string(),
            IdentitySignal::Wallet { address } => format!("wallet {}", short_address(address)),
            IdentitySignal::Token { token } => format!("token {}", fingerprint(token)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub role: Role,
    pub identity_present: bool,
    pub current_path: String,
}

impl SessionState {
    pub fn new(landing_path: impl Into<String>) -> Self {
        Self {
            role: Role::Unauthenticated,
            identity_present: false,
            current_path: landing_path.into(),
        }
    }
}

/// `0x1234...abcd` style display of a wallet address.
pub fn short_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 10 {
        return address.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Short SHA-256 fingerprint for logging secrets.
pub fn fingerprint(secret: &str) -> String {
    let digest = Sha256::digest(secret.as_bytes());
    hex::encode(&digest[..4])
}
