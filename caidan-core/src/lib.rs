//! Caidan core - session and navigation authorization for the lottery client
//!
//! This library decides, from the current wallet or session identity, which
//! pages of the lottery platform a visitor may open, and keeps the active
//! route consistent as the identity, role or route changes.

pub mod access;
pub mod config;
pub mod countdown;
pub mod error;
pub mod identity;
pub mod navigation;
pub mod resolver;
pub mod storage;
pub mod types;

pub use access::{AccessConfig, AuthorizationTable};
pub use config::ClientConfig;
pub use countdown::{Countdown, CountdownDisplay};
pub use error::{CaidanError, Result};
pub use identity::{IdentitySource, ManualIdentitySource};
pub use navigation::{ConnectOutcome, MemoryRouter, Navigator, PathChange, Router, SessionPhase};
pub use resolver::{HttpRoleLookup, LookupResponse, RoleLookup, RoleResolver};
pub use storage::{ArtifactStore, MemoryArtifactStore, SealedArtifactStore, SqliteArtifactStore};
pub use types::{Destination, DestinationId, IdentitySignal, Role, SessionState};
