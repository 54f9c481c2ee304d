//! Navigation state machine.
//!
//! [`Navigator`] is the only writer of [`SessionState`]. It reacts to identity
//! changes (connect / disconnect / role override) and route changes, and
//! keeps the current path inside the set of destinations the current role is
//! allowed to see.
//!
//! Every identity event takes a generation ticket. A resolution whose ticket
//! is no longer the newest when it completes is discarded, so a slow lookup
//! can never overwrite the result of a later connect or undo a disconnect.

pub mod router;

pub use router::{MemoryRouter, Router};

use crate::access::AuthorizationTable;
use crate::config::ClientConfig;
use crate::error::{CaidanError, Result};
use crate::identity::IdentitySource;
use crate::resolver::{HttpRoleLookup, Resolution, RoleResolver};
use crate::storage::{ArtifactStore, DEMO_ROLE_KEY, TOKEN_KEY};
use crate::types::{Destination, DestinationId, IdentitySignal, Role, SessionState};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

/// Identity the current session was established with.
pub const IDENTITY_KEY: &str = "identity";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Unauthenticated,
    Authenticated(Role),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    Authenticated(Role),
    /// No usable identity, or the backend does not know it.
    Anonymous,
    /// A newer connect or a disconnect happened first; nothing was applied.
    Superseded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathChange {
    Accepted(Destination),
    Redirected { from: String, to: Destination },
}

struct Inner {
    state: SessionState,
    identity: IdentitySignal,
    grant: Option<Vec<DestinationId>>,
    generation: u64,
    resolving: Option<u64>,
}

pub struct Navigator {
    table: Arc<AuthorizationTable>,
    resolver: RoleResolver,
    store: Arc<dyn ArtifactStore>,
    router: Arc<dyn Router>,
    demo_mode: bool,
    inner: RwLock<Inner>,
    // Serializes artifact writes; held while a ticket is checked and its
    // artifacts are written.
    persist: Mutex<()>,
}

impl Navigator {
    pub fn new(
        table: Arc<AuthorizationTable>,
        resolver: RoleResolver,
        store: Arc<dyn ArtifactStore>,
        router: Arc<dyn Router>,
    ) -> Self {
        let landing = table.default_destination().path.clone();
        Self {
            table,
            resolver,
            store,
            router,
            demo_mode: false,
            inner: RwLock::new(Inner {
                state: SessionState::new(landing),
                identity: IdentitySignal::None,
                grant: None,
                generation: 0,
                resolving: None,
            }),
            persist: Mutex::new(()),
        }
    }

    pub fn from_config(
        config: &ClientConfig,
        store: Arc<dyn ArtifactStore>,
        router: Arc<dyn Router>,
    ) -> Result<Self> {
        config.validate()?;
        let table = Arc::new(AuthorizationTable::from_config(&config.access)?);

        let resolver = match &config.backend_url {
            Some(url) => {
                let mut lookup = HttpRoleLookup::new(url, config.lookup_timeout)?
                    .with_token_store(Arc::clone(&store));
                if let Some(endpoint) = &config.session_endpoint {
                    lookup = lookup.with_session_endpoint(endpoint);
                }
                RoleResolver::with_lookup(Arc::new(lookup))
            }
            None => RoleResolver::new(config.default_role),
        };

        Ok(Self::new(table, resolver, store, router).with_demo_mode(config.demo_mode))
    }

    pub fn with_demo_mode(mut self, demo_mode: bool) -> Self {
        self.demo_mode = demo_mode;
        self
    }

    pub fn table(&self) -> &AuthorizationTable {
        &self.table
    }

    pub fn resolver(&self) -> &RoleResolver {
        &self.resolver
    }

    pub fn snapshot(&self) -> SessionState {
        self.inner.read().state.clone()
    }

    pub fn role(&self) -> Role {
        self.inner.read().state.role
    }

    pub fn identity(&self) -> IdentitySignal {
        self.inner.read().identity.clone()
    }

    pub fn phase(&self) -> SessionPhase {
        match self.role() {
            Role::Unauthenticated => SessionPhase::Unauthenticated,
            role => SessionPhase::Authenticated(role),
        }
    }

    /// A resolution for the latest identity event is still in flight.
    pub fn is_resolving(&self) -> bool {
        let inner = self.inner.read();
        inner.resolving == Some(inner.generation)
    }

    /// Destinations the session may open right now, in menu order.
    pub fn visible_destinations(&self) -> Vec<Destination> {
        let inner = self.inner.read();
        self.visible_for(&inner)
    }

    fn visible_for(&self, inner: &Inner) -> Vec<Destination> {
        self.table
            .visible_destinations(inner.state.role)
            .into_iter()
            .filter(|d| self.granted(inner, &d.id))
            .collect()
    }

    fn granted(&self, inner: &Inner, id: &DestinationId) -> bool {
        match &inner.grant {
            Some(grant) => grant.contains(id) || self.table.is_public(id),
            None => true,
        }
    }

    fn allows(&self, inner: &Inner, id: &DestinationId) -> bool {
        self.table.is_visible(inner.state.role, id) && self.granted(inner, id)
    }

    /// Move the session to the default destination when the current path is
    /// no longer allowed. Returns the redirect target.
    fn revalidate_path(&self, inner: &mut Inner) -> Option<String> {
        let allowed = self
            .table
            .resolve_path(&inner.state.current_path)
            .is_some_and(|d| self.allows(inner, &d.id));
        if allowed {
            return None;
        }

        let default = self.table.default_destination().path.clone();
        tracing::warn!(
            "Path {} not allowed for role '{}', redirecting to {}",
            inner.state.current_path,
            inner.state.role,
            default
        );
        inner.state.current_path = default.clone();
        Some(default)
    }

    fn redirect(&self, target: Option<String>) {
        if let Some(path) = target {
            self.router.go_to(&path);
        }
    }

    fn is_current(&self, ticket: u64) -> bool {
        self.inner.read().generation == ticket
    }

    /// Take a ticket for a new identity event. Any older in-flight resolution
    /// becomes stale.
    pub fn begin_connect(&self, identity: &IdentitySignal) -> u64 {
        let mut inner = self.inner.write();
        inner.generation += 1;
        inner.resolving = Some(inner.generation);
        tracing::info!(
            "Resolving identity {} (generation {})",
            identity.describe(),
            inner.generation
        );
        inner.generation
    }

    pub async fn connect(&self, identity: IdentitySignal) -> Result<ConnectOutcome> {
        let ticket = self.begin_connect(&identity);
        self.finish_connect(ticket, identity).await
    }

    /// Run the provider's connection flow, then resolve the resulting identity.
    pub async fn connect_with(&self, source: &dyn IdentitySource) -> Result<ConnectOutcome> {
        let identity = source.connect().await?;
        self.connect(identity).await
    }

    pub async fn finish_connect(
        &self,
        ticket: u64,
        identity: IdentitySignal,
    ) -> Result<ConnectOutcome> {
        let result = self.resolver.resolve(&identity, &self.table).await;

        let _persist = self.persist.lock().await;
        if !self.is_current(ticket) {
            tracing::debug!(
                "Discarding stale resolution for {} (generation {})",
                identity.describe(),
                ticket
            );
            return Ok(ConnectOutcome::Superseded);
        }

        let result = match result {
            Ok(resolution) => self
                .persist_resolution(&identity, &resolution)
                .await
                .map(|()| resolution),
            Err(e) => Err(e),
        };

        match result {
            Ok(resolution) => self.apply_resolution(ticket, identity, resolution).await,
            Err(e) => self.fail_connect(ticket, &identity, e).await,
        }
    }

    /// Write the artifacts of a resolution. Any failure is reported as a
    /// retryable persistence error.
    async fn persist_resolution(
        &self,
        identity: &IdentitySignal,
        resolution: &Resolution,
    ) -> Result<()> {
        self.write_artifacts(identity, resolution)
            .await
            .map_err(|e| CaidanError::persistence(e.to_string()))
    }

    async fn write_artifacts(
        &self,
        identity: &IdentitySignal,
        resolution: &Resolution,
    ) -> Result<()> {
        if !identity.is_present() {
            return self.clear_session_artifacts().await;
        }

        self.store
            .set(IDENTITY_KEY, &serde_json::to_string(identity)?)
            .await?;
        // A token session keeps its token unless the backend rotates it.
        let token = match (&resolution.issued_token, identity) {
            (Some(token), _) | (None, IdentitySignal::Token { token }) => Some(token),
            (None, _) => None,
        };
        match token {
            Some(token) => self.store.set(TOKEN_KEY, token).await,
            None => self.store.remove(TOKEN_KEY).await,
        }
    }

    /// Lookup or persistence failed: back to `Unauthenticated` with no
    /// artifacts left behind.
    async fn fail_connect(
        &self,
        ticket: u64,
        identity: &IdentitySignal,
        error: CaidanError,
    ) -> Result<ConnectOutcome> {
        tracing::warn!("Connecting {} failed: {}", identity.describe(), error);
        let redirect = {
            let mut inner = self.inner.write();
            if inner.generation != ticket {
                return Ok(ConnectOutcome::Superseded);
            }
            Self::reset(&mut inner);
            self.revalidate_path(&mut inner)
        };
        self.redirect(redirect);

        if let Err(e) = self.clear_session_artifacts().await {
            tracing::warn!("Could not clear session artifacts: {}", e);
        }
        Err(error)
    }

    async fn apply_resolution(
        &self,
        ticket: u64,
        identity: IdentitySignal,
        resolution: Resolution,
    ) -> Result<ConnectOutcome> {
        let present = identity.is_present();
        let applied = {
            let mut inner = self.inner.write();
            if inner.generation != ticket {
                None
            } else {
                inner.state.role = resolution.role;
                inner.state.identity_present = present;
                inner.identity = identity.clone();
                inner.grant = resolution.grant;
                inner.resolving = None;
                Some(self.revalidate_path(&mut inner))
            }
        };

        let Some(redirect) = applied else {
            // Roll back what this ticket wrote; the newer event persists its own.
            if present {
                if let Err(e) = self.clear_session_artifacts().await {
                    tracing::warn!("Could not roll back stale artifacts: {}", e);
                }
            }
            return Ok(ConnectOutcome::Superseded);
        };
        self.redirect(redirect);

        tracing::info!(
            "Session for {} resolved to role '{}'",
            identity.describe(),
            resolution.role
        );

        Ok(match resolution.role {
            Role::Unauthenticated => ConnectOutcome::Anonymous,
            role => ConnectOutcome::Authenticated(role),
        })
    }

    fn reset(inner: &mut Inner) {
        inner.state.role = Role::Unauthenticated;
        inner.state.identity_present = false;
        inner.identity = IdentitySignal::None;
        inner.grant = None;
        inner.resolving = None;
    }

    async fn clear_session_artifacts(&self) -> Result<()> {
        self.store.remove(TOKEN_KEY).await?;
        self.store.remove(IDENTITY_KEY).await?;
        Ok(())
    }

    /// Logout. Cancels in-flight resolutions, clears the session artifacts and
    /// leaves non-public destinations.
    pub async fn disconnect(&self) -> Result<()> {
        let redirect = {
            let mut inner = self.inner.write();
            inner.generation += 1;
            Self::reset(&mut inner);
            self.revalidate_path(&mut inner)
        };
        self.resolver.set_override(None);
        self.redirect(redirect);

        let _persist = self.persist.lock().await;
        self.clear_session_artifacts().await?;
        self.store.remove(DEMO_ROLE_KEY).await?;

        tracing::info!("Session disconnected");
        Ok(())
    }

    /// Open a destination by id. Destinations the current role may not see
    /// are refused and the session is sent to the default destination.
    pub fn navigate(&self, id: &str) -> Result<Destination> {
        let (result, path) = {
            let mut inner = self.inner.write();
            match self.table.get(id) {
                Some(destination) if self.allows(&inner, &destination.id) => {
                    inner.state.current_path = destination.path.clone();
                    (Ok(destination.clone()), destination.path.clone())
                }
                _ => {
                    let default = self.table.default_destination().path.clone();
                    tracing::warn!(
                        "Role '{}' may not open '{}', redirecting to {}",
                        inner.state.role,
                        id,
                        default
                    );
                    inner.state.current_path = default.clone();
                    let err = CaidanError::UnauthorizedNavigation {
                        destination: id.to_string(),
                        redirected_to: default.clone(),
                    };
                    (Err(err), default)
                }
            }
        };

        self.router.go_to(&path);
        result
    }

    /// Route changed outside the navigator (back/forward, typed URL).
    pub fn path_changed(&self, path: &str) -> PathChange {
        let (change, redirect) = {
            let mut inner = self.inner.write();
            match self.table.resolve_path(path) {
                Some(destination) if self.allows(&inner, &destination.id) => {
                    inner.state.current_path = path.to_string();
                    (PathChange::Accepted(destination.clone()), None)
                }
                _ => {
                    let default = self.table.default_destination().clone();
                    tracing::warn!(
                        "Route {} not allowed for role '{}', redirecting to {}",
                        path,
                        inner.state.role,
                        default.path
                    );
                    inner.state.current_path = default.path.clone();
                    let redirect = default.path.clone();
                    (
                        PathChange::Redirected {
                            from: path.to_string(),
                            to: default,
                        },
                        Some(redirect),
                    )
                }
            }
        };

        self.redirect(redirect);
        change
    }

    /// Demo/test role switch. Persists the override and re-resolves the
    /// current identity with it.
    pub async fn set_role_override(&self, role: Option<Role>) -> Result<ConnectOutcome> {
        if !self.demo_mode {
            return Err(CaidanError::config(
                "Role overrides are only available in demo mode",
            ));
        }
        if role.is_some_and(|r| !r.is_authenticated()) {
            return Err(CaidanError::config(
                "Role override must be an authenticated role",
            ));
        }

        self.resolver.set_override(role);
        {
            let _persist = self.persist.lock().await;
            match role {
                Some(role) => self.store.set(DEMO_ROLE_KEY, role.as_str()).await?,
                None => self.store.remove(DEMO_ROLE_KEY).await?,
            }
        }
        tracing::info!("Role override set to {:?}", role);

        let identity = self.identity();
        if !identity.is_present() {
            return Ok(ConnectOutcome::Anonymous);
        }
        self.connect(identity).await
    }

    /// Re-establish the session from stored artifacts after a restart.
    pub async fn restore(&self) -> Result<ConnectOutcome> {
        if self.demo_mode {
            if let Some(stored) = self.store.get(DEMO_ROLE_KEY).await? {
                match stored.parse::<Role>() {
                    Ok(role) if role.is_authenticated() => self.resolver.set_override(Some(role)),
                    _ => {
                        tracing::warn!("Ignoring stored demo role '{}'", stored);
                        self.store.remove(DEMO_ROLE_KEY).await?;
                    }
                }
            }
        }

        // The identity the session was made with wins; a bare token is only
        // used when nothing else was stored.
        let stored = match self.store.get(IDENTITY_KEY).await? {
            Some(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable stored identity: {}", e);
                IdentitySignal::None
            }),
            None => IdentitySignal::None,
        };
        let identity = match stored {
            IdentitySignal::None => match self.store.get(TOKEN_KEY).await? {
                Some(token) => IdentitySignal::token(token),
                None => IdentitySignal::None,
            },
            identity => identity,
        };

        if !identity.is_present() {
            return Ok(ConnectOutcome::Anonymous);
        }
        self.connect(identity).await
    }

    /// Follow an identity source: present signals connect, absent ones
    /// disconnect. Tickets are taken in signal order, so a later signal
    /// always supersedes an earlier one still resolving.
    pub fn watch_identity(
        self: &Arc<Self>,
        mut signals: watch::Receiver<IdentitySignal>,
    ) -> JoinHandle<()> {
        let navigator = Arc::clone(self);
        tokio::spawn(async move {
            while signals.changed().await.is_ok() {
                let signal = signals.borrow_and_update().clone();
                if signal.is_present() {
                    let ticket = navigator.begin_connect(&signal);
                    let navigator = Arc::clone(&navigator);
                    tokio::spawn(async move {
                        if let Err(e) = navigator.finish_connect(ticket, signal).await {
                            tracing::warn!("Identity change not applied: {}", e);
                        }
                    });
                } else if let Err(e) = navigator.disconnect().await {
                    tracing::warn!("Disconnect not applied: {}", e);
                }
            }
        })
    }

    /// Follow route changes published by the router.
    pub fn watch_router(self: &Arc<Self>) -> JoinHandle<()> {
        let navigator = Arc::clone(self);
        let mut paths = self.router.subscribe();
        tokio::spawn(async move {
            while paths.changed().await.is_ok() {
                let path = paths.borrow_and_update().clone();
                navigator.path_changed(&path);
            }
        })
    }
}
