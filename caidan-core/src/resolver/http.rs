use crate::error::{CaidanError, Result};
use crate::resolver::{LookupResponse, RoleLookup};
use crate::storage::{ArtifactStore, TOKEN_KEY};
use crate::types::{Destination, IdentitySignal};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct Envelope {
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<SessionData>,
}

#[derive(Debug, Deserialize)]
struct SessionData {
    #[serde(default)]
    customer_address: Option<String>,
    role: Option<String>,
    #[serde(default)]
    menus: Vec<MenuEntry>,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MenuEntry {
    role_menu_id: Option<i64>,
    #[serde(default)]
    menu_name: String,
    menu_path: String,
}

/// Role lookup against the lottery backend.
///
/// Wallets log in with `POST /login`. When a token store is attached, the
/// stored session token rides along as a bearer header, the way every
/// request to the backend carries it. Token-only identities need a session
/// endpoint, which the backend does not have by default.
pub struct HttpRoleLookup {
    client: reqwest::Client,
    base_url: String,
    session_endpoint: Option<String>,
    tokens: Option<Arc<dyn ArtifactStore>>,
}

impl HttpRoleLookup {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        if base_url.is_empty() {
            return Err(CaidanError::config("Backend URL cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CaidanError::http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session_endpoint: None,
            tokens: None,
        })
    }

    /// Endpoint answering `GET` with the login envelope for a bearer token.
    pub fn with_session_endpoint(mut self, endpoint: &str) -> Self {
        let endpoint = endpoint.trim_start_matches('/');
        self.session_endpoint = Some(format!("/{}", endpoint));
        self
    }

    /// Store to read the current session token from.
    pub fn with_token_store(mut self, tokens: Arc<dyn ArtifactStore>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    async fn stored_token(&self) -> Result<Option<String>> {
        match &self.tokens {
            Some(tokens) => tokens.get(TOKEN_KEY).await,
            None => Ok(None),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl RoleLookup for HttpRoleLookup {
    async fn lookup(&self, identity: &IdentitySignal) -> Result<LookupResponse> {
        let request = match identity {
            IdentitySignal::Wallet { address } => {
                let request = self
                    .client
                    .post(format!("{}/login", self.base_url))
                    .json(&serde_json::json!({ "wallet_address": address }));
                match self.stored_token().await? {
                    Some(token) => request.bearer_auth(token),
                    None => request,
                }
            }
            IdentitySignal::Token { token } => {
                let endpoint = self.session_endpoint.as_deref().ok_or_else(|| {
                    CaidanError::lookup("Backend has no session endpoint; connect with a wallet")
                })?;
                self.client
                    .get(format!("{}{}", self.base_url, endpoint))
                    .bearer_auth(token)
            }
            IdentitySignal::None => {
                return Err(CaidanError::lookup("No identity to look up"));
            }
        };

        let response = request
            .send()
            .await
            .map_err(|e| CaidanError::lookup(format!("Backend unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CaidanError::lookup(format!("Backend returned HTTP {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CaidanError::lookup(format!("Failed to read response: {}", e)))?;

        let parsed = parse_envelope(&body)?;
        tracing::debug!(
            "Backend resolved {} to role {:?}",
            identity.describe(),
            parsed.role
        );
        Ok(parsed)
    }
}

fn parse_envelope(body: &str) -> Result<LookupResponse> {
    let envelope: Envelope = serde_json::from_str(body)
        .map_err(|e| CaidanError::lookup(format!("Malformed response: {}", e)))?;

    if envelope.code != 200 {
        return Err(CaidanError::lookup(format!(
            "Backend refused login ({}): {}",
            envelope.code, envelope.message
        )));
    }

    let data = envelope
        .data
        .ok_or_else(|| CaidanError::lookup("Response has no data"))?;

    if let Some(address) = &data.customer_address {
        tracing::trace!("Backend session for customer {}", address);
    }

    let destinations = data
        .menus
        .into_iter()
        .map(|menu| {
            let id = menu
                .role_menu_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| menu.menu_path.clone());
            Destination::new(&id, &menu.menu_name, &menu.menu_path)
        })
        .collect();

    Ok(LookupResponse {
        role: data.role,
        destinations,
        token: data.token,
    })
}
