// HTTP client for the decision server running inside a bot container.
//
// The container serves two endpoints on its published port:
//   POST /draft     GameSnapshot -> {"player_id": "..."}
//   POST /add-drop  GameSnapshot -> {"claims": [{"add_player_id", "drop_player_id", "bid"}]}

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use botblitz_core::model::{GameSnapshot, WaiverClaim};

use crate::error::SandboxError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftResponse {
    pub player_id: String,
}

/// A claim as the bot proposes it; the engine fills in the bot id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedClaim {
    pub add_player_id: String,
    pub drop_player_id: String,
    #[serde(default)]
    pub bid: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddDropResponse {
    #[serde(default)]
    pub claims: Vec<ProposedClaim>,
}

impl AddDropResponse {
    pub fn into_claims(self, bot_id: &str) -> Vec<WaiverClaim> {
        self.claims
            .into_iter()
            .map(|c| WaiverClaim {
                bot_id: bot_id.to_string(),
                add_player_id: c.add_player_id,
                drop_player_id: c.drop_player_id,
                bid: c.bid,
            })
            .collect()
    }
}

/// One remote call against a running bot. Deadlines are applied by the caller.
#[async_trait]
pub trait BotClient: Send + Sync {
    async fn draft_pick(&self, port: u16, snapshot: &GameSnapshot) -> Result<String, SandboxError>;

    async fn add_drop(
        &self,
        port: u16,
        snapshot: &GameSnapshot,
    ) -> Result<Vec<WaiverClaim>, SandboxError>;
}

pub struct HttpBotClient {
    http: reqwest::Client,
    host: String,
}

impl HttpBotClient {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            host: host.into(),
        }
    }

    async fn post(&self, port: u16, path: &str, snapshot: &GameSnapshot) -> Result<String, SandboxError> {
        let url = format!("http://{}:{}{}", self.host, port, path);
        let response = self
            .http
            .post(&url)
            .json(snapshot)
            .send()
            .await
            .map_err(|e| SandboxError::Remote {
                message: format!("POST {url}: {e}"),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| SandboxError::Remote {
            message: format!("reading response from {url}: {e}"),
        })?;
        if !status.is_success() {
            return Err(SandboxError::Remote {
                message: format!("{url} returned {status}: {}", body.trim()),
            });
        }
        Ok(body)
    }
}

impl Default for HttpBotClient {
    fn default() -> Self {
        Self::new("127.0.0.1")
    }
}

#[async_trait]
impl BotClient for HttpBotClient {
    async fn draft_pick(&self, port: u16, snapshot: &GameSnapshot) -> Result<String, SandboxError> {
        let body = self.post(port, "/draft", snapshot).await?;
        let response: DraftResponse = serde_json::from_str(&body)?;
        Ok(response.player_id)
    }

    async fn add_drop(
        &self,
        port: u16,
        snapshot: &GameSnapshot,
    ) -> Result<Vec<WaiverClaim>, SandboxError> {
        let body = self.post(port, "/add-drop", snapshot).await?;
        let response: AddDropResponse = serde_json::from_str(&body)?;
        Ok(response.into_claims(&snapshot.acting_bot_id))
    }
}
