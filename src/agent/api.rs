use super::config::Config;
use super::error::{AgentError, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const API_TIMEOUT: Duration = Duration::from_secs(10);
const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(5);
// Reply posts follow a potentially slow completion call, give them more room.
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    #[serde(default)]
    pub content: String,
    /// Backend-assigned, milliseconds since epoch.
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub conversation_id: String,
    /// User ids explicitly mentioned through the client UI.
    #[serde(default)]
    pub mentions: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub model: Option<ModelConfig>,
    #[serde(default)]
    pub runtime: Option<RuntimeConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

/// Present only for self-hosted providers; points the completion client at an
/// operator-managed endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key_alias: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    messages: Vec<Message>,
    #[serde(default)]
    users: Vec<User>,
}

#[derive(Debug, Deserialize)]
struct AgentsResponse {
    #[serde(default)]
    agents: Vec<AgentConfig>,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateMessageRequest<'a> {
    content: &'a str,
    conversation_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to_id: Option<&'a str>,
}

pub struct ApiClient {
    client: Client,
    base_url: Url,
    config: Arc<Config>,
    /// Bearer session token, set by `login`. Read operations carry it; write
    /// operations authenticate with the static agent token instead.
    session_token: Option<String>,
}

impl ApiClient {
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let client = Client::builder()
            .timeout(API_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        let mut base_url = Url::parse(&config.api_url).map_err(|e| {
            AgentError::Api(format!("invalid API base URL '{}': {}", config.api_url, e))
        })?;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        Ok(Self {
            client,
            base_url,
            config,
            session_token: None,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| AgentError::Api(format!("invalid endpoint path '{}': {}", path, e)))
    }

    /// Log in with operator credentials and capture the session token from
    /// the `token` cookie. Must succeed before any read operation.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<()> {
        let url = self.endpoint("auth/login")?;
        let request = LoginRequest { email, password };

        let response = self.client.post(url).json(&request).send().await?;

        match response.status() {
            StatusCode::OK => {
                let token = response
                    .cookies()
                    .find(|c| c.name() == "token")
                    .map(|c| c.value().to_string());
                match token {
                    Some(token) => {
                        self.session_token = Some(token);
                        info!("logged in to chat backend");
                        Ok(())
                    }
                    None => Err(AgentError::Api(
                        "login succeeded but no session token cookie was set".to_string(),
                    )),
                }
            }
            status => {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                Err(AgentError::Api(format!(
                    "login failed ({}): {}",
                    status, error_text
                )))
            }
        }
    }

    /// Fetch this agent's registered configuration from the agent registry.
    /// Returns `Ok(None)` when the registry has no entry for our agent id.
    pub async fn fetch_agent_config(&self) -> Result<Option<AgentConfig>> {
        let url = self.endpoint("agents")?;

        debug!(%url, "fetching agent configuration");

        let mut request = self.client.get(url);
        if let Some(token) = &self.session_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        match response.status() {
            StatusCode::OK => {
                let body = response.json::<AgentsResponse>().await?;
                Ok(body
                    .agents
                    .into_iter()
                    .find(|agent| agent.id == self.config.agent_id))
            }
            StatusCode::UNAUTHORIZED => Err(AgentError::Api(
                "unauthorized - session token missing or expired".to_string(),
            )),
            status => {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                Err(AgentError::Api(format!(
                    "failed to fetch agent configuration ({}): {}",
                    status, error_text
                )))
            }
        }
    }

    /// Fetch messages and the accompanying user list for the configured
    /// conversation. `since` bounds the fetch by timestamp when given; the
    /// boundary is inclusive on the backend side, so callers must dedupe.
    pub async fn fetch_messages(&self, since: Option<i64>) -> Result<(Vec<Message>, Vec<User>)> {
        let mut url = self.endpoint("messages")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("conversationId", &self.config.conversation_id);
            if let Some(since) = since {
                query.append_pair("since", &since.to_string());
            }
        }

        debug!(%url, "fetching messages");

        let mut request = self.client.get(url);
        if let Some(token) = &self.session_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        match response.status() {
            StatusCode::OK => {
                let body = response.json::<MessagesResponse>().await?;
                debug!(
                    messages = body.messages.len(),
                    users = body.users.len(),
                    "fetched conversation state"
                );
                Ok((body.messages, body.users))
            }
            StatusCode::UNAUTHORIZED => Err(AgentError::Api(
                "unauthorized - session token missing or expired".to_string(),
            )),
            status => {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                Err(AgentError::Api(format!(
                    "failed to fetch messages ({}): {}",
                    status, error_text
                )))
            }
        }
    }

    /// Signal liveness. The backend makes its own timeout decisions; a missed
    /// heartbeat is never escalated on this side.
    pub async fn send_heartbeat(&self) -> Result<()> {
        let url = self.endpoint(&format!("agents/{}/heartbeat", self.config.agent_id))?;

        let response = self
            .client
            .post(url)
            .header("X-Agent-Token", &self.config.agent_token)
            .timeout(HEARTBEAT_TIMEOUT)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => Ok(()),
            status => Err(AgentError::Api(format!("heartbeat rejected ({})", status))),
        }
    }

    /// Post a reply into the conversation, linked to the triggering message.
    pub async fn post_reply(&self, content: &str, reply_to_id: Option<&str>) -> Result<()> {
        let url = self.endpoint(&format!("agents/{}/messages", self.config.agent_id))?;

        let request = CreateMessageRequest {
            content,
            conversation_id: &self.config.conversation_id,
            reply_to_id,
        };

        let response = self
            .client
            .post(url)
            .header("X-Agent-Token", &self.config.agent_token)
            .timeout(PUBLISH_TIMEOUT)
            .json(&request)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => {
                info!(reply_to = ?reply_to_id, "reply published");
                Ok(())
            }
            status => {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                Err(AgentError::Api(format!(
                    "failed to publish reply ({}): {}",
                    status, error_text
                )))
            }
        }
    }
}
