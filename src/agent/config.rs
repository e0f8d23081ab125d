use std::time::Duration;

/// Immutable process configuration, captured once at startup and shared
/// read-only between the poller and the heartbeat task.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub email: String,
    pub password: String,
    pub agent_id: String,
    /// User id the agent posts as; messages from this sender are never handled.
    pub agent_user_id: String,
    /// Static write credential for heartbeat and reply posts.
    pub agent_token: String,
    pub conversation_id: String,
    pub llm_url: String,
    pub llm_api_key: String,
    pub poll_interval: Duration,
    pub heartbeat_interval: Duration,
}
