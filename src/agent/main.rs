use anyhow::Result;
use clap::Parser;
use std::time::Duration;

#[path = "../agent/mod.rs"]
mod agent;
#[path = "../shared/logging.rs"]
mod logging;

#[derive(Parser)]
#[command(name = "parley-agent")]
#[command(about = "Parley Agent - replies to @ mentions in a shared conversation")]
struct Args {
    /// Chat backend base URL
    #[arg(long, env = "PARLEY_API_URL", default_value = "http://localhost:4000")]
    api_url: String,

    /// Login email
    #[arg(long, env = "PARLEY_EMAIL", default_value = "root@example.com")]
    email: String,

    /// Login password
    #[arg(long, env = "PARLEY_PASSWORD", default_value = "1234567890")]
    password: String,

    /// Agent id in the backend registry
    #[arg(long, env = "PARLEY_AGENT_ID", default_value = "helper-agent-1")]
    agent_id: String,

    /// User id the agent posts as
    #[arg(long, env = "PARLEY_AGENT_USER_ID", default_value = "llm1")]
    agent_user_id: String,

    /// Static write credential, must match the backend's agent API token
    #[arg(long, env = "PARLEY_AGENT_TOKEN", default_value = "dev-agent-token")]
    agent_token: String,

    /// Conversation to watch
    #[arg(long, env = "PARLEY_CONVERSATION_ID", default_value = "global")]
    conversation_id: String,

    /// OpenAI-compatible completion endpoint base URL
    #[arg(long, env = "PARLEY_LLM_URL", default_value = "http://localhost:8000/v1")]
    llm_url: String,

    /// Completion endpoint credential
    #[arg(long, env = "PARLEY_LLM_API_KEY", default_value = "not-needed")]
    llm_api_key: String,

    /// Poll interval in seconds
    #[arg(long, env = "PARLEY_POLL_INTERVAL_SECS", default_value_t = 1)]
    poll_interval_secs: u64,

    /// Heartbeat interval in seconds
    #[arg(long, env = "PARLEY_HEARTBEAT_INTERVAL_SECS", default_value_t = 5)]
    heartbeat_interval_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _ = logging::init_service_logging("logs", "parley_agent");

    let config = agent::Config {
        api_url: args.api_url,
        email: args.email,
        password: args.password,
        agent_id: args.agent_id,
        agent_user_id: args.agent_user_id,
        agent_token: args.agent_token,
        conversation_id: args.conversation_id,
        llm_url: args.llm_url,
        llm_api_key: args.llm_api_key,
        poll_interval: Duration::from_secs(args.poll_interval_secs.max(1)),
        heartbeat_interval: Duration::from_secs(args.heartbeat_interval_secs.max(1)),
    };

    agent::run(config).await
}
