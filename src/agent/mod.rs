// Chat agent service modules
mod api;
mod config;
mod context;
mod error;
mod heartbeat;
mod ledger;
mod llm;
mod mention;
mod reply;
mod sanitize;

pub use config::Config;

use anyhow::{Context, Result};
use api::{AgentConfig, ApiClient, Message, User};
use ledger::ProcessingLedger;
use llm::LlmClient;
use std::sync::Arc;
use tokio::signal;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Provider value that marks a self-hosted completion backend; its runtime
/// endpoint overrides the client's configured target.
const SELF_HOSTED_PROVIDER: &str = "parallax";

pub async fn run(config: Config) -> Result<()> {
    info!("starting parley agent");
    info!("connecting to API: {}", config.api_url);
    info!("agent id: {}", config.agent_id);
    info!(
        "poll interval: {:?}, heartbeat interval: {:?}",
        config.poll_interval, config.heartbeat_interval
    );

    let config = Arc::new(config);

    let mut api = ApiClient::new(config.clone())?;
    api.login(&config.email, &config.password)
        .await
        .context("login failed; agent cannot start")?;
    let api = Arc::new(api);

    let mut llm = LlmClient::new(&config.llm_url, &config.llm_api_key);

    let agent_config = sync_agent_config(&api, &config, &mut llm).await;
    match &agent_config {
        Some(agent) => {
            let provider = agent
                .model
                .as_ref()
                .map(|model| model.provider.as_str())
                .unwrap_or("unset");
            info!(
                name = %agent.name,
                provider = %provider,
                "loaded registered agent configuration"
            );
        }
        None => warn!("no registered configuration found; using built-in defaults"),
    }

    // The two long-running tasks share only immutable state (config, API
    // client). Everything mutable stays inside the poller.
    let cancel = CancellationToken::new();
    let heartbeat_task = tokio::spawn(heartbeat::run(
        api.clone(),
        config.heartbeat_interval,
        cancel.clone(),
    ));
    let poller_task = tokio::spawn(poll_loop(
        api.clone(),
        config.clone(),
        llm,
        agent_config,
        cancel.clone(),
    ));

    signal::ctrl_c().await?;
    info!("received shutdown signal; exiting");
    cancel.cancel();
    let _ = tokio::join!(heartbeat_task, poller_task);

    Ok(())
}

/// Main polling loop. Cancellation is only observed between cycles; an
/// in-flight reply pipeline always runs to completion or failure first.
async fn poll_loop(
    api: Arc<ApiClient>,
    config: Arc<Config>,
    mut llm: LlmClient,
    mut agent_config: Option<AgentConfig>,
    cancel: CancellationToken,
) {
    let mut ledger = ProcessingLedger::new(chrono::Utc::now().timestamp_millis());
    let mut ticker = time::interval(config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("starting message polling loop");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("poller stopping");
                break;
            }
            _ = ticker.tick() => {
                if let Err(err) =
                    poll_cycle(&api, &config, &mut llm, &mut agent_config, &mut ledger).await
                {
                    error!(?err, "polling cycle failed");
                }
            }
        }
    }
}

/// One fetch-filter-dispatch pass. The full conversation is fetched each
/// cycle so the context builder sees history, not just the delta.
async fn poll_cycle(
    api: &ApiClient,
    config: &Config,
    llm: &mut LlmClient,
    agent_config: &mut Option<AgentConfig>,
    ledger: &mut ProcessingLedger,
) -> error::Result<()> {
    let (messages, users) = api.fetch_messages(None).await?;
    if messages.is_empty() {
        return Ok(());
    }

    let candidates = ledger.candidates(&messages);
    debug!(
        candidates = candidates.len(),
        watermark = ledger.watermark(),
        "filtered poll results"
    );

    for message in &candidates {
        process_message(api, config, llm, agent_config, ledger, message, &messages, &users).await;
    }

    // Seen is not replied-to: the watermark covers skipped messages too.
    ledger.observe(&messages);

    Ok(())
}

fn should_handle(
    message: &Message,
    users: &[User],
    agent_user_id: &str,
    ledger: &ProcessingLedger,
) -> bool {
    // Never answer our own messages.
    if message.sender_id == agent_user_id {
        return false;
    }
    if ledger.is_processed(&message.id) {
        return false;
    }
    mention::is_mentioned(message, users, agent_user_id)
}

/// Reply pipeline for a single mention: refresh configuration, build the
/// context window, generate and publish the reply, record the message as
/// processed. Publish failure is logged but not retried; the message is
/// still marked processed so it is never redelivered.
#[allow(clippy::too_many_arguments)]
async fn process_message(
    api: &ApiClient,
    config: &Config,
    llm: &mut LlmClient,
    agent_config: &mut Option<AgentConfig>,
    ledger: &mut ProcessingLedger,
    message: &Message,
    messages: &[Message],
    users: &[User],
) {
    if !should_handle(message, users, &config.agent_user_id, ledger) {
        return;
    }

    let preview: String = message.content.chars().take(50).collect();
    info!(message_id = %message.id, sender_id = %message.sender_id, "handling mention: {}", preview);

    // Pick up live prompt/parameter edits before each reply; on failure the
    // previous configuration stays in effect.
    if let Some(fresh) = sync_agent_config(api, config, llm).await {
        *agent_config = Some(fresh);
    }

    let context = context::build_context(messages, users, message, &config.agent_user_id);
    let reply = reply::generate_reply(llm, agent_config.as_ref(), context).await;

    if let Err(err) = api.post_reply(&reply, Some(&message.id)).await {
        error!(?err, message_id = %message.id, "failed to publish reply");
    }

    ledger.mark_processed(&message.id);
}

/// Fetch the registered agent configuration, repointing the completion
/// client when it names a self-hosted runtime endpoint.
async fn sync_agent_config(
    api: &ApiClient,
    config: &Config,
    llm: &mut LlmClient,
) -> Option<AgentConfig> {
    match api.fetch_agent_config().await {
        Ok(Some(agent)) => {
            let self_hosted = agent
                .model
                .as_ref()
                .map(|model| model.provider == SELF_HOSTED_PROVIDER)
                .unwrap_or(false);
            if self_hosted {
                if let Some(endpoint) = agent
                    .runtime
                    .as_ref()
                    .and_then(|runtime| runtime.endpoint.as_deref())
                {
                    let api_key = agent
                        .runtime
                        .as_ref()
                        .and_then(|runtime| runtime.api_key_alias.as_deref())
                        .unwrap_or("not-needed");
                    if endpoint != llm.base_url() {
                        info!(%endpoint, "repointing completion backend at runtime endpoint");
                    }
                    llm.reconfigure(endpoint, api_key);
                }
            }
            Some(agent)
        }
        Ok(None) => {
            warn!(agent_id = %config.agent_id, "agent configuration not found in registry");
            None
        }
        Err(err) => {
            warn!(?err, "failed to fetch agent configuration");
            None
        }
    }
}
