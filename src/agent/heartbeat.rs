use super::api::ApiClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Periodic liveness signal, independent of message traffic. Holds only the
/// shared API client (immutable identity and credentials); never touches the
/// ledger or the agent configuration, so the poller needs no locks against
/// this task. The first tick fires immediately so the backend sees the agent
/// as soon as it starts.
pub async fn run(api: Arc<ApiClient>, interval: Duration, cancel: CancellationToken) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("heartbeat task stopping");
                break;
            }
            _ = ticker.tick() => {
                // A missed heartbeat is the backend's problem to notice.
                if let Err(err) = api.send_heartbeat().await {
                    debug!(?err, "heartbeat failed");
                }
            }
        }
    }
}
