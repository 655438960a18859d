use std::sync::Arc;

use anyhow::anyhow;
use tracing::info;

use crate::channels::matrix::{start_matrix_listener, MatrixClient};
use crate::config::Config;
use crate::dispatcher::ReplyDispatcher;
use crate::identity::resolve_identity;
use crate::llm::LlmProvider;

pub async fn run(config: Config) -> anyhow::Result<()> {
    let client = Arc::new(MatrixClient::new(
        &config.homeserver_url,
        &config.access_token,
    ));

    // Without our own user id self-messages cannot be filtered, so the
    // listener must not start.
    let identity = resolve_identity(client.as_ref())
        .await
        .map_err(|e| anyhow!("Failed to resolve bot identity: {e}"))?;

    let llm: Arc<dyn LlmProvider> = Arc::from(crate::llm::create_provider(&config));
    info!(
        "LLM provider '{}' with model '{}'",
        config.llm_provider, config.model
    );

    let dispatcher = Arc::new(ReplyDispatcher::new(
        client.clone(),
        llm,
        Arc::new(config.policy()),
        Arc::new(identity.clone()),
    ));

    info!(
        "Starting Matrix listener on {} as {}",
        config.homeserver_url, identity.handle
    );
    let listener = tokio::spawn(start_matrix_listener(
        client,
        dispatcher,
        config.sync_timeout_ms,
    ));

    info!("Runtime active; waiting for Ctrl-C");
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.map_err(|e| anyhow!("Failed to listen for Ctrl-C: {e}"))?;
            info!("Shutting down");
            Ok(())
        }
        joined = listener => {
            joined.map_err(|e| anyhow!("Matrix listener task failed: {e}"))?;
            Err(anyhow!("Matrix listener exited unexpectedly"))
        }
    }
}
