use tracing::{info, warn};

use crate::channel::ChatClient;
use crate::error::MatrixGptError;

/// The bot's own account, resolved once before the message handler attaches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub handle: String,
    pub local_name: String,
    pub display_name: Option<String>,
}

impl Identity {
    pub fn new(handle: impl Into<String>, display_name: Option<String>) -> Self {
        let handle = handle.into();
        Self {
            local_name: localpart(&handle).to_string(),
            handle,
            display_name: display_name.filter(|n| !n.trim().is_empty()),
        }
    }
}

/// `@bot:example.org` -> `bot`. Ids without the sigil are returned as-is.
pub fn localpart(user_id: &str) -> &str {
    let user = user_id.trim();
    match user.strip_prefix('@') {
        Some(rest) => rest.split(':').next().unwrap_or(rest),
        None => user,
    }
}

/// Resolve the bot identity. A failed user-id lookup is fatal; a failed
/// profile lookup only loses the display name.
pub async fn resolve_identity(client: &dyn ChatClient) -> Result<Identity, MatrixGptError> {
    let handle = client.get_own_user_id().await?;
    let display_name = match client.get_display_name(&handle).await {
        Ok(name) => name,
        Err(e) => {
            warn!("Profile lookup for {handle} failed: {e}");
            None
        }
    };
    let identity = Identity::new(handle, display_name);
    info!(
        "Resolved bot identity {} (local '{}', display {:?})",
        identity.handle, identity.local_name, identity.display_name
    );
    Ok(identity)
}
