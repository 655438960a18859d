use async_trait::async_trait;

use crate::error::MatrixGptError;
use crate::event::IncomingEvent;

/// Events surrounding an anchor event. `before` is newest-first, as the
/// homeserver returns it.
#[derive(Debug, Clone, Default)]
pub struct EventContext {
    pub before: Vec<IncomingEvent>,
}

/// Paginated room history, the only protocol capability transcript building needs.
#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn get_event_context(
        &self,
        room_id: &str,
        event_id: &str,
        limit: usize,
    ) -> Result<EventContext, MatrixGptError>;
}

/// Chat-protocol operations the reply pipeline drives.
#[async_trait]
pub trait ChatClient: HistorySource {
    async fn get_own_user_id(&self) -> Result<String, MatrixGptError>;

    /// `Ok(None)` when the profile has no display name set.
    async fn get_display_name(&self, user_id: &str) -> Result<Option<String>, MatrixGptError>;

    async fn send_read_receipt(&self, room_id: &str, event_id: &str)
        -> Result<(), MatrixGptError>;

    async fn set_typing(
        &self,
        room_id: &str,
        typing: bool,
        timeout_ms: u64,
    ) -> Result<(), MatrixGptError>;

    async fn post_reply(
        &self,
        room_id: &str,
        anchor_event_id: &str,
        text: &str,
        use_threading: bool,
        use_rich_text: bool,
    ) -> Result<(), MatrixGptError>;
}
