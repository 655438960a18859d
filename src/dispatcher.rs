use std::sync::Arc;

use tracing::{debug, error, info};

use crate::admission::admission_verdict;
use crate::channel::ChatClient;
use crate::error::MatrixGptError;
use crate::event::IncomingEvent;
use crate::identity::Identity;
use crate::llm::LlmProvider;
use crate::policy::Policy;
use crate::text::preview;
use crate::thread::resolve_anchor;
use crate::transcript::build_transcript;

/// Nominal timeout for typing-off.
const TYPING_OFF_TIMEOUT_MS: u64 = 500;

/// Turns one admitted room message into one model reply.
pub struct ReplyDispatcher {
    client: Arc<dyn ChatClient>,
    llm: Arc<dyn LlmProvider>,
    policy: Arc<Policy>,
    identity: Arc<Identity>,
}

impl ReplyDispatcher {
    pub fn new(
        client: Arc<dyn ChatClient>,
        llm: Arc<dyn LlmProvider>,
        policy: Arc<Policy>,
        identity: Arc<Identity>,
    ) -> Self {
        Self {
            client,
            llm,
            policy,
            identity,
        }
    }

    /// Handler for every delivered room message. Never fails: errors are
    /// logged here and the event is dropped without a reply.
    pub async fn handle(&self, room_id: &str, event: &IncomingEvent) {
        self.handle_at(room_id, event, chrono::Utc::now().timestamp_millis())
            .await
    }

    pub(crate) async fn handle_at(&self, room_id: &str, event: &IncomingEvent, now_ms: i64) {
        if let Some(reason) =
            admission_verdict(event, room_id, &self.policy, &self.identity.handle, now_ms)
        {
            debug!("Ignoring {} in {room_id}: {}", event.id, reason.as_str());
            return;
        }

        info!(
            "Matrix message from {} in {room_id}: {}",
            event.sender,
            preview(&event.body, 100)
        );
        if let Err(e) = self.reply(room_id, event, now_ms).await {
            error!("Failed to reply to {} in {room_id}: {e}", event.id);
        }
    }

    async fn reply(
        &self,
        room_id: &str,
        event: &IncomingEvent,
        now_ms: i64,
    ) -> Result<(), MatrixGptError> {
        let policy = &self.policy;

        let (receipt, typing) = tokio::join!(
            self.client.send_read_receipt(room_id, &event.id),
            self.client.set_typing(room_id, true, policy.typing_timeout_ms),
        );
        receipt?;
        typing?;

        let anchor = resolve_anchor(event);
        let transcript = build_transcript(
            room_id,
            event,
            self.client.as_ref(),
            policy,
            &self.identity.handle,
            now_ms,
        )
        .await?;
        debug!("Transcript for {} has {} entries", event.id, transcript.len());

        let reply = self.llm.complete(&transcript).await?;

        // Both run to completion; a failed typing-off must not cancel the post.
        let (typing, posted) = tokio::join!(
            self.client.set_typing(room_id, false, TYPING_OFF_TIMEOUT_MS),
            self.client.post_reply(
                room_id,
                anchor,
                &reply,
                policy.threading_enabled,
                policy.rich_text_enabled,
            ),
        );
        posted?;
        typing?;
        Ok(())
    }
}
