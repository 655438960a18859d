use crate::channel::HistorySource;
use crate::error::MatrixGptError;
use crate::event::IncomingEvent;
use crate::llm_types::TranscriptEntry;
use crate::policy::Policy;

fn history_entry(event: &IncomingEvent, self_handle: &str) -> TranscriptEntry {
    if event.sender == self_handle {
        TranscriptEntry::assistant(event.body.clone())
    } else {
        TranscriptEntry::human(event.body.clone())
    }
}

/// Frame `history` (newest-first) into the model transcript:
/// system prompt, recent prior messages oldest-first, then the trigger.
pub fn assemble_transcript(
    history: &[IncomingEvent],
    trigger: &IncomingEvent,
    policy: &Policy,
    self_handle: &str,
    now_ms: i64,
) -> Vec<TranscriptEntry> {
    let mut transcript = Vec::with_capacity(history.len() + 2);
    transcript.push(TranscriptEntry::system(policy.system_prompt.clone()));
    transcript.extend(
        history
            .iter()
            .rev()
            .filter(|e| {
                e.is_message()
                    && now_ms.saturating_sub(e.timestamp_ms) < policy.context_recency_ms
            })
            .map(|e| history_entry(e, self_handle)),
    );
    transcript.push(TranscriptEntry::human(trigger.body.clone()));
    transcript
}

pub async fn build_transcript<H>(
    room_id: &str,
    trigger: &IncomingEvent,
    history: &H,
    policy: &Policy,
    self_handle: &str,
    now_ms: i64,
) -> Result<Vec<TranscriptEntry>, MatrixGptError>
where
    H: HistorySource + ?Sized,
{
    let context = history
        .get_event_context(room_id, &trigger.id, policy.context_window_size)
        .await?;
    Ok(assemble_transcript(
        &context.before,
        trigger,
        policy,
        self_handle,
        now_ms,
    ))
}
