use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::channel::{ChatClient, EventContext, HistorySource};
use crate::dispatcher::ReplyDispatcher;
use crate::error::MatrixGptError;
use crate::event::{IncomingEvent, ROOM_MESSAGE_EVENT, TEXT_MSGTYPE};
use crate::text::markdown_to_html;

const SYNC_RETRY_DELAY: Duration = Duration::from_secs(5);
const ERROR_BODY_PREVIEW_CHARS: usize = 300;

/// Matrix client-server API over plain HTTPS with a bearer access token.
pub struct MatrixClient {
    homeserver_url: String,
    access_token: String,
    http: reqwest::Client,
    user_id: OnceLock<String>,
}

impl MatrixClient {
    pub fn new(homeserver_url: &str, access_token: &str) -> Self {
        Self {
            homeserver_url: homeserver_url.trim_end_matches('/').to_string(),
            access_token: access_token.trim().to_string(),
            http: reqwest::Client::new(),
            user_id: OnceLock::new(),
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/_matrix/client/v3{path}", self.homeserver_url)
    }

    fn room_url(&self, room_id: &str, rest: &str) -> String {
        self.api_url(&format!("/rooms/{}{rest}", urlencoding::encode(room_id)))
    }

    /// Long-poll `/sync`. `since = None` is the initial sync and returns at once.
    pub async fn sync(
        &self,
        since: Option<&str>,
        timeout_ms: u64,
    ) -> Result<(String, Vec<IncomingEvent>), MatrixGptError> {
        let timeout_ms = if since.is_some() { timeout_ms } else { 0 };
        let mut request = self
            .http
            .get(self.api_url("/sync"))
            .bearer_auth(&self.access_token)
            .query(&[("timeout", timeout_ms)]);
        if let Some(since_token) = since {
            request = request.query(&[("since", since_token)]);
        }

        let payload: Value = check_status(request.send().await?).await?.json().await?;
        let next_batch = payload
            .get("next_batch")
            .and_then(|v| v.as_str())
            .map(ToOwned::to_owned)
            .ok_or_else(|| MatrixGptError::MatrixResponse("/sync missing next_batch".into()))?;

        Ok((next_batch, parse_sync_messages(&payload)))
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, MatrixGptError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(MatrixGptError::MatrixApi {
        status,
        body: body.chars().take(ERROR_BODY_PREVIEW_CHARS).collect(),
    })
}

/// Message events from the joined-room timelines of a `/sync` payload.
fn parse_sync_messages(payload: &Value) -> Vec<IncomingEvent> {
    let Some(joined_rooms) = payload.pointer("/rooms/join").and_then(|v| v.as_object()) else {
        return Vec::new();
    };

    let mut incoming = Vec::new();
    for (room_id, room_data) in joined_rooms {
        let Some(events) = room_data
            .pointer("/timeline/events")
            .and_then(|v| v.as_array())
        else {
            continue;
        };
        incoming.extend(
            events
                .iter()
                .filter(|e| e.get("type").and_then(|v| v.as_str()) == Some(ROOM_MESSAGE_EVENT))
                .filter_map(|e| IncomingEvent::from_json(room_id, e)),
        );
    }
    incoming
}

fn parse_event_context(room_id: &str, payload: &Value) -> EventContext {
    let before = payload
        .get("events_before")
        .and_then(|v| v.as_array())
        .map(|events| {
            events
                .iter()
                .filter_map(|e| IncomingEvent::from_json(room_id, e))
                .collect()
        })
        .unwrap_or_default();
    EventContext { before }
}

/// `m.room.message` content for a bot reply anchored at `anchor_event_id`.
fn build_reply_content(
    text: &str,
    anchor_event_id: &str,
    use_threading: bool,
    use_rich_text: bool,
) -> Value {
    let mut content = json!({
        "msgtype": TEXT_MSGTYPE,
        "body": text,
    });
    if use_rich_text {
        content["format"] = json!("org.matrix.custom.html");
        content["formatted_body"] = json!(markdown_to_html(text));
    }
    content["m.relates_to"] = if use_threading {
        json!({
            "rel_type": "m.thread",
            "event_id": anchor_event_id,
            "is_falling_back": true,
            "m.in_reply_to": { "event_id": anchor_event_id },
        })
    } else {
        json!({ "m.in_reply_to": { "event_id": anchor_event_id } })
    };
    content
}

#[async_trait]
impl HistorySource for MatrixClient {
    async fn get_event_context(
        &self,
        room_id: &str,
        event_id: &str,
        limit: usize,
    ) -> Result<EventContext, MatrixGptError> {
        let url = self.room_url(
            room_id,
            &format!("/context/{}", urlencoding::encode(event_id)),
        );
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[("limit", limit)])
            .send()
            .await?;
        let payload: Value = check_status(response).await?.json().await?;
        Ok(parse_event_context(room_id, &payload))
    }
}

#[async_trait]
impl ChatClient for MatrixClient {
    async fn get_own_user_id(&self) -> Result<String, MatrixGptError> {
        if let Some(user_id) = self.user_id.get() {
            return Ok(user_id.clone());
        }
        let response = self
            .http
            .get(self.api_url("/account/whoami"))
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let payload: Value = check_status(response).await?.json().await?;
        let user_id = payload
            .get("user_id")
            .and_then(|v| v.as_str())
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| MatrixGptError::MatrixResponse("/whoami missing user_id".into()))?;
        Ok(self.user_id.get_or_init(|| user_id.to_string()).clone())
    }

    async fn get_display_name(&self, user_id: &str) -> Result<Option<String>, MatrixGptError> {
        let url = self.api_url(&format!("/profile/{}", urlencoding::encode(user_id)));
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let payload: Value = check_status(response).await?.json().await?;
        Ok(payload
            .get("displayname")
            .and_then(|v| v.as_str())
            .map(ToOwned::to_owned))
    }

    async fn send_read_receipt(
        &self,
        room_id: &str,
        event_id: &str,
    ) -> Result<(), MatrixGptError> {
        let url = self.room_url(
            room_id,
            &format!("/receipt/m.read/{}", urlencoding::encode(event_id)),
        );
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&json!({}))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn set_typing(
        &self,
        room_id: &str,
        typing: bool,
        timeout_ms: u64,
    ) -> Result<(), MatrixGptError> {
        let user_id = self.get_own_user_id().await?;
        let url = self.room_url(
            room_id,
            &format!("/typing/{}", urlencoding::encode(&user_id)),
        );
        let body = if typing {
            json!({ "typing": true, "timeout": timeout_ms })
        } else {
            json!({ "typing": false })
        };
        let response = self
            .http
            .put(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn post_reply(
        &self,
        room_id: &str,
        anchor_event_id: &str,
        text: &str,
        use_threading: bool,
        use_rich_text: bool,
    ) -> Result<(), MatrixGptError> {
        let txn_id = uuid::Uuid::new_v4().to_string();
        let url = self.room_url(room_id, &format!("/send/m.room.message/{txn_id}"));
        let content = build_reply_content(text, anchor_event_id, use_threading, use_rich_text);
        let response = self
            .http
            .put(&url)
            .bearer_auth(&self.access_token)
            .json(&content)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

/// Sync forever, handing every new room message to the dispatcher on its own task.
/// The first sync only establishes the `since` token; its backlog is skipped.
pub async fn start_matrix_listener(
    client: Arc<MatrixClient>,
    dispatcher: Arc<ReplyDispatcher>,
    sync_timeout_ms: u64,
) {
    let mut since: Option<String> = None;

    loop {
        match client.sync(since.as_deref(), sync_timeout_ms).await {
            Ok((next_batch, events)) => {
                let bootstrapped = since.is_some();
                since = Some(next_batch);

                if !bootstrapped {
                    info!(
                        "Matrix initial sync complete, skipped {} backlog messages",
                        events.len()
                    );
                    continue;
                }

                for event in events {
                    debug!("Matrix event {} in {}", event.id, event.room_id);
                    let dispatcher = dispatcher.clone();
                    tokio::spawn(async move {
                        let room_id = event.room_id.clone();
                        dispatcher.handle(&room_id, &event).await;
                    });
                }
            }
            Err(e) => {
                warn!("Matrix sync error: {e}");
                tokio::time::sleep(SYNC_RETRY_DELAY).await;
            }
        }
    }
}
