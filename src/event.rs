use serde_json::Value;

pub const ROOM_MESSAGE_EVENT: &str = "m.room.message";
pub const TEXT_MSGTYPE: &str = "m.text";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationKind {
    Reply,
    Thread,
    Replace,
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub kind: RelationKind,
    pub target_event_id: Option<String>,
}

/// A room event as delivered by the homeserver, reduced to what the bot reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingEvent {
    pub id: String,
    pub sender: String,
    pub room_id: String,
    pub timestamp_ms: i64,
    pub event_type: String,
    /// `content.msgtype`; empty for non-message events.
    pub content_type: String,
    pub body: String,
    pub relation: Option<Relation>,
}

impl IncomingEvent {
    pub fn is_message(&self) -> bool {
        self.event_type == ROOM_MESSAGE_EVENT
    }

    pub fn is_edit(&self) -> bool {
        matches!(
            self.relation,
            Some(Relation {
                kind: RelationKind::Replace,
                ..
            })
        )
    }

    /// Parse a client-server API event object. `room_id` comes from the
    /// enclosing sync/context response since timeline events omit it.
    pub fn from_json(room_id: &str, event: &Value) -> Option<Self> {
        let id = event.get("event_id").and_then(|v| v.as_str())?;
        let sender = event.get("sender").and_then(|v| v.as_str())?;
        let timestamp_ms = event.get("origin_server_ts").and_then(|v| v.as_i64())?;
        if id.trim().is_empty() || sender.trim().is_empty() {
            return None;
        }

        let event_type = event
            .get("type")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let content = event.get("content");
        let text_field = |key: &str| {
            content
                .and_then(|c| c.get(key))
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };

        Some(Self {
            id: id.to_string(),
            sender: sender.to_string(),
            room_id: event
                .get("room_id")
                .and_then(|v| v.as_str())
                .unwrap_or(room_id)
                .to_string(),
            timestamp_ms,
            event_type,
            content_type: text_field("msgtype"),
            body: text_field("body"),
            relation: content
                .and_then(|c| c.get("m.relates_to"))
                .and_then(parse_relation),
        })
    }
}

fn parse_relation(relates_to: &Value) -> Option<Relation> {
    let relates_to = relates_to.as_object()?;
    let target_event_id = relates_to
        .get("event_id")
        .and_then(|v| v.as_str())
        .map(ToOwned::to_owned);

    let kind = match relates_to.get("rel_type").and_then(|v| v.as_str()) {
        Some("m.thread") => RelationKind::Thread,
        Some("m.replace") => RelationKind::Replace,
        Some(other) => RelationKind::Other(other.to_string()),
        None if relates_to.contains_key("m.in_reply_to") => RelationKind::Reply,
        None if target_event_id.is_none() => return None,
        None => RelationKind::Other(String::new()),
    };

    Some(Relation {
        kind,
        target_event_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(content: Value) -> Value {
        json!({
            "event_id": "$abc",
            "sender": "@alice:example.org",
            "origin_server_ts": 1_700_000_000_000i64,
            "type": "m.room.message",
            "content": content,
        })
    }

    #[test]
    fn test_parse_plain_text_message() {
        let ev = IncomingEvent::from_json(
            "!room:example.org",
            &message(json!({"msgtype": "m.text", "body": "hello"})),
        )
        .unwrap();
        assert_eq!(ev.id, "$abc");
        assert_eq!(ev.sender, "@alice:example.org");
        assert_eq!(ev.room_id, "!room:example.org");
        assert_eq!(ev.timestamp_ms, 1_700_000_000_000);
        assert_eq!(ev.content_type, "m.text");
        assert_eq!(ev.body, "hello");
        assert!(ev.is_message());
        assert!(ev.relation.is_none());
    }

    #[test]
    fn test_parse_thread_relation() {
        let ev = IncomingEvent::from_json(
            "!r",
            &message(json!({
                "msgtype": "m.text",
                "body": "in thread",
                "m.relates_to": {"rel_type": "m.thread", "event_id": "$root"}
            })),
        )
        .unwrap();
        let rel = ev.relation.unwrap();
        assert_eq!(rel.kind, RelationKind::Thread);
        assert_eq!(rel.target_event_id.as_deref(), Some("$root"));
    }

    #[test]
    fn test_parse_edit_relation() {
        let ev = IncomingEvent::from_json(
            "!r",
            &message(json!({
                "msgtype": "m.text",
                "body": "* fixed",
                "m.relates_to": {"rel_type": "m.replace", "event_id": "$orig"}
            })),
        )
        .unwrap();
        assert!(ev.is_edit());
    }

    #[test]
    fn test_parse_plain_reply_has_no_target() {
        let ev = IncomingEvent::from_json(
            "!r",
            &message(json!({
                "msgtype": "m.text",
                "body": "> quoted\n\nreply",
                "m.relates_to": {"m.in_reply_to": {"event_id": "$parent"}}
            })),
        )
        .unwrap();
        let rel = ev.relation.unwrap();
        assert_eq!(rel.kind, RelationKind::Reply);
        assert!(rel.target_event_id.is_none());
    }

    #[test]
    fn test_parse_missing_body_is_empty() {
        let ev = IncomingEvent::from_json("!r", &message(json!({"msgtype": "m.image"}))).unwrap();
        assert_eq!(ev.body, "");
        assert_eq!(ev.content_type, "m.image");
    }

    #[test]
    fn test_parse_state_event_without_content_fields() {
        let ev = IncomingEvent::from_json(
            "!r",
            &json!({
                "event_id": "$m",
                "sender": "@bob:example.org",
                "origin_server_ts": 5,
                "type": "m.room.member",
                "state_key": "@bob:example.org",
                "content": {"membership": "join"}
            }),
        )
        .unwrap();
        assert!(!ev.is_message());
        assert_eq!(ev.content_type, "");
    }

    #[test]
    fn test_parse_rejects_incomplete_events() {
        assert!(IncomingEvent::from_json("!r", &json!({"sender": "@a:b"})).is_none());
        assert!(IncomingEvent::from_json(
            "!r",
            &json!({"event_id": "$x", "sender": "@a:b", "type": "m.room.message"})
        )
        .is_none());
    }
}
