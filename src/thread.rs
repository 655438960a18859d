use crate::event::IncomingEvent;

/// Event id a reply to `event` hangs off: the existing thread/reply root when
/// the event names one, otherwise the event itself (starting a new thread).
pub fn resolve_anchor(event: &IncomingEvent) -> &str {
    event
        .relation
        .as_ref()
        .and_then(|rel| rel.target_event_id.as_deref())
        .unwrap_or(&event.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Relation, RelationKind};

    fn event(relation: Option<Relation>) -> IncomingEvent {
        IncomingEvent {
            id: "$self".into(),
            sender: "@alice:example.org".into(),
            room_id: "!r:example.org".into(),
            timestamp_ms: 0,
            event_type: "m.room.message".into(),
            content_type: "m.text".into(),
            body: "hi".into(),
            relation,
        }
    }

    #[test]
    fn test_no_relation_anchors_to_self() {
        assert_eq!(resolve_anchor(&event(None)), "$self");
    }

    #[test]
    fn test_relation_without_target_anchors_to_self() {
        let ev = event(Some(Relation {
            kind: RelationKind::Reply,
            target_event_id: None,
        }));
        assert_eq!(resolve_anchor(&ev), "$self");
    }

    #[test]
    fn test_thread_relation_anchors_to_root() {
        let ev = event(Some(Relation {
            kind: RelationKind::Thread,
            target_event_id: Some("$root".into()),
        }));
        assert_eq!(resolve_anchor(&ev), "$root");
    }
}
