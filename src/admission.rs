use crate::event::{IncomingEvent, TEXT_MSGTYPE};
use crate::policy::Policy;

/// The first exclusion rule an event tripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    OwnMessage,
    SenderBlacklisted,
    SenderNotWhitelisted,
    RoomBlacklisted,
    RoomNotWhitelisted,
    Stale,
    Edit,
    NonText,
}

impl IgnoreReason {
    pub fn as_str(self) -> &'static str {
        match self {
            IgnoreReason::OwnMessage => "own message",
            IgnoreReason::SenderBlacklisted => "sender blacklisted",
            IgnoreReason::SenderNotWhitelisted => "sender not whitelisted",
            IgnoreReason::RoomBlacklisted => "room blacklisted",
            IgnoreReason::RoomNotWhitelisted => "room not whitelisted",
            IgnoreReason::Stale => "stale",
            IgnoreReason::Edit => "edit",
            IgnoreReason::NonText => "non-text content",
        }
    }
}

/// Evaluate the exclusion rules in order and stop at the first hit.
pub fn admission_verdict(
    event: &IncomingEvent,
    room_id: &str,
    policy: &Policy,
    self_handle: &str,
    now_ms: i64,
) -> Option<IgnoreReason> {
    if event.sender == self_handle {
        return Some(IgnoreReason::OwnMessage);
    }
    if policy.sender_blacklist.matches(&event.sender) {
        return Some(IgnoreReason::SenderBlacklisted);
    }
    if !policy.sender_whitelist.is_empty() && !policy.sender_whitelist.matches(&event.sender) {
        return Some(IgnoreReason::SenderNotWhitelisted);
    }
    if policy.room_blacklist.matches(room_id) {
        return Some(IgnoreReason::RoomBlacklisted);
    }
    if !policy.room_whitelist.is_empty() && !policy.room_whitelist.matches(room_id) {
        return Some(IgnoreReason::RoomNotWhitelisted);
    }
    if now_ms.saturating_sub(event.timestamp_ms) > policy.stale_threshold_ms {
        return Some(IgnoreReason::Stale);
    }
    if event.is_edit() {
        return Some(IgnoreReason::Edit);
    }
    if policy.ignore_non_text && event.content_type != TEXT_MSGTYPE {
        return Some(IgnoreReason::NonText);
    }
    None
}

pub fn should_ignore(
    event: &IncomingEvent,
    room_id: &str,
    policy: &Policy,
    self_handle: &str,
    now_ms: i64,
) -> bool {
    admission_verdict(event, room_id, policy, self_handle, now_ms).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Relation, RelationKind};
    use crate::policy::SuffixList;

    const BOT: &str = "@gpt:example.org";
    const ROOM: &str = "!room:example.org";
    const NOW: i64 = 1_700_000_000_000;

    fn event(sender: &str) -> IncomingEvent {
        IncomingEvent {
            id: "$ev".into(),
            sender: sender.into(),
            room_id: ROOM.into(),
            timestamp_ms: NOW - 1_000,
            event_type: "m.room.message".into(),
            content_type: "m.text".into(),
            body: "hello".into(),
            relation: None,
        }
    }

    fn verdict(ev: &IncomingEvent, policy: &Policy) -> Option<IgnoreReason> {
        admission_verdict(ev, &ev.room_id, policy, BOT, NOW)
    }

    #[test]
    fn test_plain_message_admitted() {
        assert_eq!(verdict(&event("@alice:example.org"), &Policy::default()), None);
    }

    #[test]
    fn test_own_message_ignored_regardless_of_other_fields() {
        let mut policy = Policy::default();
        policy.sender_whitelist = SuffixList::parse(":example.org");
        policy.stale_threshold_ms = i64::MAX;
        let mut ev = event(BOT);
        ev.timestamp_ms = NOW;
        assert_eq!(verdict(&ev, &policy), Some(IgnoreReason::OwnMessage));
        assert!(should_ignore(&ev, ROOM, &policy, BOT, NOW));
    }

    #[test]
    fn test_blacklisted_sender_suffix() {
        let mut policy = Policy::default();
        policy.sender_blacklist = SuffixList::parse("spam.example.org");
        assert_eq!(
            verdict(&event("bot@spam.example.org"), &policy),
            Some(IgnoreReason::SenderBlacklisted)
        );
    }

    #[test]
    fn test_sender_whitelist() {
        let mut policy = Policy::default();
        policy.sender_whitelist = SuffixList::parse("trusted.org");
        assert_eq!(
            verdict(&event("alice@other.org"), &policy),
            Some(IgnoreReason::SenderNotWhitelisted)
        );
        assert_eq!(verdict(&event("alice@trusted.org"), &policy), None);
    }

    #[test]
    fn test_blacklist_checked_before_whitelist() {
        let mut policy = Policy::default();
        policy.sender_blacklist = SuffixList::parse("bad.trusted.org");
        policy.sender_whitelist = SuffixList::parse("trusted.org");
        assert_eq!(
            verdict(&event("@x:bad.trusted.org"), &policy),
            Some(IgnoreReason::SenderBlacklisted)
        );
    }

    #[test]
    fn test_room_lists() {
        let mut policy = Policy::default();
        policy.room_blacklist = SuffixList::parse(":muted.org");
        let mut ev = event("@alice:example.org");
        ev.room_id = "!abc:muted.org".into();
        assert_eq!(verdict(&ev, &policy), Some(IgnoreReason::RoomBlacklisted));

        let mut policy = Policy::default();
        policy.room_whitelist = SuffixList::parse("!allowed:example.org");
        assert_eq!(
            verdict(&event("@alice:example.org"), &policy),
            Some(IgnoreReason::RoomNotWhitelisted)
        );
        let mut ev = event("@alice:example.org");
        ev.room_id = "!allowed:example.org".into();
        assert_eq!(verdict(&ev, &policy), None);
    }

    #[test]
    fn test_room_rules_use_room_argument() {
        let mut policy = Policy::default();
        policy.room_blacklist = SuffixList::parse(":muted.org");
        let ev = event("@alice:example.org");
        assert!(should_ignore(&ev, "!other:muted.org", &policy, BOT, NOW));
        assert!(!should_ignore(&ev, ROOM, &policy, BOT, NOW));
    }

    #[test]
    fn test_stale_boundary_is_strict() {
        let policy = Policy::default();
        let mut ev = event("@alice:example.org");

        ev.timestamp_ms = NOW - policy.stale_threshold_ms - 1;
        assert_eq!(verdict(&ev, &policy), Some(IgnoreReason::Stale));

        ev.timestamp_ms = NOW - policy.stale_threshold_ms;
        assert_eq!(verdict(&ev, &policy), None);

        ev.timestamp_ms = NOW - (policy.stale_threshold_ms - 1);
        assert_eq!(verdict(&ev, &policy), None);
    }

    #[test]
    fn test_extreme_timestamps_do_not_overflow() {
        let policy = Policy::default();
        let mut ev = event("@alice:example.org");
        ev.timestamp_ms = i64::MIN;
        assert_eq!(verdict(&ev, &policy), Some(IgnoreReason::Stale));
        ev.timestamp_ms = i64::MAX;
        assert_eq!(verdict(&ev, &policy), None);
    }

    #[test]
    fn test_edits_ignored() {
        let mut ev = event("@alice:example.org");
        ev.relation = Some(Relation {
            kind: RelationKind::Replace,
            target_event_id: Some("$orig".into()),
        });
        assert_eq!(verdict(&ev, &Policy::default()), Some(IgnoreReason::Edit));
    }

    #[test]
    fn test_thread_messages_admitted() {
        let mut ev = event("@alice:example.org");
        ev.relation = Some(Relation {
            kind: RelationKind::Thread,
            target_event_id: Some("$root".into()),
        });
        assert_eq!(verdict(&ev, &Policy::default()), None);
    }

    #[test]
    fn test_media_only_ignored_when_enabled() {
        let mut ev = event("@alice:example.org");
        ev.content_type = "m.image".into();
        assert_eq!(verdict(&ev, &Policy::default()), None);

        let mut policy = Policy::default();
        policy.ignore_non_text = true;
        assert_eq!(verdict(&ev, &policy), Some(IgnoreReason::NonText));

        ev.content_type = "m.notice".into();
        assert_eq!(verdict(&ev, &policy), Some(IgnoreReason::NonText));
    }

    #[test]
    fn test_should_ignore_is_idempotent() {
        let mut policy = Policy::default();
        policy.sender_whitelist = SuffixList::parse("trusted.org");
        for sender in ["@a:trusted.org", "@b:other.org", BOT] {
            let ev = event(sender);
            let first = should_ignore(&ev, ROOM, &policy, BOT, NOW);
            let second = should_ignore(&ev, ROOM, &policy, BOT, NOW);
            assert_eq!(first, second);
        }
    }
}
