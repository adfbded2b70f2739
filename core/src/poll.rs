/// Snapshot boundary logic and reconciliation
///
/// The snapshot endpoint is stateless ("the most recent N messages"), so
/// turning it into a gapless event stream takes two pieces: deciding when a
/// fetched snapshot provably covers everything we need (`batch_complete` +
/// `trim_batch`, driven by the growth loop in the client), and diffing the
/// result against the previous tick's snapshot (`collect_new` +
/// `collect_edited`). Everything here is a pure function of its inputs.
use crate::types::{ChatMessage, MessageId};
use chrono::{DateTime, Utc};

/// Whether a fetched snapshot needs no further growth.
///
/// Complete when the room's history is exhausted (fewer messages than
/// requested), or when the oldest message clears both boundaries: posted
/// before `horizon` (nothing older can still be edited) and, when a cursor
/// id exists, not newer than it (nothing unprocessed can be missing).
pub fn batch_complete(
    messages: &[ChatMessage],
    requested: usize,
    horizon: DateTime<Utc>,
    prev_id: Option<MessageId>,
) -> bool {
    if messages.len() < requested {
        return true;
    }

    let Some(oldest) = messages.first() else {
        return true;
    };

    let time_ok = oldest.timestamp < horizon;
    let id_ok = prev_id.map_or(true, |prev| oldest.message_id <= prev);
    time_ok && id_ok
}

/// Drop the leading messages the caller has no use for.
///
/// A message is dropped while it is both outside the edit window and not
/// newer than the cursor. With no cursor (first priming) only the window
/// test applies: history older than the edit window is discarded wholesale,
/// which bounds the cost of joining a busy room.
pub fn trim_batch(
    messages: Vec<ChatMessage>,
    horizon: DateTime<Utc>,
    prev_id: Option<MessageId>,
) -> Vec<ChatMessage> {
    let start = messages.iter().position(|message| {
        if message.timestamp >= horizon {
            return true;
        }
        match prev_id {
            Some(prev) => message.message_id > prev,
            None => false,
        }
    });

    match start {
        Some(0) => messages,
        Some(start) => messages[start..].to_vec(),
        None => Vec::new(),
    }
}

/// Messages in `snapshot` newer than the cursor, oldest first.
///
/// Scans from the newest end and stops at the first already-processed id,
/// so one pass suffices regardless of snapshot size.
pub fn collect_new(
    snapshot: &[ChatMessage],
    last_processed: Option<MessageId>,
) -> Vec<ChatMessage> {
    let mut new_messages: Vec<ChatMessage> = snapshot
        .iter()
        .rev()
        .take_while(|message| match last_processed {
            Some(prev) => message.message_id > prev,
            None => true,
        })
        .cloned()
        .collect();

    new_messages.reverse();
    new_messages
}

/// Messages whose content changed since the previous snapshot, in the new
/// snapshot's order.
///
/// A message absent from the previous snapshot is never an edit here; it is
/// either new (covered by `collect_new`) or already aged out of the window.
pub fn collect_edited(snapshot: &[ChatMessage], previous: &[ChatMessage]) -> Vec<ChatMessage> {
    snapshot
        .iter()
        .filter(|message| {
            previous
                .iter()
                .find(|prev| prev.message_id == message.message_id)
                .is_some_and(|prev| prev.content != message.content)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn message(id: MessageId, age_secs: i64, content: &str) -> ChatMessage {
        message_at(id, Utc::now() - Duration::seconds(age_secs), content)
    }

    fn message_at(id: MessageId, timestamp: DateTime<Utc>, content: &str) -> ChatMessage {
        ChatMessage {
            message_id: id,
            room_id: 1,
            user_id: 42,
            user_name: "alice".to_string(),
            content: content.to_string(),
            timestamp,
        }
    }

    fn horizon() -> DateTime<Utc> {
        Utc::now() - Duration::seconds(120)
    }

    #[test]
    fn test_short_snapshot_is_complete() {
        let messages = vec![message(1, 10, "a"), message(2, 5, "b")];
        // requested 10, got 2: history exhausted, boundaries irrelevant
        assert!(batch_complete(&messages, 10, horizon(), Some(99)));
    }

    #[test]
    fn test_full_snapshot_needs_both_boundaries() {
        let in_window = vec![message(5, 30, "a"), message(6, 20, "b")];
        assert!(!batch_complete(&in_window, 2, horizon(), None));

        let old_enough = vec![message(5, 300, "a"), message(6, 20, "b")];
        assert!(batch_complete(&old_enough, 2, horizon(), None));
        // id boundary unsatisfied: oldest id 5 > cursor 3
        assert!(!batch_complete(&old_enough, 2, horizon(), Some(3)));
        assert!(batch_complete(&old_enough, 2, horizon(), Some(5)));
    }

    #[test]
    fn test_trim_drops_processed_out_of_window_prefix() {
        let messages = vec![
            message(1, 400, "a"),
            message(2, 300, "b"),
            message(3, 30, "c"),
        ];
        let trimmed = trim_batch(messages, horizon(), Some(2));
        assert_eq!(
            trimmed.iter().map(|m| m.message_id).collect::<Vec<_>>(),
            vec![3]
        );
    }

    #[test]
    fn test_trim_keeps_unprocessed_old_messages() {
        let messages = vec![
            message(1, 400, "a"),
            message(2, 300, "b"),
            message(3, 30, "c"),
        ];
        // cursor at 1: messages 2 and 3 are unseen, 2 stays despite its age
        let trimmed = trim_batch(messages, horizon(), Some(1));
        assert_eq!(
            trimmed.iter().map(|m| m.message_id).collect::<Vec<_>>(),
            vec![2, 3]
        );
    }

    #[test]
    fn test_trim_priming_discards_old_history() {
        let messages = vec![
            message(1, 400, "a"),
            message(2, 300, "b"),
            message(3, 30, "c"),
            message(4, 10, "d"),
        ];
        let trimmed = trim_batch(messages, horizon(), None);
        assert_eq!(
            trimmed.iter().map(|m| m.message_id).collect::<Vec<_>>(),
            vec![3, 4]
        );
    }

    #[test]
    fn test_trim_can_empty_the_batch() {
        let messages = vec![message(1, 400, "a"), message(2, 300, "b")];
        assert!(trim_batch(messages, horizon(), Some(2)).is_empty());
    }

    #[test]
    fn test_collect_new_is_chronological() {
        let snapshot = vec![
            message(10, 40, "a"),
            message(11, 30, "b"),
            message(12, 20, "c"),
        ];
        let new_messages = collect_new(&snapshot, Some(10));
        assert_eq!(
            new_messages.iter().map(|m| m.message_id).collect::<Vec<_>>(),
            vec![11, 12]
        );
    }

    #[test]
    fn test_collect_new_stops_at_cursor() {
        // Ids below the cursor deeper in the snapshot must not leak through
        let snapshot = vec![
            message(8, 50, "x"),
            message(12, 20, "c"),
        ];
        let new_messages = collect_new(&snapshot, Some(10));
        assert_eq!(new_messages.len(), 1);
        assert_eq!(new_messages[0].message_id, 12);
    }

    #[test]
    fn test_collect_new_without_cursor_takes_all() {
        let snapshot = vec![message(1, 20, "a"), message(2, 10, "b")];
        assert_eq!(collect_new(&snapshot, None).len(), 2);
    }

    #[test]
    fn test_collect_edited_detects_content_change() {
        let previous = vec![message(1, 60, "before"), message(2, 50, "same")];
        let snapshot = vec![message(1, 60, "after"), message(2, 50, "same")];
        let edited = collect_edited(&snapshot, &previous);
        assert_eq!(edited.len(), 1);
        assert_eq!(edited[0].message_id, 1);
        assert_eq!(edited[0].content, "after");
    }

    #[test]
    fn test_new_message_is_not_an_edit() {
        let previous = vec![message(1, 60, "a")];
        let snapshot = vec![message(1, 60, "a"), message(2, 10, "fresh")];
        assert!(collect_edited(&snapshot, &previous).is_empty());
        assert_eq!(collect_new(&snapshot, Some(1)).len(), 1);
    }

    #[test]
    fn test_reconcile_sets_are_disjoint() {
        let previous = vec![message(1, 60, "old")];
        let snapshot = vec![message(1, 60, "changed"), message(2, 10, "new")];
        let new_messages = collect_new(&snapshot, Some(1));
        let edited = collect_edited(&snapshot, &previous);
        assert_eq!(
            new_messages.iter().map(|m| m.message_id).collect::<Vec<_>>(),
            vec![2]
        );
        assert_eq!(
            edited.iter().map(|m| m.message_id).collect::<Vec<_>>(),
            vec![1]
        );
    }
}
