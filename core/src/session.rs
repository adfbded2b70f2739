/// Per-room session state: fkey cache, join flags, polling cursors
///
/// Everything the scheduler and the facade share lives in one
/// `SessionState` value guarded by a single lock, so the room set and the
/// cursor map can never be observed torn relative to each other. A room is
/// "joined" exactly when it has a cursor.
use crate::types::{ChatMessage, MessageId, RoomId};
use std::collections::HashMap;

/// Polling bookkeeping for one joined room
#[derive(Debug, Clone, Default)]
pub struct RoomCursor {
    /// Id of the newest message already dispatched; `None` only right after
    /// priming an empty room
    pub last_processed: Option<MessageId>,

    /// Full snapshot from the previous tick, kept for edit diffing
    pub last_snapshot: Vec<ChatMessage>,
}

/// Shared mutable state for one chat connection
#[derive(Debug, Default)]
pub struct SessionState {
    fkeys: HashMap<RoomId, String>,
    rooms: HashMap<RoomId, RoomCursor>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached fkey for a room, if one was ever fetched.
    ///
    /// Fkeys stay valid for the whole login session, so entries are never
    /// invalidated, not even on leave.
    pub fn fkey(&self, room_id: RoomId) -> Option<String> {
        self.fkeys.get(&room_id).cloned()
    }

    pub fn cache_fkey(&mut self, room_id: RoomId, fkey: String) {
        self.fkeys.insert(room_id, fkey);
    }

    pub fn is_joined(&self, room_id: RoomId) -> bool {
        self.rooms.contains_key(&room_id)
    }

    /// Ids of all currently joined rooms
    pub fn joined_rooms(&self) -> Vec<RoomId> {
        self.rooms.keys().copied().collect()
    }

    /// Copy of a room's cursor, `None` if the room is not joined
    pub fn cursor(&self, room_id: RoomId) -> Option<RoomCursor> {
        self.rooms.get(&room_id).cloned()
    }

    /// Install a cursor for a newly joined room; keeps an existing cursor
    /// untouched (join is idempotent)
    pub fn insert_cursor(&mut self, room_id: RoomId, cursor: RoomCursor) {
        self.rooms.entry(room_id).or_insert(cursor);
    }

    /// Apply a tick's result to a room.
    ///
    /// No-op if the room was left while the tick was in flight; a leave must
    /// never be resurrected. An empty snapshot keeps the previous
    /// `last_processed` (cursor ids only ever move forward).
    pub fn update_cursor(
        &mut self,
        room_id: RoomId,
        newest_id: Option<MessageId>,
        snapshot: Vec<ChatMessage>,
    ) {
        if let Some(cursor) = self.rooms.get_mut(&room_id) {
            if let Some(id) = newest_id {
                cursor.last_processed = Some(id);
            }
            cursor.last_snapshot = snapshot;
        }
    }

    /// Remove a room's cursor; returns whether it was joined
    pub fn remove_cursor(&mut self, room_id: RoomId) -> bool {
        self.rooms.remove(&room_id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_flag_follows_cursor() {
        let mut state = SessionState::new();
        assert!(!state.is_joined(1));

        state.insert_cursor(1, RoomCursor::default());
        assert!(state.is_joined(1));
        assert_eq!(state.joined_rooms(), vec![1]);

        assert!(state.remove_cursor(1));
        assert!(!state.is_joined(1));
        assert!(!state.remove_cursor(1));
    }

    #[test]
    fn test_insert_cursor_is_idempotent() {
        let mut state = SessionState::new();
        state.insert_cursor(
            1,
            RoomCursor {
                last_processed: Some(50),
                last_snapshot: Vec::new(),
            },
        );
        state.insert_cursor(
            1,
            RoomCursor {
                last_processed: Some(99),
                last_snapshot: Vec::new(),
            },
        );
        assert_eq!(state.cursor(1).unwrap().last_processed, Some(50));
    }

    #[test]
    fn test_update_cursor_skips_left_rooms() {
        let mut state = SessionState::new();
        state.update_cursor(7, Some(100), Vec::new());
        assert!(!state.is_joined(7));
    }

    #[test]
    fn test_update_cursor_keeps_id_on_empty_snapshot() {
        let mut state = SessionState::new();
        state.insert_cursor(
            1,
            RoomCursor {
                last_processed: Some(10),
                last_snapshot: Vec::new(),
            },
        );
        state.update_cursor(1, None, Vec::new());
        assert_eq!(state.cursor(1).unwrap().last_processed, Some(10));
    }

    #[test]
    fn test_fkey_cache_survives_leave() {
        let mut state = SessionState::new();
        state.cache_fkey(1, "abc".to_string());
        state.insert_cursor(1, RoomCursor::default());
        state.remove_cursor(1);
        assert_eq!(state.fkey(1), Some("abc".to_string()));
    }
}
