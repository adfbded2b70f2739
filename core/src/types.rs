/// Shared types for the chat layer
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type RoomId = u64;
pub type MessageId = u64;
pub type UserId = i64;

/// One message as observed in a room snapshot.
///
/// Ids are assigned by the remote service and are monotonic within a room.
/// A later observation with the same id but different content is an edit,
/// not a new message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub message_id: MessageId,
    pub room_id: RoomId,
    pub user_id: UserId,
    pub user_name: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Profile information for a chat user, scoped to one room
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserInfo {
    pub user_id: UserId,
    pub room_id: RoomId,
    pub username: String,
    pub profile_picture: String,
    pub reputation: i64,
    pub moderator: bool,
    pub owner: bool,
    pub last_post: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}
