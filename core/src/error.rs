/// Error types for the chat client
use crate::types::RoomId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Room {room_id} does not exist or is not accessible")]
    RoomUnavailable { room_id: RoomId },

    #[error("Not allowed to post messages in room {room_id}")]
    PermissionDenied { room_id: RoomId },

    #[error("Login rejected for the supplied credentials")]
    InvalidCredentials,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

pub type Result<T> = std::result::Result<T, ChatError>;
