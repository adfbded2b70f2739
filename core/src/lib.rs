/// ChatLink - polling chat-room client
///
/// A client library for web chat services that only offer a stateless
/// "most recent N messages" endpoint. ChatLink polls joined rooms on a
/// heartbeat, sizes each fetch adaptively so no message or edit is missed,
/// and dispatches an ordered stream of new/edited message events.

pub mod client;
pub mod config;
pub mod error;
pub mod parse;
pub mod poll;
pub mod session;
pub mod split;
pub mod transport;
pub mod types;

pub use client::{ChatClient, ChatEventHandler};
pub use config::ChatConfig;
pub use error::{ChatError, Result};
pub use split::SplitStrategy;
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Method, Sender, Transport};
pub use types::{ChatMessage, MessageId, RoomId, UserId, UserInfo};
