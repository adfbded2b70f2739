/// Decoding of chat service responses
///
/// Snapshot bodies are JSON; lobby and login pages are HTML carrying the
/// session "fkey" token; edit/delete endpoints answer with a small closed
/// set of quoted strings.
use crate::error::{ChatError, Result};
use crate::types::{ChatMessage, MessageId, RoomId, UserInfo};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

static FKEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"value="([0-9a-f]{32})""#).expect("fkey pattern compiles")
});

/// Extract the 32-hex-char fkey token from an HTML page
pub fn parse_fkey(html: &str) -> Option<String> {
    FKEY_PATTERN
        .captures(html)
        .map(|caps| caps[1].to_string())
}

/// What a room lobby page tells us about the room
#[derive(Debug, Clone)]
pub struct RoomPage {
    pub room_exists: bool,
    pub fkey: Option<String>,
    pub can_post: bool,
}

/// Interpret a room lobby response.
///
/// A 404 means the room does not exist (or this account cannot see it).
/// The message input textarea is only rendered when posting is allowed.
pub fn parse_room_page(status: u16, html: &str) -> RoomPage {
    RoomPage {
        room_exists: status != 404,
        fkey: parse_fkey(html),
        can_post: html.contains("<textarea id=\"input\">"),
    }
}

#[derive(Deserialize)]
struct EventsBody {
    #[serde(default)]
    events: Option<Vec<RawEvent>>,
}

#[derive(Deserialize)]
struct RawEvent {
    message_id: Option<u64>,
    room_id: Option<u64>,
    user_id: Option<i64>,
    user_name: Option<String>,
    content: Option<String>,
    time_stamp: Option<i64>,
}

/// Decode a snapshot body into messages, oldest first.
///
/// Deleted messages come back without content; they decode to an empty
/// string so they still participate in diffing.
pub fn parse_events(body: &str) -> Result<Vec<ChatMessage>> {
    let parsed: EventsBody = serde_json::from_str(body)
        .map_err(|e| ChatError::Protocol(format!("Bad events payload: {}", e)))?;

    let events = parsed.events.unwrap_or_default();
    Ok(events
        .into_iter()
        .map(|event| ChatMessage {
            message_id: event.message_id.unwrap_or(0),
            room_id: event.room_id.unwrap_or(0),
            user_id: event.user_id.unwrap_or(0),
            user_name: event.user_name.unwrap_or_default(),
            content: unescape_html(&event.content.unwrap_or_default()),
            timestamp: epoch_to_utc(event.time_stamp.unwrap_or(0)),
        })
        .collect())
}

#[derive(Deserialize)]
struct NewMessageBody {
    id: u64,
    time: i64,
}

/// Decode the response to posting a new message: `{"id":..., "time":...}`
pub fn parse_new_message(body: &str) -> Result<(MessageId, DateTime<Utc>)> {
    let parsed: NewMessageBody = serde_json::from_str(body)
        .map_err(|e| ChatError::Protocol(format!("Bad new-message payload: {}", e)))?;
    Ok((parsed.id, epoch_to_utc(parsed.time)))
}

/// Outcome of an edit or delete request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOutcome {
    Ok,
    AlreadyDeleted,
    TooLate,
    NotYourMessage,
    Nonexistent,
}

impl PostOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PostOutcome::Ok)
    }
}

/// Decode an edit response body
pub fn parse_edit_outcome(body: &str) -> Result<PostOutcome> {
    match body {
        "\"ok\"" => Ok(PostOutcome::Ok),
        "\"This message has already been deleted and cannot be edited\"" => {
            Ok(PostOutcome::AlreadyDeleted)
        }
        "\"It is too late to edit this message\"" => Ok(PostOutcome::TooLate),
        "\"You can only edit your own messages\"" => Ok(PostOutcome::NotYourMessage),
        other => Err(ChatError::Protocol(format!(
            "Unrecognized edit response: {}",
            other
        ))),
    }
}

/// Decode a delete response.
///
/// A 302 marks a message id that never existed; the body is not consulted.
pub fn parse_delete_outcome(status: u16, body: &str) -> Result<PostOutcome> {
    if status == 302 {
        return Ok(PostOutcome::Nonexistent);
    }
    match body {
        "\"ok\"" => Ok(PostOutcome::Ok),
        "\"This message has already been deleted.\"" => Ok(PostOutcome::AlreadyDeleted),
        "\"It is too late to delete this message\"" => Ok(PostOutcome::TooLate),
        "\"You can only delete your own messages\"" => Ok(PostOutcome::NotYourMessage),
        other => Err(ChatError::Protocol(format!(
            "Unrecognized delete response: {}",
            other
        ))),
    }
}

#[derive(Deserialize)]
struct UsersBody {
    #[serde(default)]
    users: Vec<RawUser>,
}

#[derive(Deserialize)]
struct RawUser {
    id: Option<i64>,
    name: Option<String>,
    email_hash: Option<String>,
    reputation: Option<i64>,
    is_moderator: Option<bool>,
    is_owner: Option<bool>,
    last_post: Option<i64>,
    last_seen: Option<i64>,
}

/// Decode a user-info response for one user.
///
/// An `email_hash` prefixed with `!` is a verbatim picture URL; otherwise it
/// is a gravatar hash.
pub fn parse_user_info(body: &str, room_id: RoomId) -> Result<Option<UserInfo>> {
    let parsed: UsersBody = serde_json::from_str(body)
        .map_err(|e| ChatError::Protocol(format!("Bad user-info payload: {}", e)))?;

    let Some(user) = parsed.users.into_iter().next() else {
        return Ok(None);
    };

    let email_hash = user.email_hash.unwrap_or_default();
    let profile_picture = match email_hash.strip_prefix('!') {
        Some(url) => url.to_string(),
        None => format!(
            "https://www.gravatar.com/avatar/{}?d=identicon&s=128",
            email_hash
        ),
    };

    Ok(Some(UserInfo {
        user_id: user.id.unwrap_or(0),
        room_id,
        username: user.name.unwrap_or_default(),
        profile_picture,
        reputation: user.reputation.unwrap_or(0),
        moderator: user.is_moderator.unwrap_or(false),
        owner: user.is_owner.unwrap_or(false),
        last_post: epoch_to_utc(user.last_post.unwrap_or(0)),
        last_seen: epoch_to_utc(user.last_seen.unwrap_or(0)),
    }))
}

/// Epoch seconds to UTC timestamp
pub fn epoch_to_utc(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

/// Replace HTML entities with their characters.
///
/// Covers the named entities the service actually emits plus numeric forms.
/// Unknown entities pass through literally.
pub fn unescape_html(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        match rest.find(';') {
            Some(end) if end > 1 && end <= 10 => {
                if let Some(decoded) = decode_entity(&rest[1..end]) {
                    out.push(decoded);
                    rest = &rest[end + 1..];
                } else {
                    out.push('&');
                    rest = &rest[1..];
                }
            }
            _ => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => return Some('&'),
        "lt" => return Some('<'),
        "gt" => return Some('>'),
        "quot" => return Some('"'),
        "apos" => return Some('\''),
        "nbsp" => return Some('\u{a0}'),
        _ => {}
    }

    let digits = entity.strip_prefix('#')?;
    let value = if let Some(hex) = digits.strip_prefix('x').or_else(|| digits.strip_prefix('X')) {
        u32::from_str_radix(hex, 16).ok()?
    } else {
        digits.parse::<u32>().ok()?
    };
    char::from_u32(value)
}
