/// Configuration for a chat connection
use std::time::Duration;

/// Chat connection configuration
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Base domain of the service; the chat host is `chat.{domain}`
    pub domain: String,

    /// Pause between transport retry attempts
    pub retry_pause: Duration,

    /// Minimum time between the start of consecutive polling ticks
    pub heartbeat: Duration,

    /// How long after posting a message may still be edited
    pub edit_window: Duration,

    /// Seed value for the snapshot growth loop
    pub initial_fetch_count: usize,

    /// Maximum length of a single-line outgoing message
    pub max_message_length: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            domain: "stackoverflow.com".to_string(),
            retry_pause: Duration::from_secs(5),
            heartbeat: Duration::from_secs(3),
            edit_window: Duration::from_secs(120),
            initial_fetch_count: 10,
            max_message_length: 500,
        }
    }
}

impl ChatConfig {
    /// Config for a given service domain, with default cadence values
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            ..Default::default()
        }
    }
}
