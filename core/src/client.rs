/// Polling chat client
///
/// `ChatClient` is the public surface: login, join/leave, send/edit/delete,
/// and the `listen` loop that polls every joined room on a heartbeat and
/// dispatches new/edited message events to a caller-supplied handler.
use crate::config::ChatConfig;
use crate::error::{ChatError, Result};
use crate::parse;
use crate::poll;
use crate::session::{RoomCursor, SessionState};
use crate::split::SplitStrategy;
use crate::transport::{ApiRequest, HttpTransport, Sender, Transport};
use crate::types::{ChatMessage, MessageId, RoomId, UserId, UserInfo};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Receives events from the polling loop.
///
/// Handlers run on the scheduler's task, one event at a time; a handler that
/// blocks stalls the heartbeat for every room.
#[async_trait::async_trait]
pub trait ChatEventHandler: Send + Sync {
    /// A message not seen before appeared in a joined room
    async fn on_message(&self, message: ChatMessage);

    /// An already-seen message's content changed
    async fn on_message_edited(&self, message: ChatMessage);
}

/// A polling connection to the chat service
pub struct ChatClient {
    config: ChatConfig,
    transport: Arc<dyn Transport>,
    state: Arc<Mutex<SessionState>>,
    shutdown: CancellationToken,
}

impl ChatClient {
    /// Create a client over the real HTTP transport
    pub fn new(config: ChatConfig) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new()?);
        Ok(Self::with_transport(config, transport))
    }

    /// Create a client over a caller-supplied transport
    pub fn with_transport(config: ChatConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            state: Arc::new(Mutex::new(SessionState::new())),
            shutdown: CancellationToken::new(),
        }
    }

    fn site_url(&self, path: &str) -> String {
        format!("https://{}/{}", self.config.domain, path)
    }

    fn chat_url(&self, path: &str) -> String {
        format!("https://chat.{}/{}", self.config.domain, path)
    }

    fn send(&self, request: ApiRequest) -> Sender<'_> {
        Sender::new(self.transport.as_ref(), request, self.config.retry_pause)
    }

    /// Log in to the service.
    ///
    /// Scrapes the fkey from the login page, posts the credentials, and
    /// expects a 302 redirect; anything else means the credentials were
    /// rejected.
    pub async fn login(&self, email: &str, password: &str) -> Result<()> {
        info!("Logging in as {}", email);

        let login_url = self.site_url("users/login");
        let page = self.send(ApiRequest::get(login_url.clone())).send().await?;
        let fkey = parse::parse_fkey(&page.body).ok_or_else(|| {
            ChatError::Protocol("fkey field not found on login page".to_string())
        })?;

        let request = ApiRequest::post(login_url)
            .field("email", email)
            .field("password", password)
            .field("fkey", fkey);
        let response = self.send(request).attempts(1).send().await?;

        if response.status != 302 {
            return Err(ChatError::InvalidCredentials);
        }
        Ok(())
    }

    /// Join a room, making it visible to the polling loop.
    ///
    /// Primes the cursor with one boundary run so the first tick reports
    /// only what happens after the join. Idempotent: joining an
    /// already-joined room does nothing.
    pub async fn join_room(&self, room_id: RoomId) -> Result<()> {
        if self.state.lock().await.is_joined(room_id) {
            return Ok(());
        }

        // prime the pump
        let messages = self.next_message_batch(room_id, None).await?;
        let newest = messages.last().map(|m| m.message_id);

        let mut state = self.state.lock().await;
        state.insert_cursor(
            room_id,
            RoomCursor {
                last_processed: newest,
                last_snapshot: messages,
            },
        );
        info!("Joined room {}", room_id);
        Ok(())
    }

    /// Leave a room. No-op if not joined.
    ///
    /// The leave notification is best-effort: one attempt, failures logged
    /// and swallowed. All it does server-side is clear the user from the
    /// room list.
    pub async fn leave_room(&self, room_id: RoomId) {
        let fkey = {
            let state = self.state.lock().await;
            if !state.is_joined(room_id) {
                return;
            }
            state.fkey(room_id)
        };

        if let Some(fkey) = fkey {
            let request = ApiRequest::post(self.chat_url(&format!("chats/leave/{}", room_id)))
                .field("quiet", "true")
                .field("fkey", fkey);
            if let Err(e) = self.send(request).attempts(1).send().await {
                error!("Problem leaving room {}: {}", room_id, e);
            }
        }

        self.state.lock().await.remove_cursor(room_id);
        info!("Left room {}", room_id);
    }

    /// Post a message, truncating if it exceeds the single-line limit
    pub async fn send_message(&self, room_id: RoomId, text: &str) -> Result<MessageId> {
        let ids = self
            .send_message_split(room_id, text, SplitStrategy::None)
            .await?;
        ids.into_iter()
            .next()
            .ok_or_else(|| ChatError::Protocol("No message was posted".to_string()))
    }

    /// Post a message, splitting over-long single-line text into multiple
    /// posts.
    ///
    /// Messages containing a newline are exempt from the length limit and
    /// are always posted whole.
    pub async fn send_message_split(
        &self,
        room_id: RoomId,
        text: &str,
        strategy: SplitStrategy,
    ) -> Result<Vec<MessageId>> {
        let fkey = self.room_fkey(room_id).await?;

        let parts = if text.contains('\n') {
            vec![text.to_string()]
        } else {
            strategy.split(text, self.config.max_message_length)
        };

        let mut ids = Vec::with_capacity(parts.len());
        for part in parts {
            let request =
                ApiRequest::post(self.chat_url(&format!("chats/{}/messages/new", room_id)))
                    .field("text", part)
                    .field("fkey", fkey.clone());
            let response = self.send(request).statuses(&[200]).send().await?;

            if response.is_not_found() {
                // Having an fkey proves the room exists, so a 404 here means
                // permission to post was revoked after the fact
                return Err(ChatError::RoomUnavailable { room_id });
            }

            let (id, _) = parse::parse_new_message(&response.body)?;
            ids.push(id);
        }
        Ok(ids)
    }

    /// Fetch the most recent `count` messages of a room, oldest first
    pub async fn get_messages(&self, room_id: RoomId, count: usize) -> Result<Vec<ChatMessage>> {
        let fkey = self.room_fkey(room_id).await?;

        let request = ApiRequest::post(self.chat_url(&format!("chats/{}/events", room_id)))
            .field("mode", "messages")
            .field("msgCount", count.to_string())
            .field("fkey", fkey);
        let response = self.send(request).attempts(5).statuses(&[200]).send().await?;

        if response.is_not_found() {
            return Err(ChatError::RoomUnavailable { room_id });
        }
        parse::parse_events(&response.body)
    }

    /// Edit a message previously posted by this account.
    ///
    /// Returns whether the edit was accepted (the service refuses edits that
    /// are too late, on deleted messages, or on other users' messages).
    pub async fn edit_message(
        &self,
        room_id: RoomId,
        message_id: MessageId,
        text: &str,
    ) -> Result<bool> {
        let fkey = self.room_fkey(room_id).await?;

        let request = ApiRequest::post(self.chat_url(&format!("messages/{}", message_id)))
            .field("text", text)
            .field("fkey", fkey);
        let response = self.send(request).statuses(&[200]).send().await?;

        let outcome = parse::parse_edit_outcome(&response.body)?;
        Ok(outcome.is_success())
    }

    /// Delete a message previously posted by this account
    pub async fn delete_message(&self, room_id: RoomId, message_id: MessageId) -> Result<bool> {
        let fkey = self.room_fkey(room_id).await?;

        let request = ApiRequest::post(self.chat_url(&format!("messages/{}/delete", message_id)))
            .field("fkey", fkey);
        let response = self.send(request).statuses(&[200, 302]).send().await?;

        let outcome = parse::parse_delete_outcome(response.status, &response.body)?;
        Ok(outcome.is_success())
    }

    /// Fetch profile info for a user as seen from a room; `None` if the
    /// user does not exist
    pub async fn get_user_info(
        &self,
        user_id: UserId,
        room_id: RoomId,
    ) -> Result<Option<UserInfo>> {
        let request = ApiRequest::post(self.chat_url("user/info"))
            .field("ids", user_id.to_string())
            .field("roomId", room_id.to_string());
        let response = self.send(request).statuses(&[200]).send().await?;

        if response.is_not_found() {
            return Ok(None);
        }
        parse::parse_user_info(&response.body, room_id)
    }

    /// Run the polling loop until [`ChatClient::close`] is called.
    ///
    /// Each tick polls every joined room sequentially, dispatches events,
    /// then sleeps out the rest of the heartbeat interval. Cancellation is
    /// observed between rooms and during the sleep.
    pub async fn listen(&self, handler: &dyn ChatEventHandler) -> Result<()> {
        info!(
            "Listening for chat events (heartbeat {:?})",
            self.config.heartbeat
        );

        loop {
            if self.shutdown.is_cancelled() {
                return Ok(());
            }

            let started = Instant::now();
            self.poll_once(handler).await;

            if self.shutdown.is_cancelled() {
                return Ok(());
            }

            if let Some(remaining) = self.config.heartbeat.checked_sub(started.elapsed()) {
                tokio::select! {
                    _ = self.shutdown.cancelled() => return Ok(()),
                    _ = sleep(remaining) => {}
                }
            }
        }
    }

    /// One scheduler pass over all currently joined rooms.
    ///
    /// Rooms that fail to poll are logged and skipped; their cursors stay
    /// untouched so the next pass retries from the same boundary.
    pub async fn poll_once(&self, handler: &dyn ChatEventHandler) {
        let rooms = self.state.lock().await.joined_rooms();

        for room_id in rooms {
            if self.shutdown.is_cancelled() {
                return;
            }

            debug!("Polling room {}", room_id);
            if let Err(e) = self.poll_room(room_id, handler).await {
                warn!("Polling room {} failed: {}", room_id, e);
            }
        }
    }

    /// Poll a single room: boundary fetch, reconcile, dispatch, advance
    async fn poll_room(&self, room_id: RoomId, handler: &dyn ChatEventHandler) -> Result<()> {
        // Cursor read and update are separate critical sections; the lock is
        // never held across network calls or handler dispatch
        let cursor = self.state.lock().await.cursor(room_id);
        let Some(cursor) = cursor else {
            // left between the room-set read and now
            return Ok(());
        };

        let messages = self
            .next_message_batch(room_id, cursor.last_processed)
            .await?;

        let new_messages = poll::collect_new(&messages, cursor.last_processed);
        let edited = poll::collect_edited(&messages, &cursor.last_snapshot);

        if !new_messages.is_empty() || !edited.is_empty() {
            debug!(
                "Room {}: {} new and {} edited messages",
                room_id,
                new_messages.len(),
                edited.len()
            );
        }

        for message in new_messages {
            handler.on_message(message).await;
        }
        for message in edited {
            handler.on_message_edited(message).await;
        }

        let newest = messages.last().map(|m| m.message_id);
        self.state
            .lock()
            .await
            .update_cursor(room_id, newest, messages);
        Ok(())
    }

    /// Fetch a snapshot guaranteed to cover both poll boundaries, trimmed to
    /// what the caller still needs.
    ///
    /// Grows the request geometrically, so catching up after a gap of G
    /// messages takes O(log G) fetches. Any fetch failure aborts the whole
    /// computation; the caller's cursor is left as it was.
    async fn next_message_batch(
        &self,
        room_id: RoomId,
        prev_id: Option<MessageId>,
    ) -> Result<Vec<ChatMessage>> {
        let horizon = chrono::Utc::now() - self.config.edit_window;
        let mut count = self.config.initial_fetch_count.max(1);

        loop {
            let messages = self.get_messages(room_id, count).await?;
            if poll::batch_complete(&messages, count, horizon, prev_id) {
                return Ok(poll::trim_batch(messages, horizon, prev_id));
            }
            count *= 2;
        }
    }

    /// The fkey for a room, fetched from the lobby page on first use and
    /// cached for the lifetime of the client
    async fn room_fkey(&self, room_id: RoomId) -> Result<String> {
        if let Some(fkey) = self.state.lock().await.fkey(room_id) {
            return Ok(fkey);
        }

        let request = ApiRequest::get(self.chat_url(&format!("rooms/{}", room_id)));
        let response = self.send(request).statuses(&[200]).send().await?;

        let page = parse::parse_room_page(response.status, &response.body);
        if !page.room_exists {
            return Err(ChatError::RoomUnavailable { room_id });
        }
        let fkey = page.fkey.ok_or_else(|| {
            ChatError::Protocol(format!("No fkey on the page of room {}", room_id))
        })?;
        if !page.can_post {
            return Err(ChatError::PermissionDenied { room_id });
        }

        self.state.lock().await.cache_fkey(room_id, fkey.clone());
        Ok(fkey)
    }

    /// Leave all rooms and stop the polling loop.
    ///
    /// In-memory session state drops with the client; the transport is
    /// released when the last clone goes away.
    pub async fn close(&self) {
        let rooms = self.state.lock().await.joined_rooms();
        for room_id in rooms {
            self.leave_room(room_id).await;
        }
        self.shutdown.cancel();
        info!("Chat client closed");
    }
}

impl Clone for ChatClient {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            transport: self.transport.clone(),
            state: self.state.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}
