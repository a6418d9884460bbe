//! Chat session state
//!
//! This module reconciles the two sources of truth the backend exposes:
//! REST-fetched conversation/message history and messages pushed over the
//! hub. It owns the loaded message window, the conversation list, the online
//! roster views, and the pagination cursor.
//!
//! The session is a single-owner state machine: all mutation happens on the
//! task driving it, so interleavings between timer-triggered and
//! user-triggered refreshes are resolved by wholesale replacement from the
//! latest completed response. Fire-and-forget side effects (joins, mark-read)
//! run as detached tasks whose failures are only logged.

use crate::api::ApiClient;
use crate::api::types::{
    ChatMessage, ConversationKind, ConversationSummary, OnlineUser, UserSummary,
};
use crate::config::Config;
use crate::Error;
use crate::hub::{HubClient, HubEvent};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, warn};

/// Merge a batch of messages into a window, preserving uniqueness and order
///
/// Concatenates the window and the batch (batch first when `prepend`), folds
/// the result into a map keyed by message id where later positions win, and
/// emits the values ascending by id.
///
/// Neither input needs to be sorted; the result never contains duplicate ids
/// and is always ascending. An empty batch is a no-op; prepending into an
/// empty window degenerates to the sorted batch.
///
/// # Example
/// ```rust
/// use hubchat::session::merge_messages;
/// # use hubchat::api::types::ChatMessage;
/// # fn msg(id: i64) -> ChatMessage {
/// #     ChatMessage { id, conversation_id: 1, sender_user_id: 1, body: String::new(),
/// #                   sent_at: String::new(), edited_at: None, deleted_at: None }
/// # }
///
/// let window = vec![msg(5), msg(7)];
/// let incoming = vec![msg(6), msg(7)];
/// let merged = merge_messages(&window, &incoming, false);
/// let ids: Vec<i64> = merged.iter().map(|m| m.id).collect();
/// assert_eq!(ids, vec![5, 6, 7]);
/// ```
pub fn merge_messages(
    current: &[ChatMessage],
    incoming: &[ChatMessage],
    prepend: bool,
) -> Vec<ChatMessage> {
    let ordered: Vec<&ChatMessage> = if prepend {
        incoming.iter().chain(current.iter()).collect()
    } else {
        current.iter().chain(incoming.iter()).collect()
    };

    let mut by_id: BTreeMap<i64, ChatMessage> = BTreeMap::new();
    for msg in ordered {
        by_id.insert(msg.id, msg.clone());
    }

    by_id.into_values().collect()
}

/// A user row as presented in the online panel
///
/// Derived and ephemeral: rebuilt on every roster refresh. The display name
/// falls back from the presence payload to the cached user roster to a
/// synthesized `User {id}` label.
#[derive(Debug, Clone, PartialEq)]
pub struct OnlineUserView {
    /// User identifier
    pub user_id: i64,
    /// Resolved display name
    pub display_name: String,
    /// Human status line ("online now", "offline", "last seen ...")
    pub status_text: String,
    /// Raw last-seen timestamp, when present
    pub last_seen_at: Option<String>,
}

/// Client-side chat session
///
/// Holds the view state for the chat panel and drives the REST and hub
/// collaborators. See the module docs for the ownership model.
pub struct ChatSession {
    /// REST client
    api: ApiClient,
    /// Push-channel client
    hub: HubClient,
    /// History page size
    page_size: usize,
    /// The logged-in user, once known
    current_user_id: Option<i64>,
    /// Cached user roster for display-name fallback
    roster: HashMap<i64, UserSummary>,
    /// Raw online roster from the last completed refresh
    last_online: Vec<OnlineUser>,
    /// Users for whom a direct conversation was already auto-opened
    auto_joined_user_ids: HashSet<i64>,
    /// Conversation summaries by id
    conversations_by_id: HashMap<i64, ConversationSummary>,
    /// Conversation list, most recent activity first
    pub conversations: Vec<ConversationSummary>,
    /// Banner for the conversation panel
    pub conversations_error: Option<String>,
    /// Online panel rows, sorted by display name
    pub online_users: Vec<OnlineUserView>,
    /// Banner for the online panel
    pub online_error: Option<String>,
    /// The conversation whose window is loaded
    pub active_conversation_id: Option<i64>,
    /// The peer shown in the message panel header (direct chats)
    pub active_peer: Option<OnlineUserView>,
    /// Loaded message window, ascending by id
    pub messages: Vec<ChatMessage>,
    /// Banner for the message panel
    pub messages_error: Option<String>,
    /// Whether older history is believed to exist (full-page heuristic)
    pub has_more_messages: bool,
    /// View should scroll to the newest message
    scroll_pending: bool,
}

impl ChatSession {
    /// Create a session over the given collaborators
    pub fn new(api: ApiClient, hub: HubClient, config: &Config) -> Self {
        Self {
            api,
            hub,
            page_size: config.page_size,
            current_user_id: None,
            roster: HashMap::new(),
            last_online: Vec::new(),
            auto_joined_user_ids: HashSet::new(),
            conversations_by_id: HashMap::new(),
            conversations: Vec::new(),
            conversations_error: None,
            online_users: Vec::new(),
            online_error: None,
            active_conversation_id: None,
            active_peer: None,
            messages: Vec::new(),
            messages_error: None,
            has_more_messages: false,
            scroll_pending: false,
        }
    }

    /// Record the logged-in user (filters them out of the online panel)
    pub fn set_current_user(&mut self, user_id: i64) {
        self.current_user_id = Some(user_id);
    }

    /// The logged-in user's id, once recorded
    pub fn current_user_id(&self) -> Option<i64> {
        self.current_user_id
    }

    /// Resolve a display label for a user id via the cached roster
    pub fn display_name_for(&self, user_id: i64) -> String {
        self.roster
            .get(&user_id)
            .map(|u| u.display_name.clone())
            .unwrap_or_else(|| format!("User {}", user_id))
    }

    /// Replace the cached user roster and re-derive the online panel
    pub fn set_roster(&mut self, users: Vec<UserSummary>) {
        self.roster = users.into_iter().map(|u| (u.id, u)).collect();
        if !self.last_online.is_empty() {
            self.online_users = self.map_online_users();
        }
    }

    /// Consume the pending auto-scroll request
    pub fn take_scroll_request(&mut self) -> bool {
        std::mem::take(&mut self.scroll_pending)
    }

    /// Apply a hub event to the session state
    pub async fn handle_hub_event(&mut self, event: HubEvent) {
        match event {
            HubEvent::Message(message) => self.handle_incoming(message).await,
            HubEvent::Reconnected => {
                // Joined conversations were already replayed by the hub layer.
                info!("Push channel reconnected");
            }
        }
    }

    /// Refresh the conversation list
    ///
    /// Replaces the list wholesale from the response, then joins every listed
    /// conversation on the push channel (skipping ones already joined;
    /// failures are logged only).
    pub async fn refresh_conversations(&mut self) {
        match self.api.conversations().await {
            Ok(mut list) => {
                sort_conversations(&mut list);
                self.conversations_by_id = list
                    .iter()
                    .map(|c| (c.conversation_id, c.clone()))
                    .collect();
                self.conversations = list;
                self.conversations_error = None;
                self.auto_join_conversation_list().await;
            }
            Err(e) => {
                warn!("Failed to load conversations: {}", e);
                self.conversations_error = Some("Failed to load conversations".to_string());
            }
        }
    }

    /// Refresh the online roster
    ///
    /// `silent` suppresses banner updates on failure (used by the background
    /// poll). On success the panel state is replaced wholesale and a direct
    /// conversation is auto-opened once per newly seen user.
    pub async fn refresh_online_users(&mut self, silent: bool) {
        match self.api.online_users().await {
            Ok(data) => {
                self.last_online = data;
                self.online_users = self.map_online_users();
                self.online_error = None;
                self.auto_join_online_users().await;
            }
            Err(Error::Unauthorized) => {
                if !silent {
                    self.online_error = Some("Not authorized, please log in again".to_string());
                }
            }
            Err(e) => {
                warn!("Failed to load online users: {}", e);
                if !silent {
                    self.online_error = Some("Failed to load online users".to_string());
                }
            }
        }
    }

    /// Open a conversation from the list
    pub async fn open_conversation(&mut self, summary: &ConversationSummary) {
        self.active_conversation_id = Some(summary.conversation_id);
        self.active_peer =
            self.resolve_peer(summary.other_user_id, summary.other_display_name.as_deref());
        self.messages.clear();
        self.messages_error = None;

        if let Err(e) = self.hub.join_conversation(summary.conversation_id).await {
            warn!("Failed to join conversation {}: {}", summary.conversation_id, e);
            self.messages_error = Some("Failed to join conversation".to_string());
            return;
        }

        self.load_messages(true).await;
    }

    /// Start (or resume) a direct chat with an online user
    pub async fn start_direct_chat(&mut self, user: &OnlineUserView) {
        if self.current_user_id.is_none() {
            self.messages_error = Some("No logged-in user".to_string());
            return;
        }

        self.active_peer = Some(user.clone());
        self.messages.clear();
        self.messages_error = None;

        let conversation = match self.api.create_direct_conversation(user.user_id).await {
            Ok(conversation) => conversation,
            Err(e) => {
                warn!("Failed to create conversation with {}: {}", user.user_id, e);
                self.messages_error = Some("Failed to create conversation".to_string());
                return;
            }
        };

        self.active_conversation_id = Some(conversation.id);
        self.refresh_conversations().await;

        if let Err(e) = self.hub.join_conversation(conversation.id).await {
            warn!("Failed to join conversation {}: {}", conversation.id, e);
            self.messages_error = Some("Failed to join conversation".to_string());
            return;
        }

        self.load_messages(true).await;
    }

    /// Load a page of message history
    ///
    /// `reset` fetches the most recent page and scrolls to the newest
    /// message; otherwise the page strictly older than the oldest loaded id
    /// is fetched and merged in front, preserving view position. The cursor
    /// is the first element of the window, which is kept ascending.
    pub async fn load_messages(&mut self, reset: bool) {
        let Some(conversation_id) = self.active_conversation_id else {
            return;
        };

        let before_id = if reset { None } else { self.messages.first().map(|m| m.id) };
        self.messages_error = None;

        match self.api.messages(conversation_id, before_id, self.page_size).await {
            Ok(batch) => {
                let returned = batch.len();
                self.messages = merge_messages(&self.messages, &batch, !reset);
                // A full page implies more history. A final page of exactly
                // page_size yields a false positive; preserved as-is.
                self.has_more_messages = returned >= self.page_size;
                self.spawn_mark_read();
                if reset {
                    self.scroll_pending = true;
                }
            }
            Err(e) => {
                warn!("Failed to load messages for {}: {}", conversation_id, e);
                self.messages_error = Some("Failed to load messages".to_string());
            }
        }
    }

    /// Send a message to the active conversation over the hub
    ///
    /// Whitespace-only input is a no-op. The echoed message arrives back via
    /// the push channel like any other.
    pub async fn send_message(&mut self, body: &str) {
        let Some(conversation_id) = self.active_conversation_id else {
            return;
        };
        let body = body.trim();
        if body.is_empty() {
            return;
        }

        if let Err(e) = self.hub.send_message(conversation_id, body).await {
            warn!("Failed to send message to {}: {}", conversation_id, e);
            self.messages_error = Some("Failed to send message".to_string());
        }
    }

    /// Apply a pushed message to the session state
    ///
    /// A message for another conversation switches the session to it: the
    /// window is replaced with just that message, the conversation is joined,
    /// and history is reset-loaded. A message for the active conversation is
    /// appended once (duplicate delivery of the same id is a no-op). Pushed
    /// messages are assumed to arrive in non-decreasing id order per
    /// conversation, but nothing depends on it; the next merge repairs any
    /// violation.
    pub async fn handle_incoming(&mut self, message: ChatMessage) {
        if message.conversation_id == 0 {
            return;
        }

        if Some(message.conversation_id) != self.active_conversation_id {
            let conversation_id = message.conversation_id;
            self.active_conversation_id = Some(conversation_id);
            self.active_peer = self.resolve_peer(Some(message.sender_user_id), None);
            self.messages = vec![message];
            self.messages_error = None;

            if let Err(e) = self.hub.join_conversation(conversation_id).await {
                warn!("Failed to join conversation {}: {}", conversation_id, e);
                self.messages_error = Some("Failed to join conversation".to_string());
                return;
            }

            self.load_messages(true).await;
            return;
        }

        if self.messages.iter().any(|m| m.id == message.id) {
            debug!("Dropping duplicate pushed message {}", message.id);
            return;
        }

        self.messages.push(message);
        self.scroll_pending = true;
        self.spawn_mark_read();
    }

    /// Mark the active conversation read up to the newest loaded message,
    /// fire-and-forget
    fn spawn_mark_read(&self) {
        let Some(conversation_id) = self.active_conversation_id else {
            return;
        };
        let Some(last_id) = self.messages.last().map(|m| m.id) else {
            return;
        };

        let api = self.api.clone();
        tokio::spawn(async move {
            if let Err(e) = api.mark_read(conversation_id, Some(last_id)).await {
                debug!("Failed to mark conversation {} read: {}", conversation_id, e);
            }
        });
    }

    /// Join every listed conversation on the push channel, skipping ones
    /// already joined; failures are logged only
    async fn auto_join_conversation_list(&self) {
        if self.current_user_id.is_none() || self.conversations.is_empty() {
            return;
        }

        let already: HashSet<i64> = self.hub.joined_conversations().await.into_iter().collect();
        for convo in &self.conversations {
            if already.contains(&convo.conversation_id) {
                continue;
            }
            let hub = self.hub.clone();
            let conversation_id = convo.conversation_id;
            tokio::spawn(async move {
                if let Err(e) = hub.join_conversation(conversation_id).await {
                    debug!("Failed to auto-join conversation {}: {}", conversation_id, e);
                }
            });
        }
    }

    /// Open a direct conversation once per newly seen online user
    async fn auto_join_online_users(&mut self) {
        if self.current_user_id.is_none() || self.online_users.is_empty() {
            return;
        }

        let fresh: Vec<OnlineUserView> = self
            .online_users
            .iter()
            .filter(|u| !self.auto_joined_user_ids.contains(&u.user_id))
            .cloned()
            .collect();

        for user in fresh {
            self.auto_joined_user_ids.insert(user.user_id);

            match self.api.create_direct_conversation(user.user_id).await {
                Ok(conversation) => {
                    self.conversations_by_id.insert(
                        conversation.id,
                        ConversationSummary {
                            conversation_id: conversation.id,
                            kind: ConversationKind::Direct,
                            name: conversation.name.clone(),
                            other_user_id: Some(user.user_id),
                            other_display_name: Some(user.display_name.clone()),
                            last_message_at: None,
                        },
                    );

                    let hub = self.hub.clone();
                    tokio::spawn(async move {
                        if let Err(e) = hub.join_conversation(conversation.id).await {
                            debug!("Failed to join conversation {}: {}", conversation.id, e);
                        }
                    });
                }
                Err(e) => {
                    debug!("Failed to auto-open conversation with {}: {}", user.user_id, e);
                }
            }
        }
    }

    /// Resolve a peer identity for the message panel header
    fn resolve_peer(
        &self,
        user_id: Option<i64>,
        display_name: Option<&str>,
    ) -> Option<OnlineUserView> {
        match (user_id, display_name) {
            (None, None) => None,
            (None, Some(name)) => Some(OnlineUserView {
                user_id: 0,
                display_name: name.to_string(),
                status_text: "new message".to_string(),
                last_seen_at: None,
            }),
            (Some(id), name) => {
                let fallback = self.roster.get(&id).map(|u| u.display_name.clone());
                let display_name = name
                    .map(str::to_string)
                    .filter(|s| !s.is_empty())
                    .or(fallback)
                    .unwrap_or_else(|| format!("User {}", id));
                Some(OnlineUserView {
                    user_id: id,
                    display_name,
                    status_text: "new message".to_string(),
                    last_seen_at: None,
                })
            }
        }
    }

    /// Derive the online panel rows from the last raw roster
    fn map_online_users(&self) -> Vec<OnlineUserView> {
        let mut views: Vec<OnlineUserView> = self
            .last_online
            .iter()
            .filter(|item| Some(item.user_id) != self.current_user_id)
            .map(|item| {
                let fallback = self.roster.get(&item.user_id).map(|u| u.display_name.clone());
                let display_name = item
                    .display_name
                    .clone()
                    .filter(|s| !s.is_empty())
                    .or(fallback)
                    .unwrap_or_else(|| format!("User {}", item.user_id));

                let status_text = if item.is_online == Some(false) {
                    "offline".to_string()
                } else if let Some(seen) = &item.last_seen_at {
                    format!("last seen {}", format_last_seen(seen))
                } else {
                    "online now".to_string()
                };

                OnlineUserView {
                    user_id: item.user_id,
                    display_name,
                    status_text,
                    last_seen_at: item.last_seen_at.clone(),
                }
            })
            .collect();

        views.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        views
    }
}

/// Most recent activity first, name as tie-breaker
fn sort_conversations(list: &mut [ConversationSummary]) {
    list.sort_by(|a, b| {
        let a_time = a.last_message_at.as_deref().and_then(parse_timestamp);
        let b_time = b.last_message_at.as_deref().and_then(parse_timestamp);
        b_time
            .cmp(&a_time)
            .then_with(|| display_label(a).cmp(&display_label(b)))
    });
}

fn display_label(summary: &ConversationSummary) -> String {
    summary
        .name
        .clone()
        .or_else(|| summary.other_display_name.clone())
        .unwrap_or_else(|| format!("Conversation {}", summary.conversation_id))
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Format a wire timestamp as a short clock time, empty when unparseable
pub fn format_time(value: &str) -> String {
    match parse_timestamp(value) {
        Some(dt) => dt.format("%H:%M").to_string(),
        None => String::new(),
    }
}

fn format_last_seen(value: &str) -> String {
    match parse_timestamp(value) {
        Some(dt) => dt.format("%d %b %H:%M").to_string(),
        None => "unknown".to_string(),
    }
}
