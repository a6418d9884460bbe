//! TUI application state and key handling

use crate::api::types::AuthUser;
use crate::hub::HubEvent;
use crate::session::ChatSession;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// How far a PageUp/PageDown jump moves through the message window
const SCROLL_STEP: usize = 10;

/// Which pane owns keyboard focus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    /// Conversation list
    Conversations,
    /// Online users list
    Online,
    /// Message input line
    Input,
}

/// TUI application state
pub struct App {
    /// The chat session behind the screen
    pub session: ChatSession,
    /// The logged-in user shown in the header
    pub current_user: Option<AuthUser>,
    /// Focused pane
    pub focus: Pane,
    /// Selected row in the conversations pane
    pub conversation_index: usize,
    /// Selected row in the online pane
    pub online_index: usize,
    /// Message input buffer
    pub input: String,
    /// Scroll offset from the bottom of the message window, in rows
    pub message_offset: usize,
    /// Should quit
    pub should_quit: bool,
}

impl App {
    /// Create the application state around a prepared session
    pub fn new(session: ChatSession, current_user: Option<AuthUser>) -> Self {
        Self {
            session,
            current_user,
            focus: Pane::Conversations,
            conversation_index: 0,
            online_index: 0,
            input: String::new(),
            message_offset: 0,
            should_quit: false,
        }
    }

    /// Apply one key press
    pub async fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        match self.focus {
            Pane::Input => self.handle_input_key(key).await,
            Pane::Conversations | Pane::Online => self.handle_list_key(key).await,
        }

        self.clamp_selections();
        self.sync_scroll();
    }

    async fn handle_input_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => {
                let body = std::mem::take(&mut self.input);
                self.session.send_message(&body).await;
            }
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Esc => {
                self.focus = Pane::Conversations;
            }
            KeyCode::Tab => {
                self.focus = Pane::Conversations;
            }
            KeyCode::Char(c) => {
                self.input.push(c);
            }
            _ => {}
        }
    }

    async fn handle_list_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::Tab => {
                self.focus = match self.focus {
                    Pane::Conversations => Pane::Online,
                    Pane::Online => Pane::Input,
                    Pane::Input => Pane::Conversations,
                };
            }
            KeyCode::Up => match self.focus {
                Pane::Conversations => {
                    self.conversation_index = self.conversation_index.saturating_sub(1);
                }
                Pane::Online => {
                    self.online_index = self.online_index.saturating_sub(1);
                }
                Pane::Input => {}
            },
            KeyCode::Down => match self.focus {
                Pane::Conversations => {
                    self.conversation_index += 1;
                }
                Pane::Online => {
                    self.online_index += 1;
                }
                Pane::Input => {}
            },
            KeyCode::Enter => {
                self.activate_selection().await;
            }
            KeyCode::Char('r') => {
                self.session.refresh_conversations().await;
                self.session.refresh_online_users(false).await;
            }
            KeyCode::PageUp => {
                self.page_up().await;
            }
            KeyCode::PageDown => {
                self.message_offset = self.message_offset.saturating_sub(SCROLL_STEP);
            }
            _ => {}
        }
    }

    /// Open the selected conversation or start a chat with the selected user
    async fn activate_selection(&mut self) {
        match self.focus {
            Pane::Conversations => {
                if let Some(summary) = self.session.conversations.get(self.conversation_index) {
                    let summary = summary.clone();
                    self.session.open_conversation(&summary).await;
                    self.focus = Pane::Input;
                }
            }
            Pane::Online => {
                if let Some(user) = self.session.online_users.get(self.online_index) {
                    let user = user.clone();
                    self.session.start_direct_chat(&user).await;
                    self.focus = Pane::Input;
                }
            }
            Pane::Input => {}
        }
    }

    /// Scroll the message window up, loading older history at the top
    async fn page_up(&mut self) {
        let len = self.session.messages.len();
        if self.message_offset + SCROLL_STEP < len {
            self.message_offset += SCROLL_STEP;
            return;
        }

        self.message_offset = len.saturating_sub(1);
        if self.session.has_more_messages {
            // Pagination keeps the view position: no scroll reset here.
            self.session.load_messages(false).await;
        }
    }

    /// Apply a hub event and honor any resulting auto-scroll request
    pub async fn on_hub_event(&mut self, event: HubEvent) {
        self.session.handle_hub_event(event).await;
        self.sync_scroll();
    }

    fn sync_scroll(&mut self) {
        if self.session.take_scroll_request() {
            self.message_offset = 0;
        }
    }

    fn clamp_selections(&mut self) {
        let max_convo = self.session.conversations.len().saturating_sub(1);
        self.conversation_index = self.conversation_index.min(max_convo);

        let max_online = self.session.online_users.len().saturating_sub(1);
        self.online_index = self.online_index.min(max_online);
    }
}
