//! Wire DTOs
//!
//! The backend is loosely typed: most fields beyond the identifiers are
//! optional, enums may grow values, and timestamps arrive as strings in no
//! guaranteed format. DTOs mirror that looseness; presentation code parses
//! timestamps tolerantly instead of failing a whole payload over one field.

use serde::{Deserialize, Serialize};

/// Conversation kind as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    /// Two-party conversation
    Direct,
    /// Multi-party conversation
    Group,
    /// Any kind this client doesn't know yet
    #[serde(other)]
    Other,
}

/// One row of the online roster from GET /presence/online
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OnlineUser {
    /// User identifier
    pub user_id: i64,
    /// Display name, when the presence service knows it
    #[serde(default)]
    pub display_name: Option<String>,
    /// Email, when exposed
    #[serde(default)]
    pub email: Option<String>,
    /// Whether the user is currently online; absent means online
    #[serde(default)]
    pub is_online: Option<bool>,
    /// Last-seen timestamp, as sent by the backend
    #[serde(default)]
    pub last_seen_at: Option<String>,
}

/// A conversation as returned by POST /conversations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Conversation identifier
    pub id: i64,
    /// Direct or group
    #[serde(rename = "type")]
    pub kind: ConversationKind,
    /// Display name (group conversations)
    #[serde(default)]
    pub name: Option<String>,
    /// Creation timestamp
    #[serde(default)]
    pub created_at: Option<String>,
}

/// One row of the conversation list from GET /conversations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// Conversation identifier
    pub conversation_id: i64,
    /// Direct or group
    #[serde(rename = "type")]
    pub kind: ConversationKind,
    /// Display name (group conversations)
    #[serde(default)]
    pub name: Option<String>,
    /// The peer's user id (direct conversations only)
    #[serde(default)]
    pub other_user_id: Option<i64>,
    /// The peer's display name (direct conversations only)
    #[serde(default)]
    pub other_display_name: Option<String>,
    /// Last-activity timestamp
    #[serde(default)]
    pub last_message_at: Option<String>,
}

/// A chat message
///
/// `id` is assigned by the backend, monotonically increasing, and serves as
/// both the sort key and the dedup key for the loaded window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    /// Message identifier
    pub id: i64,
    /// Owning conversation
    pub conversation_id: i64,
    /// Sender's user id
    pub sender_user_id: i64,
    /// Message body text
    pub body: String,
    /// Sent timestamp
    pub sent_at: String,
    /// Edit timestamp, if edited
    #[serde(default)]
    pub edited_at: Option<String>,
    /// Deletion timestamp, if deleted
    #[serde(default)]
    pub deleted_at: Option<String>,
}

/// One row of GET /users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    /// User identifier
    pub id: i64,
    /// Login email
    pub email: String,
    /// Display name
    pub display_name: String,
    /// Whether the account is active
    #[serde(default)]
    pub is_active: Option<bool>,
    /// Creation timestamp
    #[serde(default)]
    pub created_at: Option<String>,
}

/// The authenticated user's identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthUser {
    /// User identifier
    pub id: i64,
    /// Display name
    pub display_name: String,
}

/// POST /login request body
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    /// Login email
    pub email: String,
    /// Password
    pub password: String,
}

/// POST /users request body
#[derive(Debug, Clone, Serialize)]
pub struct CreateUserRequest {
    /// Login email
    pub email: String,
    /// Password
    pub password: String,
    /// Display name
    pub display_name: String,
}

/// POST /login-events/client-info request body
#[derive(Debug, Clone, Serialize)]
pub struct LoginClientInfo {
    /// The client's public IP address
    pub ip_address: String,
    /// The user the login event belongs to
    pub user_id: i64,
}

/// Note workflow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteStatus {
    /// Newly created
    Open,
    /// Being worked on
    InProgress,
    /// Finished
    Done,
    /// Any status this client doesn't know yet
    #[serde(other)]
    Other,
}

/// A note attached to a user, optionally referencing a product
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    /// Note identifier
    pub id: i64,
    /// Owning user
    pub user_id: i64,
    /// Referenced product, if any
    #[serde(default)]
    pub product_id: Option<i64>,
    /// Title
    pub title: String,
    /// Body text
    #[serde(default)]
    pub body: Option<String>,
    /// Workflow status
    pub status: NoteStatus,
    /// Creation timestamp
    pub created_at: String,
    /// Last-update timestamp
    pub updated_at: String,
}

/// One row of GET /products
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Product identifier
    pub id: i64,
    /// Product name
    pub name: String,
    /// Stock-keeping unit
    #[serde(default)]
    pub sku: Option<String>,
    /// Unit price
    pub price: f64,
    /// Creation timestamp
    #[serde(default)]
    pub created_at: Option<String>,
}
