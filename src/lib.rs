//! Hubchat - client for the hub-based workplace chat service
//!
//! This library provides the client side of the chat service: a REST client
//! for conversations, messages, presence and the surrounding admin endpoints,
//! plus a persistent push-channel connection for live message delivery and
//! the session state that reconciles the two.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod auth;
pub mod config;
pub mod hub;
pub mod session;
pub mod tui;

/// Result type alias for hubchat operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for hubchat operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration load/save error
    #[error("Config error: {0}")]
    Config(String),

    /// Auth state persistence error
    #[error("Auth error: {0}")]
    Auth(String),

    /// REST API error (non-success status, unexpected body)
    #[error("API error: {0}")]
    Api(String),

    /// The server rejected the request with 401; the local session was cleared
    #[error("Unauthorized")]
    Unauthorized,

    /// Push channel error
    #[error("Hub error: {0}")]
    Hub(String),

    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Initialize the hubchat library with logging
pub fn init() {
    tracing_subscriber::fmt::init();
}

#[cfg(test)]
mod tests;
