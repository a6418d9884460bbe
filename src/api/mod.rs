//! REST API layer
//!
//! This module talks to the backend's REST surface:
//! - `types` - wire DTOs for the loosely-typed backend
//! - `decode` - response-shape normalization (the backend wraps payloads
//!   inconsistently)
//! - `client` - the reqwest-based client covering auth, presence,
//!   conversations, messages, users, notes and products

pub mod client;
pub mod decode;
pub mod types;

pub use client::ApiClient;
