//! Client-held auth state
//!
//! This module owns the bearer token and the persisted login session:
//! - Token storage with save-on-mutation persistence
//! - Local JWT expiry inspection (a UX optimization, not a security boundary)
//! - The logged-in flag and cached user identity shown in the UI
//!
//! Everything lives in one small JSON state file. Persistence failures are
//! logged and otherwise ignored; losing the cached session only means the
//! user logs in again.

use crate::api::types::AuthUser;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::warn;

/// Persisted auth session state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AuthState {
    /// Bearer token as issued by POST /login
    token: Option<String>,
    /// Cached user id from the last successful login
    user_id: Option<i64>,
    /// Cached display name from the last successful login
    display_name: Option<String>,
    /// Whether the user is considered logged in
    logged_in: bool,
}

/// Shared, persistent auth store
///
/// Cloneable handle over the auth session; every mutation is written back to
/// the state file. Designed to be shared between the REST client, the hub
/// token supplier, and the UI layer.
///
/// # Example
/// ```rust,no_run
/// use hubchat::auth::AuthStore;
///
/// let store = AuthStore::open("auth_state.json");
/// if store.is_logged_in() {
///     println!("Welcome back, {:?}", store.current_user());
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthStore {
    /// Shared session state
    state: Arc<RwLock<AuthState>>,
    /// Path to the state file for auto-save
    path: Arc<String>,
}

impl AuthStore {
    /// Open an auth store backed by the given state file
    ///
    /// Restores the persisted session if the file exists. A missing or
    /// unreadable file yields a clean logged-out state rather than an error.
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Self {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let state = Self::load_state(path.as_ref());

        Self {
            state: Arc::new(RwLock::new(state)),
            path: Arc::new(path_str),
        }
    }

    fn load_state(path: &std::path::Path) -> AuthState {
        if !path.exists() {
            return AuthState::default();
        }

        match std::fs::read_to_string(path) {
            Ok(data) if data.trim().is_empty() => AuthState::default(),
            Ok(data) => serde_json::from_str(&data).unwrap_or_else(|e| {
                warn!("Failed to parse auth state, starting logged out: {}", e);
                AuthState::default()
            }),
            Err(e) => {
                warn!("Failed to read auth state, starting logged out: {}", e);
                AuthState::default()
            }
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, AuthState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, AuthState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn save(&self, state: &AuthState) {
        let result = serde_json::to_string_pretty(state)
            .map_err(|e| e.to_string())
            .and_then(|json| std::fs::write(self.path.as_str(), json).map_err(|e| e.to_string()));

        if let Err(e) = result {
            warn!("Failed to persist auth state: {}", e);
        }
    }

    /// Get the stored bearer token, if any
    pub fn token(&self) -> Option<String> {
        self.read().token.clone()
    }

    /// Store a bearer token and persist
    pub fn set_token(&self, token: &str) {
        let mut state = self.write();
        state.token = Some(token.to_string());
        self.save(&state);
    }

    /// Clear the stored bearer token and persist
    pub fn clear_token(&self) {
        let mut state = self.write();
        state.token = None;
        self.save(&state);
    }

    /// Cache the logged-in user identity and persist
    pub fn set_user(&self, user: &AuthUser) {
        let mut state = self.write();
        state.user_id = Some(user.id);
        state.display_name = Some(user.display_name.clone());
        self.save(&state);
    }

    /// Get the cached user identity, if a login stored one
    pub fn current_user(&self) -> Option<AuthUser> {
        let state = self.read();
        match (state.user_id, state.display_name.clone()) {
            (Some(id), Some(display_name)) => Some(AuthUser { id, display_name }),
            _ => None,
        }
    }

    /// Mark the session as logged in and persist
    pub fn mark_logged_in(&self) {
        let mut state = self.write();
        state.logged_in = true;
        self.save(&state);
    }

    /// Clear the whole session: token, cached user, logged-in flag
    pub fn logout(&self) {
        let mut state = self.write();
        *state = AuthState::default();
        self.save(&state);
    }

    /// Whether the session counts as logged in
    ///
    /// An absent or expired token forces a logout and reports false, so a
    /// stale persisted session never survives a restart past its expiry.
    pub fn is_logged_in(&self) -> bool {
        let (logged_in, token) = {
            let state = self.read();
            (state.logged_in, state.token.clone())
        };

        match token {
            Some(token) if !is_token_expired(&token) => logged_in,
            _ => {
                self.logout();
                false
            }
        }
    }

    /// Check whether the given token (or the stored one) is expired
    ///
    /// Missing token, malformed token, or a payload without a numeric `exp`
    /// all count as expired.
    pub fn is_token_expired(&self, token: Option<&str>) -> bool {
        match token {
            Some(value) => is_token_expired(value),
            None => match self.token() {
                Some(value) => is_token_expired(&value),
                None => true,
            },
        }
    }
}

/// Inspect a JWT's `exp` claim against the current time
///
/// Decodes the middle segment of a three-part dot-delimited token as URL-safe
/// base64 and reads the numeric `exp` field (seconds since epoch). No
/// signature verification happens here; the server remains the authority.
pub fn is_token_expired(token: &str) -> bool {
    match decode_expiry(token) {
        Some(exp) => Utc::now().timestamp() >= exp,
        None => true,
    }
}

fn decode_expiry(token: &str) -> Option<i64> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return None;
    }

    // Tokens may or may not carry base64 padding; strip it before decoding.
    let payload = parts[1].trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;

    claims.get("exp")?.as_f64().map(|exp| exp as i64)
}
