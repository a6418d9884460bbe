//! REST client
//!
//! Thin typed wrapper over the backend's REST surface. Every call attaches
//! the bearer token when one is held, funnels response bodies through the
//! shape normalizer, and maps failures to crate errors. A 401 clears the
//! local session (forced logout) before surfacing as `Error::Unauthorized`.

use crate::api::decode;
use crate::api::types::{
    AuthUser, ChatMessage, Conversation, ConversationSummary, CreateUserRequest, LoginClientInfo,
    LoginRequest, Note, NoteStatus, OnlineUser, Product, UserSummary,
};
use crate::auth::AuthStore;
use crate::config::Config;
use crate::{Error, Result};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info};

/// Public IP lookup service used for login telemetry
const PUBLIC_IP_SERVICE: &str = "https://api.ipify.org?format=json";

/// REST API client
///
/// Constructed from the runtime [`Config`] and a shared [`AuthStore`]; both
/// the base URL and the credential source are explicit values, not globals.
/// Cloning is cheap and clones share the underlying connection pool.
///
/// # Example
/// ```rust,no_run
/// use hubchat::api::ApiClient;
/// use hubchat::auth::AuthStore;
/// use hubchat::config::Config;
///
/// # async fn example() -> hubchat::Result<()> {
/// let config = Config::load("hubchat.json")?;
/// let auth = AuthStore::open(config.auth_state_path());
/// let api = ApiClient::new(&config, auth)?;
///
/// let online = api.online_users().await?;
/// println!("{} users online", online.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ApiClient {
    /// Shared HTTP client
    http: reqwest::Client,
    /// API base URL without trailing slash
    base_url: String,
    /// Credential source, shared with the hub layer
    auth: AuthStore,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(config: &Config, auth: AuthStore) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    /// The auth store this client writes login results into
    pub fn auth(&self) -> &AuthStore {
        &self.auth
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.auth.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Map the response status, clearing the session on 401
    async fn check(&self, response: Response) -> Result<Response> {
        if response.status() == StatusCode::UNAUTHORIZED {
            info!("Server returned 401, clearing local session");
            self.auth.logout();
            return Err(Error::Unauthorized);
        }

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Api(format!(
                "{} failed with status {}",
                response.url().path(),
                status
            )));
        }

        Ok(response)
    }

    async fn get_value(&self, path: &str) -> Result<Value> {
        let response = self.authorize(self.http.get(self.url(path))).send().await?;
        let response = self.check(response).await?;
        Ok(response.json().await?)
    }

    async fn post_value<B: serde::Serialize>(&self, path: &str, body: &B) -> Result<Value> {
        let response = self
            .authorize(self.http.post(self.url(path)).json(body))
            .send()
            .await?;
        let response = self.check(response).await?;
        Ok(response.json().await?)
    }

    async fn post_unit<B: serde::Serialize>(&self, path: &str, body: &B) -> Result<()> {
        let response = self
            .authorize(self.http.post(self.url(path)).json(body))
            .send()
            .await?;
        self.check(response).await?;
        Ok(())
    }

    async fn put_value<B: serde::Serialize>(&self, path: &str, body: &B) -> Result<Value> {
        let response = self
            .authorize(self.http.put(self.url(path)).json(body))
            .send()
            .await?;
        let response = self.check(response).await?;
        Ok(response.json().await?)
    }

    /// Log in with email and password
    ///
    /// On success the bearer token and the unwrapped user identity (the
    /// response nests it under `data`) are written to the auth store; a
    /// response without a token clears any stale one. Returns the identity
    /// when the response carried one.
    pub async fn login(&self, email: &str, password: &str) -> Result<Option<AuthUser>> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let value = self.post_value("/login", &body).await?;

        self.auth.mark_logged_in();

        let user: Option<AuthUser> = value.get("data").cloned().and_then(decode::item);
        if let Some(user) = &user {
            self.auth.set_user(user);
        }

        match value.get("token").and_then(Value::as_str) {
            Some(token) => self.auth.set_token(token),
            None => self.auth.clear_token(),
        }

        info!("Logged in as {:?}", user.as_ref().map(|u| u.id));
        Ok(user)
    }

    /// Report client info (public IP) for a login event, best-effort telemetry
    pub async fn send_login_client_info(&self, info: &LoginClientInfo) -> Result<()> {
        self.post_unit("/login-events/client-info", info).await
    }

    /// Look up the client's public IP via an external echo service
    pub async fn fetch_public_ip(&self) -> Result<String> {
        let response = self.http.get(PUBLIC_IP_SERVICE).send().await?;
        let value: Value = response.json().await?;

        value
            .get("ip")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::Api("Public IP service returned an unexpected body".to_string()))
    }

    /// Register a new user
    pub async fn create_user(&self, request: &CreateUserRequest) -> Result<()> {
        self.post_unit("/users", request).await
    }

    /// Fetch the full user roster
    pub async fn users(&self) -> Result<Vec<UserSummary>> {
        Ok(decode::list(self.get_value("/users").await?))
    }

    /// Fetch a single user by id
    pub async fn user_by_id(&self, id: i64) -> Result<Option<UserSummary>> {
        Ok(decode::item(self.get_value(&format!("/users/{}", id)).await?))
    }

    /// Update a user's display name
    pub async fn update_display_name(&self, id: i64, display_name: &str) -> Result<Option<UserSummary>> {
        let value = self
            .put_value(
                &format!("/users/{}/display-name", id),
                &json!({ "display_name": display_name }),
            )
            .await?;
        Ok(decode::item(value))
    }

    /// Activate or deactivate a user
    pub async fn update_active_status(&self, id: i64, is_active: bool) -> Result<Option<UserSummary>> {
        let value = self
            .put_value(
                &format!("/users/{}/is-active", id),
                &json!({ "is_active": is_active }),
            )
            .await?;
        Ok(decode::item(value))
    }

    /// Fetch the online roster
    pub async fn online_users(&self) -> Result<Vec<OnlineUser>> {
        Ok(decode::list(self.get_value("/presence/online").await?))
    }

    /// Fetch the conversation list
    pub async fn conversations(&self) -> Result<Vec<ConversationSummary>> {
        Ok(decode::list(self.get_value("/conversations").await?))
    }

    /// Create (or fetch the existing) direct conversation with another user
    pub async fn create_direct_conversation(&self, other_user_id: i64) -> Result<Conversation> {
        let body = json!({
            "type": "direct",
            "participant_user_ids": [other_user_id],
        });
        let value = self.post_value("/conversations", &body).await?;

        decode::item(value).ok_or_else(|| Error::Api("Empty conversation response".to_string()))
    }

    /// Add a participant to a conversation
    pub async fn add_participant(&self, conversation_id: i64, user_id: i64) -> Result<()> {
        self.post_unit(
            &format!("/conversations/{}/participants", conversation_id),
            &json!({ "user_id": user_id }),
        )
        .await
    }

    /// Fetch a page of message history for a conversation
    ///
    /// With `before_id` set, the page contains messages strictly older than
    /// that identifier; without it, the most recent page. `limit` caps the
    /// page size. The returned batch is in whatever order the backend picked;
    /// callers run it through the window reconciler.
    pub async fn messages(
        &self,
        conversation_id: i64,
        before_id: Option<i64>,
        limit: usize,
    ) -> Result<Vec<ChatMessage>> {
        let mut request = self
            .http
            .get(self.url(&format!("/conversations/{}/messages", conversation_id)));
        if let Some(before_id) = before_id {
            request = request.query(&[("beforeId", before_id.to_string())]);
        }
        if limit > 0 {
            request = request.query(&[("limit", limit.to_string())]);
        }

        let response = self.authorize(request).send().await?;
        let response = self.check(response).await?;
        let value: Value = response.json().await?;

        debug!(
            "Fetched message page for conversation {} (before_id: {:?})",
            conversation_id, before_id
        );
        Ok(decode::list(value))
    }

    /// Mark a conversation read up to the given message id
    pub async fn mark_read(&self, conversation_id: i64, last_message_id: Option<i64>) -> Result<()> {
        let body = match last_message_id {
            Some(id) => json!({ "message_id": id }),
            None => json!({}),
        };
        self.post_unit(&format!("/conversations/{}/read", conversation_id), &body)
            .await
    }

    /// Fetch the notes attached to a user
    pub async fn notes_for_user(&self, user_id: i64) -> Result<Vec<Note>> {
        Ok(decode::list_or_single(
            self.get_value(&format!("/notes/{}", user_id)).await?,
        ))
    }

    /// Update a note's workflow status
    pub async fn update_note_status(&self, note_id: i64, status: NoteStatus) -> Result<Option<Note>> {
        let value = self
            .put_value(&format!("/notes/{}/status", note_id), &json!({ "status": status }))
            .await?;
        Ok(decode::item(value))
    }

    /// Fetch the product catalog
    pub async fn products(&self) -> Result<Vec<Product>> {
        Ok(decode::list(self.get_value("/products").await?))
    }
}
