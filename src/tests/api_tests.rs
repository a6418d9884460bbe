use crate::Error;
use crate::api::ApiClient;
use crate::api::types::NoteStatus;
use crate::auth::AuthStore;
use crate::config::Config;
use chrono::Utc;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn client_against(server: &MockServer) -> (ApiClient, AuthStore, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let auth = AuthStore::open(dir.path().join("auth_state.json"));

    let mut config = Config::default();
    config.api_url = server.uri();

    let api = ApiClient::new(&config, auth.clone()).expect("Failed to build client");
    (api, auth, dir)
}

fn valid_token() -> String {
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    let payload =
        URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{}}}"#, Utc::now().timestamp() + 3600).as_bytes());
    format!("h.{}.s", payload)
}

#[tokio::test]
async fn test_login_stores_token_and_user() {
    let server = MockServer::start().await;
    let (api, auth, _dir) = client_against(&server).await;
    let token = valid_token();

    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_json(json!({ "email": "a@b.c", "password": "pw" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": token,
            "data": { "id": 7, "display_name": "Alice" },
        })))
        .expect(1)
        .mount(&server)
        .await;

    let user = api.login("a@b.c", "pw").await.expect("Login failed");

    assert_eq!(user.map(|u| u.id), Some(7));
    assert_eq!(auth.token(), Some(token));
    assert!(auth.is_logged_in());
    assert_eq!(auth.current_user().map(|u| u.display_name), Some("Alice".to_string()));
}

#[tokio::test]
async fn test_login_without_token_clears_stale_one() {
    let server = MockServer::start().await;
    let (api, auth, _dir) = client_against(&server).await;
    auth.set_token("stale");

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": {} })))
        .mount(&server)
        .await;

    api.login("a@b.c", "pw").await.expect("Login failed");
    assert!(auth.token().is_none());
}

#[tokio::test]
async fn test_bearer_token_is_attached() {
    let server = MockServer::start().await;
    let (api, auth, _dir) = client_against(&server).await;
    auth.set_token("tok-123");

    Mock::given(method("GET"))
        .and(path("/presence/online"))
        .and(header("authorization", "Bearer tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "user_id": 1 },
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let online = api.online_users().await.expect("Request failed");
    assert_eq!(online.len(), 1);
}

#[tokio::test]
async fn test_unauthorized_clears_session() {
    let server = MockServer::start().await;
    let (api, auth, _dir) = client_against(&server).await;
    auth.set_token("tok-123");
    auth.mark_logged_in();

    Mock::given(method("GET"))
        .and(path("/presence/online"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = api.online_users().await;

    assert!(matches!(result, Err(Error::Unauthorized)));
    assert!(auth.token().is_none());
    assert!(!auth.is_logged_in());
}

#[tokio::test]
async fn test_messages_pagination_query() {
    let server = MockServer::start().await;
    let (api, _auth, _dir) = client_against(&server).await;

    Mock::given(method("GET"))
        .and(path("/conversations/7/messages"))
        .and(query_param("beforeId", "42"))
        .and(query_param("limit", "30"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messages": [
                { "id": 40, "conversation_id": 7, "sender_user_id": 1, "body": "x", "sent_at": "t" },
            ],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = api.messages(7, Some(42), 30).await.expect("Request failed");
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id, 40);
}

#[tokio::test]
async fn test_messages_reset_load_omits_cursor() {
    let server = MockServer::start().await;
    let (api, _auth, _dir) = client_against(&server).await;

    Mock::given(method("GET"))
        .and(path("/conversations/7/messages"))
        .and(query_param_is_missing("beforeId"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let page = api.messages(7, None, 30).await.expect("Request failed");
    assert!(page.is_empty());
}

#[tokio::test]
async fn test_create_direct_conversation_unwraps_data() {
    let server = MockServer::start().await;
    let (api, _auth, _dir) = client_against(&server).await;

    Mock::given(method("POST"))
        .and(path("/conversations"))
        .and(body_json(json!({ "type": "direct", "participant_user_ids": [5] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "id": 11, "type": "direct", "name": null },
        })))
        .mount(&server)
        .await;

    let conversation = api.create_direct_conversation(5).await.expect("Request failed");
    assert_eq!(conversation.id, 11);
}

#[tokio::test]
async fn test_empty_conversation_response_is_an_error() {
    let server = MockServer::start().await;
    let (api, _auth, _dir) = client_against(&server).await;

    Mock::given(method("POST"))
        .and(path("/conversations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(null)))
        .mount(&server)
        .await;

    assert!(api.create_direct_conversation(5).await.is_err());
}

#[tokio::test]
async fn test_mark_read_posts_message_id() {
    let server = MockServer::start().await;
    let (api, _auth, _dir) = client_against(&server).await;

    Mock::given(method("POST"))
        .and(path("/conversations/7/read"))
        .and(body_json(json!({ "message_id": 99 })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    api.mark_read(7, Some(99)).await.expect("Request failed");
}

#[tokio::test]
async fn test_notes_singleton_response() {
    let server = MockServer::start().await;
    let (api, _auth, _dir) = client_against(&server).await;

    Mock::given(method("GET"))
        .and(path("/notes/4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "id": 1, "user_id": 4, "product_id": null, "title": "t", "body": null,
                "status": "in_progress", "created_at": "c", "updated_at": "u",
            },
        })))
        .mount(&server)
        .await;

    let notes = api.notes_for_user(4).await.expect("Request failed");
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].status, NoteStatus::InProgress);
}

#[tokio::test]
async fn test_products_are_data_wrapped() {
    let server = MockServer::start().await;
    let (api, _auth, _dir) = client_against(&server).await;

    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [ { "id": 1, "name": "Widget", "sku": "W-1", "price": 9.5, "created_at": "c" } ],
        })))
        .mount(&server)
        .await;

    let products = api.products().await.expect("Request failed");
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].name, "Widget");
}

#[tokio::test]
async fn test_server_error_maps_to_api_error() {
    let server = MockServer::start().await;
    let (api, _auth, _dir) = client_against(&server).await;

    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    assert!(matches!(api.products().await, Err(Error::Api(_))));
}

#[tokio::test]
async fn test_update_note_status() {
    let server = MockServer::start().await;
    let (api, _auth, _dir) = client_against(&server).await;

    Mock::given(method("PUT"))
        .and(path("/notes/3/status"))
        .and(body_json(json!({ "status": "done" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 3, "user_id": 4, "product_id": null, "title": "t", "body": null,
            "status": "done", "created_at": "c", "updated_at": "u2",
        })))
        .mount(&server)
        .await;

    let note = api.update_note_status(3, NoteStatus::Done).await.expect("Request failed");
    assert_eq!(note.map(|n| n.status), Some(NoteStatus::Done));
}
