use crate::api::ApiClient;
use crate::api::types::AuthUser;
use crate::auth::AuthStore;
use crate::config::Config;
use crate::session::ChatSession;
use crate::tests::support::fake_hub;
use crate::tui::{App, Pane};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use wiremock::MockServer;

async fn app_fixture(server: &MockServer) -> (App, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let auth = AuthStore::open(dir.path().join("auth_state.json"));

    let mut config = Config::default();
    config.api_url = server.uri();

    let api = ApiClient::new(&config, auth).expect("Failed to build client");
    let (hub, _connector, _ends) = fake_hub();

    let session = ChatSession::new(api, hub, &config);
    let app = App::new(
        session,
        Some(AuthUser {
            id: 1,
            display_name: "Me".to_string(),
        }),
    );
    (app, dir)
}

fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
}

#[tokio::test]
async fn test_tab_cycles_panes() {
    let server = MockServer::start().await;
    let (mut app, _dir) = app_fixture(&server).await;

    assert_eq!(app.focus, Pane::Conversations);
    app.handle_key(key(KeyCode::Tab)).await;
    assert_eq!(app.focus, Pane::Online);
    app.handle_key(key(KeyCode::Tab)).await;
    assert_eq!(app.focus, Pane::Input);
    app.handle_key(key(KeyCode::Tab)).await;
    assert_eq!(app.focus, Pane::Conversations);
}

#[tokio::test]
async fn test_input_editing() {
    let server = MockServer::start().await;
    let (mut app, _dir) = app_fixture(&server).await;
    app.focus = Pane::Input;

    app.handle_key(key(KeyCode::Char('h'))).await;
    app.handle_key(key(KeyCode::Char('i'))).await;
    assert_eq!(app.input, "hi");

    app.handle_key(key(KeyCode::Backspace)).await;
    assert_eq!(app.input, "h");

    app.handle_key(key(KeyCode::Esc)).await;
    assert_eq!(app.focus, Pane::Conversations);
    assert_eq!(app.input, "h");
}

#[tokio::test]
async fn test_enter_on_blank_input_clears_buffer_without_error() {
    let server = MockServer::start().await;
    let (mut app, _dir) = app_fixture(&server).await;
    app.focus = Pane::Input;

    app.handle_key(key(KeyCode::Char(' '))).await;
    app.handle_key(key(KeyCode::Enter)).await;

    assert!(app.input.is_empty());
    assert!(app.session.messages_error.is_none());
}

#[tokio::test]
async fn test_quit_keys() {
    let server = MockServer::start().await;
    let (mut app, _dir) = app_fixture(&server).await;

    app.handle_key(key(KeyCode::Char('q'))).await;
    assert!(app.should_quit);

    let (mut app, _dir) = app_fixture(&server).await;
    app.focus = Pane::Input;
    // 'q' types into the input instead of quitting
    app.handle_key(key(KeyCode::Char('q'))).await;
    assert!(!app.should_quit);
    assert_eq!(app.input, "q");

    // Ctrl+C quits from any pane
    app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)).await;
    assert!(app.should_quit);
}

#[tokio::test]
async fn test_selection_stays_in_bounds_on_empty_lists() {
    let server = MockServer::start().await;
    let (mut app, _dir) = app_fixture(&server).await;

    app.handle_key(key(KeyCode::Down)).await;
    app.handle_key(key(KeyCode::Down)).await;
    assert_eq!(app.conversation_index, 0);

    // Enter on an empty list is a no-op
    app.handle_key(key(KeyCode::Enter)).await;
    assert!(app.session.active_conversation_id.is_none());
}
