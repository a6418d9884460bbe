//! Hubchat TUI (Terminal User Interface)
//!
//! A terminal client for the hub-based chat service: logs in, connects the
//! push channel, and drives the chat session from a single event loop.

use anyhow::Context;
use crossterm::{
    event::{Event, EventStream, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures_util::StreamExt;
use hubchat::api::ApiClient;
use hubchat::api::types::LoginClientInfo;
use hubchat::auth::AuthStore;
use hubchat::config::Config;
use hubchat::hub::{HubClient, HubEvent, TokenSupplier};
use hubchat::session::ChatSession;
use hubchat::tui::{App, ui};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path =
        std::env::var("HUBCHAT_CONFIG").unwrap_or_else(|_| "hubchat.json".to_string());
    let config = Config::load(&config_path)?;

    let auth = AuthStore::open(config.auth_state_path());
    let api = ApiClient::new(&config, auth.clone())?;

    if !auth.is_logged_in() {
        let email = std::env::var("HUBCHAT_EMAIL")
            .context("No stored session; set HUBCHAT_EMAIL and HUBCHAT_PASSWORD to log in")?;
        let password = std::env::var("HUBCHAT_PASSWORD").context("HUBCHAT_PASSWORD not set")?;

        api.login(&email, &password).await?;
        report_login_client_info(&api, &auth);
    }

    // The hub reads a fresh token per (re)connect attempt.
    let supplier: TokenSupplier = {
        let auth = auth.clone();
        Arc::new(move || auth.token())
    };
    let hub = HubClient::new(&config.hub_url(), supplier);
    let mut hub_events = hub.subscribe();

    let mut session = ChatSession::new(api.clone(), hub.clone(), &config);
    if let Some(user) = auth.current_user() {
        session.set_current_user(user.id);
    }

    match api.users().await {
        Ok(users) => session.set_roster(users),
        Err(e) => eprintln!("Warning: failed to load user roster: {}", e),
    }

    let mut connect_error = None;
    if let Err(e) = hub.ensure_connection().await {
        connect_error = Some(format!("Chat connection failed: {}", e));
    }
    let keepalive = hub.start_keepalive(Duration::from_secs(config.ping_interval_secs));

    session.refresh_conversations().await;
    session.refresh_online_users(false).await;
    if session.online_error.is_none() {
        session.online_error = connect_error;
    }

    let mut app = App::new(session, auth.current_user());

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app, &mut hub_events, &config).await;

    keepalive.abort();

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = &res {
        println!("Error: {:?}", err);
    }

    res
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    hub_events: &mut broadcast::Receiver<HubEvent>,
    config: &Config,
) -> anyhow::Result<()> {
    let mut input_events = EventStream::new();

    let mut presence = tokio::time::interval(Duration::from_secs(config.presence_poll_secs));
    presence.tick().await; // the first tick fires immediately; skip it

    loop {
        terminal.draw(|f| ui(f, app))?;

        if app.should_quit {
            return Ok(());
        }

        tokio::select! {
            maybe_event = input_events.next() => match maybe_event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    app.handle_key(key).await;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(()),
            },
            event = hub_events.recv() => match event {
                Ok(event) => app.on_hub_event(event).await,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    app.session.messages_error =
                        Some(format!("Dropped {} pushed events, refresh to catch up", skipped));
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            },
            _ = presence.tick() => {
                app.session.refresh_online_users(true).await;
                app.session.refresh_conversations().await;
            }
        }
    }
}

/// Best-effort login telemetry: public IP lookup + client-info event
fn report_login_client_info(api: &ApiClient, auth: &AuthStore) {
    let Some(user) = auth.current_user() else {
        return;
    };

    let api = api.clone();
    tokio::spawn(async move {
        let ip = match api.fetch_public_ip().await {
            Ok(ip) => ip,
            Err(e) => {
                tracing::debug!("Public IP lookup failed: {}", e);
                return;
            }
        };
        let info = LoginClientInfo {
            ip_address: ip,
            user_id: user.id,
        };
        if let Err(e) = api.send_login_client_info(&info).await {
            tracing::debug!("Failed to report login client info: {}", e);
        }
    });
}
