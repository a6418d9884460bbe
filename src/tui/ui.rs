//! UI rendering

use crate::session::format_time;
use crate::tui::app::{App, Pane};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};

/// Main UI rendering function
pub fn ui(f: &mut Frame, app: &App) {
    let size = f.size();

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(32), Constraint::Min(40)])
        .split(size);

    let sidebar = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(columns[0]);

    render_conversations(f, app, sidebar[0]);
    render_online_users(f, app, sidebar[1]);
    render_chat(f, app, columns[1]);
}

fn pane_block(title: &str, focused: bool) -> Block<'_> {
    let style = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    Block::default().borders(Borders::ALL).title(title.to_string()).border_style(style)
}

fn render_conversations(f: &mut Frame, app: &App, area: ratatui::layout::Rect) {
    let title = match &app.session.conversations_error {
        Some(err) => format!("Conversations - {}", err),
        None => "Conversations".to_string(),
    };

    let items: Vec<ListItem> = app
        .session
        .conversations
        .iter()
        .map(|convo| {
            let label = convo
                .name
                .clone()
                .or_else(|| convo.other_display_name.clone())
                .unwrap_or_else(|| format!("Conversation {}", convo.conversation_id));
            let active = app.session.active_conversation_id == Some(convo.conversation_id);
            let marker = if active { "* " } else { "  " };
            ListItem::new(format!("{}{}", marker, label))
        })
        .collect();

    let mut state = ListState::default();
    if !items.is_empty() {
        state.select(Some(app.conversation_index));
    }

    let list = List::new(items)
        .block(pane_block(&title, app.focus == Pane::Conversations))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    f.render_stateful_widget(list, area, &mut state);
}

fn render_online_users(f: &mut Frame, app: &App, area: ratatui::layout::Rect) {
    let title = match &app.session.online_error {
        Some(err) => format!("Online - {}", err),
        None => "Online".to_string(),
    };

    let items: Vec<ListItem> = app
        .session
        .online_users
        .iter()
        .map(|user| {
            ListItem::new(Line::from(vec![
                Span::styled(user.display_name.clone(), Style::default().fg(Color::Green)),
                Span::raw(format!("  {}", user.status_text)),
            ]))
        })
        .collect();

    let mut state = ListState::default();
    if !items.is_empty() {
        state.select(Some(app.online_index));
    }

    let list = List::new(items)
        .block(pane_block(&title, app.focus == Pane::Online))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    f.render_stateful_widget(list, area, &mut state);
}

fn render_chat(f: &mut Frame, app: &App, area: ratatui::layout::Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(5),    // Message window
            Constraint::Length(3), // Input line
            Constraint::Length(1), // Help line
        ])
        .split(area);

    render_messages(f, app, chunks[0]);
    render_input(f, app, chunks[1]);

    let help = Paragraph::new("Tab: switch pane | Enter: open/send | PgUp: older | r: refresh | q: quit")
        .style(Style::default().fg(Color::DarkGray));
    f.render_widget(help, chunks[2]);
}

fn render_messages(f: &mut Frame, app: &App, area: ratatui::layout::Rect) {
    let session = &app.session;

    let mut title = match &session.active_peer {
        Some(peer) => format!("Chat with {}", peer.display_name),
        None => "Chat".to_string(),
    };
    if session.has_more_messages {
        title.push_str(" (older available)");
    }
    if let Some(err) = &session.messages_error {
        title = format!("{} - {}", title, err);
    }

    if session.active_conversation_id.is_none() {
        let hint = Paragraph::new("Select a conversation or an online user to start chatting.")
            .style(Style::default().fg(Color::DarkGray))
            .block(pane_block(&title, false));
        f.render_widget(hint, area);
        return;
    }

    let visible_height = area.height.saturating_sub(2) as usize;
    let total = session.messages.len();
    // Bottom-anchored: offset counts rows scrolled up from the newest message.
    let end = total.saturating_sub(app.message_offset);
    let start = end.saturating_sub(visible_height);

    let own_id = session.current_user_id();
    let lines: Vec<ListItem> = session.messages[start..end]
        .iter()
        .map(|msg| {
            let mine = own_id == Some(msg.sender_user_id);
            let sender = if mine {
                "You".to_string()
            } else {
                session.display_name_for(msg.sender_user_id)
            };
            let sender_color = if mine { Color::Green } else { Color::Blue };

            let body = if msg.deleted_at.is_some() {
                "[deleted]".to_string()
            } else if msg.edited_at.is_some() {
                format!("{} (edited)", msg.body)
            } else {
                msg.body.clone()
            };

            ListItem::new(Line::from(vec![
                Span::styled(format!("{} ", format_time(&msg.sent_at)), Style::default().fg(Color::DarkGray)),
                Span::styled(format!("{}: ", sender), Style::default().fg(sender_color)),
                Span::raw(body),
            ]))
        })
        .collect();

    let list = List::new(lines).block(pane_block(&title, false));
    f.render_widget(list, area);
}

fn render_input(f: &mut Frame, app: &App, area: ratatui::layout::Rect) {
    let input = Paragraph::new(format!("> {}", app.input))
        .block(pane_block("Message", app.focus == Pane::Input));
    f.render_widget(input, area);
}
