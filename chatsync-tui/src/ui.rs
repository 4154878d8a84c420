//! UI rendering for the TUI.

use chatsync_core::sync::{Notice, TranscriptSource};
use chatsync_core::Message;
use chrono::{DateTime, Local, Utc};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{
        Block, BorderType, Borders, Cell, Paragraph, Row, Scrollbar, ScrollbarOrientation,
        ScrollbarState, Table, Wrap,
    },
    Frame,
};

use crate::app::{App, Tab, ViewMode};
use crate::chat_row::{chat_updated, favorite_marker, favorite_updated, short_id};

/// Favorite star color
const STAR_COLOR: Color = Color::Rgb(255, 215, 0);
/// Separator line color
const SEPARATOR_COLOR: Color = Color::Rgb(60, 60, 60);
/// Border color for Messages block
const BORDER_MESSAGES: Color = Color::Rgb(80, 160, 80);
/// Border color for read-only favorite snapshots
const BORDER_SNAPSHOT: Color = Color::Rgb(180, 100, 180);

/// Render the application UI.
pub fn render(frame: &mut Frame, app: &mut App) {
    match app.view_mode {
        ViewMode::List => render_list_view(frame, app),
        ViewMode::Transcript => render_transcript_view(frame, app),
    }
}

/// Render the list view (tab header, table, footer).
fn render_list_view(frame: &mut Frame, app: &mut App) {
    let area = frame.area();

    let chunks = Layout::vertical([
        Constraint::Length(2), // Tab header
        Constraint::Min(5),    // Table
        Constraint::Length(1), // Footer
    ])
    .split(area);

    render_tab_header(frame, app.tab, chunks[0]);
    match app.tab {
        Tab::Chats => render_chat_table(frame, app, chunks[1]),
        Tab::Favorites => render_favorites_table(frame, app, chunks[1]),
    }
    render_list_footer(frame, app, chunks[2]);
}

/// Render the tab bar header with Chats and Favorites tabs.
fn render_tab_header(frame: &mut Frame, active: Tab, area: Rect) {
    let chunks = Layout::horizontal([
        Constraint::Length(11), // App name
        Constraint::Min(1),     // Tabs
    ])
    .split(area);

    let app_name = Paragraph::new(" chatsync").style(Style::default().fg(Color::Cyan).bold());
    frame.render_widget(app_name, chunks[0]);

    let active_style = Style::default()
        .fg(Color::Cyan)
        .bold()
        .add_modifier(Modifier::UNDERLINED);
    let inactive_style = Style::default().fg(Color::DarkGray);
    let style_for = |tab: Tab| {
        if tab == active {
            active_style
        } else {
            inactive_style
        }
    };

    let tabs = Line::from(vec![
        Span::styled(" Chats ", style_for(Tab::Chats)),
        Span::styled("  ", Style::default()),
        Span::styled(" Favorites ", style_for(Tab::Favorites)),
    ]);

    let tabs_para = Paragraph::new(tabs).block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(tabs_para, chunks[1]);
}

fn header_row(titles: &[&'static str]) -> Row<'static> {
    let cells = titles
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).bold()));
    Row::new(cells).height(1)
}

fn highlight_style() -> Style {
    Style::default()
        .add_modifier(Modifier::REVERSED)
        .fg(Color::Cyan)
}

fn render_chat_table(frame: &mut Frame, app: &mut App, area: Rect) {
    let header = header_row(&["★", "Title", "Created", "Chat ID"]);

    let rows = app.lists.chats.rows().iter().map(|row| {
        let star_style = if row.favorite.is_pending() {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default().fg(STAR_COLOR)
        };
        Row::new([
            Cell::from(favorite_marker(row.favorite)).style(star_style),
            Cell::from(row.summary.title.clone()),
            Cell::from(chat_updated(row)),
            Cell::from(short_id(row.summary.chat_id.as_str()))
                .style(Style::default().fg(Color::DarkGray)),
        ])
    });

    let widths = [
        Constraint::Length(3),  // Star
        Constraint::Fill(1),    // Title (flexible)
        Constraint::Length(12), // Created
        Constraint::Length(10), // Chat ID
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .title(" Chats "),
        )
        .row_highlight_style(highlight_style())
        .highlight_symbol("▶ ");

    frame.render_stateful_widget(table, area, &mut app.chat_table);
}

fn render_favorites_table(frame: &mut Frame, app: &mut App, area: Rect) {
    let header = header_row(&["Title", "Owner", "Msgs", "Created"]);

    let rows = app.lists.favorites.rows().iter().map(|row| {
        Row::new([
            Cell::from(row.title.clone()),
            Cell::from(short_id(&row.owner)).style(Style::default().fg(Color::DarkGray)),
            Cell::from(row.message_count.to_string()),
            Cell::from(favorite_updated(row)),
        ])
    });

    let widths = [
        Constraint::Fill(1),    // Title (flexible)
        Constraint::Length(10), // Owner
        Constraint::Length(6),  // Msgs
        Constraint::Length(12), // Created
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .title(" Favorites "),
        )
        .row_highlight_style(highlight_style())
        .highlight_symbol("▶ ");

    frame.render_stateful_widget(table, area, &mut app.favorites_table);
}

fn render_list_footer(frame: &mut Frame, app: &App, area: Rect) {
    let (count, noun) = match app.tab {
        Tab::Chats => (app.lists.chats.rows().len(), "chats"),
        Tab::Favorites => (app.lists.favorites.len(), "favorites"),
    };

    let mut spans = vec![
        Span::styled(" Tab", Style::default().fg(Color::Yellow)),
        Span::raw(" switch  "),
        Span::styled("Enter", Style::default().fg(Color::Yellow)),
        Span::raw(" open  "),
    ];
    if app.tab == Tab::Chats {
        spans.push(Span::styled("f", Style::default().fg(Color::Yellow)));
        spans.push(Span::raw(" favorite  "));
    }
    spans.extend([
        Span::styled("r", Style::default().fg(Color::Yellow)),
        Span::raw(" refresh  "),
        Span::styled("j/k", Style::default().fg(Color::Yellow)),
        Span::raw(" navigate  "),
        Span::styled("q", Style::default().fg(Color::Yellow)),
        Span::raw(" quit  "),
        Span::raw("│ "),
        Span::styled(
            format!("{} {}", count, noun),
            Style::default().fg(Color::DarkGray),
        ),
    ]);
    push_notice(&mut spans, app.notice());

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn push_notice(spans: &mut Vec<Span<'static>>, notice: Option<&Notice>) {
    let Some(notice) = notice else {
        return;
    };
    let color = if notice.is_error() {
        Color::Red
    } else {
        Color::Green
    };
    spans.push(Span::raw(" │ "));
    spans.push(Span::styled(
        notice.message(),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    ));
}

/// Render the transcript view.
fn render_transcript_view(frame: &mut Frame, app: &mut App) {
    let area = frame.area();

    let chunks = Layout::vertical([
        Constraint::Length(2), // Header
        Constraint::Min(5),    // Messages
        Constraint::Length(1), // Footer
    ])
    .split(area);

    let (title, read_only) = match &app.transcript {
        Some(t) => (
            t.title.clone(),
            matches!(t.source, TranscriptSource::Favorite(_)),
        ),
        None => ("Loading…".to_string(), false),
    };
    let header = Paragraph::new(format!(" {}", title))
        .style(Style::default().fg(Color::Cyan).bold())
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    render_messages(frame, app, chunks[1], read_only);
    render_transcript_footer(frame, app, chunks[2]);
}

fn render_messages(frame: &mut Frame, app: &mut App, area: Rect, read_only: bool) {
    let mut lines: Vec<Line> = Vec::new();
    let messages: &[Message] = app
        .transcript
        .as_ref()
        .map(|t| t.messages.as_slice())
        .unwrap_or(&[]);
    let total = messages.len();

    for (idx, msg) in messages.iter().enumerate() {
        if idx > 0 {
            lines.push(Line::from(Span::styled(
                "─".repeat(40),
                Style::default().fg(SEPARATOR_COLOR),
            )));
        }
        lines.extend(format_message(msg, idx + 1, total));
        lines.push(Line::raw(""));
    }

    // Clamp scroll offset
    let max_scroll = lines.len().saturating_sub(area.height as usize);
    if app.scroll_offset > max_scroll {
        app.scroll_offset = max_scroll;
    }

    let (border, label) = if read_only {
        (BORDER_SNAPSHOT, " Favorite snapshot ")
    } else {
        (BORDER_MESSAGES, " Messages ")
    };

    let line_count = lines.len();
    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(border))
                .title(label)
                .title_style(Style::default().fg(border).bold()),
        )
        .wrap(Wrap { trim: false })
        .scroll((app.scroll_offset as u16, 0));

    frame.render_widget(paragraph, area);

    let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
        .begin_symbol(Some("↑"))
        .end_symbol(Some("↓"));
    let mut scrollbar_state = ScrollbarState::new(line_count).position(app.scroll_offset);

    frame.render_stateful_widget(
        scrollbar,
        area.inner(ratatui::layout::Margin {
            vertical: 1,
            horizontal: 0,
        }),
        &mut scrollbar_state,
    );
}

/// Format a single message into display lines.
fn format_message(msg: &Message, index: usize, total: usize) -> Vec<Line<'static>> {
    let (label, style) = if msg.is_user {
        ("You", Style::default().fg(Color::Cyan).bold())
    } else if msg.text.starts_with("Error: ") {
        ("Error", Style::default().fg(Color::Red))
    } else {
        ("Assistant", Style::default().fg(Color::Green))
    };

    let mut lines = vec![Line::from(vec![
        Span::styled(label, style),
        Span::styled(
            format!(" [{}/{}]  ", index, total),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(format_message_time(msg.sent_at), Style::default().fg(Color::DarkGray)),
    ])];

    for line in msg.text.lines() {
        lines.push(Line::from(Span::raw(format!("  {}", line))));
    }
    lines
}

fn format_message_time(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%b %d %H:%M").to_string()
}

fn render_transcript_footer(frame: &mut Frame, app: &App, area: Rect) {
    let count = app.transcript.as_ref().map_or(0, |t| t.messages.len());

    let mut spans = vec![
        Span::styled(" Esc", Style::default().fg(Color::Yellow)),
        Span::raw(" back  "),
        Span::styled("j/k", Style::default().fg(Color::Yellow)),
        Span::raw(" scroll  "),
        Span::styled("g", Style::default().fg(Color::Yellow)),
        Span::raw(" top  "),
        Span::raw("│ "),
        Span::styled(
            format!("{} messages", count),
            Style::default().fg(Color::DarkGray),
        ),
    ];
    push_notice(&mut spans, app.notice());

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
