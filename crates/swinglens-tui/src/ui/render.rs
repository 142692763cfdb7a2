use chrono::Utc;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph},
    Frame,
};

use swinglens_core::auth::GuardDecision;
use swinglens_core::config::AppKind;
use swinglens_core::models::ReviewQueueItem;
use swinglens_core::utils::{format_club_type, format_handicap, initials, time_ago, truncate_string};

use crate::app::{App, AppState, LoginFocus, LoginScreen, QueueState, PLAYER_HOME, QUEUE_EMPTY};

use super::styles;

/// Width of text inputs on the login screen
const FIELD_WIDTH: usize = 24;

pub fn render(frame: &mut Frame, app: &App) {
    match app.screen {
        GuardDecision::Pending => render_splash(frame),
        GuardDecision::RedirectToLogin => {
            if let Some(ref screen) = app.login {
                render_login(frame, app.kind(), screen);
            }
        }
        GuardDecision::Allow => render_home(frame, app),
    }

    if matches!(app.state, AppState::ConfirmingQuit) {
        render_quit_overlay(frame);
    }
}

fn logo_lines(subtitle: &str) -> Vec<Line<'static>> {
    vec![
        Line::from(Span::styled("   ╔═╗╦ ╦╦╔╗╔╔═╗  ╦  ╔═╗╔╗╔╔═╗", styles::title_style())),
        Line::from(Span::styled("   ╚═╗║║║║║║║║ ╦  ║  ║╣ ║║║╚═╗", styles::title_style())),
        Line::from(Span::styled("   ╚═╝╚╩╝╩╝╚╝╚═╝  ╩═╝╚═╝╝╚╝╚═╝", styles::title_style())),
        Line::from(Span::styled(format!("   {}", subtitle), styles::muted_style())),
    ]
}

fn render_splash(frame: &mut Frame) {
    let area = centered_rect_fixed(40, 7, frame.area());
    let mut lines = logo_lines("");
    lines.pop();
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("   Loading...", styles::muted_style())));
    frame.render_widget(Paragraph::new(lines), area);
}

fn input_line(label: &str, value: &str, focused: bool, masked: bool) -> Line<'static> {
    let style = if focused {
        styles::selected_style()
    } else {
        styles::list_item_style()
    };
    let shown: String = if masked {
        "*".repeat(value.chars().count().min(FIELD_WIDTH))
    } else {
        let count = value.chars().count();
        // Keep the tail visible while typing past the field width
        value.chars().skip(count.saturating_sub(FIELD_WIDTH)).collect()
    };
    let cursor = if focused { "▌" } else { " " };
    Line::from(vec![
        Span::styled(format!("   {:<9}[", label), styles::muted_style()),
        Span::styled(format!("{:<width$}{}", shown, cursor, width = FIELD_WIDTH), style),
        Span::styled("]", styles::muted_style()),
    ])
}

fn render_login(frame: &mut Frame, kind: AppKind, screen: &LoginScreen) {
    let mut lines = logo_lines(kind.display_name());
    lines.push(Line::from(""));

    if let Some(ref notice) = screen.notice {
        lines.push(Line::from(Span::styled(format!("   {}", notice), styles::highlight_style())));
        lines.push(Line::from(""));
    }

    let fields: &[(LoginFocus, &str, bool)] = match kind {
        AppKind::Coach => &[
            (LoginFocus::Email, "Email:", false),
            (LoginFocus::Password, "Password:", true),
        ],
        AppKind::Player if screen.code_sent => {
            &[(LoginFocus::Phone, "Phone:", false), (LoginFocus::Code, "Code:", false)]
        }
        AppKind::Player => &[(LoginFocus::Phone, "Phone:", false)],
    };

    for &(focus, label, masked) in fields {
        let value = match focus {
            LoginFocus::Email => &screen.email,
            LoginFocus::Password => &screen.password,
            LoginFocus::Phone => &screen.phone,
            LoginFocus::Code => &screen.code,
            LoginFocus::Button => continue,
        };
        lines.push(input_line(label, value, screen.focus == focus, masked));
        if let Some(error) = screen.field_error(focus) {
            lines.push(Line::from(Span::styled(
                format!("            {}", error),
                styles::error_style(),
            )));
        }
    }

    // Submit button
    let button_focused = screen.focus == LoginFocus::Button;
    let label = screen.button_label(kind);
    let button_style = if screen.submitting {
        styles::muted_style()
    } else if button_focused {
        styles::selected_style()
    } else {
        styles::list_item_style()
    };
    let label = if button_focused && !screen.submitting {
        format!(" ▶ {} ◀ ", label)
    } else {
        format!("   {}   ", label)
    };
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::raw("            ["),
        Span::styled(label, button_style),
        Span::raw("]"),
    ]));

    if let Some(ref error) = screen.server_error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(format!(" {}", error), styles::error_style())));
    }

    let hint = match (kind, screen.code_sent) {
        (AppKind::Player, true) => " [Tab] next  [Enter] submit  [Esc] change number",
        _ => " [Tab] next  [Enter] submit  [Esc] quit",
    };
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(hint, styles::muted_style())));

    let area = centered_rect_fixed(50, lines.len() as u16 + 2, frame.area());
    frame.render_widget(Clear, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_home(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // Title bar
            Constraint::Min(5),    // Main content
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, app, chunks[0]);
    match app.kind() {
        AppKind::Coach => render_queue(frame, app, chunks[1]),
        AppKind::Player => {
            let text = Paragraph::new(Line::from(Span::styled(
                format!("  {}", PLAYER_HOME),
                styles::muted_style(),
            )));
            frame.render_widget(text, chunks[1]);
        }
    }
    render_status_bar(frame, app, chunks[2]);
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let title = "  SwingLens";
    let subtitle = match app.kind() {
        AppKind::Coach => "Coach Dashboard",
        AppKind::Player => "My Swings",
    };
    let right = match &app.queue {
        QueueState::Loaded(items) if app.kind() == AppKind::Coach => format!("{} pending", items.len()),
        _ => String::new(),
    };

    let used = title.len() + subtitle.len() + 3 + right.len() + 2;
    let title_line = Line::from(vec![
        Span::styled(title, styles::title_style()),
        Span::styled(format!(" · {}", subtitle), styles::muted_style()),
        Span::raw(" ".repeat((area.width as usize).saturating_sub(used))),
        Span::styled(right, styles::highlight_style()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());
    frame.render_widget(Paragraph::new(title_line).block(block), area);
}

fn queue_item(item: &ReviewQueueItem, width: usize) -> ListItem<'static> {
    let now = Utc::now();
    let mut header = vec![
        Span::styled(format!(" {:<3}", initials(&item.player.name)), styles::title_style()),
        Span::styled(
            truncate_string(&item.player.name, width.saturating_sub(16).max(8)),
            styles::list_item_style(),
        ),
    ];
    if let Some(score) = item.overall_score {
        header.push(Span::raw("  "));
        header.push(Span::styled(format!("{:.0}", score), styles::score_style(item.score_band())));
    }

    let mut details = Vec::new();
    if let Some(handicap) = item.player.handicap {
        details.push(format_handicap(handicap));
    }
    if let Some(ref club) = item.club_type {
        details.push(format_club_type(club));
    }
    details.push(time_ago(&item.uploaded_at, now));

    let mut lines = vec![
        Line::from(header),
        Line::from(Span::styled(format!("     {}", details.join(" · ")), styles::muted_style())),
    ];
    if let Some(ref issue) = item.flagged_issue {
        lines.push(Line::from(Span::styled(
            format!("     {}", truncate_string(issue, width.saturating_sub(6))),
            styles::error_style(),
        )));
    }
    ListItem::new(lines)
}

fn render_queue(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Review Queue ")
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    let message = match &app.queue {
        QueueState::Idle | QueueState::Loading => Some(("Loading...", styles::muted_style())),
        QueueState::Failed(msg) => Some((msg.as_str(), styles::error_style())),
        QueueState::Loaded(items) if items.is_empty() => Some((QUEUE_EMPTY, styles::muted_style())),
        QueueState::Loaded(_) => None,
    };

    if let Some((text, style)) = message {
        let paragraph = Paragraph::new(Line::from(Span::styled(format!(" {}", text), style))).block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    if let QueueState::Loaded(items) = &app.queue {
        let width = area.width.saturating_sub(2) as usize;
        let list_items: Vec<ListItem> = items.iter().map(|item| queue_item(item, width)).collect();
        frame.render_widget(List::new(list_items).block(block), area);
    }
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let shortcuts = match app.kind() {
        AppKind::Coach => "[r]eload | [l]ogout | [q]uit",
        AppKind::Player => "[l]ogout | [q]uit",
    };

    let left_text = match app.status_message {
        Some(ref msg) => format!(" {} ", msg),
        None => format!(" {} ", app.api.base_url()),
    };
    let right_text = format!(" {} ", shortcuts);

    let padding_len = (area.width as usize)
        .saturating_sub(left_text.len())
        .saturating_sub(right_text.len());
    let status_line = Line::from(vec![
        Span::styled(left_text, styles::muted_style()),
        Span::raw(" ".repeat(padding_len)),
        Span::styled(right_text, styles::muted_style()),
    ]);
    frame.render_widget(Paragraph::new(status_line).style(styles::status_bar_style()), area);
}

/// Create a centered rectangle with fixed dimensions
fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}

fn render_quit_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(40, 5, frame.area());
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(Span::styled(
            "  Are you sure you want to quit?",
            styles::highlight_style(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Press ", styles::muted_style()),
            Span::styled("[Y]", styles::help_key_style()),
            Span::styled(" to quit, ", styles::muted_style()),
            Span::styled("[N]", styles::help_key_style()),
            Span::styled(" to cancel", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};
    use std::sync::Arc;
    use swinglens_core::auth::{MemoryStorage, TokenStore};
    use swinglens_core::config::{Config, StorageKind};
    use swinglens_core::ApiClient;

    fn app(token: Option<&str>, kind: AppKind) -> App {
        let storage = Arc::new(match token {
            Some(t) => MemoryStorage::with_credential(t),
            None => MemoryStorage::new(),
        });
        let store = TokenStore::new(storage);
        let api = ApiClient::new("http://127.0.0.1:9", store.clone()).unwrap();
        let config = Config {
            app: kind,
            storage: StorageKind::Memory,
            ..Config::default()
        };
        App::with_parts(config, store, api)
    }

    fn screen_text(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 30)).unwrap();
        terminal.draw(|f| render(f, app)).unwrap();
        let buffer = terminal.backend().buffer();
        buffer.content().iter().map(|cell| cell.symbol()).collect()
    }

    #[tokio::test]
    async fn test_splash_never_shows_login_or_home() {
        let app = app(Some("t"), AppKind::Coach);
        let text = screen_text(&app);
        assert!(text.contains("Loading..."));
        assert!(!text.contains("Sign in"));
        assert!(!text.contains("Review Queue"));
    }

    #[tokio::test]
    async fn test_login_screen_rendered_when_logged_out() {
        let mut app = app(None, AppKind::Coach);
        app.store.load().await;
        app.tick();
        let text = screen_text(&app);
        assert!(text.contains("Coach Dashboard"));
        assert!(text.contains("Sign in"));
        assert!(!text.contains("Review Queue"));
    }

    #[tokio::test]
    async fn test_player_home_message() {
        let mut app = app(Some("t"), AppKind::Player);
        app.store.load().await;
        app.tick();
        let text = screen_text(&app);
        assert!(text.contains(PLAYER_HOME));
    }

    #[tokio::test]
    async fn test_empty_queue_message() {
        let mut app = app(Some("t"), AppKind::Coach);
        app.store.load().await;
        app.tick();
        app.queue = QueueState::Loaded(Vec::new());
        let text = screen_text(&app);
        assert!(text.contains(QUEUE_EMPTY));
        assert!(text.contains("0 pending"));
    }
}
