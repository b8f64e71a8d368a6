//! Sensor monitor TUI.
//!
//! Run with: cargo run -p monitor-tui
//!
//! Mirrors the controller dashboard: a server form, live sensor cards,
//! the message log, canned command shortcuts, and a monitor toggle that
//! keeps re-polling while the controller reports ready.

use std::{io, time::Duration};

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use sensorlink_core::{
    Endpoint,
    protocol::{CMD_GET_AIR_TEMP, CMD_GET_ALL, CMD_GET_WATER_TEMP},
};
use sensorlink_session::{SessionManager, SessionPhase, SessionView};
use sensorlink_transport::WsConnector;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Quiet unless RUST_LOG asks otherwise; output goes to stderr so it
    // does not fight the alternate screen.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run app
    let result = run_app(&mut terminal).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {e}");
    }

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Address,
    Port,
    Command,
}

struct App {
    address: String,
    port: String,
    command: String,
    focus: Focus,
    show_log: bool,
    notice: Option<String>,
}

impl App {
    fn new() -> Self {
        Self {
            address: "192.168.100.158".to_string(),
            port: "81".to_string(),
            command: String::new(),
            focus: Focus::Address,
            show_log: false,
            notice: None,
        }
    }

    fn focused_field(&mut self) -> &mut String {
        match self.focus {
            Focus::Address => &mut self.address,
            Focus::Port => &mut self.port,
            Focus::Command => &mut self.command,
        }
    }

    fn next_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Address => Focus::Port,
            Focus::Port => Focus::Command,
            Focus::Command => Focus::Address,
        };
    }

    fn endpoint(&self) -> Result<Endpoint, String> {
        let port = self
            .port
            .parse::<u16>()
            .map_err(|_| format!("invalid port: {}", self.port))?;
        Endpoint::new(self.address.clone(), port).map_err(|e| e.to_string())
    }
}

async fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    let mut app = App::new();
    let manager = SessionManager::new(WsConnector::new());

    loop {
        let view = manager.view();
        terminal.draw(|f| ui(f, &app, &view))?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if !handle_key(key, &mut app, &manager, &view).await? {
                    return Ok(());
                }
            }
        }
    }
}

/// Returns `false` when the app should quit.
async fn handle_key(
    key: KeyEvent,
    app: &mut App,
    manager: &SessionManager<WsConnector>,
    view: &SessionView,
) -> Result<bool> {
    app.notice = None;
    match key {
        KeyEvent {
            code: KeyCode::Char('c'),
            modifiers: KeyModifiers::CONTROL,
            ..
        } => {
            if view.phase == SessionPhase::Connected {
                let _ = manager.disconnect().await;
            }
            return Ok(false);
        }
        KeyEvent {
            code: KeyCode::Char('d'),
            modifiers: KeyModifiers::CONTROL,
            ..
        } => report(app, manager.disconnect().await),
        KeyEvent {
            code: KeyCode::Char('w'),
            modifiers: KeyModifiers::CONTROL,
            ..
        } => report(app, manager.send(CMD_GET_WATER_TEMP).await),
        KeyEvent {
            code: KeyCode::Char('t'),
            modifiers: KeyModifiers::CONTROL,
            ..
        } => report(app, manager.send(CMD_GET_AIR_TEMP).await),
        KeyEvent {
            code: KeyCode::Char('g'),
            modifiers: KeyModifiers::CONTROL,
            ..
        } => report(app, manager.send(CMD_GET_ALL).await),
        KeyEvent {
            code: KeyCode::Char('n'),
            modifiers: KeyModifiers::CONTROL,
            ..
        } => manager.set_loop(!view.loop_enabled).await,
        KeyEvent {
            code: KeyCode::Char('x'),
            modifiers: KeyModifiers::CONTROL,
            ..
        } => manager.clear_log().await,
        KeyEvent {
            code: KeyCode::Char('l'),
            modifiers: KeyModifiers::CONTROL,
            ..
        } => app.show_log = !app.show_log,
        KeyEvent {
            code: KeyCode::Tab, ..
        } => app.next_focus(),
        KeyEvent {
            code: KeyCode::Enter,
            ..
        } => match app.focus {
            Focus::Address | Focus::Port => match app.endpoint() {
                Ok(endpoint) => report(app, manager.connect(endpoint).await),
                Err(e) => app.notice = Some(e),
            },
            Focus::Command => {
                let command = std::mem::take(&mut app.command);
                report(app, manager.send(&command).await);
            }
        },
        KeyEvent {
            code: KeyCode::Backspace,
            ..
        } => {
            app.focused_field().pop();
        }
        KeyEvent {
            code: KeyCode::Char(c),
            modifiers: KeyModifiers::NONE | KeyModifiers::SHIFT,
            ..
        } => app.focused_field().push(c),
        _ => {}
    }
    Ok(true)
}

fn report<E: std::fmt::Display>(app: &mut App, result: Result<(), E>) {
    if let Err(e) = result {
        app.notice = Some(e.to_string());
    }
}

fn ui(f: &mut Frame, app: &App, view: &SessionView) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Server form
            Constraint::Min(5),    // Sensors + log
            Constraint::Length(3), // Command input
            Constraint::Length(1), // Status bar
        ])
        .split(f.area());

    // Server form
    let field_style = |focus| {
        if app.focus == focus {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        }
    };
    let form = Paragraph::new(Line::from(vec![
        Span::raw(" address: "),
        Span::styled(app.address.as_str(), field_style(Focus::Address)),
        Span::raw("   port: "),
        Span::styled(app.port.as_str(), field_style(Focus::Port)),
    ]))
    .block(Block::default().borders(Borders::ALL).title("Server"));
    f.render_widget(form, chunks[0]);

    // Sensor cards, with the log pane beside them when visible
    let middle = if app.show_log {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(chunks[1])
    } else {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(100)])
            .split(chunks[1])
    };

    let mut readings: Vec<(&String, &String)> = view.snapshot.iter().collect();
    readings.sort();
    let cards: Vec<Line> = readings
        .into_iter()
        .map(|(name, value)| {
            Line::from(vec![
                Span::styled(format!(" {name}: "), Style::default().fg(Color::Cyan)),
                Span::raw(value.as_str()),
            ])
        })
        .collect();
    let sensors = Paragraph::new(cards)
        .block(Block::default().borders(Borders::ALL).title("Sensors"))
        .wrap(Wrap { trim: false });
    f.render_widget(sensors, middle[0]);

    if app.show_log {
        let lines: Vec<Line> = view
            .log
            .iter()
            .map(|entry| {
                let msg = serde_json::to_string(&entry.msg).unwrap_or_default();
                Line::from(format!(" {}: {msg}", entry.from))
            })
            .collect();
        // Keep the tail in view, like the original auto-scroll.
        let height = middle[1].height.saturating_sub(2);
        let scroll = (lines.len() as u16).saturating_sub(height);
        let log = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Log"))
            .scroll((scroll, 0));
        f.render_widget(log, middle[1]);
    }

    // Command input
    let command = Paragraph::new(app.command.as_str())
        .style(field_style(Focus::Command))
        .block(Block::default().borders(Borders::ALL).title("Command"));
    f.render_widget(command, chunks[2]);

    // Status bar
    let (phase_text, phase_style) = match view.phase {
        SessionPhase::Connected => ("connected", Style::default().fg(Color::Green)),
        SessionPhase::Connecting => ("connecting", Style::default().fg(Color::Yellow)),
        SessionPhase::Failed => ("failed", Style::default().fg(Color::Red)),
        SessionPhase::Closed => ("closed", Style::default().fg(Color::Red)),
        SessionPhase::Idle => ("idle", Style::default()),
    };
    let mut spans = vec![
        Span::raw(" "),
        Span::styled(phase_text, phase_style),
        Span::raw(" | status: "),
        Span::raw(view.status.as_deref().unwrap_or("-").to_string()),
        Span::raw(" | monitor: "),
        Span::raw(view.loop_enabled.to_string()),
        Span::raw(" | "),
        Span::styled("^W/^T/^G", Style::default().fg(Color::Yellow)),
        Span::raw(" poll | "),
        Span::styled("^N", Style::default().fg(Color::Yellow)),
        Span::raw(" monitor | "),
        Span::styled("^L", Style::default().fg(Color::Yellow)),
        Span::raw(" log | "),
        Span::styled("^X", Style::default().fg(Color::Yellow)),
        Span::raw(" clear | "),
        Span::styled("^D", Style::default().fg(Color::Yellow)),
        Span::raw(" disconnect | "),
        Span::styled("^C", Style::default().fg(Color::Yellow)),
        Span::raw(" quit"),
    ];
    if let Some(notice) = &app.notice {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            notice.as_str(),
            Style::default().fg(Color::Red),
        ));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), chunks[3]);
}
