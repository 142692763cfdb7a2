//! SwingLens TUI - a terminal client for SwingLens coaches and players.
//!
//! Runs the interactive login/home screens by default. `--login`,
//! `--logout` and `--status` manage the stored session without the TUI.

mod app;
mod ui;

use std::io::{self, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use swinglens_core::auth::{AuthPhase, LoginFlow, LoginForm, OtpForm};
use swinglens_core::config::{AppKind, Config};

use app::{App, AppState};
use ui::input::handle_input;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

const LOG_FILE_PREFIX: &str = "swinglens.log";

/// Log to stderr. Used by the non-interactive commands.
fn init_stderr_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

/// Log to a daily file under the data directory, since the TUI owns the terminal.
/// The returned guard must stay alive until shutdown to flush buffered lines.
fn init_file_tracing(config: &Config) -> Result<WorkerGuard> {
    let log_dir = config.data_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(filter)
        .init();
    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config = Config::load()?;

    // Check for CLI commands
    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("--login") => {
            init_stderr_tracing();
            return login_cli(config).await;
        }
        Some("--logout") => {
            init_stderr_tracing();
            return logout_cli(config).await;
        }
        Some("--status") => {
            init_stderr_tracing();
            return status_cli(config).await;
        }
        Some(other) => {
            anyhow::bail!("Unknown argument: {} (expected --login, --logout or --status)", other)
        }
        None => {}
    }

    let _log_guard = init_file_tracing(&config)?;
    info!(app = ?config.app, "SwingLens TUI starting");

    let mut app = App::new(config)?;
    app.start_restore();

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Main loop
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    info!("SwingLens TUI shutting down");
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        // Pick up guard changes and finished background work before drawing
        app.tick();

        terminal.draw(|f| render(f, app))?;

        // Poll for events with timeout to allow background updates
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            if let Event::Key(key) = event::read()? {
                // Ctrl+C to quit
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    return Ok(());
                }

                if handle_input(app, key).await? {
                    return Ok(());
                }
            }
        }

        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}

// ============================================================================
// Non-interactive commands
// ============================================================================

fn prompt(label: &str, default: Option<&str>) -> Result<String> {
    match default {
        Some(d) if !d.is_empty() => print!("{} [{}]: ", label, d),
        _ => print!("{}: ", label),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    Ok(match default {
        Some(d) if input.is_empty() => d.to_string(),
        _ => input.to_string(),
    })
}

async fn login_cli(mut config: Config) -> Result<()> {
    let app = App::new(config.clone())?;
    app.store.load().await;
    let flow = LoginFlow::new(app.api.clone());

    println!("\n=== SwingLens {} Login ===\n", config.app.display_name());

    match config.app {
        AppKind::Coach => {
            let email = prompt("Email", config.last_email.as_deref())?;
            let password = rpassword::prompt_password("Password: ")?;

            println!("\nSigning in...");
            flow.submit(&LoginForm::new(email.clone(), password))
                .await
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;
            config.last_email = Some(email.trim().to_string());
        }
        AppKind::Player => {
            let phone = prompt("Phone", config.last_phone.as_deref())?;
            let mut form = OtpForm::new(phone, String::new());
            flow.send_code(&form)
                .await
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;

            form.code = prompt("Code", None)?;
            println!("\nSigning in...");
            flow.verify_code(&form)
                .await
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;
            config.last_phone = Some(form.phone.trim().to_string());
        }
    }

    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }
    println!("Login successful!\n");
    Ok(())
}

async fn logout_cli(config: Config) -> Result<()> {
    let app = App::new(config)?;
    app.store.load().await;
    let was_signed_in = app.store.credential().is_some();
    app.store.clear().await.context("Failed to remove stored session")?;

    if was_signed_in {
        println!("Logged out.");
    } else {
        println!("No session to log out of.");
    }
    Ok(())
}

async fn status_cli(config: Config) -> Result<()> {
    let app = App::new(config)?;

    let ((), health) = futures::join!(app.store.load(), app.api.health());

    let phase = match AuthPhase::from(&app.store.state()) {
        AuthPhase::Initializing => "initializing",
        AuthPhase::Unauthenticated => "logged out",
        AuthPhase::Authenticated => "logged in",
    };

    println!("App:      {}", app.config.app.display_name());
    println!("Session:  {}", phase);
    println!("Storage:  {}", app.store.storage_description());
    println!("Backend:  {}", app.api.base_url());
    match health {
        Ok(h) if h.is_ok() => match h.version {
            Some(ref v) => println!("Health:   ok ({})", v),
            None => println!("Health:   ok"),
        },
        Ok(h) => println!("Health:   {}", h.status.as_deref().unwrap_or("unknown")),
        Err(e) => println!("Health:   unreachable ({})", e),
    }
    Ok(())
}
