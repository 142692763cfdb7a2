//! Keyboard input handling for the TUI.
//!
//! This module handles all keyboard events and translates them into
//! application state changes. Which handler runs depends only on the
//! screen the session guard selected.

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};

use swinglens_core::auth::GuardDecision;
use swinglens_core::config::AppKind;

use crate::app::{App, AppState, LoginFocus};

/// Handle keyboard input. Returns true if the app should quit.
pub async fn handle_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    // Handle quit confirmation
    if matches!(app.state, AppState::ConfirmingQuit) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                app.state = AppState::Quitting;
                return Ok(true);
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                app.state = AppState::Normal;
            }
            _ => {}
        }
        return Ok(false);
    }

    match app.screen {
        GuardDecision::Pending => {
            if key.code == KeyCode::Esc {
                app.state = AppState::Quitting;
                return Ok(true);
            }
            Ok(false)
        }
        GuardDecision::RedirectToLogin => handle_login_input(app, key),
        GuardDecision::Allow => handle_home_input(app, key).await,
    }
}

fn handle_login_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    let kind = app.kind();
    let Some(screen) = app.login.as_mut() else {
        return Ok(false);
    };

    match key.code {
        KeyCode::Esc => {
            if kind == AppKind::Player && screen.code_sent {
                app.reset_code_step();
            } else {
                app.state = AppState::ConfirmingQuit;
            }
        }
        KeyCode::Down | KeyCode::Tab => {
            screen.focus = screen.focus.next(kind);
        }
        KeyCode::Up | KeyCode::BackTab => {
            screen.focus = screen.focus.prev(kind);
        }
        KeyCode::Enter => {
            let (focus, code_sent) = (screen.focus, screen.code_sent);
            match focus {
                LoginFocus::Button => app.submit_login(),
                // Player without a code yet: Enter on the phone sends it
                LoginFocus::Phone if !code_sent => app.submit_login(),
                _ => screen.focus = focus.next(kind),
            }
        }
        KeyCode::Backspace => {
            if let Some((input, _)) = screen.input_mut() {
                input.pop();
            }
        }
        KeyCode::Char(c) => {
            if screen.focus == LoginFocus::Code && !screen.code_sent {
                return Ok(false);
            }
            if let Some((input, accept)) = screen.input_mut() {
                if accept(input.chars().count(), c) {
                    input.push(c);
                }
            }
        }
        _ => {}
    }
    Ok(false)
}

async fn handle_home_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => {
            app.state = AppState::ConfirmingQuit;
        }
        KeyCode::Char('l') => {
            app.logout().await;
        }
        KeyCode::Char('r') => {
            app.reload();
        }
        _ => {}
    }
    Ok(false)
}
