//! Application state management for the SwingLens terminal client.
//!
//! The visible screen is taken from the [`SessionGuard`] decision and nothing
//! else. Network work runs in spawned tasks that report back over a channel,
//! so the render loop never waits on the backend.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use swinglens_core::api::{ApiClient, ApiError};
use swinglens_core::auth::{
    self, Field, GuardDecision, LoginError, LoginFlow, LoginForm, OtpForm, SessionGuard,
    TokenStore, ValidationErrors,
};
use swinglens_core::config::{AppKind, Config, ENV_STORE_PASSPHRASE};
use swinglens_core::models::ReviewQueueItem;

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background task message channel.
const CHANNEL_BUFFER_SIZE: usize = 16;

/// Maximum length for email input.
const MAX_EMAIL_LENGTH: usize = 254;

/// Maximum length for password input.
/// 128 chars accommodates password managers and passphrases.
const MAX_PASSWORD_LENGTH: usize = 128;

const MAX_PHONE_LENGTH: usize = 20;
const MAX_CODE_LENGTH: usize = 6;

pub const QUEUE_EMPTY: &str = "No pending reviews.";
pub const QUEUE_FAILED: &str = "Failed to load queue.";
pub const PLAYER_HOME: &str = "Your swings will appear here";
pub const SESSION_ENDED: &str = "Your session has ended. Please sign in again.";

pub type CharFilter = fn(usize, char) -> bool;

/// Overlay state on top of the current screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    ConfirmingQuit,
    Quitting,
}

/// Login form focus state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginFocus {
    Email,
    Password,
    Phone,
    Code,
    Button,
}

impl LoginFocus {
    fn order(kind: AppKind) -> &'static [LoginFocus] {
        match kind {
            AppKind::Coach => &[LoginFocus::Email, LoginFocus::Password, LoginFocus::Button],
            AppKind::Player => &[LoginFocus::Phone, LoginFocus::Code, LoginFocus::Button],
        }
    }

    pub fn first(kind: AppKind) -> Self {
        Self::order(kind)[0]
    }

    pub fn next(self, kind: AppKind) -> Self {
        let order = Self::order(kind);
        let idx = order.iter().position(|f| *f == self).unwrap_or(0);
        order[(idx + 1) % order.len()]
    }

    pub fn prev(self, kind: AppKind) -> Self {
        let order = Self::order(kind);
        let idx = order.iter().position(|f| *f == self).unwrap_or(0);
        order[(idx + order.len() - 1) % order.len()]
    }

    /// Validation field shown under this input, if any.
    pub fn field(self) -> Option<Field> {
        match self {
            LoginFocus::Email => Some(Field::Email),
            LoginFocus::Password => Some(Field::Password),
            LoginFocus::Phone => Some(Field::Phone),
            LoginFocus::Code => Some(Field::Code),
            LoginFocus::Button => None,
        }
    }
}

// ============================================================================
// Background Task Results
// ============================================================================

/// Results sent back from spawned tasks.
///
/// Results carry the login mount or home visit they were started from so a
/// response for a screen that has since been torn down is dropped.
enum TaskResult {
    Login {
        mount: u64,
        result: Result<(), LoginError>,
    },
    CodeSent {
        mount: u64,
        result: Result<(), LoginError>,
    },
    Queue {
        visit: u64,
        result: Result<Vec<ReviewQueueItem>, ApiError>,
    },
}

/// Coach review queue as shown on the home screen
#[derive(Debug, Clone, Default)]
pub enum QueueState {
    #[default]
    Idle,
    Loading,
    Loaded(Vec<ReviewQueueItem>),
    Failed(String),
}

/// One mounted login screen. Replaced wholesale each time the guard
/// redirects to login.
pub struct LoginScreen {
    mount: u64,
    flow: LoginFlow,
    pub email: String,
    pub password: String,
    pub phone: String,
    pub code: String,
    pub focus: LoginFocus,
    pub field_errors: ValidationErrors,
    pub server_error: Option<String>,
    pub notice: Option<String>,
    pub code_sent: bool,
    pub submitting: bool,
}

impl LoginScreen {
    fn mount(mount: u64, api: ApiClient, kind: AppKind, config: &Config) -> Self {
        let email = config.last_email.clone().unwrap_or_default();
        let phone = config.last_phone.clone().unwrap_or_default();
        let focus = match kind {
            AppKind::Coach if !email.is_empty() => LoginFocus::Password,
            AppKind::Player if !phone.is_empty() => LoginFocus::Button,
            _ => LoginFocus::first(kind),
        };
        Self {
            mount,
            flow: LoginFlow::new(api),
            email,
            password: String::new(),
            phone,
            code: String::new(),
            focus,
            field_errors: ValidationErrors::default(),
            server_error: None,
            notice: None,
            code_sent: false,
            submitting: false,
        }
    }

    fn unmount(&self) {
        self.flow.dispose();
    }

    pub fn field_error(&self, focus: LoginFocus) -> Option<&'static str> {
        focus.field().and_then(|f| self.field_errors.get(f))
    }

    pub fn button_label(&self, kind: AppKind) -> &'static str {
        match (kind, self.submitting, self.code_sent) {
            (_, true, _) => "Signing in...",
            (AppKind::Coach, false, _) => "Sign in",
            (AppKind::Player, false, false) => "Send code",
            (AppKind::Player, false, true) => "Verify code",
        }
    }

    /// Focused text input and the filter for characters typed into it.
    pub fn input_mut(&mut self) -> Option<(&mut String, CharFilter)> {
        match self.focus {
            LoginFocus::Email => Some((&mut self.email, can_add_email_char as CharFilter)),
            LoginFocus::Password => Some((&mut self.password, can_add_password_char as CharFilter)),
            LoginFocus::Phone => Some((&mut self.phone, can_add_phone_char as CharFilter)),
            LoginFocus::Code => Some((&mut self.code, can_add_code_char as CharFilter)),
            LoginFocus::Button => None,
        }
    }
}

// ============================================================================
// Main Application Struct
// ============================================================================

pub struct App {
    pub config: Config,
    /// Where remembered identities are saved; `None` keeps them in memory
    config_path: Option<PathBuf>,
    pub store: TokenStore,
    pub api: ApiClient,
    guard: SessionGuard,

    /// Screen currently shown, always the guard's last decision
    pub screen: GuardDecision,
    pub state: AppState,
    pub login: Option<LoginScreen>,
    pub queue: QueueState,
    pub status_message: Option<String>,

    mounts: u64,
    home_visits: u64,
    logging_out: bool,

    task_rx: mpsc::Receiver<TaskResult>,
    task_tx: mpsc::Sender<TaskResult>,
}

impl App {
    /// Build the store, client and guard from `config`. The session is not
    /// restored yet; call [`start_restore`](Self::start_restore).
    pub fn new(config: Config) -> Result<Self> {
        let passphrase = std::env::var(ENV_STORE_PASSPHRASE).ok();
        let storage = auth::open_storage(&config, passphrase.as_deref())?;
        let store = TokenStore::new(storage);
        let api = ApiClient::new(config.api_base_url(), store.clone())
            .context("Failed to build HTTP client")?;
        debug!(base_url = %api.base_url(), app = ?config.app, "Client configured");

        let mut app = Self::with_parts(config, store, api);
        match Config::config_path() {
            Ok(path) => app.config_path = Some(path),
            Err(e) => warn!(error = %e, "Config directory unavailable, identities will not be remembered"),
        }
        Ok(app)
    }

    pub fn with_parts(config: Config, store: TokenStore, api: ApiClient) -> Self {
        let guard = SessionGuard::new(&store);
        let (task_tx, task_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        Self {
            config,
            config_path: None,
            store,
            api,
            screen: guard.decision(),
            guard,
            state: AppState::Normal,
            login: None,
            queue: QueueState::Idle,
            status_message: None,
            mounts: 0,
            home_visits: 0,
            logging_out: false,
            task_rx,
            task_tx,
        }
    }

    pub fn kind(&self) -> AppKind {
        self.config.app
    }

    /// Restore the persisted session in the background.
    pub fn start_restore(&self) {
        let store = self.store.clone();
        tokio::spawn(async move { store.load().await });
    }

    /// Apply any new guard decision and any finished background work.
    pub fn tick(&mut self) {
        if let Some(decision) = self.guard.poll() {
            self.enter(decision);
        }

        while let Ok(result) = self.task_rx.try_recv() {
            self.process_task_result(result);
        }

        // A login result may have switched the session in this same tick
        if let Some(decision) = self.guard.poll() {
            self.enter(decision);
        }
    }

    fn enter(&mut self, decision: GuardDecision) {
        let previous = self.screen;
        self.screen = decision;
        debug!(?previous, ?decision, "Screen change");

        match decision {
            GuardDecision::Pending => {}
            GuardDecision::RedirectToLogin => {
                if let Some(old) = self.login.take() {
                    old.unmount();
                }
                self.mounts += 1;
                let mut screen =
                    LoginScreen::mount(self.mounts, self.api.clone(), self.kind(), &self.config);
                if previous == GuardDecision::Allow && !self.logging_out {
                    screen.notice = Some(SESSION_ENDED.to_string());
                }
                self.login = Some(screen);
                self.logging_out = false;
                self.queue = QueueState::Idle;
            }
            GuardDecision::Allow => {
                if let Some(screen) = self.login.take() {
                    screen.unmount();
                    self.remember_identity(&screen);
                }
                self.status_message = None;
                self.home_visits += 1;
                self.queue = QueueState::Idle;
                self.reload();
            }
        }
    }

    fn remember_identity(&mut self, screen: &LoginScreen) {
        let (email, phone) = match self.kind() {
            AppKind::Coach => (Some(screen.email.trim().to_string()), self.config.last_phone.clone()),
            AppKind::Player => (self.config.last_email.clone(), Some(screen.phone.trim().to_string())),
        };
        if email == self.config.last_email && phone == self.config.last_phone {
            return;
        }
        self.config.last_email = email.filter(|e| !e.is_empty());
        self.config.last_phone = phone.filter(|p| !p.is_empty());
        if let Some(path) = &self.config_path {
            if let Err(e) = self.config.save_to(path) {
                warn!(error = %e, "Failed to save config");
            }
        }
    }

    // =========================================================================
    // Login
    // =========================================================================

    /// Submit the login form, or for players without a code yet, request one.
    pub fn submit_login(&mut self) {
        let kind = self.kind();
        let tx = self.task_tx.clone();
        let Some(screen) = self.login.as_mut() else {
            return;
        };
        if screen.submitting || screen.flow.is_submitting() {
            return;
        }

        screen.server_error = None;
        screen.notice = None;
        let mount = screen.mount;
        let flow = screen.flow.clone();

        match kind {
            AppKind::Coach => {
                let form = LoginForm::new(screen.email.clone(), screen.password.clone());
                if let Err(errors) = form.validate() {
                    screen.field_errors = errors;
                    return;
                }
                screen.field_errors = ValidationErrors::default();
                screen.submitting = true;
                tokio::spawn(async move {
                    let result = flow.submit(&form).await.map(|_| ());
                    let _ = tx.send(TaskResult::Login { mount, result }).await;
                });
            }
            AppKind::Player if !screen.code_sent => {
                let form = OtpForm::new(screen.phone.clone(), String::new());
                if let Err(errors) = form.validate_phone() {
                    screen.field_errors = errors;
                    return;
                }
                screen.field_errors = ValidationErrors::default();
                screen.submitting = true;
                tokio::spawn(async move {
                    let result = flow.send_code(&form).await;
                    let _ = tx.send(TaskResult::CodeSent { mount, result }).await;
                });
            }
            AppKind::Player => {
                let form = OtpForm::new(screen.phone.clone(), screen.code.clone());
                if let Err(errors) = form.validate() {
                    screen.field_errors = errors;
                    return;
                }
                screen.field_errors = ValidationErrors::default();
                screen.submitting = true;
                tokio::spawn(async move {
                    let result = flow.verify_code(&form).await.map(|_| ());
                    let _ = tx.send(TaskResult::Login { mount, result }).await;
                });
            }
        }
    }

    /// Player: go back to editing the phone number.
    pub fn reset_code_step(&mut self) {
        if let Some(screen) = self.login.as_mut() {
            if !screen.submitting {
                screen.code_sent = false;
                screen.code.clear();
                screen.focus = LoginFocus::Phone;
            }
        }
    }

    fn apply_login_failure(screen: &mut LoginScreen, err: LoginError) {
        match err {
            // Stale or duplicate submissions leave the form as it is
            LoginError::Disposed | LoginError::InFlight => {}
            LoginError::Validation(errors) => screen.field_errors = errors,
            other => screen.server_error = Some(other.user_message()),
        }
    }

    // =========================================================================
    // Home
    // =========================================================================

    /// Reload home content. Coaches fetch the review queue; players have
    /// nothing to fetch yet.
    pub fn reload(&mut self) {
        if self.screen != GuardDecision::Allow || self.kind() != AppKind::Coach {
            return;
        }
        if matches!(self.queue, QueueState::Loading) {
            return;
        }
        self.queue = QueueState::Loading;
        let visit = self.home_visits;
        let api = self.api.clone();
        let tx = self.task_tx.clone();
        tokio::spawn(async move {
            let result = api.review_queue().await;
            let _ = tx.send(TaskResult::Queue { visit, result }).await;
        });
    }

    pub async fn logout(&mut self) {
        self.logging_out = true;
        match self.store.clear().await {
            Ok(()) => info!("Logged out"),
            Err(e) => {
                self.logging_out = false;
                warn!(error = %e, "Logout failed");
                self.status_message = Some(format!("Logout failed: {}", e));
            }
        }
    }

    // =========================================================================
    // Background results
    // =========================================================================

    fn process_task_result(&mut self, result: TaskResult) {
        match result {
            TaskResult::Login { mount, result } => {
                let Some(screen) = self.login.as_mut().filter(|s| s.mount == mount) else {
                    debug!(mount, "Dropping login result for a closed form");
                    return;
                };
                screen.submitting = false;
                if let Err(e) = result {
                    Self::apply_login_failure(screen, e);
                }
            }
            TaskResult::CodeSent { mount, result } => {
                let Some(screen) = self.login.as_mut().filter(|s| s.mount == mount) else {
                    return;
                };
                screen.submitting = false;
                match result {
                    Ok(()) => {
                        screen.code_sent = true;
                        screen.focus = LoginFocus::Code;
                        screen.notice = Some(format!("Code sent to {}", screen.phone.trim()));
                    }
                    Err(e) => Self::apply_login_failure(screen, e),
                }
            }
            TaskResult::Queue { visit, result } => {
                if self.screen != GuardDecision::Allow || visit != self.home_visits {
                    debug!(visit, "Dropping queue result from an earlier session");
                    return;
                }
                self.queue = match result {
                    Ok(items) => {
                        debug!(count = items.len(), "Review queue loaded");
                        QueueState::Loaded(items)
                    }
                    Err(e) => {
                        // A 401 has already cleared the store; the guard moves us to login
                        warn!(error = %e, "Failed to load review queue");
                        QueueState::Failed(QUEUE_FAILED.to_string())
                    }
                };
            }
        }
    }
}

// ============================================================================
// Input validation helpers (exported for use in input.rs)
// ============================================================================

/// Check if a character is valid for input (no control characters)
fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}

pub fn can_add_email_char(current_len: usize, c: char) -> bool {
    current_len < MAX_EMAIL_LENGTH && is_valid_input_char(c) && !c.is_whitespace()
}

pub fn can_add_password_char(current_len: usize, c: char) -> bool {
    current_len < MAX_PASSWORD_LENGTH && is_valid_input_char(c)
}

pub fn can_add_phone_char(current_len: usize, c: char) -> bool {
    current_len < MAX_PHONE_LENGTH && (c.is_ascii_digit() || matches!(c, '+' | '-' | ' '))
}

pub fn can_add_code_char(current_len: usize, c: char) -> bool {
    current_len < MAX_CODE_LENGTH && c.is_ascii_digit()
}

// ============================================================================
// Tests
// ============================================================================
