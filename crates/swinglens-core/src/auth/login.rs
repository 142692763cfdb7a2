//! Credential collection and submission for the coach and player apps.
//!
//! A [`LoginFlow`] belongs to one mounted login form. It validates input
//! locally, submits it through the [`ApiClient`], and on success hands the
//! returned token to the [`TokenStore`](super::TokenStore). The guard picks up
//! the change from there; the flow never touches navigation.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::models::{CoachLoginRequest, CoachLoginResponse, OtpVerifyRequest, PlayerOtpVerifyResponse};

use super::storage::StorageError;

pub const EMAIL_REQUIRED: &str = "Email is required";
pub const EMAIL_INVALID: &str = "Enter a valid email address";
pub const PASSWORD_REQUIRED: &str = "Password is required";
pub const PHONE_REQUIRED: &str = "Phone number is required";
pub const PHONE_INVALID: &str = "Phone number must be 10 to 20 characters";
pub const CODE_REQUIRED: &str = "Code is required";
pub const CODE_INVALID: &str = "Code must be 6 digits";
pub const LOGIN_FAILED: &str = "Login failed. Please try again.";
pub const SEND_CODE_FAILED: &str = "Could not send code. Please try again.";

const PHONE_MIN_LEN: usize = 10;
const PHONE_MAX_LEN: usize = 20;
const OTP_LEN: usize = 6;

/// Form fields that can carry a validation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Field {
    Email,
    Password,
    Phone,
    Code,
}

/// Per-field validation messages. Empty means the form is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    fields: BTreeMap<Field, &'static str>,
}

impl ValidationErrors {
    fn add(&mut self, field: Field, message: &'static str) {
        self.fields.entry(field).or_insert(message);
    }

    pub fn get(&self, field: Field) -> Option<&'static str> {
        self.fields.get(&field).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &'static str)> + '_ {
        self.fields.iter().map(|(f, m)| (*f, *m))
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<_> = self.fields.values().copied().collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Loose shape check: something before a single `@`, a dotted domain after it.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.split('.').count() >= 2
        && domain.split('.').all(|part| !part.is_empty())
}

/// Coach email/password form.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginForm")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

impl LoginForm {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Check the form and build the request body. The email is trimmed; the
    /// password is sent exactly as typed.
    pub fn validate(&self) -> Result<CoachLoginRequest, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let email = self.email.trim();

        if email.is_empty() {
            errors.add(Field::Email, EMAIL_REQUIRED);
        } else if !is_valid_email(email) {
            errors.add(Field::Email, EMAIL_INVALID);
        }
        if self.password.is_empty() {
            errors.add(Field::Password, PASSWORD_REQUIRED);
        }

        errors.into_result()?;
        Ok(CoachLoginRequest {
            email: email.to_string(),
            password: self.password.clone(),
        })
    }
}

/// Player phone + one-time code form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OtpForm {
    pub phone: String,
    pub code: String,
}

impl OtpForm {
    pub fn new(phone: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            phone: phone.into(),
            code: code.into(),
        }
    }

    fn check_phone(phone: &str, errors: &mut ValidationErrors) {
        let len = phone.chars().count();
        if len == 0 {
            errors.add(Field::Phone, PHONE_REQUIRED);
        } else if !(PHONE_MIN_LEN..=PHONE_MAX_LEN).contains(&len) {
            errors.add(Field::Phone, PHONE_INVALID);
        }
    }

    /// Validate only the phone number, for the "send code" step.
    pub fn validate_phone(&self) -> Result<String, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let phone = self.phone.trim();
        Self::check_phone(phone, &mut errors);
        errors.into_result()?;
        Ok(phone.to_string())
    }

    pub fn validate(&self) -> Result<OtpVerifyRequest, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let phone = self.phone.trim();
        let code = self.code.trim();

        Self::check_phone(phone, &mut errors);
        if code.is_empty() {
            errors.add(Field::Code, CODE_REQUIRED);
        } else if code.len() != OTP_LEN || !code.chars().all(|c| c.is_ascii_digit()) {
            errors.add(Field::Code, CODE_INVALID);
        }

        errors.into_result()?;
        Ok(OtpVerifyRequest {
            phone: phone.to_string(),
            otp: code.to_string(),
        })
    }
}

#[derive(Error, Debug)]
pub enum LoginError {
    #[error("Invalid input: {0}")]
    Validation(ValidationErrors),

    /// The server declined the attempt, or it could not be completed.
    /// Holds the message to show next to the submit control.
    #[error("{0}")]
    Rejected(String),

    #[error("A submission is already in progress")]
    InFlight,

    #[error("Signed in but the session could not be saved: {0}")]
    Storage(#[from] StorageError),

    #[error("Login form was closed before the response arrived")]
    Disposed,
}

impl LoginError {
    /// Single message for the area under the submit button.
    pub fn user_message(&self) -> String {
        match self {
            LoginError::Rejected(message) => message.clone(),
            LoginError::Storage(_) => LOGIN_FAILED.to_string(),
            other => other.to_string(),
        }
    }

    pub fn validation(&self) -> Option<&ValidationErrors> {
        match self {
            LoginError::Validation(errors) => Some(errors),
            _ => None,
        }
    }

    fn from_api(err: ApiError, fallback: &str) -> Self {
        warn!(error = %err, "Login request failed");
        LoginError::Rejected(err.user_message(fallback))
    }
}

/// Clears the in-flight flag when the submission ends, however it ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, LoginError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| Self(flag))
            .map_err(|_| LoginError::InFlight)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Login submission state for one form instance.
///
/// Clones share the in-flight and disposed flags, so a clone moved into a
/// background task still honors [`dispose`](Self::dispose) from the view.
#[derive(Clone)]
pub struct LoginFlow {
    api: ApiClient,
    in_flight: Arc<AtomicBool>,
    disposed: Arc<AtomicBool>,
}

impl LoginFlow {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            in_flight: Arc::new(AtomicBool::new(false)),
            disposed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Mark the owning view as gone. A response arriving afterwards is
    /// dropped without storing its token.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
    }

    /// Validate and submit a coach login. On success the token is already in
    /// the store when this returns.
    pub async fn submit(&self, form: &LoginForm) -> Result<CoachLoginResponse, LoginError> {
        let request = form.validate().map_err(LoginError::Validation)?;
        let _in_flight = InFlightGuard::acquire(&self.in_flight)?;

        debug!(email = %request.email, "Submitting coach login");
        let response = self
            .api
            .coach_login(&request)
            .await
            .map_err(|e| LoginError::from_api(e, LOGIN_FAILED))?;

        self.accept(&response.token).await?;
        Ok(response)
    }

    /// Ask the backend to text a code to the form's phone number.
    pub async fn send_code(&self, form: &OtpForm) -> Result<(), LoginError> {
        let phone = form.validate_phone().map_err(LoginError::Validation)?;
        let _in_flight = InFlightGuard::acquire(&self.in_flight)?;

        let response = self
            .api
            .player_send_otp(&phone)
            .await
            .map_err(|e| LoginError::from_api(e, SEND_CODE_FAILED))?;

        if self.is_disposed() {
            return Err(LoginError::Disposed);
        }
        if !response.success {
            return Err(LoginError::Rejected(SEND_CODE_FAILED.to_string()));
        }
        Ok(())
    }

    /// Validate and submit a player's phone + code.
    pub async fn verify_code(&self, form: &OtpForm) -> Result<PlayerOtpVerifyResponse, LoginError> {
        let request = form.validate().map_err(LoginError::Validation)?;
        let _in_flight = InFlightGuard::acquire(&self.in_flight)?;

        let response = self
            .api
            .player_verify_otp(&request)
            .await
            .map_err(|e| LoginError::from_api(e, LOGIN_FAILED))?;

        self.accept(&response.token).await?;
        Ok(response)
    }

    async fn accept(&self, token: &str) -> Result<(), LoginError> {
        if self.is_disposed() {
            debug!("Login response arrived after the form closed, discarding");
            return Err(LoginError::Disposed);
        }
        if token.trim().is_empty() {
            return Err(LoginError::Rejected(LOGIN_FAILED.to_string()));
        }
        self.api.store().set(token).await?;
        info!("Login succeeded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::guard::{GuardDecision, SessionGuard};
    use crate::auth::storage::MemoryStorage;
    use crate::auth::TokenStore;
    use mockito::Server;
    use std::time::Duration;

    async fn flow_for(url: &str) -> (LoginFlow, TokenStore) {
        let store = TokenStore::new(Arc::new(MemoryStorage::new()));
        store.load().await;
        let api = ApiClient::new(url, store.clone()).unwrap();
        (LoginFlow::new(api), store)
    }

    #[test]
    fn test_email_shape() {
        assert!(is_valid_email("coach@tsg.com"));
        assert!(is_valid_email("a.b+c@academy.co.in"));
        assert!(!is_valid_email("coach"));
        assert!(!is_valid_email("coach@"));
        assert!(!is_valid_email("@tsg.com"));
        assert!(!is_valid_email("coach@tsg"));
        assert!(!is_valid_email("coach@tsg..com"));
        assert!(!is_valid_email("co ach@tsg.com"));
        assert!(!is_valid_email("a@b@c.com"));
    }

    #[test]
    fn test_login_form_required_fields() {
        let errors = LoginForm::new("", "").validate().unwrap_err();
        assert_eq!(errors.get(Field::Email), Some(EMAIL_REQUIRED));
        assert_eq!(errors.get(Field::Password), Some(PASSWORD_REQUIRED));

        let errors = LoginForm::new("coach@tsg.com", "").validate().unwrap_err();
        assert_eq!(errors.get(Field::Email), None);
        assert_eq!(errors.get(Field::Password), Some(PASSWORD_REQUIRED));

        let errors = LoginForm::new("   ", "pw").validate().unwrap_err();
        assert_eq!(errors.get(Field::Email), Some(EMAIL_REQUIRED));
    }

    #[test]
    fn test_login_form_trims_email_only() {
        let request = LoginForm::new("  coach@tsg.com ", " pw ").validate().unwrap();
        assert_eq!(request.email, "coach@tsg.com");
        assert_eq!(request.password, " pw ");
    }

    #[test]
    fn test_login_form_debug_hides_password() {
        let debug = format!("{:?}", LoginForm::new("coach@tsg.com", "hunter2"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_otp_form_validation() {
        assert!(OtpForm::new("+919876543210", "123456").validate().is_ok());

        let errors = OtpForm::new("12345", "12a456").validate().unwrap_err();
        assert_eq!(errors.get(Field::Phone), Some(PHONE_INVALID));
        assert_eq!(errors.get(Field::Code), Some(CODE_INVALID));

        let errors = OtpForm::new("", "").validate().unwrap_err();
        assert_eq!(errors.get(Field::Phone), Some(PHONE_REQUIRED));
        assert_eq!(errors.get(Field::Code), Some(CODE_REQUIRED));

        assert!(OtpForm::new("+919876543210", "").validate_phone().is_ok());
    }

    #[tokio::test]
    async fn test_invalid_form_makes_no_request() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/api/v1/auth/coach/login")
            .expect(0)
            .create_async()
            .await;

        let (flow, store) = flow_for(&server.url()).await;
        for form in [
            LoginForm::new("", "pw"),
            LoginForm::new("coach@tsg.com", ""),
            LoginForm::new("", ""),
        ] {
            let err = flow.submit(&form).await.unwrap_err();
            assert!(err.validation().is_some());
        }

        m.assert_async().await;
        assert!(store.credential().is_none());
        assert!(!flow.is_submitting());
    }

    #[tokio::test]
    async fn test_successful_login_stores_token_and_unlocks_guard() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/api/v1/auth/coach/login")
            .with_status(200)
            .with_body(r#"{"data": {"token": "issued-jwt"}}"#)
            .create_async()
            .await;

        let (flow, store) = flow_for(&server.url()).await;
        let mut guard = SessionGuard::new(&store);
        assert_eq!(guard.decision(), GuardDecision::RedirectToLogin);

        let response = flow
            .submit(&LoginForm::new("coach@tsg.com", "test1234"))
            .await
            .unwrap();

        assert_eq!(response.token, "issued-jwt");
        assert_eq!(store.credential().unwrap().as_str(), "issued-jwt");
        assert_eq!(guard.poll(), Some(GuardDecision::Allow));
        assert!(!flow.is_submitting());
    }

    #[tokio::test]
    async fn test_rejection_shows_detail_and_store_stays_empty() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/api/v1/auth/coach/login")
            .with_status(401)
            .with_body(r#"{"detail": "Invalid password"}"#)
            .create_async()
            .await;

        let (flow, store) = flow_for(&server.url()).await;
        let err = flow
            .submit(&LoginForm::new("coach@tsg.com", "wrong"))
            .await
            .unwrap_err();

        assert_eq!(err.user_message(), "Invalid password");
        assert!(store.credential().is_none());
        // Form can be resubmitted
        assert!(!flow.is_submitting());
    }

    #[tokio::test]
    async fn test_unstructured_failure_uses_generic_message() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/api/v1/auth/coach/login")
            .with_status(502)
            .with_body("<html>Bad Gateway</html>")
            .create_async()
            .await;

        let (flow, _) = flow_for(&server.url()).await;
        let err = flow
            .submit(&LoginForm::new("coach@tsg.com", "pw"))
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), LOGIN_FAILED);
    }

    #[tokio::test]
    async fn test_duplicate_submission_is_blocked() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/api/v1/auth/coach/login")
            .with_status(200)
            .with_chunked_body(|w| {
                std::thread::sleep(Duration::from_millis(200));
                w.write_all(br#"{"token": "slow-jwt"}"#)
            })
            .expect(1)
            .create_async()
            .await;

        let (flow, store) = flow_for(&server.url()).await;
        let form = LoginForm::new("coach@tsg.com", "test1234");

        let first = {
            let flow = flow.clone();
            let form = form.clone();
            tokio::spawn(async move { flow.submit(&form).await })
        };
        while !flow.is_submitting() {
            tokio::task::yield_now().await;
        }

        let second = flow.submit(&form).await;
        assert!(matches!(second, Err(LoginError::InFlight)));

        first.await.unwrap().unwrap();
        m.assert_async().await;
        assert_eq!(store.credential().unwrap().as_str(), "slow-jwt");
    }

    #[tokio::test]
    async fn test_disposed_flow_does_not_store_token() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/api/v1/auth/coach/login")
            .with_status(200)
            .with_body(r#"{"token": "late-jwt"}"#)
            .create_async()
            .await;

        let (flow, store) = flow_for(&server.url()).await;
        flow.dispose();
        let err = flow
            .submit(&LoginForm::new("coach@tsg.com", "pw"))
            .await
            .unwrap_err();

        assert!(matches!(err, LoginError::Disposed));
        assert!(store.credential().is_none());
    }

    #[tokio::test]
    async fn test_dispose_while_in_flight_drops_token() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/api/v1/auth/coach/login")
            .with_status(200)
            .with_chunked_body(|w| {
                std::thread::sleep(Duration::from_millis(200));
                w.write_all(br#"{"token": "late-jwt"}"#)
            })
            .create_async()
            .await;

        let (flow, store) = flow_for(&server.url()).await;
        let pending = {
            let flow = flow.clone();
            tokio::spawn(async move { flow.submit(&LoginForm::new("coach@tsg.com", "pw")).await })
        };
        while !flow.is_submitting() {
            tokio::task::yield_now().await;
        }
        flow.dispose();

        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, LoginError::Disposed));
        m.assert_async().await;
        assert!(store.credential().is_none());
        assert!(!flow.is_submitting());
    }

    #[tokio::test]
    async fn test_malformed_identity_still_signs_in() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/api/v1/auth/player/otp/verify")
            .with_status(200)
            .with_body(
                r#"{"token": "player-jwt", "player": {
                    "id": "p1", "name": "Arjun", "phone": 919876543210,
                    "skill_level": "Beginner", "created_at": null
                }}"#,
            )
            .create_async()
            .await;

        let (flow, store) = flow_for(&server.url()).await;
        let response = flow
            .verify_code(&OtpForm::new("+919876543210", "123456"))
            .await
            .unwrap();

        assert!(response.player.is_none());
        assert_eq!(store.credential().unwrap().as_str(), "player-jwt");
    }

    #[tokio::test]
    async fn test_player_otp_login() {
        let mut server = Server::new_async().await;
        let send = server
            .mock("POST", "/api/v1/auth/player/otp/send")
            .match_body(mockito::Matcher::Json(serde_json::json!({"phone": "+919876543210"})))
            .with_status(200)
            .with_body(r#"{"success": true}"#)
            .create_async()
            .await;
        let verify = server
            .mock("POST", "/api/v1/auth/player/otp/verify")
            .match_body(mockito::Matcher::Json(
                serde_json::json!({"phone": "+919876543210", "otp": "123456"}),
            ))
            .with_status(200)
            .with_body(r#"{"token": "player-jwt", "player": null}"#)
            .create_async()
            .await;

        let (flow, store) = flow_for(&server.url()).await;
        let mut form = OtpForm::new(" +919876543210 ", "");
        flow.send_code(&form).await.unwrap();
        form.code = "123456".to_string();
        flow.verify_code(&form).await.unwrap();

        send.assert_async().await;
        verify.assert_async().await;
        assert_eq!(store.credential().unwrap().as_str(), "player-jwt");
    }

    #[tokio::test]
    async fn test_wrong_code_shows_detail() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/api/v1/auth/player/otp/verify")
            .with_status(400)
            .with_body(r#"{"detail": "Invalid OTP"}"#)
            .create_async()
            .await;

        let (flow, store) = flow_for(&server.url()).await;
        let err = flow
            .verify_code(&OtpForm::new("+919876543210", "000000"))
            .await
            .unwrap_err();

        assert_eq!(err.user_message(), "Invalid OTP");
        assert!(store.credential().is_none());
    }
}
