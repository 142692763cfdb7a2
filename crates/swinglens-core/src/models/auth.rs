use std::fmt;

use serde::{Deserialize, Serialize};

use super::common::deserialize_lenient;
use super::person::{Coach, Player};

/// Body of `POST /api/v1/auth/coach/login`.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct CoachLoginRequest {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for CoachLoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoachLoginRequest")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct AuthTokenResponse {
    pub token: String,
}

/// Successful coach login. The identity is optional so a bare `{token}` body
/// still decodes, and a malformed identity never costs the token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct CoachLoginResponse {
    pub token: String,
    #[serde(default, deserialize_with = "deserialize_lenient")]
    pub coach: Option<Coach>,
}

/// Body of `POST /api/v1/auth/player/otp/send`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct OtpSendRequest {
    pub phone: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct OtpSendResponse {
    pub success: bool,
}

/// Body of `POST /api/v1/auth/player/otp/verify`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct OtpVerifyRequest {
    pub phone: String,
    pub otp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct PlayerOtpVerifyResponse {
    pub token: String,
    #[serde(default, deserialize_with = "deserialize_lenient")]
    pub player: Option<Player>,
}
