//! Core library for SwingLens clients.
//!
//! Holds the session credential store, the access-control guard, the login
//! flows, the REST client and the wire models shared by every front-end.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod utils;

pub use api::{ApiClient, ApiError};
pub use auth::{GuardDecision, LoginFlow, SessionGuard, TokenStore};
pub use config::{AppKind, Config, StorageKind};
