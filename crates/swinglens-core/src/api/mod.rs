//! REST client for the SwingLens backend.
//!
//! Requests carry the current session token as a bearer header. A 401 from
//! any endpoint logs the user out by clearing the shared token store.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
