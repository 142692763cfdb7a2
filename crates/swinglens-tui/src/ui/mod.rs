//! Terminal UI module using ratatui.
//!
//! - `render`: splash, login and home screens
//! - `input`: keyboard handling per screen
//! - `styles`: color scheme and text styling

pub mod input;
pub mod render;
pub mod styles;
