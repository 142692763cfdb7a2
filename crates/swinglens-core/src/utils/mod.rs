//! Display formatting shared by the front-ends.

pub mod format;

pub use format::{format_club_type, format_handicap, initials, time_ago, truncate_string};
