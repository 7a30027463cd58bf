//! Chat server module.
//!
//! This module provides the TCP listener and per-connection handling for
//! the chat room.

pub mod input;
mod listener;
mod session;

pub use input::{parse_display_name, Line, LineReader};
pub use listener::ChatServer;
pub use session::{ChatSession, SessionLimits};
