//! Chat module for Huddle.
//!
//! This module provides the single implicit chat room:
//! - The connection registry and its broadcast primitive
//! - Inline command parsing (`#room`, `#chat "..."`)
//! - Command dispatch
//! - Server-originated notice lines

mod command;
mod dispatcher;
pub mod notice;
mod registry;

pub use command::{
    find_command_name, find_prompt, parse_command, Command, COMMAND_MARKER, PROMPT_QUOTE,
};
pub use dispatcher::CommandDispatcher;
pub use registry::{
    ConnectionHandle, ConnectionId, DeliveryError, Outbound, Registry, RegistryEntry,
};
