//! Huddle - a single-room TCP chat relay.
//!
//! Clients connect over plain TCP, send a display name, and from then on
//! every line they send is relayed to everyone else in the room. Lines may
//! carry inline commands: `#room` lists who is connected and
//! `#chat "..."` asks a shared AI conversation for a reply.

pub mod ai;
pub mod chat;
pub mod config;
pub mod error;
pub mod logging;
pub mod server;

pub use ai::{AiBridge, ChatTurn, CompletionService, OpenAiClient, Role, Transcript};
pub use chat::{
    find_prompt, parse_command, Command, CommandDispatcher, ConnectionHandle, ConnectionId,
    Registry, RegistryEntry,
};
pub use config::Config;
pub use error::{HuddleError, Result};
pub use server::{ChatServer, ChatSession, Line, LineReader, SessionLimits};
