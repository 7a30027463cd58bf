//! AI reply support.
//!
//! This module provides:
//! - The shared, role-tagged conversation transcript
//! - The [`CompletionService`] seam and its OpenAI-compatible client
//! - The bridge that turns `#chat` prompts into broadcast replies

mod bridge;
mod client;
mod transcript;

pub use bridge::AiBridge;
pub use client::{CompletionService, OpenAiClient};
pub use transcript::{ChatTurn, Role, Transcript};
