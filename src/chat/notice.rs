//! Server-originated lines.
//!
//! These share the chat channel with relayed text and carry no prefix
//! convention beyond the shapes below.

/// Broadcast when `#chat` is used without a configured credential.
pub const NO_API_KEY: &str = "<No API Key Found>\n";

/// Prefix of every AI reply line.
pub const AI_PREFIX: &str = "AI: ";

/// Sent to everyone else when a user joins.
pub fn joined(display_name: &str) -> String {
    format!("<{display_name} joined the room>\n")
}

/// Sent to everyone remaining when a user leaves.
pub fn left(display_name: &str) -> String {
    format!("<{display_name} left the room>\n")
}

/// Result of `#room`.
pub fn roster(names: &[String]) -> String {
    format!("Connected Users [{}]\n", names.join(", "))
}

/// An AI reply on one line.
///
/// Trailing terminators are dropped; inner ones become a single space each.
pub fn ai_reply(reply: &str) -> String {
    let flat = reply
        .trim_end_matches(['\r', '\n'])
        .replace("\r\n", " ")
        .replace(['\r', '\n'], " ");
    format!("{AI_PREFIX}{flat}\n")
}
