//! Inline command parsing for chat lines.
//!
//! A command can appear anywhere in a line: `Alice: hey #room` lists the
//! room, `Bob: #chat "what's up"` asks the AI. Only the first marker in a
//! line is considered.

/// Character that introduces an inline command.
pub const COMMAND_MARKER: char = '#';

/// Quote character delimiting a `#chat` prompt.
pub const PROMPT_QUOTE: char = '"';

/// A command found in a chat line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List connected users.
    Room,
    /// Ask the AI. `prompt` is the first quoted span of the line, if any.
    Chat {
        /// Quoted prompt text without the quotes.
        prompt: Option<String>,
    },
    /// Unrecognized command name.
    Unknown(String),
}

impl Command {
    /// Get the command name.
    pub fn name(&self) -> &str {
        match self {
            Command::Room => "room",
            Command::Chat { .. } => "chat",
            Command::Unknown(name) => name,
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Chat {
                prompt: Some(prompt),
            } => write!(f, "{COMMAND_MARKER}chat \"{prompt}\""),
            other => write!(f, "{COMMAND_MARKER}{}", other.name()),
        }
    }
}

/// Extract the command name following the first marker in `line`.
///
/// The name runs up to the next whitespace or the end of the line. Returns
/// `None` when the line has no marker.
pub fn find_command_name(line: &str) -> Option<&str> {
    let start = line.find(COMMAND_MARKER)? + COMMAND_MARKER.len_utf8();
    let rest = &line[start..];
    let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Extract the text between the first pair of quotes in `line`.
pub fn find_prompt(line: &str) -> Option<&str> {
    let open = line.find(PROMPT_QUOTE)? + PROMPT_QUOTE.len_utf8();
    let rest = &line[open..];
    let close = rest.find(PROMPT_QUOTE)?;
    Some(&rest[..close])
}

/// Parse the command carried by a chat line, if any.
///
/// Names are case-sensitive.
pub fn parse_command(line: &str) -> Option<Command> {
    let name = find_command_name(line)?;
    let command = match name {
        "room" => Command::Room,
        "chat" => Command::Chat {
            prompt: find_prompt(line).map(str::to_string),
        },
        other => Command::Unknown(other.to_string()),
    };
    Some(command)
}
