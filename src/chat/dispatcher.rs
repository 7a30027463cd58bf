//! Command dispatch.
//!
//! Commands run on their own task so a slow AI call never stalls the
//! sender's read loop. Results go to the whole room, the issuer included.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::debug;

use super::command::{parse_command, Command};
use super::notice;
use super::registry::Registry;
use crate::ai::AiBridge;

/// Runs inline commands against the shared registry and AI bridge.
#[derive(Clone)]
pub struct CommandDispatcher {
    registry: Arc<Registry>,
    bridge: Arc<AiBridge>,
}

impl CommandDispatcher {
    /// Create a dispatcher over the given shared state.
    pub fn new(registry: Arc<Registry>, bridge: Arc<AiBridge>) -> Self {
        Self { registry, bridge }
    }

    /// Get the registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Get the AI bridge.
    pub fn bridge(&self) -> &Arc<AiBridge> {
        &self.bridge
    }

    /// Spawn handling for the command in `line`, if it carries one.
    ///
    /// Callers must broadcast the raw line before calling this so every
    /// recipient sees the line ahead of its result.
    pub fn dispatch(&self, display_name: &str, line: &str) -> Option<JoinHandle<()>> {
        let command = parse_command(line)?;
        debug!("{} issued {}", display_name, command);

        let dispatcher = self.clone();
        let display_name = display_name.to_string();
        Some(tokio::spawn(async move {
            dispatcher.execute(&display_name, command).await;
        }))
    }

    /// Run a parsed command to completion.
    ///
    /// Returns the number of recipients a result was queued for.
    pub async fn execute(&self, display_name: &str, command: Command) -> usize {
        match command {
            Command::Room => self.list_room().await,
            Command::Chat {
                prompt: Some(prompt),
            } => self.ask_ai(display_name, &prompt).await,
            Command::Chat { prompt: None } => {
                debug!("#chat from {} has no quoted prompt", display_name);
                0
            }
            Command::Unknown(name) => {
                debug!("Ignoring unknown command #{} from {}", name, display_name);
                0
            }
        }
    }

    async fn list_room(&self) -> usize {
        let names = self.registry.display_names().await;
        if names.is_empty() {
            return 0;
        }
        self.registry
            .broadcast_text(None, &notice::roster(&names))
            .await
    }

    async fn ask_ai(&self, display_name: &str, prompt: &str) -> usize {
        match self.bridge.reply(display_name, prompt).await {
            Some(line) => self.registry.broadcast_text(None, &line).await,
            None => 0,
        }
    }
}
