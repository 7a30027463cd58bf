//! AI reply bridge for the `#chat` command.
//!
//! The bridge owns the single conversation shared by all users. Each
//! request holds the transcript lock from the user turn through the
//! assistant turn, so concurrent requests are answered one at a time and
//! their turns never interleave.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::client::{CompletionService, OpenAiClient};
use super::transcript::{ChatTurn, Transcript};
use crate::chat::notice;
use crate::config::AiConfig;
use crate::Result;

/// Mediates between chat users and the completion service.
pub struct AiBridge {
    service: Option<Arc<dyn CompletionService>>,
    system_prompt: String,
    timeout: Duration,
    transcript: Mutex<Transcript>,
}

impl AiBridge {
    /// Create a bridge. `None` means no credential is configured.
    pub fn new(
        service: Option<Arc<dyn CompletionService>>,
        system_prompt: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            service,
            system_prompt: system_prompt.into(),
            timeout,
            transcript: Mutex::new(Transcript::new()),
        }
    }

    /// Create a bridge from configuration.
    ///
    /// An empty `api_key` yields a bridge that answers every prompt with
    /// the missing-credential notice.
    pub fn from_config(config: &AiConfig) -> Result<Self> {
        let service: Option<Arc<dyn CompletionService>> = if config.has_api_key() {
            let client = OpenAiClient::new(config)?;
            info!("AI replies enabled via {} ({})", client.endpoint(), config.model);
            Some(Arc::new(client))
        } else {
            info!("No API key configured; #chat will report it");
            None
        };

        Ok(Self::new(service, &config.system_prompt, config.timeout()))
    }

    /// Whether a completion service is available.
    pub fn has_credential(&self) -> bool {
        self.service.is_some()
    }

    /// Copy of the transcript, oldest turn first.
    pub async fn transcript(&self) -> Vec<ChatTurn> {
        self.transcript.lock().await.turns().to_vec()
    }

    /// Answer `prompt` from `display_name`.
    ///
    /// Returns the line to broadcast to the whole room, or `None` when the
    /// completion failed. Failures are logged and never reach the client.
    pub async fn reply(&self, display_name: &str, prompt: &str) -> Option<String> {
        let Some(service) = &self.service else {
            warn!("#chat from {} ignored: no API key", display_name);
            return Some(notice::NO_API_KEY.to_string());
        };

        let mut transcript = self.transcript.lock().await;
        if transcript.is_empty() {
            transcript.push(ChatTurn::system(&self.system_prompt));
        }
        transcript.push(ChatTurn::user(display_name, prompt));
        debug!(
            "Requesting completion for {} ({} turns)",
            display_name,
            transcript.len()
        );

        let result = tokio::time::timeout(self.timeout, service.complete(transcript.turns())).await;
        match result {
            Ok(Ok(reply)) => {
                info!("AI reply for {}: {}", display_name, reply);
                transcript.push(ChatTurn::assistant(&reply));
                Some(notice::ai_reply(&reply))
            }
            Ok(Err(e)) => {
                error!("Completion for {} failed: {}", display_name, e);
                None
            }
            Err(_) => {
                error!(
                    "Completion for {} timed out after {:?}",
                    display_name, self.timeout
                );
                None
            }
        }
    }
}
