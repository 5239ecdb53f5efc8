use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use super::error::{ChatError, ProviderError};
use super::turn::Turn;

pub const RATE_LIMITED_REPLY: &str =
    "🤖 Estou recebendo muitas perguntas agora. Por favor, tente novamente em instantes.";
pub const CONTEXT_TOO_LARGE_REPLY: &str =
    "🤖 Nossa conversa ficou muito longa. Por favor, inicie uma nova conversa.";
pub const PROVIDER_ERROR_REPLY: &str =
    "🤖 Desculpe, não consegui processar sua pergunta com a IA do Google no momento.";

/// A language model: given the ordered history and a new user message,
/// produce a reply or a classified failure.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn generate(&self, history: &[Turn], message: &str) -> Result<String, ProviderError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Outcome {
    Replied,
    RateLimited,
    ContextTooLarge,
    ProviderFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayReply {
    pub text: String,
    pub outcome: Outcome,
}

impl GatewayReply {
    /// `true` when the text came from the model rather than an advisory.
    pub fn is_model_reply(&self) -> bool {
        self.outcome == Outcome::Replied
    }

    fn advisory(outcome: Outcome) -> Self {
        let text = match outcome {
            Outcome::RateLimited => RATE_LIMITED_REPLY,
            Outcome::ContextTooLarge => CONTEXT_TOO_LARGE_REPLY,
            Outcome::Replied | Outcome::ProviderFailed => PROVIDER_ERROR_REPLY,
        };
        Self {
            text: text.to_string(),
            outcome,
        }
    }
}

/// Wraps a [`ChatModel`] with a bounded wait and the degrade-to-message
/// policy. Exactly one attempt is made per call.
pub struct ModelGateway {
    model: Arc<dyn ChatModel>,
    timeout: Duration,
}

impl ModelGateway {
    pub fn new(model: Arc<dyn ChatModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    /// Single classified attempt.
    pub async fn send(&self, history: &[Turn], message: &str) -> Result<String, ProviderError> {
        if message.trim().is_empty() {
            return Err(ProviderError::InvalidInput);
        }
        match tokio::time::timeout(self.timeout, self.model.generate(history, message)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Provider(format!(
                "no reply within {}s",
                self.timeout.as_secs()
            ))),
        }
    }

    /// Like [`send`](Self::send), but every provider failure becomes an
    /// advisory reply. Only an empty message is returned as an error.
    pub async fn reply(&self, session: &str, history: &[Turn], message: &str) -> Result<GatewayReply, ChatError> {
        debug!("[{}] sending {} turns + new message to model", session, history.len());
        match self.send(history, message).await {
            Ok(text) => Ok(GatewayReply {
                text,
                outcome: Outcome::Replied,
            }),
            Err(ProviderError::InvalidInput) => Err(ChatError::invalid("Mensagem vazia.")),
            Err(ProviderError::RateLimited(detail)) => {
                warn!("[{}] model rate limited: {}", session, detail);
                Ok(GatewayReply::advisory(Outcome::RateLimited))
            }
            Err(ProviderError::ContextTooLarge(detail)) => {
                warn!("[{}] conversation too long for the model: {}", session, detail);
                Ok(GatewayReply::advisory(Outcome::ContextTooLarge))
            }
            Err(ProviderError::Provider(detail)) => {
                error!("[{}] model call failed: {}", session, detail);
                Ok(GatewayReply::advisory(Outcome::ProviderFailed))
            }
        }
    }
}
