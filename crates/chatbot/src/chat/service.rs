//! One chat exchange, end to end: validate, resolve the personality, build
//! the model-call history, ask the model, and persist the new transcript.

use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use tracing::{error, info};

use super::error::ChatError;
use super::gateway::{GatewayReply, ModelGateway};
use super::history::{assemble_history, extend_transcript, validate_message};
use super::personality::PersonalityResolver;
use super::session_id::SessionId;
use super::transcript::{SessionRecord, TranscriptStore};
use super::turn::Turn;

/// Who is talking. Both fields are empty for anonymous callers.
#[derive(Debug, Clone, Default)]
pub struct Speaker {
    /// Account id, used for the personality override.
    pub user_id: Option<i32>,
    /// Stored as the transcript's owner.
    pub username: Option<String>,
}

/// Where the server should store the transcript after a model reply.
#[derive(Debug, Clone)]
pub struct PersistTarget {
    pub session_id: SessionId,
    pub bot_id: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
}

impl PersistTarget {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            bot_id: None,
            start_time: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExchangeOutcome {
    pub reply: GatewayReply,
    /// Prior turns plus the new pair on success, the prior turns unchanged
    /// when the reply is an advisory.
    pub transcript: Vec<Turn>,
    /// `None` when nothing was asked to be persisted or the reply was an
    /// advisory.
    pub persisted: Option<bool>,
}

pub struct ChatService {
    gateway: ModelGateway,
    personalities: PersonalityResolver,
    transcripts: TranscriptStore,
    default_bot_id: String,
}

impl ChatService {
    pub fn new(gateway: ModelGateway, db: DatabaseConnection, default_bot_id: impl Into<String>) -> Self {
        Self {
            gateway,
            personalities: PersonalityResolver::new(db.clone()),
            transcripts: TranscriptStore::new(db),
            default_bot_id: default_bot_id.into(),
        }
    }

    pub fn personalities(&self) -> &PersonalityResolver {
        &self.personalities
    }

    pub fn transcripts(&self) -> &TranscriptStore {
        &self.transcripts
    }

    /// Exchange over a client-held history. The message is checked before
    /// anything else, so an empty one never costs a store or model call.
    pub async fn exchange(
        &self,
        speaker: &Speaker,
        prior: Vec<Turn>,
        message: Option<&str>,
        target: Option<PersistTarget>,
    ) -> Result<ExchangeOutcome, ChatError> {
        let message = validate_message(message)?;
        let label = target
            .as_ref()
            .map(|t| t.session_id.to_string())
            .unwrap_or_else(|| "-".to_string());

        let personality = self.personalities.resolve(speaker.user_id).await?;
        let history = assemble_history(&prior, &personality);
        let reply = self.gateway.reply(&label, &history, message).await?;

        if !reply.is_model_reply() {
            info!("[{}] exchange degraded ({}), transcript left as is", label, reply.outcome);
            return Ok(ExchangeOutcome {
                reply,
                transcript: prior,
                persisted: None,
            });
        }

        let transcript = extend_transcript(prior, message, &reply.text);
        let persisted = match target {
            Some(target) => Some(self.persist(speaker, target, &transcript).await),
            None => None,
        };
        info!("[{}] exchange complete, transcript has {} turns", label, transcript.len());
        Ok(ExchangeOutcome {
            reply,
            transcript,
            persisted,
        })
    }

    /// Exchange for clients that only send a session id: the prior turns are
    /// rebuilt from the store on every call.
    pub async fn legacy_exchange(&self, session_id: SessionId, message: Option<&str>) -> Result<ExchangeOutcome, ChatError> {
        validate_message(message)?;
        let mut target = PersistTarget::new(session_id);
        let prior = match self.transcripts.find(target.session_id.as_str()).await? {
            Some(stored) => {
                target.bot_id = Some(stored.bot_id);
                target.start_time = Some(stored.start_time);
                stored.messages
            }
            None => Vec::new(),
        };
        self.exchange(&Speaker::default(), prior, message, Some(target)).await
    }

    /// Explicit reset of a conversation. `NotFound` when nothing was stored.
    pub async fn clear(&self, session_id: &SessionId) -> Result<(), ChatError> {
        if self.transcripts.clear(session_id.as_str()).await? {
            Ok(())
        } else {
            Err(ChatError::NotFound("Sessão não encontrada.".to_string()))
        }
    }

    async fn persist(&self, speaker: &Speaker, target: PersistTarget, transcript: &[Turn]) -> bool {
        let now = Utc::now();
        let start_time = match target.start_time {
            Some(start) => start,
            None => match self.transcripts.find(target.session_id.as_str()).await {
                Ok(Some(stored)) => stored.start_time,
                Ok(None) => now,
                Err(e) => {
                    error!("[{}] could not read stored transcript: {}", target.session_id, e);
                    return false;
                }
            },
        };
        let record = SessionRecord {
            session_id: target.session_id.as_str().to_string(),
            user_id: speaker.username.clone(),
            bot_id: target.bot_id.unwrap_or_else(|| self.default_bot_id.clone()),
            start_time,
            end_time: Some(now),
            messages: transcript.to_vec(),
        };
        match self.transcripts.persist_detached(record).await {
            Ok(result) => result.is_ok(),
            Err(e) => {
                error!("[{}] persist task did not finish: {}", target.session_id, e);
                false
            }
        }
    }
}
