use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::chat::Turn;

/// Every field is optional on the wire so that a missing one is reported
/// as a 400 with a readable message rather than a deserialization failure.
#[derive(Deserialize, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Prior turns as held by the client. Missing means a new conversation.
    pub historico: Option<Vec<Turn>>,
    pub nova_mensagem: Option<String>,
    /// When present the server stores the updated transcript itself.
    pub session_id: Option<String>,
    pub bot_id: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
}

#[derive(Deserialize, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct LegacyChatRequest {
    pub session_id: Option<String>,
    pub message: Option<String>,
}

#[derive(Deserialize, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClearSessionRequest {
    pub session_id: Option<String>,
}

#[derive(Deserialize, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct SaveHistoryRequest {
    pub session_id: Option<String>,
    pub bot_id: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub messages: Option<Vec<Turn>>,
}

#[derive(Deserialize, ToSchema, Default)]
pub struct LogConnectionRequest {
    pub ip: Option<String>,
    pub acao: Option<String>,
}

#[derive(Deserialize, ToSchema, Default)]
pub struct BotConfigRequest {
    pub personality: Option<String>,
}

#[derive(Deserialize, ToSchema, Default)]
pub struct CredentialsRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesRequest {
    /// Empty or missing clears the override.
    pub custom_system_instruction: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LogsQuery {
    /// `error`, `warn`, `info` or `debug`
    pub level: Option<String>,
    /// Defaults to 100, capped at the buffer size.
    pub limit: Option<usize>,
}
