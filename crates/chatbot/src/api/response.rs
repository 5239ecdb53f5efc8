use serde::Serialize;
use utoipa::ToSchema;

use crate::chat::access_log::AccessLogEntry;
use crate::chat::Turn;
use crate::utils::log_buffer::LogEntry;

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub resposta: String,
    /// The transcript to send back with the next message.
    pub historico: Vec<Turn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Whether the server stored the transcript, when it was asked to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persisted: Option<bool>,
}

#[derive(Serialize, ToSchema)]
pub struct LegacyChatResponse {
    pub reply: String,
}

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveHistoryResponse {
    pub message: String,
    pub session_id: String,
}

#[derive(Serialize, ToSchema)]
pub struct LogConnectionResponse {
    pub message: String,
    pub data: AccessLogEntry,
}

#[derive(Serialize, ToSchema)]
pub struct PersonalityResponse {
    pub personality: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub message: String,
    pub username: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusResponse {
    pub logged_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub is_admin: bool,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesResponse {
    pub custom_system_instruction: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewSessionResponse {
    pub session_id: String,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Serialize, ToSchema)]
pub struct LogsResponse {
    pub logs: Vec<LogEntry>,
    pub total: usize,
}
