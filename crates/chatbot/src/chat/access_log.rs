use chatbot_entity::access_log;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde::Serialize;
use tracing::debug;
use utoipa::ToSchema;

use super::error::ChatError;
use crate::utils::time_format::local_date_and_time;

/// One access event as returned to callers. Field names follow the
/// historical log collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct AccessLogEntry {
    #[serde(rename = "col_data")]
    pub date: String,
    #[serde(rename = "col_hora")]
    pub time: String,
    #[serde(rename = "col_IP")]
    pub ip: String,
    #[serde(rename = "col_acao")]
    pub action: String,
}

impl From<access_log::Model> for AccessLogEntry {
    fn from(model: access_log::Model) -> Self {
        Self {
            date: model.col_data,
            time: model.col_hora,
            ip: model.col_ip,
            action: model.col_acao,
        }
    }
}

fn required(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Append-only sink. There is no update or delete path.
#[derive(Clone)]
pub struct AccessLogSink {
    db: DatabaseConnection,
}

impl AccessLogSink {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Appends one entry stamped with the server's local date and time.
    pub async fn record(&self, ip: Option<&str>, action: Option<&str>) -> Result<AccessLogEntry, ChatError> {
        let (Some(ip), Some(action)) = (required(ip), required(action)) else {
            return Err(ChatError::invalid(
                "Dados de log incompletos (IP e ação são obrigatórios).",
            ));
        };
        let (date, time) = local_date_and_time();

        let inserted = access_log::ActiveModel {
            col_data: Set(date),
            col_hora: Set(time),
            col_ip: Set(ip.to_string()),
            col_acao: Set(action.to_string()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        debug!("access log #{} recorded: {} {}", inserted.id, inserted.col_ip, inserted.col_acao);
        Ok(inserted.into())
    }
}
