use chatbot_entity::chat_session;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{DatabaseConnection, EntityTrait, PaginatorTrait, QueryOrder, QuerySelect};
use serde::Serialize;
use utoipa::ToSchema;

use super::error::ChatError;
use super::turn::Turn;

const RECENT_LIMIT: u64 = 5;

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecentConversation {
    pub session_id: String,
    pub start_time: DateTime<Utc>,
    pub first_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub total_conversations: u64,
    /// Count of distinct session ids, not of authenticated users.
    pub unique_users: u64,
    pub recent_conversations: Vec<RecentConversation>,
}

/// Read-only aggregates over stored transcripts for the admin dashboard.
#[derive(Clone)]
pub struct MetricsReader {
    db: DatabaseConnection,
}

impl MetricsReader {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn metrics(&self) -> Result<Metrics, ChatError> {
        let total_conversations = chat_session::Entity::find().count(&self.db).await?;

        let unique_users: Option<i64> = chat_session::Entity::find()
            .select_only()
            .column_as(Expr::cust("COUNT(DISTINCT session_id)"), "unique_users")
            .into_tuple()
            .one(&self.db)
            .await?;

        let recent = chat_session::Entity::find()
            .order_by_desc(chat_session::Column::StartTime)
            .limit(RECENT_LIMIT)
            .all(&self.db)
            .await?;

        let mut recent_conversations = Vec::with_capacity(recent.len());
        for row in recent {
            let messages: Vec<Turn> = serde_json::from_str(&row.messages)?;
            recent_conversations.push(RecentConversation {
                session_id: row.session_id,
                start_time: row.start_time,
                first_message: messages.into_iter().next().map(|t| t.text),
            });
        }

        Ok(Metrics {
            total_conversations,
            unique_users: unique_users.unwrap_or(0).max(0) as u64,
            recent_conversations,
        })
    }
}
