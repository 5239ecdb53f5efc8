use chatbot_entity::chat_session;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use utoipa::ToSchema;

use super::error::ChatError;
use super::turn::Turn;

/// Stored in `user_id` when the exchange had no authenticated user.
pub const ANONYMOUS_USER: &str = "anonimo";

/// Everything needed to (re)write one conversation document.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub session_id: String,
    pub user_id: Option<String>,
    pub bot_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub messages: Vec<Turn>,
}

/// A conversation as read back from the store.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    pub session_id: String,
    pub user_id: String,
    pub bot_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub messages: Vec<Turn>,
    pub logged_at: DateTime<Utc>,
}

impl TryFrom<chat_session::Model> for StoredSession {
    type Error = ChatError;

    fn try_from(model: chat_session::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            messages: serde_json::from_str(&model.messages)?,
            session_id: model.session_id,
            user_id: model.user_id,
            bot_id: model.bot_id,
            start_time: model.start_time,
            end_time: model.end_time,
            logged_at: model.logged_at,
        })
    }
}

/// Full-document store for conversation transcripts, keyed by session id.
///
/// Writes are a single `INSERT ... ON CONFLICT(session_id) DO UPDATE`, so two
/// racing writers for one session leave exactly one document and the later
/// write wins. Writes are not otherwise sequenced.
#[derive(Clone)]
pub struct TranscriptStore {
    db: DatabaseConnection,
}

impl TranscriptStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Inserts the document or replaces it wholesale.
    pub async fn persist(&self, record: &SessionRecord) -> Result<(), ChatError> {
        let messages = serde_json::to_string(&record.messages)?;
        let model = chat_session::ActiveModel {
            session_id: Set(record.session_id.clone()),
            user_id: Set(record
                .user_id
                .clone()
                .unwrap_or_else(|| ANONYMOUS_USER.to_string())),
            bot_id: Set(record.bot_id.clone()),
            start_time: Set(record.start_time),
            end_time: Set(record.end_time),
            messages: Set(messages),
            logged_at: Set(Utc::now()),
            ..Default::default()
        };

        chat_session::Entity::insert(model)
            .on_conflict(
                OnConflict::column(chat_session::Column::SessionId)
                    .update_columns([
                        chat_session::Column::UserId,
                        chat_session::Column::BotId,
                        chat_session::Column::StartTime,
                        chat_session::Column::EndTime,
                        chat_session::Column::Messages,
                        chat_session::Column::LoggedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        debug!(
            "[{}] transcript persisted, {} messages",
            record.session_id,
            record.messages.len()
        );
        Ok(())
    }

    /// Persists on a detached task: dropping the handle (for example because
    /// the client went away) does not cancel the write.
    pub fn persist_detached(&self, record: SessionRecord) -> JoinHandle<Result<(), ChatError>> {
        let store = self.clone();
        tokio::spawn(async move {
            let result = store.persist(&record).await;
            if let Err(e) = &result {
                error!("[{}] failed to persist transcript: {}", record.session_id, e);
            }
            result
        })
    }

    pub async fn find(&self, session_id: &str) -> Result<Option<StoredSession>, ChatError> {
        chat_session::Entity::find()
            .filter(chat_session::Column::SessionId.eq(session_id))
            .one(&self.db)
            .await?
            .map(StoredSession::try_from)
            .transpose()
    }

    /// All conversations, most recently started first.
    pub async fn list(&self) -> Result<Vec<StoredSession>, ChatError> {
        chat_session::Entity::find()
            .order_by_desc(chat_session::Column::StartTime)
            .all(&self.db)
            .await?
            .into_iter()
            .map(StoredSession::try_from)
            .collect()
    }

    /// Deletes the stored transcript. Returns `false` when there was none.
    pub async fn clear(&self, session_id: &str) -> Result<bool, ChatError> {
        let result = chat_session::Entity::delete_many()
            .filter(chat_session::Column::SessionId.eq(session_id))
            .exec(&self.db)
            .await?;
        if result.rows_affected > 0 {
            info!("[{}] session cleared", session_id);
        }
        Ok(result.rows_affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::{EntityTrait, PaginatorTrait};

    use super::*;
    use crate::database::setup_memory_database;

    fn record(session_id: &str, messages: Vec<Turn>) -> SessionRecord {
        SessionRecord {
            session_id: session_id.to_string(),
            user_id: None,
            bot_id: "chatbotPrincipalIFCODE".to_string(),
            start_time: Utc::now(),
            end_time: Some(Utc::now()),
            messages,
        }
    }

    fn pair(n: usize) -> Vec<Turn> {
        vec![Turn::user(format!("pergunta {n}")), Turn::model(format!("resposta {n}"))]
    }

    #[tokio::test]
    async fn test_persist_twice_is_idempotent() {
        let store = TranscriptStore::new(setup_memory_database().await);
        let rec = record("s1", pair(1));

        store.persist(&rec).await.unwrap();
        let first = store.find("s1").await.unwrap().unwrap();
        store.persist(&rec).await.unwrap();
        let second = store.find("s1").await.unwrap().unwrap();

        assert_eq!(first.messages, second.messages);
        assert_eq!(first.start_time, second.start_time);
        assert!(second.logged_at >= first.logged_at);
        assert_eq!(first.user_id, ANONYMOUS_USER);
    }

    #[tokio::test]
    async fn test_sequential_persists_replace_not_append() {
        let db = setup_memory_database().await;
        let store = TranscriptStore::new(db.clone());

        let t1 = pair(1);
        let mut t2 = t1.clone();
        t2.extend(pair(2));

        store.persist(&record("s1", t1)).await.unwrap();
        store.persist(&record("s1", t2.clone())).await.unwrap();

        assert_eq!(chat_session::Entity::find().count(&db).await.unwrap(), 1);
        let stored = store.find("s1").await.unwrap().unwrap();
        assert_eq!(stored.messages.len(), 4);
        assert_eq!(stored.messages, t2);
    }

    #[tokio::test]
    async fn test_racing_persists_leave_one_document_last_write_wins() {
        let db = setup_memory_database().await;
        let store = TranscriptStore::new(db.clone());

        let a = record("race", pair(1));
        let b = record("race", pair(2));
        let (ra, rb) = tokio::join!(store.persist(&a), store.persist(&b));
        ra.unwrap();
        rb.unwrap();

        assert_eq!(chat_session::Entity::find().count(&db).await.unwrap(), 1);
        let stored = store.find("race").await.unwrap().unwrap();
        assert!(stored.messages == a.messages || stored.messages == b.messages);
    }

    #[tokio::test]
    async fn test_detached_persist_survives_dropped_handle() {
        let store = TranscriptStore::new(setup_memory_database().await);
        drop(store.persist_detached(record("detached", pair(1))));

        let mut found = None;
        for _ in 0..50 {
            found = store.find("detached").await.unwrap();
            if found.is_some() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(found.expect("persist should complete").messages, pair(1));
    }

    #[tokio::test]
    async fn test_list_orders_by_start_time_desc_and_clear() {
        let store = TranscriptStore::new(setup_memory_database().await);
        let mut older = record("old", pair(1));
        older.start_time = Utc::now() - chrono::Duration::hours(1);
        store.persist(&older).await.unwrap();
        store.persist(&record("new", pair(2))).await.unwrap();

        let ids: Vec<String> = store.list().await.unwrap().into_iter().map(|s| s.session_id).collect();
        assert_eq!(ids, vec!["new".to_string(), "old".to_string()]);

        assert!(store.clear("old").await.unwrap());
        assert!(!store.clear("old").await.unwrap());
        assert!(store.find("old").await.unwrap().is_none());
    }
}
