use chatbot_entity::{bot_config, user};
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, IntoActiveModel, Set};
use tracing::info;

use super::error::ChatError;

/// Key of the single global personality row.
pub const GLOBAL_CONFIG_KEY: &str = "global";

/// Used when neither a user override nor a global value is set.
pub const DEFAULT_PERSONALITY: &str = "You are a helpful assistant.";

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// First non-empty of user override, global value, built-in default.
pub fn pick_personality(user_override: Option<String>, global: Option<String>) -> String {
    non_empty(user_override)
        .or_else(|| non_empty(global))
        .unwrap_or_else(|| DEFAULT_PERSONALITY.to_string())
}

/// Reads and writes the system instruction at its two scopes.
#[derive(Clone)]
pub struct PersonalityResolver {
    db: DatabaseConnection,
}

impl PersonalityResolver {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Effective instruction for an (optionally authenticated) user.
    pub async fn resolve(&self, user_id: Option<i32>) -> Result<String, ChatError> {
        let user_override = match user_id {
            Some(id) => self.user_override(id).await?,
            None => None,
        };
        if let Some(instruction) = non_empty(user_override) {
            return Ok(instruction);
        }
        Ok(pick_personality(None, self.global().await?))
    }

    /// Raw stored global value, if any.
    pub async fn global(&self) -> Result<Option<String>, ChatError> {
        Ok(bot_config::Entity::find_by_id(GLOBAL_CONFIG_KEY.to_string())
            .one(&self.db)
            .await?
            .map(|row| row.personality))
    }

    /// Global value with the built-in default applied.
    pub async fn effective_global(&self) -> Result<String, ChatError> {
        Ok(pick_personality(None, self.global().await?))
    }

    /// Upserts the global row under its fixed key.
    pub async fn set_global(&self, personality: &str) -> Result<(), ChatError> {
        let row = bot_config::ActiveModel {
            config_key: Set(GLOBAL_CONFIG_KEY.to_string()),
            personality: Set(personality.to_string()),
            updated_at: Set(Utc::now()),
        };
        bot_config::Entity::insert(row)
            .on_conflict(
                OnConflict::column(bot_config::Column::ConfigKey)
                    .update_columns([bot_config::Column::Personality, bot_config::Column::UpdatedAt])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        info!("global personality updated ({} chars)", personality.chars().count());
        Ok(())
    }

    pub async fn user_override(&self, user_id: i32) -> Result<Option<String>, ChatError> {
        Ok(user::Entity::find_by_id(user_id)
            .one(&self.db)
            .await?
            .and_then(|u| u.custom_system_instruction))
    }

    /// Sets (or, with `None`, clears) a user's override.
    pub async fn set_user_override(&self, user_id: i32, instruction: Option<&str>) -> Result<(), ChatError> {
        let row = user::Entity::find_by_id(user_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ChatError::NotFound(format!("user {user_id} not found")))?;
        let mut active = row.into_active_model();
        active.custom_system_instruction = Set(instruction.map(str::to_string));
        active.update(&self.db).await?;
        Ok(())
    }
}
