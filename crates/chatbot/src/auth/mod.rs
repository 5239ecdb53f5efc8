//! Accounts and server-side login sessions.

pub mod cookie;
pub mod password;

use chatbot_entity::{auth_session, user};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set, SqlErr,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::AdminCredentials;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("Usuário ou senha inválidos.")]
    InvalidCredentials,
    #[error("{0}")]
    Conflict(String),
    #[error("store error: {0}")]
    Store(#[from] DbErr),
    #[error("password hashing failed: {0}")]
    Hash(#[from] password::HashError),
    #[error("password task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// The authenticated caller behind a session cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    /// `None` for the configured admin, who has no account row.
    pub user_id: Option<i32>,
    pub username: String,
    pub is_admin: bool,
}

impl From<auth_session::Model> for SessionUser {
    fn from(model: auth_session::Model) -> Self {
        Self {
            user_id: model.user_id,
            username: model.username,
            is_admin: model.is_admin,
        }
    }
}

fn credentials<'a>(username: Option<&'a str>, password: Option<&'a str>) -> Result<(&'a str, &'a str), AuthError> {
    match (username.map(str::trim), password) {
        (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => Ok((u, p)),
        _ => Err(AuthError::InvalidRequest(
            "Usuário e senha são obrigatórios.".to_string(),
        )),
    }
}

/// Argon2 blocks for tens of milliseconds, so it runs on the blocking pool.
async fn hash_blocking(password: &str) -> Result<String, AuthError> {
    let password = password.to_string();
    Ok(tokio::task::spawn_blocking(move || password::hash_password(&password)).await??)
}

async fn verify_blocking(password: &str, stored: &str) -> Result<bool, AuthError> {
    let (password, stored) = (password.to_string(), stored.to_string());
    Ok(tokio::task::spawn_blocking(move || password::verify_password(&password, &stored)).await?)
}

#[derive(Clone)]
pub struct AuthStore {
    db: DatabaseConnection,
    ttl: chrono::Duration,
    admin: Option<AdminCredentials>,
}

impl AuthStore {
    pub fn new(db: DatabaseConnection, ttl: chrono::Duration, admin: Option<AdminCredentials>) -> Self {
        Self { db, ttl, admin }
    }

    pub async fn register(&self, username: Option<&str>, password: Option<&str>) -> Result<user::Model, AuthError> {
        let (username, password) = credentials(username, password)?;
        if self.admin.as_ref().is_some_and(|a| a.username == username) {
            return Err(AuthError::Conflict("Usuário já existe.".to_string()));
        }

        let password_hash = hash_blocking(password).await?;
        let created = user::ActiveModel {
            username: Set(username.to_string()),
            password_hash: Set(password_hash),
            custom_system_instruction: Set(None),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .map_err(|e| match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => AuthError::Conflict("Usuário já existe.".to_string()),
            _ => AuthError::Store(e),
        })?;

        info!("user registered: {}", created.username);
        Ok(created)
    }

    /// Checks the credentials and opens a session. Returns the new session id.
    pub async fn login(
        &self,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<(String, SessionUser), AuthError> {
        let (username, password) = credentials(username, password)?;

        let session_user = match &self.admin {
            Some(admin) if admin.username == username => {
                if !verify_blocking(password, &admin.password_hash).await? {
                    warn!("failed admin login attempt");
                    return Err(AuthError::InvalidCredentials);
                }
                SessionUser {
                    user_id: None,
                    username: username.to_string(),
                    is_admin: true,
                }
            }
            _ => {
                let account = user::Entity::find()
                    .filter(user::Column::Username.eq(username))
                    .one(&self.db)
                    .await?;
                let verified = match &account {
                    Some(account) => verify_blocking(password, &account.password_hash).await?,
                    None => false,
                };
                match account {
                    Some(account) if verified => SessionUser {
                        user_id: Some(account.id),
                        username: account.username,
                        is_admin: false,
                    },
                    _ => {
                        debug!("failed login for {}", username);
                        return Err(AuthError::InvalidCredentials);
                    }
                }
            }
        };

        let session_id = uuid::Uuid::new_v4().simple().to_string();
        auth_session::ActiveModel {
            id: Set(session_id.clone()),
            user_id: Set(session_user.user_id),
            username: Set(session_user.username.clone()),
            is_admin: Set(session_user.is_admin),
            expires_at: Set(Utc::now() + self.ttl),
        }
        .insert(&self.db)
        .await?;

        info!("{} logged in{}", session_user.username, if session_user.is_admin { " (admin)" } else { "" });
        Ok((session_id, session_user))
    }

    pub async fn logout(&self, session_id: &str) -> Result<(), AuthError> {
        auth_session::Entity::delete_by_id(session_id.to_string())
            .exec(&self.db)
            .await?;
        Ok(())
    }

    /// The live session behind `session_id`. Expired sessions are removed on
    /// sight.
    pub async fn lookup(&self, session_id: &str) -> Result<Option<SessionUser>, AuthError> {
        let Some(session) = auth_session::Entity::find_by_id(session_id.to_string())
            .one(&self.db)
            .await?
        else {
            return Ok(None);
        };
        if session.expires_at <= Utc::now() {
            self.logout(session_id).await?;
            return Ok(None);
        }
        Ok(Some(session.into()))
    }

    pub async fn purge_expired(&self) -> Result<u64, AuthError> {
        let result = auth_session::Entity::delete_many()
            .filter(auth_session::Column::ExpiresAt.lte(Utc::now()))
            .exec(&self.db)
            .await?;
        if result.rows_affected > 0 {
            debug!("purged {} expired login sessions", result.rows_affected);
        }
        Ok(result.rows_affected)
    }
}
