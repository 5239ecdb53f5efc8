pub mod auth;
pub mod error;
pub mod handler;
pub mod request;
pub mod response;
#[cfg(test)]
mod tests;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use sea_orm::DatabaseConnection;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::AuthStore;
use crate::chat::access_log::AccessLogSink;
use crate::chat::metrics::MetricsReader;
use crate::chat::{ChatModel, ChatService, ModelGateway};
use crate::config::Config;

pub use handler::ApiDoc;

/// Shared by every handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: DatabaseConnection,
    pub chat: Arc<ChatService>,
    pub auth: AuthStore,
    pub access_log: AccessLogSink,
    pub metrics: MetricsReader,
}

impl AppState {
    pub fn new(config: Arc<Config>, db: DatabaseConnection, model: Arc<dyn ChatModel>) -> Self {
        let gateway = ModelGateway::new(model, config.gemini.timeout);
        Self {
            chat: Arc::new(ChatService::new(gateway, db.clone(), config.default_bot_id.clone())),
            auth: AuthStore::new(db.clone(), config.session_ttl, config.admin.clone()),
            access_log: AccessLogSink::new(db.clone()),
            metrics: MetricsReader::new(db.clone()),
            db,
            config,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(handler::chat))
        .route("/chat", post(handler::legacy_chat))
        .route("/clear_session", post(handler::clear_session))
        .route("/api/session/new", get(handler::new_session))
        .route("/api/chat/salvar-historico", post(handler::save_history))
        .route("/api/chat/historicos", get(handler::list_histories))
        .route("/api/chat/historicos/{session_id}", get(handler::get_history))
        .route("/api/log-connection", post(handler::log_connection))
        .route(
            "/api/admin/bot-config",
            get(handler::get_bot_config).post(handler::update_bot_config),
        )
        .route("/api/admin/metrics", get(handler::get_metrics))
        .route("/api/admin/logs", get(handler::get_logs))
        .route("/api/register", post(handler::register))
        .route("/api/login", post(handler::login))
        .route("/api/logout", post(handler::logout))
        .route("/api/session", get(handler::session_status))
        .route(
            "/api/user/preferences",
            get(handler::get_preferences).put(handler::update_preferences),
        )
        .route("/api/health", get(handler::health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
