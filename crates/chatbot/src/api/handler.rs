use axum::extract::{Path, Query, State};
use axum::http::header::SET_COOKIE;
use axum::http::StatusCode;
use axum::response::AppendHeaders;
use axum::Json;
use chrono::Utc;
use tracing::{info, warn};
use utoipa::OpenApi;

use super::auth::{ApiJson, CurrentUser, OpenAPIAuth, RequireAdmin, RequireUser};
use super::error::{ApiError, ErrorBody};
use super::request::{
    BotConfigRequest, ChatRequest, ClearSessionRequest, CredentialsRequest, LegacyChatRequest, LogConnectionRequest,
    LogsQuery, PreferencesRequest, SaveHistoryRequest,
};
use super::response::{
    AuthResponse, ChatResponse, HealthResponse, LegacyChatResponse, LogConnectionResponse, LogsResponse,
    MessageResponse, NewSessionResponse, PersonalityResponse, PreferencesResponse, SaveHistoryResponse,
    SessionStatusResponse,
};
use super::AppState;
use crate::auth::cookie::{expired_cookie, session_cookie};
use crate::chat::metrics::Metrics;
use crate::chat::transcript::{SessionRecord, StoredSession};
use crate::chat::{ChatError, PersistTarget, SessionId, Speaker};
use crate::database;
use crate::utils::log_buffer::{recent_logs, LogLevel, LOG_BUFFER_CAPACITY};

#[derive(OpenApi)]
#[openapi(
    paths(
        chat,
        legacy_chat,
        clear_session,
        new_session,
        save_history,
        list_histories,
        get_history,
        log_connection,
        get_bot_config,
        update_bot_config,
        get_metrics,
        get_logs,
        register,
        login,
        logout,
        session_status,
        get_preferences,
        update_preferences,
        health
    ),
    modifiers(&OpenAPIAuth)
)]
pub struct ApiDoc;

type SetCookie = AppendHeaders<[(axum::http::HeaderName, String); 1]>;

/// Sends a message with the client-held history.
#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, body = ChatResponse, description = "Model reply, or an advisory when the model is unavailable"),
        (status = 400, body = ErrorBody),
        (status = 401, body = ErrorBody),
    )
)]
pub async fn chat(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(request): ApiJson<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    if state.config.accounts_enabled && current.user.is_none() {
        return Err(ApiError::unauthenticated());
    }
    let speaker = current
        .user
        .map(|user| Speaker {
            user_id: user.user_id,
            username: Some(user.username),
        })
        .unwrap_or_default();

    let target = match request.session_id.as_deref() {
        Some(raw) => Some(PersistTarget {
            session_id: SessionId::from_request(Some(raw))?,
            bot_id: request.bot_id,
            start_time: request.start_time,
        }),
        None => None,
    };
    let session_id = target.as_ref().map(|t| t.session_id.to_string());

    let outcome = state
        .chat
        .exchange(
            &speaker,
            request.historico.unwrap_or_default(),
            request.nova_mensagem.as_deref(),
            target,
        )
        .await?;

    Ok(Json(ChatResponse {
        resposta: outcome.reply.text,
        historico: outcome.transcript,
        session_id,
        persisted: outcome.persisted,
    }))
}

/// Sends a message for a session whose history the server keeps.
#[utoipa::path(
    post,
    path = "/chat",
    request_body = LegacyChatRequest,
    responses(
        (status = 200, body = LegacyChatResponse),
        (status = 400, body = ErrorBody),
    )
)]
pub async fn legacy_chat(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LegacyChatRequest>,
) -> Result<Json<LegacyChatResponse>, ApiError> {
    let session_id = SessionId::from_request(request.session_id.as_deref())?;
    let outcome = state
        .chat
        .legacy_exchange(session_id, request.message.as_deref())
        .await?;
    Ok(Json(LegacyChatResponse {
        reply: outcome.reply.text,
    }))
}

/// Deletes the stored transcript of a session.
#[utoipa::path(
    post,
    path = "/clear_session",
    request_body = ClearSessionRequest,
    responses(
        (status = 200, body = MessageResponse),
        (status = 400, body = ErrorBody),
        (status = 404, body = ErrorBody),
    )
)]
pub async fn clear_session(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ClearSessionRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let session_id = SessionId::from_request(request.session_id.as_deref())?;
    state.chat.clear(&session_id).await?;
    Ok(Json(MessageResponse {
        message: format!("Sessão {} limpa com sucesso.", session_id),
    }))
}

#[utoipa::path(get, path = "/api/session/new", responses((status = 200, body = NewSessionResponse)))]
pub async fn new_session() -> Json<NewSessionResponse> {
    Json(NewSessionResponse {
        session_id: SessionId::mint().to_string(),
    })
}

/// Stores a transcript the client assembled itself.
#[utoipa::path(
    post,
    path = "/api/chat/salvar-historico",
    request_body = SaveHistoryRequest,
    responses(
        (status = 201, body = SaveHistoryResponse),
        (status = 400, body = ErrorBody),
        (status = 500, body = ErrorBody),
    )
)]
pub async fn save_history(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(request): ApiJson<SaveHistoryRequest>,
) -> Result<(StatusCode, Json<SaveHistoryResponse>), ApiError> {
    let (Some(session_id), Some(bot_id), Some(start_time), Some(messages)) =
        (request.session_id, request.bot_id, request.start_time, request.messages)
    else {
        return Err(ApiError::bad_request("Dados incompletos para salvar o histórico."));
    };
    let session_id = SessionId::from_request(Some(&session_id))?;

    let record = SessionRecord {
        session_id: session_id.to_string(),
        user_id: current.user.map(|u| u.username),
        bot_id,
        start_time,
        end_time: Some(request.end_time.unwrap_or_else(Utc::now)),
        messages,
    };
    // awaited so a store failure is reported, but not cancelled by a dropped client
    state
        .chat
        .transcripts()
        .persist_detached(record)
        .await
        .map_err(ChatError::from)??;

    Ok((
        StatusCode::CREATED,
        Json(SaveHistoryResponse {
            message: "Histórico de chat salvo com sucesso.".to_string(),
            session_id: session_id.to_string(),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/chat/historicos",
    responses((status = 200, body = Vec<StoredSession>), (status = 500, body = ErrorBody))
)]
pub async fn list_histories(State(state): State<AppState>) -> Result<Json<Vec<StoredSession>>, ApiError> {
    Ok(Json(state.chat.transcripts().list().await?))
}

#[utoipa::path(
    get,
    path = "/api/chat/historicos/{session_id}",
    params(("session_id" = String, Path, description = "Conversation id")),
    responses((status = 200, body = StoredSession), (status = 404, body = ErrorBody))
)]
pub async fn get_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<StoredSession>, ApiError> {
    state
        .chat
        .transcripts()
        .find(&session_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Sessão não encontrada.".to_string()))
}

/// Records a client connection event.
#[utoipa::path(
    post,
    path = "/api/log-connection",
    request_body = LogConnectionRequest,
    responses(
        (status = 201, body = LogConnectionResponse),
        (status = 400, body = ErrorBody),
        (status = 500, body = ErrorBody),
    )
)]
pub async fn log_connection(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LogConnectionRequest>,
) -> Result<(StatusCode, Json<LogConnectionResponse>), ApiError> {
    let entry = state
        .access_log
        .record(request.ip.as_deref(), request.acao.as_deref())
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(LogConnectionResponse {
            message: "Log registrado com sucesso!".to_string(),
            data: entry,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/admin/bot-config",
    responses((status = 200, body = PersonalityResponse), (status = 401, body = ErrorBody)),
    security(("Session" = []))
)]
pub async fn get_bot_config(
    State(state): State<AppState>,
    _admin: RequireAdmin,
) -> Result<Json<PersonalityResponse>, ApiError> {
    Ok(Json(PersonalityResponse {
        personality: state.chat.personalities().effective_global().await?,
    }))
}

#[utoipa::path(
    post,
    path = "/api/admin/bot-config",
    request_body = BotConfigRequest,
    responses(
        (status = 200, body = PersonalityResponse),
        (status = 400, body = ErrorBody),
        (status = 401, body = ErrorBody),
    ),
    security(("Session" = []))
)]
pub async fn update_bot_config(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(request): ApiJson<BotConfigRequest>,
) -> Result<Json<PersonalityResponse>, ApiError> {
    let personality = request
        .personality
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::bad_request("O campo personality é obrigatório."))?;
    state.chat.personalities().set_global(&personality).await?;
    info!("global personality changed by {}", admin.username);
    Ok(Json(PersonalityResponse { personality }))
}

#[utoipa::path(
    get,
    path = "/api/admin/metrics",
    responses((status = 200, body = Metrics), (status = 401, body = ErrorBody), (status = 500, body = ErrorBody)),
    security(("Session" = []))
)]
pub async fn get_metrics(State(state): State<AppState>, _admin: RequireAdmin) -> Result<Json<Metrics>, ApiError> {
    Ok(Json(state.metrics.metrics().await?))
}

/// Recent server log lines, newest first.
#[utoipa::path(
    get,
    path = "/api/admin/logs",
    params(LogsQuery),
    responses((status = 200, body = LogsResponse), (status = 401, body = ErrorBody)),
    security(("Session" = []))
)]
pub async fn get_logs(_admin: RequireAdmin, Query(query): Query<LogsQuery>) -> Json<LogsResponse> {
    let level = query.level.as_deref().and_then(LogLevel::parse);
    let limit = query.limit.unwrap_or(100).min(LOG_BUFFER_CAPACITY);
    let logs = recent_logs(level, limit);
    Json(LogsResponse {
        total: logs.len(),
        logs,
    })
}

#[utoipa::path(
    post,
    path = "/api/register",
    request_body = CredentialsRequest,
    responses(
        (status = 201, body = AuthResponse),
        (status = 400, body = ErrorBody),
        (status = 409, body = ErrorBody),
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CredentialsRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let created = state
        .auth
        .register(request.username.as_deref(), request.password.as_deref())
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "Usuário registrado com sucesso.".to_string(),
            username: created.username,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/api/login",
    request_body = CredentialsRequest,
    responses(
        (status = 200, body = AuthResponse, description = "Sets the session cookie"),
        (status = 400, body = ErrorBody),
        (status = 401, body = ErrorBody),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CredentialsRequest>,
) -> Result<(SetCookie, Json<AuthResponse>), ApiError> {
    let (session_id, user) = state
        .auth
        .login(request.username.as_deref(), request.password.as_deref())
        .await?;
    let cookie = session_cookie(&state.config.session_key, &session_id, state.config.session_ttl);
    Ok((
        AppendHeaders([(SET_COOKIE, cookie.to_string())]),
        Json(AuthResponse {
            message: "Login realizado com sucesso.".to_string(),
            username: user.username,
        }),
    ))
}

#[utoipa::path(post, path = "/api/logout", responses((status = 200, body = MessageResponse)))]
pub async fn logout(State(state): State<AppState>, current: CurrentUser) -> Result<(SetCookie, Json<MessageResponse>), ApiError> {
    if let Some(session_id) = current.session_id {
        state.auth.logout(&session_id).await?;
    }
    Ok((
        AppendHeaders([(SET_COOKIE, expired_cookie().to_string())]),
        Json(MessageResponse {
            message: "Logout realizado com sucesso.".to_string(),
        }),
    ))
}

#[utoipa::path(get, path = "/api/session", responses((status = 200, body = SessionStatusResponse)))]
pub async fn session_status(current: CurrentUser) -> Json<SessionStatusResponse> {
    Json(match current.user {
        Some(user) => SessionStatusResponse {
            logged_in: true,
            username: Some(user.username),
            is_admin: user.is_admin,
        },
        None => SessionStatusResponse {
            logged_in: false,
            username: None,
            is_admin: false,
        },
    })
}

#[utoipa::path(
    get,
    path = "/api/user/preferences",
    responses((status = 200, body = PreferencesResponse), (status = 401, body = ErrorBody)),
    security(("Session" = []))
)]
pub async fn get_preferences(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<PreferencesResponse>, ApiError> {
    let custom_system_instruction = match user.user_id {
        Some(id) => state.chat.personalities().user_override(id).await?,
        None => None,
    };
    Ok(Json(PreferencesResponse {
        custom_system_instruction,
    }))
}

#[utoipa::path(
    put,
    path = "/api/user/preferences",
    request_body = PreferencesRequest,
    responses(
        (status = 200, body = PreferencesResponse),
        (status = 400, body = ErrorBody),
        (status = 401, body = ErrorBody),
    ),
    security(("Session" = []))
)]
pub async fn update_preferences(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiJson(request): ApiJson<PreferencesRequest>,
) -> Result<Json<PreferencesResponse>, ApiError> {
    let Some(user_id) = user.user_id else {
        warn!("{} tried to set personal preferences without an account", user.username);
        return Err(ApiError::bad_request("Esta conta não possui preferências."));
    };
    let custom_system_instruction = request
        .custom_system_instruction
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    state
        .chat
        .personalities()
        .set_user_override(user_id, custom_system_instruction.as_deref())
        .await?;
    Ok(Json(PreferencesResponse {
        custom_system_instruction,
    }))
}

#[utoipa::path(get, path = "/api/health", responses((status = 200, body = HealthResponse), (status = 500, body = ErrorBody)))]
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    database::ping(&state.db).await.map_err(anyhow::Error::from)?;
    Ok(Json(HealthResponse { status: "ok" }))
}
