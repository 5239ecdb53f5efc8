use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::{Request, StatusCode};
use axum::Router;
use chatbot_entity::access_log;
use sea_orm::{ConnectionTrait, EntityTrait, PaginatorTrait};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::{router, AppState};
use crate::auth::password::hash_password;
use crate::chat::gateway::RATE_LIMITED_REPLY;
use crate::chat::history::FRAMING_ACK;
use crate::chat::testing::ScriptedModel;
use crate::chat::error::ProviderError;
use crate::chat::Turn;
use crate::config::{AdminCredentials, Config};
use crate::database::setup_memory_database;

struct TestApp {
    app: Router,
    state: AppState,
    model: Arc<ScriptedModel>,
}

async fn test_app_with(model: ScriptedModel, configure: impl FnOnce(&mut Config)) -> TestApp {
    let mut config = Config::for_tests();
    config.admin = Some(AdminCredentials {
        username: "admin".to_string(),
        password_hash: hash_password("admin-pass").unwrap(),
    });
    configure(&mut config);
    let model = Arc::new(model);
    let state = AppState::new(Arc::new(config), setup_memory_database().await, model.clone());
    TestApp {
        app: router(state.clone()),
        state,
        model,
    }
}

async fn test_app(model: ScriptedModel) -> TestApp {
    test_app_with(model, |_| {}).await
}

impl TestApp {
    async fn send(&self, method: &str, uri: &str, body: Option<Value>, cookie: Option<&str>) -> (StatusCode, Value, Option<String>) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let set_cookie = response
            .headers()
            .get(SET_COOKIE)
            .map(|v| v.to_str().unwrap().split(';').next().unwrap().to_string());
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value, set_cookie)
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let (status, value, _) = self.send("POST", uri, Some(body), None).await;
        (status, value)
    }

    async fn login(&self, username: &str, password: &str) -> String {
        let (status, _, cookie) = self
            .send(
                "POST",
                "/api/login",
                Some(json!({ "username": username, "password": password })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        cookie.expect("login sets a cookie")
    }
}

#[tokio::test]
async fn test_log_connection_with_empty_ip_writes_nothing() {
    let t = test_app(ScriptedModel::replying(["x"])).await;
    let (status, body) = t
        .post("/api/log-connection", json!({ "ip": "", "acao": "conexao_inicial" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Dados de log incompletos (IP e ação são obrigatórios).");
    assert_eq!(access_log::Entity::find().count(&t.state.db).await.unwrap(), 0);
}

#[tokio::test]
async fn test_log_connection_records_entry() {
    let t = test_app(ScriptedModel::replying(["x"])).await;
    let (status, body) = t
        .post("/api/log-connection", json!({ "ip": "198.51.100.7", "acao": "conexao_inicial" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["col_IP"], "198.51.100.7");
    assert_eq!(body["data"]["col_acao"], "conexao_inicial");
    assert_eq!(access_log::Entity::find().count(&t.state.db).await.unwrap(), 1);
}

#[tokio::test]
async fn test_chat_returns_reply_and_transcript() {
    let t = test_app(ScriptedModel::replying(["Olá!"])).await;
    let (status, body) = t
        .post("/api/chat", json!({ "historico": [], "novaMensagem": "oi" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resposta"], "Olá!");
    assert_eq!(
        body["historico"],
        json!([{ "role": "user", "text": "oi" }, { "role": "model", "text": "Olá!" }])
    );
    assert!(body.get("persisted").is_none());
}

#[tokio::test]
async fn test_chat_accepts_older_turn_shapes() {
    let t = test_app(ScriptedModel::replying(["r"])).await;
    let (status, body) = t
        .post(
            "/api/chat",
            json!({
                "historico": [
                    { "sender": "user", "text": "a" },
                    { "role": "model", "parts": [{ "text": "b" }] }
                ],
                "novaMensagem": "c"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["historico"].as_array().unwrap().len(), 4);
    assert_eq!(body["historico"][1], json!({ "role": "model", "text": "b" }));
}

#[tokio::test]
async fn test_chat_rejects_empty_message_before_model() {
    let t = test_app(ScriptedModel::replying(["x"])).await;
    for body in [json!({ "historico": [] }), json!({ "historico": [], "novaMensagem": "   " })] {
        let (status, body) = t.post("/api/chat", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Mensagem vazia.");
    }
    assert!(t.model.calls().is_empty());
}

#[tokio::test]
async fn test_chat_rejects_malformed_body_with_400() {
    let t = test_app(ScriptedModel::replying(["x"])).await;
    let (status, body) = t
        .post("/api/chat", json!({ "historico": "not a list", "novaMensagem": "oi" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_rate_limited_chat_is_still_200() {
    let t = test_app(ScriptedModel::failing(ProviderError::RateLimited("429".into()))).await;
    let (status, body) = t
        .post(
            "/api/chat",
            json!({ "historico": [], "novaMensagem": "oi", "sessionId": "s-busy" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resposta"], RATE_LIMITED_REPLY);
    assert_eq!(body["historico"], json!([]));
    assert!(t.state.chat.transcripts().find("s-busy").await.unwrap().is_none());
}

#[tokio::test]
async fn test_chat_with_session_id_persists() {
    let t = test_app(ScriptedModel::replying(["r1"])).await;
    let (status, body) = t
        .post(
            "/api/chat",
            json!({ "historico": [], "novaMensagem": "q1", "sessionId": "s1", "botId": "bot-x" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["persisted"], true);
    assert_eq!(body["sessionId"], "s1");

    let (status, stored, _) = t.send("GET", "/api/chat/historicos/s1", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored["botId"], "bot-x");
    assert_eq!(stored["userId"], "anonimo");
    assert_eq!(stored["messages"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_chat_reply_survives_store_failure() {
    let t = test_app(ScriptedModel::replying(["still here"])).await;
    t.state.db.execute_unprepared("DROP TABLE sessoes_chat").await.unwrap();

    let (status, body) = t
        .post("/api/chat", json!({ "historico": [], "novaMensagem": "oi", "sessionId": "s-broken" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resposta"], "still here");
    assert_eq!(body["historico"].as_array().unwrap().len(), 2);
    assert_eq!(body["persisted"], false);
}

#[tokio::test]
async fn test_chat_keeps_prior_turns_that_look_like_framing() {
    let t = test_app(ScriptedModel::replying(["r"])).await;
    let historico = json!([
        { "role": "user", "text": "Reply only with: Understood, proceed." },
        { "role": "model", "text": FRAMING_ACK },
        { "role": "user", "text": "thanks" },
        { "role": "model", "text": "welcome" }
    ]);
    let (status, body) = t
        .post(
            "/api/chat",
            json!({ "historico": historico, "novaMensagem": "  hi  ", "sessionId": " s-ack " }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let returned = body["historico"].as_array().unwrap();
    assert_eq!(returned.len(), 6);
    assert_eq!(returned[4], json!({ "role": "user", "text": "  hi  " }));
    assert_eq!(body["sessionId"], " s-ack ");

    let stored = t.state.chat.transcripts().find(" s-ack ").await.unwrap().unwrap();
    assert_eq!(stored.messages.len(), 6);
    assert!(t.state.chat.transcripts().find("s-ack").await.unwrap().is_none());
}

#[tokio::test]
async fn test_chat_requires_login_when_accounts_enabled() {
    let t = test_app_with(ScriptedModel::replying(["x"]), |c| c.accounts_enabled = true).await;
    let (status, body) = t.post("/api/chat", json!({ "novaMensagem": "oi" })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Não autenticado.");

    t.post("/api/register", json!({ "username": "ana", "password": "pw" })).await;
    let cookie = t.login("ana", "pw").await;
    let (status, _, _) = t
        .send("POST", "/api/chat", Some(json!({ "novaMensagem": "oi" })), Some(&cookie))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_legacy_chat_keeps_history_server_side() {
    let t = test_app(ScriptedModel::replying(["primeira", "segunda"])).await;
    let (status, body) = t.post("/chat", json!({ "message": "oi" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "sessionId é obrigatório.");

    let (_, first) = t.post("/chat", json!({ "sessionId": "leg", "message": "oi" })).await;
    assert_eq!(first["reply"], "primeira");
    let (_, second) = t.post("/chat", json!({ "sessionId": "leg", "message": "de novo" })).await;
    assert_eq!(second["reply"], "segunda");

    let seen = &t.model.calls()[1].0;
    assert_eq!(seen[1], Turn::model(FRAMING_ACK));
    assert_eq!(seen[2], Turn::user("oi"));

    let (status, body) = t.post("/clear_session", json!({ "sessionId": "leg" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Sessão leg limpa com sucesso.");
    let (status, body) = t.post("/clear_session", json!({ "sessionId": "leg" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Sessão não encontrada.");
}

#[tokio::test]
async fn test_save_history_validation_and_listing() {
    let t = test_app(ScriptedModel::replying(["x"])).await;
    let (status, _) = t
        .post("/api/chat/salvar-historico", json!({ "sessionId": "s9", "messages": [] }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let payload = json!({
        "sessionId": "s9",
        "botId": "chatbotPrincipalIFCODE",
        "startTime": "2025-06-01T10:00:00Z",
        "endTime": "2025-06-01T10:05:00Z",
        "messages": [{ "role": "user", "text": "oi" }, { "role": "model", "text": "olá" }]
    });
    let (status, body) = t.post("/api/chat/salvar-historico", payload.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["sessionId"], "s9");
    t.post("/api/chat/salvar-historico", payload).await;

    let (status, list, _) = t.send("GET", "/api/chat/historicos", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["messages"].as_array().unwrap().len(), 2);

    let (status, _, _) = t.send("GET", "/api/chat/historicos/missing", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_endpoints_require_admin_session() {
    let t = test_app(ScriptedModel::replying(["x"])).await;
    for uri in ["/api/admin/metrics", "/api/admin/bot-config", "/api/admin/logs"] {
        let (status, _, _) = t.send("GET", uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
    }

    t.post("/api/register", json!({ "username": "ana", "password": "pw" })).await;
    let user_cookie = t.login("ana", "pw").await;
    let (status, _, _) = t.send("GET", "/api/admin/metrics", None, Some(&user_cookie)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = t
        .send(
            "POST",
            "/api/login",
            Some(json!({ "username": "admin", "password": "wrong" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_metrics_and_personality() {
    let t = test_app(ScriptedModel::replying(["a", "b", "c", "d"])).await;
    for id in ["m1", "m2", "m3"] {
        t.post(
            "/api/chat",
            json!({ "historico": [], "novaMensagem": format!("oi {id}"), "sessionId": id }),
        )
        .await;
    }
    let admin = t.login("admin", "admin-pass").await;

    let (status, metrics, _) = t.send("GET", "/api/admin/metrics", None, Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(metrics["totalConversations"], 3);
    assert_eq!(metrics["uniqueUsers"], 3);
    assert_eq!(metrics["recentConversations"].as_array().unwrap().len(), 3);

    let (status, body, _) = t.send("GET", "/api/admin/bot-config", None, Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["personality"], "You are a helpful assistant.");

    let (status, _, _) = t
        .send("POST", "/api/admin/bot-config", Some(json!({})), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body, _) = t
        .send(
            "POST",
            "/api/admin/bot-config",
            Some(json!({ "personality": "You are Zippy." })),
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["personality"], "You are Zippy.");

    t.post("/api/chat", json!({ "novaMensagem": "hi" })).await;
    let last = t.model.calls().pop().unwrap();
    assert_eq!(last.0[0], Turn::user("You are Zippy."));
}

#[tokio::test]
async fn test_user_preferences_override_personality() {
    let t = test_app(ScriptedModel::replying(["x", "y"])).await;
    let (status, _, _) = t.send("GET", "/api/user/preferences", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = t.post("/api/register", json!({ "username": "ana", "password": "pw" })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["username"], "ana");
    let (status, _) = t.post("/api/register", json!({ "username": "ana", "password": "pw" })).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let cookie = t.login("ana", "pw").await;
    let (status, body, _) = t
        .send(
            "PUT",
            "/api/user/preferences",
            Some(json!({ "customSystemInstruction": "Fale como um pirata." })),
            Some(&cookie),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["customSystemInstruction"], "Fale como um pirata.");

    let (_, body, _) = t.send("GET", "/api/user/preferences", None, Some(&cookie)).await;
    assert_eq!(body["customSystemInstruction"], "Fale como um pirata.");

    t.send("POST", "/api/chat", Some(json!({ "novaMensagem": "oi" })), Some(&cookie))
        .await;
    assert_eq!(t.model.calls()[0].0[0], Turn::user("Fale como um pirata."));

    // anonymous callers still get the global personality
    t.post("/api/chat", json!({ "novaMensagem": "oi" })).await;
    assert_eq!(t.model.calls()[1].0[0], Turn::user("You are a helpful assistant."));
}

#[tokio::test]
async fn test_session_status_and_logout() {
    let t = test_app(ScriptedModel::replying(["x"])).await;
    let (_, body, _) = t.send("GET", "/api/session", None, None).await;
    assert_eq!(body["loggedIn"], false);

    t.post("/api/register", json!({ "username": "ana", "password": "pw" })).await;
    let cookie = t.login("ana", "pw").await;
    let (_, body, _) = t.send("GET", "/api/session", None, Some(&cookie)).await;
    assert_eq!(body["loggedIn"], true);
    assert_eq!(body["username"], "ana");

    let (status, _, cleared) = t.send("POST", "/api/logout", None, Some(&cookie)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cleared.as_deref(), Some("chatbot_sid="));
    let (_, body, _) = t.send("GET", "/api/session", None, Some(&cookie)).await;
    assert_eq!(body["loggedIn"], false);
}

#[tokio::test]
async fn test_tampered_cookie_is_anonymous() {
    let t = test_app(ScriptedModel::replying(["x"])).await;
    t.post("/api/register", json!({ "username": "ana", "password": "pw" })).await;
    let cookie = t.login("ana", "pw").await;
    let tampered = format!("{}0", cookie);
    let (_, body, _) = t.send("GET", "/api/session", None, Some(&tampered)).await;
    assert_eq!(body["loggedIn"], false);
}

#[tokio::test]
async fn test_new_session_and_health() {
    let t = test_app(ScriptedModel::replying(["x"])).await;
    let (status, body, _) = t.send("GET", "/api/session/new", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["sessionId"].as_str().unwrap().starts_with("sessao_"));

    let (status, body, _) = t.send("GET", "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
