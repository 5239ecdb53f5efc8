mod api;
mod auth;
mod chat;
mod config;
mod database;
mod utils;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use crate::api::AppState;
use crate::auth::password::hash_password;
use crate::auth::AuthStore;
use crate::chat::gemini::GeminiClient;
use crate::config::{Args, Command, Config};
use crate::database::setup_database;
use crate::utils::init_logger;
use crate::utils::signal::shutdown_signal;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("failed to read .env: {e}");
        }
    }
    let mut args = Args::parse();
    if let Some(Command::HashPassword { password }) = args.command.take() {
        return print_password_hash(password);
    }
    let config = Config::from_args(args)?;
    init_logger(&config.log_level)?;
    let config = Arc::new(config);

    info!("chatbot-rs {} starting", env!("CARGO_PKG_VERSION"));
    let db = setup_database(&config.database_path).await?;
    let model = GeminiClient::new(config.gemini.clone()).context("failed to build Gemini client")?;
    info!("model: {} (timeout {}s)", config.gemini.model, config.gemini.timeout.as_secs());
    if config.admin.is_none() {
        warn!("ADMIN_USERNAME/ADMIN_PASSWORD_HASH not set, admin endpoints are unreachable");
    }

    let state = AppState::new(config.clone(), db, Arc::new(model));
    spawn_session_sweeper(state.auth.clone());

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    info!("listening on http://{}", config.bind);
    info!("API docs at http://{}/swagger-ui", config.bind);

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

fn print_password_hash(password: Option<String>) -> Result<()> {
    let password = match password {
        Some(password) => password,
        None => {
            let mut line = String::new();
            std::io::stdin()
                .read_line(&mut line)
                .context("failed to read password from stdin")?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };
    if password.is_empty() {
        bail!("password must not be empty");
    }
    println!("{}", hash_password(&password).context("failed to hash password")?);
    Ok(())
}

fn spawn_session_sweeper(auth: AuthStore) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            if let Err(e) = auth.purge_expired().await {
                error!("failed to purge expired login sessions: {}", e);
            }
        }
    });
}
