use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};

use crate::auth::cookie::{SessionKey, MIN_SECRET_LEN};
use crate::auth::password::is_argon2_hash;
use crate::chat::gemini::GeminiConfig;

/// Command line and environment options. Every flag can also be set
/// through the environment variable named next to it, including from a
/// `.env` file.
#[derive(Parser, Debug, Clone)]
#[command(name = "chatbot-rs", version, about)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    #[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: IpAddr,

    /// Required to serve.
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub google_api_key: Option<String>,

    #[arg(long, env = "GEMINI_MODEL", default_value = "gemini-1.5-flash-latest")]
    pub gemini_model: String,

    #[arg(
        long,
        env = "GEMINI_BASE_URL",
        default_value = "https://generativelanguage.googleapis.com/v1beta"
    )]
    pub gemini_base_url: String,

    #[arg(long, env = "GEMINI_MAX_OUTPUT_TOKENS", default_value_t = 800)]
    pub gemini_max_output_tokens: u32,

    /// Upper bound on a single model call, in seconds.
    #[arg(long, env = "MODEL_TIMEOUT_SECS", default_value_t = 30)]
    pub model_timeout_secs: u64,

    #[arg(long, env = "DATABASE_PATH", default_value = "data/chatbot.sqlite")]
    pub database_path: PathBuf,

    /// Key material for signing session cookies, at least 32 bytes.
    /// Required to serve.
    #[arg(long, env = "SESSION_SECRET", hide_env_values = true)]
    pub session_secret: Option<String>,

    #[arg(long, env = "ADMIN_USERNAME")]
    pub admin_username: Option<String>,

    /// Argon2 PHC string, as printed by `chatbot-rs hash-password`.
    #[arg(long, env = "ADMIN_PASSWORD_HASH", hide_env_values = true)]
    pub admin_password_hash: Option<String>,

    /// Require a logged-in user for `/api/chat`.
    #[arg(long, env = "ACCOUNTS_ENABLED", default_value_t = false)]
    pub accounts_enabled: bool,

    #[arg(long, env = "DEFAULT_BOT_ID", default_value = "chatbotPrincipalIFCODE")]
    pub default_bot_id: String,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "SESSION_TTL_HOURS", default_value_t = 24)]
    pub session_ttl_hours: u32,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the Argon2 hash of a password, for ADMIN_PASSWORD_HASH.
    HashPassword {
        /// Read from the first line of stdin when omitted.
        password: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct AdminCredentials {
    pub username: String,
    pub password_hash: String,
}

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: SocketAddr,
    pub gemini: GeminiConfig,
    pub database_path: PathBuf,
    pub session_key: SessionKey,
    pub admin: Option<AdminCredentials>,
    pub accounts_enabled: bool,
    pub default_bot_id: String,
    pub log_level: String,
    pub session_ttl: chrono::Duration,
}

impl Config {
    pub fn from_args(args: Args) -> Result<Self> {
        let errors = Self::check(&args);
        if !errors.is_empty() {
            bail!("invalid configuration:\n  - {}", errors.join("\n  - "));
        }

        let session_key = args
            .session_secret
            .as_deref()
            .and_then(SessionKey::derive)
            .ok_or_else(|| anyhow!("SESSION_SECRET is not usable as a signing key"))?;
        let admin = match (args.admin_username, args.admin_password_hash) {
            (Some(username), Some(password_hash)) => Some(AdminCredentials {
                username: username.trim().to_string(),
                password_hash: password_hash.trim().to_string(),
            }),
            _ => None,
        };

        Ok(Self {
            bind: SocketAddr::new(args.bind_address, args.port),
            gemini: GeminiConfig {
                api_key: args.google_api_key.unwrap_or_default(),
                base_url: args.gemini_base_url,
                model: args.gemini_model,
                max_output_tokens: args.gemini_max_output_tokens,
                timeout: Duration::from_secs(args.model_timeout_secs),
            },
            database_path: args.database_path,
            session_key,
            admin,
            accounts_enabled: args.accounts_enabled,
            default_bot_id: args.default_bot_id,
            log_level: args.log_level,
            session_ttl: chrono::Duration::hours(i64::from(args.session_ttl_hours)),
        })
    }

    /// All problems at once rather than one per restart.
    fn check(args: &Args) -> Vec<String> {
        let mut errors = Vec::new();
        if args.google_api_key.as_deref().map_or(true, |key| key.trim().is_empty()) {
            errors.push("GOOGLE_API_KEY must be set".to_string());
        }
        if args.session_secret.as_deref().map_or(0, str::len) < MIN_SECRET_LEN {
            errors.push(format!("SESSION_SECRET must be at least {} bytes", MIN_SECRET_LEN));
        }
        match (&args.admin_username, &args.admin_password_hash) {
            (Some(_), None) | (None, Some(_)) => {
                errors.push("ADMIN_USERNAME and ADMIN_PASSWORD_HASH must be set together".to_string());
            }
            (Some(user), Some(hash)) => {
                if user.trim().is_empty() {
                    errors.push("ADMIN_USERNAME must not be empty".to_string());
                }
                if !is_argon2_hash(hash.trim()) {
                    errors.push(
                        "ADMIN_PASSWORD_HASH must be an Argon2 PHC string, see `chatbot-rs hash-password`".to_string(),
                    );
                }
            }
            (None, None) => {}
        }
        if args.model_timeout_secs == 0 {
            errors.push("MODEL_TIMEOUT_SECS must be greater than 0".to_string());
        }
        if args.session_ttl_hours == 0 {
            errors.push("SESSION_TTL_HOURS must be greater than 0".to_string());
        }
        if args.default_bot_id.trim().is_empty() {
            errors.push("DEFAULT_BOT_ID must not be empty".to_string());
        }
        errors
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 0)),
            gemini: GeminiConfig {
                api_key: "test-key".to_string(),
                base_url: "http://127.0.0.1:9".to_string(),
                model: "gemini-test".to_string(),
                max_output_tokens: 800,
                timeout: Duration::from_secs(5),
            },
            database_path: PathBuf::from(":memory:"),
            session_key: SessionKey::derive("0123456789abcdef0123456789abcdef").expect("32-byte test secret"),
            admin: None,
            accounts_enabled: false,
            default_bot_id: "chatbotPrincipalIFCODE".to_string(),
            log_level: "debug".to_string(),
            session_ttl: chrono::Duration::hours(24),
        }
    }
}
