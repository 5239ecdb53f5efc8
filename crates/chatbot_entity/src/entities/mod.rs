pub mod prelude;

pub mod access_log;
pub mod auth_session;
pub mod bot_config;
pub mod chat_session;
pub mod user;
