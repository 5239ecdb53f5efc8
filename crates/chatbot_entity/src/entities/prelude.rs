pub use super::access_log::Entity as AccessLog;
pub use super::auth_session::Entity as AuthSession;
pub use super::bot_config::Entity as BotConfig;
pub use super::chat_session::Entity as ChatSession;
pub use super::user::Entity as User;
