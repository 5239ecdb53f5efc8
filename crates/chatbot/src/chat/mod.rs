//! The conversation core: identity, personality, history, model access and
//! the stores behind them.

pub mod access_log;
pub mod error;
pub mod gateway;
pub mod gemini;
pub mod history;
pub mod metrics;
pub mod personality;
pub mod service;
pub mod session_id;
#[cfg(test)]
pub mod testing;
pub mod transcript;
pub mod turn;

pub use error::ChatError;
pub use gateway::{ChatModel, ModelGateway};
pub use service::{ChatService, PersistTarget, Speaker};
pub use session_id::SessionId;
pub use turn::Turn;
