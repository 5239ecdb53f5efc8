use std::fmt;

use rand::Rng;

use super::error::ChatError;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Opaque, non-empty conversation identifier.
///
/// Existence is never checked here: an unseen id simply starts a new
/// conversation on its first persist.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Client-supplied id, kept byte for byte. Missing and blank ids are
    /// rejected.
    pub fn from_request(raw: Option<&str>) -> Result<Self, ChatError> {
        match raw {
            Some(id) if !id.trim().is_empty() => Ok(Self(id.to_string())),
            _ => Err(ChatError::invalid("sessionId é obrigatório.")),
        }
    }

    /// Mints a fresh id in the same `sessao_<millis>_<7 base36>` form the
    /// browser client generates on first page load.
    pub fn mint() -> Self {
        let millis = chrono::Utc::now().timestamp_millis();
        let mut rng = rand::thread_rng();
        let suffix: String = (0..7)
            .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
            .collect();
        Self(format!("sessao_{}_{}", millis, suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
