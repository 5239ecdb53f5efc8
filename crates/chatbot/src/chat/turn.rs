use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

/// Who produced a turn. Serialized as `user` / `model`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, strum::Display, strum::AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    /// Accepts the role spellings seen from older clients.
    fn parse_wire(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "user" => Some(Role::User),
            "model" | "assistant" | "bot" => Some(Role::Model),
            _ => None,
        }
    }
}

/// One message of a conversation.
///
/// On output a turn is always `{"role": ..., "text": ...}`. On input the
/// `{sender, text}` and `{role, parts: [{text}]}` shapes are accepted too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

#[derive(Deserialize)]
struct WireTurn {
    #[serde(alias = "sender")]
    role: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    parts: Option<Vec<WirePart>>,
}

#[derive(Deserialize)]
struct WirePart {
    #[serde(default)]
    text: String,
}

impl TryFrom<WireTurn> for Turn {
    type Error = String;

    fn try_from(wire: WireTurn) -> Result<Self, Self::Error> {
        let role = Role::parse_wire(&wire.role).ok_or_else(|| format!("unknown role `{}`", wire.role))?;
        let text = match (wire.text, wire.parts) {
            (Some(text), _) => text,
            (None, Some(parts)) => parts.into_iter().map(|p| p.text).collect::<Vec<_>>().concat(),
            (None, None) => return Err("turn has neither `text` nor `parts`".to_string()),
        };
        Ok(Turn { role, text })
    }
}

impl<'de> Deserialize<'de> for Turn {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let wire = WireTurn::deserialize(deserializer)?;
        Turn::try_from(wire).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_serializes_role_and_text() {
        let json = serde_json::to_value(Turn::model("olá")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "model", "text": "olá"}));
    }

    #[test]
    fn test_turn_accepts_legacy_shapes() {
        let parts: Turn = serde_json::from_str(r#"{"role":"user","parts":[{"text":"oi "},{"text":"tudo bem?"}]}"#).unwrap();
        assert_eq!(parts, Turn::user("oi tudo bem?"));

        let sender: Turn = serde_json::from_str(r#"{"sender":"bot","text":"Olá!"}"#).unwrap();
        assert_eq!(sender, Turn::model("Olá!"));

        let assistant: Turn = serde_json::from_str(r#"{"role":"Assistant","text":"ok"}"#).unwrap();
        assert_eq!(assistant.role, Role::Model);
    }

    #[test]
    fn test_turn_rejects_unknown_role_and_missing_text() {
        assert!(serde_json::from_str::<Turn>(r#"{"role":"system","text":"x"}"#).is_err());
        assert!(serde_json::from_str::<Turn>(r#"{"role":"user"}"#).is_err());
    }

    #[test]
    fn test_role_display_matches_provider_roles() {
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Model.as_ref(), "model");
    }
}
