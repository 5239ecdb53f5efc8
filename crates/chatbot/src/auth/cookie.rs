//! Session cookie `chatbot_sid`, signed with an HMAC key derived from
//! `SESSION_SECRET` through `cookie`'s signed jar.

use std::fmt;

use cookie::{Cookie, CookieJar, Key, SameSite};

pub const SESSION_COOKIE: &str = "chatbot_sid";

/// Key derivation needs at least this many bytes of secret.
pub const MIN_SECRET_LEN: usize = 32;

/// Signing key for the session cookie.
#[derive(Clone)]
pub struct SessionKey(Key);

impl SessionKey {
    /// `None` when `secret` is shorter than [`MIN_SECRET_LEN`] bytes.
    pub fn derive(secret: &str) -> Option<Self> {
        (secret.len() >= MIN_SECRET_LEN).then(|| Self(Key::derive_from(secret.as_bytes())))
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

/// Session id from a raw `Cookie` header, if the cookie is present and its
/// signature checks out.
pub fn session_from_header(key: &SessionKey, header: &str) -> Option<String> {
    let mut jar = CookieJar::new();
    for cookie in Cookie::split_parse(header).filter_map(Result::ok) {
        jar.add_original(cookie.into_owned());
    }
    jar.signed(&key.0)
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|session_id| !session_id.is_empty())
}

fn base_cookie(value: String, max_age: cookie::time::Duration) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(max_age)
        .build()
}

pub fn session_cookie(key: &SessionKey, session_id: &str, ttl: chrono::Duration) -> Cookie<'static> {
    let mut jar = CookieJar::new();
    jar.signed_mut(&key.0).add(base_cookie(
        session_id.to_string(),
        cookie::time::Duration::seconds(ttl.num_seconds()),
    ));
    jar.get(SESSION_COOKIE).cloned().unwrap_or_else(expired_cookie)
}

pub fn expired_cookie() -> Cookie<'static> {
    base_cookie(String::new(), cookie::time::Duration::ZERO)
}
