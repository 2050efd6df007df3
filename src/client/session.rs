// src/client/session.rs
use reqwest::header::{HeaderMap, SET_COOKIE};
use std::fmt;

/// Username + password pair. `Debug` never prints the password.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Authenticated membership in one chatroom.
///
/// Produced by create-chatroom, login or use-invite and never mutated
/// afterwards; logging in again yields a new value.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub chatroom_id: String,
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub chat_name: Option<String>,
    pub channels: Vec<String>,
    cookie: String,
}

impl Session {
    /// Resume a session from a known cookie.
    pub fn new(chatroom_id: impl Into<String>, cookie: impl Into<String>) -> Self {
        Self {
            chatroom_id: chatroom_id.into(),
            user_id: None,
            username: None,
            chat_name: None,
            channels: Vec::new(),
            cookie: cookie.into(),
        }
    }

    pub fn with_user_id(self, user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..self
        }
    }

    pub fn with_username(self, username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            ..self
        }
    }

    pub fn cookie(&self) -> &str {
        &self.cookie
    }

    /// `Cookie` header value: the cookie is keyed by chatroom id.
    pub fn cookie_header(&self) -> String {
        format!("{}={}", self.chatroom_id, self.cookie)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("chatroom_id", &self.chatroom_id)
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .field("chat_name", &self.chat_name)
            .field("channels", &self.channels)
            .field("cookie_len", &self.cookie.len())
            .finish()
    }
}

/// Find the session cookie for `chatroom_id` among the `Set-Cookie` headers.
pub fn extract_session_cookie(headers: &HeaderMap, chatroom_id: &str) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| name.trim() == chatroom_id)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
