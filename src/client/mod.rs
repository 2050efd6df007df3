// src/client/mod.rs
//! HTTP client for the teahaz chat server.
//!
//! All calls are one-shot request/response; the only long-running piece is
//! [`ChatClient::monitor`], which wraps a session in a polling
//! [`Monitor`](crate::monitor::Monitor).

pub mod codec;
pub mod session;
pub mod source;

pub use session::{Credentials, Session};
pub use source::ChatroomSource;

use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::ClientConfig;
use crate::error::{ApiError, ConfigError, Result};
use crate::monitor::{Event, Monitor, MonitorConfig};
use session::extract_session_cookie;

/// Look-back used by [`ChatClient::fetch_recent`].
pub const RECENT_WINDOW_SECS: f64 = 600.0;

#[derive(Debug, Default, Deserialize)]
struct AuthReply {
    #[serde(rename = "userID")]
    user_id: Option<String>,
    #[serde(rename = "chatroomID")]
    chatroom_id: Option<String>,
    chatroom_name: Option<String>,
    #[serde(rename = "channelID")]
    channel_id: Option<String>,
    username: Option<String>,
}

#[derive(Serialize)]
struct OutgoingMessage<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
    #[serde(rename = "userID", skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
    #[serde(rename = "type")]
    kind: &'a str,
    message: String,
}

/// Stateless chat server client; sessions are passed in explicitly.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    server: String,
}

impl ChatClient {
    pub fn new(config: &ClientConfig) -> std::result::Result<Self, ConfigError> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent());
        if let Some(proxy) = config.proxy() {
            let proxy = reqwest::Proxy::all(proxy.url())
                .map_err(|e| ConfigError::Load(format!("proxy {}: {e}", proxy.url())))?;
            builder = builder.proxy(proxy);
        }
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| ConfigError::Load(format!("http client: {e}")))?;
        Ok(Self {
            http,
            server: config.server().to_string(),
        })
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v0/{path}", self.server)
    }

    /// Create a chatroom and join it as its first member.
    pub async fn create_chatroom(&self, creds: &Credentials, chat_name: &str) -> Result<Session> {
        if chat_name.trim().is_empty() {
            return Err(ApiError::InvalidArgument("chat_name must not be empty".into()));
        }
        let resp = self
            .http
            .post(self.url("chatroom/"))
            .json(&serde_json::json!({
                "username": creds.username,
                "password": creds.password(),
                "chatroom_name": chat_name,
            }))
            .send()
            .await?;
        let resp = ensure_success(resp).await?;
        let headers = resp.headers().clone();
        let reply = parse_auth_reply(resp).await?;

        let chatroom_id = reply
            .chatroom_id
            .clone()
            .ok_or_else(|| ApiError::Malformed("create chatroom: missing chatroomID".into()))?;
        let mut session = build_session(&headers, chatroom_id, reply, Some(&creds.username))?;
        if session.chat_name.is_none() {
            session.chat_name = Some(chat_name.to_string());
        }
        tracing::info!(target: "client", chatroom = %session.chatroom_id, chat_name, "created chatroom");
        Ok(session)
    }

    /// Log in to an existing chatroom with a user id.
    pub async fn login(&self, chatroom_id: &str, user_id: &str, password: &str) -> Result<Session> {
        let resp = self
            .http
            .post(self.url(&format!("login/{chatroom_id}")))
            .json(&serde_json::json!({ "userID": user_id, "password": password }))
            .send()
            .await?;
        let resp = ensure_success(resp).await?;
        let headers = resp.headers().clone();
        let reply = parse_auth_reply(resp).await?;
        let mut session = build_session(&headers, chatroom_id.to_string(), reply, None)?;
        if session.user_id.is_none() {
            session.user_id = Some(user_id.to_string());
        }
        tracing::info!(target: "client", chatroom = %chatroom_id, "logged in");
        Ok(session)
    }

    /// Join a chatroom through an invite.
    pub async fn use_invite(
        &self,
        chatroom_id: &str,
        invite_id: &str,
        creds: &Credentials,
    ) -> Result<Session> {
        let resp = self
            .http
            .post(self.url(&format!("invite/{chatroom_id}")))
            .json(&serde_json::json!({
                "username": creds.username,
                "password": creds.password(),
                "inviteId": invite_id,
            }))
            .send()
            .await?;
        let resp = ensure_success(resp).await?;
        let headers = resp.headers().clone();
        let reply = parse_auth_reply(resp).await?;
        let session = build_session(
            &headers,
            chatroom_id.to_string(),
            reply,
            Some(&creds.username),
        )?;
        tracing::info!(target: "client", chatroom = %chatroom_id, "joined via invite");
        Ok(session)
    }

    /// Send a text message. Returns the server's JSON reply.
    pub async fn send_message(&self, session: &Session, text: &str) -> Result<serde_json::Value> {
        if text.is_empty() {
            return Err(ApiError::InvalidArgument(
                "message must be at least 1 character".into(),
            ));
        }
        let body = OutgoingMessage {
            username: session.username.as_deref(),
            user_id: session.user_id.as_deref(),
            kind: "text",
            message: codec::encode_text(text),
        };
        let resp = self
            .http
            .post(self.url(&format!("message/{}", session.chatroom_id)))
            .header(reqwest::header::COOKIE, session.cookie_header())
            .json(&body)
            .send()
            .await?;
        let resp = ensure_success(resp).await?;
        let raw = resp.text().await?;
        tracing::debug!(target: "client", chatroom = %session.chatroom_id, len = text.len(), "message sent");
        if raw.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&raw).map_err(|e| ApiError::Malformed(format!("send reply: {e}")))
    }

    /// All messages with `time >= since`, decoded, in server order.
    ///
    /// `since` is unix seconds; fractional and negative values are passed
    /// through as-is. No retry happens here.
    pub async fn fetch_since(&self, session: &Session, since: f64) -> Result<Vec<Event>> {
        if !since.is_finite() {
            return Err(ApiError::InvalidArgument(format!(
                "time {since} is not an epoch timestamp"
            )));
        }
        let mut req = self
            .http
            .get(self.url(&format!("message/{}", session.chatroom_id)))
            .query(&[("time", since)])
            .header(reqwest::header::COOKIE, session.cookie_header());
        if let Some(username) = &session.username {
            req = req.header("username", username.as_str());
        }
        if let Some(user_id) = &session.user_id {
            req = req.header("userID", user_id.as_str());
        }

        let resp = ensure_success(req.send().await?).await?;
        let body = resp.text().await?;
        let events = codec::decode_messages(&body)?;
        tracing::trace!(target: "client", chatroom = %session.chatroom_id, since, count = events.len(), "fetched messages");
        Ok(events)
    }

    /// Messages from the last ten minutes.
    pub async fn fetch_recent(&self, session: &Session) -> Result<Vec<Event>> {
        let now = chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0;
        self.fetch_since(session, now - RECENT_WINDOW_SECS).await
    }

    /// Poll `session`'s chatroom for new messages.
    pub fn monitor(&self, session: Session, config: MonitorConfig) -> Monitor<ChatroomSource> {
        Monitor::new(ChatroomSource::new(self.clone(), session), config)
    }
}

async fn ensure_success(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ApiError::Unauthorized(format!("{status}: {body}")));
    }
    Err(ApiError::Status {
        status: status.as_u16(),
        body,
    })
}

// Auth replies are loosely shaped; anything that is not a JSON object is
// treated as "no extra fields".
async fn parse_auth_reply(resp: Response) -> Result<AuthReply> {
    let raw = resp.text().await?;
    match serde_json::from_str::<AuthReply>(&raw) {
        Ok(reply) => Ok(reply),
        Err(e) => {
            tracing::debug!(target: "client", error = %e, "auth reply without JSON body");
            Ok(AuthReply::default())
        }
    }
}

fn build_session(
    headers: &reqwest::header::HeaderMap,
    chatroom_id: String,
    reply: AuthReply,
    username: Option<&str>,
) -> Result<Session> {
    let cookie = extract_session_cookie(headers, &chatroom_id).ok_or_else(|| {
        ApiError::Unauthorized(format!("server set no session cookie for {chatroom_id}"))
    })?;
    let mut session = Session::new(chatroom_id, cookie);
    session.user_id = reply.user_id;
    session.username = reply.username.or_else(|| username.map(str::to_string));
    session.chat_name = reply.chatroom_name;
    session.channels = reply.channel_id.into_iter().collect();
    Ok(session)
}
