// src/client/source.rs
use async_trait::async_trait;

use super::{ChatClient, Session};
use crate::error::FetchError;
use crate::monitor::{Event, EventSource};

/// One chatroom's message stream as an [`EventSource`].
#[derive(Debug, Clone)]
pub struct ChatroomSource {
    client: ChatClient,
    session: Session,
}

impl ChatroomSource {
    pub fn new(client: ChatClient, session: Session) -> Self {
        Self { client, session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }
}

#[async_trait]
impl EventSource for ChatroomSource {
    async fn fetch(&self, from_time: f64) -> Result<Vec<Event>, FetchError> {
        self.client.fetch_since(&self.session, from_time).await
    }

    fn name(&self) -> &str {
        &self.session.chatroom_id
    }
}
