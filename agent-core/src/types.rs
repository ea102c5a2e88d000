//! Core pipeline types: inbound message, agent request, handler response,
//! and the [`Handler`] / [`Middleware`] traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use memory_core::{Channel, SessionMappingKey};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A message addressed to one agent, as delivered by any channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InboundMessage {
    pub id: String,
    pub channel: Channel,
    pub sender_id: String,
    /// Display name of the sender, when the channel provides one.
    #[serde(default)]
    pub sender_name: Option<String>,
    pub agent_id: String,
    pub content: String,
    /// Heartbeats and agent-to-agent traffic.
    #[serde(default)]
    pub is_internal: bool,
    pub created_at: DateTime<Utc>,
}

impl InboundMessage {
    /// New external message with a generated id.
    pub fn new(
        channel: Channel,
        sender_id: impl Into<String>,
        agent_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            channel,
            sender_id: sender_id.into(),
            sender_name: None,
            agent_id: agent_id.into(),
            content: content.into(),
            is_internal: false,
            created_at: Utc::now(),
        }
    }

    pub fn internal(mut self) -> Self {
        self.is_internal = true;
        self
    }

    /// Conversation identity used for session lookup.
    pub fn session_key(&self) -> SessionMappingKey {
        SessionMappingKey::new(self.channel, self.sender_id.clone(), self.agent_id.clone())
    }
}

/// What flows through the chain: the inbound message and the text that will
/// be sent to the model. Middleware may rewrite `outbound` in `before()`.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRequest {
    pub message: InboundMessage,
    pub outbound: String,
}

impl AgentRequest {
    pub fn new(message: InboundMessage) -> Self {
        let outbound = message.content.clone();
        Self { message, outbound }
    }
}

/// Handler result for the chain.
///
/// `Reply(text)` carries the response body so middleware can use it in `after()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerResponse {
    /// Pass to next handler.
    Continue,
    /// Stop the chain; no response body.
    Stop,
    /// Skip this handler, try next.
    Ignore,
    /// Stop the chain and attach the model's reply text.
    Reply(String),
}

/// Processes a request, typically by invoking the model with `request.outbound`.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, request: &AgentRequest) -> crate::error::Result<HandlerResponse>;
}

/// Runs around the handlers: all `before` in order, then all `after` in reverse.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Return false to stop the chain.
    async fn before(&self, _request: &mut AgentRequest) -> crate::error::Result<bool> {
        Ok(true)
    }

    async fn after(
        &self,
        _request: &AgentRequest,
        _response: &HandlerResponse,
    ) -> crate::error::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_starts_with_message_content() {
        let message = InboundMessage::new(Channel::Telegram, "42", "main", "hello");
        let request = AgentRequest::new(message.clone());
        assert_eq!(request.outbound, "hello");
        assert!(!request.message.is_internal);
        assert_eq!(message.session_key().to_string(), "telegram:42:main");
    }

    #[test]
    fn test_inbound_message_deserializes_with_defaults() {
        let raw = r#"{
            "id": "m1",
            "channel": "whatsapp",
            "sender_id": "+15550100",
            "agent_id": "main",
            "content": "hi",
            "created_at": "2026-10-16T09:00:00Z"
        }"#;
        let message: InboundMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(message.channel, Channel::Whatsapp);
        assert!(!message.is_internal);
        assert!(message.sender_name.is_none());
    }
}
