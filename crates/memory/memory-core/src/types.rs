//! # Core Types
//!
//! This module defines the data model shared by the gate, prefetch and sync crates.
//!
//! ## Channel
//!
//! The chat surface a message arrived on. Serialized lowercase.
//!
//! ## ConversationTurn
//!
//! One request/response pair, created once and never mutated. Owned by the
//! session synchronizer for persistence.
//!
//! ## SessionMappingKey / SessionHandle
//!
//! A deterministic `(channel, sender_id, agent_id)` composite and the
//! backend-assigned session it maps to. At most one handle exists per key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MemoryError;

/// Chat surface the conversation is happening on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Discord,
    Telegram,
    Whatsapp,
    Heartbeat,
    Http,
    Manual,
    Android,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Discord => "discord",
            Channel::Telegram => "telegram",
            Channel::Whatsapp => "whatsapp",
            Channel::Heartbeat => "heartbeat",
            Channel::Http => "http",
            Channel::Manual => "manual",
            Channel::Android => "android",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "discord" => Ok(Channel::Discord),
            "telegram" => Ok(Channel::Telegram),
            "whatsapp" => Ok(Channel::Whatsapp),
            "heartbeat" => Ok(Channel::Heartbeat),
            "http" => Ok(Channel::Http),
            "manual" => Ok(Channel::Manual),
            "android" => Ok(Channel::Android),
            other => Err(MemoryError::Configuration(format!("unknown channel: {}", other))),
        }
    }
}

/// Which side of a turn a piece of text belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
        }
    }
}

/// A single request/response pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationTurn {
    /// Inbound message id; may be empty for turns parsed from old transcripts.
    pub message_id: String,
    /// When the request was received.
    pub timestamp_utc: DateTime<Utc>,
    pub user_text: String,
    pub assistant_text: String,
    /// Internal turns (heartbeats, agent-to-agent) always go through the legacy path.
    pub is_internal: bool,
}

impl ConversationTurn {
    /// Creates a turn stamped with the current time.
    pub fn new(
        message_id: impl Into<String>,
        user_text: impl Into<String>,
        assistant_text: impl Into<String>,
        is_internal: bool,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            timestamp_utc: Utc::now(),
            user_text: user_text.into(),
            assistant_text: assistant_text.into(),
            is_internal,
        }
    }

    /// Returns a copy with a fixed timestamp.
    pub fn at(mut self, timestamp_utc: DateTime<Utc>) -> Self {
        self.timestamp_utc = timestamp_utc;
        self
    }
}

/// Composite key used to look up the backend session for a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionMappingKey {
    pub channel: Channel,
    pub sender_id: String,
    pub agent_id: String,
}

impl SessionMappingKey {
    pub fn new(
        channel: Channel,
        sender_id: impl Into<String>,
        agent_id: impl Into<String>,
    ) -> Self {
        Self {
            channel,
            sender_id: sender_id.into(),
            agent_id: agent_id.into(),
        }
    }
}

impl fmt::Display for SessionMappingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.channel, self.sender_id, self.agent_id)
    }
}

/// Backend-assigned session identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SessionHandle {
    pub session_id: String,
}

impl SessionHandle {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
        }
    }
}

/// Outcome of the gate decision.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Yes,
    No,
    Ambiguous,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Yes => "yes",
            Verdict::No => "no",
            Verdict::Ambiguous => "ambiguous",
        }
    }
}

/// Verdict plus the reason string and score that produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GateVerdict {
    pub verdict: Verdict,
    pub reason: String,
    pub score: i32,
}

impl GateVerdict {
    pub fn is_yes(&self) -> bool {
        self.verdict == Verdict::Yes
    }
}
