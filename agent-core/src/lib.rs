//! # agent-core
//!
//! Transport-agnostic pipeline types for an agent: the inbound message and
//! the request the middleware chain works on, [`Handler`] and [`Middleware`],
//! the pipeline error type, and tracing initialization. Used by
//! handler-chain and the middleware crate.

pub mod error;
pub mod logger;
pub mod types;

pub use error::{AgentError, Result};
pub use logger::init_tracing;
pub use memory_core::Channel;
pub use types::{AgentRequest, Handler, HandlerResponse, InboundMessage, Middleware};
