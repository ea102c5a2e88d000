//! # Middleware crate
//!
//! Middleware for the agent pipeline. [`MemoryMiddleware`] wires the memory
//! engine into the chain: gate, prefetch and context injection before the
//! model runs, turn persistence after it answers.

mod memory_middleware;

#[cfg(test)]
mod test;

pub use memory_middleware::{MemoryMiddleware, DEFAULT_RESET_COMMAND};
