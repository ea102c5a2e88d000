//! # memory-tool
//!
//! Clients for the external retrieval machinery.
//!
//! - [`RetrievalTool`] / [`CliRetrievalTool`] - rich backend: search,
//!   URI lookup, reads, sessions and file writes
//! - [`VectorSearchBackend`] / [`CliVectorSearch`] - lightweight backend
//! - [`EscalationClassifier`] - model call used to settle ambiguous gate verdicts
//!
//! # External Interactions
//!
//! Every call spawns one child process with a timeout. On timeout the child is
//! killed and the call fails with `ToolInvocation { reason: "timeout" }`.

pub mod classifier;
pub mod process;
pub mod tool;
pub mod vector;

pub use classifier::EscalationClassifier;
pub use process::{program_exists, run_tool};
pub use tool::{
    parse_search_hits, parse_uri_lines, CliRetrievalTool, RetrievalTool, SearchRequest,
    UriCandidate,
};
pub use vector::{parse_vector_rows, CliVectorSearch, VectorQuery, VectorSearchBackend};
