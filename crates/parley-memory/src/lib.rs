//! Long-term memory store client for the Parley platform.
//!
//! Talks to an external vector index over HTTP. The index owns embedding
//! computation: records are upserted with opaque text and the store embeds
//! the text field itself. Two retrieval modes are exposed, matching how the
//! orchestrator uses the store:
//!
//! - **text similarity search** (contextual injection during a turn): the
//!   utterance text is the query, ranking is semantic;
//! - **filtered zero-vector query** (direct listing): a placeholder vector
//!   with an owner equality filter, no meaningful similarity scoring.
//!
//! The two modes deliberately remain distinct operations: their ranking
//! and recall behavior differs and both behaviors are load-bearing.

pub mod client;
pub mod error;

pub use client::MemoryClient;
pub use error::MemoryError;
