//! Halcyon core domain layer.
//!
//! Pure types and state machines for the client-side orchestration core:
//! conversation messages, agent task snapshots, streaming delta decoding,
//! the thinking-tag parser, and snapshot reconciliation. Nothing in this
//! crate performs I/O or owns a timer; the application layer composes
//! these pieces against a backend.

pub mod error;
pub mod message;
pub mod reconcile;
pub mod stream;
pub mod task;

pub use error::{HalcyonError, Result};
