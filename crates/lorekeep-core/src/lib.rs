//! Core types and error definitions for lorekeep.
//!
//! This crate provides the types shared by every lorekeep crate: the
//! knowledge [`Fragment`], its owning [`Scope`], and the unified error type.
//!
//! # Main types
//!
//! - [`KnowledgeError`] — Unified error enum for all lorekeep subsystems.
//! - [`KnowledgeResult`] — Convenience alias for `Result<T, KnowledgeError>`.
//! - [`Fragment`] — A stored unit of knowledge.
//! - [`Scope`] — Shared (committed) or personal (private) partition.

/// Error types.
pub mod error;
/// Fragment model and id helpers.
pub mod fragment;

pub use error::{KnowledgeError, KnowledgeResult};
pub use fragment::{is_valid_id, new_fragment_id, Fragment, Scope, DEFAULT_SOURCE};
