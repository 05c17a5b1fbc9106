//! Core entity definitions for the todo log.
//!
//! This crate defines the records persisted by every storage backend: the
//! [`TaskItem`] captured from a task tool event and the [`LogEntry`] envelope
//! that wraps it.

mod log_entry;
mod task;

pub use log_entry::*;
pub use task::*;
