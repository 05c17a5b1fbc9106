//! Storage for the todo-log task history
//!
//! This crate persists [`entities::LogEntry`] records through one of three
//! interchangeable backends:
//! - `json`: a single JSON document under the project directory
//! - `sqlite`: a local SQLite database (queryable)
//! - `postgres`: a shared PostgreSQL database (queryable)
//!
//! Use [`open_backend`] to build the backend chosen by a [`StorageConfig`].

mod codec;
mod config;
mod error;
mod factory;
mod json;
mod postgres;
mod sqlite;
mod traits;

pub use config::*;
pub use error::*;
pub use factory::*;
pub use json::*;
pub use postgres::*;
pub use sqlite::*;
pub use traits::*;
