//! Path containment for user-configured storage locations.
//!
//! This crate provides:
//! - Lexical normalization of `.`/`..` segments
//! - Symlink-aware resolution of paths that may not exist yet
//! - Rejection of any path that escapes its base directory

mod error;
mod resolve;

pub use error::*;
pub use resolve::*;
