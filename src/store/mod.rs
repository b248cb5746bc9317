//! Persistence layer — libSQL-backed storage for emails, prompts, drafts,
//! and LLM usage.

pub mod libsql_backend;
pub mod migrations;
pub mod seed;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::*;
