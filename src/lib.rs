//! Inbox Agent — email triage, action-item extraction, and reply drafting
//! backed by an LLM, with per-email chat and a compose assistant.

pub mod api;
pub mod config;
pub mod error;
pub mod knowledge;
pub mod llm;
pub mod pipeline;
pub mod services;
pub mod store;
