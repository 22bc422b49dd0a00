//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store calls into use-case level APIs.
//! - Keep CLI and UI layers decoupled from storage details.

pub mod story_service;
