//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the story/article store contract the stage depends on.
//! - Isolate SQLite query details from stage and service orchestration.
//!
//! # Invariants
//! - Repository writes validate articles before persistence.
//! - Repository APIs return semantic errors (`StoryNotFound`,
//!   `ArticleNotFound`) in addition to DB transport errors.

pub mod story_repo;
