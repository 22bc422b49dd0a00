//! Domain model for stories, articles and live editor documents.
//!
//! # Responsibility
//! - Define canonical data structures shared by the stage, codec and store.
//! - Keep the rich-text document an immutable value type.
//!
//! # Invariants
//! - Every story and article is identified by a stable `Uuid`.
//! - An article belongs to exactly one story through its order position.
//! - Editor documents always hold at least one block.

pub mod document;
pub mod story;
