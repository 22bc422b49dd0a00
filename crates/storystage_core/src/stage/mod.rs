//! The Stage: one paginated editing session over a story.
//!
//! `navigation` and `buffer` are pure building blocks, `scheduler` owns
//! debounced persistence, and `controller` ties them to a [`StoryStore`]
//! implementation. `commands` maps keyboard input onto the controller.
//!
//! [`StoryStore`]: crate::repo::story_repo::StoryStore

pub mod buffer;
pub mod clock;
pub mod commands;
pub mod controller;
pub mod navigation;
pub mod scheduler;
