//! Core of the storystage authoring tool.
//!
//! Stories are ordered lists of articles (pages). The [`stage`] module runs
//! one editing session over a story: page navigation, an edit buffer and
//! a debounced sync scheduler that writes drafts through a [`StoryStore`].

pub mod codec;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod stage;

pub use codec::{decode, encode, CodecError};
pub use config::{ConfigError, StageConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::document::{BlockKind, EditError, EditorDocument, InlineStyle, UserEdit};
pub use model::story::{Alignment, ArticleId, ArticlePatch, ArticleRef, StoryId, StoryRef};
pub use repo::story_repo::{RepoError, RepoResult, SqliteStoryStore, StoryStore};
pub use service::story_service::{StoryService, StoryServiceError};
pub use stage::clock::{Clock, ManualClock, SystemClock};
pub use stage::commands::{Command, CommandDispatcher, CommandTable, DispatchOutcome, KeyChord};
pub use stage::controller::{InsertOutcome, PageSwitch, StageController, StageError, StageEvent};
pub use stage::scheduler::{FlushOutcome, SyncStatus};
