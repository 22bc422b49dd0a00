//! Story and article domain model.
//!
//! # Responsibility
//! - Define the read-only story/article records the stage works against.
//! - Provide validation for fields the store must never persist broken.
//!
//! # Invariants
//! - `StoryRef::article_order` lists each article id at most once.
//! - The first article of a story carries the chapter name.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable story identifier.
pub type StoryId = Uuid;

/// Stable article identifier.
pub type ArticleId = Uuid;

/// Paragraph alignment for a whole article page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

impl Alignment {
    /// Returns the next alignment in `left -> center -> right -> left` order.
    pub fn cycled(self) -> Self {
        match self {
            Self::Left => Self::Center,
            Self::Center => Self::Right,
            Self::Right => Self::Left,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "left" => Some(Self::Left),
            "center" => Some(Self::Center),
            "right" => Some(Self::Right),
            _ => None,
        }
    }
}

/// Story record with the ordered article sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryRef {
    pub id: StoryId,
    pub name: String,
    /// Article ids in page order. Index `0` is the first page.
    pub article_order: Vec<ArticleId>,
}

impl StoryRef {
    pub fn len(&self) -> usize {
        self.article_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.article_order.is_empty()
    }

    /// Returns the page index of `article_id`, if the story contains it.
    pub fn position_of(&self, article_id: ArticleId) -> Option<usize> {
        self.article_order.iter().position(|id| *id == article_id)
    }

    /// Returns the article id at `index`, if in range.
    pub fn article_at(&self, index: usize) -> Option<ArticleId> {
        self.article_order.get(index).copied()
    }
}

/// Article record as persisted by the story store.
///
/// `draft_content` is the opaque transport blob produced by the content
/// codec; `None` means nothing has been written yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRef {
    pub id: ArticleId,
    pub story_id: StoryId,
    pub chapter_name: Option<String>,
    pub outline: String,
    pub alignment: Alignment,
    pub draft_content: Option<String>,
}

impl ArticleRef {
    /// Creates an empty article for `story_id` with a generated id.
    pub fn new(story_id: StoryId) -> Self {
        Self {
            id: Uuid::new_v4(),
            story_id,
            chapter_name: None,
            outline: String::new(),
            alignment: Alignment::Left,
            draft_content: None,
        }
    }

    /// Returns whether this article opens a chapter.
    pub fn has_chapter_name(&self) -> bool {
        self.chapter_name
            .as_deref()
            .is_some_and(|name| !name.trim().is_empty())
    }

    /// Validates persisted-field invariants.
    pub fn validate(&self) -> Result<(), ArticleValidationError> {
        if self.id.is_nil() {
            return Err(ArticleValidationError::NilId);
        }
        if self.story_id.is_nil() {
            return Err(ArticleValidationError::NilStoryId);
        }
        if let Some(name) = &self.chapter_name {
            if name.trim().is_empty() {
                return Err(ArticleValidationError::BlankChapterName);
            }
        }
        Ok(())
    }
}

/// Partial article update, mirroring the store's `editArticle` fields.
///
/// `None` leaves the persisted column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticlePatch {
    pub chapter_name: Option<String>,
    pub outline: Option<String>,
    pub alignment: Option<Alignment>,
    pub draft_content: Option<String>,
}

impl ArticlePatch {
    pub fn draft_content(blob: impl Into<String>) -> Self {
        Self {
            draft_content: Some(blob.into()),
            ..Self::default()
        }
    }

    pub fn alignment(alignment: Alignment) -> Self {
        Self {
            alignment: Some(alignment),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.chapter_name.is_none()
            && self.outline.is_none()
            && self.alignment.is_none()
            && self.draft_content.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleValidationError {
    NilId,
    NilStoryId,
    BlankChapterName,
}

impl Display for ArticleValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilId => write!(f, "article id must not be nil"),
            Self::NilStoryId => write!(f, "article story_id must not be nil"),
            Self::BlankChapterName => write!(f, "chapter_name must not be blank when set"),
        }
    }
}

impl Error for ArticleValidationError {}
