//! Story use-case service.
//!
//! # Responsibility
//! - Provide story/article entry points for callers outside the stage
//!   (story creation, chapter and outline edits, listings).
//! - Delegate persistence to a `StoryStore` implementation.
//!
//! # Invariants
//! - Story names and chapter names are trimmed and never blank.
//! - Page previews are derived from decoded content, never from raw blobs.

use crate::codec::{self, CodecError};
use crate::model::story::{Alignment, ArticleId, ArticlePatch, StoryId, StoryRef};
use crate::repo::story_repo::{RepoError, StoryStore};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

const PREVIEW_MAX_CHARS: usize = 60;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Service error for story use-cases.
#[derive(Debug)]
pub enum StoryServiceError {
    BlankStoryName,
    BlankChapterName,
    StoryNotFound(StoryId),
    ArticleNotFound(ArticleId),
    /// Stored draft content could not be decoded.
    Codec(CodecError),
    Repo(RepoError),
}

impl Display for StoryServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankStoryName => write!(f, "story name must not be blank"),
            Self::BlankChapterName => write!(f, "chapter name must not be blank"),
            Self::StoryNotFound(id) => write!(f, "story not found: {id}"),
            Self::ArticleNotFound(id) => write!(f, "article not found: {id}"),
            Self::Codec(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoryServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Codec(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for StoryServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::StoryNotFound(id) => Self::StoryNotFound(id),
            RepoError::ArticleNotFound(id) => Self::ArticleNotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<CodecError> for StoryServiceError {
    fn from(value: CodecError) -> Self {
        Self::Codec(value)
    }
}

pub type StoryServiceResult<T> = Result<T, StoryServiceError>;

/// One row of the story listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorySummary {
    pub id: StoryId,
    pub name: String,
    pub article_count: usize,
}

/// One page of a story outline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSummary {
    pub index: usize,
    pub article_id: ArticleId,
    pub chapter_name: Option<String>,
    pub outline: String,
    pub alignment: Alignment,
    /// Collapsed plain-text start of the page; empty when nothing is written.
    pub preview: String,
}

pub struct StoryService<S: StoryStore> {
    store: S,
}

impl<S: StoryStore> StoryService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates a story and its first, chapter-opening article.
    pub fn create_story(
        &self,
        name: &str,
        first_chapter_name: &str,
    ) -> StoryServiceResult<StoryRef> {
        if name.trim().is_empty() {
            return Err(StoryServiceError::BlankStoryName);
        }
        if first_chapter_name.trim().is_empty() {
            return Err(StoryServiceError::BlankChapterName);
        }
        Ok(self.store.create_story(name, first_chapter_name)?)
    }

    pub fn rename_chapter(&self, article_id: ArticleId, chapter_name: &str) -> StoryServiceResult<()> {
        let chapter_name = chapter_name.trim();
        if chapter_name.is_empty() {
            return Err(StoryServiceError::BlankChapterName);
        }
        let patch = ArticlePatch {
            chapter_name: Some(chapter_name.to_string()),
            ..ArticlePatch::default()
        };
        Ok(self.store.edit_article(article_id, &patch)?)
    }

    pub fn set_outline(&self, article_id: ArticleId, outline: &str) -> StoryServiceResult<()> {
        let patch = ArticlePatch {
            outline: Some(outline.to_string()),
            ..ArticlePatch::default()
        };
        Ok(self.store.edit_article(article_id, &patch)?)
    }

    /// Replaces the story list order.
    pub fn reorder_stories(&self, order: &[StoryId]) -> StoryServiceResult<()> {
        Ok(self.store.reorder_stories(order)?)
    }

    /// Moves `story_id` to position `index` of the story list, clamped to
    /// the last position.
    pub fn move_story(&self, story_id: StoryId, index: usize) -> StoryServiceResult<()> {
        let mut order: Vec<StoryId> = self
            .store
            .list_stories()?
            .into_iter()
            .map(|story| story.id)
            .collect();
        let from = order
            .iter()
            .position(|id| *id == story_id)
            .ok_or(StoryServiceError::StoryNotFound(story_id))?;
        let moved = order.remove(from);
        order.insert(index.min(order.len()), moved);
        self.reorder_stories(&order)
    }

    /// Lists stories in list order with their page counts.
    pub fn list_stories(&self) -> StoryServiceResult<Vec<StorySummary>> {
        Ok(self
            .store
            .list_stories()?
            .into_iter()
            .map(|story| StorySummary {
                article_count: story.len(),
                id: story.id,
                name: story.name,
            })
            .collect())
    }

    /// Lists every page of `story_id` in order, with content previews.
    pub fn story_outline(&self, story_id: StoryId) -> StoryServiceResult<Vec<PageSummary>> {
        self.store
            .list_articles(story_id)?
            .into_iter()
            .enumerate()
            .map(|(index, article)| {
                let preview = match codec::decode(article.draft_content.as_deref())? {
                    Some(document) => derive_preview(&document.plain_text()),
                    None => String::new(),
                };
                Ok(PageSummary {
                    index,
                    article_id: article.id,
                    chapter_name: article.chapter_name,
                    outline: article.outline,
                    alignment: article.alignment,
                    preview,
                })
            })
            .collect()
    }
}

/// Collapses whitespace and cuts `text` to a short single-line preview.
pub fn derive_preview(text: &str) -> String {
    let collapsed = WHITESPACE_RE.replace_all(text.trim(), " ");
    let mut preview: String = collapsed.chars().take(PREVIEW_MAX_CHARS).collect();
    if collapsed.chars().count() > PREVIEW_MAX_CHARS {
        preview.push('…');
    }
    preview
}
