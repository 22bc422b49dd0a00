//! Page navigation over a story's article order.
//!
//! Pure functions: no store access and no insertion policy. Bounds are
//! handled here; whether an insert is allowed is the controller's call.

use crate::model::story::{ArticleId, StoryId, StoryRef};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// One page of a story.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagePosition {
    pub article_id: ArticleId,
    pub index: usize,
}

/// Result of a relative page turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Moved(PagePosition),
    /// Target index fell outside the story; nothing changes.
    Rejected,
}

/// Where a new article goes relative to the current page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertSide {
    Before,
    After,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationError {
    /// Requested article is not part of the story order.
    NotFound(ArticleId),
    EmptyStory(StoryId),
}

impl Display for NavigationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "article {id} is not in the story order"),
            Self::EmptyStory(id) => write!(f, "story {id} has no articles"),
        }
    }
}

impl Error for NavigationError {}

/// Resolves the first page of a session.
///
/// With `requested`, returns its position; otherwise the first page.
pub fn resolve_initial_page(
    story: &StoryRef,
    requested: Option<ArticleId>,
) -> Result<PagePosition, NavigationError> {
    let Some(first) = story.article_at(0) else {
        return Err(NavigationError::EmptyStory(story.id));
    };

    match requested {
        Some(article_id) => story
            .position_of(article_id)
            .map(|index| PagePosition { article_id, index })
            .ok_or(NavigationError::NotFound(article_id)),
        None => Ok(PagePosition {
            article_id: first,
            index: 0,
        }),
    }
}

/// Moves `delta` pages from `current_index`.
pub fn turn_page(story: &StoryRef, current_index: usize, delta: isize) -> TurnOutcome {
    current_index
        .checked_add_signed(delta)
        .and_then(|index| {
            story
                .article_at(index)
                .map(|article_id| PagePosition { article_id, index })
        })
        .map_or(TurnOutcome::Rejected, TurnOutcome::Moved)
}

/// Returns the index a new article takes when inserted beside `current_index`.
pub fn insertion_index(current_index: usize, side: InsertSide) -> usize {
    match side {
        InsertSide::Before => current_index,
        InsertSide::After => current_index + 1,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        insertion_index, resolve_initial_page, turn_page, InsertSide, NavigationError,
        PagePosition, TurnOutcome,
    };
    use crate::model::story::StoryRef;
    use uuid::Uuid;

    fn story_with(count: usize) -> StoryRef {
        StoryRef {
            id: Uuid::new_v4(),
            name: "story".to_string(),
            article_order: (0..count).map(|_| Uuid::new_v4()).collect(),
        }
    }

    #[test]
    fn initial_page_defaults_to_first_article() {
        let story = story_with(3);
        let position = resolve_initial_page(&story, None).unwrap();
        assert_eq!(
            position,
            PagePosition {
                article_id: story.article_order[0],
                index: 0
            }
        );
    }

    #[test]
    fn initial_page_finds_requested_article() {
        let story = story_with(3);
        let requested = story.article_order[2];
        let position = resolve_initial_page(&story, Some(requested)).unwrap();
        assert_eq!(position.index, 2);
    }

    #[test]
    fn initial_page_errors() {
        let missing = Uuid::new_v4();
        assert_eq!(
            resolve_initial_page(&story_with(2), Some(missing)),
            Err(NavigationError::NotFound(missing))
        );
        let empty = story_with(0);
        assert_eq!(
            resolve_initial_page(&empty, None),
            Err(NavigationError::EmptyStory(empty.id))
        );
    }

    #[test]
    fn turning_past_either_end_is_rejected() {
        let story = story_with(3);
        assert_eq!(turn_page(&story, 2, 1), TurnOutcome::Rejected);
        assert_eq!(turn_page(&story, 0, -1), TurnOutcome::Rejected);
        assert_eq!(
            turn_page(&story, 1, 1),
            TurnOutcome::Moved(PagePosition {
                article_id: story.article_order[2],
                index: 2
            })
        );
    }

    #[test]
    fn insertion_index_is_policy_free() {
        assert_eq!(insertion_index(0, InsertSide::Before), 0);
        assert_eq!(insertion_index(0, InsertSide::After), 1);
        assert_eq!(insertion_index(4, InsertSide::Before), 4);
    }
}
