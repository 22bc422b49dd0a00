//! Stage controller: one editing session over one story.
//!
//! # Responsibility
//! - Own the stage cursor, the active edit buffer and the sync scheduler.
//! - Order page swaps after the outgoing page's flush.
//! - Surface document and sync-status changes to UI listeners.
//!
//! # Invariants
//! - At most one document is active; it belongs to `cursor.active_article_id`.
//! - When switching pages the outgoing document is force-flushed before the
//!   incoming article is read from the store. If that write fails the
//!   outgoing page stays active and `Dirty`.
//! - Story, cursor and buffer change together; a failed open or switch
//!   leaves all three as they were.
//! - After `teardown` the scheduler is disabled and the cursor is `None`.
//! - Insert operations never touch the edit buffer; a created article only
//!   becomes active through a later navigation event.

use crate::codec::CodecError;
use crate::config::StageConfig;
use crate::model::document::{EditError, EditorDocument, UserEdit};
use crate::model::story::{Alignment, ArticleId, ArticlePatch, ArticleRef, StoryId, StoryRef};
use crate::repo::story_repo::{RepoError, StoryStore};
use crate::stage::buffer::{ChangeNotice, EditBuffer};
use crate::stage::clock::{Clock, SystemClock};
use crate::stage::navigation::{
    insertion_index, resolve_initial_page, turn_page, InsertSide, NavigationError, PagePosition,
    TurnOutcome,
};
use crate::stage::scheduler::{FlushOutcome, SchedulerState, SyncScheduler, SyncStatus, TimerToken};
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Navigation position of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageCursor {
    pub active_article_id: ArticleId,
    pub active_page_index: usize,
    pub detail_panel_open: bool,
}

/// Notification delivered to UI listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageEvent {
    DocumentChanged {
        article_id: ArticleId,
        snapshot: Arc<EditorDocument>,
        status: SyncStatus,
    },
    StatusChanged(SyncStatus),
    PageChanged(PagePosition),
    DetailPanelToggled(bool),
    AlignmentChanged {
        article_id: ArticleId,
        alignment: Alignment,
    },
    FocusRequested,
}

pub type StageListener = Box<dyn FnMut(&StageEvent)>;

/// Result of an insert request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Created { article: ArticleRef, index: usize },
    /// Inserting before the chapter-opening first article is not allowed.
    Rejected,
}

/// Result of a page switch request (open, activate, navigation, turn).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSwitch {
    Switched(PagePosition),
    /// Target was already the active article; only the index may change.
    Unchanged(PagePosition),
    /// Target index lies outside the story.
    Rejected,
    /// The outgoing page could not be saved; it stays active and `Dirty`.
    Held { unsaved: ArticleId },
}

impl PageSwitch {
    pub fn position(self) -> Option<PagePosition> {
        match self {
            Self::Switched(position) | Self::Unchanged(position) => Some(position),
            Self::Rejected | Self::Held { .. } => None,
        }
    }
}

#[derive(Debug)]
pub enum StageError {
    Navigation(NavigationError),
    Repo(RepoError),
    Codec(CodecError),
    Edit(EditError),
    /// Operation needs a loaded story.
    NoStoryLoaded,
    /// Controller was torn down.
    TornDown,
}

impl Display for StageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Navigation(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Codec(err) => write!(f, "{err}"),
            Self::Edit(err) => write!(f, "{err}"),
            Self::NoStoryLoaded => write!(f, "no story loaded on stage"),
            Self::TornDown => write!(f, "stage controller already torn down"),
        }
    }
}

impl Error for StageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Navigation(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Codec(err) => Some(err),
            Self::Edit(err) => Some(err),
            Self::NoStoryLoaded | Self::TornDown => None,
        }
    }
}

impl From<NavigationError> for StageError {
    fn from(value: NavigationError) -> Self {
        Self::Navigation(value)
    }
}

impl From<RepoError> for StageError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<CodecError> for StageError {
    fn from(value: CodecError) -> Self {
        Self::Codec(value)
    }
}

impl From<EditError> for StageError {
    fn from(value: EditError) -> Self {
        Self::Edit(value)
    }
}

pub type StageResult<T> = Result<T, StageError>;

pub struct StageController<S: StoryStore, C: Clock = SystemClock> {
    store: S,
    scheduler: SyncScheduler<C>,
    story: Option<StoryRef>,
    cursor: Option<StageCursor>,
    buffer: Option<EditBuffer>,
    focused: bool,
    torn_down: bool,
    listeners: Vec<StageListener>,
}

impl<S: StoryStore> StageController<S, SystemClock> {
    /// Creates a controller driven by wall-clock time.
    pub fn with_system_clock(store: S, config: &StageConfig) -> Self {
        Self::new(store, SystemClock, config)
    }
}

impl<S: StoryStore, C: Clock> StageController<S, C> {
    pub fn new(store: S, clock: C, config: &StageConfig) -> Self {
        Self {
            store,
            scheduler: SyncScheduler::new(clock, config),
            story: None,
            cursor: None,
            buffer: None,
            focused: false,
            torn_down: false,
            listeners: Vec::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn story(&self) -> Option<&StoryRef> {
        self.story.as_ref()
    }

    pub fn cursor(&self) -> Option<StageCursor> {
        self.cursor
    }

    pub fn has_story(&self) -> bool {
        self.story.is_some() && self.cursor.is_some()
    }

    /// Latest published snapshot of the active page.
    pub fn document(&self) -> Option<Arc<EditorDocument>> {
        self.buffer.as_ref().map(EditBuffer::snapshot)
    }

    /// Active page including any staged composition.
    pub fn visible_document(&self) -> Option<&EditorDocument> {
        self.buffer.as_ref().map(EditBuffer::visible_document)
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.scheduler.status()
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    /// Currently armed debounce timer; hosts with real timers schedule a
    /// call to `on_timer` at its deadline.
    pub fn pending_timer(&self) -> Option<TimerToken> {
        self.scheduler.timer()
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&StageEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Loads `story_id` and activates the requested (or first) page.
    ///
    /// # Errors
    /// - `Repo(StoryNotFound)` when the story does not exist.
    /// - `Navigation(NotFound | EmptyStory)` for unusable page requests.
    /// - `Repo` or `Codec` when the target article cannot be loaded; the
    ///   previously open story stays in place.
    pub fn open_story(
        &mut self,
        story_id: StoryId,
        requested: Option<ArticleId>,
    ) -> StageResult<PageSwitch> {
        self.ensure_live()?;
        let story = self
            .store
            .get_story(story_id)?
            .ok_or(RepoError::StoryNotFound(story_id))?;
        let position = resolve_initial_page(&story, requested)?;
        let pages = story.len();
        let switch = self.switch_page(Some(story), position)?;
        info!(
            "event=stage_open module=stage status={} story_id={} pages={} index={}",
            switch_status(switch),
            story_id,
            pages,
            position.index
        );
        Ok(switch)
    }

    /// Makes `article_id` (at page `index`) the active page.
    ///
    /// The outgoing page is flushed before the incoming article is read.
    pub fn activate(&mut self, article_id: ArticleId, index: usize) -> StageResult<PageSwitch> {
        self.ensure_live()?;
        let story = self.story.as_ref().ok_or(StageError::NoStoryLoaded)?;
        if story.article_at(index) != Some(article_id) {
            return Err(NavigationError::NotFound(article_id).into());
        }
        self.switch_page(None, PagePosition { article_id, index })
    }

    /// Navigation event from outside the controller (e.g. after an article
    /// was created). Refreshes the story order when the target is unknown.
    pub fn on_navigation(&mut self, article_id: ArticleId, index: usize) -> StageResult<PageSwitch> {
        self.ensure_live()?;
        let story_id = self.story.as_ref().ok_or(StageError::NoStoryLoaded)?.id;
        let known = self
            .story
            .as_ref()
            .is_some_and(|story| story.article_at(index) == Some(article_id));
        if !known {
            self.refresh_story(story_id)?;
        }
        self.activate(article_id, index)
    }

    /// Applies a user edit to the active page and queues its persistence.
    pub fn apply_edit(&mut self, edit: &UserEdit) -> StageResult<SyncStatus> {
        self.ensure_live()?;
        let buffer = self.buffer.as_mut().ok_or(StageError::NoStoryLoaded)?;
        let notice = buffer.apply_change(edit)?;
        Ok(self.track_change(notice))
    }

    /// Stages an uncommitted composition edit on the active page.
    pub fn stage_edit(&mut self, edit: &UserEdit) -> StageResult<()> {
        self.ensure_live()?;
        let buffer = self.buffer.as_mut().ok_or(StageError::NoStoryLoaded)?;
        buffer.stage_edit(edit)?;
        Ok(())
    }

    /// Publishes the staged composition and queues its persistence.
    pub fn commit_pending(&mut self) -> StageResult<Option<SyncStatus>> {
        self.ensure_live()?;
        let buffer = self.buffer.as_mut().ok_or(StageError::NoStoryLoaded)?;
        Ok(buffer
            .commit_pending()
            .map(|notice| self.track_change(notice)))
    }

    /// Writes the active page now.
    pub fn save_now(&mut self) -> StageResult<Option<FlushOutcome>> {
        self.ensure_live()?;
        if self.buffer.is_none() {
            return Err(StageError::NoStoryLoaded);
        }
        Ok(self.flush_active())
    }

    pub fn turn_next(&mut self) -> StageResult<PageSwitch> {
        self.turn_by(1)
    }

    pub fn turn_prev(&mut self) -> StageResult<PageSwitch> {
        self.turn_by(-1)
    }

    /// Whether the active page holds edits the store has not acknowledged.
    pub fn has_unsaved_changes(&self) -> bool {
        self.buffer
            .as_ref()
            .is_some_and(|buffer| !buffer.is_saved() || buffer.has_staged())
    }

    pub fn insert_after(&mut self) -> StageResult<InsertOutcome> {
        self.insert(InsertSide::After)
    }

    pub fn insert_before(&mut self) -> StageResult<InsertOutcome> {
        self.insert(InsertSide::Before)
    }

    /// Cycles the active article's alignment and writes it to the store.
    pub fn toggle_alignment(&mut self) -> StageResult<Alignment> {
        self.ensure_live()?;
        let cursor = self.cursor.ok_or(StageError::NoStoryLoaded)?;
        let article_id = cursor.active_article_id;
        let article = self
            .store
            .get_article(article_id)?
            .ok_or(RepoError::ArticleNotFound(article_id))?;
        let alignment = article.alignment.cycled();
        self.store
            .edit_article(article_id, &ArticlePatch::alignment(alignment))?;
        self.emit(StageEvent::AlignmentChanged {
            article_id,
            alignment,
        });
        Ok(alignment)
    }

    /// Opens or closes the article detail panel; returns the new state.
    pub fn toggle_detail_panel(&mut self) -> StageResult<bool> {
        self.ensure_live()?;
        let cursor = self.cursor.as_mut().ok_or(StageError::NoStoryLoaded)?;
        cursor.detail_panel_open = !cursor.detail_panel_open;
        let open = cursor.detail_panel_open;
        self.emit(StageEvent::DetailPanelToggled(open));
        Ok(open)
    }

    pub fn focus_editor(&mut self) -> StageResult<()> {
        self.ensure_live()?;
        if self.buffer.is_none() {
            return Err(StageError::NoStoryLoaded);
        }
        self.focused = true;
        self.emit(StageEvent::FocusRequested);
        Ok(())
    }

    /// Lets the debounce timer fire if its deadline has passed.
    pub fn tick(&mut self) -> Option<FlushOutcome> {
        let before = self.scheduler.status();
        let outcome = self.scheduler.tick(&self.store);
        self.record_outcome(outcome);
        self.emit_status_if_changed(before);
        outcome
    }

    /// Timer callback for hosts that arm real timers from `pending_timer`.
    pub fn on_timer(&mut self, token: TimerToken) -> Option<FlushOutcome> {
        let before = self.scheduler.status();
        let outcome = self.scheduler.on_timer(token, &self.store);
        self.record_outcome(outcome);
        self.emit_status_if_changed(before);
        outcome
    }

    /// Flushes the active page, disables the scheduler and clears the
    /// cursor. Safe to call more than once.
    pub fn teardown(&mut self) -> Option<FlushOutcome> {
        if self.torn_down {
            return None;
        }
        let outcome = if self.buffer.is_some() {
            self.flush_active()
        } else {
            None
        };
        self.scheduler.disable();
        self.cursor = None;
        self.buffer = None;
        self.story = None;
        self.focused = false;
        self.torn_down = true;
        info!(
            "event=stage_teardown module=stage status=ok flushed={}",
            outcome.is_some_and(|outcome| outcome.is_persisted())
        );
        outcome
    }

    fn turn_by(&mut self, delta: isize) -> StageResult<PageSwitch> {
        self.ensure_live()?;
        let (story, cursor) = match (&self.story, self.cursor) {
            (Some(story), Some(cursor)) => (story, cursor),
            _ => return Err(StageError::NoStoryLoaded),
        };
        match turn_page(story, cursor.active_page_index, delta) {
            TurnOutcome::Moved(position) => self.switch_page(None, position),
            TurnOutcome::Rejected => {
                debug!(
                    "event=stage_turn module=stage status=rejected index={} delta={}",
                    cursor.active_page_index, delta
                );
                Ok(PageSwitch::Rejected)
            }
        }
    }

    /// Switches to `position`, optionally replacing the loaded story.
    ///
    /// Nothing is assigned until the outgoing page is saved and the
    /// incoming one is decoded.
    fn switch_page(
        &mut self,
        story: Option<StoryRef>,
        position: PagePosition,
    ) -> StageResult<PageSwitch> {
        let PagePosition { article_id, index } = position;

        if let Some(cursor) = self.cursor {
            if cursor.active_article_id == article_id {
                if let Some(story) = story {
                    self.story = Some(story);
                }
                if cursor.active_page_index != index {
                    self.cursor = Some(StageCursor {
                        active_page_index: index,
                        ..cursor
                    });
                    self.emit(StageEvent::PageChanged(position));
                }
                return Ok(PageSwitch::Unchanged(position));
            }
            if let Some(FlushOutcome::Failed { article_id: unsaved, .. }) = self.flush_active() {
                warn!(
                    "event=stage_switch module=stage status=held unsaved_article_id={unsaved} target_article_id={article_id}"
                );
                return Ok(PageSwitch::Held { unsaved });
            }
        }

        let article = self
            .store
            .get_article(article_id)?
            .ok_or(RepoError::ArticleNotFound(article_id))?;
        let buffer = EditBuffer::load(article_id, article.draft_content.as_deref())?;
        let snapshot = buffer.snapshot();

        if let Some(story) = story {
            self.story = Some(story);
        }
        self.buffer = Some(buffer);
        let detail_panel_open = self.cursor.is_some_and(|cursor| cursor.detail_panel_open);
        self.cursor = Some(StageCursor {
            active_article_id: article_id,
            active_page_index: index,
            detail_panel_open,
        });
        debug!("event=stage_activate module=stage status=ok article_id={article_id} index={index}");

        let status = self.scheduler.status();
        self.emit(StageEvent::PageChanged(position));
        self.emit(StageEvent::DocumentChanged {
            article_id,
            snapshot,
            status,
        });
        Ok(PageSwitch::Switched(position))
    }

    fn insert(&mut self, side: InsertSide) -> StageResult<InsertOutcome> {
        self.ensure_live()?;
        let (story_id, first_article, cursor) = match (&self.story, self.cursor) {
            (Some(story), Some(cursor)) => (story.id, story.article_at(0), cursor),
            _ => return Err(StageError::NoStoryLoaded),
        };

        let index = insertion_index(cursor.active_page_index, side);
        if index == 0 && self.first_article_opens_chapter(first_article)? {
            debug!("event=stage_insert module=stage status=rejected reason=chapter_head story_id={story_id}");
            return Ok(InsertOutcome::Rejected);
        }

        let article = self.store.create_article(story_id, index)?;
        self.refresh_story(story_id)?;
        info!(
            "event=stage_insert module=stage status=ok story_id={} article_id={} index={}",
            story_id, article.id, index
        );
        Ok(InsertOutcome::Created { article, index })
    }

    fn first_article_opens_chapter(&self, first: Option<ArticleId>) -> StageResult<bool> {
        let Some(first) = first else {
            return Ok(false);
        };
        Ok(self
            .store
            .get_article(first)?
            .is_some_and(|article| article.has_chapter_name()))
    }

    /// Reloads the story order and re-points the cursor index at the
    /// active article.
    fn refresh_story(&mut self, story_id: StoryId) -> StageResult<()> {
        let story = self
            .store
            .get_story(story_id)?
            .ok_or(RepoError::StoryNotFound(story_id))?;
        let mut moved = None;
        if let Some(cursor) = self.cursor.as_mut() {
            match story.position_of(cursor.active_article_id) {
                Some(index) if index != cursor.active_page_index => {
                    cursor.active_page_index = index;
                    moved = Some(PagePosition {
                        article_id: cursor.active_article_id,
                        index,
                    });
                }
                Some(_) => {}
                None => warn!(
                    "event=stage_refresh module=stage status=error error_code=active_article_missing article_id={}",
                    cursor.active_article_id
                ),
            }
        }
        self.story = Some(story);
        if let Some(position) = moved {
            self.emit(StageEvent::PageChanged(position));
        }
        Ok(())
    }

    /// Commits staged composition, then writes the active page now.
    ///
    /// Returns `None` when the page has nothing the store has not seen.
    fn flush_active(&mut self) -> Option<FlushOutcome> {
        let buffer = self.buffer.as_mut()?;
        if let Some(notice) = buffer.commit_pending() {
            let status = self.track_change(notice);
            debug!("event=stage_commit module=stage status=ok sync_status={status:?}");
        }

        let buffer = self.buffer.as_ref()?;
        if buffer.is_saved() {
            return None;
        }
        let article_id = buffer.article_id();
        let snapshot = buffer.snapshot();
        let before = self.scheduler.status();
        let outcome = self
            .scheduler
            .force_flush(article_id, &snapshot, &self.store);
        self.record_outcome(outcome);
        self.emit_status_if_changed(before);
        outcome
    }

    /// Marks the active buffer saved when `outcome` wrote its latest
    /// snapshot and nothing newer is queued.
    fn record_outcome(&mut self, outcome: Option<FlushOutcome>) {
        let Some(FlushOutcome::Persisted { article_id, .. }) = outcome else {
            return;
        };
        if self.scheduler.pending().is_some() {
            return;
        }
        if let Some(buffer) = self.buffer.as_mut() {
            if buffer.article_id() == article_id {
                buffer.mark_saved();
            }
        }
    }

    fn track_change(&mut self, notice: ChangeNotice) -> SyncStatus {
        let before = self.scheduler.status();
        self.scheduler
            .enqueue(notice.article_id, Arc::clone(&notice.snapshot), &self.store);
        let status = self.scheduler.status();
        self.emit(StageEvent::DocumentChanged {
            article_id: notice.article_id,
            snapshot: notice.snapshot,
            status,
        });
        self.emit_status_if_changed(before);
        status
    }

    fn emit_status_if_changed(&mut self, before: SyncStatus) {
        let after = self.scheduler.status();
        if after != before {
            self.emit(StageEvent::StatusChanged(after));
        }
    }

    fn emit(&mut self, event: StageEvent) {
        for listener in &mut self.listeners {
            listener(&event);
        }
    }

    fn ensure_live(&self) -> StageResult<()> {
        if self.torn_down {
            return Err(StageError::TornDown);
        }
        Ok(())
    }
}

fn switch_status(switch: PageSwitch) -> &'static str {
    match switch {
        PageSwitch::Switched(_) => "ok",
        PageSwitch::Unchanged(_) => "unchanged",
        PageSwitch::Rejected => "rejected",
        PageSwitch::Held { .. } => "held",
    }
}

impl<S: StoryStore, C: Clock> Drop for StageController<S, C> {
    fn drop(&mut self) {
        self.teardown();
    }
}
