//! Debounced persistence scheduler.
//!
//! # Responsibility
//! - Coalesce bursts of edits into one write per quiet period.
//! - Run forced flushes that supersede the pending debounce.
//! - Stop all persistence once disabled.
//!
//! # Invariants
//! - At most one `PendingSync` is outstanding.
//! - Only the latest snapshot of the pending entry is ever written.
//! - Every (re)arm issues a fresh `TimerToken`; a token that is not the
//!   current one never triggers a write, whether it was superseded,
//!   cancelled by a forced flush, or cancelled by `disable()`.
//! - `SyncStatus` turns `InSync` only after the store acknowledged a write
//!   and nothing else is pending.
//!
//! State transitions:
//! - `Idle | PendingDebounce --enqueue--> PendingDebounce`
//! - `PendingDebounce --timer--> Flushing --ack/fail--> Idle`
//! - `any --force_flush--> Flushing --> Idle` (except `Disabled`)
//! - `any --disable--> Disabled --enable--> Idle`

use crate::codec;
use crate::config::StageConfig;
use crate::model::document::EditorDocument;
use crate::model::story::{ArticleId, ArticlePatch};
use crate::repo::story_repo::StoryStore;
use crate::stage::clock::Clock;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    PendingDebounce,
    Flushing,
    Disabled,
}

/// Persistence status surfaced to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    InSync,
    Dirty,
}

/// The one edit waiting for its debounce deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSync {
    pub article_id: ArticleId,
    pub snapshot: Arc<EditorDocument>,
    pub enqueued_at: Instant,
}

/// Handle for one armed debounce timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerToken {
    generation: u64,
    deadline: Instant,
}

impl TimerToken {
    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}

/// Result of one persistence attempt sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    Persisted { article_id: ArticleId, attempts: u32 },
    Failed { article_id: ArticleId, attempts: u32 },
}

impl FlushOutcome {
    pub fn article_id(&self) -> ArticleId {
        match self {
            Self::Persisted { article_id, .. } | Self::Failed { article_id, .. } => *article_id,
        }
    }

    pub fn is_persisted(&self) -> bool {
        matches!(self, Self::Persisted { .. })
    }
}

pub struct SyncScheduler<C: Clock> {
    clock: C,
    quiet_period: Duration,
    retry_limit: u32,
    state: SchedulerState,
    status: SyncStatus,
    pending: Option<PendingSync>,
    timer: Option<TimerToken>,
    generation: u64,
}

impl<C: Clock> SyncScheduler<C> {
    pub fn new(clock: C, config: &StageConfig) -> Self {
        Self::with_quiet_period(clock, config.quiet_period(), config.flush_retry_limit)
    }

    pub fn with_quiet_period(clock: C, quiet_period: Duration, retry_limit: u32) -> Self {
        Self {
            clock,
            quiet_period,
            retry_limit,
            state: SchedulerState::Idle,
            status: SyncStatus::InSync,
            pending: None,
            timer: None,
            generation: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn status(&self) -> SyncStatus {
        self.status
    }

    pub fn pending(&self) -> Option<&PendingSync> {
        self.pending.as_ref()
    }

    /// Currently armed timer, if any.
    pub fn timer(&self) -> Option<TimerToken> {
        self.timer
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Queues `snapshot` and restarts the quiet period.
    ///
    /// A pending entry for another article is written first; its outcome is
    /// returned. Ignored while disabled.
    pub fn enqueue<S: StoryStore + ?Sized>(
        &mut self,
        article_id: ArticleId,
        snapshot: Arc<EditorDocument>,
        store: &S,
    ) -> Option<FlushOutcome> {
        if self.state == SchedulerState::Disabled {
            debug!("event=sync_enqueue module=scheduler status=skipped reason=disabled article_id={article_id}");
            return None;
        }

        let mut prior_outcome = None;
        if self
            .pending
            .as_ref()
            .is_some_and(|pending| pending.article_id != article_id)
        {
            self.cancel_timer();
            if let Some(prior) = self.pending.take() {
                prior_outcome = Some(self.persist(prior.article_id, &prior.snapshot, store));
            }
        }

        let now = self.clock.now();
        self.status = SyncStatus::Dirty;
        self.pending = Some(PendingSync {
            article_id,
            snapshot,
            enqueued_at: now,
        });
        self.generation += 1;
        self.timer = Some(TimerToken {
            generation: self.generation,
            deadline: now + self.quiet_period,
        });
        self.state = SchedulerState::PendingDebounce;
        prior_outcome
    }

    /// Timer callback. Stale or cancelled tokens are ignored.
    pub fn on_timer<S: StoryStore + ?Sized>(
        &mut self,
        token: TimerToken,
        store: &S,
    ) -> Option<FlushOutcome> {
        if self.state != SchedulerState::PendingDebounce || self.timer != Some(token) {
            debug!(
                "event=sync_timer module=scheduler status=stale generation={}",
                token.generation
            );
            return None;
        }
        self.fire(store)
    }

    /// Fires the armed timer when the clock has passed its deadline.
    pub fn tick<S: StoryStore + ?Sized>(&mut self, store: &S) -> Option<FlushOutcome> {
        let token = self.timer?;
        if self.state != SchedulerState::PendingDebounce || self.clock.now() < token.deadline {
            return None;
        }
        self.fire(store)
    }

    /// Writes `snapshot` now, superseding the pending debounce.
    ///
    /// A pending entry for the same article is dropped; one for another
    /// article is written first. Returns `None` while disabled.
    pub fn force_flush<S: StoryStore + ?Sized>(
        &mut self,
        article_id: ArticleId,
        snapshot: &EditorDocument,
        store: &S,
    ) -> Option<FlushOutcome> {
        if self.state == SchedulerState::Disabled {
            debug!("event=sync_force_flush module=scheduler status=skipped reason=disabled article_id={article_id}");
            return None;
        }

        self.cancel_timer();
        if let Some(pending) = self.pending.take() {
            if pending.article_id != article_id {
                self.persist(pending.article_id, &pending.snapshot, store);
            } else {
                debug!("event=sync_force_flush module=scheduler status=superseded article_id={article_id}");
            }
        }
        Some(self.persist(article_id, snapshot, store))
    }

    /// Cancels the timer and pending entry; no write happens until `enable`.
    pub fn disable(&mut self) {
        self.cancel_timer();
        let dropped = self.pending.take();
        self.state = SchedulerState::Disabled;
        info!(
            "event=sync_disable module=scheduler status=ok dropped_pending={}",
            dropped.is_some()
        );
    }

    pub fn enable(&mut self) {
        if self.state == SchedulerState::Disabled {
            self.state = SchedulerState::Idle;
        }
    }

    fn fire<S: StoryStore + ?Sized>(&mut self, store: &S) -> Option<FlushOutcome> {
        self.timer = None;
        let pending = self.pending.take()?;
        Some(self.persist(pending.article_id, &pending.snapshot, store))
    }

    fn cancel_timer(&mut self) {
        if let Some(token) = self.timer.take() {
            debug!(
                "event=sync_timer module=scheduler status=cancelled generation={}",
                token.generation
            );
        }
    }

    fn persist<S: StoryStore + ?Sized>(
        &mut self,
        article_id: ArticleId,
        snapshot: &EditorDocument,
        store: &S,
    ) -> FlushOutcome {
        self.state = SchedulerState::Flushing;
        let started_at = self.clock.now();

        let outcome = match codec::encode(snapshot) {
            Ok(blob) => self.write_with_retry(article_id, &ArticlePatch::draft_content(blob), store),
            Err(err) => {
                error!(
                    "event=sync_flush module=scheduler status=error error_code=encode_failed article_id={} error={}",
                    article_id, err
                );
                FlushOutcome::Failed {
                    article_id,
                    attempts: 0,
                }
            }
        };

        let elapsed_ms = self.clock.now().saturating_duration_since(started_at).as_millis();
        match outcome {
            FlushOutcome::Persisted { attempts, .. } => {
                if self.pending.is_none() {
                    self.status = SyncStatus::InSync;
                }
                debug!(
                    "event=sync_flush module=scheduler status=ok article_id={} attempts={} duration_ms={}",
                    article_id, attempts, elapsed_ms
                );
            }
            FlushOutcome::Failed { attempts, .. } => {
                self.status = SyncStatus::Dirty;
                warn!(
                    "event=sync_flush module=scheduler status=error article_id={} attempts={} duration_ms={}",
                    article_id, attempts, elapsed_ms
                );
            }
        }

        self.state = if self.pending.is_some() {
            SchedulerState::PendingDebounce
        } else {
            SchedulerState::Idle
        };
        outcome
    }

    fn write_with_retry<S: StoryStore + ?Sized>(
        &self,
        article_id: ArticleId,
        patch: &ArticlePatch,
        store: &S,
    ) -> FlushOutcome {
        let max_attempts = self.retry_limit + 1;
        for attempt in 1..=max_attempts {
            match store.edit_article(article_id, patch) {
                Ok(()) => {
                    return FlushOutcome::Persisted {
                        article_id,
                        attempts: attempt,
                    }
                }
                Err(err) => warn!(
                    "event=sync_write module=scheduler status=error article_id={} attempt={} max_attempts={} error={}",
                    article_id, attempt, max_attempts, err
                ),
            }
        }
        FlushOutcome::Failed {
            article_id,
            attempts: max_attempts,
        }
    }
}
