//! Edit buffer for the active page.
//!
//! # Responsibility
//! - Hold the current document snapshot of exactly one article.
//! - Publish a change notice for every committed edit.
//! - Keep an uncommitted composition apart from the published snapshot
//!   until `commit_pending` is called.
//!
//! # Invariants
//! - Published snapshots are never mutated; each edit yields a new `Arc`.
//! - Listeners run synchronously, in registration order, before
//!   `apply_change` returns.

use crate::codec::{self, CodecError};
use crate::model::document::{EditError, EditorDocument, UserEdit};
use crate::model::story::ArticleId;
use std::sync::Arc;

/// Published change of the active document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotice {
    pub article_id: ArticleId,
    pub snapshot: Arc<EditorDocument>,
    /// Monotonic per-buffer revision, starting at `0` for the loaded content.
    pub revision: u64,
}

pub type ChangeListener = Box<dyn FnMut(&ChangeNotice)>;

pub struct EditBuffer {
    article_id: ArticleId,
    snapshot: Arc<EditorDocument>,
    revision: u64,
    /// Revision last acknowledged by the store; the loaded content is `0`.
    saved_revision: u64,
    staged: Option<EditorDocument>,
    listeners: Vec<ChangeListener>,
}

impl EditBuffer {
    /// Loads `blob` for `article_id`; absent content yields an empty document.
    pub fn load(article_id: ArticleId, blob: Option<&str>) -> Result<Self, CodecError> {
        let document = codec::decode(blob)?.unwrap_or_default();
        Ok(Self::with_document(article_id, document))
    }

    pub fn with_document(article_id: ArticleId, document: EditorDocument) -> Self {
        Self {
            article_id,
            snapshot: Arc::new(document),
            revision: 0,
            saved_revision: 0,
            staged: None,
            listeners: Vec::new(),
        }
    }

    pub fn article_id(&self) -> ArticleId {
        self.article_id
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Arc<EditorDocument> {
        Arc::clone(&self.snapshot)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Document as the user currently sees it, including staged composition.
    pub fn visible_document(&self) -> &EditorDocument {
        self.staged.as_ref().unwrap_or(self.snapshot.as_ref())
    }

    pub fn has_staged(&self) -> bool {
        self.staged.is_some()
    }

    /// Whether the published snapshot is the one last written to the store.
    pub fn is_saved(&self) -> bool {
        self.saved_revision == self.revision
    }

    /// Records that the current snapshot reached the store.
    pub fn mark_saved(&mut self) {
        self.saved_revision = self.revision;
    }

    /// Registers a change listener.
    pub fn subscribe(&mut self, listener: impl FnMut(&ChangeNotice) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Applies `edit` on top of the visible document and publishes it.
    ///
    /// Any staged composition is committed as part of the same change.
    pub fn apply_change(&mut self, edit: &UserEdit) -> Result<ChangeNotice, EditError> {
        let next = self.visible_document().apply(edit)?;
        self.staged = None;
        Ok(self.publish(next))
    }

    /// Applies `edit` to the staged composition without publishing.
    pub fn stage_edit(&mut self, edit: &UserEdit) -> Result<(), EditError> {
        let next = self.visible_document().apply(edit)?;
        self.staged = Some(next);
        Ok(())
    }

    /// Publishes the staged composition, if any.
    pub fn commit_pending(&mut self) -> Option<ChangeNotice> {
        let staged = self.staged.take()?;
        Some(self.publish(staged))
    }

    fn publish(&mut self, document: EditorDocument) -> ChangeNotice {
        self.snapshot = Arc::new(document);
        self.revision += 1;
        let notice = ChangeNotice {
            article_id: self.article_id,
            snapshot: Arc::clone(&self.snapshot),
            revision: self.revision,
        };
        for listener in &mut self.listeners {
            listener(&notice);
        }
        notice
    }
}
