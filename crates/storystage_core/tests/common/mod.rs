#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use storystage_core::{
    ArticleId, ArticlePatch, ArticleRef, RepoError, RepoResult, SqliteStoryStore, StoryId,
    StoryRef, StoryStore,
};

/// Store call as seen by the stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateStory,
    ListStories,
    ReorderStories,
    GetStory(StoryId),
    ListArticles(StoryId),
    GetArticle(ArticleId),
    EditArticle(ArticleId),
    CreateArticle(StoryId, usize),
}

/// SQLite store that records every call and can refuse writes.
pub struct RecordingStore<'conn> {
    inner: SqliteStoryStore<'conn>,
    pub calls: Rc<RefCell<Vec<Call>>>,
    pub refuse_writes: Rc<Cell<bool>>,
}

impl<'conn> RecordingStore<'conn> {
    pub fn new(conn: &'conn rusqlite::Connection) -> Self {
        Self {
            inner: SqliteStoryStore::try_new(conn).unwrap(),
            calls: Rc::new(RefCell::new(Vec::new())),
            refuse_writes: Rc::new(Cell::new(false)),
        }
    }

    pub fn inner(&self) -> &SqliteStoryStore<'conn> {
        &self.inner
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

impl StoryStore for RecordingStore<'_> {
    fn create_story(&self, name: &str, first_chapter_name: &str) -> RepoResult<StoryRef> {
        self.record(Call::CreateStory);
        self.inner.create_story(name, first_chapter_name)
    }

    fn list_stories(&self) -> RepoResult<Vec<StoryRef>> {
        self.record(Call::ListStories);
        self.inner.list_stories()
    }

    fn reorder_stories(&self, order: &[StoryId]) -> RepoResult<()> {
        self.record(Call::ReorderStories);
        self.inner.reorder_stories(order)
    }

    fn get_story(&self, story_id: StoryId) -> RepoResult<Option<StoryRef>> {
        self.record(Call::GetStory(story_id));
        self.inner.get_story(story_id)
    }

    fn list_articles(&self, story_id: StoryId) -> RepoResult<Vec<ArticleRef>> {
        self.record(Call::ListArticles(story_id));
        self.inner.list_articles(story_id)
    }

    fn get_article(&self, article_id: ArticleId) -> RepoResult<Option<ArticleRef>> {
        self.record(Call::GetArticle(article_id));
        self.inner.get_article(article_id)
    }

    fn edit_article(&self, article_id: ArticleId, patch: &ArticlePatch) -> RepoResult<()> {
        self.record(Call::EditArticle(article_id));
        if self.refuse_writes.get() {
            return Err(RepoError::InvalidData("write refused".to_string()));
        }
        self.inner.edit_article(article_id, patch)
    }

    fn create_article(&self, story_id: StoryId, index: usize) -> RepoResult<ArticleRef> {
        self.record(Call::CreateArticle(story_id, index));
        self.inner.create_article(story_id, index)
    }
}

/// Creates a story with `pages` articles; the first opens chapter "One".
pub fn seed_story(store: &SqliteStoryStore<'_>, pages: usize) -> StoryRef {
    let story = store.create_story("Story", "One").unwrap();
    for index in 1..pages {
        store.create_article(story.id, index).unwrap();
    }
    store.get_story(story.id).unwrap().unwrap()
}

/// Plain text of the persisted draft of `article_id`.
pub fn stored_text(store: &SqliteStoryStore<'_>, article_id: ArticleId) -> Option<String> {
    let article = store.get_article(article_id).unwrap().unwrap();
    storystage_core::decode(article.draft_content.as_deref())
        .unwrap()
        .map(|document| document.plain_text())
}
