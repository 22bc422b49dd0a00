//! Story/article store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Expose the article store operations the stage calls into
//!   (`list_articles`, `edit_article`, `create_article`) and story lookups.
//! - Keep SQL details and page-order bookkeeping inside the store boundary.
//!
//! # Invariants
//! - Within one story, `sort_order` values are exactly `0..article_count`.
//! - Inserting at `index` shifts every later article down by one page.
//! - Write paths validate articles before SQL mutations.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::story::{
    Alignment, ArticleId, ArticlePatch, ArticleRef, ArticleValidationError, StoryId, StoryRef,
};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const ARTICLE_SELECT_SQL: &str = "SELECT
    uuid,
    story_uuid,
    chapter_name,
    outline,
    alignment,
    draft_content
FROM articles";

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors from story/article persistence.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    Validation(ArticleValidationError),
    StoryNotFound(StoryId),
    ArticleNotFound(ArticleId),
    /// Insert position is past the end of the story.
    IndexOutOfRange { index: usize, len: usize },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Story reorder request is not a permutation of the stored stories.
    InvalidStoryOrder(String),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::StoryNotFound(id) => write!(f, "story not found: {id}"),
            Self::ArticleNotFound(id) => write!(f, "article not found: {id}"),
            Self::IndexOutOfRange { index, len } => {
                write!(f, "insert index {index} out of range for story of {len} articles")
            }
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "story store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::InvalidStoryOrder(message) => write!(f, "invalid story order: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted story data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<ArticleValidationError> for RepoError {
    fn from(value: ArticleValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Story and article store used by the stage.
///
/// Writes are acknowledged by returning `Ok`.
pub trait StoryStore {
    /// Creates a story together with its first, chapter-opening article.
    fn create_story(&self, name: &str, first_chapter_name: &str) -> RepoResult<StoryRef>;
    fn list_stories(&self) -> RepoResult<Vec<StoryRef>>;
    /// Replaces the story list order; `order` must name every story once.
    fn reorder_stories(&self, order: &[StoryId]) -> RepoResult<()>;
    fn get_story(&self, story_id: StoryId) -> RepoResult<Option<StoryRef>>;
    /// Lists a story's articles in page order.
    fn list_articles(&self, story_id: StoryId) -> RepoResult<Vec<ArticleRef>>;
    fn get_article(&self, article_id: ArticleId) -> RepoResult<Option<ArticleRef>>;
    /// Applies a partial update; `None` fields stay untouched.
    fn edit_article(&self, article_id: ArticleId, patch: &ArticlePatch) -> RepoResult<()>;
    /// Creates an empty article at page `index`, shifting later pages.
    fn create_article(&self, story_id: StoryId, index: usize) -> RepoResult<ArticleRef>;
}

/// SQLite-backed story store.
pub struct SqliteStoryStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteStoryStore<'conn> {
    /// Creates a store from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let expected_version = latest_version();
        let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        if actual_version != expected_version {
            return Err(RepoError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self { conn })
    }
}

impl StoryStore for SqliteStoryStore<'_> {
    fn create_story(&self, name: &str, first_chapter_name: &str) -> RepoResult<StoryRef> {
        let story_id = Uuid::new_v4();
        let mut first = ArticleRef::new(story_id);
        first.chapter_name = Some(first_chapter_name.trim().to_string());
        first.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let sort_order: i64 = tx.query_row(
            "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM stories;",
            [],
            |row| row.get(0),
        )?;
        tx.execute(
            "INSERT INTO stories (uuid, name, sort_order) VALUES (?1, ?2, ?3);",
            params![story_id.to_string(), name.trim(), sort_order],
        )?;
        insert_article_row(&tx, &first, 0)?;
        tx.commit()?;

        debug!("event=story_create module=store status=ok story_id={story_id}");
        Ok(StoryRef {
            id: story_id,
            name: name.trim().to_string(),
            article_order: vec![first.id],
        })
    }

    fn list_stories(&self) -> RepoResult<Vec<StoryRef>> {
        let ids = list_story_ids(self.conn)?;
        let mut stories = Vec::with_capacity(ids.len());
        for story_id in ids {
            if let Some(story) = self.get_story(story_id)? {
                stories.push(story);
            }
        }
        Ok(stories)
    }

    fn reorder_stories(&self, order: &[StoryId]) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let mut stored = list_story_ids(&tx)?;
        let mut requested = order.to_vec();
        stored.sort_unstable();
        requested.sort_unstable();
        if requested.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err(RepoError::InvalidStoryOrder(
                "story listed more than once".to_string(),
            ));
        }
        if requested != stored {
            return Err(RepoError::InvalidStoryOrder(format!(
                "{} ids requested, {} stories stored, sets differ",
                requested.len(),
                stored.len()
            )));
        }

        for (index, story_id) in order.iter().enumerate() {
            tx.execute(
                "UPDATE stories SET sort_order = ?2 WHERE uuid = ?1;",
                params![story_id.to_string(), to_sort_order(index)?],
            )?;
        }
        tx.commit()?;

        debug!(
            "event=story_reorder module=store status=ok stories={}",
            order.len()
        );
        Ok(())
    }

    fn get_story(&self, story_id: StoryId) -> RepoResult<Option<StoryRef>> {
        let name: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM stories WHERE uuid = ?1;",
                [story_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(name) = name else {
            return Ok(None);
        };

        Ok(Some(StoryRef {
            id: story_id,
            name,
            article_order: list_article_ids(self.conn, story_id)?,
        }))
    }

    fn list_articles(&self, story_id: StoryId) -> RepoResult<Vec<ArticleRef>> {
        ensure_story_exists(self.conn, story_id)?;
        let mut stmt = self.conn.prepare(&format!(
            "{ARTICLE_SELECT_SQL}
             WHERE story_uuid = ?1
             ORDER BY sort_order ASC;"
        ))?;
        let mut rows = stmt.query([story_id.to_string()])?;
        let mut articles = Vec::new();
        while let Some(row) = rows.next()? {
            articles.push(parse_article_row(row)?);
        }
        Ok(articles)
    }

    fn get_article(&self, article_id: ArticleId) -> RepoResult<Option<ArticleRef>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ARTICLE_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([article_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_article_row(row)?));
        }
        Ok(None)
    }

    fn edit_article(&self, article_id: ArticleId, patch: &ArticlePatch) -> RepoResult<()> {
        if let Some(name) = &patch.chapter_name {
            if name.trim().is_empty() {
                return Err(ArticleValidationError::BlankChapterName.into());
            }
        }

        let mut assignments = Vec::new();
        let mut bind_values: Vec<Value> = Vec::new();
        if let Some(name) = &patch.chapter_name {
            assignments.push("chapter_name = ?");
            bind_values.push(Value::Text(name.trim().to_string()));
        }
        if let Some(outline) = &patch.outline {
            assignments.push("outline = ?");
            bind_values.push(Value::Text(outline.clone()));
        }
        if let Some(alignment) = patch.alignment {
            assignments.push("alignment = ?");
            bind_values.push(Value::Text(alignment.as_str().to_string()));
        }
        if let Some(blob) = &patch.draft_content {
            assignments.push("draft_content = ?");
            bind_values.push(Value::Text(blob.clone()));
        }

        if assignments.is_empty() {
            return match self.get_article(article_id)? {
                Some(_) => Ok(()),
                None => Err(RepoError::ArticleNotFound(article_id)),
            };
        }

        let sql = format!(
            "UPDATE articles
             SET {},
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?;",
            assignments.join(", ")
        );
        bind_values.push(Value::Text(article_id.to_string()));

        let changed = self.conn.execute(&sql, params_from_iter(bind_values))?;
        if changed == 0 {
            return Err(RepoError::ArticleNotFound(article_id));
        }
        Ok(())
    }

    fn create_article(&self, story_id: StoryId, index: usize) -> RepoResult<ArticleRef> {
        let article = ArticleRef::new(story_id);

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_story_exists(&tx, story_id)?;
        let len = list_article_ids(&tx, story_id)?.len();
        if index > len {
            return Err(RepoError::IndexOutOfRange { index, len });
        }
        let position = to_sort_order(index)?;
        tx.execute(
            "UPDATE articles
             SET sort_order = sort_order + 1
             WHERE story_uuid = ?1
               AND sort_order >= ?2;",
            params![story_id.to_string(), position],
        )?;
        insert_article_row(&tx, &article, position)?;
        tx.commit()?;

        debug!(
            "event=article_create module=store status=ok story_id={} index={}",
            story_id, index
        );
        Ok(article)
    }
}

fn insert_article_row(conn: &Connection, article: &ArticleRef, sort_order: i64) -> RepoResult<()> {
    article.validate()?;
    conn.execute(
        "INSERT INTO articles (
            uuid,
            story_uuid,
            sort_order,
            chapter_name,
            outline,
            alignment,
            draft_content
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
        params![
            article.id.to_string(),
            article.story_id.to_string(),
            sort_order,
            article.chapter_name.as_deref(),
            article.outline.as_str(),
            article.alignment.as_str(),
            article.draft_content.as_deref(),
        ],
    )?;
    Ok(())
}

fn list_story_ids(conn: &Connection) -> RepoResult<Vec<StoryId>> {
    let mut stmt = conn.prepare("SELECT uuid FROM stories ORDER BY sort_order ASC, uuid ASC;")?;
    let ids = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    ids.iter()
        .map(|value| parse_uuid(value, "stories.uuid"))
        .collect()
}

fn list_article_ids(conn: &Connection, story_id: StoryId) -> RepoResult<Vec<ArticleId>> {
    let mut stmt = conn.prepare(
        "SELECT uuid
         FROM articles
         WHERE story_uuid = ?1
         ORDER BY sort_order ASC;",
    )?;
    let ids = stmt
        .query_map([story_id.to_string()], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    ids.iter()
        .map(|value| parse_uuid(value, "articles.uuid"))
        .collect()
}

fn ensure_story_exists(conn: &Connection, story_id: StoryId) -> RepoResult<()> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM stories WHERE uuid = ?1);",
        [story_id.to_string()],
        |row| row.get(0),
    )?;
    if exists == 0 {
        return Err(RepoError::StoryNotFound(story_id));
    }
    Ok(())
}

fn parse_article_row(row: &Row<'_>) -> RepoResult<ArticleRef> {
    let id_text: String = row.get("uuid")?;
    let story_text: String = row.get("story_uuid")?;
    let alignment_text: String = row.get("alignment")?;
    let alignment = Alignment::parse(&alignment_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid alignment `{alignment_text}` in articles.alignment"
        ))
    })?;

    let article = ArticleRef {
        id: parse_uuid(&id_text, "articles.uuid")?,
        story_id: parse_uuid(&story_text, "articles.story_uuid")?,
        chapter_name: row.get("chapter_name")?,
        outline: row.get("outline")?,
        alignment,
        draft_content: row.get("draft_content")?,
    };
    article.validate()?;
    Ok(article)
}

fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

fn to_sort_order(index: usize) -> RepoResult<i64> {
    i64::try_from(index)
        .map_err(|_| RepoError::InvalidData(format!("page index {index} exceeds sort_order range")))
}

impl<T: StoryStore + ?Sized> StoryStore for &T {
    fn create_story(&self, name: &str, first_chapter_name: &str) -> RepoResult<StoryRef> {
        (**self).create_story(name, first_chapter_name)
    }

    fn list_stories(&self) -> RepoResult<Vec<StoryRef>> {
        (**self).list_stories()
    }

    fn reorder_stories(&self, order: &[StoryId]) -> RepoResult<()> {
        (**self).reorder_stories(order)
    }

    fn get_story(&self, story_id: StoryId) -> RepoResult<Option<StoryRef>> {
        (**self).get_story(story_id)
    }

    fn list_articles(&self, story_id: StoryId) -> RepoResult<Vec<ArticleRef>> {
        (**self).list_articles(story_id)
    }

    fn get_article(&self, article_id: ArticleId) -> RepoResult<Option<ArticleRef>> {
        (**self).get_article(article_id)
    }

    fn edit_article(&self, article_id: ArticleId, patch: &ArticlePatch) -> RepoResult<()> {
        (**self).edit_article(article_id, patch)
    }

    fn create_article(&self, story_id: StoryId, index: usize) -> RepoResult<ArticleRef> {
        (**self).create_article(story_id, index)
    }
}
