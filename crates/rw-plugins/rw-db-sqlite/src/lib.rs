//! # rw-db-sqlite Implementation
//!
//! Stores each document as JSON in a `doc` column, next to the key columns
//! SQLite needs for unique indexes, lookups and ordering.
//!
//! Single-document edits run inside a transaction that takes the write lock
//! before reading, so a read-modify-write never interleaves with another.
//! The article/talk-page pair is written and deleted in one transaction.

use std::collections::HashMap;
use std::str::FromStr;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rw_core::error::DuplicateKey;
use rw_core::models::{
    Article, Comment, ContributionKind, Portal, Section, TalkPage, Topic, User,
};
use rw_core::payloads::{PortalPatch, UserUpdate};
use rw_core::traits::{ArticleRepo, MailingListRepo, PortalRepo, SectionRemoval, TalkRepo, UserRepo};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use uuid::Uuid;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id BLOB PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL UNIQUE,
        joined_at INTEGER NOT NULL,
        doc TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        id BLOB PRIMARY KEY,
        created_at INTEGER NOT NULL,
        doc TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_articles_created_at ON articles(created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS talk_pages (
        id BLOB PRIMARY KEY,
        article_id BLOB NOT NULL UNIQUE,
        doc TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS portals (
        id BLOB PRIMARY KEY,
        created_at INTEGER NOT NULL,
        doc TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS mailing_list (
        email TEXT PRIMARY KEY
    )
    "#,
];

/// A JSON document living in one table.
trait Document: Serialize + DeserializeOwned + Send {
    const TABLE: &'static str;
}

impl Document for User {
    const TABLE: &'static str = "users";
}

impl Document for Article {
    const TABLE: &'static str = "articles";
}

impl Document for TalkPage {
    const TABLE: &'static str = "talk_pages";
}

impl Document for Portal {
    const TABLE: &'static str = "portals";
}

/// What to do with a document after an edit closure has looked at it.
enum Edit<R> {
    Save(R),
    Discard(R),
}

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connects and creates the tables if they do not exist yet.
    pub async fn new(url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| "invalid sqlite url")?
            .create_if_missing(true);

        // In-memory databases vanish with their connection, so never recycle.
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> anyhow::Result<()> {
        tracing::info!("Running database migrations...");
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn fetch<D: Document>(&self, id: Uuid) -> anyhow::Result<Option<D>> {
        let sql = format!("SELECT doc FROM {} WHERE id = ?", D::TABLE);
        let raw: Option<String> = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        raw.as_deref().map(decode).transpose()
    }

    async fn fetch_all<D: Document>(&self, order_by: &str) -> anyhow::Result<Vec<D>> {
        let sql = format!("SELECT doc FROM {} ORDER BY {order_by}", D::TABLE);
        let rows: Vec<String> = sqlx::query_scalar(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(|raw| decode(raw)).collect()
    }

    /// Bulk lookup returned in the order of `ids`.
    async fn fetch_many<D: Document>(
        &self,
        ids: &[Uuid],
        id_of: impl Fn(&D) -> Uuid,
    ) -> anyhow::Result<Vec<D>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("SELECT doc FROM {} WHERE id IN ({placeholders})", D::TABLE);
        let mut query = sqlx::query_scalar::<_, String>(&sql);
        for id in ids {
            query = query.bind(*id);
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut by_id = HashMap::with_capacity(rows.len());
        for raw in &rows {
            let doc: D = decode(raw)?;
            by_id.insert(id_of(&doc), doc);
        }
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    /// Read-modify-write of one document. Returns `None` if it does not exist.
    async fn modify<D, R>(
        &self,
        id: Uuid,
        edit: impl FnOnce(&mut D) -> Edit<R> + Send,
    ) -> anyhow::Result<Option<R>>
    where
        D: Document,
        R: Send,
    {
        let mut tx = self.pool.begin().await?;

        // Take the write lock before reading.
        let touch = format!("UPDATE {} SET doc = doc WHERE id = ?", D::TABLE);
        let touched = sqlx::query(&touch).bind(id).execute(&mut *tx).await?;
        if touched.rows_affected() == 0 {
            return Ok(None);
        }

        let select = format!("SELECT doc FROM {} WHERE id = ?", D::TABLE);
        let raw: String = sqlx::query_scalar(&select)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        let mut doc: D = decode(&raw)?;

        match edit(&mut doc) {
            Edit::Save(outcome) => {
                let update = format!("UPDATE {} SET doc = ? WHERE id = ?", D::TABLE);
                sqlx::query(&update)
                    .bind(serde_json::to_string(&doc)?)
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                tx.commit().await?;
                Ok(Some(outcome))
            }
            Edit::Discard(outcome) => {
                tx.rollback().await?;
                Ok(Some(outcome))
            }
        }
    }

    async fn delete_row(&self, table: &str, id: Uuid) -> anyhow::Result<bool> {
        let sql = format!("DELETE FROM {table} WHERE id = ?");
        let done = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(done.rows_affected() > 0)
    }
}

fn decode<D: DeserializeOwned>(raw: &str) -> anyhow::Result<D> {
    serde_json::from_str(raw).context("corrupt document")
}

/// Turns a unique-index rejection into the typed `DuplicateKey`.
fn map_unique(err: sqlx::Error) -> anyhow::Error {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            let field = if db.message().contains(".username") {
                "username"
            } else {
                "email"
            };
            return anyhow::Error::new(DuplicateKey { field });
        }
    }
    err.into()
}

/// `%term%` with LIKE wildcards escaped by `\`.
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// 1 if the term (bound four times) hits title, intro or any section.
const TERM_HIT: &str = r#"(CASE WHEN
    lower(json_extract(doc, '$.title')) LIKE ? ESCAPE '\'
    OR lower(json_extract(doc, '$.intro')) LIKE ? ESCAPE '\'
    OR EXISTS (
        SELECT 1 FROM json_each(doc, '$.content') AS s
        WHERE lower(json_extract(s.value, '$.title')) LIKE ? ESCAPE '\'
           OR lower(json_extract(s.value, '$.text')) LIKE ? ESCAPE '\'
    )
    THEN 1 ELSE 0 END)"#;

#[async_trait]
impl UserRepo for SqliteStore {
    async fn insert(&self, user: &User) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO users (id, username, email, joined_at, doc) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(user.joined_date.timestamp_micros())
        .bind(serde_json::to_string(user)?)
        .execute(&self.pool)
        .await
        .map_err(map_unique)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        self.fetch(id).await
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let raw: Option<String> = sqlx::query_scalar("SELECT doc FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        raw.as_deref().map(decode).transpose()
    }

    async fn find_many(&self, ids: &[Uuid]) -> anyhow::Result<Vec<User>> {
        self.fetch_many(ids, |u: &User| u.id).await
    }

    async fn list(&self) -> anyhow::Result<Vec<User>> {
        self.fetch_all("joined_at ASC").await
    }

    async fn update_fields(&self, id: Uuid, update: &UserUpdate) -> anyhow::Result<bool> {
        let mut tx = self.pool.begin().await?;

        let touched = sqlx::query("UPDATE users SET doc = doc WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if touched.rows_affected() == 0 {
            return Ok(false);
        }

        let raw: String = sqlx::query_scalar("SELECT doc FROM users WHERE id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        let mut user: User = decode(&raw)?;
        update.apply_to(&mut user);

        sqlx::query("UPDATE users SET username = ?, email = ?, doc = ? WHERE id = ?")
            .bind(&user.username)
            .bind(&user.email)
            .bind(serde_json::to_string(&user)?)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_unique)?;
        tx.commit().await?;
        Ok(true)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        self.delete_row(User::TABLE, id).await
    }

    async fn add_contribution(
        &self,
        user_id: Uuid,
        kind: ContributionKind,
        id: Uuid,
    ) -> anyhow::Result<bool> {
        let done = self
            .modify(user_id, |user: &mut User| {
                if user.contributions.add(kind, id) {
                    Edit::Save(())
                } else {
                    Edit::Discard(())
                }
            })
            .await?;
        Ok(done.is_some())
    }

    async fn pull_contribution(&self, kind: ContributionKind, id: Uuid) -> anyhow::Result<u64> {
        let needle = id.to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE users SET doc = doc WHERE instr(doc, ?) > 0")
            .bind(&needle)
            .execute(&mut *tx)
            .await?;
        let rows: Vec<(Uuid, String)> =
            sqlx::query_as("SELECT id, doc FROM users WHERE instr(doc, ?) > 0")
                .bind(&needle)
                .fetch_all(&mut *tx)
                .await?;

        let mut changed = 0;
        for (user_id, raw) in rows {
            let mut user: User = decode(&raw)?;
            if user.contributions.remove(kind, id) {
                sqlx::query("UPDATE users SET doc = ? WHERE id = ?")
                    .bind(serde_json::to_string(&user)?)
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await?;
                changed += 1;
            }
        }
        tx.commit().await?;
        Ok(changed)
    }
}

#[async_trait]
impl ArticleRepo for SqliteStore {
    async fn insert_with_talk(&self, article: &Article, talk: &TalkPage) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO articles (id, created_at, doc) VALUES (?, ?, ?)")
            .bind(article.id)
            .bind(article.created_at.timestamp_micros())
            .bind(serde_json::to_string(article)?)
            .execute(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO talk_pages (id, article_id, doc) VALUES (?, ?, ?)")
            .bind(talk.id)
            .bind(talk.article_id)
            .bind(serde_json::to_string(talk)?)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Article>> {
        self.fetch(id).await
    }

    async fn find_many(&self, ids: &[Uuid]) -> anyhow::Result<Vec<Article>> {
        self.fetch_many(ids, |a: &Article| a.id).await
    }

    async fn list(&self) -> anyhow::Result<Vec<Article>> {
        self.fetch_all("created_at DESC").await
    }

    async fn replace(&self, article: &Article) -> anyhow::Result<bool> {
        let replacement = article.clone();
        let done = self
            .modify(article.id, move |doc: &mut Article| {
                *doc = replacement;
                Edit::Save(())
            })
            .await?;
        Ok(done.is_some())
    }

    async fn update_section(
        &self,
        article_id: Uuid,
        section: &Section,
        updated_at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let section = section.clone();
        let done = self
            .modify(article_id, move |article: &mut Article| {
                match article.section_mut(section.id) {
                    Some(existing) => {
                        *existing = section;
                        article.updated_at = updated_at;
                        Edit::Save(true)
                    }
                    None => Edit::Discard(false),
                }
            })
            .await?;
        Ok(done.unwrap_or(false))
    }

    async fn remove_section(
        &self,
        article_id: Uuid,
        section_id: Uuid,
        updated_at: DateTime<Utc>,
    ) -> anyhow::Result<SectionRemoval> {
        let done = self
            .modify(article_id, move |article: &mut Article| {
                if article.section(section_id).is_none() {
                    return Edit::Discard(SectionRemoval::SectionMissing);
                }
                if article.content.len() <= 1 {
                    return Edit::Discard(SectionRemoval::LastSection);
                }
                article.remove_section(section_id);
                article.updated_at = updated_at;
                Edit::Save(SectionRemoval::Removed)
            })
            .await?;
        Ok(done.unwrap_or(SectionRemoval::ArticleMissing))
    }

    async fn delete_with_talk(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut tx = self.pool.begin().await?;
        let articles = sqlx::query("DELETE FROM articles WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let talks = sqlx::query("DELETE FROM talk_pages WHERE article_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(articles.rows_affected() + talks.rows_affected() > 0)
    }

    async fn search(
        &self,
        query: &str,
        offset: u64,
        limit: u64,
    ) -> anyhow::Result<(Vec<Article>, u64)> {
        let patterns: Vec<String> = query.split_whitespace().map(like_pattern).collect();
        if patterns.is_empty() {
            return Ok((Vec::new(), 0));
        }
        let score = vec![TERM_HIT; patterns.len()].join(" + ");

        let count_sql = format!("SELECT COUNT(*) FROM articles WHERE ({score}) > 0");
        let mut count = sqlx::query_scalar::<_, i64>(&count_sql);
        for pattern in &patterns {
            for _ in 0..4 {
                count = count.bind(pattern.clone());
            }
        }
        let total = count.fetch_one(&self.pool).await?;

        let page_sql = format!(
            "SELECT doc FROM (SELECT doc, created_at, ({score}) AS score FROM articles) \
             WHERE score > 0 ORDER BY score DESC, created_at DESC LIMIT ? OFFSET ?"
        );
        let mut page = sqlx::query_scalar::<_, String>(&page_sql);
        for pattern in &patterns {
            for _ in 0..4 {
                page = page.bind(pattern.clone());
            }
        }
        let rows = page
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .bind(i64::try_from(offset).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        let articles = rows
            .iter()
            .map(|raw| decode(raw))
            .collect::<anyhow::Result<Vec<Article>>>()?;
        Ok((articles, total.max(0) as u64))
    }
}

#[async_trait]
impl TalkRepo for SqliteStore {
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<TalkPage>> {
        self.fetch(id).await
    }

    async fn find_by_article(&self, article_id: Uuid) -> anyhow::Result<Option<TalkPage>> {
        let raw: Option<String> =
            sqlx::query_scalar("SELECT doc FROM talk_pages WHERE article_id = ?")
                .bind(article_id)
                .fetch_optional(&self.pool)
                .await?;
        raw.as_deref().map(decode).transpose()
    }

    async fn push_topic(&self, talk_id: Uuid, topic: &Topic) -> anyhow::Result<bool> {
        let topic = topic.clone();
        let done = self
            .modify(talk_id, move |talk: &mut TalkPage| {
                talk.discussions.push(topic);
                Edit::Save(())
            })
            .await?;
        Ok(done.is_some())
    }

    async fn update_topic(
        &self,
        talk_id: Uuid,
        topic_id: Uuid,
        title: &str,
        content: &str,
        edited_at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let (title, content) = (title.to_string(), content.to_string());
        let done = self
            .modify(talk_id, move |talk: &mut TalkPage| match talk.topic_mut(topic_id) {
                Some(topic) => {
                    topic.title = title;
                    topic.content = content;
                    topic.edited_at = Some(edited_at);
                    Edit::Save(true)
                }
                None => Edit::Discard(false),
            })
            .await?;
        Ok(done.unwrap_or(false))
    }

    async fn remove_topic(&self, talk_id: Uuid, topic_id: Uuid) -> anyhow::Result<Option<Topic>> {
        let done = self
            .modify(talk_id, move |talk: &mut TalkPage| match talk.remove_topic(topic_id) {
                Some(topic) => Edit::Save(Some(topic)),
                None => Edit::Discard(None),
            })
            .await?;
        Ok(done.flatten())
    }

    async fn push_comment(
        &self,
        talk_id: Uuid,
        topic_id: Uuid,
        comment: &Comment,
    ) -> anyhow::Result<bool> {
        let comment = comment.clone();
        let done = self
            .modify(talk_id, move |talk: &mut TalkPage| match talk.topic_mut(topic_id) {
                Some(topic) => {
                    topic.comments.push(comment);
                    Edit::Save(true)
                }
                None => Edit::Discard(false),
            })
            .await?;
        Ok(done.unwrap_or(false))
    }

    async fn update_comment(
        &self,
        talk_id: Uuid,
        topic_id: Uuid,
        comment_id: Uuid,
        content: &str,
        edited_at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let content = content.to_string();
        let done = self
            .modify(talk_id, move |talk: &mut TalkPage| {
                match talk
                    .topic_mut(topic_id)
                    .and_then(|topic| topic.comment_mut(comment_id))
                {
                    Some(comment) => {
                        comment.content = content;
                        comment.edited_at = Some(edited_at);
                        Edit::Save(true)
                    }
                    None => Edit::Discard(false),
                }
            })
            .await?;
        Ok(done.unwrap_or(false))
    }

    async fn remove_comment(
        &self,
        talk_id: Uuid,
        topic_id: Uuid,
        comment_id: Uuid,
    ) -> anyhow::Result<Option<Comment>> {
        let done = self
            .modify(talk_id, move |talk: &mut TalkPage| {
                match talk
                    .topic_mut(topic_id)
                    .and_then(|topic| topic.remove_comment(comment_id))
                {
                    Some(comment) => Edit::Save(Some(comment)),
                    None => Edit::Discard(None),
                }
            })
            .await?;
        Ok(done.flatten())
    }
}

#[async_trait]
impl PortalRepo for SqliteStore {
    async fn insert(&self, portal: &Portal) -> anyhow::Result<()> {
        sqlx::query("INSERT INTO portals (id, created_at, doc) VALUES (?, ?, ?)")
            .bind(portal.id)
            .bind(portal.created_at.timestamp_micros())
            .bind(serde_json::to_string(portal)?)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Portal>> {
        self.fetch(id).await
    }

    async fn list(&self) -> anyhow::Result<Vec<Portal>> {
        self.fetch_all("created_at ASC").await
    }

    async fn update_fields(
        &self,
        id: Uuid,
        patch: &PortalPatch,
        updated_at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let patch = patch.clone();
        let done = self
            .modify(id, move |portal: &mut Portal| {
                patch.apply_to(portal, updated_at);
                Edit::Save(())
            })
            .await?;
        Ok(done.is_some())
    }

    async fn add_article(&self, portal_id: Uuid, article_id: Uuid) -> anyhow::Result<bool> {
        let done = self
            .modify(portal_id, move |portal: &mut Portal| {
                if portal.deleting {
                    return Edit::Discard(false);
                }
                if !portal.articles.contains(&article_id) {
                    portal.articles.push(article_id);
                }
                Edit::Save(true)
            })
            .await?;
        Ok(done.unwrap_or(false))
    }

    async fn pull_article(&self, article_id: Uuid) -> anyhow::Result<u64> {
        let needle = article_id.to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE portals SET doc = doc WHERE instr(doc, ?) > 0")
            .bind(&needle)
            .execute(&mut *tx)
            .await?;
        let rows: Vec<(Uuid, String)> =
            sqlx::query_as("SELECT id, doc FROM portals WHERE instr(doc, ?) > 0")
                .bind(&needle)
                .fetch_all(&mut *tx)
                .await?;

        let mut changed = 0;
        for (portal_id, raw) in rows {
            let mut portal: Portal = decode(&raw)?;
            let before = portal.articles.len();
            portal.articles.retain(|id| *id != article_id);
            if portal.articles.len() != before {
                sqlx::query("UPDATE portals SET doc = ? WHERE id = ?")
                    .bind(serde_json::to_string(&portal)?)
                    .bind(portal_id)
                    .execute(&mut *tx)
                    .await?;
                changed += 1;
            }
        }
        tx.commit().await?;
        Ok(changed)
    }

    async fn mark_deleting(&self, id: Uuid) -> anyhow::Result<bool> {
        let done = self
            .modify(id, |portal: &mut Portal| {
                portal.deleting = true;
                Edit::Save(())
            })
            .await?;
        Ok(done.is_some())
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        self.delete_row(Portal::TABLE, id).await
    }
}

#[async_trait]
impl MailingListRepo for SqliteStore {
    async fn insert(&self, email: &str) -> anyhow::Result<()> {
        sqlx::query("INSERT INTO mailing_list (email) VALUES (?)")
            .bind(email)
            .execute(&self.pool)
            .await
            .map_err(map_unique)?;
        Ok(())
    }

    async fn contains(&self, email: &str) -> anyhow::Result<bool> {
        let found: Option<String> =
            sqlx::query_scalar("SELECT email FROM mailing_list WHERE email = ?")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    async fn replace(&self, old_email: &str, new_email: &str) -> anyhow::Result<bool> {
        let done = sqlx::query("UPDATE mailing_list SET email = ? WHERE email = ?")
            .bind(new_email)
            .bind(old_email)
            .execute(&self.pool)
            .await
            .map_err(map_unique)?;
        Ok(done.rows_affected() > 0)
    }

    async fn delete(&self, email: &str) -> anyhow::Result<bool> {
        let done = sqlx::query("DELETE FROM mailing_list WHERE email = ?")
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }
}
