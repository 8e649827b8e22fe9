//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.
//!
//! Every method is atomic on a single document. Methods that touch more than
//! one document say so and must be atomic across them as well (a store
//! transaction or equivalent). Everything else that spans documents is
//! orchestrated, with compensation, in `rw-services`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    Article, Comment, ContributionKind, Portal, Section, Session, TalkPage, Topic, User,
};
use crate::payloads::{PortalPatch, UserUpdate};

/// Persistence contract for the users collection.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Fails with `DuplicateKey` on a taken username or email.
    async fn insert(&self, user: &User) -> anyhow::Result<()>;
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;
    /// Bulk lookup; ids that do not resolve are skipped.
    async fn find_many(&self, ids: &[Uuid]) -> anyhow::Result<Vec<User>>;
    async fn list(&self) -> anyhow::Result<Vec<User>>;
    /// Sets the given fields. Returns `false` if the user does not exist.
    /// Fails with `DuplicateKey` on a taken username or email.
    async fn update_fields(&self, id: Uuid, update: &UserUpdate) -> anyhow::Result<bool>;
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;

    /// Idempotent add to one contribution list. Returns `false` if the user
    /// does not exist.
    async fn add_contribution(
        &self,
        user_id: Uuid,
        kind: ContributionKind,
        id: Uuid,
    ) -> anyhow::Result<bool>;
    /// Removes `id` from the given list of every user holding it. Safe to
    /// re-run. Returns the number of users changed.
    async fn pull_contribution(&self, kind: ContributionKind, id: Uuid) -> anyhow::Result<u64>;
}

/// Persistence contract for articles and the talk page each one owns.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ArticleRepo: Send + Sync {
    /// Writes the article and its talk page together, or neither.
    async fn insert_with_talk(&self, article: &Article, talk: &TalkPage) -> anyhow::Result<()>;
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Article>>;
    /// Bulk lookup in the order of `ids`; ids that do not resolve are skipped.
    async fn find_many(&self, ids: &[Uuid]) -> anyhow::Result<Vec<Article>>;
    /// Every article, newest first.
    async fn list(&self) -> anyhow::Result<Vec<Article>>;
    /// Replaces the whole document. Returns `false` if it does not exist.
    async fn replace(&self, article: &Article) -> anyhow::Result<bool>;
    /// Replaces one embedded section, matched by id, and bumps `updated_at`.
    /// Returns `false` if the article or section does not exist.
    async fn update_section(
        &self,
        article_id: Uuid,
        section: &Section,
        updated_at: DateTime<Utc>,
    ) -> anyhow::Result<bool>;
    /// Removes one embedded section unless it is the last one.
    async fn remove_section(
        &self,
        article_id: Uuid,
        section_id: Uuid,
        updated_at: DateTime<Utc>,
    ) -> anyhow::Result<SectionRemoval>;
    /// Deletes the article and its talk page together. Safe to re-run;
    /// returns `false` if nothing was left to delete.
    async fn delete_with_talk(&self, id: Uuid) -> anyhow::Result<bool>;
    /// Full-text search over title, intro and section titles/text. Returns
    /// one page of hits plus the total hit count.
    async fn search(
        &self,
        query: &str,
        offset: u64,
        limit: u64,
    ) -> anyhow::Result<(Vec<Article>, u64)>;
}

/// Outcome of `ArticleRepo::remove_section`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionRemoval {
    Removed,
    ArticleMissing,
    SectionMissing,
    LastSection,
}

/// Persistence contract for talk pages and their embedded topics/comments.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait TalkRepo: Send + Sync {
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<TalkPage>>;
    async fn find_by_article(&self, article_id: Uuid) -> anyhow::Result<Option<TalkPage>>;
    /// Returns `false` if the talk page does not exist.
    async fn push_topic(&self, talk_id: Uuid, topic: &Topic) -> anyhow::Result<bool>;
    async fn update_topic(
        &self,
        talk_id: Uuid,
        topic_id: Uuid,
        title: &str,
        content: &str,
        edited_at: DateTime<Utc>,
    ) -> anyhow::Result<bool>;
    /// Returns the removed topic, comments included.
    async fn remove_topic(&self, talk_id: Uuid, topic_id: Uuid) -> anyhow::Result<Option<Topic>>;
    /// Returns `false` if the talk page or topic does not exist.
    async fn push_comment(
        &self,
        talk_id: Uuid,
        topic_id: Uuid,
        comment: &Comment,
    ) -> anyhow::Result<bool>;
    async fn update_comment(
        &self,
        talk_id: Uuid,
        topic_id: Uuid,
        comment_id: Uuid,
        content: &str,
        edited_at: DateTime<Utc>,
    ) -> anyhow::Result<bool>;
    async fn remove_comment(
        &self,
        talk_id: Uuid,
        topic_id: Uuid,
        comment_id: Uuid,
    ) -> anyhow::Result<Option<Comment>>;
}

/// Persistence contract for portals.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PortalRepo: Send + Sync {
    async fn insert(&self, portal: &Portal) -> anyhow::Result<()>;
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Portal>>;
    async fn list(&self) -> anyhow::Result<Vec<Portal>>;
    async fn update_fields(
        &self,
        id: Uuid,
        patch: &PortalPatch,
        updated_at: DateTime<Utc>,
    ) -> anyhow::Result<bool>;
    /// Appends to the membership list. Returns `false` if the portal does not
    /// exist or is being deleted.
    async fn add_article(&self, portal_id: Uuid, article_id: Uuid) -> anyhow::Result<bool>;
    /// Removes `article_id` from every portal listing it. Safe to re-run.
    async fn pull_article(&self, article_id: Uuid) -> anyhow::Result<u64>;
    /// Persists the in-progress marker of a cascade delete.
    async fn mark_deleting(&self, id: Uuid) -> anyhow::Result<bool>;
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
}

/// Persistence contract for the mailing list.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MailingListRepo: Send + Sync {
    /// Fails with `DuplicateKey` if the email is already listed.
    async fn insert(&self, email: &str) -> anyhow::Result<()>;
    async fn contains(&self, email: &str) -> anyhow::Result<bool>;
    /// Finds the entry by its old email and rewrites it. Returns `false` if
    /// there was no such entry.
    async fn replace(&self, old_email: &str, new_email: &str) -> anyhow::Result<bool>;
    async fn delete(&self, email: &str) -> anyhow::Result<bool>;
}

/// Password hashing primitive. Implementations may block, so both calls are
/// async to let them move work off the executor.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PasswordHasher: Send + Sync {
    async fn hash(&self, password: &str) -> anyhow::Result<String>;
    async fn verify(&self, password: &str, hash: &str) -> anyhow::Result<bool>;
}

/// Strips unsafe markup from user-supplied rich text.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait ContentSanitizer: Send + Sync {
    fn sanitize(&self, text: &str) -> String;
}

/// Session/Identity Provider contract.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, user_id: Uuid) -> anyhow::Result<Session>;
    /// Returns the session if it exists and has not expired.
    async fn get(&self, token: &str) -> anyhow::Result<Option<Session>>;
    async fn destroy(&self, token: &str) -> anyhow::Result<()>;
    /// Ends every session of a user (ban, deletion, password reset).
    async fn destroy_user(&self, user_id: Uuid) -> anyhow::Result<()>;
}

/// Time source, injectable so lockout windows can be tested.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
