//! # Domain Models
//!
//! These structs represent the documents of Rusty-Wiki's five collections:
//! users, articles, portals, talk pages and the mailing list.
//! Identifiers are UUID v7 so documents sort by creation time.
//!
//! Child records (sections, topics, comments) are embedded in their parent
//! document and addressed by their own stable id, never by position.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Users ───────────────────────────────────────────────────────────────────

/// A registered account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    /// Unique, alphanumeric, 3–25 characters.
    pub username: String,
    /// Unique, lower-cased, at most 35 characters.
    pub email: String,
    pub password_hash: String,
    #[serde(default)]
    pub bio: String,
    pub joined_date: DateTime<Utc>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub is_banned: bool,
    #[serde(default)]
    pub failed_login_attempts: u32,
    pub lock_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub contributions: Contributions,
}

impl User {
    /// An account is locked iff `lock_until` is set and still in the future.
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.lock_until.is_some_and(|until| until > now)
    }

    pub fn actor(&self) -> Actor {
        Actor {
            id: self.id,
            username: self.username.clone(),
            is_admin: self.is_admin,
        }
    }
}

/// The kinds of content a user can be credited with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContributionKind {
    Article,
    Topic,
    Comment,
}

impl std::fmt::Display for ContributionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContributionKind::Article => write!(f, "article"),
            ContributionKind::Topic => write!(f, "topic"),
            ContributionKind::Comment => write!(f, "comment"),
        }
    }
}

/// Weak references from a user to the content they authored.
///
/// Each list behaves as an insertion-ordered set. The lists never own the
/// referenced entity; whoever deletes the entity pulls the id from here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contributions {
    #[serde(default)]
    pub article_ids: Vec<Uuid>,
    #[serde(default)]
    pub topic_ids: Vec<Uuid>,
    #[serde(default)]
    pub comment_ids: Vec<Uuid>,
}

impl Contributions {
    pub fn ids(&self, kind: ContributionKind) -> &[Uuid] {
        match kind {
            ContributionKind::Article => &self.article_ids,
            ContributionKind::Topic => &self.topic_ids,
            ContributionKind::Comment => &self.comment_ids,
        }
    }

    fn ids_mut(&mut self, kind: ContributionKind) -> &mut Vec<Uuid> {
        match kind {
            ContributionKind::Article => &mut self.article_ids,
            ContributionKind::Topic => &mut self.topic_ids,
            ContributionKind::Comment => &mut self.comment_ids,
        }
    }

    pub fn contains(&self, kind: ContributionKind, id: Uuid) -> bool {
        self.ids(kind).contains(&id)
    }

    /// Idempotent add. Returns `true` if the id was not present before.
    pub fn add(&mut self, kind: ContributionKind, id: Uuid) -> bool {
        let ids = self.ids_mut(kind);
        if ids.contains(&id) {
            return false;
        }
        ids.push(id);
        true
    }

    /// Idempotent remove. Returns `true` if the id was present.
    pub fn remove(&mut self, kind: ContributionKind, id: Uuid) -> bool {
        let ids = self.ids_mut(kind);
        let before = ids.len();
        ids.retain(|existing| *existing != id);
        ids.len() != before
    }
}

/// The identity behind a request, as resolved by the session layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub id: Uuid,
    pub username: String,
    /// Capability flag: admins pass every ownership check.
    pub is_admin: bool,
}

/// One entry per registered user, kept in sync with `User::email`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailingListEntry {
    pub email: String,
}

// ── Articles ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

/// The primary content document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: Uuid,
    pub title: String,
    pub intro: String,
    /// Ordered sections; always at least one.
    pub content: Vec<Section>,
    pub info_box: InfoBox,
    #[serde(default)]
    pub references: Vec<Reference>,
    pub author: Uuid,
    /// The talk page created together with this article.
    pub talk: Uuid,
    #[serde(default)]
    pub status: ArticleStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    pub fn section(&self, id: Uuid) -> Option<&Section> {
        self.content.iter().find(|s| s.id == id)
    }

    pub fn section_mut(&mut self, id: Uuid) -> Option<&mut Section> {
        self.content.iter_mut().find(|s| s.id == id)
    }

    pub fn remove_section(&mut self, id: Uuid) -> Option<Section> {
        let index = self.content.iter().position(|s| s.id == id)?;
        Some(self.content.remove(index))
    }
}

/// A titled block of article text. Its id survives article updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: Uuid,
    pub title: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<SectionImage>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageAlign {
    #[default]
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionImage {
    pub src: String,
    #[serde(default)]
    pub alt: String,
    #[serde(default)]
    pub align: ImageAlign,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub src: String,
    #[serde(default)]
    pub alt: String,
}

/// The summary box rendered beside an article.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoBox {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Image>,
    #[serde(default)]
    pub info: Vec<InfoRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoRow {
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default)]
    pub header: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub link: String,
}

// ── Portals ─────────────────────────────────────────────────────────────────

/// A topic hub owning an ordered membership list of articles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Portal {
    pub id: Uuid,
    pub portal_title: String,
    pub portal_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portal_image: Option<Image>,
    #[serde(default)]
    pub articles: Vec<Uuid>,
    pub owner: Uuid,
    /// Set once a cascade delete has started; the portal is then unreadable
    /// and a repeated delete resumes the cascade.
    #[serde(default)]
    pub deleting: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ── Talk pages ──────────────────────────────────────────────────────────────

/// The discussion board attached to exactly one article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TalkPage {
    pub id: Uuid,
    pub article_id: Uuid,
    #[serde(default)]
    pub discussions: Vec<Topic>,
}

impl TalkPage {
    pub fn empty(article_id: Uuid) -> Self {
        Self {
            id: Uuid::now_v7(),
            article_id,
            discussions: Vec::new(),
        }
    }

    pub fn topic(&self, id: Uuid) -> Option<&Topic> {
        self.discussions.iter().find(|t| t.id == id)
    }

    pub fn topic_mut(&mut self, id: Uuid) -> Option<&mut Topic> {
        self.discussions.iter_mut().find(|t| t.id == id)
    }

    pub fn remove_topic(&mut self, id: Uuid) -> Option<Topic> {
        let index = self.discussions.iter().position(|t| t.id == id)?;
        Some(self.discussions.remove(index))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub author: Uuid,
    #[serde(default)]
    pub comments: Vec<Comment>,
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<DateTime<Utc>>,
}

impl Topic {
    pub fn comment(&self, id: Uuid) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == id)
    }

    pub fn comment_mut(&mut self, id: Uuid) -> Option<&mut Comment> {
        self.comments.iter_mut().find(|c| c.id == id)
    }

    pub fn remove_comment(&mut self, id: Uuid) -> Option<Comment> {
        let index = self.comments.iter().position(|c| c.id == id)?;
        Some(self.comments.remove(index))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub author: Uuid,
    pub content: String,
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<DateTime<Utc>>,
}

// ── Sessions ────────────────────────────────────────────────────────────────

/// A logged-in session issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Opaque cookie value.
    pub token: String,
    pub user_id: Uuid,
    /// Anti-forgery token the client echoes on mutating requests.
    pub csrf_token: String,
    pub expires_at: DateTime<Utc>,
}
