//! # Payloads
//!
//! Caller-supplied input shapes and the partial field-sets the repositories
//! apply. Every field defaults so a missing value surfaces as a validation
//! message instead of a deserialization failure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ArticleStatus, Image, InfoBox, Reference, SectionImage};

/// Body of `createArticle` / `updateArticle`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArticleDraft {
    pub title: String,
    pub intro: String,
    pub content: Vec<SectionDraft>,
    pub info_box: Option<InfoBox>,
    pub references: Vec<Reference>,
    pub status: Option<ArticleStatus>,
}

/// A section as submitted. `id` is honoured on update when it names an
/// existing section of the article.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SectionDraft {
    pub id: Option<Uuid>,
    pub title: String,
    pub text: String,
    pub image: Option<SectionImage>,
}

/// Field-by-field replacement for one section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SectionPatch {
    pub title: Option<String>,
    pub text: Option<String>,
    pub image: Option<SectionImage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PortalDraft {
    pub portal_title: String,
    pub portal_description: String,
    pub portal_image: Option<Image>,
}

/// Partial portal update; also the field-set `PortalRepo::update_fields` applies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PortalPatch {
    pub portal_title: Option<String>,
    pub portal_description: Option<String>,
    pub portal_image: Option<Image>,
}

impl PortalPatch {
    pub fn is_empty(&self) -> bool {
        self.portal_title.is_none()
            && self.portal_description.is_none()
            && self.portal_image.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TopicDraft {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommentDraft {
    pub content: String,
}

/// Body of `createUser`. The password never leaves the service layer.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub bio: Option<String>,
}

impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("bio", &self.bio)
            .finish()
    }
}

/// Body of `updateUser`.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserPatch {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub bio: Option<String>,
}

impl std::fmt::Debug for UserPatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserPatch")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("bio", &self.bio)
            .finish()
    }
}

/// Field-set applied by `UserRepo::update_fields`. It never touches
/// `contributions`, so it cannot race with contribution bookkeeping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub bio: Option<String>,
    pub is_banned: Option<bool>,
    pub failed_login_attempts: Option<u32>,
    /// `Some(None)` clears the lock.
    pub lock_until: Option<Option<DateTime<Utc>>>,
}

impl UserUpdate {
    pub fn login_state(failed_login_attempts: u32, lock_until: Option<DateTime<Utc>>) -> Self {
        Self {
            failed_login_attempts: Some(failed_login_attempts),
            lock_until: Some(lock_until),
            ..Self::default()
        }
    }

    /// Applies the set fields to an in-memory user document.
    pub fn apply_to(&self, user: &mut crate::models::User) {
        if let Some(username) = &self.username {
            user.username = username.clone();
        }
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(hash) = &self.password_hash {
            user.password_hash = hash.clone();
        }
        if let Some(bio) = &self.bio {
            user.bio = bio.clone();
        }
        if let Some(banned) = self.is_banned {
            user.is_banned = banned;
        }
        if let Some(attempts) = self.failed_login_attempts {
            user.failed_login_attempts = attempts;
        }
        if let Some(lock_until) = self.lock_until {
            user.lock_until = lock_until;
        }
    }
}

impl PortalPatch {
    /// Applies the set fields to an in-memory portal document.
    pub fn apply_to(&self, portal: &mut crate::models::Portal, now: DateTime<Utc>) {
        if let Some(title) = &self.portal_title {
            portal.portal_title = title.clone();
        }
        if let Some(description) = &self.portal_description {
            portal.portal_description = description.clone();
        }
        if let Some(image) = &self.portal_image {
            portal.portal_image = Some(image.clone());
        }
        portal.updated_at = now;
    }
}
