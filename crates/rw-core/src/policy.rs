//! Authorization decisions.
//!
//! One pure decision function per (resource kind, action) pair. The
//! services consume a single [`AuthorizationPolicy`] instead of deriving
//! owner/admin logic in each operation.

use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Actor, Article, Comment, Portal, Topic};

/// Decides whether an actor may act on a resource.
///
/// Every method is pure: no I/O, no clock. The parent article author is
/// passed explicitly where moderation rights derive from it.
pub trait AuthorizationPolicy: Send + Sync {
    fn can_edit_article(&self, actor: &Actor, article: &Article) -> bool;
    fn can_delete_article(&self, actor: &Actor, article: &Article) -> bool;

    fn can_edit_portal(&self, actor: &Actor, portal: &Portal) -> bool;
    fn can_delete_portal(&self, actor: &Actor, portal: &Portal) -> bool;

    fn can_edit_topic(&self, actor: &Actor, topic: &Topic) -> bool;
    fn can_delete_topic(&self, actor: &Actor, topic: &Topic, article_author: Uuid) -> bool;

    fn can_edit_comment(&self, actor: &Actor, comment: &Comment) -> bool;
    fn can_delete_comment(&self, actor: &Actor, comment: &Comment, article_author: Uuid) -> bool;

    /// Self-service account changes (profile update, deletion).
    fn can_manage_user(&self, actor: &Actor, user_id: Uuid) -> bool;
    /// Ban/unban, password resets, listing every account.
    fn can_administer(&self, actor: &Actor) -> bool;
}

/// Owners act on what they own; article authors moderate their talk page;
/// admins may do everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPolicy;

impl AuthorizationPolicy for DefaultPolicy {
    fn can_edit_article(&self, actor: &Actor, article: &Article) -> bool {
        actor.is_admin || actor.id == article.author
    }

    fn can_delete_article(&self, actor: &Actor, article: &Article) -> bool {
        actor.is_admin || actor.id == article.author
    }

    fn can_edit_portal(&self, actor: &Actor, portal: &Portal) -> bool {
        actor.is_admin || actor.id == portal.owner
    }

    fn can_delete_portal(&self, actor: &Actor, portal: &Portal) -> bool {
        actor.is_admin || actor.id == portal.owner
    }

    fn can_edit_topic(&self, actor: &Actor, topic: &Topic) -> bool {
        actor.is_admin || actor.id == topic.author
    }

    fn can_delete_topic(&self, actor: &Actor, topic: &Topic, article_author: Uuid) -> bool {
        actor.is_admin || actor.id == topic.author || actor.id == article_author
    }

    fn can_edit_comment(&self, actor: &Actor, comment: &Comment) -> bool {
        actor.is_admin || actor.id == comment.author
    }

    fn can_delete_comment(&self, actor: &Actor, comment: &Comment, article_author: Uuid) -> bool {
        actor.is_admin || actor.id == comment.author || actor.id == article_author
    }

    fn can_manage_user(&self, actor: &Actor, user_id: Uuid) -> bool {
        actor.is_admin || actor.id == user_id
    }

    fn can_administer(&self, actor: &Actor) -> bool {
        actor.is_admin
    }
}

/// Turns a denied decision into `Forbidden`.
pub fn ensure(allowed: bool, action: &str) -> Result<()> {
    if allowed {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "you do not have permission to {action}"
        )))
    }
}
