//! rusty-wiki/crates/rw-core/src/lib.rs
//!
//! The central domain model and interface definitions for Rusty-Wiki.

pub mod error;
pub mod models;
pub mod payloads;
pub mod policy;
pub mod traits;
pub mod validation;

// Re-exporting for easier access in other crates
pub use error::*;
pub use models::*;
pub use payloads::*;
pub use policy::*;
pub use traits::*;

#[cfg(test)]
mod tests {
    use super::models::*;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn user() -> User {
        User {
            id: Uuid::now_v7(),
            username: "alice".into(),
            email: "alice@example.com".into(),
            password_hash: "hash".into(),
            bio: String::new(),
            joined_date: Utc::now(),
            is_admin: false,
            is_banned: false,
            failed_login_attempts: 0,
            lock_until: None,
            contributions: Contributions::default(),
        }
    }

    #[test]
    fn lock_only_applies_while_in_the_future() {
        let now = Utc::now();
        let mut user = user();
        assert!(!user.is_locked(now));
        user.lock_until = Some(now + Duration::minutes(5));
        assert!(user.is_locked(now));
        assert!(!user.is_locked(now + Duration::minutes(6)));
    }

    #[test]
    fn contributions_behave_as_ordered_sets() {
        let mut c = Contributions::default();
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        assert!(c.add(ContributionKind::Article, a));
        assert!(!c.add(ContributionKind::Article, a));
        assert!(c.add(ContributionKind::Article, b));
        assert_eq!(c.article_ids, vec![a, b]);
        assert!(c.remove(ContributionKind::Article, a));
        assert!(!c.remove(ContributionKind::Article, a));
        assert!(c.topic_ids.is_empty());
    }

    #[test]
    fn documents_use_camel_case_field_names() {
        let json = serde_json::to_value(user()).unwrap();
        assert!(json.get("passwordHash").is_some());
        assert!(json["contributions"].get("articleIds").is_some());
    }

    #[test]
    fn embedded_children_are_addressed_by_id() {
        let now = Utc::now();
        let mut talk = TalkPage::empty(Uuid::now_v7());
        let topic = Topic {
            id: Uuid::now_v7(),
            title: "Bug?".into(),
            content: "Is this a bug or not?".into(),
            author: Uuid::now_v7(),
            comments: Vec::new(),
            date: now,
            edited_at: None,
        };
        let topic_id = topic.id;
        talk.discussions.push(topic);
        assert!(talk.topic(topic_id).is_some());
        assert!(talk.remove_topic(topic_id).is_some());
        assert!(talk.topic(topic_id).is_none());
    }
}
