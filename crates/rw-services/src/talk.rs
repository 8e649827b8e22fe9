//! Talk pages: topics and their comments.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rw_core::error::{AppError, Result};
use rw_core::models::{Actor, Article, Comment, ContributionKind, TalkPage, Topic};
use rw_core::payloads::{CommentDraft, TopicDraft};
use rw_core::policy::{ensure, AuthorizationPolicy};
use rw_core::traits::{ArticleRepo, Clock, ContentSanitizer, TalkRepo, UserRepo};
use rw_core::validation;
use serde::Serialize;
use uuid::Uuid;

use crate::sanitize::clean;
use crate::{compensate, Ports};

/// Display name for an author id that no longer resolves.
pub const DELETED_AUTHOR: &str = "[deleted]";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TalkPageView {
    pub id: Uuid,
    pub article_id: Uuid,
    pub article_title: String,
    pub article_author_id: Uuid,
    pub viewer_id: Option<Uuid>,
    pub discussions: Vec<TopicView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicView {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub author: Uuid,
    pub author_name: String,
    pub date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<DateTime<Utc>>,
    /// The viewer may delete this topic.
    pub is_authorized: bool,
    pub can_edit: bool,
    pub comments: Vec<CommentView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: Uuid,
    pub author: Uuid,
    pub author_name: String,
    pub content: String,
    pub date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<DateTime<Utc>>,
    /// The viewer may delete this comment.
    pub is_authorized: bool,
    pub can_edit: bool,
}

#[derive(Clone)]
pub struct TalkService {
    articles: Arc<dyn ArticleRepo>,
    talk: Arc<dyn TalkRepo>,
    users: Arc<dyn UserRepo>,
    sanitizer: Arc<dyn ContentSanitizer>,
    policy: Arc<dyn AuthorizationPolicy>,
    clock: Arc<dyn Clock>,
}

impl TalkService {
    pub fn new(ports: &Ports) -> Self {
        Self {
            articles: ports.articles.clone(),
            talk: ports.talk.clone(),
            users: ports.users.clone(),
            sanitizer: ports.sanitizer.clone(),
            policy: ports.policy.clone(),
            clock: ports.clock.clone(),
        }
    }

    /// The whole discussion tree with author names resolved in one lookup.
    pub async fn get_talk_page(&self, article_id: Uuid, viewer: Option<&Actor>) -> Result<TalkPageView> {
        let (article, talk) = self.locate(article_id).await?;
        let names = self.author_names(talk.discussions.iter()).await?;

        let discussions = talk
            .discussions
            .iter()
            .map(|topic| self.topic_view(topic, &article, viewer, &names))
            .collect();

        Ok(TalkPageView {
            id: talk.id,
            article_id: article.id,
            article_title: article.title,
            article_author_id: article.author,
            viewer_id: viewer.map(|v| v.id),
            discussions,
        })
    }

    pub async fn get_topic(&self, article_id: Uuid, topic_id: Uuid, viewer: Option<&Actor>) -> Result<TopicView> {
        let (article, talk) = self.locate(article_id).await?;
        let topic = find_topic(&talk, topic_id)?;
        let names = self.author_names(std::iter::once(topic)).await?;
        Ok(self.topic_view(topic, &article, viewer, &names))
    }

    pub async fn create_topic(&self, actor: &Actor, article_id: Uuid, draft: TopicDraft) -> Result<Topic> {
        let draft = self.clean_topic(draft);
        validation::validate_topic(&draft)?;
        let (_, talk) = self.locate(article_id).await?;

        let topic = Topic {
            id: Uuid::now_v7(),
            title: draft.title,
            content: draft.content,
            author: actor.id,
            comments: Vec::new(),
            date: self.clock.now(),
            edited_at: None,
        };
        if !self.talk.push_topic(talk.id, &topic).await? {
            return Err(self.missing_talk_page(article_id, talk.id));
        }

        let credited = match self.users.add_contribution(actor.id, ContributionKind::Topic, topic.id).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(AppError::not_found("User", actor.id)),
            Err(e) => Err(AppError::from(e)),
        };
        if let Err(cause) = credited {
            return Err(compensate(cause, "create topic", async {
                self.talk.remove_topic(talk.id, topic.id).await.map(drop)
            })
            .await);
        }

        tracing::info!(article_id = %article_id, topic_id = %topic.id, actor = %actor.id, "topic created");
        Ok(topic)
    }

    pub async fn update_topic(
        &self,
        actor: &Actor,
        article_id: Uuid,
        topic_id: Uuid,
        draft: TopicDraft,
    ) -> Result<Topic> {
        let draft = self.clean_topic(draft);
        validation::validate_topic(&draft)?;
        let (_, talk) = self.locate(article_id).await?;
        let topic = find_topic(&talk, topic_id)?;
        ensure(self.policy.can_edit_topic(actor, topic), "edit this topic")?;

        let now = self.clock.now();
        let mut updated = topic.clone();
        updated.title = draft.title;
        updated.content = draft.content;
        updated.edited_at = Some(now);

        if !self
            .talk
            .update_topic(talk.id, topic_id, &updated.title, &updated.content, now)
            .await?
        {
            return Err(AppError::not_found("Topic", topic_id));
        }

        tracing::info!(article_id = %article_id, topic_id = %topic_id, actor = %actor.id, "topic updated");
        Ok(updated)
    }

    /// Removes the topic with its comments. Contribution entries are pulled
    /// first so a failed run can be repeated.
    pub async fn delete_topic(&self, actor: &Actor, article_id: Uuid, topic_id: Uuid) -> Result<()> {
        let (article, talk) = self.locate(article_id).await?;
        let topic = find_topic(&talk, topic_id)?;
        ensure(
            self.policy.can_delete_topic(actor, topic, article.author),
            "delete this topic",
        )?;

        for comment in &topic.comments {
            self.users
                .pull_contribution(ContributionKind::Comment, comment.id)
                .await?;
        }
        self.users
            .pull_contribution(ContributionKind::Topic, topic_id)
            .await?;

        if self.talk.remove_topic(talk.id, topic_id).await?.is_none() {
            return Err(AppError::not_found("Topic", topic_id));
        }

        tracing::info!(article_id = %article_id, topic_id = %topic_id, actor = %actor.id, "topic deleted");
        Ok(())
    }

    pub async fn create_comment(
        &self,
        actor: &Actor,
        article_id: Uuid,
        topic_id: Uuid,
        draft: CommentDraft,
    ) -> Result<Comment> {
        let draft = CommentDraft {
            content: clean(self.sanitizer.as_ref(), &draft.content),
        };
        validation::validate_comment(&draft)?;
        let (_, talk) = self.locate(article_id).await?;
        find_topic(&talk, topic_id)?;

        let comment = Comment {
            id: Uuid::now_v7(),
            author: actor.id,
            content: draft.content,
            date: self.clock.now(),
            edited_at: None,
        };
        if !self.talk.push_comment(talk.id, topic_id, &comment).await? {
            return Err(AppError::not_found("Topic", topic_id));
        }

        let credited = match self.users.add_contribution(actor.id, ContributionKind::Comment, comment.id).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(AppError::not_found("User", actor.id)),
            Err(e) => Err(AppError::from(e)),
        };
        if let Err(cause) = credited {
            return Err(compensate(cause, "create comment", async {
                self.talk
                    .remove_comment(talk.id, topic_id, comment.id)
                    .await
                    .map(drop)
            })
            .await);
        }

        tracing::info!(article_id = %article_id, topic_id = %topic_id, comment_id = %comment.id, actor = %actor.id, "comment created");
        Ok(comment)
    }

    pub async fn update_comment(
        &self,
        actor: &Actor,
        article_id: Uuid,
        topic_id: Uuid,
        comment_id: Uuid,
        draft: CommentDraft,
    ) -> Result<Comment> {
        let draft = CommentDraft {
            content: clean(self.sanitizer.as_ref(), &draft.content),
        };
        validation::validate_comment(&draft)?;
        let (_, talk) = self.locate(article_id).await?;
        let comment = find_comment(find_topic(&talk, topic_id)?, comment_id)?;
        ensure(self.policy.can_edit_comment(actor, comment), "edit this comment")?;

        let now = self.clock.now();
        let mut updated = comment.clone();
        updated.content = draft.content;
        updated.edited_at = Some(now);

        if !self
            .talk
            .update_comment(talk.id, topic_id, comment_id, &updated.content, now)
            .await?
        {
            return Err(AppError::not_found("Comment", comment_id));
        }

        tracing::info!(article_id = %article_id, topic_id = %topic_id, comment_id = %comment_id, actor = %actor.id, "comment updated");
        Ok(updated)
    }

    pub async fn delete_comment(
        &self,
        actor: &Actor,
        article_id: Uuid,
        topic_id: Uuid,
        comment_id: Uuid,
    ) -> Result<()> {
        let (article, talk) = self.locate(article_id).await?;
        let comment = find_comment(find_topic(&talk, topic_id)?, comment_id)?;
        ensure(
            self.policy.can_delete_comment(actor, comment, article.author),
            "delete this comment",
        )?;

        self.users
            .pull_contribution(ContributionKind::Comment, comment_id)
            .await?;
        if self
            .talk
            .remove_comment(talk.id, topic_id, comment_id)
            .await?
            .is_none()
        {
            return Err(AppError::not_found("Comment", comment_id));
        }

        tracing::info!(article_id = %article_id, topic_id = %topic_id, comment_id = %comment_id, actor = %actor.id, "comment deleted");
        Ok(())
    }

    fn clean_topic(&self, draft: TopicDraft) -> TopicDraft {
        TopicDraft {
            title: draft.title.trim().to_string(),
            content: clean(self.sanitizer.as_ref(), &draft.content),
        }
    }

    /// Resolves the article and follows `article.talk` to its talk page.
    async fn locate(&self, article_id: Uuid) -> Result<(Article, TalkPage)> {
        let article = self
            .articles
            .get(article_id)
            .await?
            .ok_or_else(|| AppError::not_found("Article", article_id))?;
        match self.talk.get(article.talk).await? {
            Some(talk) => Ok((article, talk)),
            None => Err(self.missing_talk_page(article_id, article.talk)),
        }
    }

    /// An article without its talk page breaks the 1:1 creation rule.
    fn missing_talk_page(&self, article_id: Uuid, talk_id: Uuid) -> AppError {
        tracing::error!(
            article_id = %article_id,
            talk_id = %talk_id,
            "integrity violation: article has no talk page"
        );
        AppError::not_found("TalkPage", talk_id)
    }

    async fn author_names<'a>(
        &self,
        topics: impl Iterator<Item = &'a Topic>,
    ) -> Result<HashMap<Uuid, String>> {
        let mut ids = HashSet::new();
        for topic in topics {
            ids.insert(topic.author);
            ids.extend(topic.comments.iter().map(|c| c.author));
        }
        let ids: Vec<Uuid> = ids.into_iter().collect();
        let users = self.users.find_many(&ids).await?;
        Ok(users.into_iter().map(|u| (u.id, u.username)).collect())
    }

    fn topic_view(
        &self,
        topic: &Topic,
        article: &Article,
        viewer: Option<&Actor>,
        names: &HashMap<Uuid, String>,
    ) -> TopicView {
        let name_of = |id: &Uuid| {
            names
                .get(id)
                .cloned()
                .unwrap_or_else(|| DELETED_AUTHOR.to_string())
        };
        let comments = topic
            .comments
            .iter()
            .map(|c| CommentView {
                id: c.id,
                author: c.author,
                author_name: name_of(&c.author),
                content: c.content.clone(),
                date: c.date,
                edited_at: c.edited_at,
                is_authorized: viewer
                    .is_some_and(|v| self.policy.can_delete_comment(v, c, article.author)),
                can_edit: viewer.is_some_and(|v| self.policy.can_edit_comment(v, c)),
            })
            .collect();

        TopicView {
            id: topic.id,
            title: topic.title.clone(),
            content: topic.content.clone(),
            author: topic.author,
            author_name: name_of(&topic.author),
            date: topic.date,
            edited_at: topic.edited_at,
            is_authorized: viewer
                .is_some_and(|v| self.policy.can_delete_topic(v, topic, article.author)),
            can_edit: viewer.is_some_and(|v| self.policy.can_edit_topic(v, topic)),
            comments,
        }
    }
}

fn find_topic(talk: &TalkPage, topic_id: Uuid) -> Result<&Topic> {
    talk.topic(topic_id)
        .ok_or_else(|| AppError::not_found("Topic", topic_id))
}

fn find_comment(topic: &Topic, comment_id: Uuid) -> Result<&Comment> {
    topic
        .comment(comment_id)
        .ok_or_else(|| AppError::not_found("Comment", comment_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{actor, article_draft, env, portal_for, Env};
    use rw_core::traits::MockUserRepo;

    fn topic_draft() -> TopicDraft {
        TopicDraft {
            title: "Bug?".into(),
            content: "Is this a bug or intended?".into(),
        }
    }

    fn comment_draft(text: &str) -> CommentDraft {
        CommentDraft {
            content: text.into(),
        }
    }

    async fn article_by(env: &Env, author: &Actor) -> Article {
        let portal = portal_for(env, author).await;
        env.services
            .articles
            .create(author, article_draft("Rust"), portal.id)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn talk_page_resolves_names_and_flags() {
        let env = env();
        let alice = env.user("alice").await;
        let bob = env.user("bob").await;
        let article = article_by(&env, &alice).await;
        let topic = env
            .services
            .talk
            .create_topic(&bob, article.id, topic_draft())
            .await
            .unwrap();
        env.services
            .talk
            .create_comment(&alice, article.id, topic.id, comment_draft("yes"))
            .await
            .unwrap();

        let view = env
            .services
            .talk
            .get_talk_page(article.id, Some(&alice))
            .await
            .unwrap();
        assert_eq!(view.article_title, "Rust");
        assert_eq!(view.article_author_id, alice.id);
        assert_eq!(view.viewer_id, Some(alice.id));

        let topic_view = &view.discussions[0];
        assert_eq!(topic_view.author_name, "bob");
        // Alice moderates her article's talk page but cannot edit Bob's words.
        assert!(topic_view.is_authorized);
        assert!(!topic_view.can_edit);
        assert_eq!(topic_view.comments[0].author_name, "alice");
        assert!(topic_view.comments[0].can_edit);
    }

    #[tokio::test]
    async fn deleted_authors_render_as_placeholder() {
        let env = env();
        let alice = env.user("alice").await;
        let bob = env.user("bob").await;
        let article = article_by(&env, &alice).await;
        let topic = env
            .services
            .talk
            .create_topic(&bob, article.id, topic_draft())
            .await
            .unwrap();
        env.services.users.delete(&bob, bob.id).await.unwrap();

        let view = env
            .services
            .talk
            .get_topic(article.id, topic.id, None)
            .await
            .unwrap();
        assert_eq!(view.author_name, DELETED_AUTHOR);
        assert!(!view.is_authorized);
    }

    #[tokio::test]
    async fn non_author_edit_is_forbidden_and_changes_nothing() {
        let env = env();
        let alice = env.user("alice").await;
        let bob = env.user("bob").await;
        let article = article_by(&env, &alice).await;
        let topic = env
            .services
            .talk
            .create_topic(&alice, article.id, topic_draft())
            .await
            .unwrap();
        let comment = env
            .services
            .talk
            .create_comment(&alice, article.id, topic.id, comment_draft("first"))
            .await
            .unwrap();
        let before = TalkRepo::get(env.store.as_ref(), article.talk).await.unwrap();

        let err = env
            .services
            .talk
            .update_topic(
                &bob,
                article.id,
                topic.id,
                TopicDraft {
                    title: "Hijacked".into(),
                    content: "Replaced content here".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = env
            .services
            .talk
            .update_comment(&bob, article.id, topic.id, comment.id, comment_draft("edit"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let after = TalkRepo::get(env.store.as_ref(), article.talk).await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn length_rules_apply_to_sanitized_content() {
        let env = env();
        let alice = env.user("alice").await;
        let article = article_by(&env, &alice).await;

        let err = env
            .services
            .talk
            .create_topic(
                &alice,
                article.id,
                TopicDraft {
                    title: "Sneaky".into(),
                    content: "<script>alert('xss')</script>".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationFailed(ref m) if m.contains("between 10 and 5000")));

        let topic = env
            .services
            .talk
            .create_topic(&alice, article.id, topic_draft())
            .await
            .unwrap();
        let err = env
            .services
            .talk
            .create_comment(&alice, article.id, topic.id, comment_draft("<script>alert(1)</script>"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationFailed(_)));

        let talk = TalkRepo::get(env.store.as_ref(), article.talk).await.unwrap().unwrap();
        assert_eq!(talk.discussions.len(), 1);
        assert!(talk.discussions[0].comments.is_empty());
    }

    #[tokio::test]
    async fn edits_set_edited_at() {
        let env = env();
        let alice = env.user("alice").await;
        let article = article_by(&env, &alice).await;
        let topic = env
            .services
            .talk
            .create_topic(&alice, article.id, topic_draft())
            .await
            .unwrap();
        assert!(topic.edited_at.is_none());

        env.clock.advance(chrono::Duration::minutes(5));
        let edited = env
            .services
            .talk
            .update_topic(
                &alice,
                article.id,
                topic.id,
                TopicDraft {
                    title: "Not a bug".into(),
                    content: "Works as intended after all.".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.edited_at, Some(env.clock.now()));
        assert_eq!(edited.date, topic.date);
    }

    #[tokio::test]
    async fn moderator_delete_pulls_contributions_from_the_owners() {
        let env = env();
        let alice = env.user("alice").await;
        let bob = env.user("bob").await;
        let carol = env.user("carol").await;
        let article = article_by(&env, &alice).await;
        let topic = env
            .services
            .talk
            .create_topic(&bob, article.id, topic_draft())
            .await
            .unwrap();
        let comment = env
            .services
            .talk
            .create_comment(&carol, article.id, topic.id, comment_draft("agreed"))
            .await
            .unwrap();

        // Alice authored the article, so she may remove Bob's topic.
        env.services
            .talk
            .delete_topic(&alice, article.id, topic.id)
            .await
            .unwrap();

        let bob_doc = UserRepo::get(env.store.as_ref(), bob.id).await.unwrap().unwrap();
        let carol_doc = UserRepo::get(env.store.as_ref(), carol.id).await.unwrap().unwrap();
        assert!(!bob_doc.contributions.contains(ContributionKind::Topic, topic.id));
        assert!(!carol_doc.contributions.contains(ContributionKind::Comment, comment.id));
    }

    #[tokio::test]
    async fn missing_topic_and_comment_have_distinct_messages() {
        let env = env();
        let alice = env.user("alice").await;
        let article = article_by(&env, &alice).await;

        let err = env
            .services
            .talk
            .create_comment(&alice, article.id, Uuid::now_v7(), comment_draft("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound("Topic", _)));

        let err = env
            .services
            .talk
            .create_topic(&alice, Uuid::now_v7(), topic_draft())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound("Article", _)));
    }

    #[tokio::test]
    async fn failed_credit_withdraws_the_comment() {
        let env = env();
        let alice = env.user("alice").await;
        let article = article_by(&env, &alice).await;
        let topic = env
            .services
            .talk
            .create_topic(&alice, article.id, topic_draft())
            .await
            .unwrap();

        let mut users = MockUserRepo::new();
        users
            .expect_add_contribution()
            .returning(|_, _, _| Err(anyhow::anyhow!("users collection unavailable")));
        let mut ports = env.ports.clone();
        ports.users = Arc::new(users);
        let service = TalkService::new(&ports);

        let err = service
            .create_comment(&actor("alice"), article.id, topic.id, comment_draft("lost"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Store(_)));

        let talk = TalkRepo::get(env.store.as_ref(), article.talk).await.unwrap().unwrap();
        assert!(talk.topic(topic.id).unwrap().comments.is_empty());
    }
}
