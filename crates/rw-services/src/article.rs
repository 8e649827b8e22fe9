//! Articles, their embedded sections, and the talk page created with each.

use std::sync::Arc;

use rw_core::error::{AppError, Result};
use rw_core::models::{Actor, Article, ContributionKind, Section, SectionImage, TalkPage};
use rw_core::payloads::{ArticleDraft, SectionDraft, SectionPatch};
use rw_core::policy::{ensure, AuthorizationPolicy};
use rw_core::traits::{
    ArticleRepo, Clock, ContentSanitizer, PortalRepo, SectionRemoval, TalkRepo, UserRepo,
};
use rw_core::validation;
use serde::Serialize;
use uuid::Uuid;

use crate::sanitize::clean;
use crate::{compensate, Pagination, Ports};

/// An article as returned to a reader.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleView {
    #[serde(flatten)]
    pub article: Article,
    pub is_author: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    pub results: Vec<Article>,
    pub total: u64,
    pub current_page: u64,
    pub total_pages: u64,
}

#[derive(Clone)]
pub struct ArticleService {
    articles: Arc<dyn ArticleRepo>,
    talk: Arc<dyn TalkRepo>,
    portals: Arc<dyn PortalRepo>,
    users: Arc<dyn UserRepo>,
    sanitizer: Arc<dyn ContentSanitizer>,
    policy: Arc<dyn AuthorizationPolicy>,
    clock: Arc<dyn Clock>,
}

impl ArticleService {
    pub fn new(ports: &Ports) -> Self {
        Self {
            articles: ports.articles.clone(),
            talk: ports.talk.clone(),
            portals: ports.portals.clone(),
            users: ports.users.clone(),
            sanitizer: ports.sanitizer.clone(),
            policy: ports.policy.clone(),
            clock: ports.clock.clone(),
        }
    }

    /// Creates the article together with its talk page, files it under the
    /// portal and credits the actor. Any failure after the first write undoes
    /// the earlier ones.
    pub async fn create(&self, actor: &Actor, draft: ArticleDraft, portal_id: Uuid) -> Result<Article> {
        let draft = self.clean_draft(draft);
        validation::validate_article(&draft)?;

        match self.portals.get(portal_id).await? {
            Some(portal) if !portal.deleting => {}
            _ => return Err(AppError::PortalNotFound(portal_id)),
        }

        let now = self.clock.now();
        let id = Uuid::now_v7();
        let talk = TalkPage::empty(id);
        let sections = draft
            .content
            .iter()
            .map(|s| self.section(Uuid::now_v7(), &s.title, &s.text, s.image.clone()))
            .collect();
        let article = Article {
            id,
            title: draft.title,
            intro: draft.intro,
            content: sections,
            info_box: draft.info_box.unwrap_or_default(),
            references: draft.references,
            author: actor.id,
            talk: talk.id,
            status: draft.status.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };

        self.articles.insert_with_talk(&article, &talk).await?;

        let filed = match self.portals.add_article(portal_id, id).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(AppError::PortalNotFound(portal_id)),
            Err(e) => Err(AppError::from(e)),
        };
        if let Err(cause) = filed {
            return Err(compensate(cause, "create article", async {
                self.articles.delete_with_talk(id).await.map(drop)
            })
            .await);
        }

        let credited = match self.users.add_contribution(actor.id, ContributionKind::Article, id).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(AppError::not_found("User", actor.id)),
            Err(e) => Err(AppError::from(e)),
        };
        if let Err(cause) = credited {
            return Err(compensate(cause, "create article", async {
                self.portals.pull_article(id).await?;
                self.articles.delete_with_talk(id).await.map(drop)
            })
            .await);
        }

        tracing::info!(article_id = %id, talk_id = %talk.id, portal_id = %portal_id, actor = %actor.id, "article created");
        Ok(article)
    }

    pub async fn get(&self, id: Uuid, viewer: Option<&Actor>) -> Result<ArticleView> {
        let article = self.load(id).await?;
        let is_author = viewer.is_some_and(|v| v.id == article.author);
        Ok(ArticleView { article, is_author })
    }

    /// Every article, newest first.
    pub async fn list(&self) -> Result<Vec<Article>> {
        Ok(self.articles.list().await?)
    }

    pub async fn update(&self, actor: &Actor, id: Uuid, draft: ArticleDraft) -> Result<Article> {
        let draft = self.clean_draft(draft);
        validation::validate_article(&draft)?;

        let existing = self.load(id).await?;
        ensure(self.policy.can_edit_article(actor, &existing), "edit this article")?;

        // Submitted sections keep their id when it names one of ours.
        let sections = draft
            .content
            .iter()
            .map(|s| {
                let section_id = s
                    .id
                    .filter(|sid| existing.section(*sid).is_some())
                    .unwrap_or_else(Uuid::now_v7);
                self.section(section_id, &s.title, &s.text, s.image.clone())
            })
            .collect();

        let updated = Article {
            title: draft.title,
            intro: draft.intro,
            content: sections,
            info_box: draft.info_box.unwrap_or_default(),
            references: draft.references,
            status: draft.status.unwrap_or(existing.status),
            updated_at: self.clock.now(),
            ..existing
        };

        if !self.articles.replace(&updated).await? {
            return Err(AppError::not_found("Article", id));
        }
        self.users
            .add_contribution(actor.id, ContributionKind::Article, id)
            .await?;

        tracing::info!(article_id = %id, actor = %actor.id, "article updated");
        Ok(updated)
    }

    pub async fn delete(&self, actor: &Actor, id: Uuid) -> Result<()> {
        let article = self.load(id).await?;
        ensure(self.policy.can_delete_article(actor, &article), "delete this article")?;

        self.cascade_delete(&article).await?;
        tracing::info!(article_id = %id, actor = %actor.id, "article deleted");
        Ok(())
    }

    /// Removes an article and everything hanging off it: its talk page, its
    /// portal membership and every contribution entry pointing at it or at
    /// the topics and comments of its talk page.
    ///
    /// References are pulled before the documents go, so an interrupted run
    /// can simply be repeated.
    pub(crate) async fn cascade_delete(&self, article: &Article) -> Result<()> {
        if let Some(talk) = self.talk.get(article.talk).await? {
            for topic in &talk.discussions {
                for comment in &topic.comments {
                    self.users
                        .pull_contribution(ContributionKind::Comment, comment.id)
                        .await?;
                }
                self.users
                    .pull_contribution(ContributionKind::Topic, topic.id)
                    .await?;
            }
        }
        self.portals.pull_article(article.id).await?;
        self.users
            .pull_contribution(ContributionKind::Article, article.id)
            .await?;
        self.articles.delete_with_talk(article.id).await?;
        Ok(())
    }

    pub async fn search(&self, query: &str, page: Option<u64>, limit: Option<u64>) -> Result<SearchResults> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::ValidationFailed("Search query is required.".into()));
        }
        let pagination = Pagination::new(page, limit);
        let (results, total) = self
            .articles
            .search(query, pagination.offset(), pagination.limit)
            .await?;

        Ok(SearchResults {
            results,
            total,
            current_page: pagination.page,
            total_pages: pagination.total_pages(total),
        })
    }

    pub async fn get_section(&self, article_id: Uuid, section_id: Uuid) -> Result<Section> {
        let article = self.load(article_id).await?;
        article
            .section(section_id)
            .cloned()
            .ok_or_else(|| AppError::not_found("Section", section_id))
    }

    pub async fn update_section(
        &self,
        actor: &Actor,
        article_id: Uuid,
        section_id: Uuid,
        patch: SectionPatch,
    ) -> Result<Section> {
        let patch = SectionPatch {
            text: patch.text.map(|text| clean(self.sanitizer.as_ref(), &text)),
            ..patch
        };
        validation::validate_section_patch(&patch)?;

        let article = self.load(article_id).await?;
        ensure(self.policy.can_edit_article(actor, &article), "edit this article")?;
        let current = article
            .section(section_id)
            .ok_or_else(|| AppError::not_found("Section", section_id))?;

        let section = self.section(
            section_id,
            patch.title.as_deref().unwrap_or(&current.title),
            patch.text.as_deref().unwrap_or(&current.text),
            patch.image.or_else(|| current.image.clone()),
        );

        if !self
            .articles
            .update_section(article_id, &section, self.clock.now())
            .await?
        {
            return Err(AppError::not_found("Section", section_id));
        }

        tracing::info!(article_id = %article_id, section_id = %section_id, actor = %actor.id, "section updated");
        Ok(section)
    }

    pub async fn delete_section(&self, actor: &Actor, article_id: Uuid, section_id: Uuid) -> Result<()> {
        let article = self.load(article_id).await?;
        ensure(self.policy.can_edit_article(actor, &article), "edit this article")?;

        match self
            .articles
            .remove_section(article_id, section_id, self.clock.now())
            .await?
        {
            SectionRemoval::Removed => {
                tracing::info!(article_id = %article_id, section_id = %section_id, actor = %actor.id, "section deleted");
                Ok(())
            }
            SectionRemoval::ArticleMissing => Err(AppError::not_found("Article", article_id)),
            SectionRemoval::SectionMissing => Err(AppError::not_found("Section", section_id)),
            SectionRemoval::LastSection => Err(AppError::ValidationFailed(
                "An article must keep at least one section.".into(),
            )),
        }
    }

    async fn load(&self, id: Uuid) -> Result<Article> {
        self.articles
            .get(id)
            .await?
            .ok_or_else(|| AppError::not_found("Article", id))
    }

    /// Sanitizes the rich-text fields and trims the plain ones.
    fn clean_draft(&self, draft: ArticleDraft) -> ArticleDraft {
        let sanitizer = self.sanitizer.as_ref();
        ArticleDraft {
            title: draft.title.trim().to_string(),
            intro: clean(sanitizer, &draft.intro),
            content: draft
                .content
                .into_iter()
                .map(|s| SectionDraft {
                    title: s.title.trim().to_string(),
                    text: clean(sanitizer, &s.text),
                    ..s
                })
                .collect(),
            ..draft
        }
    }

    /// `text` must already be sanitized.
    fn section(&self, id: Uuid, title: &str, text: &str, image: Option<SectionImage>) -> Section {
        Section {
            id,
            title: title.trim().to_string(),
            text: text.to_string(),
            image,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{actor, article_draft, env, portal_for};
    use mockall::predicate::eq;
    use rw_core::traits::MockPortalRepo;

    #[tokio::test]
    async fn create_requires_an_existing_portal() {
        let env = env();
        let alice = actor("alice");
        let missing = Uuid::now_v7();

        let err = env
            .services
            .articles
            .create(&alice, article_draft("Rust"), missing)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PortalNotFound(id) if id == missing));
        assert!(env.services.articles.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_keeps_known_section_ids() {
        let env = env();
        let alice = env.user("alice").await;
        let portal = portal_for(&env, &alice).await;
        let article = env
            .services
            .articles
            .create(&alice, article_draft("Rust"), portal.id)
            .await
            .unwrap();
        let kept = article.content[0].id;

        let mut draft = article_draft("Rust 2");
        draft.content[0].id = Some(kept);
        draft.content.push(rw_core::payloads::SectionDraft {
            id: Some(Uuid::now_v7()),
            title: "New".into(),
            text: "Fresh text".into(),
            image: None,
        });
        let updated = env
            .services
            .articles
            .update(&alice, article.id, draft)
            .await
            .unwrap();

        assert_eq!(updated.content[0].id, kept);
        assert_ne!(updated.content[1].id, kept);
        assert_eq!(updated.talk, article.talk);
        assert_eq!(updated.author, alice.id);
    }

    #[tokio::test]
    async fn markup_that_sanitizes_to_nothing_is_rejected() {
        let env = env();
        let alice = env.user("alice").await;
        let portal = portal_for(&env, &alice).await;

        let mut draft = article_draft("Rust");
        draft.intro = "<script>alert(1)</script>".into();
        let err = env
            .services
            .articles
            .create(&alice, draft, portal.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationFailed(ref m) if m.contains("Intro is required.")));

        let article = env
            .services
            .articles
            .create(&alice, article_draft("Rust"), portal.id)
            .await
            .unwrap();
        let patch = SectionPatch {
            text: Some("<script>alert(1)</script>".into()),
            ..SectionPatch::default()
        };
        let err = env
            .services
            .articles
            .update_section(&alice, article.id, article.content[0].id, patch)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn section_text_is_sanitized() {
        let env = env();
        let alice = env.user("alice").await;
        let portal = portal_for(&env, &alice).await;
        let article = env
            .services
            .articles
            .create(&alice, article_draft("Rust"), portal.id)
            .await
            .unwrap();

        let patch = SectionPatch {
            text: Some("Safe <script>alert(1)</script>text".into()),
            ..SectionPatch::default()
        };
        let section = env
            .services
            .articles
            .update_section(&alice, article.id, article.content[0].id, patch)
            .await
            .unwrap();
        assert_eq!(section.text, "Safe text");
        assert_eq!(section.title, article.content[0].title);
    }

    #[tokio::test]
    async fn last_section_cannot_be_deleted() {
        let env = env();
        let alice = env.user("alice").await;
        let portal = portal_for(&env, &alice).await;
        let article = env
            .services
            .articles
            .create(&alice, article_draft("Rust"), portal.id)
            .await
            .unwrap();

        let err = env
            .services
            .articles
            .delete_section(&alice, article.id, article.content[0].id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn empty_search_is_rejected() {
        let env = env();
        let err = env.services.articles.search("   ", None, None).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn failed_portal_filing_removes_the_article_again() {
        let env = env();
        let alice = env.user("alice").await;
        let portal = portal_for(&env, &alice).await;
        let stored = portal.clone();

        let mut portals = MockPortalRepo::new();
        portals
            .expect_get()
            .with(eq(portal.id))
            .returning(move |_| Ok(Some(stored.clone())));
        portals
            .expect_add_article()
            .returning(|_, _| Err(anyhow::anyhow!("write conflict")));

        let mut ports = env.ports.clone();
        ports.portals = Arc::new(portals);
        let service = ArticleService::new(&ports);

        let err = service
            .create(&alice, article_draft("Rust"), portal.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Store(_)));
        assert!(env.services.articles.list().await.unwrap().is_empty());
    }
}
