//! Portals and the cascade that deletes their articles.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::seq::IndexedRandom;
use rw_core::error::{AppError, Result};
use rw_core::models::{Actor, Article, Image, Portal};
use rw_core::payloads::{PortalDraft, PortalPatch};
use rw_core::policy::{ensure, AuthorizationPolicy};
use rw_core::traits::{ArticleRepo, Clock, ContentSanitizer, PortalRepo};
use rw_core::validation;
use serde::Serialize;
use uuid::Uuid;

use crate::article::ArticleService;
use crate::sanitize::clean;
use crate::Ports;

const RECENT_UPDATES: usize = 3;

/// A portal with its member articles populated.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalView {
    pub id: Uuid,
    pub portal_title: String,
    pub portal_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub portal_image: Option<Image>,
    pub owner: Uuid,
    pub articles: Vec<Article>,
    /// Picked at random on every read.
    pub featured_article: Option<Article>,
    /// Most recently updated first.
    pub recent_updates: Vec<Article>,
    pub is_viewer_owner: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct PortalService {
    portals: Arc<dyn PortalRepo>,
    articles: Arc<dyn ArticleRepo>,
    article_service: ArticleService,
    sanitizer: Arc<dyn ContentSanitizer>,
    policy: Arc<dyn AuthorizationPolicy>,
    clock: Arc<dyn Clock>,
}

impl PortalService {
    pub fn new(ports: &Ports, article_service: ArticleService) -> Self {
        Self {
            portals: ports.portals.clone(),
            articles: ports.articles.clone(),
            article_service,
            sanitizer: ports.sanitizer.clone(),
            policy: ports.policy.clone(),
            clock: ports.clock.clone(),
        }
    }

    pub async fn create(&self, actor: &Actor, draft: PortalDraft) -> Result<Portal> {
        let draft = PortalDraft {
            portal_title: draft.portal_title.trim().to_string(),
            portal_description: clean(self.sanitizer.as_ref(), &draft.portal_description),
            ..draft
        };
        validation::validate_portal(&draft)?;

        let now = self.clock.now();
        let portal = Portal {
            id: Uuid::now_v7(),
            portal_title: draft.portal_title,
            portal_description: draft.portal_description,
            portal_image: draft.portal_image,
            articles: Vec::new(),
            owner: actor.id,
            deleting: false,
            created_at: now,
            updated_at: now,
        };
        self.portals.insert(&portal).await?;

        tracing::info!(portal_id = %portal.id, actor = %actor.id, "portal created");
        Ok(portal)
    }

    pub async fn get(&self, id: Uuid, viewer: Option<&Actor>) -> Result<PortalView> {
        let portal = self.load(id).await?;
        let articles = self.articles.find_many(&portal.articles).await?;

        let featured_article = articles.choose(&mut rand::rng()).cloned();
        let mut recent_updates = articles.clone();
        recent_updates.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        recent_updates.truncate(RECENT_UPDATES);

        Ok(PortalView {
            id: portal.id,
            is_viewer_owner: viewer.is_some_and(|v| v.id == portal.owner),
            portal_title: portal.portal_title,
            portal_description: portal.portal_description,
            portal_image: portal.portal_image,
            owner: portal.owner,
            articles,
            featured_article,
            recent_updates,
            created_at: portal.created_at,
            updated_at: portal.updated_at,
        })
    }

    pub async fn list(&self) -> Result<Vec<Portal>> {
        let mut portals = self.portals.list().await?;
        portals.retain(|p| !p.deleting);
        Ok(portals)
    }

    /// Member articles in membership order.
    pub async fn list_articles(&self, id: Uuid) -> Result<Vec<Article>> {
        let portal = self.load(id).await?;
        Ok(self.articles.find_many(&portal.articles).await?)
    }

    pub async fn update(&self, actor: &Actor, id: Uuid, patch: PortalPatch) -> Result<Portal> {
        let patch = PortalPatch {
            portal_title: patch.portal_title.map(|t| t.trim().to_string()),
            portal_description: patch
                .portal_description
                .map(|d| clean(self.sanitizer.as_ref(), &d)),
            portal_image: patch.portal_image,
        };
        validation::validate_portal_patch(&patch)?;
        if patch.is_empty() {
            return Err(AppError::ValidationFailed("Nothing to update.".into()));
        }

        let portal = self.load(id).await?;
        ensure(self.policy.can_edit_portal(actor, &portal), "edit this portal")?;

        if !self
            .portals
            .update_fields(id, &patch, self.clock.now())
            .await?
        {
            return Err(AppError::not_found("Portal", id));
        }

        tracing::info!(portal_id = %id, actor = %actor.id, "portal updated");
        self.load(id).await
    }

    /// Deletes the portal and every member article.
    ///
    /// The portal is marked `deleting` first; if a step fails the marker
    /// stays and calling delete again picks up where it stopped.
    pub async fn delete(&self, actor: &Actor, id: Uuid) -> Result<()> {
        let portal = self
            .portals
            .get(id)
            .await?
            .ok_or_else(|| AppError::not_found("Portal", id))?;
        ensure(self.policy.can_delete_portal(actor, &portal), "delete this portal")?;

        if portal.deleting {
            tracing::warn!(portal_id = %id, "resuming interrupted portal delete");
        } else if !self.portals.mark_deleting(id).await? {
            return Err(AppError::not_found("Portal", id));
        }

        for article_id in &portal.articles {
            match self.articles.get(*article_id).await? {
                Some(article) => self.article_service.cascade_delete(&article).await?,
                None => tracing::debug!(portal_id = %id, article_id = %article_id, "member article already gone"),
            }
        }
        self.portals.delete(id).await?;

        tracing::info!(portal_id = %id, articles = portal.articles.len(), actor = %actor.id, "portal deleted");
        Ok(())
    }

    /// A portal that is being deleted reads as missing.
    async fn load(&self, id: Uuid) -> Result<Portal> {
        match self.portals.get(id).await? {
            Some(portal) if !portal.deleting => Ok(portal),
            _ => Err(AppError::not_found("Portal", id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{actor, article_draft, env, portal_for};
    use rw_core::traits::MockArticleRepo;

    #[tokio::test]
    async fn get_populates_articles_and_derived_fields() {
        let env = env();
        let alice = env.user("alice").await;
        let portal = portal_for(&env, &alice).await;
        for title in ["One", "Two", "Three", "Four"] {
            env.services
                .articles
                .create(&alice, article_draft(title), portal.id)
                .await
                .unwrap();
            env.clock.advance(chrono::Duration::minutes(1));
        }

        let view = env.services.portals.get(portal.id, Some(&alice)).await.unwrap();
        assert_eq!(view.articles.len(), 4);
        assert_eq!(view.articles[0].title, "One");
        assert!(view.is_viewer_owner);
        assert!(view.featured_article.is_some());
        let recent: Vec<_> = view.recent_updates.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(recent, ["Four", "Three", "Two"]);

        let view = env.services.portals.get(portal.id, None).await.unwrap();
        assert!(!view.is_viewer_owner);
    }

    #[tokio::test]
    async fn only_owner_or_admin_may_update() {
        let env = env();
        let alice = env.user("alice").await;
        let portal = portal_for(&env, &alice).await;
        let patch = PortalPatch {
            portal_title: Some("Renamed".into()),
            ..PortalPatch::default()
        };

        let err = env
            .services
            .portals
            .update(&actor("mallory"), portal.id, patch.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let mut admin = actor("root");
        admin.is_admin = true;
        let updated = env.services.portals.update(&admin, portal.id, patch).await.unwrap();
        assert_eq!(updated.portal_title, "Renamed");
        assert_eq!(updated.owner, alice.id);
    }

    #[tokio::test]
    async fn interrupted_delete_can_be_resumed() {
        let env = env();
        let alice = env.user("alice").await;
        let portal = portal_for(&env, &alice).await;
        let a = env
            .services
            .articles
            .create(&alice, article_draft("One"), portal.id)
            .await
            .unwrap();
        let b = env
            .services
            .articles
            .create(&alice, article_draft("Two"), portal.id)
            .await
            .unwrap();

        // The first run dies when it tries to load the second article.
        let store = env.store.clone();
        let second = b.id;
        let mut articles = MockArticleRepo::new();
        articles.expect_get().returning(move |id| {
            if id == second {
                Err(anyhow::anyhow!("connection reset"))
            } else {
                Ok(Some(a.clone()))
            }
        });
        let mut ports = env.ports.clone();
        ports.articles = Arc::new(articles);
        // Cascade steps still go to the real store.
        let cascade = ArticleService::new(&env.ports);
        let broken = PortalService::new(&ports, cascade);

        assert!(broken.delete(&alice, portal.id).await.is_err());
        let marked = PortalRepo::get(store.as_ref(), portal.id).await.unwrap().unwrap();
        assert!(marked.deleting);
        assert!(matches!(
            env.services.portals.get(portal.id, None).await,
            Err(AppError::NotFound(..))
        ));

        env.services.portals.delete(&alice, portal.id).await.unwrap();
        assert!(PortalRepo::get(store.as_ref(), portal.id).await.unwrap().is_none());
        assert!(env.services.articles.list().await.unwrap().is_empty());
    }
}
