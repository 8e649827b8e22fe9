//! # rw-db-memory
//!
//! In-process document store backed by `DashMap`. Every document write goes
//! through a single shard lock, which gives the per-document atomicity the
//! ports require. Unique indexes are separate maps claimed with the entry
//! API. Used by development builds and the service tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use rw_core::error::DuplicateKey;
use rw_core::models::{
    Article, Comment, ContributionKind, Portal, Section, TalkPage, Topic, User,
};
use rw_core::payloads::{PortalPatch, UserUpdate};
use rw_core::traits::{ArticleRepo, MailingListRepo, PortalRepo, SectionRemoval, TalkRepo, UserRepo};
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct MemoryStore {
    users: DashMap<Uuid, User>,
    usernames: DashMap<String, Uuid>,
    emails: DashMap<String, Uuid>,
    articles: DashMap<Uuid, Article>,
    talk_pages: DashMap<Uuid, TalkPage>,
    portals: DashMap<Uuid, Portal>,
    mailing_list: DashSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Claims `key` for `owner` in a unique index. Re-claiming your own key is fine.
fn claim(index: &DashMap<String, Uuid>, key: &str, owner: Uuid) -> bool {
    match index.entry(key.to_string()) {
        Entry::Occupied(entry) => *entry.get() == owner,
        Entry::Vacant(entry) => {
            entry.insert(owner);
            true
        }
    }
}

fn release(index: &DashMap<String, Uuid>, key: &str, owner: Uuid) {
    index.remove_if(key, |_, current| *current == owner);
}

fn duplicate(field: &'static str) -> anyhow::Error {
    anyhow::Error::new(DuplicateKey { field })
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn insert(&self, user: &User) -> anyhow::Result<()> {
        if !claim(&self.usernames, &user.username, user.id) {
            return Err(duplicate("username"));
        }
        if !claim(&self.emails, &user.email, user.id) {
            release(&self.usernames, &user.username, user.id);
            return Err(duplicate("email"));
        }
        self.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let id = match self.usernames.get(username) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn find_many(&self, ids: &[Uuid]) -> anyhow::Result<Vec<User>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.users.get(id).map(|u| u.clone()))
            .collect())
    }

    async fn list(&self) -> anyhow::Result<Vec<User>> {
        let mut users: Vec<User> = self.users.iter().map(|u| u.clone()).collect();
        users.sort_by_key(|u| u.joined_date);
        Ok(users)
    }

    async fn update_fields(&self, id: Uuid, update: &UserUpdate) -> anyhow::Result<bool> {
        let current = match self.users.get(&id) {
            Some(u) => u.clone(),
            None => return Ok(false),
        };

        let new_username = update
            .username
            .as_ref()
            .filter(|name| **name != current.username);
        let new_email = update.email.as_ref().filter(|email| **email != current.email);

        if let Some(name) = new_username {
            if !claim(&self.usernames, name, id) {
                return Err(duplicate("username"));
            }
        }
        if let Some(email) = new_email {
            if !claim(&self.emails, email, id) {
                if let Some(name) = new_username {
                    release(&self.usernames, name, id);
                }
                return Err(duplicate("email"));
            }
        }

        let applied = match self.users.get_mut(&id) {
            Some(mut user) => {
                update.apply_to(&mut user);
                true
            }
            None => false,
        };

        if new_username.is_some() {
            release(&self.usernames, &current.username, id);
        }
        if new_email.is_some() {
            release(&self.emails, &current.email, id);
        }
        Ok(applied)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        match self.users.remove(&id) {
            Some((_, user)) => {
                release(&self.usernames, &user.username, id);
                release(&self.emails, &user.email, id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn add_contribution(
        &self,
        user_id: Uuid,
        kind: ContributionKind,
        id: Uuid,
    ) -> anyhow::Result<bool> {
        match self.users.get_mut(&user_id) {
            Some(mut user) => {
                user.contributions.add(kind, id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn pull_contribution(&self, kind: ContributionKind, id: Uuid) -> anyhow::Result<u64> {
        let mut changed = 0;
        for mut user in self.users.iter_mut() {
            if user.contributions.remove(kind, id) {
                changed += 1;
            }
        }
        Ok(changed)
    }
}

/// Counts how many query terms occur in the article's indexed text.
fn search_score(article: &Article, terms: &[String]) -> usize {
    let mut haystack = format!("{} {}", article.title, article.intro).to_lowercase();
    for section in &article.content {
        haystack.push(' ');
        haystack.push_str(&section.title.to_lowercase());
        haystack.push(' ');
        haystack.push_str(&section.text.to_lowercase());
    }
    terms.iter().filter(|t| haystack.contains(t.as_str())).count()
}

#[async_trait]
impl ArticleRepo for MemoryStore {
    async fn insert_with_talk(&self, article: &Article, talk: &TalkPage) -> anyhow::Result<()> {
        anyhow::ensure!(
            article.talk == talk.id && talk.article_id == article.id,
            "article {} and talk page {} do not reference each other",
            article.id,
            talk.id
        );
        self.talk_pages.insert(talk.id, talk.clone());
        self.articles.insert(article.id, article.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Article>> {
        Ok(self.articles.get(&id).map(|a| a.clone()))
    }

    async fn find_many(&self, ids: &[Uuid]) -> anyhow::Result<Vec<Article>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.articles.get(id).map(|a| a.clone()))
            .collect())
    }

    async fn list(&self) -> anyhow::Result<Vec<Article>> {
        let mut articles: Vec<Article> = self.articles.iter().map(|a| a.clone()).collect();
        articles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(articles)
    }

    async fn replace(&self, article: &Article) -> anyhow::Result<bool> {
        match self.articles.get_mut(&article.id) {
            Some(mut existing) => {
                *existing = article.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_section(
        &self,
        article_id: Uuid,
        section: &Section,
        updated_at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let Some(mut article) = self.articles.get_mut(&article_id) else {
            return Ok(false);
        };
        match article.section_mut(section.id) {
            Some(existing) => *existing = section.clone(),
            None => return Ok(false),
        }
        article.updated_at = updated_at;
        Ok(true)
    }

    async fn remove_section(
        &self,
        article_id: Uuid,
        section_id: Uuid,
        updated_at: DateTime<Utc>,
    ) -> anyhow::Result<SectionRemoval> {
        let Some(mut article) = self.articles.get_mut(&article_id) else {
            return Ok(SectionRemoval::ArticleMissing);
        };
        if article.section(section_id).is_none() {
            return Ok(SectionRemoval::SectionMissing);
        }
        if article.content.len() <= 1 {
            return Ok(SectionRemoval::LastSection);
        }
        article.remove_section(section_id);
        article.updated_at = updated_at;
        Ok(SectionRemoval::Removed)
    }

    async fn delete_with_talk(&self, id: Uuid) -> anyhow::Result<bool> {
        let removed_article = self.articles.remove(&id);
        if let Some((_, article)) = &removed_article {
            self.talk_pages.remove(&article.talk);
        }
        let before = self.talk_pages.len();
        self.talk_pages.retain(|_, talk| talk.article_id != id);
        Ok(removed_article.is_some() || self.talk_pages.len() != before)
    }

    async fn search(
        &self,
        query: &str,
        offset: u64,
        limit: u64,
    ) -> anyhow::Result<(Vec<Article>, u64)> {
        let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        if terms.is_empty() {
            return Ok((Vec::new(), 0));
        }

        let mut hits: Vec<(usize, Article)> = self
            .articles
            .iter()
            .filter_map(|a| {
                let score = search_score(&a, &terms);
                (score > 0).then(|| (score, a.clone()))
            })
            .collect();
        hits.sort_by(|(sa, a), (sb, b)| sb.cmp(sa).then(b.created_at.cmp(&a.created_at)));

        let total = hits.len() as u64;
        let page = hits
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|(_, a)| a)
            .collect();
        Ok((page, total))
    }
}

#[async_trait]
impl TalkRepo for MemoryStore {
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<TalkPage>> {
        Ok(self.talk_pages.get(&id).map(|t| t.clone()))
    }

    async fn find_by_article(&self, article_id: Uuid) -> anyhow::Result<Option<TalkPage>> {
        Ok(self
            .talk_pages
            .iter()
            .find(|t| t.article_id == article_id)
            .map(|t| t.clone()))
    }

    async fn push_topic(&self, talk_id: Uuid, topic: &Topic) -> anyhow::Result<bool> {
        match self.talk_pages.get_mut(&talk_id) {
            Some(mut talk) => {
                talk.discussions.push(topic.clone());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_topic(
        &self,
        talk_id: Uuid,
        topic_id: Uuid,
        title: &str,
        content: &str,
        edited_at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let Some(mut talk) = self.talk_pages.get_mut(&talk_id) else {
            return Ok(false);
        };
        match talk.topic_mut(topic_id) {
            Some(topic) => {
                topic.title = title.to_string();
                topic.content = content.to_string();
                topic.edited_at = Some(edited_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove_topic(&self, talk_id: Uuid, topic_id: Uuid) -> anyhow::Result<Option<Topic>> {
        Ok(self
            .talk_pages
            .get_mut(&talk_id)
            .and_then(|mut talk| talk.remove_topic(topic_id)))
    }

    async fn push_comment(
        &self,
        talk_id: Uuid,
        topic_id: Uuid,
        comment: &Comment,
    ) -> anyhow::Result<bool> {
        let Some(mut talk) = self.talk_pages.get_mut(&talk_id) else {
            return Ok(false);
        };
        match talk.topic_mut(topic_id) {
            Some(topic) => {
                topic.comments.push(comment.clone());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_comment(
        &self,
        talk_id: Uuid,
        topic_id: Uuid,
        comment_id: Uuid,
        content: &str,
        edited_at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let Some(mut talk) = self.talk_pages.get_mut(&talk_id) else {
            return Ok(false);
        };
        match talk
            .topic_mut(topic_id)
            .and_then(|topic| topic.comment_mut(comment_id))
        {
            Some(comment) => {
                comment.content = content.to_string();
                comment.edited_at = Some(edited_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove_comment(
        &self,
        talk_id: Uuid,
        topic_id: Uuid,
        comment_id: Uuid,
    ) -> anyhow::Result<Option<Comment>> {
        let Some(mut talk) = self.talk_pages.get_mut(&talk_id) else {
            return Ok(None);
        };
        Ok(talk
            .topic_mut(topic_id)
            .and_then(|topic| topic.remove_comment(comment_id)))
    }
}

#[async_trait]
impl PortalRepo for MemoryStore {
    async fn insert(&self, portal: &Portal) -> anyhow::Result<()> {
        self.portals.insert(portal.id, portal.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Portal>> {
        Ok(self.portals.get(&id).map(|p| p.clone()))
    }

    async fn list(&self) -> anyhow::Result<Vec<Portal>> {
        let mut portals: Vec<Portal> = self.portals.iter().map(|p| p.clone()).collect();
        portals.sort_by_key(|p| p.created_at);
        Ok(portals)
    }

    async fn update_fields(
        &self,
        id: Uuid,
        patch: &PortalPatch,
        updated_at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        match self.portals.get_mut(&id) {
            Some(mut portal) => {
                patch.apply_to(&mut portal, updated_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn add_article(&self, portal_id: Uuid, article_id: Uuid) -> anyhow::Result<bool> {
        match self.portals.get_mut(&portal_id) {
            Some(mut portal) if !portal.deleting => {
                if !portal.articles.contains(&article_id) {
                    portal.articles.push(article_id);
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn pull_article(&self, article_id: Uuid) -> anyhow::Result<u64> {
        let mut changed = 0;
        for mut portal in self.portals.iter_mut() {
            let before = portal.articles.len();
            portal.articles.retain(|id| *id != article_id);
            if portal.articles.len() != before {
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn mark_deleting(&self, id: Uuid) -> anyhow::Result<bool> {
        match self.portals.get_mut(&id) {
            Some(mut portal) => {
                portal.deleting = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        Ok(self.portals.remove(&id).is_some())
    }
}

#[async_trait]
impl MailingListRepo for MemoryStore {
    async fn insert(&self, email: &str) -> anyhow::Result<()> {
        if self.mailing_list.insert(email.to_string()) {
            Ok(())
        } else {
            Err(duplicate("email"))
        }
    }

    async fn contains(&self, email: &str) -> anyhow::Result<bool> {
        Ok(self.mailing_list.contains(email))
    }

    async fn replace(&self, old_email: &str, new_email: &str) -> anyhow::Result<bool> {
        if !self.mailing_list.contains(old_email) {
            return Ok(false);
        }
        if old_email == new_email {
            return Ok(true);
        }
        if !self.mailing_list.insert(new_email.to_string()) {
            return Err(duplicate("email"));
        }
        self.mailing_list.remove(old_email);
        Ok(true)
    }

    async fn delete(&self, email: &str) -> anyhow::Result<bool> {
        Ok(self.mailing_list.remove(email).is_some())
    }
}
