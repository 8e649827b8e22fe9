//! End-to-end behaviour of the four services over the in-memory store.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rw_auth_simple::MemorySessionStore;
use rw_core::{
    Actor, AppError, ArticleDraft, ArticleRepo, Clock, CommentDraft, ContributionKind,
    DefaultPolicy, InfoBox, NewUser, PasswordHasher, PortalDraft, PortalRepo, SectionDraft,
    TalkRepo, TopicDraft, UserRepo,
};
use rw_db_memory::MemoryStore;
use rw_services::{AccountRules, AmmoniaSanitizer, Ports, Services};

struct FixedClock(Mutex<DateTime<Utc>>);

impl FixedClock {
    fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

struct PlainHasher;

#[async_trait]
impl PasswordHasher for PlainHasher {
    async fn hash(&self, password: &str) -> anyhow::Result<String> {
        Ok(format!("plain${password}"))
    }

    async fn verify(&self, password: &str, hash: &str) -> anyhow::Result<bool> {
        Ok(hash.strip_prefix("plain$") == Some(password))
    }
}

struct Wiki {
    store: Arc<MemoryStore>,
    clock: Arc<FixedClock>,
    services: Services,
}

fn wiki() -> Wiki {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(FixedClock(Mutex::new(
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
    )));
    let ports = Ports {
        users: store.clone(),
        articles: store.clone(),
        talk: store.clone(),
        portals: store.clone(),
        mailing_list: store.clone(),
        hasher: Arc::new(PlainHasher),
        sessions: Arc::new(MemorySessionStore::new(Duration::hours(1))),
        sanitizer: Arc::new(AmmoniaSanitizer),
        policy: Arc::new(DefaultPolicy),
        clock: clock.clone(),
    };
    Wiki {
        services: Services::new(ports, AccountRules::default()),
        store,
        clock,
    }
}

impl Wiki {
    async fn register(&self, name: &str) -> Actor {
        let profile = self
            .services
            .users
            .create(NewUser {
                username: name.into(),
                email: format!("{name}@example.com"),
                password: "correct-horse".into(),
                bio: None,
            })
            .await
            .unwrap();
        Actor {
            id: profile.id,
            username: profile.username,
            is_admin: profile.is_admin,
        }
    }

    async fn contributions(&self, actor: &Actor, kind: ContributionKind) -> Vec<uuid::Uuid> {
        let user = UserRepo::get(self.store.as_ref(), actor.id).await.unwrap().unwrap();
        user.contributions.ids(kind).to_vec()
    }
}

fn draft(title: &str) -> ArticleDraft {
    ArticleDraft {
        title: title.into(),
        intro: format!("All about {title}."),
        content: vec![SectionDraft {
            title: "History".into(),
            text: format!("The history of {title}."),
            ..SectionDraft::default()
        }],
        info_box: Some(InfoBox {
            title: title.into(),
            ..InfoBox::default()
        }),
        ..ArticleDraft::default()
    }
}

fn portal_draft(title: &str) -> PortalDraft {
    PortalDraft {
        portal_title: title.into(),
        portal_description: "Articles about programming languages.".into(),
        ..PortalDraft::default()
    }
}

#[tokio::test]
async fn alice_and_bob_discuss_an_article_then_it_is_deleted() {
    let wiki = wiki();
    let alice = wiki.register("alice").await;
    let bob = wiki.register("bob").await;

    let portal = wiki.services.portals.create(&alice, portal_draft("Languages")).await.unwrap();
    let article = wiki.services.articles.create(&alice, draft("Rust"), portal.id).await.unwrap();
    let topic = wiki
        .services
        .talk
        .create_topic(
            &alice,
            article.id,
            TopicDraft {
                title: "Bug?".into(),
                content: "Is the borrow checker wrong here?".into(),
            },
        )
        .await
        .unwrap();
    let comment = wiki
        .services
        .talk
        .create_comment(&bob, article.id, topic.id, CommentDraft { content: "yes".into() })
        .await
        .unwrap();

    assert_eq!(wiki.contributions(&alice, ContributionKind::Article).await, vec![article.id]);
    assert_eq!(wiki.contributions(&alice, ContributionKind::Topic).await, vec![topic.id]);
    assert_eq!(wiki.contributions(&bob, ContributionKind::Comment).await, vec![comment.id]);

    wiki.services.articles.delete(&alice, article.id).await.unwrap();

    assert!(TalkRepo::get(wiki.store.as_ref(), article.talk).await.unwrap().is_none());
    let portal = PortalRepo::get(wiki.store.as_ref(), portal.id).await.unwrap().unwrap();
    assert!(!portal.articles.contains(&article.id));
    assert!(wiki.contributions(&alice, ContributionKind::Article).await.is_empty());
    assert!(wiki.contributions(&alice, ContributionKind::Topic).await.is_empty());
    assert!(wiki.contributions(&bob, ContributionKind::Comment).await.is_empty());
}

#[tokio::test]
async fn every_created_article_has_exactly_its_talk_page() {
    let wiki = wiki();
    let alice = wiki.register("alice").await;
    let portal = wiki.services.portals.create(&alice, portal_draft("Languages")).await.unwrap();

    for title in ["Rust", "Go", "Zig"] {
        let article = wiki.services.articles.create(&alice, draft(title), portal.id).await.unwrap();
        let talk = wiki.store.find_by_article(article.id).await.unwrap().unwrap();
        assert_eq!(talk.id, article.talk);
        assert_eq!(talk.article_id, article.id);

        let page = wiki.services.talk.get_talk_page(article.id, None).await.unwrap();
        assert!(page.discussions.is_empty());
    }
}

#[tokio::test]
async fn deleting_a_portal_removes_its_articles_and_talk_pages() {
    let wiki = wiki();
    let alice = wiki.register("alice").await;
    let portal = wiki.services.portals.create(&alice, portal_draft("Languages")).await.unwrap();
    let mut articles = Vec::new();
    for title in ["Rust", "Go"] {
        articles.push(wiki.services.articles.create(&alice, draft(title), portal.id).await.unwrap());
    }

    wiki.services.portals.delete(&alice, portal.id).await.unwrap();

    assert!(matches!(
        wiki.services.portals.get(portal.id, None).await,
        Err(AppError::NotFound(..))
    ));
    for article in &articles {
        assert!(ArticleRepo::get(wiki.store.as_ref(), article.id).await.unwrap().is_none());
        assert!(TalkRepo::get(wiki.store.as_ref(), article.talk).await.unwrap().is_none());
    }
    assert!(wiki.contributions(&alice, ContributionKind::Article).await.is_empty());
}

#[tokio::test]
async fn rejected_edits_leave_entities_untouched() {
    let wiki = wiki();
    let alice = wiki.register("alice").await;
    let bob = wiki.register("bob").await;
    let portal = wiki.services.portals.create(&alice, portal_draft("Languages")).await.unwrap();
    let article = wiki.services.articles.create(&alice, draft("Rust"), portal.id).await.unwrap();
    let topic = wiki
        .services
        .talk
        .create_topic(
            &alice,
            article.id,
            TopicDraft {
                title: "Naming".into(),
                content: "Should this be called Rust-lang?".into(),
            },
        )
        .await
        .unwrap();
    let comment = wiki
        .services
        .talk
        .create_comment(&alice, article.id, topic.id, CommentDraft { content: "Maybe.".into() })
        .await
        .unwrap();

    let article_before = ArticleRepo::get(wiki.store.as_ref(), article.id).await.unwrap();
    let talk_before = TalkRepo::get(wiki.store.as_ref(), article.talk).await.unwrap();

    let err = wiki
        .services
        .articles
        .update(&bob, article.id, draft("Vandalized"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    let err = wiki
        .services
        .talk
        .update_topic(
            &bob,
            article.id,
            topic.id,
            TopicDraft {
                title: "Hijacked".into(),
                content: "This topic now says something else.".into(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    let err = wiki
        .services
        .talk
        .update_comment(&bob, article.id, topic.id, comment.id, CommentDraft { content: "No.".into() })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    assert_eq!(ArticleRepo::get(wiki.store.as_ref(), article.id).await.unwrap(), article_before);
    assert_eq!(TalkRepo::get(wiki.store.as_ref(), article.talk).await.unwrap(), talk_before);
}

#[tokio::test]
async fn search_pages_are_offset_by_the_limit() {
    let wiki = wiki();
    let alice = wiki.register("alice").await;
    let portal = wiki.services.portals.create(&alice, portal_draft("Languages")).await.unwrap();
    for i in 0..15 {
        wiki.services
            .articles
            .create(&alice, draft(&format!("Rust edition {i}")), portal.id)
            .await
            .unwrap();
        wiki.clock.advance(Duration::seconds(1));
    }

    let first = wiki.services.articles.search("rust", Some(1), Some(10)).await.unwrap();
    let second = wiki.services.articles.search("rust", Some(2), Some(10)).await.unwrap();
    assert_eq!(first.total, 15);
    assert_eq!(first.total_pages, 2);
    assert_eq!(first.results.len(), 10);
    assert_eq!(second.results.len(), 5);
    assert_eq!(second.current_page, 2);
    assert!(second
        .results
        .iter()
        .all(|a| first.results.iter().all(|b| a.id != b.id)));

    let none = wiki.services.articles.search("haskell", None, None).await.unwrap();
    assert_eq!(none.total, 0);
    assert_eq!(none.total_pages, 0);
    assert!(none.results.is_empty());
}

#[tokio::test]
async fn five_failures_lock_the_account_until_the_window_passes() {
    let wiki = wiki();
    let alice = wiki.register("alice").await;
    let users = &wiki.services.users;

    for _ in 0..5 {
        assert!(matches!(
            users.login("alice", "wrong-password").await,
            Err(AppError::InvalidCredentials)
        ));
    }
    let locked = UserRepo::get(wiki.store.as_ref(), alice.id).await.unwrap().unwrap();
    assert!(locked.is_locked(wiki.clock.now()));

    // The right password does not help while locked, and the error is the same.
    assert!(matches!(
        users.login("alice", "correct-horse").await,
        Err(AppError::InvalidCredentials)
    ));

    wiki.clock.advance(Duration::hours(2) + Duration::minutes(1));
    let login = users.login("alice", "correct-horse").await.unwrap();
    assert_eq!(login.user.id, alice.id);

    let reset = UserRepo::get(wiki.store.as_ref(), alice.id).await.unwrap().unwrap();
    assert_eq!(reset.failed_login_attempts, 0);
    assert!(reset.lock_until.is_none());
    assert!(users.authenticate(&login.session.token).await.unwrap().is_some());
}

#[tokio::test]
async fn unknown_users_fail_like_wrong_passwords() {
    let wiki = wiki();
    wiki.register("alice").await;
    let unknown = wiki.services.users.login("nobody", "correct-horse").await.unwrap_err();
    let wrong = wiki.services.users.login("alice", "nope-nope").await.unwrap_err();
    assert_eq!(unknown.to_string(), wrong.to_string());
}
