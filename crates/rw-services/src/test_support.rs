//! Shared fixtures for the service tests: an in-memory store, a settable
//! clock and a hasher cheap enough to call in every test.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rw_auth_simple::MemorySessionStore;
use rw_core::models::{Actor, InfoBox, Portal};
use rw_core::payloads::{ArticleDraft, NewUser, PortalDraft, SectionDraft};
use rw_core::policy::DefaultPolicy;
use rw_core::traits::{Clock, PasswordHasher};
use rw_db_memory::MemoryStore;
use uuid::Uuid;

use crate::{AccountRules, AmmoniaSanitizer, Ports, Services};

pub const PASSWORD: &str = "hunter22";

/// Accounts with these names are created as admins.
pub const ADMINS: [&str; 2] = ["root", "admin"];

#[derive(Debug)]
pub struct TestClock(Mutex<DateTime<Utc>>);

impl TestClock {
    fn new() -> Self {
        Self(Mutex::new(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()))
    }

    pub fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

/// Reversible "hash" so tests do not pay for argon2.
#[derive(Debug, Default)]
pub struct PlainHasher;

#[async_trait]
impl PasswordHasher for PlainHasher {
    async fn hash(&self, password: &str) -> anyhow::Result<String> {
        Ok(format!("plain${password}"))
    }

    async fn verify(&self, password: &str, hash: &str) -> anyhow::Result<bool> {
        Ok(hash.strip_prefix("plain$") == Some(password))
    }
}

pub struct Env {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<TestClock>,
    pub ports: Ports,
    pub services: Services,
}

impl Env {
    /// Registers `name` and returns them as an actor.
    pub async fn user(&self, name: &str) -> Actor {
        let profile = self.services.users.create(new_user(name)).await.unwrap();
        Actor {
            id: profile.id,
            username: profile.username,
            is_admin: profile.is_admin,
        }
    }

    pub async fn admin(&self, name: &str) -> Actor {
        assert!(ADMINS.contains(&name), "{name} is not an admin name");
        self.user(name).await
    }
}

pub fn env() -> Env {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(TestClock::new());
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
    let rules = AccountRules {
        admin_usernames: ADMINS.iter().map(|s| s.to_string()).collect(),
        ..AccountRules::default()
    };
    Env {
        services: Services::new(ports.clone(), rules),
        store,
        clock,
        ports,
    }
}

/// An actor that was never stored.
pub fn actor(name: &str) -> Actor {
    Actor {
        id: Uuid::now_v7(),
        username: name.to_string(),
        is_admin: false,
    }
}

pub fn new_user(name: &str) -> NewUser {
    NewUser {
        username: name.to_string(),
        email: format!("{name}@example.com"),
        password: PASSWORD.to_string(),
        bio: None,
    }
}

pub fn article_draft(title: &str) -> ArticleDraft {
    ArticleDraft {
        title: title.to_string(),
        intro: format!("{title} is a topic worth writing about."),
        content: vec![SectionDraft {
            title: "Overview".into(),
            text: format!("An overview of {title}."),
            ..SectionDraft::default()
        }],
        info_box: Some(InfoBox {
            title: title.to_string(),
            ..InfoBox::default()
        }),
        ..ArticleDraft::default()
    }
}

pub async fn portal_for(env: &Env, owner: &Actor) -> Portal {
    let draft = PortalDraft {
        portal_title: format!("{}'s portal", owner.username),
        portal_description: "A collection of articles.".into(),
        ..PortalDraft::default()
    };
    env.services.portals.create(owner, draft).await.unwrap()
}
