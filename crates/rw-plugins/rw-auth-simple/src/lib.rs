//! # rw-auth-simple
//!
//! Argon2 password hashing and an in-process session store.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use rand::distr::{Alphanumeric, SampleString};
use rand::Rng;
use rw_core::models::Session;
use rw_core::traits::{PasswordHasher, SessionStore};
use uuid::Uuid;

const TOKEN_LEN: usize = 64;
const CSRF_TOKEN_LEN: usize = 32;

/// Argon2id with the crate defaults. Hashing is CPU-bound, so both calls run
/// on the blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Hasher;

#[async_trait]
impl PasswordHasher for Argon2Hasher {
    async fn hash(&self, password: &str) -> anyhow::Result<String> {
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || {
            let mut salt_bytes = [0u8; 16];
            rand::rng().fill(&mut salt_bytes);
            let salt = SaltString::encode_b64(&salt_bytes)
                .map_err(|e| anyhow::anyhow!("salt encoding failed: {e}"))?;
            let hash = Argon2::default()
                .hash_password(password.as_bytes(), &salt)
                .map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))?;
            Ok(hash.to_string())
        })
        .await?
    }

    /// A malformed stored hash verifies as `false`, never as an error.
    async fn verify(&self, password: &str, hash: &str) -> anyhow::Result<bool> {
        let password = password.to_owned();
        let hash = hash.to_owned();
        let ok = tokio::task::spawn_blocking(move || {
            let parsed = match PasswordHash::new(&hash) {
                Ok(p) => p,
                Err(_) => return false,
            };
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .await?;
        Ok(ok)
    }
}

/// Sessions keyed by their opaque token. Lost on restart.
#[derive(Debug)]
pub struct MemorySessionStore {
    sessions: DashMap<String, Session>,
    ttl: Duration,
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    /// Drops every expired session. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut removed = 0;
        // Counted inside retain: logins may insert while it runs.
        self.sessions.retain(|_, s| {
            let live = s.expires_at > now;
            if !live {
                removed += 1;
            }
            live
        });
        removed
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, user_id: Uuid) -> anyhow::Result<Session> {
        let mut rng = rand::rng();
        let session = Session {
            token: Alphanumeric.sample_string(&mut rng, TOKEN_LEN),
            user_id,
            csrf_token: Alphanumeric.sample_string(&mut rng, CSRF_TOKEN_LEN),
            expires_at: Utc::now() + self.ttl,
        };
        self.sessions.insert(session.token.clone(), session.clone());
        Ok(session)
    }

    async fn get(&self, token: &str) -> anyhow::Result<Option<Session>> {
        let found = self.sessions.get(token).map(|s| s.clone());
        match found {
            Some(session) if session.expires_at > Utc::now() => Ok(Some(session)),
            Some(_) => {
                self.sessions.remove(token);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn destroy(&self, token: &str) -> anyhow::Result<()> {
        self.sessions.remove(token);
        Ok(())
    }

    async fn destroy_user(&self, user_id: Uuid) -> anyhow::Result<()> {
        self.sessions.retain(|_, s| s.user_id != user_id);
        tracing::debug!(%user_id, "ended all sessions of user");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_then_verify() {
        let hasher = Argon2Hasher;
        let hash = hasher.hash("hunter22").await.unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(hasher.verify("hunter22", &hash).await.unwrap());
        assert!(!hasher.verify("hunter23", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn garbage_hash_does_not_verify() {
        assert!(!Argon2Hasher.verify("pw", "not-a-hash").await.unwrap());
    }

    #[tokio::test]
    async fn sessions_expire() {
        let store = MemorySessionStore::new(Duration::seconds(-1));
        let session = store.create(Uuid::now_v7()).await.unwrap();
        assert!(store.get(&session.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn destroy_user_ends_every_session() {
        let store = MemorySessionStore::new(Duration::hours(1));
        let user = Uuid::now_v7();
        let a = store.create(user).await.unwrap();
        let b = store.create(user).await.unwrap();
        let other = store.create(Uuid::now_v7()).await.unwrap();
        assert_ne!(a.token, b.token);
        assert_ne!(a.csrf_token, a.token);

        store.destroy_user(user).await.unwrap();
        assert!(store.get(&a.token).await.unwrap().is_none());
        assert!(store.get(&b.token).await.unwrap().is_none());
        assert!(store.get(&other.token).await.unwrap().is_some());
        assert_eq!(store.purge_expired(), 0);
    }

    #[tokio::test]
    async fn purge_counts_only_expired_sessions() {
        let store = MemorySessionStore::new(Duration::hours(1));
        let live = store.create(Uuid::now_v7()).await.unwrap();
        for _ in 0..3 {
            let mut stale = store.create(Uuid::now_v7()).await.unwrap();
            stale.expires_at = Utc::now() - Duration::minutes(1);
            store.sessions.insert(stale.token.clone(), stale);
        }

        assert_eq!(store.purge_expired(), 3);
        assert!(store.get(&live.token).await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn purge_survives_concurrent_logins() {
        let store = std::sync::Arc::new(MemorySessionStore::new(Duration::hours(1)));
        let creators: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    for _ in 0..200 {
                        store.create(Uuid::now_v7()).await.unwrap();
                    }
                })
            })
            .collect();
        for _ in 0..200 {
            assert_eq!(store.purge_expired(), 0);
            tokio::task::yield_now().await;
        }
        for creator in creators {
            creator.await.unwrap();
        }
        assert_eq!(store.sessions.len(), 800);
    }
}
