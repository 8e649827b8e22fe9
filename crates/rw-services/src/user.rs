//! Accounts, login lockout, sessions and the mailing list kept beside them.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rw_core::error::{AppError, Result};
use rw_core::models::{Actor, Contributions, Session, User};
use rw_core::payloads::{NewUser, UserPatch, UserUpdate};
use rw_core::policy::{ensure, AuthorizationPolicy};
use rw_core::traits::{Clock, MailingListRepo, PasswordHasher, SessionStore, UserRepo};
use rw_core::validation;
use serde::Serialize;
use uuid::Uuid;

use crate::{compensate, AccountRules, Ports};

/// What anyone may see of an account.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub bio: String,
    pub joined_date: DateTime<Utc>,
    pub is_admin: bool,
    pub contributions: Contributions,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            bio: user.bio.clone(),
            joined_date: user.joined_date,
            is_admin: user.is_admin,
            contributions: user.contributions.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub is_own_profile: bool,
}

/// The admin listing: the profile plus account state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub email: String,
    pub is_banned: bool,
    pub failed_login_attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_until: Option<DateTime<Utc>>,
}

impl From<&User> for AccountView {
    fn from(user: &User) -> Self {
        Self {
            profile: user.into(),
            email: user.email.clone(),
            is_banned: user.is_banned,
            failed_login_attempts: user.failed_login_attempts,
            lock_until: user.lock_until,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatus {
    pub is_authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// A successful login.
#[derive(Debug, Clone)]
pub struct Login {
    pub session: Session,
    pub user: UserProfile,
}

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepo>,
    mailing_list: Arc<dyn MailingListRepo>,
    hasher: Arc<dyn PasswordHasher>,
    sessions: Arc<dyn SessionStore>,
    policy: Arc<dyn AuthorizationPolicy>,
    clock: Arc<dyn Clock>,
    rules: AccountRules,
}

impl UserService {
    pub fn new(ports: &Ports, rules: AccountRules) -> Self {
        Self {
            users: ports.users.clone(),
            mailing_list: ports.mailing_list.clone(),
            hasher: ports.hasher.clone(),
            sessions: ports.sessions.clone(),
            policy: ports.policy.clone(),
            clock: ports.clock.clone(),
            rules,
        }
    }

    /// Registers an account and its mailing-list entry, both or neither.
    pub async fn create(&self, new_user: NewUser) -> Result<UserProfile> {
        let new_user = NewUser {
            username: new_user.username.trim().to_string(),
            email: validation::normalize_email(&new_user.email),
            ..new_user
        };
        validation::validate_new_user(&new_user, self.rules.password)?;

        let user = User {
            id: Uuid::now_v7(),
            is_admin: self.rules.admin_usernames.contains(&new_user.username),
            password_hash: self.hasher.hash(&new_user.password).await?,
            username: new_user.username,
            email: new_user.email,
            bio: new_user.bio.unwrap_or_default(),
            joined_date: self.clock.now(),
            is_banned: false,
            failed_login_attempts: 0,
            lock_until: None,
            contributions: Contributions::default(),
        };
        self.users.insert(&user).await?;

        if let Err(e) = self.mailing_list.insert(&user.email).await {
            return Err(compensate(e.into(), "create user", async {
                self.users.delete(user.id).await.map(drop)
            })
            .await);
        }

        tracing::info!(user_id = %user.id, username = %user.username, is_admin = user.is_admin, "user created");
        Ok(UserProfile::from(&user))
    }

    /// Checks credentials and opens a session.
    ///
    /// Unknown users, wrong passwords, locked and banned accounts all fail
    /// with the same `InvalidCredentials`.
    pub async fn login(&self, username: &str, password: &str) -> Result<Login> {
        let Some(user) = self.users.find_by_username(username.trim()).await? else {
            tracing::warn!(username = %username.trim(), "login attempt for unknown user");
            return Err(AppError::InvalidCredentials);
        };

        let now = self.clock.now();
        if user.is_banned {
            tracing::warn!(user_id = %user.id, "login attempt on banned account");
            return Err(AppError::InvalidCredentials);
        }
        if user.is_locked(now) {
            tracing::warn!(user_id = %user.id, "login attempt on locked account");
            return Err(AppError::InvalidCredentials);
        }

        // A lock that has run out starts a fresh count.
        let attempts = if user.lock_until.is_some() {
            0
        } else {
            user.failed_login_attempts
        };

        if !self.hasher.verify(password, &user.password_hash).await? {
            let attempts = attempts + 1;
            let lock_until = (attempts >= self.rules.max_failed_logins)
                .then(|| now + self.rules.lock_duration);
            self.users
                .update_fields(user.id, &UserUpdate::login_state(attempts, lock_until))
                .await?;
            match lock_until {
                Some(until) => tracing::warn!(user_id = %user.id, attempts, %until, "account locked"),
                None => tracing::warn!(user_id = %user.id, attempts, "failed login attempt"),
            }
            return Err(AppError::InvalidCredentials);
        }

        if user.failed_login_attempts != 0 || user.lock_until.is_some() {
            self.users
                .update_fields(user.id, &UserUpdate::login_state(0, None))
                .await?;
        }
        let session = self.sessions.create(user.id).await?;

        tracing::info!(user_id = %user.id, "user logged in");
        Ok(Login {
            session,
            user: UserProfile::from(&user),
        })
    }

    pub async fn logout(&self, token: &str) -> Result<()> {
        self.sessions.destroy(token).await?;
        Ok(())
    }

    /// Resolves a session token to its live session and account. Sessions of
    /// banned or deleted users are ended on the spot.
    pub async fn authenticate(&self, token: &str) -> Result<Option<(Session, User)>> {
        let Some(session) = self.sessions.get(token).await? else {
            return Ok(None);
        };
        match self.users.get(session.user_id).await? {
            Some(user) if !user.is_banned => Ok(Some((session, user))),
            _ => {
                self.sessions.destroy(token).await?;
                Ok(None)
            }
        }
    }

    pub fn auth_status(&self, viewer: Option<&Actor>) -> AuthStatus {
        AuthStatus {
            is_authenticated: viewer.is_some(),
            username: viewer.map(|v| v.username.clone()),
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<UserProfile> {
        Ok(UserProfile::from(&self.load(id).await?))
    }

    pub async fn get_by_username(&self, username: &str, viewer: Option<&Actor>) -> Result<ProfileView> {
        let user = self
            .users
            .find_by_username(username)
            .await?
            .ok_or_else(|| AppError::not_found("User", username))?;
        Ok(ProfileView {
            is_own_profile: viewer.is_some_and(|v| v.id == user.id),
            profile: UserProfile::from(&user),
        })
    }

    /// Self-service profile change. A new email moves the mailing-list entry
    /// with it; the move is undone if the account write then fails.
    pub async fn update(&self, actor: &Actor, id: Uuid, patch: UserPatch) -> Result<UserProfile> {
        ensure(self.policy.can_manage_user(actor, id), "update this user")?;

        let patch = UserPatch {
            username: patch.username.map(|u| u.trim().to_string()),
            email: patch.email.as_deref().map(validation::normalize_email),
            ..patch
        };
        validation::validate_user_patch(&patch, self.rules.password)?;

        let current = self.load(id).await?;
        let new_email = patch.email.filter(|e| *e != current.email);
        let password_hash = match &patch.password {
            Some(password) => Some(self.hasher.hash(password).await?),
            None => None,
        };
        let update = UserUpdate {
            username: patch.username,
            email: new_email.clone(),
            password_hash,
            bio: patch.bio,
            ..UserUpdate::default()
        };

        if let Some(email) = &new_email {
            if !self.mailing_list.replace(&current.email, email).await? {
                tracing::warn!(user_id = %id, "mailing list entry was missing; re-adding");
                self.mailing_list.insert(email).await?;
            }
        }

        let written = match self.users.update_fields(id, &update).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(AppError::not_found("User", id)),
            Err(e) => Err(AppError::from(e)),
        };
        if let Err(cause) = written {
            if let Some(email) = &new_email {
                return Err(compensate(cause, "update user", async {
                    self.mailing_list
                        .replace(email, &current.email)
                        .await
                        .map(drop)
                })
                .await);
            }
            return Err(cause);
        }

        tracing::info!(user_id = %id, actor = %actor.id, email_changed = new_email.is_some(), "user updated");
        self.get(id).await
    }

    /// Deletes the account and its mailing-list entry. Authored content stays.
    pub async fn delete(&self, actor: &Actor, id: Uuid) -> Result<()> {
        ensure(self.policy.can_manage_user(actor, id), "delete this user")?;
        let user = self.load(id).await?;

        if !self.mailing_list.delete(&user.email).await? {
            tracing::warn!(user_id = %id, "mailing list entry was already gone");
        }
        if let Err(e) = self.users.delete(id).await {
            return Err(compensate(e.into(), "delete user", async {
                self.mailing_list.insert(&user.email).await
            })
            .await);
        }
        self.sessions.destroy_user(id).await?;

        tracing::info!(user_id = %id, actor = %actor.id, "user deleted");
        Ok(())
    }

    pub async fn list(&self, actor: &Actor) -> Result<Vec<AccountView>> {
        ensure(self.policy.can_administer(actor), "list users")?;
        let users = self.users.list().await?;
        Ok(users.iter().map(AccountView::from).collect())
    }

    pub async fn ban(&self, actor: &Actor, id: Uuid) -> Result<()> {
        self.set_banned(actor, id, true).await
    }

    pub async fn unban(&self, actor: &Actor, id: Uuid) -> Result<()> {
        self.set_banned(actor, id, false).await
    }

    /// Admin password reset; also lifts any lock and ends live sessions.
    pub async fn reset_password(&self, actor: &Actor, id: Uuid, password: &str) -> Result<()> {
        ensure(self.policy.can_administer(actor), "reset passwords")?;
        validation::validate_password(password, self.rules.password)?;

        let update = UserUpdate {
            password_hash: Some(self.hasher.hash(password).await?),
            ..UserUpdate::login_state(0, None)
        };
        if !self.users.update_fields(id, &update).await? {
            return Err(AppError::not_found("User", id));
        }
        self.sessions.destroy_user(id).await?;

        tracing::info!(user_id = %id, actor = %actor.id, "password reset by admin");
        Ok(())
    }

    async fn set_banned(&self, actor: &Actor, id: Uuid, banned: bool) -> Result<()> {
        ensure(self.policy.can_administer(actor), "ban users")?;
        let update = UserUpdate {
            is_banned: Some(banned),
            ..UserUpdate::default()
        };
        if !self.users.update_fields(id, &update).await? {
            return Err(AppError::not_found("User", id));
        }
        if banned {
            self.sessions.destroy_user(id).await?;
        }

        tracing::info!(user_id = %id, actor = %actor.id, banned, "ban state changed");
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<User> {
        self.users
            .get(id)
            .await?
            .ok_or_else(|| AppError::not_found("User", id))
    }
}
