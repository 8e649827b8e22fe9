//! # rw-services
//!
//! Orchestration over the `rw-core` ports. Each service validates, asks the
//! [`AuthorizationPolicy`] and then mutates the store, keeping the
//! cross-entity references (talk pages, portal membership, contributions,
//! the mailing list) consistent. Multi-step writes that cannot be done in
//! one store call are compensated on failure.

pub mod article;
pub mod portal;
pub mod sanitize;
pub mod talk;
pub mod user;

#[cfg(test)]
pub(crate) mod test_support;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rw_core::error::{AppError, Result};
use rw_core::policy::AuthorizationPolicy;
use rw_core::traits::{
    ArticleRepo, Clock, ContentSanitizer, MailingListRepo, PasswordHasher, PortalRepo,
    SessionStore, TalkRepo, UserRepo,
};
use rw_core::validation::PasswordPolicy;

pub use article::ArticleService;
pub use portal::PortalService;
pub use sanitize::AmmoniaSanitizer;
pub use talk::TalkService;
pub use user::UserService;

/// Every port implementation the services run on.
#[derive(Clone)]
pub struct Ports {
    pub users: Arc<dyn UserRepo>,
    pub articles: Arc<dyn ArticleRepo>,
    pub talk: Arc<dyn TalkRepo>,
    pub portals: Arc<dyn PortalRepo>,
    pub mailing_list: Arc<dyn MailingListRepo>,
    pub hasher: Arc<dyn PasswordHasher>,
    pub sessions: Arc<dyn SessionStore>,
    pub sanitizer: Arc<dyn ContentSanitizer>,
    pub policy: Arc<dyn AuthorizationPolicy>,
    pub clock: Arc<dyn Clock>,
}

/// Account rules the user service enforces.
#[derive(Debug, Clone)]
pub struct AccountRules {
    pub password: PasswordPolicy,
    pub max_failed_logins: u32,
    pub lock_duration: chrono::Duration,
    /// Usernames that are created with `isAdmin = true`.
    pub admin_usernames: Vec<String>,
}

impl Default for AccountRules {
    fn default() -> Self {
        Self {
            password: PasswordPolicy::default(),
            max_failed_logins: 5,
            lock_duration: chrono::Duration::hours(2),
            admin_usernames: Vec::new(),
        }
    }
}

/// The four services, built once and shared by every request.
#[derive(Clone)]
pub struct Services {
    pub articles: ArticleService,
    pub portals: PortalService,
    pub talk: TalkService,
    pub users: UserService,
}

impl Services {
    pub fn new(ports: Ports, rules: AccountRules) -> Self {
        let articles = ArticleService::new(&ports);
        Self {
            portals: PortalService::new(&ports, articles.clone()),
            talk: TalkService::new(&ports),
            users: UserService::new(&ports, rules),
            articles,
        }
    }
}

/// Runs `operation` against a deadline.
///
/// The operation is spawned and keeps running past the deadline, so a
/// multi-step write still completes or compensates; only the caller stops
/// waiting and gets `Timeout`.
pub async fn within<T, F>(deadline: Duration, operation: F) -> Result<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let task = tokio::spawn(operation);
    match tokio::time::timeout(deadline, task).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(join_error)) => Err(AppError::Store(join_error.into())),
        Err(_) => {
            tracing::warn!(deadline_ms = deadline.as_millis() as u64, "operation exceeded its deadline");
            Err(AppError::Timeout)
        }
    }
}

/// Undoes a half-done multi-step write.
///
/// Returns the original failure when the undo succeeds. When the undo fails
/// too the store is left inconsistent: that is logged at error level and
/// reported as `IntegrityViolation`.
pub(crate) async fn compensate<F>(cause: AppError, step: &str, undo: F) -> AppError
where
    F: Future<Output = anyhow::Result<()>>,
{
    match undo.await {
        Ok(()) => {
            tracing::warn!(error = %cause, step, "rolled back partial write");
            cause
        }
        Err(undo_error) => {
            tracing::error!(
                error = %cause,
                undo_error = %undo_error,
                step,
                "rollback failed; manual reconciliation required"
            );
            AppError::IntegrityViolation(format!("{step}: rollback failed: {undo_error}"))
        }
    }
}

/// Offset/limit pagination. `page` and `limit` default to 1 and 10 and are
/// clamped to at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
}

impl Pagination {
    pub const DEFAULT_LIMIT: u64 = 10;

    pub fn new(page: Option<u64>, limit: Option<u64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(Self::DEFAULT_LIMIT).max(1),
        }
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(self.limit)
    }
}
