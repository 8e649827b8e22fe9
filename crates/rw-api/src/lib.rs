//! # rw-api
//!
//! The axum HTTP surface of Rusty-Wiki: routing, session extraction,
//! request logging, security headers and login throttling. Handlers stay
//! thin; every rule lives in `rw-services`.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod rate_limit;
pub mod session;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use rw_services::{within, Services};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::error::ApiResult;
use crate::rate_limit::FixedWindowLimiter;

/// HTTP-level knobs, resolved from settings by the binary.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub request_timeout: Duration,
    pub body_limit_bytes: usize,
    pub allowed_origins: Vec<String>,
    pub cookie_name: String,
    pub cookie_secure: bool,
    pub session_ttl: chrono::Duration,
    pub rate_limit_window: Duration,
    pub rate_limit_max: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            body_limit_bytes: 2 * 1024 * 1024,
            allowed_origins: Vec::new(),
            cookie_name: "wiki.sid".into(),
            cookie_secure: false,
            session_ttl: chrono::Duration::hours(24),
            rate_limit_window: Duration::from_secs(60),
            rate_limit_max: 10,
        }
    }
}

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    pub config: Arc<ApiConfig>,
    pub limiter: Arc<FixedWindowLimiter>,
}

impl AppState {
    pub fn new(services: Services, config: ApiConfig) -> Self {
        let limiter = FixedWindowLimiter::new(config.rate_limit_window, config.rate_limit_max);
        Self {
            services,
            limiter: Arc::new(limiter),
            config: Arc::new(config),
        }
    }

    /// Runs one service call under the request deadline.
    pub(crate) async fn run<T, F, Fut>(&self, call: F) -> ApiResult<T>
    where
        F: FnOnce(Services) -> Fut,
        Fut: Future<Output = rw_core::Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        Ok(within(self.config.request_timeout, call(self.services.clone())).await?)
    }
}

/// Builds the full application router.
pub fn router(state: AppState) -> Router {
    use handlers::{articles, portals, talk, users};

    let credentials = Router::new()
        .route("/users", post(users::register))
        .route("/users/login", post(users::login))
        .route_layer(axum::middleware::from_fn_with_state(
            state.limiter.clone(),
            middleware::throttle,
        ));

    let api = Router::new()
        .route("/articles", post(articles::create).get(articles::list))
        .route("/articles/search", get(articles::search))
        .route(
            "/articles/{id}",
            get(articles::get).put(articles::update).delete(articles::delete),
        )
        .route(
            "/articles/{id}/{section_id}",
            get(articles::get_section)
                .put(articles::update_section)
                .delete(articles::delete_section),
        )
        .route("/portals", post(portals::create).get(portals::list))
        .route(
            "/portals/{id}",
            get(portals::get).put(portals::update).delete(portals::delete),
        )
        .route("/portals/{id}/articles", get(portals::list_articles))
        .route("/talk/{article_id}", get(talk::get_talk_page))
        .route(
            "/talk/{article_id}/topics",
            get(talk::get_talk_page).post(talk::create_topic),
        )
        .route(
            "/talk/{article_id}/topics/{topic_id}",
            get(talk::get_topic)
                .put(talk::update_topic)
                .delete(talk::delete_topic),
        )
        .route(
            "/talk/{article_id}/topics/{topic_id}/comments",
            post(talk::create_comment),
        )
        .route(
            "/talk/{article_id}/topics/{topic_id}/comments/{comment_id}",
            axum::routing::put(talk::update_comment).delete(talk::delete_comment),
        )
        .route("/users/logout", post(users::logout))
        .route("/users/status", get(users::status))
        .route("/users/username/{username}", get(users::get_by_username))
        .route("/users/admin/users", get(users::admin_list))
        .route("/users/admin/users/{id}/ban", post(users::admin_ban))
        .route("/users/admin/users/{id}/unban", post(users::admin_unban))
        .route(
            "/users/admin/users/{id}/reset-password",
            post(users::admin_reset_password),
        )
        .route(
            "/users/{id}",
            get(users::get).put(users::update).delete(users::delete),
        );

    let config = state.config.clone();
    let app = api.merge(credentials).with_state(state);
    middleware::with_security_headers(app)
        .layer(middleware::propagate_request_id_layer())
        .layer(axum::middleware::from_fn(middleware::log_request))
        .layer(middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(config.body_limit_bytes))
        .layer(middleware::cors(&config.allowed_origins))
}
