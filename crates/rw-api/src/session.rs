//! Session cookie handling and the identity extractors.
//!
//! A session is an opaque token in an HttpOnly cookie. Mutating requests
//! must also echo the session's anti-forgery token in `x-csrf-token`.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, Method};
use rw_core::error::AppError;
use rw_core::models::{Actor, Session};
use subtle::ConstantTimeEq;

use crate::error::ApiError;
use crate::{AppState, ApiConfig};

pub const CSRF_HEADER: &str = "x-csrf-token";

/// The caller of a request that requires a session.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub actor: Actor,
    pub session: Session,
}

/// The caller if a valid session accompanied the request.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<Actor>);

impl MaybeUser {
    pub fn actor(&self) -> Option<&Actor> {
        self.0.as_ref()
    }
}

/// Reads one cookie value from the `Cookie` headers.
pub fn cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// `Set-Cookie` value that opens a session.
pub fn session_cookie(config: &ApiConfig, token: &str) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}",
        config.cookie_name,
        token,
        config.session_ttl.num_seconds()
    );
    if config.cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that ends a session.
pub fn expired_cookie(config: &ApiConfig) -> String {
    format!(
        "{}=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0",
        config.cookie_name
    )
}

fn is_safe(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Constant-time token comparison.
fn csrf_matches(echoed: Option<&str>, expected: &str) -> bool {
    echoed.is_some_and(|echoed| bool::from(echoed.as_bytes().ct_eq(expected.as_bytes())))
}

async fn resolve(parts: &Parts, state: &AppState) -> Result<Option<(Session, Actor)>, ApiError> {
    let Some(token) = cookie(&parts.headers, &state.config.cookie_name) else {
        return Ok(None);
    };
    let resolved = state.services.users.authenticate(token).await?;
    Ok(resolved.map(|(session, user)| (session, user.actor())))
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let (session, actor) = resolve(parts, state)
            .await?
            .ok_or(ApiError(AppError::Unauthenticated))?;

        if !is_safe(&parts.method) {
            let echoed = parts
                .headers
                .get(CSRF_HEADER)
                .and_then(|value| value.to_str().ok());
            if !csrf_matches(echoed, &session.csrf_token) {
                tracing::warn!(user_id = %actor.id, method = %parts.method, uri = %parts.uri, "missing or wrong csrf token");
                return Err(ApiError(AppError::Forbidden("invalid csrf token".into())));
            }
        }

        Ok(CurrentUser { actor, session })
    }
}

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(resolve(parts, state).await?.map(|(_, actor)| actor)))
    }
}
