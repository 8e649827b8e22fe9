use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use rw_core::payloads::{NewUser, UserPatch};
use rw_services::user::{AccountView, AuthStatus, ProfileView, UserProfile};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::extract::{JsonBody, PathParams};
use crate::session::{expired_cookie, session_cookie, CurrentUser, MaybeUser};
use crate::AppState;

#[derive(Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct PasswordReset {
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub csrf_token: String,
    pub user: UserProfile,
}

pub async fn register(
    State(state): State<AppState>,
    JsonBody(new_user): JsonBody<NewUser>,
) -> ApiResult<(StatusCode, Json<UserProfile>)> {
    let profile = state
        .run(move |s| async move { s.users.create(new_user).await })
        .await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// Opens a session: the token goes into the cookie, the anti-forgery token
/// into the body.
pub async fn login(
    State(state): State<AppState>,
    JsonBody(credentials): JsonBody<Credentials>,
) -> ApiResult<Response> {
    let login = state
        .run(move |s| async move { s.users.login(&credentials.username, &credentials.password).await })
        .await?;

    let cookie = session_cookie(&state.config, &login.session.token);
    let body = LoginResponse {
        csrf_token: login.session.csrf_token,
        user: login.user,
    };
    Ok(([(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

pub async fn logout(State(state): State<AppState>, user: CurrentUser) -> ApiResult<Response> {
    let token = user.session.token;
    state
        .run(move |s| async move { s.users.logout(&token).await })
        .await?;
    tracing::info!(user_id = %user.actor.id, "user logged out");
    Ok((
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, expired_cookie(&state.config))],
    )
        .into_response())
}

pub async fn status(State(state): State<AppState>, viewer: MaybeUser) -> Json<AuthStatus> {
    Json(state.services.users.auth_status(viewer.actor()))
}

pub async fn get(
    State(state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
) -> ApiResult<Json<UserProfile>> {
    let profile = state.run(move |s| async move { s.users.get(id).await }).await?;
    Ok(Json(profile))
}

pub async fn get_by_username(
    State(state): State<AppState>,
    viewer: MaybeUser,
    PathParams(username): PathParams<String>,
) -> ApiResult<Json<ProfileView>> {
    let view = state
        .run(move |s| async move { s.users.get_by_username(&username, viewer.actor()).await })
        .await?;
    Ok(Json(view))
}

pub async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    PathParams(id): PathParams<Uuid>,
    JsonBody(patch): JsonBody<UserPatch>,
) -> ApiResult<Json<UserProfile>> {
    let profile = state
        .run(move |s| async move { s.users.update(&user.actor, id, patch).await })
        .await?;
    Ok(Json(profile))
}

pub async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    PathParams(id): PathParams<Uuid>,
) -> ApiResult<Response> {
    let own_account = user.actor.id == id;
    state
        .run(move |s| async move { s.users.delete(&user.actor, id).await })
        .await?;
    if own_account {
        let cookie = expired_cookie(&state.config);
        return Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)]).into_response());
    }
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn admin_list(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<Vec<AccountView>>> {
    let users = state
        .run(move |s| async move { s.users.list(&user.actor).await })
        .await?;
    Ok(Json(users))
}

pub async fn admin_ban(
    State(state): State<AppState>,
    user: CurrentUser,
    PathParams(id): PathParams<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .run(move |s| async move { s.users.ban(&user.actor, id).await })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn admin_unban(
    State(state): State<AppState>,
    user: CurrentUser,
    PathParams(id): PathParams<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .run(move |s| async move { s.users.unban(&user.actor, id).await })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn admin_reset_password(
    State(state): State<AppState>,
    user: CurrentUser,
    PathParams(id): PathParams<Uuid>,
    JsonBody(body): JsonBody<PasswordReset>,
) -> ApiResult<StatusCode> {
    state
        .run(move |s| async move { s.users.reset_password(&user.actor, id, &body.password).await })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
