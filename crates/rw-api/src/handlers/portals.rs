use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use rw_core::models::{Article, Portal};
use rw_core::payloads::{PortalDraft, PortalPatch};
use rw_services::portal::PortalView;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::extract::{JsonBody, PathParams};
use crate::session::{CurrentUser, MaybeUser};
use crate::AppState;

pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    JsonBody(draft): JsonBody<PortalDraft>,
) -> ApiResult<(StatusCode, Json<Portal>)> {
    let portal = state
        .run(move |s| async move { s.portals.create(&user.actor, draft).await })
        .await?;
    Ok((StatusCode::CREATED, Json(portal)))
}

pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<Portal>>> {
    let portals = state.run(|s| async move { s.portals.list().await }).await?;
    Ok(Json(portals))
}

pub async fn get(
    State(state): State<AppState>,
    viewer: MaybeUser,
    PathParams(id): PathParams<Uuid>,
) -> ApiResult<Json<PortalView>> {
    let view = state
        .run(move |s| async move { s.portals.get(id, viewer.actor()).await })
        .await?;
    Ok(Json(view))
}

pub async fn list_articles(
    State(state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
) -> ApiResult<Json<Vec<Article>>> {
    let articles = state
        .run(move |s| async move { s.portals.list_articles(id).await })
        .await?;
    Ok(Json(articles))
}

pub async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    PathParams(id): PathParams<Uuid>,
    JsonBody(patch): JsonBody<PortalPatch>,
) -> ApiResult<Json<Portal>> {
    let portal = state
        .run(move |s| async move { s.portals.update(&user.actor, id, patch).await })
        .await?;
    Ok(Json(portal))
}

pub async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    PathParams(id): PathParams<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .run(move |s| async move { s.portals.delete(&user.actor, id).await })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
