use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use rw_core::models::{Comment, Topic};
use rw_core::payloads::{CommentDraft, TopicDraft};
use rw_services::talk::{TalkPageView, TopicView};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::extract::{JsonBody, PathParams};
use crate::session::{CurrentUser, MaybeUser};
use crate::AppState;

pub async fn get_talk_page(
    State(state): State<AppState>,
    viewer: MaybeUser,
    PathParams(article_id): PathParams<Uuid>,
) -> ApiResult<Json<TalkPageView>> {
    let page = state
        .run(move |s| async move { s.talk.get_talk_page(article_id, viewer.actor()).await })
        .await?;
    Ok(Json(page))
}

pub async fn get_topic(
    State(state): State<AppState>,
    viewer: MaybeUser,
    PathParams((article_id, topic_id)): PathParams<(Uuid, Uuid)>,
) -> ApiResult<Json<TopicView>> {
    let topic = state
        .run(move |s| async move { s.talk.get_topic(article_id, topic_id, viewer.actor()).await })
        .await?;
    Ok(Json(topic))
}

pub async fn create_topic(
    State(state): State<AppState>,
    user: CurrentUser,
    PathParams(article_id): PathParams<Uuid>,
    JsonBody(draft): JsonBody<TopicDraft>,
) -> ApiResult<(StatusCode, Json<Topic>)> {
    let topic = state
        .run(move |s| async move { s.talk.create_topic(&user.actor, article_id, draft).await })
        .await?;
    Ok((StatusCode::CREATED, Json(topic)))
}

pub async fn update_topic(
    State(state): State<AppState>,
    user: CurrentUser,
    PathParams((article_id, topic_id)): PathParams<(Uuid, Uuid)>,
    JsonBody(draft): JsonBody<TopicDraft>,
) -> ApiResult<Json<Topic>> {
    let topic = state
        .run(move |s| async move { s.talk.update_topic(&user.actor, article_id, topic_id, draft).await })
        .await?;
    Ok(Json(topic))
}

pub async fn delete_topic(
    State(state): State<AppState>,
    user: CurrentUser,
    PathParams((article_id, topic_id)): PathParams<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    state
        .run(move |s| async move { s.talk.delete_topic(&user.actor, article_id, topic_id).await })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    PathParams((article_id, topic_id)): PathParams<(Uuid, Uuid)>,
    JsonBody(draft): JsonBody<CommentDraft>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    let comment = state
        .run(move |s| async move {
            s.talk
                .create_comment(&user.actor, article_id, topic_id, draft)
                .await
        })
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn update_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    PathParams((article_id, topic_id, comment_id)): PathParams<(Uuid, Uuid, Uuid)>,
    JsonBody(draft): JsonBody<CommentDraft>,
) -> ApiResult<Json<Comment>> {
    let comment = state
        .run(move |s| async move {
            s.talk
                .update_comment(&user.actor, article_id, topic_id, comment_id, draft)
                .await
        })
        .await?;
    Ok(Json(comment))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    PathParams((article_id, topic_id, comment_id)): PathParams<(Uuid, Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    state
        .run(move |s| async move {
            s.talk
                .delete_comment(&user.actor, article_id, topic_id, comment_id)
                .await
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
