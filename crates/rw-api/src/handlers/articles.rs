use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use rw_core::models::{Article, Section};
use rw_core::payloads::{ArticleDraft, SectionPatch};
use rw_services::article::{ArticleView, SearchResults};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::extract::{JsonBody, PathParams, QueryParams};
use crate::session::{CurrentUser, MaybeUser};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateArticle {
    pub portal_id: Uuid,
    #[serde(flatten)]
    pub article: ArticleDraft,
}

/// Paging values arrive as raw strings; anything that is not an integer
/// falls back to the default and anything below one is raised to one.
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: String,
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl SearchParams {
    pub fn page(&self) -> Option<u64> {
        lenient(self.page.as_deref())
    }

    pub fn limit(&self) -> Option<u64> {
        lenient(self.limit.as_deref())
    }
}

fn lenient(raw: Option<&str>) -> Option<u64> {
    let n = raw?.trim().parse::<i64>().ok()?;
    Some(n.max(1).unsigned_abs())
}

pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    JsonBody(body): JsonBody<CreateArticle>,
) -> ApiResult<(StatusCode, Json<Article>)> {
    let article = state
        .run(move |s| async move { s.articles.create(&user.actor, body.article, body.portal_id).await })
        .await?;
    Ok((StatusCode::CREATED, Json(article)))
}

pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<Article>>> {
    let articles = state.run(|s| async move { s.articles.list().await }).await?;
    Ok(Json(articles))
}

pub async fn search(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<SearchParams>,
) -> ApiResult<Json<SearchResults>> {
    let results = state
        .run(move |s| async move { s.articles.search(&params.query, params.page(), params.limit()).await })
        .await?;
    Ok(Json(results))
}

pub async fn get(
    State(state): State<AppState>,
    viewer: MaybeUser,
    PathParams(id): PathParams<Uuid>,
) -> ApiResult<Json<ArticleView>> {
    let view = state
        .run(move |s| async move { s.articles.get(id, viewer.actor()).await })
        .await?;
    Ok(Json(view))
}

pub async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    PathParams(id): PathParams<Uuid>,
    JsonBody(draft): JsonBody<ArticleDraft>,
) -> ApiResult<Json<Article>> {
    let article = state
        .run(move |s| async move { s.articles.update(&user.actor, id, draft).await })
        .await?;
    Ok(Json(article))
}

pub async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    PathParams(id): PathParams<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .run(move |s| async move { s.articles.delete(&user.actor, id).await })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_section(
    State(state): State<AppState>,
    PathParams((id, section_id)): PathParams<(Uuid, Uuid)>,
) -> ApiResult<Json<Section>> {
    let section = state
        .run(move |s| async move { s.articles.get_section(id, section_id).await })
        .await?;
    Ok(Json(section))
}

pub async fn update_section(
    State(state): State<AppState>,
    user: CurrentUser,
    PathParams((id, section_id)): PathParams<(Uuid, Uuid)>,
    JsonBody(patch): JsonBody<SectionPatch>,
) -> ApiResult<Json<Section>> {
    let section = state
        .run(move |s| async move { s.articles.update_section(&user.actor, id, section_id, patch).await })
        .await?;
    Ok(Json(section))
}

pub async fn delete_section(
    State(state): State<AppState>,
    user: CurrentUser,
    PathParams((id, section_id)): PathParams<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    state
        .run(move |s| async move { s.articles.delete_section(&user.actor, id, section_id).await })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(page: Option<&str>, limit: Option<&str>) -> SearchParams {
        SearchParams {
            query: "rust".into(),
            page: page.map(str::to_string),
            limit: limit.map(str::to_string),
        }
    }

    #[test]
    fn paging_values_are_lenient() {
        assert_eq!(params(Some("3"), Some("25")).page(), Some(3));
        assert_eq!(params(Some("3"), Some("25")).limit(), Some(25));
        assert_eq!(params(Some("-1"), None).page(), Some(1));
        assert_eq!(params(Some("0"), Some("0")).limit(), Some(1));
        assert_eq!(params(Some("abc"), Some("")).page(), None);
        assert_eq!(params(Some("abc"), Some("")).limit(), None);
        assert_eq!(params(None, None).page(), None);
    }
}
