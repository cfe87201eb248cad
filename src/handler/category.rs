use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use tracing::instrument;

use crate::AppState;
use crate::db::{CategoryExt, PostFilter};
use crate::dtos::{PageQueryDto, PostListPageDto};
use crate::error::{ErrorMessage, HttpError};
use crate::handler::{db_error, post::list_posts};
use crate::utils::forms;

/// Routes nested under /category
pub fn category_handler() -> Router<AppState> {
    Router::new().route("/{category_slug}/", get(get_category_posts))
}

/// Visible posts of a published category.
/// A malformed slug, an unknown category and a hidden one are all NotFound.
#[instrument(skip(app_state))]
pub async fn get_category_posts(
    Path(category_slug): Path<String>,
    Query(query): Query<PageQueryDto>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    if !forms::is_valid_slug(&category_slug) {
        return Err(HttpError::not_found(ErrorMessage::CategoryNotFound.to_string()));
    }

    let category = app_state
        .db_client
        .get_published_category(&category_slug)
        .await
        .map_err(db_error("getting category"))?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::CategoryNotFound.to_string()))?;

    let filter = PostFilter::visible_at(Utc::now()).category(category.id);
    let (posts, pagination) = list_posts(&app_state, &filter, &query).await?;

    Ok(Json(PostListPageDto {
        status: "success".to_string(),
        category: Some(category),
        data: posts,
        pagination,
    }))
}
