use axum::extract::rejection::FormRejection;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Json, Redirect};
use axum::routing::{get, post};
use axum::{Extension, Form, Router, middleware};
use chrono::Utc;
use tracing::instrument;
use validator::Validate;

use crate::AppState;
use crate::access;
use crate::db::{CommentExt, PostExt};
use crate::dtos::{CommentDto, CommentFormDto, CommentPageDto};
use crate::error::{ErrorMessage, HttpError};
use crate::handler::{db_error, post_url};
use crate::middleware::{CurrentUser, require_auth};

/// Comment routes, merged into the /posts router.
///
/// Full paths are spelled out here so the trailing slash survives nesting.
pub fn comment_handler() -> Router<AppState> {
    Router::new()
        .route("/{post_id}/comment/", post(create_comment))
        .route(
            "/{post_id}/comment/{comment_id}/edit/",
            get(edit_comment_form).post(edit_comment),
        )
        .route(
            "/{post_id}/comment/{comment_id}/delete/",
            get(delete_comment_form).post(delete_comment),
        )
        .route_layer(middleware::from_fn(require_auth))
}

/// The comment addressed by the URL, if `user` wrote it.
///
/// NotFound when it does not exist or hangs under another post,
/// Forbidden when somebody else wrote it.
async fn load_own_comment(
    app_state: &AppState,
    current: &CurrentUser,
    post_id: i64,
    comment_id: i64,
) -> Result<CommentDto, HttpError> {
    let comment = app_state
        .db_client
        .get_comment(comment_id)
        .await
        .map_err(db_error("getting comment"))?
        .filter(|comment| comment.post_id == post_id)
        .ok_or_else(|| HttpError::not_found(ErrorMessage::CommentNotFound.to_string()))?;

    access::ensure_author(current.user.id, &comment)?;
    Ok(comment)
}

/// Unwrap and validate the comment form once the target is known to exist
fn read_comment_form(
    form: Result<Form<CommentFormDto>, FormRejection>,
) -> Result<CommentFormDto, HttpError> {
    let Form(form) = form.map_err(|rejection| {
        tracing::error!("Invalid comment body: {}", rejection.body_text());
        HttpError::new(rejection.body_text(), rejection.status())
    })?;
    form.validate().map_err(|e| {
        tracing::error!("Invalid comment form: {}", e);
        HttpError::validation(&e)
    })?;
    Ok(form)
}

/// Add a comment to a post the commenter can see, then back to the post
#[instrument(skip(app_state, current, form), fields(username = %current.user.username))]
pub async fn create_comment(
    Path(post_id): Path<i64>,
    State(app_state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    form: Result<Form<CommentFormDto>, FormRejection>,
) -> Result<impl IntoResponse, HttpError> {
    app_state
        .db_client
        .get_post(post_id)
        .await
        .map_err(db_error("getting post"))?
        .filter(|post| {
            let state = post.publish_state();
            access::can_view(Some(current.user.id), post.author_id, &state, Utc::now())
        })
        .ok_or_else(|| HttpError::not_found(ErrorMessage::PostNotFound.to_string()))?;

    let form = read_comment_form(form)?;

    let comment = app_state
        .db_client
        .create_comment(current.user.id, post_id, &form.text)
        .await
        .map_err(db_error("creating comment"))?;

    tracing::info!(comment_id = comment.id, "create_comment successful");
    Ok(Redirect::to(&post_url(post_id)))
}

#[instrument(skip(app_state, current), fields(username = %current.user.username))]
pub async fn edit_comment_form(
    Path((post_id, comment_id)): Path<(i64, i64)>,
    State(app_state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, HttpError> {
    let comment = load_own_comment(&app_state, &current, post_id, comment_id).await?;
    let form = CommentFormDto {
        text: comment.text.clone(),
    };

    Ok(Json(CommentPageDto {
        status: "success".to_string(),
        comment,
        form,
    }))
}

#[instrument(skip(app_state, current, form), fields(username = %current.user.username))]
pub async fn edit_comment(
    Path((post_id, comment_id)): Path<(i64, i64)>,
    State(app_state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    form: Result<Form<CommentFormDto>, FormRejection>,
) -> Result<impl IntoResponse, HttpError> {
    load_own_comment(&app_state, &current, post_id, comment_id).await?;
    let form = read_comment_form(form)?;

    match app_state
        .db_client
        .edit_comment(current.user.id, comment_id, &form.text)
        .await
    {
        Ok(_) => {}
        // deleted between the lookup and the update
        Err(sqlx::Error::RowNotFound) => {
            return Err(HttpError::not_found(ErrorMessage::CommentNotFound.to_string()));
        }
        Err(e) => return Err(db_error("editing comment")(e)),
    }

    tracing::info!("edit_comment successful");
    Ok(Redirect::to(&post_url(post_id)))
}

#[instrument(skip(app_state, current), fields(username = %current.user.username))]
pub async fn delete_comment_form(
    Path((post_id, comment_id)): Path<(i64, i64)>,
    State(app_state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, HttpError> {
    let comment = load_own_comment(&app_state, &current, post_id, comment_id).await?;

    Ok(Json(CommentPageDto {
        status: "success".to_string(),
        comment,
        form: CommentFormDto::default(),
    }))
}

#[instrument(skip(app_state, current), fields(username = %current.user.username))]
pub async fn delete_comment(
    Path((post_id, comment_id)): Path<(i64, i64)>,
    State(app_state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, HttpError> {
    load_own_comment(&app_state, &current, post_id, comment_id).await?;

    match app_state
        .db_client
        .delete_comment(current.user.id, comment_id)
        .await
    {
        Ok(()) => {}
        Err(sqlx::Error::RowNotFound) => {
            return Err(HttpError::not_found(ErrorMessage::CommentNotFound.to_string()));
        }
        Err(e) => return Err(db_error("deleting comment")(e)),
    }

    tracing::info!("delete_comment successful");
    Ok(Redirect::to(&post_url(post_id)))
}
