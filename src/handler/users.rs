use axum::{
    Extension, Form, Json, Router,
    extract::{Path, Query, State},
    middleware,
    response::{IntoResponse, Redirect},
    routing::get,
};
use chrono::Utc;
use tracing::instrument;
use validator::Validate;

use crate::{
    AppState,
    db::{PostFilter, UserExt},
    dtos::{PageQueryDto, ProfileDto, ProfileFormDto, ProfileFormPageDto, ProfilePageDto},
    error::{ErrorMessage, HttpError},
    handler::{db_error, post::list_posts, profile_url},
    middleware::{CurrentUser, Viewer, require_auth},
};

/// Routes nested under /profile
pub fn users_handler() -> Router<AppState> {
    Router::new()
        // registered before the catch-all username route
        .route(
            "/edit/",
            get(edit_profile_form)
                .post(edit_profile)
                .route_layer(middleware::from_fn(require_auth)),
        )
        .route("/{username}/", get(get_profile))
}

/// A user's public page with their posts, newest first.
///
/// The owner sees every post of theirs (drafts, scheduled, uncategorized);
/// everybody else sees only the publicly visible ones.
#[instrument(skip(app_state, viewer))]
pub async fn get_profile(
    Path(username): Path<String>,
    Query(query): Query<PageQueryDto>,
    State(app_state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
) -> Result<impl IntoResponse, HttpError> {
    let user = app_state
        .db_client
        .get_user(None, Some(&username))
        .await
        .map_err(db_error("getting user"))?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::UserNotFound.to_string()))?;

    let is_owner = viewer.id() == Some(user.id);
    let filter = if is_owner {
        PostFilter::all().author(user.id)
    } else {
        PostFilter::visible_at(Utc::now()).author(user.id)
    };

    let (posts, pagination) = list_posts(&app_state, &filter, &query).await?;

    Ok(Json(ProfilePageDto {
        status: "success".to_string(),
        profile: ProfileDto::filter_user(&user),
        is_owner,
        data: posts,
        pagination,
    }))
}

#[instrument(skip(current), fields(username = %current.user.username))]
pub async fn edit_profile_form(
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, HttpError> {
    Ok(Json(ProfileFormPageDto {
        status: "success".to_string(),
        form: ProfileFormDto::from_user(&current.user),
    }))
}

/// Update the logged in user's own profile, then show it
#[instrument(skip(app_state, current, body), fields(username = %current.user.username))]
pub async fn edit_profile(
    State(app_state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Form(body): Form<ProfileFormDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid edit_profile input: {}", e);
        HttpError::validation(&e)
    })?;

    let result = app_state
        .db_client
        .update_profile(current.user.id, &body)
        .await;

    match result {
        Ok(user) => {
            tracing::info!("edit_profile successful");
            Ok(Redirect::to(&profile_url(&user.username)))
        }
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            tracing::error!("DB error, updating profile, unique_violation: {}", db_err);
            Err(HttpError::unique_constraint_violation(
                ErrorMessage::UsernameTaken.to_string(),
            ))
        }
        Err(e) => Err(db_error("updating profile")(e)),
    }
}
