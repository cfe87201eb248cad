use axum::Extension;
use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::response::{IntoResponse, Json, Redirect, Response};
use axum::routing::get;
use axum::{Router, middleware};
use chrono::Utc;
use tracing::instrument;
use validator::Validate;

use crate::AppState;
use crate::access;
use crate::db::{CategoryExt, CommentExt, PostExt, PostFilter};
use crate::dtos::{
    CommentFormDto, PageQueryDto, PaginationDto, PostCardDto, PostDeletePageDto,
    PostDetailPageDto, PostFormDto, PostFormPageDto, PostListPageDto, POSTS_PER_PAGE,
};
use crate::error::{ErrorMessage, FieldErrors, HttpError, collect_field_errors};
use crate::handler::{db_error, post_url, profile_url};
use crate::middleware::{CurrentUser, Viewer, require_auth};
use crate::utils::{forms, media};

/// Request body limit for the post form (image included)
const MAX_POST_FORM_BYTES: usize = 8 * 1024 * 1024;

/// Routes nested under /posts
pub fn post_handler() -> Router<AppState> {
    Router::new()
        .route(
            "/create/",
            get(create_post_form)
                .post(create_post)
                .route_layer(middleware::from_fn(require_auth)),
        )
        .route("/{post_id}/", get(get_post))
        // no require_auth: anonymous callers are soft-denied like other non-authors
        .route("/{post_id}/edit/", get(edit_post_form).post(edit_post))
        .route(
            "/{post_id}/delete/",
            get(delete_post_form)
                .post(delete_post)
                .route_layer(middleware::from_fn(require_auth)),
        )
        .layer(DefaultBodyLimit::max(MAX_POST_FORM_BYTES))
}

/// One page of posts matching `filter`, each with its comment count.
///
/// Counts come from a single grouped query over the page's post ids.
/// A page past the last one is NotFound.
pub(crate) async fn list_posts(
    app_state: &AppState,
    filter: &PostFilter,
    query: &PageQueryDto,
) -> Result<(Vec<PostCardDto>, PaginationDto), HttpError> {
    query.validate().map_err(|e| {
        tracing::error!("Invalid page query: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let total = app_state
        .db_client
        .count_posts(filter)
        .await
        .map_err(db_error("counting posts"))?;

    let pagination = PaginationDto::new(query.page.unwrap_or(1), POSTS_PER_PAGE, total);
    if pagination.is_out_of_range() {
        return Err(HttpError::not_found(ErrorMessage::PageNotFound.to_string()));
    }

    let posts = app_state
        .db_client
        .get_posts(filter, pagination.limit, pagination.offset())
        .await
        .map_err(db_error("getting posts"))?;

    let ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
    let counts = app_state
        .db_client
        .get_comment_counts(&ids)
        .await
        .map_err(db_error("counting comments"))?;

    Ok((PostCardDto::with_counts(posts, &counts), pagination))
}

/// Index page: newest publicly visible posts
#[instrument(skip(app_state))]
pub async fn get_index(
    Query(query): Query<PageQueryDto>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let filter = PostFilter::visible_at(Utc::now());
    let (posts, pagination) = list_posts(&app_state, &filter, &query).await?;

    Ok(Json(PostListPageDto {
        status: "success".to_string(),
        category: None,
        data: posts,
        pagination,
    }))
}

/// Post detail with its comments and an empty comment form.
/// The author sees the post whatever its publish state.
#[instrument(skip(app_state, viewer))]
pub async fn get_post(
    Path(post_id): Path<i64>,
    State(app_state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
) -> Result<impl IntoResponse, HttpError> {
    let post = app_state
        .db_client
        .get_post(post_id)
        .await
        .map_err(db_error("getting post"))?
        .filter(|post| {
            access::can_view(viewer.id(), post.author_id, &post.publish_state(), Utc::now())
        })
        .ok_or_else(|| HttpError::not_found(ErrorMessage::PostNotFound.to_string()))?;

    let comments = app_state
        .db_client
        .get_post_comments(post_id)
        .await
        .map_err(db_error("getting comments"))?;

    Ok(Json(PostDetailPageDto {
        status: "success".to_string(),
        post,
        comments,
        form: CommentFormDto::default(),
    }))
}

async fn form_page(app_state: &AppState, form: PostFormDto) -> Result<PostFormPageDto, HttpError> {
    let categories = app_state
        .db_client
        .get_categories()
        .await
        .map_err(db_error("getting categories"))?;
    let locations = app_state
        .db_client
        .get_locations()
        .await
        .map_err(db_error("getting locations"))?;

    Ok(PostFormPageDto {
        status: "success".to_string(),
        form,
        categories,
        locations,
    })
}

#[instrument(skip(app_state, current), fields(username = %current.user.username))]
pub async fn create_post_form(
    State(app_state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, HttpError> {
    let form = PostFormDto {
        pub_date: forms::format_pub_date(Utc::now()),
        is_published: true,
        ..Default::default()
    };

    Ok(Json(form_page(&app_state, form).await?))
}

/// Image part of the post form, already checked to be an accepted type
struct ImageUpload {
    ext: String,
    bytes: Bytes,
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> HttpError {
    tracing::error!("Invalid multipart body: {}", e);
    HttpError::new(e.body_text(), e.status())
}

fn select_error(errors: &mut FieldErrors, field: &str) {
    errors
        .entry(field.to_string())
        .or_default()
        .push("Select a valid choice.".to_string());
}

/// Collect the post form from a multipart body and validate it.
///
/// Unknown parts, including any `author`, are ignored.
async fn read_post_form(
    mut multipart: Multipart,
) -> Result<(PostFormDto, Option<ImageUpload>), HttpError> {
    let mut form = PostFormDto::default();
    let mut image = None;
    let mut field_errors = FieldErrors::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => form.title = field.text().await.map_err(multipart_error)?,
            "text" => form.text = field.text().await.map_err(multipart_error)?,
            "pub_date" => form.pub_date = field.text().await.map_err(multipart_error)?,
            "is_published" => {
                let value = field.text().await.map_err(multipart_error)?;
                form.is_published = forms::parse_checkbox(&value);
            }
            "category" => {
                let value = field.text().await.map_err(multipart_error)?;
                match forms::parse_optional_id(&value) {
                    Ok(id) => form.category = id,
                    Err(_) => select_error(&mut field_errors, "category"),
                }
            }
            "location" => {
                let value = field.text().await.map_err(multipart_error)?;
                match forms::parse_optional_id(&value) {
                    Ok(id) => form.location = id,
                    Err(_) => select_error(&mut field_errors, "location"),
                }
            }
            "image" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                // an untouched file input sends an empty part
                if file_name.is_empty() && bytes.is_empty() {
                    continue;
                }
                match media::image_extension(&file_name) {
                    Some(ext) if !bytes.is_empty() => image = Some(ImageUpload { ext, bytes }),
                    _ => field_errors
                        .entry("image".to_string())
                        .or_default()
                        .push("Upload a valid image (png, jpg, jpeg, gif or webp).".to_string()),
                }
            }
            _ => {}
        }
    }

    if let Err(errors) = form.validate() {
        for (field, messages) in collect_field_errors(&errors) {
            field_errors.entry(field).or_default().extend(messages);
        }
    }
    if !field_errors.is_empty() {
        tracing::error!(fields = ?field_errors.keys().collect::<Vec<_>>(), "Invalid post form");
        return Err(HttpError::form(field_errors));
    }

    Ok((form, image))
}

async fn store_image(
    app_state: &AppState,
    upload: Option<ImageUpload>,
) -> Result<Option<String>, HttpError> {
    let Some(upload) = upload else {
        return Ok(None);
    };
    let path = media::save_image(&app_state.env.media_root, &upload.ext, &upload.bytes)
        .await
        .map_err(|e| {
            tracing::error!("Failed to store image: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;
    Ok(Some(path))
}

async fn discard_image(app_state: &AppState, image: Option<&str>) {
    if let Some(path) = image {
        if let Err(e) = media::remove_image(&app_state.env.media_root, path).await {
            tracing::warn!(%path, "Failed to remove image: {}", e);
        }
    }
}

fn post_write_error(e: sqlx::Error) -> HttpError {
    match e {
        sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
            tracing::error!("DB error, unknown category or location: {}", db_err);
            HttpError::bad_request(ErrorMessage::UnknownCategoryOrLocation.to_string())
        }
        e => db_error("writing post")(e),
    }
}

/// Create a post authored by the logged in user, then go to their profile
#[instrument(skip(app_state, current, multipart), fields(username = %current.user.username))]
pub async fn create_post(
    State(app_state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpError> {
    let (form, upload) = read_post_form(multipart).await?;
    let input = form
        .into_input()
        .ok_or_else(|| HttpError::bad_request(ErrorMessage::InvalidForm.to_string()))?;

    let image = store_image(&app_state, upload).await?;

    match app_state
        .db_client
        .create_post(current.user.id, &input, image.as_deref())
        .await
    {
        Ok(post) => {
            tracing::info!(post_id = post.id, "create_post successful");
            Ok(Redirect::to(&profile_url(&current.user.username)))
        }
        Err(e) => {
            discard_image(&app_state, image.as_deref()).await;
            Err(post_write_error(e))
        }
    }
}

#[instrument(skip(app_state, viewer))]
pub async fn edit_post_form(
    Path(post_id): Path<i64>,
    State(app_state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
) -> Result<Response, HttpError> {
    let post = app_state
        .db_client
        .get_post(post_id)
        .await
        .map_err(db_error("getting post"))?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::PostNotFound.to_string()))?;

    if !access::is_author(viewer.id(), &post) {
        tracing::info!("edit_post_form by non-author, redirecting to detail");
        return Ok(Redirect::to(&post_url(post_id)).into_response());
    }

    let page = form_page(&app_state, PostFormDto::from_post(&post)).await?;
    Ok(Json(page).into_response())
}

/// Update a post. Anyone but the author is sent back to the detail page
/// and the post is left untouched.
#[instrument(skip(app_state, viewer, multipart))]
pub async fn edit_post(
    Path(post_id): Path<i64>,
    State(app_state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, HttpError> {
    let post = app_state
        .db_client
        .get_post(post_id)
        .await
        .map_err(db_error("getting post"))?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::PostNotFound.to_string()))?;

    let author_id = match viewer.id() {
        Some(id) if access::is_author(Some(id), &post) => id,
        _ => {
            tracing::info!("edit_post by non-author, redirecting to detail");
            return Ok(Redirect::to(&post_url(post_id)).into_response());
        }
    };

    // the body is only looked at once the caller is known to be the author
    let multipart = multipart.map_err(|rejection| {
        tracing::error!("Invalid edit_post body: {}", rejection.body_text());
        HttpError::new(rejection.body_text(), rejection.status())
    })?;

    let (form, upload) = read_post_form(multipart).await?;
    let input = form
        .into_input()
        .ok_or_else(|| HttpError::bad_request(ErrorMessage::InvalidForm.to_string()))?;

    let image = store_image(&app_state, upload).await?;

    match app_state
        .db_client
        .edit_post(author_id, post_id, &input, image.as_deref())
        .await
    {
        Ok(_) => {
            // the new upload replaced the old file
            if image.is_some() {
                discard_image(&app_state, post.image.as_deref()).await;
            }
            tracing::info!("edit_post successful");
            Ok(Redirect::to(&post_url(post_id)).into_response())
        }
        Err(e) => {
            discard_image(&app_state, image.as_deref()).await;
            Err(post_write_error(e))
        }
    }
}

/// Delete confirmation page; another user's post does not exist here
#[instrument(skip(app_state, current), fields(username = %current.user.username))]
pub async fn delete_post_form(
    Path(post_id): Path<i64>,
    State(app_state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, HttpError> {
    let post = app_state
        .db_client
        .get_author_post(current.user.id, post_id)
        .await
        .map_err(db_error("getting post"))?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::PostNotFound.to_string()))?;

    Ok(Json(PostDeletePageDto {
        status: "success".to_string(),
        post,
    }))
}

/// Delete one of the caller's posts (comments cascade), then go to their profile
#[instrument(skip(app_state, current), fields(username = %current.user.username))]
pub async fn delete_post(
    Path(post_id): Path<i64>,
    State(app_state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, HttpError> {
    let image = match app_state.db_client.delete_post(current.user.id, post_id).await {
        Ok(image) => image,
        Err(sqlx::Error::RowNotFound) => {
            return Err(HttpError::not_found(ErrorMessage::PostNotFound.to_string()));
        }
        Err(e) => return Err(db_error("deleting post")(e)),
    };

    discard_image(&app_state, image.as_deref()).await;

    tracing::info!("delete_post successful");
    Ok(Redirect::to(&profile_url(&current.user.username)))
}
