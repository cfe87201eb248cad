use axum::{
    Json, Router,
    http::Uri,
    response::IntoResponse,
    routing::get,
};

use crate::{
    AppState,
    dtos::StaticPageDto,
    error::{ErrorMessage, HttpError},
};

/// Static pages nested under /pages
pub fn pages_handler() -> Router<AppState> {
    Router::new()
        .route("/about/", get(about))
        .route("/rules/", get(rules))
}

fn static_page(page: &str, title: &str) -> Json<StaticPageDto> {
    Json(StaticPageDto {
        status: "success".to_string(),
        page: page.to_string(),
        title: title.to_string(),
    })
}

pub async fn about() -> impl IntoResponse {
    static_page("about", "About the project")
}

pub async fn rules() -> impl IntoResponse {
    static_page("rules", "Our rules")
}

/// Router fallback: any unknown path renders the 404 page
pub async fn page_not_found(uri: Uri) -> HttpError {
    tracing::debug!(%uri, "no route");
    HttpError::not_found(ErrorMessage::PageNotFound.to_string())
}
