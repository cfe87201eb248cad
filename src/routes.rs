use axum::{Router, middleware, routing::get};
use tower_http::trace::TraceLayer;

use crate::{
    AppState,
    handler::{
        auth::auth_handler,
        category::category_handler,
        comment::comment_handler,
        pages::{page_not_found, pages_handler},
        post::{get_index, post_handler},
        users::users_handler,
    },
    middleware::identify,
};

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(get_index))
        .nest("/posts", post_handler().merge(comment_handler()))
        .nest("/category", category_handler())
        .nest("/profile", users_handler())
        .nest("/auth", auth_handler())
        .nest("/pages", pages_handler())
        .fallback(page_not_found)
        // every route sees a Viewer, anonymous or not
        .layer(middleware::from_fn_with_state(app_state.clone(), identify))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
