pub mod auth;
pub mod category;
pub mod comment;
pub mod pages;
pub mod post;
pub mod users;

use crate::error::{ErrorMessage, HttpError};

/// Log a database failure and answer with the generic 500 page
pub(crate) fn db_error(action: &'static str) -> impl Fn(sqlx::Error) -> HttpError {
    move |e| {
        tracing::error!("DB error, {}: {}", action, e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    }
}

pub(crate) fn post_url(post_id: i64) -> String {
    format!("/posts/{}/", post_id)
}

pub(crate) fn profile_url(username: &str) -> String {
    format!("/profile/{}/", username)
}
