use axum::{
    extract::{OriginalUri, Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use url::form_urlencoded;
use uuid::Uuid;

use crate::{
    AppState,
    db::UserExt,
    error::{ErrorMessage, HttpError},
    models::User,
    utils::token,
};

/// Identity of whoever sent the request; anonymous when `user` is None.
///
/// Inserted into the request extensions by [`identify`] for every route and
/// passed explicitly to handlers that care about the viewer:
/// ```
/// async fn handler(Extension(viewer): Extension<Viewer>) { /* viewer.id() */ }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Viewer {
    pub user: Option<User>,
}

impl Viewer {
    pub fn anonymous() -> Self {
        Viewer { user: None }
    }

    pub fn id(&self) -> Option<Uuid> {
        self.user.as_ref().map(|u| u.id)
    }
}

/// Authenticated identity, present only behind [`require_auth`]
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
}

/// Session token from the `access_token` cookie, else `Authorization: Bearer`
fn extract_token(cookie_jar: &CookieJar, req: &Request) -> Option<String> {
    cookie_jar
        .get(token::ACCESS_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .or_else(|| {
            req.headers()
                .get(header::AUTHORIZATION)
                .and_then(|auth_header| auth_header.to_str().ok())
                .and_then(|auth_value| auth_value.strip_prefix("Bearer "))
                .map(str::to_owned)
        })
        .filter(|t| !t.is_empty())
}

/// Resolve the viewer for every request
///
/// A missing, invalid or expired token, or a token whose user was deleted,
/// yields an anonymous viewer rather than an error; pages decide what an
/// anonymous viewer may see.
pub async fn identify(
    cookie_jar: CookieJar,
    State(app_state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, HttpError> {
    let mut viewer = Viewer::anonymous();

    let user_id = extract_token(&cookie_jar, &req)
        .and_then(|t| token::decode_token(t, app_state.env.jwt_secret.as_bytes()).ok())
        .and_then(|sub| Uuid::parse_str(&sub).ok());

    if let Some(user_id) = user_id {
        viewer.user = app_state
            .db_client
            .get_user(Some(user_id), None)
            .await
            .map_err(|e| {
                tracing::error!("DB error, resolving viewer: {}", e);
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            })?;
        if viewer.user.is_none() {
            tracing::debug!(%user_id, "token for a deleted user, treating as anonymous");
        }
    }

    req.extensions_mut().insert(viewer);

    Ok(next.run(req).await)
}

/// Login URL that returns to `path` afterwards
pub fn login_url(path: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("next", path)
        .finish();
    format!("/auth/login/?{}", query)
}

/// Login-required routes: anonymous viewers are redirected to the login
/// page, everybody else gets a [`CurrentUser`] extension.
pub async fn require_auth(mut req: Request, next: Next) -> Response {
    let user = req
        .extensions()
        .get::<Viewer>()
        .and_then(|viewer| viewer.user.clone());

    match user {
        Some(user) => {
            req.extensions_mut().insert(CurrentUser { user });
            next.run(req).await
        }
        None => {
            // nested routers see the URI without their prefix
            let uri = req
                .extensions()
                .get::<OriginalUri>()
                .map(|original| &original.0)
                .unwrap_or_else(|| req.uri());
            let path = uri
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_else(|| "/".to_string());
            tracing::debug!(%path, "anonymous request to login-required route");
            Redirect::to(&login_url(&path)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;

    #[test]
    fn login_url_encodes_next() {
        assert_eq!(
            login_url("/posts/1/edit/?a=b"),
            "/auth/login/?next=%2Fposts%2F1%2Fedit%2F%3Fa%3Db"
        );
    }

    #[test]
    fn token_comes_from_cookie_before_header() {
        let req = HttpRequest::builder()
            .header(header::COOKIE, "access_token=from-cookie")
            .header(header::AUTHORIZATION, "Bearer from-header")
            .body(Body::empty())
            .unwrap();
        let jar = CookieJar::from_headers(req.headers());
        assert_eq!(extract_token(&jar, &req).as_deref(), Some("from-cookie"));

        let req = HttpRequest::builder()
            .header(header::AUTHORIZATION, "Bearer from-header")
            .body(Body::empty())
            .unwrap();
        let jar = CookieJar::from_headers(req.headers());
        assert_eq!(extract_token(&jar, &req).as_deref(), Some("from-header"));

        let req = HttpRequest::builder()
            .header(header::AUTHORIZATION, "Basic abc")
            .body(Body::empty())
            .unwrap();
        let jar = CookieJar::from_headers(req.headers());
        assert_eq!(extract_token(&jar, &req), None);
    }
}
