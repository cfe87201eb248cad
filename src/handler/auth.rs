use crate::{
    AppState,
    db::UserExt,
    dtos::{LoginPageDto, LoginQueryDto, LoginUserDto, RegisterUserDto},
    error::{ErrorMessage, HttpError},
    utils::{forms, password, token},
};
use axum::{
    Form, Json, Router,
    extract::{Query, State},
    response::{IntoResponse, Redirect},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use validator::Validate;

use tracing::instrument;

/// Routes nested under /auth
pub fn auth_handler() -> Router<AppState> {
    Router::new()
        .route("/registration/", post(register))
        .route("/login/", get(login_page).post(login))
        .route("/logout/", post(logout))
}

/// Create an account, then send the new user to the login page
#[instrument(skip(app_state, body), fields(username = %body.username, email = %body.email))]
pub async fn register(
    State(app_state): State<AppState>,
    Form(body): Form<RegisterUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid register input: {}", e);
        HttpError::validation(&e)
    })?;

    let hash_password = password::hash(&body.password).map_err(|e| {
        tracing::error!("Password hashing error: {}", e);
        match e {
            ErrorMessage::HashingError => HttpError::server_error(e.to_string()),
            _ => HttpError::bad_request(e.to_string()),
        }
    })?;

    let result = app_state
        .db_client
        .save_user(&body.username, &body.email, &hash_password)
        .await;

    match result {
        Ok(_user) => {
            tracing::info!(username = %body.username, "Register Successful");
            Ok(Redirect::to("/auth/login/"))
        }
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            tracing::error!("DB error, saving user, unique_violation: {}", db_err);
            Err(HttpError::unique_constraint_violation(
                ErrorMessage::UsernameTaken.to_string(),
            ))
        }
        Err(e) => {
            tracing::error!("DB error, saving user: {}", e);
            Err(HttpError::server_error(
                ErrorMessage::ServerError.to_string(),
            ))
        }
    }
}

/// Login form context; `next` is carried through to the POST
pub async fn login_page(Query(query): Query<LoginQueryDto>) -> impl IntoResponse {
    Json(LoginPageDto {
        status: "success".to_string(),
        next: forms::safe_next(query.next.as_deref()).to_string(),
    })
}

/// Check credentials, set the session cookie and go to `next`
///
/// `next` is read from the form first, then from the query string.
/// Unknown user and wrong password give the same answer.
#[instrument(skip(app_state, jar, query, body), fields(username = %body.username))]
pub async fn login(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<LoginQueryDto>,
    Form(body): Form<LoginUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid login input: {}", e);
        HttpError::validation(&e)
    })?;

    let user = app_state
        .db_client
        .get_user(None, Some(&body.username))
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting user: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| {
            tracing::info!("Login failed, unknown username");
            HttpError::unauthorized(ErrorMessage::WrongCredentials.to_string())
        })?;

    let password_matched = password::compare(&body.password, &user.password).map_err(|e| {
        tracing::error!("Password error: {}", e);
        HttpError::unauthorized(ErrorMessage::WrongCredentials.to_string())
    })?;

    if !password_matched {
        tracing::info!("Login failed, wrong password");
        return Err(HttpError::unauthorized(
            ErrorMessage::WrongCredentials.to_string(),
        ));
    }

    let access_token = token::create_token(
        &user.id.to_string(),
        app_state.env.jwt_secret.as_bytes(),
        app_state.env.jwt_maxage,
    )
    .map_err(|e| {
        tracing::error!("Access token creation error: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    let access_cookie = Cookie::build((token::ACCESS_COOKIE, access_token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(!cfg!(debug_assertions))
        .max_age(time::Duration::seconds(app_state.env.jwt_maxage))
        .build();

    let next = forms::safe_next(body.next.as_deref().or(query.next.as_deref())).to_string();

    tracing::info!(user_id = %user.id, "Login Successful");
    Ok((jar.add(access_cookie), Redirect::to(&next)))
}

/// Drop the session cookie
#[instrument(skip(jar))]
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    tracing::info!("Logout");
    (
        jar.remove(Cookie::build(token::ACCESS_COOKIE).path("/")),
        Redirect::to("/"),
    )
}
