use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use validator::ValidationErrors;

/// Field name -> messages, as reported back to the submitter of a form
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Error page sent to clients
///
/// Every error status renders the same shape; `page` names the dedicated
/// error page ("403", "404", "500", ...).
///
/// Example:
/// ```
/// {
///   "status": "fail",
///   "page": "404",
///   "message": "Post not found"
/// }
/// ```
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub page: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => write!(f, "{}", s),
            Err(_) => Err(fmt::Error),
        }
    }
}

/// Enumeration of the error conditions handlers report
///
/// PartialEq allows comparing error variants (useful in tests)
#[derive(Debug, PartialEq)]
pub enum ErrorMessage {
    // Password errors
    EmptyPassword,
    ExceededMaxPasswordLength(usize),
    InvalidHashFormat,
    HashingError,

    // Authentication errors
    InvalidToken,
    WrongCredentials,

    // Authorization errors
    PermissionDenied,

    // Lookups
    PostNotFound,
    CategoryNotFound,
    CommentNotFound,
    UserNotFound,
    PageNotFound,

    // Form errors
    UsernameTaken,
    UnknownCategoryOrLocation,
    InvalidForm,

    //Else
    ServerError,
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            ErrorMessage::EmptyPassword => "Password cannot be empty".to_string(),
            ErrorMessage::HashingError => "Error while hashing password".to_string(),
            ErrorMessage::InvalidHashFormat => "Invalid password hash format".to_string(),
            ErrorMessage::ExceededMaxPasswordLength(max_length) => {
                format!("Password must not be more than {} characters", max_length)
            }
            ErrorMessage::InvalidToken => "Token is invalid or expired".to_string(),
            ErrorMessage::WrongCredentials => "Username or password is wrong".to_string(),
            ErrorMessage::PermissionDenied => {
                "You are not allowed to perform this action".to_string()
            }
            ErrorMessage::PostNotFound => "Post not found".to_string(),
            ErrorMessage::CategoryNotFound => "Category not found".to_string(),
            ErrorMessage::CommentNotFound => "Comment not found".to_string(),
            ErrorMessage::UserNotFound => "User not found".to_string(),
            ErrorMessage::PageNotFound => "Page not found".to_string(),
            ErrorMessage::UsernameTaken => "A user with that username already exists".to_string(),
            ErrorMessage::UnknownCategoryOrLocation => {
                "Selected category or location does not exist".to_string()
            }
            ErrorMessage::InvalidForm => "Please correct the errors below".to_string(),
            ErrorMessage::ServerError => "Server Error. Please try again later".to_string(),
        };
        write!(f, "{}", message)
    }
}

/// Internal HTTP error type used throughout the application
///
/// Handlers return `Result<T, HttpError>`; axum turns the error into the
/// matching error page through `IntoResponse`.
#[derive(Debug, Clone)]
pub struct HttpError {
    pub message: String,
    pub status: StatusCode,
    pub errors: Option<FieldErrors>,
}

impl HttpError {
    pub fn new(message: impl Into<String>, status: StatusCode) -> Self {
        HttpError {
            message: message.into(),
            status,
            errors: None,
        }
    }

    /// 500. Use for database and IO failures; log the cause, don't send it.
    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// 400 for malformed input that is not tied to a form field
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::BAD_REQUEST)
    }

    /// 400 carrying field-level messages so the form can be shown again
    pub fn validation(errors: &ValidationErrors) -> Self {
        Self::form(collect_field_errors(errors))
    }

    /// 400 from an already collected field -> messages map
    pub fn form(errors: FieldErrors) -> Self {
        HttpError {
            message: ErrorMessage::InvalidForm.to_string(),
            status: StatusCode::BAD_REQUEST,
            errors: Some(errors),
        }
    }

    /// 409 for unique constraint violations (duplicate username, ...)
    pub fn unique_constraint_violation(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::CONFLICT)
    }

    /// 401. Despite the name, this means "unauthenticated".
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::UNAUTHORIZED)
    }

    /// 403: authenticated, but not the owner of the resource
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::FORBIDDEN)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::NOT_FOUND)
    }

    pub fn into_http_response(self) -> Response {
        let json_response = Json(ErrorResponse {
            status: "fail".to_string(),
            page: self.status.as_str().to_string(),
            message: self.message,
            errors: self.errors,
        });

        (self.status, json_response).into_response()
    }
}

/// Flatten `validator` output to field -> messages (the code when no message is set)
pub fn collect_field_errors(errors: &ValidationErrors) -> FieldErrors {
    let mut fields = FieldErrors::new();
    for (field, errs) in errors.field_errors() {
        let messages = errs
            .iter()
            .map(|e| match &e.message {
                Some(message) => message.to_string(),
                None => e.code.to_string(),
            })
            .collect();
        fields.insert(field.to_string(), messages);
    }
    fields
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HttpError: message: {}, status: {}",
            self.message, self.status
        )
    }
}

impl std::error::Error for HttpError {}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        self.into_http_response()
    }
}
