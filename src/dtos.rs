use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::access::{Authored, PublishState};
use crate::models::{Category, Location, User};
use crate::utils::forms;

// DTOs (Data Transfer Objects) define the structure of data exchanged with clients.
// Page DTOs carry exactly the context a template for that page receives.

/// Posts per page on every post listing
pub const POSTS_PER_PAGE: i64 = 10;

// ============================================================================
// Authentication DTOs
// ============================================================================

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct RegisterUserDto {
    #[validate(
        length(min = 1, max = 150, message = "Username is required"),
        custom(function = "forms::validate_username")
    )]
    pub username: String,

    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Email is invalid")
    )]
    pub email: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,

    #[validate(
        length(min = 1, message = "Confirm Password is required"),
        must_match(other = "password", message = "passwords do not match")
    )]
    pub password_confirm: String,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct LoginUserDto {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,

    /// Where to go after a successful login; only local paths are honored
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginQueryDto {
    pub next: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginPageDto {
    pub status: String,
    pub next: String,
}

// ============================================================================
// Pagination
// ============================================================================

#[derive(Serialize, Deserialize, Validate, Debug, Default)]
pub struct PageQueryDto {
    #[validate(range(min = 1, message = "Page must be greater than 0"))]
    pub page: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PaginationDto {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    #[serde(rename = "totalPages")]
    pub total_pages: i64,
}

impl PaginationDto {
    /// An empty listing still has one (empty) page.
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        let total_pages = ((total + limit - 1) / limit).max(1);
        PaginationDto {
            page,
            limit,
            total,
            total_pages,
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }

    pub fn is_out_of_range(&self) -> bool {
        self.page > self.total_pages
    }
}

// ============================================================================
// User DTOs
// ============================================================================

/// Public part of a user, shown on profile pages (no email, no password)
#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileDto {
    pub username: String,
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    #[serde(rename = "dateJoined")]
    pub date_joined: DateTime<Utc>,
}

impl ProfileDto {
    pub fn filter_user(user: &User) -> Self {
        ProfileDto {
            username: user.username.to_owned(),
            first_name: user.first_name.to_owned(),
            last_name: user.last_name.to_owned(),
            date_joined: user.created_at,
        }
    }
}

/// Profile edit form. Always applied to the logged in user.
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct ProfileFormDto {
    #[validate(
        length(min = 1, max = 150, message = "Username is required"),
        custom(function = "forms::validate_username")
    )]
    pub username: String,

    #[validate(length(max = 150))]
    #[serde(default)]
    pub first_name: String,

    #[validate(length(max = 150))]
    #[serde(default)]
    pub last_name: String,

    #[validate(email(message = "Email is invalid"))]
    pub email: String,
}

impl ProfileFormDto {
    pub fn from_user(user: &User) -> Self {
        ProfileFormDto {
            username: user.username.to_owned(),
            first_name: user.first_name.to_owned(),
            last_name: user.last_name.to_owned(),
            email: user.email.to_owned(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfilePageDto {
    pub status: String,
    pub profile: ProfileDto,
    #[serde(rename = "isOwner")]
    pub is_owner: bool,
    pub data: Vec<PostCardDto>,
    pub pagination: PaginationDto,
}

#[derive(Debug, Serialize)]
pub struct ProfileFormPageDto {
    pub status: String,
    pub form: ProfileFormDto,
}

// ============================================================================
// Post DTOs
// ============================================================================

/// Post creation/update form, as submitted (multipart)
///
/// `author` is deliberately absent: it always comes from the session.
#[derive(Debug, Default, Clone, Serialize, Deserialize, Validate)]
pub struct PostFormDto {
    #[validate(length(min = 1, max = 256, message = "Title is required (up to 256 characters)."))]
    pub title: String,

    #[validate(length(min = 1, message = "Text is required."))]
    pub text: String,

    #[validate(custom(function = "forms::validate_pub_date"))]
    pub pub_date: String,

    pub category: Option<i64>,
    pub location: Option<i64>,
    pub is_published: bool,
}

/// Validated post fields ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct PostInput {
    pub title: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub category_id: Option<i64>,
    pub location_id: Option<i64>,
    pub is_published: bool,
}

impl PostFormDto {
    /// Call after `validate()`; `None` only if `pub_date` did not parse.
    pub fn into_input(self) -> Option<PostInput> {
        let pub_date = forms::parse_pub_date(&self.pub_date)?;
        Some(PostInput {
            title: self.title,
            text: self.text,
            pub_date,
            category_id: self.category,
            location_id: self.location,
            is_published: self.is_published,
        })
    }

    pub fn from_post(post: &PostRow) -> Self {
        PostFormDto {
            title: post.title.to_owned(),
            text: post.text.to_owned(),
            pub_date: forms::format_pub_date(post.pub_date),
            category: post.category_id,
            location: post.location_id,
            is_published: post.is_published,
        }
    }
}

/// A post joined with its author, category and location
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PostRow {
    pub id: i64,
    pub title: String,
    pub text: String,
    #[serde(rename = "pubDate")]
    pub pub_date: DateTime<Utc>,
    #[serde(rename = "isPublished")]
    pub is_published: bool,
    pub image: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub author_id: Uuid,
    #[serde(rename = "authorUsername")]
    pub author_username: String,
    #[serde(rename = "categoryId")]
    pub category_id: Option<i64>,
    #[serde(rename = "categoryTitle")]
    pub category_title: Option<String>,
    #[serde(rename = "categorySlug")]
    pub category_slug: Option<String>,
    #[serde(skip_serializing)]
    pub category_is_published: Option<bool>,
    #[serde(rename = "locationId")]
    pub location_id: Option<i64>,
    #[serde(rename = "locationName")]
    pub location_name: Option<String>,
}

impl PostRow {
    pub fn publish_state(&self) -> PublishState {
        PublishState {
            is_published: self.is_published,
            category_is_published: self.category_is_published,
            pub_date: self.pub_date,
        }
    }
}

impl Authored for PostRow {
    fn author_id(&self) -> Uuid {
        self.author_id
    }
}

/// Listing entry: a post plus the number of comments on it
#[derive(Debug, Serialize)]
pub struct PostCardDto {
    #[serde(flatten)]
    pub post: PostRow,
    #[serde(rename = "commentCount")]
    pub comment_count: i64,
}

impl PostCardDto {
    /// Pair each post with its count from a grouped `COUNT(*)`;
    /// posts without comments have no entry and get 0.
    pub fn with_counts(posts: Vec<PostRow>, counts: &HashMap<i64, i64>) -> Vec<PostCardDto> {
        posts
            .into_iter()
            .map(|post| {
                let comment_count = counts.get(&post.id).copied().unwrap_or(0).max(0);
                PostCardDto {
                    post,
                    comment_count,
                }
            })
            .collect()
    }
}

#[derive(Debug, Serialize)]
pub struct PostListPageDto {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    pub data: Vec<PostCardDto>,
    pub pagination: PaginationDto,
}

#[derive(Debug, Serialize)]
pub struct PostDetailPageDto {
    pub status: String,
    pub post: PostRow,
    pub comments: Vec<CommentDto>,
    pub form: CommentFormDto,
}

/// Create/edit form page: current values plus the selectable choices
#[derive(Debug, Serialize)]
pub struct PostFormPageDto {
    pub status: String,
    pub form: PostFormDto,
    pub categories: Vec<Category>,
    pub locations: Vec<Location>,
}

#[derive(Debug, Serialize)]
pub struct PostDeletePageDto {
    pub status: String,
    pub post: PostRow,
}

// ============================================================================
// Comment DTOs
// ============================================================================

#[derive(Debug, Default, Clone, Serialize, Deserialize, Validate)]
pub struct CommentFormDto {
    #[serde(default)]
    #[validate(length(min = 1, message = "Comment text is required."))]
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CommentDto {
    pub id: i64,
    pub text: String,
    #[serde(rename = "postId")]
    pub post_id: i64,
    #[serde(skip_serializing)]
    pub author_id: Uuid,
    #[serde(rename = "authorUsername")]
    pub author_username: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Authored for CommentDto {
    fn author_id(&self) -> Uuid {
        self.author_id
    }
}

#[derive(Debug, Serialize)]
pub struct CommentPageDto {
    pub status: String,
    pub comment: CommentDto,
    pub form: CommentFormDto,
}

// ============================================================================
// Static pages
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct StaticPageDto {
    pub status: String,
    pub page: String,
    pub title: String,
}
