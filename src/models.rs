use chrono::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User model representing the users table
///
/// `password` holds the argon2 PHC string and is never serialized.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Thematic grouping of posts, addressed by its slug
///
/// Categories are managed out of band; handlers only read them.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Category {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub slug: String,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Location {
    pub id: i64,
    pub name: String,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

/// Post model representing the post table
///
/// `pub_date` may lie in the future for scheduled publication.
/// `image` is a path relative to the media root (e.g. `posts/<uuid>.png`).
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub is_published: bool,
    pub image: Option<String>,
    pub author_id: Uuid,
    pub category_id: Option<i64>,
    pub location_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Comment model
///
/// - One post can have many comments
/// - One user can write many comments
///
/// Both foreign keys cascade on delete. `created_at` is set by the database
/// at insert time and never rewritten.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Comment {
    pub id: i64,
    pub text: String,
    pub post_id: i64,
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,
}
