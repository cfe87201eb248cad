use sqlx::{Pool, Postgres};

mod user;
pub use user::UserExt;

mod post;
pub use post::{PostExt, PostFilter};

mod comment;
pub use comment::CommentExt;

mod category;
pub use category::CategoryExt;

#[derive(Debug, Clone)]
pub struct DBClient {
    pool: Pool<Postgres>,
}

impl DBClient {
    pub fn new(pool: Pool<Postgres>) -> Self {
        DBClient { pool }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Rows for database-backed tests. Categories and locations have no
    //! handlers, so tests create them directly.

    use chrono::{DateTime, Utc};
    use sqlx::PgPool;
    use uuid::Uuid;

    pub async fn user(pool: &PgPool, username: &str) -> Uuid {
        sqlx::query_scalar("INSERT INTO users (username, password) VALUES ($1, 'x') RETURNING id")
            .bind(username)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    pub async fn category(pool: &PgPool, slug: &str, is_published: bool) -> i64 {
        sqlx::query_scalar(
            r#"
            INSERT INTO category (title, description, slug, is_published)
            VALUES ($1, '', $1, $2)
            RETURNING id
            "#,
        )
        .bind(slug)
        .bind(is_published)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    pub async fn post(
        pool: &PgPool,
        author_id: Uuid,
        title: &str,
        category_id: Option<i64>,
        is_published: bool,
        pub_date: DateTime<Utc>,
    ) -> i64 {
        sqlx::query_scalar(
            r#"
            INSERT INTO post (title, text, pub_date, is_published, author_id, category_id)
            VALUES ($1, 'text', $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(title)
        .bind(pub_date)
        .bind(is_published)
        .bind(author_id)
        .bind(category_id)
        .fetch_one(pool)
        .await
        .unwrap()
    }
}
