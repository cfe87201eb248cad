use std::collections::HashMap;

use super::DBClient;
use crate::dtos::CommentDto;
use crate::models::Comment;
use uuid::Uuid;

const COMMENT_DTO_SELECT: &str = r#"
    SELECT cm.id, cm.text, cm.post_id, cm.author_id, u.username AS author_username, cm.created_at
    FROM comment cm
    INNER JOIN users u ON cm.author_id = u.id
"#;

/// Comment database operations trait
pub trait CommentExt {
    /// All comments of a post, oldest first
    async fn get_post_comments(&self, post_id: i64) -> Result<Vec<CommentDto>, sqlx::Error>;

    async fn get_comment(&self, comment_id: i64) -> Result<Option<CommentDto>, sqlx::Error>;

    async fn create_comment(
        &self,
        author_id: Uuid,
        post_id: i64,
        text: &str,
    ) -> Result<Comment, sqlx::Error>;

    /// Update comment text (user must own the comment)
    async fn edit_comment(
        &self,
        author_id: Uuid,
        comment_id: i64,
        text: &str,
    ) -> Result<Comment, sqlx::Error>;

    /// Delete comment (user must own the comment)
    async fn delete_comment(&self, author_id: Uuid, comment_id: i64) -> Result<(), sqlx::Error>;

    /// Number of comments per post, in one grouped query.
    /// Posts without comments are absent from the map.
    async fn get_comment_counts(&self, post_ids: &[i64]) -> Result<HashMap<i64, i64>, sqlx::Error>;
}

impl CommentExt for DBClient {
    async fn get_post_comments(&self, post_id: i64) -> Result<Vec<CommentDto>, sqlx::Error> {
        let query = format!(
            "{} WHERE cm.post_id = $1 ORDER BY cm.created_at ASC, cm.id ASC",
            COMMENT_DTO_SELECT
        );

        let comments = sqlx::query_as::<_, CommentDto>(&query)
            .bind(post_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(comments)
    }

    async fn get_comment(&self, comment_id: i64) -> Result<Option<CommentDto>, sqlx::Error> {
        let query = format!("{} WHERE cm.id = $1", COMMENT_DTO_SELECT);

        let comment = sqlx::query_as::<_, CommentDto>(&query)
            .bind(comment_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(comment)
    }

    async fn create_comment(
        &self,
        author_id: Uuid,
        post_id: i64,
        text: &str,
    ) -> Result<Comment, sqlx::Error> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO comment (text, post_id, author_id)
            VALUES ($1, $2, $3)
            RETURNING id, text, post_id, author_id, created_at
            "#,
        )
        .bind(text)
        .bind(post_id)
        .bind(author_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(comment)
    }

    async fn edit_comment(
        &self,
        author_id: Uuid,
        comment_id: i64,
        text: &str,
    ) -> Result<Comment, sqlx::Error> {
        // created_at is never touched
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            UPDATE comment
            SET text = $1
            WHERE id = $2 AND author_id = $3
            RETURNING id, text, post_id, author_id, created_at
            "#,
        )
        .bind(text)
        .bind(comment_id)
        .bind(author_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(comment)
    }

    async fn delete_comment(&self, author_id: Uuid, comment_id: i64) -> Result<(), sqlx::Error> {
        let result = sqlx::query("DELETE FROM comment WHERE id = $1 AND author_id = $2")
            .bind(comment_id)
            .bind(author_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }

    async fn get_comment_counts(&self, post_ids: &[i64]) -> Result<HashMap<i64, i64>, sqlx::Error> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT post_id, COUNT(*)
            FROM comment
            WHERE post_id = ANY($1)
            GROUP BY post_id
            "#,
        )
        .bind(post_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures;
    use chrono::Utc;
    use sqlx::PgPool;

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn counts_are_grouped_per_post(pool: PgPool) {
        let author = fixtures::user(&pool, "leo").await;
        let first = fixtures::post(&pool, author, "first", None, true, Utc::now()).await;
        let second = fixtures::post(&pool, author, "second", None, true, Utc::now()).await;
        let db = DBClient::new(pool);

        for text in ["a", "b", "c"] {
            db.create_comment(author, first, text).await.unwrap();
        }

        let counts = db.get_comment_counts(&[first, second]).await.unwrap();
        assert_eq!(counts.get(&first), Some(&3));
        assert_eq!(counts.get(&second), None);
        assert!(db.get_comment_counts(&[]).await.unwrap().is_empty());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn comments_are_chronological_and_owner_scoped(pool: PgPool) {
        let author = fixtures::user(&pool, "leo").await;
        let other = fixtures::user(&pool, "anna").await;
        let post_id = fixtures::post(&pool, author, "p", None, true, Utc::now()).await;
        let db = DBClient::new(pool);

        let first = db.create_comment(other, post_id, "first").await.unwrap();
        db.create_comment(author, post_id, "second").await.unwrap();

        let comments = db.get_post_comments(post_id).await.unwrap();
        let texts: Vec<&str> = comments.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
        assert_eq!(comments[0].author_username, "anna");

        assert!(db.edit_comment(author, first.id, "hijack").await.is_err());
        let edited = db.edit_comment(other, first.id, "edited").await.unwrap();
        assert_eq!(edited.created_at, first.created_at);

        assert!(matches!(
            db.delete_comment(author, first.id).await,
            Err(sqlx::Error::RowNotFound)
        ));
        db.delete_comment(other, first.id).await.unwrap();
        assert!(db.get_comment(first.id).await.unwrap().is_none());
    }
}
