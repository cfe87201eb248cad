use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use super::DBClient;
use crate::dtos::{PostInput, PostRow};
use crate::models::Post;

/// Post joined with everything a page shows about it
const POST_ROW_SELECT: &str = r#"
    SELECT p.id, p.title, p.text, p.pub_date, p.is_published, p.image, p.created_at,
           p.author_id, u.username AS author_username,
           p.category_id, c.title AS category_title, c.slug AS category_slug,
           c.is_published AS category_is_published,
           p.location_id, l.name AS location_name
    FROM post p
    INNER JOIN users u ON p.author_id = u.id
    LEFT JOIN category c ON p.category_id = c.id
    LEFT JOIN location l ON p.location_id = l.id
"#;

const POST_RETURNING: &str = r#"
    RETURNING id, title, text, pub_date, is_published, image,
        author_id, category_id, location_id, created_at
"#;

/// Conditions shared by the listing query and its count query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostFilter {
    pub author_id: Option<Uuid>,
    pub category_id: Option<i64>,
    /// Keep only posts publicly visible at this instant
    pub visible_at: Option<DateTime<Utc>>,
}

impl PostFilter {
    pub fn visible_at(now: DateTime<Utc>) -> Self {
        PostFilter {
            visible_at: Some(now),
            ..Default::default()
        }
    }

    /// Everything, regardless of publish state
    pub fn all() -> Self {
        PostFilter::default()
    }

    pub fn category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn author(mut self, author_id: Uuid) -> Self {
        self.author_id = Some(author_id);
        self
    }

    /// Appends the WHERE clause; expects `post p` and `category c` in scope.
    /// `c.is_published = TRUE` is false for a missing (NULL) category.
    fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" WHERE TRUE");
        if let Some(author_id) = self.author_id {
            qb.push(" AND p.author_id = ").push_bind(author_id);
        }
        if let Some(category_id) = self.category_id {
            qb.push(" AND p.category_id = ").push_bind(category_id);
        }
        if let Some(now) = self.visible_at {
            qb.push(" AND p.is_published = TRUE AND c.is_published = TRUE AND p.pub_date <= ")
                .push_bind(now);
        }
    }
}

pub trait PostExt {
    async fn get_posts(
        &self,
        filter: &PostFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PostRow>, sqlx::Error>;

    async fn count_posts(&self, filter: &PostFilter) -> Result<i64, sqlx::Error>;

    async fn get_post(&self, post_id: i64) -> Result<Option<PostRow>, sqlx::Error>;

    /// Only finds posts written by `author_id`
    async fn get_author_post(
        &self,
        author_id: Uuid,
        post_id: i64,
    ) -> Result<Option<PostRow>, sqlx::Error>;

    async fn create_post(
        &self,
        author_id: Uuid,
        input: &PostInput,
        image: Option<&str>,
    ) -> Result<Post, sqlx::Error>;

    /// `image: None` keeps the stored image
    async fn edit_post(
        &self,
        author_id: Uuid,
        post_id: i64,
        input: &PostInput,
        image: Option<&str>,
    ) -> Result<Post, sqlx::Error>;

    /// Deletes the post (comments cascade) and returns its image path
    async fn delete_post(
        &self,
        author_id: Uuid,
        post_id: i64,
    ) -> Result<Option<String>, sqlx::Error>;
}

impl PostExt for DBClient {
    async fn get_posts(
        &self,
        filter: &PostFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PostRow>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new(POST_ROW_SELECT);
        filter.push_where(&mut qb);
        qb.push(" ORDER BY p.pub_date DESC, p.title ASC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let posts = qb.build_query_as::<PostRow>().fetch_all(&self.pool).await?;

        Ok(posts)
    }

    async fn count_posts(&self, filter: &PostFilter) -> Result<i64, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(p.id) FROM post p LEFT JOIN category c ON p.category_id = c.id",
        );
        filter.push_where(&mut qb);

        let count = qb.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        Ok(count)
    }

    async fn get_post(&self, post_id: i64) -> Result<Option<PostRow>, sqlx::Error> {
        let query = format!("{} WHERE p.id = $1", POST_ROW_SELECT);

        let post = sqlx::query_as::<_, PostRow>(&query)
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(post)
    }

    async fn get_author_post(
        &self,
        author_id: Uuid,
        post_id: i64,
    ) -> Result<Option<PostRow>, sqlx::Error> {
        let query = format!("{} WHERE p.id = $1 AND p.author_id = $2", POST_ROW_SELECT);

        let post = sqlx::query_as::<_, PostRow>(&query)
            .bind(post_id)
            .bind(author_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(post)
    }

    async fn create_post(
        &self,
        author_id: Uuid,
        input: &PostInput,
        image: Option<&str>,
    ) -> Result<Post, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO post
                (title, text, pub_date, is_published, category_id, location_id, image, author_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            {}
            "#,
            POST_RETURNING
        );

        let post = sqlx::query_as::<_, Post>(&query)
            .bind(&input.title)
            .bind(&input.text)
            .bind(input.pub_date)
            .bind(input.is_published)
            .bind(input.category_id)
            .bind(input.location_id)
            .bind(image)
            .bind(author_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(post)
    }

    async fn edit_post(
        &self,
        author_id: Uuid,
        post_id: i64,
        input: &PostInput,
        image: Option<&str>,
    ) -> Result<Post, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE post
            SET title = $1, text = $2, pub_date = $3, is_published = $4,
                category_id = $5, location_id = $6, image = COALESCE($7, image)
            WHERE id = $8 AND author_id = $9
            {}
            "#,
            POST_RETURNING
        );

        // fetch_one: RowNotFound when the post is not the author's
        let post = sqlx::query_as::<_, Post>(&query)
            .bind(&input.title)
            .bind(&input.text)
            .bind(input.pub_date)
            .bind(input.is_published)
            .bind(input.category_id)
            .bind(input.location_id)
            .bind(image)
            .bind(post_id)
            .bind(author_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(post)
    }

    async fn delete_post(
        &self,
        author_id: Uuid,
        post_id: i64,
    ) -> Result<Option<String>, sqlx::Error> {
        let deleted = sqlx::query_scalar::<_, Option<String>>(
            "DELETE FROM post WHERE id = $1 AND author_id = $2 RETURNING image",
        )
        .bind(post_id)
        .bind(author_id)
        .fetch_optional(&self.pool)
        .await?;

        deleted.ok_or(sqlx::Error::RowNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{CommentExt, fixtures};
    use chrono::Duration;
    use sqlx::PgPool;

    #[test]
    fn filter_builders_compose() {
        let now = Utc::now();
        let author = Uuid::new_v4();
        let filter = PostFilter::visible_at(now).category(3).author(author);

        assert_eq!(filter.visible_at, Some(now));
        assert_eq!(filter.category_id, Some(3));
        assert_eq!(filter.author_id, Some(author));
        assert_eq!(PostFilter::all(), PostFilter::default());
    }

    #[test]
    fn visible_filter_sql() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM post p");
        PostFilter::visible_at(Utc::now())
            .category(1)
            .push_where(&mut qb);

        assert_eq!(
            qb.sql(),
            "SELECT 1 FROM post p WHERE TRUE AND p.category_id = $1 \
             AND p.is_published = TRUE AND c.is_published = TRUE AND p.pub_date <= $2"
        );
    }

    #[test]
    fn unfiltered_sql_has_no_conditions() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM post p");
        PostFilter::all().push_where(&mut qb);
        assert_eq!(qb.sql(), "SELECT 1 FROM post p WHERE TRUE");
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn public_listing_applies_every_condition(pool: PgPool) {
        let now = Utc::now();
        let author = fixtures::user(&pool, "leo").await;
        let open = fixtures::category(&pool, "open", true).await;
        let hidden = fixtures::category(&pool, "hidden", false).await;

        let past = now - Duration::hours(1);
        let future = now + Duration::hours(1);
        let visible = fixtures::post(&pool, author, "visible", Some(open), true, past).await;
        fixtures::post(&pool, author, "draft", Some(open), false, past).await;
        fixtures::post(&pool, author, "hidden category", Some(hidden), true, past).await;
        fixtures::post(&pool, author, "scheduled", Some(open), true, future).await;
        fixtures::post(&pool, author, "no category", None, true, past).await;

        let db = DBClient::new(pool);
        let filter = PostFilter::visible_at(now);
        let posts = db.get_posts(&filter, 10, 0).await.unwrap();

        assert_eq!(posts.iter().map(|p| p.id).collect::<Vec<_>>(), vec![visible]);
        assert_eq!(db.count_posts(&filter).await.unwrap(), 1);
        assert_eq!(db.count_posts(&PostFilter::all().author(author)).await.unwrap(), 5);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn listing_order_is_newest_first_then_title(pool: PgPool) {
        let now = Utc::now() - Duration::days(1);
        let author = fixtures::user(&pool, "leo").await;
        let open = fixtures::category(&pool, "open", true).await;

        let b = fixtures::post(&pool, author, "b", Some(open), true, now).await;
        let a = fixtures::post(&pool, author, "a", Some(open), true, now).await;
        let later = now + Duration::hours(1);
        let newest = fixtures::post(&pool, author, "z", Some(open), true, later).await;

        let db = DBClient::new(pool);
        let posts = db.get_posts(&PostFilter::all(), 10, 0).await.unwrap();
        assert_eq!(posts.iter().map(|p| p.id).collect::<Vec<_>>(), vec![newest, a, b]);

        let second_page = db.get_posts(&PostFilter::all(), 2, 2).await.unwrap();
        assert_eq!(second_page.len(), 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn delete_is_scoped_to_author_and_cascades(pool: PgPool) {
        let now = Utc::now();
        let author = fixtures::user(&pool, "leo").await;
        let other = fixtures::user(&pool, "anna").await;
        let post_id = fixtures::post(&pool, author, "mine", None, true, now).await;

        let db = DBClient::new(pool.clone());
        db.create_comment(other, post_id, "nice").await.unwrap();

        assert!(matches!(
            db.delete_post(other, post_id).await,
            Err(sqlx::Error::RowNotFound)
        ));
        assert!(db.get_author_post(other, post_id).await.unwrap().is_none());

        db.delete_post(author, post_id).await.unwrap();
        let left: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comment")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(left, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn deleting_a_user_removes_their_posts_and_comments(pool: PgPool) {
        let author = fixtures::user(&pool, "leo").await;
        let post_id = fixtures::post(&pool, author, "mine", None, true, Utc::now()).await;
        let db = DBClient::new(pool.clone());
        db.create_comment(author, post_id, "self reply").await.unwrap();

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(author)
            .execute(&pool)
            .await
            .unwrap();

        assert!(db.get_post(post_id).await.unwrap().is_none());
        let left: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comment")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(left, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn edit_keeps_image_unless_replaced(pool: PgPool) {
        let author = fixtures::user(&pool, "leo").await;
        let db = DBClient::new(pool);
        let input = PostInput {
            title: "t".to_string(),
            text: "x".to_string(),
            pub_date: Utc::now(),
            category_id: None,
            location_id: None,
            is_published: true,
        };

        let post = db.create_post(author, &input, Some("posts/a.png")).await.unwrap();
        let edited = db.edit_post(author, post.id, &input, None).await.unwrap();
        assert_eq!(edited.image.as_deref(), Some("posts/a.png"));

        let edited = db.edit_post(author, post.id, &input, Some("posts/b.png")).await.unwrap();
        assert_eq!(edited.image.as_deref(), Some("posts/b.png"));

        let stranger = Uuid::new_v4();
        assert!(db.edit_post(stranger, post.id, &input, None).await.is_err());
    }
}
