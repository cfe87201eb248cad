use super::DBClient;
use crate::models::{Category, Location};

/// Read access to categories and locations (both are managed out of band)
pub trait CategoryExt {
    /// Published category by slug; unpublished ones are treated as missing
    async fn get_published_category(&self, slug: &str) -> Result<Option<Category>, sqlx::Error>;

    /// Choices for the post form
    async fn get_categories(&self) -> Result<Vec<Category>, sqlx::Error>;

    async fn get_locations(&self) -> Result<Vec<Location>, sqlx::Error>;
}

impl CategoryExt for DBClient {
    async fn get_published_category(&self, slug: &str) -> Result<Option<Category>, sqlx::Error> {
        let category = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, title, description, slug, is_published, created_at
            FROM category
            WHERE slug = $1 AND is_published = TRUE
            "#,
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(category)
    }

    async fn get_categories(&self) -> Result<Vec<Category>, sqlx::Error> {
        let categories = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, title, description, slug, is_published, created_at
            FROM category
            ORDER BY title
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    async fn get_locations(&self) -> Result<Vec<Location>, sqlx::Error> {
        let locations = sqlx::query_as::<_, Location>(
            "SELECT id, name, is_published, created_at FROM location ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(locations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures;
    use sqlx::PgPool;

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn unpublished_category_is_not_found(pool: PgPool) {
        fixtures::category(&pool, "travel", false).await;
        fixtures::category(&pool, "food", true).await;
        let db = DBClient::new(pool);

        assert!(db.get_published_category("travel").await.unwrap().is_none());
        assert!(db.get_published_category("food").await.unwrap().is_some());
        assert!(db.get_published_category("missing").await.unwrap().is_none());
        assert_eq!(db.get_categories().await.unwrap().len(), 2);
    }
}
