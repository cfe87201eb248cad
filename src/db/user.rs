use super::DBClient;
use crate::dtos::ProfileFormDto;
use crate::models::User;
use uuid::Uuid;

const USER_COLUMNS: &str =
    "id, username, first_name, last_name, email, password, created_at, updated_at";

/// User database operations trait
pub trait UserExt {
    /// Get single user by ID or username.
    /// Returns Some(user) if found, None if not found
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        username: Option<&str>,
    ) -> Result<Option<User>, sqlx::Error>;

    /// Create new user from registration
    async fn save_user<T: Into<String> + Send>(
        &self,
        username: T,
        email: T,
        password: T,
    ) -> Result<User, sqlx::Error>;

    /// Overwrite the editable profile fields of `user_id`
    async fn update_profile(
        &self,
        user_id: Uuid,
        profile: &ProfileFormDto,
    ) -> Result<User, sqlx::Error>;
}

impl UserExt for DBClient {
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        username: Option<&str>,
    ) -> Result<Option<User>, sqlx::Error> {
        let mut user: Option<User> = None;

        if let Some(user_id) = user_id {
            let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
            user = sqlx::query_as::<_, User>(&query)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        } else if let Some(username) = username {
            let query = format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS);
            user = sqlx::query_as::<_, User>(&query)
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;
        }

        Ok(user)
    }

    async fn save_user<T: Into<String> + Send>(
        &self,
        username: T,
        email: T,
        password: T,
    ) -> Result<User, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (username, email, password) VALUES ($1, $2, $3) RETURNING {}",
            USER_COLUMNS
        );

        let user = sqlx::query_as::<_, User>(&query)
            .bind(username.into())
            .bind(email.into())
            .bind(password.into())
            .fetch_one(&self.pool)
            .await?;

        Ok(user)
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        profile: &ProfileFormDto,
    ) -> Result<User, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE users
            SET username = $1, first_name = $2, last_name = $3, email = $4, updated_at = NOW()
            WHERE id = $5
            RETURNING {}
            "#,
            USER_COLUMNS
        );

        let user = sqlx::query_as::<_, User>(&query)
            .bind(&profile.username)
            .bind(&profile.first_name)
            .bind(&profile.last_name)
            .bind(&profile.email)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn usernames_are_unique(pool: PgPool) {
        let db = DBClient::new(pool);
        let user = db.save_user("leo", "leo@example.com", "hash").await.unwrap();

        let found = db.get_user(None, Some("leo")).await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert!(db.get_user(None, None).await.unwrap().is_none());

        match db.save_user("leo", "other@example.com", "hash").await {
            Err(sqlx::Error::Database(e)) => assert!(e.is_unique_violation()),
            other => panic!("expected unique violation, got {:?}", other.map(|u| u.id)),
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn profile_update_rewrites_fields(pool: PgPool) {
        let db = DBClient::new(pool);
        let user = db.save_user("leo", "leo@example.com", "hash").await.unwrap();

        let form = ProfileFormDto {
            username: "lev".to_string(),
            first_name: "Lev".to_string(),
            last_name: "Tolstoy".to_string(),
            email: "lev@example.com".to_string(),
        };
        let updated = db.update_profile(user.id, &form).await.unwrap();

        assert_eq!(updated.username, "lev");
        assert_eq!(updated.last_name, "Tolstoy");
        assert_eq!(updated.password, "hash");
    }
}
