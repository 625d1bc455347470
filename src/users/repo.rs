use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::tokens::{self, Scope};

/// Distinct, expected failure modes of the user store. Callers translate
/// `DuplicateEmail` and `EditConflict` into specific client responses.
#[derive(Debug, thiserror::Error)]
pub enum UserStoreError {
    #[error("a user with this email address already exists")]
    DuplicateEmail,
    #[error("edit conflict")]
    EditConflict,
    #[error("record not found")]
    NotFound,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub activated: bool,
    #[serde(skip_serializing)]
    pub version: i32,
}

impl User {
    /// Inserts a new user; the unique index on email surfaces as
    /// `DuplicateEmail`.
    pub async fn insert(
        db: &PgPool,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, UserStoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password_hash, activated)
            VALUES ($1, $2, $3, false)
            RETURNING id, created_at, name, email, password_hash, activated, version
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .fetch_one(db)
        .await
        .map_err(classify_constraint_error)?;
        Ok(user)
    }

    pub async fn get_by_email(db: &PgPool, email: &str) -> Result<Option<User>, UserStoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, created_at, name, email, password_hash, activated, version
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Optimistic-concurrency update: succeeds only if the stored version
    /// still matches the one this copy was loaded with, then bumps it.
    pub async fn update<'e, E>(&mut self, executor: E) -> Result<(), UserStoreError>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let row = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE users
            SET name = $1, email = $2, password_hash = $3, activated = $4, version = version + 1
            WHERE id = $5 AND version = $6
            RETURNING version
            "#,
        )
        .bind(&self.name)
        .bind(&self.email)
        .bind(&self.password_hash)
        .bind(self.activated)
        .bind(self.id)
        .bind(self.version)
        .fetch_optional(executor)
        .await
        .map_err(classify_constraint_error)?;

        match row {
            Some(version) => {
                self.version = version;
                Ok(())
            }
            None => Err(UserStoreError::EditConflict),
        }
    }

    /// Resolves a token plaintext to its owning user. Wrong scope, expired
    /// and unknown digests are one indistinguishable `NotFound`.
    pub async fn get_for_token(
        db: &PgPool,
        scope: Scope,
        plaintext: &str,
    ) -> Result<User, UserStoreError> {
        let hash = tokens::digest(plaintext);
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT users.id, users.created_at, users.name, users.email,
                   users.password_hash, users.activated, users.version
            FROM users
            INNER JOIN tokens ON tokens.user_id = users.id
            WHERE tokens.hash = $1 AND tokens.scope = $2 AND tokens.expiry > now()
            "#,
        )
        .bind(&hash)
        .bind(scope.as_str())
        .fetch_optional(db)
        .await?;
        user.ok_or(UserStoreError::NotFound)
    }
}

/// Default boundary mapping; handlers that owe the client a more specific
/// response (e.g. duplicate email as a field error) match explicitly instead.
impl From<UserStoreError> for crate::errors::ApiError {
    fn from(err: UserStoreError) -> Self {
        match err {
            UserStoreError::DuplicateEmail => {
                crate::errors::ApiError::field("email", "a user with this email address already exists")
            }
            UserStoreError::EditConflict => crate::errors::ApiError::EditConflict,
            UserStoreError::NotFound => crate::errors::ApiError::NotFound,
            UserStoreError::Database(e) => crate::errors::ApiError::Internal(e.into()),
        }
    }
}

fn classify_constraint_error(err: sqlx::Error) -> UserStoreError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.code().as_deref() == Some("23505")
            && db_err.constraint() == Some("users_email_key")
        {
            return UserStoreError::DuplicateEmail;
        }
    }
    UserStoreError::Database(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::tokens::Token;
    use time::Duration;

    async fn seed_user(pool: &PgPool, email: &str) -> User {
        User::insert(pool, "Alice", email, "$argon2id$stub")
            .await
            .unwrap()
    }

    #[sqlx::test]
    async fn second_insert_with_same_email_is_rejected(pool: PgPool) {
        seed_user(&pool, "alice@example.com").await;
        let err = User::insert(&pool, "Other", "alice@example.com", "$argon2id$stub")
            .await
            .unwrap_err();
        assert!(matches!(err, UserStoreError::DuplicateEmail));
    }

    #[sqlx::test]
    async fn stale_update_yields_one_edit_conflict(pool: PgPool) {
        let original = seed_user(&pool, "alice@example.com").await;

        let mut first = original.clone();
        first.name = "First Writer".to_string();
        first.update(&pool).await.unwrap();
        assert_eq!(first.version, original.version + 1);

        let mut second = original.clone();
        second.name = "Second Writer".to_string();
        let err = second.update(&pool).await.unwrap_err();
        assert!(matches!(err, UserStoreError::EditConflict));

        // The losing write left no trace: one bump, first writer's values.
        let stored = User::get_by_email(&pool, "alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.version, original.version + 1);
        assert_eq!(stored.name, "First Writer");
    }

    #[sqlx::test]
    async fn token_resolves_its_owner_under_its_scope_only(pool: PgPool) {
        let user = seed_user(&pool, "alice@example.com").await;
        let token = Token::new(&pool, user.id, Duration::days(1), Scope::Activation)
            .await
            .unwrap();

        let found = User::get_for_token(&pool, Scope::Activation, &token.plaintext)
            .await
            .unwrap();
        assert_eq!(found.id, user.id);

        let err = User::get_for_token(&pool, Scope::Authentication, &token.plaintext)
            .await
            .unwrap_err();
        assert!(matches!(err, UserStoreError::NotFound));
    }

    #[sqlx::test]
    async fn past_expiry_token_does_not_resolve(pool: PgPool) {
        let user = seed_user(&pool, "alice@example.com").await;
        let token = Token::new(&pool, user.id, Duration::seconds(-1), Scope::Authentication)
            .await
            .unwrap();

        let err = User::get_for_token(&pool, Scope::Authentication, &token.plaintext)
            .await
            .unwrap_err();
        assert!(matches!(err, UserStoreError::NotFound));
    }

    #[test]
    fn serialized_user_hides_credentials_and_version() {
        let user = User {
            id: Uuid::new_v4(),
            created_at: OffsetDateTime::now_utc(),
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "$argon2id$...".to_string(),
            activated: false,
            version: 1,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("version").is_none());
        assert_eq!(json.get("email").unwrap(), "alice@example.com");
        assert_eq!(json.get("activated").unwrap(), false);
    }
}
