use sqlx::PgPool;
use uuid::Uuid;

pub const RECORDS_READ: &str = "records:read";
pub const RECORDS_WRITE: &str = "records:write";

/// The set of capability codes held by a user at query time. Always a fresh
/// read; no caching, no hierarchy.
#[derive(Debug, Default)]
pub struct Permissions(Vec<String>);

impl Permissions {
    pub fn includes(&self, code: &str) -> bool {
        self.0.iter().any(|c| c == code)
    }

    pub async fn for_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Permissions> {
        let codes = sqlx::query_scalar::<_, String>(
            r#"
            SELECT permissions.code
            FROM permissions
            INNER JOIN users_permissions ON users_permissions.permission_id = permissions.id
            WHERE users_permissions.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(db)
        .await?;
        Ok(Permissions(codes))
    }

    /// Idempotently associates each code with the user; duplicate grants are
    /// a no-op.
    pub async fn grant(db: &PgPool, user_id: Uuid, codes: &[&str]) -> anyhow::Result<()> {
        let codes: Vec<String> = codes.iter().map(|c| c.to_string()).collect();
        sqlx::query(
            r#"
            INSERT INTO users_permissions (user_id, permission_id)
            SELECT $1, permissions.id FROM permissions WHERE permissions.code = ANY($2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(&codes)
        .execute(db)
        .await?;
        Ok(())
    }
}
