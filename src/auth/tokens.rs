use data_encoding::BASE32_NOPAD;
use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::validator::Validator;

/// Token plaintexts are 16 random bytes base32-encoded without padding,
/// which is always exactly this many characters.
pub const PLAINTEXT_LEN: usize = 26;

/// Namespace for a token's purpose. A token minted for one scope can never
/// resolve under another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Activation,
    Authentication,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Activation => "activation",
            Scope::Authentication => "authentication",
        }
    }
}

/// An issued token. `plaintext` is shown to the caller exactly once; only
/// the sha-256 digest is ever persisted.
#[derive(Debug, Serialize)]
pub struct Token {
    #[serde(rename = "token")]
    pub plaintext: String,
    #[serde(skip_serializing)]
    pub hash: Vec<u8>,
    #[serde(skip_serializing)]
    pub user_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub expiry: OffsetDateTime,
    #[serde(skip_serializing)]
    pub scope: Scope,
}

pub fn digest(plaintext: &str) -> Vec<u8> {
    Sha256::digest(plaintext.as_bytes()).to_vec()
}

impl Token {
    fn generate(user_id: Uuid, ttl: Duration, scope: Scope) -> Self {
        let mut random_bytes = [0u8; 16];
        rand::rngs::OsRng.fill_bytes(&mut random_bytes);
        let plaintext = BASE32_NOPAD.encode(&random_bytes);
        let hash = digest(&plaintext);
        Token {
            plaintext,
            hash,
            user_id,
            expiry: OffsetDateTime::now_utc() + ttl,
            scope,
        }
    }

    /// Mints and persists a token, returning the one-time plaintext to the
    /// caller.
    pub async fn new(
        db: &sqlx::PgPool,
        user_id: Uuid,
        ttl: Duration,
        scope: Scope,
    ) -> anyhow::Result<Token> {
        let token = Token::generate(user_id, ttl, scope);
        sqlx::query(
            r#"
            INSERT INTO tokens (hash, user_id, expiry, scope)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&token.hash)
        .bind(token.user_id)
        .bind(token.expiry)
        .bind(token.scope.as_str())
        .execute(db)
        .await?;
        Ok(token)
    }

    /// Bulk invalidation: deletes every token for the user under the given
    /// scope. Used after activation and after a password change.
    pub async fn delete_all_for_user<'e, E>(
        executor: E,
        scope: Scope,
        user_id: Uuid,
    ) -> anyhow::Result<()>
    where
        E: sqlx::PgExecutor<'e>,
    {
        sqlx::query(
            r#"
            DELETE FROM tokens
            WHERE scope = $1 AND user_id = $2
            "#,
        )
        .bind(scope.as_str())
        .bind(user_id)
        .execute(executor)
        .await?;
        Ok(())
    }
}

/// Cheap shape check run before any lookup.
pub fn validate_plaintext(v: &mut Validator, plaintext: &str) {
    v.check(!plaintext.is_empty(), "token", "must be provided");
    v.check(
        plaintext.len() == PLAINTEXT_LEN,
        "token",
        "must be 26 bytes long",
    );
}
