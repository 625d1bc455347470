use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use time::Duration;
use tracing::{info, instrument, warn};

use crate::auth::dto::CreateTokenRequest;
use crate::auth::password::verify_password;
use crate::auth::tokens::{Scope, Token};
use crate::errors::ApiError;
use crate::request::JsonBody;
use crate::state::AppState;
use crate::users::repo::User;
use crate::validator::{validate_email, validate_password_plaintext, Validator};

const AUTHENTICATION_TOKEN_TTL: Duration = Duration::days(1);

/// POST /v1/tokens/authentication
///
/// Unknown email and wrong password produce the same response, so callers
/// cannot probe which addresses are registered.
#[instrument(skip(state, payload))]
pub async fn create_authentication_token(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CreateTokenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = payload.email.trim().to_lowercase();

    let mut v = Validator::new();
    validate_email(&mut v, &email);
    validate_password_plaintext(&mut v, &payload.password);
    if !v.is_valid() {
        return Err(ApiError::Validation(v.errors));
    }

    let user = match User::get_by_email(&state.db, &email).await? {
        Some(user) => user,
        None => {
            warn!("authentication attempt for unknown email");
            return Err(ApiError::InvalidCredentials);
        }
    };

    let matches =
        verify_password(&payload.password, &user.password_hash).map_err(ApiError::Internal)?;
    if !matches {
        warn!(user_id = %user.id, "authentication attempt with wrong password");
        return Err(ApiError::InvalidCredentials);
    }

    let token = Token::new(
        &state.db,
        user.id,
        AUTHENTICATION_TOKEN_TTL,
        Scope::Authentication,
    )
    .await
    .map_err(ApiError::Internal)?;

    info!(user_id = %user.id, "authentication token issued");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "authentication_token": token })),
    ))
}
