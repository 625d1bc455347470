use std::collections::HashMap;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use serde_json::json;
use time::Duration;
use tracing::{error, info, instrument};

use crate::auth::middleware::{known_user, CurrentUser};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::permissions::{Permissions, RECORDS_READ};
use crate::auth::tokens::{self, Scope, Token};
use crate::errors::ApiError;
use crate::mailer::USER_WELCOME;
use crate::request::JsonBody;
use crate::state::AppState;
use crate::users::dto::{ActivateRequest, ChangePasswordRequest, RegisterRequest};
use crate::users::repo::{User, UserStoreError};
use crate::validator::{validate_email, validate_password_plaintext, Validator};

const ACTIVATION_TOKEN_TTL: Duration = Duration::days(3);

/// POST /v1/users
///
/// Creates an unactivated account, grants the default read permission and
/// mails out an activation token in the background. Responds 202 before the
/// mail is sent.
#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = payload.name.trim().to_string();
    let email = payload.email.trim().to_lowercase();

    let mut v = Validator::new();
    v.check(!name.is_empty(), "name", "must be provided");
    v.check(
        name.len() <= 500,
        "name",
        "must not be more than 500 bytes long",
    );
    validate_email(&mut v, &email);
    validate_password_plaintext(&mut v, &payload.password);
    if !v.is_valid() {
        return Err(ApiError::Validation(v.errors));
    }

    let password_hash = hash_password(&payload.password).map_err(ApiError::Internal)?;

    let user = match User::insert(&state.db, &name, &email, &password_hash).await {
        Ok(user) => user,
        Err(UserStoreError::DuplicateEmail) => {
            v.add_error("email", "a user with this email address already exists");
            return Err(ApiError::Validation(v.errors));
        }
        Err(e) => return Err(e.into()),
    };

    Permissions::grant(&state.db, user.id, &[RECORDS_READ])
        .await
        .map_err(ApiError::Internal)?;

    let token = Token::new(&state.db, user.id, ACTIVATION_TOKEN_TTL, Scope::Activation)
        .await
        .map_err(ApiError::Internal)?;

    let mailer = state.mailer.clone();
    let recipient = user.email.clone();
    let mut data = HashMap::new();
    data.insert("user_id", user.id.to_string());
    data.insert("activation_token", token.plaintext.clone());
    state.tasks.spawn(async move {
        if let Err(e) = mailer.send(&recipient, &USER_WELCOME, &data).await {
            error!(error = %e, "failed to send welcome email");
        }
    });

    info!(user_id = %user.id, "user registered");
    Ok((StatusCode::ACCEPTED, Json(json!({ "user": user }))))
}

/// PUT /v1/users/activated
///
/// Consumes an activation token: flips the account to activated and deletes
/// the user's activation tokens in one transaction.
#[instrument(skip(state, payload))]
pub async fn activate(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<ActivateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut v = Validator::new();
    tokens::validate_plaintext(&mut v, &payload.token);
    if !v.is_valid() {
        return Err(ApiError::Validation(v.errors));
    }

    let mut user = match User::get_for_token(&state.db, Scope::Activation, &payload.token).await {
        Ok(user) => user,
        Err(UserStoreError::NotFound) => {
            return Err(ApiError::field("token", "invalid or expired activation token"));
        }
        Err(e) => return Err(e.into()),
    };

    user.activated = true;

    let mut tx = state.db.begin().await.map_err(anyhow::Error::from)?;
    user.update(&mut *tx).await?;
    Token::delete_all_for_user(&mut *tx, Scope::Activation, user.id)
        .await
        .map_err(ApiError::Internal)?;
    tx.commit().await.map_err(anyhow::Error::from)?;

    info!(user_id = %user.id, "user activated");
    Ok(Json(json!({ "user": user })))
}

/// GET /v1/users/me (authenticated)
#[instrument(skip(current))]
pub async fn me(
    current: Option<Extension<CurrentUser>>,
) -> Result<impl IntoResponse, ApiError> {
    let user = known_user(current)?;
    Ok(Json(json!({ "user": user })))
}

/// PUT /v1/users/password (activated)
///
/// Rotating the credential cascade-invalidates every outstanding
/// authentication token, so old sessions cannot outlive the old password.
#[instrument(skip(state, current, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    current: Option<Extension<CurrentUser>>,
    JsonBody(payload): JsonBody<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut user = known_user(current)?;

    let mut v = Validator::new();
    v.check(
        !payload.current_password.is_empty(),
        "current_password",
        "must be provided",
    );
    v.check(
        !payload.new_password.is_empty(),
        "new_password",
        "must be provided",
    );
    v.check(
        payload.new_password.len() >= 8,
        "new_password",
        "must be at least 8 bytes long",
    );
    v.check(
        payload.new_password.len() <= 72,
        "new_password",
        "must not be more than 72 bytes long",
    );
    if !v.is_valid() {
        return Err(ApiError::Validation(v.errors));
    }

    let matches = verify_password(&payload.current_password, &user.password_hash)
        .map_err(ApiError::Internal)?;
    if !matches {
        return Err(ApiError::field("current_password", "is incorrect"));
    }

    user.password_hash = hash_password(&payload.new_password).map_err(ApiError::Internal)?;

    let mut tx = state.db.begin().await.map_err(anyhow::Error::from)?;
    user.update(&mut *tx).await?;
    Token::delete_all_for_user(&mut *tx, Scope::Authentication, user.id)
        .await
        .map_err(ApiError::Internal)?;
    tx.commit().await.map_err(anyhow::Error::from)?;

    info!(user_id = %user.id, "password changed, authentication tokens revoked");
    Ok(Json(json!({
        "message": "your password was successfully updated, please authenticate again"
    })))
}
