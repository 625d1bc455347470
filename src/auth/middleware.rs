use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
    Extension,
};

use crate::auth::permissions::Permissions;
use crate::auth::tokens::{self, Scope};
use crate::errors::ApiError;
use crate::state::AppState;
use crate::users::repo::{User, UserStoreError};
use crate::validator::Validator;

/// The caller's identity for the lifetime of one request. Anonymous is a
/// real state, not a missing value.
#[derive(Debug, Clone)]
pub enum CurrentUser {
    Anonymous,
    Known(User),
}

impl CurrentUser {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, CurrentUser::Anonymous)
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            CurrentUser::Anonymous => None,
            CurrentUser::Known(user) => Some(user),
        }
    }
}

/// Pulls the resolved user out of the request extensions. Routes behind the
/// gates always have one; a missing value is treated as anonymous, never a
/// crash.
pub fn known_user(current: Option<Extension<CurrentUser>>) -> Result<User, ApiError> {
    current
        .and_then(|Extension(c)| c.user().cloned())
        .ok_or(ApiError::AuthenticationRequired)
}

/// The header must be exactly two space-separated parts with the first
/// literally "Bearer". Anything else is malformed, never anonymous.
fn bearer_token(value: &str) -> Option<&str> {
    let parts: Vec<&str> = value.split(' ').collect();
    match parts.as_slice() {
        ["Bearer", token] if !token.is_empty() => Some(token),
        _ => None,
    }
}

/// Resolves the caller's identity and attaches it to the request. A missing
/// header means anonymous; a malformed header or unresolvable token is
/// terminal.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let current = match req.headers().get(header::AUTHORIZATION) {
        None => Some(CurrentUser::Anonymous),
        Some(value) => match value.to_str().ok().and_then(bearer_token) {
            None => None,
            Some(token) => {
                let mut v = Validator::new();
                tokens::validate_plaintext(&mut v, token);
                if !v.is_valid() {
                    None
                } else {
                    match User::get_for_token(&state.db, Scope::Authentication, token).await {
                        Ok(user) => Some(CurrentUser::Known(user)),
                        Err(UserStoreError::NotFound) => None,
                        Err(e) => {
                            let mut response = ApiError::Internal(e.into()).into_response();
                            vary_authorization(&mut response);
                            return response;
                        }
                    }
                }
            }
        },
    };

    let mut response = match current {
        Some(current) => {
            req.extensions_mut().insert(current);
            next.run(req).await
        }
        None => ApiError::InvalidAuthenticationToken.into_response(),
    };
    vary_authorization(&mut response);
    response
}

fn vary_authorization(response: &mut Response) {
    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
}

/// Gate: rejects anonymous callers.
pub async fn require_authenticated(
    current: Option<Extension<CurrentUser>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    match current.map(|Extension(c)| c) {
        Some(current) if !current.is_anonymous() => Ok(next.run(req).await),
        _ => Err(ApiError::AuthenticationRequired),
    }
}

/// Gate: implies authenticated, then rejects unactivated accounts.
pub async fn require_activated(
    current: Option<Extension<CurrentUser>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    match current.map(|Extension(c)| c) {
        Some(CurrentUser::Known(user)) if user.activated => Ok(next.run(req).await),
        Some(CurrentUser::Known(_)) => Err(ApiError::InactiveAccount),
        _ => Err(ApiError::AuthenticationRequired),
    }
}

/// Gate: implies activated, then requires the capability code. The check
/// short-circuits at the earliest failing precondition so each failure mode
/// gets its own response.
pub async fn require_permission(
    State(state): State<AppState>,
    current: Option<Extension<CurrentUser>>,
    req: Request,
    next: Next,
    code: &'static str,
) -> Result<Response, ApiError> {
    let user = match current.map(|Extension(c)| c) {
        Some(CurrentUser::Known(user)) if user.activated => user,
        Some(CurrentUser::Known(_)) => return Err(ApiError::InactiveAccount),
        _ => return Err(ApiError::AuthenticationRequired),
    };

    let permissions = Permissions::for_user(&state.db, user.id)
        .await
        .map_err(ApiError::Internal)?;
    if !permissions.includes(code) {
        return Err(ApiError::NotPermitted);
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_bearer_header() {
        assert_eq!(bearer_token("Bearer ABC123"), Some("ABC123"));
    }

    #[test]
    fn wrong_scheme_is_malformed_not_anonymous() {
        assert_eq!(bearer_token("Token abc123"), None);
        assert_eq!(bearer_token("bearer abc123"), None);
    }

    #[test]
    fn wrong_part_count_is_malformed() {
        assert_eq!(bearer_token("Bearer"), None);
        assert_eq!(bearer_token("Bearer a b"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token(""), None);
    }

    #[test]
    fn anonymous_has_no_user() {
        assert!(CurrentUser::Anonymous.is_anonymous());
        assert!(CurrentUser::Anonymous.user().is_none());
    }
}
