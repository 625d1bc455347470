use axum::{routing::post, Router};

use crate::errors;
use crate::state::AppState;

mod dto;
pub mod handlers;
pub mod middleware;
pub mod password;
pub mod permissions;
pub mod tokens;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/v1/tokens/authentication",
        post(handlers::create_authentication_token).fallback(errors::method_not_allowed),
    )
}
