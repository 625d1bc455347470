use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::auth::middleware::{require_activated, require_authenticated};
use crate::errors;
use crate::state::AppState;

mod dto;
pub mod handlers;
pub mod repo;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/users",
            post(handlers::register).fallback(errors::method_not_allowed),
        )
        .route(
            "/v1/users/activated",
            put(handlers::activate).fallback(errors::method_not_allowed),
        )
        .merge(
            Router::new()
                .route(
                    "/v1/users/me",
                    get(handlers::me).fallback(errors::method_not_allowed),
                )
                .route_layer(middleware::from_fn(require_authenticated)),
        )
        .merge(
            Router::new()
                .route(
                    "/v1/users/password",
                    put(handlers::change_password).fallback(errors::method_not_allowed),
                )
                .route_layer(middleware::from_fn(require_activated)),
        )
}
