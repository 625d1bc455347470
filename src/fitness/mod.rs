use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    routing::{get, patch, post},
    Extension, Router,
};

use crate::auth::middleware::{require_permission, CurrentUser};
use crate::auth::permissions::{RECORDS_READ, RECORDS_WRITE};
use crate::errors;
use crate::state::AppState;

mod dto;
pub mod handlers;
pub mod repo;

pub fn router(state: AppState) -> Router<AppState> {
    let reads = Router::new()
        .route("/v1/fitness", get(handlers::list))
        .route("/v1/fitness/:id", get(handlers::show))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            |state: State<AppState>,
             current: Option<Extension<CurrentUser>>,
             req: Request,
             next: Next| require_permission(state, current, req, next, RECORDS_READ),
        ));

    // The method fallback lives on one side only; merging combines each
    // path's method routers and a route_layer never wraps the fallback, so
    // an unsupported method gets a plain 405 instead of a gate response.
    let writes = Router::new()
        .route(
            "/v1/fitness",
            post(handlers::create).fallback(errors::method_not_allowed),
        )
        .route(
            "/v1/fitness/:id",
            patch(handlers::update)
                .delete(handlers::delete)
                .fallback(errors::method_not_allowed),
        )
        .route_layer(middleware::from_fn_with_state(
            state,
            |state: State<AppState>,
             current: Option<Extension<CurrentUser>>,
             req: Request,
             next: Next| require_permission(state, current, req, next, RECORDS_WRITE),
        ));

    reads.merge(writes)
}
