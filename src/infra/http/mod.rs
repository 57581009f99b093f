mod account;
mod middleware;
mod session;
mod viewer;

pub use session::{AUTH_COOKIE, load_session};

use std::sync::Arc;

use axum::{
    Router,
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::get,
};

use crate::application::{account::AccountService, content::ContentApi, viewer::ViewerService};

use self::middleware::{log_responses, set_request_context};

#[derive(Clone)]
pub struct HttpState {
    pub viewer: ViewerService,
    pub accounts: AccountService,
    /// Used to resolve the session cookie of each request.
    pub content: Arc<dyn ContentApi>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/u/{ids}", get(viewer::view_files))
        .route("/l/{id}", get(viewer::view_list))
        .route("/s/{id}", get(viewer::view_remote))
        .route(
            "/user/settings",
            get(account::settings).post(account::settings),
        )
        .route("/user/confirm_email", get(account::confirm_email))
        .route(
            "/user/link_patreon",
            get(account::link_patreon).post(account::link_patreon),
        )
        .route(
            "/user/link_subscription",
            get(account::link_subscription).post(account::link_subscription),
        )
        .route("/_health", get(health))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

async fn health() -> Response {
    StatusCode::NO_CONTENT.into_response()
}
