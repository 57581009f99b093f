//! Visitor session lookup from the auth cookie.

use axum::http::{HeaderMap, header::COOKIE};
use tracing::debug;

use crate::application::content::{ContentApi, Credentials};
use crate::application::session::Session;

pub const AUTH_COOKIE: &str = "pd_auth_key";

/// Resolve the visitor behind the request. Any lookup failure means anonymous.
pub async fn load_session(content: &dyn ContentApi, headers: &HeaderMap) -> Session {
    let Some(key) = auth_key(headers) else {
        return Session::anonymous();
    };

    match content.user_info(&Credentials::with_key(key.clone())).await {
        Ok(user) => Session::authenticated(key, user),
        Err(err) => {
            debug!(
                target = "filedeck::http::session",
                error = %err,
                "session lookup failed, continuing anonymously"
            );
            Session::anonymous()
        }
    }
}

fn auth_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == AUTH_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}
