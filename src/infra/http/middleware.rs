use std::time::Instant;

use axum::{
    body::Body,
    http::{Request, StatusCode, header::LOCATION},
    middleware::Next,
    response::Response,
};
use metrics::counter;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

/// Which part of the site a request path belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteArea {
    /// `/u`, `/l` and `/s` pages.
    Viewer,
    /// `/user/...` forms.
    Account,
    Health,
    Other,
}

impl RouteArea {
    pub fn of(path: &str) -> Self {
        match path.trim_start_matches('/').split('/').next() {
            Some("u" | "l" | "s") => Self::Viewer,
            Some("user") => Self::Account,
            Some("_health") => Self::Health,
            _ => Self::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Account => "account",
            Self::Health => "health",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub area: RouteArea,
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let ctx = RequestContext {
        request_id: Uuid::new_v4().to_string(),
        area: RouteArea::of(request.uri().path()),
    };
    let span = info_span!(
        "request",
        request_id = %ctx.request_id,
        area = ctx.area.as_str(),
    );
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).instrument(span).await;
    response.extensions_mut().insert(ctx);
    response
}

fn status_class(status: StatusCode) -> &'static str {
    match status.as_u16() {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        _ => "5xx",
    }
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let area = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.area)
        .unwrap_or_else(|| RouteArea::of(&path));
    let start = Instant::now();

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = start.elapsed().as_millis() as u64;

    counter!(
        "filedeck_http_responses_total",
        "area" => area.as_str(),
        "class" => status_class(status),
    )
    .increment(1);

    if status.is_redirection() {
        let target = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        debug!(
            target = "filedeck::http::response",
            status = status.as_u16(),
            area = area.as_str(),
            path = %path,
            location = target,
            "redirected"
        );
        return response;
    }

    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    let report = response.extensions_mut().remove::<ErrorReport>();
    let (source, messages) = match report {
        Some(report) => (report.source, report.messages),
        None => ("unknown", Vec::new()),
    };
    let detail = messages.first().map(String::as_str).unwrap_or_default();

    if status == StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS {
        info!(
            target = "filedeck::http::response",
            area = area.as_str(),
            path = %path,
            "content withheld after takedown"
        );
    } else if status == StatusCode::NOT_FOUND && area == RouteArea::Viewer {
        debug!(
            target = "filedeck::http::response",
            path = %path,
            source = source,
            "viewer content not found"
        );
    } else if status.is_server_error() {
        error!(
            target = "filedeck::http::response",
            status = status.as_u16(),
            method = %method,
            area = area.as_str(),
            path = %path,
            elapsed_ms,
            source = source,
            detail = detail,
            chain = ?messages,
            "request failed"
        );
    } else {
        warn!(
            target = "filedeck::http::response",
            status = status.as_u16(),
            method = %method,
            area = area.as_str(),
            path = %path,
            source = source,
            detail = detail,
            "client request error"
        );
    }

    response
}
