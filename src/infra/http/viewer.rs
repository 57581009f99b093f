use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, header::USER_AGENT},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use url::Url;

use crate::application::viewer::{
    DEMO_FILE_ID, ViewerError, ViewerPage, is_downloader, is_legacy_browser,
};
use crate::presentation::views::{
    FileViewerCompatTemplate, FileViewerTemplate, ViewerView, render_file_not_found_response,
    render_list_not_found_response, render_server_error_response, render_template_response,
};

use super::{HttpState, session::load_session};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct ViewerQuery {
    embed: Option<String>,
}

impl ViewerQuery {
    fn embedded(&self) -> bool {
        self.embed.is_some()
    }
}

pub(super) async fn view_files(
    State(state): State<HttpState>,
    Path(ids): Path<String>,
    Query(query): Query<ViewerQuery>,
    headers: HeaderMap,
) -> Response {
    let agent = user_agent(&headers);
    if ids != DEMO_FILE_ID && is_downloader(agent) {
        if let Some(target) = api_path(&["api", "file", ids.as_str()]) {
            return Redirect::to(&target).into_response();
        }
    }

    let session = load_session(state.content.as_ref(), &headers).await;
    let result = state
        .viewer
        .resolve_files(&session, &ids, query.embedded())
        .await;
    render_viewer(result, agent)
}

pub(super) async fn view_list(
    State(state): State<HttpState>,
    Path(id): Path<String>,
    Query(query): Query<ViewerQuery>,
    headers: HeaderMap,
) -> Response {
    let agent = user_agent(&headers);
    if is_downloader(agent) {
        if let Some(target) = api_path(&["api", "list", id.as_str(), "zip"]) {
            return Redirect::to(&target).into_response();
        }
    }

    let session = load_session(state.content.as_ref(), &headers).await;
    let result = state
        .viewer
        .resolve_list(&session, &id, query.embedded())
        .await;
    render_viewer(result, agent)
}

pub(super) async fn view_remote(
    State(state): State<HttpState>,
    Path(id): Path<String>,
    Query(query): Query<ViewerQuery>,
    headers: HeaderMap,
) -> Response {
    let agent = user_agent(&headers);
    if is_downloader(agent) {
        return Redirect::to(&state.viewer.remote_download_url(&id)).into_response();
    }

    let result = state.viewer.resolve_remote(&id, query.embedded()).await;
    render_viewer(result, agent)
}

/// Path ids arrive percent-decoded; encode them again before they go into a
/// `Location` header.
fn api_path(segments: &[&str]) -> Option<String> {
    let mut url = Url::parse("http://localhost/").ok()?;
    url.path_segments_mut().ok()?.clear().extend(segments);
    Some(url.path().to_string())
}

fn user_agent(headers: &HeaderMap) -> &str {
    headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

fn render_viewer(result: Result<ViewerPage, ViewerError>, agent: &str) -> Response {
    let page = match result {
        Ok(page) => page,
        Err(ViewerError::FileNotFound) => return render_file_not_found_response(),
        Err(ViewerError::ListNotFound) => return render_list_not_found_response(),
        Err(err @ ViewerError::Upstream(_)) => {
            return render_server_error_response("infra::http::viewer", &err);
        }
    };

    let view = match ViewerView::from_page(&page) {
        Ok(view) => view,
        Err(err) => return render_server_error_response("infra::http::viewer::serialize", &err),
    };

    if is_legacy_browser(agent) {
        render_template_response(FileViewerCompatTemplate { view }, page.status)
    } else {
        render_template_response(FileViewerTemplate { view }, page.status)
    }
}
