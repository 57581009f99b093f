use axum::{
    extract::{Query, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use bytes::Bytes;
use metrics::counter;
use serde::Deserialize;

use crate::application::session::Session;
use crate::domain::forms::{Form, FormState, Submission};
use crate::presentation::views::{
    EmailConfirmTemplate, FormPageTemplate, UserSettingsTemplate, render_template_response,
};

use super::{HttpState, session::load_session};

const LOGIN_PATH: &str = "/login";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct KeyQuery {
    key: Option<String>,
}

pub(super) async fn settings(
    State(state): State<HttpState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let session = match authenticated_session(&state, &headers).await {
        Ok(session) => session,
        Err(redirect) => return redirect,
    };

    let submission = Submission::from_urlencoded(method == Method::POST, &body);
    let forms = state.accounts.settings_forms(&session, &submission).await;
    let forms = vec![forms.password, forms.email, forms.username];
    record_submissions(&forms);

    let username = session
        .user
        .as_ref()
        .map(|user| user.username.clone())
        .unwrap_or_default();
    let template = UserSettingsTemplate {
        title: format!("Account settings ~ {}", state.accounts.options().service_name),
        username,
        forms,
    };
    render_template_response(template, StatusCode::OK)
}

pub(super) async fn confirm_email(
    State(state): State<HttpState>,
    Query(query): Query<KeyQuery>,
) -> Response {
    let status = state
        .accounts
        .confirm_email(query.key.as_deref().unwrap_or_default())
        .await;
    let template = EmailConfirmTemplate {
        title: format!("E-mail confirmation ~ {}", state.accounts.options().service_name),
        status: status.as_str(),
    };
    render_template_response(template, StatusCode::OK)
}

pub(super) async fn link_patreon(
    State(state): State<HttpState>,
    Query(query): Query<KeyQuery>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let session = match authenticated_session(&state, &headers).await {
        Ok(session) => session,
        Err(redirect) => return redirect,
    };

    let submission = Submission::from_urlencoded(method == Method::POST, &body);
    let form = state
        .accounts
        .patreon_link_form(&session, query.key.as_deref(), &submission)
        .await;
    render_form_page(&state, form)
}

pub(super) async fn link_subscription(
    State(state): State<HttpState>,
    Query(query): Query<KeyQuery>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let session = match authenticated_session(&state, &headers).await {
        Ok(session) => session,
        Err(redirect) => return redirect,
    };

    let submission = Submission::from_urlencoded(method == Method::POST, &body);
    let form = state
        .accounts
        .subscription_link_form(&session, query.key.as_deref(), &submission)
        .await;
    render_form_page(&state, form)
}

/// Account pages are only shown to logged in visitors; others go to the login page.
async fn authenticated_session(state: &HttpState, headers: &HeaderMap) -> Result<Session, Response> {
    let session = load_session(state.content.as_ref(), headers).await;
    if session.is_authenticated() {
        Ok(session)
    } else {
        Err(Redirect::to(LOGIN_PATH).into_response())
    }
}

fn render_form_page(state: &HttpState, form: Form) -> Response {
    record_submissions(std::slice::from_ref(&form));
    let template = FormPageTemplate {
        title: format!("{} ~ {}", form.title, state.accounts.options().service_name),
        form,
    };
    render_template_response(template, StatusCode::OK)
}

fn record_submissions(forms: &[Form]) {
    for form in forms {
        let outcome = match form.state() {
            FormState::Unsubmitted => continue,
            FormState::Submitted => "submitted",
            FormState::Succeeded => "succeeded",
            FormState::Failed => "failed",
        };
        counter!(
            "filedeck_form_submissions_total",
            "form" => form.name.clone(),
            "outcome" => outcome
        )
        .increment(1);
    }
}
