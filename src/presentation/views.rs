use crate::application::error::{ErrorReport, HttpError};
use crate::application::viewer::ViewerPage;
use crate::domain::forms::Form;
use crate::domain::viewer::OgData;
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use std::error::Error as StdError;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_file_not_found_response() -> Response {
    let mut response = render_template_response(
        FileNotFoundTemplate {
            view: ErrorPageView::file_not_found(),
        },
        StatusCode::NOT_FOUND,
    );
    ErrorReport::from_message(
        "presentation::views::render_file_not_found_response",
        StatusCode::NOT_FOUND,
        "File not found",
    )
    .attach(&mut response);
    response
}

pub fn render_list_not_found_response() -> Response {
    let mut response = render_template_response(
        ListNotFoundTemplate {
            view: ErrorPageView::list_not_found(),
        },
        StatusCode::NOT_FOUND,
    );
    ErrorReport::from_message(
        "presentation::views::render_list_not_found_response",
        StatusCode::NOT_FOUND,
        "List not found",
    )
    .attach(&mut response);
    response
}

/// 500 page. The error chain goes into the report, never into the body.
pub fn render_server_error_response(source: &'static str, error: &dyn StdError) -> Response {
    let mut response = render_template_response(
        ServerErrorTemplate {
            view: ErrorPageView::server_error(),
        },
        StatusCode::INTERNAL_SERVER_ERROR,
    );
    ErrorReport::from_error(source, StatusCode::INTERNAL_SERVER_ERROR, error).attach(&mut response);
    response
}

/// Everything the viewer templates need from a resolved page.
pub struct ViewerView {
    pub title: String,
    pub og: OgData,
    pub embedded: bool,
    /// Serialized viewer data, safe to place inside a `<script>` element.
    pub script_json: String,
}

impl ViewerView {
    pub fn from_page(page: &ViewerPage) -> Result<Self, serde_json::Error> {
        Ok(Self {
            title: page.title.clone(),
            og: page.og.clone(),
            embedded: page.data.embedded,
            script_json: page.data.to_script_json()?,
        })
    }
}

#[derive(Template)]
#[template(path = "file_viewer.html")]
pub struct FileViewerTemplate {
    pub view: ViewerView,
}

/// Reduced viewer for browsers without modern script support.
#[derive(Template)]
#[template(path = "file_viewer_compat.html")]
pub struct FileViewerCompatTemplate {
    pub view: ViewerView,
}

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
}

impl ErrorPageView {
    pub fn file_not_found() -> Self {
        Self {
            title: "File not found".to_string(),
            message: "The file you are looking for does not exist or has been removed."
                .to_string(),
        }
    }

    pub fn list_not_found() -> Self {
        Self {
            title: "List not found".to_string(),
            message: "The list you are looking for does not exist or has been removed."
                .to_string(),
        }
    }

    pub fn server_error() -> Self {
        Self {
            title: "Server error".to_string(),
            message: "Something went wrong while loading this page. Please try again later."
                .to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "file_not_found.html")]
pub struct FileNotFoundTemplate {
    pub view: ErrorPageView,
}

#[derive(Template)]
#[template(path = "list_not_found.html")]
pub struct ListNotFoundTemplate {
    pub view: ErrorPageView,
}

#[derive(Template)]
#[template(path = "server_error.html")]
pub struct ServerErrorTemplate {
    pub view: ErrorPageView,
}

#[derive(Template)]
#[template(path = "user_settings.html")]
pub struct UserSettingsTemplate {
    pub title: String,
    pub username: String,
    pub forms: Vec<Form>,
}

#[derive(Template)]
#[template(path = "email_confirm.html")]
pub struct EmailConfirmTemplate {
    pub title: String,
    /// One of `success`, `not_found` or `internal_error`.
    pub status: &'static str,
}

/// Single form page, used by the Patreon and subscription activation flows.
#[derive(Template)]
#[template(path = "form_page.html")]
pub struct FormPageTemplate {
    pub title: String,
    pub form: Form,
}
