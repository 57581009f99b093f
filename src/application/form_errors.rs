//! Attach content API failures to the form that triggered them.
//!
//! Form fields are named after the API parameters, which is what lets the
//! length and character errors point at the right label.

use ammonia::clean_text;
use tracing::error;

use crate::application::content::{ApiError, CodedError, ErrorDetail};
use crate::domain::forms::Form;

pub const GENERIC_FAILURE_MESSAGE: &str = "Internal Server Error";

pub fn apply_api_error(form: &mut Form, err: &ApiError) {
    match err {
        ApiError::Multiple { errors, .. } => {
            for nested in errors {
                let message = describe(form, nested);
                form.push_message(message);
            }
        }
        ApiError::Coded(coded) => {
            let message = describe(form, coded);
            form.push_message(message);
        }
        ApiError::Transport(_) | ApiError::Malformed(_) => {
            error!(
                target = "filedeck::forms",
                form = %form.name,
                error = %err,
                "error submitting form"
            );
            form.submit_messages = vec![GENERIC_FAILURE_MESSAGE.to_string()];
        }
    }
    form.submit_success = false;
}

fn describe(form: &Form, err: &CodedError) -> String {
    match &err.detail {
        ErrorDetail::StringOutOfRange {
            field,
            min_len,
            max_len,
            len,
        } => format!(
            "{} is too long or too short. Should be between {min_len} and {max_len} characters. Current length: {len}",
            field_label(form, field),
        ),
        ErrorDetail::IllegalCharacter { field, character } => format!(
            "Character '{}' is not allowed in {}",
            clean_text(character),
            field_label(form, field),
        ),
        ErrorDetail::None => err.message.clone(),
    }
}

/// Messages are rendered as markup, so anything taken from the API response
/// is escaped. Labels come from the form definition and pass as they are.
fn field_label(form: &Form, field: &str) -> String {
    match form.field(field) {
        Some(known) => known.label.clone(),
        None => clean_text(field),
    }
}
