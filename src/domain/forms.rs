//! Declarative forms and the submit cycle shared by the account pages.
//!
//! A handler declares a [`Form`] with its [`Field`]s for every request, calls
//! [`Form::read_input`] once, and only when that returns `true` runs its own
//! checks and the business call. The outcome is recorded on the form itself
//! and rendered next to the fields.

use std::collections::HashMap;

/// Name of the hidden input that identifies which form was posted.
pub const FORM_MARKER_FIELD: &str = "form";

/// Closed set of input kinds. The kind drives the HTML input type and the
/// browser autocomplete hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Email,
    CurrentPassword,
    NewPassword,
    Username,
    /// Static text, optionally with a value. Never posted back.
    Description,
}

impl FieldKind {
    pub fn input_type(self) -> &'static str {
        match self {
            FieldKind::Text | FieldKind::Username | FieldKind::Description => "text",
            FieldKind::Email => "email",
            FieldKind::CurrentPassword | FieldKind::NewPassword => "password",
        }
    }

    pub fn autocomplete(self) -> &'static str {
        match self {
            FieldKind::Text | FieldKind::Description => "off",
            FieldKind::Email => "email",
            FieldKind::CurrentPassword => "current-password",
            FieldKind::NewPassword => "new-password",
            FieldKind::Username => "username",
        }
    }

    pub fn is_interactive(self) -> bool {
        !matches!(self, FieldKind::Description)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub label: String,
    /// Rich text, rendered without escaping.
    pub description: String,
    pub default_value: String,
    pub kind: FieldKind,
    value: String,
}

impl Field {
    pub fn new(name: impl Into<String>, label: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            description: String::new(),
            default_value: String::new(),
            kind,
            value: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_default(mut self, default_value: impl Into<String>) -> Self {
        self.default_value = default_value.into();
        self.value = self.default_value.clone();
        self
    }

    /// Live value: the posted value after a submission, the default before.
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// The inbound request as seen by the form engine.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    posted: bool,
    values: HashMap<String, String>,
}

impl Submission {
    /// A request that carries no submission, e.g. a plain GET.
    pub fn none() -> Self {
        Self::default()
    }

    /// A POST request with its decoded body.
    pub fn post<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            posted: true,
            values: pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    /// Decode an `application/x-www-form-urlencoded` body.
    pub fn from_urlencoded(posted: bool, body: &[u8]) -> Self {
        Self {
            posted,
            values: url::form_urlencoded::parse(body).into_owned().collect(),
        }
    }

    pub fn is_post(&self) -> bool {
        self.posted
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Form {
    pub name: String,
    pub title: String,
    /// Rich text rendered above the fields.
    pub pre_form_html: String,
    pub fields: Vec<Field>,
    pub submit_label: String,
    pub submitted: bool,
    pub submit_success: bool,
    /// Render the messages with alarm styling.
    pub submit_red: bool,
    /// Rich text, rendered in order.
    pub submit_messages: Vec<String>,
}

impl Form {
    pub fn new(name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            submit_label: "Submit".to_string(),
            ..Self::default()
        }
    }

    pub fn with_fields(mut self, fields: Vec<Field>) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_submit_label(mut self, label: impl Into<String>) -> Self {
        self.submit_label = label.into();
        self
    }

    pub fn with_pre_form_html(mut self, html: impl Into<String>) -> Self {
        self.pre_form_html = html.into();
        self
    }

    /// Load the posted values into the fields.
    ///
    /// Returns `true` only when the submission is a POST addressed to this
    /// form through the marker field. Description fields keep their values.
    pub fn read_input(&mut self, submission: &Submission) -> bool {
        if !submission.is_post() || submission.value(FORM_MARKER_FIELD) != Some(self.name.as_str())
        {
            return false;
        }

        for field in self.fields.iter_mut().filter(|f| f.kind.is_interactive()) {
            field.value = submission.value(&field.name).unwrap_or_default().to_string();
        }
        self.submitted = true;
        true
    }

    /// Live value of the named field, empty when no such field exists.
    pub fn field_val(&self, name: &str) -> &str {
        self.field(name).map(Field::value).unwrap_or_default()
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Record a failure that happened before or instead of the business call.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.submitted = true;
        self.submit_success = false;
        self.submit_messages = vec![message.into()];
    }

    pub fn succeed(&mut self, message: impl Into<String>) {
        self.submit_success = true;
        self.submit_messages = vec![message.into()];
    }

    pub fn push_message(&mut self, message: impl Into<String>) {
        self.submit_messages.push(message.into());
    }

    pub fn state(&self) -> FormState {
        match (self.submitted, self.submit_success) {
            (false, _) => FormState::Unsubmitted,
            (true, true) => FormState::Succeeded,
            (true, false) if self.submit_messages.is_empty() => FormState::Submitted,
            (true, false) => FormState::Failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormState {
    Unsubmitted,
    Submitted,
    Succeeded,
    Failed,
}
