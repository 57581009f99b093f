//! Account settings and linking forms.

use std::sync::Arc;

use filedeck_api_types::SubscriptionCode;
use time::{Date, Duration, OffsetDateTime};
use tracing::error;

use crate::application::content::AccountApi;
use crate::application::form_errors::apply_api_error;
use crate::application::session::Session;
use crate::domain::forms::{Field, FieldKind, Form, Submission};

const CONFIRM_HEADING: &str = "<h3>Please confirm that the following information is correct:</h3>";

#[derive(Debug, Clone)]
pub struct AccountOptions {
    pub service_name: String,
    /// Rich text shown above the subscription activation form.
    pub subscription_banner_html: String,
}

/// The three forms on the account settings page.
#[derive(Debug, Clone)]
pub struct SettingsForms {
    pub password: Form,
    pub email: Form,
    pub username: Form,
}

/// Outcome of following an e-mail confirmation link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailConfirmStatus {
    Success,
    NotFound,
    InternalError,
}

impl EmailConfirmStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EmailConfirmStatus::Success => "success",
            EmailConfirmStatus::NotFound => "not_found",
            EmailConfirmStatus::InternalError => "internal_error",
        }
    }
}

#[derive(Clone)]
pub struct AccountService {
    api: Arc<dyn AccountApi>,
    options: AccountOptions,
}

impl AccountService {
    pub fn new(api: Arc<dyn AccountApi>, options: AccountOptions) -> Self {
        Self { api, options }
    }

    pub fn options(&self) -> &AccountOptions {
        &self.options
    }

    pub async fn settings_forms(&self, session: &Session, submission: &Submission) -> SettingsForms {
        SettingsForms {
            password: self.password_form(session, submission).await,
            email: self.email_form(session, submission).await,
            username: self.username_form(session, submission).await,
        }
    }

    pub async fn password_form(&self, session: &Session, submission: &Submission) -> Form {
        let mut form = Form::new("password_change", "Change password").with_fields(vec![
            Field::new("old_password", "Old Password", FieldKind::CurrentPassword),
            Field::new("new_password", "New Password", FieldKind::NewPassword),
            Field::new("new_password2", "New Password again", FieldKind::NewPassword)
                .with_description(
                    "we need you to repeat your password so you won't be locked out of your \
                     account if you make a typing error",
                ),
        ]);

        if !form.read_input(submission) {
            return form;
        }

        if form.field_val("new_password") != form.field_val("new_password2") {
            form.fail(
                "Password verification failed. Please enter the same password in both new \
                 password fields",
            );
            return form;
        }

        match self
            .api
            .set_password(
                &session.credentials,
                form.field_val("old_password"),
                form.field_val("new_password"),
            )
            .await
        {
            Ok(()) => form.succeed("Success! Your password has been updated"),
            Err(err) => apply_api_error(&mut form, &err),
        }
        form
    }

    pub async fn email_form(&self, session: &Session, submission: &Submission) -> Form {
        let mut form = Form::new("email_change", "Change e-mail address").with_fields(vec![
            Field::new("new_email", "New e-mail address", FieldKind::Email).with_description(
                "we will send an e-mail to the new address to verify that it's real. The \
                 address will be saved once the link in the message is clicked. If the e-mail \
                 doesn't arrive right away please check your spam box too",
            ),
        ]);

        if !form.read_input(submission) {
            return form;
        }

        match self
            .api
            .reset_email(&session.credentials, form.field_val("new_email"), false)
            .await
        {
            Ok(()) => form.succeed("Success! E-mail sent"),
            Err(err) => apply_api_error(&mut form, &err),
        }
        form
    }

    pub async fn username_form(&self, session: &Session, submission: &Submission) -> Form {
        let mut form = Form::new("username_change", "Change username").with_fields(vec![
            Field::new("new_username", "New username", FieldKind::Username).with_description(
                "changing your username also changes the name used to log in. If you forget \
                 your username you can still log in using your e-mail address if you have one \
                 configured",
            ),
        ]);

        if !form.read_input(submission) {
            return form;
        }

        match self
            .api
            .set_username(&session.credentials, form.field_val("new_username"))
            .await
        {
            Ok(()) => {
                let message = format!(
                    "Success! You are now {}",
                    ammonia::clean_text(form.field_val("new_username"))
                );
                form.succeed(message);
            }
            Err(err) => apply_api_error(&mut form, &err),
        }
        form
    }

    pub async fn confirm_email(&self, key: &str) -> EmailConfirmStatus {
        match self.api.confirm_email_reset(key).await {
            Ok(()) => EmailConfirmStatus::Success,
            Err(err) if err.is_not_found() => EmailConfirmStatus::NotFound,
            Err(err) => {
                error!(
                    target = "filedeck::account",
                    error = %err,
                    "e-mail reset confirmation failed"
                );
                EmailConfirmStatus::InternalError
            }
        }
    }

    pub async fn patreon_link_form(
        &self,
        session: &Session,
        key: Option<&str>,
        submission: &Submission,
    ) -> Form {
        let mut form = Form::new(
            "link_patreon_subscription",
            format!("Link Patreon pledge to {} account", self.options.service_name),
        );

        let Some(key) = key.filter(|key| !key.is_empty()) else {
            form.fail("Patron ID not found");
            return form;
        };

        let patron = match self.api.patron(&session.credentials, key).await {
            Ok(patron) => patron,
            Err(err) if err.is_not_found() => {
                form.fail("Patron ID not found");
                return form;
            }
            Err(err) => {
                form.submitted = true;
                apply_api_error(&mut form, &err);
                return form;
            }
        };

        let (username, email) = account_identity(session);
        let service = &self.options.service_name;
        form.fields = vec![
            Field::new("1", "", FieldKind::Description).with_description(CONFIRM_HEADING),
            Field::new("2", format!("{service} username"), FieldKind::Description)
                .with_default(username),
            Field::new("3", format!("{service} e-mail"), FieldKind::Description).with_default(email),
            Field::new("4", "Patreon username", FieldKind::Description)
                .with_default(&patron.full_name),
            Field::new("5", "Patreon e-mail", FieldKind::Description)
                .with_default(&patron.user_email),
            Field::new("6", "Subscription name", FieldKind::Description)
                .with_default(&patron.subscription.name),
            Field::new("7", "Monthly contribution", FieldKind::Description)
                .with_default(monthly_pledge(patron.pledge_amount_cents)),
            Field::new("8", "", FieldKind::Description).with_description(format!(
                "When clicking submit your patreon pledge will be linked to your {service} \
                 account and you will be able to use {service}'s premium features. If you would \
                 like to update or cancel your subscription later on you can do so through \
                 patreon's dashboard"
            )),
        ];

        if !form.read_input(submission) {
            return form;
        }

        match self.api.link_patron(&session.credentials, key).await {
            Ok(()) => form.succeed(format!(
                "Success! Your account has been upgraded to the {} plan.",
                patron.subscription.name
            )),
            Err(err) => apply_api_error(&mut form, &err),
        }
        form
    }

    pub async fn subscription_link_form(
        &self,
        session: &Session,
        key: Option<&str>,
        submission: &Submission,
    ) -> Form {
        let mut form = Form::new("link_subscription", "Activate subscription")
            .with_pre_form_html(&self.options.subscription_banner_html)
            .with_submit_label("Confirm");

        let Some(key) = key.filter(|key| !key.is_empty()) else {
            form.fail("Subscription ID not found");
            return form;
        };

        let code = match self.api.subscription(&session.credentials, key).await {
            Ok(code) => code,
            Err(err) if err.is_not_found() => {
                form.fail("Subscription ID not found");
                return form;
            }
            Err(err) => {
                form.submitted = true;
                apply_api_error(&mut form, &err);
                return form;
            }
        };

        let (username, email) = account_identity(session);
        let service = &self.options.service_name;
        form.fields = vec![
            Field::new("1", "", FieldKind::Description).with_description(CONFIRM_HEADING),
            Field::new("2", format!("{service} username"), FieldKind::Description)
                .with_default(username),
            Field::new("3", format!("{service} e-mail"), FieldKind::Description).with_default(email),
            Field::new("4", "Subscription", FieldKind::Description)
                .with_default(&code.subscription_type.name),
            Field::new("5", "Duration", FieldKind::Description)
                .with_default(format!("{} days", code.duration_days)),
            Field::new("6", "End date", FieldKind::Description).with_default(subscription_end_date(
                OffsetDateTime::now_utc().date(),
                &code,
            )),
            Field::new("7", "", FieldKind::Description).with_description(format!(
                "When clicking submit this subscription will be linked to your {service} account \
                 and you will be able to use {service}'s pro features. If you already have a \
                 {service} subscription it will be overwritten"
            )),
        ];

        if code.used {
            form.fail(format!(
                "This subscription is already linked to a {service} account. It can't be linked again"
            ));
            form.submit_red = true;
            return form;
        }

        if !form.read_input(submission) {
            return form;
        }

        match self.api.link_subscription(&session.credentials, key).await {
            Ok(()) => form.succeed(format!(
                "Success! Your account has been upgraded to the {} plan.",
                code.subscription_type.name
            )),
            Err(err) => apply_api_error(&mut form, &err),
        }
        form
    }
}

fn account_identity(session: &Session) -> (&str, &str) {
    session
        .user
        .as_ref()
        .map(|user| (user.username.as_str(), user.email.as_str()))
        .unwrap_or_default()
}

fn monthly_pledge(cents: i64) -> String {
    format!("€ {:.2} / month", cents as f64 / 100.0)
}

fn subscription_end_date(today: Date, code: &SubscriptionCode) -> String {
    today
        .checked_add(Duration::days(code.duration_days))
        .map(|date| date.to_string())
        .unwrap_or_default()
}
