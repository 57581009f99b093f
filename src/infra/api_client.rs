//! reqwest client for the backing content API.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use filedeck_api_types::{
    EmailResetConfirmRequest, EmailResetRequest, FileInfo, ListInfo, PasswordChangeRequest, Patron,
    SubscriptionCode, UserInfo, UsernameChangeRequest, ViewToken,
};
use reqwest::{Client, Method, Url};
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

use crate::application::content::{AccountApi, ApiError, ContentApi, Credentials};

use super::error::InfraError;

pub fn user_agent() -> &'static str {
    concat!("filedeck/", env!("CARGO_PKG_VERSION"))
}

#[derive(Clone, Debug)]
pub struct HttpContentApi {
    client: Client,
    base: Url,
}

impl HttpContentApi {
    pub fn new(base: Url, timeout: Duration) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(user_agent())
            .timeout(timeout)
            .build()
            .map_err(|err| {
                InfraError::configuration(format!("failed to build content api client: {err}"))
            })?;
        Ok(Self { client, base })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::Malformed(format!("content api url `{}` has no path", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send<B>(
        &self,
        method: Method,
        segments: &[&str],
        credentials: &Credentials,
        body: Option<&B>,
    ) -> Result<Bytes, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(segments)?;
        debug!(
            target = "filedeck::infra::api_client",
            method = %method,
            path = url.path(),
            "content api request"
        );

        let mut request = self.client.request(method, url);
        if let Some(key) = credentials.auth_key.as_deref() {
            request = request.basic_auth("", Some(key));
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|err| ApiError::Transport(err.to_string()))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| ApiError::Transport(err.to_string()))?;

        if !status.is_success() {
            return Err(ApiError::from_response(status.as_u16(), &bytes));
        }
        Ok(bytes)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        credentials: &Credentials,
    ) -> Result<T, ApiError> {
        let bytes = self
            .send::<()>(Method::GET, segments, credentials, None)
            .await?;
        serde_json::from_slice(&bytes)
            .map_err(|err| ApiError::Malformed(format!("failed to parse body: {err}")))
    }

    async fn send_unit<B: Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        credentials: &Credentials,
        body: Option<&B>,
    ) -> Result<(), ApiError> {
        self.send(method, segments, credentials, body)
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl ContentApi for HttpContentApi {
    async fn file_info(&self, credentials: &Credentials, id: &str) -> Result<FileInfo, ApiError> {
        self.get_json(&["file", id, "info"], credentials).await
    }

    async fn list(&self, credentials: &Credentials, id: &str) -> Result<ListInfo, ApiError> {
        self.get_json(&["list", id], credentials).await
    }

    async fn view_token(&self) -> Result<String, ApiError> {
        let token: ViewToken = self
            .get_json(&["misc", "viewtoken"], &Credentials::anonymous())
            .await?;
        Ok(token.viewtoken)
    }

    async fn user_info(&self, credentials: &Credentials) -> Result<UserInfo, ApiError> {
        self.get_json(&["user"], credentials).await
    }
}

#[async_trait]
impl AccountApi for HttpContentApi {
    async fn set_password(
        &self,
        credentials: &Credentials,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), ApiError> {
        let body = PasswordChangeRequest {
            old_password: old_password.to_string(),
            new_password: new_password.to_string(),
        };
        self.send_unit(Method::PUT, &["user", "password"], credentials, Some(&body))
            .await
    }

    async fn reset_email(
        &self,
        credentials: &Credentials,
        new_email: &str,
        delete: bool,
    ) -> Result<(), ApiError> {
        let body = EmailResetRequest {
            new_email: new_email.to_string(),
            delete,
        };
        self.send_unit(Method::PUT, &["user", "email_reset"], credentials, Some(&body))
            .await
    }

    async fn confirm_email_reset(&self, key: &str) -> Result<(), ApiError> {
        let body = EmailResetConfirmRequest {
            key: key.to_string(),
        };
        self.send_unit(
            Method::PUT,
            &["user", "email_reset_confirm"],
            &Credentials::anonymous(),
            Some(&body),
        )
        .await
    }

    async fn set_username(
        &self,
        credentials: &Credentials,
        new_username: &str,
    ) -> Result<(), ApiError> {
        let body = UsernameChangeRequest {
            new_username: new_username.to_string(),
        };
        self.send_unit(Method::PUT, &["user", "username"], credentials, Some(&body))
            .await
    }

    async fn patron(&self, credentials: &Credentials, id: &str) -> Result<Patron, ApiError> {
        self.get_json(&["patreon", id], credentials).await
    }

    async fn link_patron(&self, credentials: &Credentials, id: &str) -> Result<(), ApiError> {
        self.send_unit::<()>(Method::POST, &["patreon", id, "link"], credentials, None)
            .await
    }

    async fn subscription(
        &self,
        credentials: &Credentials,
        id: &str,
    ) -> Result<SubscriptionCode, ApiError> {
        self.get_json(&["subscription", id], credentials).await
    }

    async fn link_subscription(&self, credentials: &Credentials, id: &str) -> Result<(), ApiError> {
        self.send_unit::<()>(Method::POST, &["subscription", id, "link"], credentials, None)
            .await
    }
}
