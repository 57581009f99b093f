//! Traits describing the content API and remote host adapters.

use async_trait::async_trait;
use bytes::Bytes;
use filedeck_api_types::{
    ErrorEnvelope, FileInfo, ListInfo, Patron, SubscriptionCode, UserInfo, codes,
};
use serde::Deserialize;
use thiserror::Error;

/// Session key of the visitor, passed through to the content API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub auth_key: Option<String>,
}

impl Credentials {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_key(key: impl Into<String>) -> Self {
        Self {
            auth_key: Some(key.into()),
        }
    }
}

/// Extra context attached to the error codes the forms know how to reword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorDetail {
    None,
    StringOutOfRange {
        field: String,
        min_len: i64,
        max_len: i64,
        len: i64,
    },
    IllegalCharacter {
        field: String,
        character: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodedError {
    pub status: u16,
    pub code: String,
    pub message: String,
    pub detail: ErrorDetail,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("{}", .0.message)]
    Coded(CodedError),
    #[error("multiple errors ({} total)", .errors.len())]
    Multiple { status: u16, errors: Vec<CodedError> },
    #[error("content api unreachable: {0}")]
    Transport(String),
    #[error("content api returned an unreadable response: {0}")]
    Malformed(String),
}

impl ApiError {
    /// Decode an error response body. Bodies that are not a recognised error
    /// envelope become [`ApiError::Malformed`].
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        match serde_json::from_slice::<ErrorEnvelope>(body) {
            Ok(envelope) => Self::from_envelope(status, envelope),
            Err(err) => ApiError::Malformed(format!("status {status}: {err}")),
        }
    }

    pub fn from_envelope(status: u16, envelope: ErrorEnvelope) -> Self {
        if envelope.value.is_empty() {
            return ApiError::Malformed(format!("status {status}: error without code"));
        }
        if envelope.value == codes::MULTIPLE_ERRORS {
            let errors = envelope
                .errors
                .into_iter()
                .map(|nested| CodedError::from_envelope(status, nested))
                .collect();
            return ApiError::Multiple { status, errors };
        }
        ApiError::Coded(CodedError::from_envelope(status, envelope))
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Coded(err) => Some(err.status),
            ApiError::Multiple { status, .. } => Some(*status),
            ApiError::Transport(_) | ApiError::Malformed(_) => None,
        }
    }

    /// Whether the failure lies with the collaborator rather than the request.
    pub fn is_server_error(&self) -> bool {
        match self.status() {
            Some(status) => status >= 500,
            None => true,
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            ApiError::Coded(err) => err.status == 404 || err.code == codes::NOT_FOUND,
            _ => false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OutOfRangeExtra {
    field: String,
    min_len: i64,
    max_len: i64,
    len: i64,
}

#[derive(Debug, Deserialize)]
struct IllegalCharacterExtra {
    field: String,
    #[serde(rename = "char")]
    character: String,
}

impl CodedError {
    fn from_envelope(status: u16, envelope: ErrorEnvelope) -> Self {
        let detail = match (envelope.value.as_str(), envelope.extra) {
            (codes::STRING_OUT_OF_RANGE, Some(extra)) => {
                serde_json::from_value::<OutOfRangeExtra>(extra)
                    .map(|extra| ErrorDetail::StringOutOfRange {
                        field: extra.field,
                        min_len: extra.min_len,
                        max_len: extra.max_len,
                        len: extra.len,
                    })
                    .unwrap_or(ErrorDetail::None)
            }
            (codes::ILLEGAL_CHARACTER, Some(extra)) => {
                serde_json::from_value::<IllegalCharacterExtra>(extra)
                    .map(|extra| ErrorDetail::IllegalCharacter {
                        field: extra.field,
                        character: extra.character,
                    })
                    .unwrap_or(ErrorDetail::None)
            }
            _ => ErrorDetail::None,
        };

        Self {
            status,
            code: envelope.value,
            message: envelope.message,
            detail,
        }
    }
}

/// Read access to stored content and the visitor's account.
#[async_trait]
pub trait ContentApi: Send + Sync {
    async fn file_info(&self, credentials: &Credentials, id: &str) -> Result<FileInfo, ApiError>;

    async fn list(&self, credentials: &Credentials, id: &str) -> Result<ListInfo, ApiError>;

    async fn view_token(&self) -> Result<String, ApiError>;

    async fn user_info(&self, credentials: &Credentials) -> Result<UserInfo, ApiError>;
}

/// Mutations behind the account settings and linking pages.
#[async_trait]
pub trait AccountApi: Send + Sync {
    async fn set_password(
        &self,
        credentials: &Credentials,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), ApiError>;

    async fn reset_email(
        &self,
        credentials: &Credentials,
        new_email: &str,
        delete: bool,
    ) -> Result<(), ApiError>;

    async fn confirm_email_reset(&self, key: &str) -> Result<(), ApiError>;

    async fn set_username(
        &self,
        credentials: &Credentials,
        new_username: &str,
    ) -> Result<(), ApiError>;

    async fn patron(&self, credentials: &Credentials, id: &str) -> Result<Patron, ApiError>;

    async fn link_patron(&self, credentials: &Credentials, id: &str) -> Result<(), ApiError>;

    async fn subscription(
        &self,
        credentials: &Credentials,
        id: &str,
    ) -> Result<SubscriptionCode, ApiError>;

    async fn link_subscription(&self, credentials: &Credentials, id: &str)
    -> Result<(), ApiError>;
}

/// Headers and leading bytes returned by a ranged request to the remote host.
#[derive(Debug, Clone, Default)]
pub struct ProbeResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub content_range: Option<String>,
    pub content_disposition: Option<String>,
    pub head: Bytes,
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("remote host request failed: {0}")]
    Transport(String),
    #[error("failed to read probed bytes: {0}")]
    Body(String),
}

/// Third-party host serving remotely stored content.
#[async_trait]
pub trait RemoteHost: Send + Sync {
    /// Fetch the first bytes of the content together with its headers.
    async fn probe(&self, id: &str) -> Result<ProbeResponse, ProbeError>;

    /// Direct download location of the content.
    fn raw_url(&self, id: &str) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_extra_becomes_typed_detail() {
        let body = br#"{
            "value": "string_out_of_range",
            "message": "raw",
            "extra": {"field": "new_username", "min_len": 3, "max_len": 20, "len": 1}
        }"#;

        match ApiError::from_response(422, body) {
            ApiError::Coded(err) => assert_eq!(
                err.detail,
                ErrorDetail::StringOutOfRange {
                    field: "new_username".into(),
                    min_len: 3,
                    max_len: 20,
                    len: 1,
                }
            ),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn malformed_extra_degrades_to_plain_message() {
        let body = br#"{"value": "field_contains_illegal_character", "message": "raw", "extra": {"x": 1}}"#;
        match ApiError::from_response(422, body) {
            ApiError::Coded(err) => {
                assert_eq!(err.detail, ErrorDetail::None);
                assert_eq!(err.message, "raw");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn non_json_body_is_malformed() {
        let err = ApiError::from_response(502, b"<html>bad gateway</html>");
        assert!(matches!(err, ApiError::Malformed(_)));
        assert!(err.is_server_error());
    }

    #[test]
    fn classification_follows_status() {
        let not_found = ApiError::from_response(404, br#"{"value":"not_found","message":"gone"}"#);
        assert!(not_found.is_not_found());
        assert!(!not_found.is_server_error());

        let internal =
            ApiError::from_response(500, br#"{"value":"internal","message":"boom"}"#);
        assert!(internal.is_server_error());
        assert!(ApiError::Transport("refused".into()).is_server_error());
    }
}
