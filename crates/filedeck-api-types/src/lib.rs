//! Request and response shapes exchanged with the filedeck content API.
//!
//! The viewer pages embed these structures verbatim into the rendered HTML,
//! so field names follow the API's JSON representation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

/// Descriptive metadata for one stored file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    pub id: String,
    pub name: String,
    pub size: u64,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub bandwidth_used: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub date_upload: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub date_last_view: OffsetDateTime,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub thumbnail_href: String,
    /// Non-empty when the file was taken down.
    #[serde(default)]
    pub abuse_type: String,
    #[serde(default)]
    pub show_ads: bool,
}

impl FileInfo {
    pub fn is_taken_down(&self) -> bool {
        !self.abuse_type.is_empty()
    }
}

/// A file as it appears inside a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListFile {
    #[serde(flatten)]
    pub info: FileInfo,
    #[serde(default)]
    pub detail_href: String,
}

impl From<FileInfo> for ListFile {
    fn from(info: FileInfo) -> Self {
        let detail_href = format!("/file/{}/info", info.id);
        Self { info, detail_href }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListInfo {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(with = "time::serde::rfc3339")]
    pub date_created: OffsetDateTime,
    #[serde(default)]
    pub files: Vec<ListFile>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub disable_ad_display: bool,
}

/// The account behind a session key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub subscription: Subscription,
}

/// A Patreon pledge waiting to be linked to an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patron {
    pub id: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub user_email: String,
    #[serde(default)]
    pub pledge_amount_cents: i64,
    #[serde(default)]
    pub subscription: Subscription,
}

/// A prepaid subscription code handed out by a partner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionCode {
    pub id: String,
    #[serde(default)]
    pub used: bool,
    pub duration_days: i64,
    #[serde(default)]
    pub subscription_type: Subscription,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewToken {
    pub viewtoken: String,
}

/// Error envelope returned by the content API for any non-2xx response.
///
/// `value` carries the machine readable code. The composite form uses the
/// code `multiple_errors` and lists the individual failures in `errors`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub success: bool,
    pub value: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorEnvelope>,
}

pub mod codes {
    pub const NOT_FOUND: &str = "not_found";
    pub const MULTIPLE_ERRORS: &str = "multiple_errors";
    pub const STRING_OUT_OF_RANGE: &str = "string_out_of_range";
    pub const ILLEGAL_CHARACTER: &str = "field_contains_illegal_character";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordChangeRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailResetRequest {
    pub new_email: String,
    pub delete: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailResetConfirmRequest {
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsernameChangeRequest {
    pub new_username: String,
}
