use filedeck_api_types::UserInfo;

use crate::application::content::Credentials;

/// Visitor identity resolved from the session cookie.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub credentials: Credentials,
    pub user: Option<UserInfo>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(auth_key: impl Into<String>, user: UserInfo) -> Self {
        Self {
            credentials: Credentials::with_key(auth_key),
            user: Some(user),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Whether the visitor's subscription turns ads off.
    pub fn ads_disabled(&self) -> bool {
        self.user
            .as_ref()
            .is_some_and(|user| user.subscription.disable_ad_display)
    }
}
