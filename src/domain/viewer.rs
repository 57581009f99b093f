//! View model shared by every viewer page.

use filedeck_api_types::{FileInfo, ListInfo};
use serde::{Serialize, Serializer};

/// Content shown by the viewer. The variant fixes the payload shape, so the
/// serialized `type` always matches `api_response`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "api_response", rename_all = "lowercase")]
pub enum ViewerPayload {
    File(FileInfo),
    List(ListInfo),
    Skylink(FileInfo),
}

impl ViewerPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            ViewerPayload::File(_) => "file",
            ViewerPayload::List(_) => "list",
            ViewerPayload::Skylink(_) => "skylink",
        }
    }
}

/// Banner placements. Values are the identifiers the viewer script expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum BannerAd {
    #[default]
    None = 0,
    AAds = 1,
    Brave = 7,
    ClickAduBanner = 12,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum FloaterAd {
    #[default]
    None = 0,
    Propeller = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum UnderAd {
    #[default]
    None = 0,
    ClickAduPopunder = 1,
}

macro_rules! serialize_as_code {
    ($($ty:ty),+) => {
        $(
            impl Serialize for $ty {
                fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                    serializer.serialize_u8(*self as u8)
                }
            }
        )+
    };
}

serialize_as_code!(BannerAd, FloaterAd, UnderAd);

/// Ad placements chosen for one page view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AdSlots {
    #[serde(rename = "ad_banner_type")]
    pub banner: BannerAd,
    #[serde(rename = "ad_floater_type")]
    pub floater: FloaterAd,
    #[serde(rename = "ad_under_type")]
    pub under: UnderAd,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewerData {
    #[serde(flatten)]
    pub payload: ViewerPayload,
    pub captcha_key: String,
    pub view_token: String,
    #[serde(flatten)]
    pub ads: AdSlots,
    pub file_ads_enabled: bool,
    pub user_ads_enabled: bool,
    pub embedded: bool,
}

impl ViewerData {
    pub fn new(payload: ViewerPayload) -> Self {
        Self {
            payload,
            captcha_key: String::new(),
            view_token: String::new(),
            ads: AdSlots::default(),
            file_ads_enabled: false,
            user_ads_enabled: false,
            embedded: false,
        }
    }

    /// JSON for embedding inside a `<script>` element.
    pub fn to_script_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self).map(|json| json.replace("</", "<\\/"))
    }
}

/// OpenGraph tags describing the viewed content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OgData {
    pub og_type: String,
    pub title: String,
    pub description: String,
    pub url: String,
    pub image: String,
}
