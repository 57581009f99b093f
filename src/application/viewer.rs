//! Resolve viewer requests into render-ready pages.
//!
//! Owned files, lists and remotely hosted content all end up as one
//! [`ViewerPage`]; the HTTP layer only picks the template and status.

use std::sync::Arc;

use axum::http::StatusCode;
use filedeck_api_types::{FileInfo, ListFile, ListInfo};
use metrics::counter;
use thiserror::Error;
use time::{OffsetDateTime, macros::datetime};
use tracing::{debug, error, warn};

use crate::application::ads::{RandomSource, select_ads};
use crate::application::content::{ApiError, ContentApi, ProbeError, RemoteHost};
use crate::application::remote::{RemoteMetadataError, file_from_probe};
use crate::application::session::Session;
use crate::domain::viewer::{AdSlots, BannerAd, OgData, ViewerData, ViewerPayload};

/// File id that renders static metadata without touching the content API.
pub const DEMO_FILE_ID: &str = "demo";

const REMOTE_SERVICE_NAME: &str = "Skynet";

/// Whether the user agent needs the reduced-feature viewer template.
pub fn is_legacy_browser(user_agent: &str) -> bool {
    user_agent.contains("MSIE") || user_agent.contains("Trident/7.0")
}

/// Whether the user agent is a command line downloader that should receive
/// the raw content instead of the viewer.
pub fn is_downloader(user_agent: &str) -> bool {
    user_agent.starts_with("Wget/")
}

#[derive(Debug, Clone)]
pub struct ViewerOptions {
    pub service_name: String,
    /// Public base URL, used for OpenGraph links.
    pub website_address: String,
    pub captcha_site_key: String,
    /// View token failures are expected when API requests are proxied.
    pub proxy_api_requests: bool,
}

#[derive(Debug, Clone)]
pub struct ViewerPage {
    pub data: ViewerData,
    pub title: String,
    pub status: StatusCode,
    pub og: OgData,
}

#[derive(Debug, Error)]
pub enum UpstreamFailure {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Probe(#[from] ProbeError),
    #[error(transparent)]
    Remote(#[from] RemoteMetadataError),
}

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("none of the requested files could be found")]
    FileNotFound,
    #[error("list not found")]
    ListNotFound,
    #[error("upstream request failed")]
    Upstream(#[source] UpstreamFailure),
}

impl ViewerError {
    fn upstream(err: impl Into<UpstreamFailure>) -> Self {
        Self::Upstream(err.into())
    }
}

#[derive(Clone)]
pub struct ViewerService {
    content: Arc<dyn ContentApi>,
    remote: Arc<dyn RemoteHost>,
    random: Arc<dyn RandomSource>,
    options: ViewerOptions,
}

impl ViewerService {
    pub fn new(
        content: Arc<dyn ContentApi>,
        remote: Arc<dyn RemoteHost>,
        random: Arc<dyn RandomSource>,
        options: ViewerOptions,
    ) -> Self {
        Self {
            content,
            remote,
            random,
            options,
        }
    }

    pub fn options(&self) -> &ViewerOptions {
        &self.options
    }

    /// Direct download location of remotely hosted content.
    pub fn remote_download_url(&self, id: &str) -> String {
        self.remote.raw_url(id)
    }

    /// Resolve a comma separated list of file ids.
    ///
    /// Ids the API rejects with a client error are left out. A server side
    /// failure on any id aborts the whole request.
    pub async fn resolve_files(
        &self,
        session: &Session,
        ids: &str,
        embedded: bool,
    ) -> Result<ViewerPage, ViewerError> {
        if ids == DEMO_FILE_ID {
            return Ok(self.resolve_demo(embedded));
        }

        let mut files = Vec::new();
        for id in ids.split(',').filter(|id| !id.is_empty()) {
            match self.content.file_info(&session.credentials, id).await {
                Ok(file) => files.push(file),
                Err(err) if err.is_server_error() => return Err(ViewerError::upstream(err)),
                Err(err) => debug!(
                    target = "filedeck::viewer",
                    file_id = id,
                    error = %err,
                    "skipping unavailable file"
                ),
            }
        }

        let Some(first) = files.first() else {
            return Err(ViewerError::FileNotFound);
        };
        let og = self.file_og(first);
        let file_ads_enabled = first.show_ads;
        let sizes: Vec<u64> = files.iter().map(|file| file.size).collect();
        let status = legal_status(files.iter());

        let (payload, title) = if files.len() == 1 {
            let file = files.swap_remove(0);
            let title = format!("{} ~ {}", file.name, self.options.service_name);
            (ViewerPayload::File(file), title)
        } else {
            let title = format!("{} files on {}", files.len(), self.options.service_name);
            let list = ListInfo {
                id: String::new(),
                title: "Multiple files".to_string(),
                date_created: OffsetDateTime::now_utc(),
                files: files.into_iter().map(ListFile::from).collect(),
            };
            (ViewerPayload::List(list), title)
        };

        let data = self
            .viewer_data(session, payload, &sizes, file_ads_enabled, embedded)
            .await;
        counter!("filedeck_viewer_resolved_total", "source" => "file").increment(1);

        Ok(ViewerPage {
            data,
            title,
            status,
            og,
        })
    }

    /// Static page used by ad networks to verify the ad units.
    pub fn resolve_demo(&self, embedded: bool) -> ViewerPage {
        let uploaded = datetime!(2017-01-01 12:34:56 UTC);
        let file = FileInfo {
            id: DEMO_FILE_ID.to_string(),
            name: "Demo file".to_string(),
            size: 123_456_789,
            views: 1,
            bandwidth_used: 123_456_789,
            date_upload: uploaded,
            date_last_view: uploaded,
            mime_type: "text/demo".to_string(),
            description: "A file to demonstrate the viewer page".to_string(),
            thumbnail_href: "/res/img/mime/text.png".to_string(),
            abuse_type: String::new(),
            show_ads: true,
        };

        let og = self.file_og(&file);
        let title = format!("{} ~ {}", file.name, self.options.service_name);

        let mut data = ViewerData::new(ViewerPayload::File(file));
        data.captcha_key = self.options.captcha_site_key.clone();
        data.ads = AdSlots {
            banner: BannerAd::AAds,
            ..AdSlots::default()
        };
        data.file_ads_enabled = true;
        data.user_ads_enabled = true;
        data.embedded = embedded;

        counter!("filedeck_viewer_resolved_total", "source" => "demo").increment(1);

        ViewerPage {
            data,
            title,
            status: StatusCode::OK,
            og,
        }
    }

    pub async fn resolve_list(
        &self,
        session: &Session,
        id: &str,
        embedded: bool,
    ) -> Result<ViewerPage, ViewerError> {
        let list = match self.content.list(&session.credentials, id).await {
            Ok(list) => list,
            Err(err) if err.is_not_found() => return Err(ViewerError::ListNotFound),
            Err(err) => return Err(ViewerError::upstream(err)),
        };

        let Some(first) = list.files.first() else {
            return Err(ViewerError::ListNotFound);
        };
        let file_ads_enabled = first.info.show_ads;
        let sizes: Vec<u64> = list.files.iter().map(|file| file.info.size).collect();
        let status = legal_status(list.files.iter().map(|file| &file.info));
        let og = self.list_og(&list);
        let title = format!("{} ~ {}", list.title, self.options.service_name);

        let data = self
            .viewer_data(
                session,
                ViewerPayload::List(list),
                &sizes,
                file_ads_enabled,
                embedded,
            )
            .await;
        counter!("filedeck_viewer_resolved_total", "source" => "list").increment(1);

        Ok(ViewerPage {
            data,
            title,
            status,
            og,
        })
    }

    /// Probe remotely hosted content and describe it as a file.
    pub async fn resolve_remote(&self, id: &str, embedded: bool) -> Result<ViewerPage, ViewerError> {
        let probe = self.remote.probe(id).await.map_err(|err| {
            counter!("filedeck_remote_probe_failures_total").increment(1);
            warn!(
                target = "filedeck::viewer::remote",
                remote_id = id,
                error = %err,
                "remote host probe failed"
            );
            ViewerError::upstream(err)
        })?;

        let file = match file_from_probe(id, &probe, OffsetDateTime::now_utc()) {
            Ok(file) => file,
            Err(RemoteMetadataError::ClientStatus(status)) => {
                debug!(
                    target = "filedeck::viewer::remote",
                    remote_id = id,
                    status,
                    "remote content not available"
                );
                return Err(ViewerError::FileNotFound);
            }
            Err(err) => {
                counter!("filedeck_remote_probe_failures_total").increment(1);
                warn!(
                    target = "filedeck::viewer::remote",
                    remote_id = id,
                    error = %err,
                    "remote host returned unusable response"
                );
                return Err(ViewerError::upstream(err));
            }
        };

        let title = format!("{} ~ {REMOTE_SERVICE_NAME}", file.name);
        let og = OgData {
            og_type: "website".to_string(),
            title: file.name.clone(),
            description: format!("View {} on {REMOTE_SERVICE_NAME}", file.name),
            url: format!("{}/s/{id}", self.options.website_address),
            image: String::new(),
        };

        let mut data = ViewerData::new(ViewerPayload::Skylink(file));
        data.captcha_key = self.options.captcha_site_key.clone();
        data.embedded = embedded;

        counter!("filedeck_viewer_resolved_total", "source" => "remote").increment(1);

        Ok(ViewerPage {
            data,
            title,
            status: StatusCode::OK,
            og,
        })
    }

    async fn viewer_data(
        &self,
        session: &Session,
        payload: ViewerPayload,
        sizes: &[u64],
        file_ads_enabled: bool,
        embedded: bool,
    ) -> ViewerData {
        let mut data = ViewerData::new(payload);
        data.captcha_key = self.options.captcha_site_key.clone();
        data.view_token = self.view_token().await;
        data.ads = select_ads(self.random.as_ref(), sizes).unwrap_or_default();
        data.file_ads_enabled = file_ads_enabled;
        data.user_ads_enabled = !session.ads_disabled();
        data.embedded = embedded;
        data
    }

    async fn view_token(&self) -> String {
        match self.content.view_token().await {
            Ok(token) => token,
            Err(err) => {
                if !self.options.proxy_api_requests {
                    error!(
                        target = "filedeck::viewer",
                        error = %err,
                        "could not get view token"
                    );
                }
                String::new()
            }
        }
    }

    fn file_og(&self, file: &FileInfo) -> OgData {
        let description = if file.description.is_empty() {
            format!("View {} on {}", file.name, self.options.service_name)
        } else {
            file.description.clone()
        };
        OgData {
            og_type: "website".to_string(),
            title: file.name.clone(),
            description,
            url: format!("{}/u/{}", self.options.website_address, file.id),
            image: format!(
                "{}/api/file/{}/thumbnail",
                self.options.website_address, file.id
            ),
        }
    }

    fn list_og(&self, list: &ListInfo) -> OgData {
        let image = list
            .files
            .first()
            .map(|file| {
                format!(
                    "{}/api/file/{}/thumbnail",
                    self.options.website_address, file.info.id
                )
            })
            .unwrap_or_default();
        OgData {
            og_type: "website".to_string(),
            title: list.title.clone(),
            description: format!(
                "A list of {} files on {}",
                list.files.len(),
                self.options.service_name
            ),
            url: format!("{}/l/{}", self.options.website_address, list.id),
            image,
        }
    }
}

fn legal_status<'a>(mut files: impl Iterator<Item = &'a FileInfo>) -> StatusCode {
    if files.any(FileInfo::is_taken_down) {
        StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS
    } else {
        StatusCode::OK
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use bytes::Bytes;
    use filedeck_api_types::{Subscription, UserInfo};

    use super::*;
    use crate::application::ads::SeededRandom;
    use crate::application::content::{CodedError, Credentials, ErrorDetail, ProbeResponse};
    use crate::domain::viewer::FloaterAd;

    fn file(id: &str, size: u64) -> FileInfo {
        FileInfo {
            id: id.into(),
            name: format!("{id}.txt"),
            size,
            views: 3,
            bandwidth_used: 0,
            date_upload: datetime!(2023-02-03 4:05:06 UTC),
            date_last_view: datetime!(2023-02-03 4:05:06 UTC),
            mime_type: "text/plain".into(),
            description: String::new(),
            thumbnail_href: String::new(),
            abuse_type: String::new(),
            show_ads: true,
        }
    }

    fn coded(status: u16, code: &str) -> ApiError {
        ApiError::Coded(CodedError {
            status,
            code: code.into(),
            message: code.into(),
            detail: ErrorDetail::None,
        })
    }

    #[derive(Default)]
    struct StubContent {
        files: HashMap<String, Result<FileInfo, ApiError>>,
        lists: HashMap<String, Result<ListInfo, ApiError>>,
        token: Option<String>,
    }

    #[async_trait]
    impl ContentApi for StubContent {
        async fn file_info(&self, _: &Credentials, id: &str) -> Result<FileInfo, ApiError> {
            self.files
                .get(id)
                .cloned()
                .unwrap_or_else(|| Err(coded(404, "not_found")))
        }

        async fn list(&self, _: &Credentials, id: &str) -> Result<ListInfo, ApiError> {
            self.lists
                .get(id)
                .cloned()
                .unwrap_or_else(|| Err(coded(404, "not_found")))
        }

        async fn view_token(&self) -> Result<String, ApiError> {
            self.token
                .clone()
                .ok_or_else(|| ApiError::Transport("connection refused".into()))
        }

        async fn user_info(&self, _: &Credentials) -> Result<UserInfo, ApiError> {
            Err(coded(401, "authentication_required"))
        }
    }

    struct StubRemote {
        response: Result<ProbeResponse, String>,
    }

    #[async_trait]
    impl RemoteHost for StubRemote {
        async fn probe(&self, _: &str) -> Result<ProbeResponse, ProbeError> {
            self.response.clone().map_err(ProbeError::Transport)
        }

        fn raw_url(&self, id: &str) -> String {
            format!("https://portal.test/file/{id}")
        }
    }

    fn probe_ok() -> ProbeResponse {
        ProbeResponse {
            status: 206,
            content_type: Some("image/png".into()),
            content_range: Some("bytes 0-1023/4096".into()),
            content_disposition: Some("inline; filename=\"cat.png\"".into()),
            head: Bytes::from_static(b"\x89PNG"),
        }
    }

    fn service_with(content: StubContent, remote: Result<ProbeResponse, String>) -> ViewerService {
        ViewerService::new(
            Arc::new(content),
            Arc::new(StubRemote { response: remote }),
            Arc::new(SeededRandom::new(1)),
            ViewerOptions {
                service_name: "filedeck".into(),
                website_address: "https://filedeck.test".into(),
                captcha_site_key: "captcha-key".into(),
                proxy_api_requests: false,
            },
        )
    }

    fn service(content: StubContent) -> ViewerService {
        service_with(content, Ok(probe_ok()))
    }

    fn content_with_files(files: &[FileInfo]) -> StubContent {
        StubContent {
            files: files
                .iter()
                .map(|file| (file.id.clone(), Ok(file.clone())))
                .collect(),
            token: Some("token-1".into()),
            ..StubContent::default()
        }
    }

    #[tokio::test]
    async fn partially_resolved_ids_render_a_single_file() {
        let service = service(content_with_files(&[file("a", 100)]));

        let page = service
            .resolve_files(&Session::anonymous(), "a,b", false)
            .await
            .expect("one file resolves");

        assert_eq!(page.title, "a.txt ~ filedeck");
        assert_eq!(page.status, StatusCode::OK);
        assert!(matches!(&page.data.payload, ViewerPayload::File(f) if f.id == "a"));
        assert_eq!(page.data.view_token, "token-1");
        assert_eq!(page.data.captcha_key, "captcha-key");
        assert_eq!(page.og.url, "https://filedeck.test/u/a");
    }

    #[tokio::test]
    async fn several_files_become_a_synthetic_list() {
        let service = service(content_with_files(&[file("a", 20_000_000), file("b", 20_000_000)]));

        let page = service
            .resolve_files(&Session::anonymous(), "a,b", false)
            .await
            .expect("both resolve");

        assert_eq!(page.title, "2 files on filedeck");
        match &page.data.payload {
            ViewerPayload::List(list) => {
                assert_eq!(list.title, "Multiple files");
                let ids: Vec<_> = list.files.iter().map(|f| f.info.id.as_str()).collect();
                assert_eq!(ids, ["a", "b"]);
            }
            other => panic!("expected list payload, got {}", other.kind()),
        }
        assert_eq!(page.data.ads.floater, FloaterAd::Propeller);
    }

    #[tokio::test]
    async fn nothing_resolved_is_not_found() {
        let service = service(StubContent::default());
        let err = service
            .resolve_files(&Session::anonymous(), "x,y", false)
            .await
            .expect_err("nothing resolves");
        assert!(matches!(err, ViewerError::FileNotFound));
    }

    #[tokio::test]
    async fn server_error_aborts_resolution() {
        let mut content = content_with_files(&[file("a", 1)]);
        content.files.insert("b".into(), Err(coded(503, "unavailable")));
        let service = service(content);

        let err = service
            .resolve_files(&Session::anonymous(), "a,b", false)
            .await
            .expect_err("server error aborts");
        assert!(matches!(err, ViewerError::Upstream(UpstreamFailure::Api(_))));
    }

    #[tokio::test]
    async fn taken_down_file_still_renders_with_451() {
        let mut blocked = file("b", 1);
        blocked.abuse_type = "copyright".into();
        let service = service(content_with_files(&[file("a", 1), blocked]));

        let page = service
            .resolve_files(&Session::anonymous(), "a,b", false)
            .await
            .expect("files resolve");
        assert_eq!(page.status, StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS);
        assert_eq!(page.data.payload.kind(), "list");
    }

    #[tokio::test]
    async fn subscribers_without_ads_disable_user_ads() {
        let service = service(content_with_files(&[file("a", 1)]));
        let user = UserInfo {
            username: "alice".into(),
            email: String::new(),
            subscription: Subscription {
                id: "pro".into(),
                name: "Pro".into(),
                disable_ad_display: true,
            },
        };

        let page = service
            .resolve_files(&Session::authenticated("key", user), "a", true)
            .await
            .expect("file resolves");
        assert!(!page.data.user_ads_enabled);
        assert!(page.data.file_ads_enabled);
        assert!(page.data.embedded);

        let page = service
            .resolve_files(&Session::anonymous(), "a", false)
            .await
            .expect("file resolves");
        assert!(page.data.user_ads_enabled);
    }

    #[tokio::test]
    async fn view_token_failure_leaves_token_empty() {
        let mut content = content_with_files(&[file("a", 1)]);
        content.token = None;
        let page = service(content)
            .resolve_files(&Session::anonymous(), "a", false)
            .await
            .expect("file resolves");
        assert_eq!(page.data.view_token, "");
    }

    #[tokio::test]
    async fn demo_skips_the_content_api() {
        let page = service(StubContent::default())
            .resolve_files(&Session::anonymous(), DEMO_FILE_ID, false)
            .await
            .expect("demo always resolves");

        assert_eq!(page.data.ads.banner, BannerAd::AAds);
        assert!(page.data.file_ads_enabled);
        assert!(page.data.user_ads_enabled);
        match &page.data.payload {
            ViewerPayload::File(file) => {
                assert_eq!(file.id, "demo");
                assert_eq!(file.mime_type, "text/demo");
            }
            other => panic!("expected file payload, got {}", other.kind()),
        }
    }

    #[tokio::test]
    async fn list_resolution() {
        let list = ListInfo {
            id: "L1".into(),
            title: "Holiday".into(),
            date_created: datetime!(2023-02-03 4:05:06 UTC),
            files: vec![ListFile::from(file("a", 1)), ListFile::from(file("b", 2))],
        };
        let mut content = StubContent::default();
        content.lists.insert("L1".into(), Ok(list));
        content.lists.insert(
            "empty".into(),
            Ok(ListInfo {
                id: "empty".into(),
                title: "Nothing".into(),
                date_created: datetime!(2023-02-03 4:05:06 UTC),
                files: Vec::new(),
            }),
        );
        content.lists.insert("broken".into(), Err(coded(500, "internal")));
        let service = service(content);
        let session = Session::anonymous();

        let page = service
            .resolve_list(&session, "L1", false)
            .await
            .expect("list resolves");
        assert_eq!(page.title, "Holiday ~ filedeck");
        assert_eq!(page.og.url, "https://filedeck.test/l/L1");
        assert_eq!(page.og.image, "https://filedeck.test/api/file/a/thumbnail");

        assert!(matches!(
            service.resolve_list(&session, "missing", false).await,
            Err(ViewerError::ListNotFound)
        ));
        assert!(matches!(
            service.resolve_list(&session, "empty", false).await,
            Err(ViewerError::ListNotFound)
        ));
        assert!(matches!(
            service.resolve_list(&session, "broken", false).await,
            Err(ViewerError::Upstream(_))
        ));
    }

    #[tokio::test]
    async fn remote_content_becomes_a_skylink() {
        let service = service(StubContent::default());
        let page = service
            .resolve_remote("AAB", true)
            .await
            .expect("probe succeeds");

        assert_eq!(page.title, "cat.png ~ Skynet");
        assert!(page.data.embedded);
        match &page.data.payload {
            ViewerPayload::Skylink(file) => {
                assert_eq!(file.size, 4096);
                assert_eq!(file.mime_type, "image/png");
            }
            other => panic!("expected skylink payload, got {}", other.kind()),
        }
        assert_eq!(service.remote_download_url("AAB"), "https://portal.test/file/AAB");
    }

    #[tokio::test]
    async fn remote_failures_map_to_viewer_errors() {
        let mut missing_range = probe_ok();
        missing_range.content_range = None;
        let err = service_with(StubContent::default(), Ok(missing_range))
            .resolve_remote("x", false)
            .await
            .expect_err("no content range");
        assert!(matches!(err, ViewerError::Upstream(UpstreamFailure::Remote(_))));

        let mut gone = probe_ok();
        gone.status = 404;
        let err = service_with(StubContent::default(), Ok(gone))
            .resolve_remote("x", false)
            .await
            .expect_err("remote 404");
        assert!(matches!(err, ViewerError::FileNotFound));

        let err = service_with(StubContent::default(), Err("timed out".into()))
            .resolve_remote("x", false)
            .await
            .expect_err("transport failure");
        assert!(matches!(err, ViewerError::Upstream(UpstreamFailure::Probe(_))));
    }

    #[test]
    fn user_agent_signals() {
        assert!(is_legacy_browser("Mozilla/4.0 (compatible; MSIE 8.0; Windows NT 6.1)"));
        assert!(is_legacy_browser("Mozilla/5.0 (Windows NT 10.0; Trident/7.0; rv:11.0)"));
        assert!(!is_legacy_browser("Mozilla/5.0 (X11; Linux x86_64) Firefox/120.0"));
        assert!(is_downloader("Wget/1.21.4"));
        assert!(!is_downloader("curl/8.0 Wget/1.0"));
    }
}
