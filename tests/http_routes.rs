use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{
        Request, StatusCode,
        header::{CONTENT_TYPE, COOKIE, LOCATION, USER_AGENT},
    },
    response::Response,
};
use bytes::Bytes;
use filedeck::{
    application::{
        account::{AccountOptions, AccountService},
        ads::SeededRandom,
        content::{
            AccountApi, ApiError, CodedError, ContentApi, Credentials, ErrorDetail, ProbeError,
            ProbeResponse, RemoteHost,
        },
        viewer::{ViewerOptions, ViewerService},
    },
    infra::http::{HttpState, build_router},
};
use filedeck_api_types::{
    FileInfo, ListInfo, Patron, Subscription, SubscriptionCode, UserInfo, codes,
};
use time::macros::datetime;
use tower::ServiceExt;

const FIREFOX: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";
const OLD_IE: &str = "Mozilla/5.0 (Windows NT 6.1; Trident/7.0; rv:11.0) like Gecko";
const WGET: &str = "Wget/1.21.4";

fn coded(status: u16, code: &str) -> ApiError {
    ApiError::Coded(CodedError {
        status,
        code: code.to_string(),
        message: code.to_string(),
        detail: ErrorDetail::None,
    })
}

fn file(id: &str, name: &str, abuse_type: &str) -> FileInfo {
    FileInfo {
        id: id.to_string(),
        name: name.to_string(),
        size: 2048,
        views: 3,
        bandwidth_used: 0,
        date_upload: datetime!(2021-03-04 05:06:07 UTC),
        date_last_view: datetime!(2021-03-04 05:06:07 UTC),
        mime_type: "image/png".to_string(),
        description: String::new(),
        thumbnail_href: format!("/file/{id}/thumbnail"),
        abuse_type: abuse_type.to_string(),
        show_ads: true,
    }
}

struct StubBackend;

#[async_trait]
impl ContentApi for StubBackend {
    async fn file_info(&self, _credentials: &Credentials, id: &str) -> Result<FileInfo, ApiError> {
        match id {
            "abc" => Ok(file("abc", "cat.png", "")),
            "def" => Ok(file("def", "dog.png", "")),
            "gone" => Ok(file("gone", "leak.zip", "copyright")),
            "broken" => Err(coded(500, "internal")),
            _ => Err(coded(404, codes::NOT_FOUND)),
        }
    }

    async fn list(&self, _credentials: &Credentials, id: &str) -> Result<ListInfo, ApiError> {
        match id {
            "pets" => Ok(ListInfo {
                id: "pets".to_string(),
                title: "Pets".to_string(),
                date_created: datetime!(2021-03-04 05:06:07 UTC),
                files: vec![file("abc", "cat.png", "").into(), file("def", "dog.png", "").into()],
            }),
            _ => Err(coded(404, codes::NOT_FOUND)),
        }
    }

    async fn view_token(&self) -> Result<String, ApiError> {
        Ok("vt-1".to_string())
    }

    async fn user_info(&self, credentials: &Credentials) -> Result<UserInfo, ApiError> {
        match credentials.auth_key.as_deref() {
            Some("good") => Ok(UserInfo {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                subscription: Subscription::default(),
            }),
            _ => Err(coded(401, "authentication_failed")),
        }
    }
}

#[async_trait]
impl AccountApi for StubBackend {
    async fn set_password(
        &self,
        _credentials: &Credentials,
        _old_password: &str,
        _new_password: &str,
    ) -> Result<(), ApiError> {
        Ok(())
    }

    async fn reset_email(
        &self,
        _credentials: &Credentials,
        _new_email: &str,
        _delete: bool,
    ) -> Result<(), ApiError> {
        Ok(())
    }

    async fn confirm_email_reset(&self, key: &str) -> Result<(), ApiError> {
        if key == "valid" {
            Ok(())
        } else {
            Err(coded(404, codes::NOT_FOUND))
        }
    }

    async fn set_username(
        &self,
        _credentials: &Credentials,
        _new_username: &str,
    ) -> Result<(), ApiError> {
        Ok(())
    }

    async fn patron(&self, _credentials: &Credentials, _id: &str) -> Result<Patron, ApiError> {
        Err(coded(404, codes::NOT_FOUND))
    }

    async fn link_patron(&self, _credentials: &Credentials, _id: &str) -> Result<(), ApiError> {
        Ok(())
    }

    async fn subscription(
        &self,
        _credentials: &Credentials,
        id: &str,
    ) -> Result<SubscriptionCode, ApiError> {
        Ok(SubscriptionCode {
            id: id.to_string(),
            used: false,
            duration_days: 30,
            subscription_type: Subscription {
                id: "pro".to_string(),
                name: "Pro".to_string(),
                disable_ad_display: true,
            },
        })
    }

    async fn link_subscription(&self, _credentials: &Credentials, _id: &str) -> Result<(), ApiError> {
        Ok(())
    }
}

struct StubRemote;

#[async_trait]
impl RemoteHost for StubRemote {
    async fn probe(&self, id: &str) -> Result<ProbeResponse, ProbeError> {
        match id {
            "AAB" => Ok(ProbeResponse {
                status: 206,
                content_type: Some("video/mp4".to_string()),
                content_range: Some("bytes 0-1023/5000".to_string()),
                content_disposition: Some("attachment; filename=\"clip.mp4\"".to_string()),
                head: Bytes::new(),
            }),
            "missing" => Ok(ProbeResponse {
                status: 404,
                ..ProbeResponse::default()
            }),
            _ => Err(ProbeError::Transport("connection refused".to_string())),
        }
    }

    fn raw_url(&self, id: &str) -> String {
        format!("https://portal.example.com/file/{id}")
    }
}

fn app() -> Router {
    let backend = Arc::new(StubBackend);
    let content: Arc<dyn ContentApi> = backend.clone();
    let accounts: Arc<dyn AccountApi> = backend;

    let viewer = ViewerService::new(
        content.clone(),
        Arc::new(StubRemote),
        Arc::new(SeededRandom::new(7)),
        ViewerOptions {
            service_name: "filedeck".to_string(),
            website_address: "https://files.example.com".to_string(),
            captcha_site_key: "site-key".to_string(),
            proxy_api_requests: false,
        },
    );
    let accounts = AccountService::new(
        accounts,
        AccountOptions {
            service_name: "filedeck".to_string(),
            subscription_banner_html: "<p>Thanks for your purchase</p>".to_string(),
        },
    );

    build_router(HttpState {
        viewer,
        accounts,
        content,
    })
}

async fn get(uri: &str, agent: &str) -> Response {
    app()
        .oneshot(
            Request::builder()
                .uri(uri)
                .header(USER_AGENT, agent)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("router response")
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

#[tokio::test]
async fn health_endpoint_responds() {
    let response = get("/_health", FIREFOX).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn downloaders_are_redirected_to_raw_content() {
    let files = get("/u/abc,def", WGET).await;
    assert_eq!(files.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&files), "/api/file/abc,def");

    let list = get("/l/pets", WGET).await;
    assert_eq!(list.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&list), "/api/list/pets/zip");

    let remote = get("/s/AAB", WGET).await;
    assert_eq!(remote.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&remote), "https://portal.example.com/file/AAB");
}

#[tokio::test]
async fn demo_file_is_rendered_for_downloaders() {
    let response = get("/u/demo", WGET).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("<title>Demo file ~ filedeck</title>"));
}

#[tokio::test]
async fn downloader_redirects_keep_ids_encoded() {
    let list = get("/l/a%0Ab", WGET).await;
    assert_eq!(list.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&list), "/api/list/a%0Ab/zip");

    let files = get("/u/a%0Ab,c", WGET).await;
    assert_eq!(files.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&files), "/api/file/a%0Ab,c");
}

#[tokio::test]
async fn single_file_renders_the_viewer() {
    let response = get("/u/abc", FIREFOX).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_text(response).await;
    assert!(body.contains("<title>cat.png ~ filedeck</title>"));
    assert!(body.contains(r#""type":"file""#));
    assert!(body.contains(r#""view_token":"vt-1""#));
    assert!(body.contains(r#""embedded":false"#));
    assert!(body.contains("/res/script/file_viewer.js"));
}

#[tokio::test]
async fn embed_flag_is_forwarded() {
    let body = body_text(get("/u/abc?embed", FIREFOX).await).await;
    assert!(body.contains(r#""embedded":true"#));
    assert!(body.contains("file_viewer_embedded"));
}

#[tokio::test]
async fn legacy_browsers_get_the_compat_viewer() {
    let body = body_text(get("/u/abc", OLD_IE).await).await;
    assert!(body.contains("/res/script/file_viewer_compat.js"));
}

#[tokio::test]
async fn unknown_ids_are_dropped_from_multi_file_views() {
    let response = get("/u/abc,nope,def", FIREFOX).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_text(response).await;
    assert!(body.contains("<title>2 files on filedeck</title>"));
    assert!(body.contains(r#""type":"list""#));
}

#[tokio::test]
async fn missing_file_renders_not_found_page() {
    let response = get("/u/nope", FIREFOX).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_text(response).await.contains("File not found"));
}

#[tokio::test]
async fn taken_down_file_is_unavailable_for_legal_reasons() {
    let response = get("/u/gone", FIREFOX).await;
    assert_eq!(response.status(), StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS);
    assert!(body_text(response).await.contains("leak.zip"));
}

#[tokio::test]
async fn server_side_failure_renders_error_page() {
    let response = get("/u/abc,broken", FIREFOX).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_text(response).await.contains("Server error"));
}

#[tokio::test]
async fn list_viewer_and_missing_list() {
    let response = get("/l/pets", FIREFOX).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("<title>Pets ~ filedeck</title>"));

    let missing = get("/l/nope", FIREFOX).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert!(body_text(missing).await.contains("List not found"));
}

#[tokio::test]
async fn remote_content_is_probed() {
    let response = get("/s/AAB", FIREFOX).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("<title>clip.mp4 ~ Skynet</title>"));
    assert!(body.contains(r#""type":"skylink""#));

    let missing = get("/s/missing", FIREFOX).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let down = get("/s/down", FIREFOX).await;
    assert_eq!(down.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn settings_require_a_session() {
    let response = get("/user/settings", FIREFOX).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn settings_page_lists_three_forms() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/user/settings")
                .header(COOKIE, "pd_auth_key=good")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("router response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_text(response).await;
    assert!(body.contains("Account settings for alice"));
    assert!(body.contains(r#"value="password_change""#));
    assert!(body.contains(r#"value="email_change""#));
    assert!(body.contains(r#"value="username_change""#));
}

#[tokio::test]
async fn username_change_is_submitted() {
    let response = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/user/settings")
                .header(COOKIE, "pd_auth_key=good")
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("form=username_change&new_username=bob"))
                .expect("request"),
        )
        .await
        .expect("router response");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        body_text(response)
            .await
            .contains("Success! You are now bob")
    );
}

#[tokio::test]
async fn password_mismatch_is_reported_inline() {
    let response = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/user/settings")
                .header(COOKIE, "pd_auth_key=good")
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(
                    "form=password_change&old_password=a&new_password=b&new_password2=c",
                ))
                .expect("request"),
        )
        .await
        .expect("router response");
    assert!(
        body_text(response)
            .await
            .contains("Password verification failed")
    );
}

#[tokio::test]
async fn email_confirmation_reports_status() {
    let ok = body_text(get("/user/confirm_email?key=valid", FIREFOX).await).await;
    assert!(ok.contains("Your new e-mail address has been saved."));

    let stale = body_text(get("/user/confirm_email?key=old", FIREFOX).await).await;
    assert!(stale.contains("not valid anymore"));
}

#[tokio::test]
async fn patreon_link_without_pledge_fails() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/user/link_patreon?key=p1")
                .header(COOKIE, "pd_auth_key=good")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("router response");
    assert!(body_text(response).await.contains("Patron ID not found"));
}

#[tokio::test]
async fn subscription_activation_shows_banner_and_confirms() {
    let page = app()
        .oneshot(
            Request::builder()
                .uri("/user/link_subscription?key=s1")
                .header(COOKIE, "pd_auth_key=good")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("router response");
    let body = body_text(page).await;
    assert!(body.contains("<p>Thanks for your purchase</p>"));
    assert!(body.contains("30 days"));

    let submitted = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/user/link_subscription?key=s1")
                .header(COOKIE, "pd_auth_key=good")
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("form=link_subscription"))
                .expect("request"),
        )
        .await
        .expect("router response");
    assert!(
        body_text(submitted)
            .await
            .contains("Success! Your account has been upgraded to the Pro plan.")
    );
}
