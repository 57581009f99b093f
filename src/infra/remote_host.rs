//! Ranged probes against the remote content portal.

use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::{
    Client, Response, Url,
    header::{CONTENT_DISPOSITION, CONTENT_RANGE, CONTENT_TYPE, HeaderName, RANGE},
};
use tracing::debug;

use crate::application::content::{ProbeError, ProbeResponse, RemoteHost};
use crate::application::remote::PROBE_BYTES;

use super::{api_client::user_agent, error::InfraError};

#[derive(Clone, Debug)]
pub struct PortalRemoteHost {
    client: Client,
    portal: Url,
}

impl PortalRemoteHost {
    pub fn new(portal: Url, timeout: Duration) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(user_agent())
            .timeout(timeout)
            .build()
            .map_err(|err| {
                InfraError::configuration(format!("failed to build remote host client: {err}"))
            })?;
        Ok(Self { client, portal })
    }

    fn file_url(&self, id: &str) -> Url {
        let mut url = self.portal.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["file", id]);
        }
        url
    }
}

#[async_trait]
impl RemoteHost for PortalRemoteHost {
    async fn probe(&self, id: &str) -> Result<ProbeResponse, ProbeError> {
        let url = self.file_url(id);
        debug!(
            target = "filedeck::infra::remote_host",
            url = %url,
            "probing remote content"
        );

        let response = self
            .client
            .get(url)
            .header(RANGE, format!("bytes=0-{}", PROBE_BYTES - 1))
            .send()
            .await
            .map_err(|err| ProbeError::Transport(err.to_string()))?;

        let status = response.status().as_u16();
        let content_type = header_string(&response, CONTENT_TYPE);
        let content_range = header_string(&response, CONTENT_RANGE);
        let content_disposition = header_string(&response, CONTENT_DISPOSITION);
        let head = read_limited(response, PROBE_BYTES as usize).await?;

        Ok(ProbeResponse {
            status,
            content_type,
            content_range,
            content_disposition,
            head,
        })
    }

    fn raw_url(&self, id: &str) -> String {
        self.file_url(id).to_string()
    }
}

fn header_string(response: &Response, name: HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// Read at most `limit` body bytes, even when the host ignores the range.
async fn read_limited(mut response: Response, limit: usize) -> Result<Bytes, ProbeError> {
    let mut buffer = BytesMut::with_capacity(limit);
    while buffer.len() < limit {
        match response
            .chunk()
            .await
            .map_err(|err| ProbeError::Body(err.to_string()))?
        {
            Some(chunk) => {
                let take = chunk.len().min(limit - buffer.len());
                buffer.extend_from_slice(&chunk[..take]);
            }
            None => break,
        }
    }
    Ok(buffer.freeze())
}

#[cfg(test)]
mod tests {
    use httpmock::MockServer;

    use super::*;

    fn host(server: &MockServer) -> PortalRemoteHost {
        let portal = Url::parse(&server.base_url()).expect("valid portal url");
        PortalRemoteHost::new(portal, Duration::from_secs(5)).expect("client")
    }

    #[tokio::test]
    async fn probe_requests_the_first_kilobyte() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("GET")
                    .path("/file/AAB")
                    .header("range", "bytes=0-1023");
                then.status(206)
                    .header("content-type", "video/mp4")
                    .header("content-range", "bytes 0-1023/52428800")
                    .header("content-disposition", "inline; filename=\"clip.mp4\"")
                    .body(vec![7u8; 1024]);
            })
            .await;

        let probe = host(&server).probe("AAB").await.expect("probe");

        mock.assert_async().await;
        assert_eq!(probe.status, 206);
        assert_eq!(probe.content_type.as_deref(), Some("video/mp4"));
        assert_eq!(probe.content_range.as_deref(), Some("bytes 0-1023/52428800"));
        assert_eq!(
            probe.content_disposition.as_deref(),
            Some("inline; filename=\"clip.mp4\"")
        );
        assert_eq!(probe.head.len(), 1024);
    }

    #[tokio::test]
    async fn oversized_bodies_are_truncated() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("GET").path("/file/big");
                then.status(200).body(vec![1u8; 8192]);
            })
            .await;

        let probe = host(&server).probe("big").await.expect("probe");
        assert_eq!(probe.head.len(), PROBE_BYTES as usize);
        assert!(probe.content_range.is_none());
    }

    #[test]
    fn raw_url_points_at_the_portal_file() {
        let portal = Url::parse("https://portal.example.com/").expect("valid url");
        let host = PortalRemoteHost::new(portal, Duration::from_secs(1)).expect("client");
        assert_eq!(host.raw_url("AAB"), "https://portal.example.com/file/AAB");
    }
}
