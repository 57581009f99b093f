//! Turn a ranged probe of the remote host into file metadata.

use filedeck_api_types::FileInfo;
use thiserror::Error;
use time::OffsetDateTime;

use crate::application::content::ProbeResponse;
use crate::application::sniff::{self, OCTET_STREAM};

/// Number of bytes requested from the remote host.
pub const PROBE_BYTES: u64 = 1024;

/// Display name used when the host does not send a usable file name.
pub const PLACEHOLDER_NAME: &str = "skynet_file";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RemoteMetadataError {
    #[error("remote host returned server error status {0}")]
    ServerStatus(u16),
    #[error("remote host returned client error status {0}")]
    ClientStatus(u16),
    #[error("remote host did not send a Content-Range header")]
    MissingContentRange,
    #[error("remote host sent an unusable Content-Range header `{0}`")]
    InvalidContentRange(String),
}

/// Build synthetic metadata for remote content from its probe response.
pub fn file_from_probe(
    id: &str,
    probe: &ProbeResponse,
    now: OffsetDateTime,
) -> Result<FileInfo, RemoteMetadataError> {
    if probe.status >= 500 {
        return Err(RemoteMetadataError::ServerStatus(probe.status));
    }
    if probe.status >= 400 {
        return Err(RemoteMetadataError::ClientStatus(probe.status));
    }

    let range = probe
        .content_range
        .as_deref()
        .filter(|value| !value.trim().is_empty())
        .ok_or(RemoteMetadataError::MissingContentRange)?;
    let size = content_range_total(range)
        .ok_or_else(|| RemoteMetadataError::InvalidContentRange(range.to_string()))?;

    let name = probe
        .content_disposition
        .as_deref()
        .and_then(disposition_filename)
        .unwrap_or_else(|| PLACEHOLDER_NAME.to_string());

    let mime_type = content_type(probe, &name);

    Ok(FileInfo {
        id: id.to_string(),
        name,
        size,
        views: 0,
        bandwidth_used: 0,
        date_upload: now,
        date_last_view: now,
        mime_type,
        description: String::new(),
        thumbnail_href: String::new(),
        abuse_type: String::new(),
        show_ads: false,
    })
}

fn content_type(probe: &ProbeResponse, name: &str) -> String {
    let declared = probe
        .content_type
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty() && *value != OCTET_STREAM);
    if let Some(declared) = declared {
        return declared.to_string();
    }

    let sniffed = sniff::detect(&probe.head);
    if sniffed != OCTET_STREAM {
        return sniffed.to_string();
    }

    mime_guess::from_path(name)
        .first()
        .map(|mime| mime.essence_str().to_string())
        .unwrap_or_else(|| OCTET_STREAM.to_string())
}

/// Total length from a `bytes <start>-<end>/<total>` header.
pub fn content_range_total(header: &str) -> Option<u64> {
    let spec = header.trim().strip_prefix("bytes")?.trim_start();
    let (_, total) = spec.split_once('/')?;
    total.trim().parse().ok()
}

/// `filename` parameter of a `Content-Disposition` header.
///
/// Returns `None` when the header does not parse or carries no file name.
pub fn disposition_filename(header: &str) -> Option<String> {
    let mut parts = split_params(header)?.into_iter();
    let disposition = parts.next()?;
    if disposition.is_empty() || !disposition.bytes().all(is_token_byte) {
        return None;
    }

    let mut filename = None;
    for param in parts {
        let (key, value) = param.split_once('=')?;
        let key = key.trim();
        if key.is_empty() || !key.bytes().all(is_token_byte) {
            return None;
        }
        let value = unquote(value.trim())?;
        if key.eq_ignore_ascii_case("filename") {
            filename = Some(value);
        }
    }

    filename.filter(|name| !name.is_empty())
}

/// Split on `;` outside of quoted strings.
fn split_params(header: &str) -> Option<Vec<String>> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for c in header.chars() {
        match c {
            _ if escaped => {
                current.push(c);
                escaped = false;
            }
            '\\' if in_quotes => {
                current.push(c);
                escaped = true;
            }
            '"' => {
                current.push(c);
                in_quotes = !in_quotes;
            }
            ';' if !in_quotes => parts.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    if in_quotes {
        return None;
    }
    let last = current.trim();
    if !last.is_empty() {
        parts.push(last.to_string());
    }
    Some(parts)
}

fn unquote(value: &str) -> Option<String> {
    let Some(inner) = value.strip_prefix('"') else {
        return (!value.is_empty() && value.bytes().all(is_token_byte)).then(|| value.to_string());
    };
    let inner = inner.strip_suffix('"')?;

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            out.push(chars.next()?);
        } else {
            out.push(c);
        }
    }
    Some(out)
}

fn is_token_byte(byte: u8) -> bool {
    byte.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?=".contains(&byte)
}
