//! Content type detection from leading bytes.

use imagesize::ImageType;

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Guess a MIME type from the first bytes of a file. Falls back to
/// [`OCTET_STREAM`] when nothing matches.
pub fn detect(head: &[u8]) -> &'static str {
    if let Some(mime) = imagesize::image_type(head).ok().and_then(image_mime) {
        return mime;
    }
    if let Some(mime) = signature_mime(head) {
        return mime;
    }
    if looks_like_html(head) {
        return "text/html; charset=utf-8";
    }
    if is_text(head) {
        return "text/plain; charset=utf-8";
    }
    OCTET_STREAM
}

fn image_mime(kind: ImageType) -> Option<&'static str> {
    match kind {
        ImageType::Png => Some("image/png"),
        ImageType::Jpeg => Some("image/jpeg"),
        ImageType::Gif => Some("image/gif"),
        ImageType::Webp => Some("image/webp"),
        ImageType::Bmp => Some("image/bmp"),
        ImageType::Tiff => Some("image/tiff"),
        ImageType::Ico => Some("image/x-icon"),
        ImageType::Psd => Some("image/vnd.adobe.photoshop"),
        _ => None,
    }
}

fn signature_mime(head: &[u8]) -> Option<&'static str> {
    const PREFIXES: &[(&[u8], &str)] = &[
        (b"%PDF-", "application/pdf"),
        (b"PK\x03\x04", "application/zip"),
        (b"\x1f\x8b", "application/gzip"),
        (b"7z\xbc\xaf\x27\x1c", "application/x-7z-compressed"),
        (b"Rar!\x1a\x07", "application/vnd.rar"),
        (b"OggS", "application/ogg"),
        (b"fLaC", "audio/flac"),
        (b"ID3", "audio/mpeg"),
        (b"\x7fELF", "application/x-executable"),
        (b"MZ", "application/vnd.microsoft.portable-executable"),
    ];

    if let Some((_, mime)) = PREFIXES.iter().find(|(magic, _)| head.starts_with(magic)) {
        return Some(mime);
    }

    if head.len() >= 12 && &head[..4] == b"RIFF" {
        match &head[8..12] {
            b"WAVE" => return Some("audio/wav"),
            b"AVI " => return Some("video/x-msvideo"),
            _ => {}
        }
    }

    if head.len() >= 12 && &head[4..8] == b"ftyp" {
        return Some(match &head[8..12] {
            b"qt  " => "video/quicktime",
            b"M4A " => "audio/mp4",
            _ => "video/mp4",
        });
    }

    if head.starts_with(b"\x1a\x45\xdf\xa3") {
        let is_webm = head.windows(4).any(|window| window == b"webm");
        return Some(if is_webm { "video/webm" } else { "video/x-matroska" });
    }

    // MPEG audio frame sync without an ID3 tag.
    if head.len() >= 2 && head[0] == 0xff && head[1] & 0xe0 == 0xe0 {
        return Some("audio/mpeg");
    }

    None
}

fn looks_like_html(head: &[u8]) -> bool {
    let start = head
        .iter()
        .position(|byte| !byte.is_ascii_whitespace())
        .unwrap_or(head.len());
    let prefix: Vec<u8> = head[start..]
        .iter()
        .take(14)
        .map(u8::to_ascii_lowercase)
        .collect();
    prefix.starts_with(b"<!doctype html") || prefix.starts_with(b"<html")
}

fn is_text(head: &[u8]) -> bool {
    if head.is_empty() {
        return false;
    }
    // The probe may cut a multi-byte character in half at the end.
    let text = match std::str::from_utf8(head) {
        Ok(text) => text,
        Err(err) if err.error_len().is_none() => match std::str::from_utf8(&head[..err.valid_up_to()]) {
            Ok(text) => text,
            Err(_) => return false,
        },
        Err(_) => return false,
    };
    !text
        .chars()
        .any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t' | '\x0c'))
}
