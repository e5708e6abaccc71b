//! Content type detection from the leading bytes of an upload.

/// Number of leading bytes inspected when sniffing.
pub const SNIFF_LEN: usize = 512;

pub const OCTET_STREAM: &str = "application/octet-stream";
pub const TEXT_PLAIN: &str = "text/plain";

/// Fixed-offset signatures: (offset, magic bytes, content type).
const SIGNATURES: &[(usize, &[u8], &str)] = &[
    (0, b"\x89PNG\r\n\x1a\n", "image/png"),
    (0, b"\xFF\xD8\xFF", "image/jpeg"),
    (0, b"GIF87a", "image/gif"),
    (0, b"GIF89a", "image/gif"),
    (0, b"II*\x00", "image/tiff"),
    (0, b"MM\x00*", "image/tiff"),
    (0, b"\x00\x00\x01\x00", "image/x-icon"),
    (0, b"BM", "image/bmp"),
    (0, b"%PDF-", "application/pdf"),
    (0, b"PK\x03\x04", "application/zip"),
    (0, b"\x1F\x8B", "application/gzip"),
    (0, b"7z\xBC\xAF\x27\x1C", "application/x-7z-compressed"),
    (0, b"Rar!\x1A\x07", "application/x-rar-compressed"),
    (0, b"OggS", "audio/ogg"),
    (0, b"fLaC", "audio/flac"),
    (0, b"ID3", "audio/mpeg"),
    (0, b"\xFF\xFB", "audio/mpeg"),
    (0, b"\x1A\x45\xDF\xA3", "video/webm"),
    (0, b"wOFF", "font/woff"),
    (0, b"wOF2", "font/woff2"),
];

/// Detect the content type of `data`, normally the first [`SNIFF_LEN`]
/// bytes of a file. Unknown content falls back to `text/plain` when it looks
/// like UTF-8 text and `application/octet-stream` otherwise.
pub fn sniff(data: &[u8]) -> &'static str {
    if data.is_empty() {
        return OCTET_STREAM;
    }

    // RIFF container: form type at offset 8
    if data.len() >= 12 && &data[0..4] == b"RIFF" {
        match &data[8..12] {
            b"WEBP" => return "image/webp",
            b"WAVE" => return "audio/wav",
            b"AVI " => return "video/x-msvideo",
            _ => {}
        }
    }

    // ISO base media: "ftyp" box at offset 4, major brand at 8
    if data.len() >= 12 && &data[4..8] == b"ftyp" {
        return match &data[8..12] {
            b"avif" | b"avis" => "image/avif",
            b"heic" | b"heix" | b"mif1" => "image/heic",
            b"qt  " => "video/quicktime",
            b"M4A " => "audio/mp4",
            _ => "video/mp4",
        };
    }

    for (offset, magic, content_type) in SIGNATURES {
        if data.len() >= offset + magic.len() && &data[*offset..offset + magic.len()] == *magic {
            return *content_type;
        }
    }

    if looks_like_text(data) {
        return sniff_markup(data).unwrap_or(TEXT_PLAIN);
    }

    OCTET_STREAM
}

/// Markup formats recognised by their leading tag.
fn sniff_markup(data: &[u8]) -> Option<&'static str> {
    let start = data.iter().position(|b| !b.is_ascii_whitespace())?;
    let head: Vec<u8> = data[start..]
        .iter()
        .take(16)
        .map(|b| b.to_ascii_lowercase())
        .collect();

    if head.starts_with(b"<?xml") {
        // SVG documents usually carry an XML prolog
        let rest = String::from_utf8_lossy(data).to_ascii_lowercase();
        return Some(if rest.contains("<svg") {
            "image/svg+xml"
        } else {
            "text/xml"
        });
    }
    if head.starts_with(b"<svg") {
        return Some("image/svg+xml");
    }
    if head.starts_with(b"<!doctype html") || head.starts_with(b"<html") {
        return Some("text/html");
    }
    None
}

fn looks_like_text(data: &[u8]) -> bool {
    let valid = match std::str::from_utf8(data) {
        Ok(_) => true,
        // A multi-byte character cut off by the sniff window is still text
        Err(e) => e.error_len().is_none(),
    };

    valid
        && !data
            .iter()
            .any(|&b| b.is_ascii_control() && !matches!(b, b'\t' | b'\n' | b'\r' | b'\x0C'))
}

/// Whether `content_type` is in the allow-list. An empty list allows all.
/// Parameters such as `; charset=` are ignored and matching is case-insensitive.
pub fn is_allowed(content_type: &str, allowed: &[String]) -> bool {
    if allowed.is_empty() {
        return true;
    }
    let wanted = essence(content_type);
    allowed
        .iter()
        .any(|entry| wanted.eq_ignore_ascii_case(essence(entry)))
}

fn essence(content_type: &str) -> &str {
    content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
}
