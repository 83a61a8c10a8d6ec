use percent_encoding::percent_decode_str;
use url::Url;

/// Fallback name when a URL carries no usable path segment.
pub const FALLBACK_FILENAME: &str = "download.bin";

/// Derive a filesystem-safe filename from the last path segment of a URL.
///
/// The segment is percent-decoded, then sanitized. URLs with no path
/// segment (e.g. `http://host/`) fall back to [`FALLBACK_FILENAME`].
pub fn infer_filename_from_url(url: &str) -> String {
    let candidate = Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_owned))
        })
        .filter(|s| !s.is_empty());

    match candidate {
        Some(segment) => {
            let decoded = percent_decode_str(&segment)
                .decode_utf8()
                .map(|s| s.into_owned())
                .unwrap_or(segment);
            let cleaned = sanitize_filename(&decoded);
            if cleaned.is_empty() {
                FALLBACK_FILENAME.to_string()
            } else {
                cleaned
            }
        }
        None => FALLBACK_FILENAME.to_string(),
    }
}

/// Sanitize filename to remove invalid characters
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            _ => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Format a byte count for display, e.g. `3.25 MB`. `None` renders as `?`.
pub fn human_bytes(n: Option<u64>) -> String {
    let Some(n) = n else {
        return "?".to_string();
    };
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = n as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}
