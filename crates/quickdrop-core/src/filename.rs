//! Upload filename normalization
//!
//! Client-supplied names become the public identity of a stored file and part of its
//! on-disk name, so they are reduced to a safe, bounded form before persistence.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

const FALLBACK_NAME: &str = "unnamed_file";
const MAX_STEM_CHARS: usize = 100;
const MAX_TOTAL_CHARS: usize = 150;

static INVALID_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).expect("static regex is valid")
});

/// Split at the final dot of the last path element. A dot before a separator is part of the stem.
fn split_extension(name: &str) -> (&str, &str) {
    let last_sep = name.rfind(|c: char| c == '/' || c == '\\');
    match name.rfind('.') {
        Some(idx) if last_sep.map_or(true, |sep| idx > sep) => name.split_at(idx),
        _ => (name, ""),
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Normalize a client-supplied filename.
///
/// The result is never empty, contains no path separators, reserved characters or control
/// characters, and is at most 150 characters long (stem at most 100).
pub fn normalize_filename(filename: &str) -> String {
    if filename.is_empty() {
        return FALLBACK_NAME.to_string();
    }

    let (stem, ext) = split_extension(filename);

    let ext = INVALID_CHARS.replace_all(ext, "_").into_owned();
    let stem = INVALID_CHARS.replace_all(stem, "_");
    let stem = stem.trim_matches(|c: char| c == ' ' || c == '.');

    let mut stem = if stem.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        truncate_chars(stem, MAX_STEM_CHARS)
    };

    let ext_chars = ext.chars().count();
    if stem.chars().count() + ext_chars > MAX_TOTAL_CHARS {
        stem = match MAX_TOTAL_CHARS.checked_sub(ext_chars) {
            Some(available) if available > 0 => truncate_chars(&stem, available),
            _ => "file".to_string(),
        };
    }

    let cleaned = format!("{}{}", stem, ext);
    if cleaned.chars().count() > MAX_TOTAL_CHARS {
        // Extension alone exceeds the bound.
        return truncate_chars(&cleaned, MAX_TOTAL_CHARS);
    }
    cleaned
}

/// Make `name` unique within `taken` by appending ` (n)` before the extension.
///
/// The returned name is inserted into `taken`.
pub fn unique_display_name(name: &str, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.to_string()) {
        return name.to_string();
    }

    let (stem, ext) = match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    };

    let mut n = 1usize;
    loop {
        let candidate = format!("{} ({}){}", stem, n, ext);
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Lowercased extension without the dot, if any.
pub fn extension(name: &str) -> Option<String> {
    name.rfind('.')
        .map(|idx| name[idx + 1..].to_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Whether the name looks like a previewable image.
pub fn is_image(name: &str) -> bool {
    extension(name)
        .map(|ext| crate::constants::IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// MIME type inferred from the extension.
pub fn content_type_for(name: &str) -> &'static str {
    match extension(name).as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("txt") | Some("log") | Some("md") => "text/plain; charset=utf-8",
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("json") => "application/json",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("tar") => "application/x-tar",
        Some("gz") => "application/gzip",
        Some("mp4") => "video/mp4",
        Some("mp3") => "audio/mpeg",
        _ => "application/octet-stream",
    }
}
