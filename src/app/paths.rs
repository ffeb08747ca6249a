//! Destination path composition
//!
//! Album directories and track file names are built from user templates.
//! Substituted values go through [`sanitize`] so that metadata can never
//! introduce separators or characters the filesystem rejects. Destinations
//! longer than [`MAX_PATH_LENGTH`] get a shortened, hash-suffixed file name.

use std::path::{Path, PathBuf};

use crate::app::models::{Album, Track};
use crate::constants::paths::{
    FORBIDDEN_CHARS, HASH_SEPARATOR, HASH_SUFFIX_LENGTH, MAX_PATH_LENGTH, REPLACEMENT_CHAR,
};

/// Makes a string safe to use as a single path segment
///
/// Forbidden characters (`\ / : * ? " < > |`) and line breaks become `_`,
/// then every run of whitespace collapses to a single space.
pub fn sanitize(value: &str) -> String {
    let mut sanitized = String::with_capacity(value.len());
    let mut in_whitespace = false;

    for c in value.chars() {
        let c = if FORBIDDEN_CHARS.contains(&c) || c == '\r' || c == '\n' {
            REPLACEMENT_CHAR
        } else {
            c
        };

        if c.is_whitespace() {
            if !in_whitespace {
                sanitized.push(' ');
            }
            in_whitespace = true;
        } else {
            sanitized.push(c);
            in_whitespace = false;
        }
    }

    sanitized
}

/// Expands the downloads-location template for an album
///
/// Supported placeholders: `{artist}`, `{album}`, `{year}`, `{month}`, `{day}`.
/// Only the substituted values are sanitized; separators written in the
/// template itself are kept.
pub fn album_directory(template: &str, album: &Album) -> PathBuf {
    let location = expand(template, |key| {
        album_value(key, album).map(|value| sanitize(&value))
    });
    PathBuf::from(location)
}

/// Expands the file-name template for a track
///
/// Supported placeholders: `{artist}`, `{title}`, `{tracknum}` (two digits),
/// plus the album-level `{album}`, `{year}`, `{month}`, `{day}`. The whole
/// result is sanitized since it must be a single path segment.
pub fn track_file_name(template: &str, album: &Album, track: &Track) -> String {
    let name = expand(template, |key| match key {
        "title" => Some(track.title.clone()),
        "tracknum" => Some(format!("{:02}", track.number)),
        _ => album_value(key, album),
    });
    sanitize(&name)
}

/// Value of an album-level placeholder
fn album_value(key: &str, album: &Album) -> Option<String> {
    match key {
        "artist" => Some(album.artist.clone()),
        "album" => Some(album.title.clone()),
        "year" => Some(album.year().to_string()),
        "month" => Some(album.month().to_string()),
        "day" => Some(album.day().to_string()),
        _ => None,
    }
}

/// Replaces every `{key}` of `template` in a single pass
///
/// Substituted text is never scanned again, so metadata containing braces
/// stays literal. Unknown placeholders are kept as written.
fn expand(template: &str, value: impl Fn(&str) -> Option<String>) -> String {
    let mut expanded = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        expanded.push_str(&rest[..open]);
        let tail = &rest[open..];
        let Some(close) = tail.find('}') else {
            rest = tail;
            break;
        };
        match value(&tail[1..close]) {
            Some(substituted) => {
                expanded.push_str(&substituted);
                rest = &tail[close + 1..];
            }
            None => {
                expanded.push('{');
                rest = &tail[1..];
            }
        }
    }

    expanded.push_str(rest);
    expanded
}

/// File name of an album's cover art: the album title plus the URL's extension
pub fn artwork_file_name(album: &Album) -> String {
    let extension = url::Url::parse(&album.artwork_url)
        .ok()
        .and_then(|url| {
            Path::new(url.path())
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| format!(".{}", ext))
        })
        .unwrap_or_default();
    format!("{}{}", sanitize(&album.title), extension)
}

/// Joins a directory and file name, shortening the name if the result is too long
///
/// When the composed path exceeds [`MAX_PATH_LENGTH`] characters, the file
/// stem is cut down and suffixed with `~` and the first hex digits of the MD5
/// of the full original name, keeping the extension. The result is
/// deterministic and two different long names sharing a prefix still map to
/// different files.
pub fn fit_path(directory: &Path, file_name: &str) -> PathBuf {
    let full = directory.join(file_name);
    if char_len(&full) <= MAX_PATH_LENGTH {
        return full;
    }

    let (stem, extension) = split_extension(file_name);
    let digest = format!("{:x}", md5::compute(file_name.as_bytes()));
    let hash = &digest[..HASH_SUFFIX_LENGTH];

    // Room left for the stem once directory, separator, marker, hash and
    // extension are accounted for
    let directory_len = char_len(&directory.join(""));
    let fixed = directory_len + 1 + HASH_SUFFIX_LENGTH + extension.chars().count();
    let budget = MAX_PATH_LENGTH.saturating_sub(fixed);

    let shortened = if budget == 0 {
        format!("{}{}", hash, extension)
    } else {
        let prefix: String = stem.chars().take(budget).collect();
        format!("{}{}{}{}", prefix, HASH_SEPARATOR, hash, extension)
    };

    tracing::debug!(
        "Destination too long, shortened {} to {}",
        file_name,
        shortened
    );
    directory.join(shortened)
}

fn char_len(path: &Path) -> usize {
    path.to_string_lossy().chars().count()
}

fn split_extension(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(index) if index > 0 => file_name.split_at(index),
        _ => (file_name, ""),
    }
}
