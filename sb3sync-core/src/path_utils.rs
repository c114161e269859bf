//! Path and file name utilities
//!
//! Sprite names become directory names, so anything a filesystem would
//! interpret (separators, Windows-reserved characters, a leading dot) is
//! percent-escaped. The escape is injective: `unescape_target_name` always
//! recovers the exact display name, including names that contain `_`.

use std::path::{Component, Path};

/// Normalize path to forward slashes
#[inline]
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Convert a path to a normalized string
#[inline]
pub fn path_to_string(path: &Path) -> String {
    normalize_path(&path.to_string_lossy())
}

fn needs_escape(c: char, first: bool) -> bool {
    match c {
        '%' | '/' | '\\' | '<' | '>' | ':' | '"' | '|' | '?' | '*' => true,
        '.' => first,
        c => c.is_control(),
    }
}

/// Escape a target display name into a single safe directory name
pub fn escape_target_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (i, c) in name.chars().enumerate() {
        if needs_escape(c, i == 0) {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{:02X}", byte));
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Recover the display name from an escaped directory name
///
/// Malformed `%` sequences are kept literally.
pub fn unescape_target_name(dir_name: &str) -> String {
    let bytes = dir_name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}

/// True if `name` is a single normal path component (no separators, no `..`)
pub fn is_plain_file_name(name: &str) -> bool {
    if name.is_empty() || name.contains('/') || name.contains('\\') {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
