//! Filename sanitization for downloaded artifacts.
//!
//! Titles chosen by uploaders end up as file names, so everything the tool
//! writes is renamed to a single safe path component before it is recorded.

use std::path::{Component, Path};

/// Linux NAME_MAX.
const NAME_MAX: usize = 255;

/// Name used when sanitization leaves nothing usable.
const FALLBACK_NAME: &str = "download";

/// Sanitize a candidate filename into a single safe path component.
///
/// - Replaces NUL, `/`, `\`, and control characters with `_`
/// - Collapses consecutive underscores
/// - Trims leading/trailing spaces, dots and underscores
/// - Limits length to 255 bytes, keeping the extension when possible
/// - Never returns an empty string, `.` or `..`
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_underscore = false;

    for c in name.chars() {
        let replacement = if c == '\0' || c == '/' || c == '\\' || c.is_control() {
            '_'
        } else {
            c
        };

        if replacement == '_' {
            if !prev_underscore {
                out.push('_');
            }
            prev_underscore = true;
        } else {
            out.push(replacement);
            prev_underscore = false;
        }
    }

    let trimmed = out.trim_matches(|c: char| c == ' ' || c == '.' || c == '_');
    if trimmed.is_empty() {
        return FALLBACK_NAME.to_string();
    }

    truncate_keeping_extension(trimmed)
}

fn truncate_keeping_extension(name: &str) -> String {
    if name.len() <= NAME_MAX {
        return name.to_string();
    }

    let (stem, ext) = match name.rfind('.') {
        Some(idx) if idx > 0 && name.len() - idx <= 16 => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    };

    let mut take = NAME_MAX - ext.len();
    while take > 0 && !stem.is_char_boundary(take) {
        take -= 1;
    }
    format!("{}{}", &stem[..take], ext)
}

/// Check that `name` is exactly one normal path component.
///
/// Rejects empty names, `.`/`..`, anything containing a separator, and
/// absolute or prefixed paths.
pub fn is_safe_component(name: &str) -> bool {
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains('\0') {
        return false;
    }

    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
