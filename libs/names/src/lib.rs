//! # depfleet-names
//!
//! Sanitization of repository identifiers into safe object-store keys.
//!
//! Discovered repository identifiers are arbitrary strings (`owner/repo`,
//! mixed case, punctuation). Object names must be DNS-label-safe: lowercase
//! alphanumerics, `-` and `.`, at most 253 characters, starting and ending
//! with an alphanumeric. [`sanitize`] maps the former to the latter
//! deterministically so that repeated discovery of the same repository
//! always yields the same child object name.

mod error;

pub use error::NameError;

/// Maximum length of a sanitized name.
pub const MAX_NAME_LEN: usize = 253;

/// Sanitize an arbitrary repository identifier into a safe object name.
///
/// Rules, applied in order:
/// - lowercase the input
/// - map `/` and `_` to `-`
/// - map every character outside `[a-z0-9.-]` to `-`
/// - collapse runs of `-` into one
/// - if the first character is not alphanumeric, trim leading `-` and
///   prefix `repo-`
/// - if the last character is not alphanumeric, trim trailing `-` and
///   suffix `-repo`
/// - truncate to [`MAX_NAME_LEN`], re-trimming any trailing
///   non-alphanumeric the cut left behind
///
/// Empty input maps to empty output. A non-empty input with no
/// alphanumeric, `/`, `_` or `.` character is rejected with
/// [`NameError::InvalidName`].
pub fn sanitize(raw: &str) -> Result<String, NameError> {
    if raw.is_empty() {
        return Ok(String::new());
    }
    if !raw
        .chars()
        .any(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '_' | '.'))
    {
        return Err(NameError::InvalidName(raw.to_string()));
    }

    let mut out = String::with_capacity(raw.len());
    for c in raw.to_lowercase().chars() {
        let mapped = match c {
            '/' | '_' => '-',
            'a'..='z' | '0'..='9' | '.' | '-' => c,
            _ => '-',
        };
        if mapped == '-' && out.ends_with('-') {
            continue;
        }
        out.push(mapped);
    }

    if !out.starts_with(|c: char| c.is_ascii_alphanumeric()) {
        out = format!("repo-{}", out.trim_start_matches('-'));
    }
    if !out.ends_with(|c: char| c.is_ascii_alphanumeric()) {
        out = format!("{}-repo", out.trim_end_matches('-'));
    }

    if out.len() > MAX_NAME_LEN {
        // Output is ASCII by construction, so byte truncation is safe.
        out.truncate(MAX_NAME_LEN);
        while out.ends_with(|c: char| !c.is_ascii_alphanumeric()) {
            out.pop();
        }
    }

    Ok(out)
}
