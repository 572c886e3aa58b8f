//! URL path helpers shared by the web-facing providers

/// Normalize a user-supplied path prefix: leading slash, no trailing slash.
///
/// A missing or blank prefix normalizes to the empty string.
pub fn normalize_prefix(prefix: Option<&str>) -> String {
    let trimmed = prefix.unwrap_or_default().trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

/// Why a prefix cannot be part of a path, if it cannot.
///
/// Surrounding whitespace is ignored, as in [`normalize_prefix`], so a blank
/// prefix is simply no prefix.
pub fn prefix_problem(prefix: &str) -> Option<&'static str> {
    let prefix = prefix.trim();
    if prefix.chars().any(char::is_whitespace) {
        Some("path prefixes may not contain whitespace")
    } else if prefix.contains(['?', '#']) {
        Some("path prefixes may not contain '?' or '#'")
    } else if prefix.contains("//") {
        Some("path prefixes may not contain empty segments")
    } else {
        None
    }
}

/// Append `path` (which starts with a slash) to a normalized prefix
pub fn join(prefix: &str, path: &str) -> String {
    format!("{}{}", prefix, path)
}
