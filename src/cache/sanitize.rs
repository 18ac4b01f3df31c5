//! Client filename sanitization
//!
//! Upload filenames are attacker-controlled. Only the final path segment is
//! kept, so a name like `../../etc/passwd` can never escape its staging
//! directory.

/// Characters allowed through untouched besides ASCII alphanumerics
const ALLOWED_PUNCTUATION: &[char] = &['_', '@', ')', '(', '~', '.', '-'];

/// Placeholder for names that sanitize to nothing usable
const EMPTY_NAME: &str = "_";

/// Turn an arbitrary client-supplied filename into a safe basename.
///
/// Takes the last `/` or `\` separated segment, percent-decodes it, replaces
/// every character outside `[0-9A-Za-z_@)(~.-]` with `_` and collapses runs of
/// `_`. Names that end up empty or made only of dots become `"_"`.
pub fn clean_name(raw: &str) -> String {
    let basename = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let decoded = urlencoding::decode_binary(basename.as_bytes());
    let decoded = String::from_utf8_lossy(&decoded);

    let mut cleaned = String::with_capacity(decoded.len());
    for c in decoded.chars() {
        let c = if c.is_ascii_alphanumeric() || ALLOWED_PUNCTUATION.contains(&c) {
            c
        } else {
            '_'
        };
        if c == '_' && cleaned.ends_with('_') {
            continue;
        }
        cleaned.push(c);
    }

    if cleaned.chars().all(|c| c == '.') {
        return EMPTY_NAME.to_string();
    }
    cleaned
}
