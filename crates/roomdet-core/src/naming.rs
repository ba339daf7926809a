//! Filesystem-safe identifiers for dataset labels and artifact stems.

/// Normalize free-form text into a stable, filesystem-safe name.
///
/// Trims surrounding whitespace, lowercases ASCII letters, and replaces
/// every character that is not an ASCII letter or digit with exactly one
/// `_`. The output only ever contains `[a-z0-9_]`, so the function is
/// idempotent.
pub fn normalize(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}
