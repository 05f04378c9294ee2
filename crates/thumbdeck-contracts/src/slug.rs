pub const DEFAULT_SLUG_LEN: usize = 40;

/// Filesystem-safe identifier for a free-text query or title.
///
/// Output only ever contains `[a-z0-9-]`, never starts or ends with `-`, and is
/// at most `max_len` characters long. Slugging a slug returns it unchanged.
pub fn slugify(text: &str, max_len: usize) -> String {
    let mut slug = String::with_capacity(text.len().min(max_len * 2));
    let mut pending_separator = false;
    for ch in text.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(ch);
        } else if ch == '-' || ch.is_whitespace() {
            pending_separator = true;
        }
    }
    slug.truncate(max_len);
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

pub fn slugify_default(text: &str) -> String {
    slugify(text, DEFAULT_SLUG_LEN)
}
