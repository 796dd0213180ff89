use unicode_normalization::UnicodeNormalization;

/// Turns free text into a URL-safe identifier.
///
/// Accents are stripped, remaining non-ASCII characters dropped, and anything
/// that is not alphanumeric, an underscore, a hyphen or whitespace is removed.
/// Runs of whitespace and hyphens become a single hyphen.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut separator = false;

    for c in text.nfkd().filter(char::is_ascii) {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_alphanumeric() || c == '_' {
            if separator && !slug.is_empty() {
                slug.push('-');
            }
            separator = false;
            slug.push(c);
        } else if c.is_ascii_whitespace() || c == '-' {
            separator = true;
        }
    }

    slug.trim_matches(|c| c == '-' || c == '_').to_owned()
}

pub fn book_slug(title: &str, author: &str) -> String {
    let slug = slugify(&format!("{title} {author}"));
    match slug.is_empty() {
        true => "book".into(),
        false => slug,
    }
}

/// Returns `base` if it is not in `taken`, otherwise the first of `base-2`,
/// `base-3`, ... that is free.
pub fn deduplicate(base: &str, taken: &[String]) -> String {
    if !taken.iter().any(|t| t == base) {
        return base.to_owned();
    }

    (2..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_owned())
}
