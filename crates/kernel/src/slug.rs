//! Slug derivation for content URLs.

/// Convert text into a URL-safe slug.
///
/// Transforms to lowercase, replaces non-alphanumeric characters with
/// hyphens, collapses consecutive hyphens, trims leading/trailing hyphens,
/// and truncates to `max_len` on a word boundary where possible.
pub fn slugify(text: &str, max_len: usize) -> String {
    let slug: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();

    // Collapse consecutive hyphens and trim
    let mut result = String::with_capacity(slug.len());
    let mut prev_was_hyphen = true; // Start true to skip leading hyphens
    for c in slug.chars() {
        if c == '-' {
            if !prev_was_hyphen {
                result.push('-');
            }
            prev_was_hyphen = true;
        } else {
            result.push(c);
            prev_was_hyphen = false;
        }
    }

    while result.ends_with('-') {
        result.pop();
    }

    if result.len() > max_len {
        // result is pure ASCII (alphanumerics + hyphens from the char map
        // above), so byte indexing is safe at any position.
        let truncated = &result[..max_len];
        if let Some(last_hyphen) = truncated.rfind('-') {
            return truncated[..last_hyphen].to_string();
        }
        return truncated.to_string();
    }

    result
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn slugify_basic() {
        assert_eq!(slugify("Hello World", 100), "hello-world");
        assert_eq!(slugify("My First Blog Post", 100), "my-first-blog-post");
    }

    #[test]
    fn slugify_special_chars() {
        assert_eq!(slugify("What's New?", 100), "what-s-new");
        assert_eq!(slugify("Post #42: The Answer", 100), "post-42-the-answer");
        assert_eq!(slugify("foo & bar + baz", 100), "foo-bar-baz");
    }

    #[test]
    fn slugify_consecutive_hyphens() {
        assert_eq!(slugify("hello   world", 100), "hello-world");
        assert_eq!(slugify("a---b", 100), "a-b");
    }

    #[test]
    fn slugify_leading_trailing() {
        assert_eq!(slugify("  hello  ", 100), "hello");
        assert_eq!(slugify("---hello---", 100), "hello");
    }

    #[test]
    fn slugify_empty() {
        assert_eq!(slugify("", 100), "");
        assert_eq!(slugify("---", 100), "");
        assert_eq!(slugify("日本語だけ", 100), "");
    }

    #[test]
    fn slugify_truncates_on_word_boundary() {
        assert_eq!(slugify("one two three", 8), "one-two");
        let long = "a".repeat(200);
        assert_eq!(slugify(&long, 100).len(), 100);
    }
}
