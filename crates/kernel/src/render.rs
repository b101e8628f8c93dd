//! Markdown rendering for post and comment bodies.
//!
//! Bodies are stored as the author submitted them and rendered to HTML at
//! response time. All rendered output passes through `ammonia` so user
//! markup can never inject script, whatever the markdown parser emits.

use pulldown_cmark::{Options, Parser, html};

/// Render markdown to sanitized HTML.
pub fn markdown_to_html(input: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);

    let parser = Parser::new_ext(input, options);
    let mut rendered = String::with_capacity(input.len() * 2);
    html::push_html(&mut rendered, parser);

    ammonia::clean(&rendered)
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn renders_basic_markdown() {
        let html = markdown_to_html("some *emphasis* and `code`");
        assert!(html.contains("<em>emphasis</em>"));
        assert!(html.contains("<code>code</code>"));
    }

    #[test]
    fn strips_script_tags() {
        let html = markdown_to_html("hello <script>alert(1)</script> world");
        assert!(!html.contains("<script"));
        assert!(html.contains("hello"));
    }

    #[test]
    fn strips_event_handlers() {
        let html = markdown_to_html(r#"<a href="https://example.com" onclick="evil()">x</a>"#);
        assert!(!html.contains("onclick"));
    }

    #[test]
    fn renders_strikethrough_extension() {
        let html = markdown_to_html("~~gone~~");
        assert!(html.contains("<del>gone</del>"));
    }
}
