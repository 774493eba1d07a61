//! Sanitization of provider-generated HTML before it crosses the wire.
//!
//! The model is instructed to answer in HTML, but its output is untrusted:
//! only a fixed allow-list of inline/structural tags survives, everything
//! else is unwrapped to its text content. Anchors keep at most a
//! scheme-validated `href` and are forced to open in a new context with
//! `noopener`. Bare URLs are auto-linked first so plain-text replies still
//! render clickable sources.

use regex::Regex;

/// Tags retained by [`sanitize_answer`]; all others are unwrapped.
const ALLOWED_TAGS: &[&str] = &[
    "p", "br", "b", "strong", "i", "em", "ul", "ol", "li", "a", "h1", "h2", "h3",
];

/// Sanitize a provider reply for rendering as HTML.
pub fn sanitize_answer(html: &str) -> String {
    let linked = autolink(html);

    let tag_re = Regex::new(r"(?s)<[^>]*>").expect("static pattern");
    let mut out = String::with_capacity(linked.len());
    let mut last = 0;

    for m in tag_re.find_iter(&linked) {
        out.push_str(&linked[last..m.start()]);
        out.push_str(&rewrite_tag(m.as_str()));
        last = m.end();
    }
    out.push_str(&linked[last..]);
    out
}

/// Escape user-typed text so it is never interpreted as markup.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Wrap bare URLs in anchors. URLs already inside an attribute value are
/// preceded by `"` or `'` and therefore don't match.
fn autolink(html: &str) -> String {
    let url_re = Regex::new(r#"(^|[\s>])(https?://[^\s<>"']+)"#).expect("static pattern");
    url_re
        .replace_all(html, r#"$1<a href="$2" target="_blank" rel="noopener noreferrer">$2</a>"#)
        .into_owned()
}

/// Rewrite one `<...>` token: allowed tags come back stripped of
/// attributes (anchors with their vetted attribute set), everything else
/// becomes the empty string, leaving surrounding text in place.
fn rewrite_tag(token: &str) -> String {
    let inner = token.trim_start_matches('<').trim_end_matches('>').trim();
    // Comments, doctypes, processing instructions
    if inner.starts_with('!') || inner.starts_with('?') {
        return String::new();
    }

    let closing = inner.starts_with('/');
    let inner = inner.trim_start_matches('/');

    let name: String = inner
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();

    if !ALLOWED_TAGS.contains(&name.as_str()) {
        return String::new();
    }

    if closing {
        return format!("</{}>", name);
    }

    if name == "a" {
        return rewrite_anchor(inner);
    }

    format!("<{}>", name)
}

fn rewrite_anchor(inner: &str) -> String {
    let href_re =
        Regex::new(r#"(?i)href\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("static pattern");
    let scheme_re = Regex::new(r"(?i)^https?://").expect("static pattern");

    let href = href_re.captures(inner).and_then(|caps| {
        caps.get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().to_string())
    });

    match href {
        // Only http(s) survives; javascript:, data:, relative, etc. are
        // stripped down to a schemeless anchor.
        Some(url) if scheme_re.is_match(&url) => format!(
            r#"<a href="{}" target="_blank" rel="noopener noreferrer">"#,
            url
        ),
        _ => r#"<a target="_blank" rel="noopener noreferrer">"#.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_unwrapped_to_text_and_javascript_href_stripped() {
        let out = sanitize_answer(r#"<script>alert(1)</script><a href="javascript:x">go</a>"#);
        assert_eq!(
            out,
            r#"alert(1)<a target="_blank" rel="noopener noreferrer">go</a>"#
        );
    }

    #[test]
    fn test_allowed_tags_survive_without_attributes() {
        let out = sanitize_answer(r#"<p class="x" onclick="evil()">Hi <strong>there</strong></p>"#);
        assert_eq!(out, "<p>Hi <strong>there</strong></p>");
    }

    #[test]
    fn test_disallowed_wrapper_unwrapped() {
        let out = sanitize_answer("<div><ul><li>one</li></ul></div>");
        assert_eq!(out, "<ul><li>one</li></ul>");
    }

    #[test]
    fn test_valid_anchor_forced_to_new_context() {
        let out = sanitize_answer(r#"<a href="https://example.com/page">Page</a>"#);
        assert_eq!(
            out,
            r#"<a href="https://example.com/page" target="_blank" rel="noopener noreferrer">Page</a>"#
        );
    }

    #[test]
    fn test_bare_urls_autolinked() {
        let out = sanitize_answer("See https://example.com/docs for details");
        assert!(out.contains(
            r#"<a href="https://example.com/docs" target="_blank" rel="noopener noreferrer">https://example.com/docs</a>"#
        ));
    }

    #[test]
    fn test_existing_href_not_double_linked() {
        let input = r#"<a href="https://example.com">x</a>"#;
        let out = sanitize_answer(input);
        assert_eq!(out.matches("<a ").count(), 1);
    }

    #[test]
    fn test_comments_dropped() {
        assert_eq!(sanitize_answer("a<!-- note -->b"), "ab");
    }

    #[test]
    fn test_case_insensitive_tags() {
        assert_eq!(sanitize_answer("<P>x</P>"), "<p>x</p>");
        assert_eq!(sanitize_answer("<SCRIPT>x</SCRIPT>"), "x");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<b onmouseover="alert('hi')">&</b>"#),
            "&lt;b onmouseover=&quot;alert(&#39;hi&#39;)&quot;&gt;&amp;&lt;/b&gt;"
        );
    }
}
