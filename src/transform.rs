//! Content item → normalized markdown document.
//!
//! The preamble format is a contract: the provider's system instruction
//! tells the model to read `url:` from the frontmatter and the title from
//! the H1, so the exact shape below must not drift independently of the
//! prompt in [`crate::query`].

use regex::Regex;

use crate::models::ContentItem;

/// Convert a content item's rendered HTML body into the markdown document
/// uploaded to the File Search store.
pub fn to_document(item: &ContentItem) -> String {
    let cleaned = strip_noise(&item.body_html);

    // html2text degrades gracefully; on malformed input fall back to the
    // cleaned source so the item still gets indexed.
    let body = html2text::from_read(cleaned.as_bytes(), 120).unwrap_or_else(|_| cleaned.clone());

    format!(
        "---\nurl: {}\ntitle: {}\n---\n\n# {}\n\n{}",
        item.url, item.title, item.title, body
    )
}

/// Remove script and style blocks before text conversion. Non-greedy,
/// case-insensitive, matches across lines.
pub fn strip_noise(html: &str) -> String {
    let script = Regex::new(r"(?is)<script\b[^>]*>.*?</script>").expect("static pattern");
    let style = Regex::new(r"(?is)<style\b[^>]*>.*?</style>").expect("static pattern");

    let without_scripts = script.replace_all(html, "");
    style.replace_all(&without_scripts, "").into_owned()
}
