//! HTML body helpers: terminal text rendering and link extraction.

use std::sync::LazyLock;

use regex::Regex;

use super::entity::decode_entities;

static HIDDEN_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<!--.*?-->")
        .expect("hidden block pattern is valid")
});

static LIST_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<li\b[^>]*>").expect("list item pattern is valid"));

static BLOCK_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?(?:br|p|div|tr|ul|ol|table|blockquote|h[1-6])\b[^>]*>")
        .expect("block tag pattern is valid")
});

static ANY_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

static HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bhref\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("href pattern is valid")
});

/// Convert HTML to plain text for terminal display.
///
/// - Drops scripts, styles, and comments
/// - Turns block elements into line breaks and `<li>` into `"- item"`
/// - Strips remaining tags and decodes entities
/// - Collapses runs of blank lines and wraps to `width` columns (0 = no wrap)
pub fn html_to_text(html: &str, width: usize) -> String {
    let text = HIDDEN_BLOCK_RE.replace_all(html, "");
    let text = LIST_ITEM_RE.replace_all(&text, "\n- ");
    let text = BLOCK_TAG_RE.replace_all(&text, "\n");
    let text = ANY_TAG_RE.replace_all(&text, "");
    let text = decode_entities(&text).replace('\u{a0}', " ");

    let mut lines: Vec<String> = Vec::new();
    let mut prev_was_blank = true;
    for line in text.lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            if !prev_was_blank {
                lines.push(String::new());
            }
            prev_was_blank = true;
        } else {
            lines.extend(wrap(&collapsed, width));
            prev_was_blank = false;
        }
    }

    lines.join("\n").trim().to_string()
}

/// Greedy word wrap.
fn wrap(line: &str, width: usize) -> Vec<String> {
    if width == 0 || line.chars().count() <= width {
        return vec![line.to_string()];
    }
    let mut out = Vec::new();
    let mut current = String::new();
    for word in line.split(' ') {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > width && !current.is_empty() {
            out.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// `href` targets in document order, entity-decoded and de-duplicated.
pub fn extract_links(html: &str) -> Vec<String> {
    let mut links: Vec<String> = Vec::new();
    for caps in HREF_RE.captures_iter(html) {
        let Some(raw) = caps.get(1).or_else(|| caps.get(2)) else {
            continue;
        };
        let link = decode_entities(raw.as_str().trim());
        if !link.is_empty() && !links.contains(&link) {
            links.push(link);
        }
    }
    links
}
