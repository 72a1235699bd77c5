//! Text to markup conversion for chat messages
//!
//! Both user text and answers from the endpoint go through [`format_message`]
//! before they reach a surface. Escaping happens once, first, so nothing in
//! the raw text can turn into a tag.

use regex::Regex;
use std::sync::OnceLock;

pub const LINE_BREAK: &str = "<br>";
const PARAGRAPH_BREAK: &str = "<br><br>";

fn bold_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*\*(.+?)\*\*").expect("bold pattern is valid"))
}

fn italic_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*(.+?)\*").expect("italic pattern is valid"))
}

fn list_item_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[*-]\s+(.+)$").expect("list item pattern is valid"))
}

/// Escape the five HTML-significant characters.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Convert message text into markup.
///
/// Supports `**bold**`, `*italic*`, `-`/`*` bullet lines, line breaks and
/// blank-line separated paragraphs. Bold must be substituted before italic,
/// otherwise `\*(.+?)\*` would eat half of every `**...**`.
pub fn format_message(text: &str) -> String {
    let escaped = escape_html(text);
    let bolded = bold_pattern().replace_all(&escaped, "<strong>${1}</strong>");
    let emphasized = italic_pattern().replace_all(&bolded, "<em>${1}</em>");
    let with_breaks = emphasized.replace('\n', LINE_BREAK);
    let with_lists = wrap_list_items(&with_breaks);

    with_lists
        .split(PARAGRAPH_BREAK)
        .filter(|segment| !segment.trim().is_empty())
        .map(|segment| format!("<p>{}</p>", segment))
        .collect()
}

/// Turn bullet lines into `<li>` items, one `<ul>` per run of consecutive items.
fn wrap_list_items(markup: &str) -> String {
    let mut blocks: Vec<String> = Vec::new();
    let mut items: Vec<String> = Vec::new();

    for line in markup.split(LINE_BREAK) {
        if let Some(caps) = list_item_pattern().captures(line) {
            items.push(format!("<li>{}</li>", &caps[1]));
            continue;
        }
        if !items.is_empty() {
            blocks.push(format!("<ul>{}</ul>", items.concat()));
            items.clear();
        }
        blocks.push(line.to_string());
    }
    if !items.is_empty() {
        blocks.push(format!("<ul>{}</ul>", items.concat()));
    }

    blocks.join(LINE_BREAK)
}
