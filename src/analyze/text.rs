// src/analyze/text.rs
//! Text helpers shared by every processor stage.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("tag regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));
static RE_SYMBOLS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[^\w\s.,!?;:'"-]"#).expect("symbol regex"));

/// Decode entities, strip markup, collapse whitespace, drop symbols that are
/// neither word characters nor sentence punctuation.
pub fn clean_text(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }
    let decoded = html_escape::decode_html_entities(s);
    let out = RE_TAGS.replace_all(&decoded, "");
    let out = RE_WS.replace_all(&out, " ");
    let out = RE_SYMBOLS.replace_all(&out, "");
    out.trim().to_string()
}

/// `"{title}. {content}"` after cleaning; every stage reads this.
pub fn combined_text(title: &str, content: &str) -> String {
    clean_text(&format!("{title}. {content}"))
}

/// Split after `.`, `!` or `?` when followed by whitespace. Empty pieces are dropped.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut start = 0usize;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let end = i + c.len_utf8();
        let Some(&(_, next)) = chars.peek() else {
            break;
        };
        if !next.is_whitespace() {
            continue;
        }
        push_trimmed(&mut out, &text[start..end]);
        // swallow the whole whitespace run
        let mut resume = end;
        while let Some(&(j, w)) = chars.peek() {
            if !w.is_whitespace() {
                break;
            }
            resume = j + w.len_utf8();
            chars.next();
        }
        start = resume;
    }
    push_trimmed(&mut out, &text[start..]);
    out
}

fn push_trimmed(out: &mut Vec<String>, piece: &str) {
    let t = piece.trim();
    if !t.is_empty() {
        out.push(t.to_string());
    }
}

/// Case-sensitive substring check; callers pass lowercased text and keywords.
pub fn contains_any<S: AsRef<str>>(text: &str, keywords: &[S]) -> bool {
    keywords.iter().any(|k| text.contains(k.as_ref()))
}

/// Number of distinct keywords present as substrings.
pub fn count_hits<S: AsRef<str>>(text: &str, keywords: &[S]) -> usize {
    keywords.iter().filter(|k| text.contains(k.as_ref())).count()
}

pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Cut to `max` chars, preferring the last word boundary.
pub fn truncate_at_word(s: &str, max: usize) -> String {
    if char_len(s) <= max {
        return s.to_string();
    }
    let head: String = s.chars().take(max).collect();
    match head.rfind(char::is_whitespace) {
        Some(pos) if pos > 0 => head[..pos].trim_end().to_string(),
        _ => head,
    }
}

/// Uppercase the first character, leave the rest untouched.
pub fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
