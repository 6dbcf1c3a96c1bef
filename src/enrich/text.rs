// src/enrich/text.rs
//! Local text helpers: language detection, sentence handling, stub summaries,
//! glossary post-processing.

use once_cell::sync::OnceCell;
use regex::Regex;
use std::collections::BTreeMap;

/// Share of alphabetic characters above which text counts as written in the
/// target language.
const SCRIPT_RATIO: f64 = 0.3;
const STUB_SENTENCES: usize = 2;
const STUB_MIN_SENTENCE_CHARS: usize = 10;
const STUB_PREFIX_CHARS: usize = 200;

fn is_hangul(c: char) -> bool {
    matches!(c, '\u{AC00}'..='\u{D7A3}' | '\u{1100}'..='\u{11FF}' | '\u{3130}'..='\u{318F}')
}

fn is_kana(c: char) -> bool {
    matches!(c, '\u{3040}'..='\u{30FF}')
}

fn is_han(c: char) -> bool {
    matches!(c, '\u{4E00}'..='\u{9FFF}')
}

/// Fraction of alphabetic chars in `text` that belong to `lang`'s script.
/// `None` for languages without a known script or text without letters.
pub fn script_ratio(text: &str, lang: &str) -> Option<f64> {
    let pred: fn(char) -> bool = match lang {
        "ko" => is_hangul,
        "ja" => |c| is_kana(c) || is_han(c),
        "zh" => is_han,
        "en" => |c| c.is_ascii_alphabetic(),
        _ => return None,
    };
    let mut letters = 0usize;
    let mut hits = 0usize;
    for c in text.chars().filter(|c| c.is_alphabetic()) {
        letters += 1;
        if pred(c) {
            hits += 1;
        }
    }
    if letters == 0 {
        return None;
    }
    Some(hits as f64 / letters as f64)
}

/// Whether `text` must go through the translator to reach `target`.
///
/// A source language hint wins. Without one the script heuristic decides;
/// text with no letters never needs translation.
pub fn needs_translation(text: &str, hint: Option<&str>, target: &str) -> bool {
    if text.trim().is_empty() {
        return false;
    }
    if let Some(h) = hint.map(str::trim).filter(|h| !h.is_empty()) {
        let primary = h.split(['-', '_']).next().unwrap_or(h);
        return !primary.eq_ignore_ascii_case(target);
    }
    match script_ratio(text, target) {
        Some(r) => r <= SCRIPT_RATIO,
        None => text.chars().any(char::is_alphabetic),
    }
}

/// Cut `text` to `max` chars, keeping whole chars.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn sentence_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"[^.!?。！？]+(?:[.!?。！？]+|$)").unwrap())
}

/// Split into trimmed sentences, terminators kept.
pub fn split_sentences(text: &str) -> Vec<&str> {
    sentence_re()
        .find_iter(text)
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Keep at most `n` sentences of `text`.
pub fn truncate_sentences(text: &str, n: usize) -> String {
    split_sentences(text)
        .into_iter()
        .take(n)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Locally derived summary used whenever the provider is not consulted or fails.
/// Never empty: falls through sentences, body prefix, title and URL.
pub fn stub_summary(title: &str, body: &str, url: &str) -> String {
    let meaningful: Vec<&str> = split_sentences(body)
        .into_iter()
        .filter(|s| s.chars().count() > STUB_MIN_SENTENCE_CHARS)
        .take(STUB_SENTENCES)
        .collect();
    if !meaningful.is_empty() {
        return meaningful.join(" ");
    }
    let body = body.trim();
    if !body.is_empty() {
        let prefix = truncate_chars(body, STUB_PREFIX_CHARS);
        let capped = truncate_sentences(prefix, STUB_SENTENCES);
        return if capped.is_empty() {
            prefix.trim().to_string()
        } else {
            capped
        };
    }
    let title = title.trim();
    if !title.is_empty() {
        return title.to_string();
    }
    let url = url.trim();
    if !url.is_empty() {
        return url.to_string();
    }
    "(no content)".to_string()
}

/// Term replacements applied to translated text so technical vocabulary comes
/// out the same way in every article.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Glossary {
    // longest term first, so "Large Language Model" wins over "Language Model"
    entries: Vec<(String, String)>,
}

impl Glossary {
    pub fn new(terms: &BTreeMap<String, String>) -> Self {
        let mut entries: Vec<(String, String)> = terms
            .iter()
            .map(|(from, to)| (from.trim().to_string(), to.trim().to_string()))
            .filter(|(from, to)| !from.is_empty() && from != to)
            .collect();
        entries.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()));
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace every glossary term left in `text` by its preferred rendering.
    pub fn apply(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (from, to) in &self.entries {
            if out.contains(from.as_str()) {
                out = out.replace(from.as_str(), to);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn korean_text_skips_translation() {
        assert!(!needs_translation("대규모 언어 모델 서빙 가이드", None, "ko"));
        assert!(needs_translation("Serving large language models", None, "ko"));
        // mostly English with a Korean word
        assert!(needs_translation("Kubernetes autoscaling deep dive 정리", None, "ko"));
    }

    #[test]
    fn hint_beats_heuristic() {
        assert!(!needs_translation("Hello world", Some("ko-KR"), "ko"));
        assert!(needs_translation("안녕하세요", Some("en"), "ko"));
        assert!(!needs_translation("", Some("en"), "ko"));
        assert!(!needs_translation("12345 ---", None, "ko"));
    }

    #[test]
    fn sentences_split_on_latin_and_cjk_terminators() {
        let s = split_sentences("First one. Second!  Third? 네 번째。 tail");
        assert_eq!(s, vec!["First one.", "Second!", "Third?", "네 번째。", "tail"]);
        assert_eq!(truncate_sentences("A a. B b. C c. D d.", 3), "A a. B b. C c.");
    }

    #[test]
    fn stub_summary_prefers_meaningful_sentences() {
        let body = "Short. This sentence is long enough to count. Another long sentence follows here. Third.";
        assert_eq!(
            stub_summary("T", body, "u"),
            "This sentence is long enough to count. Another long sentence follows here."
        );
    }

    #[test]
    fn stub_summary_is_never_empty() {
        assert_eq!(stub_summary("T", "tiny", "u"), "tiny");
        assert_eq!(stub_summary("Title", "  ", "u"), "Title");
        assert_eq!(stub_summary("", "", "https://x.test/a"), "https://x.test/a");
        assert!(!stub_summary("", "", "").is_empty());
    }

    #[test]
    fn stub_summary_caps_short_sentences() {
        let body = "Hi there. Ok then. Go now. Yes sir. No way. Fine. Done. ".repeat(3);
        let s = stub_summary("T", &body, "u");
        assert_eq!(s, "Hi there. Ok then.");
        assert!(split_sentences(&s).len() <= STUB_SENTENCES);
    }

    #[test]
    fn glossary_prefers_longer_terms() {
        let terms: BTreeMap<String, String> = [
            ("Language Model", "언어 모델"),
            ("Large Language Model", "대형 언어 모델"),
            ("MLOps", "MLOps"),
            ("  ", "x"),
        ]
        .into_iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect();
        let g = Glossary::new(&terms);
        assert!(!g.is_empty());
        assert_eq!(
            g.apply("Large Language Model 서빙과 Language Model 평가, MLOps"),
            "대형 언어 모델 서빙과 언어 모델 평가, MLOps"
        );
        assert!(Glossary::new(&BTreeMap::new()).is_empty());
    }

    #[test]
    fn truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("한국어텍스트", 3), "한국어");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
