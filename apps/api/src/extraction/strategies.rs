//! Field-level extraction strategies. Each returns `None` when it finds nothing;
//! ordering and fallback live in the caller.

use once_cell::sync::Lazy;
use regex::Regex;

/// Characters taken before / after a keyword for the windowed numeric search.
const WINDOW_BEFORE: usize = 50;
const WINDOW_AFTER: usize = 100;

const SECTION_WORDS: &[&str] = &["assessment", "summary", "recommendation", "synthesis"];

/// Numeric idioms tried in order inside a keyword window.
static SCORE_IDIOMS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)(\d+(?:\.\d+)?)\s*/\s*10\b",
        r"(?i)(\d+(?:\.\d+)?)\s+out\s+of\s+10\b",
        r"(?i)score[:\s]+(\d+(?:\.\d+)?)",
        r"(?i)rating[:\s]+(\d+(?:\.\d+)?)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid score idiom"))
    .collect()
});

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

pub fn clamp_score(raw: f64) -> f64 {
    if raw.is_nan() {
        return 0.0;
    }
    raw.clamp(0.0, 10.0)
}

fn parse_score(digits: &str) -> Option<f64> {
    digits.parse::<f64>().ok().map(clamp_score)
}

/// `<label>: N/10`, tolerating bold markers around the label and colon.
pub fn labeled_score_pattern(label: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(
        r"(?i){}\s*\**\s*:\s*\**\s*(\d+(?:\.\d+)?)\s*/\s*10\b",
        regex::escape(label)
    ))
}

pub fn labeled_score(text: &str, pattern: &Regex) -> Option<f64> {
    pattern
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| parse_score(m.as_str()))
}

pub fn keyword_pattern(keyword: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("(?i){}", regex::escape(keyword)))
}

/// Scans keyword occurrences in order and returns the first score found near one.
///
/// The text following the keyword is searched before the full window, so a score
/// written just before a different keyword is not picked up first.
pub fn windowed_score(text: &str, keywords: &[Regex]) -> Option<f64> {
    for keyword in keywords {
        for hit in keyword.find_iter(text) {
            let lo = back_chars(text, hit.start(), WINDOW_BEFORE);
            let hi = forward_chars(text, hit.start(), WINDOW_AFTER);
            for region in [&text[hit.start()..hi], &text[lo..hi]] {
                for idiom in SCORE_IDIOMS.iter() {
                    if let Some(score) = idiom
                        .captures(region)
                        .and_then(|c| c.get(1))
                        .and_then(|m| parse_score(m.as_str()))
                    {
                        return Some(score);
                    }
                }
            }
        }
    }
    None
}

/// Byte offset `n` characters before `at` (or 0).
fn back_chars(text: &str, at: usize, n: usize) -> usize {
    text[..at]
        .char_indices()
        .rev()
        .take(n)
        .last()
        .map_or(at, |(i, _)| i)
}

/// Byte offset `n` characters after `at` (or the end of text).
fn forward_chars(text: &str, at: usize, n: usize) -> usize {
    text[at..]
        .char_indices()
        .nth(n)
        .map_or(text.len(), |(i, _)| at + i)
}

/// `**<label>:**` or `**<label>**:` followed by content up to the next `**`.
pub fn bold_header_pattern(label: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(
        r"(?i)\*\*\s*{}\s*(?::\s*\*\*|\*\*\s*:)",
        regex::escape(label)
    ))
}

/// A markdown heading line also ends the section.
pub fn bold_section(text: &str, header: &Regex) -> Option<String> {
    let start = header.find(text)?.end();
    let rest = &text[start..];
    let end = [rest.find("**"), rest.find("\n#")]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(rest.len());
    non_empty(clean(&rest[..end]))
}

/// Line-based capture after a header line that mentions `keyword` together with a
/// section word, until the next header-like line that does not mention `keyword`.
pub fn prose_section(text: &str, keywords: &[String]) -> Option<String> {
    for keyword in keywords {
        let keyword = keyword.to_lowercase();
        let mut captured: Vec<&str> = Vec::new();
        let mut capturing = false;

        for line in text.lines() {
            let trimmed = line.trim();
            let lower = trimmed.to_lowercase();
            let mentions_keyword = lower.contains(&keyword);

            if !capturing {
                if mentions_keyword && SECTION_WORDS.iter().any(|w| lower.contains(w)) {
                    capturing = true;
                }
                continue;
            }

            if is_header_line(trimmed) {
                if mentions_keyword {
                    continue;
                }
                break;
            }
            if !trimmed.is_empty() {
                captured.push(trimmed);
            }
        }

        if let Some(section) = non_empty(clean(&captured.join(" "))) {
            return Some(section);
        }
    }
    None
}

fn is_header_line(trimmed: &str) -> bool {
    trimmed.starts_with('#')
        || (trimmed.starts_with("**")
            && trimmed.len() > 4
            && (trimmed.ends_with("**") || trimmed.ends_with("**:")))
}

/// Drops emphasis markers and collapses runs of whitespace.
pub fn clean(text: &str) -> String {
    let stripped = text.replace('*', "");
    WHITESPACE.replace_all(stripped.trim(), " ").into_owned()
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
