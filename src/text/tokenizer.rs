use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SPLITTER: Regex =
        Regex::new(r"[^\p{L}\p{N}\p{Han}]+").expect("tokenizer pattern is valid");

    static ref STOP_WORDS: HashSet<&'static str> = [
        "的", "了", "和", "是", "在", "就", "与", "及", "为", "对",
        "a", "the", "and", "of",
    ]
    .into_iter()
    .collect();
}


/// Lowercases `text` and splits it on anything that is not a letter, digit or
/// CJK ideograph, dropping stop words.
pub fn tokenize(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let lowered = text.to_lowercase();
    SPLITTER
        .split(&lowered)
        .map(str::trim)
        .filter(|token| !token.is_empty() && !STOP_WORDS.contains(token))
        .map(str::to_string)
        .collect()
}
