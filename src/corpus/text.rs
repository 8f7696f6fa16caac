//! Persian text normalization and tokenization.
//!
//! Every string that reaches an encoder, a regex or the vocabulary passes
//! through [`normalize`] first so that index time and query time agree on
//! the exact character forms.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

/// Zero-width non-joiner, used inside Persian compound words.
pub const ZWNJ: char = '\u{200C}';

/// Harakat, superscript alef and tatweel.
static DIACRITICS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[\u{064B}-\u{0652}\u{0670}\u{0640}]").expect("valid regex"));

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Runs of two or more word characters, excluding joiners.
static LEXICAL_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\w--[\u{200C}\u{200D}]]{2,}").expect("valid regex"));

/// Word tokens for the static word-vector strategy; ZWNJ compounds stay whole.
static WORD_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\w\u{200C}]+").expect("valid regex"));

/// Normalizes Persian text.
///
/// - Arabic yeh, alef maksura, kaf and teh marbuta become their Persian forms
/// - Arabic-Indic and ASCII digits become Persian digits
/// - diacritics and tatweel are dropped
/// - runs of whitespace collapse to one space, ends are trimmed
#[must_use]
pub fn normalize(text: &str) -> String {
    let mapped: String = text
        .chars()
        .map(|c| match c {
            '٠'..='٩' => char::from_u32(c as u32 - '٠' as u32 + '۰' as u32).unwrap_or(c),
            '0'..='9' => char::from_u32(c as u32 - '0' as u32 + '۰' as u32).unwrap_or(c),
            _ => persian_letter(c),
        })
        .collect();

    let stripped = DIACRITICS.replace_all(&mapped, "");
    WHITESPACE.replace_all(stripped.trim(), " ").into_owned()
}

fn persian_letter(c: char) -> char {
    match c {
        'ي' | 'ى' => 'ی',
        'ك' => 'ک',
        'ة' | 'ۀ' => 'ه',
        _ => c,
    }
}

/// Normalizes an entity regex so it matches normalized documents.
///
/// Only letter forms and diacritics change; digits and whitespace are left
/// alone because they may be part of the regex syntax.
#[must_use]
pub fn normalize_pattern(pattern: &str) -> String {
    let mapped: String = pattern.trim().chars().map(persian_letter).collect();
    DIACRITICS.replace_all(&mapped, "").into_owned()
}

/// Splits text into word tokens, dropping punctuation.
///
/// Compounds joined by ZWNJ are kept as a single token; stray joiners at
/// token edges are trimmed.
#[must_use]
pub fn word_tokenize(text: &str) -> Vec<String> {
    WORD_TOKEN
        .find_iter(text)
        .map(|m| m.as_str().trim_matches(ZWNJ))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Lexical analyzer used by the term vocabulary.
///
/// Lower-cases, extracts tokens of at least two word characters (a joiner
/// ends a token), removes stop words, then emits every n-gram with
/// `ngram_range.0 <= n <= ngram_range.1`, unigrams first.
#[must_use]
pub fn analyze(text: &str, stop_words: &HashSet<String>, ngram_range: (usize, usize)) -> Vec<String> {
    let lowered = text.to_lowercase();
    let tokens: Vec<&str> = LEXICAL_TOKEN
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|token| !stop_words.contains(*token))
        .collect();

    let (min_n, max_n) = ngram_range;
    let min_n = min_n.max(1);
    let mut grams = Vec::new();

    for n in min_n..=max_n {
        if n > tokens.len() {
            break;
        }
        if n == 1 {
            grams.extend(tokens.iter().map(|t| (*t).to_string()));
        } else {
            grams.extend(tokens.windows(n).map(|w| w.join(" ")));
        }
    }

    grams
}
