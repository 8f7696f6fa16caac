//! Persian stop words excluded from the lexical vocabulary.

use std::collections::HashSet;

/// Common Persian function words.
///
/// The last two entries are fragments produced when a ZWNJ compound such as
/// `نمی‌رود` or `کتاب‌های` is split by the lexical analyzer.
const PERSIAN_STOP_WORDS: &[&str] = &[
    "و", "در", "به", "از", "که", "این", "را", "با", "است", "برای", "آن", "یک", "خود", "تا",
    "کرد", "بر", "هم", "نیز", "گفت", "وی", "شد", "دارد", "ما", "اما", "یا", "شده", "باید",
    "هر", "آنها", "بود", "او", "دیگر", "دو", "مورد", "می", "شود", "کند", "وجود", "بین", "پیش",
    "شده_است", "پس", "نظر", "اگر", "همه", "یکی", "حال", "هستند", "من", "کنند", "نیست", "باشد",
    "چه", "بی", "اند", "بوده", "ای", "چون", "زیرا", "همین", "ز", "چو", "بدو", "ازو", "بدان",
    "همی", "اگرچه", "نه", "هیچ", "چنین", "چنان", "نمی", "های",
];

/// Builds the stop-word set, extended with caller-supplied words.
#[must_use]
pub fn stop_words(extra: &[String]) -> HashSet<String> {
    PERSIAN_STOP_WORDS
        .iter()
        .map(|w| (*w).to_string())
        .chain(extra.iter().cloned())
        .collect()
}
