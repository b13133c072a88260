//! Text normalization shared by value objects.
//!
//! # Invariants
//! - Normalization is idempotent: normalizing twice equals normalizing once.

use once_cell::sync::Lazy;
use regex::Regex;

static PUNCTUATION_RE: Lazy<Regex> = Lazy::new(|| {
    // `/` and `#` survive: they appear in street and unit designations.
    Regex::new(r"[\p{S}\p{P}&&[^/#]]").expect("valid punctuation regex")
});

/// Drops punctuation, collapses whitespace and capitalizes every word.
///
/// `"  1234   main st."` becomes `"1234 Main St"`.
pub fn normalize_words(text: &str) -> String {
    PUNCTUATION_RE
        .replace_all(text, "")
        .split_whitespace()
        .map(capitalize_fully)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Trims and upper-cases a code such as a state or postal code.
pub fn normalize_code(text: &str) -> String {
    text.trim().to_uppercase()
}

fn capitalize_fully(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_code, normalize_words};

    #[test]
    fn words_are_capitalized_and_stripped() {
        assert_eq!(normalize_words("  1234   main st. "), "1234 Main St");
        assert_eq!(normalize_words("SUITE #200/b"), "Suite #200/b");
        assert_eq!(normalize_words("george  jungleman"), "George Jungleman");
        assert_eq!(normalize_words("o'brien - smith"), "Obrien Smith");
        assert_eq!(normalize_words(""), "");
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = normalize_words("apt. 4, anytown!");
        assert_eq!(normalize_words(&once), once);
    }

    #[test]
    fn words_after_leading_punctuation_are_capitalized() {
        let once = normalize_words("x -y");
        assert_eq!(once, "X Y");
        assert_eq!(normalize_words(&once), once);
        assert_eq!(normalize_words("(north) wing"), "North Wing");
    }

    #[test]
    fn codes_are_trimmed_and_uppercased() {
        assert_eq!(normalize_code(" ca "), "CA");
        assert_eq!(normalize_code("94005"), "94005");
    }
}
