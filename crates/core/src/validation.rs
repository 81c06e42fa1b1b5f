use crate::error::{Result, ShortreelsError};

pub const MIN_WORDS: usize = 5;
pub const MAX_WORDS: usize = 50;

/// Whitespace-separated word count of the trimmed input.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Whether the generate action is enabled for this text.
pub fn can_generate(text: &str) -> bool {
    (MIN_WORDS..=MAX_WORDS).contains(&word_count(text))
}

pub fn validate_text(text: &str) -> Result<&str> {
    let words = word_count(text);
    if !(MIN_WORDS..=MAX_WORDS).contains(&words) {
        return Err(ShortreelsError::Validation {
            words,
            min: MIN_WORDS,
            max: MAX_WORDS,
        });
    }
    Ok(text.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        vec!["word"; n].join(" ")
    }

    #[test]
    fn boundaries_are_inclusive() {
        assert!(!can_generate(&words(4)));
        assert!(can_generate(&words(5)));
        assert!(can_generate(&words(50)));
        assert!(!can_generate(&words(51)));
    }

    #[test]
    fn empty_and_whitespace_only() {
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("   \n\t "), 0);
        assert!(!can_generate("   "));
    }

    #[test]
    fn mixed_whitespace_counts_words_once() {
        assert_eq!(word_count("  a\tb\n\nc   d  e "), 5);
    }

    #[test]
    fn validate_trims_and_reports_count() {
        assert_eq!(validate_text("  one two three four five ").unwrap(), "one two three four five");
        match validate_text("too short") {
            Err(ShortreelsError::Validation { words, .. }) => assert_eq!(words, 2),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
