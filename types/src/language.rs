//! ISO 639-1 language codes.

use serde::{Deserialize, Serialize};

/// A lowercase two-letter ISO 639-1 language code.
///
/// Detection is best-effort (it comes back from an LLM), so construction
/// normalizes rather than validates: anything that doesn't look like a
/// two-letter code falls back to English.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Language(String);

impl Language {
    pub const ENGLISH: &'static str = "en";

    /// Parse a detector reply into a language code.
    ///
    /// Accepts surrounding whitespace, punctuation, and mixed case; a reply
    /// that doesn't start with two ASCII letters yields English.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let cleaned: String = raw
            .trim()
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .take(2)
            .flat_map(char::to_lowercase)
            .collect();

        if cleaned.len() == 2 {
            Self(cleaned)
        } else {
            Self::english()
        }
    }

    #[must_use]
    pub fn english() -> Self {
        Self(Self::ENGLISH.to_string())
    }

    #[must_use]
    pub fn is_english(&self) -> bool {
        self.0 == Self::ENGLISH
    }

    #[must_use]
    pub fn code(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::Language;

    #[test]
    fn parse_plain_code() {
        assert_eq!(Language::parse("fr").code(), "fr");
        assert!(!Language::parse("fr").is_english());
    }

    #[test]
    fn parse_noisy_reply() {
        assert_eq!(Language::parse("  ES\n").code(), "es");
        assert_eq!(Language::parse("de.").code(), "de");
    }

    #[test]
    fn parse_garbage_falls_back_to_english() {
        assert!(Language::parse("").is_english());
        assert!(Language::parse("1234").is_english());
        assert!(Language::parse("?").is_english());
    }

    #[test]
    fn parse_truncates_long_replies() {
        // "english" starts with "en"
        assert!(Language::parse("english").is_english());
    }
}
