//! Approximate token counting using tiktoken.
//!
//! Counts use the `o200k_base` encoding, which is not the tokenizer the
//! local models actually run; it is close enough for budget decisions
//! (trimming context before a prompt exceeds the model's input window),
//! which always leave headroom anyway.

use std::sync::OnceLock;
use tiktoken_rs::{CoreBPE, o200k_base};

/// The tiktoken encoder loads vocabulary data on first use, so it is
/// created once and shared by every `TokenCounter`.
static ENCODER: OnceLock<Option<CoreBPE>> = OnceLock::new();

fn get_encoder() -> Option<&'static CoreBPE> {
    ENCODER.get_or_init(|| o200k_base().ok()).as_ref()
}

/// Thread-safe approximate token counter.
///
/// Falls back to byte-length estimates if the encoder fails to initialize,
/// which overcounts and therefore trims early rather than overflowing.
#[derive(Clone, Copy)]
pub struct TokenCounter {
    encoder: Option<&'static CoreBPE>,
}

impl std::fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCounter")
            .field("encoder", &self.encoder.as_ref().map(|_| "<CoreBPE>"))
            .finish()
    }
}

impl TokenCounter {
    #[must_use]
    pub fn new() -> Self {
        let encoder = get_encoder();
        if encoder.is_none() {
            tracing::error!(
                "Failed to initialize tiktoken o200k_base encoder. Falling back to byte-length estimates."
            );
        }

        Self { encoder }
    }

    /// Counts the number of tokens in a string.
    #[must_use]
    pub fn count_str(&self, text: &str) -> u32 {
        let len = match self.encoder {
            Some(encoder) => encoder.encode_ordinary(text).len(),
            None => text.len(),
        };

        u32::try_from(len).unwrap_or(u32::MAX)
    }
}

impl Default for TokenCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::TokenCounter;

    #[test]
    fn count_str_empty_string() {
        let counter = TokenCounter::new();
        assert_eq!(counter.count_str(""), 0);
    }

    #[test]
    fn count_str_simple_text() {
        let counter = TokenCounter::new();

        let tokens = counter.count_str("The quick brown fox jumps over the lazy dog.");
        assert!(tokens >= 5);
        assert!(tokens <= 20);
    }

    #[test]
    fn multiple_counters_share_encoder() {
        let counter1 = TokenCounter::new();
        let counter2 = TokenCounter::default();

        let text = "The quick brown fox";
        assert_eq!(counter1.count_str(text), counter2.count_str(text));
    }
}
