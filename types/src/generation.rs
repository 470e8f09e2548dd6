//! Sampling options sent to Ollama.

use serde::{Deserialize, Serialize};

/// Options forwarded as the `options` object of an Ollama generate call.
///
/// Defaults are tuned for grounded answers over retrieved context: low
/// temperature, mild nucleus sampling, and a firm repeat penalty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub temperature: f64,
    pub top_p: f64,
    pub repeat_penalty: f64,
    /// Maximum number of tokens to generate (`num_predict` in Ollama).
    pub num_predict: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            top_p: 0.9,
            repeat_penalty: 1.3,
            num_predict: 256,
        }
    }
}
