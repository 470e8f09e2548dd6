//! Llama-guard safety verdicts.

use serde::{Deserialize, Serialize};

/// Outcome of a llama-guard moderation call.
///
/// The guard model replies with `safe`, or `unsafe` followed by a hazard
/// category code (e.g. `S1`) on the next line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "verdict")]
pub enum SafetyVerdict {
    Safe,
    Unsafe { category: String },
}

impl SafetyVerdict {
    /// Parse the raw guard-model reply.
    ///
    /// Unrecognized replies are treated as unsafe: a moderation model that
    /// answers off-format cannot be trusted to have approved the input.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let mut lines = raw.trim().lines().map(str::trim);
        match lines.next() {
            Some(first) if first.eq_ignore_ascii_case("safe") => Self::Safe,
            Some(first) if first.eq_ignore_ascii_case("unsafe") => {
                let category = lines
                    .find(|line| !line.is_empty())
                    .unwrap_or("unspecified")
                    .to_string();
                Self::Unsafe { category }
            }
            _ => Self::Unsafe {
                category: "unrecognized verdict".to_string(),
            },
        }
    }

    #[must_use]
    pub const fn is_safe(&self) -> bool {
        matches!(self, Self::Safe)
    }

    /// Human-readable reason for a refusal, if any.
    #[must_use]
    pub fn refusal_reason(&self) -> Option<&str> {
        match self {
            Self::Safe => None,
            Self::Unsafe { category } => Some(category),
        }
    }
}
