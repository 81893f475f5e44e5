//! Small types shared between the Responses and Chat Completions wire formats.

use serde::{Deserialize, Serialize};

/// Token accounting, as echoed on a completed `Response` and as translated
/// from a Chat Completions `usage` object.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Usage {
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub total_tokens: i64,
    #[serde(default)]
    pub input_tokens_details: InputTokensDetails,
    #[serde(default)]
    pub output_tokens_details: OutputTokensDetails,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InputTokensDetails {
    #[serde(default)]
    pub cached_tokens: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OutputTokensDetails {
    #[serde(default)]
    pub reasoning_tokens: i64,
}

impl Usage {
    /// Combine a prior accumulation with a fresh backend chunk's usage, taking
    /// `input_tokens` from the most recent chunk per the engine's documented
    /// (partial) accounting.
    pub fn accumulate_output(&mut self, latest: &Usage) {
        self.output_tokens += latest.output_tokens;
        self.input_tokens = latest.input_tokens;
        self.total_tokens = self.input_tokens + self.output_tokens;
        self.output_tokens_details.reasoning_tokens += latest.output_tokens_details.reasoning_tokens;
        self.input_tokens_details.cached_tokens = latest.input_tokens_details.cached_tokens;
    }
}

/// Error surfaced on a failed `Response` or as a streaming `error` event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseError {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ResponseError {
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
            code: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulate_output_sums_output_takes_latest_input() {
        let mut usage = Usage {
            input_tokens: 5,
            output_tokens: 3,
            total_tokens: 8,
            ..Default::default()
        };
        let second = Usage {
            input_tokens: 9,
            output_tokens: 4,
            total_tokens: 13,
            ..Default::default()
        };
        usage.accumulate_output(&second);
        assert_eq!(usage.output_tokens, 7);
        assert_eq!(usage.input_tokens, 9);
        assert_eq!(usage.total_tokens, 16);
    }
}
