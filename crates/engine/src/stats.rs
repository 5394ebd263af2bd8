//! Byte-length metrics for a generation.

use crate::error::GenerationError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub input_bytes: usize,
    pub one_line_bytes: usize,
    pub multi_line_bytes: usize,
    /// `one_line_bytes / input_bytes`, unrounded.
    pub expansion_ratio: f64,
}

impl Stats {
    /// Measure the three artifacts. A zero-length input has no ratio and is
    /// reported as `EmptyInput`.
    pub fn measure(original: &str, one_line: &str, multi_line: &str) -> Result<Self, GenerationError> {
        Self::from_lengths(original.len(), one_line.len(), multi_line.len())
    }

    pub fn from_lengths(
        input_bytes: usize,
        one_line_bytes: usize,
        multi_line_bytes: usize,
    ) -> Result<Self, GenerationError> {
        if input_bytes == 0 {
            return Err(GenerationError::EmptyInput);
        }
        Ok(Self {
            input_bytes,
            one_line_bytes,
            multi_line_bytes,
            expansion_ratio: one_line_bytes as f64 / input_bytes as f64,
        })
    }

    /// Presentation form of the ratio, e.g. `"12.40x"`.
    pub fn ratio_display(&self) -> String {
        format!("{:.2}x", self.expansion_ratio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_is_not_rounded() {
        let stats = Stats::from_lengths(3, 10, 20).unwrap();
        assert_eq!(stats.expansion_ratio, 10.0 / 3.0);
        assert_eq!(stats.ratio_display(), "3.33x");
    }

    #[test]
    fn test_zero_input_is_rejected() {
        assert_eq!(Stats::from_lengths(0, 10, 20), Err(GenerationError::EmptyInput));
    }

    #[test]
    fn test_measure_counts_bytes_not_chars() {
        let stats = Stats::measure("é", "abcd", "abcdef").unwrap();
        assert_eq!(stats.input_bytes, 2);
        assert_eq!(stats.one_line_bytes, 4);
        assert_eq!(stats.multi_line_bytes, 6);
        assert_eq!(stats.expansion_ratio, 2.0);
    }
}
