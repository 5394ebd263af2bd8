use crate::types::Layout;

/// Every way a generation request can fail.
///
/// Lower components return these directly; the orchestrator forwards them
/// unchanged and never returns a partial result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("input is empty")]
    EmptyInput,

    #[error("unsupported escape strategy: {0:?} (expected standard, unicode, hex or raw)")]
    UnsupportedStrategy(String),

    #[error("raw strategy cannot embed {found:?} (byte {offset}): it would terminate the string literal")]
    UnsafeRawInput { found: char, offset: usize },

    #[error("internal error: self-location marker not found in the {layout} artifact")]
    MarkerNotFound { layout: Layout },

    #[error("input exceeds maximum size of {max} bytes (got {actual})")]
    InputTooLarge { max: usize, actual: usize },

    #[error("unsupported target model: {0:?} (expected reflective or classic)")]
    UnsupportedTarget(String),

    #[error("invalid indent {0:?}: only spaces and tabs are allowed")]
    InvalidIndent(String),
}

impl GenerationError {
    /// Stable machine-readable name, matching the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::EmptyInput => "EmptyInput",
            GenerationError::UnsupportedStrategy(_) => "UnsupportedStrategy",
            GenerationError::UnsafeRawInput { .. } => "UnsafeRawInput",
            GenerationError::MarkerNotFound { .. } => "MarkerNotFound",
            GenerationError::InputTooLarge { .. } => "InputTooLarge",
            GenerationError::UnsupportedTarget(_) => "UnsupportedTarget",
            GenerationError::InvalidIndent(_) => "InvalidIndent",
        }
    }

    /// True when the failure points at an engine bug rather than bad input.
    pub fn is_internal(&self) -> bool {
        matches!(self, GenerationError::MarkerNotFound { .. })
    }
}
