//! Application context – the configured generator and request defaults.

use crate::escape::EscapeStrategy;
use crate::generator::{GeneratorOptions, QuineGenerator};
use crate::types::TargetModel;

/// Central context passed to all engine commands.
///
/// Holds no mutable state; front ends build one from their configuration and
/// share it across calls.
#[derive(Debug, Clone, Default)]
pub struct AppContext {
    generator: QuineGenerator,
    /// Strategy used when a request does not name one.
    pub default_strategy: EscapeStrategy,
    /// Target model used when a request does not name one.
    pub default_target: TargetModel,
}

impl AppContext {
    pub fn new(
        options: GeneratorOptions,
        default_strategy: EscapeStrategy,
        default_target: TargetModel,
    ) -> Self {
        Self {
            generator: QuineGenerator::with_options(options),
            default_strategy,
            default_target,
        }
    }

    pub fn generator(&self) -> &QuineGenerator {
        &self.generator
    }
}
