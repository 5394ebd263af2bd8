//! Generation orchestrator – validate, encode, assemble, measure.

use crate::error::GenerationError;
use crate::escape::{self, EscapeStrategy};
use crate::stats::Stats;
use crate::template::{Template, DEFAULT_INDENT};
use crate::types::{QuineOutput, QuineRequest, TargetModel};

/// 10 MiB.
pub const DEFAULT_MAX_INPUT_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorOptions {
    pub max_input_bytes: usize,
    /// Continuation indent for the multi-line layout.
    pub indent: String,
    pub trailing_newline: bool,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            indent: DEFAULT_INDENT.to_string(),
            trailing_newline: true,
        }
    }
}

/// Stateless generator; one instance can serve any number of callers.
#[derive(Debug, Clone, Default)]
pub struct QuineGenerator {
    options: GeneratorOptions,
}

impl QuineGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: GeneratorOptions) -> Self {
        Self { options }
    }

    pub fn builder() -> QuineGeneratorBuilder {
        QuineGeneratorBuilder::default()
    }

    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    /// Produce both self-reproducing artifacts for `request`, or the first
    /// error encountered.
    pub fn generate(&self, request: &QuineRequest) -> Result<QuineOutput, GenerationError> {
        let input = request.input.as_str();
        if input.is_empty() {
            return Err(GenerationError::EmptyInput);
        }
        if input.len() > self.options.max_input_bytes {
            return Err(GenerationError::InputTooLarge {
                max: self.options.max_input_bytes,
                actual: input.len(),
            });
        }
        let indent = self.options.indent.as_str();
        if indent.chars().any(|c| c != ' ' && c != '\t') {
            return Err(GenerationError::InvalidIndent(indent.to_string()));
        }

        let fragment = escape::encode(input, request.strategy)?;
        let artifacts = Template::new(request.strategy, request.target)
            .indent(indent)
            .trailing_newline(self.options.trailing_newline)
            .assemble(&fragment)?;
        let stats = Stats::measure(input, &artifacts.one_line, &artifacts.multi_line)?;

        tracing::debug!(
            strategy = %request.strategy,
            target = %request.target,
            input_bytes = stats.input_bytes,
            one_line_bytes = stats.one_line_bytes,
            multi_line_bytes = stats.multi_line_bytes,
            "generated quine"
        );

        Ok(QuineOutput {
            original: input.to_string(),
            one_line: artifacts.one_line,
            multi_line: artifacts.multi_line,
            escape_strategy: request.strategy,
            target: request.target,
            stats,
        })
    }

    pub fn generate_one_line(&self, request: &QuineRequest) -> Result<String, GenerationError> {
        self.generate(request).map(|output| output.one_line)
    }

    pub fn generate_multi_line(&self, request: &QuineRequest) -> Result<String, GenerationError> {
        self.generate(request).map(|output| output.multi_line)
    }
}

#[derive(Debug, Clone, Default)]
pub struct QuineGeneratorBuilder {
    options: GeneratorOptions,
}

impl QuineGeneratorBuilder {
    pub fn max_input_bytes(mut self, max: usize) -> Self {
        self.options.max_input_bytes = max;
        self
    }

    pub fn indent(mut self, indent: impl Into<String>) -> Self {
        self.options.indent = indent.into();
        self
    }

    pub fn trailing_newline(mut self, on: bool) -> Self {
        self.options.trailing_newline = on;
        self
    }

    pub fn build(self) -> QuineGenerator {
        QuineGenerator::with_options(self.options)
    }
}

/// Generate with default options.
pub fn generate(request: &QuineRequest) -> Result<QuineOutput, GenerationError> {
    QuineGenerator::new().generate(request)
}

/// Convenience for `generate` with a strategy/target pair.
pub fn generate_text(
    input: &str,
    strategy: EscapeStrategy,
    target: TargetModel,
) -> Result<QuineOutput, GenerationError> {
    generate(&QuineRequest::new(input, strategy).with_target(target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Layout;
    use crate::verify;

    const CORPUS: &[&str] = &[
        "hello",
        "x",
        " ",
        "\n",
        "hello\nworld\t\"test\"",
        "console.log('Hello, World!');",
        "back\\slash \\n not a newline",
        "let d=\"evil\";let m=\"standard\";",
        ";let m=\"raw\";\n;\nlet m = \"raw\";",
        "naïve café – 日本語 – 🦀🦀",
        "\u{0}\u{1b}[31mred\u{1b}[0m\r\n",
        "print(source())",
        "\\u0041\\x41",
    ];

    fn assert_fixed_points(output: &QuineOutput) {
        for layout in [Layout::OneLine, Layout::MultiLine] {
            let text = output.artifact(layout);
            if let Err(e) = verify::verify(text, output.target) {
                panic!(
                    "{} {} {} artifact for {:?} is not a quine: {e}\n{text}",
                    output.escape_strategy, output.target, layout, output.original
                );
            }
        }
    }

    #[test]
    fn test_basic_generation() {
        let output = generate(&QuineRequest::new("hello world", EscapeStrategy::Standard)).unwrap();
        assert!(!output.one_line.is_empty());
        assert!(!output.multi_line.is_empty());
        assert_eq!(output.original, "hello world");
        assert_eq!(output.escape_strategy, EscapeStrategy::Standard);
        assert_eq!(output.target, TargetModel::Reflective);
    }

    #[test]
    fn test_hello_scenario() {
        let output = generate(&QuineRequest::new("hello", EscapeStrategy::Standard)).unwrap();
        assert_eq!(output.stats.input_bytes, 5);
        assert!(output.one_line.contains("\"hello\""));
        assert_fixed_points(&output);
    }

    #[test]
    fn test_newline_and_quote_scenario() {
        let output = generate(&QuineRequest::new("a\n\"b", EscapeStrategy::Standard)).unwrap();
        assert!(output.one_line.starts_with("let d=\"a\\n\\\"b\";"));
        assert_eq!(EscapeStrategy::Standard.decode("a\\n\\\"b").unwrap(), "a\n\"b");
        assert_fixed_points(&output);
    }

    #[test]
    fn test_every_strategy_and_target_is_a_fixed_point() {
        for target in TargetModel::ALL {
            for strategy in EscapeStrategy::ALL {
                for input in CORPUS {
                    let result = generate_text(input, strategy, target);
                    if strategy == EscapeStrategy::Raw && input.contains('"') {
                        assert!(matches!(result, Err(GenerationError::UnsafeRawInput { .. })));
                        continue;
                    }
                    assert_fixed_points(&result.unwrap());
                }
            }
        }
    }

    #[test]
    fn test_stats_consistency_and_expansion() {
        for strategy in EscapeStrategy::ALL {
            for input in CORPUS.iter().filter(|s| !s.contains('"')) {
                let out = generate_text(input, strategy, TargetModel::Reflective).unwrap();
                assert_eq!(out.stats.input_bytes, out.original.len());
                assert_eq!(out.stats.one_line_bytes, out.one_line.len());
                assert_eq!(out.stats.multi_line_bytes, out.multi_line.len());
                let ratio = out.stats.one_line_bytes as f64 / out.stats.input_bytes as f64;
                assert!((out.stats.expansion_ratio - ratio).abs() < 1e-12);
                assert!(out.stats.one_line_bytes > out.stats.input_bytes);
                assert_eq!(out.original, *input);
            }
        }
    }

    #[test]
    fn test_empty_input_error() {
        let result = generate(&QuineRequest::new("", EscapeStrategy::Standard));
        assert_eq!(result, Err(GenerationError::EmptyInput));
    }

    #[test]
    fn test_whitespace_only_input_is_accepted() {
        let output = generate(&QuineRequest::new("   \t", EscapeStrategy::Standard)).unwrap();
        assert_fixed_points(&output);
    }

    #[test]
    fn test_raw_safety() {
        let unsafe_input = generate(&QuineRequest::new("say \"hi\"", EscapeStrategy::Raw));
        assert_eq!(
            unsafe_input,
            Err(GenerationError::UnsafeRawInput { found: '"', offset: 4 })
        );
        let safe = generate(&QuineRequest::new("no quotes\\here\n", EscapeStrategy::Raw)).unwrap();
        assert!(safe.one_line.starts_with("let d=r\"no quotes\\here\n\";"));
        assert_fixed_points(&safe);
    }

    #[test]
    fn test_input_too_large() {
        let generator = QuineGenerator::builder().max_input_bytes(10).build();
        let result = generator.generate(&QuineRequest::new("this is a very long input", EscapeStrategy::Standard));
        assert!(matches!(result, Err(GenerationError::InputTooLarge { max: 10, .. })));
    }

    #[test]
    fn test_invalid_indent() {
        let generator = QuineGenerator::builder().indent("--").build();
        let result = generator.generate(&QuineRequest::new("x", EscapeStrategy::Standard));
        assert_eq!(result, Err(GenerationError::InvalidIndent("--".into())));
    }

    #[test]
    fn test_custom_layout_options_stay_fixed_points() {
        let generator = QuineGenerator::builder()
            .indent("\t")
            .trailing_newline(false)
            .build();
        for target in TargetModel::ALL {
            let request = QuineRequest::new("tabs\tand\nlines", EscapeStrategy::Standard).with_target(target);
            let output = generator.generate(&request).unwrap();
            assert!(!output.multi_line.ends_with('\n'));
            assert_fixed_points(&output);
        }
    }

    #[test]
    fn test_single_layout_helpers() {
        let generator = QuineGenerator::new();
        let request = QuineRequest::new("abc", EscapeStrategy::Hex);
        let full = generator.generate(&request).unwrap();
        assert_eq!(generator.generate_one_line(&request).unwrap(), full.one_line);
        assert_eq!(generator.generate_multi_line(&request).unwrap(), full.multi_line);
    }

    #[test]
    fn test_generation_is_deterministic() {
        let request = QuineRequest::new("same in, same out", EscapeStrategy::Unicode);
        assert_eq!(generate(&request).unwrap(), generate(&request).unwrap());
    }
}
