use crate::error::GenerationError;
use crate::escape::EscapeStrategy;
use crate::stats::Stats;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Generation model
// ---------------------------------------------------------------------------

/// The execution model a generated program is meant to run under.
///
/// `Reflective` can read its own source at run time (`source()`), so the
/// artifact locates its engine text through a marker. `Classic` cannot, so
/// the engine text is carried as a second string constant and reproduced by
/// formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetModel {
    #[default]
    Reflective,
    Classic,
}

impl TargetModel {
    pub const ALL: [TargetModel; 2] = [TargetModel::Reflective, TargetModel::Classic];

    pub fn name(self) -> &'static str {
        match self {
            TargetModel::Reflective => "reflective",
            TargetModel::Classic => "classic",
        }
    }

    pub fn has_self_inspection(self) -> bool {
        matches!(self, TargetModel::Reflective)
    }
}

impl std::fmt::Display for TargetModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TargetModel {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reflective" => Ok(TargetModel::Reflective),
            "classic" => Ok(TargetModel::Classic),
            _ => Err(GenerationError::UnsupportedTarget(s.to_string())),
        }
    }
}

/// Which of the two artifacts is being talked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    OneLine,
    MultiLine,
}

impl std::fmt::Display for Layout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Layout::OneLine => "one-line",
            Layout::MultiLine => "multi-line",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuineRequest {
    pub input: String,
    #[serde(default)]
    pub strategy: EscapeStrategy,
    #[serde(default)]
    pub target: TargetModel,
}

impl QuineRequest {
    pub fn new(input: impl Into<String>, strategy: EscapeStrategy) -> Self {
        Self {
            input: input.into(),
            strategy,
            target: TargetModel::default(),
        }
    }

    pub fn with_target(mut self, target: TargetModel) -> Self {
        self.target = target;
        self
    }
}

/// A finished generation. Both artifacts print themselves when run under
/// `target`; `original` is the untouched input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuineOutput {
    pub original: String,
    pub one_line: String,
    pub multi_line: String,
    pub escape_strategy: EscapeStrategy,
    #[serde(default)]
    pub target: TargetModel,
    pub stats: Stats,
}

impl QuineOutput {
    pub fn artifact(&self, layout: Layout) -> &str {
        match layout {
            Layout::OneLine => &self.one_line,
            Layout::MultiLine => &self.multi_line,
        }
    }
}

// ---------------------------------------------------------------------------
// Request/response boundary
// ---------------------------------------------------------------------------

/// Wire shape of a generation request: `{ input, options: { escape_strategy } }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub input: String,
    #[serde(default)]
    pub options: Option<GenerateOptions>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escape_strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indent: Option<String>,
}

/// `data` is present iff `success`; `error` iff not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<QuineOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Result<QuineOutput, GenerationError>> for GenerateResponse {
    fn from(result: Result<QuineOutput, GenerationError>) -> Self {
        match result {
            Ok(output) => GenerateResponse {
                success: true,
                data: Some(output),
                error: None,
            },
            Err(e) => GenerateResponse {
                success: false,
                data: None,
                error: Some(e.to_string()),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Command result envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    pub run_id: String,
    pub command: String,
    pub target: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    pub timing_ms: TimingInfo,
    /// Command-specific payload returned on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pass,
    Fail,
    Error,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pass => "pass",
            Status::Fail => "fail",
            Status::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidInput,
    Unsupported,
    UnsafeInput,
    NotAFixedPoint,
    InternalError,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_else(|| format!("{:?}", self));
        f.write_str(&s)
    }
}

impl From<&GenerationError> for ErrorCode {
    fn from(e: &GenerationError) -> Self {
        match e {
            GenerationError::EmptyInput
            | GenerationError::InputTooLarge { .. }
            | GenerationError::InvalidIndent(_) => ErrorCode::InvalidInput,
            GenerationError::UnsupportedStrategy(_) | GenerationError::UnsupportedTarget(_) => {
                ErrorCode::Unsupported
            }
            GenerationError::UnsafeRawInput { .. } => ErrorCode::UnsafeInput,
            GenerationError::MarkerNotFound { .. } => ErrorCode::InternalError,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TimingInfo {
    pub total: u64,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub steps: HashMap<String, u64>,
}

// ---------------------------------------------------------------------------
// Scenario types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    pub steps: Vec<ScenarioStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioStep {
    pub call: String,
    #[serde(default)]
    pub args: serde_json::Value,
    #[serde(default = "default_expect_status")]
    pub expect_status: String,
}

fn default_expect_status() -> String {
    "pass".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: Option<String>,
    pub overall_status: Status,
    pub step_results: Vec<CommandResult>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Generate a new run ID (UUIDv4).
pub fn new_run_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Build a successful CommandResult shell (caller fills in data).
pub fn result_ok(command: &str, target: &str, run_id: &str, total_ms: u64) -> CommandResult {
    CommandResult {
        run_id: run_id.to_string(),
        command: command.to_string(),
        target: target.to_string(),
        status: Status::Pass,
        error: None,
        timing_ms: TimingInfo {
            total: total_ms,
            steps: HashMap::new(),
        },
        data: None,
    }
}

/// Build an error CommandResult.
pub fn result_err(
    command: &str,
    target: &str,
    run_id: &str,
    total_ms: u64,
    code: ErrorCode,
    message: impl Into<String>,
) -> CommandResult {
    CommandResult {
        run_id: run_id.to_string(),
        command: command.to_string(),
        target: target.to_string(),
        status: Status::Error,
        error: Some(ErrorInfo {
            code,
            message: message.into(),
        }),
        timing_ms: TimingInfo {
            total: total_ms,
            steps: HashMap::new(),
        },
        data: None,
    }
}
