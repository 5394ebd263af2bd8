//! Command registry and the built-in engine commands.
//!
//! Commands are registered by name and invoked with JSON input/output, so any
//! front end (CLI, native bridge, scenario file) reaches the engine the same
//! way.

use crate::context::AppContext;
use crate::error::GenerationError;
use crate::escape::{DecodeError, EscapeStrategy};
use crate::generator::QuineGenerator;
use crate::types::*;
use crate::verify::{self, VerifyError};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Instant;

/// Signature for all engine commands.
pub type CommandHandler = fn(Value, &AppContext) -> Result<Value, CommandError>;

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    /// Generation was refused; the failed boundary response travels as data.
    #[error("{source}")]
    Rejected {
        source: GenerationError,
        response: GenerateResponse,
    },
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),
    /// The command ran but its check did not hold.
    #[error("{0}")]
    CheckFailed(#[from] VerifyError),
}

impl CommandError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            CommandError::InvalidInput(_) | CommandError::Decode(_) => ErrorCode::InvalidInput,
            CommandError::Generation(e) | CommandError::Rejected { source: e, .. } => {
                ErrorCode::from(e)
            }
            CommandError::CheckFailed(e) if e.is_malformed() => ErrorCode::InvalidInput,
            CommandError::CheckFailed(_) => ErrorCode::NotAFixedPoint,
        }
    }

    /// `Fail` when a well-formed program is not a quine, `Error` otherwise.
    pub fn status(&self) -> Status {
        match self {
            CommandError::CheckFailed(e) if !e.is_malformed() => Status::Fail,
            _ => Status::Error,
        }
    }

    /// Payload still worth returning alongside the error, if any.
    pub fn data(&self) -> Option<Value> {
        match self {
            CommandError::Rejected { response, .. } => serde_json::to_value(response).ok(),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

pub struct CommandRegistry {
    handlers: HashMap<String, CommandHandler>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        let mut reg = Self {
            handlers: HashMap::new(),
        };
        reg.register("generate_quine", cmd_generate_quine);
        reg.register("verify_quine", cmd_verify_quine);
        reg.register("decode_fragment", cmd_decode_fragment);
        reg.register("list_strategies", cmd_list_strategies);
        reg.register("version", cmd_version);
        reg
    }

    pub fn register(&mut self, name: &str, handler: CommandHandler) {
        self.handlers.insert(name.to_string(), handler);
    }

    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(|s| s.as_str()).collect();
        names.sort();
        names
    }

    /// Execute a command by name and return a full CommandResult.
    pub fn execute(&self, name: &str, args: Value, ctx: &AppContext) -> CommandResult {
        let run_id = new_run_id();
        let start = Instant::now();

        let handler = match self.handlers.get(name) {
            Some(h) => h,
            None => {
                return result_err(
                    "call",
                    name,
                    &run_id,
                    start.elapsed().as_millis() as u64,
                    ErrorCode::InvalidInput,
                    format!("unknown command: {} (available: {})", name, self.list().join(", ")),
                );
            }
        };

        match handler(args, ctx) {
            Ok(data) => {
                let mut r = result_ok("call", name, &run_id, start.elapsed().as_millis() as u64);
                r.data = Some(data);
                r
            }
            Err(e) => {
                let mut r = result_err(
                    "call",
                    name,
                    &run_id,
                    start.elapsed().as_millis() as u64,
                    e.error_code(),
                    e.to_string(),
                );
                r.status = e.status();
                r.data = e.data();
                r
            }
        }
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Request/response boundary
// ---------------------------------------------------------------------------

/// Resolve a wire request against the context defaults and generate.
pub fn resolve_and_generate(
    request: &GenerateRequest,
    ctx: &AppContext,
) -> Result<QuineOutput, GenerationError> {
    let options = request.options.clone().unwrap_or_default();
    let strategy = match options.escape_strategy.as_deref() {
        Some(name) => name.parse()?,
        None => ctx.default_strategy,
    };
    let target = match options.target.as_deref() {
        Some(name) => name.parse()?,
        None => ctx.default_target,
    };
    let quine_request = QuineRequest::new(request.input.clone(), strategy).with_target(target);

    match options.indent {
        Some(indent) => {
            let mut generator_options = ctx.generator().options().clone();
            generator_options.indent = indent;
            QuineGenerator::with_options(generator_options).generate(&quine_request)
        }
        None => ctx.generator().generate(&quine_request),
    }
}

/// The request/response boundary: never fails, errors travel in the response.
pub fn handle_generate(request: &GenerateRequest, ctx: &AppContext) -> GenerateResponse {
    resolve_and_generate(request, ctx).into()
}

// ===========================================================================
// Built-in commands
// ===========================================================================

fn parse_args<T: serde::de::DeserializeOwned>(args: Value) -> Result<T, CommandError> {
    serde_json::from_value(args).map_err(|e| CommandError::InvalidInput(e.to_string()))
}

/// `generate_quine` – args are a `GenerateRequest`, data the
/// `GenerateResponse`, whether or not generation succeeded.
fn cmd_generate_quine(args: Value, ctx: &AppContext) -> Result<Value, CommandError> {
    let request: GenerateRequest = parse_args(args)?;
    match resolve_and_generate(&request, ctx) {
        Ok(output) => serde_json::to_value(GenerateResponse::from(Ok(output)))
            .map_err(|e| CommandError::InvalidInput(e.to_string())),
        Err(source) => Err(CommandError::Rejected {
            response: GenerateResponse::from(Err(source.clone())),
            source,
        }),
    }
}

/// `verify_quine` – run a program and check it prints itself.
///
/// Args: `{ "program": "...", "target": "reflective" }`
/// Returns: `{ "fixed_point": true, "output_bytes": 123 }`
fn cmd_verify_quine(args: Value, ctx: &AppContext) -> Result<Value, CommandError> {
    let program = args
        .get("program")
        .and_then(|v| v.as_str())
        .ok_or_else(|| CommandError::InvalidInput("missing 'program' string field".into()))?;
    let target = match args.get("target").and_then(|v| v.as_str()) {
        Some(name) => name.parse::<TargetModel>()?,
        None => ctx.default_target,
    };
    verify::verify(program, target)?;
    Ok(serde_json::json!({
        "fixed_point": true,
        "target": target,
        "output_bytes": program.len(),
    }))
}

/// `decode_fragment` – invert the escape codec.
///
/// Args: `{ "fragment": "a\\n", "escape_strategy": "standard" }`
/// Returns: `{ "text": "a\n" }`
fn cmd_decode_fragment(args: Value, ctx: &AppContext) -> Result<Value, CommandError> {
    let fragment = args
        .get("fragment")
        .and_then(|v| v.as_str())
        .ok_or_else(|| CommandError::InvalidInput("missing 'fragment' string field".into()))?;
    let strategy = match args.get("escape_strategy").and_then(|v| v.as_str()) {
        Some(name) => name.parse::<EscapeStrategy>()?,
        None => ctx.default_strategy,
    };
    let text = strategy.decode(fragment)?;
    Ok(serde_json::json!({ "text": text }))
}

fn cmd_list_strategies(_args: Value, _ctx: &AppContext) -> Result<Value, CommandError> {
    let strategies: Vec<&str> = EscapeStrategy::ALL.iter().map(|s| s.name()).collect();
    let targets: Vec<&str> = TargetModel::ALL.iter().map(|t| t.name()).collect();
    Ok(serde_json::json!({ "strategies": strategies, "targets": targets }))
}

fn cmd_version(_args: Value, _ctx: &AppContext) -> Result<Value, CommandError> {
    Ok(serde_json::json!({ "version": env!("CARGO_PKG_VERSION") }))
}

// ===========================================================================
// Tests
// ===========================================================================
