//! `quinectl` – command-line front end for the quine engine.
//!
//! Generates self-reproducing programs from text, checks programs for the
//! fixed-point property, and drives the engine's command registry for
//! scripted runs.

mod config;
mod logging;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use dialoguer::{theme::ColorfulTheme, Input};
use engine::commands::resolve_and_generate;
use engine::types::*;
use engine::{verify, AppContext, CommandRegistry};
use std::io::{self, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};

// ===========================================================================
// CLI definition
// ===========================================================================

#[derive(Parser)]
#[command(
    name = "quinectl",
    version,
    about = "Turn text into programs that print their own source"
)]
struct Cli {
    /// Extra configuration file, layered over quinectl.yaml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Raise log verbosity (-v info, -vv debug).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate one-line and multi-line quines embedding some text.
    Generate(GenerateArgs),

    /// Check that a program prints exactly its own source.
    Verify {
        /// Program file; stdin when omitted.
        file: Option<PathBuf>,
        /// Execution model: reflective | classic
        #[arg(long)]
        target: Option<String>,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Decode an escaped literal fragment back to text.
    Decode {
        /// The fragment, without surrounding quotes.
        fragment: String,
        /// Escape strategy: standard | unicode | hex | raw
        #[arg(short, long)]
        escape: Option<String>,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Invoke a registry command by name with JSON args.
    Call {
        /// Command name (e.g. "generate_quine", "list_strategies").
        cmd: String,
        /// JSON args to pass to the command.
        #[arg(long, default_value = "{}")]
        args: String,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Run a scripted scenario from a YAML file.
    RunScenario {
        /// Path to the scenario YAML file.
        file: PathBuf,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct GenerateArgs {
    /// Text to embed. Falls back to --file, then stdin.
    input: Option<String>,
    /// Read the text to embed from this file.
    #[arg(long, conflicts_with = "input")]
    file: Option<PathBuf>,
    /// Escape strategy: standard | unicode | hex | raw
    #[arg(short, long)]
    escape: Option<String>,
    /// Execution model: reflective | classic
    #[arg(long)]
    target: Option<String>,
    /// Print only the one-line artifact.
    #[arg(long, conflicts_with = "multi_line")]
    one_line: bool,
    /// Print only the multi-line artifact.
    #[arg(long)]
    multi_line: bool,
    /// Print size statistics to stderr.
    #[arg(long)]
    stats: bool,
    /// Run both artifacts through the verifier before printing.
    #[arg(long)]
    verify: bool,
    /// Output the boundary response as JSON.
    #[arg(long)]
    json: bool,
}

// ===========================================================================
// Main
// ===========================================================================

fn main() {
    let cli = Cli::parse();

    let config = match config::load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: failed to load configuration: {}", e);
            std::process::exit(2);
        }
    };
    logging::init_logging(&config.logging, cli.verbose);
    tracing::debug!(?config, "configuration loaded");

    let code = match run(cli.command, &config) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            2
        }
    };
    std::process::exit(code);
}

fn run(command: Commands, config: &config::QuinectlConfig) -> anyhow::Result<i32> {
    let ctx = config
        .defaults
        .to_context()
        .context("invalid generation defaults in configuration")?;
    let registry = CommandRegistry::new();

    match command {
        Commands::Generate(args) => cmd_generate(args, &ctx),
        Commands::Verify { file, target, json } => {
            let program = read_source(file.as_deref())?;
            let mut args = serde_json::json!({ "program": program });
            if let Some(target) = target {
                args["target"] = target.into();
            }
            Ok(output_result(&registry.execute("verify_quine", args, &ctx), json))
        }
        Commands::Decode {
            fragment,
            escape,
            json,
        } => {
            let mut args = serde_json::json!({ "fragment": fragment });
            if let Some(escape) = escape {
                args["escape_strategy"] = escape.into();
            }
            let result = registry.execute("decode_fragment", args, &ctx);
            if !json && result.status == Status::Pass {
                if let Some(text) = result.data.as_ref().and_then(|d| d["text"].as_str()) {
                    println!("{}", text);
                    return Ok(0);
                }
            }
            Ok(output_result(&result, json))
        }
        Commands::Call { cmd, args, json } => Ok(cmd_call(&cmd, &args, json, &ctx, &registry)),
        Commands::RunScenario { file, json } => cmd_run_scenario(&file, json, &ctx, &registry),
    }
}

// ===========================================================================
// Subcommand implementations
// ===========================================================================

fn cmd_generate(args: GenerateArgs, ctx: &AppContext) -> anyhow::Result<i32> {
    let input = match args.input {
        Some(text) => text,
        None => read_input(args.file.as_deref())?,
    };
    let request = GenerateRequest {
        input,
        options: Some(GenerateOptions {
            escape_strategy: args.escape,
            target: args.target,
            indent: None,
        }),
    };

    let output = match resolve_and_generate(&request, ctx) {
        Ok(output) => output,
        Err(e) => {
            tracing::debug!(kind = e.kind(), "generation rejected");
            if args.json {
                let response = GenerateResponse::from(Err(e));
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                eprintln!("error: {}", e);
            }
            return Ok(2);
        }
    };

    if args.verify {
        for layout in [Layout::OneLine, Layout::MultiLine] {
            if let Err(e) = verify::verify(output.artifact(layout), output.target) {
                eprintln!("verification failed for the {} artifact: {}", layout, e);
                return Ok(1);
            }
        }
        tracing::info!(target_model = %output.target, "both artifacts verified");
    }

    if args.json {
        let response = GenerateResponse::from(Ok(output));
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(0);
    }

    let show_one = !args.multi_line;
    let show_multi = !args.one_line;
    let label = format!("{}, {}", output.escape_strategy, output.target);
    if show_one {
        eprintln!("One-line quine ({}):", label);
        write_artifact(&output.one_line)?;
    }
    if show_multi {
        if show_one {
            eprintln!();
        }
        eprintln!("Multi-line quine ({}):", label);
        write_artifact(&output.multi_line)?;
    }
    if args.stats {
        let stats = &output.stats;
        eprintln!();
        eprintln!("Input:      {} bytes", stats.input_bytes);
        eprintln!("One-line:   {} bytes", stats.one_line_bytes);
        eprintln!("Multi-line: {} bytes", stats.multi_line_bytes);
        eprintln!("Expansion:  {}", stats.ratio_display());
    }
    Ok(0)
}

fn cmd_call(
    cmd: &str,
    args_str: &str,
    json: bool,
    ctx: &AppContext,
    registry: &CommandRegistry,
) -> i32 {
    let args: serde_json::Value = match serde_json::from_str(args_str) {
        Ok(v) => v,
        Err(e) => {
            let r = result_err(
                "call",
                cmd,
                &new_run_id(),
                0,
                ErrorCode::InvalidInput,
                format!("invalid JSON args: {}", e),
            );
            return output_result(&r, json);
        }
    };

    output_result(&registry.execute(cmd, args, ctx), json)
}

fn cmd_run_scenario(
    file: &Path,
    json: bool,
    ctx: &AppContext,
    registry: &CommandRegistry,
) -> anyhow::Result<i32> {
    let yaml = std::fs::read_to_string(file)
        .with_context(|| format!("cannot read scenario file {}", file.display()))?;

    let scenario = match engine::scenario::load_scenario(&yaml) {
        Ok(s) => s,
        Err(e) => {
            let r = result_err(
                "run-scenario",
                &file.display().to_string(),
                &new_run_id(),
                0,
                ErrorCode::InvalidInput,
                e,
            );
            return Ok(output_result(&r, json));
        }
    };

    let scenario_result = engine::scenario::run_scenario(&scenario, ctx, registry);

    if json {
        println!("{}", serde_json::to_string_pretty(&scenario_result)?);
    } else {
        println!(
            "Scenario: {}",
            scenario_result.name.as_deref().unwrap_or("<unnamed>")
        );
        println!("Overall: {}", scenario_result.overall_status.as_str());
        for (i, sr) in scenario_result.step_results.iter().enumerate() {
            println!(
                "  Step {}: {} -> {} ({}ms)",
                i,
                sr.target,
                sr.status.as_str(),
                sr.timing_ms.total
            );
        }
    }

    Ok(exit_code(scenario_result.overall_status))
}

// ===========================================================================
// Input helpers
// ===========================================================================

/// Text to embed: the file if given, else a prompt on a terminal, else stdin.
fn read_input(file: Option<&Path>) -> anyhow::Result<String> {
    if file.is_none() && io::stdin().is_terminal() {
        let text: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt("Text to embed")
            .interact_text()
            .context("failed to read input from the terminal")?;
        return Ok(text);
    }
    read_source(file)
}

/// File contents, or all of stdin, byte for byte.
fn read_source(file: Option<&Path>) -> anyhow::Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display())),
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("cannot read stdin")?;
            Ok(buf)
        }
    }
}

// ===========================================================================
// Output helpers
// ===========================================================================

/// Artifacts go to stdout byte for byte. A terminal gets a closing newline so
/// the prompt does not run on; redirected output stays a fixed point.
fn write_artifact(artifact: &str) -> anyhow::Result<()> {
    let mut stdout = io::stdout().lock();
    stdout
        .write_all(artifact.as_bytes())
        .context("cannot write to stdout")?;
    if stdout.is_terminal() && !artifact.ends_with('\n') {
        stdout.write_all(b"\n")?;
    }
    stdout.flush()?;
    Ok(())
}

fn exit_code(status: Status) -> i32 {
    match status {
        Status::Pass => 0,
        Status::Fail => 1,
        Status::Error => 2,
    }
}

fn output_result(result: &CommandResult, json: bool) -> i32 {
    if json {
        let j = serde_json::to_string_pretty(result).unwrap_or_default();
        println!("{}", j);
    } else {
        print_human(result);
    }
    exit_code(result.status)
}

fn print_human(r: &CommandResult) {
    let status_icon = match r.status {
        Status::Pass => "PASS",
        Status::Fail => "FAIL",
        Status::Error => "ERROR",
    };

    println!("[{}] {} {}", status_icon, r.command, r.target);
    println!("  run_id: {}", r.run_id);
    println!("  timing: {}ms", r.timing_ms.total);

    if !r.timing_ms.steps.is_empty() {
        for (step, ms) in &r.timing_ms.steps {
            println!("    {}: {}ms", step, ms);
        }
    }

    if let Some(ref err) = r.error {
        println!("  error:  {} – {}", err.code, err.message);
    }

    if let Some(ref data) = r.data {
        if let Ok(s) = serde_json::to_string_pretty(data) {
            for line in s.lines() {
                println!("  {}", line);
            }
        }
    }
}
