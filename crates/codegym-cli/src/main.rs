//! CodeGym CLI
//!
//! The `codegym` command validates learner submissions offline.
//!
//! ## Commands
//!
//! - `validate`: run a submission against an exercise file and print the verdict
//! - `check`: load an exercise file and report configuration problems

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use codegym_domain::{ExerciseSpec, Verdict};
use codegym_runner::Dispatcher;
use tokio::io::AsyncReadExt;
use tracing::{debug, Level};

#[derive(Parser)]
#[command(name = "codegym")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Validate code submissions against CodeGym exercises", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a submission against an exercise
    Validate {
        /// Exercise file (native spec or package challenge JSON)
        #[arg(short, long)]
        exercise: PathBuf,

        /// Submission file, or `-` for stdin
        #[arg(short, long)]
        code: PathBuf,

        /// Verdict output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Check an exercise file's configuration
    Check {
        /// Exercise file to check
        exercise: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    codegym_runner::init_tracing(cli.json, level);

    match cli.command {
        Commands::Validate {
            exercise,
            code,
            format,
        } => cmd_validate(&exercise, &code, format).await,
        Commands::Check { exercise } => cmd_check(&exercise).await,
    }
}

async fn cmd_validate(exercise: &Path, code: &Path, format: OutputFormat) -> Result<ExitCode> {
    let spec = load_exercise(exercise).await?;
    let submission = load_submission(code).await?;
    debug!(exercise = %spec.id, bytes = submission.len(), "loaded submission");

    let verdict = Dispatcher::new().validate(&submission, &spec).await;
    let rendered = match format {
        OutputFormat::Text => render_text(&verdict),
        OutputFormat::Json => {
            serde_json::to_string_pretty(&verdict).context("Failed to serialize verdict")?
        }
    };
    println!("{rendered}");

    Ok(exit_code(&verdict))
}

async fn cmd_check(exercise: &Path) -> Result<ExitCode> {
    let spec = load_exercise(exercise).await?;
    match spec.validate() {
        Ok(()) => {
            println!("✓ {} ({}) is valid", spec.id, spec.evaluation_strategy);
            if let Some(rules) = spec.rules() {
                println!("  {} rule(s)", rules.len());
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            println!("✗ {}: {err}", spec.id);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn load_exercise(path: &Path) -> Result<ExerciseSpec> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read exercise file {}", path.display()))?;
    ExerciseSpec::from_json(&json)
        .with_context(|| format!("Failed to parse exercise file {}", path.display()))
}

async fn load_submission(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut code = String::new();
        tokio::io::stdin()
            .read_to_string(&mut code)
            .await
            .context("Failed to read submission from stdin")?;
        return Ok(code);
    }
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read submission file {}", path.display()))
}

fn exit_code(verdict: &Verdict) -> ExitCode {
    if verdict.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn render_text(verdict: &Verdict) -> String {
    let mut out = String::new();
    let status = if verdict.success {
        "PASS"
    } else if verdict.timed_out {
        "TIMEOUT"
    } else {
        "FAIL"
    };
    out.push_str(&format!("{status}  {}\n", verdict.summary));

    for criterion in &verdict.criteria {
        let mark = if criterion.passed { "✓" } else { "✗" };
        if criterion.message.is_empty() {
            out.push_str(&format!("  {mark} {}\n", criterion.name));
        } else {
            out.push_str(&format!("  {mark} {}: {}\n", criterion.name, criterion.message));
        }
    }
    if let Some(diagnostics) = &verdict.compile_diagnostics {
        out.push_str("\nDiagnostics:\n");
        for line in diagnostics.lines() {
            out.push_str(&format!("  {line}\n"));
        }
    }
    if let Some(output) = &verdict.captured_output {
        out.push_str("\nOutput:\n");
        for line in output.lines() {
            out.push_str(&format!("  {line}\n"));
        }
    }
    out.push_str(&format!("\n({} ms)", verdict.elapsed_ms));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegym_domain::{Criterion, CriterionUnit, EvaluationStrategy, FailureKind};

    const HTML_CHALLENGE: &str = r#"{
        "id": "html-001",
        "validatorType": "html-rules",
        "validatorConfig": {
            "rules": [{ "type": "element-exists", "selector": "h1",
                        "errorMessage": "Add an <h1>.", "successMessage": "Found it." }]
        }
    }"#;

    #[tokio::test]
    async fn test_load_exercise_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("html-001.json");
        std::fs::write(&path, HTML_CHALLENGE).unwrap();

        let spec = load_exercise(&path).await.unwrap();
        assert_eq!(spec.id, "html-001");
        assert_eq!(spec.evaluation_strategy, EvaluationStrategy::MarkupRules);
    }

    #[tokio::test]
    async fn test_load_exercise_missing_file_has_context() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_exercise(&dir.path().join("nope.json")).await.unwrap_err();
        assert!(err.to_string().contains("Failed to read exercise file"));
    }

    #[tokio::test]
    async fn test_load_exercise_bad_json_has_context() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{").unwrap();
        let err = load_exercise(&path).await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse exercise file"));
    }

    #[tokio::test]
    async fn test_validate_command_exit_codes() {
        let dir = tempfile::tempdir().unwrap();
        let exercise = dir.path().join("html-001.json");
        std::fs::write(&exercise, HTML_CHALLENGE).unwrap();

        let good = dir.path().join("good.html");
        std::fs::write(&good, "<h1>Hello</h1>").unwrap();
        let code = cmd_validate(&exercise, &good, OutputFormat::Json).await.unwrap();
        assert_eq!(code, ExitCode::SUCCESS);

        let bad = dir.path().join("bad.html");
        std::fs::write(&bad, "<p>Hello</p>").unwrap();
        let code = cmd_validate(&exercise, &bad, OutputFormat::Text).await.unwrap();
        assert_eq!(code, ExitCode::FAILURE);
    }

    #[tokio::test]
    async fn test_check_command_reports_invalid_exercise() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        std::fs::write(
            &path,
            r#"{"id":"css-1","evaluationStrategy":"stylesheet-rules","rules":[]}"#,
        )
        .unwrap();
        assert_eq!(cmd_check(&path).await.unwrap(), ExitCode::FAILURE);
    }

    #[test]
    fn test_render_text_lists_criteria() {
        let verdict = Verdict::from_criteria(
            vec![
                Criterion::pass("Element 'h1'", "Found it."),
                Criterion::fail("Element 'footer'", ""),
            ],
            CriterionUnit::Checks,
        );
        let text = render_text(&verdict);
        assert!(text.starts_with("FAIL  1 of 2 check(s) passed."));
        assert!(text.contains("✓ Element 'h1': Found it."));
        assert!(text.contains("✗ Element 'footer'\n"));
    }

    #[test]
    fn test_render_text_timeout_and_diagnostics() {
        let verdict = Verdict::timed_out("Time limit exceeded.")
            .with_compile_diagnostics("line one\nline two");
        let text = render_text(&verdict);
        assert!(text.starts_with("TIMEOUT"));
        assert!(text.contains("Diagnostics:\n  line one\n  line two"));
        assert_eq!(verdict.failure, Some(FailureKind::ResourceLimit));
    }

    #[test]
    fn test_cli_parses_validate() {
        let cli = Cli::try_parse_from([
            "codegym", "--verbose", "validate", "-e", "ex.json", "-c", "-", "--format", "json",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Validate { code, format, .. } => {
                assert_eq!(code, PathBuf::from("-"));
                assert_eq!(format, OutputFormat::Json);
            }
            Commands::Check { .. } => panic!("expected validate"),
        }
    }
}
