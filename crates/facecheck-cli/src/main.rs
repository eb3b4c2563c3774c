use clap::error::ErrorKind;
use clap::Parser;
use facecheck_core::OnnxVerifier;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod config;
mod envelope;
mod invoker;

use envelope::ENCODING_FAILURE_LINE;
use invoker::Report;

#[derive(Parser, Debug)]
#[command(
    name = "facecheck",
    version,
    about = "Compare two face images and print a JSON verdict"
)]
struct Cli {
    /// TOML config file (also FACECHECK_CONFIG)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory containing det_10g.onnx and w600k_r50.onnx (also FACECHECK_HOME)
    #[arg(long, value_name = "DIR")]
    model_dir: Option<PathBuf>,

    /// Cosine distance threshold (also FACECHECK_THRESHOLD)
    #[arg(long)]
    threshold: Option<f64>,

    /// Reference ("master") image, then candidate ("submitted") image.
    /// Anything after the first two is ignored.
    #[arg(value_name = "IMAGE", allow_hyphen_values = true, trailing_var_arg = true)]
    paths: Vec<PathBuf>,
}

fn main() -> ExitCode {
    init_tracing();

    let report = run();
    match report.envelope.to_json_line() {
        Ok(line) => println!("{line}"),
        Err(err) => {
            tracing::error!(error = %err, "failed to encode result");
            println!("{ENCODING_FAILURE_LINE}");
        }
    }
    report.exit_code()
}

/// Logs go to stderr so stdout carries only the result line.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("FACECHECK_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Report {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => return Report::rejected(parse_error_message(&err)),
    };

    if cli.paths.len() > 2 {
        tracing::debug!(ignored = ?&cli.paths[2..], "extra arguments ignored");
    }
    let reference = cli.paths.first().map(PathBuf::as_path);
    let candidate = cli.paths.get(1).map(PathBuf::as_path);
    let checked = invoker::check_preconditions(reference, candidate);
    let request = match checked {
        Ok(request) => request,
        Err(report) => return report,
    };

    let overrides = config::Overrides {
        config_path: cli.config,
        model_dir: cli.model_dir,
        threshold: cli.threshold,
    };
    let verifier_config = match config::load(&overrides) {
        Ok(c) => c,
        Err(err) => return Report::rejected(format!("{err:#}")),
    };

    tracing::info!(
        reference = %request.reference.display(),
        candidate = %request.candidate.display(),
        model_dir = %verifier_config.model_dir.display(),
        "verifying"
    );

    let mut verifier = OnnxVerifier::new(verifier_config);
    invoker::invoke(&mut verifier, &request)
}

/// First line of clap's rendered error, without the `error: ` prefix.
fn parse_error_message(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let first = rendered.lines().next().unwrap_or_default().trim();
    first.strip_prefix("error: ").unwrap_or(first).to_string()
}
