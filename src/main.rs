use clap::{Parser, ValueEnum};
use e2e_verifier::{parse_actual, Registry, VerifyError, VerifyOptions, Verifier};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Text,
    Json,
}

/// Verify an actual YAML/JSON document against an expected template.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Expected document template
    #[arg(long, short)]
    expected: PathBuf,
    /// Actual document produced by the system under test
    #[arg(long, short)]
    actual: PathBuf,
    /// Also fail on fields present only in the actual document
    #[arg(long)]
    strict: bool,
    /// Report format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,
    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

fn init_logging(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("e2e_verifier=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn read(path: &Path) -> Result<String, VerifyError> {
    std::fs::read_to_string(path).map_err(|e| VerifyError::Io(format!("{}: {e}", path.display())))
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.log_json);

    let inputs = read(&args.expected).and_then(|expected| {
        let actual = parse_actual(&read(&args.actual)?)?;
        Ok((expected, actual))
    });
    let (expected, actual) = match inputs {
        Ok(v) => v,
        Err(e) => {
            error!(error = %e, "cannot load documents");
            return ExitCode::from(2);
        }
    };

    let options = VerifyOptions {
        strict_objects: args.strict,
    };
    let verifier = Verifier::new(Registry::with_builtins(), options);
    let name = args.expected.display().to_string();
    let report = verifier.verify(&name, &expected, &actual);

    match args.format {
        Format::Text => println!("{report}"),
        Format::Json => match serde_json::to_string_pretty(&report) {
            Ok(s) => println!("{s}"),
            Err(e) => {
                error!(error = %e, "cannot serialize report");
                return ExitCode::from(2);
            }
        },
    }

    info!(case = %name, passed = report.passed(), "done");
    if report.passed() {
        ExitCode::SUCCESS
    } else if report.outcome.error().is_some() {
        ExitCode::from(2)
    } else {
        ExitCode::from(1)
    }
}
