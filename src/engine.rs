use crate::comparison::{compare, CompareOptions};
use crate::context::{Context, VerifyOptions};
use crate::document::Expected;
use crate::errors::{Result, VerifyError};
use crate::functions::Registry;
use crate::report::ComparisonReport;
use crate::template::{BraceTemplate, Rendered, TemplateRenderer};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, trace, warn};

// =========================
// Verifier (orchestrator)
// =========================

/// Where a case is in `Rendering -> Comparing -> Reported`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Rendering,
    Comparing,
    Reported,
}

enum State {
    Rendering,
    Comparing(Expected),
    Reported(Outcome),
}

impl State {
    fn stage(&self) -> Stage {
        match self {
            State::Rendering => Stage::Rendering,
            State::Comparing(_) => Stage::Comparing,
            State::Reported(_) => Stage::Reported,
        }
    }
}

fn serialize_display<S: Serializer>(
    error: &VerifyError,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Passed {
        report: ComparisonReport,
    },
    Failed {
        report: ComparisonReport,
    },
    /// The expected document could not be rendered; nothing was compared.
    Errored {
        #[serde(serialize_with = "serialize_display")]
        error: VerifyError,
    },
}

impl Outcome {
    fn from_report(report: ComparisonReport) -> Self {
        if report.is_pass() {
            Outcome::Passed { report }
        } else {
            Outcome::Failed { report }
        }
    }

    pub fn passed(&self) -> bool {
        matches!(self, Outcome::Passed { .. })
    }

    pub fn report(&self) -> Option<&ComparisonReport> {
        match self {
            Outcome::Passed { report } | Outcome::Failed { report } => Some(report),
            Outcome::Errored { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&VerifyError> {
        match self {
            Outcome::Errored { error } => Some(error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseReport {
    pub name: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl CaseReport {
    pub fn passed(&self) -> bool {
        self.outcome.passed()
    }
}

impl fmt::Display for CaseReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Outcome::Passed { report } | Outcome::Failed { report } => {
                write!(f, "{}: {report}", self.name)
            }
            Outcome::Errored { error } => write!(f, "{}: error: {error}", self.name),
        }
    }
}

/// One expected template and the actual document it is checked against.
#[derive(Debug, Clone)]
pub struct VerifyCase {
    pub name: String,
    pub expected: String,
    pub actual: Value,
}

impl VerifyCase {
    pub fn new(name: impl Into<String>, expected: impl Into<String>, actual: Value) -> Self {
        Self {
            name: name.into(),
            expected: expected.into(),
            actual,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
}

impl Summary {
    pub fn of(reports: &[CaseReport]) -> Self {
        reports
            .iter()
            .fold(Summary::default(), |mut acc, r| {
                match r.outcome {
                    Outcome::Passed { .. } => acc.passed += 1,
                    Outcome::Failed { .. } => acc.failed += 1,
                    Outcome::Errored { .. } => acc.errored += 1,
                }
                acc
            })
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.errored == 0
    }
}

/// Renders expected templates and compares them with actual documents.
///
/// Holds no per-run state: one verifier can serve many threads.
#[derive(Clone)]
pub struct Verifier {
    registry: Registry,
    renderer: Arc<dyn TemplateRenderer>,
    options: VerifyOptions,
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new(Registry::with_builtins(), VerifyOptions::default())
    }
}

impl fmt::Debug for Verifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Verifier")
            .field("functions", &self.registry.names())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Verifier {
    pub fn new(registry: Registry, options: VerifyOptions) -> Self {
        Self {
            registry,
            renderer: Arc::new(BraceTemplate),
            options,
        }
    }

    /// Swap the templating substrate.
    pub fn with_renderer(mut self, renderer: impl TemplateRenderer + 'static) -> Self {
        self.renderer = Arc::new(renderer);
        self
    }

    fn compare_options(&self) -> CompareOptions {
        CompareOptions {
            strict_objects: self.options.strict_objects,
        }
    }

    /// Render only. Calling this again for diagnostics yields the same text.
    pub fn render(&self, source: &str, actual: &Value) -> Result<Rendered> {
        self.renderer
            .render(source, &self.registry, &Context::new(actual))
    }

    pub fn render_expected(&self, source: &str, actual: &Value) -> Result<Expected> {
        let rendered = self.render(source, actual)?;
        trace!(%rendered, "rendered expected document");
        Expected::parse(&rendered.text, &rendered.splices)
    }

    /// Render `source`, then compare it with `actual`.
    ///
    /// An expected document with no content, or only comments, is an empty
    /// object: it asserts nothing against an actual object.
    pub fn verify(&self, name: &str, source: &str, actual: &Value) -> CaseReport {
        let mut state = State::Rendering;
        debug!(case = name, stage = ?state.stage(), "verification started");
        let outcome = loop {
            state = match state {
                State::Rendering => match self.render_expected(source, actual) {
                    Ok(expected) => State::Comparing(expected),
                    Err(error) => {
                        warn!(case = name, %error, "rendering failed, skipping comparison");
                        State::Reported(Outcome::Errored { error })
                    }
                },
                State::Comparing(expected) => {
                    let report = compare(&expected, actual, &self.compare_options());
                    State::Reported(Outcome::from_report(report))
                }
                State::Reported(outcome) => break outcome,
            };
            debug!(case = name, stage = ?state.stage(), "stage entered");
        };
        CaseReport {
            name: name.to_string(),
            outcome,
        }
    }

    pub fn verify_case(&self, case: &VerifyCase) -> CaseReport {
        self.verify(&case.name, &case.expected, &case.actual)
    }

    /// Verify independent cases in parallel; reports keep the input order.
    pub fn verify_all(&self, cases: &[VerifyCase]) -> Vec<CaseReport> {
        let workers = thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1)
            .clamp(1, cases.len().max(1));
        let chunk = cases.len().div_ceil(workers).max(1);

        let reports: Vec<CaseReport> = thread::scope(|s| {
            let handles: Vec<_> = cases
                .chunks(chunk)
                .map(|batch| {
                    s.spawn(move || batch.iter().map(|c| self.verify_case(c)).collect::<Vec<_>>())
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                .collect()
        });

        let summary = Summary::of(&reports);
        info!(
            passed = summary.passed,
            failed = summary.failed,
            errored = summary.errored,
            "batch verified"
        );
        reports
    }
}
