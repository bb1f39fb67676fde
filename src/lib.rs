//! Expected-vs-actual verification for end-to-end tests.
//!
//! An expected document is a YAML/JSON template whose `{{ ... }}` actions call
//! the functions in [`functions::Registry`] and read the actual document. The
//! rendered result is compared with the actual document path by path.
//!
//! ```
//! use serde_json::json;
//!
//! let outcome = e2e_verifier::verify(
//!     "name: {{ notEmpty .name }}\nid: {{ regexp .id `^svc-\\d+$` }}",
//!     &json!({"name": "checkout", "id": "svc-12", "extra": true}),
//! );
//! assert!(outcome.passed());
//! ```
pub mod comparison;
pub mod context;
pub mod document;
pub mod engine;
pub mod errors;
pub mod evaluator;
pub mod expression;
pub mod functions; // function library
pub mod report;
pub mod template;
mod parser;

use serde_json::Value;

pub use comparison::{compare, CompareOptions};
pub use context::{Context, VerifyOptions};
pub use document::{parse_actual, DocPath, Expected, PathSegment, SpliceTable};
pub use engine::{CaseReport, Outcome, Stage, Summary, VerifyCase, Verifier};
pub use errors::{Result, VerifyError};
pub use functions::{Evaluated, MismatchMarker, Registry};
pub use report::{ComparisonReport, Verdict, VerdictKind};

/// Convenience: verify with the builtin registry and default options.
pub fn verify(expected_source: &str, actual: &Value) -> Outcome {
    Verifier::default()
        .verify("expected", expected_source, actual)
        .outcome
}
