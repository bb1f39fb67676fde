use crate::document::{DocPath, Expected};
use crate::functions::value_kind;
use crate::report::{ComparisonReport, VerdictKind};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompareOptions {
    /// Report actual-only object keys as [`VerdictKind::ExtraInActual`].
    /// Off means the expected document lists the subset of fields under test.
    pub strict_objects: bool,
}

/// Walk `expected` against `actual` and record a verdict for every leaf and
/// every structural failure. Never stops at the first failure.
pub fn compare(expected: &Expected, actual: &Value, opts: &CompareOptions) -> ComparisonReport {
    let mut report = ComparisonReport::new();
    compare_node(expected, Some(actual), &DocPath::root(), opts, &mut report);
    report
}

fn compare_node(
    expected: &Expected,
    actual: Option<&Value>,
    path: &DocPath,
    opts: &CompareOptions,
    report: &mut ComparisonReport,
) {
    match (expected, actual) {
        // A marker fails wherever it sits, present or not.
        (Expected::Mismatch(marker), _) => report.push(
            path,
            VerdictKind::Mismatch {
                reason: marker.explanation.clone(),
            },
        ),
        (Expected::Null, None | Some(Value::Null)) => report.push(path, VerdictKind::Match),
        (_, None) => report.push(path, VerdictKind::MissingInActual),
        (Expected::Null, Some(a)) => report.push(
            path,
            VerdictKind::Mismatch {
                reason: format!("expected null, got {}", describe(a)),
            },
        ),
        (Expected::Scalar(e), Some(a)) => {
            let same = matches!(
                (scalar_repr(e), scalar_repr(a)),
                (Some(x), Some(y)) if x == y
            );
            let kind = if same {
                VerdictKind::Match
            } else {
                VerdictKind::Mismatch {
                    reason: format!("expected {e}, got {}", describe(a)),
                }
            };
            report.push(path, kind);
        }
        (Expected::Object(fields), Some(Value::Object(map))) => {
            for (key, child) in fields {
                compare_node(child, map.get(key), &path.key(key.as_str()), opts, report);
            }
            if opts.strict_objects {
                for key in map.keys() {
                    if !fields.iter().any(|(k, _)| k == key) {
                        report.push(&path.key(key.as_str()), VerdictKind::ExtraInActual);
                    }
                }
            }
        }
        (Expected::Array(items), Some(Value::Array(arr))) => {
            if items.len() != arr.len() {
                report.push(
                    path,
                    VerdictKind::Mismatch {
                        reason: format!(
                            "expected {} elements, got {}",
                            items.len(),
                            arr.len()
                        ),
                    },
                );
                return;
            }
            for (i, (child, a)) in items.iter().zip(arr).enumerate() {
                compare_node(child, Some(a), &path.index(i), opts, report);
            }
        }
        (e, Some(a)) => report.push(
            path,
            VerdictKind::Mismatch {
                reason: format!("expected {}, got {}", e.kind(), value_kind(a)),
            },
        ),
    }
}

/// Textual form used for scalar equality: `9` and `"9"` are the same value.
fn scalar_repr(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn describe(v: &Value) -> String {
    match v {
        Value::Array(_) | Value::Object(_) => value_kind(v).to_string(),
        scalar => scalar.to_string(),
    }
}
