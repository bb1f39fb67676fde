//! Functions available to every expected document.
//!
//! Constraint checks (`notEmpty`, `regexp`) never fail the render: a broken
//! constraint comes back as [`Evaluated::Mismatch`] and stays at its path.
use super::{value_kind, Arg, ArgKind, Evaluated, FunctionSpec, Signature};
use crate::errors::{Result, VerifyError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use regex::Regex;
use serde_json::Value;
use sha2::{Digest as _, Sha256, Sha512};

pub const BUILTINS: &[FunctionSpec] = &[
    // Basic
    FunctionSpec::new("notEmpty", Signature::fixed(&[ArgKind::Any]), not_empty),
    // Encoding
    FunctionSpec::new("b64enc", Signature::fixed(&[ArgKind::Str]), b64enc),
    FunctionSpec::new("sha256enc", Signature::fixed(&[ArgKind::Str]), sha256enc),
    FunctionSpec::new("sha512enc", Signature::fixed(&[ArgKind::Str]), sha512enc),
    // Regex
    FunctionSpec::new(
        "regexp",
        Signature::fixed(&[ArgKind::Str, ArgKind::Str]),
        regexp,
    ),
    // Calculation
    FunctionSpec::new(
        "subtractor",
        Signature::variadic(&[ArgKind::Int], ArgKind::Int),
        subtractor,
    ),
];

fn bad_shape(function: &str, args: &[Arg], expected: &'static str) -> VerifyError {
    VerifyError::ArgumentType {
        function: function.to_string(),
        index: 0,
        expected,
        got: args.first().map(Arg::kind_name).unwrap_or("nothing"),
    }
}

pub fn not_empty(args: &[Arg]) -> Result<Evaluated> {
    let value = match args {
        [Arg::Any(v)] => v,
        [Arg::Str(s)] => return Ok(not_empty_str(s)),
        _ => return Err(bad_shape("notEmpty", args, "string or null")),
    };
    Ok(match value {
        Value::Null => Evaluated::mismatch("null is empty, wanted is not empty"),
        Value::String(s) => not_empty_str(s),
        other => Evaluated::mismatch(format!(
            "notEmpty only supports null or string type, but was {}",
            value_kind(other)
        )),
    })
}

fn not_empty_str(s: &str) -> Evaluated {
    if s.trim().is_empty() {
        Evaluated::mismatch(format!("{s:?} is empty, wanted is not empty"))
    } else {
        Evaluated::text(s)
    }
}

pub fn b64enc(args: &[Arg]) -> Result<Evaluated> {
    match args {
        [Arg::Str(s)] => Ok(Evaluated::text(STANDARD.encode(s.as_bytes()))),
        _ => Err(bad_shape("b64enc", args, "string")),
    }
}

pub fn sha256enc(args: &[Arg]) -> Result<Evaluated> {
    match args {
        [Arg::Str(s)] => Ok(Evaluated::text(hex::encode(Sha256::digest(s.as_bytes())))),
        _ => Err(bad_shape("sha256enc", args, "string")),
    }
}

pub fn sha512enc(args: &[Arg]) -> Result<Evaluated> {
    match args {
        [Arg::Str(s)] => Ok(Evaluated::text(hex::encode(Sha512::digest(s.as_bytes())))),
        _ => Err(bad_shape("sha512enc", args, "string")),
    }
}

/// Unanchored match: `pattern` may hit anywhere in `value` unless it anchors itself.
pub fn regexp(args: &[Arg]) -> Result<Evaluated> {
    let (value, pattern) = match args {
        [Arg::Str(v), Arg::Str(p)] => (v, p),
        _ => return Err(bad_shape("regexp", args, "string")),
    };
    let re = match Regex::new(pattern) {
        Ok(re) => re,
        Err(e) => {
            return Ok(Evaluated::mismatch(format!(
                "invalid pattern {pattern:?}: {e}"
            )))
        }
    };
    if re.is_match(value) {
        Ok(Evaluated::text(value.as_str()))
    } else {
        Ok(Evaluated::mismatch(format!(
            "{value} does not match the pattern {pattern:?}"
        )))
    }
}

pub fn subtractor(args: &[Arg]) -> Result<Evaluated> {
    let mut ints = args.iter().map(|a| match a {
        Arg::Int(n) => Ok(*n),
        other => Err(VerifyError::ArgumentType {
            function: "subtractor".into(),
            index: 0,
            expected: "integer",
            got: other.kind_name(),
        }),
    });
    let total = ints
        .next()
        .ok_or_else(|| VerifyError::Arity {
            function: "subtractor".into(),
            expected: "at least 1".into(),
            got: 0,
        })??;
    let rest = ints.collect::<Result<Vec<i64>>>()?;
    let result = rest.into_iter().fold(total, i64::wrapping_sub);
    Ok(Evaluated::Value(Value::from(result)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn s(v: &str) -> Arg {
        Arg::Str(v.to_string())
    }

    fn explanation(e: Evaluated) -> String {
        match e {
            Evaluated::Mismatch(m) => m.explanation,
            other => panic!("expected mismatch, got {other:?}"),
        }
    }

    #[test]
    fn not_empty_passes_content_through() {
        assert_eq!(
            not_empty(&[Arg::Any(json!("x"))]).unwrap(),
            Evaluated::text("x")
        );
        assert_eq!(
            not_empty(&[Arg::Any(json!("  padded "))]).unwrap(),
            Evaluated::text("  padded ")
        );
    }

    #[test]
    fn not_empty_rejects_blank_and_null() {
        assert_eq!(
            explanation(not_empty(&[Arg::Any(json!(""))]).unwrap()),
            "\"\" is empty, wanted is not empty"
        );
        assert_eq!(
            explanation(not_empty(&[Arg::Any(json!("  "))]).unwrap()),
            "\"  \" is empty, wanted is not empty"
        );
        assert_eq!(
            explanation(not_empty(&[Arg::Any(Value::Null)]).unwrap()),
            "null is empty, wanted is not empty"
        );
    }

    #[test]
    fn not_empty_names_unsupported_type() {
        let msg = explanation(not_empty(&[Arg::Any(json!(12))]).unwrap());
        assert_eq!(msg, "notEmpty only supports null or string type, but was number");
    }

    #[test]
    fn b64_uses_standard_padded_alphabet() {
        assert_eq!(b64enc(&[s("hi")]).unwrap(), Evaluated::text("aGk="));
        assert_eq!(b64enc(&[s("")]).unwrap(), Evaluated::text(""));
    }

    #[test]
    fn sha_digests_are_lowercase_hex() {
        assert_eq!(
            sha256enc(&[s("abc")]).unwrap(),
            Evaluated::text("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
        assert_eq!(
            sha512enc(&[s("abc")]).unwrap(),
            Evaluated::text(
                "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a\
                 2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f"
            )
        );
    }

    #[test]
    fn regexp_match_returns_value() {
        assert_eq!(
            regexp(&[s("abc123"), s(r"^[a-z]+\d+$")]).unwrap(),
            Evaluated::text("abc123")
        );
        // unanchored
        assert_eq!(
            regexp(&[s("xxabcxx"), s("abc")]).unwrap(),
            Evaluated::text("xxabcxx")
        );
    }

    #[test]
    fn regexp_mismatch_names_value_and_pattern() {
        let msg = explanation(regexp(&[s("abc"), s(r"^\d+$")]).unwrap());
        assert_eq!(msg, r#"abc does not match the pattern "^\\d+$""#);
    }

    #[test]
    fn regexp_invalid_pattern_is_a_marker() {
        let msg = explanation(regexp(&[s("abc"), s("(")]).unwrap());
        assert!(msg.starts_with("invalid pattern \"(\":"), "{msg}");
    }

    #[test]
    fn subtractor_folds_left() {
        let ints = |v: &[i64]| v.iter().map(|n| Arg::Int(*n)).collect::<Vec<_>>();
        assert_eq!(
            subtractor(&ints(&[10, 1, 2, 3])).unwrap(),
            Evaluated::Value(json!(4))
        );
        assert_eq!(subtractor(&ints(&[5])).unwrap(), Evaluated::Value(json!(5)));
        assert_eq!(
            subtractor(&ints(&[0, 7])).unwrap(),
            Evaluated::Value(json!(-7))
        );
    }

    #[test]
    fn wrong_shape_is_a_type_error() {
        assert!(matches!(
            b64enc(&[Arg::Int(1)]),
            Err(VerifyError::ArgumentType { .. })
        ));
    }
}
