use e2e_verifier::evaluator::Evaluator;
use e2e_verifier::{Evaluated, Registry};
use pretty_assertions::assert_eq;
use serde_json::json;

fn call(name: &str, tokens: &[&str]) -> Evaluated {
    let registry = Registry::with_builtins();
    Evaluator::new(&registry)
        .invoke_tokens(name, tokens)
        .unwrap()
}

fn text(e: Evaluated) -> String {
    match e {
        Evaluated::Value(v) => v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()),
        Evaluated::Mismatch(m) => panic!("unexpected mismatch: {m}"),
    }
}

#[test]
fn test_builtin_not_empty() {
    assert_eq!(call("notEmpty", &["x"]), Evaluated::text("x"));
    assert!(call("notEmpty", &[""]).is_mismatch());
    assert!(call("notEmpty", &["   "]).is_mismatch());
}

#[test]
fn test_builtin_b64enc() {
    assert_eq!(text(call("b64enc", &["hello world"])), "aGVsbG8gd29ybGQ=");
}

#[test]
fn test_builtin_sha256enc() {
    assert_eq!(
        text(call("sha256enc", &["secret"])),
        "2bb80d537b1da3e38bd30361aa855686bde0eacd7162fef6a25fe97bf527a25b"
    );
    assert_eq!(
        text(call("sha256enc", &[""])),
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
}

#[test]
fn test_builtin_sha512enc_length() {
    assert_eq!(text(call("sha512enc", &["x"])).len(), 128);
}

#[test]
fn test_builtin_regexp() {
    assert_eq!(call("regexp", &["abc123", r"^[a-z]+\d+$"]), Evaluated::text("abc123"));
    match call("regexp", &["abc", r"^\d+$"]) {
        Evaluated::Mismatch(m) => {
            assert!(m.explanation.contains("abc"));
            assert!(m.explanation.contains(r"\\d+"));
        }
        other => panic!("expected mismatch, got {other:?}"),
    }
    match call("regexp", &["abc", "("]) {
        Evaluated::Mismatch(m) => assert!(m.explanation.contains("invalid pattern")),
        other => panic!("expected mismatch, got {other:?}"),
    }
}

#[test]
fn test_builtin_subtractor() {
    assert_eq!(call("subtractor", &["10", "1", "2", "3"]), Evaluated::Value(json!(4)));
    assert_eq!(call("subtractor", &["5"]), Evaluated::Value(json!(5)));
}

// Re-evaluating a call never changes its outcome.
#[test]
fn calls_are_idempotent() {
    for (name, args) in [
        ("notEmpty", vec![""]),
        ("regexp", vec!["a", "b"]),
        ("sha512enc", vec!["abc"]),
    ] {
        assert_eq!(call(name, &args), call(name, &args));
    }
}
