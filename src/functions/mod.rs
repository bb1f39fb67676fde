use crate::errors::{Result, VerifyError};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub mod builtins;

/// Declared type of one function parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Str,
    Int,
    /// Untyped; the value is handed over as-is, null included.
    Any,
}

impl ArgKind {
    pub fn name(self) -> &'static str {
        match self {
            ArgKind::Str => "string",
            ArgKind::Int => "integer",
            ArgKind::Any => "any",
        }
    }
}

/// An argument after coercion to its declared [`ArgKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Str(String),
    Int(i64),
    Any(Value),
}

impl Arg {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Arg::Str(_) => "string",
            Arg::Int(_) => "integer",
            Arg::Any(v) => value_kind(v),
        }
    }
}

/// JSON kind of a value, as used in diagnostics.
pub fn value_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Fixed parameters followed by an optional variadic tail.
#[derive(Debug, Clone, Copy)]
pub struct Signature {
    pub params: &'static [ArgKind],
    pub variadic: Option<ArgKind>,
}

impl Signature {
    pub const fn fixed(params: &'static [ArgKind]) -> Self {
        Self {
            params,
            variadic: None,
        }
    }

    pub const fn variadic(params: &'static [ArgKind], tail: ArgKind) -> Self {
        Self {
            params,
            variadic: Some(tail),
        }
    }

    pub fn accepts(&self, count: usize) -> bool {
        match self.variadic {
            Some(_) => count >= self.params.len(),
            None => count == self.params.len(),
        }
    }

    /// Declared kind of the parameter at `index`, if there is one.
    pub fn kind_at(&self, index: usize) -> Option<ArgKind> {
        self.params.get(index).copied().or(self.variadic)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.variadic {
            Some(_) => write!(f, "at least {}", self.params.len()),
            None => write!(f, "{}", self.params.len()),
        }
    }
}

/// A failed soft constraint, carried as data until the comparator reports it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MismatchMarker {
    pub explanation: String,
}

impl MismatchMarker {
    pub fn new(explanation: impl Into<String>) -> Self {
        Self {
            explanation: explanation.into(),
        }
    }
}

impl fmt::Display for MismatchMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.explanation)
    }
}

/// Result of one function call.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluated {
    Value(Value),
    Mismatch(MismatchMarker),
}

impl Evaluated {
    pub fn text(s: impl Into<String>) -> Self {
        Evaluated::Value(Value::String(s.into()))
    }

    pub fn mismatch(explanation: impl Into<String>) -> Self {
        Evaluated::Mismatch(MismatchMarker::new(explanation))
    }

    pub fn is_mismatch(&self) -> bool {
        matches!(self, Evaluated::Mismatch(_))
    }
}

pub type Callable = fn(&[Arg]) -> Result<Evaluated>;

/// A named pure function usable inside expected-document templates.
#[derive(Clone, Copy)]
pub struct FunctionSpec {
    pub name: &'static str,
    pub signature: Signature,
    call: Callable,
}

impl FunctionSpec {
    pub const fn new(name: &'static str, signature: Signature, call: Callable) -> Self {
        Self {
            name,
            signature,
            call,
        }
    }

    /// Invoke with arguments already coerced to the declared signature.
    pub fn call(&self, args: &[Arg]) -> Result<Evaluated> {
        (self.call)(args)
    }
}

impl fmt::Debug for FunctionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionSpec")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish()
    }
}

/// Name to function mapping. Read-only once shared, cheap to clone.
#[derive(Clone, Default, Debug)]
pub struct Registry {
    inner: Arc<HashMap<&'static str, FunctionSpec>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for spec in builtins::BUILTINS {
            registry.register(*spec);
        }
        registry
    }

    /// Adds or replaces a function. Meant for start-up, before the registry
    /// is handed to verifiers.
    pub fn register(&mut self, spec: FunctionSpec) {
        Arc::make_mut(&mut self.inner).insert(spec.name, spec);
    }

    pub fn get(&self, name: &str) -> Option<&FunctionSpec> {
        self.inner.get(name)
    }

    pub fn lookup(&self, name: &str) -> Result<&FunctionSpec> {
        self.get(name)
            .ok_or_else(|| VerifyError::UnknownFunction(name.to_string()))
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.inner.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn builtins_are_registered() {
        let r = Registry::with_builtins();
        assert_eq!(
            r.names(),
            vec!["b64enc", "notEmpty", "regexp", "sha256enc", "sha512enc", "subtractor"]
        );
    }

    #[test]
    fn unknown_name_is_not_found() {
        let r = Registry::with_builtins();
        assert_eq!(
            r.lookup("nope").unwrap_err(),
            VerifyError::UnknownFunction("nope".into())
        );
    }

    #[test]
    fn register_does_not_touch_clones() {
        fn upper(args: &[Arg]) -> Result<Evaluated> {
            match args {
                [Arg::Str(s)] => Ok(Evaluated::text(s.to_uppercase())),
                _ => Ok(Evaluated::mismatch("upper expects one string")),
            }
        }
        let base = Registry::with_builtins();
        let mut extended = base.clone();
        extended.register(FunctionSpec::new(
            "upper",
            Signature::fixed(&[ArgKind::Str]),
            upper,
        ));
        assert!(base.get("upper").is_none());
        let spec = extended.get("upper").unwrap();
        assert_eq!(
            spec.call(&[Arg::Str("ab".into())]).unwrap(),
            Evaluated::text("AB")
        );
    }

    #[test]
    fn signature_arity() {
        let fixed = Signature::fixed(&[ArgKind::Str, ArgKind::Str]);
        assert!(fixed.accepts(2));
        assert!(!fixed.accepts(3));
        assert_eq!(fixed.to_string(), "2");

        let var = Signature::variadic(&[ArgKind::Int], ArgKind::Int);
        assert!(var.accepts(1));
        assert!(var.accepts(5));
        assert!(!var.accepts(0));
        assert_eq!(var.kind_at(4), Some(ArgKind::Int));
        assert_eq!(var.to_string(), "at least 1");
    }
}
