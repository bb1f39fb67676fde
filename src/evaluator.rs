use crate::errors::{Result, VerifyError};
use crate::functions::{value_kind, Arg, ArgKind, Evaluated, Registry};
use serde_json::Value;
use tracing::trace;

/// Single dispatch point between template actions and the function registry:
/// arity check, argument coercion, invocation.
#[derive(Clone, Copy, Debug)]
pub struct Evaluator<'r> {
    registry: &'r Registry,
}

impl<'r> Evaluator<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    /// Call `name` with evaluated arguments.
    ///
    /// A mismatch among the arguments short-circuits the call and is returned
    /// as-is, so the first broken constraint is the one that gets reported.
    pub fn invoke(&self, name: &str, args: Vec<Evaluated>) -> Result<Evaluated> {
        let spec = self.registry.lookup(name)?;
        if !spec.signature.accepts(args.len()) {
            return Err(VerifyError::Arity {
                function: name.to_string(),
                expected: spec.signature.to_string(),
                got: args.len(),
            });
        }

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                Evaluated::Value(v) => values.push(v),
                mismatch @ Evaluated::Mismatch(_) => {
                    trace!(function = name, "argument carries a mismatch, skipping call");
                    return Ok(mismatch);
                }
            }
        }

        let coerced = values
            .into_iter()
            .enumerate()
            .map(|(index, v)| {
                // accepts() guarantees a declared kind for every position
                let kind = spec.signature.kind_at(index).unwrap_or(ArgKind::Any);
                coerce(name, index, kind, v)
            })
            .collect::<Result<Vec<_>>>()?;

        trace!(function = name, args = coerced.len(), "dispatch");
        spec.call(&coerced)
    }

    /// Call `name` with raw, untyped argument tokens.
    pub fn invoke_tokens(&self, name: &str, tokens: &[&str]) -> Result<Evaluated> {
        let args = tokens
            .iter()
            .map(|t| Evaluated::text(*t))
            .collect::<Vec<_>>();
        self.invoke(name, args)
    }
}

fn coerce(function: &str, index: usize, kind: ArgKind, v: Value) -> Result<Arg> {
    match kind {
        ArgKind::Any => Ok(Arg::Any(v)),
        ArgKind::Str => match v {
            Value::String(s) => Ok(Arg::Str(s)),
            Value::Number(n) => Ok(Arg::Str(n.to_string())),
            Value::Bool(b) => Ok(Arg::Str(b.to_string())),
            other => Err(VerifyError::ArgumentType {
                function: function.to_string(),
                index,
                expected: kind.name(),
                got: value_kind(&other),
            }),
        },
        ArgKind::Int => {
            let parsed = match &v {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            };
            parsed.map(Arg::Int).ok_or_else(|| VerifyError::Coercion {
                function: function.to_string(),
                index,
                expected: kind.name(),
                value: v.to_string(),
            })
        }
    }
}
