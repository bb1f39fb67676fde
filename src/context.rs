use crate::document::{DocPath, PathSegment};
use serde::Deserialize;
use serde_json::Value;

/// What a template can see while it renders: the actual document, read-only.
#[derive(Clone, Copy, Debug)]
pub struct Context<'a> {
    actual: &'a Value,
}

impl<'a> Context<'a> {
    pub fn new(actual: &'a Value) -> Self {
        Self { actual }
    }

    /// Resolve `path` against the actual document. A path that leads nowhere
    /// is absent, which templates see as null.
    pub fn lookup(&self, path: &DocPath) -> Option<&'a Value> {
        let mut current = self.actual;
        for seg in path.segments() {
            current = match (seg, current) {
                (PathSegment::Key(k), Value::Object(map)) => map.get(k)?,
                (PathSegment::Index(i), Value::Array(arr)) => arr.get(*i)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

/// Knobs for one verification run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct VerifyOptions {
    /// Report keys present only in the actual document as extra.
    pub strict_objects: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn lookup_walks_keys_and_indices() {
        let doc = json!({"a": {"b": [10, {"c": "x"}]}});
        let ctx = Context::new(&doc);
        let path = DocPath::root().key("a").key("b").index(1).key("c");
        assert_eq!(ctx.lookup(&path), Some(&json!("x")));
        assert_eq!(ctx.lookup(&DocPath::root()), Some(&doc));
    }

    #[test]
    fn lookup_of_missing_or_mistyped_is_absent() {
        let doc = json!({"a": [1]});
        let ctx = Context::new(&doc);
        assert_eq!(ctx.lookup(&DocPath::root().key("z")), None);
        assert_eq!(ctx.lookup(&DocPath::root().key("a").index(3)), None);
        assert_eq!(ctx.lookup(&DocPath::root().key("a").key("b")), None);
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let opts: VerifyOptions = serde_json::from_value(json!({})).unwrap();
        assert_eq!(opts, VerifyOptions::default());
        let opts: VerifyOptions =
            serde_json::from_value(json!({"strict-objects": true})).unwrap();
        assert!(opts.strict_objects);
    }
}
