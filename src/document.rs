//! Document trees and paths.
//!
//! The expected document is produced by parsing rendered template text. The
//! values and mismatch markers spliced in by the renderer are turned back into
//! their original values and tagged [`Expected::Mismatch`] leaves here, so the
//! comparator never has to guess from string contents.
use crate::errors::{Result, VerifyError};
use crate::functions::MismatchMarker;
use itertools::Itertools;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Address of a node: field names and array indices from the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DocPath(Vec<PathSegment>);

impl DocPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn push(&mut self, seg: PathSegment) {
        self.0.push(seg);
    }

    pub fn key(&self, k: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.push(PathSegment::Key(k.into()));
        next
    }

    pub fn index(&self, i: usize) -> Self {
        let mut next = self.clone();
        next.push(PathSegment::Index(i));
        next
    }
}

fn is_plain_key(k: &str) -> bool {
    !k.is_empty()
        && k
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str(".");
        }
        for (n, seg) in self.0.iter().enumerate() {
            match seg {
                PathSegment::Key(k) if is_plain_key(k) => {
                    if n > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(k)?;
                }
                PathSegment::Key(k) => write!(f, "[{k:?}]")?,
                PathSegment::Index(i) => write!(f, "[{i}]")?,
            }
        }
        Ok(())
    }
}

impl Serialize for DocPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

const TOKEN_STEM: &str = "__verifier";
const TOKEN_SUFFIX: &str = "__";

/// Values and markers produced while rendering, addressed by the tokens
/// spliced into the rendered text in their place.
///
/// Rendered text is parsed as YAML again, so nothing computed at render time
/// is written into it literally: a value comes back out of its token with the
/// exact type and text it had, whatever YAML would make of it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpliceTable {
    nonce: u32,
    markers: Vec<MismatchMarker>,
    values: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Piece<'a> {
    Text(&'a str),
    Marker(&'a MismatchMarker),
    Value(&'a Value),
}

impl SpliceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table whose tokens cannot be confused with text already in `source`.
    pub fn for_source(source: &str) -> Self {
        let mut nonce = 0;
        while source.contains(&token_prefix(nonce)) {
            nonce += 1;
        }
        Self {
            nonce,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.markers.len() + self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    /// Store `marker` and return the token that stands for it in the text.
    pub fn splice_marker(&mut self, marker: MismatchMarker) -> String {
        self.markers.push(marker);
        self.token('m', self.markers.len() - 1)
    }

    /// Store `value` and return the token that stands for it in the text.
    pub fn splice_value(&mut self, value: Value) -> String {
        self.values.push(value);
        self.token('v', self.values.len() - 1)
    }

    fn token(&self, kind: char, index: usize) -> String {
        format!("{}{kind}{index}{TOKEN_SUFFIX}", token_prefix(self.nonce))
    }

    /// Expected node for a rendered string scalar.
    ///
    /// A lone value token restores the value. Several markers in one string
    /// merge into one explanation. Otherwise value tokens are replaced by
    /// their text.
    pub fn resolve(&self, s: &str) -> Expected {
        let pieces = self.pieces(s);
        if let [Piece::Value(v)] = pieces.as_slice() {
            return Expected::from_json(v);
        }
        match expand(&pieces) {
            Ok(text) => Expected::Scalar(Value::String(text)),
            Err(marker) => Expected::Mismatch(marker),
        }
    }

    /// Text of a rendered mapping key, or the marker it embeds.
    pub fn resolve_key(&self, s: &str) -> std::result::Result<String, MismatchMarker> {
        expand(&self.pieces(s))
    }

    /// `text` with value tokens replaced by their text and markers shown
    /// as `<explanation>`.
    pub fn expand_text(&self, text: &str) -> String {
        self.pieces(text)
            .into_iter()
            .map(|piece| match piece {
                Piece::Text(t) => t.to_string(),
                Piece::Value(v) => value_text(v),
                Piece::Marker(m) => format!("<{m}>"),
            })
            .collect()
    }

    fn pieces<'a>(&'a self, mut s: &'a str) -> Vec<Piece<'a>> {
        let prefix = token_prefix(self.nonce);
        let mut out = Vec::new();
        while let Some(at) = s.find(&prefix) {
            let rest = &s[at + prefix.len()..];
            match self.token_at(rest) {
                Some((piece, len)) => {
                    if at > 0 {
                        out.push(Piece::Text(&s[..at]));
                    }
                    out.push(piece);
                    s = &rest[len..];
                }
                None => {
                    out.push(Piece::Text(&s[..at + prefix.len()]));
                    s = rest;
                }
            }
        }
        if !s.is_empty() {
            out.push(Piece::Text(s));
        }
        out
    }

    // `rest` follows a token prefix: `m<n>__` or `v<n>__`.
    fn token_at(&self, rest: &str) -> Option<(Piece<'_>, usize)> {
        let kind = rest.chars().next().filter(|c| *c == 'm' || *c == 'v')?;
        let body = &rest[1..];
        let digits = body.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 || !body[digits..].starts_with(TOKEN_SUFFIX) {
            return None;
        }
        let index: usize = body[..digits].parse().ok()?;
        let piece = if kind == 'm' {
            Piece::Marker(self.markers.get(index)?)
        } else {
            Piece::Value(self.values.get(index)?)
        };
        Some((piece, 1 + digits + TOKEN_SUFFIX.len()))
    }
}

fn token_prefix(nonce: u32) -> String {
    format!("{TOKEN_STEM}{nonce}_")
}

/// Text form of a value inside a larger string: strings raw, null empty,
/// everything else compact JSON.
fn value_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn expand(pieces: &[Piece<'_>]) -> std::result::Result<String, MismatchMarker> {
    let markers: Vec<&MismatchMarker> = pieces
        .iter()
        .filter_map(|p| match p {
            Piece::Marker(m) => Some(*m),
            _ => None,
        })
        .collect();
    if !markers.is_empty() {
        return Err(merge(&markers));
    }
    Ok(pieces
        .iter()
        .map(|p| match p {
            Piece::Text(t) => t.to_string(),
            Piece::Value(v) => value_text(v),
            Piece::Marker(_) => String::new(),
        })
        .collect())
}

fn merge(markers: &[&MismatchMarker]) -> MismatchMarker {
    match markers {
        [one] => (*one).clone(),
        many => MismatchMarker::new(many.iter().map(|m| m.explanation.as_str()).join("; ")),
    }
}

/// A rendered expected document.
#[derive(Debug, Clone, PartialEq)]
pub enum Expected {
    Null,
    /// Bool, number or string.
    Scalar(Value),
    Mismatch(MismatchMarker),
    Array(Vec<Expected>),
    /// Keys in document order.
    Object(Vec<(String, Expected)>),
}

impl Expected {
    /// Parse rendered text (YAML or JSON) and resolve splice tokens.
    ///
    /// Text with no content besides blank lines and comments is an empty
    /// document: an empty object that asserts nothing.
    pub fn parse(text: &str, splices: &SpliceTable) -> Result<Self> {
        let blank = text.lines().all(|line| {
            let line = line.trim();
            line.is_empty() || line.starts_with('#')
        });
        if blank {
            return Ok(Expected::Object(Vec::new()));
        }
        let yaml: serde_yaml::Value =
            serde_yaml::from_str(text).map_err(|e| VerifyError::Document(e.to_string()))?;
        Ok(Self::from_yaml(yaml, splices))
    }

    fn from_yaml(value: serde_yaml::Value, splices: &SpliceTable) -> Self {
        use serde_yaml::Value as Y;
        match value {
            Y::Null => Expected::Null,
            Y::Bool(b) => Expected::Scalar(Value::Bool(b)),
            Y::Number(n) => Expected::Scalar(yaml_number(&n)),
            Y::String(s) => splices.resolve(&s),
            Y::Sequence(items) => Expected::Array(
                items
                    .into_iter()
                    .map(|v| Self::from_yaml(v, splices))
                    .collect(),
            ),
            Y::Mapping(map) => {
                let mut fields = Vec::with_capacity(map.len());
                let mut broken_keys = Vec::new();
                for (k, v) in map {
                    let key = match k {
                        Y::String(s) => splices.resolve_key(&s),
                        other => Ok(yaml_key(other)),
                    };
                    match key {
                        Ok(key) => fields.push((key, Self::from_yaml(v, splices))),
                        Err(marker) => broken_keys.push(marker),
                    }
                }
                // a key that failed to render leaves the mapping without a shape
                if broken_keys.is_empty() {
                    Expected::Object(fields)
                } else {
                    Expected::Mismatch(merge(&broken_keys.iter().collect::<Vec<_>>()))
                }
            }
            Y::Tagged(tagged) => Self::from_yaml(tagged.value, splices),
        }
    }

    /// Plain expected value: tests, and values restored from splice tokens.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Expected::Null,
            Value::Array(items) => Expected::Array(items.iter().map(Self::from_json).collect()),
            Value::Object(map) => Expected::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
            scalar => Expected::Scalar(scalar.clone()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Expected::Null => "null",
            Expected::Scalar(v) => crate::functions::value_kind(v),
            Expected::Mismatch(_) => "mismatch",
            Expected::Array(_) => "array",
            Expected::Object(_) => "object",
        }
    }
}

fn yaml_number(n: &serde_yaml::Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::from(i)
    } else if let Some(u) = n.as_u64() {
        Value::from(u)
    } else {
        n.as_f64()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            // .nan / .inf have no JSON form
            .unwrap_or_else(|| Value::String(n.to_string()))
    }
}

fn yaml_key(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Null => "null".to_string(),
        other => match yaml_to_json(other) {
            Value::String(s) => s,
            v => v.to_string(),
        },
    }
}

/// Convert a YAML tree to JSON, stringifying non-string mapping keys.
pub fn yaml_to_json(value: serde_yaml::Value) -> Value {
    use serde_yaml::Value as Y;
    match value {
        Y::Null => Value::Null,
        Y::Bool(b) => Value::Bool(b),
        Y::Number(n) => yaml_number(&n),
        Y::String(s) => Value::String(s),
        Y::Sequence(items) => Value::Array(items.into_iter().map(yaml_to_json).collect()),
        Y::Mapping(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (yaml_key(k), yaml_to_json(v)))
                .collect(),
        ),
        Y::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

/// Parse an actual document given as YAML or JSON text.
pub fn parse_actual(text: &str) -> Result<Value> {
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|e| VerifyError::Document(e.to_string()))?;
    Ok(yaml_to_json(yaml))
}
