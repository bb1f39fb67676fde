//! The templating substrate seam and its default `{{ ... }}` implementation.
use crate::context::Context;
use crate::document::SpliceTable;
use crate::errors::{Result, VerifyError};
use crate::evaluator::Evaluator;
use crate::expression::parse_action;
use crate::functions::{Evaluated, Registry};
use std::fmt;
use tracing::debug;

/// Rendered document text plus the values and markers its tokens refer to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    pub splices: SpliceTable,
}

/// The text as a reader would expect it, tokens replaced.
impl fmt::Display for Rendered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.splices.expand_text(&self.text))
    }
}

/// Expands an expected-document template against the actual document.
///
/// Implementations must route every function call through an
/// [`Evaluator`] over `registry` and splice every result through
/// [`SpliceTable`] so it survives into the parsed document unchanged.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, source: &str, registry: &Registry, ctx: &Context<'_>) -> Result<Rendered>;
}

/// `{{ pipeline }}` actions with `{{-`/`-}}` whitespace trimming and
/// `{{/* comments */}}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BraceTemplate;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

impl TemplateRenderer for BraceTemplate {
    fn render(&self, source: &str, registry: &Registry, ctx: &Context<'_>) -> Result<Rendered> {
        let ev = Evaluator::new(registry);
        let mut out = String::with_capacity(source.len());
        let mut splices = SpliceTable::for_source(source);
        let mut actions = 0usize;
        let mut pos = 0usize;

        while let Some(found) = source[pos..].find(OPEN) {
            let open_at = pos + found;
            let mut text = &source[pos..open_at];
            let mut start = open_at + OPEN.len();
            if trims_left(&source[start..]) {
                text = text.trim_end();
                start += 1;
            }
            out.push_str(text);

            let close_at = find_close(source, start).ok_or_else(|| {
                let what = if source[start..].trim_start().starts_with("/*") {
                    "unclosed comment"
                } else {
                    "unclosed action"
                };
                VerifyError::syntax(open_at, what)
            })?;
            let mut end = close_at;
            let trim_right = trims_right(&source[start..close_at]);
            if trim_right {
                end -= 1;
            }

            let inner = &source[start..end];
            let trimmed = inner.trim();
            if trimmed.starts_with("/*") {
                if !trimmed.ends_with("*/") {
                    return Err(VerifyError::syntax(open_at, "unclosed comment"));
                }
            } else {
                let pipeline = parse_action(inner, start)?;
                let value = pipeline.eval(&ev, ctx)?;
                out.push_str(&splice(value, &mut splices));
                actions += 1;
            }

            pos = close_at + CLOSE.len();
            if trim_right {
                let rest = &source[pos..];
                pos += rest.len() - rest.trim_start().len();
            }
        }
        out.push_str(&source[pos..]);

        debug!(
            actions,
            mismatches = splices.marker_count(),
            "rendered template"
        );
        Ok(Rendered {
            text: out,
            splices,
        })
    }
}

// `{{- ` trims only when the dash is followed by whitespace; `{{-3}}` is a number.
fn trims_left(after_open: &str) -> bool {
    let mut chars = after_open.chars();
    chars.next() == Some('-') && chars.next().is_some_and(char::is_whitespace)
}

fn trims_right(inner: &str) -> bool {
    let mut chars = inner.chars().rev();
    chars.next() == Some('-') && chars.next().is_some_and(char::is_whitespace)
}

/// Byte offset of the `}}` closing the action that starts at `from`,
/// ignoring braces inside string literals.
fn find_close(source: &str, from: usize) -> Option<usize> {
    let body = source[from..].trim_start();
    if body.starts_with("/*") {
        let comment_at = source.len() - body.len();
        let after = comment_at + body.find("*/")? + 2;
        return find_close(source, after).filter(|&at| {
            source[after..at]
                .trim_matches(|c: char| c == '-' || c.is_whitespace())
                .is_empty()
        });
    }
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in source[from..].char_indices() {
        let at = from + i;
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' && q != '`' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            }
            None => {
                if c == '"' || c == '\'' || c == '`' {
                    quote = Some(c);
                } else if source[at..].starts_with(CLOSE) {
                    return Some(at);
                }
            }
        }
    }
    None
}

fn splice(value: Evaluated, splices: &mut SpliceTable) -> String {
    match value {
        Evaluated::Mismatch(m) => splices.splice_marker(m),
        Evaluated::Value(v) => splices.splice_value(v),
    }
}
