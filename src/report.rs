use crate::document::DocPath;
use itertools::Itertools;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerdictKind {
    Match,
    Mismatch { reason: String },
    MissingInActual,
    ExtraInActual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub path: DocPath,
    #[serde(flatten)]
    pub kind: VerdictKind,
}

impl Verdict {
    pub fn is_match(&self) -> bool {
        self.kind == VerdictKind::Match
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            VerdictKind::Match => write!(f, "{}: ok", self.path),
            VerdictKind::Mismatch { reason } => write!(f, "{}: {reason}", self.path),
            VerdictKind::MissingInActual => write!(f, "{}: missing in actual", self.path),
            VerdictKind::ExtraInActual => write!(f, "{}: not in expected", self.path),
        }
    }
}

/// Per-path verdicts in the order the expected document was walked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComparisonReport {
    pub verdicts: Vec<Verdict>,
}

impl ComparisonReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, path: &DocPath, kind: VerdictKind) {
        self.verdicts.push(Verdict {
            path: path.clone(),
            kind,
        });
    }

    pub fn is_pass(&self) -> bool {
        self.verdicts.iter().all(Verdict::is_match)
    }

    pub fn failures(&self) -> impl Iterator<Item = &Verdict> {
        self.verdicts.iter().filter(|v| !v.is_match())
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    /// First verdict recorded at `path`, if any.
    pub fn at(&self, path: &DocPath) -> Option<&Verdict> {
        self.verdicts.iter().find(|v| &v.path == path)
    }
}

impl fmt::Display for ComparisonReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_pass() {
            return write!(f, "pass ({} checks)", self.verdicts.len());
        }
        writeln!(
            f,
            "fail: {} of {} checks",
            self.failure_count(),
            self.verdicts.len()
        )?;
        write!(f, "{}", self.failures().map(|v| format!("  {v}")).join("\n"))
    }
}
