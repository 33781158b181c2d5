use std::fmt;
use std::ops::Range;

use codespan_reporting::diagnostic::{Diagnostic, Label};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    DuplicateId,
    AnswerOutOfRange,
    NonPositivePoints,
    NonNumericAnswer,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueKind::DuplicateId => write!(f, "duplicate question id"),
            IssueKind::AnswerOutOfRange => write!(f, "answer out of range"),
            IssueKind::NonPositivePoints => write!(f, "non-positive points"),
            IssueKind::NonNumericAnswer => write!(f, "non-numeric answer"),
        }
    }
}

/// Where in the source a question block that contributed to an issue lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    pub first_line: usize,
    pub span: Range<usize>,
}

/// A structural problem found in a parsed document. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    pub block_id: String,
    pub message: String,
    /// Every block involved, in document order. A duplicate id lists all of its blocks.
    pub occurrences: Vec<Occurrence>,
    pub source_id: usize,
}

impl ValidationIssue {
    pub fn new(
        kind: IssueKind,
        block_id: impl Into<String>,
        message: impl Into<String>,
        occurrences: Vec<Occurrence>,
        source_id: usize,
    ) -> Self {
        ValidationIssue {
            kind,
            block_id: block_id.into(),
            message: message.into(),
            occurrences,
            source_id,
        }
    }

    /// Line of the first occurrence, if any.
    pub fn line(&self) -> Option<usize> {
        self.occurrences.first().map(|o| o.first_line)
    }

    /// Convert to a codespan-reporting Diagnostic; the first occurrence is the
    /// primary label, the rest are secondary.
    pub fn to_diagnostic(&self) -> Diagnostic<usize> {
        let labels = self
            .occurrences
            .iter()
            .enumerate()
            .map(|(i, occurrence)| {
                if i == 0 {
                    Label::primary(self.source_id, occurrence.span.clone())
                        .with_message(&self.message)
                } else {
                    Label::secondary(self.source_id, occurrence.span.clone())
                        .with_message(format!("`{}` used again here", self.block_id))
                }
            })
            .collect();
        Diagnostic::error()
            .with_message(format!("{} in `{}`", self.kind, self.block_id))
            .with_labels(labels)
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in `{}`: {}", self.kind, self.block_id, self.message)
    }
}
