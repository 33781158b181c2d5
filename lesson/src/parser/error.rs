use std::fmt;
use std::ops::Range;

use codespan_reporting::diagnostic::{Diagnostic, Label};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseErrorKind {
    MalformedBlockMarker,
    UnterminatedCodeFence,
    MissingMetadata,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::MalformedBlockMarker => write!(f, "malformed block marker"),
            ParseErrorKind::UnterminatedCodeFence => write!(f, "unterminated code fence"),
            ParseErrorKind::MissingMetadata => write!(f, "missing metadata"),
        }
    }
}

/// A fatal parse error with source location information.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind} on line {line}: {message}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// 1-based line of the offending text.
    pub line: usize,
    pub span: Range<usize>,
    pub file_id: usize,
    /// The pattern the parser expected at this point.
    pub expected: Option<&'static str>,
}

impl ParseError {
    pub fn new(
        kind: ParseErrorKind,
        message: impl Into<String>,
        line: usize,
        span: Range<usize>,
        file_id: usize,
    ) -> Self {
        ParseError {
            kind,
            message: message.into(),
            line,
            span,
            file_id,
            expected: None,
        }
    }

    pub fn expecting(mut self, pattern: &'static str) -> Self {
        self.expected = Some(pattern);
        self
    }

    /// Convert to a codespan-reporting Diagnostic for display.
    pub fn to_diagnostic(&self) -> Diagnostic<usize> {
        let mut notes = Vec::new();
        if let Some(pattern) = self.expected {
            notes.push(format!("expected: {}", pattern));
        }
        Diagnostic::error()
            .with_message(self.kind.to_string())
            .with_labels(vec![
                Label::primary(self.file_id, self.span.clone()).with_message(&self.message),
            ])
            .with_notes(notes)
    }
}
