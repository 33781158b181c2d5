use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::question::QuestionBlock;

/// One structural unit of a lesson document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub kind: BlockKind,
    /// First source line of the block (1-based).
    pub first_line: usize,
    /// Last source line of the block (1-based, inclusive).
    pub last_line: usize,
    /// Byte span in source for error reporting.
    pub span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Heading {
        level: u8,
        text: String,
    },
    /// Raw prose lines joined with `\n`. Lists that never became a question
    /// end up here too.
    Paragraph {
        text: String,
    },
    CodeSample {
        language: Option<String>,
        /// Verbatim content, each line terminated by `\n`.
        content: String,
    },
    Image {
        alt: String,
        dest: String,
        title: String,
    },
    Question(QuestionBlock),
}

impl BlockKind {
    pub fn name(&self) -> &'static str {
        match self {
            BlockKind::Heading { .. } => "heading",
            BlockKind::Paragraph { .. } => "paragraph",
            BlockKind::CodeSample { .. } => "code_sample",
            BlockKind::Image { .. } => "image",
            BlockKind::Question(_) => "question",
        }
    }
}

impl Block {
    pub fn question(&self) -> Option<&QuestionBlock> {
        match &self.kind {
            BlockKind::Question(question) => Some(question),
            _ => None,
        }
    }
}
