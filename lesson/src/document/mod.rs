use std::fmt;

use serde::{Deserialize, Serialize};

use crate::block::{Block, BlockKind};
use crate::question::{ChoiceOption, QuestionBlock};

/// A parsed lesson: blocks in reading (and quiz) order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub blocks: Vec<Block>,
    /// The source file ID (for error reporting with codespan-reporting).
    pub source_id: usize,
}

impl Document {
    /// Question blocks in document order.
    pub fn questions(&self) -> impl Iterator<Item = &QuestionBlock> {
        self.blocks.iter().filter_map(Block::question)
    }

    pub fn question_count(&self) -> usize {
        self.questions().count()
    }

    pub fn total_points(&self) -> i64 {
        self.questions().map(QuestionBlock::points).sum()
    }
}

/// Renders canonical lesson markdown. Re-parsing the output yields the same
/// blocks (positions aside).
impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, block) in self.blocks.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", block.kind)?;
        }
        Ok(())
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockKind::Heading { level, text } => {
                for _ in 0..*level {
                    write!(f, "#")?;
                }
                write!(f, " {}", text)?;
                // A trailing `#` would otherwise be read back as a closing sequence.
                if text.ends_with('#') {
                    write!(f, " #")?;
                }
                writeln!(f)
            }
            BlockKind::Paragraph { text } => writeln!(f, "{}", text),
            BlockKind::CodeSample { language, content } => {
                let fence = "`".repeat(fence_width(content));
                write!(f, "{}", fence)?;
                if let Some(lang) = language {
                    write!(f, "{}", lang)?;
                }
                writeln!(f)?;
                write!(f, "{}", content)?;
                writeln!(f, "{}", fence)
            }
            BlockKind::Image { alt, dest, title } => {
                write!(f, "![{}]({}", escape_inline(alt), link_destination(dest))?;
                if !title.is_empty() {
                    write!(f, " \"{}\"", escape_inline(title))?;
                }
                writeln!(f, ")")
            }
            BlockKind::Question(question) => write!(f, "{}", question),
        }
    }
}

impl fmt::Display for QuestionBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for option in self.options() {
            write!(f, "{}", option)?;
        }
        write!(
            f,
            "{{: .{} #{} title=\"{}\" points=\"{}\"",
            self.class(),
            self.id(),
            escape_attribute(self.title()),
            self.points()
        )?;
        match self {
            QuestionBlock::ChooseBest(q) => write!(f, " answer=\"{}\"", q.answer)?,
            QuestionBlock::FreeTextNumber(q) => {
                write!(f, " answer=\"{}\"", escape_attribute(q.answer.as_attribute()))?
            }
        }
        writeln!(f, " }}")
    }
}

impl fmt::Display for ChoiceOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "- {}", self.text)?;
        for line in &self.feedback {
            writeln!(f, "  - {}", line)?;
        }
        Ok(())
    }
}

fn escape_attribute(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Backslash-escape ASCII punctuation, which CommonMark unescapes in link
/// text, destinations and titles alike.
fn escape_inline(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if c.is_ascii_punctuation() {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Plain paths stay bare; anything with spaces, brackets or parentheses goes
/// in `<...>`.
fn link_destination(dest: &str) -> String {
    let bare = !dest.is_empty()
        && dest
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/.-_:?=#%+~,;@".contains(c));
    if bare {
        dest.to_string()
    } else {
        format!("<{}>", escape_inline(dest))
    }
}

/// A backtick fence one longer than any backtick run that opens a content line.
fn fence_width(content: &str) -> usize {
    let longest = content
        .lines()
        .map(|line| line.trim_start().chars().take_while(|&c| c == '`').count())
        .max()
        .unwrap_or(0);
    (longest + 1).max(3)
}
