pub mod error;
mod inline;
mod marker;
mod structural;

pub use error::{ParseError, ParseErrorKind};

use crate::Document;

/// Parser entry point.
pub struct Parser {
    source: String,
    file_id: usize,
}

impl Parser {
    pub fn new(source: String, file_id: usize) -> Self {
        Parser { source, file_id }
    }

    /// Parse the lesson source into a complete Document.
    pub fn parse(&self) -> Result<Document, ParseError> {
        let blocks = structural::parse_blocks(&self.source, self.file_id)?;
        tracing::debug!(file_id = self.file_id, blocks = blocks.len(), "parsed lesson document");
        Ok(Document {
            blocks,
            source_id: self.file_id,
        })
    }
}
