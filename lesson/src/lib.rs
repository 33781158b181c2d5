pub mod block;
pub mod document;
pub mod parser;
pub mod question;

pub use block::{Block, BlockKind};
pub use document::Document;
pub use parser::{ParseError, ParseErrorKind, Parser};
pub use question::{ChoiceOption, ChooseBest, FreeTextAnswer, FreeTextNumber, QuestionBlock};

/// Parse a lesson document that is not registered in a file database (file id 0).
pub fn parse(source: &str) -> Result<Document, ParseError> {
    Parser::new(source.to_string(), 0).parse()
}
