//! Lexer for kramdown-style attribute list lines: `{: .class #id key="value" }`.

use std::iter::Peekable;
use std::str::CharIndices;

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Marker {
    pub classes: Vec<String>,
    pub id: Option<String>,
    pub attributes: Vec<(String, String)>,
}

impl Marker {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }
}

/// A lexing failure; `offset` is a byte offset into the marker text.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MarkerError {
    pub message: String,
    pub offset: usize,
}

impl MarkerError {
    fn new(message: impl Into<String>, offset: usize) -> Self {
        MarkerError {
            message: message.into(),
            offset,
        }
    }
}

/// Whether a (leading-whitespace-trimmed) line is meant as an attribute list.
pub(crate) fn is_marker_line(text: &str) -> bool {
    text.starts_with("{:")
}

pub(crate) fn parse_marker(text: &str) -> Result<Marker, MarkerError> {
    let text = text.trim_end();
    let Some(body) = text.strip_prefix("{:") else {
        return Err(MarkerError::new("expected `{:`", 0));
    };
    let Some(body) = body.strip_suffix('}') else {
        return Err(MarkerError::new("missing closing `}`", text.len()));
    };

    let mut lexer = Lexer {
        chars: body.char_indices().peekable(),
        base: 2,
        end: body.len(),
    };
    let mut marker = Marker::default();

    loop {
        lexer.skip_whitespace();
        let Some((offset, c)) = lexer.peek() else {
            break;
        };
        match c {
            '.' => {
                lexer.bump();
                let class = lexer.name();
                if class.is_empty() {
                    return Err(MarkerError::new("expected a class name after `.`", offset));
                }
                marker.classes.push(class);
            }
            '#' => {
                lexer.bump();
                let id = lexer.name();
                if id.is_empty() {
                    return Err(MarkerError::new("expected an id after `#`", offset));
                }
                if marker.id.is_some() {
                    return Err(MarkerError::new("a marker can carry only one `#id`", offset));
                }
                marker.id = Some(id);
            }
            c if is_name_char(c) => {
                let key = lexer.name();
                match lexer.peek() {
                    Some((_, '=')) => {
                        lexer.bump();
                    }
                    Some((at, found)) => {
                        return Err(MarkerError::new(
                            format!("expected `=` after `{}`, found `{}`", key, found),
                            at,
                        ));
                    }
                    None => {
                        return Err(MarkerError::new(
                            format!("expected `=` after `{}`", key),
                            lexer.end(),
                        ));
                    }
                }
                let value = lexer.value()?;
                if marker.attribute(&key).is_some() {
                    return Err(MarkerError::new(
                        format!("duplicate attribute `{}`", key),
                        offset,
                    ));
                }
                marker.attributes.push((key, value));
            }
            other => {
                return Err(MarkerError::new(
                    format!("unexpected `{}` in attribute list", other),
                    offset,
                ));
            }
        }
    }

    Ok(marker)
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | ':')
}

struct Lexer<'a> {
    chars: Peekable<CharIndices<'a>>,
    /// Offset of `body` within the full marker text.
    base: usize,
    end: usize,
}

impl Lexer<'_> {
    fn peek(&mut self) -> Option<(usize, char)> {
        self.chars.peek().map(|&(i, c)| (i + self.base, c))
    }

    fn bump(&mut self) -> Option<(usize, char)> {
        self.chars.next().map(|(i, c)| (i + self.base, c))
    }

    fn end(&self) -> usize {
        self.end + self.base
    }

    fn skip_whitespace(&mut self) {
        while self.chars.next_if(|&(_, c)| c.is_whitespace()).is_some() {}
    }

    fn name(&mut self) -> String {
        let mut name = String::new();
        while let Some((_, c)) = self.chars.next_if(|&(_, c)| is_name_char(c)) {
            name.push(c);
        }
        name
    }

    /// A quoted (`"..."` / `'...'`, backslash escapes) or bare value.
    fn value(&mut self) -> Result<String, MarkerError> {
        let mut value = String::new();
        match self.peek() {
            Some((start, quote @ ('"' | '\''))) => {
                self.bump();
                loop {
                    match self.bump() {
                        Some((_, '\\')) => match self.bump() {
                            Some((_, escaped)) => value.push(escaped),
                            None => break,
                        },
                        Some((_, c)) if c == quote => return Ok(value),
                        Some((_, c)) => value.push(c),
                        None => break,
                    }
                }
                Err(MarkerError::new("unterminated quoted value", start))
            }
            _ => {
                while let Some((_, c)) = self.chars.next_if(|&(_, c)| !c.is_whitespace()) {
                    value.push(c);
                }
                Ok(value)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexes_choose_best_marker() {
        let marker = parse_marker(
            r#"{: .choose_best #ruby_file_names title="File names" points="1" answer="3" }"#,
        )
        .unwrap();
        assert_eq!(marker.classes, vec!["choose_best"]);
        assert_eq!(marker.id.as_deref(), Some("ruby_file_names"));
        assert_eq!(marker.attribute("title"), Some("File names"));
        assert_eq!(marker.attribute("points"), Some("1"));
        assert_eq!(marker.attribute("answer"), Some("3"));
    }

    #[test]
    fn accepts_single_quotes_bare_values_and_escapes() {
        // `'It'` closes the quote, then `'s'` starts a token without a key.
        let marker = parse_marker("{:.free_text_number #n title='It''s' points=2 }");
        assert!(marker.is_err());

        let marker = parse_marker(r#"{: #n title='say "hi"' points=2 answer="a \"b\"" }"#).unwrap();
        assert_eq!(marker.attribute("title"), Some(r#"say "hi""#));
        assert_eq!(marker.attribute("points"), Some("2"));
        assert_eq!(marker.attribute("answer"), Some(r#"a "b""#));
    }

    #[test]
    fn reports_offsets_for_errors() {
        let err = parse_marker("{: .choose_best").unwrap_err();
        assert_eq!(err.message, "missing closing `}`");
        assert_eq!(err.offset, 15);

        let err = parse_marker(r#"{: .choose_best title="unterminated }"#).unwrap_err();
        assert_eq!(err.message, "unterminated quoted value");
        assert_eq!(err.offset, 22);

        let err = parse_marker("{: . }").unwrap_err();
        assert_eq!(err.offset, 3);
    }

    #[test]
    fn rejects_duplicates() {
        let err = parse_marker(r#"{: #a #b }"#).unwrap_err();
        assert!(err.message.contains("only one"));

        let err = parse_marker(r#"{: points="1" points="2" }"#).unwrap_err();
        assert_eq!(err.message, "duplicate attribute `points`");
    }

    #[test]
    fn styling_marker_has_no_attributes() {
        let marker = parse_marker("{: .note }").unwrap();
        assert!(marker.has_class("note"));
        assert!(marker.id.is_none());
        assert!(marker.attributes.is_empty());
    }
}
