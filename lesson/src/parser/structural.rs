use crate::block::{Block, BlockKind};
use crate::parser::error::{ParseError, ParseErrorKind};
use crate::parser::inline;
use crate::parser::marker::{self, Marker};
use crate::question::{ChoiceOption, ChooseBest, FreeTextAnswer, FreeTextNumber, QuestionBlock};

const MARKER_PATTERN: &str = r#"{: .<class> #<id> key="value" ... }"#;
const CHOOSE_BEST_PATTERN: &str =
    r#"{: .choose_best #<id> title="<string>" points="<int>" answer="<int>" }"#;
const FREE_TEXT_PATTERN: &str =
    r#"{: .free_text_number #<id> title="<string>" points="<int>" answer="<string|any>" }"#;
const OPTION_PATTERN: &str = "one or more `- <option>` list items directly before the marker";
const FENCE_PATTERN: &str = "a closing fence of the same character, at least as long as the opening one";

/// Lines indented at least this far under an option are its feedback.
const FEEDBACK_INDENT: usize = 2;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse lesson source text into blocks, in a single pass over its lines.
pub fn parse_blocks(source: &str, file_id: usize) -> Result<Vec<Block>, ParseError> {
    let mut state = ParseState::new(file_id);
    for line in source_lines(source) {
        state.process_line(line)?;
    }
    state.finalize()
}

// ---------------------------------------------------------------------------
// Lines
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct LineRef {
    /// 1-based line number.
    number: usize,
    /// Byte offset of the first character.
    start: usize,
    /// Byte offset just past the last character, line terminator excluded.
    end: usize,
}

#[derive(Debug, Clone, Copy)]
struct Line<'a> {
    at: LineRef,
    text: &'a str,
}

fn source_lines(source: &str) -> impl Iterator<Item = Line<'_>> {
    let (body, mut start) = match source.strip_prefix('\u{feff}') {
        Some(rest) => (rest, '\u{feff}'.len_utf8()),
        None => (source, 0),
    };
    body.split_inclusive('\n').enumerate().map(move |(i, raw)| {
        let text = raw.strip_suffix('\n').unwrap_or(raw);
        let text = text.strip_suffix('\r').unwrap_or(text);
        let line = Line {
            at: LineRef {
                number: i + 1,
                start,
                end: start + text.len(),
            },
            text,
        };
        start += raw.len();
        line
    })
}

// ---------------------------------------------------------------------------
// Parse state
// ---------------------------------------------------------------------------

enum State<'a> {
    Default,
    InCodeFence(OpenFence),
    CollectingOptions(PendingOptions<'a>),
}

struct OpenFence {
    fence_char: char,
    width: usize,
    language: Option<String>,
    opened: LineRef,
    content: String,
}

impl OpenFence {
    fn open(content: &str, opened: LineRef) -> Option<Self> {
        let fence_char = content.chars().next().filter(|&c| matches!(c, '`' | '~'))?;
        let width = content.chars().take_while(|&c| c == fence_char).count();
        if width < 3 {
            return None;
        }
        let info = content[width..].trim();
        if fence_char == '`' && info.contains('`') {
            return None;
        }
        Some(OpenFence {
            fence_char,
            width,
            language: info.split_whitespace().next().map(str::to_string),
            opened,
            content: String::new(),
        })
    }

    fn is_closed_by(&self, text: &str) -> bool {
        if indentation(text) >= 4 {
            return false;
        }
        let content = text.trim();
        let width = content.chars().take_while(|&c| c == self.fence_char).count();
        width >= self.width && width == content.len()
    }

    fn capture(&mut self, text: &str) {
        self.content.push_str(text);
        self.content.push('\n');
    }
}

/// Consecutive source lines that will become one block.
struct PendingText<'a> {
    first: LineRef,
    last: LineRef,
    lines: Vec<&'a str>,
}

impl<'a> PendingText<'a> {
    fn new(line: &Line<'a>) -> Self {
        PendingText {
            first: line.at,
            last: line.at,
            lines: vec![line.text.trim_end()],
        }
    }

    fn push(&mut self, line: &Line<'a>) {
        self.last = line.at;
        self.lines.push(line.text.trim_end());
    }

    fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// List items seen since the last block boundary, waiting for a marker.
struct PendingOptions<'a> {
    raw: PendingText<'a>,
    options: Vec<ChoiceOption>,
}

impl<'a> PendingOptions<'a> {
    fn new(line: &Line<'a>, item: &str) -> Self {
        PendingOptions {
            raw: PendingText::new(line),
            options: vec![ChoiceOption {
                text: item.to_string(),
                feedback: Vec::new(),
            }],
        }
    }

    fn push_option(&mut self, line: &Line<'a>, item: &str) {
        self.raw.push(line);
        self.options.push(ChoiceOption {
            text: item.to_string(),
            feedback: Vec::new(),
        });
    }

    fn push_feedback(&mut self, line: &Line<'a>, content: &str) {
        self.raw.push(line);
        let feedback = list_item(content).unwrap_or(content).trim_end();
        if let Some(option) = self.options.last_mut() {
            option.feedback.push(feedback.to_string());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum QuestionClass {
    ChooseBest,
    FreeTextNumber,
}

struct ParseState<'a> {
    file_id: usize,
    state: State<'a>,
    /// Prose lines accumulated in the `Default` state.
    paragraph: Option<PendingText<'a>>,
    blocks: Vec<Block>,
}

impl<'a> ParseState<'a> {
    fn new(file_id: usize) -> Self {
        ParseState {
            file_id,
            state: State::Default,
            paragraph: None,
            blocks: Vec::new(),
        }
    }

    fn process_line(&mut self, line: Line<'a>) -> Result<(), ParseError> {
        match std::mem::replace(&mut self.state, State::Default) {
            State::Default => self.default_line(line),
            State::InCodeFence(mut fence) => {
                if fence.is_closed_by(line.text) {
                    tracing::trace!(line = line.at.number, "InCodeFence -> Default");
                    let language = fence.language;
                    let content = fence.content;
                    self.push(BlockKind::CodeSample { language, content }, fence.opened, line.at);
                } else {
                    fence.capture(line.text);
                    self.state = State::InCodeFence(fence);
                }
                Ok(())
            }
            State::CollectingOptions(options) => self.collect_option_line(options, line),
        }
    }

    fn default_line(&mut self, line: Line<'a>) -> Result<(), ParseError> {
        let content = line.text.trim_start();
        if content.is_empty() {
            self.flush_paragraph();
            return Ok(());
        }

        if indentation(line.text) < 4 {
            if let Some(fence) = OpenFence::open(content, line.at) {
                self.flush_paragraph();
                tracing::trace!(line = line.at.number, "Default -> InCodeFence");
                self.state = State::InCodeFence(fence);
                return Ok(());
            }

            if let Some((level, text)) = atx_heading(content) {
                self.flush_paragraph();
                let text = text.to_string();
                self.push(BlockKind::Heading { level, text }, line.at, line.at);
                return Ok(());
            }

            if marker::is_marker_line(content) {
                return self.finish_marker(&line, None);
            }

            if is_thematic_break(content) {
                self.flush_paragraph();
                let text = content.trim_end().to_string();
                self.push(BlockKind::Paragraph { text }, line.at, line.at);
                return Ok(());
            }

            if let Some(item) = list_item(content) {
                self.flush_paragraph();
                tracing::trace!(line = line.at.number, "Default -> CollectingOptions");
                self.state = State::CollectingOptions(PendingOptions::new(&line, item));
                return Ok(());
            }
        }

        match self.paragraph.as_mut() {
            Some(paragraph) => paragraph.push(&line),
            None => {
                if let Some(image) = inline::standalone_image(content) {
                    let inline::StandaloneImage { alt, dest, title } = image;
                    self.push(BlockKind::Image { alt, dest, title }, line.at, line.at);
                } else {
                    self.paragraph = Some(PendingText::new(&line));
                }
            }
        }
        Ok(())
    }

    fn collect_option_line(
        &mut self,
        mut options: PendingOptions<'a>,
        line: Line<'a>,
    ) -> Result<(), ParseError> {
        let content = line.text.trim_start();

        // Blank lines may separate items, feedback and the marker.
        if content.is_empty() {
            self.state = State::CollectingOptions(options);
            return Ok(());
        }

        let indent = indentation(line.text);
        if indent < 4 && marker::is_marker_line(content) {
            return self.finish_marker(&line, Some(options));
        }

        if indent >= FEEDBACK_INDENT {
            options.push_feedback(&line, content);
            self.state = State::CollectingOptions(options);
            return Ok(());
        }

        if !is_thematic_break(content) {
            if let Some(item) = list_item(content) {
                options.push_option(&line, item);
                self.state = State::CollectingOptions(options);
                return Ok(());
            }
        }

        tracing::trace!(line = line.at.number, "CollectingOptions -> Default");
        self.flush_options(options);
        self.default_line(line)
    }

    /// Handle a `{: ... }` line, binding `options` when it closes a `choose_best` question.
    fn finish_marker(
        &mut self,
        line: &Line<'a>,
        options: Option<PendingOptions<'a>>,
    ) -> Result<(), ParseError> {
        let leading = line.text.len() - line.text.trim_start().len();
        let content = line.text.trim();
        let content_start = line.at.start + leading;

        let marker = marker::parse_marker(content).map_err(|err| {
            let offset = err.offset.min(content.len());
            let width = content[offset..].chars().next().map_or(0, char::len_utf8);
            let at = content_start + offset;
            ParseError::new(
                ParseErrorKind::MalformedBlockMarker,
                err.message,
                line.at.number,
                at..at + width,
                self.file_id,
            )
            .expecting(MARKER_PATTERN)
        })?;

        let Some(class) = self.question_class(&marker, line)? else {
            tracing::debug!(
                line = line.at.number,
                classes = ?marker.classes,
                "keeping attribute list without a question class as prose"
            );
            self.close_with_attribute_list(line, options);
            return Ok(());
        };

        self.flush_paragraph();

        match class {
            QuestionClass::ChooseBest => {
                let Some(PendingOptions { raw, options }) = options else {
                    return Err(self
                        .marker_error(
                            ParseErrorKind::MissingMetadata,
                            "`choose_best` question has no options before its marker",
                            line,
                        )
                        .expecting(OPTION_PATTERN));
                };
                let (id, title, points) = self.common_metadata(&marker, line, CHOOSE_BEST_PATTERN)?;
                let answer = self.required(&marker, "answer", line, CHOOSE_BEST_PATTERN)?;
                let answer = self.integer(answer, "answer", line, CHOOSE_BEST_PATTERN)?;
                let question = QuestionBlock::ChooseBest(ChooseBest {
                    id,
                    title,
                    points,
                    options,
                    answer,
                });
                self.push(BlockKind::Question(question), raw.first, line.at);
            }
            QuestionClass::FreeTextNumber => {
                if let Some(options) = options {
                    self.flush_options(options);
                }
                let (id, title, points) = self.common_metadata(&marker, line, FREE_TEXT_PATTERN)?;
                let answer = self.required(&marker, "answer", line, FREE_TEXT_PATTERN)?;
                let question = QuestionBlock::FreeTextNumber(FreeTextNumber {
                    id,
                    title,
                    points,
                    answer: FreeTextAnswer::from_attribute(answer.trim()),
                });
                self.push(BlockKind::Question(question), line.at, line.at);
            }
        }
        Ok(())
    }

    fn question_class(
        &self,
        marker: &Marker,
        line: &Line<'a>,
    ) -> Result<Option<QuestionClass>, ParseError> {
        match (
            marker.has_class("choose_best"),
            marker.has_class("free_text_number"),
        ) {
            (true, true) => Err(self
                .marker_error(
                    ParseErrorKind::MalformedBlockMarker,
                    "a marker cannot be both `.choose_best` and `.free_text_number`",
                    line,
                )
                .expecting(MARKER_PATTERN)),
            (true, false) => Ok(Some(QuestionClass::ChooseBest)),
            (false, true) => Ok(Some(QuestionClass::FreeTextNumber)),
            (false, false) => Ok(None),
        }
    }

    fn common_metadata(
        &self,
        marker: &Marker,
        line: &Line<'a>,
        pattern: &'static str,
    ) -> Result<(String, String, i64), ParseError> {
        let Some(id) = marker.id.clone() else {
            return Err(self
                .marker_error(ParseErrorKind::MissingMetadata, "question marker has no `#id`", line)
                .expecting(pattern));
        };
        let title = self.required(marker, "title", line, pattern)?.to_string();
        let points = self.required(marker, "points", line, pattern)?;
        let points = self.integer(points, "points", line, pattern)?;
        Ok((id, title, points))
    }

    fn required<'m>(
        &self,
        marker: &'m Marker,
        key: &str,
        line: &Line<'a>,
        pattern: &'static str,
    ) -> Result<&'m str, ParseError> {
        marker.attribute(key).ok_or_else(|| {
            self.marker_error(
                ParseErrorKind::MissingMetadata,
                format!("question marker has no `{}` attribute", key),
                line,
            )
            .expecting(pattern)
        })
    }

    fn integer(
        &self,
        value: &str,
        key: &str,
        line: &Line<'a>,
        pattern: &'static str,
    ) -> Result<i64, ParseError> {
        value.trim().parse::<i64>().map_err(|_| {
            self.marker_error(
                ParseErrorKind::MalformedBlockMarker,
                format!("`{}` must be an integer, found `{}`", key, value),
                line,
            )
            .expecting(pattern)
        })
    }

    /// An error labelling the whole marker line.
    fn marker_error(
        &self,
        kind: ParseErrorKind,
        message: impl Into<String>,
        line: &Line<'a>,
    ) -> ParseError {
        let leading = line.text.len() - line.text.trim_start().len();
        let start = line.at.start + leading;
        let end = line.at.start + line.text.trim_end().len();
        ParseError::new(kind, message, line.at.number, start..end, self.file_id)
    }

    fn flush_paragraph(&mut self) {
        if let Some(paragraph) = self.paragraph.take() {
            let text = paragraph.text();
            self.push(BlockKind::Paragraph { text }, paragraph.first, paragraph.last);
        }
    }

    /// A styling attribute list stays in the text it closes: the pending list,
    /// else the pending paragraph, else a paragraph of its own.
    fn close_with_attribute_list(
        &mut self,
        line: &Line<'a>,
        options: Option<PendingOptions<'a>>,
    ) {
        if let Some(mut options) = options {
            options.raw.push(line);
            self.flush_options(options);
            return;
        }
        match self.paragraph.as_mut() {
            Some(paragraph) => paragraph.push(line),
            None => self.paragraph = Some(PendingText::new(line)),
        }
        self.flush_paragraph();
    }

    /// A list that no `choose_best` marker claimed is ordinary prose.
    fn flush_options(&mut self, options: PendingOptions<'a>) {
        let text = options.raw.text();
        self.push(BlockKind::Paragraph { text }, options.raw.first, options.raw.last);
    }

    fn push(&mut self, kind: BlockKind, first: LineRef, last: LineRef) {
        tracing::debug!(
            kind = kind.name(),
            first_line = first.number,
            last_line = last.number,
            "finalized block"
        );
        self.blocks.push(Block {
            kind,
            first_line: first.number,
            last_line: last.number,
            span: first.start..last.end,
        });
    }

    fn finalize(mut self) -> Result<Vec<Block>, ParseError> {
        match std::mem::replace(&mut self.state, State::Default) {
            State::InCodeFence(fence) => {
                return Err(ParseError::new(
                    ParseErrorKind::UnterminatedCodeFence,
                    "code fence opened here is never closed",
                    fence.opened.number,
                    fence.opened.start..fence.opened.end,
                    self.file_id,
                )
                .expecting(FENCE_PATTERN));
            }
            State::CollectingOptions(options) => self.flush_options(options),
            State::Default => {}
        }
        self.flush_paragraph();
        Ok(self.blocks)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Leading whitespace width in columns; tabs advance to the next multiple of 4.
fn indentation(text: &str) -> usize {
    let mut columns = 0;
    for c in text.chars() {
        match c {
            ' ' => columns += 1,
            '\t' => columns += 4 - columns % 4,
            _ => break,
        }
    }
    columns
}

/// `#`..`######` followed by whitespace or end of line; optional closing `#` run stripped.
fn atx_heading(content: &str) -> Option<(u8, &str)> {
    let level = content.chars().take_while(|&c| c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = &content[level..];
    if !rest.is_empty() && !rest.starts_with([' ', '\t']) {
        return None;
    }
    let text = rest.trim();
    let without_closing = text.trim_end_matches('#');
    let text = if without_closing.is_empty() {
        without_closing
    } else if without_closing.ends_with([' ', '\t']) {
        without_closing.trim_end()
    } else {
        text
    };
    // The level fits: it is at most 6.
    Some((level as u8, text))
}

/// Text of a bullet (`-`, `*`, `+`) or ordered (`1.`, `1)`) list item.
fn list_item(content: &str) -> Option<&str> {
    let rest = match content.strip_prefix(['-', '*', '+']) {
        Some(rest) => rest,
        None => {
            let digits = content.chars().take_while(char::is_ascii_digit).count();
            if digits == 0 || digits > 9 {
                return None;
            }
            content[digits..].strip_prefix(['.', ')'])?
        }
    };
    if rest.is_empty() {
        Some(rest)
    } else if rest.starts_with([' ', '\t']) {
        Some(rest.trim())
    } else {
        None
    }
}

/// `---`, `***`, `___` and spaced variants.
fn is_thematic_break(content: &str) -> bool {
    let mut marks = content.chars().filter(|c| !c.is_whitespace());
    let Some(first) = marks.next() else {
        return false;
    };
    matches!(first, '-' | '*' | '_') && marks.clone().all(|c| c == first) && marks.count() >= 2
}
