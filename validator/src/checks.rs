use std::collections::HashMap;

use lesson::{Block, Document, QuestionBlock};

use crate::ValidatorOptions;
use crate::issue::{IssueKind, Occurrence, ValidationIssue};

/// One independent structural check. Checks only append; none can stop the pass.
pub type Check = fn(&Document, &ValidatorOptions, &mut Vec<ValidationIssue>);

/// All checks, in report order.
pub const CHECKS: &[(&str, Check)] = &[
    ("unique_ids", unique_ids),
    ("answer_in_range", answer_in_range),
    ("positive_points", positive_points),
    ("numeric_answers", numeric_answers),
];

fn questions(document: &Document) -> impl Iterator<Item = (&Block, &QuestionBlock)> {
    document
        .blocks
        .iter()
        .filter_map(|block| block.question().map(|question| (block, question)))
}

fn occurrence(block: &Block) -> Occurrence {
    Occurrence {
        first_line: block.first_line,
        span: block.span.clone(),
    }
}

/// One `DuplicateId` per repeated id, listing every block that uses it.
pub fn unique_ids(document: &Document, _: &ValidatorOptions, issues: &mut Vec<ValidationIssue>) {
    let mut seen: Vec<(&str, Vec<&Block>)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for (block, question) in questions(document) {
        let id = question.id();
        match index.get(id) {
            Some(&i) => seen[i].1.push(block),
            None => {
                index.insert(id, seen.len());
                seen.push((id, vec![block]));
            }
        }
    }

    for (id, blocks) in seen.into_iter().filter(|(_, blocks)| blocks.len() > 1) {
        let lines = blocks
            .iter()
            .map(|b| b.first_line.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        issues.push(ValidationIssue::new(
            IssueKind::DuplicateId,
            id,
            format!("id `{}` is used by {} questions (lines {})", id, blocks.len(), lines),
            blocks.into_iter().map(occurrence).collect(),
            document.source_id,
        ));
    }
}

pub fn answer_in_range(
    document: &Document,
    _: &ValidatorOptions,
    issues: &mut Vec<ValidationIssue>,
) {
    for (block, question) in questions(document) {
        let QuestionBlock::ChooseBest(choose) = question else {
            continue;
        };
        if !choose.answer_in_range() {
            issues.push(ValidationIssue::new(
                IssueKind::AnswerOutOfRange,
                &choose.id,
                format!(
                    "answer {} does not name one of the {} options",
                    choose.answer,
                    choose.options.len()
                ),
                vec![occurrence(block)],
                document.source_id,
            ));
        }
    }
}

pub fn positive_points(
    document: &Document,
    _: &ValidatorOptions,
    issues: &mut Vec<ValidationIssue>,
) {
    for (block, question) in questions(document) {
        if question.points() <= 0 {
            issues.push(ValidationIssue::new(
                IssueKind::NonPositivePoints,
                question.id(),
                format!("points must be greater than 0, found {}", question.points()),
                vec![occurrence(block)],
                document.source_id,
            ));
        }
    }
}

/// Literal free-text answers must read as numbers; the `any` sentinel always passes.
pub fn numeric_answers(
    document: &Document,
    options: &ValidatorOptions,
    issues: &mut Vec<ValidationIssue>,
) {
    if !options.numeric_literals {
        return;
    }
    for (block, question) in questions(document) {
        let QuestionBlock::FreeTextNumber(free_text) = question else {
            continue;
        };
        if free_text.answer.is_any() {
            continue;
        }
        let literal = free_text.answer.as_attribute();
        let finite = literal.trim().parse::<f64>().is_ok_and(f64::is_finite);
        if !finite {
            issues.push(ValidationIssue::new(
                IssueKind::NonNumericAnswer,
                &free_text.id,
                format!("answer `{}` is not a number (use `any` to accept every number)", literal),
                vec![occurrence(block)],
                document.source_id,
            ));
        }
    }
}
