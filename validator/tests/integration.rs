use lesson::Document;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use validator::{IssueKind, ValidationIssue, ValidatorOptions};

fn parse(source: &str) -> Document {
    lesson::parse(source).expect("parse failed")
}

fn check(source: &str) -> Vec<ValidationIssue> {
    validator::validate(&parse(source))
}

fn kinds(issues: &[ValidationIssue]) -> Vec<(IssueKind, &str)> {
    issues
        .iter()
        .map(|i| (i.kind, i.block_id.as_str()))
        .collect()
}

/// A `choose_best` question with `options` items and the given answer.
fn choose_best(id: &str, options: usize, points: i64, answer: i64) -> String {
    let mut source = String::new();
    for i in 1..=options {
        source.push_str(&format!("- option {}\n", i));
    }
    source.push_str(&format!(
        "{{: .choose_best #{} title=\"T\" points=\"{}\" answer=\"{}\" }}\n\n",
        id, points, answer
    ));
    source
}

#[test]
fn valid_lesson_has_no_issues() {
    let source = [
        choose_best("a", 2, 1, 2),
        "{: .free_text_number #b title=\"B\" points=\"3\" answer=\"4\" }\n".to_string(),
    ]
    .concat();
    assert!(check(&source).is_empty());
}

#[test]
fn duplicate_id_is_reported_once_with_every_occurrence() {
    let source = [
        choose_best("ruby_file_names", 2, 1, 1),
        "Some prose.\n\n".to_string(),
        choose_best("ruby_file_names", 3, 1, 2),
    ]
    .concat();
    let issues = check(&source);
    assert_eq!(kinds(&issues), vec![(IssueKind::DuplicateId, "ruby_file_names")]);

    let lines: Vec<_> = issues[0].occurrences.iter().map(|o| o.first_line).collect();
    assert_eq!(lines, vec![1, 7]);
    assert_eq!(issues[0].line(), Some(1));
}

#[test]
fn three_uses_of_one_id_are_still_one_issue() {
    let source = [
        choose_best("x", 1, 1, 1),
        choose_best("x", 1, 1, 1),
        "{: .free_text_number #x title=\"X\" points=\"1\" answer=\"any\" }\n".to_string(),
    ]
    .concat();
    let issues = check(&source);
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].occurrences.len(), 3);
}

#[test]
fn answer_past_the_last_option() {
    let issues = check(&choose_best("y", 3, 1, 5));
    assert_eq!(kinds(&issues), vec![(IssueKind::AnswerOutOfRange, "y")]);
    assert!(issues[0].message.contains("3 options"));
}

#[test]
fn zero_and_negative_points() {
    let source = [
        choose_best("zero", 2, 0, 1),
        choose_best("negative", 2, -2, 1),
    ]
    .concat();
    assert_eq!(
        kinds(&check(&source)),
        vec![
            (IssueKind::NonPositivePoints, "zero"),
            (IssueKind::NonPositivePoints, "negative"),
        ]
    );
}

#[test]
fn any_sentinel_is_valid_with_positive_points() {
    let issues = check("{: .free_text_number #n title=\"N\" points=\"5\" answer=\"any\" }\n");
    assert!(issues.is_empty());

    let issues = check("{: .free_text_number #n title=\"N\" points=\"0\" answer=\"any\" }\n");
    assert_eq!(kinds(&issues), vec![(IssueKind::NonPositivePoints, "n")]);
}

#[test]
fn non_numeric_literal_answers_can_be_allowed() {
    let document = parse("{: .free_text_number #n title=\"N\" points=\"1\" answer=\"four\" }\n");
    assert_eq!(
        kinds(&validator::validate(&document)),
        vec![(IssueKind::NonNumericAnswer, "n")]
    );

    let options = ValidatorOptions {
        numeric_literals: false,
    };
    assert!(validator::validate_with(&document, &options).is_empty());
}

#[test]
fn nan_and_infinite_answers_are_not_numbers() {
    for answer in ["NaN", "inf", "-infinity"] {
        let issues = check(&format!(
            "{{: .free_text_number #n title=\"N\" points=\"1\" answer=\"{}\" }}\n",
            answer
        ));
        assert_eq!(kinds(&issues), vec![(IssueKind::NonNumericAnswer, "n")], "{}", answer);
    }
    assert!(check("{: .free_text_number #n title=\"N\" points=\"1\" answer=\"-2.5e3\" }\n").is_empty());
}

#[test]
fn every_problem_is_reported_in_one_pass() {
    let source = [
        choose_best("a", 2, 0, 3),
        choose_best("a", 2, 1, 1),
        "{: .free_text_number #b title=\"B\" points=\"-1\" answer=\"x\" }\n".to_string(),
    ]
    .concat();
    assert_eq!(
        kinds(&check(&source)),
        vec![
            (IssueKind::DuplicateId, "a"),
            (IssueKind::AnswerOutOfRange, "a"),
            (IssueKind::NonPositivePoints, "a"),
            (IssueKind::NonPositivePoints, "b"),
            (IssueKind::NonNumericAnswer, "b"),
        ]
    );
}

#[test]
fn validation_is_deterministic() {
    let source = [
        choose_best("a", 1, 0, 9),
        choose_best("a", 1, 0, 9),
        choose_best("b", 1, 1, 0),
        choose_best("b", 1, 1, 1),
    ]
    .concat();
    let first = check(&source);
    for _ in 0..10 {
        assert_eq!(check(&source), first);
    }
}

#[test]
fn diagnostics_label_every_occurrence() {
    let source = [choose_best("d", 1, 1, 1), choose_best("d", 1, 1, 1)].concat();
    let issues = check(&source);
    let diagnostic = issues[0].to_diagnostic();
    assert_eq!(diagnostic.labels.len(), 2);
    assert_eq!(diagnostic.message, "duplicate question id in `d`");
}

proptest! {
    #[test]
    fn answers_above_the_option_count_are_rejected(options in 1usize..8, extra in 1i64..100) {
        let answer = options as i64 + extra;
        let issues = check(&choose_best("q", options, 1, answer));
        prop_assert_eq!(kinds(&issues), vec![(IssueKind::AnswerOutOfRange, "q")]);
    }

    #[test]
    fn answers_below_one_are_rejected(options in 1usize..8, answer in -100i64..=0) {
        let issues = check(&choose_best("q", options, 1, answer));
        prop_assert_eq!(kinds(&issues), vec![(IssueKind::AnswerOutOfRange, "q")]);
    }

    #[test]
    fn answers_in_range_pass(options in 1usize..8, pick in 0usize..8) {
        let answer = (pick % options) as i64 + 1;
        prop_assert!(check(&choose_best("q", options, 1, answer)).is_empty());
    }
}
