use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use lesson::ParseErrorKind;
use validator::{IssueKind, ValidationIssue, ValidatorOptions};

#[derive(Debug, Deserialize)]
pub struct ExpectedIssue {
    pub kind: IssueKind,

    /// If set, the issue must reference this question id.
    #[serde(default)]
    pub id: Option<String>,

    /// If set, the issue's first occurrence must start on this 1-based line
    /// (counted from the first line after the frontmatter).
    #[serde(default)]
    pub line: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestConfig {
    /// Human-readable test description.
    #[serde(default)]
    pub description: Option<String>,

    /// If set, parsing must fail with this kind of error.
    #[serde(default)]
    pub expect_parse_error: Option<ParseErrorKind>,

    /// Expected number of question blocks.
    #[serde(default)]
    pub expect_questions: Option<usize>,

    /// Expected sum of question points.
    #[serde(default)]
    pub expect_points: Option<i64>,

    /// Accept non-numeric free-text answers.
    #[serde(default)]
    pub allow_non_numeric: bool,

    /// Expected validation issues. If present (even empty), issue count and content
    /// are checked in report order.
    #[serde(default)]
    pub expect_issues: Option<Vec<ExpectedIssue>>,
}

/// A `.test.md` fixture: expectations in a `---` TOML block, then the lesson.
struct Fixture<'a> {
    config: TestConfig,
    lesson: &'a str,
}

const FENCE: &str = "---";

/// Split a fixture at its frontmatter fences. The lesson keeps its own line
/// numbers, counted from the line after the closing fence.
fn split_fixture(content: &str) -> Result<Fixture<'_>, String> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut lines = content.split_inclusive('\n');

    let mut consumed = match lines.next() {
        Some(first) if first.trim_end() == FENCE => first.len(),
        _ => return Err("lesson fixture must open with a `---` line".into()),
    };

    let mut frontmatter = String::new();
    loop {
        let Some(line) = lines.next() else {
            return Err("frontmatter is never closed by a `---` line".into());
        };
        consumed += line.len();
        if line.trim_end() == FENCE {
            break;
        }
        frontmatter.push_str(line);
    }

    let config: TestConfig =
        toml::from_str(&frontmatter).map_err(|e| format!("invalid expectations: {}", e))?;
    Ok(Fixture {
        config,
        lesson: &content[consumed..],
    })
}

pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

fn run_single_test(path: &Path) -> TestResult {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            return TestResult {
                path: path.to_path_buf(),
                description: None,
                outcome: TestOutcome::Fail(format!("cannot read file: {}", e)),
            };
        }
    };

    let Fixture { config, lesson } = match split_fixture(&content) {
        Ok(fixture) => fixture,
        Err(e) => {
            return TestResult {
                path: path.to_path_buf(),
                description: None,
                outcome: TestOutcome::Fail(format!("frontmatter error: {}", e)),
            };
        }
    };

    tracing::debug!(path = %path.display(), "running fixture");
    let outcome = match evaluate(&config, lesson) {
        None => TestOutcome::Pass,
        Some(reason) => TestOutcome::Fail(reason),
    };
    TestResult {
        path: path.to_path_buf(),
        description: config.description,
        outcome,
    }
}

/// Check one fixture's expectations. Returns `Some(reason)` on the first mismatch.
fn evaluate(config: &TestConfig, source: &str) -> Option<String> {
    let parse_result = lesson::parse(source);

    if let Some(expected_kind) = config.expect_parse_error {
        return match parse_result {
            Err(err) if err.kind == expected_kind => None,
            Err(err) => Some(format!(
                "expected {} parse error, got: {}",
                expected_kind, err
            )),
            Ok(_) => Some(format!(
                "expected {} parse error, but parsing succeeded",
                expected_kind
            )),
        };
    }

    let document = match parse_result {
        Ok(document) => document,
        Err(err) => return Some(format!("unexpected parse error: {}", err)),
    };

    if let Some(expected) = config.expect_questions {
        let actual = document.question_count();
        if actual != expected {
            return Some(format!("expected {} question(s), got {}", expected, actual));
        }
    }

    if let Some(expected) = config.expect_points {
        let actual = document.total_points();
        if actual != expected {
            return Some(format!("expected {} point(s), got {}", expected, actual));
        }
    }

    let options = ValidatorOptions {
        numeric_literals: !config.allow_non_numeric,
    };
    let issues = validator::validate_with(&document, &options);
    match &config.expect_issues {
        Some(expected) => check_issues(&issues, expected),
        None => None,
    }
}

/// Check that actual issues match expectations. Returns `Some(reason)` on mismatch.
fn check_issues(actual: &[ValidationIssue], expected: &[ExpectedIssue]) -> Option<String> {
    if actual.len() != expected.len() {
        let actual_msgs: Vec<String> = actual.iter().map(|i| format!("  - {}", i)).collect();
        return Some(format!(
            "expected {} issue(s), got {}\n  actual issues:\n{}",
            expected.len(),
            actual.len(),
            if actual_msgs.is_empty() {
                "    (none)".to_string()
            } else {
                actual_msgs.join("\n")
            }
        ));
    }

    for (i, (actual, expected)) in actual.iter().zip(expected.iter()).enumerate() {
        if actual.kind != expected.kind {
            return Some(format!(
                "issue[{}]: expected {}, got: {}",
                i, expected.kind, actual
            ));
        }

        if let Some(id) = &expected.id {
            if &actual.block_id != id {
                return Some(format!(
                    "issue[{}]: expected id `{}`, got `{}`",
                    i, id, actual.block_id
                ));
            }
        }

        if let Some(expected_line) = expected.line {
            match actual.line() {
                Some(line) if line == expected_line => {}
                Some(line) => {
                    return Some(format!(
                        "issue[{}]: expected on line {}, but it is on line {}",
                        i, expected_line, line
                    ));
                }
                None => {
                    return Some(format!(
                        "issue[{}]: expected on line {}, but the issue has no location",
                        i, expected_line
                    ));
                }
            }
        }
    }

    None
}

/// Lesson fixtures under `root`, keyed by the sub-directory they sit in.
/// Fixtures directly in `root` belong to the "" category.
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            tracing::warn!(dir = %dir.display(), "cannot read fixture directory");
            continue;
        };
        for path in entries.flatten().map(|entry| entry.path()) {
            if path.is_dir() {
                pending.push(path);
            } else if is_fixture(&path) {
                categories.entry(category_of(&dir, root)).or_default().push(path);
            }
        }
    }
    for lessons in categories.values_mut() {
        lessons.sort();
    }
    categories
}

fn is_fixture(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(".test.md"))
}

/// `parsing/fences` for `root/parsing/fences`, always with `/` separators.
fn category_of(dir: &Path, root: &Path) -> String {
    dir.strip_prefix(root)
        .map(|rel| {
            rel.components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_default()
}

fn category_label(category: &str) -> &str {
    if category.is_empty() {
        "(root)"
    } else {
        category
    }
}

/// Print the fixture categories found under `path` with their lesson counts.
pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("{} is a single lesson fixture", path.display());
        return;
    }

    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no lesson fixtures (.test.md) under {}", path.display());
        return;
    }

    eprintln!("fixture categories:");
    for (category, lessons) in &categories {
        eprintln!("  {} ({} lessons)", category_label(category), lessons.len());
    }
}

fn paint(text: &str, code: &str, no_color: bool) -> String {
    if no_color {
        text.to_string()
    } else {
        format!("\x1b[{}m{}\x1b[0m", code, text)
    }
}

fn label_for<'a>(result: &'a TestResult) -> &'a str {
    result.description.as_deref().unwrap_or_else(|| {
        result
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("?")
    })
}

fn report_failures(failures: &[TestResult]) {
    eprintln!();
    eprintln!("failures:");
    for f in failures {
        eprintln!();
        eprintln!("  --- {} ---", f.path.display());
        if let TestOutcome::Fail(reason) = &f.outcome {
            for line in reason.lines() {
                eprintln!("  {}", line);
            }
        }
    }
}

/// Run all `.test.md` files under `path` (or a single file).
/// If `categories` is non-empty, only run tests in those categories.
/// Returns exit code: 0 = all pass, 1 = any failure.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let run_categories: BTreeMap<String, Vec<PathBuf>> = if path.is_file() {
        BTreeMap::from([(String::new(), vec![path.to_path_buf()])])
    } else {
        let all_categories = discover_categorized(path);
        if all_categories.is_empty() {
            eprintln!("no lesson fixtures (.test.md) under {}", path.display());
            return 1;
        }
        select_categories(all_categories, categories)
    };

    if run_categories.is_empty() {
        eprintln!("no matching categories found");
        return 1;
    }

    let mut passed = 0usize;
    let mut failures: Vec<TestResult> = Vec::new();

    for (cat, files) in &run_categories {
        if !path.is_file() {
            eprintln!();
            eprintln!("{}", paint(category_label(cat), "1", no_color));
        }

        for file in files {
            let result = run_single_test(file);
            match &result.outcome {
                TestOutcome::Pass => {
                    passed += 1;
                    eprintln!("  {}  {}", paint("PASS", "32", no_color), label_for(&result));
                }
                TestOutcome::Fail(_) => {
                    eprintln!("  {}  {}", paint("FAIL", "31", no_color), label_for(&result));
                    failures.push(result);
                }
            }
        }
    }

    if !failures.is_empty() {
        report_failures(&failures);
    }

    eprintln!();
    let failed = failures.len();
    if failed == 0 {
        eprintln!("test result: {}. {} passed, 0 failed", paint("ok", "32", no_color), passed);
        0
    } else {
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            paint("FAILED", "31", no_color),
            passed,
            failed,
            passed + failed
        );
        1
    }
}

fn select_categories(
    all_categories: BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> BTreeMap<String, Vec<PathBuf>> {
    if requested.is_empty() {
        return all_categories;
    }

    let mut filtered = BTreeMap::new();
    for req in requested {
        let req = req.trim_matches('/');
        let mut found = false;
        for (cat, files) in &all_categories {
            if cat == req || cat.starts_with(&format!("{}/", req)) {
                filtered.insert(cat.clone(), files.clone());
                found = true;
            }
        }
        if !found {
            eprintln!(
                "warning: category '{}' not found (available: {})",
                req,
                all_categories
                    .keys()
                    .map(|k| category_label(k))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixtures() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/lessons")
    }

    #[test]
    fn splits_frontmatter_from_lesson() {
        let Fixture { config, lesson } = split_fixture(
            "---\ndescription = \"d\"\nexpect_questions = 1\n---\n- a\n{: .choose_best #a title=\"A\" points=\"1\" answer=\"1\" }\n",
        )
        .unwrap();
        assert_eq!(config.description.as_deref(), Some("d"));
        assert_eq!(config.expect_questions, Some(1));
        assert!(lesson.starts_with("- a\n"));
    }

    #[test]
    fn frontmatter_kinds_deserialize_from_snake_case() {
        let config = split_fixture(
            "---\nexpect_parse_error = \"missing_metadata\"\nexpect_issues = [{ kind = \"duplicate_id\", id = \"x\", line = 3 }]\n---\n",
        )
        .unwrap()
        .config;
        assert_eq!(config.expect_parse_error, Some(ParseErrorKind::MissingMetadata));
        let issues = config.expect_issues.unwrap();
        assert_eq!(issues[0].kind, IssueKind::DuplicateId);
        assert_eq!(issues[0].line, Some(3));
    }

    #[test]
    fn rejects_missing_or_unknown_frontmatter() {
        assert!(split_fixture("- a\n").is_err());
        assert!(split_fixture("---\nexpect_questions = 1\n").is_err());
        assert!(split_fixture("---\nexpect_question = 1\n---\n").is_err());
    }

    #[test]
    fn bundled_fixtures_pass() {
        assert_eq!(run_tests(&fixtures(), true, &[]), 0);
    }

    #[test]
    fn categories_filter_fixtures() {
        let all = discover_categorized(&fixtures());
        assert!(all.contains_key("parsing"));
        assert!(all.contains_key("validation"));

        let only = select_categories(all, &["validation".to_string()]);
        assert_eq!(only.keys().collect::<Vec<_>>(), vec!["validation"]);
    }

    #[test]
    fn failing_expectations_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wrong.test.md");
        std::fs::write(
            &path,
            "---\nexpect_issues = []\n---\n- a\n{: .choose_best #a title=\"A\" points=\"0\" answer=\"1\" }\n",
        )
        .unwrap();

        let result = run_single_test(&path);
        let TestOutcome::Fail(reason) = result.outcome else {
            panic!("expected the fixture to fail");
        };
        assert!(reason.contains("expected 0 issue(s), got 1"), "{}", reason);
        assert_eq!(run_tests(&path, true, &[]), 1);
    }
}
