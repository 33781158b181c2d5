pub mod checks;
pub mod issue;

pub use issue::{IssueKind, Occurrence, ValidationIssue};

use lesson::Document;

/// Switches for the optional checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatorOptions {
    /// Report free-text literal answers that do not parse as numbers.
    pub numeric_literals: bool,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        ValidatorOptions {
            numeric_literals: true,
        }
    }
}

/// Run every check with default options.
pub fn validate(document: &Document) -> Vec<ValidationIssue> {
    validate_with(document, &ValidatorOptions::default())
}

/// Run every check and collect all issues. Output order is fixed: by check,
/// then by document position.
pub fn validate_with(document: &Document, options: &ValidatorOptions) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for (name, check) in checks::CHECKS {
        let before = issues.len();
        check(document, options, &mut issues);
        tracing::debug!(check = *name, issues = issues.len() - before, "ran check");
    }
    issues
}
