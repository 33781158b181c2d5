mod logging;
mod test_runner;

use std::path::Path;
use std::process;

use clap::{Parser, Subcommand};
use codespan_reporting::diagnostic::Diagnostic;
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use serde::Serialize;

use lesson::{Document, QuestionBlock};
use validator::{ValidationIssue, ValidatorOptions};

const SUBCOMMANDS: &[&str] = &["check", "test", "help"];

#[derive(Parser)]
#[command(name = "lesson", version, about = "Lesson and quiz document checker")]
struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// More log output (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse and validate a lesson document
    Check(CheckArgs),

    /// Run .test.md fixture files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct CheckArgs {
    /// Lesson markdown file to check
    file: String,

    /// Print the parsed document and issues as JSON
    #[arg(long)]
    json: bool,

    /// Dump parsed AST
    #[arg(long)]
    ast: bool,

    /// List every question with its type, points and title
    #[arg(long)]
    list_questions: bool,

    /// Print the document re-rendered in canonical form
    #[arg(long)]
    normalize: bool,

    /// Accept free-text answers that are not numbers
    #[arg(long)]
    allow_non_numeric: bool,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.md file or directory containing them
    path: String,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

#[derive(Serialize)]
struct Report<'a> {
    file: &'a str,
    document: &'a Document,
    issues: &'a [ValidationIssue],
}

fn main() {
    // `lesson file.md` is shorthand for `lesson check file.md`.
    let mut args: Vec<String> = std::env::args().collect();
    if let Some(pos) = args
        .iter()
        .skip(1)
        .position(|a| !a.starts_with('-'))
        .map(|p| p + 1)
    {
        if !SUBCOMMANDS.contains(&args[pos].as_str()) {
            args.insert(pos, "check".to_string());
        }
    }

    let cli = Cli::parse_from(&args);
    logging::init_tracing(cli.verbose, cli.no_color);

    match cli.command {
        Command::Check(check_args) => do_check(check_args, cli.no_color),
        Command::Test(test_args) => {
            let path = Path::new(&test_args.path);
            if test_args.list_categories {
                test_runner::list_categories(path);
                return;
            }
            let exit_code = test_runner::run_tests(path, cli.no_color, &test_args.category);
            process::exit(exit_code);
        }
    }
}

fn do_check(args: CheckArgs, no_color: bool) {
    let color_choice = if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };
    let writer = StandardStream::stderr(color_choice);
    let config = term::Config::default();

    let source = match std::fs::read_to_string(&args.file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", args.file, e);
            process::exit(1);
        }
    };

    let mut files = SimpleFiles::new();
    let file_id = files.add(args.file.clone(), source.clone());

    let document = match lesson::Parser::new(source, file_id).parse() {
        Ok(document) => document,
        Err(error) => {
            emit(&writer, &config, &files, &error.to_diagnostic());
            process::exit(1);
        }
    };

    let options = ValidatorOptions {
        numeric_literals: !args.allow_non_numeric,
    };
    let issues = validator::validate_with(&document, &options);
    tracing::info!(
        file = %args.file,
        blocks = document.blocks.len(),
        issues = issues.len(),
        "checked lesson"
    );

    if args.json {
        let report = Report {
            file: &args.file,
            document: &document,
            issues: &issues,
        };
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("error: cannot serialize report: {}", e);
                process::exit(1);
            }
        }
        process::exit(if issues.is_empty() { 0 } else { 1 });
    }

    if args.ast {
        println!("{:#?}", document);
        return;
    }

    if args.normalize {
        print!("{}", document);
        return;
    }

    if args.list_questions {
        list_questions(&document);
    }

    for issue in &issues {
        emit(&writer, &config, &files, &issue.to_diagnostic());
    }

    if issues.is_empty() {
        eprintln!(
            "ok: {}: {} question(s), {} point(s)",
            args.file,
            document.question_count(),
            document.total_points()
        );
    } else {
        eprintln!("error: {}: {} issue(s) found", args.file, issues.len());
        process::exit(1);
    }
}

fn emit(
    writer: &StandardStream,
    config: &term::Config,
    files: &SimpleFiles<String, String>,
    diagnostic: &Diagnostic<usize>,
) {
    let _ = term::emit_to_write_style(&mut writer.lock(), config, files, diagnostic);
}

fn list_questions(document: &Document) {
    for block in &document.blocks {
        let Some(question) = block.question() else {
            continue;
        };
        let answer = match question {
            QuestionBlock::ChooseBest(q) => format!("{} of {}", q.answer, q.options.len()),
            QuestionBlock::FreeTextNumber(q) => q.answer.as_attribute().to_string(),
        };
        println!(
            "{:>5}  #{:<24} {:<17} {:>3} pt  answer {:<8} {}",
            block.first_line,
            question.id(),
            question.class(),
            question.points(),
            answer,
            question.title()
        );
    }
    println!(
        "{} question(s), {} point(s)",
        document.question_count(),
        document.total_points()
    );
}
