use lesson::BlockKind;
use proptest::prelude::*;

fn kinds(source: &str) -> Result<Vec<BlockKind>, TestCaseError> {
    let document = lesson::parse(source)
        .map_err(|err| TestCaseError::fail(format!("{}\n--- source ---\n{}", err, source)))?;
    Ok(document.blocks.into_iter().map(|b| b.kind).collect())
}

fn pieces(options: &'static [&'static str], len: std::ops::Range<usize>) -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(options), len).prop_map(|p| p.concat())
}

fn heading() -> impl Strategy<Value = String> {
    (1usize..=6, "[a-z]{1,5}( [a-z#]{1,3}){0,3}")
        .prop_map(|(level, text)| format!("{} {}", "#".repeat(level), text))
}

fn paragraph() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z]{1,8}( [a-z]{1,8}){0,4}", 1..3).prop_map(|lines| lines.join("\n"))
}

fn image() -> impl Strategy<Value = String> {
    (
        pieces(&["tab", " ", "\\]", "\\[", "*"], 0..5),
        pieces(&["pic", " ", "(1)", ".png", "/"], 0..5),
        prop::option::of(pieces(&["a", " ", "\\\"", "\\\\"], 1..5)),
    )
        .prop_map(|(alt, dest, title)| match title {
            Some(title) => format!("![{}](<{}> \"{}\")", alt, dest, title),
            None => format!("![{}](<{}>)", alt, dest),
        })
}

fn code_sample() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "```ruby\nputs 1\n```",
        "~~~\n{: .choose_best #x }\n~~~",
        "````md\n```\nnested\n```\n````",
    ])
    .prop_map(str::to_string)
}

/// A list that a styling attribute list closes, so no question claims it.
fn styled_list() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z]{1,6}", 1..4).prop_map(|items| {
        let mut source: String = items.iter().map(|item| format!("- {}\n", item)).collect();
        source.push_str("{: .note }");
        source
    })
}

fn title() -> impl Strategy<Value = String> {
    pieces(&["Tabs", " ", "\\\"", "\\\\", "'"], 0..6)
}

fn choose_best() -> impl Strategy<Value = String> {
    let option = ("[a-z]{1,6}", prop::option::of(pieces(&["ok", " ", "\"", "\\", "'"], 1..4)));
    (
        prop::collection::vec(option, 1..5),
        title(),
        1i64..5,
        0usize..5,
    )
        .prop_map(|(options, title, points, pick)| {
            let mut source = String::new();
            for (text, feedback) in &options {
                source.push_str(&format!("- {}\n", text));
                if let Some(feedback) = feedback {
                    source.push_str(&format!("  - {}\n", feedback));
                }
            }
            let answer = pick % options.len() + 1;
            source.push_str(&format!(
                "{{: .choose_best #q title=\"{}\" points=\"{}\" answer=\"{}\" }}",
                title, points, answer
            ));
            source
        })
}

fn free_text_number() -> impl Strategy<Value = String> {
    (title(), 1i64..5, prop_oneof![Just("any".to_string()), "[0-9]{1,3}"]).prop_map(
        |(title, points, answer)| {
            format!(
                "{{: .free_text_number #n title=\"{}\" points=\"{}\" answer=\"{}\" }}",
                title, points, answer
            )
        },
    )
}

fn lesson_source() -> impl Strategy<Value = String> {
    let block = prop_oneof![
        heading(),
        paragraph(),
        image(),
        code_sample(),
        styled_list(),
        choose_best(),
        free_text_number(),
    ];
    prop::collection::vec(block, 1..8).prop_map(|blocks| blocks.join("\n\n") + "\n")
}

proptest! {
    #[test]
    fn rendered_lessons_parse_back_to_the_same_blocks(source in lesson_source()) {
        let original = kinds(&source)?;
        let rendered = lesson::parse(&source)
            .map_err(|err| TestCaseError::fail(err.to_string()))?
            .to_string();
        let again = kinds(&rendered)?;
        prop_assert_eq!(original, again, "rendered:\n{}", rendered);
    }
}
