use quizmd::ParsedDocument;
use quizmd::parser::{ParseErrorKind, Parser};
use quizmd::record::AnswerMode;
use quizmd::record::variable::VarType;
use quizmd::segment::Segment;

fn parse(source: &str) -> ParsedDocument {
    Parser::new(source.to_string(), 0).parse()
}

#[test]
fn document_keeps_text_and_blocks_in_order() {
    let doc = parse(
        "Intro paragraph.\n\
         \n\
         :::quiz\n\
         question: What is {{a}} + {{b}}?\n\
         answer: {{a}} + {{b}}\n\
         :::\n\
         \n\
         Outro paragraph.\n",
    );

    assert_eq!(doc.segments.len(), 3);
    assert!(matches!(&doc.segments[0], Segment::Text { content, .. } if content.contains("Intro")));
    assert!(matches!(&doc.segments[1], Segment::Quiz { .. }));
    assert!(matches!(&doc.segments[2], Segment::Text { content, .. } if content.contains("Outro")));
    assert_eq!(doc.errors().count(), 0);
}

#[test]
fn full_block_parses_every_field() {
    let doc = parse(
        ":::quiz\n\
         question: Solve {{a}}x + {{b}} = 0.\n\
         hint: Move the constant first.\n\
         vars: a: int = [1, 9], a != 0, b = [-9, 9]\n\
         answer: -{{b}} / {{a}}\n\
         mode: symbolic\n\
         markscheme: [1] Isolate the x term\n\
         \x20 [2] Divide by the coefficient\n\
         explanation: x = -b/a\n\
         difficulty: easy\n\
         :::\n",
    );

    let record = doc.records().next().expect("one record");

    assert_eq!(record.question.placeholders().count(), 2);
    assert!(record.hint.is_some());
    assert_eq!(record.answer.mode, AnswerMode::Symbolic);

    let a = record.variable("a").unwrap();
    assert_eq!(a.var_type, VarType::Int);
    assert_eq!(a.range, Some((1.0, 9.0)));
    assert_eq!(a.constraints.len(), 1);
    let b = record.variable("b").unwrap();
    assert_eq!(b.var_type, VarType::Float);

    assert_eq!(record.markscheme.len(), 2);
    assert_eq!(record.markscheme[0].marks, 1);
    assert_eq!(record.markscheme[1].marks, 2);
    assert_eq!(record.markscheme[1].description, "Divide by the coefficient");

    assert_eq!(record.metadata.get("difficulty").map(String::as_str), Some("easy"));
}

#[test]
fn variable_forms_cover_all_types() {
    let doc = parse(
        ":::quiz\n\
         question: {{f}} of {{c}} with {{n}} and {{d}} and {{l}}\n\
         vars: n = [2, 6], c = {red, green, blue}, d = n^2 + 1, l: latex = \\frac{1}{2}, f: choice = squared\n\
         answer: {{d}}\n\
         :::\n",
    );

    let record = doc.records().next().expect("one record");
    assert_eq!(record.variable("n").unwrap().var_type, VarType::Float);
    assert_eq!(record.variable("c").unwrap().choices.len(), 3);

    let d = record.variable("d").unwrap();
    assert_eq!(d.var_type, VarType::Expr);
    assert_eq!(d.expression.as_deref(), Some("n^2 + 1"));

    let l = record.variable("l").unwrap();
    assert_eq!(l.var_type, VarType::Latex);
    assert_eq!(l.expression.as_deref(), Some("\\frac{1}{2}"));

    assert_eq!(record.variable("f").unwrap().choices, vec!["squared".to_string()]);
}

#[test]
fn continuation_lines_extend_the_previous_key() {
    let doc = parse(
        ":::quiz\n\
         question: Pick {{c}}.\n\
         vars: a = [1, 3]\n\
         \x20 c = {x, y}\n\
         \x20 a != 2\n\
         answer: {{c}}\n\
         :::\n",
    );

    let record = doc.records().next().expect("one record");
    assert_eq!(record.variables.len(), 2);
    assert_eq!(record.variable("a").unwrap().constraints.len(), 1);
}

#[test]
fn missing_answer_breaks_only_that_block() {
    let doc = parse(
        ":::quiz\n\
         question: Fine block {{x}}\n\
         vars: x = [1, 2]\n\
         answer: {{x}}\n\
         :::\n\
         \n\
         :::quiz\n\
         question: No answer here\n\
         :::\n",
    );

    assert_eq!(doc.records().count(), 1);
    let error = doc.errors().next().expect("one error");
    assert!(matches!(error.kind, ParseErrorKind::MissingField { key: "answer" }));
}

#[test]
fn unterminated_block_reports_its_opening_line() {
    let doc = parse(
        "Some text.\n\
         \n\
         :::quiz\n\
         question: Never closed\n\
         answer: 42\n",
    );

    let error = doc.errors().next().expect("one error");
    match &error.kind {
        ParseErrorKind::UnterminatedBlock { line } => assert_eq!(*line, 3),
        other => panic!("unexpected error kind: {:?}", other),
    }
    // The text before the opener is still a usable segment.
    assert!(matches!(&doc.segments[0], Segment::Text { content, .. } if content.contains("Some text")));
}

#[test]
fn malformed_variable_entry_is_rejected() {
    let doc = parse(
        ":::quiz\n\
         question: {{a}}\n\
         vars: a = [9, 1]\n\
         answer: {{a}}\n\
         :::\n",
    );

    let error = doc.errors().next().expect("one error");
    match &error.kind {
        ParseErrorKind::MalformedVariable { name, reason } => {
            assert_eq!(name, "a");
            assert!(reason.contains("minimum"));
        }
        other => panic!("unexpected error kind: {:?}", other),
    }
}

#[test]
fn non_finite_range_bounds_are_rejected() {
    for bad in ["[nan, 5]", "[1, inf]", "[-inf, infinity]"] {
        let doc = parse(&format!(
            ":::quiz\n\
             question: {{{{a}}}}\n\
             vars: a = {}\n\
             answer: {{{{a}}}}\n\
             :::\n",
            bad
        ));

        let error = doc.errors().next().unwrap_or_else(|| panic!("{} accepted", bad));
        match &error.kind {
            ParseErrorKind::MalformedVariable { name, reason } => {
                assert_eq!(name, "a");
                assert!(reason.contains("finite"), "{}: {}", bad, reason);
            }
            other => panic!("unexpected error kind: {:?}", other),
        }
    }
}

#[test]
fn constraint_without_declaration_is_rejected() {
    let doc = parse(
        ":::quiz\n\
         question: {{a}}\n\
         vars: a != 0\n\
         answer: {{a}}\n\
         :::\n",
    );

    assert_eq!(doc.records().count(), 0);
    assert_eq!(doc.errors().count(), 1);
}

#[test]
fn literal_mode_is_opt_in() {
    let doc = parse(
        ":::quiz\n\
         question: Spell the word for 2.\n\
         answer: two\n\
         mode: literal\n\
         :::\n",
    );

    let record = doc.records().next().expect("one record");
    assert_eq!(record.answer.mode, AnswerMode::Literal);
}
