use std::sync::Arc;

use grader::checker::Outcome;
use grader::registry::InstanceRegistry;
use grader::{AlgebraEngine, GenerateError, RenderError, generate_seeded, render_display};
use quizmd::parser::{ParseErrorKind, Parser};
use quizmd::record::QuizRecord;
use rand::SeedableRng;
use rand::rngs::StdRng;

fn parse_one(source: &str) -> Arc<QuizRecord> {
    let doc = Parser::new(source.to_string(), 0).parse();
    Arc::new(doc.records().next().expect("block parses").clone())
}

fn instantiate(source: &str, seed: u64) -> (InstanceRegistry, u64, Arc<grader::QuizInstance>) {
    let registry = InstanceRegistry::default();
    let (id, instance) = registry
        .instantiate_seeded(parse_one(source), seed)
        .expect("instantiation succeeds");
    (registry, id, instance)
}

const LINEAR: &str = ":::quiz\n\
                      question: Solve {{a}}x + {{b}} = 0 for x.\n\
                      vars: a: int = [1, 9], a != 0, b: int = [1, 9]\n\
                      answer: -{{b}} / {{a}}\n\
                      :::\n";

#[test]
fn canonical_answer_passes_its_own_check() {
    for seed in 0..20 {
        let (registry, id, instance) = instantiate(LINEAR, seed);
        let verdict = registry
            .check(id, &instance.canonical_answer)
            .unwrap()
            .expect("first check is never superseded");
        assert_eq!(verdict.outcome, Outcome::Correct, "seed {}", seed);
    }
}

#[test]
fn equivalent_rewrites_pass_and_wrong_answers_fail() {
    let source = ":::quiz\n\
                  question: Expand 2(x + 1).\n\
                  answer: 2*(x + 1)\n\
                  :::\n";
    let (registry, id, _) = instantiate(source, 1);

    let correct = registry.check(id, "2*x + 2").unwrap().unwrap();
    assert_eq!(correct.outcome, Outcome::Correct);

    let wrong = registry.check(id, "3*x").unwrap().unwrap();
    assert_eq!(wrong.outcome, Outcome::Incorrect);
}

#[test]
fn constrained_draws_stay_in_range_and_avoid_excluded_values() {
    let source = ":::quiz\n\
                  question: {{n}}\n\
                  vars: n: int = [1, 10], n != 5\n\
                  answer: {{n}}\n\
                  :::\n";
    let record = parse_one(source);
    let mut rng = StdRng::seed_from_u64(2024);

    for _ in 0..10_000 {
        let bindings = grader::generate(&record.variables, &AlgebraEngine, &mut rng).unwrap();
        let n = bindings.get("n").unwrap().numeric().unwrap();
        assert!((1.0..=10.0).contains(&n));
        assert_ne!(n, 5.0);
    }
}

#[test]
fn contradictory_constraints_fail_within_the_attempt_bound() {
    let source = ":::quiz\n\
                  question: {{n}}\n\
                  vars: n = [1, 10], n > 5, n < 3\n\
                  answer: {{n}}\n\
                  :::\n";
    let record = parse_one(source);

    let result = generate_seeded(&record.variables, &AlgebraEngine, 7);
    match result {
        Err(GenerateError::ConstraintUnsatisfiable { name, attempts }) => {
            assert_eq!(name, "n");
            assert_eq!(attempts, grader::generator::MAX_ATTEMPTS);
        }
        other => panic!("expected ConstraintUnsatisfiable, got {:?}", other),
    }
}

#[test]
fn good_block_survives_an_unterminated_neighbour() {
    let source = "Intro text.\n\
                  \n\
                  :::quiz\n\
                  question: What is {{a}} + {{a}}?\n\
                  vars: a: int = [1, 4]\n\
                  answer: 2 * {{a}}\n\
                  :::\n\
                  \n\
                  :::quiz\n\
                  question: This block never closes\n\
                  answer: 0\n";
    let doc = Parser::new(source.to_string(), 0).parse();

    assert_eq!(doc.records().count(), 1);
    let errors: Vec<_> = doc.errors().collect();
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        errors[0].kind,
        ParseErrorKind::UnterminatedBlock { line: 9 }
    ));

    let registry = InstanceRegistry::default();
    let record = Arc::new(doc.records().next().unwrap().clone());
    let (id, instance) = registry.instantiate_seeded(record, 3).unwrap();
    assert!(instance.question.starts_with("What is "));
    let verdict = registry.check(id, &instance.canonical_answer).unwrap().unwrap();
    assert_eq!(verdict.outcome, Outcome::Correct);
}

#[test]
fn undeclared_placeholder_aborts_instantiation() {
    let source = ":::quiz\n\
                  question: What is {{a}} + {{typo}}?\n\
                  vars: a: int = [1, 4]\n\
                  answer: {{a}}\n\
                  :::\n";
    let record = parse_one(source);
    let bindings = generate_seeded(&record.variables, &AlgebraEngine, 1).unwrap();

    assert_eq!(
        render_display(&record.question, &bindings),
        Err(RenderError::UnknownVariable("typo".to_string()))
    );

    let registry = InstanceRegistry::default();
    assert!(registry.instantiate_seeded(record, 1).is_err());
}

#[test]
fn garbage_submission_reports_error_not_incorrect() {
    let (registry, id, _) = instantiate(LINEAR, 4);

    let verdict = registry.check(id, "2+*").unwrap().unwrap();
    assert_eq!(verdict.outcome, Outcome::Error);
    assert!(verdict.detail.is_some());

    // The instance stays open after a judging failure.
    let instance = registry.get(id).unwrap();
    let retry = registry
        .check(id, &instance.canonical_answer)
        .unwrap()
        .expect("retry is the latest submission");
    assert_eq!(retry.outcome, Outcome::Correct);
}

#[test]
fn literal_mode_ignores_math_equivalence() {
    let source = ":::quiz\n\
                  question: Spell the number 2.\n\
                  answer: two\n\
                  mode: literal\n\
                  :::\n";
    let (registry, id, _) = instantiate(source, 1);

    assert_eq!(registry.check(id, " two ").unwrap().unwrap().outcome, Outcome::Correct);
    assert_eq!(registry.check(id, "2").unwrap().unwrap().outcome, Outcome::Incorrect);
}

#[test]
fn derived_variables_flow_into_question_and_answer() {
    let source = ":::quiz\n\
                  question: {{n}} squared plus one is {{m}}.\n\
                  vars: n: int = [2, 6], m = n^2 + 1\n\
                  answer: {{m}}\n\
                  :::\n";
    let (registry, id, instance) = instantiate(source, 8);

    let n = instance.bindings.get("n").unwrap().numeric().unwrap();
    let m = instance.bindings.get("m").unwrap().numeric().unwrap();
    assert_eq!(m, n * n + 1.0);
    // Derived values render inside math delimiters.
    assert!(instance.question.contains("\\("));

    let verdict = registry.check(id, &format!("{}", m)).unwrap().unwrap();
    assert_eq!(verdict.outcome, Outcome::Correct);
}

#[test]
fn documents_round_trip_through_the_filesystem() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let path = dir.path().join("worksheet.md");
    std::fs::write(&path, LINEAR).unwrap();

    let source = std::fs::read_to_string(&path).unwrap();
    let (registry, id, instance) = instantiate(&source, 21);
    let verdict = registry.check(id, &instance.canonical_answer).unwrap().unwrap();
    assert_eq!(verdict.outcome, Outcome::Correct);
}

#[test]
fn seeded_instantiation_is_reproducible() {
    let (_, _, first) = instantiate(LINEAR, 77);
    let (_, _, second) = instantiate(LINEAR, 77);
    assert_eq!(first.question, second.question);
    assert_eq!(first.canonical_answer, second.canonical_answer);

    let (_, _, other) = instantiate(LINEAR, 78);
    // Different seeds may collide on small ranges, but bindings must at
    // least be produced independently of any global state.
    assert_eq!(other.bindings.len(), 2);
}
