//! spec.md §8 round-trip/idempotence laws: lexing, parsing, and
//! axiom-checking the same source twice yields identical results, since
//! none of the three touches a kernel or a clock.

const SAMPLE: &str = r#"speaker Jared
speaker Maria
fn double(n) {
    return n * 2
}
as Jared {
    let x = double(2)
    when x > 0 {
        speak "positive"
    } otherwise {
        speak "non-positive"
    }
    while x > 0, max 5 {
        let x = x - 1
    }
}"#;

#[test]
fn tokenizing_the_same_source_twice_is_identical() {
    let a = humanlogica::tokenize(SAMPLE).unwrap();
    let b = humanlogica::tokenize(SAMPLE).unwrap();
    assert_eq!(a, b);
}

#[test]
fn parsing_the_same_source_twice_yields_the_same_ast_shape() {
    let a = humanlogica::parse(SAMPLE).unwrap();
    let b = humanlogica::parse(SAMPLE).unwrap();
    assert_eq!(format!("{a:?}"), format!("{b:?}"));
}

#[test]
fn checking_the_same_source_twice_yields_the_same_compiled_shape() {
    let a = humanlogica::check(SAMPLE).unwrap();
    let b = humanlogica::check(SAMPLE).unwrap();
    assert_eq!(a.operations.len(), b.operations.len());
    assert_eq!(a.speakers, b.speakers);
}

#[test]
fn an_axiom_violation_is_reported_identically_on_repeat_checks() {
    let source = "speaker Jared\nspeaker Maria\nas Maria { let Jared.grade = 100 }";
    let a = humanlogica::check(source).unwrap_err();
    let b = humanlogica::check(source).unwrap_err();
    assert_eq!(format!("{a}"), format!("{b}"));
}

#[test]
fn running_the_same_source_against_fresh_kernels_produces_the_same_output() {
    let a = humanlogica::run(SAMPLE).unwrap();
    let b = humanlogica::run(SAMPLE).unwrap();
    assert_eq!(a.output, b.output);
}
