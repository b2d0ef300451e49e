//! spec.md §8 concrete scenarios 3 and 4: the three-valued `when` and a
//! loop that never makes progress, bounded by `max`.

use humanlogica::error::HumanLogicaError;

#[test]
fn when_otherwise_arm_runs_on_false_condition() {
    let source = r#"speaker S
as S {
    let ok = false
    when ok { speak "a" } otherwise { speak "b" } broken { speak "c" }
}"#;
    let outcome = humanlogica::run(source).unwrap();
    assert_eq!(outcome.output, vec!["  [S] b".to_string()]);
}

#[test]
fn when_with_all_three_arms_empty_is_legal() {
    let source = "speaker S\nas S { let ok = true\nwhen ok { } otherwise { } broken { } }";
    assert!(humanlogica::run(source).is_ok());
}

#[test]
fn loop_without_progress_hits_its_bound_and_goes_broken() {
    let source = r#"speaker S
as S {
    let i = 0
    while i < 100, max 3 {
        let i = i + 0
    }
}"#;
    let err = humanlogica::run(source).unwrap_err();
    match err {
        HumanLogicaError::Runtime(e) => {
            assert_eq!(e.speaker.as_deref(), Some("S"));
            assert!(e.message.contains("exceeded max 3"));
        }
        other => panic!("expected a runtime error, got {other:?}"),
    }
}

#[test]
fn while_without_max_fails_axiom_9_before_any_ledger_entry() {
    let source = "speaker S\nas S { while true { } }";
    let mut kernel = humanlogica::kernel::Mary::boot();
    let before = kernel.ledger_count();

    let err = humanlogica::check(source).unwrap_err();
    assert!(matches!(
        err,
        HumanLogicaError::Axiom(v) if v.axiom == humanlogica::error::AxiomNumber::A9
    ));

    // check() never touches a kernel at all.
    assert_eq!(kernel.ledger_count(), before);
}

#[test]
fn division_by_zero_yields_a_broken_ledger_entry_and_runtime_error() {
    let source = "speaker S\nas S { let x = 1 / 0 }";
    let mut kernel = humanlogica::kernel::Mary::boot();
    let err = humanlogica::run_with_kernel(source, &mut kernel).unwrap_err();
    assert!(matches!(err, HumanLogicaError::Runtime(_)));

    let last = kernel.ledger_last(1).remove(0);
    assert!(matches!(last.status, humanlogica::value::Status::Broken));
    assert!(last.break_reason.is_some());
}

#[test]
fn none_propagates_through_arithmetic() {
    use humanlogica::value::Value;
    let source = "speaker S\nas S { let x = none + 1\nspeak x }";
    let outcome = humanlogica::run(source).unwrap();
    assert_eq!(outcome.output, vec!["  [S] none".to_string()]);
    let _ = Value::None; // documents which variant "none" lexes/evaluates to
}

#[test]
fn empty_program_is_valid_and_produces_only_the_boot_entry() {
    let mut kernel = humanlogica::kernel::Mary::boot();
    let before = kernel.ledger_count();
    let outcome = humanlogica::run_with_kernel("", &mut kernel).unwrap();
    assert!(outcome.output.is_empty());
    assert_eq!(kernel.ledger_count(), before);
}
