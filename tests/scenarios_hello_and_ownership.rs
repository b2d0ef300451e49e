//! spec.md §8 concrete scenarios 1 and 2: the Hello World run and the
//! Axiom 8 write-ownership rejection.

use humanlogica::error::{AxiomNumber, HumanLogicaError};
use humanlogica::kernel::ledger::Operation;

#[test]
fn hello_world_produces_the_expected_output_and_ledger_shape() {
    let source = "speaker Jared\nas Jared { speak \"Hello, World!\" }";
    let mut kernel = humanlogica::kernel::Mary::boot();
    let outcome = humanlogica::run_with_kernel(source, &mut kernel).unwrap();

    assert_eq!(outcome.output, vec!["  [Jared] Hello, World!".to_string()]);

    let ops: Vec<Operation> = kernel.ledger_read(0, kernel.ledger_count() as u64 - 1)
        .iter()
        .map(|e| e.operation)
        .collect();
    assert_eq!(
        ops,
        vec![
            Operation::Boot,
            Operation::CreateSpeaker,
            Operation::SetSpeaker,
            Operation::Evaluate,
        ]
    );

    let speak_entry = kernel.ledger_last(1).remove(0);
    assert_eq!(speak_entry.action, "speak:Hello, World!");
    assert!(matches!(speak_entry.status, humanlogica::value::Status::Active));

    assert!(kernel.ledger_verify());
}

#[test]
fn writing_another_speakers_variable_fails_axiom_8_before_any_run() {
    let source = "speaker Jared\nspeaker Maria\nas Maria { let Jared.grade = 100 }";
    let err = humanlogica::check(source).unwrap_err();
    match err {
        HumanLogicaError::Axiom(v) => {
            assert_eq!(v.axiom, AxiomNumber::A8);
            assert_eq!(v.line, 3);
        }
        other => panic!("expected an axiom violation, got {other:?}"),
    }

    // run() never creates the ledger entry — the pipeline aborts before
    // touching the kernel (spec.md §8 scenario 2).
    let run_err = humanlogica::run(source).unwrap_err();
    assert!(matches!(run_err, HumanLogicaError::Axiom(_)));
}

#[test]
fn let_self_dot_is_legal_write_ownership() {
    let source = "speaker Jared\nas Jared { let self.grade = 100\nspeak self.grade }";
    let outcome = humanlogica::run(source).unwrap();
    assert_eq!(outcome.output, vec!["  [Jared] 100".to_string()]);
}
