//! spec.md §8 concrete scenarios 5 and 6: re-evaluating the same `when`
//! supersedes its prior expression, and a request can be accepted or
//! refused without forcing the responder's speech (Axiom 7).

use humanlogica::kernel::ledger::Operation;
use humanlogica::value::Status;

#[test]
fn re_entering_the_same_when_block_supersedes_the_prior_expression() {
    let source = r#"speaker S
as S {
    let i = 0
    while i < 2, max 5 {
        when true { speak "tick" }
        let i = i + 1
    }
}"#;
    let mut kernel = humanlogica::kernel::Mary::boot();
    let outcome = humanlogica::run_with_kernel(source, &mut kernel).unwrap();
    assert_eq!(outcome.output, vec!["  [S] tick".to_string(), "  [S] tick".to_string()]);

    let supersessions: Vec<_> = kernel
        .ledger_read(0, kernel.ledger_count() as u64 - 1)
        .into_iter()
        .filter(|e| e.operation == Operation::Supersede)
        .collect();
    // The second iteration re-submits both the outer `when_block` expression
    // and the inner `speak:tick` expression it runs under the same label as
    // the first iteration, so both get superseded.
    assert_eq!(supersessions.len(), 2, "second iteration supersedes both the when_block and speak expressions");
    for entry in &supersessions {
        assert_eq!(entry.state_before.as_deref(), Some("current"));
        assert_eq!(entry.state_after.as_deref(), Some("superseded"));
    }
}

#[test]
fn sibling_when_blocks_do_not_supersede_each_other() {
    let source = r#"speaker S
as S {
    when true { speak "first" }
    when false { speak "second" }
}"#;
    let mut kernel = humanlogica::kernel::Mary::boot();
    let outcome = humanlogica::run_with_kernel(source, &mut kernel).unwrap();
    assert_eq!(outcome.output, vec!["  [S] first".to_string()]);

    let supersessions = kernel
        .ledger_read(0, kernel.ledger_count() as u64 - 1)
        .into_iter()
        .filter(|e| e.operation == Operation::Supersede)
        .count();
    // Two distinct `when` statements (and the `speak` nested in the first)
    // are different syntactic statements, not re-evaluations of the same
    // one, so neither should supersede the other.
    assert_eq!(supersessions, 0, "distinct sibling statements must not collide on label");
}

#[test]
fn request_accept_flow_logs_pending_then_accepted() {
    let source = r#"speaker Jared
speaker Maria
as Jared { request Maria "borrow pencil" }
as Maria { respond accept }"#;
    let mut kernel = humanlogica::kernel::Mary::boot();
    humanlogica::run_with_kernel(source, &mut kernel).unwrap();

    let entries = kernel.ledger_read(0, kernel.ledger_count() as u64 - 1);
    let request_entry = entries.iter().find(|e| e.operation == Operation::Request).unwrap();
    assert_eq!(request_entry.state_after.as_deref(), Some("pending"));

    let respond_entry = entries.iter().find(|e| e.operation == Operation::Respond).unwrap();
    assert_eq!(respond_entry.state_after.as_deref(), Some("accepted"));
    assert!(matches!(respond_entry.status, Status::Active));
}

#[test]
fn request_refusal_is_not_forced_speech_and_still_ledgers() {
    let source = r#"speaker Jared
speaker Maria
as Jared { request Maria "borrow pencil" }
as Maria { respond refuse }"#;
    let mut kernel = humanlogica::kernel::Mary::boot();
    let outcome = humanlogica::run_with_kernel(source, &mut kernel).unwrap();

    // Refusing a request produces no speech of Maria's own accord (Axiom 7:
    // no caller can compel Maria to say anything beyond the refusal itself).
    assert!(outcome.output.is_empty());

    let entries = kernel.ledger_read(0, kernel.ledger_count() as u64 - 1);
    let respond_entry = entries.iter().find(|e| e.operation == Operation::Respond).unwrap();
    assert_eq!(respond_entry.state_after.as_deref(), Some("refused"));
}

#[test]
fn responding_with_no_pending_request_is_a_broken_runtime_error() {
    let source = "speaker Maria\nas Maria { respond accept }";
    let mut kernel = humanlogica::kernel::Mary::boot();
    let err = humanlogica::run_with_kernel(source, &mut kernel).unwrap_err();
    assert!(matches!(err, humanlogica::error::HumanLogicaError::Runtime(_)));

    let last = kernel.ledger_last(1).remove(0);
    assert!(matches!(last.status, Status::Broken));
    assert_eq!(last.break_reason.as_deref(), Some("no pending request to respond to"));
}
