//! HumanLogica: the Mary kernel and the Logica compile-and-run pipeline
//! (spec.md §1-§9). The kernel (speaker registry, speaker-partitioned
//! memory, hash-chained ledger, request bus, three-valued evaluator) can be
//! driven directly by an embedder; Logica source text runs through
//! [`tokenize`] → parse → [`check`] → [`run`].

pub mod ast;
pub mod compiler;
pub mod error;
pub mod kernel;
pub mod lexer;
pub mod parser;
pub mod repl;
pub mod runtime;
pub mod style;
pub mod token;
pub mod value;

use ast::Program;
use compiler::CompiledProgram;
use error::HumanLogicaError;
use kernel::Mary;
use runtime::RunOutcome;
use token::Token;

/// Lex only; exposed for `--tokens` and the round-trip/idempotence laws
/// (spec.md §8).
pub fn tokenize(source: &str) -> Result<Vec<Token>, HumanLogicaError> {
    lexer::Lexer::tokenize(source).map_err(HumanLogicaError::Lex)
}

/// Lex and parse; exposed for `--ast`.
pub fn parse(source: &str) -> Result<Program, HumanLogicaError> {
    let tokens = tokenize(source)?;
    parser::Parser::parse(tokens).map_err(HumanLogicaError::Parse)
}

/// Lex, parse, and axiom-check without executing anything (`--check`).
/// Calling this twice on the same source yields identical results (spec.md
/// §8 round-trip law) — nothing here touches a kernel or a clock.
pub fn check(source: &str) -> Result<CompiledProgram, HumanLogicaError> {
    let program = parse(source)?;
    compiler::Compiler::compile(&program).map_err(HumanLogicaError::Axiom)
}

/// Full pipeline against a fresh kernel: lex, parse, axiom-check, then
/// tree-walk. Returns the captured `speak` output in order.
pub fn run(source: &str) -> Result<RunOutcome, HumanLogicaError> {
    let program = parse(source)?;
    let compiled = compiler::Compiler::compile(&program).map_err(HumanLogicaError::Axiom)?;
    let mut kernel = Mary::boot();
    runtime::run(&program, &compiled, &mut kernel)
}

/// Like [`run`], but against a caller-supplied kernel — for embedders that
/// want to inspect ledger/memory state afterward or run several programs
/// against the same speakers.
pub fn run_with_kernel(source: &str, kernel: &mut Mary) -> Result<RunOutcome, HumanLogicaError> {
    let program = parse(source)?;
    let compiled = compiler::Compiler::compile(&program).map_err(HumanLogicaError::Axiom)?;
    runtime::run(&program, &compiled, kernel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_program_is_valid() {
        assert!(run("").is_ok());
    }

    #[test]
    fn check_is_idempotent() {
        let src = "speaker S\nas S { speak \"hi\" }";
        let a = check(src).map(|c| c.operations.len());
        let b = check(src).map(|c| c.operations.len());
        assert_eq!(a.is_ok(), b.is_ok());
        assert_eq!(a.unwrap(), b.unwrap());
    }

    #[test]
    fn hello_world_scenario() {
        let outcome = run("speaker Jared\nas Jared { speak \"Hello, World!\" }").unwrap();
        assert_eq!(outcome.output, vec!["  [Jared] Hello, World!".to_string()]);
    }
}
