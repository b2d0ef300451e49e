//! Interactive front end behind the bare `humanlogica` invocation (spec.md
//! §6 CLI surface table, "launch REPL"; SPEC_FULL.md §4.13 names this the
//! teacher's `Repl`-owns-interpreter-state pattern). A `Repl` keeps one
//! [`Mary`] kernel alive across calls to [`Repl::execute`] so that speakers,
//! their partitions, and the ledger persist from one typed snippet to the
//! next — exactly what an embedder driving the kernel directly would see.

use crate::error::HumanLogicaError;
use crate::kernel::Mary;

pub struct Repl {
    kernel: Mary,
}

impl Default for Repl {
    fn default() -> Self {
        Self::new()
    }
}

impl Repl {
    pub fn new() -> Self {
        Repl { kernel: Mary::boot() }
    }

    /// Runs one snippet of source against the REPL's persistent kernel and
    /// returns the `speak` output it produced. A snippet redeclaring a
    /// speaker already known to the kernel is not an error — [`crate::run_with_kernel`]
    /// only creates speakers that don't already exist by name.
    pub fn execute(&mut self, source: &str) -> Result<Vec<String>, HumanLogicaError> {
        let outcome = crate::run_with_kernel(source, &mut self.kernel)?;
        Ok(outcome.output)
    }

    pub fn kernel(&self) -> &Mary {
        &self.kernel
    }

    pub fn kernel_mut(&mut self) -> &mut Mary {
        &mut self.kernel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_persists_across_snippets() {
        let mut repl = Repl::new();
        repl.execute("speaker S\nas S { let x = 41 }").unwrap();
        let out = repl
            .execute("speaker S\nas S { let x = x + 1\nspeak x }")
            .unwrap();
        assert_eq!(out, vec!["  [S] 42".to_string()]);
    }

    #[test]
    fn redeclaring_a_known_speaker_is_not_an_error() {
        let mut repl = Repl::new();
        repl.execute("speaker S\nas S { speak \"a\" }").unwrap();
        let out = repl.execute("speaker S\nas S { speak \"b\" }").unwrap();
        assert_eq!(out, vec!["  [S] b".to_string()]);
        assert_eq!(repl.kernel().list_speakers().len(), 2); // root + S
    }

    #[test]
    fn axiom_violations_surface_without_poisoning_the_kernel() {
        let mut repl = Repl::new();
        let ledger_before = repl.kernel().state().ledger_count;
        let err = repl
            .execute("speaker S\nas S { while true { } }")
            .unwrap_err();
        assert!(matches!(err, HumanLogicaError::Axiom(_)));
        assert_eq!(repl.kernel().state().ledger_count, ledger_before);
    }
}
