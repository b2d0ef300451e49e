//! Error taxonomy for the HumanLogica pipeline (spec.md §7).
//!
//! Mirrors the teacher's habit (`compile.rs`) of giving every stage its own
//! closed error kind and unifying them behind one enum for the public
//! pipeline. Nothing in this module ever panics on user input.

use std::fmt;

use crate::token::Pos;

#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub pos: Pos,
    pub message: String,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lex error at {}: {}", self.pos, self.message)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub pos: Pos,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Parse error at {}: {}", self.pos, self.message)
    }
}

/// One of the five compile-time axioms (spec.md §4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxiomNumber {
    A1 = 1,
    A3 = 3,
    A7 = 7,
    A8 = 8,
    A9 = 9,
}

impl AxiomNumber {
    pub fn name(self) -> &'static str {
        match self {
            AxiomNumber::A1 => "Speaker Requirement",
            AxiomNumber::A3 => "Three-valued",
            AxiomNumber::A7 => "No Forced Speech",
            AxiomNumber::A8 => "Write Ownership",
            AxiomNumber::A9 => "No Infinite Loops",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AxiomViolation {
    pub axiom: AxiomNumber,
    pub explanation: String,
    pub line: usize,
}

impl fmt::Display for AxiomViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Axiom {} violation (line {}) — {}: {}",
            self.axiom as u8,
            self.line,
            self.axiom.name(),
            self.explanation
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeError {
    pub speaker: Option<String>,
    pub message: String,
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.speaker {
            Some(s) => write!(f, "Broken [{s}]: {}", self.message),
            Option::None => write!(f, "Broken: {}", self.message),
        }
    }
}

impl RuntimeError {
    pub fn new(speaker: impl Into<Option<String>>, message: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            message: message.into(),
        }
    }
}

/// Unrecoverable kernel failure (spec.md §7 "Kernel halt"). The process
/// stops; no partial operation survives. In this implementation the only
/// source is an in-memory storage invariant being violated — there is no
/// disk to fail against, but the variant is kept closed-world so embedders
/// can match on it exhaustively.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelHalt {
    pub message: String,
}

impl fmt::Display for KernelHalt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Kernel halt: {}", self.message)
    }
}

/// Unifying error type returned across the lex → parse → compile → run
/// pipeline boundary (spec.md §9 "Error channel" design note: a single
/// sum-type error, never thrown across the boundary).
#[derive(Debug, Clone, PartialEq)]
pub enum HumanLogicaError {
    Lex(LexError),
    Parse(ParseError),
    Axiom(AxiomViolation),
    Runtime(RuntimeError),
    Halt(KernelHalt),
}

impl fmt::Display for HumanLogicaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HumanLogicaError::Lex(e) => write!(f, "{e}"),
            HumanLogicaError::Parse(e) => write!(f, "{e}"),
            HumanLogicaError::Axiom(e) => write!(f, "{e}"),
            HumanLogicaError::Runtime(e) => write!(f, "{e}"),
            HumanLogicaError::Halt(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for HumanLogicaError {}

impl From<LexError> for HumanLogicaError {
    fn from(e: LexError) -> Self {
        HumanLogicaError::Lex(e)
    }
}

impl From<ParseError> for HumanLogicaError {
    fn from(e: ParseError) -> Self {
        HumanLogicaError::Parse(e)
    }
}

impl From<AxiomViolation> for HumanLogicaError {
    fn from(e: AxiomViolation) -> Self {
        HumanLogicaError::Axiom(e)
    }
}

impl From<RuntimeError> for HumanLogicaError {
    fn from(e: RuntimeError) -> Self {
        HumanLogicaError::Runtime(e)
    }
}

impl From<KernelHalt> for HumanLogicaError {
    fn from(e: KernelHalt) -> Self {
        HumanLogicaError::Halt(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axiom_message_format() {
        let v = AxiomViolation {
            axiom: AxiomNumber::A8,
            explanation: "cannot write Jared.grade from Maria".to_string(),
            line: 3,
        };
        assert_eq!(
            v.to_string(),
            "Axiom 8 violation (line 3) — Write Ownership: cannot write Jared.grade from Maria"
        );
    }

    #[test]
    fn runtime_message_format() {
        let e = RuntimeError::new("Jared".to_string(), "division by zero");
        assert_eq!(e.to_string(), "Broken [Jared]: division by zero");
    }
}
