//! C1: Sequential, gapless, hash-chained entry store (spec.md §4.1).

use sha2::{Digest, Sha256};
use std::fmt;

use crate::value::Status;

/// Digest width used for chain links. Spec.md only mandates "at least 64
/// bits"; 128 bits (32 hex chars) of a truncated SHA-256 gives comfortable
/// tamper-evidence headroom without pretending to offer the full collision
/// resistance the Non-goals explicitly disclaim (spec.md §1, §9).
pub const DEFAULT_HASH_BYTES: usize = 16;

pub const GENESIS: &str = "genesis";

/// Closed operation enum (spec.md §3 "Ledger entry" + §4.6 surface). Every
/// kernel-facade call and every axiom rejection maps to exactly one of
/// these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Boot,
    CreateSpeaker,
    SuspendSpeaker,
    SetSpeaker,
    Write,
    WriteViolation,
    Evaluate,
    Supersede,
    LoopIteration,
    LoopEnd,
    LoopBoundExceeded,
    Request,
    Respond,
    RequestTimeout,
    Seal,
    Inspect,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Boot => "boot",
            Operation::CreateSpeaker => "create_speaker",
            Operation::SuspendSpeaker => "suspend_speaker",
            Operation::SetSpeaker => "set_speaker",
            Operation::Write => "write",
            Operation::WriteViolation => "write_violation",
            Operation::Evaluate => "evaluate",
            Operation::Supersede => "supersede",
            Operation::LoopIteration => "loop_iteration",
            Operation::LoopEnd => "loop_end",
            Operation::LoopBoundExceeded => "loop_bound_exceeded",
            Operation::Request => "request",
            Operation::Respond => "respond",
            Operation::RequestTimeout => "request_timeout",
            Operation::Seal => "seal",
            Operation::Inspect => "inspect",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone)]
pub struct Entry {
    pub entry_id: u64,
    pub speaker_id: u64,
    pub operation: Operation,
    pub action: String,
    pub condition: Option<String>,
    pub condition_result: Option<bool>,
    pub status: Status,
    pub state_before: Option<String>,
    pub state_after: Option<String>,
    pub timestamp: u64,
    pub prev_hash: String,
    pub entry_hash: String,
    pub break_reason: Option<String>,
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} [{}] {}: {}",
            self.entry_id, self.status, self.speaker_id, self.action
        )?;
        if let Some(reason) = &self.break_reason {
            write!(f, " (breakReason: {reason})")?;
        }
        if let Some(before) = &self.state_before {
            write!(f, " (state_before: {before})")?;
        }
        if let Some(after) = &self.state_after {
            write!(f, " (state_after: {after})")?;
        }
        Ok(())
    }
}

impl Entry {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "entry_id": self.entry_id,
            "speaker_id": self.speaker_id,
            "operation": self.operation.to_string(),
            "action": self.action,
            "condition": self.condition,
            "condition_result": self.condition_result,
            "status": self.status.to_string(),
            "state_before": self.state_before,
            "state_after": self.state_after,
            "timestamp": self.timestamp,
            "prev_hash": self.prev_hash,
            "entry_hash": self.entry_hash,
            "break_reason": self.break_reason,
        })
    }
}

/// Fields needed to append an entry, distinct from the stored `Entry` so
/// the hash/id/prev_hash/timestamp bookkeeping stays exclusively inside
/// `Ledger::append`.
pub struct NewEntry {
    pub speaker_id: u64,
    pub operation: Operation,
    pub action: String,
    pub condition: Option<String>,
    pub condition_result: Option<bool>,
    pub status: Status,
    pub state_before: Option<String>,
    pub state_after: Option<String>,
    pub break_reason: Option<String>,
}

pub struct Ledger {
    entries: Vec<Entry>,
    /// Injectable monotonic clock so tests can assert determinism
    /// (spec.md §8 invariant 6) without depending on wall-clock time.
    clock: u64,
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            clock: 0,
        }
    }

    fn next_timestamp(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// `H(entry_id || speaker_id || operation || action || timestamp ||
    /// prev_hash)` (spec.md §4.1 "Hash rule"), SHA-256 truncated to
    /// `DEFAULT_HASH_BYTES`.
    fn entry_hash(
        entry_id: u64,
        speaker_id: u64,
        operation: Operation,
        action: &str,
        timestamp: u64,
        prev_hash: &str,
    ) -> String {
        let mut hasher = Sha256::new();
        hasher.update(entry_id.to_le_bytes());
        hasher.update(speaker_id.to_le_bytes());
        hasher.update(operation.to_string().as_bytes());
        hasher.update(action.as_bytes());
        hasher.update(timestamp.to_le_bytes());
        hasher.update(prev_hash.as_bytes());
        let digest = hasher.finalize();
        digest[..DEFAULT_HASH_BYTES]
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }

    /// The only mutating ledger operation. Cannot fail from within the
    /// kernel in this in-memory implementation (spec.md §4.1 "Failure
    /// model").
    pub fn append(&mut self, new: NewEntry) -> Entry {
        let entry_id = self.entries.len() as u64;
        let prev_hash = self
            .entries
            .last()
            .map(|e| e.entry_hash.clone())
            .unwrap_or_else(|| GENESIS.to_string());
        let timestamp = self.next_timestamp();
        let entry_hash = Self::entry_hash(
            entry_id,
            new.speaker_id,
            new.operation,
            &new.action,
            timestamp,
            &prev_hash,
        );
        let entry = Entry {
            entry_id,
            speaker_id: new.speaker_id,
            operation: new.operation,
            action: new.action,
            condition: new.condition,
            condition_result: new.condition_result,
            status: new.status,
            state_before: new.state_before,
            state_after: new.state_after,
            timestamp,
            prev_hash,
            entry_hash,
            break_reason: new.break_reason,
        };
        self.entries.push(entry.clone());
        entry
    }

    pub fn read(&self, from_id: u64, to_id: u64) -> Vec<&Entry> {
        self.entries
            .iter()
            .filter(|e| e.entry_id >= from_id && e.entry_id <= to_id)
            .collect()
    }

    pub fn last(&self, n: usize) -> Vec<&Entry> {
        let len = self.entries.len();
        let start = len.saturating_sub(n);
        self.entries[start..].iter().collect()
    }

    pub fn search<F>(&self, filter: F) -> Vec<&Entry>
    where
        F: Fn(&Entry) -> bool,
    {
        self.entries.iter().filter(|e| filter(e)).collect()
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn last_entry(&self) -> Option<&Entry> {
        self.entries.last()
    }

    /// Walk entries in order from `"genesis"`; every `prev_hash` must equal
    /// the running hash and every recomputed `entry_hash` must match the
    /// stored one. Vacuously true for an empty ledger.
    pub fn verify_integrity(&self) -> bool {
        let mut running = GENESIS.to_string();
        for entry in &self.entries {
            if entry.prev_hash != running {
                return false;
            }
            let recomputed = Self::entry_hash(
                entry.entry_id,
                entry.speaker_id,
                entry.operation,
                &entry.action,
                entry.timestamp,
                &entry.prev_hash,
            );
            if recomputed != entry.entry_hash {
                return false;
            }
            running = entry.entry_hash.clone();
        }
        true
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn append(ledger: &mut Ledger, speaker_id: u64, action: &str) -> Entry {
        ledger.append(NewEntry {
            speaker_id,
            operation: Operation::Write,
            action: action.to_string(),
            condition: None,
            condition_result: None,
            status: Status::Active,
            state_before: None,
            state_after: None,
            break_reason: None,
        })
    }

    #[test]
    fn empty_ledger_verifies() {
        assert!(Ledger::new().verify_integrity());
    }

    #[test]
    fn chain_links_and_verifies() {
        let mut ledger = Ledger::new();
        let e0 = append(&mut ledger, 0, "a");
        let e1 = append(&mut ledger, 0, "b");
        assert_eq!(e0.prev_hash, GENESIS);
        assert_eq!(e1.prev_hash, e0.entry_hash);
        assert!(ledger.verify_integrity());
    }

    #[test]
    fn entry_ids_are_gapless() {
        let mut ledger = Ledger::new();
        for i in 0..5 {
            let e = append(&mut ledger, 0, "x");
            assert_eq!(e.entry_id, i);
        }
    }

    #[test]
    fn tampering_breaks_verification() {
        let mut ledger = Ledger::new();
        append(&mut ledger, 0, "a");
        append(&mut ledger, 0, "b");
        // simulate tampering by mutating a stored field directly
        ledger.entries[0].action = "tampered".to_string();
        assert!(!ledger.verify_integrity());
    }

    #[test]
    fn hash_is_deterministic_given_same_clock() {
        let mut a = Ledger::new();
        let mut b = Ledger::new();
        let ea = append(&mut a, 7, "speak:hi");
        let eb = append(&mut b, 7, "speak:hi");
        assert_eq!(ea.entry_hash, eb.entry_hash);
    }
}
