//! C5: Core rule-based mapping of `(speaker, condition, action)` to
//! `{active, inactive, broken}` (spec.md §4.5), plus loop-bound enforcement
//! and supersession.
//!
//! Condition and action bodies live in Logica AST, walked by the runtime
//! (`crate::runtime`), not inside the kernel — a single-threaded
//! tree-walker can't hold `&mut Kernel` twice at once (once for the
//! evaluate call, once inside a reentrant closure). So `evaluate()` from
//! spec.md §4.5 is modeled here as a three-step protocol the runtime
//! drives: [`Evaluator::begin`] (authentication / version / expiry gate),
//! [`Evaluator::apply_condition`] (the `cond_met` branch), and
//! [`Evaluator::finish`] (the `fulfilled` branch, including refusal
//! inversion). This is the "AST references bound to an environment"
//! deferred-evaluation mechanism spec.md §9 explicitly allows.

use crate::kernel::ledger::{Ledger, NewEntry, Operation};
use crate::kernel::registry::Registry;
use crate::value::Status;

pub const DEFAULT_LOOP_BOUND: u32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Current,
    Superseded,
    Expired,
}

#[derive(Debug, Clone)]
pub struct Expression {
    pub id: u64,
    pub speaker_id: u64,
    pub condition_label: Option<String>,
    pub action_label: String,
    pub created_at: u64,
    pub version: Version,
    pub final_status: Option<Status>,
    pub scope_until: Option<u64>,
    pub is_refusal: bool,
    pub loop_bound: Option<u32>,
}

/// Outcome of the authentication / version / expiry gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Kernel has already logged a `broken` entry; evaluation is over.
    SpeakerRejected,
    /// `version != current` (already superseded or expired elsewhere); no
    /// ledger entry is produced for this call.
    NotCurrent,
    /// Proceed: the runtime should evaluate the condition expression (or
    /// treat it as vacuously true if the expression has none) and call
    /// [`Evaluator::apply_condition`].
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CondGate {
    /// Kernel has logged `inactive`; evaluation is over.
    Inactive,
    /// Proceed: the runtime should run the action body and call
    /// [`Evaluator::finish`].
    Proceed,
}

#[derive(Default)]
pub struct Evaluator {
    expressions: Vec<Expression>,
    next_id: u64,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: u64) -> Option<&Expression> {
        self.expressions.iter().find(|e| e.id == id)
    }

    fn index_of(&self, id: u64) -> usize {
        self.expressions.iter().position(|e| e.id == id).unwrap()
    }

    /// Creates a new expression, superseding any prior `current` one from
    /// the same speaker with the same `(condition_label, action_label)`
    /// (spec.md §4.5 "Supersession").
    #[allow(clippy::too_many_arguments)]
    pub fn submit(
        &mut self,
        ledger: &mut Ledger,
        speaker_id: u64,
        condition_label: Option<String>,
        action_label: String,
        is_refusal: bool,
        scope_until: Option<u64>,
        loop_bound: Option<u32>,
        created_at: u64,
    ) -> u64 {
        if let Some(prior) = self.expressions.iter_mut().find(|e| {
            e.speaker_id == speaker_id
                && e.version == Version::Current
                && e.condition_label == condition_label
                && e.action_label == action_label
        }) {
            prior.version = Version::Superseded;
            let prior_id = prior.id;
            ledger.append(NewEntry {
                speaker_id,
                operation: Operation::Supersede,
                action: format!("supersede:{prior_id}->new"),
                condition: condition_label.clone(),
                condition_result: None,
                status: Status::Inactive,
                state_before: Some("current".to_string()),
                state_after: Some("superseded".to_string()),
                break_reason: None,
            });
        }

        let id = self.next_id;
        self.next_id += 1;
        self.expressions.push(Expression {
            id,
            speaker_id,
            condition_label,
            action_label,
            created_at,
            version: Version::Current,
            final_status: None,
            scope_until,
            is_refusal,
            loop_bound,
        });
        id
    }

    /// Authentication / version / expiry gate.
    pub fn begin(&mut self, ledger: &mut Ledger, registry: &Registry, now: u64, id: u64) -> Gate {
        let idx = self.index_of(id);
        let speaker_id = self.expressions[idx].speaker_id;

        if !registry.authenticate(speaker_id) {
            ledger.append(NewEntry {
                speaker_id,
                operation: Operation::Evaluate,
                action: self.expressions[idx].action_label.clone(),
                condition: self.expressions[idx].condition_label.clone(),
                condition_result: None,
                status: Status::Broken,
                state_before: None,
                state_after: None,
                break_reason: Some("speaker not found or suspended".to_string()),
            });
            return Gate::SpeakerRejected;
        }

        if self.expressions[idx].version != Version::Current {
            return Gate::NotCurrent;
        }

        if let Some(scope_until) = self.expressions[idx].scope_until {
            if now > scope_until {
                self.expressions[idx].version = Version::Expired;
                return Gate::NotCurrent;
            }
        }

        Gate::Ready
    }

    pub fn apply_condition(
        &mut self,
        ledger: &mut Ledger,
        id: u64,
        cond_met: bool,
    ) -> CondGate {
        let idx = self.index_of(id);
        if cond_met {
            return CondGate::Proceed;
        }
        let speaker_id = self.expressions[idx].speaker_id;
        ledger.append(NewEntry {
            speaker_id,
            operation: Operation::Evaluate,
            action: self.expressions[idx].action_label.clone(),
            condition: self.expressions[idx].condition_label.clone(),
            condition_result: Some(false),
            status: Status::Inactive,
            state_before: None,
            state_after: None,
            break_reason: None,
        });
        CondGate::Inactive
    }

    /// `fulfilled` is the action's result (or `true` for an action-less
    /// expression); `is_refusal` inverts it per spec.md §4.5.
    pub fn finish(&mut self, ledger: &mut Ledger, id: u64, fulfilled: bool) -> Status {
        let idx = self.index_of(id);
        let effective = if self.expressions[idx].is_refusal {
            !fulfilled
        } else {
            fulfilled
        };
        let status = if effective {
            Status::Active
        } else {
            Status::Broken
        };
        self.expressions[idx].final_status = Some(status);
        let speaker_id = self.expressions[idx].speaker_id;
        ledger.append(NewEntry {
            speaker_id,
            operation: Operation::Evaluate,
            action: self.expressions[idx].action_label.clone(),
            condition: self.expressions[idx].condition_label.clone(),
            condition_result: Some(true),
            status,
            state_before: None,
            state_after: None,
            break_reason: if status == Status::Broken {
                Some(format!("action '{}' unfulfilled", self.expressions[idx].action_label))
            } else {
                None
            },
        });
        status
    }

    pub fn expression_status(&self, id: u64) -> Option<Status> {
        self.get(id).and_then(|e| e.final_status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::registry::Registry;

    fn setup() -> (Evaluator, Ledger, Registry, u64) {
        let mut registry = Registry::new();
        let speaker = registry.create("s", 0).unwrap();
        (Evaluator::new(), Ledger::new(), registry, speaker.id)
    }

    #[test]
    fn full_success_path_logs_active() {
        let (mut ev, mut ledger, registry, sid) = setup();
        let id = ev.submit(&mut ledger, sid, Some("c".into()), "a".into(), false, None, None, 0);
        assert_eq!(ev.begin(&mut ledger, &registry, 0, id), Gate::Ready);
        assert_eq!(ev.apply_condition(&mut ledger, id, true), CondGate::Proceed);
        assert_eq!(ev.finish(&mut ledger, id, true), Status::Active);
    }

    #[test]
    fn condition_false_yields_inactive() {
        let (mut ev, mut ledger, registry, sid) = setup();
        let id = ev.submit(&mut ledger, sid, Some("c".into()), "a".into(), false, None, None, 0);
        ev.begin(&mut ledger, &registry, 0, id);
        assert_eq!(ev.apply_condition(&mut ledger, id, false), CondGate::Inactive);
    }

    #[test]
    fn refusal_inverts_fulfillment() {
        let (mut ev, mut ledger, registry, sid) = setup();
        let id = ev.submit(&mut ledger, sid, None, "a".into(), true, None, None, 0);
        ev.begin(&mut ledger, &registry, 0, id);
        ev.apply_condition(&mut ledger, id, true);
        assert_eq!(ev.finish(&mut ledger, id, true), Status::Broken);
        let id2 = ev.submit(&mut ledger, sid, None, "b".into(), true, None, None, 0);
        ev.begin(&mut ledger, &registry, 0, id2);
        ev.apply_condition(&mut ledger, id2, true);
        assert_eq!(ev.finish(&mut ledger, id2, false), Status::Active);
    }

    #[test]
    fn supersession_marks_prior_superseded() {
        let (mut ev, mut ledger, _registry, sid) = setup();
        let first = ev.submit(&mut ledger, sid, Some("c".into()), "a".into(), false, None, None, 0);
        let _second = ev.submit(&mut ledger, sid, Some("c".into()), "a".into(), false, None, None, 1);
        assert_eq!(ev.get(first).unwrap().version, Version::Superseded);
    }

    #[test]
    fn suspended_speaker_is_rejected() {
        let (mut ev, mut ledger, mut registry, sid) = setup();
        let id = ev.submit(&mut ledger, sid, None, "a".into(), false, None, None, 0);
        registry.suspend(sid);
        assert_eq!(ev.begin(&mut ledger, &registry, 0, id), Gate::SpeakerRejected);
    }

    #[test]
    fn expiry_transitions_to_not_current() {
        let (mut ev, mut ledger, registry, sid) = setup();
        let id = ev.submit(&mut ledger, sid, None, "a".into(), false, Some(5), None, 0);
        assert_eq!(ev.begin(&mut ledger, &registry, 10, id), Gate::NotCurrent);
        assert_eq!(ev.get(id).unwrap().version, Version::Expired);
    }
}
