//! C6: The Mary kernel facade (spec.md §4.6) — the single entry point that
//! authenticates callers, routes to ledger/memory/registry/bus/evaluator,
//! and guarantees every operation produces a ledger entry.

use log::{debug, warn};

use crate::error::RuntimeError;
use crate::kernel::bus::{Request, RequestBus, RequestStatus};
use crate::kernel::evaluator::{CondGate, Evaluator, Gate};
use crate::kernel::ledger::{Entry, Ledger, NewEntry, Operation};
use crate::kernel::memory::Memory;
use crate::kernel::registry::{Registry, Speaker, ROOT_ID, ROOT_NAME};
use crate::value::{Status, Value};

pub struct Mary {
    registry: Registry,
    memory: Memory,
    ledger: Ledger,
    bus: RequestBus,
    evaluator: Evaluator,
    clock: u64,
}

impl Mary {
    /// Mints root (id 0, name `root`) and appends the `boot` ledger entry
    /// before any other operation (spec.md §4.3 "Root"; this expansion's
    /// `Operation::Boot`, see SPEC_FULL.md §4.14).
    pub fn boot() -> Self {
        let mut kernel = Mary {
            registry: Registry::new(),
            memory: Memory::new(),
            ledger: Ledger::new(),
            bus: RequestBus::new(),
            evaluator: Evaluator::new(),
            clock: 0,
        };
        let root = kernel.registry.create(ROOT_NAME, 0).expect("root is first");
        debug_assert_eq!(root.id, ROOT_ID);
        kernel.memory.create_partition(root.id);
        kernel.ledger.append(NewEntry {
            speaker_id: root.id,
            operation: Operation::Boot,
            action: "boot".to_string(),
            condition: None,
            condition_result: None,
            status: Status::Active,
            state_before: None,
            state_after: None,
            break_reason: None,
        });
        kernel
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    pub fn now(&self) -> u64 {
        self.clock
    }

    // ---- C3 speaker registry ----

    pub fn create_speaker(&mut self, creator_id: u64, name: &str) -> Result<Speaker, RuntimeError> {
        if !self.registry.authenticate(creator_id) {
            return Err(self.reject(creator_id, Operation::CreateSpeaker, name, "creator is not an authenticated speaker"));
        }
        let now = self.tick();
        match self.registry.create(name, now) {
            Ok(speaker) => {
                self.memory.create_partition(speaker.id);
                debug!("kernel: create_speaker '{name}' -> id {} (by {creator_id})", speaker.id);
                self.ledger.append(NewEntry {
                    speaker_id: creator_id,
                    operation: Operation::CreateSpeaker,
                    action: format!("create_speaker:{name}"),
                    condition: None,
                    condition_result: None,
                    status: Status::Active,
                    state_before: None,
                    state_after: Some(format!("id={}", speaker.id)),
                    break_reason: None,
                });
                Ok(speaker)
            }
            Err(message) => Err(self.reject(creator_id, Operation::CreateSpeaker, name, &message)),
        }
    }

    /// Root only (spec.md §4.3).
    pub fn suspend_speaker(&mut self, caller_id: u64, target_id: u64) -> Result<(), RuntimeError> {
        if caller_id != ROOT_ID {
            return Err(self.reject(
                caller_id,
                Operation::SuspendSpeaker,
                &target_id.to_string(),
                "only root may suspend a speaker",
            ));
        }
        if !self.registry.suspend(target_id) {
            return Err(self.reject(
                caller_id,
                Operation::SuspendSpeaker,
                &target_id.to_string(),
                "target speaker not found",
            ));
        }
        warn!("kernel: speaker {target_id} suspended by root");
        self.ledger.append(NewEntry {
            speaker_id: caller_id,
            operation: Operation::SuspendSpeaker,
            action: format!("suspend_speaker:{target_id}"),
            condition: None,
            condition_result: None,
            status: Status::Active,
            state_before: Some("alive".to_string()),
            state_after: Some("suspended".to_string()),
            break_reason: None,
        });
        Ok(())
    }

    pub fn list_speakers(&self) -> Vec<&Speaker> {
        self.registry.list_all()
    }

    pub fn speaker_by_name(&self, name: &str) -> Option<&Speaker> {
        self.registry.get_by_name(name)
    }

    pub fn speaker(&self, id: u64) -> Option<&Speaker> {
        self.registry.get(id)
    }

    /// Logs the runtime entering an `as SPEAKER { }` block (spec.md §8
    /// scenario 1's `set_speaker` entry; compiler's `OpKind::SetSpeaker`
    /// names the same concept at the compiled-operation level). A
    /// suspended or unknown speaker still gets a `broken` entry rather
    /// than silently failing, since every kernel call must produce one
    /// (spec.md §4.6).
    pub fn set_speaker(&mut self, speaker_id: u64) -> Result<(), RuntimeError> {
        if !self.registry.authenticate(speaker_id) {
            return Err(self.reject(
                speaker_id,
                Operation::SetSpeaker,
                &format!("set_speaker:{speaker_id}"),
                "speaker not found or suspended",
            ));
        }
        let name = self.registry.get(speaker_id).map(|s| s.name.clone()).unwrap_or_default();
        debug!("kernel: set_speaker -> {name} (id {speaker_id})");
        self.ledger.append(NewEntry {
            speaker_id,
            operation: Operation::SetSpeaker,
            action: format!("set_speaker:{name}"),
            condition: None,
            condition_result: None,
            status: Status::Active,
            state_before: None,
            state_after: None,
            break_reason: None,
        });
        Ok(())
    }

    fn reject(&mut self, speaker_id: u64, op: Operation, action: &str, reason: &str) -> RuntimeError {
        warn!("kernel: rejected {op} by {speaker_id} ({reason})");
        self.ledger.append(NewEntry {
            speaker_id,
            operation: op,
            action: action.to_string(),
            condition: None,
            condition_result: None,
            status: Status::Broken,
            state_before: None,
            state_after: None,
            break_reason: Some(reason.to_string()),
        });
        RuntimeError::new(
            self.registry.get(speaker_id).map(|s| s.name.clone()),
            reason.to_string(),
        )
    }

    // ---- C2 memory ----

    pub fn read(&self, owner_id: u64, var: &str) -> Option<Value> {
        self.memory.read(owner_id, var)
    }

    /// Ordinary same-speaker write (spec.md §4.2, invariant 3: exactly one
    /// `write` ledger entry precedes every partition state change).
    pub fn write(&mut self, caller_id: u64, var: &str, value: Value) -> Result<(), RuntimeError> {
        let (ok, old) = self.memory.write(caller_id, caller_id, var, value.clone());
        if !ok {
            return Err(self.reject(caller_id, Operation::Write, var, "partition does not exist"));
        }
        debug!("kernel: write {caller_id}.{var} = {value}");
        self.ledger.append(NewEntry {
            speaker_id: caller_id,
            operation: Operation::Write,
            action: format!("write:{var}"),
            condition: None,
            condition_result: None,
            status: Status::Active,
            state_before: old.map(|v| v.to_string()),
            state_after: Some(value.to_string()),
            break_reason: None,
        });
        Ok(())
    }

    /// The cross-speaker attempt path (spec.md §4.2, §4.6 `write_to`):
    /// always rejects and logs, never touches memory.
    pub fn write_to(
        &mut self,
        caller_id: u64,
        owner_id: u64,
        var: &str,
        _value: Value,
    ) -> RuntimeError {
        warn!("kernel: write_violation, {caller_id} attempted to write {owner_id}.{var}");
        self.ledger.append(NewEntry {
            speaker_id: caller_id,
            operation: Operation::WriteViolation,
            action: format!("write:{owner_id}.{var}"),
            condition: None,
            condition_result: None,
            status: Status::Broken,
            state_before: None,
            state_after: None,
            break_reason: Some(format!(
                "speaker {caller_id} cannot write speaker {owner_id}'s partition"
            )),
        });
        RuntimeError::new(
            self.registry.get(caller_id).map(|s| s.name.clone()),
            format!("cannot write to another speaker's variable '{var}'"),
        )
    }

    pub fn list_vars(&self, owner_id: u64) -> Vec<String> {
        self.memory.list_vars(owner_id)
    }

    // ---- C5 evaluator ----

    /// Full `evaluate()` pseudocode (spec.md §4.5) for a non-loop
    /// expression. `cond_met` is computed by the runtime from the AST
    /// before this call (so the kernel never re-enters the interpreter);
    /// `action` runs only if the gates and condition allow it and itself
    /// receives `&mut Mary` to perform further kernel calls (writes,
    /// nested requests, …).
    #[allow(clippy::too_many_arguments)]
    pub fn submit(
        &mut self,
        speaker_id: u64,
        condition_label: Option<String>,
        action_label: String,
        cond_met: bool,
        is_refusal: bool,
        scope_until: Option<u64>,
        action: impl FnOnce(&mut Mary) -> bool,
    ) -> Status {
        let now = self.tick();
        let id = self.evaluator.submit(
            &mut self.ledger,
            speaker_id,
            condition_label,
            action_label,
            is_refusal,
            scope_until,
            None,
            now,
        );
        match self.evaluator.begin(&mut self.ledger, &self.registry, now, id) {
            Gate::SpeakerRejected => return Status::Broken,
            Gate::NotCurrent => return Status::Inactive,
            Gate::Ready => {}
        }
        match self.evaluator.apply_condition(&mut self.ledger, id, cond_met) {
            CondGate::Inactive => return Status::Inactive,
            CondGate::Proceed => {}
        }
        let fulfilled = action(self);
        self.evaluator.finish(&mut self.ledger, id, fulfilled)
    }

    /// Loop evaluation (spec.md §4.5 "Loop evaluation"). `predicate` is the
    /// `while COND` test; `action` is the loop body. Both receive `&mut
    /// Mary` per call, never held across calls.
    pub fn submit_loop(
        &mut self,
        speaker_id: u64,
        action_label: String,
        bound: u32,
        mut predicate: impl FnMut(&mut Mary) -> bool,
        mut action: impl FnMut(&mut Mary) -> bool,
    ) -> (Status, u32) {
        let now = self.tick();
        let id = self.evaluator.submit(
            &mut self.ledger,
            speaker_id,
            None,
            action_label.clone(),
            false,
            None,
            Some(bound),
            now,
        );
        let mut count = 0u32;
        while count < bound {
            if !predicate(self) {
                self.ledger.append(NewEntry {
                    speaker_id,
                    operation: Operation::LoopEnd,
                    action: format!("{action_label}:iterations={count}"),
                    condition: None,
                    condition_result: Some(false),
                    status: Status::Inactive,
                    state_before: None,
                    state_after: None,
                    break_reason: None,
                });
                return (Status::Inactive, count);
            }
            let now = self.tick();
            match self.evaluator.begin(&mut self.ledger, &self.registry, now, id) {
                Gate::SpeakerRejected => return (Status::Broken, count),
                Gate::NotCurrent => return (Status::Inactive, count),
                Gate::Ready => {}
            }
            self.evaluator.apply_condition(&mut self.ledger, id, true);
            let fulfilled = action(self);
            let status = self.evaluator.finish(&mut self.ledger, id, fulfilled);
            self.ledger.append(NewEntry {
                speaker_id,
                operation: Operation::LoopIteration,
                action: format!("{action_label}:iteration={count}"),
                condition: None,
                condition_result: Some(true),
                status,
                state_before: None,
                state_after: None,
                break_reason: None,
            });
            count += 1;
            if matches!(status, Status::Broken | Status::Inactive) {
                return (status, count);
            }
        }
        self.ledger.append(NewEntry {
            speaker_id,
            operation: Operation::LoopBoundExceeded,
            action: format!("{action_label}:max={bound}"),
            condition: None,
            condition_result: None,
            status: Status::Broken,
            state_before: None,
            state_after: None,
            break_reason: Some(format!("loop exceeded max {bound} iterations")),
        });
        (Status::Broken, count)
    }

    pub fn expression_status(&self, id: u64) -> Option<Status> {
        self.evaluator.expression_status(id)
    }

    // ---- C4 request bus ----

    pub fn request(
        &mut self,
        from: u64,
        to: u64,
        action: &str,
        payload: Option<Value>,
    ) -> Request {
        let now = self.tick();
        let request = self.bus.create_request(from, to, action, payload, now, None);
        self.ledger.append(NewEntry {
            speaker_id: from,
            operation: Operation::Request,
            action: format!("request:{to}:{action}"),
            condition: None,
            condition_result: None,
            status: Status::Active,
            state_before: None,
            state_after: Some("pending".to_string()),
            break_reason: None,
        });
        request
    }

    pub fn respond(
        &mut self,
        request_id: u64,
        responder_id: u64,
        accept: bool,
        data: Option<Value>,
    ) -> Result<Request, RuntimeError> {
        match self.bus.respond(request_id, responder_id, accept, data) {
            Some(request) => {
                self.ledger.append(NewEntry {
                    speaker_id: responder_id,
                    operation: Operation::Respond,
                    action: format!(
                        "respond:{request_id}:{}",
                        if accept { "accept" } else { "refuse" }
                    ),
                    condition: None,
                    condition_result: None,
                    status: Status::Active,
                    state_before: Some("pending".to_string()),
                    state_after: Some(if accept { "accepted" } else { "refused" }.to_string()),
                    break_reason: None,
                });
                Ok(request)
            }
            None => Err(self.reject(
                responder_id,
                Operation::Respond,
                &request_id.to_string(),
                "no such pending request for this speaker",
            )),
        }
    }

    pub fn pending_requests(&self, speaker_id: u64) -> Vec<Request> {
        self.bus.get_pending_for(speaker_id)
    }

    pub fn check_timeouts(&mut self) -> Vec<Request> {
        let now = self.tick();
        let expired = self.bus.check_timeouts(now);
        for request in &expired {
            self.ledger.append(NewEntry {
                speaker_id: request.from_speaker,
                operation: Operation::RequestTimeout,
                action: format!("request_timeout:{}", request.id),
                condition: None,
                condition_result: None,
                status: Status::Inactive,
                state_before: Some("pending".to_string()),
                state_after: Some("expired".to_string()),
                break_reason: None,
            });
        }
        expired
    }

    // ---- C1 ledger ----

    pub fn ledger_read(&self, from_id: u64, to_id: u64) -> Vec<&Entry> {
        self.ledger.read(from_id, to_id)
    }

    pub fn ledger_last(&self, n: usize) -> Vec<&Entry> {
        self.ledger.last(n)
    }

    pub fn ledger_search(&self, speaker_id: Option<u64>, status: Option<Status>) -> Vec<&Entry> {
        self.ledger
            .search(|e| {
                speaker_id.map(|s| e.speaker_id == s).unwrap_or(true)
                    && status.map(|s| e.status == s).unwrap_or(true)
            })
    }

    pub fn ledger_count(&self) -> usize {
        self.ledger.count()
    }

    pub fn ledger_verify(&self) -> bool {
        self.ledger.verify_integrity()
    }

    /// `#ID [STATUS] SPEAKER: ACTION` (spec.md §6 "Ledger entry
    /// serialization") with the speaker's name resolved from the registry
    /// rather than `Entry::Display`'s bare id, for embedders (the `history`
    /// / `ledger` statements) that have a kernel handy to resolve it.
    pub fn render_entry(&self, entry: &Entry) -> String {
        let speaker = self
            .registry
            .get(entry.speaker_id)
            .map(|s| s.name.as_str())
            .unwrap_or("?");
        let mut line = format!("#{} [{}] {}: {}", entry.entry_id, entry.status, speaker, entry.action);
        if let Some(reason) = &entry.break_reason {
            line.push_str(&format!(" (breakReason: {reason})"));
        }
        if let Some(before) = &entry.state_before {
            line.push_str(&format!(" (state_before: {before})"));
        }
        if let Some(after) = &entry.state_after {
            line.push_str(&format!(" (state_after: {after})"));
        }
        line
    }

    // ---- inspection ----

    pub fn inspect_speaker(&self, id: u64) -> Option<&Speaker> {
        self.speaker(id)
    }

    pub fn inspect_variable(&self, owner_id: u64, var: &str) -> Option<Value> {
        self.read(owner_id, var)
    }

    pub fn state(&self) -> KernelState<'_> {
        KernelState {
            speakers: self.registry.list_all(),
            ledger_count: self.ledger.count(),
            ledger_verified: self.ledger.verify_integrity(),
        }
    }

    /// Seal a variable key against further writes (spec.md §4.11 "Seal
    /// semantics (runtime)"). Modeled as a kernel-level set so the runtime
    /// doesn't need its own copy that could drift from what's logged.
    pub fn seal(&mut self, speaker_id: u64, key: &str) {
        self.ledger.append(NewEntry {
            speaker_id,
            operation: Operation::Seal,
            action: format!("seal:{key}"),
            condition: None,
            condition_result: None,
            status: Status::Active,
            state_before: None,
            state_after: None,
            break_reason: None,
        });
    }

    pub fn log_write_rejected_sealed(&mut self, speaker_id: u64, key: &str) -> RuntimeError {
        self.ledger.append(NewEntry {
            speaker_id,
            operation: Operation::WriteViolation,
            action: format!("write:{key}"),
            condition: None,
            condition_result: None,
            status: Status::Broken,
            state_before: None,
            state_after: None,
            break_reason: Some(format!("'{key}' is sealed")),
        });
        RuntimeError::new(
            self.registry.get(speaker_id).map(|s| s.name.clone()),
            format!("cannot write sealed variable '{key}'"),
        )
    }

    pub fn log_fail(&mut self, speaker_id: u64, reason: &str) -> RuntimeError {
        self.log_runtime_error(speaker_id, "fail", reason)
    }

    /// General-purpose runtime-error logger (spec.md §7: "Every runtime
    /// error is preceded by a broken ledger entry with a break_reason").
    /// Every `RuntimeError` the runtime constructs — division by zero, an
    /// undefined identifier, a missing request target, and so on — is
    /// expected to route through here rather than being built bare.
    pub fn log_runtime_error(&mut self, speaker_id: u64, action: &str, reason: &str) -> RuntimeError {
        warn!("kernel: runtime error for {speaker_id} during '{action}': {reason}");
        self.ledger.append(NewEntry {
            speaker_id,
            operation: Operation::Evaluate,
            action: action.to_string(),
            condition: None,
            condition_result: None,
            status: Status::Broken,
            state_before: None,
            state_after: None,
            break_reason: Some(reason.to_string()),
        });
        RuntimeError::new(self.registry.get(speaker_id).map(|s| s.name.clone()), reason.to_string())
    }
}

pub struct KernelState<'a> {
    pub speakers: Vec<&'a Speaker>,
    pub ledger_count: usize,
    pub ledger_verified: bool,
}
