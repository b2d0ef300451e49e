//! C2: Per-speaker key→value partitions (spec.md §4.2).
//!
//! There is no operation that writes to `owner_id` where `owner_id !=
//! caller_id` — that is enforced here at the narrowest possible point, and
//! the kernel facade additionally logs the rejection (spec.md §4.2
//! "Crucial property").

use std::collections::BTreeMap;

use crate::value::Value;

#[derive(Default)]
struct Partition {
    vars: BTreeMap<String, Value>,
}

#[derive(Default)]
pub struct Memory {
    partitions: BTreeMap<u64, Partition>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_partition(&mut self, speaker_id: u64) {
        self.partitions.entry(speaker_id).or_default();
    }

    pub fn read(&self, owner_id: u64, var: &str) -> Option<Value> {
        self.partitions.get(&owner_id)?.vars.get(var).cloned()
    }

    /// Succeeds only if `caller_id == owner_id` and the caller's partition
    /// exists. Returns `(success, old_value)`.
    pub fn write(
        &mut self,
        caller_id: u64,
        owner_id: u64,
        var: &str,
        value: Value,
    ) -> (bool, Option<Value>) {
        if caller_id != owner_id {
            return (false, None);
        }
        let Some(partition) = self.partitions.get_mut(&caller_id) else {
            return (false, None);
        };
        let old = partition.vars.insert(var.to_string(), value);
        (true, old)
    }

    pub fn list_vars(&self, owner_id: u64) -> Vec<String> {
        self.partitions
            .get(&owner_id)
            .map(|p| p.vars.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_requires_matching_caller_and_owner() {
        let mut mem = Memory::new();
        mem.create_partition(1);
        let (ok, _) = mem.write(2, 1, "v", Value::Int(1));
        assert!(!ok);
        assert_eq!(mem.read(1, "v"), None);
    }

    #[test]
    fn owner_write_then_read() {
        let mut mem = Memory::new();
        mem.create_partition(1);
        let (ok, old) = mem.write(1, 1, "v", Value::Int(1));
        assert!(ok);
        assert_eq!(old, None);
        assert_eq!(mem.read(1, "v"), Some(Value::Int(1)));
    }

    #[test]
    fn write_without_partition_fails() {
        let mut mem = Memory::new();
        let (ok, _) = mem.write(1, 1, "v", Value::Int(1));
        assert!(!ok);
    }

    #[test]
    fn create_partition_is_idempotent() {
        let mut mem = Memory::new();
        mem.create_partition(1);
        mem.write(1, 1, "v", Value::Int(5));
        mem.create_partition(1);
        assert_eq!(mem.read(1, "v"), Some(Value::Int(5)));
    }

    #[test]
    fn list_vars_is_ordered() {
        let mut mem = Memory::new();
        mem.create_partition(1);
        mem.write(1, 1, "b", Value::Int(1));
        mem.write(1, 1, "a", Value::Int(2));
        assert_eq!(mem.list_vars(1), vec!["a".to_string(), "b".to_string()]);
    }
}
