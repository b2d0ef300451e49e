//! The Mary kernel: speaker registry (C3), speaker-partitioned memory (C2),
//! the append-only hash-chained ledger (C1), the FIFO request bus (C4), the
//! three-valued evaluator (C5), and the facade that ties them together
//! (C6). See spec.md §4.1-§4.6.

pub mod bus;
pub mod evaluator;
pub mod ledger;
pub mod mary;
pub mod memory;
pub mod registry;

pub use mary::{KernelState, Mary};
