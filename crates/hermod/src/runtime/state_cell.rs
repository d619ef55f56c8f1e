// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Atomic state cell with set-if-equals semantics.
//!
//! This is the only piece of lock-free shared state in the crate. The
//! periodic-task state machine is built entirely on
//! [`StateCell::set_if_equals`]; no operation on the cell ever blocks.

use std::sync::atomic::{AtomicU8, Ordering};

/// A small integer cell updated only through compare-and-set.
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    /// Create a cell holding `initial`.
    #[must_use]
    pub const fn new(initial: u8) -> Self {
        Self(AtomicU8::new(initial))
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> u8 {
        self.0.load(Ordering::SeqCst)
    }

    /// Unconditional store. Reserved for construction-time resets;
    /// running state machines must go through `set_if_equals`.
    pub fn set(&self, value: u8) {
        self.0.store(value, Ordering::SeqCst);
    }

    /// Atomically replace `from` with `to`. Returns true if the swap
    /// happened, false if the cell held some other value.
    pub fn set_if_equals(&self, from: u8, to: u8) -> bool {
        self.0
            .compare_exchange(from, to, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_if_equals_swaps_on_match() {
        let cell = StateCell::new(1);
        assert!(cell.set_if_equals(1, 2));
        assert_eq!(cell.get(), 2);
    }

    #[test]
    fn set_if_equals_rejects_on_mismatch() {
        let cell = StateCell::new(1);
        assert!(!cell.set_if_equals(3, 4));
        assert_eq!(cell.get(), 1);
    }

    #[test]
    fn same_to_same_observes_value() {
        let cell = StateCell::new(7);
        assert!(cell.set_if_equals(7, 7));
        assert!(!cell.set_if_equals(8, 8));
    }

    #[test]
    fn concurrent_cas_single_winner() {
        use std::sync::Arc;

        let cell = Arc::new(StateCell::new(0));
        let handles: Vec<_> = (1..=8u8)
            .map(|i| {
                let cell = Arc::clone(&cell);
                std::thread::spawn(move || cell.set_if_equals(0, i))
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().expect("cas thread panicked"))
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert_ne!(cell.get(), 0);
    }
}
