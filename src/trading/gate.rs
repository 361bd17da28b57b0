// src/trading/gate.rs
//
// Bounded registry of mints with an in-flight lifecycle. A slot is acquired
// when a mint event is accepted and released exactly once when that
// lifecycle terminates, on every exit path, via the guard's Drop.

use solana_sdk::pubkey::Pubkey;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRejection {
    /// The configured concurrent-token cap is reached.
    AtCapacity,
    /// A lifecycle for this mint is already running.
    AlreadyTracked,
}

#[derive(Debug)]
pub struct ConcurrencyGate {
    active: Mutex<HashSet<Pubkey>>,
    capacity: usize,
}

impl ConcurrencyGate {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            active: Mutex::new(HashSet::new()),
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().expect("gate lock poisoned").len()
    }

    pub fn is_full(&self) -> bool {
        self.active_count() >= self.capacity
    }

    /// Claim a slot for a mint. The returned guard releases the slot when
    /// dropped, so the release cannot be forgotten on an error path.
    pub fn try_acquire(self: &Arc<Self>, mint: Pubkey) -> Result<SlotGuard, GateRejection> {
        let mut active = self.active.lock().expect("gate lock poisoned");
        if active.len() >= self.capacity {
            return Err(GateRejection::AtCapacity);
        }
        if !active.insert(mint) {
            return Err(GateRejection::AlreadyTracked);
        }
        info!("Active tokens: {}/{}", active.len(), self.capacity);
        Ok(SlotGuard {
            gate: Arc::clone(self),
            mint,
        })
    }

    fn release(&self, mint: &Pubkey) {
        let mut active = self.active.lock().expect("gate lock poisoned");
        active.remove(mint);
        info!(
            "Removed token {}, active tokens: {}/{}",
            mint,
            active.len(),
            self.capacity
        );
    }
}

/// RAII slot handle. Moves into the lifecycle task that owns the mint.
#[derive(Debug)]
pub struct SlotGuard {
    gate: Arc<ConcurrencyGate>,
    mint: Pubkey,
}

impl SlotGuard {
    pub fn mint(&self) -> &Pubkey {
        &self.mint
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.gate.release(&self.mint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_is_enforced() {
        let gate = ConcurrencyGate::new(2);
        let _a = gate.try_acquire(Pubkey::new_unique()).unwrap();
        let _b = gate.try_acquire(Pubkey::new_unique()).unwrap();
        assert_eq!(gate.active_count(), 2);
        assert!(gate.is_full());

        let rejected = gate.try_acquire(Pubkey::new_unique());
        assert_eq!(rejected.unwrap_err(), GateRejection::AtCapacity);
        assert_eq!(gate.active_count(), 2);
    }

    #[test]
    fn test_duplicate_mint_is_rejected() {
        let gate = ConcurrencyGate::new(4);
        let mint = Pubkey::new_unique();
        let _slot = gate.try_acquire(mint).unwrap();

        assert_eq!(gate.try_acquire(mint).unwrap_err(), GateRejection::AlreadyTracked);
        assert_eq!(gate.active_count(), 1);
    }

    #[test]
    fn test_drop_releases_exactly_once() {
        let gate = ConcurrencyGate::new(1);
        let mint = Pubkey::new_unique();

        let slot = gate.try_acquire(mint).unwrap();
        assert!(gate.is_full());
        drop(slot);
        assert_eq!(gate.active_count(), 0);

        // Slot can be re-acquired after release
        let _again = gate.try_acquire(mint).unwrap();
        assert_eq!(gate.active_count(), 1);
    }

    #[test]
    fn test_release_on_error_path() {
        let gate = ConcurrencyGate::new(1);
        let mint = Pubkey::new_unique();

        let result: Result<(), &str> = (|| {
            let _slot = gate.try_acquire(mint).unwrap();
            Err("lifecycle blew up")
        })();

        assert!(result.is_err());
        // Guard dropped by unwinding out of the closure scope
        assert_eq!(gate.active_count(), 0);
    }
}
