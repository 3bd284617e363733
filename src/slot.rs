// src/slot.rs
// This module manages the pool of player slots on the mingo card server.
// A slot is a numbered seat a browser session occupies; slot N is dealt card N.

use std::collections::{BTreeSet, HashSet};

use crate::defs::SlotId;

/// Why a slot operation was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotError {
    /// The inactive pool is empty, no seat can be assigned.
    NoSlotsAvailable,
    /// The slot id is outside the pool or not usable by the caller.
    InvalidSlot(SlotId),
}

impl std::fmt::Display for SlotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlotError::NoSlotsAvailable => write!(f, "all player slots are taken"),
            SlotError::InvalidSlot(id) => write!(f, "slot {id} is not valid"),
        }
    }
}

impl std::error::Error for SlotError {}

/// Registry of player slots. Every slot id is in exactly one of the
/// active/inactive sets; their union is always the full pool. All
/// multi-field transitions happen inside one method call so the whole
/// registry can sit behind a single mutex.
#[derive(Debug, Clone)]
pub struct SlotRegistry {
    pool_size: usize,
    active: HashSet<SlotId>,
    // BTreeSet so "lowest-numbered inactive slot" is just the first element.
    inactive: BTreeSet<SlotId>,
    // One-shot flag telling the browser to discard its cached tap state.
    reset_board: Vec<bool>,
    // Set by sign-off; the next card fetch for the slot is rejected.
    invalidated: Vec<bool>,
}

impl SlotRegistry {
    pub fn new(pool_size: usize) -> Self {
        Self {
            pool_size,
            active: HashSet::new(),
            inactive: (0..pool_size).collect(),
            reset_board: vec![false; pool_size],
            // A slot that was never activated is not a valid login.
            invalidated: vec![true; pool_size],
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn active_ids(&self) -> Vec<SlotId> {
        let mut ids: Vec<SlotId> = self.active.iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn inactive_ids(&self) -> Vec<SlotId> {
        self.inactive.iter().copied().collect()
    }

    pub fn is_active(&self, slot: SlotId) -> bool {
        self.active.contains(&slot)
    }

    pub fn is_invalidated(&self, slot: SlotId) -> bool {
        self.invalidated.get(slot).copied().unwrap_or(true)
    }

    /// Move a slot to active and make it usable: board reset pending,
    /// login valid again.
    fn activate(&mut self, slot: SlotId) {
        self.inactive.remove(&slot);
        self.active.insert(slot);
        self.reset_board[slot] = true;
        self.invalidated[slot] = false;
    }

    /// Claim a specific slot id (the numbered QR-code path). Succeeds only
    /// when the slot is currently inactive.
    pub fn grab(&mut self, slot: SlotId) -> Result<SlotId, SlotError> {
        if slot >= self.pool_size || self.active.contains(&slot) || !self.inactive.contains(&slot) {
            return Err(SlotError::InvalidSlot(slot));
        }
        self.activate(slot);
        Ok(slot)
    }

    /// Assign a seat to a joining session. A caller that already holds a
    /// slot is rebound: it gets the lowest free id and its old id returns
    /// to the pool. This is deliberate start-over semantics for players
    /// who reload the join link.
    pub fn join(&mut self, existing: Option<SlotId>) -> Result<SlotId, SlotError> {
        let new_slot = *self.inactive.first().ok_or(SlotError::NoSlotsAvailable)?;

        if let Some(old) = existing {
            if old < self.pool_size {
                self.active.remove(&old);
                self.inactive.insert(old);
            }
        }

        self.activate(new_slot);
        Ok(new_slot)
    }

    /// Return a slot to the pool. The browser must wipe its cached board
    /// on the next fetch, but the slot stays a valid login target.
    pub fn release(&mut self, slot: SlotId) {
        if slot >= self.pool_size {
            return;
        }
        self.active.remove(&slot);
        self.inactive.insert(slot);
        self.reset_board[slot] = true;
    }

    /// End the session for everyone: all slots inactive, all logins
    /// invalidated, all cached boards due for reset.
    pub fn sign_off_all(&mut self) {
        for slot in 0..self.pool_size {
            self.reset_board[slot] = true;
            self.invalidated[slot] = true;
        }
        for slot in self.active.drain() {
            self.inactive.insert(slot);
        }
    }

    /// Raise the board-reset flag on every slot. Done whenever a card is
    /// (re)loaded, since cached tap state no longer matches the card.
    pub fn mark_all_for_reset(&mut self) {
        for flag in &mut self.reset_board {
            *flag = true;
        }
    }

    /// Read-and-clear the one-shot board-reset flag for a slot.
    pub fn take_reset_flag(&mut self, slot: SlotId) -> bool {
        if slot >= self.pool_size {
            return false;
        }
        let flag = self.reset_board[slot];
        self.reset_board[slot] = false;
        flag
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_invariant(slots: &SlotRegistry) {
        let active: HashSet<SlotId> = slots.active_ids().into_iter().collect();
        let inactive: HashSet<SlotId> = slots.inactive_ids().into_iter().collect();
        assert!(active.is_disjoint(&inactive));
        let union: HashSet<SlotId> = active.union(&inactive).copied().collect();
        assert_eq!(union, (0..slots.pool_size()).collect::<HashSet<_>>());
    }

    #[test]
    fn test_join_assigns_lowest_inactive() {
        let mut slots = SlotRegistry::new(3);
        assert_eq!(slots.join(None).unwrap(), 0);
        assert_eq!(slots.join(None).unwrap(), 1);
        pool_invariant(&slots);
        assert_eq!(slots.active_ids(), vec![0, 1]);
    }

    #[test]
    fn test_join_rebinds_existing_session() {
        let mut slots = SlotRegistry::new(3);
        assert_eq!(slots.join(None).unwrap(), 0);
        assert_eq!(slots.join(None).unwrap(), 1);

        // A caller already bound to slot 0 gets the next free id and
        // slot 0 goes back to the pool.
        assert_eq!(slots.join(Some(0)).unwrap(), 2);
        assert_eq!(slots.active_ids(), vec![1, 2]);
        assert_eq!(slots.inactive_ids(), vec![0]);
        pool_invariant(&slots);
    }

    #[test]
    fn test_join_fails_when_pool_exhausted() {
        let mut slots = SlotRegistry::new(2);
        slots.join(None).unwrap();
        slots.join(None).unwrap();
        assert_eq!(slots.join(None), Err(SlotError::NoSlotsAvailable));
        pool_invariant(&slots);
    }

    #[test]
    fn test_release_returns_slot_and_keeps_invariant() {
        let mut slots = SlotRegistry::new(4);
        for _ in 0..4 {
            slots.join(None).unwrap();
        }
        slots.release(2);
        pool_invariant(&slots);
        assert_eq!(slots.inactive_ids(), vec![2]);
        // Released slot is reassigned first.
        assert_eq!(slots.join(None).unwrap(), 2);
        pool_invariant(&slots);
    }

    #[test]
    fn test_grab_specific_slot() {
        let mut slots = SlotRegistry::new(3);
        assert_eq!(slots.grab(1).unwrap(), 1);
        // Already active or out of range.
        assert_eq!(slots.grab(1), Err(SlotError::InvalidSlot(1)));
        assert_eq!(slots.grab(7), Err(SlotError::InvalidSlot(7)));
        pool_invariant(&slots);
    }

    #[test]
    fn test_reset_flag_is_one_shot() {
        let mut slots = SlotRegistry::new(2);
        slots.join(None).unwrap();
        assert!(slots.take_reset_flag(0));
        assert!(!slots.take_reset_flag(0));

        slots.mark_all_for_reset();
        assert!(slots.take_reset_flag(0));
        assert!(!slots.take_reset_flag(0));
        assert!(slots.take_reset_flag(1));
    }

    #[test]
    fn test_sign_off_all() {
        let mut slots = SlotRegistry::new(3);
        slots.join(None).unwrap();
        slots.join(None).unwrap();
        slots.sign_off_all();

        assert_eq!(slots.active_count(), 0);
        assert_eq!(slots.inactive_ids(), vec![0, 1, 2]);
        for slot in 0..3 {
            assert!(slots.is_invalidated(slot));
        }
        pool_invariant(&slots);

        // Rejoining after a sign-off makes the slot usable again.
        let slot = slots.join(None).unwrap();
        assert!(!slots.is_invalidated(slot));
    }

    #[test]
    fn test_fresh_slots_are_invalid_logins() {
        let slots = SlotRegistry::new(2);
        assert!(slots.is_invalidated(0));
        assert!(slots.is_invalidated(1));
        // Out-of-range ids count as invalidated too.
        assert!(slots.is_invalidated(99));
    }
}
