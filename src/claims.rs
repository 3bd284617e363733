// src/claims.rs
// Win-claim queue for the mingo card server. A claim is a card number a
// player asserts has reached bingo; the engine drains the queue and puts
// each card in front of a human for verification.

use crate::defs::CardNumber;

/// Ordered list of pending win claims. A card number appears at most
/// once while pending; the drain is destructive, so exactly one consumer
/// sees each claim.
#[derive(Debug, Clone, Default)]
pub struct ClaimQueue {
    claims: Vec<CardNumber>,
}

impl ClaimQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a claim. Repeat submissions for a card already pending are
    /// dropped.
    pub fn submit(&mut self, card: CardNumber) -> bool {
        if self.claims.contains(&card) {
            return false;
        }
        self.claims.push(card);
        true
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    /// Return every pending claim, oldest first, and empty the queue in
    /// the same call. A concurrent second reader gets an empty list.
    pub fn drain(&mut self) -> Vec<CardNumber> {
        std::mem::take(&mut self.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_is_destructive() {
        let mut claims = ClaimQueue::new();
        claims.submit(4);
        claims.submit(1);

        assert_eq!(claims.drain(), vec![4, 1]);
        // Second drain with no new submissions comes back empty.
        assert_eq!(claims.drain(), Vec::<CardNumber>::new());
    }

    #[test]
    fn test_pending_duplicates_are_dropped() {
        let mut claims = ClaimQueue::new();
        assert!(claims.submit(2));
        assert!(!claims.submit(2));
        assert_eq!(claims.len(), 1);

        // Once drained, the same card may claim again.
        claims.drain();
        assert!(claims.submit(2));
    }

    #[test]
    fn test_claims_keep_submission_order() {
        let mut claims = ClaimQueue::new();
        for card in [7, 0, 3] {
            claims.submit(card);
        }
        assert_eq!(claims.drain(), vec![7, 0, 3]);
    }
}
