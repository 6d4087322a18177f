use std::sync::Mutex;
use uuid::Uuid;

use crate::types::Slot;

#[derive(Debug, Default)]
struct SlotUid {
    slot: Slot,
    uid: Option<Uuid>,
}

/// Correlation id for one proposer duty. A header request for a newer slot
/// mints a fresh id; repeat requests within the slot reuse it, so every
/// upstream call for the duty carries the same `X-Slot-UID`.
#[derive(Debug, Default)]
pub struct SlotUidTracker {
    state: Mutex<SlotUid>,
}

impl SlotUidTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The uid to use for a header request at `slot`.
    pub fn advance(&self, slot: Slot) -> Uuid {
        let mut state = self.state.lock().unwrap();
        match state.uid {
            Some(uid) if slot == state.slot => uid,
            Some(uid) if slot < state.slot => {
                tracing::warn!(
                    request_slot = slot,
                    current_slot = state.slot,
                    "header request for a past slot, keeping current slot uid"
                );
                uid
            }
            _ => {
                let uid = Uuid::new_v4();
                state.slot = slot;
                state.uid = Some(uid);
                uid
            }
        }
    }

    /// The current uid, if any duty has been seen. Payload redemption uses
    /// this without advancing the slot.
    pub fn current(&self) -> Option<Uuid> {
        self.state.lock().unwrap().uid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_slot_mints_a_fresh_uid() {
        let tracker = SlotUidTracker::new();
        let first = tracker.advance(100);
        let second = tracker.advance(101);
        assert_ne!(first, second);
        assert_eq!(tracker.current(), Some(second));
    }

    #[test]
    fn same_slot_reuses_the_uid() {
        let tracker = SlotUidTracker::new();
        let first = tracker.advance(100);
        assert_eq!(tracker.advance(100), first);
    }

    #[test]
    fn older_slot_does_not_mutate() {
        let tracker = SlotUidTracker::new();
        let current = tracker.advance(100);
        assert_eq!(tracker.advance(99), current);
        assert_eq!(tracker.current(), Some(current));
    }

    #[test]
    fn no_uid_before_first_duty() {
        assert_eq!(SlotUidTracker::new().current(), None);
    }
}
