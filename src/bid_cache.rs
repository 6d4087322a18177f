use alloy_primitives::B256;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::types::{SignedBuilderBidEnvelope, Slot};

pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
pub const MAX_BID_AGE: Duration = Duration::from_secs(180);

/// Outcome of one header auction. Remembered so that a later failure to
/// redeem the payload can name the relays that owed it.
#[derive(Debug, Clone)]
pub struct BestBid {
    pub bid: SignedBuilderBidEnvelope,
    pub origin_relays: Vec<String>,
    pub inserted_at: Instant,
}

/// Advisory map from `(slot, block hash)` to the remembered auction
/// outcome. Losing an entry is harmless; redemption proceeds without it.
#[derive(Default)]
pub struct BidCache {
    bids: Mutex<HashMap<String, BestBid>>,
}

fn bid_key(slot: Slot, block_hash: &B256) -> String {
    format!("{slot}{block_hash:?}")
}

impl BidCache {
    pub fn insert(
        &self,
        slot: Slot,
        block_hash: &B256,
        bid: SignedBuilderBidEnvelope,
        origin_relays: Vec<String>,
    ) {
        let entry = BestBid { bid, origin_relays, inserted_at: Instant::now() };
        let mut bids = self.bids.lock().unwrap();
        // Same slot revisited: the latest auction wins.
        bids.insert(bid_key(slot, block_hash), entry);
    }

    pub fn get(&self, slot: Slot, block_hash: &B256) -> Option<BestBid> {
        let bids = self.bids.lock().unwrap();
        bids.get(&bid_key(slot, block_hash)).cloned()
    }

    pub fn sweep(&self) {
        self.sweep_older_than(MAX_BID_AGE)
    }

    fn sweep_older_than(&self, max_age: Duration) {
        let mut bids = self.bids.lock().unwrap();
        bids.retain(|_, entry| entry.inserted_at.elapsed() <= max_age);
    }

    pub fn len(&self) -> usize {
        self.bids.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
