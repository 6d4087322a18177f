use alloy_primitives::B256;
use std::fmt;

use crate::types::{BlsPublicKey, Slot};

/// Describes a single unique auction: one proposer duty at one head.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AuctionRequest {
    pub slot: Slot,
    pub parent_hash: B256,
    pub public_key: BlsPublicKey,
}

impl fmt::Display for AuctionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.slot;
        let parent_hash = &self.parent_hash;
        let public_key = &self.public_key;
        write!(f, "slot {slot}, parent hash {parent_hash} and proposer {public_key}")
    }
}
