use alloy_primitives::{B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use tree_hash_derive::TreeHash;

use crate::types::{BlsPublicKey, BlsSignature, ExecutionPayloadHeader, Fork, Slot, VersionedValue};

/// A relay's commitment to deliver the execution payload described by
/// `header` in exchange for a signed blinded block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TreeHash)]
pub struct BuilderBid {
    #[serde(with = "serde_utils::quoted_u64")]
    pub slot: Slot,
    pub parent_hash: B256,
    pub block_hash: B256,
    #[serde(rename = "pubkey")]
    pub public_key: BlsPublicKey,
    #[serde(with = "serde_utils::quoted_u64")]
    pub block_number: u64,
    pub transactions_root: B256,
    #[serde(with = "serde_utils::quoted_u256")]
    pub value: U256,
    pub header: ExecutionPayloadHeader,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedBuilderBid {
    pub message: BuilderBid,
    pub signature: BlsSignature,
}

impl SignedBuilderBid {
    pub fn version(&self) -> Fork {
        self.message.header.version()
    }
}

impl fmt::Display for SignedBuilderBid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let block_hash = &self.message.block_hash;
        let value = &self.message.value;
        write!(f, "block hash {block_hash} and value {value}")
    }
}

/// The wire shape of a relay's `getHeader` response.
pub type SignedBuilderBidEnvelope = VersionedValue<SignedBuilderBid>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExecutionPayloadHeaderDeneb;

    fn deneb_bid(slot: Slot, block_hash: B256, value: U256) -> SignedBuilderBid {
        let header = ExecutionPayloadHeaderDeneb { block_hash, ..Default::default() };
        SignedBuilderBid {
            message: BuilderBid {
                slot,
                parent_hash: B256::ZERO,
                block_hash,
                public_key: BlsPublicKey::default(),
                block_number: 0,
                transactions_root: B256::ZERO,
                value,
                header: ExecutionPayloadHeader::Deneb(header),
            },
            signature: BlsSignature::default(),
        }
    }

    #[test]
    fn envelope_round_trip() {
        let bid = deneb_bid(100, B256::repeat_byte(0xab), U256::from(1_000_000_000u64));
        let envelope = SignedBuilderBidEnvelope { version: bid.version(), data: bid };

        let encoded = serde_json::to_string(&envelope).unwrap();
        assert!(encoded.contains("\"version\":\"deneb\""));
        assert!(encoded.contains("\"value\":\"1000000000\""));
        assert!(encoded.contains("\"slot\":\"100\""));

        let decoded: SignedBuilderBidEnvelope = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, envelope);
        assert_eq!(decoded.data.version(), Fork::Deneb);
    }

    #[test]
    fn display_names_hash_and_value() {
        let bid = deneb_bid(1, B256::repeat_byte(0x11), U256::from(42u64));
        let rendered = bid.to_string();
        assert!(rendered.contains("0x1111"));
        assert!(rendered.contains("42"));
    }
}
