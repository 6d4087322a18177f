use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use ssz_types::{
    serde_utils::{hex_fixed_vec, hex_var_list},
    typenum, FixedVector, VariableList,
};
use tree_hash::{Hash256, PackedEncoding, TreeHash, TreeHashType};
use tree_hash_derive::TreeHash;

use crate::types::Fork;

/// Execution payload header as committed to by builder bids, capella shape.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TreeHash)]
pub struct ExecutionPayloadHeaderCapella {
    pub parent_hash: B256,
    pub fee_recipient: Address,
    pub state_root: B256,
    pub receipts_root: B256,
    #[serde(with = "hex_fixed_vec")]
    pub logs_bloom: FixedVector<u8, typenum::U256>,
    pub prev_randao: B256,
    #[serde(with = "serde_utils::quoted_u64")]
    pub block_number: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub gas_limit: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub gas_used: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub timestamp: u64,
    #[serde(with = "hex_var_list")]
    pub extra_data: VariableList<u8, typenum::U32>,
    #[serde(with = "serde_utils::quoted_u256")]
    pub base_fee_per_gas: U256,
    pub block_hash: B256,
    pub transactions_root: B256,
    pub withdrawals_root: B256,
}

/// Deneb adds the blob gas accounting fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TreeHash)]
pub struct ExecutionPayloadHeaderDeneb {
    pub parent_hash: B256,
    pub fee_recipient: Address,
    pub state_root: B256,
    pub receipts_root: B256,
    #[serde(with = "hex_fixed_vec")]
    pub logs_bloom: FixedVector<u8, typenum::U256>,
    pub prev_randao: B256,
    #[serde(with = "serde_utils::quoted_u64")]
    pub block_number: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub gas_limit: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub gas_used: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub timestamp: u64,
    #[serde(with = "hex_var_list")]
    pub extra_data: VariableList<u8, typenum::U32>,
    #[serde(with = "serde_utils::quoted_u256")]
    pub base_fee_per_gas: U256,
    pub block_hash: B256,
    pub transactions_root: B256,
    pub withdrawals_root: B256,
    #[serde(with = "serde_utils::quoted_u64")]
    pub blob_gas_used: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub excess_blob_gas: u64,
}

/// The two header shapes this service recognizes. The serde representation
/// is untagged with the newer shape first, so a bare header decodes to the
/// newest fork whose required fields are all present; the enclosing
/// envelope's version tag is cross-checked separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExecutionPayloadHeader {
    Deneb(ExecutionPayloadHeaderDeneb),
    Capella(ExecutionPayloadHeaderCapella),
}

impl ExecutionPayloadHeader {
    pub fn version(&self) -> Fork {
        match self {
            Self::Capella(_) => Fork::Capella,
            Self::Deneb(_) => Fork::Deneb,
        }
    }

    pub fn parent_hash(&self) -> &B256 {
        match self {
            Self::Capella(header) => &header.parent_hash,
            Self::Deneb(header) => &header.parent_hash,
        }
    }

    pub fn block_hash(&self) -> &B256 {
        match self {
            Self::Capella(header) => &header.block_hash,
            Self::Deneb(header) => &header.block_hash,
        }
    }

    pub fn block_number(&self) -> u64 {
        match self {
            Self::Capella(header) => header.block_number,
            Self::Deneb(header) => header.block_number,
        }
    }

    pub fn transactions_root(&self) -> &B256 {
        match self {
            Self::Capella(header) => &header.transactions_root,
            Self::Deneb(header) => &header.transactions_root,
        }
    }
}

// The signed message is fork-concrete; the enum is only a decoding aid, so
// its hash tree root is the root of whichever shape it holds.
impl TreeHash for ExecutionPayloadHeader {
    fn tree_hash_type() -> TreeHashType {
        TreeHashType::Container
    }

    fn tree_hash_packed_encoding(&self) -> PackedEncoding {
        unreachable!("containers are not packed")
    }

    fn tree_hash_packing_factor() -> usize {
        unreachable!("containers are not packed")
    }

    fn tree_hash_root(&self) -> Hash256 {
        match self {
            Self::Capella(header) => header.tree_hash_root(),
            Self::Deneb(header) => header.tree_hash_root(),
        }
    }
}

/// The pieces of a relay's `getPayload` response the redemption engine
/// inspects. The full response is passed through verbatim; this probe only
/// establishes that the payload is present, recognized, and for the right
/// block.
#[derive(Debug, Clone, Deserialize)]
pub struct PayloadResponseProbe {
    pub version: Fork,
    data: PayloadResponseData,
}

#[derive(Debug, Clone, Deserialize)]
struct PayloadResponseData {
    #[serde(default)]
    execution_payload: Option<ExecutionPayloadProbe>,
    #[serde(default)]
    block_hash: Option<B256>,
}

#[derive(Debug, Clone, Deserialize)]
struct ExecutionPayloadProbe {
    block_hash: B256,
}

impl PayloadResponseProbe {
    /// Block hash of the enclosed execution payload, for either response
    /// shape: deneb nests the payload next to the blobs bundle, capella
    /// returns it directly.
    pub fn block_hash(&self) -> Option<B256> {
        self.data
            .execution_payload
            .as_ref()
            .map(|payload| payload.block_hash)
            .or(self.data.block_hash)
    }

    /// A present-but-zeroed block hash is a withheld payload, not a payload.
    pub fn is_empty(&self) -> bool {
        self.block_hash().map(|hash| hash.is_zero()).unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capella_header_json() -> serde_json::Value {
        serde_json::json!({
            "parent_hash": "0x1111111111111111111111111111111111111111111111111111111111111111",
            "fee_recipient": "0x2222222222222222222222222222222222222222",
            "state_root": "0x3333333333333333333333333333333333333333333333333333333333333333",
            "receipts_root": "0x4444444444444444444444444444444444444444444444444444444444444444",
            "logs_bloom": format!("0x{}", "00".repeat(256)),
            "prev_randao": "0x5555555555555555555555555555555555555555555555555555555555555555",
            "block_number": "1234",
            "gas_limit": "30000000",
            "gas_used": "21000",
            "timestamp": "1700000000",
            "extra_data": "0x",
            "base_fee_per_gas": "7",
            "block_hash": "0x6666666666666666666666666666666666666666666666666666666666666666",
            "transactions_root": "0x7777777777777777777777777777777777777777777777777777777777777777",
            "withdrawals_root": "0x8888888888888888888888888888888888888888888888888888888888888888",
        })
    }

    #[test]
    fn bare_header_decodes_to_newest_matching_fork() {
        let capella = capella_header_json();
        let header: ExecutionPayloadHeader = serde_json::from_value(capella.clone()).unwrap();
        assert_eq!(header.version(), Fork::Capella);

        let mut deneb = capella;
        deneb["blob_gas_used"] = "0".into();
        deneb["excess_blob_gas"] = "0".into();
        let header: ExecutionPayloadHeader = serde_json::from_value(deneb).unwrap();
        assert_eq!(header.version(), Fork::Deneb);
        assert_eq!(header.block_number(), 1234);
    }

    #[test]
    fn payload_probe_reads_both_response_shapes() {
        let hash = "0x6666666666666666666666666666666666666666666666666666666666666666";
        let deneb: PayloadResponseProbe = serde_json::from_value(serde_json::json!({
            "version": "deneb",
            "data": {
                "execution_payload": { "block_hash": hash },
                "blobs_bundle": { "commitments": [], "proofs": [], "blobs": [] },
            }
        }))
        .unwrap();
        assert_eq!(deneb.block_hash().unwrap(), hash.parse::<B256>().unwrap());
        assert!(!deneb.is_empty());

        let capella: PayloadResponseProbe = serde_json::from_value(serde_json::json!({
            "version": "capella",
            "data": { "block_hash": hash }
        }))
        .unwrap();
        assert_eq!(capella.block_hash(), deneb.block_hash());
    }

    #[test]
    fn zeroed_payload_is_empty() {
        let probe: PayloadResponseProbe = serde_json::from_value(serde_json::json!({
            "version": "capella",
            "data": { "block_hash": format!("0x{}", "00".repeat(32)) }
        }))
        .unwrap();
        assert!(probe.is_empty());
    }
}
