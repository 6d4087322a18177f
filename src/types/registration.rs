use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::types::{BlsPublicKey, BlsSignature};

/// A validator's declared fee recipient and gas limit preferences. The
/// broadcaster forwards the bytes it received; this type exists so the
/// request can be counted and sanity-checked before fan-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorRegistration {
    pub fee_recipient: Address,
    #[serde(with = "serde_utils::quoted_u64")]
    pub gas_limit: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub timestamp: u64,
    #[serde(rename = "pubkey")]
    pub public_key: BlsPublicKey,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedValidatorRegistration {
    pub message: ValidatorRegistration,
    pub signature: BlsSignature,
}
