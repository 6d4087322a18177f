use alloy_primitives::hex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ssz_types::{typenum, FixedVector};
use std::{fmt, str::FromStr};
use tree_hash_derive::TreeHash;

use crate::error::Error;

/// Compressed BLS12-381 G1 public key.
#[derive(Debug, Clone, PartialEq, Default, TreeHash)]
pub struct BlsPublicKey {
    inner: FixedVector<u8, typenum::U48>,
}

impl Eq for BlsPublicKey {}

/// Compressed BLS12-381 G2 signature.
#[derive(Debug, Clone, PartialEq, Default, TreeHash)]
pub struct BlsSignature {
    inner: FixedVector<u8, typenum::U96>,
}

impl Eq for BlsSignature {}

macro_rules! bls_bytes {
    ($type:ident, $len:expr, $invalid:expr) => {
        impl $type {
            pub fn try_from_bytes(bytes: &[u8]) -> Result<Self, Error> {
                if bytes.len() != $len {
                    return Err($invalid);
                }
                Ok(Self { inner: FixedVector::from(bytes.to_vec()) })
            }

            pub fn as_slice(&self) -> &[u8] {
                &self.inner
            }
        }

        impl From<[u8; $len]> for $type {
            fn from(bytes: [u8; $len]) -> Self {
                Self { inner: FixedVector::from(bytes.to_vec()) }
            }
        }

        impl FromStr for $type {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let bytes = hex::decode(s).map_err(|_| $invalid)?;
                Self::try_from_bytes(&bytes)
            }
        }

        impl fmt::Display for $type {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.as_slice()))
            }
        }

        impl Serialize for $type {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $type {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s: String = Deserialize::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

bls_bytes!(BlsPublicKey, 48, Error::InvalidPublicKey);
bls_bytes!(BlsSignature, 96, Error::InvalidSignature);

impl std::hash::Hash for BlsPublicKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write(self.as_slice());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PUBLIC_KEY: &str = "0x845bd072b7cd566f02faeb0a4033ce9399e42839ced64e8b2adcfc859ed1e8e1a5a293336a49feac6d9a5edb779be53a";

    #[test]
    fn parse_public_key() {
        let key: BlsPublicKey = PUBLIC_KEY.parse().unwrap();
        assert_eq!(key.to_string(), PUBLIC_KEY);
        assert_eq!(key.as_slice().len(), 48);
    }

    #[test]
    fn reject_wrong_length() {
        assert!("0x845bd0".parse::<BlsPublicKey>().is_err());
        assert!("not hex".parse::<BlsSignature>().is_err());
    }

    #[test]
    fn serde_round_trip() {
        let key: BlsPublicKey = PUBLIC_KEY.parse().unwrap();
        let encoded = serde_json::to_string(&key).unwrap();
        assert_eq!(encoded, format!("\"{PUBLIC_KEY}\""));
        let decoded: BlsPublicKey = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, key);
    }
}
