//! The cryptographic primitives behind bid validation: builder domain
//! computation, SSZ signing roots, and BLS verification over blst's
//! `min_pk` scheme.

use alloy_primitives::{hex, B256};
use blst::min_pk as bls;
use blst::BLST_ERROR;
use ssz_types::{typenum, FixedVector};
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

use crate::error::Error;
use crate::types::{BlsPublicKey, BlsSignature};

pub const DOMAIN_TYPE_APPLICATION_BUILDER: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

const BLS_DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

#[derive(TreeHash)]
struct ForkData {
    current_version: FixedVector<u8, typenum::U4>,
    genesis_validators_root: B256,
}

#[derive(TreeHash)]
struct SigningData {
    object_root: B256,
    domain: B256,
}

/// Parse a `0x`-prefixed four-byte fork version, e.g. `0x00000000`.
pub fn fork_version_from_hex(input: &str) -> Result<[u8; 4], Error> {
    let bytes = hex::decode(input).map_err(|_| Error::InvalidForkVersion(input.to_string()))?;
    bytes.try_into().map_err(|_| Error::InvalidForkVersion(input.to_string()))
}

pub fn compute_domain(
    domain_type: [u8; 4],
    fork_version: [u8; 4],
    genesis_validators_root: B256,
) -> B256 {
    let fork_data = ForkData {
        current_version: FixedVector::from(fork_version.to_vec()),
        genesis_validators_root,
    };
    let fork_data_root = fork_data.tree_hash_root();

    let mut domain = [0u8; 32];
    domain[..4].copy_from_slice(&domain_type);
    domain[4..].copy_from_slice(&fork_data_root.as_slice()[..28]);
    B256::from(domain)
}

/// The builder signing domain binds bids to a network via its genesis fork
/// version; the genesis validators root is zero by convention.
pub fn compute_builder_domain(genesis_fork_version: [u8; 4]) -> B256 {
    compute_domain(DOMAIN_TYPE_APPLICATION_BUILDER, genesis_fork_version, B256::ZERO)
}

pub fn compute_signing_root<T: TreeHash>(message: &T, domain: B256) -> B256 {
    SigningData { object_root: message.tree_hash_root(), domain }.tree_hash_root()
}

/// Verify `signature` over `signing_root` against `public_key`. A malformed
/// key or signature is reported distinctly from a signature that simply does
/// not verify.
pub fn verify_builder_signature(
    signing_root: B256,
    signature: &BlsSignature,
    public_key: &BlsPublicKey,
) -> Result<(), Error> {
    let public_key =
        bls::PublicKey::key_validate(public_key.as_slice()).map_err(|_| Error::InvalidPublicKey)?;
    let signature =
        bls::Signature::from_bytes(signature.as_slice()).map_err(|_| Error::InvalidSignature)?;

    match signature.verify(true, signing_root.as_slice(), BLS_DST, &[], &public_key, true) {
        BLST_ERROR::BLST_SUCCESS => Ok(()),
        _ => Err(Error::SignatureMismatch),
    }
}

/// Signing half of the scheme. The service itself never signs anything;
/// this exists for fixtures and the mock relays in the integration tests.
pub struct SecretKey(bls::SecretKey);

impl SecretKey {
    /// Derive a key from 32 bytes of input key material.
    pub fn try_from_ikm(ikm: [u8; 32]) -> Result<Self, Error> {
        bls::SecretKey::key_gen(&ikm, &[]).map(Self).map_err(|_| Error::InvalidSecretKey)
    }

    pub fn public_key(&self) -> BlsPublicKey {
        BlsPublicKey::from(self.0.sk_to_pk().to_bytes())
    }

    pub fn sign(&self, signing_root: B256) -> BlsSignature {
        BlsSignature::from(self.0.sign(signing_root.as_slice(), BLS_DST, &[]).to_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::b256;
    use rand::RngCore;

    fn random_secret_key() -> SecretKey {
        let mut ikm = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut ikm);
        SecretKey::try_from_ikm(ikm).unwrap()
    }

    #[test]
    fn mainnet_builder_domain_known_answer() {
        let domain = compute_builder_domain([0, 0, 0, 0]);
        assert_eq!(
            domain,
            b256!("00000001f5a5fd42d16a20302798ef6ed309979b43003d2320d9f0e8ea9831a9"),
        );
    }

    #[test]
    fn sign_verify_round_trip() {
        let secret_key = random_secret_key();
        let root = B256::repeat_byte(0x2a);
        let signature = secret_key.sign(root);

        verify_builder_signature(root, &signature, &secret_key.public_key()).unwrap();
    }

    #[test]
    fn wrong_key_fails_verification() {
        let secret_key = random_secret_key();
        let other_key = random_secret_key();
        let root = B256::repeat_byte(0x2a);
        let signature = secret_key.sign(root);

        let err = verify_builder_signature(root, &signature, &other_key.public_key());
        assert!(matches!(err, Err(Error::SignatureMismatch)));
    }

    #[test]
    fn fork_version_parsing() {
        assert_eq!(fork_version_from_hex("0x00000000").unwrap(), [0, 0, 0, 0]);
        assert_eq!(fork_version_from_hex("0x00000064").unwrap(), [0, 0, 0, 0x64]);
        assert!(fork_version_from_hex("0x00").is_err());
        assert!(fork_version_from_hex("flamingo").is_err());
    }
}
