//! Hash primitives
//!
//! Thin wrappers over the `sha2` and `ripemd` crates returning fixed-size
//! arrays. Both primitives are total over byte strings; the only failure
//! mode is the environment, which these pure-Rust implementations do not have.

use crate::constants::{HASH160_SIZE, SHA256_SIZE};
use crate::types::{Hash, PubKeyHash};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

pub mod hash_compare;

pub use hash_compare::hash_eq;

/// SHA-256 of `input`
#[inline]
pub fn sha256(input: &[u8]) -> Hash {
    let digest = Sha256::digest(input);
    let mut out = [0u8; SHA256_SIZE];
    out.copy_from_slice(&digest);
    out
}

/// RIPEMD-160 of `input`
#[inline]
pub fn ripemd160(input: &[u8]) -> [u8; HASH160_SIZE] {
    let digest = Ripemd160::digest(input);
    let mut out = [0u8; HASH160_SIZE];
    out.copy_from_slice(&digest);
    out
}

/// RIPEMD160(SHA256(x)), the OP_HASH160 primitive
#[inline]
pub fn hash160(input: &[u8]) -> [u8; HASH160_SIZE] {
    ripemd160(&sha256(input))
}

/// SHA256(SHA256(x))
#[inline]
pub fn hash256(input: &[u8]) -> Hash {
    sha256(&sha256(input))
}

/// Public-key hash committed to by a P2PKH locking script
pub fn derive_pubkey_hash(public_key: &[u8]) -> PubKeyHash {
    hash160(public_key)
}
