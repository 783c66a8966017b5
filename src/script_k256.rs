//! k256-based signature checking
//!
//! Pure Rust alternative to the libsecp256k1 FFI in [`crate::signature::EcdsaChecker`],
//! with the same signature format (DER plus one sighash-type byte) and the same
//! accept/reject behaviour.

use crate::error::Result;
use crate::signature::{is_valid_pubkey_encoding, SignatureChecker};
use crate::types::Hash;
use k256::ecdsa::{signature::hazmat::PrehashVerifier, Signature, VerifyingKey};

/// ECDSA over secp256k1 using the `k256` crate
#[derive(Debug, Clone)]
pub struct K256Checker {
    sighash: Hash,
}

impl K256Checker {
    pub fn new(sighash: Hash) -> Self {
        Self { sighash }
    }
}

impl SignatureChecker for K256Checker {
    fn check_sig(&self, signature: &[u8], public_key: &[u8]) -> Result<bool> {
        if !is_valid_pubkey_encoding(public_key) {
            return Ok(false);
        }
        let Some((&sighash_type, der_sig)) = signature.split_last() else {
            return Ok(false);
        };
        if !(0x01..=0x03).contains(&(sighash_type & !0x80)) {
            return Ok(false);
        }

        let verifying_key = match VerifyingKey::from_sec1_bytes(public_key) {
            Ok(vk) => vk,
            Err(_) => return Ok(false),
        };
        let sig = match Signature::from_der(der_sig) {
            Ok(sig) => sig,
            Err(_) => return Ok(false),
        };
        // k256 rejects high-S outright
        let sig = sig.normalize_s().unwrap_or(sig);

        Ok(verifying_key.verify_prehash(&self.sighash, &sig).is_ok())
    }
}
