//! Signature checking
//!
//! The interpreter never decides signature validity itself. OP_CHECKSIG and the
//! multisig threshold scan ask a [`SignatureChecker`], so the stack machine is
//! the same whether signatures are real ECDSA or the reference placeholders.

use crate::constants::{
    COMPRESSED_PUBKEY_SIZE, DEFAULT_SIGNATURE_PREFIX, DEFAULT_SIGNATURE_SENTINEL,
    UNCOMPRESSED_PUBKEY_SIZE,
};
use crate::crypto::hash256;
use crate::error::Result;
use crate::types::{ByteString, Hash};
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, VerifyOnly};
use tracing::trace;

/// Decides whether `signature` is valid for `public_key`.
///
/// `Ok(false)` is an ordinary rejection. `Err` is reserved for an unusable
/// primitive and aborts the whole verification.
pub trait SignatureChecker: Send + Sync {
    fn check_sig(&self, signature: &[u8], public_key: &[u8]) -> Result<bool>;
}

/// Message digest a collaborator signs: SHA256(SHA256(data))
pub fn signing_message(data: &[u8]) -> Hash {
    hash256(data)
}

/// SEC1 shape check: 33-byte compressed or 65-byte uncompressed
pub fn is_valid_pubkey_encoding(public_key: &[u8]) -> bool {
    match public_key.first() {
        Some(0x02) | Some(0x03) => public_key.len() == COMPRESSED_PUBKEY_SIZE,
        Some(0x04) => public_key.len() == UNCOMPRESSED_PUBKEY_SIZE,
        _ => false,
    }
}

/// secp256k1 ECDSA over a fixed 32-byte message digest
///
/// Signatures are DER followed by one sighash-type byte. The key must be a
/// SEC1 point on secp256k1.
pub struct EcdsaChecker {
    secp: Secp256k1<VerifyOnly>,
    sighash: Hash,
    strict_der: bool,
}

impl EcdsaChecker {
    pub fn new(sighash: Hash) -> Self {
        Self {
            secp: Secp256k1::verification_only(),
            sighash,
            strict_der: true,
        }
    }

    /// Allow non-canonical DER (extra leading zeros in R or S)
    pub fn with_strict_der(mut self, strict_der: bool) -> Self {
        self.strict_der = strict_der;
        self
    }

    pub fn sighash(&self) -> &Hash {
        &self.sighash
    }

    fn parse_signature(&self, der_sig: &[u8]) -> Option<Signature> {
        if self.strict_der {
            return Signature::from_der(der_sig).ok();
        }
        normalize_der_signature(der_sig)
            .and_then(|normalized| Signature::from_der(&normalized).ok())
            .or_else(|| Signature::from_der(der_sig).ok())
    }
}

impl SignatureChecker for EcdsaChecker {
    fn check_sig(&self, signature: &[u8], public_key: &[u8]) -> Result<bool> {
        if !is_valid_pubkey_encoding(public_key) {
            trace!(len = public_key.len(), "rejecting malformed public key");
            return Ok(false);
        }

        let Some((&sighash_type, der_sig)) = signature.split_last() else {
            return Ok(false);
        };

        // Base type must be ALL, NONE or SINGLE once ANYONECANPAY is masked out
        let base_type = sighash_type & !0x80;
        if self.strict_der && !(0x01..=0x03).contains(&base_type) {
            trace!(sighash_type, "rejecting undefined sighash type");
            return Ok(false);
        }

        let Some(mut sig) = self.parse_signature(der_sig) else {
            trace!("rejecting undecodable DER signature");
            return Ok(false);
        };

        let pubkey = match PublicKey::from_slice(public_key) {
            Ok(pk) => pk,
            Err(_) => return Ok(false),
        };

        // libsecp256k1 only verifies low-S; normalising is a no-op for low-S input
        sig.normalize_s();

        let message = Message::from_digest(self.sighash);
        Ok(self.secp.verify_ecdsa(&message, &sig, &pubkey).is_ok())
    }
}

/// Rewrite a lax DER signature into canonical form.
///
/// Older signers emitted R and S with redundant leading zero bytes, which the
/// strict parser refuses.
fn normalize_der_signature(sig: &[u8]) -> Option<Vec<u8>> {
    // Minimum DER signature: 30 06 02 01 00 02 01 00
    if sig.len() < 8 || sig[0] != 0x30 {
        return None;
    }
    let total_len = sig[1] as usize;
    if sig.len() < 2 + total_len {
        return None;
    }

    if sig[2] != 0x02 {
        return None;
    }
    let r_len = sig[3] as usize;
    let r_end = 4 + r_len;
    if sig.len() < r_end + 2 || sig[r_end] != 0x02 {
        return None;
    }
    let s_len = sig[r_end + 1] as usize;
    let s_start = r_end + 2;
    let s_end = s_start + s_len;
    if sig.len() < s_end {
        return None;
    }

    let r = normalize_integer(&sig[4..r_end]);
    let s = normalize_integer(&sig[s_start..s_end]);

    let inner_len = 2 + r.len() + 2 + s.len();
    let mut out = Vec::with_capacity(2 + inner_len);
    out.push(0x30);
    out.push(inner_len as u8);
    out.push(0x02);
    out.push(r.len() as u8);
    out.extend_from_slice(&r);
    out.push(0x02);
    out.push(s.len() as u8);
    out.extend_from_slice(&s);
    Some(out)
}

/// Strip redundant leading zeros, keeping one when the high bit is set
fn normalize_integer(bytes: &[u8]) -> Vec<u8> {
    if bytes.is_empty() {
        return vec![0];
    }
    let mut start = 0;
    while start < bytes.len() - 1 && bytes[start] == 0 {
        start += 1;
    }
    if bytes[start] & 0x80 != 0 {
        if start > 0 {
            start -= 1;
        } else {
            let mut out = vec![0];
            out.extend_from_slice(bytes);
            return out;
        }
    }
    bytes[start..].to_vec()
}

/// Reference P2PKH predicate: the signature must equal a fixed sentinel.
///
/// Carries no cryptographic binding; for demonstrations and tests only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentinelChecker {
    sentinel: ByteString,
}

impl SentinelChecker {
    pub fn new(sentinel: impl Into<ByteString>) -> Self {
        Self {
            sentinel: sentinel.into(),
        }
    }
}

impl Default for SentinelChecker {
    fn default() -> Self {
        Self::new(DEFAULT_SIGNATURE_SENTINEL.as_bytes())
    }
}

impl SignatureChecker for SentinelChecker {
    fn check_sig(&self, signature: &[u8], _public_key: &[u8]) -> Result<bool> {
        Ok(signature == self.sentinel.as_slice())
    }
}

/// Reference multisig predicate: the signature must start with a prefix.
///
/// Ignores the public key; for demonstrations and tests only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixChecker {
    prefix: ByteString,
}

impl PrefixChecker {
    pub fn new(prefix: impl Into<ByteString>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for PrefixChecker {
    fn default() -> Self {
        Self::new(DEFAULT_SIGNATURE_PREFIX.as_bytes())
    }
}

impl SignatureChecker for PrefixChecker {
    fn check_sig(&self, signature: &[u8], _public_key: &[u8]) -> Result<bool> {
        Ok(signature.starts_with(&self.prefix))
    }
}
