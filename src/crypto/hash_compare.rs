//! Digest comparison
//!
//! OP_EQUALVERIFY compares a computed hash against the committed one. The
//! comparison walks every byte instead of returning at the first difference.

/// Compare two digests for equality
///
/// Lengths are compared first; a length mismatch is never equal.
#[inline]
pub fn hash_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
