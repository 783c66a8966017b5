//! m-of-n threshold verification
//!
//! Signatures are matched against public keys in order with two cursors. A
//! signature that verifies against the current key consumes both; a key that
//! matches nothing is skipped. Signatures must therefore appear in the same
//! relative order as their keys, and no pair is checked twice.

use crate::constants::MAX_PUBKEYS_PER_MULTISIG;
use crate::error::Result;
use crate::signature::SignatureChecker;
use crate::types::{MultisigPolicy, VerificationFailure, Verdict};
use tracing::{debug, trace};

/// Count signatures that verify against `public_keys` in relative order.
///
/// Signatures left over once the keys run out are never evaluated.
pub fn count_valid_signatures<S, K>(
    signatures: &[S],
    public_keys: &[K],
    checker: &dyn SignatureChecker,
) -> Result<usize>
where
    S: AsRef<[u8]>,
    K: AsRef<[u8]>,
{
    let mut sig_index = 0;
    let mut pubkey_index = 0;
    let mut valid_sigs = 0;

    while sig_index < signatures.len() && pubkey_index < public_keys.len() {
        let signature = signatures[sig_index].as_ref();
        let public_key = public_keys[pubkey_index].as_ref();

        if checker.check_sig(signature, public_key)? {
            trace!(sig_index, pubkey_index, "multisig signature matched");
            valid_sigs += 1;
            sig_index += 1;
        }
        pubkey_index += 1;
    }

    Ok(valid_sigs)
}

fn threshold_verdict(valid: usize, required: usize) -> Verdict {
    if valid >= required {
        Verdict::Pass
    } else {
        Verdict::Fail(VerificationFailure::InsufficientSignatures { valid, required }.into())
    }
}

/// Verify an m-of-n threshold.
///
/// The policy is checked first: `required_sigs` must be between 1 and the
/// number of keys, and there may be at most 20 keys.
pub fn verify_multisig<S, K>(
    signatures: &[S],
    public_keys: &[K],
    required_sigs: usize,
    checker: &dyn SignatureChecker,
) -> Result<Verdict>
where
    S: AsRef<[u8]>,
    K: AsRef<[u8]>,
{
    verify_multisig_with_limit(
        signatures,
        public_keys,
        required_sigs,
        MAX_PUBKEYS_PER_MULTISIG,
        checker,
    )
}

/// [`verify_multisig`] with a caller-supplied key limit
pub fn verify_multisig_with_limit<S, K>(
    signatures: &[S],
    public_keys: &[K],
    required_sigs: usize,
    max_keys: usize,
    checker: &dyn SignatureChecker,
) -> Result<Verdict>
where
    S: AsRef<[u8]>,
    K: AsRef<[u8]>,
{
    MultisigPolicy::check_threshold(required_sigs, public_keys.len(), max_keys)?;

    let valid = count_valid_signatures(signatures, public_keys, checker)?;
    let verdict = threshold_verdict(valid, required_sigs);
    debug!(
        valid,
        required = required_sigs,
        keys = public_keys.len(),
        %verdict,
        "multisig verified"
    );
    Ok(verdict)
}

/// [`verify_multisig`] against an already-validated policy
pub fn verify_policy<S: AsRef<[u8]>>(
    policy: &MultisigPolicy,
    signatures: &[S],
    checker: &dyn SignatureChecker,
) -> Result<Verdict> {
    let valid = count_valid_signatures(signatures, policy.public_keys(), checker)?;
    Ok(threshold_verdict(valid, policy.required_sigs()))
}
