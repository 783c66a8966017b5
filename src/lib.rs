//! # tx-script-verifier
//!
//! Stack-based verification of Bitcoin-style spending conditions: pay-to-public-key-hash
//! (P2PKH) and m-of-n multisignature thresholds.
//!
//! ## Architecture
//!
//! - `opcodes` / `script`: closed opcode set, script codec and the stack machine
//! - `multisig`: ordered dual-cursor threshold check
//! - `signature`: the [`signature::SignatureChecker`] seam with a secp256k1 ECDSA
//!   implementation and two reference placeholders
//! - `crypto`: SHA-256, RIPEMD-160 and HASH160
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: every verification is deterministic and owns its own stack
//! 2. **Two kinds of "no"**: malformed execution and a failed check are both
//!    `Ok(Verdict::Fail(..))` but carry distinguishable reasons; only an unusable
//!    signature primitive is an `Err`
//! 3. **Exact Version Pinning**: the cryptographic dependencies are pinned
//!
//! ## Usage
//!
//! ```rust
//! use tx_script_verifier::crypto::derive_pubkey_hash;
//! use tx_script_verifier::script::verify_p2pkh;
//! use tx_script_verifier::signature::SentinelChecker;
//!
//! let public_key = [0x02u8; 33];
//! let pubkey_hash = derive_pubkey_hash(&public_key);
//! let verdict = verify_p2pkh(
//!     b"dummy_signature",
//!     &public_key,
//!     &pubkey_hash,
//!     &SentinelChecker::default(),
//! )
//! .unwrap();
//! assert!(verdict.is_pass());
//! ```

pub mod config;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod multisig;
pub mod opcodes;
pub mod script;
#[cfg(feature = "k256")]
pub mod script_k256;
pub mod signature;
pub mod types;

pub use crypto::derive_pubkey_hash;
pub use error::{Result, VerifyError};
pub use multisig::verify_multisig;
pub use script::{verify_p2pkh, Script};
pub use signature::{EcdsaChecker, PrefixChecker, SentinelChecker, SignatureChecker};
pub use types::{FailureReason, MultisigPolicy, P2pkhInput, Verdict};

use config::VerifierConfig;
use script::ExecOptions;
use types::ScriptOutcome;
use tracing::debug;

/// Script verifier - a signature checker bound to a configuration
///
/// Convenience wrapper over the module functions; every method applies the
/// configured limits and trace setting.
#[derive(Debug, Clone)]
pub struct ScriptVerifier<C> {
    checker: C,
    config: VerifierConfig,
}

impl<C: SignatureChecker> ScriptVerifier<C> {
    /// Verifier with the global configuration, or the environment if none was
    /// initialized. Fails with [`VerifyError::Config`] on invalid limits.
    pub fn new(checker: C) -> Result<Self> {
        Ok(Self {
            checker,
            config: config::get_verifier_config()?,
        })
    }

    /// Verifier with an explicit configuration
    pub fn with_config(checker: C, config: VerifierConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { checker, config })
    }

    pub fn checker(&self) -> &C {
        &self.checker
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    fn options(&self) -> ExecOptions {
        ExecOptions::from_config(&self.config)
    }

    /// Verify a P2PKH spend
    pub fn verify_p2pkh(
        &self,
        signature: &[u8],
        public_key: &[u8],
        embedded_pubkey_hash: &[u8],
    ) -> Result<Verdict> {
        self.verify_p2pkh_traced(signature, public_key, embedded_pubkey_hash)
            .map(|outcome| outcome.verdict)
    }

    /// Verify a P2PKH spend, keeping the execution trace if enabled
    pub fn verify_p2pkh_traced(
        &self,
        signature: &[u8],
        public_key: &[u8],
        embedded_pubkey_hash: &[u8],
    ) -> Result<ScriptOutcome> {
        script::verify_p2pkh_with(
            signature,
            public_key,
            embedded_pubkey_hash,
            &self.checker,
            self.options(),
        )
    }

    /// Verify an m-of-n threshold
    pub fn verify_multisig<S, K>(
        &self,
        signatures: &[S],
        public_keys: &[K],
        required_sigs: usize,
    ) -> Result<Verdict>
    where
        S: AsRef<[u8]>,
        K: AsRef<[u8]>,
    {
        multisig::verify_multisig_with_limit(
            signatures,
            public_keys,
            required_sigs,
            self.config.limits.max_pubkeys_per_multisig,
            &self.checker,
        )
    }

    /// Verify signatures against a prepared policy
    pub fn verify_policy<S: AsRef<[u8]>>(
        &self,
        policy: &MultisigPolicy,
        signatures: &[S],
    ) -> Result<Verdict> {
        multisig::verify_policy(policy, signatures, &self.checker)
    }

    /// Run an unlocking script followed by a locking script
    pub fn verify_script(&self, unlocking: &Script, locking: &Script) -> Result<ScriptOutcome> {
        script::verify_script(unlocking, locking, &self.checker, self.options())
    }

    /// Verify many P2PKH spends, one verdict per input in input order.
    ///
    /// A failing input does not stop the batch; only an environment error does.
    pub fn verify_p2pkh_batch(&self, inputs: &[P2pkhInput]) -> Result<Vec<Verdict>> {
        let verify = |input: &P2pkhInput| {
            self.verify_p2pkh(&input.signature, &input.public_key, &input.pubkey_hash)
        };

        #[cfg(feature = "production")]
        let verdicts: Result<Vec<Verdict>> = {
            use rayon::prelude::*;
            inputs.par_iter().map(verify).collect()
        };

        #[cfg(not(feature = "production"))]
        let verdicts: Result<Vec<Verdict>> = inputs.iter().map(verify).collect();

        let verdicts = verdicts?;
        debug!(
            inputs = inputs.len(),
            passed = verdicts.iter().filter(|v| v.is_pass()).count(),
            "P2PKH batch verified"
        );
        Ok(verdicts)
    }
}

impl ScriptVerifier<SentinelChecker> {
    /// Reference P2PKH verifier using the configured sentinel
    pub fn reference_p2pkh(config: VerifierConfig) -> Result<Self> {
        let checker = config.signatures.sentinel_checker();
        Self::with_config(checker, config)
    }
}

impl ScriptVerifier<PrefixChecker> {
    /// Reference multisig verifier using the configured prefix
    pub fn reference_multisig(config: VerifierConfig) -> Result<Self> {
        let checker = config.signatures.prefix_checker();
        Self::with_config(checker, config)
    }
}
