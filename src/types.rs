//! Core types for script verification

use crate::constants::{HASH160_SIZE, MAX_PUBKEYS_PER_MULTISIG};
use crate::error::{Result, VerifyError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Byte string type
pub type ByteString = Vec<u8>;

/// SHA-256 digest
pub type Hash = [u8; 32];

/// RIPEMD160(SHA256(public key))
pub type PubKeyHash = [u8; HASH160_SIZE];

/// Malformed execution: the script asked for something the stack cannot give.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StructuralError {
    /// An opcode ran with fewer items on the stack than it needs
    StackUnderflow {
        opcode: String,
        required: usize,
        depth: usize,
    },
    /// The stack grew past the configured limit
    StackOverflow { limit: usize },
    /// More non-push opcodes than the configured limit
    OpCountExceeded { limit: usize },
    /// Script finished with nothing to decide on
    EmptyStack,
    /// A key or signature count on the stack is not a valid small integer
    InvalidCount { opcode: String, value: String },
}

impl fmt::Display for StructuralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StackUnderflow {
                opcode,
                required,
                depth,
            } => write!(
                f,
                "{opcode}: stack underflow (needs {required}, has {depth})"
            ),
            Self::StackOverflow { limit } => write!(f, "stack depth exceeds {limit}"),
            Self::OpCountExceeded { limit } => {
                write!(f, "script exceeds {limit} non-push opcodes")
            }
            Self::EmptyStack => write!(f, "stack empty at end of execution"),
            Self::InvalidCount { opcode, value } => {
                write!(f, "{opcode}: invalid count <{value}>")
            }
        }
    }
}

/// Expected negative outcome of a well-formed verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationFailure {
    /// OP_EQUALVERIFY saw a computed hash that differs from the embedded one
    HashMismatch,
    /// OP_CHECKSIG rejected the signature
    InvalidSignature,
    /// Threshold not reached
    InsufficientSignatures { valid: usize, required: usize },
    /// OP_VERIFY / OP_CHECKSIGVERIFY saw false
    VerifyFailed { opcode: String },
    /// Script ran to completion with a false value on top
    FalseResult,
}

impl fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HashMismatch => write!(f, "public key hash mismatch"),
            Self::InvalidSignature => write!(f, "signature verification failed"),
            Self::InsufficientSignatures { valid, required } => write!(
                f,
                "not enough valid signatures ({valid} of {required} required)"
            ),
            Self::VerifyFailed { opcode } => write!(f, "{opcode} failed"),
            Self::FalseResult => write!(f, "script finished with false on top"),
        }
    }
}

/// Why a verification did not pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    Structural(StructuralError),
    Verification(VerificationFailure),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Structural(e) => write!(f, "structural error: {e}"),
            Self::Verification(e) => write!(f, "verification failure: {e}"),
        }
    }
}

impl From<StructuralError> for FailureReason {
    fn from(e: StructuralError) -> Self {
        Self::Structural(e)
    }
}

impl From<VerificationFailure> for FailureReason {
    fn from(e: VerificationFailure) -> Self {
        Self::Verification(e)
    }
}

/// Spend / no-spend verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Pass,
    Fail(FailureReason),
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            Verdict::Pass => None,
            Verdict::Fail(reason) => Some(reason),
        }
    }

    pub fn is_structural_error(&self) -> bool {
        matches!(self, Verdict::Fail(FailureReason::Structural(_)))
    }

    pub fn is_verification_failure(&self) -> bool {
        matches!(self, Verdict::Fail(FailureReason::Verification(_)))
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => write!(f, "pass"),
            Verdict::Fail(reason) => write!(f, "fail ({reason})"),
        }
    }
}

impl From<Verdict> for bool {
    fn from(v: Verdict) -> bool {
        v.is_pass()
    }
}

/// m-of-n signing policy
///
/// Invariant: `1 <= required_sigs <= public_keys.len() <= MAX_PUBKEYS_PER_MULTISIG`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultisigPolicy {
    required_sigs: usize,
    public_keys: Vec<ByteString>,
}

impl MultisigPolicy {
    pub fn new(required_sigs: usize, public_keys: Vec<ByteString>) -> Result<Self> {
        Self::with_key_limit(required_sigs, public_keys, MAX_PUBKEYS_PER_MULTISIG)
    }

    /// Same as [`MultisigPolicy::new`] with a caller-supplied key limit
    pub fn with_key_limit(
        required_sigs: usize,
        public_keys: Vec<ByteString>,
        max_keys: usize,
    ) -> Result<Self> {
        Self::check_threshold(required_sigs, public_keys.len(), max_keys)?;
        Ok(Self {
            required_sigs,
            public_keys,
        })
    }

    /// Validate an m-of-n threshold without building a policy
    pub fn check_threshold(required_sigs: usize, key_count: usize, max_keys: usize) -> Result<()> {
        if required_sigs == 0 {
            return Err(VerifyError::InvalidPolicy(
                "required_sigs must be at least 1".into(),
            ));
        }
        if required_sigs > key_count {
            return Err(VerifyError::InvalidPolicy(
                format!(
                    "required_sigs ({required_sigs}) exceeds number of public keys ({key_count})"
                )
                .into(),
            ));
        }
        if key_count > max_keys {
            return Err(VerifyError::InvalidPolicy(
                format!("{key_count} public keys exceeds limit of {max_keys}").into(),
            ));
        }
        Ok(())
    }

    pub fn required_sigs(&self) -> usize {
        self.required_sigs
    }

    pub fn public_keys(&self) -> &[ByteString] {
        &self.public_keys
    }
}

/// One P2PKH spend: witness plus the hash embedded in the locking script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct P2pkhInput {
    pub signature: ByteString,
    pub public_key: ByteString,
    pub pubkey_hash: ByteString,
}

impl P2pkhInput {
    pub fn new(
        signature: impl Into<ByteString>,
        public_key: impl Into<ByteString>,
        pubkey_hash: impl Into<ByteString>,
    ) -> Self {
        Self {
            signature: signature.into(),
            public_key: public_key.into(),
            pubkey_hash: pubkey_hash.into(),
        }
    }
}

/// One executed script element, for the advisory trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceStep {
    /// Opcode name, or `PUSH` for data
    pub element: String,
    pub stack_before: Vec<String>,
    pub stack_after: Vec<String>,
}

/// Result of running a script: verdict plus the optional trace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOutcome {
    pub verdict: Verdict,
    pub trace: Vec<TraceStep>,
}

impl ScriptOutcome {
    pub(crate) fn new(verdict: Verdict, trace: Vec<TraceStep>) -> Self {
        Self { verdict, trace }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_invariants() {
        let keys = vec![vec![2u8; 33], vec![3u8; 33], vec![4u8; 33]];
        assert!(MultisigPolicy::new(2, keys.clone()).is_ok());
        assert!(MultisigPolicy::new(3, keys.clone()).is_ok());
        assert!(matches!(
            MultisigPolicy::new(0, keys.clone()),
            Err(VerifyError::InvalidPolicy(_))
        ));
        assert!(matches!(
            MultisigPolicy::new(4, keys),
            Err(VerifyError::InvalidPolicy(_))
        ));
    }

    #[test]
    fn test_policy_key_limit() {
        let keys = vec![vec![2u8; 33]; MAX_PUBKEYS_PER_MULTISIG + 1];
        assert!(MultisigPolicy::new(1, keys.clone()).is_err());
        assert!(MultisigPolicy::with_key_limit(1, keys, 64).is_ok());
    }

    #[test]
    fn test_verdict_classification() {
        let structural = Verdict::Fail(StructuralError::EmptyStack.into());
        let failure = Verdict::Fail(VerificationFailure::HashMismatch.into());

        assert!(Verdict::Pass.is_pass());
        assert!(structural.is_structural_error());
        assert!(!structural.is_verification_failure());
        assert!(failure.is_verification_failure());
        assert!(!bool::from(failure));
    }

    #[test]
    fn test_display() {
        let v = Verdict::Fail(
            VerificationFailure::InsufficientSignatures {
                valid: 1,
                required: 2,
            }
            .into(),
        );
        assert_eq!(
            v.to_string(),
            "fail (verification failure: not enough valid signatures (1 of 2 required))"
        );

        let s = StructuralError::StackUnderflow {
            opcode: "OP_HASH160".into(),
            required: 1,
            depth: 0,
        };
        assert_eq!(s.to_string(), "OP_HASH160: stack underflow (needs 1, has 0)");

        assert_eq!(
            StructuralError::OpCountExceeded { limit: 201 }.to_string(),
            "script exceeds 201 non-push opcodes"
        );
    }
}
