//! Error types for script verification
//!
//! Only conditions that must abort a call live here. Stack underflows, hash
//! mismatches and bad signatures are ordinary outcomes and are reported through
//! [`crate::types::Verdict`] instead, so a batch can keep going after one of them.

use std::borrow::Cow;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Clone)]
pub enum VerifyError {
    /// A hash or signature primitive could not be used. Never retried.
    #[error("Verification environment unavailable: {0}")]
    Environment(Cow<'static, str>),

    #[error("Invalid multisig policy: {0}")]
    InvalidPolicy(Cow<'static, str>),

    #[error("Unsupported opcode: 0x{0:02x}")]
    UnsupportedOpcode(u8),

    #[error("Malformed script: {0}")]
    MalformedScript(Cow<'static, str>),

    #[error("Invalid configuration: {0}")]
    Config(Cow<'static, str>),
}

pub type Result<T> = std::result::Result<T, VerifyError>;
