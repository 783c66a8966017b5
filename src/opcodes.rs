//! Script opcodes
//!
//! Byte values follow Bitcoin Core `script/script.h`. Only the opcodes this
//! engine executes are defined; every other byte is rejected when a script is
//! built, so there is no silent no-op path.

use crate::error::VerifyError;
use std::fmt;

// ============================================================================
// PUSH OPCODES
// ============================================================================

/// OP_0 / OP_FALSE - Push empty array
pub const OP_0: u8 = 0x00;
pub const OP_FALSE: u8 = 0x00;

/// OP_PUSHDATA1 - Push next byte as data length
pub const OP_PUSHDATA1: u8 = 0x4c;

/// OP_PUSHDATA2 - Push next 2 bytes (little-endian) as data length
pub const OP_PUSHDATA2: u8 = 0x4d;

/// OP_1 / OP_TRUE - Push 1 onto stack
pub const OP_1: u8 = 0x51;
pub const OP_TRUE: u8 = 0x51;

pub const OP_2: u8 = 0x52;
pub const OP_3: u8 = 0x53;

/// OP_16 - Push 16 onto stack
pub const OP_16: u8 = 0x60;

// ============================================================================
// FLOW CONTROL / STACK
// ============================================================================

/// OP_VERIFY - Fail unless the top stack item is true
pub const OP_VERIFY: u8 = 0x69;

/// OP_DUP - Duplicate top stack item
pub const OP_DUP: u8 = 0x76;

// ============================================================================
// BITWISE LOGIC
// ============================================================================

/// OP_EQUAL - Push 1 if the top two items are byte-equal, 0 otherwise
pub const OP_EQUAL: u8 = 0x87;

/// OP_EQUALVERIFY - OP_EQUAL followed by OP_VERIFY
pub const OP_EQUALVERIFY: u8 = 0x88;

// ============================================================================
// CRYPTO
// ============================================================================

/// OP_HASH160 - RIPEMD160(SHA256(x))
pub const OP_HASH160: u8 = 0xa9;

/// OP_CHECKSIG - Verify a signature against a public key
pub const OP_CHECKSIG: u8 = 0xac;

/// OP_CHECKSIGVERIFY - OP_CHECKSIG followed by OP_VERIFY
pub const OP_CHECKSIGVERIFY: u8 = 0xad;

/// OP_CHECKMULTISIG - Verify m-of-n signatures in key order
pub const OP_CHECKMULTISIG: u8 = 0xae;

/// Executable opcode
///
/// Data pushes are not opcodes here; they are carried by
/// [`crate::script::ScriptElement::Push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Push an empty array (false)
    Op0,
    /// OP_1..OP_16; always holds 1..=16
    Num(u8),
    Verify,
    Dup,
    Equal,
    EqualVerify,
    Hash160,
    CheckSig,
    CheckSigVerify,
    CheckMultiSig,
}

impl Opcode {
    /// Small-integer push for `n` in 0..=16
    pub fn from_small_int(n: u8) -> Option<Self> {
        match n {
            0 => Some(Opcode::Op0),
            1..=16 => Some(Opcode::Num(n)),
            _ => None,
        }
    }

    /// Encoded byte value
    pub fn to_byte(self) -> u8 {
        match self {
            Opcode::Op0 => OP_0,
            Opcode::Num(n) => OP_1 - 1 + n,
            Opcode::Verify => OP_VERIFY,
            Opcode::Dup => OP_DUP,
            Opcode::Equal => OP_EQUAL,
            Opcode::EqualVerify => OP_EQUALVERIFY,
            Opcode::Hash160 => OP_HASH160,
            Opcode::CheckSig => OP_CHECKSIG,
            Opcode::CheckSigVerify => OP_CHECKSIGVERIFY,
            Opcode::CheckMultiSig => OP_CHECKMULTISIG,
        }
    }

    /// Minimum stack depth the opcode needs before it runs.
    ///
    /// OP_CHECKMULTISIG needs more once its counts are known; the interpreter
    /// checks the rest itself.
    pub fn required_depth(self) -> usize {
        match self {
            Opcode::Op0 | Opcode::Num(_) => 0,
            Opcode::Verify | Opcode::Dup | Opcode::Hash160 | Opcode::CheckMultiSig => 1,
            Opcode::Equal | Opcode::EqualVerify | Opcode::CheckSig | Opcode::CheckSigVerify => 2,
        }
    }

    /// Script name, e.g. `OP_DUP`
    pub fn name(self) -> &'static str {
        match self {
            Opcode::Op0 => "OP_0",
            Opcode::Num(n) => SMALL_INT_NAMES[(n as usize).saturating_sub(1).min(15)],
            Opcode::Verify => "OP_VERIFY",
            Opcode::Dup => "OP_DUP",
            Opcode::Equal => "OP_EQUAL",
            Opcode::EqualVerify => "OP_EQUALVERIFY",
            Opcode::Hash160 => "OP_HASH160",
            Opcode::CheckSig => "OP_CHECKSIG",
            Opcode::CheckSigVerify => "OP_CHECKSIGVERIFY",
            Opcode::CheckMultiSig => "OP_CHECKMULTISIG",
        }
    }

    /// Parse a script name back into an opcode
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "OP_0" | "OP_FALSE" => Some(Opcode::Op0),
            "OP_TRUE" => Some(Opcode::Num(1)),
            "OP_VERIFY" => Some(Opcode::Verify),
            "OP_DUP" => Some(Opcode::Dup),
            "OP_EQUAL" => Some(Opcode::Equal),
            "OP_EQUALVERIFY" => Some(Opcode::EqualVerify),
            "OP_HASH160" => Some(Opcode::Hash160),
            "OP_CHECKSIG" => Some(Opcode::CheckSig),
            "OP_CHECKSIGVERIFY" => Some(Opcode::CheckSigVerify),
            "OP_CHECKMULTISIG" => Some(Opcode::CheckMultiSig),
            other => SMALL_INT_NAMES
                .iter()
                .position(|n| *n == other)
                .map(|i| Opcode::Num(i as u8 + 1)),
        }
    }
}

const SMALL_INT_NAMES: [&str; 16] = [
    "OP_1", "OP_2", "OP_3", "OP_4", "OP_5", "OP_6", "OP_7", "OP_8", "OP_9", "OP_10", "OP_11",
    "OP_12", "OP_13", "OP_14", "OP_15", "OP_16",
];

impl TryFrom<u8> for Opcode {
    type Error = VerifyError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            OP_0 => Ok(Opcode::Op0),
            OP_1..=OP_16 => Ok(Opcode::Num(byte - OP_1 + 1)),
            OP_VERIFY => Ok(Opcode::Verify),
            OP_DUP => Ok(Opcode::Dup),
            OP_EQUAL => Ok(Opcode::Equal),
            OP_EQUALVERIFY => Ok(Opcode::EqualVerify),
            OP_HASH160 => Ok(Opcode::Hash160),
            OP_CHECKSIG => Ok(Opcode::CheckSig),
            OP_CHECKSIGVERIFY => Ok(Opcode::CheckSigVerify),
            OP_CHECKMULTISIG => Ok(Opcode::CheckMultiSig),
            other => Err(VerifyError::UnsupportedOpcode(other)),
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
