//! Script engine constants

/// SHA-256 digest size
pub const SHA256_SIZE: usize = 32;

/// RIPEMD-160 digest size (also the size of a public-key hash)
pub const HASH160_SIZE: usize = 20;

/// Compressed SEC1 public key size
pub const COMPRESSED_PUBKEY_SIZE: usize = 33;

/// Uncompressed SEC1 public key size
pub const UNCOMPRESSED_PUBKEY_SIZE: usize = 65;

/// Maximum stack size during script execution
pub const MAX_STACK_SIZE: usize = 1000;

/// Maximum number of non-push opcodes executed in one script
pub const MAX_SCRIPT_OPS: usize = 201;

/// Maximum number of public keys in a multisig policy
pub const MAX_PUBKEYS_PER_MULTISIG: usize = 20;

/// Largest push encoded with a single length-prefix byte
pub const MAX_DIRECT_PUSH: usize = 0x4b;

/// Maximum script element size
pub const MAX_SCRIPT_ELEMENT_SIZE: usize = 520;

/// Sentinel accepted by the reference P2PKH signature predicate
pub const DEFAULT_SIGNATURE_SENTINEL: &str = "dummy_signature";

/// Prefix accepted by the reference multisig signature predicate
pub const DEFAULT_SIGNATURE_PREFIX: &str = "sig";

/// SIGHASH_ALL, appended to DER signatures by the ECDSA checkers' callers
pub const SIGHASH_ALL: u8 = 0x01;
