//! Configuration for tx-script-verifier
//!
//! Resource limits, signature-checking options and debug switches. Settings can
//! be deserialized from a config file, loaded from environment variables, or
//! passed programmatically.

use crate::constants::{
    DEFAULT_SIGNATURE_PREFIX, DEFAULT_SIGNATURE_SENTINEL, MAX_PUBKEYS_PER_MULTISIG,
    MAX_SCRIPT_OPS, MAX_STACK_SIZE,
};
use crate::error::{Result, VerifyError};
use crate::signature::{EcdsaChecker, PrefixChecker, SentinelChecker};
use crate::types::Hash;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Environment variable prefix: `TX_SCRIPT_VERIFIER_<SECTION>_<KEY>`
pub const ENV_PREFIX: &str = "TX_SCRIPT_VERIFIER";

/// Script execution limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptLimits {
    /// Maximum stack depth during execution
    /// Default: 1000
    #[serde(default = "default_max_stack_size")]
    pub max_stack_size: usize,

    /// Maximum number of non-push opcodes executed per script
    /// Default: 201
    #[serde(default = "default_max_script_ops")]
    pub max_script_ops: usize,

    /// Maximum public keys in one multisig policy
    /// Default: 20
    #[serde(default = "default_max_pubkeys_per_multisig")]
    pub max_pubkeys_per_multisig: usize,
}

fn default_max_stack_size() -> usize {
    MAX_STACK_SIZE
}

fn default_max_script_ops() -> usize {
    MAX_SCRIPT_OPS
}

fn default_max_pubkeys_per_multisig() -> usize {
    MAX_PUBKEYS_PER_MULTISIG
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            max_stack_size: MAX_STACK_SIZE,
            max_script_ops: MAX_SCRIPT_OPS,
            max_pubkeys_per_multisig: MAX_PUBKEYS_PER_MULTISIG,
        }
    }
}

/// Signature-checking configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureConfig {
    /// Require canonical DER and a defined sighash type for ECDSA signatures
    /// Default: true
    #[serde(default = "default_true")]
    pub strict_der: bool,

    /// Token accepted by the reference P2PKH predicate
    #[serde(default = "default_sentinel")]
    pub sentinel: String,

    /// Prefix accepted by the reference multisig predicate
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_true() -> bool {
    true
}

fn default_sentinel() -> String {
    DEFAULT_SIGNATURE_SENTINEL.to_string()
}

fn default_prefix() -> String {
    DEFAULT_SIGNATURE_PREFIX.to_string()
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            strict_der: true,
            sentinel: default_sentinel(),
            prefix: default_prefix(),
        }
    }
}

impl SignatureConfig {
    /// ECDSA checker for `sighash` honouring `strict_der`
    pub fn ecdsa_checker(&self, sighash: Hash) -> EcdsaChecker {
        EcdsaChecker::new(sighash).with_strict_der(self.strict_der)
    }

    /// Reference P2PKH checker using the configured sentinel
    pub fn sentinel_checker(&self) -> SentinelChecker {
        SentinelChecker::new(self.sentinel.as_bytes())
    }

    /// Reference multisig checker using the configured prefix
    pub fn prefix_checker(&self) -> PrefixChecker {
        PrefixChecker::new(self.prefix.as_bytes())
    }
}

/// Debug and development configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DebugConfig {
    /// Record a per-opcode trace (opcode, stack before, stack after)
    /// Default: false
    #[serde(default)]
    pub trace_execution: bool,
}

/// Complete verifier configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct VerifierConfig {
    #[serde(default)]
    pub limits: ScriptLimits,

    #[serde(default)]
    pub signatures: SignatureConfig,

    #[serde(default)]
    pub debug: DebugConfig,
}

fn env_value<T: FromStr>(section: &str, key: &str) -> Option<T> {
    std::env::var(format!("{ENV_PREFIX}_{section}_{key}"))
        .ok()
        .and_then(|val| val.parse().ok())
}

impl VerifierConfig {
    /// Load configuration from environment variables
    ///
    /// Unset or unparsable variables keep their defaults.
    ///
    /// Examples:
    /// - `TX_SCRIPT_VERIFIER_LIMITS_MAX_STACK_SIZE=500`
    /// - `TX_SCRIPT_VERIFIER_DEBUG_TRACE_EXECUTION=true`
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env_value("LIMITS", "MAX_STACK_SIZE") {
            config.limits.max_stack_size = v;
        }
        if let Some(v) = env_value("LIMITS", "MAX_SCRIPT_OPS") {
            config.limits.max_script_ops = v;
        }
        if let Some(v) = env_value("LIMITS", "MAX_PUBKEYS_PER_MULTISIG") {
            config.limits.max_pubkeys_per_multisig = v;
        }

        if let Some(v) = env_value("SIGNATURES", "STRICT_DER") {
            config.signatures.strict_der = v;
        }
        if let Some(v) = env_value("SIGNATURES", "SENTINEL") {
            config.signatures.sentinel = v;
        }
        if let Some(v) = env_value("SIGNATURES", "PREFIX") {
            config.signatures.prefix = v;
        }

        if let Some(v) = env_value("DEBUG", "TRACE_EXECUTION") {
            config.debug.trace_execution = v;
        }

        config
    }

    /// Reject limits that would make every script fail
    pub fn validate(&self) -> Result<()> {
        if self.limits.max_stack_size == 0 {
            return Err(VerifyError::Config("max_stack_size must be positive".into()));
        }
        if self.limits.max_script_ops == 0 {
            return Err(VerifyError::Config("max_script_ops must be positive".into()));
        }
        if self.limits.max_pubkeys_per_multisig == 0 {
            return Err(VerifyError::Config(
                "max_pubkeys_per_multisig must be positive".into(),
            ));
        }
        Ok(())
    }
}

static GLOBAL_VERIFIER_CONFIG: std::sync::OnceLock<VerifierConfig> = std::sync::OnceLock::new();

/// Initialize the global verifier configuration
///
/// Call once at startup, before any verification. Fails if the config is
/// invalid or was already set.
pub fn init_verifier_config(config: VerifierConfig) -> Result<()> {
    config.validate()?;
    GLOBAL_VERIFIER_CONFIG
        .set(config)
        .map_err(|_| VerifyError::Config("verifier config already initialized".into()))
}

/// Global configuration if initialized, otherwise loaded from the environment
///
/// The environment fallback goes through [`VerifierConfig::validate`], like
/// every other way of building a verifier configuration.
pub fn get_verifier_config() -> Result<VerifierConfig> {
    match GLOBAL_VERIFIER_CONFIG.get() {
        Some(config) => Ok(config.clone()),
        None => {
            let config = VerifierConfig::from_env();
            config.validate()?;
            Ok(config)
        }
    }
}
