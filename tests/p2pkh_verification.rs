//! P2PKH verification against real secp256k1 signatures and the reference sentinel


use test_helpers::{default_sighash, init_tracing, TestKey};
use tx_script_verifier::script::{verify_p2pkh, Script};
use tx_script_verifier::signature::{EcdsaChecker, SentinelChecker};
use tx_script_verifier::types::{StructuralError, VerificationFailure};
use tx_script_verifier::*;

#[test]
fn test_ecdsa_p2pkh_valid_spend() {
    init_tracing();
    let key = TestKey::from_seed(0x11);
    let sighash = default_sighash();
    let pkh = derive_pubkey_hash(&key.public_key);

    let verdict = verify_p2pkh(
        &key.sign(sighash),
        &key.public_key,
        &pkh,
        &EcdsaChecker::new(sighash),
    )
    .unwrap();
    assert_eq!(verdict, Verdict::Pass);
}

#[test]
fn test_ecdsa_p2pkh_uncompressed_key() {
    let key = TestKey::from_seed(0x12);
    let sighash = default_sighash();
    let uncompressed = key.uncompressed_public_key();
    let pkh = derive_pubkey_hash(&uncompressed);

    let verdict = verify_p2pkh(
        &key.sign(sighash),
        &uncompressed,
        &pkh,
        &EcdsaChecker::new(sighash),
    )
    .unwrap();
    assert!(verdict.is_pass());

    // Compressed and uncompressed encodings hash differently
    let verdict = verify_p2pkh(
        &key.sign(sighash),
        &key.public_key,
        &pkh,
        &EcdsaChecker::new(sighash),
    )
    .unwrap();
    assert_eq!(verdict, Verdict::Fail(VerificationFailure::HashMismatch.into()));
}

#[test]
fn test_ecdsa_p2pkh_signature_from_other_key() {
    let owner = TestKey::from_seed(0x21);
    let thief = TestKey::from_seed(0x22);
    let sighash = default_sighash();
    let pkh = derive_pubkey_hash(&owner.public_key);

    let verdict = verify_p2pkh(
        &thief.sign(sighash),
        &owner.public_key,
        &pkh,
        &EcdsaChecker::new(sighash),
    )
    .unwrap();
    assert_eq!(
        verdict,
        Verdict::Fail(VerificationFailure::InvalidSignature.into())
    );
}

#[test]
fn test_ecdsa_p2pkh_signature_for_other_message() {
    let key = TestKey::from_seed(0x31);
    let pkh = derive_pubkey_hash(&key.public_key);
    let sig = key.sign(signing_message_for(b"pay alice"));

    let verdict = verify_p2pkh(
        &sig,
        &key.public_key,
        &pkh,
        &EcdsaChecker::new(signing_message_for(b"pay mallory")),
    )
    .unwrap();
    assert!(verdict.is_verification_failure());
}

fn signing_message_for(data: &[u8]) -> [u8; 32] {
    tx_script_verifier::signature::signing_message(data)
}

#[test]
fn test_hash_mismatch_wins_over_valid_signature() {
    let key = TestKey::from_seed(0x41);
    let sighash = default_sighash();
    let mut pkh = derive_pubkey_hash(&key.public_key);
    pkh[0] ^= 0x01;

    let verdict = verify_p2pkh(
        &key.sign(sighash),
        &key.public_key,
        &pkh,
        &EcdsaChecker::new(sighash),
    )
    .unwrap();
    assert_eq!(verdict, Verdict::Fail(VerificationFailure::HashMismatch.into()));
}

#[test]
fn test_truncated_embedded_hash() {
    let key = TestKey::from_seed(0x42);
    let pkh = derive_pubkey_hash(&key.public_key);
    let verdict = verify_p2pkh(
        b"dummy_signature",
        &key.public_key,
        &pkh[..19],
        &SentinelChecker::default(),
    )
    .unwrap();
    assert_eq!(verdict, Verdict::Fail(VerificationFailure::HashMismatch.into()));
}

#[test]
fn test_reference_sentinel_p2pkh() {
    let public_key = [0x02u8; 33];
    let pkh = derive_pubkey_hash(&public_key);
    let checker = SentinelChecker::default();

    assert!(verify_p2pkh(b"dummy_signature", &public_key, &pkh, &checker)
        .unwrap()
        .is_pass());
    assert_eq!(
        verify_p2pkh(b"real_signature", &public_key, &pkh, &checker).unwrap(),
        Verdict::Fail(VerificationFailure::InvalidSignature.into())
    );
}

#[test]
fn test_locking_script_without_witness_underflows() {
    let locking = Script::new()
        .push_opcode(opcodes::Opcode::Hash160)
        .push_opcode(opcodes::Opcode::EqualVerify)
        .push_opcode(opcodes::Opcode::CheckSig);
    let outcome = script::verify_script(
        &Script::new(),
        &locking,
        &SentinelChecker::default(),
        script::ExecOptions::default(),
    )
    .unwrap();

    assert!(outcome.verdict.is_structural_error());
    assert!(!outcome.verdict.is_verification_failure());
    assert_eq!(
        outcome.verdict.failure(),
        Some(&FailureReason::Structural(StructuralError::StackUnderflow {
            opcode: "OP_HASH160".into(),
            required: 1,
            depth: 0,
        }))
    );
}

#[test]
fn test_p2pkh_via_serialized_scripts() {
    let key = TestKey::from_seed(0x51);
    let sighash = default_sighash();
    let locking_bytes = Script::p2pkh(&derive_pubkey_hash(&key.public_key))
        .to_bytes()
        .unwrap();
    let unlocking_bytes = Script::p2pkh_unlock(&key.sign(sighash), &key.public_key)
        .to_bytes()
        .unwrap();

    let locking = Script::from_bytes(&locking_bytes).unwrap();
    let unlocking = Script::from_bytes(&unlocking_bytes).unwrap();
    assert!(locking.is_p2pkh());

    let verifier = ScriptVerifier::with_config(
        EcdsaChecker::new(sighash),
        config::VerifierConfig::default(),
    )
    .unwrap();
    assert!(verifier
        .verify_script(&unlocking, &locking)
        .unwrap()
        .verdict
        .is_pass());
}

#[test]
fn test_batch_with_real_signatures() {
    let sighash = default_sighash();
    let keys: Vec<_> = (0x61..0x69).map(TestKey::from_seed).collect();
    let mut inputs: Vec<P2pkhInput> = keys
        .iter()
        .map(|k| {
            P2pkhInput::new(
                k.sign(sighash),
                k.public_key.clone(),
                derive_pubkey_hash(&k.public_key).to_vec(),
            )
        })
        .collect();
    // Swap one signature onto the wrong key
    inputs[3].signature = keys[4].sign(sighash);

    let verifier = ScriptVerifier::with_config(
        EcdsaChecker::new(sighash),
        config::VerifierConfig::default(),
    )
    .unwrap();
    let verdicts = verifier.verify_p2pkh_batch(&inputs).unwrap();

    assert_eq!(verdicts.len(), inputs.len());
    for (i, verdict) in verdicts.iter().enumerate() {
        assert_eq!(verdict.is_pass(), i != 3, "input {i}: {verdict}");
    }
}
