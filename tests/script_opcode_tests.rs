//! Tests for script opcode execution

use tx_script_verifier::constants::{MAX_SCRIPT_OPS, MAX_STACK_SIZE};
use tx_script_verifier::opcodes::*;
use tx_script_verifier::script::*;
use tx_script_verifier::signature::SentinelChecker;
use tx_script_verifier::types::{StructuralError, VerificationFailure, Verdict};

fn run_bytes(bytes: &[u8]) -> Verdict {
    let script = Script::from_bytes(bytes).unwrap();
    let mut stack = Stack::new();
    eval_script(
        &script,
        &mut stack,
        &SentinelChecker::default(),
        ExecOptions::default(),
    )
    .unwrap()
    .verdict
}

#[test]
fn test_eval_script_op_1() {
    assert_eq!(run_bytes(&[OP_1]), Verdict::Pass);
}

#[test]
fn test_eval_script_op_0() {
    assert_eq!(
        run_bytes(&[OP_0]),
        Verdict::Fail(VerificationFailure::FalseResult.into())
    );
}

#[test]
fn test_eval_script_op_dup() {
    let script = Script::from_bytes(&[OP_1, OP_DUP]).unwrap();
    let mut stack = Stack::new();
    eval_script(
        &script,
        &mut stack,
        &SentinelChecker::default(),
        ExecOptions::default(),
    )
    .unwrap();
    assert_eq!(stack.depth(), 2);
}

#[test]
fn test_eval_script_op_hash160() {
    let script = Script::from_bytes(&[OP_1, OP_HASH160]).unwrap();
    let mut stack = Stack::new();
    let outcome = eval_script(
        &script,
        &mut stack,
        &SentinelChecker::default(),
        ExecOptions::default(),
    )
    .unwrap();
    assert!(outcome.verdict.is_pass());
    assert_eq!(stack.top().map(Vec::len), Some(20));
}

#[test]
fn test_eval_script_op_equal() {
    assert_eq!(run_bytes(&[OP_1, OP_1, OP_EQUAL]), Verdict::Pass);
}

#[test]
fn test_eval_script_op_equal_false() {
    assert_eq!(
        run_bytes(&[OP_1, OP_2, OP_EQUAL]),
        Verdict::Fail(VerificationFailure::FalseResult.into())
    );
}

#[test]
fn test_eval_script_op_verify() {
    assert_eq!(run_bytes(&[OP_1, OP_VERIFY, OP_1]), Verdict::Pass);
}

#[test]
fn test_eval_script_op_verify_false() {
    assert_eq!(
        run_bytes(&[OP_0, OP_VERIFY]),
        Verdict::Fail(
            VerificationFailure::VerifyFailed {
                opcode: "OP_VERIFY".into()
            }
            .into()
        )
    );
}

#[test]
fn test_eval_script_op_verify_empty_result() {
    // OP_VERIFY consumes the only item, leaving nothing to decide on
    assert_eq!(
        run_bytes(&[OP_1, OP_VERIFY]),
        Verdict::Fail(StructuralError::EmptyStack.into())
    );
}

#[test]
fn test_eval_script_op_equalverify() {
    assert_eq!(
        run_bytes(&[OP_1, OP_1, OP_EQUALVERIFY]),
        Verdict::Fail(StructuralError::EmptyStack.into())
    );
    assert_eq!(
        run_bytes(&[OP_1, OP_2, OP_EQUALVERIFY]),
        Verdict::Fail(VerificationFailure::HashMismatch.into())
    );
}

#[test]
fn test_eval_script_op_equalverify_one_item() {
    assert_eq!(
        run_bytes(&[OP_1, OP_EQUALVERIFY]),
        Verdict::Fail(
            StructuralError::StackUnderflow {
                opcode: "OP_EQUALVERIFY".into(),
                required: 2,
                depth: 1,
            }
            .into()
        )
    );
}

#[test]
fn test_eval_script_op_checksig() {
    let mut bytes = vec![15];
    bytes.extend_from_slice(b"dummy_signature");
    bytes.extend_from_slice(&[OP_1, OP_CHECKSIG]);
    assert_eq!(run_bytes(&bytes), Verdict::Pass);

    let mut bytes = vec![5];
    bytes.extend_from_slice(b"other");
    bytes.extend_from_slice(&[OP_1, OP_CHECKSIG]);
    assert_eq!(
        run_bytes(&bytes),
        Verdict::Fail(VerificationFailure::InvalidSignature.into())
    );
}

#[test]
fn test_eval_script_checksig_result_can_be_compared() {
    // A failed OP_CHECKSIG leaves [0x00], which is not byte-equal to OP_0's empty push
    let mut bytes = vec![3];
    bytes.extend_from_slice(b"bad");
    bytes.extend_from_slice(&[OP_1, OP_CHECKSIG, OP_0, OP_EQUAL]);
    assert_eq!(
        run_bytes(&bytes),
        Verdict::Fail(VerificationFailure::FalseResult.into())
    );
}

#[test]
fn test_eval_script_op_checkmultisig() {
    let sentinel = b"dummy_signature";
    let mut bytes = vec![sentinel.len() as u8];
    bytes.extend_from_slice(sentinel);
    bytes.push(OP_1);
    bytes.extend_from_slice(&[OP_1, OP_1, OP_2, OP_CHECKMULTISIG]);
    assert_eq!(run_bytes(&bytes), Verdict::Pass);
}

#[test]
fn test_eval_script_op_checkmultisig_bad_count() {
    // n = 3 takes every item below it, leaving no room for m or signatures
    let bytes = [OP_1, OP_1, OP_1, OP_1, OP_3, OP_CHECKMULTISIG];
    assert!(run_bytes(&bytes).is_structural_error());

    // m = 0
    let bytes = [OP_0, OP_1, OP_1, OP_CHECKMULTISIG];
    assert_eq!(
        run_bytes(&bytes),
        Verdict::Fail(
            StructuralError::InvalidCount {
                opcode: "OP_CHECKMULTISIG".into(),
                value: "0".into(),
            }
            .into()
        )
    );
}

#[test]
fn test_op_count_limit() {
    let mut bytes = vec![OP_1];
    bytes.extend(std::iter::repeat(OP_DUP).take(MAX_SCRIPT_OPS + 1));
    assert_eq!(
        run_bytes(&bytes),
        Verdict::Fail(
            StructuralError::OpCountExceeded {
                limit: MAX_SCRIPT_OPS
            }
            .into()
        )
    );
}

#[test]
fn test_pushes_do_not_count_as_ops() {
    let bytes = vec![OP_1; MAX_SCRIPT_OPS + 10];
    assert_eq!(run_bytes(&bytes), Verdict::Pass);
}

#[test]
fn test_stack_size_limit() {
    let bytes = vec![OP_1; MAX_STACK_SIZE + 1];
    assert_eq!(
        run_bytes(&bytes),
        Verdict::Fail(
            StructuralError::StackOverflow {
                limit: MAX_STACK_SIZE
            }
            .into()
        )
    );
}

#[test]
fn test_unsupported_opcodes_rejected_at_construction() {
    for byte in [0x61u8, 0x6a, 0x7c, 0x93, 0xa8, 0xb1, 0xff] {
        assert!(Script::from_bytes(&[OP_1, byte]).is_err(), "0x{byte:02x}");
    }
}

#[test]
fn test_asm_round_trip() {
    let asm = "OP_2 <02aa> <03bb> OP_2 OP_CHECKMULTISIG";
    let script = Script::from_asm(asm).unwrap();
    assert_eq!(script.to_string(), asm);
    assert_eq!(
        script.to_bytes().unwrap(),
        vec![OP_2, 2, 0x02, 0xaa, 2, 0x03, 0xbb, OP_2, OP_CHECKMULTISIG]
    );
}
