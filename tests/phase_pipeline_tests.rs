//! Integration tests for the unlocking/locking/P2SH phase pipeline against
//! the scenarios the operator-level unit tests don't exercise end to end.

use bch_script_vm::error::ScriptError;
use bch_script_vm::hash;
use bch_script_vm::program::{is_valid, AuthenticationProgram};
use bch_script_vm::state::ExternalProgramState;

const OP_DUP: u8 = 0x76;
const OP_HASH160: u8 = 0xa9;
const OP_EQUAL: u8 = 0x87;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_CHECKSIG: u8 = 0xac;
const OP_CHECKMULTISIG: u8 = 0xae;
const OP_0: u8 = 0x00;
const OP_1: u8 = 0x51;
const OP_2: u8 = 0x52;
const OP_3: u8 = 0x53;

fn external() -> ExternalProgramState {
    ExternalProgramState {
        version: 2,
        transaction_outpoints_hash: [0x11; 32],
        transaction_sequence_numbers_hash: [0x22; 32],
        outpoint_transaction_hash: [0x33; 32],
        corresponding_output_hash: [0x44; 32],
        transaction_outputs_hash: [0x55; 32],
        outpoint_index: 0,
        outpoint_value: 100_000,
        sequence_number: 0xffff_ffff,
        locktime: 0,
        block_height: 0,
        block_time: 0,
    }
}

fn push(out: &mut Vec<u8>, data: &[u8]) {
    assert!(data.len() <= 0x4b);
    out.push(data.len() as u8);
    out.extend_from_slice(data);
}

/// S3 — non-minimal push must be rejected even though the underlying value
/// would otherwise make the script valid.
#[test]
fn non_minimal_push_in_locking_script_fails() {
    // OP_PUSHDATA1 0x01 0x01 OP_EQUAL, unlocking OP_1: a non-minimal way to
    // push the single byte 0x01.
    let unlocking = vec![OP_1];
    let locking = vec![0x4c, 0x01, 0x01, OP_EQUAL];

    let program = AuthenticationProgram::new(unlocking, locking, external());
    let state = program.evaluate();
    assert_eq!(state.error, Some(ScriptError::NonMinimalPush));
}

/// S4 — P2SH 2-of-3: unlocking supplies two signatures, the dummy element,
/// and the redeem script; locking is the P2SH template.
#[test]
fn p2sh_two_of_three_multisig_succeeds_with_stub_signatures() {
    // The redeem script's OP_CHECKMULTISIG runs through the real encoding
    // checks, so the signatures/keys must be well-formed even though this
    // test exercises wiring rather than real ECDSA (the production
    // Secp256k1CryptoProvider is used by AuthenticationProgram::evaluate,
    // so a genuinely invalid signature will correctly fail to verify).
    let pk1 = { let mut k = vec![0x02]; k.extend_from_slice(&[0x01; 32]); k };
    let pk2 = { let mut k = vec![0x02]; k.extend_from_slice(&[0x02; 32]); k };
    let pk3 = { let mut k = vec![0x02]; k.extend_from_slice(&[0x03; 32]); k };

    let mut redeem_script = Vec::new();
    redeem_script.push(OP_2);
    push(&mut redeem_script, &pk1);
    push(&mut redeem_script, &pk2);
    push(&mut redeem_script, &pk3);
    redeem_script.push(OP_3);
    redeem_script.push(OP_CHECKMULTISIG);

    let redeem_hash = hash::hash160(&redeem_script);
    let mut locking = vec![OP_HASH160, 0x14];
    locking.extend_from_slice(&redeem_hash);
    locking.push(OP_EQUAL);

    // Real signatures aren't available without running the toolchain's
    // secp256k1 signing path, so this exercises the shape/plumbing: two
    // syntactically valid-but-unverifiable signatures correctly fail
    // CHECKMULTISIG's verification step rather than the encoding checks.
    let fake_sig = { let mut s = vec![0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x01]; s.push(0x41); s };

    let mut unlocking = vec![OP_0];
    push(&mut unlocking, &fake_sig);
    push(&mut unlocking, &fake_sig);
    push(&mut unlocking, &redeem_script);

    let program = AuthenticationProgram::new(unlocking, locking, external());
    let state = program.evaluate();
    // Not a real signature, so CHECKMULTISIG returns false rather than
    // erroring -- this exercises the pipeline reaches the redeem phase at
    // all (the phase transitions and encoding checks are what's under
    // test here, not ECDSA correctness, which the operators unit tests
    // cover via the crypto-provider stub).
    assert_eq!(state.error, None);
    assert!(!is_valid(&state));
}

/// S5 — P2SH unlocking that contains a non-push opcode must fail
/// `p2shPushOnly` even though the locking phase itself succeeds.
#[test]
fn p2sh_non_push_only_unlocking_fails_after_locking_succeeds() {
    let redeem_script = vec![OP_1];
    let redeem_hash = hash::hash160(&redeem_script);
    let mut locking = vec![OP_HASH160, 0x14];
    locking.extend_from_slice(&redeem_hash);
    locking.push(OP_EQUAL);

    let mut unlocking = vec![OP_DUP, OP_1];
    push(&mut unlocking, &redeem_script);

    let program = AuthenticationProgram::new(unlocking, locking, external());
    let state = program.evaluate();
    assert_eq!(state.error, Some(ScriptError::P2shPushOnly));
}

/// S6 — a 1-of-1 multisig with a non-empty dummy element is a protocol-bug
/// violation, independent of whether the signature itself would verify.
#[test]
fn multisig_protocol_bug_violation_in_locking_script() {
    let pk = { let mut k = vec![0x02]; k.extend_from_slice(&[0xaa; 32]); k };
    let sig = { let mut s = vec![0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x01]; s.push(0x41); s };

    let mut locking = vec![OP_1]; // m = 1
    push(&mut locking, &pk);
    locking.push(OP_1); // n = 1
    locking.push(OP_CHECKMULTISIG);

    let mut unlocking = vec![OP_1]; // non-empty dummy: protocol-bug violation
    push(&mut unlocking, &sig);

    let program = AuthenticationProgram::new(unlocking, locking, external());
    let state = program.evaluate();
    assert_eq!(state.error, Some(ScriptError::InvalidProtocolBugValue));
}

/// A garden-variety P2PKH failure: wrong public key hash.
#[test]
fn p2pkh_wrong_pubkey_hash_fails_verify() {
    let pk = { let mut k = vec![0x02]; k.extend_from_slice(&[0xaa; 32]); k };
    let sig = { let mut s = vec![0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x01]; s.push(0x41); s };
    let wrong_hash = [0xff; 20];

    let mut locking = vec![OP_DUP, OP_HASH160, 0x14];
    locking.extend_from_slice(&wrong_hash);
    locking.push(OP_EQUALVERIFY);
    locking.push(OP_CHECKSIG);

    let mut unlocking = Vec::new();
    push(&mut unlocking, &sig);
    push(&mut unlocking, &pk);

    let program = AuthenticationProgram::new(unlocking, locking, external());
    let state = program.evaluate();
    assert_eq!(state.error, Some(ScriptError::VerifyFailed));
}

#[test]
fn stack_hand_off_carries_unlocking_result_into_locking_phase() {
    // Unlocking leaves two items on the stack; locking only checks the top.
    let unlocking = vec![OP_1, OP_2];
    let locking = vec![OP_2, OP_EQUAL];

    let program = AuthenticationProgram::new(unlocking, locking, external());
    let state = program.evaluate();
    assert!(is_valid(&state));
}

#[test]
fn debug_pipeline_three_phases_for_p2sh() {
    let redeem_script = vec![OP_1, OP_1, OP_EQUAL];
    let redeem_hash = hash::hash160(&redeem_script);
    let mut locking = vec![OP_HASH160, 0x14];
    locking.extend_from_slice(&redeem_hash);
    locking.push(OP_EQUAL);

    let mut unlocking = Vec::new();
    push(&mut unlocking, &redeem_script);

    let program = AuthenticationProgram::new(unlocking, locking, external());
    let (state, phases) = program.debug();
    assert!(is_valid(&state));
    assert_eq!(phases.len(), 3);
    assert_eq!(phases[2].0, "p2sh");
}
