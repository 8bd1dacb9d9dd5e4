//! Phase pipeline (spec component C7, §4.6).
//!
//! Drives an [`AuthenticationProgram`] through its unlocking, locking, and
//! (conditionally) P2SH phases, handing the stack forward between them and
//! applying the final validity predicate.

use crate::crypto::CryptoProvider;
use crate::error::ScriptError;
use crate::instruction_set::Bch2019InstructionSet;
use crate::opcode::OP_16;
use crate::stack::is_true;
use crate::state::{ExternalProgramState, ProgramState};
use crate::vm::{DebugStep, VirtualMachine};

/// An unlocking/locking script pair evaluated against a transaction context.
pub struct AuthenticationProgram {
    pub unlocking_script: Vec<u8>,
    pub locking_script: Vec<u8>,
    pub external: ExternalProgramState,
}

/// The `OP_HASH160 OP_PUSHBYTES_20 <20 bytes> OP_EQUAL` template that
/// triggers the P2SH phase (spec §4.6 step 3).
fn is_p2sh_locking_script(script: &[u8]) -> bool {
    script.len() == 23
        && script[0] == crate::opcode::OP_HASH160
        && script[1] == 0x14
        && script[22] == crate::opcode::OP_EQUAL
}

impl AuthenticationProgram {
    pub fn new(unlocking_script: Vec<u8>, locking_script: Vec<u8>, external: ExternalProgramState) -> Self {
        AuthenticationProgram { unlocking_script, locking_script, external }
    }

    /// Runs the phase pipeline to completion and returns the final phase's
    /// terminal state. Use [`is_valid`] to apply the final validity
    /// predicate to the result.
    pub fn evaluate(&self) -> ProgramState {
        let crypto = crate::crypto::Secp256k1CryptoProvider;
        let vm = VirtualMachine::new(Bch2019InstructionSet::new());

        let unlocking_state = ProgramState::new(self.unlocking_script.clone(), self.external.clone());
        let unlocking_state = vm.evaluate(unlocking_state, &crypto);
        if unlocking_state.error.is_some() {
            return unlocking_state;
        }

        let locking_state = unlocking_state.next_phase(self.locking_script.clone());
        let locking_state = vm.evaluate(locking_state, &crypto);
        if locking_state.error.is_some() || !is_p2sh_locking_script(&self.locking_script) {
            return locking_state;
        }

        if locking_state.operations.iter().any(|&op| op >= OP_16) {
            return finish_with_error(locking_state, ScriptError::P2shPushOnly);
        }
        if locking_state.stack.is_empty() {
            return finish_with_error(locking_state, ScriptError::P2shEmptyStack);
        }

        let mut redeem_state = locking_state;
        let redeem_script = redeem_state.stack.pop().expect("checked non-empty above");
        let redeem_state = redeem_state.next_phase(redeem_script);
        vm.evaluate(redeem_state, &crypto)
    }

    /// Like [`evaluate`], but additionally returns a concatenated debug
    /// trace across every phase, with a phase-label pseudo-step inserted
    /// before each phase (spec §4.6's debug pipeline).
    pub fn debug(&self) -> (ProgramState, Vec<(String, Vec<DebugStep>)>) {
        let crypto = crate::crypto::Secp256k1CryptoProvider;
        let vm = VirtualMachine::new(Bch2019InstructionSet::new());
        let mut phases = Vec::new();

        let unlocking_state = ProgramState::new(self.unlocking_script.clone(), self.external.clone());
        let (unlocking_state, unlocking_trace) = vm.debug(unlocking_state, &crypto);
        phases.push((String::from("unlocking"), unlocking_trace));
        if unlocking_state.error.is_some() {
            return (unlocking_state, phases);
        }

        let locking_state = unlocking_state.next_phase(self.locking_script.clone());
        let (locking_state, locking_trace) = vm.debug(locking_state, &crypto);
        phases.push((String::from("locking"), locking_trace));
        if locking_state.error.is_some() || !is_p2sh_locking_script(&self.locking_script) {
            return (locking_state, phases);
        }

        if locking_state.operations.iter().any(|&op| op >= OP_16) {
            let failed = finish_with_error(locking_state, ScriptError::P2shPushOnly);
            phases.push((String::from("p2sh:error"), Vec::new()));
            return (failed, phases);
        }
        if locking_state.stack.is_empty() {
            let failed = finish_with_error(locking_state, ScriptError::P2shEmptyStack);
            phases.push((String::from("p2sh:error"), Vec::new()));
            return (failed, phases);
        }

        let mut redeem_state = locking_state;
        let redeem_script = redeem_state.stack.pop().expect("checked non-empty above");
        let redeem_state = redeem_state.next_phase(redeem_script);
        let (redeem_state, redeem_trace) = vm.debug(redeem_state, &crypto);
        phases.push((String::from("p2sh"), redeem_trace));

        (redeem_state, phases)
    }
}

fn finish_with_error(mut state: ProgramState, kind: ScriptError) -> ProgramState {
    state.error = Some(kind);
    state
}

/// The final validity predicate (spec §4.6): no error, exactly one element
/// on the stack, and that element is truthy.
///
/// The JavaScript source this engine is modeled on reads this condition
/// inverted (`state.error !== undefined`); that is a known bug in the
/// original and is not reproduced here (spec §9).
pub fn is_valid(state: &ProgramState) -> bool {
    state.error.is_none() && state.stack.len() == 1 && state.stack.peek().map(is_true).unwrap_or(false)
}
