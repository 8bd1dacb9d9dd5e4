//! The virtual machine (spec component C6, §4.5).
//!
//! Generic over [`InstructionSet`] so swapping rulesets means constructing a
//! `VirtualMachine` with a different instruction set, not branching inside
//! the VM itself.

use crate::crypto::CryptoProvider;
use crate::instruction_set::InstructionSet;
use crate::operators::asm;
use crate::state::ProgramState;

/// A single recorded step, produced by [`VirtualMachine::debug`].
#[derive(Debug, Clone)]
pub struct DebugStep {
    pub ip: i32,
    pub asm: String,
    pub stack_depth: usize,
    pub error: Option<crate::error::ScriptError>,
}

pub struct VirtualMachine<I: InstructionSet> {
    instructions: I,
}

impl<I: InstructionSet> VirtualMachine<I> {
    pub fn new(instructions: I) -> Self {
        VirtualMachine { instructions }
    }

    /// Advances `state` by exactly one opcode, if any remain. Returns `true`
    /// if a step was taken.
    pub fn step(&self, state: &mut ProgramState, crypto: &dyn CryptoProvider) -> bool {
        if !self.instructions.before(state) {
            return false;
        }
        log::trace!("ip={} opcode=0x{:02x}", state.ip, state.script[state.ip as usize]);
        self.instructions.operate(state, crypto);
        if let Some(err) = state.error {
            log::debug!("script evaluation halted at ip={}: {err}", state.ip);
        }
        true
    }

    /// Runs `state` to completion: repeated `step` calls until the script is
    /// exhausted or an error halts evaluation.
    pub fn evaluate(&self, mut state: ProgramState, crypto: &dyn CryptoProvider) -> ProgramState {
        while self.instructions.continue_(&state) {
            if !self.step(&mut state, crypto) {
                break;
            }
        }
        state
    }

    /// Runs `state` to completion like [`Self::evaluate`], additionally
    /// recording a [`DebugStep`] after each opcode (spec §4.7's debug
    /// driver).
    pub fn debug(&self, mut state: ProgramState, crypto: &dyn CryptoProvider) -> (ProgramState, Vec<DebugStep>) {
        let mut trace = Vec::new();
        while self.instructions.continue_(&state) {
            if !self.step(&mut state, crypto) {
                break;
            }
            trace.push(DebugStep {
                ip: state.ip,
                asm: asm(self.instructions.operator_table(), &state),
                stack_depth: state.stack.len(),
                error: state.error,
            });
        }
        (state, trace)
    }
}
