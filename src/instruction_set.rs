//! Instruction set (spec component C5, §4.4).
//!
//! Bridges the raw operator table with the per-step bookkeeping every
//! instruction set variant shares: advancing `ip`, recording the opcode into
//! `operations`, and capping `operationCount`. A future ruleset (e.g. a
//! pre-2019 BCH upgrade without `OP_CHECKDATASIG`) would implement this trait
//! with a different operator table rather than branching inside the VM.

use crate::crypto::CryptoProvider;
use crate::error::ScriptError;
use crate::operators::{build_operator_table, OperatorTable, MAX_OPERATION_COUNT};
use crate::state::ProgramState;

/// A family of opcodes plus the bookkeeping rules that govern them.
pub trait InstructionSet {
    /// Advances `state` to the next opcode and accounts for it, without
    /// running its operation. Returns `false` once the script is exhausted.
    fn before(&self, state: &mut ProgramState) -> bool;

    /// Runs the current opcode's operation against `state`, if one exists.
    fn operate(&self, state: &mut ProgramState, crypto: &dyn CryptoProvider);

    /// `true` while `state` can still make progress.
    fn continue_(&self, state: &ProgramState) -> bool {
        !state.is_terminal()
    }

    fn operator_table(&self) -> &OperatorTable;
}

/// The BCH_2019May ruleset's instruction set: the full operator table built
/// by [`crate::operators::build_operator_table`], with the ≤201 consensus
/// operation-count cap applied to every non-push opcode (spec §3; push
/// opcodes and `OP_CHECKMULTISIG`'s own per-key accounting are exempted/
/// extended exactly as spec'd).
pub struct Bch2019InstructionSet {
    table: OperatorTable,
}

impl Bch2019InstructionSet {
    pub fn new() -> Self {
        Bch2019InstructionSet { table: build_operator_table() }
    }
}

impl Default for Bch2019InstructionSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Opcodes that always dispatch regardless of the current conditional
/// branch: the whole push family (so payload bytes are still consumed and
/// `ip` still advances correctly) and the four branch opcodes themselves.
fn always_dispatches(opcode: u8) -> bool {
    use crate::opcode::{OP_ELSE, OP_ENDIF, OP_IF, OP_NOTIF, OP_PUSHDATA4};
    opcode <= OP_PUSHDATA4 || matches!(opcode, OP_IF | OP_NOTIF | OP_ELSE | OP_ENDIF)
}

impl InstructionSet for Bch2019InstructionSet {
    fn before(&self, state: &mut ProgramState) -> bool {
        state.ip += 1;
        if state.is_terminal() {
            return false;
        }
        let opcode = state.script[state.ip as usize];
        state.operations.push(opcode);

        // OP_CHECKMULTISIG bills its own per-key count on top of this.
        if opcode != crate::opcode::OP_CHECKMULTISIG && opcode != crate::opcode::OP_CHECKMULTISIGVERIFY {
            state.operation_count += 1;
            if state.operation_count > MAX_OPERATION_COUNT {
                state.error = Some(ScriptError::ExceededMaximumOperationCount);
                return false;
            }
        }
        true
    }

    fn operate(&self, state: &mut ProgramState, crypto: &dyn CryptoProvider) {
        let Some(opcode) = state.current_opcode() else { return };

        if !always_dispatches(opcode) && !state.is_executing() {
            return;
        }

        match &self.table[opcode as usize] {
            Some(op) => (op.operation)(state, crypto),
            None => state.error = Some(ScriptError::UnknownOpcode),
        }
    }

    fn operator_table(&self) -> &OperatorTable {
        &self.table
    }
}
