//! Program state: the structured state threaded through evaluation, plus
//! the error-injection helper (spec component C8, §3, §4.7).

use crate::error::ScriptError;
use crate::stack::Stack;

/// The immutable transaction context a program evaluates against (spec §3).
///
/// Supplied once at construction and never mutated during evaluation; every
/// phase of the pipeline (§4.6) shares the same `ExternalProgramState`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalProgramState {
    pub version: u32,
    pub transaction_outpoints_hash: [u8; 32],
    pub transaction_sequence_numbers_hash: [u8; 32],
    pub outpoint_transaction_hash: [u8; 32],
    pub corresponding_output_hash: [u8; 32],
    pub transaction_outputs_hash: [u8; 32],
    pub outpoint_index: u32,
    pub outpoint_value: u64,
    pub sequence_number: u32,
    pub locktime: u32,
    pub block_height: u32,
    pub block_time: u32,
}

/// The full program state threaded through the VM's `step`/`evaluate` loop.
///
/// `ip` starts at -1 so the instruction set's first `before` call advances it
/// to 0 before reading the opcode there (spec §3).
#[derive(Debug, Clone)]
pub struct ProgramState {
    pub external: ExternalProgramState,

    pub script: Vec<u8>,
    pub ip: i32,
    pub last_code_separator: i32,
    pub operation_count: u32,
    pub operations: Vec<u8>,
    pub stack: Stack,
    pub alt_stack: Stack,
    pub error: Option<ScriptError>,

    /// Tracks nested `OP_IF`/`OP_NOTIF` branches: `true` at every level means
    /// the current position is executing. Not named in the external state
    /// model (spec §3 describes pushes/pops/operation bookkeeping only) but
    /// required bookkeeping for conditional dispatch, the same role the
    /// teacher crate's `exec_stack: Vec<bool>` in `engine.rs` played.
    pub conditional_stack: Vec<bool>,
}

impl ProgramState {
    /// Builds a fresh state for evaluating `script` with an empty stack.
    pub fn new(script: Vec<u8>, external: ExternalProgramState) -> Self {
        ProgramState {
            external,
            script,
            ip: -1,
            last_code_separator: -1,
            operation_count: 0,
            operations: Vec::new(),
            stack: Stack::new(),
            alt_stack: Stack::new(),
            error: None,
            conditional_stack: Vec::new(),
        }
    }

    /// Builds the initial state for the next phase of the pipeline (spec
    /// §4.6's "stack hand-off"): `script` changes, `stack` carries over by
    /// value, and `ip`/`lastCodeSeparator`/`operationCount`/`operations`
    /// reset to their initial values.
    pub fn next_phase(self, script: Vec<u8>) -> Self {
        ProgramState {
            external: self.external,
            script,
            ip: -1,
            last_code_separator: -1,
            operation_count: 0,
            operations: Vec::new(),
            stack: self.stack,
            alt_stack: Stack::new(),
            error: None,
            conditional_stack: Vec::new(),
        }
    }

    /// `true` iff every enclosing `OP_IF`/`OP_NOTIF` branch is on its taken
    /// side — i.e. instructions at the current position should have effect.
    pub fn is_executing(&self) -> bool {
        self.conditional_stack.iter().all(|&v| v)
    }

    /// `true` once `ip` has reached the end of `script` or an error halted
    /// evaluation — the negation of the instruction set's `continue`
    /// predicate (spec §4.4).
    pub fn is_terminal(&self) -> bool {
        self.error.is_some() || self.ip as isize >= self.script.len() as isize
    }

    /// The opcode byte at the current instruction pointer, if any remains.
    pub fn current_opcode(&self) -> Option<u8> {
        if self.ip < 0 {
            return None;
        }
        self.script.get(self.ip as usize).copied()
    }
}

/// Returns a copy of `state` with `error` set to `kind`; all other fields
/// are left intact so a debug snapshot captures the state at the point of
/// failure (spec §4.7). Mutates in place and hands ownership back, matching
/// the "mutable state passed by value" design note (spec §9).
pub fn apply_error(kind: ScriptError, mut state: ProgramState) -> ProgramState {
    state.error = Some(kind);
    state
}
