//! A Bitcoin Cash Script evaluation engine, built for education and tooling.
//!
//! Bitcoin Script is the stack-based programming language used to define
//! spending conditions for Bitcoin transaction outputs. This crate
//! implements the BCH_2019May operator set and the unlocking/locking/P2SH
//! phase pipeline that decides whether a pair of scripts, together with the
//! transaction context they authorize, evaluates to a truthy final stack.
//!
//! # Consensus warning
//!
//! **This crate is NOT consensus-compatible with Bitcoin Core or any BCH
//! full node.**
//!
//! A reimplementation of Bitcoin Script cannot guarantee identical behavior
//! to a production C++ interpreter across all edge cases — number encoding
//! boundaries, error ordering, stack overflow semantics, and other subtle
//! behaviors that define consensus rules.
//!
//! **Do not use this crate to validate real transactions or protect real
//! funds.**
//!
//! This crate is intended for:
//! - **Education** — learning how Bitcoin Script works internally
//! - **Tooling** — script inspection, debugging, and construction
//! - **Testing** — validating script logic before broadcast
//!
//! # What this crate implements
//!
//! - **Operator table** ([`operators`]): the full BCH_2019May opcode set —
//!   pushes, stack manipulation, splice/bitwise, arithmetic, flow control,
//!   and crypto operators including `OP_CHECKSIG`, `OP_CHECKMULTISIG`, and
//!   `OP_CHECKDATASIG`.
//! - **Virtual machine** ([`vm`], [`instruction_set`]): a generic
//!   step/evaluate/debug driver with a ≤201 operation-count cap.
//! - **Phase pipeline** ([`program`]): unlocking → locking → (optional)
//!   P2SH orchestration, with stack hand-off and the final validity
//!   predicate.
//! - **Signing serialization** ([`sighash`]): the BIP-143-style preimage
//!   and digest `OP_CHECKSIG`/`OP_CHECKMULTISIG` verify against.
//! - **Encoding checks** ([`encoding`]): strict-DER low-S signatures and SEC
//!   public keys.
//! - **Script numbers** ([`number`]): the minimal, sign-and-magnitude
//!   integer encoding used throughout Script.
//! - **Hash functions** ([`hash`]): SHA-1, SHA-256, RIPEMD-160, HASH160,
//!   and HASH256.
//!
//! # What is NOT implemented
//!
//! - SegWit, Taproot, or any witness-based script types
//! - `OP_CHECKLOCKTIMEVERIFY`/`OP_CHECKSEQUENCEVERIFY` (treated as `OP_NOP`,
//!   matching pre-activation behavior; no block/transaction context is
//!   modeled deeply enough to enforce them)
//!
//! # Crypto providers
//!
//! The VM never calls `secp256k1`/`sha2`/`ripemd` directly; every crypto
//! operator goes through a [`crypto::CryptoProvider`] held by reference.
//! [`crypto::Secp256k1CryptoProvider`] is the production implementation;
//! a deterministic [`crypto::StubCryptoProvider`] is available under the
//! `test-util` feature for driving `OP_CHECKSIG`/`OP_CHECKMULTISIG`
//! scenarios without real keypairs.
//!
//! # Security disclaimer
//!
//! **This crate is NOT consensus-compatible with Bitcoin Core.** It must
//! not be used to validate real transactions or protect real funds.
//!
//! # Quick example
//!
//! ```rust
//! use bch_script_vm::program::{AuthenticationProgram, is_valid};
//! use bch_script_vm::state::ExternalProgramState;
//!
//! let external = ExternalProgramState {
//!     version: 2,
//!     transaction_outpoints_hash: [0; 32],
//!     transaction_sequence_numbers_hash: [0; 32],
//!     outpoint_transaction_hash: [0; 32],
//!     corresponding_output_hash: [0; 32],
//!     transaction_outputs_hash: [0; 32],
//!     outpoint_index: 0,
//!     outpoint_value: 0,
//!     sequence_number: 0xffff_ffff,
//!     locktime: 0,
//!     block_height: 0,
//!     block_time: 0,
//! };
//!
//! // Unlocking: OP_1. Locking: OP_1 OP_EQUAL.
//! let program = AuthenticationProgram::new(vec![0x51], vec![0x51, 0x87], external);
//! assert!(is_valid(&program.evaluate()));
//! ```

pub mod crypto;
pub mod encoding;
pub mod error;
pub mod hash;
pub mod hex;
pub mod instruction_set;
pub mod number;
pub mod opcode;
pub mod operators;
pub mod program;
pub mod sighash;
pub mod state;
pub mod stack;
pub mod vm;
