//! Opcode byte constants for the BCH_2019May ruleset.
//!
//! Unlike the teacher crate's `Opcode` enum, the VM dispatches directly on
//! the raw byte (`Opcode = u8`) because [`crate::operators`] keys a
//! `[Option<Operator>; 256]` table by it — the enum layer added nothing once
//! the operator table itself carries the mnemonic.

/// A raw opcode byte. Kept as a type alias (not a newtype) so table
/// indexing (`table[opcode as usize]`) stays unergonomic-free.
pub type Opcode = u8;

pub const OP_0: Opcode = 0x00;
// 0x01..=0x4b: OP_PUSHBYTES_1..75, constant pushes of that many bytes.
pub const OP_PUSHDATA1: Opcode = 0x4c;
pub const OP_PUSHDATA2: Opcode = 0x4d;
pub const OP_PUSHDATA4: Opcode = 0x4e;
pub const OP_1NEGATE: Opcode = 0x4f;
pub const OP_RESERVED: Opcode = 0x50;
pub const OP_1: Opcode = 0x51;
pub const OP_2: Opcode = 0x52;
pub const OP_3: Opcode = 0x53;
pub const OP_4: Opcode = 0x54;
pub const OP_5: Opcode = 0x55;
pub const OP_6: Opcode = 0x56;
pub const OP_7: Opcode = 0x57;
pub const OP_8: Opcode = 0x58;
pub const OP_9: Opcode = 0x59;
pub const OP_10: Opcode = 0x5a;
pub const OP_11: Opcode = 0x5b;
pub const OP_12: Opcode = 0x5c;
pub const OP_13: Opcode = 0x5d;
pub const OP_14: Opcode = 0x5e;
pub const OP_15: Opcode = 0x5f;
pub const OP_16: Opcode = 0x60;

pub const OP_NOP: Opcode = 0x61;
pub const OP_VER: Opcode = 0x62;
pub const OP_IF: Opcode = 0x63;
pub const OP_NOTIF: Opcode = 0x64;
pub const OP_VERIF: Opcode = 0x65;
pub const OP_VERNOTIF: Opcode = 0x66;
pub const OP_ELSE: Opcode = 0x67;
pub const OP_ENDIF: Opcode = 0x68;
pub const OP_VERIFY: Opcode = 0x69;
pub const OP_RETURN: Opcode = 0x6a;

pub const OP_TOALTSTACK: Opcode = 0x6b;
pub const OP_FROMALTSTACK: Opcode = 0x6c;
pub const OP_2DROP: Opcode = 0x6d;
pub const OP_2DUP: Opcode = 0x6e;
pub const OP_3DUP: Opcode = 0x6f;
pub const OP_2OVER: Opcode = 0x70;
pub const OP_2ROT: Opcode = 0x71;
pub const OP_2SWAP: Opcode = 0x72;
pub const OP_IFDUP: Opcode = 0x73;
pub const OP_DEPTH: Opcode = 0x74;
pub const OP_DROP: Opcode = 0x75;
pub const OP_DUP: Opcode = 0x76;
pub const OP_NIP: Opcode = 0x77;
pub const OP_OVER: Opcode = 0x78;
pub const OP_PICK: Opcode = 0x79;
pub const OP_ROLL: Opcode = 0x7a;
pub const OP_ROT: Opcode = 0x7b;
pub const OP_SWAP: Opcode = 0x7c;
pub const OP_TUCK: Opcode = 0x7d;

pub const OP_CAT: Opcode = 0x7e;
pub const OP_SPLIT: Opcode = 0x7f;
pub const OP_NUM2BIN: Opcode = 0x80;
pub const OP_BIN2NUM: Opcode = 0x81;
pub const OP_SIZE: Opcode = 0x82;

pub const OP_INVERT: Opcode = 0x83;
pub const OP_AND: Opcode = 0x84;
pub const OP_OR: Opcode = 0x85;
pub const OP_XOR: Opcode = 0x86;
pub const OP_EQUAL: Opcode = 0x87;
pub const OP_EQUALVERIFY: Opcode = 0x88;
pub const OP_RESERVED1: Opcode = 0x89;
pub const OP_RESERVED2: Opcode = 0x8a;

pub const OP_1ADD: Opcode = 0x8b;
pub const OP_1SUB: Opcode = 0x8c;
pub const OP_2MUL: Opcode = 0x8d;
pub const OP_2DIV: Opcode = 0x8e;
pub const OP_NEGATE: Opcode = 0x8f;
pub const OP_ABS: Opcode = 0x90;
pub const OP_NOT: Opcode = 0x91;
pub const OP_0NOTEQUAL: Opcode = 0x92;
pub const OP_ADD: Opcode = 0x93;
pub const OP_SUB: Opcode = 0x94;
pub const OP_MUL: Opcode = 0x95;
pub const OP_DIV: Opcode = 0x96;
pub const OP_MOD: Opcode = 0x97;
pub const OP_LSHIFT: Opcode = 0x98;
pub const OP_RSHIFT: Opcode = 0x99;

pub const OP_BOOLAND: Opcode = 0x9a;
pub const OP_BOOLOR: Opcode = 0x9b;
pub const OP_NUMEQUAL: Opcode = 0x9c;
pub const OP_NUMEQUALVERIFY: Opcode = 0x9d;
pub const OP_NUMNOTEQUAL: Opcode = 0x9e;
pub const OP_LESSTHAN: Opcode = 0x9f;
pub const OP_GREATERTHAN: Opcode = 0xa0;
pub const OP_LESSTHANOREQUAL: Opcode = 0xa1;
pub const OP_GREATERTHANOREQUAL: Opcode = 0xa2;
pub const OP_MIN: Opcode = 0xa3;
pub const OP_MAX: Opcode = 0xa4;
pub const OP_WITHIN: Opcode = 0xa5;

pub const OP_RIPEMD160: Opcode = 0xa6;
pub const OP_SHA1: Opcode = 0xa7;
pub const OP_SHA256: Opcode = 0xa8;
pub const OP_HASH160: Opcode = 0xa9;
pub const OP_HASH256: Opcode = 0xaa;
pub const OP_CODESEPARATOR: Opcode = 0xab;
pub const OP_CHECKSIG: Opcode = 0xac;
pub const OP_CHECKSIGVERIFY: Opcode = 0xad;
pub const OP_CHECKMULTISIG: Opcode = 0xae;
pub const OP_CHECKMULTISIGVERIFY: Opcode = 0xaf;

pub const OP_NOP1: Opcode = 0xb0;
pub const OP_CHECKLOCKTIMEVERIFY: Opcode = 0xb1;
pub const OP_CHECKSEQUENCEVERIFY: Opcode = 0xb2;
pub const OP_NOP4: Opcode = 0xb3;
pub const OP_NOP5: Opcode = 0xb4;
pub const OP_NOP6: Opcode = 0xb5;
pub const OP_NOP7: Opcode = 0xb6;
pub const OP_NOP8: Opcode = 0xb7;
pub const OP_NOP9: Opcode = 0xb8;
pub const OP_NOP10: Opcode = 0xb9;

pub const OP_CHECKDATASIG: Opcode = 0xba;
pub const OP_CHECKDATASIGVERIFY: Opcode = 0xbb;

/// True for the 1..75 direct-push range (`OP_PUSHBYTES_N`).
pub fn is_direct_push(opcode: Opcode) -> bool {
    (0x01..=0x4b).contains(&opcode)
}

/// `OP_1NEGATE`/`OP_1`..`OP_16`, used by P2SH push-only detection (spec
/// §4.6: any unlocking-script opcode `>= OP_16` fails the script).
pub fn is_small_num(opcode: Opcode) -> bool {
    opcode == OP_1NEGATE || (OP_1..=OP_16).contains(&opcode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_range_is_1_to_75() {
        assert!(!is_direct_push(0x00));
        assert!(is_direct_push(0x01));
        assert!(is_direct_push(0x4b));
        assert!(!is_direct_push(0x4c));
    }

    #[test]
    fn small_num_boundaries() {
        assert!(is_small_num(OP_1NEGATE));
        assert!(is_small_num(OP_1));
        assert!(is_small_num(OP_16));
        assert!(!is_small_num(OP_NOP));
        assert!(!is_small_num(OP_0));
    }
}
