/// All error conditions that can arise while decoding or executing a script.
///
/// This is the closed taxonomy of consensus-relevant failures: once a
/// [`ScriptError`] is attached to a [`crate::state::ProgramState`], evaluation
/// halts and no further operator runs. It deliberately excludes host-level
/// concerns (hex parsing) that live in [`HostError`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptError {
    /// A pop (or peek) was attempted against an empty stack.
    EmptyStack,
    /// A byte sequence does not decode as a minimal script number.
    InvalidScriptNumber,
    /// A public key is neither a valid compressed nor uncompressed SEC point.
    InvalidPublicKeyEncoding,
    /// A signature is not `strict DER(r, s) || hashType` with low-S `s`
    /// and a recognized `hashType`.
    InvalidSignatureEncoding,
    /// A natural-number argument (e.g. a multisig key/sig count) is negative
    /// or otherwise not a valid count.
    InvalidNaturalNumber,
    /// A push instruction's declared length runs past the end of the script.
    MalformedPush,
    /// A push used a longer encoding than the minimal one for its payload.
    NonMinimalPush,
    /// A push's payload exceeds the 520-byte maximum stack element size.
    ExceedsMaximumPush,
    /// `OP_CHECKMULTISIG`'s required-signature count `m` exceeds its
    /// public-key count `n`.
    InsufficientPublicKeys,
    /// `OP_CHECKMULTISIG`'s public-key count `n` exceeds 20.
    ExceedsMaximumMultisigPublicKeyCount,
    /// `OP_CHECKMULTISIG`'s dummy element was not the empty element.
    InvalidProtocolBugValue,
    /// `operationCount` would exceed 201.
    ExceededMaximumOperationCount,
    /// The opcode byte has no entry in the operator table.
    UnknownOpcode,
    /// The opcode byte is reserved/disabled in this ruleset.
    DisabledOpcode,
    /// A P2SH unlocking script contained a non-push opcode.
    P2shPushOnly,
    /// A P2SH unlocking script left an empty stack for the redeem script pop.
    P2shEmptyStack,
    /// `OP_IF`/`OP_NOTIF` was not matched by a closing `OP_ENDIF`.
    UnbalancedConditional,
    /// `OP_VERIFY`, `OP_EQUALVERIFY`, or `OP_CHECKSIGVERIFY` consumed a
    /// falsy value.
    VerifyFailed,
    /// `OP_RETURN` was reached while executing.
    OpReturnEncountered,
}

impl std::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScriptError::EmptyStack => write!(f, "stack underflow: not enough elements on the stack"),
            ScriptError::InvalidScriptNumber => write!(f, "non-minimal or oversized script number encoding"),
            ScriptError::InvalidPublicKeyEncoding => write!(f, "public key is neither compressed nor uncompressed"),
            ScriptError::InvalidSignatureEncoding => {
                write!(f, "signature is not strict-DER low-S with a recognized hash type")
            }
            ScriptError::InvalidNaturalNumber => write!(f, "expected a non-negative count"),
            ScriptError::MalformedPush => write!(f, "push instruction runs past the end of the script"),
            ScriptError::NonMinimalPush => write!(f, "data push larger than necessary"),
            ScriptError::ExceedsMaximumPush => write!(f, "push exceeds the maximum stack element size"),
            ScriptError::InsufficientPublicKeys => write!(f, "required signature count exceeds public key count"),
            ScriptError::ExceedsMaximumMultisigPublicKeyCount => write!(f, "public key count exceeds 20"),
            ScriptError::InvalidProtocolBugValue => {
                write!(f, "CHECKMULTISIG dummy argument must be the empty element")
            }
            ScriptError::ExceededMaximumOperationCount => write!(f, "operation count exceeds 201"),
            ScriptError::UnknownOpcode => write!(f, "opcode missing or not understood"),
            ScriptError::DisabledOpcode => write!(f, "attempted to use a disabled opcode"),
            ScriptError::P2shPushOnly => write!(f, "P2SH unlocking script contains a non-push operation"),
            ScriptError::P2shEmptyStack => write!(f, "P2SH unlocking script left an empty stack"),
            ScriptError::UnbalancedConditional => write!(f, "unbalanced conditional: mismatched IF/ELSE/ENDIF"),
            ScriptError::VerifyFailed => write!(f, "verify failed: top stack element is false"),
            ScriptError::OpReturnEncountered => write!(f, "OP_RETURN encountered: script is unspendable"),
        }
    }
}

impl std::error::Error for ScriptError {}

/// Errors from host-facing byte/hex handling, kept separate from
/// [`ScriptError`] because they never reach a [`crate::state::ProgramState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostError {
    /// A hex string had an odd length or a non-hex-digit character.
    InvalidHex,
}

impl std::fmt::Display for HostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostError::InvalidHex => write!(f, "invalid hex string"),
        }
    }
}

impl std::error::Error for HostError {}
