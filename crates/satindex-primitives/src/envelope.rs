//! Best-effort detection of inscription envelopes.
//!
//! The index flags outputs whose script is an OP_RETURN carrying the `ord`
//! marker as its first push. Payloads are never decoded; callers that do not
//! care about inscriptions can ignore the flag entirely.

use bitcoin::opcodes::all::OP_RETURN;
use bitcoin::script::{Instruction, Script};

/// Marker identifying an inscription envelope.
const ENVELOPE_TAG: &[u8] = b"ord";

/// Whether the script looks like an inscription envelope.
pub fn script_carries_envelope(script: &Script) -> bool {
    let mut instructions = script.instructions();

    match instructions.next() {
        Some(Ok(Instruction::Op(op))) if op == OP_RETURN => {}
        _ => return false,
    }

    matches!(
        instructions.next(),
        Some(Ok(Instruction::PushBytes(push))) if push.as_bytes() == ENVELOPE_TAG
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::script::Builder;

    #[test]
    fn test_detects_envelope_marker() {
        let script = Builder::new()
            .push_opcode(OP_RETURN)
            .push_slice(b"ord")
            .push_slice(b"payload")
            .into_script();
        assert!(script_carries_envelope(&script));
    }

    #[test]
    fn test_rejects_plain_op_return() {
        let script = Builder::new()
            .push_opcode(OP_RETURN)
            .push_slice(b"hello")
            .into_script();
        assert!(!script_carries_envelope(&script));
    }

    #[test]
    fn test_rejects_non_op_return() {
        let script = Builder::new().push_slice(b"ord").into_script();
        assert!(!script_carries_envelope(&script));

        assert!(!script_carries_envelope(&bitcoin::ScriptBuf::new()));
    }
}
