use core::fmt;

use crate::opcode;

/// Errors that can occur when decoding a bytecode buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The byte at the offset is not a defined opcode.
    UnknownOpcode { offset: usize, opcode: u8 },
    /// The buffer ends before the instruction's operands.
    Truncated { offset: usize, opcode: u8 },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::UnknownOpcode { offset, opcode } => {
                write!(f, "unknown opcode 0x{opcode:02X} at offset {offset}")
            }
            DecodeError::Truncated { offset, opcode } => {
                let name = opcode::name(*opcode).unwrap_or("?");
                write!(f, "truncated {name} instruction at offset {offset}")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DecodeError {}

/// Errors that can occur when assembling bytecode with a builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// A branch refers to a label that was never bound.
    UnboundLabel(u16),
    /// A label was bound at more than one position.
    DuplicateLabel(u16),
    /// The distance between a branch and its label does not fit in the
    /// branch's offset operand.
    OffsetOutOfRange { from: usize, to: usize },
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::UnboundLabel(l) => write!(f, "label {l} is never bound"),
            BuildError::DuplicateLabel(l) => write!(f, "label {l} is bound more than once"),
            BuildError::OffsetOutOfRange { from, to } => {
                write!(f, "branch from {from} to {to} does not fit the offset operand")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for BuildError {}

#[cfg(all(test, feature = "std"))]
mod tests {
    use std::string::ToString;

    use super::*;

    #[test]
    fn display_when_truncated_then_names_opcode() {
        let err = DecodeError::Truncated {
            offset: 3,
            opcode: opcode::SIPUSH,
        };
        assert_eq!(err.to_string(), "truncated sipush instruction at offset 3");
    }

    #[test]
    fn display_when_unknown_opcode_then_hex_value() {
        let err = DecodeError::UnknownOpcode {
            offset: 0,
            opcode: 0xCB,
        };
        assert_eq!(err.to_string(), "unknown opcode 0xCB at offset 0");
    }
}
