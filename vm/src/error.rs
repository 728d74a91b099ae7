use std::fmt;

use jemu_bytecode::opcode;

use crate::array::ElementType;
use crate::value::SlotKind;

/// Broad classification of a [`Trap`], for callers that only care about
/// the family of failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// An index, length or address outside its valid range.
    Bounds,
    /// A value of the wrong kind for the operation.
    TypeMismatch,
    /// An operation that is not valid in the frame's current state.
    InvalidState,
    /// An opcode the interpreter does not execute.
    UnknownOpcode,
    Arithmetic,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Bounds => "bounds",
            ErrorKind::TypeMismatch => "type mismatch",
            ErrorKind::InvalidState => "invalid state",
            ErrorKind::UnknownOpcode => "unknown opcode",
            ErrorKind::Arithmetic => "arithmetic",
        };
        f.write_str(s)
    }
}

/// Runtime traps that halt execution of a frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Trap {
    StackUnderflow,
    LocalIndexOutOfBounds(usize),
    ArrayIndexOutOfBounds { index: i32, length: usize },
    NegativeArraySize(i32),
    /// The program counter or an immediate operand is past the end of
    /// the bytecode.
    CodeOutOfBounds(usize),
    BranchOutOfBounds { from: usize, target: i64 },

    TypeMismatch { expected: SlotKind, found: SlotKind },
    ArrayTypeMismatch { opcode: u8, element: ElementType },
    NotAnArray(u8),
    NullReference(u8),
    UnknownArrayType(u8),
    NotAReturnAddress(usize),
    /// A host value that has no slot representation.
    UnsupportedObject,

    StackNotEmpty(usize),
    NestedSlot,
    WideOperand(u8),
    AlreadyReturned,

    UnknownOpcode(u8),
    ReservedOpcode(u8),

    DivideByZero,
}

impl Trap {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Trap::StackUnderflow
            | Trap::LocalIndexOutOfBounds(_)
            | Trap::ArrayIndexOutOfBounds { .. }
            | Trap::NegativeArraySize(_)
            | Trap::CodeOutOfBounds(_)
            | Trap::BranchOutOfBounds { .. } => ErrorKind::Bounds,
            Trap::TypeMismatch { .. }
            | Trap::ArrayTypeMismatch { .. }
            | Trap::NotAnArray(_)
            | Trap::NullReference(_)
            | Trap::UnknownArrayType(_)
            | Trap::NotAReturnAddress(_)
            | Trap::UnsupportedObject => ErrorKind::TypeMismatch,
            Trap::StackNotEmpty(_)
            | Trap::NestedSlot
            | Trap::WideOperand(_)
            | Trap::AlreadyReturned => ErrorKind::InvalidState,
            Trap::UnknownOpcode(_) | Trap::ReservedOpcode(_) => ErrorKind::UnknownOpcode,
            Trap::DivideByZero => ErrorKind::Arithmetic,
        }
    }
}

/// Formats an opcode as its mnemonic followed by the raw value.
pub(crate) struct OpName(pub u8);

impl fmt::Display for OpName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match opcode::name(self.0) {
            Some(name) => write!(f, "{name} [0x{:02X}]", self.0),
            None => write!(f, "0x{:02X}", self.0),
        }
    }
}

impl fmt::Display for Trap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trap::StackUnderflow => write!(f, "stack underflow"),
            Trap::LocalIndexOutOfBounds(i) => write!(f, "local index out of bounds: {i}"),
            Trap::ArrayIndexOutOfBounds { index, length } => {
                write!(f, "array index {index} out of bounds for length {length}")
            }
            Trap::NegativeArraySize(n) => write!(f, "negative array size: {n}"),
            Trap::CodeOutOfBounds(pc) => write!(f, "code out of bounds at pc {pc}"),
            Trap::BranchOutOfBounds { from, target } => {
                write!(f, "branch from pc {from} to {target} is out of bounds")
            }
            Trap::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected {expected}, found {found}")
            }
            Trap::ArrayTypeMismatch { opcode, element } => {
                write!(f, "{} cannot access a {element} array", OpName(*opcode))
            }
            Trap::NotAnArray(op) => write!(f, "{} operand is not an array", OpName(*op)),
            Trap::NullReference(op) => write!(f, "null reference in {}", OpName(*op)),
            Trap::UnknownArrayType(t) => write!(f, "unknown array type: {t}"),
            Trap::NotAReturnAddress(i) => write!(f, "local {i} does not hold a return address"),
            Trap::UnsupportedObject => write!(f, "value cannot be held in a slot"),
            Trap::StackNotEmpty(n) => write!(f, "stack not empty on return: {n} slots"),
            Trap::NestedSlot => write!(f, "a slot cannot hold another slot"),
            Trap::WideOperand(op) => {
                write!(f, "{} cannot operate on a wide value here", OpName(*op))
            }
            Trap::AlreadyReturned => write!(f, "frame has already returned"),
            Trap::UnknownOpcode(op) => write!(f, "unknown opcode: {}", OpName(*op)),
            Trap::ReservedOpcode(op) => write!(f, "reserved opcode: {}", OpName(*op)),
            Trap::DivideByZero => write!(f, "divide by zero"),
        }
    }
}

impl std::error::Error for Trap {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_when_unsupported_opcode_then_names_it() {
        let trap = Trap::UnknownOpcode(opcode::INVOKEVIRTUAL);

        assert_eq!(trap.to_string(), "unknown opcode: invokevirtual [0xB6]");
    }

    #[test]
    fn display_when_undefined_opcode_then_hex_only() {
        assert_eq!(Trap::UnknownOpcode(0xCB).to_string(), "unknown opcode: 0xCB");
    }

    #[test]
    fn kind_when_each_family_then_classified() {
        assert_eq!(Trap::StackUnderflow.kind(), ErrorKind::Bounds);
        assert_eq!(
            Trap::TypeMismatch {
                expected: SlotKind::Int,
                found: SlotKind::Long
            }
            .kind(),
            ErrorKind::TypeMismatch
        );
        assert_eq!(Trap::WideOperand(opcode::SWAP).kind(), ErrorKind::InvalidState);
        assert_eq!(Trap::ReservedOpcode(0xFE).kind(), ErrorKind::UnknownOpcode);
        assert_eq!(Trap::DivideByZero.kind(), ErrorKind::Arithmetic);
    }
}
