//! Instruction boundaries and decoding.
//!
//! [`operand_length`] is available without `std` so that tools can walk a
//! buffer without allocating; [`decode`] collects the whole buffer into
//! [`Instruction`] values.

use crate::error::DecodeError;
use crate::opcode::{self, *};

#[cfg(feature = "std")]
use std::vec::Vec;

/// Returns the number of operand bytes that follow the opcode at `offset`.
///
/// The switch instructions have a variable length that depends on both
/// their address (alignment padding) and their contents, so the whole
/// buffer is needed.
pub fn operand_length(code: &[u8], offset: usize) -> Result<usize, DecodeError> {
    let op = *code.get(offset).ok_or(DecodeError::Truncated {
        offset,
        opcode: opcode::NOP,
    })?;
    let len = match op {
        BIPUSH | LDC | NEWARRAY | RET => 1,
        ILOAD..=ALOAD | ISTORE..=ASTORE => 1,
        SIPUSH | LDC_W | LDC2_W | IINC => 2,
        IFEQ..=JSR | IFNULL | IFNONNULL => 2,
        GETSTATIC..=INVOKESTATIC | NEW | ANEWARRAY | CHECKCAST | INSTANCEOF => 2,
        MULTIANEWARRAY => 3,
        INVOKEINTERFACE | INVOKEDYNAMIC | GOTO_W | JSR_W => 4,
        WIDE => match code.get(offset + 1) {
            Some(&IINC) => 5,
            Some(_) => 3,
            None => return Err(DecodeError::Truncated { offset, opcode: op }),
        },
        TABLESWITCH | LOOKUPSWITCH => switch_length(code, offset, op)?,
        _ if opcode::name(op).is_some() => 0,
        _ => return Err(DecodeError::UnknownOpcode { offset, opcode: op }),
    };
    if offset + 1 + len > code.len() {
        return Err(DecodeError::Truncated { offset, opcode: op });
    }
    Ok(len)
}

fn switch_length(code: &[u8], offset: usize, op: u8) -> Result<usize, DecodeError> {
    let truncated = DecodeError::Truncated { offset, opcode: op };
    // Operands start at the next multiple of four after the opcode.
    let padding = (4 - (offset + 1) % 4) % 4;
    let base = offset + 1 + padding;
    let read = |at: usize| -> Result<i32, DecodeError> {
        code.get(at..at + 4)
            .and_then(|b| b.try_into().ok())
            .map(i32::from_be_bytes)
            .ok_or(truncated.clone())
    };
    let entries = if op == TABLESWITCH {
        let low = read(base + 4)? as i64;
        let high = read(base + 8)? as i64;
        3 + (high - low + 1).max(0) as usize
    } else {
        let pairs = read(base + 4)?.max(0) as usize;
        2 + pairs * 2
    };
    Ok(padding + entries * 4)
}

/// A single decoded instruction.
#[cfg(feature = "std")]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Address of the opcode byte.
    pub offset: usize,
    pub opcode: u8,
    /// Raw operand bytes, including any switch padding.
    pub operands: Vec<u8>,
}

#[cfg(feature = "std")]
impl Instruction {
    pub fn name(&self) -> &'static str {
        opcode::name(self.opcode).unwrap_or("?")
    }

    /// Total encoded length, opcode byte included.
    pub fn len(&self) -> usize {
        1 + self.operands.len()
    }

    /// For branch instructions, the absolute target address.
    pub fn branch_target(&self) -> Option<usize> {
        if !opcode::is_branch(self.opcode) {
            return None;
        }
        let delta = match self.operands.as_slice() {
            [a, b] => i16::from_be_bytes([*a, *b]) as i64,
            [a, b, c, d] => i32::from_be_bytes([*a, *b, *c, *d]) as i64,
            _ => return None,
        };
        usize::try_from(self.offset as i64 + delta).ok()
    }
}

/// Decodes every instruction in the buffer.
#[cfg(feature = "std")]
pub fn decode(code: &[u8]) -> Result<Vec<Instruction>, DecodeError> {
    let mut instructions = Vec::new();
    let mut offset = 0;
    while offset < code.len() {
        let len = operand_length(code, offset)?;
        instructions.push(Instruction {
            offset,
            opcode: code[offset],
            operands: code[offset + 1..offset + 1 + len].to_vec(),
        });
        offset += 1 + len;
    }
    Ok(instructions)
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use std::vec;

    #[test]
    fn decode_when_simple_program_then_instructions_at_offsets() {
        let code = [ICONST_1, BIPUSH, 0x0a, IADD, SIPUSH, 0x01, 0x3a, IRETURN];

        let instructions = decode(&code).unwrap();

        let offsets: Vec<usize> = instructions.iter().map(|i| i.offset).collect();
        assert_eq!(offsets, vec![0, 1, 3, 4, 7]);
        assert_eq!(instructions[1].operands, vec![0x0a]);
        assert_eq!(instructions[3].name(), "sipush");
        assert_eq!(instructions[3].len(), 3);
    }

    #[test]
    fn decode_when_operand_missing_then_truncated() {
        let err = decode(&[NOP, SIPUSH, 0x01]).unwrap_err();

        assert_eq!(
            err,
            DecodeError::Truncated {
                offset: 1,
                opcode: SIPUSH
            }
        );
    }

    #[test]
    fn decode_when_undefined_byte_then_unknown_opcode() {
        let err = decode(&[NOP, 0xCB]).unwrap_err();

        assert_eq!(
            err,
            DecodeError::UnknownOpcode {
                offset: 1,
                opcode: 0xCB
            }
        );
    }

    #[test]
    fn decode_when_wide_iinc_then_five_operand_bytes() {
        let instructions = decode(&[WIDE, IINC, 0x01, 0x00, 0xFF, 0xFF, RETURN]).unwrap();

        assert_eq!(instructions.len(), 2);
        assert_eq!(instructions[0].len(), 6);
    }

    #[test]
    fn decode_when_tableswitch_then_padding_and_table_consumed() {
        #[rustfmt::skip]
        let code = [
            NOP,
            TABLESWITCH,
            0x00, 0x00,              // padding to offset 4
            0x00, 0x00, 0x00, 0x10,  // default
            0x00, 0x00, 0x00, 0x01,  // low
            0x00, 0x00, 0x00, 0x02,  // high
            0x00, 0x00, 0x00, 0x14,  // case 1
            0x00, 0x00, 0x00, 0x18,  // case 2
            RETURN,
        ];

        let instructions = decode(&code).unwrap();

        assert_eq!(instructions.len(), 3);
        assert_eq!(instructions[1].operands.len(), 22);
        assert_eq!(instructions[2].offset, 24);
    }

    #[test]
    fn decode_when_lookupswitch_then_pairs_consumed() {
        #[rustfmt::skip]
        let code = [
            LOOKUPSWITCH,
            0x00, 0x00, 0x00,        // padding to offset 4
            0x00, 0x00, 0x00, 0x08,  // default
            0x00, 0x00, 0x00, 0x01,  // npairs
            0x00, 0x00, 0x00, 0x07,  // match
            0x00, 0x00, 0x00, 0x0C,  // offset
            RETURN,
        ];

        let instructions = decode(&code).unwrap();

        assert_eq!(instructions.len(), 2);
        assert_eq!(instructions[1].offset, 20);
    }

    #[test]
    fn branch_target_when_backward_goto_then_absolute_address() {
        let instructions = decode(&[NOP, NOP, GOTO, 0xFF, 0xFE]).unwrap();

        assert_eq!(instructions[2].branch_target(), Some(0));
        assert_eq!(instructions[0].branch_target(), None);
    }

    #[test]
    fn branch_target_when_goto_w_then_four_byte_offset() {
        let instructions = decode(&[GOTO_W, 0x00, 0x00, 0x00, 0x05]).unwrap();

        assert_eq!(instructions[0].branch_target(), Some(5));
    }
}
