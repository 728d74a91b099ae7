use std::collections::BTreeMap;
use std::vec::Vec;

use crate::error::BuildError;
use crate::opcode::{GOTO_W, IINC, JSR_W};

/// A branch destination. The caller picks the identifier; it only has to
/// be unique within one builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Label(pub u16);

struct Fixup {
    /// Address of the branch opcode; offsets are relative to it.
    from: usize,
    label: Label,
    wide: bool,
}

/// Fluent builder for assembling method bytecode in tests and tools.
///
/// Branches may refer to labels bound before or after them; offsets are
/// resolved by [`CodeBuilder::build`].
#[derive(Default)]
pub struct CodeBuilder {
    code: Vec<u8>,
    labels: BTreeMap<Label, usize>,
    fixups: Vec<Fixup>,
    error: Option<BuildError>,
}

impl CodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an instruction with no operands.
    pub fn op(mut self, op: u8) -> Self {
        self.code.push(op);
        self
    }

    /// Appends an instruction with one unsigned byte operand, such as a
    /// local index or an array type.
    pub fn op_u8(mut self, op: u8, operand: u8) -> Self {
        self.code.extend_from_slice(&[op, operand]);
        self
    }

    /// Appends an instruction with one signed byte operand.
    pub fn op_i8(self, op: u8, operand: i8) -> Self {
        self.op_u8(op, operand as u8)
    }

    /// Appends an instruction with a big-endian signed 16-bit operand.
    pub fn op_i16(mut self, op: u8, operand: i16) -> Self {
        self.code.push(op);
        self.code.extend_from_slice(&operand.to_be_bytes());
        self
    }

    pub fn iinc(mut self, index: u8, delta: i8) -> Self {
        self.code.extend_from_slice(&[IINC, index, delta as u8]);
        self
    }

    /// Appends raw bytes without interpretation.
    pub fn bytes(mut self, bytes: &[u8]) -> Self {
        self.code.extend_from_slice(bytes);
        self
    }

    /// Binds the label to the address of the next instruction.
    pub fn bind(mut self, label: Label) -> Self {
        if self.labels.insert(label, self.code.len()).is_some() && self.error.is_none() {
            self.error = Some(BuildError::DuplicateLabel(label.0));
        }
        self
    }

    /// Appends a branch instruction to the label. `GOTO_W` and `JSR_W`
    /// get a four byte offset, every other branch two.
    pub fn branch(mut self, op: u8, label: Label) -> Self {
        let wide = matches!(op, GOTO_W | JSR_W);
        self.fixups.push(Fixup {
            from: self.code.len(),
            label,
            wide,
        });
        self.code.push(op);
        let width = if wide { 4 } else { 2 };
        self.code.resize(self.code.len() + width, 0);
        self
    }

    /// Resolves branch offsets and returns the bytecode.
    pub fn build(mut self) -> Result<Vec<u8>, BuildError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        for fixup in &self.fixups {
            let to = *self
                .labels
                .get(&fixup.label)
                .ok_or(BuildError::UnboundLabel(fixup.label.0))?;
            let delta = to as i64 - fixup.from as i64;
            let out_of_range = BuildError::OffsetOutOfRange {
                from: fixup.from,
                to,
            };
            let at = fixup.from + 1;
            if fixup.wide {
                let delta = i32::try_from(delta).map_err(|_| out_of_range)?;
                self.code[at..at + 4].copy_from_slice(&delta.to_be_bytes());
            } else {
                let delta = i16::try_from(delta).map_err(|_| out_of_range)?;
                self.code[at..at + 2].copy_from_slice(&delta.to_be_bytes());
            }
        }
        Ok(self.code)
    }
}
