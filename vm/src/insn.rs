//! Decoding of raw bytecode into [`Insn`] values.
//!
//! The interpreter matches exhaustively on [`Insn`], so each opcode
//! family is resolved here once: the implicit index of `iload_2`, the
//! value kind of `lstore`, the absolute target of a branch.

use jemu_bytecode::opcode::*;

use crate::array::ElementType;
use crate::error::Trap;
use crate::value::Slot;

/// Value kind named by a load, store or return opcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Kind {
    Int,
    Long,
    Float,
    Double,
    Reference,
}

impl Kind {
    /// Fails unless the slot can be used as this kind.
    pub fn check(self, slot: &Slot) -> Result<(), Trap> {
        match self {
            Kind::Int => slot.int_value().map(drop),
            Kind::Long => slot.long_value().map(drop),
            Kind::Float => slot.float_value().map(drop),
            Kind::Double => slot.double_value().map(drop),
            Kind::Reference => slot.reference_value().map(drop),
        }
    }
}

/// Numeric kind of an arithmetic or conversion opcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Num {
    Int,
    Long,
    Float,
    Double,
}

/// Operand width of a shift or bitwise opcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Width {
    Int,
    Long,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Arith {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Bits {
    Shl,
    Shr,
    Ushr,
    And,
    Or,
    Xor,
}

/// Target of `i2b`, `i2c` and `i2s`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Narrow {
    Byte,
    Char,
    Short,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Cond {
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
}

impl Cond {
    pub fn holds(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            Cond::Eq => ordering == Equal,
            Cond::Ne => ordering != Equal,
            Cond::Lt => ordering == Less,
            Cond::Ge => ordering != Less,
            Cond::Gt => ordering == Greater,
            Cond::Le => ordering != Greater,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Cmp {
    Long,
    /// `nan` is the result pushed when either operand is NaN.
    Float { nan: i32 },
    Double { nan: i32 },
}

/// One decoded instruction. Branch targets are absolute and not yet
/// bounds-checked.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Insn {
    Nop,
    Push(Slot),
    Load(Kind, usize),
    Store(Kind, usize),
    Iinc(usize, i32),
    ArrayLoad(u8),
    ArrayStore(u8),
    NewArray(ElementType),
    ArrayLength,
    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Dup2X1,
    Dup2X2,
    Swap,
    Arith(Num, Arith),
    Neg(Num),
    Bits(Width, Bits),
    Convert(Num, Num),
    Narrow(Narrow),
    Compare(Cmp),
    If(Cond, i64),
    IfICmp(Cond, i64),
    IfACmp { equal: bool, target: i64 },
    IfNull { null: bool, target: i64 },
    Goto(i64),
    Jsr(i64),
    Ret(usize),
    Return(Option<Kind>),
}

const KINDS: [Kind; 5] = [Kind::Int, Kind::Long, Kind::Float, Kind::Double, Kind::Reference];
const NUMS: [Num; 4] = [Num::Int, Num::Long, Num::Float, Num::Double];
const WIDTHS: [Width; 2] = [Width::Int, Width::Long];
const ARITHS: [Arith; 5] = [Arith::Add, Arith::Sub, Arith::Mul, Arith::Div, Arith::Rem];
const CONDS: [Cond; 6] = [Cond::Eq, Cond::Ne, Cond::Lt, Cond::Ge, Cond::Gt, Cond::Le];

/// Reads immediates following an opcode.
struct Operands<'a> {
    code: &'a [u8],
    pc: &'a mut usize,
}

impl Operands<'_> {
    fn bytes<const N: usize>(&mut self) -> Result<[u8; N], Trap> {
        let start = *self.pc;
        let bytes = self
            .code
            .get(start..start + N)
            .and_then(|b| b.try_into().ok())
            .ok_or(Trap::CodeOutOfBounds(self.code.len().max(start)))?;
        *self.pc += N;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8, Trap> {
        Ok(self.bytes::<1>()?[0])
    }

    fn i8(&mut self) -> Result<i8, Trap> {
        Ok(self.u8()? as i8)
    }

    fn u16(&mut self) -> Result<u16, Trap> {
        self.bytes().map(u16::from_be_bytes)
    }

    fn i16(&mut self) -> Result<i16, Trap> {
        self.bytes().map(i16::from_be_bytes)
    }

    fn i32(&mut self) -> Result<i32, Trap> {
        self.bytes().map(i32::from_be_bytes)
    }
}

/// Decodes the instruction at `*pc` and advances `*pc` past it.
pub(crate) fn decode(code: &[u8], pc: &mut usize) -> Result<Insn, Trap> {
    let at = *pc;
    let op = *code.get(at).ok_or(Trap::CodeOutOfBounds(at))?;
    *pc += 1;
    let mut operands = Operands { code, pc };
    let branch = |offset: i32| at as i64 + offset as i64;

    let insn = match op {
        NOP => Insn::Nop,
        ACONST_NULL => Insn::Push(Slot::null()),
        ICONST_M1..=ICONST_5 => Insn::Push(Slot::Int(op as i32 - ICONST_0 as i32)),
        LCONST_0 | LCONST_1 => Insn::Push(Slot::Long((op - LCONST_0) as i64)),
        FCONST_0..=FCONST_2 => Insn::Push(Slot::Float((op - FCONST_0) as f32)),
        DCONST_0 | DCONST_1 => Insn::Push(Slot::Double((op - DCONST_0) as f64)),
        BIPUSH => Insn::Push(Slot::Int(operands.i8()? as i32)),
        SIPUSH => Insn::Push(Slot::Int(operands.i16()? as i32)),

        ILOAD..=ALOAD => Insn::Load(KINDS[(op - ILOAD) as usize], operands.u8()? as usize),
        ILOAD_0..=ALOAD_3 => {
            let (kind, index) = implicit(op - ILOAD_0);
            Insn::Load(kind, index)
        }
        ISTORE..=ASTORE => Insn::Store(KINDS[(op - ISTORE) as usize], operands.u8()? as usize),
        ISTORE_0..=ASTORE_3 => {
            let (kind, index) = implicit(op - ISTORE_0);
            Insn::Store(kind, index)
        }
        IINC => Insn::Iinc(operands.u8()? as usize, operands.i8()? as i32),

        IALOAD..=SALOAD => Insn::ArrayLoad(op),
        IASTORE..=SASTORE => Insn::ArrayStore(op),
        NEWARRAY => Insn::NewArray(ElementType::from_atype(operands.u8()?)?),
        ARRAYLENGTH => Insn::ArrayLength,

        POP => Insn::Pop,
        POP2 => Insn::Pop2,
        DUP => Insn::Dup,
        DUP_X1 => Insn::DupX1,
        DUP_X2 => Insn::DupX2,
        DUP2 => Insn::Dup2,
        DUP2_X1 => Insn::Dup2X1,
        DUP2_X2 => Insn::Dup2X2,
        SWAP => Insn::Swap,

        IADD..=DREM => {
            let n = (op - IADD) as usize;
            Insn::Arith(NUMS[n % 4], ARITHS[n / 4])
        }
        INEG..=DNEG => Insn::Neg(NUMS[(op - INEG) as usize]),
        ISHL..=LUSHR => {
            let n = (op - ISHL) as usize;
            let bits = [Bits::Shl, Bits::Shr, Bits::Ushr][n / 2];
            Insn::Bits(WIDTHS[n % 2], bits)
        }
        IAND..=LXOR => {
            let n = (op - IAND) as usize;
            let bits = [Bits::And, Bits::Or, Bits::Xor][n / 2];
            Insn::Bits(WIDTHS[n % 2], bits)
        }

        I2L..=D2F => {
            let n = (op - I2L) as usize;
            let from = NUMS[n / 3];
            // Targets run through the other three kinds in order.
            let mut targets = NUMS.into_iter().filter(|k| *k != from);
            let to = targets.nth(n % 3).unwrap_or(from);
            Insn::Convert(from, to)
        }
        I2B => Insn::Narrow(Narrow::Byte),
        I2C => Insn::Narrow(Narrow::Char),
        I2S => Insn::Narrow(Narrow::Short),

        LCMP => Insn::Compare(Cmp::Long),
        FCMPL => Insn::Compare(Cmp::Float { nan: -1 }),
        FCMPG => Insn::Compare(Cmp::Float { nan: 1 }),
        DCMPL => Insn::Compare(Cmp::Double { nan: -1 }),
        DCMPG => Insn::Compare(Cmp::Double { nan: 1 }),

        IFEQ..=IFLE => Insn::If(CONDS[(op - IFEQ) as usize], branch(operands.i16()? as i32)),
        IF_ICMPEQ..=IF_ICMPLE => {
            Insn::IfICmp(CONDS[(op - IF_ICMPEQ) as usize], branch(operands.i16()? as i32))
        }
        IF_ACMPEQ | IF_ACMPNE => Insn::IfACmp {
            equal: op == IF_ACMPEQ,
            target: branch(operands.i16()? as i32),
        },
        IFNULL | IFNONNULL => Insn::IfNull {
            null: op == IFNULL,
            target: branch(operands.i16()? as i32),
        },
        GOTO => Insn::Goto(branch(operands.i16()? as i32)),
        GOTO_W => Insn::Goto(branch(operands.i32()?)),
        JSR => Insn::Jsr(branch(operands.i16()? as i32)),
        JSR_W => Insn::Jsr(branch(operands.i32()?)),
        RET => Insn::Ret(operands.u8()? as usize),

        IRETURN..=ARETURN => Insn::Return(Some(KINDS[(op - IRETURN) as usize])),
        RETURN => Insn::Return(None),

        WIDE => {
            let inner = operands.u8()?;
            let index = operands.u16()? as usize;
            match inner {
                ILOAD..=ALOAD => Insn::Load(KINDS[(inner - ILOAD) as usize], index),
                ISTORE..=ASTORE => Insn::Store(KINDS[(inner - ISTORE) as usize], index),
                IINC => Insn::Iinc(index, operands.i16()? as i32),
                RET => Insn::Ret(index),
                _ => return Err(Trap::UnknownOpcode(inner)),
            }
        }

        BREAKPOINT | IMPDEP1 | IMPDEP2 => return Err(Trap::ReservedOpcode(op)),
        _ => return Err(Trap::UnknownOpcode(op)),
    };
    Ok(insn)
}

/// Resolves the `x<load|store>_<n>` groups, which run through the kinds
/// in blocks of four indices.
fn implicit(n: u8) -> (Kind, usize) {
    (KINDS[(n / 4) as usize], (n % 4) as usize)
}
