use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use jemu_bytecode::opcode::{self, atype};

use crate::error::Trap;
use crate::value::Slot;

/// Element type of a primitive array.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementType {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl ElementType {
    /// Decodes a `newarray` operand. Both the standard type codes and the
    /// descriptor letters (`Z B C S I J F D`, with `L` also meaning long)
    /// are accepted.
    pub fn from_atype(code: u8) -> Result<Self, Trap> {
        let t = match code {
            atype::T_BOOLEAN | b'Z' => ElementType::Boolean,
            atype::T_BYTE | b'B' => ElementType::Byte,
            atype::T_CHAR | b'C' => ElementType::Char,
            atype::T_SHORT | b'S' => ElementType::Short,
            atype::T_INT | b'I' => ElementType::Int,
            atype::T_LONG | b'J' | b'L' => ElementType::Long,
            atype::T_FLOAT | b'F' => ElementType::Float,
            atype::T_DOUBLE | b'D' => ElementType::Double,
            _ => return Err(Trap::UnknownArrayType(code)),
        };
        Ok(t)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ElementType::Boolean => "boolean",
            ElementType::Byte => "byte",
            ElementType::Char => "char",
            ElementType::Short => "short",
            ElementType::Int => "int",
            ElementType::Long => "long",
            ElementType::Float => "float",
            ElementType::Double => "double",
        };
        f.write_str(s)
    }
}

/// A fixed-length array of primitive values, default-initialized.
#[derive(Clone, Debug, PartialEq)]
pub enum PrimitiveArray {
    Boolean(Vec<bool>),
    Byte(Vec<i8>),
    Char(Vec<u16>),
    Short(Vec<i16>),
    Int(Vec<i32>),
    Long(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
}

impl PrimitiveArray {
    pub fn new(element: ElementType, len: usize) -> Self {
        match element {
            ElementType::Boolean => PrimitiveArray::Boolean(vec![false; len]),
            ElementType::Byte => PrimitiveArray::Byte(vec![0; len]),
            ElementType::Char => PrimitiveArray::Char(vec![0; len]),
            ElementType::Short => PrimitiveArray::Short(vec![0; len]),
            ElementType::Int => PrimitiveArray::Int(vec![0; len]),
            ElementType::Long => PrimitiveArray::Long(vec![0; len]),
            ElementType::Float => PrimitiveArray::Float(vec![0.0; len]),
            ElementType::Double => PrimitiveArray::Double(vec![0.0; len]),
        }
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            PrimitiveArray::Boolean(_) => ElementType::Boolean,
            PrimitiveArray::Byte(_) => ElementType::Byte,
            PrimitiveArray::Char(_) => ElementType::Char,
            PrimitiveArray::Short(_) => ElementType::Short,
            PrimitiveArray::Int(_) => ElementType::Int,
            PrimitiveArray::Long(_) => ElementType::Long,
            PrimitiveArray::Float(_) => ElementType::Float,
            PrimitiveArray::Double(_) => ElementType::Double,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            PrimitiveArray::Boolean(v) => v.len(),
            PrimitiveArray::Byte(v) => v.len(),
            PrimitiveArray::Char(v) => v.len(),
            PrimitiveArray::Short(v) => v.len(),
            PrimitiveArray::Int(v) => v.len(),
            PrimitiveArray::Long(v) => v.len(),
            PrimitiveArray::Float(v) => v.len(),
            PrimitiveArray::Double(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_index(&self, index: i32) -> Result<usize, Trap> {
        let length = self.len();
        usize::try_from(index)
            .ok()
            .filter(|i| *i < length)
            .ok_or(Trap::ArrayIndexOutOfBounds { index, length })
    }

    /// Reads an element for one of the `*aload` opcodes. The opcode must
    /// agree with the element type; `baload` serves both boolean and byte
    /// arrays.
    pub fn load(&self, op: u8, index: i32) -> Result<Slot, Trap> {
        let mismatch = Trap::ArrayTypeMismatch {
            opcode: op,
            element: self.element_type(),
        };
        let slot = match (self, op) {
            (PrimitiveArray::Boolean(v), opcode::BALOAD) => {
                Slot::Int(v[self.check_index(index)?] as i32)
            }
            (PrimitiveArray::Byte(v), opcode::BALOAD) => {
                Slot::Int(v[self.check_index(index)?] as i32)
            }
            (PrimitiveArray::Char(v), opcode::CALOAD) => {
                Slot::Int(v[self.check_index(index)?] as i32)
            }
            (PrimitiveArray::Short(v), opcode::SALOAD) => {
                Slot::Int(v[self.check_index(index)?] as i32)
            }
            (PrimitiveArray::Int(v), opcode::IALOAD) => Slot::Int(v[self.check_index(index)?]),
            (PrimitiveArray::Long(v), opcode::LALOAD) => Slot::Long(v[self.check_index(index)?]),
            (PrimitiveArray::Float(v), opcode::FALOAD) => {
                Slot::Float(v[self.check_index(index)?])
            }
            (PrimitiveArray::Double(v), opcode::DALOAD) => {
                Slot::Double(v[self.check_index(index)?])
            }
            _ => return Err(mismatch),
        };
        Ok(slot)
    }

    /// Writes an element for one of the `*astore` opcodes. Narrow integer
    /// elements truncate the int value; boolean elements store `value != 0`.
    pub fn store(&mut self, op: u8, index: i32, value: &Slot) -> Result<(), Trap> {
        let element = self.element_type();
        let i = match (element, op) {
            (ElementType::Boolean | ElementType::Byte, opcode::BASTORE)
            | (ElementType::Char, opcode::CASTORE)
            | (ElementType::Short, opcode::SASTORE)
            | (ElementType::Int, opcode::IASTORE)
            | (ElementType::Long, opcode::LASTORE)
            | (ElementType::Float, opcode::FASTORE)
            | (ElementType::Double, opcode::DASTORE) => self.check_index(index)?,
            _ => {
                return Err(Trap::ArrayTypeMismatch {
                    opcode: op,
                    element,
                })
            }
        };
        match self {
            PrimitiveArray::Boolean(v) => v[i] = value.int_value()? != 0,
            PrimitiveArray::Byte(v) => v[i] = value.int_value()? as i8,
            PrimitiveArray::Char(v) => v[i] = value.int_value()? as u16,
            PrimitiveArray::Short(v) => v[i] = value.int_value()? as i16,
            PrimitiveArray::Int(v) => v[i] = value.int_value()?,
            PrimitiveArray::Long(v) => v[i] = value.long_value()?,
            PrimitiveArray::Float(v) => v[i] = value.float_value()?,
            PrimitiveArray::Double(v) => v[i] = value.double_value()?,
        }
        Ok(())
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    f.write_str("[")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    f.write_str("]")
}

impl fmt::Display for PrimitiveArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimitiveArray::Boolean(v) => write_list(f, v),
            PrimitiveArray::Byte(v) => write_list(f, v),
            PrimitiveArray::Char(v) => write_list(f, v),
            PrimitiveArray::Short(v) => write_list(f, v),
            PrimitiveArray::Int(v) => write_list(f, v),
            PrimitiveArray::Long(v) => write_list(f, v),
            PrimitiveArray::Float(v) => write_list(f, v),
            PrimitiveArray::Double(v) => write_list(f, v),
        }
    }
}

/// A shared handle to a primitive array. Clones alias the same storage.
#[derive(Clone, Debug)]
pub struct ArrayRef(Arc<Mutex<PrimitiveArray>>);

impl ArrayRef {
    pub fn new(array: PrimitiveArray) -> Self {
        ArrayRef(Arc::new(Mutex::new(array)))
    }

    /// Locks the array. A poisoned lock still yields the data: array
    /// operations cannot leave it half-written.
    pub fn lock(&self) -> MutexGuard<'_, PrimitiveArray> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn ptr_eq(&self, other: &ArrayRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
