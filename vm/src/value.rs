use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::array::ArrayRef;
use crate::error::Trap;

/// The discriminant of a [`Slot`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotKind {
    Empty,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    Reference,
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SlotKind::Empty => "empty",
            SlotKind::Boolean => "boolean",
            SlotKind::Int => "int",
            SlotKind::Long => "long",
            SlotKind::Float => "float",
            SlotKind::Double => "double",
            SlotKind::Reference => "reference",
        };
        f.write_str(s)
    }
}

/// A non-null reference held in a slot.
#[derive(Clone, Debug)]
pub enum Reference {
    Array(ArrayRef),
    /// Address of the instruction following a `jsr`.
    ReturnAddress(usize),
    /// An opaque host string, such as a method argument.
    String(Arc<str>),
}

impl PartialEq for Reference {
    /// Arrays and strings compare by identity, return addresses by value.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Reference::Array(a), Reference::Array(b)) => a.ptr_eq(b),
            (Reference::ReturnAddress(a), Reference::ReturnAddress(b)) => a == b,
            (Reference::String(a), Reference::String(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for Reference {}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Array(a) => write!(f, "{}", *a.lock()),
            Reference::ReturnAddress(pc) => write!(f, "returnAddress({pc})"),
            Reference::String(s) => f.write_str(s),
        }
    }
}

impl From<ArrayRef> for Reference {
    fn from(a: ArrayRef) -> Self {
        Reference::Array(a)
    }
}

/// A single tagged value on the operand stack or in a local variable.
///
/// Boolean and int form one family: either accessor works on either kind.
/// All other accessors require the exact kind.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Slot {
    #[default]
    Empty,
    Boolean(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    /// `None` is the null reference.
    Reference(Option<Reference>),
}

/// A boxed view of a slot's value, used for diagnostics and comparisons.
#[derive(Clone, Debug, PartialEq)]
pub enum Object {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Reference(Reference),
}

impl Slot {
    pub const EMPTY: Slot = Slot::Empty;

    pub fn empty() -> Self {
        Slot::Empty
    }

    pub fn boolean(v: bool) -> Self {
        Slot::Boolean(v)
    }

    pub fn int(v: i32) -> Self {
        Slot::Int(v)
    }

    pub fn long(v: i64) -> Self {
        Slot::Long(v)
    }

    pub fn float(v: f32) -> Self {
        Slot::Float(v)
    }

    pub fn double(v: f64) -> Self {
        Slot::Double(v)
    }

    pub fn reference(r: Reference) -> Self {
        Slot::Reference(Some(r))
    }

    pub fn null() -> Self {
        Slot::Reference(None)
    }

    /// Creates a slot from an arbitrary host value.
    ///
    /// Slots never nest, so passing a `Slot` is rejected. Host strings
    /// become string references and `None::<Reference>` becomes null.
    pub fn try_from_any(value: &dyn Any) -> Result<Slot, Trap> {
        if value.is::<Slot>() {
            return Err(Trap::NestedSlot);
        }
        if let Some(v) = value.downcast_ref::<bool>() {
            Ok(Slot::Boolean(*v))
        } else if let Some(v) = value.downcast_ref::<i32>() {
            Ok(Slot::Int(*v))
        } else if let Some(v) = value.downcast_ref::<i64>() {
            Ok(Slot::Long(*v))
        } else if let Some(v) = value.downcast_ref::<f32>() {
            Ok(Slot::Float(*v))
        } else if let Some(v) = value.downcast_ref::<f64>() {
            Ok(Slot::Double(*v))
        } else if let Some(v) = value.downcast_ref::<Reference>() {
            Ok(Slot::reference(v.clone()))
        } else if let Some(v) = value.downcast_ref::<Option<Reference>>() {
            Ok(Slot::Reference(v.clone()))
        } else if let Some(v) = value.downcast_ref::<ArrayRef>() {
            Ok(Slot::reference(Reference::Array(v.clone())))
        } else if let Some(v) = value.downcast_ref::<Arc<str>>() {
            Ok(Slot::reference(Reference::String(v.clone())))
        } else if let Some(v) = value.downcast_ref::<String>() {
            Ok(Slot::reference(Reference::String(Arc::from(v.as_str()))))
        } else if let Some(v) = value.downcast_ref::<&str>() {
            Ok(Slot::reference(Reference::String(Arc::from(*v))))
        } else {
            Err(Trap::UnsupportedObject)
        }
    }

    pub fn kind(&self) -> SlotKind {
        match self {
            Slot::Empty => SlotKind::Empty,
            Slot::Boolean(_) => SlotKind::Boolean,
            Slot::Int(_) => SlotKind::Int,
            Slot::Long(_) => SlotKind::Long,
            Slot::Float(_) => SlotKind::Float,
            Slot::Double(_) => SlotKind::Double,
            Slot::Reference(_) => SlotKind::Reference,
        }
    }

    /// True for the kinds that occupy two words: long and double.
    pub fn is_wide(&self) -> bool {
        matches!(self, Slot::Long(_) | Slot::Double(_))
    }

    fn mismatch(&self, expected: SlotKind) -> Trap {
        Trap::TypeMismatch {
            expected,
            found: self.kind(),
        }
    }

    pub fn boolean_value(&self) -> Result<bool, Trap> {
        match self {
            Slot::Boolean(v) => Ok(*v),
            Slot::Int(v) => Ok(*v != 0),
            _ => Err(self.mismatch(SlotKind::Boolean)),
        }
    }

    pub fn int_value(&self) -> Result<i32, Trap> {
        match self {
            Slot::Int(v) => Ok(*v),
            Slot::Boolean(v) => Ok(*v as i32),
            _ => Err(self.mismatch(SlotKind::Int)),
        }
    }

    pub fn long_value(&self) -> Result<i64, Trap> {
        match self {
            Slot::Long(v) => Ok(*v),
            _ => Err(self.mismatch(SlotKind::Long)),
        }
    }

    pub fn float_value(&self) -> Result<f32, Trap> {
        match self {
            Slot::Float(v) => Ok(*v),
            _ => Err(self.mismatch(SlotKind::Float)),
        }
    }

    pub fn double_value(&self) -> Result<f64, Trap> {
        match self {
            Slot::Double(v) => Ok(*v),
            _ => Err(self.mismatch(SlotKind::Double)),
        }
    }

    /// Returns the reference, `None` for null.
    pub fn reference_value(&self) -> Result<Option<&Reference>, Trap> {
        match self {
            Slot::Reference(r) => Ok(r.as_ref()),
            _ => Err(self.mismatch(SlotKind::Reference)),
        }
    }

    /// Boxes the value. Empty slots and null references have no object;
    /// booleans box as the ints 0 and 1.
    pub fn to_object(&self) -> Option<Object> {
        match self {
            Slot::Empty | Slot::Reference(None) => None,
            Slot::Boolean(v) => Some(Object::Int(*v as i32)),
            Slot::Int(v) => Some(Object::Int(*v)),
            Slot::Long(v) => Some(Object::Long(*v)),
            Slot::Float(v) => Some(Object::Float(*v)),
            Slot::Double(v) => Some(Object::Double(*v)),
            Slot::Reference(Some(r)) => Some(Object::Reference(r.clone())),
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Empty => f.write_str("---"),
            Slot::Boolean(v) => write!(f, "{}", *v as i32),
            Slot::Int(v) => write!(f, "{v}"),
            Slot::Long(v) => write!(f, "{v}"),
            Slot::Float(v) => write_float(f, *v, f64::from(*v)),
            Slot::Double(v) => write_float(f, *v, *v),
            Slot::Reference(None) => f.write_str("null"),
            Slot::Reference(Some(r)) => write!(f, "{r}"),
        }
    }
}

/// Writes a float as the reference machine prints it: `NaN`, `Infinity`,
/// a plain decimal for magnitudes in `[1e-3, 1e7)` and `d.dddE<n>`
/// otherwise. `value` is the float itself and `wide` the same value as an
/// `f64`, used only for classification.
fn write_float<T>(f: &mut fmt::Formatter<'_>, value: T, wide: f64) -> fmt::Result
where
    T: fmt::Debug + fmt::LowerExp,
{
    if wide.is_nan() {
        return f.write_str("NaN");
    }
    if wide.is_infinite() {
        return f.write_str(if wide > 0.0 { "Infinity" } else { "-Infinity" });
    }
    let magnitude = wide.abs();
    if magnitude == 0.0 || (1e-3..1e7).contains(&magnitude) {
        // Debug keeps the fractional part of whole values: 4.0, not 4.
        return write!(f, "{value:?}");
    }
    let scientific = format!("{value:e}");
    let (mantissa, exponent) = scientific
        .split_once('e')
        .unwrap_or((scientific.as_str(), "0"));
    if mantissa.contains('.') {
        write!(f, "{mantissa}E{exponent}")
    } else {
        write!(f, "{mantissa}.0E{exponent}")
    }
}

impl From<bool> for Slot {
    fn from(v: bool) -> Self {
        Slot::Boolean(v)
    }
}

impl From<i32> for Slot {
    fn from(v: i32) -> Self {
        Slot::Int(v)
    }
}

impl From<i64> for Slot {
    fn from(v: i64) -> Self {
        Slot::Long(v)
    }
}

impl From<f32> for Slot {
    fn from(v: f32) -> Self {
        Slot::Float(v)
    }
}

impl From<f64> for Slot {
    fn from(v: f64) -> Self {
        Slot::Double(v)
    }
}

impl From<Reference> for Slot {
    fn from(r: Reference) -> Self {
        Slot::reference(r)
    }
}
