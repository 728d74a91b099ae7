//! A bytecode interpreter for a single method frame of a JVM-style stack
//! machine.
//!
//! A [`Frame`] owns the method's bytecode, its [`LocalTable`] and its
//! [`OperandStack`]. [`Frame::step`] executes one instruction and
//! [`Frame::run`] steps until the method returns.

pub mod array;
pub mod error;
pub mod frame;
pub(crate) mod insn;
pub mod locals;
pub mod stack;
pub mod value;

pub use array::{ArrayRef, ElementType, PrimitiveArray};
pub use error::{ErrorKind, Trap};
pub use frame::{FaultContext, Frame, Outcome, StopHandle};
pub use locals::LocalTable;
pub use stack::OperandStack;
pub use value::{Object, Reference, Slot, SlotKind};
