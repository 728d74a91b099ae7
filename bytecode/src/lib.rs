#![no_std]

#[cfg(feature = "std")]
extern crate std;

// Always available (no_std)
mod decode;
mod error;
pub mod opcode;

// Only available with std
#[cfg(feature = "std")]
mod builder;

// Always-available re-exports
pub use decode::operand_length;
pub use error::{BuildError, DecodeError};

// std-only re-exports
#[cfg(feature = "std")]
pub use builder::{CodeBuilder, Label};
#[cfg(feature = "std")]
pub use decode::{decode, Instruction};
