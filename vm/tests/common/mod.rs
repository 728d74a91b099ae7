//! Shared test helpers for interpreter integration tests.

use jemu_vm::{Frame, Slot, Trap};

/// Number of locals given to frames built by the helpers.
pub const LOCALS: usize = 4;

/// Runs the bytecode in a fresh frame with [`LOCALS`] empty locals.
pub fn run(bytecode: &[u8]) -> Result<Option<Slot>, Trap> {
    Frame::new(bytecode, LOCALS).run()
}

/// Runs the bytecode with locals seeded from `args` in order.
#[allow(dead_code)]
pub fn run_with_args(bytecode: &[u8], args: &[Slot]) -> Result<Option<Slot>, Trap> {
    let mut frame = Frame::new(bytecode, LOCALS.max(args.len()));
    for (i, arg) in args.iter().enumerate() {
        frame.set_local(i, arg.clone())?;
    }
    frame.run()
}

/// Asserts that running the bytecode returns the expected slot.
#[allow(dead_code)]
pub fn assert_returns(bytecode: &[u8], expected: Slot) {
    assert_eq!(run(bytecode), Ok(Some(expected)));
}

/// Asserts that running the bytecode produces a specific trap.
#[allow(dead_code)]
pub fn assert_trap(bytecode: &[u8], expected: Trap) {
    let result = run(bytecode);
    assert!(result.is_err(), "expected trap {expected} but run succeeded");
    assert_eq!(result.unwrap_err(), expected);
}
