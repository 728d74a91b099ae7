//! Integration tests for the arithmetic opcodes.
//!
//! The value on top of the stack is the left operand, so `a b ISUB`
//! computes `b - a`.

mod common;

use common::{assert_returns, assert_trap};
use jemu_bytecode::opcode::*;
use jemu_vm::{Slot, Trap};

#[test]
fn execute_when_iadd_then_sum() {
    assert_returns(&[ICONST_2, ICONST_3, IADD, IRETURN], Slot::int(5));
}

#[test]
fn execute_when_isub_then_top_minus_below() {
    #[rustfmt::skip]
    let bytecode: Vec<u8> = vec![
        ICONST_5,
        ICONST_2,
        ISUB,       // 2 - 5
        IRETURN,
    ];
    assert_returns(&bytecode, Slot::int(-3));
}

#[test]
fn execute_when_idiv_then_top_divided_by_below() {
    #[rustfmt::skip]
    let bytecode: Vec<u8> = vec![
        ICONST_2,
        BIPUSH, 0x07,   // 7
        IDIV,           // 7 / 2
        IRETURN,
    ];
    assert_returns(&bytecode, Slot::int(3));
}

#[test]
fn execute_when_idiv_negative_then_truncates_toward_zero() {
    #[rustfmt::skip]
    let bytecode: Vec<u8> = vec![
        ICONST_2,
        BIPUSH, 0xF9,   // -7
        IDIV,           // -7 / 2
        IRETURN,
    ];
    assert_returns(&bytecode, Slot::int(-3));
}

#[test]
fn execute_when_irem_then_top_rem_below() {
    assert_returns(&[ICONST_5, ICONST_2, IREM, IRETURN], Slot::int(2));
}

#[test]
fn execute_when_idiv_by_zero_then_trap() {
    assert_trap(&[ICONST_0, ICONST_1, IDIV, IRETURN], Trap::DivideByZero);
}

#[test]
fn execute_when_lrem_by_zero_then_trap() {
    assert_trap(&[LCONST_0, LCONST_1, LREM, LRETURN], Trap::DivideByZero);
}

#[test]
fn execute_when_idiv_min_by_minus_one_then_wraps() {
    #[rustfmt::skip]
    let bytecode: Vec<u8> = vec![
        ICONST_M1,
        SIPUSH, 0x80, 0x00,   // -32768
        ICONST_1,
        BIPUSH, 16,
        ISHL,                 // 1 << 16
        IMUL,                 // i32::MIN
        IDIV,                 // MIN / -1
        IRETURN,
    ];
    assert_returns(&bytecode, Slot::int(i32::MIN));
}

#[test]
fn execute_when_imul_overflows_then_wraps() {
    #[rustfmt::skip]
    let bytecode: Vec<u8> = vec![
        SIPUSH, 0x7F, 0xFF,   // 32767
        DUP,
        IMUL,
        SIPUSH, 0x7F, 0xFF,
        IMUL,                 // 32767^3 overflows
        IRETURN,
    ];
    assert_returns(&bytecode, Slot::int(32767i32.wrapping_pow(3)));
}

#[test]
fn execute_when_ineg_then_negated() {
    assert_returns(&[ICONST_4, INEG, IRETURN], Slot::int(-4));
}

#[test]
fn execute_when_ladd_and_lmul_then_long_result() {
    #[rustfmt::skip]
    let bytecode: Vec<u8> = vec![
        LCONST_1,
        LCONST_1,
        LADD,       // 2
        LCONST_1,
        LADD,       // 3
        DUP2,
        LMUL,       // 9
        LNEG,
        LRETURN,
    ];
    assert_returns(&bytecode, Slot::long(-9));
}

#[test]
fn execute_when_fdiv_by_zero_then_infinity() {
    #[rustfmt::skip]
    let bytecode: Vec<u8> = vec![
        FCONST_0,
        FCONST_1,
        FDIV,       // 1.0 / 0.0
        FRETURN,
    ];
    assert_returns(&bytecode, Slot::float(f32::INFINITY));
}

#[test]
fn execute_when_dsub_then_top_minus_below() {
    assert_returns(&[DCONST_1, DCONST_0, DSUB, DRETURN], Slot::double(-1.0));
}

#[test]
fn execute_when_frem_then_truncated_remainder() {
    #[rustfmt::skip]
    let bytecode: Vec<u8> = vec![
        FCONST_2,
        BIPUSH, 5,
        I2F,        // 5.0
        FREM,       // 5.0 % 2.0
        FRETURN,
    ];
    assert_returns(&bytecode, Slot::float(1.0));
}

#[test]
fn execute_when_iadd_on_long_then_type_mismatch() {
    let result = common::run(&[ICONST_1, LCONST_1, IADD, IRETURN]);

    assert!(matches!(result, Err(Trap::TypeMismatch { .. })));
}

#[test]
fn execute_when_iadd_on_empty_stack_then_underflow() {
    assert_trap(&[ICONST_1, IADD, IRETURN], Trap::StackUnderflow);
}
