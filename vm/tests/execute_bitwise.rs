//! Integration tests for the bitwise and shift opcodes.

mod common;

use common::assert_returns;
use jemu_bytecode::opcode::*;
use jemu_vm::Slot;

#[test]
fn execute_when_iand_ior_ixor_then_bitwise_result() {
    #[rustfmt::skip]
    let bytecode: Vec<u8> = vec![
        BIPUSH, 0x0C,   // 0b1100
        BIPUSH, 0x0A,   // 0b1010
        IAND,           // 0b1000
        ICONST_1,
        IOR,            // 0b1001
        ICONST_3,
        IXOR,           // 0b1010
        IRETURN,
    ];
    assert_returns(&bytecode, Slot::int(0b1010));
}

#[test]
fn execute_when_ishl_then_value_below_shifted_by_top() {
    #[rustfmt::skip]
    let bytecode: Vec<u8> = vec![
        ICONST_3,       // value
        ICONST_4,       // amount
        ISHL,
        IRETURN,
    ];
    assert_returns(&bytecode, Slot::int(48));
}

#[test]
fn execute_when_ishl_amount_exceeds_width_then_masked() {
    #[rustfmt::skip]
    let bytecode: Vec<u8> = vec![
        ICONST_1,
        BIPUSH, 33,     // 33 & 31 == 1
        ISHL,
        IRETURN,
    ];
    assert_returns(&bytecode, Slot::int(2));
}

#[test]
fn execute_when_ishr_negative_then_sign_extends() {
    #[rustfmt::skip]
    let bytecode: Vec<u8> = vec![
        BIPUSH, 0xF0,   // -16
        ICONST_2,
        ISHR,
        IRETURN,
    ];
    assert_returns(&bytecode, Slot::int(-4));
}

#[test]
fn execute_when_iushr_negative_then_zero_fills() {
    #[rustfmt::skip]
    let bytecode: Vec<u8> = vec![
        ICONST_M1,
        BIPUSH, 28,
        IUSHR,
        IRETURN,
    ];
    assert_returns(&bytecode, Slot::int(0xF));
}

#[test]
fn execute_when_lshl_then_int_amount_shifts_long() {
    #[rustfmt::skip]
    let bytecode: Vec<u8> = vec![
        LCONST_1,
        BIPUSH, 40,
        LSHL,
        LRETURN,
    ];
    assert_returns(&bytecode, Slot::long(1 << 40));
}

#[test]
fn execute_when_lushr_then_zero_fills() {
    #[rustfmt::skip]
    let bytecode: Vec<u8> = vec![
        LCONST_1,
        LNEG,           // -1L
        BIPUSH, 60,
        LUSHR,
        LRETURN,
    ];
    assert_returns(&bytecode, Slot::long(0xF));
}

#[test]
fn execute_when_lshr_then_sign_extends() {
    #[rustfmt::skip]
    let bytecode: Vec<u8> = vec![
        LCONST_1,
        LNEG,
        ICONST_5,
        LSHR,
        LRETURN,
    ];
    assert_returns(&bytecode, Slot::long(-1));
}

#[test]
fn execute_when_land_lor_lxor_then_bitwise_result() {
    #[rustfmt::skip]
    let bytecode: Vec<u8> = vec![
        LCONST_1,
        LCONST_0,
        LOR,            // 1
        LCONST_1,
        LXOR,           // 0
        LCONST_1,
        LAND,           // 0
        LRETURN,
    ];
    assert_returns(&bytecode, Slot::long(0));
}
