use jemu_bytecode::opcode;

use crate::error::Trap;
use crate::value::{Reference, Slot};

/// Growable operand stack for a single frame.
///
/// Each entry is one [`Slot`] regardless of width. The duplication
/// operations reproduce the two-word accounting of the canonical machine
/// by inspecting [`Slot::is_wide`] on the slots they touch; an arrangement
/// that would split a wide value fails with [`Trap::WideOperand`] and
/// leaves the stack unchanged.
#[derive(Debug, Default)]
pub struct OperandStack {
    data: Vec<Slot>,
}

impl OperandStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots on the stack. Wide values count once.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Iterates from the bottom of the stack to the top.
    pub fn iter(&self) -> impl Iterator<Item = &Slot> {
        self.data.iter()
    }

    pub fn push(&mut self, slot: Slot) {
        self.data.push(slot);
    }

    pub fn push_int(&mut self, v: i32) {
        self.push(Slot::Int(v));
    }

    pub fn push_long(&mut self, v: i64) {
        self.push(Slot::Long(v));
    }

    pub fn push_float(&mut self, v: f32) {
        self.push(Slot::Float(v));
    }

    pub fn push_double(&mut self, v: f64) {
        self.push(Slot::Double(v));
    }

    pub fn push_reference(&mut self, r: Reference) {
        self.push(Slot::reference(r));
    }

    pub fn push_null(&mut self) {
        self.push(Slot::null());
    }

    pub fn pop(&mut self) -> Result<Slot, Trap> {
        self.data.pop().ok_or(Trap::StackUnderflow)
    }

    pub fn peek(&self) -> Result<&Slot, Trap> {
        self.nth(0)
    }

    /// Returns the slot `depth` entries below the top (0 is the top).
    fn nth(&self, depth: usize) -> Result<&Slot, Trap> {
        self.data
            .len()
            .checked_sub(depth + 1)
            .map(|i| &self.data[i])
            .ok_or(Trap::StackUnderflow)
    }

    /// Pops the top slot after converting it with `f`. The stack is left
    /// unchanged when the conversion fails.
    fn pop_with<T>(&mut self, f: impl FnOnce(&Slot) -> Result<T, Trap>) -> Result<T, Trap> {
        let value = f(self.peek()?)?;
        self.data.pop();
        Ok(value)
    }

    pub fn pop_int(&mut self) -> Result<i32, Trap> {
        self.pop_with(Slot::int_value)
    }

    pub fn pop_long(&mut self) -> Result<i64, Trap> {
        self.pop_with(Slot::long_value)
    }

    pub fn pop_float(&mut self) -> Result<f32, Trap> {
        self.pop_with(Slot::float_value)
    }

    pub fn pop_double(&mut self) -> Result<f64, Trap> {
        self.pop_with(Slot::double_value)
    }

    /// Pops a reference; `None` is null.
    pub fn pop_reference(&mut self) -> Result<Option<Reference>, Trap> {
        self.pop_with(|slot| slot.reference_value().map(|r| r.cloned()))
    }

    /// Wideness of the top `N` slots, topmost first.
    fn widths<const N: usize>(&self) -> Result<[bool; N], Trap> {
        let mut wide = [false; N];
        for (depth, w) in wide.iter_mut().enumerate() {
            *w = self.nth(depth)?.is_wide();
        }
        Ok(wide)
    }

    /// Inserts copies of the top `count` slots `below` entries under the
    /// top.
    fn insert_copies(&mut self, count: usize, below: usize) {
        let len = self.data.len();
        let copies: Vec<Slot> = self.data[len - count..].to_vec();
        let at = len - below;
        self.data.splice(at..at, copies);
    }

    /// `pop`: removes one narrow slot.
    pub fn pop1(&mut self) -> Result<Slot, Trap> {
        if self.peek()?.is_wide() {
            return Err(Trap::WideOperand(opcode::POP));
        }
        self.pop()
    }

    /// `pop2`: removes one wide slot or two narrow slots.
    pub fn pop2(&mut self) -> Result<(), Trap> {
        if self.peek()?.is_wide() {
            self.data.pop();
            return Ok(());
        }
        match self.widths::<2>()? {
            [false, false] => {
                self.data.truncate(self.data.len() - 2);
                Ok(())
            }
            _ => Err(Trap::WideOperand(opcode::POP2)),
        }
    }

    /// `dup`: v1 -> v1 v1, v1 narrow.
    pub fn dup(&mut self) -> Result<(), Trap> {
        match self.widths::<1>()? {
            [false] => self.insert_copies(1, 0),
            _ => return Err(Trap::WideOperand(opcode::DUP)),
        }
        Ok(())
    }

    /// `dup_x1`: v2 v1 -> v1 v2 v1, both narrow.
    pub fn dup_x1(&mut self) -> Result<(), Trap> {
        match self.widths::<2>()? {
            [false, false] => self.insert_copies(1, 2),
            _ => return Err(Trap::WideOperand(opcode::DUP_X1)),
        }
        Ok(())
    }

    /// `dup_x2`: v3 v2 v1 -> v1 v3 v2 v1, or v2 v1 -> v1 v2 v1 when v2 is
    /// wide.
    pub fn dup_x2(&mut self) -> Result<(), Trap> {
        match self.widths::<2>()? {
            [false, true] => self.insert_copies(1, 2),
            [false, false] => match self.widths::<3>()? {
                [_, _, false] => self.insert_copies(1, 3),
                _ => return Err(Trap::WideOperand(opcode::DUP_X2)),
            },
            _ => return Err(Trap::WideOperand(opcode::DUP_X2)),
        }
        Ok(())
    }

    /// `dup2`: v2 v1 -> v2 v1 v2 v1, or v1 -> v1 v1 when v1 is wide.
    pub fn dup2(&mut self) -> Result<(), Trap> {
        if self.peek()?.is_wide() {
            self.insert_copies(1, 0);
            return Ok(());
        }
        match self.widths::<2>()? {
            [false, false] => self.insert_copies(2, 0),
            _ => return Err(Trap::WideOperand(opcode::DUP2)),
        }
        Ok(())
    }

    /// `dup2_x1`: v3 v2 v1 -> v2 v1 v3 v2 v1, or v2 v1 -> v1 v2 v1 when v1
    /// is wide.
    pub fn dup2_x1(&mut self) -> Result<(), Trap> {
        if self.peek()?.is_wide() {
            match self.widths::<2>()? {
                [true, false] => self.insert_copies(1, 2),
                _ => return Err(Trap::WideOperand(opcode::DUP2_X1)),
            }
            return Ok(());
        }
        match self.widths::<3>()? {
            [false, false, false] => self.insert_copies(2, 3),
            _ => return Err(Trap::WideOperand(opcode::DUP2_X1)),
        }
        Ok(())
    }

    /// `dup2_x2`: duplicates the top two-word unit under the two-word unit
    /// beneath it, for every arrangement of narrow and wide slots.
    pub fn dup2_x2(&mut self) -> Result<(), Trap> {
        let err = Trap::WideOperand(opcode::DUP2_X2);
        if self.peek()?.is_wide() {
            match self.widths::<2>()? {
                // v2 v1, both wide
                [true, true] => self.insert_copies(1, 2),
                // v3 v2 v1, v1 wide
                [true, false] => match self.widths::<3>()? {
                    [_, _, false] => self.insert_copies(1, 3),
                    _ => return Err(err),
                },
                _ => return Err(err),
            }
            return Ok(());
        }
        match self.widths::<3>()? {
            // v3 v2 v1, v3 wide
            [false, false, true] => self.insert_copies(2, 3),
            // v4 v3 v2 v1, all narrow
            [false, false, false] => match self.widths::<4>()? {
                [_, _, _, false] => self.insert_copies(2, 4),
                _ => return Err(err),
            },
            _ => return Err(err),
        }
        Ok(())
    }

    /// `swap`: v2 v1 -> v1 v2, both narrow.
    pub fn swap(&mut self) -> Result<(), Trap> {
        match self.widths::<2>()? {
            [false, false] => {
                let len = self.data.len();
                self.data.swap(len - 1, len - 2);
                Ok(())
            }
            _ => Err(Trap::WideOperand(opcode::SWAP)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::SlotKind;

    fn stack_of(slots: &[Slot]) -> OperandStack {
        let mut stack = OperandStack::new();
        for s in slots {
            stack.push(s.clone());
        }
        stack
    }

    fn contents(stack: &OperandStack) -> Vec<Slot> {
        stack.iter().cloned().collect()
    }

    #[test]
    fn pop_when_empty_then_stack_underflow() {
        let mut stack = OperandStack::new();

        assert_eq!(stack.pop(), Err(Trap::StackUnderflow));
        assert_eq!(stack.peek(), Err(Trap::StackUnderflow));
    }

    #[test]
    fn push_pop_when_values_pushed_then_lifo_order() {
        let mut stack = OperandStack::new();
        stack.push_int(10);
        stack.push_int(20);

        assert_eq!(stack.pop_int(), Ok(20));
        assert_eq!(stack.pop_int(), Ok(10));
    }

    #[test]
    fn typed_pop_when_kind_differs_then_type_mismatch_and_stack_unchanged() {
        type Pop = fn(&mut OperandStack) -> Result<(), Trap>;
        let pops: [(SlotKind, Pop); 5] = [
            (SlotKind::Int, |s| s.pop_int().map(drop)),
            (SlotKind::Long, |s| s.pop_long().map(drop)),
            (SlotKind::Float, |s| s.pop_float().map(drop)),
            (SlotKind::Double, |s| s.pop_double().map(drop)),
            (SlotKind::Reference, |s| s.pop_reference().map(drop)),
        ];
        let slots = [
            Slot::boolean(false),
            Slot::int(3),
            Slot::long(3),
            Slot::float(3.0),
            Slot::double(3.0),
            Slot::null(),
            Slot::empty(),
        ];

        for slot in &slots {
            let found = slot.kind();
            for (expected, pop) in pops {
                let mut stack = stack_of(&[slot.clone()]);
                let accepted = expected == found
                    || (expected == SlotKind::Int && found == SlotKind::Boolean);

                if accepted {
                    assert_eq!(pop(&mut stack), Ok(()), "pop {expected} on {found}");
                    assert!(stack.is_empty());
                } else {
                    assert_eq!(
                        pop(&mut stack),
                        Err(Trap::TypeMismatch { expected, found }),
                        "pop {expected} on {found}"
                    );
                    assert_eq!(contents(&stack), vec![slot.clone()]);
                }
            }
        }
    }

    #[test]
    fn typed_pop_when_each_kind_then_roundtrips() {
        let mut stack = OperandStack::new();
        stack.push_double(1.5);
        stack.push_float(2.5);
        stack.push_long(-7);
        stack.push_null();

        assert_eq!(stack.pop_reference(), Ok(None));
        assert_eq!(stack.pop_long(), Ok(-7));
        assert_eq!(stack.pop_float(), Ok(2.5));
        assert_eq!(stack.pop_double(), Ok(1.5));
    }

    #[test]
    fn pop_int_when_long_on_top_then_type_mismatch_and_unchanged() {
        let mut stack = stack_of(&[Slot::long(1)]);

        assert_eq!(
            stack.pop_int(),
            Err(Trap::TypeMismatch {
                expected: SlotKind::Int,
                found: SlotKind::Long
            })
        );
        assert_eq!(stack.size(), 1);
    }

    #[test]
    fn pop_int_when_boolean_on_top_then_converted() {
        let mut stack = stack_of(&[Slot::boolean(true)]);

        assert_eq!(stack.pop_int(), Ok(1));
    }

    #[test]
    fn dup_when_wide_then_wide_operand() {
        let mut stack = stack_of(&[Slot::long(1)]);

        assert_eq!(stack.dup(), Err(Trap::WideOperand(opcode::DUP)));
        assert_eq!(stack.size(), 1);
    }

    #[test]
    fn dup_x1_when_two_narrow_then_top_copied_below() {
        let mut stack = stack_of(&[Slot::int(0), Slot::int(1)]);

        stack.dup_x1().unwrap();

        assert_eq!(contents(&stack), vec![Slot::int(1), Slot::int(0), Slot::int(1)]);
    }

    #[test]
    fn dup_x2_when_three_narrow_then_form_one() {
        let mut stack = stack_of(&[Slot::int(3), Slot::int(2), Slot::int(1)]);

        stack.dup_x2().unwrap();

        assert_eq!(
            contents(&stack),
            vec![Slot::int(1), Slot::int(3), Slot::int(2), Slot::int(1)]
        );
    }

    #[test]
    fn dup_x2_when_wide_below_then_form_two() {
        let mut stack = stack_of(&[Slot::double(2.0), Slot::int(1)]);

        stack.dup_x2().unwrap();

        assert_eq!(
            contents(&stack),
            vec![Slot::int(1), Slot::double(2.0), Slot::int(1)]
        );
    }

    #[test]
    fn dup_x2_when_third_slot_wide_then_wide_operand() {
        let mut stack = stack_of(&[Slot::long(3), Slot::int(2), Slot::int(1)]);

        assert_eq!(stack.dup_x2(), Err(Trap::WideOperand(opcode::DUP_X2)));
        assert_eq!(stack.size(), 3);
    }

    #[test]
    fn dup2_when_single_wide_then_two_equal_slots() {
        let mut stack = stack_of(&[Slot::long(9)]);

        stack.dup2().unwrap();

        assert_eq!(contents(&stack), vec![Slot::long(9), Slot::long(9)]);
    }

    #[test]
    fn dup2_when_two_narrow_then_pair_copied() {
        let mut stack = stack_of(&[Slot::int(2), Slot::int(1)]);

        stack.dup2().unwrap();

        assert_eq!(
            contents(&stack),
            vec![Slot::int(2), Slot::int(1), Slot::int(2), Slot::int(1)]
        );
    }

    #[test]
    fn dup2_when_narrow_over_wide_then_wide_operand() {
        let mut stack = stack_of(&[Slot::long(2), Slot::int(1)]);

        assert_eq!(stack.dup2(), Err(Trap::WideOperand(opcode::DUP2)));
    }

    #[test]
    fn dup2_x1_when_three_narrow_then_pair_copied_below() {
        let mut stack = stack_of(&[Slot::int(3), Slot::int(2), Slot::int(1)]);

        stack.dup2_x1().unwrap();

        assert_eq!(
            contents(&stack),
            vec![
                Slot::int(2),
                Slot::int(1),
                Slot::int(3),
                Slot::int(2),
                Slot::int(1)
            ]
        );
    }

    #[test]
    fn dup2_x1_when_wide_over_narrow_then_form_two() {
        let mut stack = stack_of(&[Slot::int(2), Slot::long(1)]);

        stack.dup2_x1().unwrap();

        assert_eq!(
            contents(&stack),
            vec![Slot::long(1), Slot::int(2), Slot::long(1)]
        );
    }

    #[test]
    fn dup2_x2_when_all_forms_then_canonical_order() {
        // Form 1: four narrow.
        let mut stack = stack_of(&[Slot::int(4), Slot::int(3), Slot::int(2), Slot::int(1)]);
        stack.dup2_x2().unwrap();
        assert_eq!(
            contents(&stack),
            vec![
                Slot::int(2),
                Slot::int(1),
                Slot::int(4),
                Slot::int(3),
                Slot::int(2),
                Slot::int(1)
            ]
        );

        // Form 2: wide over two narrow.
        let mut stack = stack_of(&[Slot::int(3), Slot::int(2), Slot::long(1)]);
        stack.dup2_x2().unwrap();
        assert_eq!(
            contents(&stack),
            vec![Slot::long(1), Slot::int(3), Slot::int(2), Slot::long(1)]
        );

        // Form 3: two narrow over wide.
        let mut stack = stack_of(&[Slot::double(3.0), Slot::int(2), Slot::int(1)]);
        stack.dup2_x2().unwrap();
        assert_eq!(
            contents(&stack),
            vec![
                Slot::int(2),
                Slot::int(1),
                Slot::double(3.0),
                Slot::int(2),
                Slot::int(1)
            ]
        );

        // Form 4: wide over wide.
        let mut stack = stack_of(&[Slot::double(2.0), Slot::long(1)]);
        stack.dup2_x2().unwrap();
        assert_eq!(
            contents(&stack),
            vec![Slot::long(1), Slot::double(2.0), Slot::long(1)]
        );
    }

    #[test]
    fn swap_when_narrow_pair_then_exchanged() {
        let mut stack = stack_of(&[Slot::int(1), Slot::float(2.0)]);

        stack.swap().unwrap();

        assert_eq!(contents(&stack), vec![Slot::float(2.0), Slot::int(1)]);
    }

    #[test]
    fn swap_when_wide_then_wide_operand_and_unchanged() {
        let mut stack = stack_of(&[Slot::long(0), Slot::double(0.0)]);

        assert_eq!(stack.swap(), Err(Trap::WideOperand(opcode::SWAP)));
        assert_eq!(contents(&stack), vec![Slot::long(0), Slot::double(0.0)]);
    }

    #[test]
    fn pop2_when_single_wide_then_removes_it() {
        let mut stack = stack_of(&[Slot::int(5), Slot::double(1.0)]);

        stack.pop2().unwrap();

        assert_eq!(contents(&stack), vec![Slot::int(5)]);
    }

    #[test]
    fn pop2_when_two_narrow_then_removes_both_and_next_pop_underflows() {
        let mut stack = stack_of(&[Slot::int(1), Slot::int(2)]);

        stack.pop2().unwrap();

        assert!(stack.is_empty());
        assert_eq!(stack.pop(), Err(Trap::StackUnderflow));
    }

    #[test]
    fn pop1_when_wide_then_wide_operand() {
        let mut stack = stack_of(&[Slot::long(1)]);

        assert_eq!(stack.pop1(), Err(Trap::WideOperand(opcode::POP)));
    }
}
