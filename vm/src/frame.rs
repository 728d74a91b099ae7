use std::fmt;
use std::ops::{Add, Div, Mul, Rem, Sub};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use jemu_bytecode::opcode;
use log::{debug, trace, warn};

use crate::array::{ArrayRef, PrimitiveArray};
use crate::error::{OpName, Trap};
use crate::insn::{self, Arith, Bits, Cmp, Insn, Narrow, Num, Width};
use crate::locals::LocalTable;
use crate::stack::OperandStack;
use crate::value::{Reference, Slot};

/// A cloneable handle for requesting a running frame to stop.
/// Used by signal handlers to stop execution from another context.
#[derive(Clone, Debug, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests the frame to stop before its next instruction.
    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn stop_requested(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Context for a trap raised during bounded execution.
#[derive(Debug, Clone, PartialEq)]
pub struct FaultContext {
    pub trap: Trap,
    /// Address of the instruction that trapped.
    pub pc: usize,
    /// The opcode at `pc`, if `pc` is inside the bytecode.
    pub opcode: Option<u8>,
}

impl fmt::Display for FaultContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.opcode {
            Some(op) => write!(f, "{} (pc {}, opcode {})", self.trap, self.pc, OpName(op)),
            None => write!(f, "{} (pc {})", self.trap, self.pc),
        }
    }
}

impl std::error::Error for FaultContext {}

/// How bounded execution ended without a trap.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The method returned; `None` for `return`.
    Returned(Option<Slot>),
    /// The step budget was spent or a stop was requested.
    Interrupted { steps: u64 },
}

/// Execution state of one method invocation: its bytecode, local
/// variables, operand stack and program counter.
///
/// Frames are independent of each other and own all of their state, so
/// separate frames can run on separate threads.
pub struct Frame {
    code: Vec<u8>,
    locals: LocalTable,
    stack: OperandStack,
    pc: usize,
    returned: bool,
    result: Option<Slot>,
    steps: u64,
}

impl Frame {
    /// Creates a frame positioned at the first instruction with
    /// `max_locals` empty locals.
    pub fn new(code: impl Into<Vec<u8>>, max_locals: usize) -> Self {
        let code = code.into();
        debug!(
            "New frame with {} bytes of code and {} locals",
            code.len(),
            max_locals
        );
        Frame {
            code,
            locals: LocalTable::new(max_locals),
            stack: OperandStack::new(),
            pc: 0,
            returned: false,
            result: None,
            steps: 0,
        }
    }

    /// Sets a local before execution, typically a method argument.
    pub fn set_local(&mut self, index: usize, slot: Slot) -> Result<(), Trap> {
        self.locals.store(index, slot)
    }

    pub fn local(&self, index: usize) -> Result<&Slot, Trap> {
        self.locals.get(index)
    }

    pub fn locals(&self) -> &LocalTable {
        &self.locals
    }

    pub fn stack(&self) -> &OperandStack {
        &self.stack
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    /// True once a return instruction has executed.
    pub fn is_returned(&self) -> bool {
        self.returned
    }

    pub fn return_value(&self) -> Option<&Slot> {
        self.result.as_ref()
    }

    /// Number of instructions executed so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Executes the instruction at the program counter.
    ///
    /// A trap while decoding leaves the frame untouched. A trap while
    /// executing keeps whatever the instruction changed before it failed.
    pub fn step(&mut self) -> Result<(), Trap> {
        if self.returned {
            return Err(Trap::AlreadyReturned);
        }
        let at = self.pc;
        let mut next = at;
        let insn = insn::decode(&self.code, &mut next)?;
        self.pc = next;
        if log::log_enabled!(log::Level::Trace) {
            if let Some(&op) = self.code.get(at) {
                trace!("pc={at} {} depth={}", OpName(op), self.stack.size());
            }
        }
        self.steps += 1;
        self.execute(insn, at)
    }

    /// Runs until a return instruction completes the frame. Returns the
    /// returned value, `None` for `return`.
    pub fn run(&mut self) -> Result<Option<Slot>, Trap> {
        loop {
            self.step()?;
            if self.returned {
                return self.finish();
            }
        }
    }

    /// Runs like [`Frame::run`] but stops early after `max_steps`
    /// instructions or when `stop` is signalled. Both limits are checked
    /// between instructions.
    pub fn run_bounded(
        &mut self,
        max_steps: Option<u64>,
        stop: &StopHandle,
    ) -> Result<Outcome, FaultContext> {
        let start = self.steps;
        loop {
            let steps = self.steps - start;
            if stop.stop_requested() {
                warn!("Stop requested after {steps} steps at pc {}", self.pc);
                return Ok(Outcome::Interrupted { steps });
            }
            if max_steps.is_some_and(|max| steps >= max) {
                warn!("Step limit reached after {steps} steps at pc {}", self.pc);
                return Ok(Outcome::Interrupted { steps });
            }

            let at = self.pc;
            self.step().map_err(|trap| self.fault(trap, at))?;
            if self.returned {
                return self
                    .finish()
                    .map(Outcome::Returned)
                    .map_err(|trap| self.fault(trap, at));
            }
        }
    }

    fn fault(&self, trap: Trap, pc: usize) -> FaultContext {
        FaultContext {
            trap,
            pc,
            opcode: self.code.get(pc).copied(),
        }
    }

    fn finish(&self) -> Result<Option<Slot>, Trap> {
        if !self.stack.is_empty() {
            return Err(Trap::StackNotEmpty(self.stack.size()));
        }
        debug!(
            "Frame returned {} after {} steps",
            self.result
                .as_ref()
                .map_or_else(|| "void".to_string(), |s| s.to_string()),
            self.steps
        );
        Ok(self.result.clone())
    }

    fn jump(&mut self, from: usize, target: i64) -> Result<(), Trap> {
        match usize::try_from(target) {
            Ok(pc) if pc < self.code.len() => {
                self.pc = pc;
                Ok(())
            }
            _ => Err(Trap::BranchOutOfBounds { from, target }),
        }
    }

    fn pop_array(&mut self, op: u8) -> Result<ArrayRef, Trap> {
        match self.stack.pop_reference()? {
            Some(Reference::Array(array)) => Ok(array),
            Some(_) => Err(Trap::NotAnArray(op)),
            None => Err(Trap::NullReference(op)),
        }
    }

    fn execute(&mut self, insn: Insn, at: usize) -> Result<(), Trap> {
        match insn {
            Insn::Nop => {}
            Insn::Push(slot) => self.stack.push(slot),

            Insn::Load(kind, index) => {
                let slot = self.locals.load(index)?;
                kind.check(&slot)?;
                self.stack.push(slot);
            }
            Insn::Store(kind, index) => {
                kind.check(self.stack.peek()?)?;
                let slot = self.stack.pop()?;
                self.locals.store(index, slot)?;
            }
            Insn::Iinc(index, delta) => {
                let value = self.locals.get(index)?.int_value()?;
                self.locals.store(index, Slot::Int(value.wrapping_add(delta)))?;
            }

            Insn::ArrayLoad(op) => {
                let index = self.stack.pop_int()?;
                let array = self.pop_array(op)?;
                let slot = array.lock().load(op, index)?;
                self.stack.push(slot);
            }
            Insn::ArrayStore(op) => {
                let value = self.stack.pop()?;
                let index = self.stack.pop_int()?;
                let array = self.pop_array(op)?;
                array.lock().store(op, index, &value)?;
            }
            Insn::NewArray(element) => {
                let len = self.stack.pop_int()?;
                let len = usize::try_from(len).map_err(|_| Trap::NegativeArraySize(len))?;
                let array = ArrayRef::new(PrimitiveArray::new(element, len));
                self.stack.push_reference(Reference::Array(array));
            }
            Insn::ArrayLength => {
                let array = self.pop_array(opcode::ARRAYLENGTH)?;
                self.stack.push_int(array.len() as i32);
            }

            Insn::Pop => {
                self.stack.pop1()?;
            }
            Insn::Pop2 => self.stack.pop2()?,
            Insn::Dup => self.stack.dup()?,
            Insn::DupX1 => self.stack.dup_x1()?,
            Insn::DupX2 => self.stack.dup_x2()?,
            Insn::Dup2 => self.stack.dup2()?,
            Insn::Dup2X1 => self.stack.dup2_x1()?,
            Insn::Dup2X2 => self.stack.dup2_x2()?,
            Insn::Swap => self.stack.swap()?,

            Insn::Arith(num, op) => self.arith(num, op)?,
            Insn::Neg(num) => match num {
                Num::Int => {
                    let v = self.stack.pop_int()?;
                    self.stack.push_int(v.wrapping_neg());
                }
                Num::Long => {
                    let v = self.stack.pop_long()?;
                    self.stack.push_long(v.wrapping_neg());
                }
                Num::Float => {
                    let v = self.stack.pop_float()?;
                    self.stack.push_float(-v);
                }
                Num::Double => {
                    let v = self.stack.pop_double()?;
                    self.stack.push_double(-v);
                }
            },
            Insn::Bits(width, op) => self.bits(width, op)?,
            Insn::Convert(from, to) => {
                let n = self.pop_number(from)?;
                self.stack.push(n.convert(to));
            }
            Insn::Narrow(narrow) => {
                let v = self.stack.pop_int()?;
                let v = match narrow {
                    Narrow::Byte => v as i8 as i32,
                    Narrow::Char => v as u16 as i32,
                    Narrow::Short => v as i16 as i32,
                };
                self.stack.push_int(v);
            }
            Insn::Compare(cmp) => {
                let result = match cmp {
                    Cmp::Long => {
                        let left = self.stack.pop_long()?;
                        let right = self.stack.pop_long()?;
                        left.cmp(&right) as i32
                    }
                    Cmp::Float { nan } => {
                        let left = self.stack.pop_float()?;
                        let right = self.stack.pop_float()?;
                        left.partial_cmp(&right).map_or(nan, |o| o as i32)
                    }
                    Cmp::Double { nan } => {
                        let left = self.stack.pop_double()?;
                        let right = self.stack.pop_double()?;
                        left.partial_cmp(&right).map_or(nan, |o| o as i32)
                    }
                };
                self.stack.push_int(result);
            }

            Insn::If(cond, target) => {
                let v = self.stack.pop_int()?;
                if cond.holds(v.cmp(&0)) {
                    self.jump(at, target)?;
                }
            }
            Insn::IfICmp(cond, target) => {
                let left = self.stack.pop_int()?;
                let right = self.stack.pop_int()?;
                if cond.holds(left.cmp(&right)) {
                    self.jump(at, target)?;
                }
            }
            Insn::IfACmp { equal, target } => {
                let left = self.stack.pop_reference()?;
                let right = self.stack.pop_reference()?;
                if (left == right) == equal {
                    self.jump(at, target)?;
                }
            }
            Insn::IfNull { null, target } => {
                let r = self.stack.pop_reference()?;
                if r.is_none() == null {
                    self.jump(at, target)?;
                }
            }
            Insn::Goto(target) => self.jump(at, target)?,
            Insn::Jsr(target) => {
                self.stack.push_reference(Reference::ReturnAddress(self.pc));
                self.jump(at, target)?;
            }
            Insn::Ret(index) => match self.locals.get(index)? {
                Slot::Reference(Some(Reference::ReturnAddress(address))) => {
                    let address = *address as i64;
                    self.jump(at, address)?;
                }
                _ => return Err(Trap::NotAReturnAddress(index)),
            },

            Insn::Return(kind) => {
                self.result = match kind {
                    Some(kind) => {
                        kind.check(self.stack.peek()?)?;
                        Some(self.stack.pop()?)
                    }
                    None => None,
                };
                self.returned = true;
            }
        }
        Ok(())
    }

    /// Binary arithmetic. The top of the stack is the left operand.
    fn arith(&mut self, num: Num, op: Arith) -> Result<(), Trap> {
        match num {
            Num::Int => {
                let left = self.stack.pop_int()?;
                let right = self.stack.pop_int()?;
                let v = match op {
                    Arith::Add => left.wrapping_add(right),
                    Arith::Sub => left.wrapping_sub(right),
                    Arith::Mul => left.wrapping_mul(right),
                    Arith::Div => {
                        check_divisor(right)?;
                        left.wrapping_div(right)
                    }
                    Arith::Rem => {
                        check_divisor(right)?;
                        left.wrapping_rem(right)
                    }
                };
                self.stack.push_int(v);
            }
            Num::Long => {
                let left = self.stack.pop_long()?;
                let right = self.stack.pop_long()?;
                let v = match op {
                    Arith::Add => left.wrapping_add(right),
                    Arith::Sub => left.wrapping_sub(right),
                    Arith::Mul => left.wrapping_mul(right),
                    Arith::Div => {
                        check_divisor(right)?;
                        left.wrapping_div(right)
                    }
                    Arith::Rem => {
                        check_divisor(right)?;
                        left.wrapping_rem(right)
                    }
                };
                self.stack.push_long(v);
            }
            Num::Float => {
                let left = self.stack.pop_float()?;
                let right = self.stack.pop_float()?;
                self.stack.push_float(float_arith(op, left, right));
            }
            Num::Double => {
                let left = self.stack.pop_double()?;
                let right = self.stack.pop_double()?;
                self.stack.push_double(float_arith(op, left, right));
            }
        }
        Ok(())
    }

    /// Shifts take the amount from the top of the stack and the value from
    /// below it; the amount is masked to the value's width.
    fn bits(&mut self, width: Width, op: Bits) -> Result<(), Trap> {
        match (width, op) {
            (Width::Int, Bits::Shl | Bits::Shr | Bits::Ushr) => {
                let amount = self.stack.pop_int()? as u32;
                let value = self.stack.pop_int()?;
                let v = match op {
                    Bits::Shl => value.wrapping_shl(amount),
                    Bits::Shr => value.wrapping_shr(amount),
                    _ => (value as u32).wrapping_shr(amount) as i32,
                };
                self.stack.push_int(v);
            }
            (Width::Long, Bits::Shl | Bits::Shr | Bits::Ushr) => {
                let amount = self.stack.pop_int()? as u32;
                let value = self.stack.pop_long()?;
                let v = match op {
                    Bits::Shl => value.wrapping_shl(amount),
                    Bits::Shr => value.wrapping_shr(amount),
                    _ => (value as u64).wrapping_shr(amount) as i64,
                };
                self.stack.push_long(v);
            }
            (Width::Int, _) => {
                let left = self.stack.pop_int()?;
                let right = self.stack.pop_int()?;
                let v = match op {
                    Bits::And => left & right,
                    Bits::Or => left | right,
                    _ => left ^ right,
                };
                self.stack.push_int(v);
            }
            (Width::Long, _) => {
                let left = self.stack.pop_long()?;
                let right = self.stack.pop_long()?;
                let v = match op {
                    Bits::And => left & right,
                    Bits::Or => left | right,
                    _ => left ^ right,
                };
                self.stack.push_long(v);
            }
        }
        Ok(())
    }

    fn pop_number(&mut self, num: Num) -> Result<Number, Trap> {
        Ok(match num {
            Num::Int => Number::Int(self.stack.pop_int()?),
            Num::Long => Number::Long(self.stack.pop_long()?),
            Num::Float => Number::Float(self.stack.pop_float()?),
            Num::Double => Number::Double(self.stack.pop_double()?),
        })
    }
}

fn check_divisor<T: Default + PartialEq>(divisor: T) -> Result<(), Trap> {
    if divisor == T::default() {
        Err(Trap::DivideByZero)
    } else {
        Ok(())
    }
}

fn float_arith<T>(op: Arith, left: T, right: T) -> T
where
    T: Add<Output = T> + Sub<Output = T> + Mul<Output = T> + Div<Output = T> + Rem<Output = T>,
{
    match op {
        Arith::Add => left + right,
        Arith::Sub => left - right,
        Arith::Mul => left * right,
        Arith::Div => left / right,
        Arith::Rem => left % right,
    }
}

/// A popped numeric operand awaiting conversion.
#[derive(Clone, Copy)]
enum Number {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

impl Number {
    /// Converts with `as` semantics: integers truncate or sign-extend,
    /// float to integer saturates and maps NaN to zero.
    fn convert(self, to: Num) -> Slot {
        match to {
            Num::Int => Slot::Int(match self {
                Number::Int(v) => v,
                Number::Long(v) => v as i32,
                Number::Float(v) => v as i32,
                Number::Double(v) => v as i32,
            }),
            Num::Long => Slot::Long(match self {
                Number::Int(v) => v as i64,
                Number::Long(v) => v,
                Number::Float(v) => v as i64,
                Number::Double(v) => v as i64,
            }),
            Num::Float => Slot::Float(match self {
                Number::Int(v) => v as f32,
                Number::Long(v) => v as f32,
                Number::Float(v) => v,
                Number::Double(v) => v as f32,
            }),
            Num::Double => Slot::Double(match self {
                Number::Int(v) => v as f64,
                Number::Long(v) => v as f64,
                Number::Float(v) => v as f64,
                Number::Double(v) => v,
            }),
        }
    }
}
