//! Multiply and divide instructions of both pipelines, and the HI/LO moves.
//!
//! Pipeline 0 works on the low halves of HI and LO, pipeline 1 (`MULT1`, `DIV1`, ...) on the
//! high halves. Results are 32-bit values sign extended into each half.

use super::{DEFAULT_DELAY, Interpreter};
use crate::PS2;
use glimmer_core::cpu::instr::Instruction;

#[inline(always)]
fn split(value: u64) -> (u32, u32) {
    (value as u32, (value >> 32) as u32)
}

#[inline(always)]
fn join(lo: u64, hi: u64) -> u64 {
    u64::from(lo as u32) | (u64::from(hi as u32) << 32)
}

fn product_signed(a: u32, b: u32) -> u64 {
    (i64::from(a as i32) * i64::from(b as i32)) as u64
}

fn product_unsigned(a: u32, b: u32) -> u64 {
    u64::from(a) * u64::from(b)
}

/// Signed division as done by the EE: division by zero and overflow don't trap.
pub(super) fn quotient_signed(a: u32, b: u32) -> (u32, u32) {
    let (a, b) = (a as i32, b as i32);
    if b == 0 {
        let lo = if a >= 0 { -1 } else { 1 };
        (lo as u32, a as u32)
    } else if a == i32::MIN && b == -1 {
        (i32::MIN as u32, 0)
    } else {
        ((a / b) as u32, (a % b) as u32)
    }
}

/// Unsigned division as done by the EE: division by zero doesn't trap.
pub(super) fn quotient_unsigned(a: u32, b: u32) -> (u32, u32) {
    if b == 0 {
        (u32::MAX, a)
    } else {
        (a / b, a % b)
    }
}

impl Interpreter {
    fn operands(ps2: &PS2, instr: Instruction) -> (u32, u32) {
        (
            ps2.cpu.regs.read32(instr.rs()),
            ps2.cpu.regs.read32(instr.rt()),
        )
    }

    /// `(LO, HI) = rs * rt; rd = LO`
    pub fn mult(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let (rs, rt) = Self::operands(ps2, instr);
        let (lo, hi) = split(product_signed(rs, rt));
        ps2.cpu.regs.set_lo_hi(lo, hi);
        ps2.cpu.regs.write_sign_extended(instr.rd(), lo);

        DEFAULT_DELAY
    }

    /// `(LO, HI) = rs * rt; rd = LO`, unsigned
    pub fn multu(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let (rs, rt) = Self::operands(ps2, instr);
        let (lo, hi) = split(product_unsigned(rs, rt));
        ps2.cpu.regs.set_lo_hi(lo, hi);
        ps2.cpu.regs.write_sign_extended(instr.rd(), lo);

        DEFAULT_DELAY
    }

    /// `(LO1, HI1) = rs * rt; rd = LO1`
    pub fn mult1(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let (rs, rt) = Self::operands(ps2, instr);
        let (lo, hi) = split(product_signed(rs, rt));
        ps2.cpu.regs.set_lo_hi1(lo, hi);
        ps2.cpu.regs.write_sign_extended(instr.rd(), lo);

        DEFAULT_DELAY
    }

    /// `(LO1, HI1) = rs * rt; rd = LO1`, unsigned
    pub fn multu1(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let (rs, rt) = Self::operands(ps2, instr);
        let (lo, hi) = split(product_unsigned(rs, rt));
        ps2.cpu.regs.set_lo_hi1(lo, hi);
        ps2.cpu.regs.write_sign_extended(instr.rd(), lo);

        DEFAULT_DELAY
    }

    /// `(LO, HI) += rs * rt; rd = LO`
    pub fn madd(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let (rs, rt) = Self::operands(ps2, instr);
        let acc = join(ps2.cpu.regs.lo(), ps2.cpu.regs.hi());
        let (lo, hi) = split(acc.wrapping_add(product_signed(rs, rt)));
        ps2.cpu.regs.set_lo_hi(lo, hi);
        ps2.cpu.regs.write_sign_extended(instr.rd(), lo);

        DEFAULT_DELAY
    }

    /// `(LO, HI) += rs * rt; rd = LO`, unsigned
    pub fn maddu(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let (rs, rt) = Self::operands(ps2, instr);
        let acc = join(ps2.cpu.regs.lo(), ps2.cpu.regs.hi());
        let (lo, hi) = split(acc.wrapping_add(product_unsigned(rs, rt)));
        ps2.cpu.regs.set_lo_hi(lo, hi);
        ps2.cpu.regs.write_sign_extended(instr.rd(), lo);

        DEFAULT_DELAY
    }

    /// `(LO1, HI1) += rs * rt; rd = LO1`
    pub fn madd1(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let (rs, rt) = Self::operands(ps2, instr);
        let acc = join(ps2.cpu.regs.lo1(), ps2.cpu.regs.hi1());
        let (lo, hi) = split(acc.wrapping_add(product_signed(rs, rt)));
        ps2.cpu.regs.set_lo_hi1(lo, hi);
        ps2.cpu.regs.write_sign_extended(instr.rd(), lo);

        DEFAULT_DELAY
    }

    /// `(LO1, HI1) += rs * rt; rd = LO1`, unsigned
    pub fn maddu1(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let (rs, rt) = Self::operands(ps2, instr);
        let acc = join(ps2.cpu.regs.lo1(), ps2.cpu.regs.hi1());
        let (lo, hi) = split(acc.wrapping_add(product_unsigned(rs, rt)));
        ps2.cpu.regs.set_lo_hi1(lo, hi);
        ps2.cpu.regs.write_sign_extended(instr.rd(), lo);

        DEFAULT_DELAY
    }

    /// `LO = rs / rt; HI = rs % rt`
    pub fn div(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let (rs, rt) = Self::operands(ps2, instr);
        let (lo, hi) = quotient_signed(rs, rt);
        ps2.cpu.regs.set_lo_hi(lo, hi);

        DEFAULT_DELAY
    }

    /// `LO = rs / rt; HI = rs % rt`, unsigned
    pub fn divu(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let (rs, rt) = Self::operands(ps2, instr);
        let (lo, hi) = quotient_unsigned(rs, rt);
        ps2.cpu.regs.set_lo_hi(lo, hi);

        DEFAULT_DELAY
    }

    /// `LO1 = rs / rt; HI1 = rs % rt`
    pub fn div1(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let (rs, rt) = Self::operands(ps2, instr);
        let (lo, hi) = quotient_signed(rs, rt);
        ps2.cpu.regs.set_lo_hi1(lo, hi);

        DEFAULT_DELAY
    }

    /// `LO1 = rs / rt; HI1 = rs % rt`, unsigned
    pub fn divu1(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let (rs, rt) = Self::operands(ps2, instr);
        let (lo, hi) = quotient_unsigned(rs, rt);
        ps2.cpu.regs.set_lo_hi1(lo, hi);

        DEFAULT_DELAY
    }

    /// `rd = HI`
    pub fn mfhi(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let hi = ps2.cpu.regs.hi();
        ps2.cpu.regs.write(instr.rd(), hi);

        DEFAULT_DELAY
    }

    /// `rd = LO`
    pub fn mflo(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let lo = ps2.cpu.regs.lo();
        ps2.cpu.regs.write(instr.rd(), lo);

        DEFAULT_DELAY
    }

    /// `HI = rs`
    pub fn mthi(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let rs = ps2.cpu.regs.read(instr.rs());
        ps2.cpu.regs.set_hi(rs);

        DEFAULT_DELAY
    }

    /// `LO = rs`
    pub fn mtlo(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let rs = ps2.cpu.regs.read(instr.rs());
        ps2.cpu.regs.set_lo(rs);

        DEFAULT_DELAY
    }

    /// `rd = HI1`
    pub fn mfhi1(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let hi = ps2.cpu.regs.hi1();
        ps2.cpu.regs.write(instr.rd(), hi);

        DEFAULT_DELAY
    }

    /// `rd = LO1`
    pub fn mflo1(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let lo = ps2.cpu.regs.lo1();
        ps2.cpu.regs.write(instr.rd(), lo);

        DEFAULT_DELAY
    }

    /// `HI1 = rs`
    pub fn mthi1(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let rs = ps2.cpu.regs.read(instr.rs());
        ps2.cpu.regs.set_hi1(rs);

        DEFAULT_DELAY
    }

    /// `LO1 = rs`
    pub fn mtlo1(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let rs = ps2.cpu.regs.read(instr.rs());
        ps2.cpu.regs.set_lo1(rs);

        DEFAULT_DELAY
    }
}
