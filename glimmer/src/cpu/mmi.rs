//! The parallel (128-bit) instructions.

use super::{DEFAULT_DELAY, Interpreter};
use crate::PS2;
use glimmer_core::{
    cpu::instr::Instruction,
    util::{bytes, from_bytes, from_halfwords, from_words, halfwords, words},
};

impl Interpreter {
    fn parallel_operands(ps2: &PS2, instr: Instruction) -> (u128, u128) {
        (
            ps2.cpu.regs.read128(instr.rs()),
            ps2.cpu.regs.read128(instr.rt()),
        )
    }

    /// Counts the leading bits equal to the sign bit, minus one, of both words of `rs`.
    pub fn plzcw(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let rs = ps2.cpu.regs.read(instr.rs());
        let count = |word: u32| {
            let leading = if word & 0x8000_0000 != 0 {
                word.leading_ones()
            } else {
                word.leading_zeros()
            };

            u64::from(leading - 1)
        };

        let result = count(rs as u32) | (count((rs >> 32) as u32) << 32);
        ps2.cpu.regs.write(instr.rd(), result);

        DEFAULT_DELAY
    }

    /// `rd = rs + rt` per word
    pub fn paddw(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let (rs, rt) = Self::parallel_operands(ps2, instr);
        let (a, b) = (words(rs), words(rt));
        let result = from_words(std::array::from_fn(|i| a[i].wrapping_add(b[i])));
        ps2.cpu.regs.write128(instr.rd(), result);

        DEFAULT_DELAY
    }

    /// `rd = rs - rt` per word
    pub fn psubw(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let (rs, rt) = Self::parallel_operands(ps2, instr);
        let (a, b) = (words(rs), words(rt));
        let result = from_words(std::array::from_fn(|i| a[i].wrapping_sub(b[i])));
        ps2.cpu.regs.write128(instr.rd(), result);

        DEFAULT_DELAY
    }

    /// `rd = rs + rt` per halfword
    pub fn paddh(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let (rs, rt) = Self::parallel_operands(ps2, instr);
        let (a, b) = (halfwords(rs), halfwords(rt));
        let result = from_halfwords(std::array::from_fn(|i| a[i].wrapping_add(b[i])));
        ps2.cpu.regs.write128(instr.rd(), result);

        DEFAULT_DELAY
    }

    /// `rd = rs - rt` per halfword
    pub fn psubh(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let (rs, rt) = Self::parallel_operands(ps2, instr);
        let (a, b) = (halfwords(rs), halfwords(rt));
        let result = from_halfwords(std::array::from_fn(|i| a[i].wrapping_sub(b[i])));
        ps2.cpu.regs.write128(instr.rd(), result);

        DEFAULT_DELAY
    }

    /// `rd = rs + rt` per byte
    pub fn paddb(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let (rs, rt) = Self::parallel_operands(ps2, instr);
        let (a, b) = (bytes(rs), bytes(rt));
        let result = from_bytes(std::array::from_fn(|i| a[i].wrapping_add(b[i])));
        ps2.cpu.regs.write128(instr.rd(), result);

        DEFAULT_DELAY
    }

    /// `rd = rs - rt` per byte
    pub fn psubb(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let (rs, rt) = Self::parallel_operands(ps2, instr);
        let (a, b) = (bytes(rs), bytes(rt));
        let result = from_bytes(std::array::from_fn(|i| a[i].wrapping_sub(b[i])));
        ps2.cpu.regs.write128(instr.rd(), result);

        DEFAULT_DELAY
    }

    /// Interleaves the low words of `rt` and `rs`, `rt` first.
    pub fn pextlw(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let (rs, rt) = Self::parallel_operands(ps2, instr);
        let (a, b) = (words(rs), words(rt));
        let result = from_words([b[0], a[0], b[1], a[1]]);
        ps2.cpu.regs.write128(instr.rd(), result);

        DEFAULT_DELAY
    }

    /// `rd = HI` (all 128 bits)
    pub fn pmfhi(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let hi = ps2.cpu.regs.hi128();
        ps2.cpu.regs.write128(instr.rd(), hi);

        DEFAULT_DELAY
    }

    /// `rd = LO` (all 128 bits)
    pub fn pmflo(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let lo = ps2.cpu.regs.lo128();
        ps2.cpu.regs.write128(instr.rd(), lo);

        DEFAULT_DELAY
    }

    /// `HI = rs` (all 128 bits)
    pub fn pmthi(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let rs = ps2.cpu.regs.read128(instr.rs());
        ps2.cpu.regs.set_hi128(rs);

        DEFAULT_DELAY
    }

    /// `LO = rs` (all 128 bits)
    pub fn pmtlo(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let rs = ps2.cpu.regs.read128(instr.rs());
        ps2.cpu.regs.set_lo128(rs);

        DEFAULT_DELAY
    }

    /// `rd = (rs.low << 64) | rt.low`
    pub fn pcpyld(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let (rs, rt) = Self::parallel_operands(ps2, instr);
        let result = (rs << 64) | u128::from(rt as u64);
        ps2.cpu.regs.write128(instr.rd(), result);

        DEFAULT_DELAY
    }

    /// `rd = (rt.high << 64) | rs.high`
    pub fn pcpyud(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let (rs, rt) = Self::parallel_operands(ps2, instr);
        let result = ((rt >> 64) << 64) | (rs >> 64);
        ps2.cpu.regs.write128(instr.rd(), result);

        DEFAULT_DELAY
    }

    /// Broadcasts the lowest halfword of each doubleword of `rt` across it.
    pub fn pcpyh(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let rt = halfwords(ps2.cpu.regs.read128(instr.rt()));
        let result = from_halfwords(std::array::from_fn(|i| rt[i & !3]));
        ps2.cpu.regs.write128(instr.rd(), result);

        DEFAULT_DELAY
    }

    pub fn pand(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let (rs, rt) = Self::parallel_operands(ps2, instr);
        ps2.cpu.regs.write128(instr.rd(), rs & rt);

        DEFAULT_DELAY
    }

    pub fn por(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let (rs, rt) = Self::parallel_operands(ps2, instr);
        ps2.cpu.regs.write128(instr.rd(), rs | rt);

        DEFAULT_DELAY
    }

    pub fn pxor(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let (rs, rt) = Self::parallel_operands(ps2, instr);
        ps2.cpu.regs.write128(instr.rd(), rs ^ rt);

        DEFAULT_DELAY
    }

    pub fn pnor(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let (rs, rt) = Self::parallel_operands(ps2, instr);
        ps2.cpu.regs.write128(instr.rd(), !(rs | rt));

        DEFAULT_DELAY
    }
}
