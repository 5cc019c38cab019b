use super::{DEFAULT_DELAY, Interpreter};
use crate::PS2;
use glimmer_core::cpu::instr::Instruction;

impl Interpreter {
    /// `rt = imm16 << 16`
    pub fn lui(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let result = u32::from(instr.imm16()) << 16;
        ps2.cpu.regs.write_sign_extended(instr.rt(), result);

        DEFAULT_DELAY
    }

    /// `rt = rs | imm16`
    pub fn ori(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let rs = ps2.cpu.regs.read(instr.rs());
        ps2.cpu.regs.write(instr.rt(), rs | u64::from(instr.imm16()));

        DEFAULT_DELAY
    }

    /// `rt = rs & imm16`
    pub fn andi(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let rs = ps2.cpu.regs.read(instr.rs());
        ps2.cpu.regs.write(instr.rt(), rs & u64::from(instr.imm16()));

        DEFAULT_DELAY
    }

    /// `rt = rs ^ imm16`
    pub fn xori(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let rs = ps2.cpu.regs.read(instr.rs());
        ps2.cpu.regs.write(instr.rt(), rs ^ u64::from(instr.imm16()));

        DEFAULT_DELAY
    }

    /// `rt = rs + signed_imm16`
    #[inline(always)]
    pub fn addiu(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let rs = ps2.cpu.regs.read32(instr.rs());
        let result = rs.wrapping_add_signed(i32::from(instr.signed_imm16()));
        ps2.cpu.regs.write_sign_extended(instr.rt(), result);

        DEFAULT_DELAY
    }

    /// `rt = rs + signed_imm16` on 64 bits
    pub fn daddiu(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let rs = ps2.cpu.regs.read(instr.rs());
        let result = rs.wrapping_add_signed(i64::from(instr.signed_imm16()));
        ps2.cpu.regs.write(instr.rt(), result);

        DEFAULT_DELAY
    }

    /// `rt = rs < signed_imm16`
    pub fn slti(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let rs = ps2.cpu.regs.read(instr.rs()) as i64;
        let result = rs < i64::from(instr.signed_imm16());
        ps2.cpu.regs.write(instr.rt(), u64::from(result));

        DEFAULT_DELAY
    }

    /// `rt = rs < signed_imm16`, compared as unsigned
    pub fn sltiu(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let rs = ps2.cpu.regs.read(instr.rs());
        let result = rs < i64::from(instr.signed_imm16()) as u64;
        ps2.cpu.regs.write(instr.rt(), u64::from(result));

        DEFAULT_DELAY
    }

    /// `rd = rs + rt`
    pub fn addu(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let rs = ps2.cpu.regs.read32(instr.rs());
        let rt = ps2.cpu.regs.read32(instr.rt());
        ps2.cpu.regs.write_sign_extended(instr.rd(), rs.wrapping_add(rt));

        DEFAULT_DELAY
    }

    /// `rd = rs - rt`
    pub fn subu(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let rs = ps2.cpu.regs.read32(instr.rs());
        let rt = ps2.cpu.regs.read32(instr.rt());
        ps2.cpu.regs.write_sign_extended(instr.rd(), rs.wrapping_sub(rt));

        DEFAULT_DELAY
    }

    /// `rd = rs + rt` on 64 bits
    pub fn daddu(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let rs = ps2.cpu.regs.read(instr.rs());
        let rt = ps2.cpu.regs.read(instr.rt());
        ps2.cpu.regs.write(instr.rd(), rs.wrapping_add(rt));

        DEFAULT_DELAY
    }

    /// `rd = rs - rt` on 64 bits
    pub fn dsubu(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let rs = ps2.cpu.regs.read(instr.rs());
        let rt = ps2.cpu.regs.read(instr.rt());
        ps2.cpu.regs.write(instr.rd(), rs.wrapping_sub(rt));

        DEFAULT_DELAY
    }

    /// `rd = rs & rt`
    pub fn and(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let rs = ps2.cpu.regs.read(instr.rs());
        let rt = ps2.cpu.regs.read(instr.rt());
        ps2.cpu.regs.write(instr.rd(), rs & rt);

        DEFAULT_DELAY
    }

    /// `rd = rs | rt`
    pub fn or(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let rs = ps2.cpu.regs.read(instr.rs());
        let rt = ps2.cpu.regs.read(instr.rt());
        ps2.cpu.regs.write(instr.rd(), rs | rt);

        DEFAULT_DELAY
    }

    /// `rd = rs ^ rt`
    pub fn xor(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let rs = ps2.cpu.regs.read(instr.rs());
        let rt = ps2.cpu.regs.read(instr.rt());
        ps2.cpu.regs.write(instr.rd(), rs ^ rt);

        DEFAULT_DELAY
    }

    /// `rd = !(rs | rt)`
    pub fn nor(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let rs = ps2.cpu.regs.read(instr.rs());
        let rt = ps2.cpu.regs.read(instr.rt());
        ps2.cpu.regs.write(instr.rd(), !(rs | rt));

        DEFAULT_DELAY
    }

    /// `rd = rs < rt`
    pub fn slt(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let rs = ps2.cpu.regs.read(instr.rs()) as i64;
        let rt = ps2.cpu.regs.read(instr.rt()) as i64;
        ps2.cpu.regs.write(instr.rd(), u64::from(rs < rt));

        DEFAULT_DELAY
    }

    /// `rd = rs < rt`, compared as unsigned
    pub fn sltu(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let rs = ps2.cpu.regs.read(instr.rs());
        let rt = ps2.cpu.regs.read(instr.rt());
        ps2.cpu.regs.write(instr.rd(), u64::from(rs < rt));

        DEFAULT_DELAY
    }

    /// `rd = rt << sa`
    #[inline(always)]
    pub fn sll(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let rt = ps2.cpu.regs.read32(instr.rt());
        ps2.cpu
            .regs
            .write_sign_extended(instr.rd(), rt << instr.sa());

        DEFAULT_DELAY
    }

    /// `rd = rt >> sa`
    pub fn srl(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let rt = ps2.cpu.regs.read32(instr.rt());
        ps2.cpu
            .regs
            .write_sign_extended(instr.rd(), rt >> instr.sa());

        DEFAULT_DELAY
    }

    /// `rd = rt >> sa`, arithmetic
    pub fn sra(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let rt = ps2.cpu.regs.read32(instr.rt()) as i32;
        ps2.cpu
            .regs
            .write_sign_extended(instr.rd(), (rt >> instr.sa()) as u32);

        DEFAULT_DELAY
    }

    /// `rd = rt << (rs & 0x1F)`
    pub fn sllv(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let rt = ps2.cpu.regs.read32(instr.rt());
        let rs = ps2.cpu.regs.read32(instr.rs());
        ps2.cpu
            .regs
            .write_sign_extended(instr.rd(), rt << (rs & 0x1F));

        DEFAULT_DELAY
    }

    /// `rd = rt >> (rs & 0x1F)`
    pub fn srlv(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let rt = ps2.cpu.regs.read32(instr.rt());
        let rs = ps2.cpu.regs.read32(instr.rs());
        ps2.cpu
            .regs
            .write_sign_extended(instr.rd(), rt >> (rs & 0x1F));

        DEFAULT_DELAY
    }

    /// `rd = rt >> (rs & 0x1F)`, arithmetic
    pub fn srav(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let rt = ps2.cpu.regs.read32(instr.rt()) as i32;
        let rs = ps2.cpu.regs.read32(instr.rs());
        ps2.cpu
            .regs
            .write_sign_extended(instr.rd(), (rt >> (rs & 0x1F)) as u32);

        DEFAULT_DELAY
    }

    /// `rd = rt << (sa + extra)`, where `extra` is 32 for `DSLL32`
    pub fn dsll(&mut self, ps2: &mut PS2, instr: Instruction, extra: u32) -> u64 {
        let rt = ps2.cpu.regs.read(instr.rt());
        let shift = u32::from(instr.sa()) + extra;
        ps2.cpu.regs.write(instr.rd(), rt << shift);

        DEFAULT_DELAY
    }

    /// `rd = rt >> (sa + extra)`, where `extra` is 32 for `DSRL32`
    pub fn dsrl(&mut self, ps2: &mut PS2, instr: Instruction, extra: u32) -> u64 {
        let rt = ps2.cpu.regs.read(instr.rt());
        let shift = u32::from(instr.sa()) + extra;
        ps2.cpu.regs.write(instr.rd(), rt >> shift);

        DEFAULT_DELAY
    }

    /// `rd = rt >> (sa + extra)`, arithmetic, where `extra` is 32 for `DSRA32`
    pub fn dsra(&mut self, ps2: &mut PS2, instr: Instruction, extra: u32) -> u64 {
        let rt = ps2.cpu.regs.read(instr.rt()) as i64;
        let shift = u32::from(instr.sa()) + extra;
        ps2.cpu.regs.write(instr.rd(), (rt >> shift) as u64);

        DEFAULT_DELAY
    }

    /// `rd = rt << (rs & 0x3F)`
    pub fn dsllv(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let rt = ps2.cpu.regs.read(instr.rt());
        let rs = ps2.cpu.regs.read32(instr.rs());
        ps2.cpu.regs.write(instr.rd(), rt << (rs & 0x3F));

        DEFAULT_DELAY
    }

    /// `rd = rt >> (rs & 0x3F)`
    pub fn dsrlv(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let rt = ps2.cpu.regs.read(instr.rt());
        let rs = ps2.cpu.regs.read32(instr.rs());
        ps2.cpu.regs.write(instr.rd(), rt >> (rs & 0x3F));

        DEFAULT_DELAY
    }

    /// `rd = rt >> (rs & 0x3F)`, arithmetic
    pub fn dsrav(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let rt = ps2.cpu.regs.read(instr.rt()) as i64;
        let rs = ps2.cpu.regs.read32(instr.rs());
        ps2.cpu.regs.write(instr.rd(), (rt >> (rs & 0x3F)) as u64);

        DEFAULT_DELAY
    }

    /// `if rt == 0 { rd = rs }`
    pub fn movz(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        if ps2.cpu.regs.read(instr.rt()) == 0 {
            let rs = ps2.cpu.regs.read(instr.rs());
            ps2.cpu.regs.write(instr.rd(), rs);
        }

        DEFAULT_DELAY
    }

    /// `if rt != 0 { rd = rs }`
    pub fn movn(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        if ps2.cpu.regs.read(instr.rt()) != 0 {
            let rs = ps2.cpu.regs.read(instr.rs());
            ps2.cpu.regs.write(instr.rd(), rs);
        }

        DEFAULT_DELAY
    }

    /// `rd = SA`
    pub fn mfsa(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let sa = ps2.cpu.regs.sa();
        ps2.cpu.regs.write(instr.rd(), u64::from(sa));

        DEFAULT_DELAY
    }

    /// `SA = rs`
    pub fn mtsa(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let rs = ps2.cpu.regs.read32(instr.rs());
        ps2.cpu.regs.set_sa(rs);

        DEFAULT_DELAY
    }

    /// `SA = ((rs ^ imm16) & 0xF) * 8`, a byte shift amount
    pub fn mtsab(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let rs = ps2.cpu.regs.read32(instr.rs());
        let bytes = (rs ^ u32::from(instr.imm16())) & 0xF;
        ps2.cpu.regs.set_sa(bytes * 8);

        DEFAULT_DELAY
    }

    /// `SA = ((rs ^ imm16) & 0x7) * 16`, a halfword shift amount
    pub fn mtsah(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let rs = ps2.cpu.regs.read32(instr.rs());
        let halfwords = (rs ^ u32::from(instr.imm16())) & 0x7;
        ps2.cpu.regs.set_sa(halfwords * 16);

        DEFAULT_DELAY
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{PROGRAM, exec, machine};
    use glimmer_core::cpu::{Reg, instr::Instruction};
    use proptest::prelude::*;

    #[test]
    fn writes_to_zero_are_discarded() {
        let (mut interpreter, mut ps2) = machine(&[
            Instruction::addiu(Reg::R0, Reg::R0, 5),
            Instruction::lui(Reg::R0, 0x1234),
            Instruction::or(Reg::R1, Reg::R0, Reg::R0),
        ]);

        exec(&mut interpreter, &mut ps2, 3);
        assert_eq!(ps2.cpu.regs.read128(Reg::R0), 0);
        assert_eq!(ps2.cpu.regs.read(Reg::R1), 0);
    }

    #[test]
    fn word_results_are_sign_extended() {
        let (mut interpreter, mut ps2) = machine(&[
            Instruction::lui(Reg::R1, 0x8000),
            Instruction::ori(Reg::R1, Reg::R1, 0x0001),
            Instruction::addu(Reg::R2, Reg::R1, Reg::R0),
            Instruction::sll(Reg::R3, Reg::R1, 1),
        ]);

        exec(&mut interpreter, &mut ps2, 4);
        assert_eq!(ps2.cpu.regs.read(Reg::R1), 0xFFFF_FFFF_8000_0001);
        assert_eq!(ps2.cpu.regs.read(Reg::R2), 0xFFFF_FFFF_8000_0001);
        assert_eq!(ps2.cpu.regs.read(Reg::R3), 2);
    }

    #[test]
    fn upper_half_survives_64_bit_writes() {
        let (mut interpreter, mut ps2) = machine(&[Instruction::daddu(Reg::R1, Reg::R2, Reg::R0)]);
        ps2.cpu.regs.write128(Reg::R1, 0xAAAA << 64);
        ps2.cpu.regs.write(Reg::R2, 7);

        exec(&mut interpreter, &mut ps2, 1);
        assert_eq!(ps2.cpu.regs.read128(Reg::R1), (0xAAAA << 64) | 7);
    }

    #[test]
    fn add_wraps_without_an_exception() {
        let (mut interpreter, mut ps2) = machine(&[
            Instruction::add(Reg::R3, Reg::R1, Reg::R2),
            Instruction::addi(Reg::R4, Reg::R1, 1),
        ]);
        ps2.cpu.regs.write(Reg::R1, 0x7FFF_FFFF);
        ps2.cpu.regs.write(Reg::R2, 1);

        exec(&mut interpreter, &mut ps2, 2);
        assert_eq!(ps2.cpu.regs.read(Reg::R3), 0xFFFF_FFFF_8000_0000);
        assert_eq!(ps2.cpu.regs.read(Reg::R4), 0xFFFF_FFFF_8000_0000);
        assert_eq!(ps2.cpu.pc.value(), PROGRAM + 8);
        assert!(!ps2.cpu.cop0.status().exl());
    }

    #[test]
    fn dsub_wraps_without_an_exception() {
        let (mut interpreter, mut ps2) = machine(&[Instruction::dsub(Reg::R3, Reg::R1, Reg::R2)]);
        ps2.cpu.regs.write(Reg::R1, i64::MIN as u64);
        ps2.cpu.regs.write(Reg::R2, 1);

        exec(&mut interpreter, &mut ps2, 1);
        assert_eq!(ps2.cpu.regs.read(Reg::R3), i64::MAX as u64);
        assert!(!ps2.cpu.cop0.status().exl());
    }

    #[test]
    fn dsll32_reaches_the_upper_word() {
        let (mut interpreter, mut ps2) = machine(&[Instruction::dsll32(Reg::R2, Reg::R1, 4)]);
        ps2.cpu.regs.write(Reg::R1, 0x1);

        exec(&mut interpreter, &mut ps2, 1);
        assert_eq!(ps2.cpu.regs.read(Reg::R2), 1 << 36);
    }

    proptest! {
        #[test]
        fn slt_is_signed(a: i64, b: i64) {
            let (mut interpreter, mut ps2) =
                machine(&[Instruction::slt(Reg::R3, Reg::R1, Reg::R2)]);
            ps2.cpu.regs.write(Reg::R1, a as u64);
            ps2.cpu.regs.write(Reg::R2, b as u64);

            exec(&mut interpreter, &mut ps2, 1);
            prop_assert_eq!(ps2.cpu.regs.read(Reg::R3), u64::from(a < b));
        }

        #[test]
        fn subu_wraps(a: u32, b: u32) {
            let (mut interpreter, mut ps2) =
                machine(&[Instruction::subu(Reg::R3, Reg::R1, Reg::R2)]);
            ps2.cpu.regs.write(Reg::R1, u64::from(a));
            ps2.cpu.regs.write(Reg::R2, u64::from(b));

            exec(&mut interpreter, &mut ps2, 1);
            prop_assert_eq!(ps2.cpu.regs.read(Reg::R3), i64::from(a.wrapping_sub(b) as i32) as u64);
        }
    }
}
