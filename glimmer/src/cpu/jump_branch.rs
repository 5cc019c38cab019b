use super::{DEFAULT_DELAY, Interpreter};
use crate::PS2;
use glimmer_core::{
    cpu::{Reg, instr::Instruction},
    mem::Address,
};

impl Interpreter {
    /// Address of the delay slot of the current instruction.
    #[inline(always)]
    fn delay_slot(&self) -> u32 {
        self.current_addr.value().wrapping_add(4)
    }

    /// Writes the return address (past the delay slot) to `reg`.
    #[inline(always)]
    fn link(&self, ps2: &mut PS2, reg: Reg) {
        let ret = self.current_addr.value().wrapping_add(8);
        ps2.cpu.regs.write(reg, u64::from(ret));
    }

    /// Takes a PC-relative branch if `taken`. A not-taken likely branch skips its delay slot.
    pub(super) fn branch(
        &mut self,
        ps2: &mut PS2,
        instr: Instruction,
        taken: bool,
        likely: bool,
    ) -> u64 {
        if taken {
            let target = instr.branch_target(self.delay_slot());
            ps2.cpu.branch_to(Address(target));
        } else if likely {
            ps2.cpu.nullify_delay_slot();
        }

        DEFAULT_DELAY
    }

    /// `jump to imm26`
    pub fn j(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let target = instr.jump_target(self.delay_slot());
        ps2.cpu.branch_to(Address(target));

        DEFAULT_DELAY
    }

    /// `RA = return address; jump to imm26`
    pub fn jal(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        self.link(ps2, Reg::RA);
        self.j(ps2, instr)
    }

    /// `jump to rs`
    pub fn jr(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let target = ps2.cpu.regs.read32(instr.rs());
        ps2.cpu.branch_to(Address(target));

        DEFAULT_DELAY
    }

    /// `rd = return address; jump to rs`
    pub fn jalr(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        // read before linking, rd may be rs
        let target = ps2.cpu.regs.read32(instr.rs());
        self.link(ps2, instr.rd());
        ps2.cpu.branch_to(Address(target));

        DEFAULT_DELAY
    }

    /// `if rs == rt { branch }`
    pub fn beq(&mut self, ps2: &mut PS2, instr: Instruction, likely: bool) -> u64 {
        let rs = ps2.cpu.regs.read(instr.rs());
        let rt = ps2.cpu.regs.read(instr.rt());
        self.branch(ps2, instr, rs == rt, likely)
    }

    /// `if rs != rt { branch }`
    pub fn bne(&mut self, ps2: &mut PS2, instr: Instruction, likely: bool) -> u64 {
        let rs = ps2.cpu.regs.read(instr.rs());
        let rt = ps2.cpu.regs.read(instr.rt());
        self.branch(ps2, instr, rs != rt, likely)
    }

    /// `if rs <= 0 { branch }`
    pub fn blez(&mut self, ps2: &mut PS2, instr: Instruction, likely: bool) -> u64 {
        let rs = ps2.cpu.regs.read(instr.rs()) as i64;
        self.branch(ps2, instr, rs <= 0, likely)
    }

    /// `if rs > 0 { branch }`
    pub fn bgtz(&mut self, ps2: &mut PS2, instr: Instruction, likely: bool) -> u64 {
        let rs = ps2.cpu.regs.read(instr.rs()) as i64;
        self.branch(ps2, instr, rs > 0, likely)
    }

    /// `if rs < 0 { branch }`, optionally linking whether taken or not
    pub fn bltz(&mut self, ps2: &mut PS2, instr: Instruction, likely: bool, link: bool) -> u64 {
        let rs = ps2.cpu.regs.read(instr.rs()) as i64;
        if link {
            self.link(ps2, Reg::RA);
        }

        self.branch(ps2, instr, rs < 0, likely)
    }

    /// `if rs >= 0 { branch }`, optionally linking whether taken or not
    pub fn bgez(&mut self, ps2: &mut PS2, instr: Instruction, likely: bool, link: bool) -> u64 {
        let rs = ps2.cpu.regs.read(instr.rs()) as i64;
        if link {
            self.link(ps2, Reg::RA);
        }

        self.branch(ps2, instr, rs >= 0, likely)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{PROGRAM, exec, machine};
    use glimmer_core::cpu::{Reg, instr::Instruction};

    #[test]
    fn bgezal_links_even_when_not_taken() {
        let (mut interpreter, mut ps2) =
            machine(&[Instruction::bgezal(Reg::R1, 16), Instruction::NOP]);
        ps2.cpu.regs.write(Reg::R1, u64::MAX);

        exec(&mut interpreter, &mut ps2, 2);
        assert_eq!(ps2.cpu.regs.read(Reg::RA), u64::from(PROGRAM + 8));
        assert_eq!(ps2.cpu.pc.value(), PROGRAM + 8);
    }

    #[test]
    fn jalr_to_itself() {
        let (mut interpreter, mut ps2) =
            machine(&[Instruction::jalr(Reg::R1, Reg::R1), Instruction::NOP]);
        ps2.cpu.regs.write(Reg::R1, 0x0020_0000);

        exec(&mut interpreter, &mut ps2, 2);
        assert_eq!(ps2.cpu.pc.value(), 0x0020_0000);
        assert_eq!(ps2.cpu.regs.read(Reg::R1), u64::from(PROGRAM + 8));
    }

    #[test]
    fn taken_likely_branch_runs_delay_slot() {
        let (mut interpreter, mut ps2) = machine(&[
            Instruction::beql(Reg::R0, Reg::R0, 4),
            Instruction::addiu(Reg::R3, Reg::R0, 1),
        ]);

        exec(&mut interpreter, &mut ps2, 2);
        assert_eq!(ps2.cpu.regs.read(Reg::R3), 1);
        assert_eq!(ps2.cpu.pc.value(), PROGRAM + 4 + 16);
    }
}
