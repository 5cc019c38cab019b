use super::{DEFAULT_DELAY, Interpreter};
use crate::PS2;
use glimmer_core::cpu::{
    cop0::Exception,
    instr::{Instruction, Operation},
};

impl Interpreter {
    pub fn syscall(&mut self, ps2: &mut PS2, _: Instruction) -> u64 {
        self.raise(ps2, Exception::Syscall)
    }

    pub fn breakpoint(&mut self, ps2: &mut PS2, _: Instruction) -> u64 {
        self.raise(ps2, Exception::Breakpoint)
    }

    /// Traps if the condition of `operation` holds for `lhs` and `rhs`.
    fn trap_if(&mut self, ps2: &mut PS2, operation: Operation, lhs: u64, rhs: u64) -> u64 {
        use Operation as O;

        let taken = match operation {
            O::TGE | O::TGEI => (lhs as i64) >= (rhs as i64),
            O::TGEU | O::TGEIU => lhs >= rhs,
            O::TLT | O::TLTI => (lhs as i64) < (rhs as i64),
            O::TLTU | O::TLTIU => lhs < rhs,
            O::TEQ | O::TEQI => lhs == rhs,
            O::TNE | O::TNEI => lhs != rhs,
            _ => false,
        };

        if taken {
            self.raise(ps2, Exception::Trap)
        } else {
            DEFAULT_DELAY
        }
    }

    /// `if rs <cond> rt { trap }`
    pub fn trap(&mut self, ps2: &mut PS2, instr: Instruction, operation: Operation) -> u64 {
        let rs = ps2.cpu.regs.read(instr.rs());
        let rt = ps2.cpu.regs.read(instr.rt());
        self.trap_if(ps2, operation, rs, rt)
    }

    /// `if rs <cond> signext(imm16) { trap }`
    pub fn trap_immediate(
        &mut self,
        ps2: &mut PS2,
        instr: Instruction,
        operation: Operation,
    ) -> u64 {
        let rs = ps2.cpu.regs.read(instr.rs());
        let imm = i64::from(instr.signed_imm16()) as u64;
        self.trap_if(ps2, operation, rs, imm)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{PROGRAM, exec, machine};
    use glimmer_core::{
        cpu::{Reg, cop0::Exception, instr::Instruction},
        mem::Address,
    };

    fn regimm(rt: u8, rs: Reg, imm: i16) -> Instruction {
        Instruction::from_bits(1 << 26)
            .with_rs(rs)
            .with_rt_bits(rt)
            .with_signed_imm16(imm)
    }

    const TGEIU: u8 = 0x09;
    const TNEI: u8 = 0x0E;

    #[test]
    fn teq_traps_on_equal() {
        let (mut interpreter, mut ps2) = machine(&[Instruction::teq(Reg::R1, Reg::R2)]);
        ps2.cpu.regs.write(Reg::R1, 7);

        exec(&mut interpreter, &mut ps2, 1);
        assert_eq!(ps2.cpu.pc.value(), PROGRAM + 4);

        ps2.cpu.regs.write(Reg::R2, 7);
        ps2.cpu.jump_to(Address(PROGRAM));
        exec(&mut interpreter, &mut ps2, 1);
        assert_eq!(ps2.cpu.cop0.cause().exception(), Some(Exception::Trap));
        assert_eq!(ps2.cpu.cop0.epc().value(), PROGRAM);
    }

    #[test]
    fn unsigned_immediate_trap_compares_sign_extended() {
        // -1 sign extends to u64::MAX, which nothing but u64::MAX reaches
        let (mut interpreter, mut ps2) = machine(&[regimm(TGEIU, Reg::R1, -1)]);
        ps2.cpu.regs.write(Reg::R1, u64::MAX - 1);

        exec(&mut interpreter, &mut ps2, 1);
        assert_eq!(ps2.cpu.pc.value(), PROGRAM + 4);
        assert!(!ps2.cpu.cop0.status().exl());
    }

    #[test]
    fn tnei_traps_on_difference() {
        let (mut interpreter, mut ps2) = machine(&[regimm(TNEI, Reg::R1, 3)]);
        ps2.cpu.regs.write(Reg::R1, 4);

        exec(&mut interpreter, &mut ps2, 1);
        assert_eq!(ps2.cpu.cop0.cause().exception(), Some(Exception::Trap));
    }
}
