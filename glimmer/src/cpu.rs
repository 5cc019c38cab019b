//! Implementation of the EE core (R5900) interpreter.

mod arith_logic;
mod coproc;
mod exception;
mod jump_branch;
mod load_store;
mod mmi;
mod mult_div;

use crate::{PS2, bus::MisalignedAddressErr};
use easyerr::Error;
use glimmer_core::{
    cpu::{
        ICache,
        cop0::{Exception, Line},
        descriptor::{Descriptor, InstructionKind, Operand},
        fpu::Condition,
        instr::{Instruction, Operation},
    },
    mem::Address,
};
use tracing::{debug, trace};

/// Fatal EE errors. Anything the guest can recover from is an exception instead.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("instruction fetch failed")]
    Fetch { source: MisalignedAddressErr },
}

const DEFAULT_DELAY: u64 = 1;

/// An interpreter of the EE core.
#[derive(Debug, Default)]
pub struct Interpreter {
    /// Address of the currently executing instruction.
    current_addr: Address,
    /// Whether the current instruction is in a delay slot.
    current_in_delay: bool,
    /// What `next_pc` was before the current instruction was issued.
    current_next: Address,
    /// Cycle at which the results of the multiply/divide pipelines (0 and 1) are ready.
    hilo_ready: [u64; 2],
    /// Cycles executed so far.
    cycles: u64,
    /// Cycles the last instruction ran past the end of the previous budget.
    debt: u64,
}

impl Interpreter {
    /// Cycles executed since this interpreter was created.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Records an exception caused by the current instruction and jumps to its handler.
    fn raise(&mut self, ps2: &mut PS2, exception: Exception) -> u64 {
        let vector =
            ps2.cpu
                .cop0
                .enter_exception(exception, self.current_addr, self.current_in_delay);

        debug!(
            exception = <&str>::from(exception),
            at = %self.current_addr,
            delay_slot = self.current_in_delay,
            "exception",
        );

        ps2.cpu.jump_to(vector);
        DEFAULT_DELAY
    }

    fn address_error(&mut self, ps2: &mut PS2, addr: Address, store: bool) -> u64 {
        ps2.cpu.cop0.set_bad_vaddr(addr);
        self.raise(
            ps2,
            if store {
                Exception::AddressErrorStore
            } else {
                Exception::AddressErrorLoad
            },
        )
    }

    /// Puts the current instruction back so that it's issued again on the next step.
    fn reissue(&mut self, ps2: &mut PS2) -> u64 {
        ps2.cpu.pc = self.current_addr;
        ps2.cpu.next_pc = self.current_next;
        ps2.cpu.in_delay_slot = self.current_in_delay;

        DEFAULT_DELAY
    }

    /// Updates INT0 and takes an interrupt if one is pending. Returns whether one was taken.
    fn check_interrupts(&mut self, ps2: &mut PS2) -> bool {
        let int0 = ps2.interrupts.pending();
        ps2.cpu.cop0.set_line(Line::Int0, int0);

        if !ps2.cpu.cop0.interrupt_pending() {
            return false;
        }

        ps2.cpu.unhalt();
        let vector = ps2.cpu.cop0.enter_exception(
            Exception::Interrupt,
            ps2.cpu.pc,
            ps2.cpu.in_delay_slot,
        );

        trace!(at = %ps2.cpu.pc, ip = ps2.cpu.cop0.cause().ip(), "interrupt");
        ps2.cpu.jump_to(vector);

        true
    }

    /// Cycles the given instruction must wait for a HI/LO result still in flight.
    fn hilo_stall(&self, descriptor: &Descriptor) -> u64 {
        descriptor
            .inputs()
            .filter_map(|operand| match operand {
                Operand::Lo | Operand::Hi => Some(self.hilo_ready[0]),
                Operand::Lo1 | Operand::Hi1 => Some(self.hilo_ready[1]),
                _ => None,
            })
            .max()
            .map_or(0, |ready| ready.saturating_sub(self.cycles))
    }

    fn exec(&mut self, ps2: &mut PS2, instr: Instruction, operation: Operation) -> u64 {
        use Operation as O;

        match operation {
            O::J => self.j(ps2, instr),
            O::JAL => self.jal(ps2, instr),
            O::JR => self.jr(ps2, instr),
            O::JALR => self.jalr(ps2, instr),
            O::BEQ => self.beq(ps2, instr, false),
            O::BNE => self.bne(ps2, instr, false),
            O::BLEZ => self.blez(ps2, instr, false),
            O::BGTZ => self.bgtz(ps2, instr, false),
            O::BEQL => self.beq(ps2, instr, true),
            O::BNEL => self.bne(ps2, instr, true),
            O::BLEZL => self.blez(ps2, instr, true),
            O::BGTZL => self.bgtz(ps2, instr, true),
            O::BLTZ => self.bltz(ps2, instr, false, false),
            O::BGEZ => self.bgez(ps2, instr, false, false),
            O::BLTZL => self.bltz(ps2, instr, true, false),
            O::BGEZL => self.bgez(ps2, instr, true, false),
            O::BLTZAL => self.bltz(ps2, instr, false, true),
            O::BGEZAL => self.bgez(ps2, instr, false, true),
            O::BLTZALL => self.bltz(ps2, instr, true, true),
            O::BGEZALL => self.bgez(ps2, instr, true, true),

            // the EE never raises integer overflow
            O::ADDI | O::ADDIU => self.addiu(ps2, instr),
            O::DADDI | O::DADDIU => self.daddiu(ps2, instr),
            O::SLTI => self.slti(ps2, instr),
            O::SLTIU => self.sltiu(ps2, instr),
            O::ANDI => self.andi(ps2, instr),
            O::ORI => self.ori(ps2, instr),
            O::XORI => self.xori(ps2, instr),
            O::LUI => self.lui(ps2, instr),

            O::LB => self.lb(ps2, instr),
            O::LBU => self.lbu(ps2, instr),
            O::LH => self.lh(ps2, instr),
            O::LHU => self.lhu(ps2, instr),
            O::LW => self.lw(ps2, instr),
            O::LWU => self.lwu(ps2, instr),
            O::LWL => self.lwl(ps2, instr),
            O::LWR => self.lwr(ps2, instr),
            O::LD => self.ld(ps2, instr),
            O::LDL => self.ldl(ps2, instr),
            O::LDR => self.ldr(ps2, instr),
            O::LQ => self.lq(ps2, instr),
            O::SB => self.sb(ps2, instr),
            O::SH => self.sh(ps2, instr),
            O::SW => self.sw(ps2, instr),
            O::SWL => self.swl(ps2, instr),
            O::SWR => self.swr(ps2, instr),
            O::SD => self.sd(ps2, instr),
            O::SDL => self.sdl(ps2, instr),
            O::SDR => self.sdr(ps2, instr),
            O::SQ => self.sq(ps2, instr),
            O::LWC1 => self.lwc1(ps2, instr),
            O::SWC1 => self.swc1(ps2, instr),
            O::LQC2 => self.lqc2(ps2, instr),
            O::SQC2 => self.sqc2(ps2, instr),
            O::CACHE => self.cache(ps2, instr),
            O::PREF | O::SYNC => DEFAULT_DELAY,

            O::SLL => self.sll(ps2, instr),
            O::SRL => self.srl(ps2, instr),
            O::SRA => self.sra(ps2, instr),
            O::SLLV => self.sllv(ps2, instr),
            O::SRLV => self.srlv(ps2, instr),
            O::SRAV => self.srav(ps2, instr),
            O::DSLL => self.dsll(ps2, instr, 0),
            O::DSRL => self.dsrl(ps2, instr, 0),
            O::DSRA => self.dsra(ps2, instr, 0),
            O::DSLL32 => self.dsll(ps2, instr, 32),
            O::DSRL32 => self.dsrl(ps2, instr, 32),
            O::DSRA32 => self.dsra(ps2, instr, 32),
            O::DSLLV => self.dsllv(ps2, instr),
            O::DSRLV => self.dsrlv(ps2, instr),
            O::DSRAV => self.dsrav(ps2, instr),
            O::MOVZ => self.movz(ps2, instr),
            O::MOVN => self.movn(ps2, instr),
            O::ADD | O::ADDU => self.addu(ps2, instr),
            O::SUB | O::SUBU => self.subu(ps2, instr),
            O::DADD | O::DADDU => self.daddu(ps2, instr),
            O::DSUB | O::DSUBU => self.dsubu(ps2, instr),
            O::AND => self.and(ps2, instr),
            O::OR => self.or(ps2, instr),
            O::XOR => self.xor(ps2, instr),
            O::NOR => self.nor(ps2, instr),
            O::SLT => self.slt(ps2, instr),
            O::SLTU => self.sltu(ps2, instr),
            O::MFSA => self.mfsa(ps2, instr),
            O::MTSA => self.mtsa(ps2, instr),
            O::MTSAB => self.mtsab(ps2, instr),
            O::MTSAH => self.mtsah(ps2, instr),

            O::SYSCALL => self.syscall(ps2, instr),
            O::BREAK => self.breakpoint(ps2, instr),
            O::TGE | O::TGEU | O::TLT | O::TLTU | O::TEQ | O::TNE => {
                self.trap(ps2, instr, operation)
            }
            O::TGEI | O::TGEIU | O::TLTI | O::TLTIU | O::TEQI | O::TNEI => {
                self.trap_immediate(ps2, instr, operation)
            }

            O::MFHI => self.mfhi(ps2, instr),
            O::MTHI => self.mthi(ps2, instr),
            O::MFLO => self.mflo(ps2, instr),
            O::MTLO => self.mtlo(ps2, instr),
            O::MFHI1 => self.mfhi1(ps2, instr),
            O::MTHI1 => self.mthi1(ps2, instr),
            O::MFLO1 => self.mflo1(ps2, instr),
            O::MTLO1 => self.mtlo1(ps2, instr),
            O::MULT => self.mult(ps2, instr),
            O::MULTU => self.multu(ps2, instr),
            O::MULT1 => self.mult1(ps2, instr),
            O::MULTU1 => self.multu1(ps2, instr),
            O::MADD => self.madd(ps2, instr),
            O::MADDU => self.maddu(ps2, instr),
            O::MADD1 => self.madd1(ps2, instr),
            O::MADDU1 => self.maddu1(ps2, instr),
            O::DIV => self.div(ps2, instr),
            O::DIVU => self.divu(ps2, instr),
            O::DIV1 => self.div1(ps2, instr),
            O::DIVU1 => self.divu1(ps2, instr),

            O::PLZCW => self.plzcw(ps2, instr),
            O::PADDW => self.paddw(ps2, instr),
            O::PSUBW => self.psubw(ps2, instr),
            O::PADDH => self.paddh(ps2, instr),
            O::PSUBH => self.psubh(ps2, instr),
            O::PADDB => self.paddb(ps2, instr),
            O::PSUBB => self.psubb(ps2, instr),
            O::PEXTLW => self.pextlw(ps2, instr),
            O::PMFHI => self.pmfhi(ps2, instr),
            O::PMFLO => self.pmflo(ps2, instr),
            O::PMTHI => self.pmthi(ps2, instr),
            O::PMTLO => self.pmtlo(ps2, instr),
            O::PCPYLD => self.pcpyld(ps2, instr),
            O::PCPYUD => self.pcpyud(ps2, instr),
            O::PCPYH => self.pcpyh(ps2, instr),
            O::PAND => self.pand(ps2, instr),
            O::POR => self.por(ps2, instr),
            O::PXOR => self.pxor(ps2, instr),
            O::PNOR => self.pnor(ps2, instr),

            O::MFC0 => self.mfc0(ps2, instr),
            O::MTC0 => self.mtc0(ps2, instr),
            O::BC0F => self.bc0(ps2, instr, false, false),
            O::BC0T => self.bc0(ps2, instr, true, false),
            O::BC0FL => self.bc0(ps2, instr, false, true),
            O::BC0TL => self.bc0(ps2, instr, true, true),
            O::TLBR | O::TLBWI | O::TLBWR | O::TLBP => self.tlb(ps2, instr, operation),
            O::ERET => self.eret(ps2, instr),
            O::EI => self.ei(ps2, instr),
            O::DI => self.di(ps2, instr),

            O::MFC1 => self.mfc1(ps2, instr),
            O::MTC1 => self.mtc1(ps2, instr),
            O::CFC1 => self.cfc1(ps2, instr),
            O::CTC1 => self.ctc1(ps2, instr),
            O::BC1F => self.bc1(ps2, instr, false, false),
            O::BC1T => self.bc1(ps2, instr, true, false),
            O::BC1FL => self.bc1(ps2, instr, false, true),
            O::BC1TL => self.bc1(ps2, instr, true, true),
            O::ADDS => self.fpu_arith(ps2, instr, operation),
            O::SUBS | O::MULS | O::DIVS | O::SQRTS | O::ABSS | O::MOVS | O::NEGS | O::RSQRTS => {
                self.fpu_arith(ps2, instr, operation)
            }
            O::ADDAS | O::SUBAS | O::MULAS | O::MADDS | O::MSUBS | O::MADDAS | O::MSUBAS => {
                self.fpu_arith(ps2, instr, operation)
            }
            O::MAXS | O::MINS | O::CVTWS | O::CVTSW => self.fpu_arith(ps2, instr, operation),
            O::CFS => self.fpu_compare(ps2, instr, Condition::False),
            O::CEQS => self.fpu_compare(ps2, instr, Condition::Equal),
            O::CLTS => self.fpu_compare(ps2, instr, Condition::LessThan),
            O::CLES => self.fpu_compare(ps2, instr, Condition::LessOrEqual),

            O::QMFC2 => self.qmfc2(ps2, instr),
            O::QMTC2 => self.qmtc2(ps2, instr),
            O::CFC2 => self.cfc2(ps2, instr),
            O::CTC2 => self.ctc2(ps2, instr),
            O::BC2F => self.bc2(ps2, instr, false, false),
            O::BC2T => self.bc2(ps2, instr, true, false),
            O::BC2FL => self.bc2(ps2, instr, false, true),
            O::BC2TL => self.bc2(ps2, instr, true, true),
            O::VMACRO => self.vmacro(ps2, instr),

            O::ILLEGAL => {
                debug!(instr = %instr, bits = instr.to_bits(), "reserved instruction");
                self.raise(ps2, Exception::ReservedInstruction)
            }
        }
    }

    /// Executes the next instruction and returns how many cycles it took.
    ///
    /// # Errors
    /// Fails if the instruction can't be fetched because the PC is misaligned.
    pub fn exec_next(&mut self, ps2: &mut PS2) -> Result<u64, ExecError> {
        let pc = ps2.cpu.pc;
        let fetched = ps2
            .read_virtual::<u32, true>(pc)
            .map_err(|source| ExecError::Fetch { source })?;

        let mut cycles = 0;
        if ps2.cpu.icache.enabled && pc.segment().is_cached() && !ps2.cpu.icache.access(pc) {
            cycles += ICache::MISS_PENALTY;
        }

        let instr = Instruction::from_bits(fetched);
        let descriptor = Descriptor::decode(instr);

        let stall = self.hilo_stall(&descriptor);
        cycles += stall;

        self.current_addr = pc;
        self.current_in_delay = ps2.cpu.in_delay_slot;
        self.current_next = ps2.cpu.next_pc;

        ps2.cpu.pc = ps2.cpu.next_pc;
        ps2.cpu.next_pc = ps2.cpu.pc + 4u32;
        ps2.cpu.in_delay_slot = false;

        cycles += self.exec(ps2, instr, descriptor.operation);

        if descriptor.kind != InstructionKind::Plain {
            let pipe = usize::from(
                descriptor
                    .outputs()
                    .any(|operand| matches!(operand, Operand::Lo1 | Operand::Hi1)),
            );

            self.hilo_ready[pipe] = self.cycles + stall + u64::from(descriptor.latency);
        }

        Ok(cycles)
    }

    /// Runs the EE for the given number of cycles. Cycles an instruction runs past the budget
    /// are paid back out of the next one.
    ///
    /// # Errors
    /// Fails on an unrecoverable execution error, see [`ExecError`].
    pub fn run(&mut self, ps2: &mut PS2, cycles: u64) -> Result<(), ExecError> {
        let paid = self.debt.min(cycles);
        self.debt -= paid;

        let mut remaining = cycles - paid;
        while remaining > 0 {
            let taken = if self.check_interrupts(ps2) {
                DEFAULT_DELAY
            } else if ps2.cpu.halted {
                remaining
            } else {
                self.exec_next(ps2)?
            };

            ps2.cpu.cop0.advance_count(taken);
            self.cycles += taken;

            if taken > remaining {
                self.debt = taken - remaining;
                remaining = 0;
            } else {
                remaining -= taken;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::Config;
    use glimmer_core::{
        cpu::{Reg, cop0},
        interrupts::Interrupt,
        mem::PhysicalAddress,
    };
    use proptest::prelude::*;

    pub const PROGRAM: u32 = 0x0010_0000;

    /// A PS2 with the given program in RAM at [`PROGRAM`], about to execute it.
    pub fn machine(program: &[Instruction]) -> (Interpreter, PS2) {
        machine_with(Config::default(), program)
    }

    pub fn machine_with(config: Config, program: &[Instruction]) -> (Interpreter, PS2) {
        let mut ps2 = PS2::new(config).unwrap();
        for (i, instr) in program.iter().enumerate() {
            let addr = PhysicalAddress::new(PROGRAM + 4 * i as u32).unwrap();
            ps2.write32(addr, instr.to_bits());
        }

        ps2.cpu.jump_to(Address(PROGRAM));
        (Interpreter::default(), ps2)
    }

    /// Executes `count` instructions.
    pub fn exec(interpreter: &mut Interpreter, ps2: &mut PS2, count: usize) {
        for _ in 0..count {
            interpreter.exec_next(ps2).unwrap();
        }
    }

    #[test]
    fn branch_not_taken_runs_delay_slot_once() {
        let (mut interpreter, mut ps2) = machine(&[
            Instruction::beq(Reg::R1, Reg::R2, 16),
            Instruction::add(Reg::R3, Reg::R3, Reg::R4),
            Instruction::NOP,
        ]);

        ps2.cpu.regs.write(Reg::R1, 1);
        ps2.cpu.regs.write(Reg::R2, 2);
        ps2.cpu.regs.write(Reg::R4, 5);

        exec(&mut interpreter, &mut ps2, 2);
        assert_eq!(ps2.cpu.regs.read(Reg::R3), 5);
        assert_eq!(ps2.cpu.pc.value(), PROGRAM + 8);
        assert!(!ps2.cpu.in_delay_slot);
    }

    #[test]
    fn taken_branch_runs_delay_slot_first() {
        let (mut interpreter, mut ps2) = machine(&[
            Instruction::beq(Reg::R0, Reg::R0, 3),
            Instruction::addiu(Reg::R3, Reg::R0, 7),
        ]);

        exec(&mut interpreter, &mut ps2, 1);
        assert!(ps2.cpu.in_delay_slot);
        assert_eq!(ps2.cpu.pc.value(), PROGRAM + 4);

        exec(&mut interpreter, &mut ps2, 1);
        assert_eq!(ps2.cpu.regs.read(Reg::R3), 7);
        assert_eq!(ps2.cpu.pc.value(), PROGRAM + 4 + 12);
    }

    #[test]
    fn likely_branch_nullifies_delay_slot() {
        let (mut interpreter, mut ps2) = machine(&[
            Instruction::bnel(Reg::R0, Reg::R0, 8),
            Instruction::addiu(Reg::R3, Reg::R0, 7),
            Instruction::addiu(Reg::R4, Reg::R0, 9),
        ]);

        exec(&mut interpreter, &mut ps2, 2);
        assert_eq!(ps2.cpu.regs.read(Reg::R3), 0);
        assert_eq!(ps2.cpu.regs.read(Reg::R4), 9);
    }

    #[test]
    fn jal_links_past_the_delay_slot() {
        let (mut interpreter, mut ps2) =
            machine(&[Instruction::jal(0x0020_0000), Instruction::NOP]);

        exec(&mut interpreter, &mut ps2, 2);
        assert_eq!(ps2.cpu.regs.read(Reg::RA), u64::from(PROGRAM + 8));
        assert_eq!(ps2.cpu.pc.value(), 0x0020_0000);
    }

    #[test]
    fn syscall_and_eret() {
        let mut bios = vec![0; 0x400];
        bios[0x380..0x384].copy_from_slice(&Instruction::eret().to_bits().to_le_bytes());

        let config = Config {
            bios,
            ..Config::default()
        };
        let (mut interpreter, mut ps2) = machine_with(config, &[Instruction::syscall(0)]);
        // leave ERL, keep BEV
        ps2.cpu.cop0.write(cop0::reg::STATUS, 0x0040_0000);

        exec(&mut interpreter, &mut ps2, 1);
        assert_eq!(ps2.cpu.pc.value(), 0xBFC0_0380);
        assert_eq!(ps2.cpu.cop0.epc().value(), PROGRAM);
        assert_eq!(ps2.cpu.cop0.cause().exception(), Some(Exception::Syscall));
        assert!(ps2.cpu.cop0.status().exl());

        exec(&mut interpreter, &mut ps2, 1);
        assert_eq!(ps2.cpu.pc.value(), PROGRAM);
        assert!(!ps2.cpu.cop0.status().exl());
    }

    #[test]
    fn exception_in_delay_slot_points_at_branch() {
        let (mut interpreter, mut ps2) = machine(&[
            Instruction::beq(Reg::R0, Reg::R0, 8),
            Instruction::brk(0),
        ]);
        ps2.cpu.cop0.write(cop0::reg::STATUS, 0x0040_0000);

        exec(&mut interpreter, &mut ps2, 2);
        assert_eq!(ps2.cpu.cop0.epc().value(), PROGRAM);
        assert!(ps2.cpu.cop0.cause().bd());
        assert_eq!(ps2.cpu.pc.value(), 0xBFC0_0380);
    }

    #[test]
    fn reserved_instruction() {
        // opcode 0x3B is unassigned
        let (mut interpreter, mut ps2) = machine(&[Instruction::from_bits(0xEC00_0000)]);
        exec(&mut interpreter, &mut ps2, 1);
        assert_eq!(
            ps2.cpu.cop0.cause().exception(),
            Some(Exception::ReservedInstruction)
        );
    }

    #[test]
    fn misaligned_load_is_an_address_error() {
        let (mut interpreter, mut ps2) = machine(&[Instruction::lw(Reg::R2, Reg::R1, 2)]);
        ps2.cpu.regs.write(Reg::R1, 0x1000);

        exec(&mut interpreter, &mut ps2, 1);
        assert_eq!(
            ps2.cpu.cop0.cause().exception(),
            Some(Exception::AddressErrorLoad)
        );
        assert_eq!(ps2.cpu.cop0.read(cop0::reg::BAD_VADDR), 0x1002);
    }

    #[test]
    fn misaligned_fetch_is_fatal() {
        let (mut interpreter, mut ps2) = machine(&[]);
        ps2.cpu.jump_to(Address(PROGRAM + 2));

        assert!(matches!(
            interpreter.exec_next(&mut ps2),
            Err(ExecError::Fetch { .. })
        ));
    }

    #[test]
    fn reading_lo_waits_for_divide() {
        let (mut interpreter, mut ps2) = machine(&[
            Instruction::div(Reg::R1, Reg::R2),
            Instruction::mflo(Reg::R3),
        ]);
        ps2.cpu.regs.write(Reg::R1, 10);
        ps2.cpu.regs.write(Reg::R2, 3);

        interpreter.run(&mut ps2, 1).unwrap();
        let taken = interpreter.exec_next(&mut ps2).unwrap();

        // issued one cycle after the divide, which takes 37
        assert_eq!(taken, 36 + DEFAULT_DELAY);
        assert_eq!(ps2.cpu.regs.read(Reg::R3), 3);
    }

    #[test]
    fn budget_overrun_is_paid_back() {
        let (mut interpreter, mut ps2) = machine(&[
            Instruction::div(Reg::R1, Reg::R2),
            Instruction::mflo(Reg::R3),
            Instruction::NOP,
        ]);

        interpreter.run(&mut ps2, 2).unwrap();
        assert_eq!(interpreter.cycles(), 38);

        // the whole budget goes to the debt
        interpreter.run(&mut ps2, 30).unwrap();
        assert_eq!(ps2.cpu.pc.value(), PROGRAM + 8);

        interpreter.run(&mut ps2, 7).unwrap();
        assert_eq!(ps2.cpu.pc.value(), PROGRAM + 12);
    }

    #[test]
    fn interrupt_unhalts() {
        let (mut interpreter, mut ps2) = machine(&[Instruction::NOP]);
        // IE, EIE, IM2
        ps2.cpu.cop0.write(cop0::reg::STATUS, 0x0001_0401);
        ps2.interrupts.write_mask(1 << Interrupt::VblankStart as u32);
        ps2.cpu.halt();

        interpreter.run(&mut ps2, 100).unwrap();
        assert!(ps2.cpu.halted);
        assert_eq!(ps2.cpu.pc.value(), PROGRAM);

        ps2.interrupts.status.request(Interrupt::VblankStart);
        interpreter.run(&mut ps2, 1).unwrap();

        assert!(!ps2.cpu.halted);
        assert_eq!(ps2.cpu.pc.value(), 0x8000_0200);
        assert_eq!(ps2.cpu.cop0.epc().value(), PROGRAM);
        assert_eq!(ps2.cpu.cop0.cause().exception(), Some(Exception::Interrupt));
    }

    #[test]
    fn count_reaching_compare_interrupts() {
        let (mut interpreter, mut ps2) = machine(&[Instruction::NOP; 16]);
        // IE, EIE, IM7
        ps2.cpu.cop0.write(cop0::reg::STATUS, 0x0001_8001);
        ps2.cpu.cop0.write(cop0::reg::COMPARE, 5);

        interpreter.run(&mut ps2, 5).unwrap();
        assert_ne!(ps2.cpu.cop0.cause().ip() & Line::Timer.bit(), 0);

        interpreter.run(&mut ps2, 1).unwrap();
        assert_eq!(ps2.cpu.pc.value(), 0x8000_0200);
    }

    proptest! {
        #[test]
        fn delay_slot_always_executes(a: u64, b: u64, offset in -64i16..64) {
            let (mut interpreter, mut ps2) = machine(&[
                Instruction::beq(Reg::R1, Reg::R2, offset),
                Instruction::addiu(Reg::R3, Reg::R3, 1),
            ]);
            ps2.cpu.regs.write(Reg::R1, a);
            ps2.cpu.regs.write(Reg::R2, b);

            exec(&mut interpreter, &mut ps2, 2);
            prop_assert_eq!(ps2.cpu.regs.read(Reg::R3), 1);

            let expected = if a == b {
                (PROGRAM + 4).wrapping_add_signed(i32::from(offset) << 2)
            } else {
                PROGRAM + 8
            };
            prop_assert_eq!(ps2.cpu.pc.value(), expected);
        }
    }
}
