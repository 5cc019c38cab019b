//! Decoded instruction descriptors: what an instruction is, how long it takes and which
//! registers it touches.
//!
//! The interpreter only needs the operation tag to execute an instruction. The rest is metadata
//! for whoever needs to reason about hazards: the interpreter's HI/LO interlock, tracing, and
//! code generators.

use super::{Reg, cop0, instr::Instruction, instr::Operation};
use arrayvec::ArrayVec;

/// The most dependencies a single instruction can have.
pub const MAX_DEPENDENCIES: usize = 8;

/// The execution pipeline an instruction goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pipeline {
    /// Integer ALU operations, including the parallel (MMI) ones.
    Integer,
    Branch,
    Mult,
    Div,
    LoadStore,
    /// System control: COP0 moves, exceptions, `SYNC`, TLB and cache maintenance.
    Cop0,
    /// FPU arithmetic and moves.
    Fpu,
    /// The long FPU operations: division and square roots.
    FpuDiv,
    /// COP2 moves and VU0 macro operations.
    Cop2,
}

impl Pipeline {
    /// Cycles until the result is available.
    pub const fn latency(self) -> u8 {
        match self {
            Self::Mult => 4,
            Self::Div => 37,
            Self::Fpu => 4,
            Self::FpuDiv => 8,
            _ => 1,
        }
    }

    /// Cycles until the pipeline accepts another instruction.
    pub const fn throughput(self) -> u8 {
        match self {
            Self::Mult => 2,
            Self::Div => 37,
            Self::FpuDiv => 7,
            _ => 1,
        }
    }
}

/// What kind of instruction this is for HI/LO hazard purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionKind {
    Plain,
    Mult,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// A register an instruction can depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    Gpr(Reg),
    /// Low 64 bits of LO.
    Lo,
    /// Low 64 bits of HI.
    Hi,
    /// High 64 bits of LO, used by pipeline 1.
    Lo1,
    /// High 64 bits of HI, used by pipeline 1.
    Hi1,
    /// The shift amount register.
    Sa,
    Cop0(u8),
    Fpr(u8),
    FpuAcc,
    FpuControl,
    /// A VU0 floating point register.
    Vf(u8),
    /// A VU0 integer register.
    Vi(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency {
    pub access: Access,
    pub operand: Operand,
}

/// A decoded instruction. Never changes once built for a given instruction word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub instr: Instruction,
    pub operation: Operation,
    pub pipeline: Pipeline,
    pub latency: u8,
    pub throughput: u8,
    pub kind: InstructionKind,
    /// Reads first, then writes, each in operand order. Register zero is never listed.
    pub dependencies: ArrayVec<Dependency, MAX_DEPENDENCIES>,
}

impl Descriptor {
    fn new(instr: Instruction, operation: Operation, pipeline: Pipeline) -> Self {
        Self {
            instr,
            operation,
            pipeline,
            latency: pipeline.latency(),
            throughput: pipeline.throughput(),
            kind: InstructionKind::Plain,
            dependencies: ArrayVec::new(),
        }
    }

    fn kind(mut self, kind: InstructionKind) -> Self {
        self.kind = kind;
        self
    }

    fn timing(mut self, latency: u8, throughput: u8) -> Self {
        self.latency = latency;
        self.throughput = throughput;
        self
    }

    fn with(mut self, access: Access, operands: &[Operand]) -> Self {
        for &operand in operands {
            if operand == Operand::Gpr(Reg::R0) {
                continue;
            }

            self.dependencies.push(Dependency { access, operand });
        }

        self
    }

    fn reads(self, operands: &[Operand]) -> Self {
        self.with(Access::Read, operands)
    }

    fn writes(self, operands: &[Operand]) -> Self {
        self.with(Access::Write, operands)
    }

    /// Operands read by this instruction.
    pub fn inputs(&self) -> impl Iterator<Item = Operand> + '_ {
        self.dependencies
            .iter()
            .filter(|d| d.access == Access::Read)
            .map(|d| d.operand)
    }

    /// Operands written by this instruction.
    pub fn outputs(&self) -> impl Iterator<Item = Operand> + '_ {
        self.dependencies
            .iter()
            .filter(|d| d.access == Access::Write)
            .map(|d| d.operand)
    }

    /// Decodes an instruction word.
    pub fn decode(instr: Instruction) -> Self {
        use Operand::{Cop0, Fpr, FpuAcc, FpuControl, Gpr, Hi, Hi1, Lo, Lo1, Sa, Vf, Vi};
        use Operation as O;
        use Pipeline as P;

        let operation = instr.operation();
        let new = |pipeline| Self::new(instr, operation, pipeline);

        let (rs, rt, rd) = (Gpr(instr.rs()), Gpr(instr.rt()), Gpr(instr.rd()));
        let (fs, ft, fd) = (Fpr(instr.fs()), Fpr(instr.ft()), Fpr(instr.fd()));

        match operation {
            O::J => new(P::Branch),
            O::JAL => new(P::Branch).writes(&[Gpr(Reg::RA)]),
            O::JR => new(P::Branch).reads(&[rs]),
            O::JALR => new(P::Branch).reads(&[rs]).writes(&[rd]),
            O::BEQ | O::BNE | O::BEQL | O::BNEL => new(P::Branch).reads(&[rs, rt]),
            O::BLEZ | O::BGTZ | O::BLEZL | O::BGTZL | O::BLTZ | O::BGEZ | O::BLTZL | O::BGEZL => {
                new(P::Branch).reads(&[rs])
            }
            O::BLTZAL | O::BGEZAL | O::BLTZALL | O::BGEZALL => {
                new(P::Branch).reads(&[rs]).writes(&[Gpr(Reg::RA)])
            }
            O::BC0F | O::BC0T | O::BC0FL | O::BC0TL | O::BC2F | O::BC2T | O::BC2FL | O::BC2TL => {
                new(P::Branch)
            }
            O::BC1F | O::BC1T | O::BC1FL | O::BC1TL => new(P::Branch).reads(&[FpuControl]),

            O::ADDI | O::ADDIU | O::SLTI | O::SLTIU | O::ANDI | O::ORI | O::XORI | O::DADDI
            | O::DADDIU => new(P::Integer).reads(&[rs]).writes(&[rt]),
            O::LUI => new(P::Integer).writes(&[rt]),

            O::LB | O::LH | O::LW | O::LBU | O::LHU | O::LWU | O::LD | O::LQ => {
                new(P::LoadStore).reads(&[rs]).writes(&[rt])
            }
            // unaligned loads merge into the old value
            O::LWL | O::LWR | O::LDL | O::LDR => new(P::LoadStore).reads(&[rs, rt]).writes(&[rt]),
            O::SB | O::SH | O::SW | O::SWL | O::SWR | O::SD | O::SDL | O::SDR | O::SQ => {
                new(P::LoadStore).reads(&[rs, rt])
            }
            O::LWC1 => new(P::LoadStore).reads(&[rs]).writes(&[ft]),
            O::SWC1 => new(P::LoadStore).reads(&[rs, ft]),
            O::LQC2 => new(P::LoadStore).reads(&[rs]).writes(&[Vf(instr.ft())]),
            O::SQC2 => new(P::LoadStore).reads(&[rs, Vf(instr.ft())]),
            O::CACHE | O::PREF => new(P::LoadStore).reads(&[rs]),

            O::SLL | O::SRL | O::SRA | O::DSLL | O::DSRL | O::DSRA | O::DSLL32 | O::DSRL32
            | O::DSRA32 => new(P::Integer).reads(&[rt]).writes(&[rd]),
            O::SLLV | O::SRLV | O::SRAV | O::DSLLV | O::DSRLV | O::DSRAV | O::MOVZ | O::MOVN
            | O::ADD | O::ADDU | O::SUB | O::SUBU | O::AND | O::OR | O::XOR | O::NOR | O::SLT
            | O::SLTU | O::DADD | O::DADDU | O::DSUB | O::DSUBU => {
                new(P::Integer).reads(&[rs, rt]).writes(&[rd])
            }
            O::PADDW | O::PSUBW | O::PADDH | O::PSUBH | O::PADDB | O::PSUBB | O::PEXTLW
            | O::PCPYLD | O::PAND | O::PXOR | O::PCPYUD | O::POR | O::PNOR => {
                new(P::Integer).reads(&[rs, rt]).writes(&[rd])
            }
            O::PLZCW => new(P::Integer).reads(&[rs]).writes(&[rd]),
            O::PCPYH => new(P::Integer).reads(&[rt]).writes(&[rd]),

            O::MFHI => new(P::Integer).reads(&[Hi]).writes(&[rd]),
            O::MFLO => new(P::Integer).reads(&[Lo]).writes(&[rd]),
            O::MFHI1 => new(P::Integer).reads(&[Hi1]).writes(&[rd]),
            O::MFLO1 => new(P::Integer).reads(&[Lo1]).writes(&[rd]),
            O::PMFHI => new(P::Integer).reads(&[Hi, Hi1]).writes(&[rd]),
            O::PMFLO => new(P::Integer).reads(&[Lo, Lo1]).writes(&[rd]),
            O::MTHI => new(P::Integer).reads(&[rs]).writes(&[Hi]),
            O::MTLO => new(P::Integer).reads(&[rs]).writes(&[Lo]),
            O::MTHI1 => new(P::Integer).reads(&[rs]).writes(&[Hi1]),
            O::MTLO1 => new(P::Integer).reads(&[rs]).writes(&[Lo1]),
            O::PMTHI => new(P::Integer).reads(&[rs]).writes(&[Hi, Hi1]),
            O::PMTLO => new(P::Integer).reads(&[rs]).writes(&[Lo, Lo1]),
            O::MFSA => new(P::Integer).reads(&[Sa]).writes(&[rd]),
            O::MTSA => new(P::Integer).reads(&[rs]).writes(&[Sa]),
            O::MTSAB | O::MTSAH => new(P::Integer).reads(&[rs]).writes(&[Sa]),

            O::MULT | O::MULTU => new(P::Mult)
                .kind(InstructionKind::Mult)
                .reads(&[rs, rt])
                .writes(&[Lo, Hi, rd]),
            O::MULT1 | O::MULTU1 => new(P::Mult)
                .kind(InstructionKind::Mult)
                .reads(&[rs, rt])
                .writes(&[Lo1, Hi1, rd]),
            O::MADD | O::MADDU => new(P::Mult)
                .kind(InstructionKind::Mult)
                .reads(&[rs, rt, Lo, Hi])
                .writes(&[Lo, Hi, rd]),
            O::MADD1 | O::MADDU1 => new(P::Mult)
                .kind(InstructionKind::Mult)
                .reads(&[rs, rt, Lo1, Hi1])
                .writes(&[Lo1, Hi1, rd]),
            O::DIV | O::DIVU => new(P::Div)
                .kind(InstructionKind::Div)
                .reads(&[rs, rt])
                .writes(&[Lo, Hi]),
            O::DIV1 | O::DIVU1 => new(P::Div)
                .kind(InstructionKind::Div)
                .reads(&[rs, rt])
                .writes(&[Lo1, Hi1]),

            O::TGE | O::TGEU | O::TLT | O::TLTU | O::TEQ | O::TNE => {
                new(P::Integer).reads(&[rs, rt])
            }
            O::TGEI | O::TGEIU | O::TLTI | O::TLTIU | O::TEQI | O::TNEI => {
                new(P::Integer).reads(&[rs])
            }
            O::SYSCALL | O::BREAK | O::SYNC => new(P::Cop0),

            O::MFC0 => new(P::Cop0)
                .reads(&[Cop0(instr.rd_bits())])
                .writes(&[rt]),
            O::MTC0 => new(P::Cop0)
                .reads(&[rt])
                .writes(&[Cop0(instr.rd_bits())]),
            O::ERET => new(P::Cop0)
                .reads(&[
                    Cop0(cop0::reg::STATUS),
                    Cop0(cop0::reg::EPC),
                    Cop0(cop0::reg::ERROR_EPC),
                ])
                .writes(&[Cop0(cop0::reg::STATUS)]),
            O::EI | O::DI => new(P::Cop0)
                .reads(&[Cop0(cop0::reg::STATUS)])
                .writes(&[Cop0(cop0::reg::STATUS)]),
            O::TLBR | O::TLBWI | O::TLBWR | O::TLBP => new(P::Cop0),

            O::MFC1 => new(P::Fpu).timing(1, 1).reads(&[fs]).writes(&[rt]),
            O::MTC1 => new(P::Fpu).timing(1, 1).reads(&[rt]).writes(&[fs]),
            O::CFC1 => new(P::Fpu).timing(1, 1).reads(&[FpuControl]).writes(&[rt]),
            O::CTC1 => new(P::Fpu).timing(1, 1).reads(&[rt]).writes(&[FpuControl]),
            O::ADDS | O::SUBS | O::MULS | O::MAXS | O::MINS => {
                new(P::Fpu).reads(&[fs, ft]).writes(&[fd, FpuControl])
            }
            O::MADDS | O::MSUBS => new(P::Fpu)
                .reads(&[FpuAcc, fs, ft])
                .writes(&[fd, FpuControl]),
            O::ADDAS | O::SUBAS | O::MULAS => {
                new(P::Fpu).reads(&[fs, ft]).writes(&[FpuAcc, FpuControl])
            }
            O::MADDAS | O::MSUBAS => new(P::Fpu)
                .reads(&[FpuAcc, fs, ft])
                .writes(&[FpuAcc, FpuControl]),
            O::ABSS | O::NEGS => new(P::Fpu).reads(&[fs]).writes(&[fd, FpuControl]),
            O::MOVS | O::CVTWS | O::CVTSW => new(P::Fpu).reads(&[fs]).writes(&[fd]),
            O::CFS | O::CEQS | O::CLTS | O::CLES => {
                new(P::Fpu).reads(&[fs, ft]).writes(&[FpuControl])
            }
            O::DIVS => new(P::FpuDiv)
                .reads(&[fs, ft])
                .writes(&[fd, FpuControl]),
            O::SQRTS => new(P::FpuDiv).reads(&[ft]).writes(&[fd, FpuControl]),
            O::RSQRTS => new(P::FpuDiv)
                .timing(14, 13)
                .reads(&[fs, ft])
                .writes(&[fd, FpuControl]),

            O::QMFC2 => new(P::Cop2)
                .reads(&[Vf(instr.rd_bits())])
                .writes(&[rt]),
            O::QMTC2 => new(P::Cop2)
                .reads(&[rt])
                .writes(&[Vf(instr.rd_bits())]),
            O::CFC2 => new(P::Cop2)
                .reads(&[Vi(instr.rd_bits())])
                .writes(&[rt]),
            O::CTC2 => new(P::Cop2)
                .reads(&[rt])
                .writes(&[Vi(instr.rd_bits())]),
            O::VMACRO => new(P::Cop2),

            O::ILLEGAL => new(P::Cop0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn deps(descriptor: &Descriptor) -> Vec<(Access, Operand)> {
        descriptor
            .dependencies
            .iter()
            .map(|d| (d.access, d.operand))
            .collect()
    }

    #[test]
    fn mult_descriptor() {
        let descriptor = Descriptor::decode(Instruction::mult(Reg::V0, Reg::A0, Reg::A1));

        assert_eq!(descriptor.operation, Operation::MULT);
        assert_eq!(descriptor.pipeline, Pipeline::Mult);
        assert_eq!(descriptor.kind, InstructionKind::Mult);
        assert_eq!((descriptor.latency, descriptor.throughput), (4, 2));
        assert_eq!(
            deps(&descriptor),
            vec![
                (Access::Read, Operand::Gpr(Reg::A0)),
                (Access::Read, Operand::Gpr(Reg::A1)),
                (Access::Write, Operand::Lo),
                (Access::Write, Operand::Hi),
                (Access::Write, Operand::Gpr(Reg::V0)),
            ]
        );
    }

    #[test]
    fn div_descriptor() {
        let descriptor = Descriptor::decode(Instruction::div(Reg::A0, Reg::A1));
        assert_eq!(descriptor.kind, InstructionKind::Div);
        assert_eq!((descriptor.latency, descriptor.throughput), (37, 37));
        assert_eq!(
            descriptor.outputs().collect::<Vec<_>>(),
            vec![Operand::Lo, Operand::Hi]
        );
    }

    #[test]
    fn pipeline_one_uses_upper_halves() {
        let descriptor = Descriptor::decode(Instruction::mflo1(Reg::V0));
        assert_eq!(descriptor.inputs().collect::<Vec<_>>(), vec![Operand::Lo1]);

        let descriptor = Descriptor::decode(Instruction::mult1(Reg::R0, Reg::A0, Reg::A1));
        assert_eq!(
            descriptor.outputs().collect::<Vec<_>>(),
            vec![Operand::Lo1, Operand::Hi1]
        );
    }

    #[test]
    fn register_zero_is_never_a_dependency() {
        // nop is sll zero, zero, 0
        let descriptor = Descriptor::decode(Instruction::NOP);
        assert!(descriptor.dependencies.is_empty());

        let descriptor = Descriptor::decode(Instruction::addiu(Reg::R0, Reg::T0, 1));
        assert_eq!(deps(&descriptor), vec![(Access::Read, Operand::Gpr(Reg::T0))]);
    }

    #[test]
    fn fpu_descriptor() {
        let descriptor = Descriptor::decode(Instruction::add_s(3, 1, 2));
        assert_eq!(descriptor.pipeline, Pipeline::Fpu);
        assert_eq!(
            deps(&descriptor),
            vec![
                (Access::Read, Operand::Fpr(1)),
                (Access::Read, Operand::Fpr(2)),
                (Access::Write, Operand::Fpr(3)),
                (Access::Write, Operand::FpuControl),
            ]
        );
    }

    #[test]
    fn linking_branch_writes_ra() {
        let descriptor = Descriptor::decode(Instruction::jal(0x1000));
        assert_eq!(descriptor.pipeline, Pipeline::Branch);
        assert_eq!(
            descriptor.outputs().collect::<Vec<_>>(),
            vec![Operand::Gpr(Reg::RA)]
        );
    }

    proptest! {
        #[test]
        fn decoding_is_total_and_stable(word: u32) {
            let instr = Instruction(word);
            let a = Descriptor::decode(instr);
            let b = Descriptor::decode(instr);

            prop_assert_eq!(&a, &b);
            prop_assert_eq!(a.operation, instr.operation());
            prop_assert!(a.latency >= 1 && a.throughput >= 1);
            prop_assert!(a.dependencies.iter().all(|d| d.operand != Operand::Gpr(Reg::R0)));
        }
    }
}
