//! Instruction words of the EE: field accessors, decoding into an [`Operation`] and disassembly.

use super::Reg;
use strum::{FromRepr, IntoStaticStr};

/// The primary opcode of an [`Instruction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, IntoStaticStr)]
#[repr(u8)]
pub enum Opcode {
    SPECIAL = 0x00,
    REGIMM = 0x01,
    J = 0x02,
    JAL = 0x03,
    BEQ = 0x04,
    BNE = 0x05,
    BLEZ = 0x06,
    BGTZ = 0x07,
    ADDI = 0x08,
    ADDIU = 0x09,
    SLTI = 0x0A,
    SLTIU = 0x0B,
    ANDI = 0x0C,
    ORI = 0x0D,
    XORI = 0x0E,
    LUI = 0x0F,
    COP0 = 0x10,
    COP1 = 0x11,
    COP2 = 0x12,
    BEQL = 0x14,
    BNEL = 0x15,
    BLEZL = 0x16,
    BGTZL = 0x17,
    DADDI = 0x18,
    DADDIU = 0x19,
    LDL = 0x1A,
    LDR = 0x1B,
    MMI = 0x1C,
    LQ = 0x1E,
    SQ = 0x1F,
    LB = 0x20,
    LH = 0x21,
    LWL = 0x22,
    LW = 0x23,
    LBU = 0x24,
    LHU = 0x25,
    LWR = 0x26,
    LWU = 0x27,
    SB = 0x28,
    SH = 0x29,
    SWL = 0x2A,
    SW = 0x2B,
    SDL = 0x2C,
    SDR = 0x2D,
    SWR = 0x2E,
    CACHE = 0x2F,
    LWC1 = 0x31,
    PREF = 0x33,
    LQC2 = 0x36,
    LD = 0x37,
    SWC1 = 0x39,
    SQC2 = 0x3E,
    SD = 0x3F,
}

/// The function of an [`Instruction`] whose primary opcode is [`Opcode::SPECIAL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, IntoStaticStr)]
#[repr(u8)]
pub enum SpecialOpcode {
    SLL = 0x00,
    SRL = 0x02,
    SRA = 0x03,
    SLLV = 0x04,
    SRLV = 0x06,
    SRAV = 0x07,
    JR = 0x08,
    JALR = 0x09,
    MOVZ = 0x0A,
    MOVN = 0x0B,
    SYSCALL = 0x0C,
    BREAK = 0x0D,
    SYNC = 0x0F,
    MFHI = 0x10,
    MTHI = 0x11,
    MFLO = 0x12,
    MTLO = 0x13,
    DSLLV = 0x14,
    DSRLV = 0x16,
    DSRAV = 0x17,
    MULT = 0x18,
    MULTU = 0x19,
    DIV = 0x1A,
    DIVU = 0x1B,
    ADD = 0x20,
    ADDU = 0x21,
    SUB = 0x22,
    SUBU = 0x23,
    AND = 0x24,
    OR = 0x25,
    XOR = 0x26,
    NOR = 0x27,
    MFSA = 0x28,
    MTSA = 0x29,
    SLT = 0x2A,
    SLTU = 0x2B,
    DADD = 0x2C,
    DADDU = 0x2D,
    DSUB = 0x2E,
    DSUBU = 0x2F,
    TGE = 0x30,
    TGEU = 0x31,
    TLT = 0x32,
    TLTU = 0x33,
    TEQ = 0x34,
    TNE = 0x36,
    DSLL = 0x38,
    DSRL = 0x3A,
    DSRA = 0x3B,
    DSLL32 = 0x3C,
    DSRL32 = 0x3E,
    DSRA32 = 0x3F,
}

/// The `rt` field of an [`Instruction`] whose primary opcode is [`Opcode::REGIMM`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, IntoStaticStr)]
#[repr(u8)]
pub enum RegImmOpcode {
    BLTZ = 0x00,
    BGEZ = 0x01,
    BLTZL = 0x02,
    BGEZL = 0x03,
    TGEI = 0x08,
    TGEIU = 0x09,
    TLTI = 0x0A,
    TLTIU = 0x0B,
    TEQI = 0x0C,
    TNEI = 0x0E,
    BLTZAL = 0x10,
    BGEZAL = 0x11,
    BLTZALL = 0x12,
    BGEZALL = 0x13,
    MTSAB = 0x18,
    MTSAH = 0x19,
}

/// A fully decoded operation. Decoding an [`Instruction`] yields exactly one of these, and
/// executing it is a single match on this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
pub enum Operation {
    // primary
    J,
    JAL,
    BEQ,
    BNE,
    BLEZ,
    BGTZ,
    ADDI,
    ADDIU,
    SLTI,
    SLTIU,
    ANDI,
    ORI,
    XORI,
    LUI,
    BEQL,
    BNEL,
    BLEZL,
    BGTZL,
    DADDI,
    DADDIU,
    LDL,
    LDR,
    LQ,
    SQ,
    LB,
    LH,
    LWL,
    LW,
    LBU,
    LHU,
    LWR,
    LWU,
    SB,
    SH,
    SWL,
    SW,
    SDL,
    SDR,
    SWR,
    CACHE,
    LWC1,
    PREF,
    LQC2,
    LD,
    SWC1,
    SQC2,
    SD,

    // special
    SLL,
    SRL,
    SRA,
    SLLV,
    SRLV,
    SRAV,
    JR,
    JALR,
    MOVZ,
    MOVN,
    SYSCALL,
    BREAK,
    SYNC,
    MFHI,
    MTHI,
    MFLO,
    MTLO,
    DSLLV,
    DSRLV,
    DSRAV,
    MULT,
    MULTU,
    DIV,
    DIVU,
    ADD,
    ADDU,
    SUB,
    SUBU,
    AND,
    OR,
    XOR,
    NOR,
    MFSA,
    MTSA,
    SLT,
    SLTU,
    DADD,
    DADDU,
    DSUB,
    DSUBU,
    TGE,
    TGEU,
    TLT,
    TLTU,
    TEQ,
    TNE,
    DSLL,
    DSRL,
    DSRA,
    DSLL32,
    DSRL32,
    DSRA32,

    // regimm
    BLTZ,
    BGEZ,
    BLTZL,
    BGEZL,
    TGEI,
    TGEIU,
    TLTI,
    TLTIU,
    TEQI,
    TNEI,
    BLTZAL,
    BGEZAL,
    BLTZALL,
    BGEZALL,
    MTSAB,
    MTSAH,

    // mmi
    MADD,
    MADDU,
    MADD1,
    MADDU1,
    PLZCW,
    MFHI1,
    MTHI1,
    MFLO1,
    MTLO1,
    MULT1,
    MULTU1,
    DIV1,
    DIVU1,
    PADDW,
    PSUBW,
    PADDH,
    PSUBH,
    PADDB,
    PSUBB,
    PEXTLW,
    PMFHI,
    PMFLO,
    PCPYLD,
    PAND,
    PXOR,
    PMTHI,
    PMTLO,
    PCPYUD,
    POR,
    PNOR,
    PCPYH,

    // cop0
    MFC0,
    MTC0,
    BC0F,
    BC0T,
    BC0FL,
    BC0TL,
    TLBR,
    TLBWI,
    TLBWR,
    TLBP,
    ERET,
    EI,
    DI,

    // cop1
    MFC1,
    MTC1,
    CFC1,
    CTC1,
    BC1F,
    BC1T,
    BC1FL,
    BC1TL,
    #[strum(serialize = "ADD.S")]
    ADDS,
    #[strum(serialize = "SUB.S")]
    SUBS,
    #[strum(serialize = "MUL.S")]
    MULS,
    #[strum(serialize = "DIV.S")]
    DIVS,
    #[strum(serialize = "SQRT.S")]
    SQRTS,
    #[strum(serialize = "ABS.S")]
    ABSS,
    #[strum(serialize = "MOV.S")]
    MOVS,
    #[strum(serialize = "NEG.S")]
    NEGS,
    #[strum(serialize = "RSQRT.S")]
    RSQRTS,
    #[strum(serialize = "ADDA.S")]
    ADDAS,
    #[strum(serialize = "SUBA.S")]
    SUBAS,
    #[strum(serialize = "MULA.S")]
    MULAS,
    #[strum(serialize = "MADD.S")]
    MADDS,
    #[strum(serialize = "MSUB.S")]
    MSUBS,
    #[strum(serialize = "MADDA.S")]
    MADDAS,
    #[strum(serialize = "MSUBA.S")]
    MSUBAS,
    #[strum(serialize = "MAX.S")]
    MAXS,
    #[strum(serialize = "MIN.S")]
    MINS,
    #[strum(serialize = "CVT.W.S")]
    CVTWS,
    #[strum(serialize = "C.F.S")]
    CFS,
    #[strum(serialize = "C.EQ.S")]
    CEQS,
    #[strum(serialize = "C.LT.S")]
    CLTS,
    #[strum(serialize = "C.LE.S")]
    CLES,
    #[strum(serialize = "CVT.S.W")]
    CVTSW,

    // cop2
    QMFC2,
    QMTC2,
    CFC2,
    CTC2,
    BC2F,
    BC2T,
    BC2FL,
    BC2TL,
    /// A VU0 macro mode operation, forwarded to VU0 as is.
    #[strum(serialize = "VU0MACRO")]
    VMACRO,

    /// Anything that isn't a valid encoding.
    ILLEGAL,
}

impl Operation {
    /// Whether this is a branch or jump, i.e. whether it has a delay slot.
    pub fn is_branch(self) -> bool {
        use Operation as O;
        matches!(
            self,
            O::J | O::JAL
                | O::JR
                | O::JALR
                | O::BEQ
                | O::BNE
                | O::BLEZ
                | O::BGTZ
                | O::BEQL
                | O::BNEL
                | O::BLEZL
                | O::BGTZL
                | O::BLTZ
                | O::BGEZ
                | O::BLTZL
                | O::BGEZL
                | O::BLTZAL
                | O::BGEZAL
                | O::BLTZALL
                | O::BGEZALL
                | O::BC0F
                | O::BC0T
                | O::BC0FL
                | O::BC0TL
                | O::BC1F
                | O::BC1T
                | O::BC1FL
                | O::BC1TL
                | O::BC2F
                | O::BC2T
                | O::BC2FL
                | O::BC2TL
        )
    }

    /// Whether this is a "likely" branch, whose delay slot is skipped when not taken.
    pub fn is_likely(self) -> bool {
        use Operation as O;
        matches!(
            self,
            O::BEQL
                | O::BNEL
                | O::BLEZL
                | O::BGTZL
                | O::BLTZL
                | O::BGEZL
                | O::BLTZALL
                | O::BGEZALL
                | O::BC0FL
                | O::BC0TL
                | O::BC1FL
                | O::BC1TL
                | O::BC2FL
                | O::BC2TL
        )
    }

    pub fn mnemonic(self) -> &'static str {
        self.into()
    }
}

/// An instruction word of the EE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Instruction(pub u32);

impl Instruction {
    pub const NOP: Self = Instruction(0x0000_0000);

    #[inline(always)]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    #[inline(always)]
    pub const fn to_bits(self) -> u32 {
        self.0
    }

    #[inline(always)]
    const fn field(self, shift: u32, len: u32) -> u32 {
        (self.0 >> shift) & ((1 << len) - 1)
    }

    #[inline(always)]
    const fn with_field(self, shift: u32, len: u32, value: u32) -> Self {
        let mask = ((1 << len) - 1) << shift;
        Self((self.0 & !mask) | ((value << shift) & mask))
    }

    /// The raw primary opcode.
    #[inline(always)]
    pub const fn opcode_bits(self) -> u8 {
        self.field(26, 6) as u8
    }

    /// The primary opcode of this instruction.
    #[inline(always)]
    pub fn op(self) -> Option<Opcode> {
        Opcode::from_repr(self.opcode_bits())
    }

    /// The function field, bits 0 to 5.
    #[inline(always)]
    pub const fn funct(self) -> u8 {
        self.field(0, 6) as u8
    }

    /// The source register.
    #[inline(always)]
    pub const fn rs(self) -> Reg {
        Reg::from_index(self.field(21, 5))
    }

    /// The target register.
    #[inline(always)]
    pub const fn rt(self) -> Reg {
        Reg::from_index(self.field(16, 5))
    }

    /// The destination register.
    #[inline(always)]
    pub const fn rd(self) -> Reg {
        Reg::from_index(self.field(11, 5))
    }

    /// The shift amount, bits 6 to 10. Also selects the operation of the MMI groups.
    #[inline(always)]
    pub const fn sa(self) -> u8 {
        self.field(6, 5) as u8
    }

    /// The raw `rs` field, used as a sub-opcode by the coprocessor instructions.
    #[inline(always)]
    pub const fn rs_bits(self) -> u8 {
        self.field(21, 5) as u8
    }

    /// The raw `rt` field, used as a sub-opcode by REGIMM and the coprocessor branches.
    #[inline(always)]
    pub const fn rt_bits(self) -> u8 {
        self.field(16, 5) as u8
    }

    /// The raw `rd` field, a coprocessor register index for the coprocessor moves.
    #[inline(always)]
    pub const fn rd_bits(self) -> u8 {
        self.field(11, 5) as u8
    }

    /// FPU source register `fs` (the `rd` field).
    #[inline(always)]
    pub const fn fs(self) -> u8 {
        self.rd_bits()
    }

    /// FPU target register `ft` (the `rt` field).
    #[inline(always)]
    pub const fn ft(self) -> u8 {
        self.rt_bits()
    }

    /// FPU destination register `fd` (the `sa` field).
    #[inline(always)]
    pub const fn fd(self) -> u8 {
        self.sa()
    }

    #[inline(always)]
    pub const fn imm16(self) -> u16 {
        self.field(0, 16) as u16
    }

    #[inline(always)]
    pub const fn signed_imm16(self) -> i16 {
        self.imm16() as i16
    }

    /// The 20 bit code of `SYSCALL` and `BREAK`.
    #[inline(always)]
    pub const fn code(self) -> u32 {
        self.field(6, 20)
    }

    /// The 26 bit jump target.
    #[inline(always)]
    pub const fn imm26(self) -> u32 {
        self.field(0, 26)
    }

    /// The interlock bit of the COP2 moves.
    #[inline(always)]
    pub const fn interlock(self) -> bool {
        self.0 & 1 != 0
    }

    #[inline(always)]
    pub const fn with_opcode(self, value: Opcode) -> Self {
        self.with_field(26, 6, value as u32)
    }

    #[inline(always)]
    pub const fn with_special(self, value: SpecialOpcode) -> Self {
        self.with_opcode(Opcode::SPECIAL).with_funct(value as u8)
    }

    #[inline(always)]
    pub const fn with_funct(self, value: u8) -> Self {
        self.with_field(0, 6, value as u32)
    }

    #[inline(always)]
    pub const fn with_rs(self, value: Reg) -> Self {
        self.with_field(21, 5, value as u32)
    }

    #[inline(always)]
    pub const fn with_rt(self, value: Reg) -> Self {
        self.with_field(16, 5, value as u32)
    }

    #[inline(always)]
    pub const fn with_rd(self, value: Reg) -> Self {
        self.with_field(11, 5, value as u32)
    }

    #[inline(always)]
    pub const fn with_rs_bits(self, value: u8) -> Self {
        self.with_field(21, 5, value as u32)
    }

    #[inline(always)]
    pub const fn with_rt_bits(self, value: u8) -> Self {
        self.with_field(16, 5, value as u32)
    }

    #[inline(always)]
    pub const fn with_rd_bits(self, value: u8) -> Self {
        self.with_field(11, 5, value as u32)
    }

    #[inline(always)]
    pub const fn with_sa(self, value: u8) -> Self {
        self.with_field(6, 5, value as u32)
    }

    #[inline(always)]
    pub const fn with_imm16(self, value: u16) -> Self {
        self.with_field(0, 16, value as u32)
    }

    #[inline(always)]
    pub const fn with_signed_imm16(self, value: i16) -> Self {
        self.with_imm16(value as u16)
    }

    #[inline(always)]
    pub const fn with_code(self, value: u32) -> Self {
        self.with_field(6, 20, value)
    }

    #[inline(always)]
    pub const fn with_imm26(self, value: u32) -> Self {
        self.with_field(0, 26, value)
    }

    #[inline(always)]
    pub const fn with_interlock(self, value: bool) -> Self {
        self.with_field(0, 1, value as u32)
    }

    /// Decodes this instruction.
    pub fn operation(self) -> Operation {
        use Operation as O;

        let Some(op) = self.op() else {
            return O::ILLEGAL;
        };

        match op {
            Opcode::SPECIAL => self.special_operation(),
            Opcode::REGIMM => self.regimm_operation(),
            Opcode::MMI => self.mmi_operation(),
            Opcode::COP0 => self.cop0_operation(),
            Opcode::COP1 => self.cop1_operation(),
            Opcode::COP2 => self.cop2_operation(),
            Opcode::J => O::J,
            Opcode::JAL => O::JAL,
            Opcode::BEQ => O::BEQ,
            Opcode::BNE => O::BNE,
            Opcode::BLEZ => O::BLEZ,
            Opcode::BGTZ => O::BGTZ,
            Opcode::ADDI => O::ADDI,
            Opcode::ADDIU => O::ADDIU,
            Opcode::SLTI => O::SLTI,
            Opcode::SLTIU => O::SLTIU,
            Opcode::ANDI => O::ANDI,
            Opcode::ORI => O::ORI,
            Opcode::XORI => O::XORI,
            Opcode::LUI => O::LUI,
            Opcode::BEQL => O::BEQL,
            Opcode::BNEL => O::BNEL,
            Opcode::BLEZL => O::BLEZL,
            Opcode::BGTZL => O::BGTZL,
            Opcode::DADDI => O::DADDI,
            Opcode::DADDIU => O::DADDIU,
            Opcode::LDL => O::LDL,
            Opcode::LDR => O::LDR,
            Opcode::LQ => O::LQ,
            Opcode::SQ => O::SQ,
            Opcode::LB => O::LB,
            Opcode::LH => O::LH,
            Opcode::LWL => O::LWL,
            Opcode::LW => O::LW,
            Opcode::LBU => O::LBU,
            Opcode::LHU => O::LHU,
            Opcode::LWR => O::LWR,
            Opcode::LWU => O::LWU,
            Opcode::SB => O::SB,
            Opcode::SH => O::SH,
            Opcode::SWL => O::SWL,
            Opcode::SW => O::SW,
            Opcode::SDL => O::SDL,
            Opcode::SDR => O::SDR,
            Opcode::SWR => O::SWR,
            Opcode::CACHE => O::CACHE,
            Opcode::LWC1 => O::LWC1,
            Opcode::PREF => O::PREF,
            Opcode::LQC2 => O::LQC2,
            Opcode::LD => O::LD,
            Opcode::SWC1 => O::SWC1,
            Opcode::SQC2 => O::SQC2,
            Opcode::SD => O::SD,
        }
    }

    fn special_operation(self) -> Operation {
        use Operation as O;

        let Some(op) = SpecialOpcode::from_repr(self.funct()) else {
            return O::ILLEGAL;
        };

        match op {
            SpecialOpcode::SLL => O::SLL,
            SpecialOpcode::SRL => O::SRL,
            SpecialOpcode::SRA => O::SRA,
            SpecialOpcode::SLLV => O::SLLV,
            SpecialOpcode::SRLV => O::SRLV,
            SpecialOpcode::SRAV => O::SRAV,
            SpecialOpcode::JR => O::JR,
            SpecialOpcode::JALR => O::JALR,
            SpecialOpcode::MOVZ => O::MOVZ,
            SpecialOpcode::MOVN => O::MOVN,
            SpecialOpcode::SYSCALL => O::SYSCALL,
            SpecialOpcode::BREAK => O::BREAK,
            SpecialOpcode::SYNC => O::SYNC,
            SpecialOpcode::MFHI => O::MFHI,
            SpecialOpcode::MTHI => O::MTHI,
            SpecialOpcode::MFLO => O::MFLO,
            SpecialOpcode::MTLO => O::MTLO,
            SpecialOpcode::DSLLV => O::DSLLV,
            SpecialOpcode::DSRLV => O::DSRLV,
            SpecialOpcode::DSRAV => O::DSRAV,
            SpecialOpcode::MULT => O::MULT,
            SpecialOpcode::MULTU => O::MULTU,
            SpecialOpcode::DIV => O::DIV,
            SpecialOpcode::DIVU => O::DIVU,
            SpecialOpcode::ADD => O::ADD,
            SpecialOpcode::ADDU => O::ADDU,
            SpecialOpcode::SUB => O::SUB,
            SpecialOpcode::SUBU => O::SUBU,
            SpecialOpcode::AND => O::AND,
            SpecialOpcode::OR => O::OR,
            SpecialOpcode::XOR => O::XOR,
            SpecialOpcode::NOR => O::NOR,
            SpecialOpcode::MFSA => O::MFSA,
            SpecialOpcode::MTSA => O::MTSA,
            SpecialOpcode::SLT => O::SLT,
            SpecialOpcode::SLTU => O::SLTU,
            SpecialOpcode::DADD => O::DADD,
            SpecialOpcode::DADDU => O::DADDU,
            SpecialOpcode::DSUB => O::DSUB,
            SpecialOpcode::DSUBU => O::DSUBU,
            SpecialOpcode::TGE => O::TGE,
            SpecialOpcode::TGEU => O::TGEU,
            SpecialOpcode::TLT => O::TLT,
            SpecialOpcode::TLTU => O::TLTU,
            SpecialOpcode::TEQ => O::TEQ,
            SpecialOpcode::TNE => O::TNE,
            SpecialOpcode::DSLL => O::DSLL,
            SpecialOpcode::DSRL => O::DSRL,
            SpecialOpcode::DSRA => O::DSRA,
            SpecialOpcode::DSLL32 => O::DSLL32,
            SpecialOpcode::DSRL32 => O::DSRL32,
            SpecialOpcode::DSRA32 => O::DSRA32,
        }
    }

    fn regimm_operation(self) -> Operation {
        use Operation as O;

        let Some(op) = RegImmOpcode::from_repr(self.rt_bits()) else {
            return O::ILLEGAL;
        };

        match op {
            RegImmOpcode::BLTZ => O::BLTZ,
            RegImmOpcode::BGEZ => O::BGEZ,
            RegImmOpcode::BLTZL => O::BLTZL,
            RegImmOpcode::BGEZL => O::BGEZL,
            RegImmOpcode::TGEI => O::TGEI,
            RegImmOpcode::TGEIU => O::TGEIU,
            RegImmOpcode::TLTI => O::TLTI,
            RegImmOpcode::TLTIU => O::TLTIU,
            RegImmOpcode::TEQI => O::TEQI,
            RegImmOpcode::TNEI => O::TNEI,
            RegImmOpcode::BLTZAL => O::BLTZAL,
            RegImmOpcode::BGEZAL => O::BGEZAL,
            RegImmOpcode::BLTZALL => O::BLTZALL,
            RegImmOpcode::BGEZALL => O::BGEZALL,
            RegImmOpcode::MTSAB => O::MTSAB,
            RegImmOpcode::MTSAH => O::MTSAH,
        }
    }

    fn mmi_operation(self) -> Operation {
        use Operation as O;

        match self.funct() {
            0x00 => O::MADD,
            0x01 => O::MADDU,
            0x04 => O::PLZCW,
            0x08 => match self.sa() {
                0x00 => O::PADDW,
                0x01 => O::PSUBW,
                0x04 => O::PADDH,
                0x05 => O::PSUBH,
                0x08 => O::PADDB,
                0x09 => O::PSUBB,
                0x12 => O::PEXTLW,
                _ => O::ILLEGAL,
            },
            0x09 => match self.sa() {
                0x08 => O::PMFHI,
                0x09 => O::PMFLO,
                0x0E => O::PCPYLD,
                0x12 => O::PAND,
                0x13 => O::PXOR,
                _ => O::ILLEGAL,
            },
            0x10 => O::MFHI1,
            0x11 => O::MTHI1,
            0x12 => O::MFLO1,
            0x13 => O::MTLO1,
            0x18 => O::MULT1,
            0x19 => O::MULTU1,
            0x1A => O::DIV1,
            0x1B => O::DIVU1,
            0x20 => O::MADD1,
            0x21 => O::MADDU1,
            0x29 => match self.sa() {
                0x08 => O::PMTHI,
                0x09 => O::PMTLO,
                0x0E => O::PCPYUD,
                0x12 => O::POR,
                0x13 => O::PNOR,
                0x1B => O::PCPYH,
                _ => O::ILLEGAL,
            },
            _ => O::ILLEGAL,
        }
    }

    fn cop0_operation(self) -> Operation {
        use Operation as O;

        match self.rs_bits() {
            0x00 => O::MFC0,
            0x04 => O::MTC0,
            0x08 => match self.rt_bits() {
                0x00 => O::BC0F,
                0x01 => O::BC0T,
                0x02 => O::BC0FL,
                0x03 => O::BC0TL,
                _ => O::ILLEGAL,
            },
            0x10 => match self.funct() {
                0x01 => O::TLBR,
                0x02 => O::TLBWI,
                0x06 => O::TLBWR,
                0x08 => O::TLBP,
                0x18 => O::ERET,
                0x38 => O::EI,
                0x39 => O::DI,
                _ => O::ILLEGAL,
            },
            _ => O::ILLEGAL,
        }
    }

    fn cop1_operation(self) -> Operation {
        use Operation as O;

        match self.rs_bits() {
            0x00 => O::MFC1,
            0x02 => O::CFC1,
            0x04 => O::MTC1,
            0x06 => O::CTC1,
            0x08 => match self.rt_bits() {
                0x00 => O::BC1F,
                0x01 => O::BC1T,
                0x02 => O::BC1FL,
                0x03 => O::BC1TL,
                _ => O::ILLEGAL,
            },
            // single
            0x10 => match self.funct() {
                0x00 => O::ADDS,
                0x01 => O::SUBS,
                0x02 => O::MULS,
                0x03 => O::DIVS,
                0x04 => O::SQRTS,
                0x05 => O::ABSS,
                0x06 => O::MOVS,
                0x07 => O::NEGS,
                0x16 => O::RSQRTS,
                0x18 => O::ADDAS,
                0x19 => O::SUBAS,
                0x1A => O::MULAS,
                0x1C => O::MADDS,
                0x1D => O::MSUBS,
                0x1E => O::MADDAS,
                0x1F => O::MSUBAS,
                0x24 => O::CVTWS,
                0x28 => O::MAXS,
                0x29 => O::MINS,
                0x30 => O::CFS,
                0x32 => O::CEQS,
                0x34 => O::CLTS,
                0x36 => O::CLES,
                _ => O::ILLEGAL,
            },
            // word
            0x14 => match self.funct() {
                0x20 => O::CVTSW,
                _ => O::ILLEGAL,
            },
            _ => O::ILLEGAL,
        }
    }

    fn cop2_operation(self) -> Operation {
        use Operation as O;

        match self.rs_bits() {
            0x01 => O::QMFC2,
            0x02 => O::CFC2,
            0x05 => O::QMTC2,
            0x06 => O::CTC2,
            0x08 => match self.rt_bits() {
                0x00 => O::BC2F,
                0x01 => O::BC2T,
                0x02 => O::BC2FL,
                0x03 => O::BC2TL,
                _ => O::ILLEGAL,
            },
            0x10..=0x1F => O::VMACRO,
            _ => O::ILLEGAL,
        }
    }

    /// Returns the mnemonic of this instruction, or `None` if it's not a valid encoding.
    pub fn mnemonic(self) -> Option<&'static str> {
        let op = self.operation();
        (op != Operation::ILLEGAL).then(|| op.mnemonic())
    }

    pub fn is_illegal(self) -> bool {
        self.operation() == Operation::ILLEGAL
    }

    /// The target of a PC-relative branch in the delay slot at `delay_slot`.
    #[inline(always)]
    pub fn branch_target(self, delay_slot: u32) -> u32 {
        delay_slot.wrapping_add_signed(i32::from(self.signed_imm16()) << 2)
    }

    /// The target of a `J`/`JAL` in the delay slot at `delay_slot`.
    #[inline(always)]
    pub fn jump_target(self, delay_slot: u32) -> u32 {
        (delay_slot & 0xF000_0000) | (self.imm26() << 2)
    }
}

/// Where the register named by an instruction field lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegSource {
    Gpr,
    Cop0,
    Fpr,
    /// VU0 floating point registers.
    Vf,
    /// VU0 integer registers.
    Vi,
}

#[derive(Debug, Clone, Copy)]
pub enum ImmKind {
    Sa,
    U16,
    I16,
    Code,
    Target,
}

/// The operands an instruction shows in its disassembly.
#[derive(Debug, Clone, Copy, Default)]
pub struct Args {
    pub fd: Option<RegSource>,
    pub rd: Option<RegSource>,
    pub rt: Option<RegSource>,
    pub rs: Option<RegSource>,
    pub imm: Option<ImmKind>,
}

macro_rules! args {
    (@$current:expr; $arg:ident: $src:ident; $($remainder:tt)*) => {
        {
            let mut value = $current;
            value.$arg = Some(RegSource::$src);
            args!(@value; $($remainder)*)
        }
    };
    (@$current:expr; $imm:ident; $($remainder:tt)*) => {
        {
            let mut value = $current;
            value.imm = Some(ImmKind::$imm);
            args!(@value; $($remainder)*)
        }
    };
    (@$current:expr;) => {
        $current
    };
    ($($tokens:tt)*) => {
        {
            let value = Args { fd: None, rd: None, rt: None, rs: None, imm: None };
            args!(@value; $($tokens)*)
        }
    }
}

impl Instruction {
    /// The operands of this instruction, in disassembly order.
    pub fn args(self) -> Args {
        use Operation as O;

        match self.operation() {
            O::J | O::JAL => args!(Target;),
            O::BEQ | O::BNE | O::BEQL | O::BNEL => args!(rs: Gpr; rt: Gpr; I16;),
            O::BLEZ
            | O::BGTZ
            | O::BLEZL
            | O::BGTZL
            | O::BLTZ
            | O::BGEZ
            | O::BLTZL
            | O::BGEZL
            | O::BLTZAL
            | O::BGEZAL
            | O::BLTZALL
            | O::BGEZALL => args!(rs: Gpr; I16;),
            O::TGEI | O::TGEIU | O::TLTI | O::TLTIU | O::TEQI | O::TNEI => args!(rs: Gpr; I16;),
            O::MTSAB | O::MTSAH => args!(rs: Gpr; U16;),
            O::ADDI | O::ADDIU | O::SLTI | O::SLTIU | O::DADDI | O::DADDIU => {
                args!(rt: Gpr; rs: Gpr; I16;)
            }
            O::ANDI | O::ORI | O::XORI => args!(rt: Gpr; rs: Gpr; U16;),
            O::LUI => args!(rt: Gpr; U16;),
            O::LDL
            | O::LDR
            | O::LQ
            | O::SQ
            | O::LB
            | O::LH
            | O::LWL
            | O::LW
            | O::LBU
            | O::LHU
            | O::LWR
            | O::LWU
            | O::SB
            | O::SH
            | O::SWL
            | O::SW
            | O::SDL
            | O::SDR
            | O::SWR
            | O::LD
            | O::SD => args!(rt: Gpr; rs: Gpr; I16;),
            O::LWC1 | O::SWC1 => args!(rt: Fpr; rs: Gpr; I16;),
            O::LQC2 | O::SQC2 => args!(rt: Vf; rs: Gpr; I16;),
            O::CACHE | O::PREF => args!(rs: Gpr; I16;),
            O::SLL
            | O::SRL
            | O::SRA
            | O::DSLL
            | O::DSRL
            | O::DSRA
            | O::DSLL32
            | O::DSRL32
            | O::DSRA32 => args!(rd: Gpr; rt: Gpr; Sa;),
            O::JR | O::MTHI | O::MTLO | O::MTHI1 | O::MTLO1 | O::MTSA | O::PMTHI | O::PMTLO => {
                args!(rs: Gpr;)
            }
            O::JALR => args!(rd: Gpr; rs: Gpr;),
            O::SYSCALL | O::BREAK => args!(Code;),
            O::MFHI | O::MFLO | O::MFHI1 | O::MFLO1 | O::MFSA | O::PMFHI | O::PMFLO => {
                args!(rd: Gpr;)
            }
            O::MULT | O::MULTU | O::MULT1 | O::MULTU1 | O::MADD | O::MADDU | O::MADD1
            | O::MADDU1 => args!(rd: Gpr; rt: Gpr; rs: Gpr;),
            O::DIV | O::DIVU | O::DIV1 | O::DIVU1 => args!(rt: Gpr; rs: Gpr;),
            O::TGE | O::TGEU | O::TLT | O::TLTU | O::TEQ | O::TNE => args!(rt: Gpr; rs: Gpr;),
            O::PLZCW | O::PCPYH => args!(rd: Gpr; rs: Gpr;),
            O::SLLV
            | O::SRLV
            | O::SRAV
            | O::DSLLV
            | O::DSRLV
            | O::DSRAV
            | O::MOVZ
            | O::MOVN
            | O::ADD
            | O::ADDU
            | O::SUB
            | O::SUBU
            | O::AND
            | O::OR
            | O::XOR
            | O::NOR
            | O::SLT
            | O::SLTU
            | O::DADD
            | O::DADDU
            | O::DSUB
            | O::DSUBU
            | O::PADDW
            | O::PSUBW
            | O::PADDH
            | O::PSUBH
            | O::PADDB
            | O::PSUBB
            | O::PEXTLW
            | O::PCPYLD
            | O::PAND
            | O::PXOR
            | O::PCPYUD
            | O::POR
            | O::PNOR => args!(rd: Gpr; rt: Gpr; rs: Gpr;),
            O::MFC0 | O::MTC0 => args!(rd: Cop0; rt: Gpr;),
            O::MFC1 | O::MTC1 => args!(rd: Fpr; rt: Gpr;),
            O::CFC1 | O::CTC1 => args!(rt: Gpr; U16;),
            O::QMFC2 | O::QMTC2 => args!(rd: Vf; rt: Gpr;),
            O::CFC2 | O::CTC2 => args!(rd: Vi; rt: Gpr;),
            O::BC0F
            | O::BC0T
            | O::BC0FL
            | O::BC0TL
            | O::BC1F
            | O::BC1T
            | O::BC1FL
            | O::BC1TL
            | O::BC2F
            | O::BC2T
            | O::BC2FL
            | O::BC2TL => args!(I16;),
            O::ADDS | O::SUBS | O::MULS | O::DIVS | O::MADDS | O::MSUBS | O::MAXS | O::MINS => {
                args!(fd: Fpr; rd: Fpr; rt: Fpr;)
            }
            O::RSQRTS => args!(fd: Fpr; rd: Fpr; rt: Fpr;),
            O::SQRTS => args!(fd: Fpr; rt: Fpr;),
            O::ABSS | O::MOVS | O::NEGS | O::CVTWS | O::CVTSW => args!(fd: Fpr; rd: Fpr;),
            O::ADDAS
            | O::SUBAS
            | O::MULAS
            | O::MADDAS
            | O::MSUBAS
            | O::CFS
            | O::CEQS
            | O::CLTS
            | O::CLES => args!(rd: Fpr; rt: Fpr;),
            O::SYNC
            | O::TLBR
            | O::TLBWI
            | O::TLBWR
            | O::TLBP
            | O::ERET
            | O::EI
            | O::DI
            | O::VMACRO
            | O::ILLEGAL => args!(),
        }
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Some(mnemonic) = self.mnemonic() else {
            return write!(f, "ILLEGAL");
        };
        write!(f, "{mnemonic}")?;

        let args = self.args();
        let name = |src, index: u8| match src {
            RegSource::Gpr => Reg::from_index(u32::from(index)).alt_name().to_owned(),
            RegSource::Cop0 => format!("COP0_{index}"),
            RegSource::Fpr => format!("F{index}"),
            RegSource::Vf => format!("VF{index}"),
            RegSource::Vi => format!("VI{index}"),
        };

        let mut is_first = true;
        let mut write_comma = |f: &mut std::fmt::Formatter| {
            if is_first {
                is_first = false;
                Ok(())
            } else {
                write!(f, ",")
            }
        };

        let fields = [
            (args.fd, self.fd()),
            (args.rd, self.rd_bits()),
            (args.rt, self.rt_bits()),
            (args.rs, self.rs_bits()),
        ];

        for (src, index) in fields {
            if let Some(src) = src {
                write_comma(f)?;
                write!(f, " {}", name(src, index))?;
            }
        }

        if let Some(imm) = args.imm {
            write_comma(f)?;
            match imm {
                ImmKind::Sa => write!(f, " {}", self.sa())?,
                ImmKind::U16 => write!(f, " 0x{:04X}", self.imm16())?,
                ImmKind::I16 => write!(f, " {}", self.signed_imm16())?,
                ImmKind::Code => write!(f, " 0x{:05X}", self.code())?,
                ImmKind::Target => write!(f, " 0x{:07X}", self.imm26() << 2)?,
            }
        }

        Ok(())
    }
}

impl Instruction {
    #[inline(always)]
    const fn immediate(op: Opcode, rt: Reg, rs: Reg, imm: u16) -> Self {
        Self::NOP
            .with_opcode(op)
            .with_rt(rt)
            .with_rs(rs)
            .with_imm16(imm)
    }

    #[inline(always)]
    const fn register(op: SpecialOpcode, rd: Reg, rs: Reg, rt: Reg) -> Self {
        Self::NOP
            .with_special(op)
            .with_rd(rd)
            .with_rs(rs)
            .with_rt(rt)
    }

    pub const fn addi(rt: Reg, rs: Reg, imm: i16) -> Self {
        Self::immediate(Opcode::ADDI, rt, rs, imm as u16)
    }

    pub const fn addiu(rt: Reg, rs: Reg, imm: i16) -> Self {
        Self::immediate(Opcode::ADDIU, rt, rs, imm as u16)
    }

    pub const fn daddiu(rt: Reg, rs: Reg, imm: i16) -> Self {
        Self::immediate(Opcode::DADDIU, rt, rs, imm as u16)
    }

    pub const fn ori(rt: Reg, rs: Reg, imm: u16) -> Self {
        Self::immediate(Opcode::ORI, rt, rs, imm)
    }

    pub const fn andi(rt: Reg, rs: Reg, imm: u16) -> Self {
        Self::immediate(Opcode::ANDI, rt, rs, imm)
    }

    pub const fn lui(rt: Reg, imm: u16) -> Self {
        Self::immediate(Opcode::LUI, rt, Reg::R0, imm)
    }

    pub const fn lb(rt: Reg, rs: Reg, imm: i16) -> Self {
        Self::immediate(Opcode::LB, rt, rs, imm as u16)
    }

    pub const fn lw(rt: Reg, rs: Reg, imm: i16) -> Self {
        Self::immediate(Opcode::LW, rt, rs, imm as u16)
    }

    pub const fn ld(rt: Reg, rs: Reg, imm: i16) -> Self {
        Self::immediate(Opcode::LD, rt, rs, imm as u16)
    }

    pub const fn lq(rt: Reg, rs: Reg, imm: i16) -> Self {
        Self::immediate(Opcode::LQ, rt, rs, imm as u16)
    }

    pub const fn sb(rt: Reg, rs: Reg, imm: i16) -> Self {
        Self::immediate(Opcode::SB, rt, rs, imm as u16)
    }

    pub const fn sw(rt: Reg, rs: Reg, imm: i16) -> Self {
        Self::immediate(Opcode::SW, rt, rs, imm as u16)
    }

    pub const fn sd(rt: Reg, rs: Reg, imm: i16) -> Self {
        Self::immediate(Opcode::SD, rt, rs, imm as u16)
    }

    pub const fn sq(rt: Reg, rs: Reg, imm: i16) -> Self {
        Self::immediate(Opcode::SQ, rt, rs, imm as u16)
    }

    pub const fn beq(rs: Reg, rt: Reg, imm: i16) -> Self {
        Self::immediate(Opcode::BEQ, rt, rs, imm as u16)
    }

    pub const fn bne(rs: Reg, rt: Reg, imm: i16) -> Self {
        Self::immediate(Opcode::BNE, rt, rs, imm as u16)
    }

    pub const fn beql(rs: Reg, rt: Reg, imm: i16) -> Self {
        Self::immediate(Opcode::BEQL, rt, rs, imm as u16)
    }

    pub const fn bnel(rs: Reg, rt: Reg, imm: i16) -> Self {
        Self::immediate(Opcode::BNEL, rt, rs, imm as u16)
    }

    pub const fn bgezal(rs: Reg, imm: i16) -> Self {
        Self::NOP
            .with_opcode(Opcode::REGIMM)
            .with_rs(rs)
            .with_rt_bits(RegImmOpcode::BGEZAL as u8)
            .with_signed_imm16(imm)
    }

    pub const fn j(target: u32) -> Self {
        Self::NOP.with_opcode(Opcode::J).with_imm26(target >> 2)
    }

    pub const fn jal(target: u32) -> Self {
        Self::NOP.with_opcode(Opcode::JAL).with_imm26(target >> 2)
    }

    pub const fn jr(rs: Reg) -> Self {
        Self::register(SpecialOpcode::JR, Reg::R0, rs, Reg::R0)
    }

    pub const fn jalr(rd: Reg, rs: Reg) -> Self {
        Self::register(SpecialOpcode::JALR, rd, rs, Reg::R0)
    }

    pub const fn sll(rd: Reg, rt: Reg, sa: u8) -> Self {
        Self::register(SpecialOpcode::SLL, rd, Reg::R0, rt).with_sa(sa)
    }

    pub const fn dsll32(rd: Reg, rt: Reg, sa: u8) -> Self {
        Self::register(SpecialOpcode::DSLL32, rd, Reg::R0, rt).with_sa(sa)
    }

    pub const fn add(rd: Reg, rs: Reg, rt: Reg) -> Self {
        Self::register(SpecialOpcode::ADD, rd, rs, rt)
    }

    pub const fn addu(rd: Reg, rs: Reg, rt: Reg) -> Self {
        Self::register(SpecialOpcode::ADDU, rd, rs, rt)
    }

    pub const fn daddu(rd: Reg, rs: Reg, rt: Reg) -> Self {
        Self::register(SpecialOpcode::DADDU, rd, rs, rt)
    }

    pub const fn subu(rd: Reg, rs: Reg, rt: Reg) -> Self {
        Self::register(SpecialOpcode::SUBU, rd, rs, rt)
    }

    pub const fn dsub(rd: Reg, rs: Reg, rt: Reg) -> Self {
        Self::register(SpecialOpcode::DSUB, rd, rs, rt)
    }

    pub const fn or(rd: Reg, rs: Reg, rt: Reg) -> Self {
        Self::register(SpecialOpcode::OR, rd, rs, rt)
    }

    pub const fn slt(rd: Reg, rs: Reg, rt: Reg) -> Self {
        Self::register(SpecialOpcode::SLT, rd, rs, rt)
    }

    pub const fn mult(rd: Reg, rs: Reg, rt: Reg) -> Self {
        Self::register(SpecialOpcode::MULT, rd, rs, rt)
    }

    pub const fn div(rs: Reg, rt: Reg) -> Self {
        Self::register(SpecialOpcode::DIV, Reg::R0, rs, rt)
    }

    pub const fn divu(rs: Reg, rt: Reg) -> Self {
        Self::register(SpecialOpcode::DIVU, Reg::R0, rs, rt)
    }

    pub const fn mfhi(rd: Reg) -> Self {
        Self::register(SpecialOpcode::MFHI, rd, Reg::R0, Reg::R0)
    }

    pub const fn mflo(rd: Reg) -> Self {
        Self::register(SpecialOpcode::MFLO, rd, Reg::R0, Reg::R0)
    }

    pub const fn teq(rs: Reg, rt: Reg) -> Self {
        Self::register(SpecialOpcode::TEQ, Reg::R0, rs, rt)
    }

    pub const fn syscall(code: u32) -> Self {
        Self::NOP.with_special(SpecialOpcode::SYSCALL).with_code(code)
    }

    pub const fn brk(code: u32) -> Self {
        Self::NOP.with_special(SpecialOpcode::BREAK).with_code(code)
    }

    pub const fn mult1(rd: Reg, rs: Reg, rt: Reg) -> Self {
        Self::NOP
            .with_opcode(Opcode::MMI)
            .with_funct(0x18)
            .with_rd(rd)
            .with_rs(rs)
            .with_rt(rt)
    }

    pub const fn mflo1(rd: Reg) -> Self {
        Self::NOP.with_opcode(Opcode::MMI).with_funct(0x12).with_rd(rd)
    }

    pub const fn paddw(rd: Reg, rs: Reg, rt: Reg) -> Self {
        Self::NOP
            .with_opcode(Opcode::MMI)
            .with_funct(0x08)
            .with_sa(0x00)
            .with_rd(rd)
            .with_rs(rs)
            .with_rt(rt)
    }

    pub const fn mfc0(rt: Reg, rd: u8) -> Self {
        Self::NOP
            .with_opcode(Opcode::COP0)
            .with_rs_bits(0x00)
            .with_rt(rt)
            .with_rd_bits(rd)
    }

    pub const fn mtc0(rt: Reg, rd: u8) -> Self {
        Self::NOP
            .with_opcode(Opcode::COP0)
            .with_rs_bits(0x04)
            .with_rt(rt)
            .with_rd_bits(rd)
    }

    pub const fn eret() -> Self {
        Self::NOP
            .with_opcode(Opcode::COP0)
            .with_rs_bits(0x10)
            .with_funct(0x18)
    }

    pub const fn ei() -> Self {
        Self::NOP
            .with_opcode(Opcode::COP0)
            .with_rs_bits(0x10)
            .with_funct(0x38)
    }

    pub const fn mtc1(rt: Reg, fs: u8) -> Self {
        Self::NOP
            .with_opcode(Opcode::COP1)
            .with_rs_bits(0x04)
            .with_rt(rt)
            .with_rd_bits(fs)
    }

    pub const fn mfc1(rt: Reg, fs: u8) -> Self {
        Self::NOP
            .with_opcode(Opcode::COP1)
            .with_rs_bits(0x00)
            .with_rt(rt)
            .with_rd_bits(fs)
    }

    pub const fn add_s(fd: u8, fs: u8, ft: u8) -> Self {
        Self::NOP
            .with_opcode(Opcode::COP1)
            .with_rs_bits(0x10)
            .with_rt_bits(ft)
            .with_rd_bits(fs)
            .with_sa(fd)
    }

    pub const fn qmfc2(rt: Reg, vf: u8, interlock: bool) -> Self {
        Self::NOP
            .with_opcode(Opcode::COP2)
            .with_rs_bits(0x01)
            .with_rt(rt)
            .with_rd_bits(vf)
            .with_interlock(interlock)
    }

    pub const fn qmtc2(rt: Reg, vf: u8, interlock: bool) -> Self {
        Self::NOP
            .with_opcode(Opcode::COP2)
            .with_rs_bits(0x05)
            .with_rt(rt)
            .with_rd_bits(vf)
            .with_interlock(interlock)
    }

    pub const fn cfc2(rt: Reg, vi: u8, interlock: bool) -> Self {
        Self::NOP
            .with_opcode(Opcode::COP2)
            .with_rs_bits(0x02)
            .with_rt(rt)
            .with_rd_bits(vi)
            .with_interlock(interlock)
    }

    pub const fn ctc2(rt: Reg, vi: u8, interlock: bool) -> Self {
        Self::NOP
            .with_opcode(Opcode::COP2)
            .with_rs_bits(0x06)
            .with_rt(rt)
            .with_rd_bits(vi)
            .with_interlock(interlock)
    }

    /// A VU0 macro mode operation with the given raw low 25 bits.
    pub const fn vu0_macro(bits: u32) -> Self {
        Self(((Opcode::COP2 as u32) << 26) | (1 << 25) | (bits & 0x01FF_FFFF))
    }
}

/// Assembles a sequence of instructions into an array, using the [`Instruction`] constructors.
#[macro_export]
macro_rules! mips {
    ( $( $op:ident ($($args:tt)*) )* ) => {
        [
            $(
                $crate::cpu::instr::Instruction::$op( $($args)* )
            ),*
        ]
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields() {
        // addiu sp, sp, -16
        let instr = Instruction(0x27BD_FFF0);
        assert_eq!(instr.op(), Some(Opcode::ADDIU));
        assert_eq!(instr.rs(), Reg::SP);
        assert_eq!(instr.rt(), Reg::SP);
        assert_eq!(instr.signed_imm16(), -16);
        assert_eq!(instr, Instruction::addiu(Reg::SP, Reg::SP, -16));
    }

    #[test]
    fn decodes_groups() {
        let cases = [
            (Instruction::NOP, Operation::SLL),
            (Instruction::jr(Reg::RA), Operation::JR),
            (Instruction::bgezal(Reg::A0, 4), Operation::BGEZAL),
            (Instruction::mult1(Reg::V0, Reg::A0, Reg::A1), Operation::MULT1),
            (Instruction::paddw(Reg::V0, Reg::A0, Reg::A1), Operation::PADDW),
            (Instruction::mfc0(Reg::T0, 12), Operation::MFC0),
            (Instruction::eret(), Operation::ERET),
            (Instruction::add_s(0, 1, 2), Operation::ADDS),
            (Instruction::qmfc2(Reg::T0, 1, true), Operation::QMFC2),
            (Instruction::vu0_macro(0x2BC), Operation::VMACRO),
            // ERET encoding with the real word
            (Instruction(0x4200_0018), Operation::ERET),
            // SYNC.P
            (Instruction(0x0000_040F), Operation::SYNC),
        ];

        for (instr, expected) in cases {
            assert_eq!(instr.operation(), expected, "{instr:?}");
        }
    }

    #[test]
    fn unknown_encodings_are_illegal() {
        // opcode 0x13 (COP3) does not exist on the EE
        assert!(Instruction(0x4C00_0000).is_illegal());
        // SPECIAL function 0x01
        assert!(Instruction(0x0000_0001).is_illegal());
        // COP1 with an unused format
        assert!(Instruction(0x4620_0000).is_illegal());
        assert_eq!(Instruction(0x4C00_0000).to_string(), "ILLEGAL");
    }

    #[test]
    fn likely_branches() {
        assert!(Operation::BEQL.is_branch());
        assert!(Operation::BEQL.is_likely());
        assert!(Operation::BEQ.is_branch());
        assert!(!Operation::BEQ.is_likely());
        assert!(!Operation::ADDU.is_branch());
    }

    #[test]
    fn branch_targets() {
        let instr = Instruction::beq(Reg::R1, Reg::R2, -2);
        assert_eq!(instr.branch_target(0x104), 0xFC);

        let instr = Instruction::j(0x0010_0000);
        assert_eq!(instr.jump_target(0x8000_0004), 0x8010_0000);
    }

    #[test]
    fn disassembly() {
        assert_eq!(
            Instruction::addiu(Reg::SP, Reg::SP, -16).to_string(),
            "ADDIU SP, SP, -16"
        );
        assert_eq!(
            Instruction::or(Reg::V0, Reg::A0, Reg::R0).to_string(),
            "OR V0, ZERO, A0"
        );
        assert_eq!(Instruction::add_s(3, 1, 2).to_string(), "ADD.S F3, F1, F2");
        assert_eq!(Instruction::mtc0(Reg::T0, 12).to_string(), "MTC0 COP0_12, T0");
        assert_eq!(Instruction::eret().to_string(), "ERET");
    }

    #[test]
    fn assembler_macro() {
        let program = crate::mips! {
            lui(Reg::T0, 0x1000)
            ori(Reg::T0, Reg::T0, 0xF180)
            sb(Reg::A0, Reg::T0, 0)
        };

        assert_eq!(program[0].operation(), Operation::LUI);
        assert_eq!(program[1].imm16(), 0xF180);
        assert_eq!(program[2].operation(), Operation::SB);
    }
}
