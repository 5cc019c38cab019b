//! Items related to the main CPU of the PS2, the Emotion Engine (R5900).

pub mod cop0;
pub mod descriptor;
pub mod fpu;
pub mod instr;

use crate::mem::Address;
use cop0::Cop0;
use fpu::Fpu;
use strum::{EnumMessage, FromRepr, VariantArray};

/// The frequency of the EE, in Hz.
pub const FREQUENCY: u64 = 294_912_000;

/// The bus (DMAC, GIF, VIF, IPU) runs at half the EE clock.
pub const BUS_DIVIDER: u64 = 2;

/// The IOP runs at an eighth of the EE clock.
pub const IOP_DIVIDER: u64 = 8;

/// Where the EE starts executing after a reset.
pub const RESET_VECTOR: Address = Address(0xBFC0_0000);

/// A general purpose register of the EE.
///
/// Each register is 128 bits wide. Most instructions only see the low 64 bits; the multimedia
/// instructions (and `LQ`/`SQ`) use all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, VariantArray, EnumMessage)]
#[repr(u8)]
pub enum Reg {
    /// `R0`: hardwired to zero. Writes are discarded.
    R0,
    /// `R1`, `AT`: assembler temporary.
    R1,
    /// `R2`, `V0`: return value.
    R2,
    /// `R3`, `V1`: return value. Also the syscall number for kernel calls.
    R3,
    /// `R4`, `A0`: argument.
    R4,
    /// `R5`, `A1`: argument.
    R5,
    /// `R6`, `A2`: argument.
    R6,
    /// `R7`, `A3`: argument.
    R7,
    /// `R8`, `T0`: temporary. With the EE's 64-bit ABI, also argument 5.
    R8,
    /// `R9`, `T1`: temporary. With the EE's 64-bit ABI, also argument 6.
    R9,
    /// `R10`, `T2`: temporary. With the EE's 64-bit ABI, also argument 7.
    R10,
    /// `R11`, `T3`: temporary. With the EE's 64-bit ABI, also argument 8.
    R11,
    /// `R12`, `T4`: temporary.
    R12,
    /// `R13`, `T5`: temporary.
    R13,
    /// `R14`, `T6`: temporary.
    R14,
    /// `R15`, `T7`: temporary.
    R15,
    /// `R16`, `S0`: callee saved.
    R16,
    /// `R17`, `S1`: callee saved.
    R17,
    /// `R18`, `S2`: callee saved.
    R18,
    /// `R19`, `S3`: callee saved.
    R19,
    /// `R20`, `S4`: callee saved.
    R20,
    /// `R21`, `S5`: callee saved.
    R21,
    /// `R22`, `S6`: callee saved.
    R22,
    /// `R23`, `S7`: callee saved.
    R23,
    /// `R24`, `T8`: temporary.
    R24,
    /// `R25`, `T9`: temporary.
    R25,
    /// `R26`, `K0`: reserved for the kernel.
    R26,
    /// `R27`, `K1`: reserved for the kernel.
    R27,
    /// `R28`, `GP`: global pointer.
    R28,
    /// `R29`, `SP`: stack pointer.
    R29,
    /// `R30`, `FP`: frame pointer.
    R30,
    /// `R31`, `RA`: return address, written by the linking jumps and branches.
    R31,
}

impl Reg {
    pub const ZERO: Reg = Reg::R0;
    pub const AT: Reg = Reg::R1;
    pub const V0: Reg = Reg::R2;
    pub const V1: Reg = Reg::R3;
    pub const A0: Reg = Reg::R4;
    pub const A1: Reg = Reg::R5;
    pub const A2: Reg = Reg::R6;
    pub const A3: Reg = Reg::R7;
    pub const T0: Reg = Reg::R8;
    pub const T1: Reg = Reg::R9;
    pub const T2: Reg = Reg::R10;
    pub const T3: Reg = Reg::R11;
    pub const T4: Reg = Reg::R12;
    pub const T5: Reg = Reg::R13;
    pub const T6: Reg = Reg::R14;
    pub const T7: Reg = Reg::R15;
    pub const S0: Reg = Reg::R16;
    pub const S1: Reg = Reg::R17;
    pub const S2: Reg = Reg::R18;
    pub const S3: Reg = Reg::R19;
    pub const S4: Reg = Reg::R20;
    pub const S5: Reg = Reg::R21;
    pub const S6: Reg = Reg::R22;
    pub const S7: Reg = Reg::R23;
    pub const T8: Reg = Reg::R24;
    pub const T9: Reg = Reg::R25;
    pub const K0: Reg = Reg::R26;
    pub const K1: Reg = Reg::R27;
    pub const GP: Reg = Reg::R28;
    pub const SP: Reg = Reg::R29;
    pub const FP: Reg = Reg::R30;
    pub const RA: Reg = Reg::R31;

    /// Returns the register with the given index. Only the low 5 bits are used.
    #[inline(always)]
    pub const fn from_index(index: u32) -> Self {
        match Self::from_repr((index & 0x1F) as u8) {
            Some(reg) => reg,
            None => Reg::R0,
        }
    }

    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn alt_name(&self) -> &'static str {
        const NAMES: [&str; 32] = [
            "ZERO", "AT", "V0", "V1", "A0", "A1", "A2", "A3", "T0", "T1", "T2", "T3", "T4", "T5",
            "T6", "T7", "S0", "S1", "S2", "S3", "S4", "S5", "S6", "S7", "T8", "T9", "K0", "K1",
            "GP", "SP", "FP", "RA",
        ];

        NAMES[self.index()]
    }

    pub fn description(&self) -> &'static str {
        self.get_documentation().unwrap_or_default()
    }
}

/// The general purpose register file of the EE, plus the multiply/divide and shift amount
/// registers.
///
/// `LO` and `HI` are 128 bits wide. Their low halves belong to pipeline 0 (`MULT`, `DIV`, ...)
/// and their high halves (`LO1`, `HI1`) to pipeline 1 (`MULT1`, `DIV1`, ...).
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Registers {
    gp: [u128; 32],
    lo: u128,
    hi: u128,
    sa: u32,
}

impl std::fmt::Debug for Registers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for reg in Reg::VARIANTS {
            let value = self.gp[reg.index()];
            if value != 0 {
                map.entry(reg, &format_args!("0x{value:032X}"));
            }
        }

        map.entry(&"lo", &format_args!("0x{:032X}", self.lo));
        map.entry(&"hi", &format_args!("0x{:032X}", self.hi));
        map.entry(&"sa", &self.sa);
        map.finish()
    }
}

impl Registers {
    /// Reads the low 64 bits of a register.
    #[inline(always)]
    pub fn read(&self, reg: Reg) -> u64 {
        self.gp[reg.index()] as u64
    }

    /// Reads the low 32 bits of a register.
    #[inline(always)]
    pub fn read32(&self, reg: Reg) -> u32 {
        self.gp[reg.index()] as u32
    }

    /// Reads the full 128 bits of a register.
    #[inline(always)]
    pub fn read128(&self, reg: Reg) -> u128 {
        self.gp[reg.index()]
    }

    /// Writes the low 64 bits of a register, keeping the upper 64 bits.
    #[inline(always)]
    pub fn write(&mut self, reg: Reg, value: u64) {
        if reg != Reg::R0 {
            let slot = &mut self.gp[reg.index()];
            *slot = (*slot & !u128::from(u64::MAX)) | u128::from(value);
        }
    }

    /// Writes a 32-bit result, sign extended to 64 bits.
    #[inline(always)]
    pub fn write_sign_extended(&mut self, reg: Reg, value: u32) {
        self.write(reg, i64::from(value as i32) as u64);
    }

    /// Writes the full 128 bits of a register.
    #[inline(always)]
    pub fn write128(&mut self, reg: Reg, value: u128) {
        if reg != Reg::R0 {
            self.gp[reg.index()] = value;
        }
    }

    #[inline(always)]
    pub fn lo(&self) -> u64 {
        self.lo as u64
    }

    #[inline(always)]
    pub fn hi(&self) -> u64 {
        self.hi as u64
    }

    #[inline(always)]
    pub fn lo1(&self) -> u64 {
        (self.lo >> 64) as u64
    }

    #[inline(always)]
    pub fn hi1(&self) -> u64 {
        (self.hi >> 64) as u64
    }

    #[inline(always)]
    pub fn lo128(&self) -> u128 {
        self.lo
    }

    #[inline(always)]
    pub fn hi128(&self) -> u128 {
        self.hi
    }

    #[inline(always)]
    pub fn set_lo(&mut self, value: u64) {
        self.lo = (self.lo & !u128::from(u64::MAX)) | u128::from(value);
    }

    #[inline(always)]
    pub fn set_hi(&mut self, value: u64) {
        self.hi = (self.hi & !u128::from(u64::MAX)) | u128::from(value);
    }

    #[inline(always)]
    pub fn set_lo1(&mut self, value: u64) {
        self.lo = (self.lo & u128::from(u64::MAX)) | (u128::from(value) << 64);
    }

    #[inline(always)]
    pub fn set_hi1(&mut self, value: u64) {
        self.hi = (self.hi & u128::from(u64::MAX)) | (u128::from(value) << 64);
    }

    #[inline(always)]
    pub fn set_lo128(&mut self, value: u128) {
        self.lo = value;
    }

    #[inline(always)]
    pub fn set_hi128(&mut self, value: u128) {
        self.hi = value;
    }

    /// Stores a pipeline 0 result: both halves are 32-bit values, sign extended.
    #[inline(always)]
    pub fn set_lo_hi(&mut self, lo: u32, hi: u32) {
        self.set_lo(i64::from(lo as i32) as u64);
        self.set_hi(i64::from(hi as i32) as u64);
    }

    /// Stores a pipeline 1 result: both halves are 32-bit values, sign extended.
    #[inline(always)]
    pub fn set_lo_hi1(&mut self, lo: u32, hi: u32) {
        self.set_lo1(i64::from(lo as i32) as u64);
        self.set_hi1(i64::from(hi as i32) as u64);
    }

    #[inline(always)]
    pub fn sa(&self) -> u32 {
        self.sa
    }

    #[inline(always)]
    pub fn set_sa(&mut self, value: u32) {
        self.sa = value;
    }

    /// The raw register array, register 0 included.
    pub fn gp(&self) -> &[u128; 32] {
        &self.gp
    }

    /// Replaces every register at once. Register 0 is forced back to zero.
    pub fn restore(&mut self, gp: [u128; 32], lo: u128, hi: u128, sa: u32) {
        self.gp = gp;
        self.gp[0] = 0;
        self.lo = lo;
        self.hi = hi;
        self.sa = sa;
    }
}

/// A line of the instruction cache: two ways, each with a tag, a valid bit and an LFU bit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ICacheLine {
    pub tag: [u32; 2],
    pub valid: [bool; 2],
    pub lfu: [bool; 2],
}

/// Experimental instruction cache timing model: 16 KiB, two way set associative, 64 byte lines.
///
/// It only tracks tags (instructions are always fetched from the bus) and is disabled unless
/// explicitly turned on: enabling it changes fetch timing in ways some software is sensitive to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ICache {
    pub lines: [ICacheLine; 128],
    pub enabled: bool,
}

impl Default for ICache {
    fn default() -> Self {
        Self {
            lines: [ICacheLine::default(); 128],
            enabled: false,
        }
    }
}

impl ICache {
    /// Extra cycles a miss costs.
    pub const MISS_PENALTY: u64 = 40;

    #[inline(always)]
    fn index_and_tag(addr: Address) -> (usize, u32) {
        (((addr.value() >> 6) & 0x7F) as usize, addr.value() >> 13)
    }

    /// Looks up the given address, filling the line on a miss. Returns `true` on a hit.
    pub fn access(&mut self, addr: Address) -> bool {
        let (index, tag) = Self::index_and_tag(addr);
        let line = &mut self.lines[index];

        for way in 0..2 {
            if line.valid[way] && line.tag[way] == tag {
                return true;
            }
        }

        let way = if !line.valid[0] {
            0
        } else if !line.valid[1] {
            1
        } else {
            usize::from(line.lfu[0] ^ line.lfu[1] && line.lfu[0])
        };

        line.tag[way] = tag;
        line.valid[way] = true;
        line.lfu[way] ^= true;
        false
    }

    /// Invalidates the line the given address indexes.
    pub fn invalidate_index(&mut self, addr: Address) {
        let (index, _) = Self::index_and_tag(addr);
        self.lines[index] = ICacheLine::default();
    }

    pub fn invalidate_all(&mut self) {
        self.lines = [ICacheLine::default(); 128];
    }
}

/// The state of the EE.
#[derive(Debug, Clone)]
pub struct Cpu {
    pub regs: Registers,
    pub cop0: Cop0,
    pub fpu: Fpu,
    pub icache: ICache,
    /// Address of the next instruction to execute.
    pub pc: Address,
    /// Address of the instruction after it. Branches write their target here, which makes the
    /// instruction at `pc` their delay slot.
    pub next_pc: Address,
    /// Whether the instruction at `pc` is in a branch delay slot.
    pub in_delay_slot: bool,
    /// Set while waiting for an interrupt. Cleared when one is taken.
    pub halted: bool,
}

impl Default for Cpu {
    fn default() -> Self {
        Self {
            regs: Registers::default(),
            cop0: Cop0::default(),
            fpu: Fpu::default(),
            icache: ICache::default(),
            pc: RESET_VECTOR,
            next_pc: RESET_VECTOR + 4u32,
            in_delay_slot: false,
            halted: false,
        }
    }
}

impl Cpu {
    /// Returns the EE to its reset state in place. Whether the icache is modelled is kept.
    pub fn reset(&mut self) {
        self.regs = Registers::default();
        self.cop0 = Cop0::default();
        self.fpu = Fpu::default();
        self.icache.invalidate_all();
        self.jump_to(RESET_VECTOR);
        self.halted = false;
    }

    /// Redirects execution to the given address, discarding any pending branch.
    pub fn jump_to(&mut self, addr: Address) {
        self.pc = addr;
        self.next_pc = addr + 4u32;
        self.in_delay_slot = false;
    }

    /// Schedules a branch to `target` after the delay slot at `pc`.
    #[inline(always)]
    pub fn branch_to(&mut self, target: Address) {
        self.next_pc = target;
        self.in_delay_slot = true;
    }

    /// Skips the delay slot at `pc`, used by not-taken likely branches.
    #[inline(always)]
    pub fn nullify_delay_slot(&mut self) {
        self.pc = self.next_pc;
        self.next_pc = self.pc + 4u32;
    }

    pub fn halt(&mut self) {
        self.halted = true;
    }

    pub fn unhalt(&mut self) {
        self.halted = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn any_reg() -> impl Strategy<Value = Reg> {
        (0u32..32).prop_map(Reg::from_index)
    }

    #[test]
    fn reset_keeps_icache_setting() {
        let mut cpu = Cpu::default();
        cpu.icache.enabled = true;
        cpu.regs.write(Reg::R5, 9);
        cpu.halt();
        cpu.branch_to(Address(0x8000_1000));
        assert!(!cpu.icache.access(RESET_VECTOR));

        cpu.reset();
        assert!(cpu.icache.enabled);
        assert!(!cpu.icache.access(RESET_VECTOR));
        assert_eq!(cpu.regs.read(Reg::R5), 0);
        assert_eq!(cpu.pc, RESET_VECTOR);
        assert_eq!(cpu.next_pc, RESET_VECTOR + 4u32);
        assert!(!cpu.in_delay_slot);
        assert!(!cpu.halted);
    }

    #[test]
    fn abi_aliases() {
        let aliases = [
            (Reg::T0, "T0"),
            (Reg::T9, "T9"),
            (Reg::S0, "S0"),
            (Reg::K1, "K1"),
            (Reg::GP, "GP"),
            (Reg::FP, "FP"),
            (Reg::RA, "RA"),
        ];

        for (reg, name) in aliases {
            assert_eq!(reg.alt_name(), name);
        }
    }

    proptest! {
        #[test]
        fn zero_is_hardwired(value: u64, wide: u128) {
            let mut regs = Registers::default();
            regs.write(Reg::R0, value);
            prop_assert_eq!(regs.read128(Reg::R0), 0);

            regs.write128(Reg::R0, wide);
            prop_assert_eq!(regs.read128(Reg::R0), 0);

            regs.write_sign_extended(Reg::R0, value as u32);
            prop_assert_eq!(regs.read(Reg::R0), 0);
        }

        #[test]
        fn narrow_writes_keep_upper_half(reg in any_reg(), wide: u128, value: u64) {
            prop_assume!(reg != Reg::R0);

            let mut regs = Registers::default();
            regs.write128(reg, wide);
            regs.write(reg, value);

            prop_assert_eq!(regs.read(reg), value);
            prop_assert_eq!(regs.read128(reg) >> 64, wide >> 64);
        }

        #[test]
        fn sign_extension(reg in any_reg(), value: u32) {
            prop_assume!(reg != Reg::R0);

            let mut regs = Registers::default();
            regs.write_sign_extended(reg, value);
            prop_assert_eq!(regs.read(reg), value as i32 as i64 as u64);
        }
    }

    #[test]
    fn lo_hi_halves() {
        let mut regs = Registers::default();
        regs.set_lo_hi(0x8000_0000, 1);
        regs.set_lo_hi1(2, 0xFFFF_FFFF);

        assert_eq!(regs.lo(), 0xFFFF_FFFF_8000_0000);
        assert_eq!(regs.hi(), 1);
        assert_eq!(regs.lo1(), 2);
        assert_eq!(regs.hi1(), u64::MAX);
    }

    #[test]
    fn icache_hits_after_fill() {
        let mut icache = ICache::default();
        let addr = Address(0x0010_0040);

        assert!(!icache.access(addr));
        assert!(icache.access(addr));
        assert!(icache.access(addr + 4u32));

        // same index, different tag: both ways end up used
        let alias = Address(0x0010_0040 + (1 << 13));
        assert!(!icache.access(alias));
        assert!(icache.access(addr));
        assert!(icache.access(alias));

        icache.invalidate_index(addr);
        assert!(!icache.access(addr));
    }

    #[test]
    fn branch_state() {
        let mut cpu = Cpu::default();
        cpu.jump_to(Address(0x100));
        assert_eq!(cpu.next_pc, Address(0x104));

        cpu.pc = Address(0x104);
        cpu.branch_to(Address(0x200));
        assert!(cpu.in_delay_slot);
        assert_eq!(cpu.next_pc, Address(0x200));
    }
}
