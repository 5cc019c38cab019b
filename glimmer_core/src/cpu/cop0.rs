//! Coprocessor 0: system control of the EE.
//!
//! Status and Cause are packed hardware registers; they are kept as plain integers with explicit
//! shift/mask accessors so their save state layout is just the integer.

use crate::mem::Address;
use strum::{FromRepr, IntoStaticStr};
use tracing::trace;

/// Indices of the COP0 registers the EE implements.
pub mod reg {
    pub const INDEX: u8 = 0;
    pub const RANDOM: u8 = 1;
    pub const ENTRY_LO0: u8 = 2;
    pub const ENTRY_LO1: u8 = 3;
    pub const CONTEXT: u8 = 4;
    pub const PAGE_MASK: u8 = 5;
    pub const WIRED: u8 = 6;
    pub const BAD_VADDR: u8 = 8;
    pub const COUNT: u8 = 9;
    pub const ENTRY_HI: u8 = 10;
    pub const COMPARE: u8 = 11;
    pub const STATUS: u8 = 12;
    pub const CAUSE: u8 = 13;
    pub const EPC: u8 = 14;
    pub const PRID: u8 = 15;
    pub const CONFIG: u8 = 16;
    pub const BAD_PADDR: u8 = 23;
    pub const DEBUG: u8 = 24;
    pub const PERF: u8 = 25;
    pub const TAG_LO: u8 = 28;
    pub const TAG_HI: u8 = 29;
    pub const ERROR_EPC: u8 = 30;
}

/// Processor revision reported by PRId.
pub const PRID: u32 = 0x2E20;

/// Status right after a reset: BEV and ERL set.
pub const RESET_STATUS: u32 = 0x0040_0004;

/// Exception vector base while BEV is clear.
pub const VECTOR_BASE: Address = Address(0x8000_0000);

/// Exception vector base while BEV is set.
pub const VECTOR_BASE_BOOTSTRAP: Address = Address(0xBFC0_0200);

/// Exception codes, as stored in Cause.ExcCode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, IntoStaticStr)]
#[repr(u8)]
pub enum Exception {
    Interrupt = 0x00,
    TlbModified = 0x01,
    TlbLoad = 0x02,
    TlbStore = 0x03,
    AddressErrorLoad = 0x04,
    AddressErrorStore = 0x05,
    BusErrorInstruction = 0x06,
    BusErrorData = 0x07,
    Syscall = 0x08,
    Breakpoint = 0x09,
    ReservedInstruction = 0x0A,
    CoprocessorUnusable = 0x0B,
    Overflow = 0x0C,
    Trap = 0x0D,
}

impl Exception {
    /// Offset of this exception's handler from the vector base.
    pub fn vector_offset(self) -> u32 {
        match self {
            Self::Interrupt => 0x200,
            _ => 0x180,
        }
    }
}

/// The interrupt lines wired into Cause.IP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
pub enum Line {
    /// INT0, driven by the interrupt controller.
    Int0,
    /// INT1, driven by the DMA controller.
    Int1,
    /// The COP0 timer (Count reaching Compare).
    Timer,
}

impl Line {
    #[inline(always)]
    pub const fn bit(self) -> u32 {
        match self {
            Self::Int0 => 1 << 10,
            Self::Int1 => 1 << 11,
            Self::Timer => 1 << 15,
        }
    }
}

/// The interrupt bits of Status.IM and Cause.IP.
const INTERRUPT_MASK: u32 = (1 << 10) | (1 << 11) | (1 << 15);

/// The Status register.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Status(pub u32);

impl Status {
    const IE: u32 = 1 << 0;
    const EXL: u32 = 1 << 1;
    const ERL: u32 = 1 << 2;
    const KSU_SHIFT: u32 = 3;
    const EIE: u32 = 1 << 16;
    const EDI: u32 = 1 << 17;
    const BEV: u32 = 1 << 22;

    #[inline(always)]
    fn set(&mut self, bit: u32, value: bool) {
        if value {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }

    /// Interrupt enable.
    #[inline(always)]
    pub fn ie(self) -> bool {
        self.0 & Self::IE != 0
    }

    /// Exception level.
    #[inline(always)]
    pub fn exl(self) -> bool {
        self.0 & Self::EXL != 0
    }

    #[inline(always)]
    pub fn set_exl(&mut self, value: bool) {
        self.set(Self::EXL, value);
    }

    /// Error level.
    #[inline(always)]
    pub fn erl(self) -> bool {
        self.0 & Self::ERL != 0
    }

    #[inline(always)]
    pub fn set_erl(&mut self, value: bool) {
        self.set(Self::ERL, value);
    }

    /// Privilege mode: 0 kernel, 1 supervisor, 2 user.
    #[inline(always)]
    pub fn ksu(self) -> u32 {
        (self.0 >> Self::KSU_SHIFT) & 0b11
    }

    /// Interrupt mask, in the same bit positions as [`Cause::ip`].
    #[inline(always)]
    pub fn im(self) -> u32 {
        self.0 & INTERRUPT_MASK
    }

    /// Enable IE, the master interrupt enable of the EE.
    #[inline(always)]
    pub fn eie(self) -> bool {
        self.0 & Self::EIE != 0
    }

    #[inline(always)]
    pub fn set_eie(&mut self, value: bool) {
        self.set(Self::EIE, value);
    }

    /// Whether `EI` and `DI` work outside of kernel mode.
    #[inline(always)]
    pub fn edi(self) -> bool {
        self.0 & Self::EDI != 0
    }

    /// Bootstrap exception vectors.
    #[inline(always)]
    pub fn bev(self) -> bool {
        self.0 & Self::BEV != 0
    }

    /// Whether coprocessor `n` is usable.
    #[inline(always)]
    pub fn cu(self, n: u32) -> bool {
        (self.0 >> (28 + (n & 3))) & 1 != 0
    }

    /// Whether the EE is in kernel mode, either by KSU or by being in an exception handler.
    #[inline(always)]
    pub fn is_kernel(self) -> bool {
        self.ksu() == 0 || self.exl() || self.erl()
    }

    /// Whether interrupts can be taken at all.
    #[inline(always)]
    pub fn interrupts_enabled(self) -> bool {
        self.ie() && self.eie() && !self.exl() && !self.erl()
    }
}

/// The Cause register.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cause(pub u32);

impl Cause {
    const EXC_CODE_SHIFT: u32 = 2;
    const EXC_CODE_MASK: u32 = 0x1F << Self::EXC_CODE_SHIFT;
    const BD: u32 = 1 << 31;

    #[inline(always)]
    pub fn exc_code(self) -> u8 {
        ((self.0 & Self::EXC_CODE_MASK) >> Self::EXC_CODE_SHIFT) as u8
    }

    #[inline(always)]
    pub fn exception(self) -> Option<Exception> {
        Exception::from_repr(self.exc_code())
    }

    #[inline(always)]
    pub fn set_exception(&mut self, exception: Exception) {
        self.0 = (self.0 & !Self::EXC_CODE_MASK)
            | ((u32::from(exception as u8) << Self::EXC_CODE_SHIFT) & Self::EXC_CODE_MASK);
    }

    /// Pending interrupt lines.
    #[inline(always)]
    pub fn ip(self) -> u32 {
        self.0 & INTERRUPT_MASK
    }

    #[inline(always)]
    pub fn set_line(&mut self, line: Line, asserted: bool) {
        if asserted {
            self.0 |= line.bit();
        } else {
            self.0 &= !line.bit();
        }
    }

    /// Branch delay: the exception happened in a delay slot.
    #[inline(always)]
    pub fn bd(self) -> bool {
        self.0 & Self::BD != 0
    }

    #[inline(always)]
    pub fn set_bd(&mut self, value: bool) {
        if value {
            self.0 |= Self::BD;
        } else {
            self.0 &= !Self::BD;
        }
    }
}

/// The state of COP0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cop0 {
    regs: [u32; 32],
}

impl Default for Cop0 {
    fn default() -> Self {
        let mut regs = [0; 32];
        regs[reg::STATUS as usize] = RESET_STATUS;
        regs[reg::PRID as usize] = PRID;

        Self { regs }
    }
}

impl Cop0 {
    /// Reads a register as seen by `MFC0`.
    #[inline(always)]
    pub fn read(&self, index: u8) -> u32 {
        self.regs[usize::from(index & 0x1F)]
    }

    /// Writes a register as done by `MTC0`. Read-only registers ignore the write, and writing
    /// Compare acknowledges the timer interrupt.
    pub fn write(&mut self, index: u8, value: u32) {
        let index = index & 0x1F;
        match index {
            reg::PRID | reg::RANDOM | reg::BAD_VADDR => (),
            reg::CAUSE => {
                // only the interrupt lines' owners may change IP
                let keep = self.regs[reg::CAUSE as usize] & INTERRUPT_MASK;
                self.regs[reg::CAUSE as usize] = (value & !INTERRUPT_MASK) | keep;
            }
            reg::COMPARE => {
                self.regs[reg::COMPARE as usize] = value;
                self.cause_mut().set_line(Line::Timer, false);
            }
            _ => self.regs[usize::from(index)] = value,
        }
    }

    /// All registers, in index order.
    pub fn regs(&self) -> &[u32; 32] {
        &self.regs
    }

    pub fn restore(&mut self, regs: [u32; 32]) {
        self.regs = regs;
    }

    #[inline(always)]
    pub fn status(&self) -> Status {
        Status(self.regs[reg::STATUS as usize])
    }

    #[inline(always)]
    pub fn status_mut(&mut self) -> &mut Status {
        // SAFETY: Status is a transparent wrapper around u32
        unsafe { &mut *(&raw mut self.regs[reg::STATUS as usize]).cast::<Status>() }
    }

    #[inline(always)]
    pub fn cause(&self) -> Cause {
        Cause(self.regs[reg::CAUSE as usize])
    }

    #[inline(always)]
    pub fn cause_mut(&mut self) -> &mut Cause {
        // SAFETY: Cause is a transparent wrapper around u32
        unsafe { &mut *(&raw mut self.regs[reg::CAUSE as usize]).cast::<Cause>() }
    }

    #[inline(always)]
    pub fn epc(&self) -> Address {
        Address(self.regs[reg::EPC as usize])
    }

    #[inline(always)]
    pub fn error_epc(&self) -> Address {
        Address(self.regs[reg::ERROR_EPC as usize])
    }

    /// Records the faulting address of an address error.
    #[inline(always)]
    pub fn set_bad_vaddr(&mut self, addr: Address) {
        self.regs[reg::BAD_VADDR as usize] = addr.value();
    }

    #[inline(always)]
    pub fn count(&self) -> u32 {
        self.regs[reg::COUNT as usize]
    }

    #[inline(always)]
    pub fn compare(&self) -> u32 {
        self.regs[reg::COMPARE as usize]
    }

    /// Asserts or deasserts an interrupt line.
    #[inline(always)]
    pub fn set_line(&mut self, line: Line, asserted: bool) {
        self.cause_mut().set_line(line, asserted);
    }

    /// Whether an interrupt should be taken before the next instruction.
    #[inline(always)]
    pub fn interrupt_pending(&self) -> bool {
        let status = self.status();
        status.interrupts_enabled() && (self.cause().ip() & status.im()) != 0
    }

    /// Advances Count by the given number of cycles, asserting the timer line if it reaches
    /// Compare on the way.
    pub fn advance_count(&mut self, cycles: u64) {
        let count = self.count();
        let distance = self.compare().wrapping_sub(count);
        if distance != 0 && u64::from(distance) <= cycles {
            self.set_line(Line::Timer, true);
        }

        self.regs[reg::COUNT as usize] = count.wrapping_add(cycles as u32);
    }

    /// Records an exception and returns the address of its handler.
    ///
    /// `pc` is the address of the instruction that caused it (or that was about to execute, for
    /// interrupts). If it's in a delay slot, EPC points to the branch instead. EPC and BD are
    /// left alone if the EE is already at exception level.
    pub fn enter_exception(
        &mut self,
        exception: Exception,
        pc: Address,
        in_delay_slot: bool,
    ) -> Address {
        let status = self.status();
        if status.exl() {
            trace!(
                exception = <&str>::from(exception),
                epc = %self.epc(),
                "nested exception keeps EPC"
            );
        } else {
            let epc = if in_delay_slot { pc - 4u32 } else { pc };
            self.regs[reg::EPC as usize] = epc.value();
            self.cause_mut().set_bd(in_delay_slot);
        }

        self.cause_mut().set_exception(exception);
        self.status_mut().set_exl(true);

        let base = if status.bev() {
            VECTOR_BASE_BOOTSTRAP
        } else {
            VECTOR_BASE
        };

        base + exception.vector_offset()
    }

    /// Leaves the current exception level and returns where to resume.
    pub fn exception_return(&mut self) -> Address {
        if self.status().erl() {
            self.status_mut().set_erl(false);
            self.error_epc()
        } else {
            self.status_mut().set_exl(false);
            self.epc()
        }
    }

    /// Sets Status.EIE as done by `EI`/`DI`. Returns `false` if not permitted in the current
    /// mode, in which case nothing changes.
    pub fn set_master_enable(&mut self, enabled: bool) -> bool {
        let status = self.status();
        if status.edi() || status.is_kernel() {
            self.status_mut().set_eie(enabled);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled() -> Cop0 {
        let mut cop0 = Cop0::default();
        // IE, EIE, IM2
        cop0.write(reg::STATUS, 0x0001_0401);
        cop0
    }

    #[test]
    fn reset_values() {
        let cop0 = Cop0::default();
        assert_eq!(cop0.read(reg::PRID), 0x2E20);
        assert!(cop0.status().bev());
        assert!(cop0.status().erl());
        assert!(!cop0.interrupt_pending());
    }

    #[test]
    fn prid_is_read_only() {
        let mut cop0 = Cop0::default();
        cop0.write(reg::PRID, 0);
        assert_eq!(cop0.read(reg::PRID), PRID);
    }

    #[test]
    fn interrupt_requires_every_enable() {
        let mut cop0 = enabled();
        assert!(!cop0.interrupt_pending());

        cop0.set_line(Line::Int0, true);
        assert!(cop0.interrupt_pending());

        // masked line
        cop0.set_line(Line::Int0, false);
        cop0.set_line(Line::Int1, true);
        assert!(!cop0.interrupt_pending());

        cop0.set_line(Line::Int0, true);
        cop0.status_mut().set_exl(true);
        assert!(!cop0.interrupt_pending());

        cop0.status_mut().set_exl(false);
        cop0.status_mut().set_eie(false);
        assert!(!cop0.interrupt_pending());
    }

    #[test]
    fn exception_entry_and_return() {
        let mut cop0 = enabled();
        let vector = cop0.enter_exception(Exception::Syscall, Address(0x8000_1000), false);

        assert_eq!(vector, Address(0x8000_0180));
        assert_eq!(cop0.epc(), Address(0x8000_1000));
        assert_eq!(cop0.cause().exception(), Some(Exception::Syscall));
        assert!(cop0.status().exl());
        assert!(!cop0.cause().bd());

        assert_eq!(cop0.exception_return(), Address(0x8000_1000));
        assert!(!cop0.status().exl());
    }

    #[test]
    fn delay_slot_exception_points_at_branch() {
        let mut cop0 = enabled();
        let vector = cop0.enter_exception(Exception::Interrupt, Address(0x8000_1004), true);

        assert_eq!(vector, Address(0x8000_0200));
        assert_eq!(cop0.epc(), Address(0x8000_1000));
        assert!(cop0.cause().bd());
    }

    #[test]
    fn nested_exception_keeps_epc() {
        let mut cop0 = enabled();
        cop0.enter_exception(Exception::Syscall, Address(0x100), false);
        cop0.enter_exception(Exception::Breakpoint, Address(0x200), false);

        assert_eq!(cop0.epc(), Address(0x100));
        assert_eq!(cop0.cause().exception(), Some(Exception::Breakpoint));
    }

    #[test]
    fn bootstrap_vectors() {
        let mut cop0 = Cop0::default();
        assert_eq!(
            cop0.enter_exception(Exception::Overflow, Address(0xBFC0_0010), false),
            Address(0xBFC0_0380)
        );
        assert_eq!(
            cop0.enter_exception(Exception::Interrupt, Address(0xBFC0_0010), false),
            Address(0xBFC0_0400)
        );
    }

    #[test]
    fn eret_prefers_error_epc() {
        let mut cop0 = Cop0::default();
        cop0.write(reg::ERROR_EPC, 0x1234);
        cop0.write(reg::EPC, 0x5678);

        assert_eq!(cop0.exception_return(), Address(0x1234));
        assert!(!cop0.status().erl());
    }

    #[test]
    fn count_reaching_compare() {
        let mut cop0 = enabled();
        cop0.write(reg::STATUS, cop0.status().0 | Line::Timer.bit());
        cop0.write(reg::COMPARE, 100);

        cop0.advance_count(99);
        assert!(!cop0.interrupt_pending());

        cop0.advance_count(1);
        assert!(cop0.interrupt_pending());
        assert_eq!(cop0.count(), 100);

        cop0.write(reg::COMPARE, 50);
        assert!(!cop0.interrupt_pending());
    }

    #[test]
    fn ei_di_need_privilege() {
        let mut cop0 = Cop0::default();
        cop0.write(reg::STATUS, 0);
        assert!(cop0.set_master_enable(true));
        assert!(cop0.status().eie());

        // user mode without EDI
        cop0.write(reg::STATUS, 2 << 3);
        assert!(!cop0.set_master_enable(true));
        assert!(!cop0.status().eie());
    }
}
