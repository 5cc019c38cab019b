//! Items related to the EE interrupt controller (INTC).

use strum::{FromRepr, IntoStaticStr, VariantArray};
use tracing::trace;

/// An EE interrupt source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, VariantArray, IntoStaticStr)]
pub enum Interrupt {
    Gs = 0x00,
    Sbus = 0x01,
    VblankStart = 0x02,
    VblankEnd = 0x03,
    Vif0 = 0x04,
    Vif1 = 0x05,
    Vu0 = 0x06,
    Vu1 = 0x07,
    Ipu = 0x08,
    Timer0 = 0x09,
    Timer1 = 0x0A,
    Timer2 = 0x0B,
    Timer3 = 0x0C,
    Sfifo = 0x0D,
    Vu0Watchdog = 0x0E,
}

impl Interrupt {
    /// The bit of this interrupt in `INTC_STAT` and `INTC_MASK`.
    #[inline(always)]
    pub const fn bit(self) -> u32 {
        1 << self as u32
    }
}

/// Only the low 15 bits of the INTC registers are implemented.
const VALID_BITS: u32 = 0x7FFF;

/// Register which contains which interrupts are currently pending (`INTC_STAT`).
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct Status(u32);

impl std::fmt::Debug for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set()
            .entries(
                Interrupt::VARIANTS
                    .iter()
                    .filter(|interrupt| self.is_requested(**interrupt)),
            )
            .finish()
    }
}

impl Status {
    #[inline(always)]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits & VALID_BITS)
    }

    #[inline(always)]
    pub const fn to_bits(self) -> u32 {
        self.0
    }

    /// Requests the given interrupt.
    #[inline(always)]
    pub fn request(&mut self, interrupt: Interrupt) {
        self.0 |= interrupt.bit();
    }

    /// Acknowledges every interrupt whose bit is set in `value`.
    #[inline(always)]
    pub fn acknowledge(&mut self, value: u32) {
        self.0 &= !value;
    }

    #[inline(always)]
    pub const fn is_requested(self, interrupt: Interrupt) -> bool {
        self.0 & interrupt.bit() != 0
    }

    /// Returns a [`Status`] masked with the given [`Mask`].
    #[inline(always)]
    pub const fn mask(self, mask: Mask) -> Self {
        Self(self.0 & mask.0)
    }

    /// Returns the lowest requested [`Interrupt`], if any.
    #[inline(always)]
    pub fn requested(self) -> Option<Interrupt> {
        Interrupt::from_repr(self.0.trailing_zeros() as usize)
    }
}

/// Register which contains which interrupts are allowed to reach the CPU (`INTC_MASK`).
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct Mask(u32);

impl std::fmt::Debug for Mask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set()
            .entries(
                Interrupt::VARIANTS
                    .iter()
                    .filter(|interrupt| self.is_enabled(**interrupt)),
            )
            .finish()
    }
}

impl Mask {
    #[inline(always)]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits & VALID_BITS)
    }

    #[inline(always)]
    pub const fn to_bits(self) -> u32 {
        self.0
    }

    /// Flips every bit set in `value`.
    #[inline(always)]
    pub fn toggle(&mut self, value: u32) {
        self.0 = (self.0 ^ value) & VALID_BITS;
    }

    #[inline(always)]
    pub const fn is_enabled(self, interrupt: Interrupt) -> bool {
        self.0 & interrupt.bit() != 0
    }
}

/// The state of the interrupt controller.
#[derive(Debug, Clone, Default)]
pub struct Controller {
    pub status: Status,
    pub mask: Mask,
}

impl Controller {
    /// Handles a write to `INTC_STAT`: every bit set in `value` is acknowledged.
    pub fn write_status(&mut self, value: u32) {
        self.status.acknowledge(value);
        trace!(status = ?self.status, "acknowledged 0x{value:04X}");
    }

    /// Handles a write to `INTC_MASK`: every bit set in `value` is toggled.
    pub fn write_mask(&mut self, value: u32) {
        self.mask.toggle(value);
        trace!(mask = ?self.mask, "toggled 0x{value:04X}");
    }

    /// Whether the controller is driving the INT0 line of the CPU.
    #[inline(always)]
    pub fn pending(&self) -> bool {
        self.status.mask(self.mask).to_bits() != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stat_is_write_one_to_clear() {
        let mut intc = Controller::default();
        intc.status.request(Interrupt::VblankStart);
        intc.status.request(Interrupt::Timer0);

        intc.write_status(Interrupt::VblankStart.bit());
        assert!(!intc.status.is_requested(Interrupt::VblankStart));
        assert!(intc.status.is_requested(Interrupt::Timer0));
    }

    #[test]
    fn mask_is_write_one_to_toggle() {
        let mut intc = Controller::default();
        intc.write_mask(0b101);
        assert_eq!(intc.mask.to_bits(), 0b101);

        intc.write_mask(0b001);
        assert_eq!(intc.mask.to_bits(), 0b100);
    }

    #[test]
    fn pending_needs_both() {
        let mut intc = Controller::default();
        intc.status.request(Interrupt::Gs);
        assert!(!intc.pending());

        intc.write_mask(Interrupt::Gs.bit());
        assert!(intc.pending());
        assert_eq!(intc.status.requested(), Some(Interrupt::Gs));
    }
}
