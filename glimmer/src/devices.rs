//! Interfaces of the units the bus delegates to but which are emulated elsewhere: the GS, the
//! DMA controller, the vector units, the IOP and the smaller EE peripherals.
//!
//! Every interface comes with a null implementation which logs accesses and reads zero, so that
//! the EE can run on its own.

use crate::{PS2, scheduler::Scheduler};
use glimmer_core::{
    interlock::Interlock,
    interrupts::Controller as InterruptController,
    mem::{PhysicalAddress, Primitive, PrimitiveRw},
};
use tracing::{debug, trace};

/// What a unit may touch while running.
pub struct Hooks<'a> {
    pub scheduler: &'a mut Scheduler<PS2>,
    pub interrupts: &'a mut InterruptController,
    /// A VU0 micro program reaching its synchronization point requests the
    /// [`Side::Vu`](glimmer_core::interlock::Side::Vu) half of the interlock here.
    pub interlock: &'a mut Interlock,
}

#[inline(always)]
fn word_aligned(addr: PhysicalAddress) -> PhysicalAddress {
    PhysicalAddress::masked(addr.value() & !3)
}

#[inline(always)]
fn lane_shift(addr: PhysicalAddress) -> u32 {
    (addr.value() & 3) * 8
}

/// A memory mapped unit.
///
/// Only word accesses are required. Narrower reads pick their lane out of the containing word,
/// narrower writes are forwarded zero extended and wider accesses are split into words.
pub trait Device: Send {
    fn name(&self) -> &'static str;

    fn reset(&mut self) {}

    /// Advances this unit by `cycles` of its own clock.
    fn run(&mut self, cycles: u64, hooks: &mut Hooks<'_>) {
        _ = (cycles, hooks);
    }

    fn read32(&mut self, addr: PhysicalAddress) -> u32;
    fn write32(&mut self, addr: PhysicalAddress, value: u32);

    fn read8(&mut self, addr: PhysicalAddress) -> u8 {
        (self.read32(word_aligned(addr)) >> lane_shift(addr)) as u8
    }

    fn read16(&mut self, addr: PhysicalAddress) -> u16 {
        (self.read32(word_aligned(addr)) >> lane_shift(addr)) as u16
    }

    fn read64(&mut self, addr: PhysicalAddress) -> u64 {
        let low = self.read32(addr);
        let high = self.read32(PhysicalAddress::masked(addr.value() + 4));
        u64::from(low) | (u64::from(high) << 32)
    }

    fn read128(&mut self, addr: PhysicalAddress) -> u128 {
        let low = self.read64(addr);
        let high = self.read64(PhysicalAddress::masked(addr.value() + 8));
        u128::from(low) | (u128::from(high) << 64)
    }

    fn write8(&mut self, addr: PhysicalAddress, value: u8) {
        self.write32(addr, u32::from(value));
    }

    fn write16(&mut self, addr: PhysicalAddress, value: u16) {
        self.write32(addr, u32::from(value));
    }

    fn write64(&mut self, addr: PhysicalAddress, value: u64) {
        self.write32(addr, value as u32);
        self.write32(PhysicalAddress::masked(addr.value() + 4), (value >> 32) as u32);
    }

    fn write128(&mut self, addr: PhysicalAddress, value: u128) {
        self.write64(addr, value as u64);
        self.write64(PhysicalAddress::masked(addr.value() + 8), (value >> 64) as u64);
    }
}

/// The graphics synthesizer, as seen through its privileged registers.
pub trait GraphicsSynthesizer: Device {
    /// Wakes the rendering worker up after a register write.
    fn wake(&mut self);
    /// Start (`true`) or end (`false`) of vertical blanking.
    fn vblank(&mut self, start: bool);
    fn hblank(&mut self);
    /// The delayed vsync that follows a vblank start.
    fn vsync(&mut self);
}

/// The EE DMA controller.
pub trait DmaController: Device {
    /// The value of `D_ENABLER`.
    fn master_disable(&self) -> u32;
    /// A write to `D_ENABLEW`.
    fn set_master_disable(&mut self, value: u32);
    /// Whether the controller drives the INT1 line of the EE.
    fn int1_pending(&self) -> bool;
    /// The COP0 condition, as tested by `BC0F`/`BC0T`.
    fn cpcond0(&self) -> bool;
}

/// A vector unit. Its micro memories are mapped on the bus; its registers are reachable from
/// the EE's COP2 instructions (VU0 only).
pub trait VectorUnit: Send {
    fn name(&self) -> &'static str;
    fn reset(&mut self);
    fn run(&mut self, cycles: u64, hooks: &mut Hooks<'_>);

    fn code(&self) -> &[u8];
    fn code_mut(&mut self) -> &mut [u8];
    fn data(&self) -> &[u8];
    fn data_mut(&mut self) -> &mut [u8];

    /// Whether a micro program is currently running.
    fn is_running(&self) -> bool;
    fn start_program(&mut self, addr: u32);

    fn read_vf(&self, index: u8) -> u128;
    fn write_vf(&mut self, index: u8, value: u128);
    fn read_vi(&self, index: u8) -> u32;
    fn write_vi(&mut self, index: u8, value: u32);

    /// Executes a COP2 macro mode instruction.
    fn macro_op(&mut self, instr: u32);
}

/// The I/O processor.
pub trait IoProcessor: Send {
    fn reset(&mut self);
    fn run(&mut self, cycles: u64, hooks: &mut Hooks<'_>);
    /// Asserts an IOP interrupt line.
    fn raise_interrupt(&mut self, irq: u8);
}

/// A unit which is not emulated: reads are zero, writes are ignored.
#[derive(Debug, Clone, Copy)]
pub struct NullDevice {
    name: &'static str,
}

impl NullDevice {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl Device for NullDevice {
    fn name(&self) -> &'static str {
        self.name
    }

    fn read32(&mut self, addr: PhysicalAddress) -> u32 {
        debug!(device = self.name, "read from {addr}");
        0
    }

    fn write32(&mut self, addr: PhysicalAddress, value: u32) {
        debug!(device = self.name, "write 0x{value:08X} to {addr}");
    }
}

#[derive(Debug, Default)]
pub struct NullGs {
    pub vblank: bool,
    pub wakes: u64,
}

impl Device for NullGs {
    fn name(&self) -> &'static str {
        "gs"
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    fn read32(&mut self, addr: PhysicalAddress) -> u32 {
        trace!("gs read from {addr}");
        0
    }

    fn write32(&mut self, addr: PhysicalAddress, value: u32) {
        trace!("gs write 0x{value:08X} to {addr}");
    }

    fn write64(&mut self, addr: PhysicalAddress, value: u64) {
        trace!("gs write 0x{value:016X} to {addr}");
    }
}

impl GraphicsSynthesizer for NullGs {
    fn wake(&mut self) {
        self.wakes += 1;
    }

    fn vblank(&mut self, start: bool) {
        self.vblank = start;
    }

    fn hblank(&mut self) {}

    fn vsync(&mut self) {}
}

/// Initial value of `D_ENABLER`.
const DEFAULT_MASTER_DISABLE: u32 = 0x1201;

#[derive(Debug)]
pub struct NullDmac {
    master_disable: u32,
}

impl Default for NullDmac {
    fn default() -> Self {
        Self {
            master_disable: DEFAULT_MASTER_DISABLE,
        }
    }
}

impl Device for NullDmac {
    fn name(&self) -> &'static str {
        "dmac"
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    fn read32(&mut self, addr: PhysicalAddress) -> u32 {
        debug!("dmac read from {addr}");
        0
    }

    fn write32(&mut self, addr: PhysicalAddress, value: u32) {
        debug!("dmac write 0x{value:08X} to {addr}");
    }
}

impl DmaController for NullDmac {
    fn master_disable(&self) -> u32 {
        self.master_disable
    }

    fn set_master_disable(&mut self, value: u32) {
        self.master_disable = value;
    }

    fn int1_pending(&self) -> bool {
        false
    }

    fn cpcond0(&self) -> bool {
        // no transfer is ever in flight
        true
    }
}

/// A vector unit that never runs a micro program. Its memories and registers behave as plain
/// storage.
#[derive(Debug)]
pub struct NullVu {
    name: &'static str,
    code: Vec<u8>,
    data: Vec<u8>,
    vf: [u128; 32],
    vi: [u32; 16],
}

impl NullVu {
    pub fn new(name: &'static str, code_len: usize, data_len: usize) -> Self {
        Self {
            name,
            code: vec![0; code_len],
            data: vec![0; data_len],
            vf: [0; 32],
            vi: [0; 16],
        }
    }

    /// VU0: 4 KiB of code and data memory.
    pub fn vu0() -> Self {
        Self::new("vu0", 4 * 1024, 4 * 1024)
    }

    /// VU1: 16 KiB of code and data memory.
    pub fn vu1() -> Self {
        Self::new("vu1", 16 * 1024, 16 * 1024)
    }
}

impl VectorUnit for NullVu {
    fn name(&self) -> &'static str {
        self.name
    }

    fn reset(&mut self) {
        self.code.fill(0);
        self.data.fill(0);
        self.vf = [0; 32];
        self.vi = [0; 16];
    }

    fn run(&mut self, _: u64, _: &mut Hooks<'_>) {}

    fn code(&self) -> &[u8] {
        &self.code
    }

    fn code_mut(&mut self) -> &mut [u8] {
        &mut self.code
    }

    fn data(&self) -> &[u8] {
        &self.data
    }

    fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    fn is_running(&self) -> bool {
        false
    }

    fn start_program(&mut self, addr: u32) {
        debug!(vu = self.name, "ignoring micro program start at 0x{addr:04X}");
    }

    fn read_vf(&self, index: u8) -> u128 {
        self.vf[index as usize % 32]
    }

    fn write_vf(&mut self, index: u8, value: u128) {
        // VF00 is constant
        if index % 32 != 0 {
            self.vf[index as usize % 32] = value;
        }
    }

    fn read_vi(&self, index: u8) -> u32 {
        self.vi[index as usize % 16]
    }

    fn write_vi(&mut self, index: u8, value: u32) {
        if index % 16 != 0 {
            self.vi[index as usize % 16] = value & 0xFFFF;
        }
    }

    fn macro_op(&mut self, instr: u32) {
        trace!(vu = self.name, "ignoring macro instruction 0x{instr:08X}");
    }
}

/// An IOP that only keeps track of the interrupts raised on it.
#[derive(Debug, Default)]
pub struct NullIop {
    pub pending: u32,
}

impl IoProcessor for NullIop {
    fn reset(&mut self) {
        self.pending = 0;
    }

    fn run(&mut self, _: u64, _: &mut Hooks<'_>) {}

    fn raise_interrupt(&mut self, irq: u8) {
        self.pending |= 1 << (irq % 32);
    }
}

/// The units surrounding the EE.
pub struct Peripherals {
    pub gs: Box<dyn GraphicsSynthesizer>,
    pub dmac: Box<dyn DmaController>,
    pub vu0: Box<dyn VectorUnit>,
    pub vu1: Box<dyn VectorUnit>,
    pub iop: Box<dyn IoProcessor>,
    pub iop_dma: Box<dyn Device>,
    pub timers: Box<dyn Device>,
    pub ipu: Box<dyn Device>,
    pub gif: Box<dyn Device>,
    pub vif0: Box<dyn Device>,
    pub vif1: Box<dyn Device>,
    pub cdvd: Box<dyn Device>,
}

impl std::fmt::Debug for Peripherals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peripherals").finish_non_exhaustive()
    }
}

impl Default for Peripherals {
    fn default() -> Self {
        Self {
            gs: Box::new(NullGs::default()),
            dmac: Box::new(NullDmac::default()),
            vu0: Box::new(NullVu::vu0()),
            vu1: Box::new(NullVu::vu1()),
            iop: Box::new(NullIop::default()),
            iop_dma: Box::new(NullDevice::new("iop_dma")),
            timers: Box::new(NullDevice::new("timers")),
            ipu: Box::new(NullDevice::new("ipu")),
            gif: Box::new(NullDevice::new("gif")),
            vif0: Box::new(NullDevice::new("vif0")),
            vif1: Box::new(NullDevice::new("vif1")),
            cdvd: Box::new(NullDevice::new("cdvd")),
        }
    }
}

impl Peripherals {
    pub fn reset(&mut self) {
        self.gs.reset();
        self.dmac.reset();
        self.vu0.reset();
        self.vu1.reset();
        self.iop.reset();
        self.iop_dma.reset();
        self.timers.reset();
        self.ipu.reset();
        self.gif.reset();
        self.vif0.reset();
        self.vif1.reset();
        self.cdvd.reset();
    }
}

/// Reads a primitive out of a vector unit memory. The window mirrors the memory; an empty
/// memory reads as zero.
#[inline(always)]
pub(crate) fn read_mirrored<P>(mem: &[u8], offset: u32) -> P
where
    P: Primitive,
{
    let Some(offset) = (offset as usize).checked_rem(mem.len()) else {
        return P::default();
    };

    mem[offset..].read()
}

/// Writes a primitive into a vector unit memory. The window mirrors the memory; writes to an
/// empty memory are dropped.
#[inline(always)]
pub(crate) fn write_mirrored<P>(mem: &mut [u8], offset: u32, value: P)
where
    P: Primitive,
{
    if let Some(offset) = (offset as usize).checked_rem(mem.len()) {
        mem[offset..].write(value);
    }
}
