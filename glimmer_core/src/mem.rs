//! Items related to the memory of the PS2.

pub mod io;

mod primitive;

use crate::util;

pub use primitive::{Primitive, PrimitiveRw};

/// A memory segment of the EE's virtual address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    /// Kernel User SEGment
    ///
    /// The only segment accessible in user mode. Mapped through the TLB on real hardware; here
    /// it mirrors the physical bus, with the exception of the scratchpad window.
    KUSEG,
    /// Kernel SEGment 0
    ///
    /// Maps to the physical memory directly, utilizing the cache.
    KSEG0,
    /// Kernel SEGment 1
    ///
    /// Maps to the physical memory directly and does not utilize the cache.
    KSEG1,
    /// Supervisor SEGment
    KSSEG,
    /// Kernel SEGment 3
    KSEG3,
}

impl Segment {
    #[inline(always)]
    pub const fn start(&self) -> Address {
        match self {
            Segment::KUSEG => Address(0x0000_0000),
            Segment::KSEG0 => Address(0x8000_0000),
            Segment::KSEG1 => Address(0xA000_0000),
            Segment::KSSEG => Address(0xC000_0000),
            Segment::KSEG3 => Address(0xE000_0000),
        }
    }

    /// Whether accesses through this segment go through the caches.
    #[inline(always)]
    pub const fn is_cached(&self) -> bool {
        !matches!(self, Segment::KSEG1)
    }
}

/// A contiguous window of the physical bus owned by a single device.
///
/// Windows never overlap. The order of [`Region::ALL`] is the order in which the bus tests
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// Main RAM (RDRAM).
    Ram,
    /// The IOP's RAM, as seen from the EE.
    IopRam,
    /// EE timers.
    Timers,
    /// Privileged GS registers.
    GsPrivileged,
    /// DMA controller channel registers.
    Dmac,
    Vu0Code,
    Vu0Data,
    Vu1Code,
    Vu1Data,
    /// BIOS ROM.
    BIOS,
}

#[expect(clippy::len_without_is_empty, reason = "not a collection")]
impl Region {
    pub const ALL: [Region; 10] = [
        Region::Ram,
        Region::IopRam,
        Region::Timers,
        Region::GsPrivileged,
        Region::Dmac,
        Region::Vu0Code,
        Region::Vu0Data,
        Region::Vu1Code,
        Region::Vu1Data,
        Region::BIOS,
    ];

    /// The start of this region.
    #[inline(always)]
    pub const fn start(&self) -> PhysicalAddress {
        // SAFETY: the addresses are in the physical range
        unsafe {
            PhysicalAddress::new_unchecked(match self {
                Region::Ram => 0x0000_0000,
                Region::IopRam => 0x1C00_0000,
                Region::Timers => 0x1000_0000,
                Region::GsPrivileged => 0x1200_0000,
                Region::Dmac => 0x1000_8000,
                Region::Vu0Code => 0x1100_0000,
                Region::Vu0Data => 0x1100_4000,
                Region::Vu1Code => 0x1100_8000,
                Region::Vu1Data => 0x1100_C000,
                Region::BIOS => 0x1FC0_0000,
            })
        }
    }

    /// The length of this region, in bytes.
    #[inline(always)]
    pub const fn len(&self) -> u32 {
        match self {
            Region::Ram => 32 * bytesize::MIB as u32,
            Region::IopRam => 2 * bytesize::MIB as u32,
            Region::Timers => 8 * bytesize::KIB as u32,
            Region::GsPrivileged => 16 * bytesize::MIB as u32,
            Region::Dmac => 28 * bytesize::KIB as u32,
            Region::Vu0Code | Region::Vu0Data | Region::Vu1Code | Region::Vu1Data => {
                16 * bytesize::KIB as u32
            }
            Region::BIOS => 4 * bytesize::MIB as u32,
        }
    }

    /// Whether the given address lies inside this region.
    #[inline(always)]
    pub const fn contains(&self, addr: PhysicalAddress) -> bool {
        let start = self.start().value();
        addr.value() >= start && addr.value() - start < self.len()
    }
}

/// The I/O processor's address space, as seen from the EE. Writes that land here and are not
/// claimed by any other route are dropped.
pub const IOP_SPACE: std::ops::Range<u32> = 0x1A00_0000..0x1FC0_0000;

/// Size of the EE scratchpad, in bytes.
pub const SCRATCHPAD_LEN: u32 = 16 * bytesize::KIB as u32;

/// A physical memory address. This is a thin wrapper around a [`u32`], with the extra guarantee
/// that it's in the `0x0000_0000..0x2000_0000` range (512 MiB).
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PhysicalAddress(u32);

impl std::fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "0x{:04X}_{:04X}",
            (self.0 & 0xFFFF_0000) >> 16,
            self.0 & 0xFFFF
        )
    }
}

impl std::fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

impl PhysicalAddress {
    /// Creates a new [`PhysicalAddress`] from an absolute address.
    #[inline(always)]
    pub const fn new(address: u32) -> Option<Self> {
        if address < 0x2000_0000 {
            Some(Self(address))
        } else {
            None
        }
    }

    /// Creates a new [`PhysicalAddress`] by discarding the upper 3 bits of `address`.
    #[inline(always)]
    pub const fn masked(address: u32) -> Self {
        Self(address & 0x1FFF_FFFF)
    }

    /// Creates a new [`PhysicalAddress`] from an absolute address, without checking.
    ///
    /// # Safety
    /// `address` must be in the `0x0000_0000..0x2000_0000` range.
    #[inline(always)]
    pub const unsafe fn new_unchecked(address: u32) -> Self {
        debug_assert!(address < 0x2000_0000);
        Self(address)
    }

    #[inline(always)]
    pub const fn value(&self) -> u32 {
        let value = self.0;

        // SAFETY: this is an invariant of this type
        unsafe { std::hint::assert_unchecked(value < 0x2000_0000) };
        value
    }

    /// Returns `true` if this address is aligned to the given alignment.
    #[inline(always)]
    pub const fn is_aligned(self, alignment: u32) -> bool {
        self.0 % alignment == 0
    }

    /// Returns the region this address is in, together with the offset into it.
    #[inline(always)]
    pub fn region(&self) -> Option<(Region, u32)> {
        Region::ALL
            .iter()
            .find(|region| region.contains(*self))
            .map(|region| (*region, self.value() - region.start().value()))
    }
}

/// Where a virtual address of the EE ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mapping {
    /// An offset into the scratchpad.
    Scratchpad(u32),
    /// An address on the physical bus.
    Physical(PhysicalAddress),
}

/// A virtual memory address. This is a thin wrapper around a [`u32`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Address(pub u32);

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "0x{:04X}_{:04X}",
            (self.0 & 0xFFFF_0000) >> 16,
            self.0 & 0xFFFF
        )
    }
}

impl std::fmt::Debug for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

impl Address {
    /// Start of the scratchpad window.
    pub const SCRATCHPAD: Address = Address(0x7000_0000);

    /// Returns the value of this address. Equivalent to `self.0`.
    #[inline(always)]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Returns `true` if this address is aligned to the given alignment.
    #[inline(always)]
    pub const fn is_aligned(self, alignment: u32) -> bool {
        self.0 % alignment == 0
    }

    /// Returns the segment of this address.
    #[inline(always)]
    pub const fn segment(self) -> Segment {
        match self.0 {
            0x0000_0000..=0x7FFF_FFFF => Segment::KUSEG,
            0x8000_0000..=0x9FFF_FFFF => Segment::KSEG0,
            0xA000_0000..=0xBFFF_FFFF => Segment::KSEG1,
            0xC000_0000..=0xDFFF_FFFF => Segment::KSSEG,
            0xE000_0000..=0xFFFF_FFFF => Segment::KSEG3,
        }
    }

    /// Returns where this virtual address maps to.
    ///
    /// The scratchpad window is served by the CPU itself. Everything else is a mirror of the
    /// physical bus in the low 512 MiB.
    #[inline(always)]
    pub const fn mapping(self) -> Mapping {
        let offset = self.0.wrapping_sub(Self::SCRATCHPAD.0);
        if offset < SCRATCHPAD_LEN {
            Mapping::Scratchpad(offset)
        } else {
            Mapping::Physical(PhysicalAddress::masked(self.0))
        }
    }
}

impl std::ops::Add<u32> for Address {
    type Output = Self;

    fn add(self, rhs: u32) -> Self::Output {
        Self(self.0.wrapping_add(rhs))
    }
}

impl std::ops::Add<i32> for Address {
    type Output = Self;

    fn add(self, rhs: i32) -> Self::Output {
        Self(self.0.wrapping_add_signed(rhs))
    }
}

impl std::ops::Sub<u32> for Address {
    type Output = Self;

    fn sub(self, rhs: u32) -> Self::Output {
        Self(self.0.wrapping_sub(rhs))
    }
}

impl PartialEq<u32> for Address {
    fn eq(&self, other: &u32) -> bool {
        self.0 == *other
    }
}

pub type BoxedU8Arr<const LEN: usize> = Box<[u8; LEN]>;

/// Collection of memory components owned by the machine: RAM, the scratchpad, the IOP's RAM
/// and the BIOS.
pub struct Memory {
    /// Main RAM.
    pub ram: BoxedU8Arr<{ Region::Ram.len() as usize }>,
    /// Scratchpad, private to the EE.
    pub scratchpad: BoxedU8Arr<{ SCRATCHPAD_LEN as usize }>,
    /// IOP RAM, shared with the I/O processor.
    pub iop_ram: BoxedU8Arr<{ Region::IopRam.len() as usize }>,
    /// BIOS ROM.
    pub bios: BoxedU8Arr<{ Region::BIOS.len() as usize }>,
    /// Kernel STDOUT, as written through the EE's console port.
    pub kernel_stdout: String,
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memory").finish_non_exhaustive()
    }
}

impl Memory {
    /// Creates a new [`Memory`] with zeroed contents and the given BIOS ROM.
    ///
    /// # Errors
    /// If the bios is larger than 4 MiB, it's too big to fit and so [`Err`] is returned with
    /// the given bios.
    pub fn with_bios(bios: Vec<u8>) -> Result<Self, Vec<u8>> {
        if bios.len() > Region::BIOS.len() as usize {
            return Err(bios);
        }

        let mut rom = util::boxed_array(0);
        rom[..bios.len()].copy_from_slice(&bios);

        Ok(Self {
            ram: util::boxed_array(0),
            scratchpad: util::boxed_array(0),
            iop_ram: util::boxed_array(0),
            bios: rom,
            kernel_stdout: String::new(),
        })
    }

    /// Zeroes every writable memory. The BIOS is kept.
    pub fn clear(&mut self) {
        self.ram.fill(0);
        self.scratchpad.fill(0);
        self.iop_ram.fill(0);
        self.kernel_stdout.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regions_do_not_overlap() {
        for (i, a) in Region::ALL.iter().enumerate() {
            for b in &Region::ALL[i + 1..] {
                let a_end = a.start().value() + a.len();
                let b_end = b.start().value() + b.len();
                assert!(
                    a_end <= b.start().value() || b_end <= a.start().value(),
                    "{a:?} overlaps {b:?}"
                );
            }
        }
    }

    #[test]
    fn region_lookup() {
        let addr = PhysicalAddress::new(0x1100_4010).unwrap();
        assert_eq!(addr.region(), Some((Region::Vu0Data, 0x10)));

        let addr = PhysicalAddress::new(0x1200_1000).unwrap();
        assert_eq!(addr.region(), Some((Region::GsPrivileged, 0x1000)));

        let addr = PhysicalAddress::new(0x1000_F000).unwrap();
        assert_eq!(addr.region(), None);
    }

    #[test]
    fn mapping() {
        assert_eq!(Address(0x7000_0010).mapping(), Mapping::Scratchpad(0x10));
        assert_eq!(
            Address(0xBFC0_0000).mapping(),
            Mapping::Physical(PhysicalAddress::new(0x1FC0_0000).unwrap())
        );
        assert_eq!(
            Address(0x7000_4000).mapping(),
            Mapping::Physical(PhysicalAddress::new(0x1000_4000).unwrap())
        );
    }

    #[test]
    fn bios_too_big() {
        let bios = vec![0; Region::BIOS.len() as usize + 1];
        assert!(Memory::with_bios(bios).is_err());
    }
}
