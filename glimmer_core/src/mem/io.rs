//! Items related to the individually addressed, memory mapped registers of the EE bus.

use super::PhysicalAddress;
use strum::{IntoStaticStr, VariantArray};

/// A memory mapped register matched by its exact address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, VariantArray, IntoStaticStr)]
pub enum Reg {
    // IPU
    IpuCommand,
    IpuControl,
    IpuBitPointer,
    IpuTop,

    // GIF
    GifControl,
    GifMode,
    GifStatus,

    // VIF0
    Vif0Status,
    Vif0ForceBreak,
    Vif0Error,
    Vif0Mark,
    Vif0Mode,
    Vif0Row0,
    Vif0Row1,
    Vif0Row2,
    Vif0Row3,

    // VIF1
    Vif1Status,
    Vif1ForceBreak,
    Vif1Error,
    Vif1Mark,
    Vif1Mode,
    Vif1Code,
    Vif1Top,
    Vif1Row0,
    Vif1Row1,
    Vif1Row2,
    Vif1Row3,

    // FIFOs
    Vif0Fifo,
    Vif1Fifo,
    GifFifo,
    IpuInFifo,

    // Interrupt
    InterruptStatus,
    InterruptMask,

    // SIO
    SioStatus,
    SioTransmit,

    // Subsystem interface
    SifMainCommand,
    SifSubCommand,
    SifMainFlag,
    SifSubFlag,
    SifControl,

    // Memory controller
    MchRicm,
    MchDrd,

    // DMA
    DmaEnableRead,
    DmaEnableWrite,

    // IOP space
    IopProbe,
    CdvdDiscType,
    CdvdSStatus,
    CdvdSData,
}

impl Reg {
    /// Returns the address of this register.
    pub const fn address(self) -> PhysicalAddress {
        let addr = match self {
            Reg::IpuCommand => 0x1000_2000,
            Reg::IpuControl => 0x1000_2010,
            Reg::IpuBitPointer => 0x1000_2020,
            Reg::IpuTop => 0x1000_2030,

            Reg::GifControl => 0x1000_3000,
            Reg::GifMode => 0x1000_3010,
            Reg::GifStatus => 0x1000_3020,

            Reg::Vif0Status => 0x1000_3800,
            Reg::Vif0ForceBreak => 0x1000_3810,
            Reg::Vif0Error => 0x1000_3820,
            Reg::Vif0Mark => 0x1000_3830,
            Reg::Vif0Mode => 0x1000_3850,
            Reg::Vif0Row0 => 0x1000_3900,
            Reg::Vif0Row1 => 0x1000_3910,
            Reg::Vif0Row2 => 0x1000_3920,
            Reg::Vif0Row3 => 0x1000_3930,

            Reg::Vif1Status => 0x1000_3C00,
            Reg::Vif1ForceBreak => 0x1000_3C10,
            Reg::Vif1Error => 0x1000_3C20,
            Reg::Vif1Mark => 0x1000_3C30,
            Reg::Vif1Mode => 0x1000_3C50,
            Reg::Vif1Code => 0x1000_3C80,
            Reg::Vif1Top => 0x1000_3CE0,
            Reg::Vif1Row0 => 0x1000_3D00,
            Reg::Vif1Row1 => 0x1000_3D10,
            Reg::Vif1Row2 => 0x1000_3D20,
            Reg::Vif1Row3 => 0x1000_3D30,

            Reg::Vif0Fifo => 0x1000_4000,
            Reg::Vif1Fifo => 0x1000_5000,
            Reg::GifFifo => 0x1000_6000,
            Reg::IpuInFifo => 0x1000_7010,

            Reg::InterruptStatus => 0x1000_F000,
            Reg::InterruptMask => 0x1000_F010,

            Reg::SioStatus => 0x1000_F130,
            Reg::SioTransmit => 0x1000_F180,

            Reg::SifMainCommand => 0x1000_F200,
            Reg::SifSubCommand => 0x1000_F210,
            Reg::SifMainFlag => 0x1000_F220,
            Reg::SifSubFlag => 0x1000_F230,
            Reg::SifControl => 0x1000_F240,

            Reg::MchRicm => 0x1000_F430,
            Reg::MchDrd => 0x1000_F440,

            Reg::DmaEnableRead => 0x1000_F520,
            Reg::DmaEnableWrite => 0x1000_F590,

            Reg::IopProbe => 0x1A00_0006,
            Reg::CdvdDiscType => 0x1F40_200F,
            Reg::CdvdSStatus => 0x1F40_2017,
            Reg::CdvdSData => 0x1F40_2018,
        };

        // SAFETY: every address above is in the physical range
        unsafe { PhysicalAddress::new_unchecked(addr) }
    }

    /// Returns the register at exactly the given address, if any.
    pub fn at(addr: PhysicalAddress) -> Option<Self> {
        Self::VARIANTS
            .iter()
            .copied()
            .find(|reg| reg.address() == addr)
    }

    /// The name of this register.
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Whether this is one of the VIF row registers. Returns the VIF index and the row.
    pub const fn vif_row(self) -> Option<(usize, usize)> {
        Some(match self {
            Reg::Vif0Row0 => (0, 0),
            Reg::Vif0Row1 => (0, 1),
            Reg::Vif0Row2 => (0, 2),
            Reg::Vif0Row3 => (0, 3),
            Reg::Vif1Row0 => (1, 0),
            Reg::Vif1Row1 => (1, 1),
            Reg::Vif1Row2 => (1, 2),
            Reg::Vif1Row3 => (1, 3),
            _ => return None,
        })
    }
}
