//! The physical bus of the EE.

use crate::{
    PS2,
    devices::{Device, read_mirrored, write_mirrored},
};
use easyerr::Error;
use glimmer_core::mem::{
    Address, IOP_SPACE, Mapping, PhysicalAddress, Primitive, PrimitiveRw, Region, io,
};
use tracing::{debug, info, trace, warn};

#[derive(Debug, Clone, Copy, Error)]
#[error("address {addr} is misaligned (expected alignment of {alignment})")]
pub struct MisalignedAddressErr {
    pub addr: Address,
    pub alignment: u32,
}

/// Bits always set when the EE reads the SIF control register.
const SIF_CONTROL_READ_BITS: u32 = 0xF000_0102;

/// Width of a bus access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    Byte,
    Half,
    Word,
    Double,
    Quad,
}

impl Width {
    #[inline(always)]
    pub fn of<P: Primitive>() -> Self {
        match size_of::<P>() {
            1 => Self::Byte,
            2 => Self::Half,
            4 => Self::Word,
            8 => Self::Double,
            _ => Self::Quad,
        }
    }
}

#[inline(always)]
fn widen<P: Primitive>(value: P) -> u128 {
    let mut buf = [0; 16];
    value.write_le(&mut buf);
    u128::from_le_bytes(buf)
}

#[inline(always)]
fn narrow<P: Primitive>(value: u128) -> P {
    P::read_le(&value.to_le_bytes())
}

/// Performs an access of the given width on a device.
fn device_read<D: Device + ?Sized>(
    device: &mut D,
    addr: PhysicalAddress,
    width: Width,
) -> u128 {
    match width {
        Width::Byte => device.read8(addr).into(),
        Width::Half => device.read16(addr).into(),
        Width::Word => device.read32(addr).into(),
        Width::Double => device.read64(addr).into(),
        Width::Quad => device.read128(addr),
    }
}

fn device_write<D: Device + ?Sized>(
    device: &mut D,
    addr: PhysicalAddress,
    width: Width,
    value: u128,
) {
    match width {
        Width::Byte => device.write8(addr, value as u8),
        Width::Half => device.write16(addr, value as u16),
        Width::Word => device.write32(addr, value as u32),
        Width::Double => device.write64(addr, value as u64),
        Width::Quad => device.write128(addr, value),
    }
}

/// Accesses on devices which only have word registers: wide accesses narrow to 32 bits.
fn word_device_read<D: Device + ?Sized>(
    device: &mut D,
    addr: PhysicalAddress,
    width: Width,
) -> u128 {
    match width {
        Width::Byte | Width::Half => device_read(device, addr, width),
        Width::Word | Width::Double | Width::Quad => device.read32(addr).into(),
    }
}

fn word_device_write<D: Device + ?Sized>(
    device: &mut D,
    addr: PhysicalAddress,
    width: Width,
    value: u128,
) {
    match width {
        Width::Byte | Width::Half => device_write(device, addr, width, value),
        Width::Word | Width::Double | Width::Quad => device.write32(addr, value as u32),
    }
}

/// The memory controller, as far as the BIOS' RDRAM initialization cares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryController {
    pub ricm: u32,
    pub drd: u32,
    /// Serial device id counter of the RDRAM initialization sequence.
    pub sdevid: u32,
}

impl MemoryController {
    pub fn write_ricm(&mut self, value: u32) {
        let command = (value >> 16) & 0xFFF;
        let op = (value >> 6) & 0xF;
        if command == 0x21 && op == 1 && (self.drd >> 7) & 1 == 0 {
            self.sdevid = 0;
        }

        self.ricm = value & !0x8000_0000;
    }

    pub fn write_drd(&mut self, value: u32) {
        self.drd = value;
    }

    pub fn read_drd(&mut self) -> u32 {
        if (self.ricm >> 6) & 0xF != 0 {
            return 0;
        }

        match (self.ricm >> 16) & 0xFFF {
            // init: two devices answer
            0x21 => {
                if self.sdevid < 2 {
                    self.sdevid += 1;
                    0x1F
                } else {
                    0
                }
            }
            // config A
            0x23 => 0x0D0D,
            // config B
            0x24 => 0x0090,
            // device id
            0x40 => self.ricm & 0x1F,
            _ => 0,
        }
    }
}

impl PS2 {
    fn read_region<P: Primitive>(
        &mut self,
        region: Region,
        offset: u32,
        addr: PhysicalAddress,
    ) -> P {
        let width = Width::of::<P>();
        match region {
            Region::Ram => self.memory.ram[offset as usize..].read(),
            Region::IopRam => self.memory.iop_ram[offset as usize..].read(),
            Region::Timers => {
                narrow(word_device_read(self.devices.timers.as_mut(), addr, width))
            }
            Region::GsPrivileged => narrow(device_read(self.devices.gs.as_mut(), addr, width)),
            Region::Dmac => narrow(word_device_read(self.devices.dmac.as_mut(), addr, width)),
            Region::Vu0Code => read_mirrored(self.devices.vu0.code(), offset),
            Region::Vu0Data => read_mirrored(self.devices.vu0.data(), offset),
            Region::Vu1Code => read_mirrored(self.devices.vu1.code(), offset),
            Region::Vu1Data => read_mirrored(self.devices.vu1.data(), offset),
            Region::BIOS => self.memory.bios[offset as usize..].read(),
        }
    }

    fn write_region<P: Primitive>(
        &mut self,
        region: Region,
        offset: u32,
        addr: PhysicalAddress,
        value: P,
    ) {
        let width = Width::of::<P>();
        match region {
            Region::Ram => self.memory.ram[offset as usize..].write(value),
            Region::IopRam => self.memory.iop_ram[offset as usize..].write(value),
            Region::Timers => {
                word_device_write(self.devices.timers.as_mut(), addr, width, widen(value));
            }
            Region::GsPrivileged => {
                device_write(self.devices.gs.as_mut(), addr, width, widen(value));
                self.devices.gs.wake();
            }
            Region::Dmac => {
                word_device_write(self.devices.dmac.as_mut(), addr, width, widen(value));
            }
            Region::Vu0Code => write_mirrored(self.devices.vu0.code_mut(), offset, value),
            Region::Vu0Data => write_mirrored(self.devices.vu0.data_mut(), offset, value),
            Region::Vu1Code => write_mirrored(self.devices.vu1.code_mut(), offset, value),
            Region::Vu1Data => write_mirrored(self.devices.vu1.data_mut(), offset, value),
            Region::BIOS => {
                warn!(
                    "dropping {} byte write of 0x{value:X} to the BIOS at {addr}",
                    size_of::<P>()
                );
            }
        }
    }

    fn read_reg(&mut self, reg: io::Reg, addr: PhysicalAddress, width: Width) -> u128 {
        use io::Reg;

        let value = match reg {
            Reg::IpuCommand
            | Reg::IpuControl
            | Reg::IpuBitPointer
            | Reg::IpuTop
            | Reg::IpuInFifo => {
                return device_read(self.devices.ipu.as_mut(), addr, width);
            }
            Reg::GifControl | Reg::GifMode | Reg::GifStatus | Reg::GifFifo => {
                return device_read(self.devices.gif.as_mut(), addr, width);
            }
            Reg::Vif0Status
            | Reg::Vif0ForceBreak
            | Reg::Vif0Error
            | Reg::Vif0Mark
            | Reg::Vif0Mode
            | Reg::Vif0Row0
            | Reg::Vif0Row1
            | Reg::Vif0Row2
            | Reg::Vif0Row3
            | Reg::Vif0Fifo => return device_read(self.devices.vif0.as_mut(), addr, width),
            Reg::Vif1Status
            | Reg::Vif1ForceBreak
            | Reg::Vif1Error
            | Reg::Vif1Mark
            | Reg::Vif1Mode
            | Reg::Vif1Code
            | Reg::Vif1Top
            | Reg::Vif1Row0
            | Reg::Vif1Row1
            | Reg::Vif1Row2
            | Reg::Vif1Row3
            | Reg::Vif1Fifo => return device_read(self.devices.vif1.as_mut(), addr, width),
            Reg::CdvdDiscType | Reg::CdvdSStatus | Reg::CdvdSData => {
                return self.devices.cdvd.read8(addr).into();
            }

            Reg::InterruptStatus => self.interrupts.status.to_bits(),
            Reg::InterruptMask => self.interrupts.mask.to_bits(),
            Reg::SioStatus | Reg::SioTransmit => 0,
            Reg::SifMainCommand => self.sif.mscom,
            Reg::SifSubCommand => self.sif.smcom,
            Reg::SifMainFlag => self.sif.msflag,
            Reg::SifSubFlag => self.sif.smflag,
            Reg::SifControl => self.sif.control | SIF_CONTROL_READ_BITS,
            Reg::MchRicm => 0,
            Reg::MchDrd => self.mch.read_drd(),
            Reg::DmaEnableRead | Reg::DmaEnableWrite => self.devices.dmac.master_disable(),
            Reg::IopProbe => 1,
        };

        value.into()
    }

    fn write_reg(&mut self, reg: io::Reg, addr: PhysicalAddress, width: Width, value: u128) {
        use io::Reg;

        let word = value as u32;
        match reg {
            Reg::IpuCommand
            | Reg::IpuControl
            | Reg::IpuBitPointer
            | Reg::IpuTop
            | Reg::IpuInFifo => {
                device_write(self.devices.ipu.as_mut(), addr, width, value);
            }
            Reg::GifControl | Reg::GifMode | Reg::GifStatus | Reg::GifFifo => {
                device_write(self.devices.gif.as_mut(), addr, width, value);
            }
            Reg::Vif0Status
            | Reg::Vif0ForceBreak
            | Reg::Vif0Error
            | Reg::Vif0Mark
            | Reg::Vif0Mode
            | Reg::Vif0Row0
            | Reg::Vif0Row1
            | Reg::Vif0Row2
            | Reg::Vif0Row3
            | Reg::Vif0Fifo => device_write(self.devices.vif0.as_mut(), addr, width, value),
            Reg::Vif1Status
            | Reg::Vif1ForceBreak
            | Reg::Vif1Error
            | Reg::Vif1Mark
            | Reg::Vif1Mode
            | Reg::Vif1Code
            | Reg::Vif1Top
            | Reg::Vif1Row0
            | Reg::Vif1Row1
            | Reg::Vif1Row2
            | Reg::Vif1Row3
            | Reg::Vif1Fifo => device_write(self.devices.vif1.as_mut(), addr, width, value),
            Reg::CdvdDiscType | Reg::CdvdSStatus | Reg::CdvdSData => {
                self.devices.cdvd.write8(addr, value as u8);
            }

            Reg::InterruptStatus => self.interrupts.write_status(word),
            Reg::InterruptMask => self.interrupts.write_mask(word),
            Reg::SioTransmit => self.kernel_putc(value as u8),
            Reg::SifMainCommand => self.sif.set_mscom(word),
            Reg::SifMainFlag => self.sif.set_msflag(word),
            Reg::SifSubFlag => self.sif.reset_smflag(word),
            Reg::SifControl => self.sif.set_control_ee(word),
            Reg::MchRicm => self.mch.write_ricm(word),
            Reg::MchDrd => self.mch.write_drd(word),
            Reg::DmaEnableWrite => self.devices.dmac.set_master_disable(word),
            Reg::SioStatus | Reg::SifSubCommand | Reg::DmaEnableRead | Reg::IopProbe => {
                debug!("ignoring write of 0x{word:08X} to read-only {}", reg.name());
            }
        }
    }

    /// Appends a byte to the kernel's console output, logging every completed line.
    fn kernel_putc(&mut self, byte: u8) {
        let stdout = &mut self.memory.kernel_stdout;
        stdout.push(byte as char);

        if byte == b'\n' {
            let line = stdout
                .trim_end_matches('\n')
                .rsplit('\n')
                .next()
                .unwrap_or_default();
            info!(target: "glimmer::kernel", "{line}");
        }
    }

    /// Reads a primitive from the physical bus. Never fails: unmapped addresses read as zero.
    pub fn read<P, const SILENT: bool>(&mut self, addr: PhysicalAddress) -> P
    where
        P: Primitive,
    {
        if let Some((region, offset)) = addr.region() {
            let value = self.read_region::<P>(region, offset, addr);
            if !SILENT {
                trace!("{} byte read from {region:?} at {addr}: 0x{value:X}", size_of::<P>());
            }

            return value;
        }

        if let Some(reg) = io::Reg::at(addr) {
            let value = narrow(self.read_reg(reg, addr, Width::of::<P>()));
            if !SILENT {
                trace!("{} byte read from {}: 0x{value:X}", size_of::<P>(), reg.name());
            }

            return value;
        }

        if !SILENT {
            warn!("{} byte read from unmapped address {addr}", size_of::<P>());
        }

        P::default()
    }

    /// Writes a primitive to the physical bus. Never fails: writes to unmapped addresses are
    /// dropped.
    pub fn write<P, const SILENT: bool>(&mut self, addr: PhysicalAddress, value: P)
    where
        P: Primitive,
    {
        if let Some((region, offset)) = addr.region() {
            if !SILENT {
                trace!("{} byte write to {region:?} at {addr}: 0x{value:X}", size_of::<P>());
            }

            self.write_region(region, offset, addr, value);
            return;
        }

        if IOP_SPACE.contains(&addr.value()) {
            if !SILENT {
                debug!("dropping {} byte write to IOP space at {addr}", size_of::<P>());
            }

            return;
        }

        if let Some(reg) = io::Reg::at(addr) {
            if !SILENT {
                trace!("{} byte write to {}: 0x{value:X}", size_of::<P>(), reg.name());
            }

            self.write_reg(reg, addr, Width::of::<P>(), widen(value));
            return;
        }

        if !SILENT {
            warn!(
                "dropping {} byte write of 0x{value:X} to unmapped address {addr}",
                size_of::<P>()
            );
        }
    }

    pub fn read8(&mut self, addr: PhysicalAddress) -> u8 {
        self.read::<u8, false>(addr)
    }

    pub fn read16(&mut self, addr: PhysicalAddress) -> u16 {
        self.read::<u16, false>(addr)
    }

    pub fn read32(&mut self, addr: PhysicalAddress) -> u32 {
        self.read::<u32, false>(addr)
    }

    pub fn read64(&mut self, addr: PhysicalAddress) -> u64 {
        self.read::<u64, false>(addr)
    }

    pub fn read128(&mut self, addr: PhysicalAddress) -> u128 {
        self.read::<u128, false>(addr)
    }

    pub fn write8(&mut self, addr: PhysicalAddress, value: u8) {
        self.write::<u8, false>(addr, value);
    }

    pub fn write16(&mut self, addr: PhysicalAddress, value: u16) {
        self.write::<u16, false>(addr, value);
    }

    pub fn write32(&mut self, addr: PhysicalAddress, value: u32) {
        self.write::<u32, false>(addr, value);
    }

    pub fn write64(&mut self, addr: PhysicalAddress, value: u64) {
        self.write::<u64, false>(addr, value);
    }

    pub fn write128(&mut self, addr: PhysicalAddress, value: u128) {
        self.write::<u128, false>(addr, value);
    }

    /// Reads a primitive at a virtual address of the EE.
    #[inline(always)]
    pub fn read_virtual<P, const SILENT: bool>(
        &mut self,
        addr: Address,
    ) -> Result<P, MisalignedAddressErr>
    where
        P: Primitive,
    {
        if !addr.is_aligned(P::ALIGNMENT) {
            return Err(MisalignedAddressErr {
                addr,
                alignment: P::ALIGNMENT,
            });
        }

        Ok(match addr.mapping() {
            Mapping::Scratchpad(offset) => self.memory.scratchpad[offset as usize..].read(),
            Mapping::Physical(phys) => self.read::<P, SILENT>(phys),
        })
    }

    /// Writes a primitive at a virtual address of the EE.
    #[inline(always)]
    pub fn write_virtual<P, const SILENT: bool>(
        &mut self,
        addr: Address,
        value: P,
    ) -> Result<(), MisalignedAddressErr>
    where
        P: Primitive,
    {
        if !addr.is_aligned(P::ALIGNMENT) {
            return Err(MisalignedAddressErr {
                addr,
                alignment: P::ALIGNMENT,
            });
        }

        match addr.mapping() {
            Mapping::Scratchpad(offset) => self.memory.scratchpad[offset as usize..].write(value),
            Mapping::Physical(phys) => self.write::<P, SILENT>(phys, value),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Config,
        devices::{GraphicsSynthesizer, Hooks},
    };
    use glimmer_core::interrupts::Interrupt;
    use proptest::prelude::*;
    use std::sync::{Arc, Mutex};

    fn ps2() -> PS2 {
        PS2::new(Config::default()).unwrap()
    }

    fn phys(addr: u32) -> PhysicalAddress {
        PhysicalAddress::new(addr).unwrap()
    }

    #[test]
    fn ram_is_little_endian() {
        let mut ps2 = ps2();
        ps2.write32(phys(0x0010_0000), 0x1122_3344);
        assert_eq!(ps2.read8(phys(0x0010_0000)), 0x44);
        assert_eq!(ps2.read16(phys(0x0010_0002)), 0x1122);

        ps2.write128(phys(0x0010_0010), u128::MAX);
        assert_eq!(ps2.read64(phys(0x0010_0018)), u64::MAX);
    }

    #[test]
    fn unmapped_read_is_zero() {
        let mut ps2 = ps2();
        let before = ps2.sif;
        assert_eq!(ps2.read32(phys(0x1000_F100)), 0);
        assert_eq!(ps2.read128(phys(0x1500_0000)), 0);
        assert_eq!(ps2.sif, before);
    }

    #[test]
    fn iop_space_writes_are_dropped() {
        let mut ps2 = ps2();
        ps2.write32(phys(0x1F80_1000), 0xFFFF_FFFF);
        assert_eq!(ps2.read32(phys(0x1F80_1000)), 0);
        assert_eq!(ps2.read16(phys(0x1A00_0006)), 1);
    }

    #[test]
    fn bios_is_read_only() {
        let mut config = Config::default();
        config.bios = vec![0xAA, 0xBB, 0xCC, 0xDD];
        let mut ps2 = PS2::new(config).unwrap();

        ps2.write32(phys(0x1FC0_0000), 0);
        assert_eq!(ps2.read32(phys(0x1FC0_0000)), 0xDDCC_BBAA);
    }

    #[test]
    fn iop_ram_window() {
        let mut ps2 = ps2();
        ps2.write32(phys(0x1C00_0100), 0xCAFE_BABE);
        assert_eq!(ps2.memory.iop_ram[0x100], 0xBE);
    }

    #[test]
    fn vu_memories_mirror() {
        let mut ps2 = ps2();
        // VU0 data is 4 KiB, mirrored over its 16 KiB window
        ps2.write64(phys(0x1100_4000 + 0x1008), 0x0102_0304_0506_0708);
        assert_eq!(ps2.read64(phys(0x1100_4008)), 0x0102_0304_0506_0708);

        ps2.write32(phys(0x1100_8000 + 0x3FFC), 7);
        assert_eq!(ps2.devices.vu1.code()[0x3FFC], 7);
    }

    #[test]
    fn intc_registers() {
        let mut ps2 = ps2();
        ps2.interrupts.status.request(Interrupt::VblankStart);
        ps2.interrupts.status.request(Interrupt::Timer0);

        let stat = ps2.read32(io::Reg::InterruptStatus.address());
        assert_eq!(stat, Interrupt::VblankStart.bit() | Interrupt::Timer0.bit());

        ps2.write32(io::Reg::InterruptStatus.address(), Interrupt::Timer0.bit());
        assert_eq!(
            ps2.read32(io::Reg::InterruptStatus.address()),
            Interrupt::VblankStart.bit()
        );

        ps2.write32(io::Reg::InterruptMask.address(), Interrupt::VblankStart.bit());
        assert!(ps2.interrupts.pending());
        ps2.write32(io::Reg::InterruptMask.address(), Interrupt::VblankStart.bit());
        assert!(!ps2.interrupts.pending());
    }

    #[test]
    fn sif_registers() {
        let mut ps2 = ps2();
        ps2.write32(io::Reg::SifMainFlag.address(), 0x1);
        ps2.write32(io::Reg::SifMainFlag.address(), 0x100);
        assert_eq!(ps2.read32(io::Reg::SifMainFlag.address()), 0x101);

        ps2.sif.set_smflag(0x30);
        ps2.write32(io::Reg::SifSubFlag.address(), 0x10);
        assert_eq!(ps2.read32(io::Reg::SifSubFlag.address()), 0x20);

        ps2.write32(io::Reg::SifControl.address(), 0x100);
        assert_eq!(ps2.read32(io::Reg::SifControl.address()), 0xF000_0102);
        ps2.write32(io::Reg::SifControl.address(), 0);
        assert_eq!(ps2.sif.control, 0);

        // the EE cannot write SMCOM
        ps2.write32(io::Reg::SifSubCommand.address(), 5);
        assert_eq!(ps2.sif.smcom, 0);
    }

    #[test]
    fn rdram_initialization() {
        let mut ps2 = ps2();
        let ricm = io::Reg::MchRicm.address();
        let drd = io::Reg::MchDrd.address();

        // reset the device id counter, then issue the init command
        ps2.write32(ricm, (0x21 << 16) | (1 << 6) | 0x8000_0000);
        assert_eq!(ps2.mch.ricm & 0x8000_0000, 0);
        ps2.write32(ricm, 0x21 << 16);

        assert_eq!(ps2.read32(drd), 0x1F);
        assert_eq!(ps2.read32(drd), 0x1F);
        assert_eq!(ps2.read32(drd), 0);

        ps2.write32(ricm, 0x23 << 16);
        assert_eq!(ps2.read32(drd), 0x0D0D);
        ps2.write32(ricm, 0x24 << 16);
        assert_eq!(ps2.read32(drd), 0x0090);
        ps2.write32(ricm, (0x40 << 16) | 0x15);
        assert_eq!(ps2.read32(drd), 0x15);

        // not a read operation
        ps2.write32(ricm, (0x23 << 16) | (2 << 6));
        assert_eq!(ps2.read32(drd), 0);
    }

    #[test]
    fn dma_master_disable() {
        let mut ps2 = ps2();
        ps2.write32(io::Reg::DmaEnableWrite.address(), 0x1_0000);
        assert_eq!(ps2.read32(io::Reg::DmaEnableRead.address()), 0x1_0000);
    }

    #[test]
    fn kernel_console() {
        let mut ps2 = ps2();
        for byte in b"hello\nworld" {
            ps2.write8(io::Reg::SioTransmit.address(), *byte);
        }

        assert_eq!(ps2.memory.kernel_stdout, "hello\nworld");
    }

    #[derive(Default)]
    struct Recording {
        accesses: Vec<(u32, Width)>,
        wakes: usize,
    }

    /// A GS double sharing its log with the test.
    struct RecordingGs(Arc<Mutex<Recording>>);

    impl Device for RecordingGs {
        fn name(&self) -> &'static str {
            "gs"
        }

        fn read32(&mut self, addr: PhysicalAddress) -> u32 {
            self.0.lock().unwrap().accesses.push((addr.value(), Width::Word));
            0x8765_4321
        }

        fn write32(&mut self, addr: PhysicalAddress, _: u32) {
            self.0.lock().unwrap().accesses.push((addr.value(), Width::Word));
        }

        fn write64(&mut self, addr: PhysicalAddress, _: u64) {
            self.0.lock().unwrap().accesses.push((addr.value(), Width::Double));
        }

        fn run(&mut self, _: u64, _: &mut Hooks<'_>) {}
    }

    impl GraphicsSynthesizer for RecordingGs {
        fn wake(&mut self) {
            self.0.lock().unwrap().wakes += 1;
        }

        fn vblank(&mut self, _: bool) {}
        fn hblank(&mut self) {}
        fn vsync(&mut self) {}
    }

    #[test]
    fn gs_writes_wake_the_worker() {
        let log = Arc::new(Mutex::new(Recording::default()));
        let mut ps2 = ps2();
        ps2.devices.gs = Box::new(RecordingGs(log.clone()));

        ps2.write64(phys(0x1200_1000), 0xFF);
        ps2.write32(phys(0x1200_0010), 0xFF);
        assert_eq!(ps2.read8(phys(0x1200_1001)), 0x43);

        let log = log.lock().unwrap();
        assert_eq!(log.wakes, 2);
        assert_eq!(
            log.accesses,
            [
                (0x1200_1000, Width::Double),
                (0x1200_0010, Width::Word),
                (0x1200_1000, Width::Word),
            ]
        );
    }

    #[test]
    fn scratchpad_is_served_by_the_cpu() {
        let mut ps2 = ps2();
        ps2.write_virtual::<u32, false>(Address(0x7000_0010), 0x55AA_55AA)
            .unwrap();
        assert_eq!(ps2.memory.scratchpad[0x10], 0xAA);
        assert_eq!(ps2.read32(phys(0x0000_0010)), 0);
        assert_eq!(
            ps2.read_virtual::<u32, false>(Address(0x7000_0010)).unwrap(),
            0x55AA_55AA
        );
    }

    #[test]
    fn virtual_mirrors() {
        let mut ps2 = ps2();
        ps2.write_virtual::<u32, false>(Address(0x8000_1000), 42).unwrap();
        assert_eq!(ps2.read_virtual::<u32, false>(Address(0xA000_1000)).unwrap(), 42);
        assert_eq!(ps2.read32(phys(0x1000)), 42);
    }

    #[test]
    fn misaligned_virtual_access() {
        let mut ps2 = ps2();
        let err = ps2.read_virtual::<u32, false>(Address(0x8000_0002)).unwrap_err();
        assert_eq!(err.alignment, 4);
        assert!(ps2.write_virtual::<u64, false>(Address(0x8000_0004), 0).is_err());
    }

    proptest! {
        #[test]
        fn unmapped_reads_are_stable(offset in 0u32..0x00FF_FFF0) {
            // nothing lives between the RAM and the EE registers
            let addr = phys(0x0200_0000 + (offset & !0xF));
            let mut ps2 = ps2();
            ps2.write32(addr, 0xFFFF_FFFF);
            prop_assert_eq!(ps2.read32(addr), 0);
            prop_assert_eq!(ps2.read128(addr), 0);
        }
    }
}
