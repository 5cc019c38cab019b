//! Save states: a binary image of the machine that can be written out and loaded back.
//!
//! A save state starts with a [`Header`] (signature and format version) followed by the body.
//! Everything is little endian. Scheduler handlers are stored by name and resolved against the
//! handlers registered on the machine being loaded into.

use crate::{
    PS2,
    scheduler::{EventRecord, ResolvedSnapshot, SchedulerError, Snapshot, TimerRecord},
};
use binrw::{BinRead, BinResult, BinWrite, binrw};
use easyerr::Error;
use glimmer_core::{
    cpu::fpu::Control,
    interlock::Interlock,
    interrupts::{Mask, Status},
    mem::{Address, Region, SCRATCHPAD_LEN},
    sif::Mailbox,
};
use std::io::{Read, Seek, Write};
use tracing::{debug, info};

/// Signature at the start of every save state.
pub const MAGIC: [u8; 4] = *b"GLMR";

/// Version of the save state format written by this build. Only states with exactly this
/// version are accepted.
pub const VERSION: Version = Version {
    major: 1,
    minor: 0,
    revision: 0,
};

const RAM_LEN: usize = Region::Ram.len() as usize;
const SCRATCHPAD: usize = SCRATCHPAD_LEN as usize;
const IOP_RAM_LEN: usize = Region::IopRam.len() as usize;

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub revision: u32,
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.revision)
    }
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub magic: [u8; 4],
    pub version: Version,
}

#[derive(Debug, Error)]
pub enum SaveStateError {
    #[error("not a save state")]
    BadSignature,
    #[error("save state has version {found}, expected {expected}")]
    VersionMismatch { found: Version, expected: Version },
    #[error("malformed save state")]
    Malformed { source: binrw::Error },
    #[error("save state refers to a scheduler handler that doesn't exist")]
    UnknownHandler { source: SchedulerError },
}

#[binrw::parser(reader)]
fn read_bytes(len: usize) -> BinResult<Vec<u8>> {
    let mut bytes = vec![0; len];
    reader.read_exact(&mut bytes)?;
    Ok(bytes)
}

#[binrw::writer(writer)]
#[allow(clippy::ptr_arg)]
fn write_bytes(bytes: &Vec<u8>) -> BinResult<()> {
    writer.write_all(bytes)?;
    Ok(())
}

/// A length prefixed name.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone)]
struct Name {
    #[bw(calc = bytes.len() as u32)]
    len: u32,
    #[br(count = len)]
    bytes: Vec<u8>,
}

impl From<&str> for Name {
    fn from(value: &str) -> Self {
        Self {
            bytes: value.as_bytes().to_vec(),
        }
    }
}

impl Name {
    fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone)]
struct EventState {
    cycle: u64,
    seq: u64,
    handler: Name,
    payload: u64,
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone)]
struct TimerState {
    interval: u64,
    next_fire: u64,
    seq: u64,
    handler: Name,
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone)]
struct SchedulerState {
    elapsed: u64,
    next_seq: u64,
    #[bw(calc = events.len() as u32)]
    event_count: u32,
    #[br(count = event_count)]
    events: Vec<EventState>,
    #[bw(calc = timers.len() as u32)]
    timer_count: u32,
    #[br(count = timer_count)]
    timers: Vec<TimerState>,
}

impl From<Snapshot> for SchedulerState {
    fn from(value: Snapshot) -> Self {
        Self {
            elapsed: value.elapsed,
            next_seq: value.next_seq,
            events: value
                .events
                .into_iter()
                .map(|event| EventState {
                    cycle: event.cycle,
                    seq: event.seq,
                    handler: Name::from(event.handler.as_str()),
                    payload: event.payload,
                })
                .collect(),
            timers: value
                .timers
                .into_iter()
                .map(|timer| TimerState {
                    interval: timer.interval,
                    next_fire: timer.next_fire,
                    seq: timer.seq,
                    handler: Name::from(timer.handler.as_str()),
                })
                .collect(),
        }
    }
}

impl SchedulerState {
    fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            elapsed: self.elapsed,
            next_seq: self.next_seq,
            events: self
                .events
                .iter()
                .map(|event| EventRecord {
                    cycle: event.cycle,
                    seq: event.seq,
                    handler: event.handler.to_string_lossy(),
                    payload: event.payload,
                })
                .collect(),
            timers: self
                .timers
                .iter()
                .map(|timer| TimerRecord {
                    interval: timer.interval,
                    next_fire: timer.next_fire,
                    seq: timer.seq,
                    handler: timer.handler.to_string_lossy(),
                })
                .collect(),
        }
    }
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone)]
struct CpuState {
    gp: [u128; 32],
    lo: u128,
    hi: u128,
    sa: u32,
    pc: u32,
    next_pc: u32,
    in_delay_slot: u8,
    halted: u8,
    fpr: [u32; 32],
    acc: u32,
    fcr31: u32,
    cop0: [u32; 32],
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone)]
struct Body {
    vblank: u8,
    frame_count: u64,

    #[br(parse_with = read_bytes, args(RAM_LEN))]
    #[bw(write_with = write_bytes)]
    ram: Vec<u8>,
    #[br(parse_with = read_bytes, args(SCRATCHPAD))]
    #[bw(write_with = write_bytes)]
    scratchpad: Vec<u8>,
    #[br(parse_with = read_bytes, args(IOP_RAM_LEN))]
    #[bw(write_with = write_bytes)]
    iop_ram: Vec<u8>,

    cpu: CpuState,

    intc_status: u32,
    intc_mask: u32,
    sif: [u32; 5],
    ricm: u32,
    drd: u32,
    sdevid: u32,
    interlock_cop2: u8,
    interlock_vu: u8,

    scheduler: SchedulerState,
}

impl Body {
    fn capture(ps2: &PS2) -> Self {
        let regs = &ps2.cpu.regs;
        let cpu = CpuState {
            gp: *regs.gp(),
            lo: regs.lo128(),
            hi: regs.hi128(),
            sa: regs.sa(),
            pc: ps2.cpu.pc.value(),
            next_pc: ps2.cpu.next_pc.value(),
            in_delay_slot: u8::from(ps2.cpu.in_delay_slot),
            halted: u8::from(ps2.cpu.halted),
            fpr: ps2.cpu.fpu.fpr,
            acc: ps2.cpu.fpu.acc,
            fcr31: ps2.cpu.fpu.control.0,
            cop0: *ps2.cpu.cop0.regs(),
        };

        let sif = ps2.sif;
        Self {
            vblank: u8::from(ps2.frame.vblank),
            frame_count: ps2.frame.count,
            ram: ps2.memory.ram.to_vec(),
            scratchpad: ps2.memory.scratchpad.to_vec(),
            iop_ram: ps2.memory.iop_ram.to_vec(),
            cpu,
            intc_status: ps2.interrupts.status.to_bits(),
            intc_mask: ps2.interrupts.mask.to_bits(),
            sif: [sif.mscom, sif.smcom, sif.msflag, sif.smflag, sif.control],
            ricm: ps2.mch.ricm,
            drd: ps2.mch.drd,
            sdevid: ps2.mch.sdevid,
            interlock_cop2: u8::from(ps2.interlock.cop2_flag()),
            interlock_vu: u8::from(ps2.interlock.vu_flag()),
            scheduler: SchedulerState::from(ps2.scheduler.snapshot()),
        }
    }

    /// Overwrites the machine with this state. Everything that can fail has been checked by now.
    fn apply(self, ps2: &mut PS2, scheduler: ResolvedSnapshot) {
        ps2.frame.vblank = self.vblank != 0;
        ps2.frame.count = self.frame_count;
        ps2.frame.ended = false;

        ps2.memory.ram.copy_from_slice(&self.ram);
        ps2.memory.scratchpad.copy_from_slice(&self.scratchpad);
        ps2.memory.iop_ram.copy_from_slice(&self.iop_ram);

        let cpu = self.cpu;
        ps2.cpu.regs.restore(cpu.gp, cpu.lo, cpu.hi, cpu.sa);
        ps2.cpu.pc = Address(cpu.pc);
        ps2.cpu.next_pc = Address(cpu.next_pc);
        ps2.cpu.in_delay_slot = cpu.in_delay_slot != 0;
        ps2.cpu.halted = cpu.halted != 0;
        ps2.cpu.fpu.fpr = cpu.fpr;
        ps2.cpu.fpu.acc = cpu.acc;
        ps2.cpu.fpu.control = Control(cpu.fcr31);
        ps2.cpu.cop0.restore(cpu.cop0);
        // the cache contents aren't part of the state
        ps2.cpu.icache.invalidate_all();

        ps2.interrupts.status = Status::from_bits(self.intc_status);
        ps2.interrupts.mask = Mask::from_bits(self.intc_mask);

        let [mscom, smcom, msflag, smflag, control] = self.sif;
        ps2.sif = Mailbox {
            mscom,
            smcom,
            msflag,
            smflag,
            control,
        };

        ps2.mch.ricm = self.ricm;
        ps2.mch.drd = self.drd;
        ps2.mch.sdevid = self.sdevid;
        ps2.interlock = Interlock::from_flags(self.interlock_cop2 != 0, self.interlock_vu != 0);

        ps2.scheduler.restore(scheduler);
    }
}

/// Writes the state of `ps2` to `writer`.
pub fn save<W>(ps2: &PS2, writer: &mut W) -> Result<(), SaveStateError>
where
    W: Write + Seek,
{
    let header = Header {
        magic: MAGIC,
        version: VERSION,
    };

    header
        .write(writer)
        .map_err(|source| SaveStateError::Malformed { source })?;
    Body::capture(ps2)
        .write(writer)
        .map_err(|source| SaveStateError::Malformed { source })?;

    info!(frame = ps2.frame.count, "saved state");
    Ok(())
}

/// Loads a state written by [`save`] into `ps2`. The whole state is parsed and validated first:
/// on error, `ps2` is left untouched.
pub fn load<R>(ps2: &mut PS2, reader: &mut R) -> Result<(), SaveStateError>
where
    R: Read + Seek,
{
    let header = Header::read(reader).map_err(|source| SaveStateError::Malformed { source })?;
    if header.magic != MAGIC {
        return Err(SaveStateError::BadSignature);
    }

    if header.version != VERSION {
        return Err(SaveStateError::VersionMismatch {
            found: header.version,
            expected: VERSION,
        });
    }

    let body = Body::read(reader).map_err(|source| SaveStateError::Malformed { source })?;
    let snapshot = body.scheduler.to_snapshot();
    let resolved = ps2
        .scheduler
        .resolve(&snapshot)
        .map_err(|source| SaveStateError::UnknownHandler { source })?;

    debug!(
        events = snapshot.events.len(),
        timers = snapshot.timers.len(),
        "save state validated"
    );

    body.apply(ps2, resolved);
    info!(frame = ps2.frame.count, "loaded state");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;
    use glimmer_core::{
        cpu::{Reg, cop0},
        interlock::Side,
        interrupts::Interrupt,
    };
    use std::io::Cursor;

    fn ps2() -> PS2 {
        PS2::new(Config::default()).unwrap()
    }

    fn saved(ps2: &PS2) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        save(ps2, &mut cursor).unwrap();
        cursor.into_inner()
    }

    fn noop(_: &mut PS2, _: u64) -> Result<(), SchedulerError> {
        Ok(())
    }

    #[test]
    fn round_trip() {
        let mut original = ps2();
        original.memory.ram[0x1234] = 0xAB;
        original.memory.scratchpad[0x10] = 0xCD;
        original.memory.iop_ram[0x20] = 0xEF;
        original.cpu.regs.write128(Reg::R5, u128::MAX - 7);
        original.cpu.regs.set_hi1(42);
        original.cpu.pc = Address(0x8000_1000);
        original.cpu.next_pc = Address(0x8000_2000);
        original.cpu.in_delay_slot = true;
        original.cpu.fpu.write(3, 1.5f32.to_bits());
        original.cpu.cop0.write(cop0::reg::COMPARE, 99);
        original.interrupts.status.request(Interrupt::VblankEnd);
        original.sif.mscom = 7;
        original.mch.sdevid = 3;
        original.interlock.request(Side::Vu);
        original.frame.count = 12;
        original
            .scheduler
            .add_event_with(original.handlers.vblank_end, 500, 9)
            .unwrap();

        let data = saved(&original);
        let mut loaded = ps2();
        load(&mut loaded, &mut Cursor::new(data)).unwrap();

        assert_eq!(loaded.memory.ram[0x1234], 0xAB);
        assert_eq!(loaded.memory.scratchpad[0x10], 0xCD);
        assert_eq!(loaded.memory.iop_ram[0x20], 0xEF);
        assert_eq!(loaded.cpu.regs.read128(Reg::R5), u128::MAX - 7);
        assert_eq!(loaded.cpu.regs.hi1(), 42);
        assert_eq!(loaded.cpu.pc, original.cpu.pc);
        assert_eq!(loaded.cpu.next_pc, original.cpu.next_pc);
        assert!(loaded.cpu.in_delay_slot);
        assert_eq!(loaded.cpu.fpu.read(3), 1.5f32.to_bits());
        assert_eq!(loaded.cpu.cop0.compare(), 99);
        assert!(loaded.interrupts.status.is_requested(Interrupt::VblankEnd));
        assert_eq!(loaded.sif, original.sif);
        assert_eq!(loaded.mch.sdevid, 3);
        assert_eq!(loaded.interlock, original.interlock);
        assert_eq!(loaded.frame.count, 12);
        assert_eq!(loaded.scheduler.snapshot(), original.scheduler.snapshot());
    }

    #[test]
    fn bad_signature_is_rejected() {
        let mut data = saved(&ps2());
        data[0..4].copy_from_slice(b"NOPE");

        let mut target = ps2();
        target.memory.ram[0] = 1;
        assert!(matches!(
            load(&mut target, &mut Cursor::new(data)),
            Err(SaveStateError::BadSignature)
        ));
        assert_eq!(target.memory.ram[0], 1);
    }

    #[test]
    fn other_versions_are_rejected() {
        let mut data = saved(&ps2());
        data[4..8].copy_from_slice(&(VERSION.major + 1).to_le_bytes());

        let mut target = ps2();
        assert!(matches!(
            load(&mut target, &mut Cursor::new(data)),
            Err(SaveStateError::VersionMismatch { found, .. }) if found.major == VERSION.major + 1
        ));
    }

    #[test]
    fn truncated_state_is_malformed() {
        let mut data = saved(&ps2());
        data.truncate(1024);

        let mut target = ps2();
        assert!(matches!(
            load(&mut target, &mut Cursor::new(data)),
            Err(SaveStateError::Malformed { .. })
        ));
    }

    #[test]
    fn unknown_handler_is_rejected_before_loading() {
        let mut source = ps2();
        let extra = source.scheduler.register_function("extra", noop);
        source.scheduler.add_event(extra, 10).unwrap();
        source.memory.ram[0] = 0x55;
        let data = saved(&source);

        let mut target = ps2();
        assert!(matches!(
            load(&mut target, &mut Cursor::new(data)),
            Err(SaveStateError::UnknownHandler { .. })
        ));
        assert_eq!(target.memory.ram[0], 0);
        assert_eq!(target.scheduler.snapshot(), ps2().scheduler.snapshot());
    }
}
