//! Main crate of the glimmer PS2 emulator. This crate is reponsible for implementing the emulation
//! of the EE side of the PS2: the event scheduler, the EE interpreter and the physical bus. It
//! provides all of the functionality but no "frontend" code such as a GUI or a CLI.
//!
//! The units around the EE (GS, DMAC, vector units, IOP, ...) are reached through the interfaces
//! in [`devices`], which come with null implementations.

pub mod bus;
pub mod cpu;
pub mod devices;
pub mod savestate;
pub mod scheduler;

use bus::MemoryController;
use devices::Peripherals;
use easyerr::{Error, ResultExt};
use glimmer_core::{
    cpu::Cpu,
    interlock::Interlock,
    interrupts::{Controller as InterruptController, Interrupt},
    mem::Memory,
    sif::Mailbox,
};
use scheduler::{Context, HandlerId, Scheduler, SchedulerError};
use tracing::{debug, trace};

pub use glimmer_core as core;

/// Frame timing, in EE cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTiming {
    /// Length of a whole frame. VBLANK ends here.
    pub cycles_per_frame: u64,
    /// Offset of the start of VBLANK from the start of the frame.
    pub vblank_start: u64,
    pub hblank_interval: u64,
    /// Delay between the start of VBLANK and the GS vsync.
    pub gs_vblank_delay: u64,
}

impl FrameTiming {
    pub const NTSC: Self = Self {
        cycles_per_frame: 4_929_486,
        vblank_start: 4_498_391,
        hblank_interval: 18_743,
        gs_vblank_delay: 65_622,
    };
}

impl Default for FrameTiming {
    fn default() -> Self {
        Self::NTSC
    }
}

/// Emulator configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// The BIOS ROM data.
    pub bios: Vec<u8>,
    pub timing: FrameTiming,
    /// Whether to model instruction cache timing.
    pub icache: bool,
}

/// Frame bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Frame {
    /// Whether the display is in VBLANK.
    pub vblank: bool,
    /// Frames completed since reset.
    pub count: u64,
    /// Set by the VBLANK end event, ends [`Emulator::run_frame`].
    pub ended: bool,
}

/// The frame event handlers registered in the scheduler.
#[derive(Debug, Clone, Copy)]
pub struct FrameHandlers {
    pub vblank_start: HandlerId,
    pub vblank_end: HandlerId,
    pub gs_vblank: HandlerId,
    pub hblank: HandlerId,
}

/// The state of the PS2. [`Emulator`] and its systems operate on this struct.
pub struct PS2 {
    /// The event scheduler.
    pub scheduler: Scheduler<PS2>,

    pub memory: Memory,
    pub cpu: Cpu,
    pub interrupts: InterruptController,
    pub sif: Mailbox,
    pub mch: MemoryController,
    pub interlock: Interlock,
    pub devices: Peripherals,

    pub frame: Frame,
    pub timing: FrameTiming,
    pub handlers: FrameHandlers,
}

impl Context for PS2 {
    #[inline(always)]
    fn scheduler(&mut self) -> &mut Scheduler<Self> {
        &mut self.scheduler
    }
}

#[derive(Debug, Error)]
pub enum EmulatorError {
    #[error("BIOS image of {size} bytes doesn't fit in the ROM")]
    BiosTooBig { size: usize },
    #[error("scheduler failure")]
    Scheduler { source: SchedulerError },
    #[error("EE failure")]
    Cpu { source: cpu::ExecError },
    #[error("save state failure")]
    SaveState { source: savestate::SaveStateError },
}

fn vblank_start(ps2: &mut PS2, _: u64) -> Result<(), SchedulerError> {
    trace!("vblank start");
    ps2.frame.vblank = true;
    ps2.interrupts.status.request(Interrupt::VblankStart);
    ps2.devices.gs.vblank(true);
    ps2.devices.iop.raise_interrupt(0);

    let delay = ps2.timing.gs_vblank_delay as i64;
    ps2.scheduler.add_event(ps2.handlers.gs_vblank, delay)?;

    Ok(())
}

fn vblank_end(ps2: &mut PS2, _: u64) -> Result<(), SchedulerError> {
    trace!("vblank end");
    ps2.frame.vblank = false;
    ps2.interrupts.status.request(Interrupt::VblankEnd);
    ps2.devices.gs.vblank(false);
    ps2.devices.iop.raise_interrupt(11);

    ps2.frame.count += 1;
    ps2.frame.ended = true;

    Ok(())
}

fn gs_vblank(ps2: &mut PS2, _: u64) -> Result<(), SchedulerError> {
    ps2.devices.gs.vsync();
    Ok(())
}

fn hblank(ps2: &mut PS2, _: u64) -> Result<(), SchedulerError> {
    ps2.devices.gs.hblank();
    Ok(())
}

/// Registers the frame event handlers and starts the HBLANK timer.
fn register_handlers(
    scheduler: &mut Scheduler<PS2>,
    timing: &FrameTiming,
) -> Result<FrameHandlers, SchedulerError> {
    let handlers = FrameHandlers {
        vblank_start: scheduler.register_function("vblank_start", vblank_start),
        vblank_end: scheduler.register_function("vblank_end", vblank_end),
        gs_vblank: scheduler.register_function("gs_vblank", gs_vblank),
        hblank: scheduler.register_function("hblank", hblank),
    };

    scheduler.add_periodic(handlers.hblank, timing.hblank_interval)?;
    Ok(handlers)
}

impl PS2 {
    /// Creates a powered-on PS2 with the given configuration and null peripherals.
    pub fn new(config: Config) -> Result<Self, EmulatorError> {
        let memory = Memory::with_bios(config.bios).map_err(|bios| EmulatorError::BiosTooBig {
            size: bios.len(),
        })?;

        let mut scheduler = Scheduler::new();
        let handlers =
            register_handlers(&mut scheduler, &config.timing).context(EmulatorCtx::Scheduler)?;

        let mut cpu = Cpu::default();
        cpu.icache.enabled = config.icache;

        Ok(Self {
            scheduler,
            memory,
            cpu,
            interrupts: InterruptController::default(),
            sif: Mailbox::default(),
            mch: MemoryController::default(),
            interlock: Interlock::default(),
            devices: Peripherals::default(),
            frame: Frame::default(),
            timing: config.timing,
            handlers,
        })
    }

    /// Returns the machine to its power-on state. The BIOS and the peripherals' implementations
    /// are kept.
    pub fn reset(&mut self) -> Result<(), EmulatorError> {
        // everything below may hold handler ids, so the scheduler goes first
        self.scheduler.reset();

        self.memory.clear();

        self.cpu.reset();

        self.interrupts = InterruptController::default();
        self.sif = Mailbox::default();
        self.mch = MemoryController::default();
        self.interlock = Interlock::default();
        self.devices.reset();
        self.frame = Frame::default();

        self.handlers =
            register_handlers(&mut self.scheduler, &self.timing).context(EmulatorCtx::Scheduler)?;

        Ok(())
    }
}

/// The glimmer emulator.
pub struct Emulator {
    /// The state of the system.
    ps2: PS2,
    cpu: cpu::Interpreter,
}

impl Emulator {
    /// Creates a new [`Emulator`].
    pub fn new(config: Config) -> Result<Self, EmulatorError> {
        Ok(Self {
            ps2: PS2::new(config)?,
            cpu: cpu::Interpreter::default(),
        })
    }

    /// Returns a reference to the state of the system.
    #[inline(always)]
    pub fn ps2(&self) -> &PS2 {
        &self.ps2
    }

    /// Returns a mutable reference to the state of the system.
    #[inline(always)]
    pub fn ps2_mut(&mut self) -> &mut PS2 {
        &mut self.ps2
    }

    pub fn cpu(&self) -> &cpu::Interpreter {
        &self.cpu
    }

    pub fn reset(&mut self) -> Result<(), EmulatorError> {
        self.cpu = cpu::Interpreter::default();
        self.ps2.reset()
    }

    /// Writes a save state of the system to `writer`.
    pub fn save_state<W>(&self, writer: &mut W) -> Result<(), EmulatorError>
    where
        W: std::io::Write + std::io::Seek,
    {
        savestate::save(&self.ps2, writer).context(EmulatorCtx::SaveState)
    }

    /// Loads a save state from `reader`. Nothing changes if it's rejected.
    pub fn load_state<R>(&mut self, reader: &mut R) -> Result<(), EmulatorError>
    where
        R: std::io::Read + std::io::Seek,
    {
        savestate::load(&mut self.ps2, reader).context(EmulatorCtx::SaveState)?;
        // pipeline timing is relative to the interpreter's own cycle count
        self.cpu = cpu::Interpreter::default();

        Ok(())
    }

    /// Runs a single iteration of the main loop: every unit advances by the scheduler's budget,
    /// then due events fire.
    pub fn step(&mut self) -> Result<(), EmulatorError> {
        let ps2 = &mut self.ps2;

        let ee = ps2.scheduler.calculate_run_cycles();
        let bus = ps2.scheduler.bus_run_cycles();
        let iop = ps2.scheduler.iop_run_cycles();
        ps2.scheduler.update_cycle_counts();

        self.cpu.run(ps2, ee).context(EmulatorCtx::Cpu)?;

        let devices = &mut ps2.devices;
        let mut hooks = devices::Hooks {
            scheduler: &mut ps2.scheduler,
            interrupts: &mut ps2.interrupts,
            interlock: &mut ps2.interlock,
        };

        devices.iop_dma.run(iop, &mut hooks);
        devices.iop.run(iop, &mut hooks);
        devices.dmac.run(bus, &mut hooks);
        devices.ipu.run(bus, &mut hooks);
        devices.vif0.run(bus, &mut hooks);
        devices.vif1.run(bus, &mut hooks);
        devices.gif.run(bus, &mut hooks);
        devices.vu0.run(ee, &mut hooks);
        devices.vu1.run(ee, &mut hooks);

        let int1 = devices.dmac.int1_pending();
        ps2.cpu
            .cop0
            .set_line(glimmer_core::cpu::cop0::Line::Int1, int1);

        Scheduler::process_events(ps2).context(EmulatorCtx::Scheduler)
    }

    /// Runs the system until the end of the current frame.
    pub fn run_frame(&mut self) -> Result<(), EmulatorError> {
        let ps2 = &mut self.ps2;
        let timing = ps2.timing;
        ps2.scheduler
            .add_event(ps2.handlers.vblank_start, timing.vblank_start as i64)
            .context(EmulatorCtx::Scheduler)?;
        ps2.scheduler
            .add_event(ps2.handlers.vblank_end, timing.cycles_per_frame as i64)
            .context(EmulatorCtx::Scheduler)?;

        ps2.frame.ended = false;
        while !self.ps2.frame.ended {
            self.step()?;
        }

        debug!(frame = self.ps2.frame.count, "frame complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::{GraphicsSynthesizer, Hooks, IoProcessor};
    use glimmer_core::mem::PhysicalAddress;
    use std::sync::{Arc, Mutex};

    // j 0xBFC00000 ; nop
    const SPIN: [u8; 8] = [0x00, 0x00, 0xF0, 0x0B, 0x00, 0x00, 0x00, 0x00];

    fn small_timing() -> FrameTiming {
        FrameTiming {
            cycles_per_frame: 20_000,
            vblank_start: 16_000,
            hblank_interval: 1_000,
            gs_vblank_delay: 500,
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum GsEvent {
        Vblank(bool),
        Hblank,
        Vsync,
    }

    #[derive(Default, Clone)]
    struct RecordingGs(Arc<Mutex<Vec<GsEvent>>>);

    impl devices::Device for RecordingGs {
        fn name(&self) -> &'static str {
            "recording_gs"
        }

        fn read32(&mut self, _: PhysicalAddress) -> u32 {
            0
        }

        fn write32(&mut self, _: PhysicalAddress, _: u32) {}
    }

    impl GraphicsSynthesizer for RecordingGs {
        fn wake(&mut self) {}

        fn vblank(&mut self, start: bool) {
            self.0.lock().unwrap().push(GsEvent::Vblank(start));
        }

        fn hblank(&mut self) {
            self.0.lock().unwrap().push(GsEvent::Hblank);
        }

        fn vsync(&mut self) {
            self.0.lock().unwrap().push(GsEvent::Vsync);
        }
    }

    #[derive(Default, Clone)]
    struct RecordingIop(Arc<Mutex<Vec<u8>>>);

    impl IoProcessor for RecordingIop {
        fn reset(&mut self) {}

        fn run(&mut self, _: u64, _: &mut Hooks<'_>) {}

        fn raise_interrupt(&mut self, irq: u8) {
            self.0.lock().unwrap().push(irq);
        }
    }

    fn emulator() -> Emulator {
        Emulator::new(Config {
            bios: SPIN.to_vec(),
            timing: small_timing(),
            icache: false,
        })
        .unwrap()
    }

    #[test]
    fn oversized_bios_is_rejected() {
        let config = Config {
            bios: vec![0; 4 * 1024 * 1024 + 1],
            ..Config::default()
        };

        assert!(matches!(
            PS2::new(config),
            Err(EmulatorError::BiosTooBig { size }) if size == 4 * 1024 * 1024 + 1
        ));
    }

    #[test]
    fn frame_runs_to_vblank_end() {
        let mut emulator = emulator();
        emulator.run_frame().unwrap();

        let ps2 = emulator.ps2();
        assert_eq!(ps2.frame.count, 1);
        assert!(!ps2.frame.vblank);
        assert_eq!(ps2.scheduler.elapsed(), 20_000);
        assert!(ps2.interrupts.status.is_requested(Interrupt::VblankStart));
        assert!(ps2.interrupts.status.is_requested(Interrupt::VblankEnd));

        emulator.run_frame().unwrap();
        assert_eq!(emulator.ps2().frame.count, 2);
        assert_eq!(emulator.ps2().scheduler.elapsed(), 40_000);
    }

    #[test]
    fn frame_events_reach_the_peripherals() {
        let mut emulator = emulator();
        let gs = RecordingGs::default();
        let iop = RecordingIop::default();
        emulator.ps2_mut().devices.gs = Box::new(gs.clone());
        emulator.ps2_mut().devices.iop = Box::new(iop.clone());

        emulator.run_frame().unwrap();

        let events = gs.0.lock().unwrap().clone();
        let hblanks = events.iter().filter(|e| **e == GsEvent::Hblank).count();
        assert_eq!(hblanks, 20);

        let frame_events: Vec<_> = events
            .into_iter()
            .filter(|e| *e != GsEvent::Hblank)
            .collect();
        assert_eq!(
            frame_events,
            vec![
                GsEvent::Vblank(true),
                GsEvent::Vsync,
                GsEvent::Vblank(false)
            ]
        );

        assert_eq!(*iop.0.lock().unwrap(), vec![0, 11]);
    }

    #[test]
    fn reset_restores_power_on_state() {
        let mut emulator = emulator();
        emulator.run_frame().unwrap();
        emulator.ps2_mut().memory.ram[0x100] = 0xFF;

        emulator.reset().unwrap();

        let ps2 = emulator.ps2();
        assert_eq!(ps2.scheduler.elapsed(), 0);
        assert_eq!(ps2.frame, Frame::default());
        assert_eq!(ps2.memory.ram[0x100], 0);
        assert_eq!(ps2.memory.bios[..8], SPIN);
        assert_eq!(ps2.cpu.pc.value(), 0xBFC0_0000);
        assert_eq!(ps2.scheduler.handler("vblank_end"), Some(ps2.handlers.vblank_end));

        // hblank timer only
        assert_eq!(ps2.scheduler.pending_events(), 0);
        assert_eq!(ps2.scheduler.next_deadline(), Some(1_000));
    }

    #[test]
    fn reset_keeps_icache_setting() {
        let mut emulator = Emulator::new(Config {
            icache: true,
            ..Config::default()
        })
        .unwrap();

        emulator.reset().unwrap();
        assert!(emulator.ps2().cpu.icache.enabled);
    }
}
