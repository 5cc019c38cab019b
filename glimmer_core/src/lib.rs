//! Core crate of the glimmer PS2 emulator. This crate contains the state of the machine and the
//! logic to decode it (registers, instruction words, memory map, interrupt controller) but no
//! behaviour of its own: executing the machine is the job of the `glimmer` crate.

pub mod cpu;
pub mod interlock;
pub mod interrupts;
pub mod mem;
pub mod sif;
pub mod util;

pub use arrayvec;
