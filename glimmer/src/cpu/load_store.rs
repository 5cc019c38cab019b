use super::{DEFAULT_DELAY, Interpreter};
use crate::PS2;
use glimmer_core::{
    cpu::instr::Instruction,
    mem::{Address, Primitive},
};
use tracing::trace;

/// CACHE operations that invalidate an instruction cache line.
const CACHE_IXIN: u8 = 0x07;
const CACHE_IHIN: u8 = 0x0B;

impl Interpreter {
    /// `rs + signed_imm16`
    #[inline(always)]
    fn effective_address(ps2: &PS2, instr: Instruction) -> Address {
        let rs = ps2.cpu.regs.read32(instr.rs());
        Address(rs.wrapping_add_signed(i32::from(instr.signed_imm16())))
    }

    /// Loads a `P` from `addr`, raising an address error if it's misaligned.
    fn load<P>(&mut self, ps2: &mut PS2, addr: Address) -> Option<P>
    where
        P: Primitive,
    {
        match ps2.read_virtual::<P, false>(addr) {
            Ok(value) => Some(value),
            Err(_) => {
                self.address_error(ps2, addr, false);
                None
            }
        }
    }

    /// Stores a `P` to `addr`, raising an address error if it's misaligned.
    fn store<P>(&mut self, ps2: &mut PS2, addr: Address, value: P)
    where
        P: Primitive,
    {
        if ps2.write_virtual::<P, false>(addr, value).is_err() {
            self.address_error(ps2, addr, true);
        }
    }

    /// `rt = (signext)(byte)[rs + signed_imm16]`
    pub fn lb(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let addr = Self::effective_address(ps2, instr);
        if let Some(value) = self.load::<i8>(ps2, addr) {
            ps2.cpu.regs.write(instr.rt(), i64::from(value) as u64);
        }

        DEFAULT_DELAY
    }

    /// `rt = (zeroext)(byte)[rs + signed_imm16]`
    pub fn lbu(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let addr = Self::effective_address(ps2, instr);
        if let Some(value) = self.load::<u8>(ps2, addr) {
            ps2.cpu.regs.write(instr.rt(), u64::from(value));
        }

        DEFAULT_DELAY
    }

    /// `rt = (signext)(half)[rs + signed_imm16]`
    pub fn lh(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let addr = Self::effective_address(ps2, instr);
        if let Some(value) = self.load::<i16>(ps2, addr) {
            ps2.cpu.regs.write(instr.rt(), i64::from(value) as u64);
        }

        DEFAULT_DELAY
    }

    /// `rt = (zeroext)(half)[rs + signed_imm16]`
    pub fn lhu(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let addr = Self::effective_address(ps2, instr);
        if let Some(value) = self.load::<u16>(ps2, addr) {
            ps2.cpu.regs.write(instr.rt(), u64::from(value));
        }

        DEFAULT_DELAY
    }

    /// `rt = (signext)[rs + signed_imm16]`
    pub fn lw(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let addr = Self::effective_address(ps2, instr);
        if let Some(value) = self.load::<u32>(ps2, addr) {
            ps2.cpu.regs.write_sign_extended(instr.rt(), value);
        }

        DEFAULT_DELAY
    }

    /// `rt = (zeroext)[rs + signed_imm16]`
    pub fn lwu(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let addr = Self::effective_address(ps2, instr);
        if let Some(value) = self.load::<u32>(ps2, addr) {
            ps2.cpu.regs.write(instr.rt(), u64::from(value));
        }

        DEFAULT_DELAY
    }

    /// Merges the most significant bytes of an unaligned word into `rt`.
    pub fn lwl(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let addr = Self::effective_address(ps2, instr);
        let shift = (addr.value() & 3) * 8;
        let Some(mem) = self.load::<u32>(ps2, Address(addr.value() & !3)) else {
            return DEFAULT_DELAY;
        };

        let rt = ps2.cpu.regs.read32(instr.rt());
        let result = (rt & (0x00FF_FFFF >> shift)) | (mem << (24 - shift));
        ps2.cpu.regs.write_sign_extended(instr.rt(), result);

        DEFAULT_DELAY
    }

    /// Merges the least significant bytes of an unaligned word into `rt`.
    pub fn lwr(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let addr = Self::effective_address(ps2, instr);
        let shift = (addr.value() & 3) * 8;
        let Some(mem) = self.load::<u32>(ps2, Address(addr.value() & !3)) else {
            return DEFAULT_DELAY;
        };

        let rt = ps2.cpu.regs.read(instr.rt());
        let result = (rt as u32 & (0xFFFF_FF00 << (24 - shift))) | (mem >> shift);

        if shift == 0 {
            // the whole word was replaced
            ps2.cpu.regs.write_sign_extended(instr.rt(), result);
        } else {
            let upper = rt & 0xFFFF_FFFF_0000_0000;
            ps2.cpu.regs.write(instr.rt(), upper | u64::from(result));
        }

        DEFAULT_DELAY
    }

    /// `rt = [rs + signed_imm16]` (doubleword)
    pub fn ld(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let addr = Self::effective_address(ps2, instr);
        if let Some(value) = self.load::<u64>(ps2, addr) {
            ps2.cpu.regs.write(instr.rt(), value);
        }

        DEFAULT_DELAY
    }

    /// Merges the most significant bytes of an unaligned doubleword into `rt`.
    pub fn ldl(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let addr = Self::effective_address(ps2, instr);
        let shift = (addr.value() & 7) * 8;
        let Some(mem) = self.load::<u64>(ps2, Address(addr.value() & !7)) else {
            return DEFAULT_DELAY;
        };

        let rt = ps2.cpu.regs.read(instr.rt());
        let result = (rt & (0x00FF_FFFF_FFFF_FFFF >> shift)) | (mem << (56 - shift));
        ps2.cpu.regs.write(instr.rt(), result);

        DEFAULT_DELAY
    }

    /// Merges the least significant bytes of an unaligned doubleword into `rt`.
    pub fn ldr(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let addr = Self::effective_address(ps2, instr);
        let shift = (addr.value() & 7) * 8;
        let Some(mem) = self.load::<u64>(ps2, Address(addr.value() & !7)) else {
            return DEFAULT_DELAY;
        };

        let rt = ps2.cpu.regs.read(instr.rt());
        let result = (rt & (0xFFFF_FFFF_FFFF_FF00 << (56 - shift))) | (mem >> shift);
        ps2.cpu.regs.write(instr.rt(), result);

        DEFAULT_DELAY
    }

    /// `rt = [(rs + signed_imm16) & !0xF]` (quadword)
    pub fn lq(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let addr = Self::effective_address(ps2, instr);
        if let Some(value) = self.load::<u128>(ps2, Address(addr.value() & !0xF)) {
            ps2.cpu.regs.write128(instr.rt(), value);
        }

        DEFAULT_DELAY
    }

    /// `(byte)[rs + signed_imm16] = rt`
    pub fn sb(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let addr = Self::effective_address(ps2, instr);
        let rt = ps2.cpu.regs.read(instr.rt());
        self.store::<u8>(ps2, addr, rt as u8);

        DEFAULT_DELAY
    }

    /// `(half)[rs + signed_imm16] = rt`
    pub fn sh(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let addr = Self::effective_address(ps2, instr);
        let rt = ps2.cpu.regs.read(instr.rt());
        self.store::<u16>(ps2, addr, rt as u16);

        DEFAULT_DELAY
    }

    /// `[rs + signed_imm16] = rt`
    pub fn sw(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let addr = Self::effective_address(ps2, instr);
        let rt = ps2.cpu.regs.read32(instr.rt());
        self.store::<u32>(ps2, addr, rt);

        DEFAULT_DELAY
    }

    /// Stores the most significant bytes of `rt` to an unaligned word.
    pub fn swl(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let addr = Self::effective_address(ps2, instr);
        let aligned = Address(addr.value() & !3);
        let shift = (addr.value() & 3) * 8;
        let Some(mem) = self.load::<u32>(ps2, aligned) else {
            return DEFAULT_DELAY;
        };

        let rt = ps2.cpu.regs.read32(instr.rt());
        let result = (mem & (0xFFFF_FF00 << shift)) | (rt >> (24 - shift));
        self.store::<u32>(ps2, aligned, result);

        DEFAULT_DELAY
    }

    /// Stores the least significant bytes of `rt` to an unaligned word.
    pub fn swr(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let addr = Self::effective_address(ps2, instr);
        let aligned = Address(addr.value() & !3);
        let shift = (addr.value() & 3) * 8;
        let Some(mem) = self.load::<u32>(ps2, aligned) else {
            return DEFAULT_DELAY;
        };

        let rt = ps2.cpu.regs.read32(instr.rt());
        let result = (mem & (0x00FF_FFFF >> (24 - shift))) | (rt << shift);
        self.store::<u32>(ps2, aligned, result);

        DEFAULT_DELAY
    }

    /// `[rs + signed_imm16] = rt` (doubleword)
    pub fn sd(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let addr = Self::effective_address(ps2, instr);
        let rt = ps2.cpu.regs.read(instr.rt());
        self.store::<u64>(ps2, addr, rt);

        DEFAULT_DELAY
    }

    /// Stores the most significant bytes of `rt` to an unaligned doubleword.
    pub fn sdl(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let addr = Self::effective_address(ps2, instr);
        let aligned = Address(addr.value() & !7);
        let shift = (addr.value() & 7) * 8;
        let Some(mem) = self.load::<u64>(ps2, aligned) else {
            return DEFAULT_DELAY;
        };

        let rt = ps2.cpu.regs.read(instr.rt());
        let result = (mem & (0xFFFF_FFFF_FFFF_FF00 << shift)) | (rt >> (56 - shift));
        self.store::<u64>(ps2, aligned, result);

        DEFAULT_DELAY
    }

    /// Stores the least significant bytes of `rt` to an unaligned doubleword.
    pub fn sdr(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let addr = Self::effective_address(ps2, instr);
        let aligned = Address(addr.value() & !7);
        let shift = (addr.value() & 7) * 8;
        let Some(mem) = self.load::<u64>(ps2, aligned) else {
            return DEFAULT_DELAY;
        };

        let rt = ps2.cpu.regs.read(instr.rt());
        let result = (mem & (0x00FF_FFFF_FFFF_FFFF >> (56 - shift))) | (rt << shift);
        self.store::<u64>(ps2, aligned, result);

        DEFAULT_DELAY
    }

    /// `[(rs + signed_imm16) & !0xF] = rt` (quadword)
    pub fn sq(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let addr = Self::effective_address(ps2, instr);
        let rt = ps2.cpu.regs.read128(instr.rt());
        self.store::<u128>(ps2, Address(addr.value() & !0xF), rt);

        DEFAULT_DELAY
    }

    /// `fpr[ft] = [rs + signed_imm16]`
    pub fn lwc1(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let addr = Self::effective_address(ps2, instr);
        if let Some(value) = self.load::<u32>(ps2, addr) {
            ps2.cpu.fpu.write(instr.ft(), value);
        }

        DEFAULT_DELAY
    }

    /// `[rs + signed_imm16] = fpr[ft]`
    pub fn swc1(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let addr = Self::effective_address(ps2, instr);
        let value = ps2.cpu.fpu.read(instr.ft());
        self.store::<u32>(ps2, addr, value);

        DEFAULT_DELAY
    }

    /// `vf[ft] = [rs + signed_imm16]` (quadword)
    pub fn lqc2(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let addr = Self::effective_address(ps2, instr);
        if let Some(value) = self.load::<u128>(ps2, addr) {
            ps2.devices.vu0.write_vf(instr.ft(), value);
        }

        DEFAULT_DELAY
    }

    /// `[rs + signed_imm16] = vf[ft]` (quadword)
    pub fn sqc2(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let addr = Self::effective_address(ps2, instr);
        let value = ps2.devices.vu0.read_vf(instr.ft());
        self.store::<u128>(ps2, addr, value);

        DEFAULT_DELAY
    }

    /// Cache maintenance. Only instruction cache invalidation has an effect.
    pub fn cache(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let addr = Self::effective_address(ps2, instr);
        match instr.rt_bits() {
            CACHE_IXIN | CACHE_IHIN => ps2.cpu.icache.invalidate_index(addr),
            op => trace!(op, addr = %addr, "ignoring cache operation"),
        }

        DEFAULT_DELAY
    }
}
