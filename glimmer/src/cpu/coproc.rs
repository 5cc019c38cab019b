use super::{DEFAULT_DELAY, Interpreter};
use crate::PS2;
use glimmer_core::{
    cpu::{
        cop0::Exception,
        fpu::Condition,
        instr::{Instruction, Operation},
    },
    interlock::{Rendezvous, Side},
};
use tracing::{debug, trace};

impl Interpreter {
    /// `rt = cop0[rd]`
    pub fn mfc0(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let value = ps2.cpu.cop0.read(instr.rd_bits());
        ps2.cpu.regs.write_sign_extended(instr.rt(), value);

        DEFAULT_DELAY
    }

    /// `cop0[rd] = rt`
    pub fn mtc0(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let rt = ps2.cpu.regs.read32(instr.rt());
        ps2.cpu.cop0.write(instr.rd_bits(), rt);

        DEFAULT_DELAY
    }

    /// TLB maintenance. Every address is translated by segment, so these do nothing.
    pub fn tlb(&mut self, _: &mut PS2, _: Instruction, operation: Operation) -> u64 {
        trace!(op = operation.mnemonic(), "ignoring TLB operation");
        DEFAULT_DELAY
    }

    /// Returns from an exception. Has no delay slot.
    pub fn eret(&mut self, ps2: &mut PS2, _: Instruction) -> u64 {
        let target = ps2.cpu.cop0.exception_return();
        ps2.cpu.jump_to(target);

        DEFAULT_DELAY
    }

    /// `Status.EIE = 1`
    pub fn ei(&mut self, ps2: &mut PS2, _: Instruction) -> u64 {
        if !ps2.cpu.cop0.set_master_enable(true) {
            debug!(at = %self.current_addr, "EI ignored outside of kernel mode");
        }

        DEFAULT_DELAY
    }

    /// `Status.EIE = 0`
    pub fn di(&mut self, ps2: &mut PS2, _: Instruction) -> u64 {
        if !ps2.cpu.cop0.set_master_enable(false) {
            debug!(at = %self.current_addr, "DI ignored outside of kernel mode");
        }

        DEFAULT_DELAY
    }

    /// Branches on the DMAC's CPCOND0 line.
    pub fn bc0(&mut self, ps2: &mut PS2, instr: Instruction, test_true: bool, likely: bool) -> u64 {
        let condition = ps2.devices.dmac.cpcond0();
        self.branch(ps2, instr, condition == test_true, likely)
    }

    /// `rt = fpr[fs]`
    pub fn mfc1(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let value = ps2.cpu.fpu.read(instr.fs());
        ps2.cpu.regs.write_sign_extended(instr.rt(), value);

        DEFAULT_DELAY
    }

    /// `fpr[fs] = rt`
    pub fn mtc1(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let rt = ps2.cpu.regs.read32(instr.rt());
        ps2.cpu.fpu.write(instr.fs(), rt);

        DEFAULT_DELAY
    }

    /// `rt = fcr[fs]`
    pub fn cfc1(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let value = ps2.cpu.fpu.read_control(instr.fs());
        ps2.cpu.regs.write_sign_extended(instr.rt(), value);

        DEFAULT_DELAY
    }

    /// `fcr[fs] = rt`
    pub fn ctc1(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        let rt = ps2.cpu.regs.read32(instr.rt());
        ps2.cpu.fpu.write_control(instr.fs(), rt);

        DEFAULT_DELAY
    }

    /// Branches on the FPU condition flag.
    pub fn bc1(&mut self, ps2: &mut PS2, instr: Instruction, test_true: bool, likely: bool) -> u64 {
        let condition = ps2.cpu.fpu.control.condition();
        self.branch(ps2, instr, condition == test_true, likely)
    }

    /// Single precision arithmetic.
    pub fn fpu_arith(&mut self, ps2: &mut PS2, instr: Instruction, operation: Operation) -> u64 {
        use Operation as O;

        let (fd, fs, ft) = (instr.fd(), instr.fs(), instr.ft());
        let fpu = &mut ps2.cpu.fpu;
        match operation {
            O::ADDS => fpu.add(fd, fs, ft),
            O::SUBS => fpu.sub(fd, fs, ft),
            O::MULS => fpu.mul(fd, fs, ft),
            O::DIVS => fpu.div(fd, fs, ft),
            O::SQRTS => fpu.sqrt(fd, ft),
            O::RSQRTS => fpu.rsqrt(fd, fs, ft),
            O::ABSS => fpu.abs(fd, fs),
            O::MOVS => fpu.mov(fd, fs),
            O::NEGS => fpu.neg(fd, fs),
            O::ADDAS => fpu.adda(fs, ft),
            O::SUBAS => fpu.suba(fs, ft),
            O::MULAS => fpu.mula(fs, ft),
            O::MADDS => fpu.madd(fd, fs, ft),
            O::MSUBS => fpu.msub(fd, fs, ft),
            O::MADDAS => fpu.madda(fs, ft),
            O::MSUBAS => fpu.msuba(fs, ft),
            O::MAXS => fpu.max(fd, fs, ft),
            O::MINS => fpu.min(fd, fs, ft),
            O::CVTWS => fpu.cvt_w(fd, fs),
            O::CVTSW => fpu.cvt_s(fd, fs),
            _ => return self.raise(ps2, Exception::ReservedInstruction),
        }

        DEFAULT_DELAY
    }

    /// `C.cond.S`: sets the FPU condition flag.
    pub fn fpu_compare(&mut self, ps2: &mut PS2, instr: Instruction, condition: Condition) -> u64 {
        ps2.cpu.fpu.compare(condition, instr.fs(), instr.ft());
        DEFAULT_DELAY
    }

    /// With the interlock bit, waits for the interlock rendezvous. An idle VU0 is parked at its
    /// synchronization point and satisfies it right away. Without it, waits for VU0 to stop.
    /// Returns `false` if the instruction has to be issued again.
    fn cop2_ready(&mut self, ps2: &mut PS2, instr: Instruction) -> bool {
        if instr.interlock() {
            let rendezvous = match ps2.interlock.request(Side::Cop2) {
                Rendezvous::Wait if !ps2.devices.vu0.is_running() => {
                    ps2.interlock.request(Side::Vu)
                }
                rendezvous => rendezvous,
            };

            return match rendezvous {
                Rendezvous::Wait => {
                    self.reissue(ps2);
                    false
                }
                Rendezvous::Satisfied => {
                    ps2.interlock.clear();
                    true
                }
            };
        }

        if ps2.devices.vu0.is_running() {
            self.reissue(ps2);
            return false;
        }

        true
    }

    /// `rt = vf[rd]` (quadword)
    pub fn qmfc2(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        if self.cop2_ready(ps2, instr) {
            let value = ps2.devices.vu0.read_vf(instr.rd_bits());
            ps2.cpu.regs.write128(instr.rt(), value);
        }

        DEFAULT_DELAY
    }

    /// `vf[rd] = rt` (quadword)
    pub fn qmtc2(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        if self.cop2_ready(ps2, instr) {
            let rt = ps2.cpu.regs.read128(instr.rt());
            ps2.devices.vu0.write_vf(instr.rd_bits(), rt);
        }

        DEFAULT_DELAY
    }

    /// `rt = vi[rd]`
    pub fn cfc2(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        if self.cop2_ready(ps2, instr) {
            let value = ps2.devices.vu0.read_vi(instr.rd_bits());
            ps2.cpu.regs.write_sign_extended(instr.rt(), value);
        }

        DEFAULT_DELAY
    }

    /// `vi[rd] = rt`
    pub fn ctc2(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        if self.cop2_ready(ps2, instr) {
            let rt = ps2.cpu.regs.read32(instr.rt());
            ps2.devices.vu0.write_vi(instr.rd_bits(), rt);
        }

        DEFAULT_DELAY
    }

    /// Branches on whether VU0 is running a micro program.
    pub fn bc2(&mut self, ps2: &mut PS2, instr: Instruction, test_true: bool, likely: bool) -> u64 {
        let condition = ps2.devices.vu0.is_running();
        self.branch(ps2, instr, condition == test_true, likely)
    }

    /// Forwards a macro mode operation to VU0 once it's idle.
    pub fn vmacro(&mut self, ps2: &mut PS2, instr: Instruction) -> u64 {
        if ps2.devices.vu0.is_running() {
            return self.reissue(ps2);
        }

        ps2.devices.vu0.macro_op(instr.to_bits());
        DEFAULT_DELAY
    }
}
