//! Items related to the subsystem interface (SIF) mailbox shared by the EE and the IOP.

/// Bit of the control register kept as written by the EE.
const CONTROL_EE_BIT: u32 = 0x100;

/// The SIF mailbox registers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Mailbox {
    /// Main (EE) to sub (IOP) command word.
    pub mscom: u32,
    /// Sub (IOP) to main (EE) command word.
    pub smcom: u32,
    /// Main to sub flags.
    pub msflag: u32,
    /// Sub to main flags.
    pub smflag: u32,
    pub control: u32,
}

impl Mailbox {
    pub fn set_mscom(&mut self, value: u32) {
        self.mscom = value;
    }

    pub fn set_smcom(&mut self, value: u32) {
        self.smcom = value;
    }

    /// EE write to `MSFLG`: sets bits.
    pub fn set_msflag(&mut self, value: u32) {
        self.msflag |= value;
    }

    /// IOP write to `MSFLG`: clears bits.
    pub fn reset_msflag(&mut self, value: u32) {
        self.msflag &= !value;
    }

    /// IOP write to `SMFLG`: sets bits.
    pub fn set_smflag(&mut self, value: u32) {
        self.smflag |= value;
    }

    /// EE write to `SMFLG`: clears bits.
    pub fn reset_smflag(&mut self, value: u32) {
        self.smflag &= !value;
    }

    /// EE write to the control register.
    pub fn set_control_ee(&mut self, value: u32) {
        self.control = (self.control & !CONTROL_EE_BIT) | (value & CONTROL_EE_BIT);
    }

    /// IOP write to the control register.
    pub fn set_control_iop(&mut self, value: u32) {
        let handshake = value & 0xF0;
        if value & 0xA0 != 0 {
            self.control &= !0xF000;
            self.control |= 0x2000;
        }

        if self.control & handshake != 0 {
            self.control &= !handshake;
        } else {
            self.control |= handshake;
        }
    }
}
