//! The COP2 <-> VU0 interlock.
//!
//! Both sides can reach a synchronization point independently. A side that arrives first sets
//! its flag and must wait; it polls again later. Once both flags are set, both callers see
//! the rendezvous satisfied. Nothing here blocks.

/// One of the two parties of the interlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The EE's COP2 path (`QMFC2.I`, `QMTC2.I`, `CFC2.I`, `CTC2.I`).
    Cop2,
    /// The VU0 micro program.
    Vu,
}

/// Result of an interlock request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rendezvous {
    /// The other side has not arrived yet; re-issue the request later.
    Wait,
    /// Both sides have arrived.
    Satisfied,
}

/// The interlock flag pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Interlock {
    cop2: bool,
    vu: bool,
}

impl Interlock {
    /// Creates an interlock with the given flags.
    pub const fn from_flags(cop2: bool, vu: bool) -> Self {
        Self { cop2, vu }
    }

    /// Marks `side` as having reached the synchronization point.
    pub fn request(&mut self, side: Side) -> Rendezvous {
        let other = match side {
            Side::Cop2 => {
                self.cop2 = true;
                self.vu
            }
            Side::Vu => {
                self.vu = true;
                self.cop2
            }
        };

        if other {
            Rendezvous::Satisfied
        } else {
            Rendezvous::Wait
        }
    }

    /// Clears both flags.
    pub fn clear(&mut self) {
        self.cop2 = false;
        self.vu = false;
    }

    /// Whether the VU side has reached the synchronization point.
    pub fn vu_reached(&self) -> bool {
        self.vu
    }

    pub fn cop2_flag(&self) -> bool {
        self.cop2
    }

    pub fn vu_flag(&self) -> bool {
        self.vu
    }
}
