//! Per-channel hardware leases.
//!
//! Each AFE channel carries a small holder bitmask.  A channel is wanted
//! enabled while any holder is present; the service compares that with
//! what it last applied and issues enable/disable calls only on change,
//! so no session ever disables hardware another one still needs.
//!
//! | holder        | ECG | BioZ |
//! |---------------|-----|------|
//! | `EcgSession`  |  ✓  |  ✓   |
//! | `GsrSession`  |     |  ✓   |
//! | `Background`  |     |  ✓   |

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LeaseHolder {
    EcgSession = 0b001,
    GsrSession = 0b010,
    /// GSR signal recorder kept alive after an ECG session by user setting.
    Background = 0b100,
}

impl LeaseHolder {
    pub fn mask(self) -> u8 {
        self as u8
    }
}

/// The two AFE channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwChannel {
    Ecg,
    Bioz,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelLease(u8);

impl ChannelLease {
    pub fn acquire(&mut self, holder: LeaseHolder) {
        self.0 |= holder.mask();
    }

    pub fn release(&mut self, holder: LeaseHolder) {
        self.0 &= !holder.mask();
    }

    pub fn is_held(self) -> bool {
        self.0 != 0
    }

    pub fn is_held_by(self, holder: LeaseHolder) -> bool {
        self.0 & holder.mask() != 0
    }

    pub fn holders(self) -> u8 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HwLeases {
    pub ecg: ChannelLease,
    pub bioz: ChannelLease,
}

impl HwLeases {
    pub fn channel(&self, channel: HwChannel) -> ChannelLease {
        match channel {
            HwChannel::Ecg => self.ecg,
            HwChannel::Bioz => self.bioz,
        }
    }

    pub fn acquire_ecg_session(&mut self) {
        self.ecg.acquire(LeaseHolder::EcgSession);
        self.bioz.acquire(LeaseHolder::EcgSession);
    }

    pub fn release_ecg_session(&mut self) {
        self.ecg.release(LeaseHolder::EcgSession);
        self.bioz.release(LeaseHolder::EcgSession);
    }

    /// Any channel wanted: the sampler should be running.
    pub fn any_held(&self) -> bool {
        self.ecg.is_held() || self.bioz.is_held()
    }
}
