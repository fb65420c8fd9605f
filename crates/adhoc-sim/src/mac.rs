//! 802.11b DCF timing.
//!
//! The MAC is modelled as a sequence of exclusive channel reservations. A sender waits for
//! its medium to go idle, then occupies it for DIFS, a random backoff, the data frame, SIFS
//! and the ACK. Every node in range of the sender sees its medium busy for the same span.
//! Frames never collide.

use meshbench_core::{
    scenario::PhyMode,
    units::{BitsPerSec, Bytes, Nanosecs},
};
use rand::Rng;

pub const SLOT: Nanosecs = Nanosecs::from_micros(20);
pub const SIFS: Nanosecs = Nanosecs::from_micros(10);
/// SIFS plus two slots.
pub const DIFS: Nanosecs = Nanosecs::from_micros(50);
pub const CW_MIN: u64 = 31;

/// Long PLCP preamble and header, always sent at 1 Mb/s.
pub const PLCP: Nanosecs = Nanosecs::from_micros(192);

/// Bytes added to an application payload on the air: UDP (8), IPv4 (20), LLC/SNAP (8) and
/// the MAC header with FCS (28).
pub const FRAME_OVERHEAD: Bytes = Bytes::new(64);

pub const ACK_SIZE: Bytes = Bytes::new(14);

/// Control rate for ACKs and broadcast frames.
pub const BASIC_RATE: BitsPerSec = BitsPerSec::new(1_000_000);

/// Frame durations for one PHY mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Airtime {
    data_rate: BitsPerSec,
    control_rate: BitsPerSec,
}

impl Airtime {
    pub fn new(data_mode: PhyMode, control_mode: PhyMode) -> Self {
        Self {
            data_rate: data_mode.data_rate(),
            control_rate: std::cmp::min(control_mode.data_rate(), BASIC_RATE),
        }
    }

    /// Time on air of a frame carrying `payload` application bytes.
    pub fn data_frame(&self, payload: Bytes) -> Nanosecs {
        PLCP + frame_time(self.data_rate, payload + FRAME_OVERHEAD)
    }

    pub fn ack(&self) -> Nanosecs {
        PLCP + frame_time(self.control_rate, ACK_SIZE)
    }

    /// A unicast exchange after channel access: data frame, SIFS and ACK.
    pub fn unicast(&self, payload: Bytes) -> Nanosecs {
        self.data_frame(payload) + SIFS + self.ack()
    }

    /// A broadcast frame after channel access. Broadcasts are not acknowledged.
    pub fn broadcast(&self, payload: Bytes) -> Nanosecs {
        PLCP + frame_time(self.control_rate, payload + FRAME_OVERHEAD)
    }

    /// The mean channel access delay: DIFS plus half the contention window.
    pub fn mean_access(&self) -> Nanosecs {
        DIFS + Nanosecs::new(SLOT.into_u64() * CW_MIN / 2)
    }
}

/// DIFS plus a uniformly random backoff of `[0, CW_MIN]` slots.
pub fn access_delay<R: Rng + ?Sized>(rng: &mut R) -> Nanosecs {
    let slots = rng.gen_range(0..=CW_MIN);
    DIFS + SLOT.saturating_mul(slots)
}

fn frame_time(rate: BitsPerSec, size: Bytes) -> Nanosecs {
    // Every PHY mode has a positive rate.
    rate.transmission_time(size).unwrap_or(Nanosecs::ZERO)
}

/// Per-node channel state.
#[derive(Debug, Clone)]
pub(crate) struct Medium {
    busy_until: Vec<Nanosecs>,
}

impl Medium {
    pub(crate) fn new(nr_nodes: usize) -> Self {
        Self {
            busy_until: vec![Nanosecs::ZERO; nr_nodes],
        }
    }

    /// When `node` next sees the channel idle, at or after `now`.
    pub(crate) fn idle_at(&self, node: usize, now: Nanosecs) -> Nanosecs {
        std::cmp::max(now, self.busy_until[node])
    }

    /// Marks the channel busy until `until` at every node in `nodes`.
    pub(crate) fn reserve(&mut self, nodes: impl IntoIterator<Item = usize>, until: Nanosecs) {
        for node in nodes {
            let busy = &mut self.busy_until[node];
            *busy = std::cmp::max(*busy, until);
        }
    }
}
