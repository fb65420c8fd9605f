//! Free-space propagation.

use std::f64::consts::PI;

use meshbench_core::units::{Dbm, Nanosecs};

/// Propagation speed, in meters per second.
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// 802.11b channel 1.
pub const DEFAULT_FREQUENCY: f64 = 2.412e9;

/// Weakest signal a receiver detects.
pub const DEFAULT_ENERGY_DETECTION_THRESHOLD: Dbm = Dbm::new(-96.0);

/// Friis free-space path loss with a system loss of 1.
#[derive(Debug, Clone, Copy, PartialEq, typed_builder::TypedBuilder)]
pub struct Friis {
    /// Carrier frequency, in hertz.
    #[builder(default = DEFAULT_FREQUENCY)]
    pub frequency: f64,
    /// Transmit antenna gain, in dB.
    #[builder(default)]
    pub tx_gain: f64,
    /// Receive antenna gain, in dB.
    #[builder(default)]
    pub rx_gain: f64,
}

impl Default for Friis {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Friis {
    pub fn wavelength(&self) -> f64 {
        SPEED_OF_LIGHT / self.frequency
    }

    /// Received power at `distance` meters. Co-located nodes lose nothing.
    pub fn rx_power(&self, tx_power: Dbm, distance: f64) -> Dbm {
        let gains = tx_power.into_f64() + self.tx_gain + self.rx_gain;
        if distance <= 0.0 {
            return Dbm::new(gains);
        }
        let loss = 20.0 * (4.0 * PI * distance / self.wavelength()).log10();
        Dbm::new(gains - loss)
    }

    /// The distance at which the received power drops to `threshold`.
    pub fn range(&self, tx_power: Dbm, threshold: Dbm) -> f64 {
        let budget = tx_power.into_f64() + self.tx_gain + self.rx_gain - threshold.into_f64();
        self.wavelength() / (4.0 * PI) * 10f64.powf(budget / 20.0)
    }
}

/// Time for a signal to travel `distance` meters, rounded to the nearest nanosecond.
pub fn delay(distance: f64) -> Nanosecs {
    Nanosecs::from_secs_f64(distance / SPEED_OF_LIGHT)
}
