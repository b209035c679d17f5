//! Five-band equalizer model
//!
//! Holds the band definitions and their current gains. The player mirrors
//! every change into the graph's filter stages.

use crate::config::eq::{BAND_COUNT, MAX_GAIN_DB, MIN_GAIN_DB};
use crate::error::{PlayerError, Result};

use super::types::{EqBand, FilterKind};

/// The fixed band layout: low shelf, three peaking bells, high shelf
pub const DEFAULT_BANDS: [EqBand; BAND_COUNT] = [
    EqBand::new(60.0, FilterKind::LowShelf, "60Hz"),
    EqBand::new(250.0, FilterKind::Peaking, "250Hz"),
    EqBand::new(1000.0, FilterKind::Peaking, "1kHz"),
    EqBand::new(4000.0, FilterKind::Peaking, "4kHz"),
    EqBand::new(12000.0, FilterKind::HighShelf, "12kHz"),
];

/// Clamp a requested gain into the allowed range. NaN counts as flat.
pub fn clamp_gain(gain_db: f32) -> f32 {
    if gain_db.is_nan() {
        0.0
    } else {
        gain_db.clamp(MIN_GAIN_DB, MAX_GAIN_DB)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Equalizer {
    bands: [EqBand; BAND_COUNT],
}

impl Default for Equalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Equalizer {
    pub fn new() -> Self {
        Self {
            bands: DEFAULT_BANDS,
        }
    }

    pub fn bands(&self) -> &[EqBand] {
        &self.bands
    }

    pub fn band(&self, index: usize) -> Option<&EqBand> {
        self.bands.get(index)
    }

    /// Set one band's gain. Returns the stored (clamped) value.
    pub fn set_gain(&mut self, index: usize, gain_db: f32) -> Result<f32> {
        let band = self
            .bands
            .get_mut(index)
            .ok_or(PlayerError::InvalidBand(index))?;
        band.gain_db = clamp_gain(gain_db);
        Ok(band.gain_db)
    }

    /// Flatten every band
    pub fn reset(&mut self) {
        for band in &mut self.bands {
            band.gain_db = 0.0;
        }
    }

    pub fn gains(&self) -> [f32; BAND_COUNT] {
        let mut gains = [0.0; BAND_COUNT];
        for (gain, band) in gains.iter_mut().zip(&self.bands) {
            *gain = band.gain_db;
        }
        gains
    }

    pub fn is_flat(&self) -> bool {
        self.bands.iter().all(|b| b.gain_db == 0.0)
    }
}
