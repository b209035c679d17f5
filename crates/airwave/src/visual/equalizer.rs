//! Equalizer control surface
//!
//! View model for five vertical gain sliders. Holds only the selection; band
//! gains live in the player and every change is applied immediately.

use crate::audio::EqBand;
use crate::config::eq::{BAND_COUNT, GAIN_STEP_DB, MAX_GAIN_DB, MIN_GAIN_DB};
use crate::error::Result;
use crate::media::MediaElement;
use crate::player::RadioPlayer;

/// One slider as a front-end draws it
#[derive(Debug, Clone, PartialEq)]
pub struct SliderView {
    pub label: &'static str,
    pub gain_db: f32,
    /// Position of the knob in [0, 1], 0 at -12 dB
    pub fraction: f32,
    pub selected: bool,
}

/// Snap a gain onto the slider's 1 dB grid
pub fn snap_to_step(gain_db: f32) -> f32 {
    (gain_db / GAIN_STEP_DB).round() * GAIN_STEP_DB
}

/// Gain label, e.g. `+3 dB`, `0 dB`, `-12 dB`
pub fn format_gain(gain_db: f32) -> String {
    let snapped = snap_to_step(gain_db);
    if snapped > 0.0 {
        format!("+{} dB", snapped)
    } else if snapped < 0.0 {
        format!("{} dB", snapped)
    } else {
        "0 dB".to_string()
    }
}

fn slider_fraction(gain_db: f32) -> f32 {
    ((gain_db - MIN_GAIN_DB) / (MAX_GAIN_DB - MIN_GAIN_DB)).clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Default)]
pub struct EqualizerSurface {
    selected: usize,
}

impl EqualizerSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    /// Move the selection right, wrapping after the last band
    pub fn select_next(&mut self) {
        self.selected = (self.selected + 1) % BAND_COUNT;
    }

    pub fn select_prev(&mut self) {
        self.selected = (self.selected + BAND_COUNT - 1) % BAND_COUNT;
    }

    /// Raise the selected band by one step. Returns the stored gain.
    pub fn raise<M: MediaElement>(&self, player: &mut RadioPlayer<M>) -> Result<f32> {
        self.nudge(player, GAIN_STEP_DB)
    }

    /// Lower the selected band by one step. Returns the stored gain.
    pub fn lower<M: MediaElement>(&self, player: &mut RadioPlayer<M>) -> Result<f32> {
        self.nudge(player, -GAIN_STEP_DB)
    }

    pub fn reset<M: MediaElement>(&self, player: &mut RadioPlayer<M>) {
        player.reset_eq();
    }

    fn nudge<M: MediaElement>(&self, player: &mut RadioPlayer<M>, delta: f32) -> Result<f32> {
        let current = player
            .bands()
            .get(self.selected)
            .map(|b| b.gain_db)
            .unwrap_or(0.0);
        player.set_eq_band_gain(self.selected, snap_to_step(current + delta))
    }

    pub fn sliders(&self, bands: &[EqBand]) -> Vec<SliderView> {
        bands
            .iter()
            .enumerate()
            .map(|(i, band)| SliderView {
                label: band.label,
                gain_db: band.gain_db,
                fraction: slider_fraction(band.gain_db),
                selected: i == self.selected,
            })
            .collect()
    }
}
