//! Equalizer filter stages
//!
//! `FilterStage` is the control-side handle of one biquad stage.
//! `EqualizerSource` wraps any `rodio::Source<Item=f32>` and runs the stages
//! in series, picking up gain changes without rebuilding the chain.

use std::num::NonZero;
use std::sync::Arc;
use std::time::Duration;

use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz, Type};
use rodio::Source;
use tracing::warn;

use crate::config::eq::{PARAM_REFRESH_FRAMES, PEAKING_Q, SHELF_Q};

use super::eq::clamp_gain;
use super::types::{AtomicF32, EqBand, FilterKind, SharedParam};

/// Control handle of one filter stage
#[derive(Debug, Clone)]
pub struct FilterStage {
    kind: FilterKind,
    frequency_hz: f32,
    q: f32,
    gain_db: SharedParam,
}

impl FilterStage {
    /// Configure a stage from its band
    pub fn from_band(band: &EqBand) -> Self {
        let q = match band.kind {
            FilterKind::Peaking => PEAKING_Q,
            FilterKind::LowShelf | FilterKind::HighShelf => SHELF_Q,
        };
        Self {
            kind: band.kind,
            frequency_hz: band.frequency_hz,
            q,
            gain_db: Arc::new(AtomicF32::new(clamp_gain(band.gain_db))),
        }
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    pub fn frequency_hz(&self) -> f32 {
        self.frequency_hz
    }

    pub fn q(&self) -> f32 {
        self.q
    }

    pub fn gain_db(&self) -> f32 {
        self.gain_db.load()
    }

    /// Update the gain in place; the audio thread picks it up on its next refresh
    pub fn set_gain_db(&self, gain_db: f32) {
        self.gain_db.store(clamp_gain(gain_db));
    }

    /// Biquad coefficients for this stage at the given sample rate.
    ///
    /// Stages whose corner sits above Nyquist pass audio through untouched.
    pub fn coefficients(&self, sample_rate: u32, gain_db: f32) -> Coefficients<f32> {
        let filter_type = match self.kind {
            FilterKind::LowShelf => Type::LowShelf(gain_db),
            FilterKind::Peaking => Type::PeakingEQ(gain_db),
            FilterKind::HighShelf => Type::HighShelf(gain_db),
        };
        let fs = (sample_rate as f32).hz();
        match Coefficients::<f32>::from_params(filter_type, fs, self.frequency_hz.hz(), self.q) {
            Ok(coeffs) => coeffs,
            Err(e) => {
                warn!(
                    "{} stage at {} Hz bypassed at {} Hz sample rate: {:?}",
                    self.kind, self.frequency_hz, sample_rate, e
                );
                passthrough()
            }
        }
    }
}

fn passthrough() -> Coefficients<f32> {
    Coefficients {
        a1: 0.0,
        a2: 0.0,
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
    }
}

/// Source that runs decoded audio through the equalizer stages in order
pub struct EqualizerSource<S> {
    inner: S,
    stages: Vec<FilterStage>,
    /// Gain each stage's coefficients were last computed for
    applied: Vec<f32>,
    /// One filter chain per channel: `filters[channel][stage]`
    filters: Vec<Vec<DirectForm2Transposed<f32>>>,
    channels: NonZero<u16>,
    sample_rate: NonZero<u32>,
    channel_idx: usize,
    frames_until_refresh: usize,
}

impl<S> EqualizerSource<S>
where
    S: Source<Item = f32>,
{
    /// Wrap `source` with the given stages (applied in slice order)
    pub fn new(source: S, stages: &[FilterStage]) -> Self {
        let channels = source.channels();
        let sample_rate = source.sample_rate();
        let applied: Vec<f32> = stages.iter().map(|s| s.gain_db()).collect();
        let chain: Vec<DirectForm2Transposed<f32>> = stages
            .iter()
            .zip(&applied)
            .map(|(stage, &gain)| {
                DirectForm2Transposed::<f32>::new(stage.coefficients(sample_rate.get(), gain))
            })
            .collect();
        let filters = vec![chain; channels.get() as usize];

        Self {
            inner: source,
            stages: stages.to_vec(),
            applied,
            filters,
            channels,
            sample_rate,
            channel_idx: 0,
            frames_until_refresh: PARAM_REFRESH_FRAMES,
        }
    }

    fn refresh_coefficients(&mut self) {
        for (i, stage) in self.stages.iter().enumerate() {
            let gain = stage.gain_db();
            if gain.to_bits() == self.applied[i].to_bits() {
                continue;
            }
            let coeffs = stage.coefficients(self.sample_rate.get(), gain);
            for chain in &mut self.filters {
                chain[i].update_coefficients(coeffs);
            }
            self.applied[i] = gain;
        }
    }
}

impl<S> Iterator for EqualizerSource<S>
where
    S: Source<Item = f32>,
{
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.channel_idx == 0 {
            if self.frames_until_refresh == 0 {
                self.refresh_coefficients();
                self.frames_until_refresh = PARAM_REFRESH_FRAMES;
            }
            self.frames_until_refresh -= 1;
        }

        let sample = self.inner.next()?;
        let chain = &mut self.filters[self.channel_idx];
        let out = chain.iter_mut().fold(sample, |acc, f| f.run(acc));

        self.channel_idx = (self.channel_idx + 1) % self.channels.get() as usize;
        Some(out)
    }
}

impl<S> Source for EqualizerSource<S>
where
    S: Source<Item = f32>,
{
    fn current_span_len(&self) -> Option<usize> {
        self.inner.current_span_len()
    }

    fn channels(&self) -> NonZero<u16> {
        self.channels
    }

    fn sample_rate(&self) -> NonZero<u32> {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        self.inner.total_duration()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::eq::DEFAULT_BANDS;
    use rodio::buffer::SamplesBuffer;

    fn default_stages() -> Vec<FilterStage> {
        DEFAULT_BANDS.iter().map(FilterStage::from_band).collect()
    }

    fn sine(freq: f32, sample_rate: u32, len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| {
                (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin() * amplitude
            })
            .collect()
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    fn mono(samples: Vec<f32>) -> SamplesBuffer {
        SamplesBuffer::new(
            NonZero::new(1).unwrap(),
            NonZero::new(44100).unwrap(),
            samples,
        )
    }

    #[test]
    fn stage_q_follows_kind() {
        let stages = default_stages();
        assert_eq!(stages[0].q(), SHELF_Q);
        assert_eq!(stages[1].q(), 1.0);
        assert_eq!(stages[2].q(), 1.0);
        assert_eq!(stages[3].q(), 1.0);
        assert_eq!(stages[4].q(), SHELF_Q);
    }

    #[test]
    fn stage_gain_is_clamped() {
        let stage = FilterStage::from_band(&DEFAULT_BANDS[2]);
        stage.set_gain_db(30.0);
        assert_eq!(stage.gain_db(), 12.0);
        stage.set_gain_db(-30.0);
        assert_eq!(stage.gain_db(), -12.0);
    }

    #[test]
    fn stage_clones_share_gain() {
        let stage = FilterStage::from_band(&DEFAULT_BANDS[1]);
        let audio_side = stage.clone();
        stage.set_gain_db(5.0);
        assert_eq!(audio_side.gain_db(), 5.0);
    }

    #[test]
    fn flat_eq_is_transparent() {
        let input = sine(440.0, 44100, 4096, 0.5);
        let output: Vec<f32> = EqualizerSource::new(mono(input.clone()), &default_stages()).collect();
        assert_eq!(output.len(), input.len());
        for (a, b) in input.iter().zip(&output) {
            assert!((a - b).abs() < 1e-4, "flat EQ changed {a} to {b}");
        }
    }

    #[test]
    fn peaking_boost_raises_level_at_center() {
        let stages = default_stages();
        stages[2].set_gain_db(12.0);
        let input = sine(1000.0, 44100, 44100, 0.1);
        let output: Vec<f32> = EqualizerSource::new(mono(input.clone()), &stages).collect();
        // skip the filter's settling time
        let gain = rms(&output[4410..]) / rms(&input[4410..]);
        assert!(gain > 3.0, "expected ~4x boost at 1 kHz, got {gain}");
    }

    #[test]
    fn peaking_cut_lowers_level_at_center() {
        let stages = default_stages();
        stages[3].set_gain_db(-12.0);
        let input = sine(4000.0, 44100, 44100, 0.5);
        let output: Vec<f32> = EqualizerSource::new(mono(input.clone()), &stages).collect();
        let gain = rms(&output[4410..]) / rms(&input[4410..]);
        assert!(gain < 0.4, "expected ~0.25x cut at 4 kHz, got {gain}");
    }

    #[test]
    fn gain_change_applies_mid_stream() {
        let stages = default_stages();
        let input = sine(1000.0, 44100, 44100, 0.1);
        let mut source = EqualizerSource::new(mono(input.clone()), &stages);

        let before: Vec<f32> = source.by_ref().take(22050).collect();
        stages[2].set_gain_db(12.0);
        let after: Vec<f32> = source.collect();

        let before_gain = rms(&before[4410..]) / rms(&input[4410..22050]);
        let after_gain = rms(&after[4410..]) / rms(&input[22050 + 4410..]);
        assert!((before_gain - 1.0).abs() < 0.05);
        assert!(after_gain > 3.0);
    }

    #[test]
    fn stereo_channels_filtered_independently() {
        let stages = default_stages();
        stages[0].set_gain_db(-12.0);
        // left: 60 Hz tone, right: silence
        let left = sine(60.0, 44100, 44100, 0.5);
        let mut interleaved = Vec::with_capacity(left.len() * 2);
        for s in &left {
            interleaved.push(*s);
            interleaved.push(0.0);
        }
        let source = SamplesBuffer::new(
            NonZero::new(2).unwrap(),
            NonZero::new(44100).unwrap(),
            interleaved,
        );
        let output: Vec<f32> = EqualizerSource::new(source, &stages).collect();
        let right: Vec<f32> = output.iter().skip(1).step_by(2).copied().collect();
        assert!(right.iter().all(|s| s.abs() < 1e-6), "silent channel picked up signal");
        let left_out: Vec<f32> = output.iter().step_by(2).copied().collect();
        assert!(rms(&left_out[8820..]) < rms(&left[8820..]) * 0.7);
    }

    #[test]
    fn stage_above_nyquist_is_bypassed() {
        let stages = default_stages();
        stages[4].set_gain_db(12.0);
        let input = sine(440.0, 16000, 4096, 0.5);
        let source = SamplesBuffer::new(
            NonZero::new(1).unwrap(),
            NonZero::new(16000).unwrap(),
            input.clone(),
        );
        // 12 kHz shelf cannot exist at 16 kHz; output must still be finite and near input
        let output: Vec<f32> = EqualizerSource::new(source, &stages).collect();
        assert!(output.iter().all(|s| s.is_finite()));
        assert!((rms(&output) - rms(&input)).abs() < 0.01);
    }

    #[test]
    fn source_metadata_passthrough() {
        let source = mono(vec![0.0; 10]);
        let eq = EqualizerSource::new(source, &default_stages());
        assert_eq!(eq.channels().get(), 1);
        assert_eq!(eq.sample_rate().get(), 44100);
    }
}
