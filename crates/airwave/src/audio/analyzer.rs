//! Spectrum analyzer stage
//!
//! `AnalyzingSource` wraps any `rodio::Source<Item=f32>`, down-mixes each
//! frame to mono and runs an FFT over every full window. Results land in a
//! shared `SpectrumData` as smoothed magnitudes and byte-scaled bins that the
//! spectrum renderer reads once per display frame.

use std::num::NonZero;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rodio::Source;
use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::config::audio::{
    FFT_SIZE, FREQUENCY_BIN_COUNT, MAX_DECIBELS, MIN_DECIBELS, SMOOTHING_TIME_CONSTANT,
};

/// Latest analyzer output
#[derive(Debug, Clone)]
pub struct SpectrumData {
    /// Smoothed linear magnitude per bin
    pub magnitudes: Vec<f32>,
    /// Magnitudes mapped onto 0..=255 over the decibel range
    pub bytes: Vec<u8>,
    /// Number of FFT windows processed
    pub windows: u64,
}

impl Default for SpectrumData {
    fn default() -> Self {
        Self {
            magnitudes: vec![0.0; FREQUENCY_BIN_COUNT],
            bytes: vec![0; FREQUENCY_BIN_COUNT],
            windows: 0,
        }
    }
}

impl SpectrumData {
    /// Reset all analysis values to zero
    pub fn reset(&mut self) {
        self.magnitudes.iter_mut().for_each(|m| *m = 0.0);
        self.bytes.iter_mut().for_each(|b| *b = 0);
        self.windows = 0;
    }
}

/// Thread-safe handle to analyzer output
pub type SharedSpectrum = Arc<Mutex<SpectrumData>>;

/// Create a new, silent spectrum slot
pub fn new_shared_spectrum() -> SharedSpectrum {
    Arc::new(Mutex::new(SpectrumData::default()))
}

/// Map a linear magnitude onto the analyzer's byte scale
pub fn magnitude_to_byte(magnitude: f32) -> u8 {
    if magnitude <= 0.0 {
        return 0;
    }
    let db = 20.0 * magnitude.log10();
    let scaled = 255.0 * (db - MIN_DECIBELS) / (MAX_DECIBELS - MIN_DECIBELS);
    scaled.clamp(0.0, 255.0) as u8
}

/// Wrapper source that feeds the spectrum analyzer
pub struct AnalyzingSource<S> {
    inner: S,
    spectrum: SharedSpectrum,
    window: Vec<f32>,
    frame_sum: f32,
    channel_idx: u16,
    channels: NonZero<u16>,
    sample_rate: NonZero<u32>,
    fft: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl<S> AnalyzingSource<S>
where
    S: Source<Item = f32>,
{
    /// Create a new analyzing wrapper around the given source
    pub fn new(source: S, spectrum: SharedSpectrum) -> Self {
        let channels = source.channels();
        let sample_rate = source.sample_rate();
        let fft = FftPlanner::new().plan_fft_forward(FFT_SIZE);
        Self {
            inner: source,
            spectrum,
            window: Vec::with_capacity(FFT_SIZE),
            frame_sum: 0.0,
            channel_idx: 0,
            channels,
            sample_rate,
            fft,
            scratch: Vec::with_capacity(FFT_SIZE),
        }
    }

    fn process_window(&mut self) {
        // Blackman window, then forward FFT
        self.scratch.clear();
        self.scratch
            .extend(self.window.iter().enumerate().map(|(i, &s)| {
                let x = 2.0 * std::f32::consts::PI * i as f32 / FFT_SIZE as f32;
                let w = 0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos();
                Complex::new(s * w, 0.0)
            }));
        self.fft.process(&mut self.scratch);

        let norm = 1.0 / FFT_SIZE as f32;
        if let Ok(mut data) = self.spectrum.lock() {
            let SpectrumData {
                magnitudes, bytes, ..
            } = &mut *data;
            for ((mag, byte), bin) in magnitudes
                .iter_mut()
                .zip(bytes.iter_mut())
                .zip(&self.scratch[..FREQUENCY_BIN_COUNT])
            {
                let raw = bin.norm() * norm;
                *mag = SMOOTHING_TIME_CONSTANT * *mag + (1.0 - SMOOTHING_TIME_CONSTANT) * raw;
                *byte = magnitude_to_byte(*mag);
            }
            data.windows += 1;
        }

        self.window.clear();
    }
}

impl<S> Iterator for AnalyzingSource<S>
where
    S: Source<Item = f32>,
{
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        let sample = self.inner.next()?;

        self.frame_sum += sample;
        self.channel_idx += 1;
        if self.channel_idx == self.channels.get() {
            self.window.push(self.frame_sum / self.channels.get() as f32);
            self.frame_sum = 0.0;
            self.channel_idx = 0;
            if self.window.len() == FFT_SIZE {
                self.process_window();
            }
        }

        Some(sample)
    }
}

impl<S> Source for AnalyzingSource<S>
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
    use rodio::buffer::SamplesBuffer;

    fn mono(samples: Vec<f32>) -> SamplesBuffer {
        SamplesBuffer::new(
            NonZero::new(1).unwrap(),
            NonZero::new(44100).unwrap(),
            samples,
        )
    }

    fn sine(freq: f32, len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / 44100.0).sin() * amplitude)
            .collect()
    }

    fn peak_bin(bytes: &[u8]) -> usize {
        bytes
            .iter()
            .enumerate()
            .max_by_key(|(_, &b)| b)
            .map(|(i, _)| i)
            .unwrap()
    }

    // --- Passthrough behavior ---

    #[test]
    fn passthrough_samples_mono() {
        let input: Vec<f32> = (0..100).map(|i| i as f32 / 100.0).collect();
        let analyzing = AnalyzingSource::new(mono(input.clone()), new_shared_spectrum());
        let output: Vec<f32> = analyzing.collect();
        assert_eq!(output, input);
    }

    #[test]
    fn passthrough_samples_stereo() {
        let input: Vec<f32> = (0..2048).map(|i| (i as f32 - 1024.0) / 1024.0).collect();
        let source = SamplesBuffer::new(
            NonZero::new(2).unwrap(),
            NonZero::new(44100).unwrap(),
            input.clone(),
        );
        let output: Vec<f32> = AnalyzingSource::new(source, new_shared_spectrum()).collect();
        assert_eq!(output, input);
    }

    #[test]
    fn passthrough_empty_source() {
        let output: Vec<f32> = AnalyzingSource::new(mono(Vec::new()), new_shared_spectrum()).collect();
        assert!(output.is_empty());
    }

    // --- Window accounting ---

    #[test]
    fn partial_window_is_not_processed() {
        let spectrum = new_shared_spectrum();
        let _: Vec<f32> =
            AnalyzingSource::new(mono(sine(440.0, FFT_SIZE - 1, 0.5)), spectrum.clone()).collect();
        assert_eq!(spectrum.lock().unwrap().windows, 0);
    }

    #[test]
    fn one_window_per_fft_size_frames() {
        let spectrum = new_shared_spectrum();
        let _: Vec<f32> =
            AnalyzingSource::new(mono(sine(440.0, FFT_SIZE * 3, 0.5)), spectrum.clone()).collect();
        assert_eq!(spectrum.lock().unwrap().windows, 3);
    }

    #[test]
    fn stereo_counts_frames_not_samples() {
        let spectrum = new_shared_spectrum();
        let source = SamplesBuffer::new(
            NonZero::new(2).unwrap(),
            NonZero::new(44100).unwrap(),
            vec![0.1; FFT_SIZE * 2],
        );
        let _: Vec<f32> = AnalyzingSource::new(source, spectrum.clone()).collect();
        assert_eq!(spectrum.lock().unwrap().windows, 1);
    }

    // --- Spectrum content ---

    #[test]
    fn bin_count_is_half_fft_size() {
        let data = SpectrumData::default();
        assert_eq!(data.bytes.len(), 256);
        assert_eq!(data.magnitudes.len(), 256);
    }

    #[test]
    fn silence_stays_at_zero() {
        let spectrum = new_shared_spectrum();
        let _: Vec<f32> =
            AnalyzingSource::new(mono(vec![0.0; FFT_SIZE * 4]), spectrum.clone()).collect();
        let data = spectrum.lock().unwrap();
        assert!(data.bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn tone_peaks_in_matching_bin() {
        // bin width = 44100 / 512 ≈ 86 Hz; 2 kHz lands near bin 23
        let spectrum = new_shared_spectrum();
        let _: Vec<f32> =
            AnalyzingSource::new(mono(sine(2000.0, FFT_SIZE * 40, 0.8)), spectrum.clone())
                .collect();
        let data = spectrum.lock().unwrap();
        let peak = peak_bin(&data.bytes);
        assert!((22..=24).contains(&peak), "peak at bin {peak}");
        assert!(data.bytes[peak] > 200);
    }

    #[test]
    fn louder_tone_reads_higher() {
        let quiet = new_shared_spectrum();
        let loud = new_shared_spectrum();
        let _: Vec<f32> =
            AnalyzingSource::new(mono(sine(1000.0, FFT_SIZE * 20, 0.01)), quiet.clone()).collect();
        let _: Vec<f32> =
            AnalyzingSource::new(mono(sine(1000.0, FFT_SIZE * 20, 0.8)), loud.clone()).collect();
        let q = quiet.lock().unwrap();
        let l = loud.lock().unwrap();
        let bin = peak_bin(&l.bytes);
        assert!(l.bytes[bin] > q.bytes[bin]);
    }

    #[test]
    fn smoothing_lags_behind_sudden_silence() {
        let spectrum = new_shared_spectrum();
        let mut input = sine(1000.0, FFT_SIZE * 20, 0.8);
        input.extend(vec![0.0; FFT_SIZE]);
        let _: Vec<f32> = AnalyzingSource::new(mono(input), spectrum.clone()).collect();
        let data = spectrum.lock().unwrap();
        // one silent window only decays by the smoothing factor
        assert!(data.bytes.iter().any(|&b| b > 150));
    }

    #[test]
    fn reset_clears_everything() {
        let spectrum = new_shared_spectrum();
        let _: Vec<f32> =
            AnalyzingSource::new(mono(sine(1000.0, FFT_SIZE * 4, 0.8)), spectrum.clone()).collect();
        let mut data = spectrum.lock().unwrap();
        data.reset();
        assert_eq!(data.windows, 0);
        assert!(data.bytes.iter().all(|&b| b == 0));
        assert!(data.magnitudes.iter().all(|&m| m == 0.0));
    }

    // --- Byte scale ---

    #[test]
    fn byte_scale_endpoints() {
        assert_eq!(magnitude_to_byte(0.0), 0);
        assert_eq!(magnitude_to_byte(-1.0), 0);
        // -100 dB and below → 0
        assert_eq!(magnitude_to_byte(1e-6), 0);
        // -30 dB and above → 255
        assert_eq!(magnitude_to_byte(10f32.powf(-30.0 / 20.0) * 1.01), 255);
        assert_eq!(magnitude_to_byte(1.0), 255);
    }

    #[test]
    fn byte_scale_midpoint() {
        // -65 dB is halfway between -100 and -30
        let mid = magnitude_to_byte(10f32.powf(-65.0 / 20.0));
        assert!((126..=128).contains(&mid), "got {mid}");
    }
}
