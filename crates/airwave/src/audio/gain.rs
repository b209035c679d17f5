//! Output gain stage
//!
//! Last stage before the output. Also acts as the context gate: while the
//! owning context is not running, the stage emits silence.

use std::num::NonZero;
use std::time::Duration;

use rodio::Source;

use super::types::{ContextState, ContextStateCell, SharedParam};

pub struct GainSource<S> {
    inner: S,
    gain: SharedParam,
    state: ContextStateCell,
}

impl<S> GainSource<S>
where
    S: Source<Item = f32>,
{
    pub fn new(source: S, gain: SharedParam, state: ContextStateCell) -> Self {
        Self {
            inner: source,
            gain,
            state,
        }
    }
}

impl<S> Iterator for GainSource<S>
where
    S: Source<Item = f32>,
{
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        let sample = self.inner.next()?;
        match self.state.get() {
            ContextState::Running => Some(sample * self.gain.load()),
            ContextState::Suspended | ContextState::Closed => Some(0.0),
        }
    }
}

impl<S> Source for GainSource<S>
where
    S: Source<Item = f32>,
{
    fn current_span_len(&self) -> Option<usize> {
        self.inner.current_span_len()
    }

    fn channels(&self) -> NonZero<u16> {
        self.inner.channels()
    }

    fn sample_rate(&self) -> NonZero<u32> {
        self.inner.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        self.inner.total_duration()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::types::AtomicF32;
    use rodio::buffer::SamplesBuffer;
    use std::sync::Arc;

    fn mono(samples: Vec<f32>) -> SamplesBuffer {
        SamplesBuffer::new(
            NonZero::new(1).unwrap(),
            NonZero::new(44100).unwrap(),
            samples,
        )
    }

    #[test]
    fn running_context_scales_samples() {
        let gain = Arc::new(AtomicF32::new(0.5));
        let state = ContextStateCell::new(ContextState::Running);
        let out: Vec<f32> = GainSource::new(mono(vec![1.0, -0.5, 0.25]), gain, state).collect();
        assert_eq!(out, vec![0.5, -0.25, 0.125]);
    }

    #[test]
    fn suspended_context_is_silent() {
        let gain = Arc::new(AtomicF32::new(1.0));
        let state = ContextStateCell::new(ContextState::Suspended);
        let out: Vec<f32> = GainSource::new(mono(vec![1.0; 4]), gain, state).collect();
        assert_eq!(out, vec![0.0; 4]);
    }

    #[test]
    fn closed_context_is_silent_but_keeps_consuming() {
        let gain = Arc::new(AtomicF32::new(1.0));
        let state = ContextStateCell::new(ContextState::Closed);
        let out: Vec<f32> = GainSource::new(mono(vec![1.0; 8]), gain, state).collect();
        assert_eq!(out.len(), 8);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn gain_and_state_changes_apply_mid_stream() {
        let gain = Arc::new(AtomicF32::new(1.0));
        let state = ContextStateCell::new(ContextState::Suspended);
        let mut source = GainSource::new(mono(vec![1.0; 6]), gain.clone(), state.clone());

        assert_eq!(source.next(), Some(0.0));
        state.set(ContextState::Running);
        assert_eq!(source.next(), Some(1.0));
        gain.store(0.0);
        assert_eq!(source.next(), Some(0.0));
        gain.store(0.7);
        assert_eq!(source.next(), Some(0.7));
    }

    #[test]
    fn metadata_passthrough() {
        let source = SamplesBuffer::new(
            NonZero::new(2).unwrap(),
            NonZero::new(48000).unwrap(),
            vec![0.0; 4],
        );
        let gain = GainSource::new(
            source,
            Arc::new(AtomicF32::new(1.0)),
            ContextStateCell::default(),
        );
        assert_eq!(gain.channels().get(), 2);
        assert_eq!(gain.sample_rate().get(), 48000);
    }
}
