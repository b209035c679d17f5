//! Spectrum renderer
//!
//! Turns analyser output into bar heights once per display frame. The
//! renderer only produces frames while it is running; stopping it yields a
//! single clear frame and then nothing until it is started again.

use crate::audio::AnalyserStage;
use crate::config::visual::{BAR_HEADROOM, HIGH_TIER, MID_TIER};

/// Anything that can hand out byte-scaled frequency bins
pub trait FrequencySource {
    fn frequency_bin_count(&self) -> usize;
    fn byte_frequency_data(&self, out: &mut [u8]);
}

impl FrequencySource for AnalyserStage {
    fn frequency_bin_count(&self) -> usize {
        AnalyserStage::frequency_bin_count(self)
    }

    fn byte_frequency_data(&self, out: &mut [u8]) {
        AnalyserStage::byte_frequency_data(self, out)
    }
}

/// Colour band a bar falls into, by height relative to the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarTier {
    Low,
    Mid,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub height: f32,
    pub tier: BarTier,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpectrumFrame {
    /// One bar per frequency bin, lowest frequency first
    Bars(Vec<Bar>),
    /// Wipe the canvas
    Clear,
}

/// Height of one bar: `value / 255 * canvas_height * 0.9`
pub fn bar_height(value: u8, canvas_height: f32) -> f32 {
    value as f32 / 255.0 * canvas_height * BAR_HEADROOM
}

pub fn bar_tier(height: f32, canvas_height: f32) -> BarTier {
    if height > canvas_height * HIGH_TIER {
        BarTier::High
    } else if height > canvas_height * MID_TIER {
        BarTier::Mid
    } else {
        BarTier::Low
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Stopped,
    Running,
    /// Stopped, clear frame not yet handed out
    Clearing,
}

/// Frame producer gated on playback
#[derive(Debug)]
pub struct SpectrumRenderer {
    canvas_height: f32,
    state: LoopState,
    bins: Vec<u8>,
}

impl SpectrumRenderer {
    pub fn new(canvas_height: f32) -> Self {
        Self {
            canvas_height: canvas_height.max(0.0),
            state: LoopState::Stopped,
            bins: Vec::new(),
        }
    }

    pub fn canvas_height(&self) -> f32 {
        self.canvas_height
    }

    /// Follow a resized canvas
    pub fn set_canvas_height(&mut self, canvas_height: f32) {
        self.canvas_height = canvas_height.max(0.0);
    }

    pub fn is_running(&self) -> bool {
        self.state == LoopState::Running
    }

    pub fn start(&mut self) {
        self.state = LoopState::Running;
    }

    /// Stop producing bars. Only the first stop after running queues a clear.
    pub fn stop(&mut self) {
        if self.state == LoopState::Running {
            self.state = LoopState::Clearing;
        }
    }

    /// Start or stop to match the playback gate
    pub fn sync(&mut self, playing: bool) {
        if playing {
            self.start();
        } else {
            self.stop();
        }
    }

    /// Produce the next frame, if any
    pub fn next_frame(&mut self, source: Option<&dyn FrequencySource>) -> Option<SpectrumFrame> {
        match self.state {
            LoopState::Stopped => None,
            LoopState::Clearing => {
                self.state = LoopState::Stopped;
                Some(SpectrumFrame::Clear)
            }
            LoopState::Running => {
                // Degraded playback has no analyser; keep the canvas empty
                let source = source?;
                self.bins.resize(source.frequency_bin_count(), 0);
                source.byte_frequency_data(&mut self.bins);
                let canvas = self.canvas_height;
                let bars = self
                    .bins
                    .iter()
                    .map(|&value| {
                        let height = bar_height(value, canvas);
                        Bar {
                            height,
                            tier: bar_tier(height, canvas),
                        }
                    })
                    .collect();
                Some(SpectrumFrame::Bars(bars))
            }
        }
    }
}
