//! Audio-processing graph
//!
//! Fixed topology: source → five filter stages → analyser → gain → output.
//! The graph owns its context and the control-side handles of every stage.
//! The media element pulls a [`GraphTap`] to wrap its decoded source in the
//! matching DSP chain.

use std::fmt;
use std::sync::Arc;

use rodio::Source;
use tracing::{debug, info, warn};

use crate::config::eq::BAND_COUNT;
use crate::error::{PlayerError, Result};

use super::analyzer::{new_shared_spectrum, AnalyzingSource, SharedSpectrum};
use super::context::AudioContext;
use super::filters::{EqualizerSource, FilterStage};
use super::gain::GainSource;
use super::types::{AtomicF32, ContextState, ContextStateCell, EqBand, FilterKind, SharedParam};

/// Node kinds in processing order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Filter(FilterKind),
    Analyser,
    Gain,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Filter(kind) => write!(f, "filter({kind})"),
            StageKind::Analyser => write!(f, "analyser"),
            StageKind::Gain => write!(f, "gain"),
        }
    }
}

/// Read side of the spectrum analyser
#[derive(Debug, Clone)]
pub struct AnalyserStage {
    spectrum: SharedSpectrum,
}

impl AnalyserStage {
    pub fn frequency_bin_count(&self) -> usize {
        crate::config::audio::FREQUENCY_BIN_COUNT
    }

    /// Copy the current byte-scaled spectrum into `out`.
    ///
    /// Copies `min(out.len(), frequency_bin_count())` bins.
    pub fn byte_frequency_data(&self, out: &mut [u8]) {
        if let Ok(data) = self.spectrum.lock() {
            let n = out.len().min(data.bytes.len());
            out[..n].copy_from_slice(&data.bytes[..n]);
        }
    }

    /// Zero the analyser output
    pub fn clear(&self) {
        if let Ok(mut data) = self.spectrum.lock() {
            data.reset();
        }
    }
}

/// Linear output gain in [0, 1]
#[derive(Debug, Clone)]
pub struct GainStage {
    gain: SharedParam,
}

impl GainStage {
    pub fn value(&self) -> f32 {
        self.gain.load()
    }

    pub fn set_value(&self, value: f32) {
        self.gain.store(value.clamp(0.0, 1.0));
    }
}

/// Everything the audio thread needs to build its side of the graph
#[derive(Clone)]
pub struct GraphTap {
    filters: Vec<FilterStage>,
    spectrum: SharedSpectrum,
    gain: SharedParam,
    state: ContextStateCell,
}

/// Concrete DSP chain type produced by [`GraphTap::connect`]
pub type GraphChain<S> = GainSource<AnalyzingSource<EqualizerSource<S>>>;

impl GraphTap {
    /// Wrap a decoded source in the graph's processing chain
    pub fn connect<S>(&self, source: S) -> GraphChain<S>
    where
        S: Source<Item = f32>,
    {
        let filtered = EqualizerSource::new(source, &self.filters);
        let analysed = AnalyzingSource::new(filtered, self.spectrum.clone());
        GainSource::new(analysed, self.gain.clone(), self.state.clone())
    }
}

impl fmt::Debug for GraphTap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphTap")
            .field("filters", &self.filters.len())
            .field("state", &self.state.get())
            .finish()
    }
}

/// The processing graph and its context
pub struct AudioGraph {
    context: Box<dyn AudioContext>,
    filters: Vec<FilterStage>,
    analyser: AnalyserStage,
    gain: GainStage,
    closed: bool,
}

impl AudioGraph {
    /// Build the graph inside `context` with one filter per band
    pub fn build(context: Box<dyn AudioContext>, bands: &[EqBand], gain: f32) -> Result<Self> {
        if bands.len() != BAND_COUNT {
            return Err(PlayerError::Graph(format!(
                "expected {} bands, got {}",
                BAND_COUNT,
                bands.len()
            )));
        }
        if context.state() == ContextState::Closed {
            return Err(PlayerError::Graph(
                "cannot build a graph in a closed context".to_string(),
            ));
        }

        let filters: Vec<FilterStage> = bands.iter().map(FilterStage::from_band).collect();
        let graph = Self {
            context,
            filters,
            analyser: AnalyserStage {
                spectrum: new_shared_spectrum(),
            },
            gain: GainStage {
                gain: Arc::new(AtomicF32::new(gain.clamp(0.0, 1.0))),
            },
            closed: false,
        };
        info!(
            "audio graph built ({} stages, context {})",
            graph.stage_order().len(),
            graph.context_state()
        );
        Ok(graph)
    }

    /// Node kinds from source side to output side
    pub fn stage_order(&self) -> Vec<StageKind> {
        self.filters
            .iter()
            .map(|f| StageKind::Filter(f.kind()))
            .chain([StageKind::Analyser, StageKind::Gain])
            .collect()
    }

    pub fn tap(&self) -> GraphTap {
        GraphTap {
            filters: self.filters.clone(),
            spectrum: self.analyser.spectrum.clone(),
            gain: self.gain.gain.clone(),
            state: self.context.state_cell(),
        }
    }

    pub fn filters(&self) -> &[FilterStage] {
        &self.filters
    }

    pub fn analyser(&self) -> &AnalyserStage {
        &self.analyser
    }

    pub fn gain(&self) -> &GainStage {
        &self.gain
    }

    /// Update one filter stage in place
    pub fn set_band_gain(&self, index: usize, gain_db: f32) -> Result<()> {
        let stage = self
            .filters
            .get(index)
            .ok_or(PlayerError::InvalidBand(index))?;
        stage.set_gain_db(gain_db);
        Ok(())
    }

    pub fn set_gain(&self, value: f32) {
        self.gain.set_value(value);
    }

    pub fn context_state(&self) -> ContextState {
        self.context.state()
    }

    /// Resume a suspended context. Running contexts are left alone.
    pub fn resume(&mut self) -> Result<()> {
        match self.context.state() {
            ContextState::Running => Ok(()),
            ContextState::Closed => Err(PlayerError::Context(
                "audio context is closed".to_string(),
            )),
            ContextState::Suspended => self.context.resume(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Close the context. Later calls are no-ops.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.analyser.clear();
        if self.context.state() == ContextState::Closed {
            debug!("audio context was already closed");
            return Ok(());
        }
        self.context.close()
    }
}

impl Drop for AudioGraph {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("failed to close audio context: {}", e);
        }
    }
}

impl fmt::Debug for AudioGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioGraph")
            .field("stages", &self.stage_order())
            .field("context", &self.context.state())
            .field("closed", &self.closed)
            .finish()
    }
}
