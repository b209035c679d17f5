//! Audio subsystem
//!
//! Equalizer model, DSP stages (biquad filters, spectrum analyzer, gain), the
//! processing graph that chains them, the context seam it lives in, and the
//! symphonia decoder that feeds it.

pub mod analyzer;
pub mod context;
pub mod decoder;
pub mod eq;
pub mod filters;
pub mod gain;
pub mod graph;
pub mod types;

pub use analyzer::{AnalyzingSource, SharedSpectrum, SpectrumData};
pub use context::{AudioBackend, AudioContext, SoftwareBackend, SoftwareContext};
pub use decoder::SymphoniaSource;
pub use eq::{Equalizer, DEFAULT_BANDS};
pub use filters::{EqualizerSource, FilterStage};
pub use gain::GainSource;
pub use graph::{AnalyserStage, AudioGraph, GainStage, GraphChain, GraphTap, StageKind};
pub use types::{ContextState, EqBand, FilterKind};
