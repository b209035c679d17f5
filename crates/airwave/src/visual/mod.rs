//! Front-end view models: spectrum bars and equalizer sliders

pub mod equalizer;
pub mod spectrum;

pub use equalizer::{EqualizerSurface, SliderView};
pub use spectrum::{Bar, BarTier, FrequencySource, SpectrumFrame, SpectrumRenderer};
