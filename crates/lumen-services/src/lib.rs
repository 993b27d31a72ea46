//! lumen-services: Waveform peak summaries and background loading

pub mod loader;
pub mod peaks;

pub use loader::{LoadError, LoaderEvent, WaveformLoader};
pub use peaks::{normalize, resample, PeakPyramid, PeakSet, PeakWindow, DENSITIES};
