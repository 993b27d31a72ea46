//! Background peak pyramid construction

use std::thread;

use crossbeam_channel::{bounded, Receiver, TryRecvError};
use lumen_core::Emitter;
use thiserror::Error;
use tracing::{info, warn};

use crate::peaks::{PeakPyramid, PeakSet};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Audio is already loading")]
    AlreadyLoading,
    #[error("Peak worker failed: {0}")]
    WorkerFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderEvent {
    Loading(bool),
}

/// Owns the current clip's pyramid and builds replacements off-thread.
///
/// Only one build may be in flight. A finished build is installed by
/// [`WaveformLoader::poll`] or [`WaveformLoader::wait`], replacing any
/// previous pyramid.
#[derive(Debug, Default)]
pub struct WaveformLoader {
    pending: Option<Receiver<PeakPyramid>>,
    pyramid: Option<PeakPyramid>,
    emitter: Emitter<LoaderEvent>,
}

impl WaveformLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> Receiver<LoaderEvent> {
        self.emitter.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Start building a pyramid from decoded interleaved PCM
    pub fn begin_load(&mut self, samples: Vec<f32>, channels: u16, sample_rate: u32) -> Result<(), LoadError> {
        if self.pending.is_some() {
            warn!("Rejected audio load: a load is already in progress");
            return Err(LoadError::AlreadyLoading);
        }

        let frames = samples.len() / channels.max(1) as usize;
        let (tx, rx) = bounded::<PeakPyramid>(1);

        thread::Builder::new()
            .name("peak-pyramid".into())
            .spawn(move || {
                let pyramid = PeakPyramid::from_interleaved(&samples, channels, sample_rate);
                // Loader may have been dropped meanwhile
                let _ = tx.send(pyramid);
            })
            .map_err(|e| LoadError::WorkerFailed(e.to_string()))?;

        info!(
            "Loading audio: {} frames, {} channels @ {}Hz",
            frames, channels, sample_rate
        );

        self.pending = Some(rx);
        self.emitter.emit(LoaderEvent::Loading(true));
        Ok(())
    }

    /// Install a finished build if there is one. Returns true when a new
    /// pyramid was installed.
    pub fn poll(&mut self) -> Result<bool, LoadError> {
        let Some(rx) = &self.pending else {
            return Ok(false);
        };

        match rx.try_recv() {
            Ok(pyramid) => {
                self.install(pyramid);
                Ok(true)
            }
            Err(TryRecvError::Empty) => Ok(false),
            Err(TryRecvError::Disconnected) => Err(self.fail()),
        }
    }

    /// Block until the in-flight build finishes
    pub fn wait(&mut self) -> Result<bool, LoadError> {
        let Some(rx) = &self.pending else {
            return Ok(false);
        };

        match rx.recv() {
            Ok(pyramid) => {
                self.install(pyramid);
                Ok(true)
            }
            Err(_) => Err(self.fail()),
        }
    }

    pub fn pyramid(&self) -> Option<&PeakPyramid> {
        self.pyramid.as_ref()
    }

    /// Peaks for the current clip, or `None` until one has loaded
    pub fn get_peaks(&mut self, count: usize, start: f64, duration: f64) -> Option<&PeakSet> {
        self.pyramid
            .as_mut()
            .map(|pyramid| pyramid.get_peaks(count, start, duration))
    }

    fn install(&mut self, pyramid: PeakPyramid) {
        info!("Audio loaded: {:.3}s", pyramid.duration());
        self.pending = None;
        self.pyramid = Some(pyramid);
        self.emitter.emit(LoaderEvent::Loading(false));
    }

    fn fail(&mut self) -> LoadError {
        warn!("Peak worker exited without a result");
        self.pending = None;
        self.emitter.emit(LoaderEvent::Loading(false));
        LoadError::WorkerFailed("worker exited without a result".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tone(frames: usize) -> Vec<f32> {
        (0..frames).map(|i| ((i % 50) as f32 / 25.0) - 1.0).collect()
    }

    #[test]
    fn test_no_peaks_before_load() {
        let mut loader = WaveformLoader::new();
        assert!(!loader.is_loading());
        assert!(loader.get_peaks(100, 0.0, 1.0).is_none());
        assert!(matches!(loader.poll(), Ok(false)));
        assert!(matches!(loader.wait(), Ok(false)));
    }

    #[test]
    fn test_load_and_query() {
        let mut loader = WaveformLoader::new();
        loader.begin_load(tone(2000), 1, 1000).unwrap();
        assert!(loader.is_loading());

        assert!(matches!(loader.wait(), Ok(true)));
        assert!(!loader.is_loading());

        let duration = loader.pyramid().map(PeakPyramid::duration);
        assert_relative_eq!(duration.unwrap_or_default(), 2.0);

        let peaks = loader.get_peaks(1000, 0.0, 2.0).cloned().unwrap_or_default();
        assert_eq!(peaks.len(), 1000);
    }

    #[test]
    fn test_second_load_rejected_while_busy() {
        let mut loader = WaveformLoader::new();
        loader.begin_load(tone(1000), 1, 1000).unwrap();

        let err = loader.begin_load(tone(1000), 1, 1000).unwrap_err();
        assert!(matches!(err, LoadError::AlreadyLoading));

        loader.wait().unwrap();
        assert!(loader.begin_load(tone(500), 1, 1000).is_ok());
        loader.wait().unwrap();
    }

    #[test]
    fn test_reload_replaces_pyramid() {
        let mut loader = WaveformLoader::new();
        loader.begin_load(tone(1000), 1, 1000).unwrap();
        loader.wait().unwrap();
        loader.get_peaks(100, 0.0, 1.0);

        loader.begin_load(tone(6000), 2, 1000).unwrap();
        loader.wait().unwrap();

        let pyramid = loader.pyramid().unwrap();
        assert_relative_eq!(pyramid.duration(), 3.0);
        assert_eq!(pyramid.recompute_count(), 0);
    }

    #[test]
    fn test_loading_events() {
        let mut loader = WaveformLoader::new();
        let rx = loader.subscribe();

        loader.begin_load(tone(100), 1, 100).unwrap();
        loader.wait().unwrap();

        let events: Vec<LoaderEvent> = rx.try_iter().collect();
        assert_eq!(events, vec![LoaderEvent::Loading(true), LoaderEvent::Loading(false)]);
    }

    #[test]
    fn test_poll_eventually_installs() {
        let mut loader = WaveformLoader::new();
        loader.begin_load(tone(1000), 1, 1000).unwrap();

        let mut installed = false;
        for _ in 0..1000 {
            if loader.poll().unwrap() {
                installed = true;
                break;
            }
            thread::sleep(std::time::Duration::from_millis(5));
        }
        assert!(installed);
        assert!(loader.pyramid().is_some());
    }
}
