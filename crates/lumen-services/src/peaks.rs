//! Waveform peak summaries
//!
//! A clip is summarized once at three fixed densities (segments per second).
//! Queries for an arbitrary window are answered from the coarsest level that
//! still has enough resolution, then resampled to the requested segment count.

use tracing::{debug, info};

/// Segments per second of each pyramid level, coarsest first
pub const DENSITIES: [u32; 3] = [10, 100, 1000];

/// Per-segment minimum and maximum amplitudes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeakSet {
    pub mins: Vec<f32>,
    pub maxes: Vec<f32>,
}

impl PeakSet {
    pub fn len(&self) -> usize {
        self.mins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mins.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<(f32, f32)> {
        Some((*self.mins.get(index)?, *self.maxes.get(index)?))
    }

    fn resize(&mut self, count: usize) {
        self.mins.resize(count, 0.0);
        self.maxes.resize(count, 0.0);
    }
}

/// Time window to summarize into `count` segments
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakWindow {
    pub start: f64,
    pub duration: f64,
    pub count: usize,
}

/// Summarize a window of a min/max source into `out`, reusing its buffers.
///
/// The source holds `source_mins.len()` values spread evenly over
/// `source_duration` seconds. For raw samples pass the same slice twice.
/// Segments that fall outside the source are silent (0.0, 0.0).
pub fn resample(
    source_mins: &[f32],
    source_maxes: &[f32],
    source_duration: f64,
    window: PeakWindow,
    out: &mut PeakSet,
) {
    out.resize(window.count);

    let len = source_mins.len().min(source_maxes.len());
    if window.count == 0 {
        return;
    }
    if len == 0 || source_duration <= 0.0 {
        out.mins.fill(0.0);
        out.maxes.fill(0.0);
        return;
    }

    let rate = len as f64 / source_duration;
    let start_pos = (window.start * rate).floor();
    let end_pos = ((window.start + window.duration) * rate).ceil();
    let per_segment = (end_pos - start_pos) / window.count as f64;
    let clamp = |pos: f64| pos.clamp(0.0, len as f64) as usize;

    for i in 0..window.count {
        let lo = (start_pos + i as f64 * per_segment).floor();
        let hi = (start_pos + (i + 1) as f64 * per_segment).floor().max(lo + 1.0);
        let (lo, hi) = (clamp(lo), clamp(hi));

        let (min, max) = if lo < hi {
            let min = source_mins[lo..hi].iter().copied().fold(f32::INFINITY, f32::min);
            let max = source_maxes[lo..hi].iter().copied().fold(f32::NEG_INFINITY, f32::max);
            (min, max)
        } else {
            (0.0, 0.0)
        };

        out.mins[i] = min;
        out.maxes[i] = max;
    }
}

/// Scale samples so the loudest has magnitude 1.0. Silence is left as is.
pub fn normalize(raw: &[f32]) -> Vec<f32> {
    let peak = raw.iter().fold(0.0f32, |peak, s| peak.max(s.abs()));
    let scaler = if peak > 0.0 { 1.0 / peak } else { 1.0 };
    raw.iter().map(|s| s * scaler).collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct CacheKey {
    count: usize,
    start: f64,
    duration: f64,
}

/// Precomputed peaks at 10, 100 and 1000 segments per second, plus the
/// result of the most recent query
#[derive(Debug, Clone)]
pub struct PeakPyramid {
    duration: f64,
    /// Indexed like [`DENSITIES`]
    levels: [PeakSet; 3],
    cache_key: Option<CacheKey>,
    cached: PeakSet,
    recomputes: usize,
}

impl PeakPyramid {
    /// Build from samples already normalized to a peak of 1.0.
    ///
    /// Each level is derived from the next finer one, never from the raw
    /// samples, except the finest.
    pub fn build(normalized: &[f32], duration: f64) -> Self {
        let level = |mins: &[f32], maxes: &[f32], density: u32| {
            let window = PeakWindow {
                start: 0.0,
                duration,
                count: (density as f64 * duration).ceil() as usize,
            };
            let mut set = PeakSet::default();
            resample(mins, maxes, duration, window, &mut set);
            set
        };

        let fine = level(normalized, normalized, DENSITIES[2]);
        let medium = level(&fine.mins, &fine.maxes, DENSITIES[1]);
        let coarse = level(&medium.mins, &medium.maxes, DENSITIES[0]);

        info!(
            "Built peak pyramid: {:.3}s, {} samples, {} fine segments",
            duration,
            normalized.len(),
            fine.len()
        );

        Self {
            duration,
            levels: [coarse, medium, fine],
            cache_key: None,
            cached: PeakSet::default(),
            recomputes: 0,
        }
    }

    /// Normalize then build
    pub fn from_raw(raw: &[f32], duration: f64) -> Self {
        Self::build(&normalize(raw), duration)
    }

    /// Build from interleaved PCM using only the first channel
    pub fn from_interleaved(samples: &[f32], channels: u16, sample_rate: u32) -> Self {
        let first: Vec<f32> = samples
            .iter()
            .step_by(channels.max(1) as usize)
            .copied()
            .collect();
        let duration = if sample_rate > 0 {
            first.len() as f64 / sample_rate as f64
        } else {
            0.0
        };
        Self::from_raw(&first, duration)
    }

    /// Peaks for `count` segments covering `[start, start + duration)`.
    ///
    /// Repeating the previous query returns the cached result without
    /// recomputing.
    pub fn get_peaks(&mut self, count: usize, start: f64, duration: f64) -> &PeakSet {
        let key = CacheKey {
            count,
            start,
            duration,
        };
        if self.cache_key == Some(key) {
            return &self.cached;
        }

        let rate = count as f64 / duration;
        let source = if rate < 10.0 {
            &self.levels[0]
        } else if rate < 100.0 {
            &self.levels[1]
        } else {
            &self.levels[2]
        };

        let window = PeakWindow {
            start,
            duration,
            count,
        };
        resample(&source.mins, &source.maxes, self.duration, window, &mut self.cached);

        self.cache_key = Some(key);
        self.recomputes += 1;
        debug!(count, start, duration, "Recomputed peaks");

        &self.cached
    }

    /// The precomputed level at `density` segments per second
    pub fn level(&self, density: u32) -> Option<&PeakSet> {
        let index = DENSITIES.iter().position(|&d| d == density)?;
        Some(&self.levels[index])
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Number of queries that missed the cache
    pub fn recompute_count(&self) -> usize {
        self.recomputes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Deterministic pseudo-noise in [-1, 1]
    fn noise(len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| ((i * 37) % 101) as f32 / 50.0 - 1.0)
            .collect()
    }

    fn raw_extremes(samples: &[f32]) -> (f32, f32) {
        let min = samples.iter().copied().fold(f32::INFINITY, f32::min);
        let max = samples.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        (min, max)
    }

    #[test]
    fn test_normalize() {
        let normalized = normalize(&[0.25, -0.5, 0.1]);
        assert_relative_eq!(normalized[0], 0.5);
        assert_relative_eq!(normalized[1], -1.0);
        assert_relative_eq!(normalized[2], 0.2);

        assert_eq!(normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_level_sizes() {
        let pyramid = PeakPyramid::build(&noise(2500), 2.5);
        assert_eq!(pyramid.level(1000).map(PeakSet::len), Some(2500));
        assert_eq!(pyramid.level(100).map(PeakSet::len), Some(250));
        assert_eq!(pyramid.level(10).map(PeakSet::len), Some(25));
        assert!(pyramid.level(50).is_none());
    }

    #[test]
    fn test_thousand_segments_per_second() {
        let mut pyramid = PeakPyramid::build(&noise(44_100), 1.0);
        let peaks = pyramid.get_peaks(1000, 0.0, 1.0);
        assert_eq!(peaks.mins.len(), 1000);
        assert_eq!(peaks.maxes.len(), 1000);
    }

    #[test]
    fn test_repeated_query_is_cached() {
        let mut pyramid = PeakPyramid::build(&noise(1000), 1.0);

        pyramid.get_peaks(200, 0.0, 1.0);
        assert_eq!(pyramid.recompute_count(), 1);
        pyramid.get_peaks(200, 0.0, 1.0);
        assert_eq!(pyramid.recompute_count(), 1);

        pyramid.get_peaks(200, 0.5, 0.5);
        assert_eq!(pyramid.recompute_count(), 2);
        pyramid.get_peaks(200, 0.0, 1.0);
        assert_eq!(pyramid.recompute_count(), 3);
    }

    #[test]
    fn test_levels_match_raw_extremes() {
        let samples = noise(1000);
        let mut pyramid = PeakPyramid::build(&samples, 1.0);

        // 5/s reads the 10/s level, 50/s the 100/s level, 500/s the 1000/s level
        for count in [5, 50, 500] {
            let peaks = pyramid.get_peaks(count, 0.0, 1.0).clone();
            let span = samples.len() / count;
            for i in 0..count {
                let (min, max) = raw_extremes(&samples[i * span..(i + 1) * span]);
                assert_eq!(peaks.get(i), Some((min, max)), "count {count} segment {i}");
            }
        }
    }

    #[test]
    fn test_coarse_level_built_from_finer() {
        let ramp: Vec<f32> = (0..1000).map(|i| i as f32 / 999.0 * 2.0 - 1.0).collect();
        let pyramid = PeakPyramid::build(&ramp, 1.0);

        let coarse = pyramid.level(10).cloned().unwrap_or_default();
        assert_relative_eq!(coarse.mins[0], ramp[0]);
        assert_relative_eq!(coarse.maxes[0], ramp[99]);
        assert_relative_eq!(coarse.maxes[9], 1.0);
    }

    #[test]
    fn test_window_outside_clip_is_silent() {
        let mut pyramid = PeakPyramid::build(&noise(1000), 1.0);

        let peaks = pyramid.get_peaks(20, 5.0, 1.0);
        assert!(peaks.mins.iter().chain(peaks.maxes.iter()).all(|&v| v == 0.0));

        // Half before the start of the clip
        let peaks = pyramid.get_peaks(20, -0.5, 1.0).clone();
        assert_eq!(peaks.get(0), Some((0.0, 0.0)));
        assert_ne!(peaks.get(19), Some((0.0, 0.0)));
    }

    #[test]
    fn test_buffer_resized_for_new_count() {
        let mut pyramid = PeakPyramid::build(&noise(1000), 1.0);
        assert_eq!(pyramid.get_peaks(300, 0.0, 1.0).len(), 300);
        assert_eq!(pyramid.get_peaks(40, 0.0, 1.0).len(), 40);
        assert_eq!(pyramid.get_peaks(0, 0.0, 1.0).len(), 0);
    }

    #[test]
    fn test_from_interleaved_uses_first_channel() {
        // Left is loud, right is quiet
        let stereo: Vec<f32> = (0..8).flat_map(|i| [if i % 2 == 0 { 0.5 } else { -0.5 }, 0.01]).collect();
        let pyramid = PeakPyramid::from_interleaved(&stereo, 2, 4);

        assert_relative_eq!(pyramid.duration(), 2.0);
        let fine = pyramid.level(1000).cloned().unwrap_or_default();
        assert_eq!(fine.len(), 2000);
        assert_relative_eq!(fine.maxes.iter().copied().fold(f32::MIN, f32::max), 1.0);
        assert_relative_eq!(fine.mins.iter().copied().fold(f32::MAX, f32::min), -1.0);
    }

    #[test]
    fn test_empty_clip() {
        let mut pyramid = PeakPyramid::from_raw(&[], 0.0);
        assert_eq!(pyramid.level(10).map(PeakSet::len), Some(0));
        let peaks = pyramid.get_peaks(10, 0.0, 1.0);
        assert_eq!(peaks.len(), 10);
        assert_eq!(peaks.get(3), Some((0.0, 0.0)));
    }
}
