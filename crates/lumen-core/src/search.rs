//! Binary search over timestamp-sorted keyframes

use crate::keyframe::Keyframe;

/// Restricts a search to keyframes strictly before or after the query time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchSide {
    Left,
    Right,
}

/// Find the keyframe closest to `time`.
///
/// With no side the closest keyframe wins, ties going to the earlier index.
/// `Left` only accepts keyframes strictly before `time` and `Right` only
/// those strictly after; `None` is returned when no keyframe qualifies.
///
/// `keyframes` must be sorted by timestamp.
///
/// # Example
/// ```
/// use lumen_core::{search, Keyframe, KeyframeId, SearchSide};
/// let keyframes: Vec<Keyframe> = [0.0, 10.0, 20.0]
///     .iter()
///     .enumerate()
///     .map(|(i, &t)| Keyframe::new(KeyframeId(i as u64), t, 1.0))
///     .collect();
/// assert_eq!(search(&keyframes, 12.0, None), Some(1));
/// assert_eq!(search(&keyframes, 12.0, Some(SearchSide::Right)), Some(2));
/// ```
pub fn search(keyframes: &[Keyframe], time: f64, side: Option<SearchSide>) -> Option<usize> {
    let accept = |index: usize| -> Option<usize> {
        let timestamp = keyframes[index].timestamp;
        match side {
            None => Some(index),
            Some(SearchSide::Left) if timestamp < time => Some(index),
            Some(SearchSide::Right) if timestamp > time => Some(index),
            _ => None,
        }
    };

    let last = keyframes.len().checked_sub(1)?;
    if last == 0 {
        return accept(0);
    }

    // Out of bounds left side
    if keyframes[0].timestamp > time {
        return accept(0);
    }

    // Out of bounds right side
    if keyframes[last].timestamp < time {
        return accept(last);
    }

    // Narrow until two candidates remain. ts[start] <= time <= ts[end] holds
    // throughout; a right-sided search also moves past exact matches.
    let mut start = 0;
    let mut end = last;
    while end - start > 1 {
        let mid = (start + end + 1) / 2;
        let timestamp = keyframes[mid].timestamp;
        let past_mid = match side {
            Some(SearchSide::Right) => time >= timestamp,
            _ => time > timestamp,
        };
        if past_mid {
            start = mid;
        } else {
            end = mid;
        }
    }

    let found = match side {
        Some(SearchSide::Left) => start,
        Some(SearchSide::Right) => end,
        None => {
            let left_dist = time - keyframes[start].timestamp;
            let right_dist = keyframes[end].timestamp - time;
            if left_dist <= right_dist { start } else { end }
        }
    };

    accept(found)
}
