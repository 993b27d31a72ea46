//! Timeline engine: channels, selection, bulk edits and undo

use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::EngineConfig;
use crate::events::{Emitter, TimelineEvent};
use crate::keyframe::{Keyframe, KeyframeId, Track};
use crate::project::{parse_project_data, ProjectData};
use crate::search::SearchSide;
use crate::selection::Selection;
use crate::time::{format_time, TimePrecision};
use crate::undo::UndoHistory;

const NO_SELECTION: &str = "No keyframes selected";
const OUT_OF_RANGE: &str = "Keyframe time out of range";

/// One entry in the undo history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UndoSnapshot {
    pub description: String,
    /// JSON serialization of every channel, selection flags included
    pub channels: String,
}

impl UndoSnapshot {
    fn initial(channels: String) -> Self {
        Self {
            description: "Initial state".into(),
            channels,
        }
    }
}

/// Rectangle in channel/time space; both ranges are inclusive
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxSelection {
    pub start_time: f64,
    pub end_time: f64,
    pub start_channel: usize,
    pub end_channel: usize,
    /// Keep keyframes that were already selected outside the box
    pub keep_existing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftDirection {
    Up,
    Down,
}

impl ShiftDirection {
    fn label(self) -> &'static str {
        match self {
            ShiftDirection::Up => "up",
            ShiftDirection::Down => "down",
        }
    }

    fn target(self, channel: usize, channel_count: usize) -> Option<usize> {
        match self {
            ShiftDirection::Up => channel.checked_sub(1),
            ShiftDirection::Down => Some(channel + 1).filter(|&c| c < channel_count),
        }
    }
}

/// What an edit did, as reported to the caller and to subscribers
#[derive(Debug, Clone, PartialEq)]
pub struct EditOutcome {
    pub description: String,
    /// False for declined edits, which record no undo snapshot
    pub changed: bool,
    /// Selected keyframes after the edit
    pub selected: usize,
}

/// Editable multi-channel keyframe timeline with linear undo.
///
/// Every edit either changes state and records exactly one undo snapshot, or
/// changes nothing and records none. Channels are sorted by timestamp
/// whenever a method returns.
///
/// Keyframe ids are reassigned whenever state is rebuilt from serialized
/// data (construction, [`TimelineData::replace`], undo and redo).
#[derive(Debug)]
pub struct TimelineData {
    channels: Vec<Track>,
    selection: Selection,
    history: UndoHistory<UndoSnapshot>,
    emitter: Emitter<TimelineEvent>,
    config: EngineConfig,
    next_keyframe_id: u64,
}

impl TimelineData {
    pub fn new(data: ProjectData) -> Self {
        Self::with_config(data, EngineConfig::default())
    }

    /// # Panics
    /// Panics if `config.undo_capacity` is zero.
    pub fn with_config(data: ProjectData, config: EngineConfig) -> Self {
        let history = UndoHistory::new(config.undo_capacity, UndoSnapshot::initial(String::new()));
        let mut timeline = Self {
            channels: Vec::new(),
            selection: Selection::new(),
            history,
            emitter: Emitter::new(),
            config,
            next_keyframe_id: 1,
        };
        timeline.load(data);
        timeline.reset_history();
        timeline
    }

    /// Parse a project document (current or legacy format)
    pub fn from_json(json: &str, config: EngineConfig) -> crate::Result<Self> {
        let data = parse_project_data(json)?;
        Ok(Self::with_config(data, config))
    }

    /// Replace all channel data. Clears the undo history.
    pub fn replace(&mut self, data: ProjectData) {
        self.load(data);
        self.reset_history();

        info!(
            "Replaced timeline: {} channels, {} keyframes",
            self.channels.len(),
            self.keyframe_count()
        );

        let channels = self.serialize();
        self.emitter.emit(TimelineEvent::Autosave(channels));
        self.emitter.emit(TimelineEvent::Selected(self.selection.len()));
    }

    pub fn serialize(&self) -> String {
        serde_json::to_string(&self.to_project_data()).unwrap_or_else(|e| {
            error!("Failed to serialize timeline: {}", e);
            String::new()
        })
    }

    pub fn to_project_data(&self) -> ProjectData {
        ProjectData::from_channels(&self.channels, &self.selection)
    }

    pub fn subscribe(&mut self) -> Receiver<TimelineEvent> {
        self.emitter.subscribe()
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn channels(&self) -> &[Track] {
        &self.channels
    }

    pub fn channel(&self, index: usize) -> Option<&Track> {
        self.channels.get(index)
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selected_count(&self) -> usize {
        self.selection.len()
    }

    pub fn is_selected(&self, id: KeyframeId) -> bool {
        self.selection.contains(id)
    }

    pub fn history(&self) -> &UndoHistory<UndoSnapshot> {
        &self.history
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn keyframe_count(&self) -> usize {
        self.channels.iter().map(Track::len).sum()
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn search(&self, channel: usize, time: f64, side: Option<SearchSide>) -> Option<usize> {
        let track = self.channels.get(channel)?;
        crate::search::search(&track.keyframes, time, side)
    }

    /// Closest keyframe to `time` across all channels
    pub fn find_nearest(&self, time: f64) -> Option<&Keyframe> {
        self.channels
            .iter()
            .filter_map(|track| {
                crate::search::search(&track.keyframes, time, None).map(|i| &track.keyframes[i])
            })
            .min_by(|a, b| {
                (a.timestamp - time)
                    .abs()
                    .total_cmp(&(b.timestamp - time).abs())
            })
    }

    /// Timestamps of the earliest and latest selected keyframes, `(0, 0)` if
    /// nothing is selected
    pub fn first_last_selected(&self) -> (f64, f64) {
        self.selected_keyframes()
            .map(|k| k.timestamp)
            .fold(None, |acc: Option<(f64, f64)>, t| match acc {
                None => Some((t, t)),
                Some((first, last)) => Some((first.min(t), last.max(t))),
            })
            .unwrap_or((0.0, 0.0))
    }

    /// Whether a channel is on at `time`: the last keyframe strictly before
    /// it has a positive value
    pub fn value_at(&self, channel: usize, time: f64) -> bool {
        self.search(channel, time, Some(SearchSide::Left))
            .is_some_and(|i| self.channels[channel].keyframes[i].is_on())
    }

    // ------------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------------

    /// Select the keyframe nearest to `time` if it lies within `tolerance`.
    ///
    /// Without `keep_existing` a hit replaces the selection and a miss clears
    /// it. With `keep_existing` a hit toggles the keyframe and a miss does
    /// nothing.
    pub fn select_single(
        &mut self,
        channel: usize,
        time: f64,
        tolerance: f64,
        keep_existing: bool,
    ) -> Option<usize> {
        let hit = self.search(channel, time, None).and_then(|index| {
            let keyframe = self.channels[channel].keyframes[index];
            ((keyframe.timestamp - time).abs() <= tolerance).then_some((index, keyframe.id))
        });

        let Some((index, id)) = hit else {
            if !keep_existing {
                self.select_all(false);
            }
            return None;
        };

        let changed = if keep_existing {
            self.selection.toggle(id);
            true
        } else {
            let only_this = self.selection.len() == 1 && self.selection.contains(id);
            if !only_this {
                self.selection.clear();
                self.selection.insert(id);
            }
            !only_this
        };

        self.finish("Selected keyframe", changed);
        Some(index)
    }

    pub fn select_all(&mut self, selected: bool) -> EditOutcome {
        let changed = if selected {
            let selection = &mut self.selection;
            self.channels
                .iter()
                .flat_map(|t| t.keyframes.iter())
                .fold(false, |changed, k| selection.insert(k.id) | changed)
        } else {
            self.selection.clear()
        };

        let description = if selected { "Select all" } else { "Deselect all" };
        self.finish(description, changed)
    }

    pub fn box_select(&mut self, area: BoxSelection) -> EditOutcome {
        let mut changed = false;

        for (i, track) in self.channels.iter().enumerate() {
            let in_channels = (area.start_channel..=area.end_channel).contains(&i);
            for keyframe in &track.keyframes {
                let in_box = in_channels
                    && keyframe.timestamp >= area.start_time
                    && keyframe.timestamp <= area.end_time;
                let select = in_box || (area.keep_existing && self.selection.contains(keyframe.id));
                changed |= self.selection.set(keyframe.id, select);
            }
        }

        self.finish("Box-selected keyframes", changed)
    }

    // ------------------------------------------------------------------------
    // Edits
    // ------------------------------------------------------------------------

    pub fn insert_single(&mut self, channel: usize, time: f64, value: f64) -> EditOutcome {
        if channel >= self.channels.len() {
            return self.no_op("No such channel");
        }
        if !time.is_finite() || !value.is_finite() {
            return self.no_op(OUT_OF_RANGE);
        }

        self.insert(channel, time, value);
        self.mark_edit("Inserted keyframe")
    }

    /// Insert a keyframe at `time` on every channel
    pub fn insert_column(&mut self, time: f64, value: f64) -> EditOutcome {
        if self.channels.is_empty() {
            return self.no_op("No such channel");
        }
        if !time.is_finite() || !value.is_finite() {
            return self.no_op(OUT_OF_RANGE);
        }

        for channel in 0..self.channels.len() {
            self.insert(channel, time, value);
        }
        self.mark_edit("Inserted keyframe column")
    }

    pub fn delete_selected(&mut self) -> EditOutcome {
        if self.selection.is_empty() {
            return self.no_op(NO_SELECTION);
        }

        let removed: usize = self.take_selected().iter().map(Vec::len).sum();
        self.selection.clear();
        self.mark_edit(format!("Deleted {removed} keyframes"))
    }

    pub fn invert_selected(&mut self) -> EditOutcome {
        let count = self.update_selected(|k| k.value = k.inverted_value());
        self.counted_edit(count, "Inverted")
    }

    /// Move selected keyframes one channel up or down. Declined entirely if
    /// any selected keyframe would leave the channel range.
    pub fn shift_selected(&mut self, direction: ShiftDirection) -> EditOutcome {
        let occupied = self.occupied_channels();
        if occupied.is_empty() {
            return self.no_op(NO_SELECTION);
        }

        let channel_count = self.channels.len();
        if occupied
            .iter()
            .any(|&c| direction.target(c, channel_count).is_none())
        {
            return self.no_op("Cannot shift keyframes, no more room");
        }

        for (channel, keyframes) in self.take_selected().into_iter().enumerate() {
            if let Some(target) = direction.target(channel, channel_count) {
                self.channels[target].keyframes.extend(keyframes);
            }
        }
        self.sort_all();

        self.mark_edit(format!("Shifted keyframes {}", direction.label()))
    }

    /// Reverse the order of the channels holding a selection. The reversed
    /// groups are packed into consecutive channels starting at the first one.
    pub fn flip_vertically(&mut self) -> EditOutcome {
        let occupied = self.occupied_channels();
        let &[first, _, ..] = occupied.as_slice() else {
            return self.no_op("Must have 2 or more channels of keyframes selected to flip");
        };

        let groups = self
            .take_selected()
            .into_iter()
            .filter(|keyframes| !keyframes.is_empty())
            .rev();
        for (offset, keyframes) in groups.enumerate() {
            self.channels[first + offset].keyframes.extend(keyframes);
        }
        self.sort_all();

        self.mark_edit("Flipped keyframes")
    }

    pub fn move_selected(&mut self, delta: f64) -> EditOutcome {
        match self.retime_selected(|t| t + delta) {
            Some(count) => self.counted_edit(count, "Moved"),
            None => self.no_op(OUT_OF_RANGE),
        }
    }

    pub fn scale_selected(&mut self, pivot: f64, factor: f64) -> EditOutcome {
        match self.retime_selected(|t| (t - pivot) * factor + pivot) {
            Some(count) => self.counted_edit(count, "Scaled"),
            None => self.no_op(OUT_OF_RANGE),
        }
    }

    /// Clone every selected keyframe in place. The clones end up selected and
    /// the originals deselected.
    pub fn duplicate_selected(&mut self) -> EditOutcome {
        let mut count = 0;

        for channel in 0..self.channels.len() {
            let originals: Vec<Keyframe> = self.channels[channel]
                .keyframes
                .iter()
                .filter(|k| self.selection.contains(k.id))
                .copied()
                .collect();
            if originals.is_empty() {
                continue;
            }

            count += originals.len();
            for original in originals {
                let id = self.alloc_id();
                self.selection.remove(original.id);
                self.selection.insert(id);
                self.channels[channel].keyframes.push(Keyframe { id, ..original });
            }
            self.channels[channel].sort();
        }

        self.counted_edit(count, "Duplicated")
    }

    /// Move every selected keyframe to their mean timestamp
    pub fn align_selected(&mut self) -> EditOutcome {
        let (sum, count) = self
            .selected_keyframes()
            .fold((0.0, 0usize), |(sum, n), k| (sum + k.timestamp, n + 1));
        if count == 0 {
            return self.no_op(NO_SELECTION);
        }

        let mean = sum / count as f64;
        match self.retime_selected(|_| mean) {
            Some(count) => self.counted_edit(count, "Aligned"),
            None => self.no_op(OUT_OF_RANGE),
        }
    }

    /// Move every selected keyframe to `time`
    pub fn snap_to(&mut self, time: f64) -> EditOutcome {
        let count = match self.retime_selected(|_| time) {
            Some(0) => return self.no_op(NO_SELECTION),
            Some(count) => count,
            None => return self.no_op(OUT_OF_RANGE),
        };
        self.mark_edit(format!(
            "Snapped {count} keyframes to {}",
            format_time(time, TimePrecision::Milliseconds)
        ))
    }

    /// Spread selected keyframes evenly between the earliest and latest.
    ///
    /// Keyframes closer than the merge threshold to their predecessor are
    /// batched and move together.
    pub fn equally_space_selected(&mut self) -> EditOutcome {
        let selection = &self.selection;
        let mut selected: Vec<(usize, usize, f64)> = self
            .channels
            .iter()
            .enumerate()
            .flat_map(|(c, track)| {
                track
                    .keyframes
                    .iter()
                    .enumerate()
                    .filter(move |(_, k)| selection.contains(k.id))
                    .map(move |(i, k)| (c, i, k.timestamp))
            })
            .collect();

        if selected.len() < 2 {
            return self.no_op("Must select 2+ keyframes");
        }

        selected.sort_by(|a, b| a.2.total_cmp(&b.2));

        let threshold = self.config.merge_threshold;
        let mut batches: Vec<Vec<(usize, usize)>> = Vec::new();
        let mut previous: Option<f64> = None;
        for &(channel, index, timestamp) in &selected {
            match batches.last_mut() {
                Some(batch) if previous.is_some_and(|p| timestamp - p < threshold) => {
                    batch.push((channel, index));
                }
                _ => batches.push(vec![(channel, index)]),
            }
            previous = Some(timestamp);
        }

        if batches.len() < 2 {
            return self.no_op("Keyframes cannot be spaced");
        }

        let start = selected[0].2;
        let end = selected[selected.len() - 1].2;
        let increment = (end - start) / (batches.len() - 1) as f64;

        for (i, batch) in batches.iter().enumerate() {
            let timestamp = start + increment * i as f64;
            for &(channel, index) in batch {
                self.channels[channel].keyframes[index].timestamp = timestamp;
            }
        }
        self.sort_all();

        self.mark_edit(format!("Spaced {} keyframes", selected.len()))
    }

    /// Delete selected keyframes that sit within the merge threshold of the
    /// previous selected keyframe on the same channel. Unselected keyframes
    /// are never merged.
    pub fn dedup(&mut self) -> EditOutcome {
        let threshold = self.config.merge_threshold;
        let selection = &self.selection;
        let mut removed = Vec::new();

        for track in &mut self.channels {
            let mut previous: Option<f64> = None;
            track.keyframes.retain(|k| {
                if !selection.contains(k.id) {
                    return true;
                }
                let duplicate = previous.is_some_and(|p| k.timestamp - p < threshold);
                previous = Some(k.timestamp);
                if duplicate {
                    removed.push(k.id);
                }
                !duplicate
            });
        }

        if removed.is_empty() {
            return self.no_op("Didn't dedup anything");
        }

        for id in &removed {
            self.selection.remove(*id);
        }
        self.mark_edit(format!("Deduped {} keyframes", removed.len()))
    }

    // ------------------------------------------------------------------------
    // Undo
    // ------------------------------------------------------------------------

    pub fn undo(&mut self) -> EditOutcome {
        let Some(undone) = self.history.undo().map(|s| s.description.clone()) else {
            return self.no_op("Nothing to undo");
        };
        let Some(channels) = self.history.head().map(|s| s.channels.clone()) else {
            return self.no_op("Nothing to undo");
        };

        if let Err(e) = self.restore(&channels) {
            error!("Failed to restore undo snapshot: {}", e);
            // Put the undone state back so history matches the channels
            self.history.redo();
            return self.no_op(format!("Cannot undo '{undone}'"));
        }

        self.emitter.emit(TimelineEvent::Autosave(channels));
        self.report(format!("Undo '{undone}'"), true)
    }

    pub fn redo(&mut self) -> EditOutcome {
        let Some(snapshot) = self.history.redo().cloned() else {
            return self.no_op("Nothing to redo");
        };

        if let Err(e) = self.restore(&snapshot.channels) {
            error!("Failed to restore redo snapshot: {}", e);
            self.history.undo();
            return self.no_op(format!("Cannot redo '{}'", snapshot.description));
        }

        self.emitter.emit(TimelineEvent::Autosave(snapshot.channels));
        self.report(format!("Redo '{}'", snapshot.description), true)
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn alloc_id(&mut self) -> KeyframeId {
        let id = KeyframeId(self.next_keyframe_id);
        self.next_keyframe_id += 1;
        id
    }

    /// Rebuild channels and selection from serialized data
    fn load(&mut self, data: ProjectData) {
        self.selection.clear();

        let mut channels = Vec::with_capacity(data.tracks.len());
        for track_data in data.tracks {
            let mut track = Track::new(track_data.name);
            for k in track_data.keyframes {
                let id = self.alloc_id();
                if k.selected {
                    self.selection.insert(id);
                }
                track.keyframes.push(Keyframe::new(id, k.timestamp, k.value));
            }
            track.sort();
            channels.push(track);
        }
        self.channels = channels;
    }

    fn reset_history(&mut self) {
        let base = UndoSnapshot::initial(self.serialize());
        self.history = UndoHistory::new(self.config.undo_capacity, base);
    }

    /// Load a snapshot. Channels are untouched if it does not parse.
    fn restore(&mut self, channels: &str) -> Result<(), serde_json::Error> {
        let data = serde_json::from_str::<ProjectData>(channels)?;
        self.load(data);
        Ok(())
    }

    fn insert(&mut self, channel: usize, time: f64, value: f64) {
        let id = self.alloc_id();
        self.channels[channel].insert(Keyframe::new(id, time, value));
    }

    fn selected_keyframes(&self) -> impl Iterator<Item = &Keyframe> + '_ {
        let selection = &self.selection;
        self.channels
            .iter()
            .flat_map(|t| t.keyframes.iter())
            .filter(move |k| selection.contains(k.id))
    }

    /// Indexes of channels holding at least one selected keyframe
    fn occupied_channels(&self) -> Vec<usize> {
        self.channels
            .iter()
            .enumerate()
            .filter(|(_, t)| t.keyframes.iter().any(|k| self.selection.contains(k.id)))
            .map(|(i, _)| i)
            .collect()
    }

    /// Remove selected keyframes from every channel, returned per channel.
    /// The selection itself is left untouched.
    fn take_selected(&mut self) -> Vec<Vec<Keyframe>> {
        let selection = &self.selection;
        self.channels
            .iter_mut()
            .map(|track| {
                let (taken, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut track.keyframes)
                    .into_iter()
                    .partition(|k| selection.contains(k.id));
                track.keyframes = kept;
                taken
            })
            .collect()
    }

    /// Set each selected keyframe's timestamp to `f(timestamp)`. Returns
    /// `None` and changes nothing if any result is not finite.
    fn retime_selected(&mut self, f: impl Fn(f64) -> f64) -> Option<usize> {
        if self.selected_keyframes().any(|k| !f(k.timestamp).is_finite()) {
            return None;
        }
        Some(self.update_selected(|k| k.timestamp = f(k.timestamp)))
    }

    /// Apply `f` to each selected keyframe and re-sort affected channels.
    /// Returns how many keyframes were visited.
    fn update_selected(&mut self, mut f: impl FnMut(&mut Keyframe)) -> usize {
        let selection = &self.selection;
        let mut count = 0;

        for track in &mut self.channels {
            let mut touched = 0;
            for keyframe in track
                .keyframes
                .iter_mut()
                .filter(|k| selection.contains(k.id))
            {
                f(keyframe);
                touched += 1;
            }
            if touched > 0 {
                track.sort();
            }
            count += touched;
        }

        count
    }

    fn sort_all(&mut self) {
        for track in &mut self.channels {
            track.sort();
        }
    }

    fn counted_edit(&mut self, count: usize, verb: &str) -> EditOutcome {
        if count == 0 {
            return self.no_op(NO_SELECTION);
        }
        self.mark_edit(format!("{verb} {count} keyframes"))
    }

    fn finish(&mut self, description: &str, changed: bool) -> EditOutcome {
        if changed {
            self.mark_edit(description)
        } else {
            self.no_op(description)
        }
    }

    /// Record an undo snapshot and report the edit
    fn mark_edit(&mut self, description: impl Into<String>) -> EditOutcome {
        let description = description.into();
        let channels = self.serialize();

        self.history.push(UndoSnapshot {
            description: description.clone(),
            channels: channels.clone(),
        });
        self.emitter.emit(TimelineEvent::Autosave(channels));

        self.report(description, true)
    }

    fn no_op(&mut self, description: impl Into<String>) -> EditOutcome {
        self.report(description.into(), false)
    }

    fn report(&mut self, description: String, changed: bool) -> EditOutcome {
        let selected = self.selection.len();
        debug!(changed, selected, "{}", description);

        self.emitter.emit(TimelineEvent::Edit(description.clone()));
        self.emitter.emit(TimelineEvent::Selected(selected));

        EditOutcome {
            description,
            changed,
            selected,
        }
    }
}
