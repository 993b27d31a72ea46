//! lumen-core: Keyframe timeline engine for audio-synchronized light shows

pub mod config;
mod error;
pub mod events;
mod keyframe;
pub mod project;
pub mod search;
mod selection;
pub mod time;
pub mod timeline;
pub mod undo;

pub use config::EngineConfig;
pub use error::{ConfigError, ImportError, LumenError, Result};
pub use events::{Emitter, TimelineEvent};
pub use keyframe::{Keyframe, KeyframeId, Track};
pub use project::{
    new_tracks, parse_project_data, parse_project_value, to_legacy_format,
    KeyframeData, LegacyProject, ProjectData, TrackData,
};
pub use search::{search, SearchSide};
pub use selection::Selection;
pub use time::{format_time, TimePrecision};
pub use timeline::{BoxSelection, EditOutcome, ShiftDirection, TimelineData, UndoSnapshot};
pub use undo::UndoHistory;
