//! Project documents: import (current and legacy formats) and export

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ImportError;
use crate::keyframe::Track;
use crate::selection::Selection;

// ============================================================================
// Current format
// ============================================================================

/// Serialized project data, also used for undo snapshots and autosave
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectData {
    pub tracks: Vec<TrackData>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackData {
    pub name: String,
    pub keyframes: Vec<KeyframeData>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyframeData {
    pub timestamp: f64,
    pub value: f64,
    #[serde(default)]
    pub selected: bool,
}

impl KeyframeData {
    pub fn new(timestamp: f64, value: f64) -> Self {
        Self {
            timestamp,
            value,
            selected: false,
        }
    }

    pub fn selected(mut self) -> Self {
        self.selected = true;
        self
    }
}

impl ProjectData {
    /// Capture channels with their selection flags
    pub fn from_channels(channels: &[Track], selection: &Selection) -> Self {
        let tracks = channels
            .iter()
            .map(|track| TrackData {
                name: track.name.clone(),
                keyframes: track
                    .keyframes
                    .iter()
                    .map(|k| KeyframeData {
                        timestamp: k.timestamp,
                        value: k.value,
                        selected: selection.contains(k.id),
                    })
                    .collect(),
            })
            .collect();

        Self { tracks }
    }

    pub fn keyframe_count(&self) -> usize {
        self.tracks.iter().map(|t| t.keyframes.len()).sum()
    }
}

/// Empty project with `count` channels named "0", "1", ...
pub fn new_tracks(count: usize) -> ProjectData {
    ProjectData {
        tracks: (0..count)
            .map(|n| TrackData {
                name: n.to_string(),
                keyframes: Vec::new(),
            })
            .collect(),
    }
}

// ============================================================================
// Legacy format
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyProject {
    #[serde(rename = "projectData")]
    pub project_data: LegacyMetadata,
    pub tracks: Vec<LegacyTrack>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyMetadata {
    pub name: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyTrack {
    pub id: usize,
    pub keyframes: Vec<LegacyKeyframe>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LegacyKeyframe {
    pub time: f64,
    pub state: f64,
}

/// Export channels in the old `{ projectData, tracks: [{ id, keyframes: [{ time, state }] }] }` shape
pub fn to_legacy_format(channels: &[Track], name: &str) -> LegacyProject {
    LegacyProject {
        project_data: LegacyMetadata {
            name: name.to_string(),
            id: name.to_string(),
        },
        tracks: channels
            .iter()
            .enumerate()
            .map(|(i, track)| LegacyTrack {
                id: i,
                keyframes: track
                    .keyframes
                    .iter()
                    .map(|k| LegacyKeyframe {
                        time: k.timestamp,
                        state: k.value,
                    })
                    .collect(),
            })
            .collect(),
    }
}

// ============================================================================
// Import
// ============================================================================

/// Accepted spellings per field, checked in order
const TIMESTAMP_FIELDS: &[&str] = &["ts", "timestamp", "time"];
const VALUE_FIELDS: &[&str] = &["value", "state"];
const NAME_FIELDS: &[&str] = &["name", "id"];

/// Result of reading one field under its aliases
#[derive(Debug, Clone, Copy, PartialEq)]
enum FieldLookup<T> {
    Found(T),
    Missing,
    WrongType,
}

/// The first alias present on the object wins, even if its value is null
fn first_present<'a>(object: &'a Value, aliases: &[&str]) -> Option<&'a Value> {
    aliases.iter().find_map(|alias| object.get(*alias))
}

fn lookup_timestamp(object: &Value) -> FieldLookup<f64> {
    match first_present(object, TIMESTAMP_FIELDS) {
        None => FieldLookup::Missing,
        Some(v) => v.as_f64().map_or(FieldLookup::WrongType, FieldLookup::Found),
    }
}

/// Numbers and booleans are both accepted and collapse to 0 or 1
fn lookup_state(object: &Value) -> FieldLookup<f64> {
    let on = match first_present(object, VALUE_FIELDS) {
        None => return FieldLookup::Missing,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        Some(_) => return FieldLookup::WrongType,
    };
    FieldLookup::Found(if on { 1.0 } else { 0.0 })
}

fn track_name(object: &Value) -> String {
    NAME_FIELDS
        .iter()
        .filter_map(|alias| object.get(*alias))
        .find_map(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
        .unwrap_or_default()
}

fn parse_keyframe(track: usize, keyframe: usize, object: &Value) -> Result<KeyframeData, ImportError> {
    let timestamp = match lookup_timestamp(object) {
        FieldLookup::Found(t) => t,
        FieldLookup::Missing => {
            return Err(ImportError::MissingField {
                track,
                keyframe,
                field: "timestamp",
                checked: TIMESTAMP_FIELDS,
            });
        }
        FieldLookup::WrongType => {
            return Err(ImportError::WrongType {
                track,
                keyframe,
                field: "timestamp",
                expected: "a number",
            });
        }
    };

    let value = match lookup_state(object) {
        FieldLookup::Found(v) => v,
        FieldLookup::Missing => {
            return Err(ImportError::MissingField {
                track,
                keyframe,
                field: "value",
                checked: VALUE_FIELDS,
            });
        }
        FieldLookup::WrongType => {
            return Err(ImportError::WrongType {
                track,
                keyframe,
                field: "value",
                expected: "a number or boolean",
            });
        }
    };

    let selected = object
        .get("selected")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    Ok(KeyframeData {
        timestamp,
        value,
        selected,
    })
}

/// Parse a project document in either the current or the legacy format
pub fn parse_project_value(data: &Value) -> Result<ProjectData, ImportError> {
    let tracks_in = data
        .get("tracks")
        .and_then(Value::as_array)
        .ok_or(ImportError::MissingTracks)?;

    let tracks = tracks_in
        .iter()
        .enumerate()
        .map(|(i, track_in)| {
            let keyframes_in = track_in
                .get("keyframes")
                .and_then(Value::as_array)
                .ok_or(ImportError::MissingKeyframes { track: i })?;

            let keyframes = keyframes_in
                .iter()
                .enumerate()
                .map(|(j, keyframe_in)| parse_keyframe(i, j, keyframe_in))
                .collect::<Result<Vec<_>, _>>()?;

            Ok(TrackData {
                name: track_name(track_in),
                keyframes,
            })
        })
        .collect::<Result<Vec<_>, ImportError>>()?;

    Ok(ProjectData { tracks })
}

pub fn parse_project_data(json: &str) -> Result<ProjectData, ImportError> {
    let data: Value = serde_json::from_str(json)?;
    parse_project_value(&data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyframe::{Keyframe, KeyframeId};
    use serde_json::json;

    fn old_data() -> Value {
        json!({
            "projectData": { "name": "carol_of_the_bells", "id": "carol_of_the_bells" },
            "tracks": [{
                "id": 0,
                "keyframes": [
                    { "channel": 0, "time": 1.2696969696969698, "oldTime": 1.2696969696969698, "state": 1, "selected": false },
                    { "channel": 0, "time": 1.6318181818181818, "oldTime": 1.6318181818181818, "state": 0, "selected": false },
                    { "channel": 0, "time": 3.6469696969696974, "oldTime": 3.6469696969696974, "state": 1, "selected": true }
                ]
            }]
        })
    }

    fn new_data() -> ProjectData {
        ProjectData {
            tracks: vec![TrackData {
                name: "0".into(),
                keyframes: vec![
                    KeyframeData::new(1.2696969696969698, 1.0),
                    KeyframeData::new(1.6318181818181818, 0.0),
                    KeyframeData::new(3.6469696969696974, 1.0).selected(),
                ],
            }],
        }
    }

    #[test]
    fn test_accepts_old_format() {
        assert_eq!(parse_project_value(&old_data()).unwrap(), new_data());
    }

    #[test]
    fn test_accepts_new_format() {
        let json = serde_json::to_string(&new_data()).unwrap();
        assert_eq!(parse_project_data(&json).unwrap(), new_data());
    }

    #[test]
    fn test_ts_alias_and_boolean_value() {
        let data = json!({ "tracks": [{ "name": "A", "keyframes": [{ "ts": 2.5, "value": true }] }] });
        let parsed = parse_project_value(&data).unwrap();
        assert_eq!(parsed.tracks[0].name, "A");
        assert_eq!(parsed.tracks[0].keyframes[0], KeyframeData::new(2.5, 1.0));
    }

    #[test]
    fn test_nonzero_value_normalized() {
        let data = json!({ "tracks": [{ "name": "A", "keyframes": [{ "time": 1, "state": 255 }] }] });
        let parsed = parse_project_value(&data).unwrap();
        assert_eq!(parsed.tracks[0].keyframes[0].value, 1.0);
    }

    #[test]
    fn test_missing_tracks() {
        let err = parse_project_value(&json!({ "projectData": {} })).unwrap_err();
        assert!(matches!(err, ImportError::MissingTracks));
        assert_eq!(err.to_string(), "No tracks data present");
    }

    #[test]
    fn test_missing_keyframes() {
        let err = parse_project_value(&json!({ "tracks": [{ "name": "a", "keyframes": [] }, { "name": "b" }] }))
            .unwrap_err();
        assert!(matches!(err, ImportError::MissingKeyframes { track: 1 }));
    }

    #[test]
    fn test_missing_timestamp_names_aliases() {
        let data = json!({ "tracks": [{ "keyframes": [{ "ts": 0, "value": 0 }, { "value": 1 }] }] });
        let err = parse_project_value(&data).unwrap_err();
        assert_eq!(
            err.to_string(),
            "tracks[0].keyframes[1] missing timestamp field, checked: ts, timestamp, time"
        );
    }

    #[test]
    fn test_wrong_types() {
        let data = json!({ "tracks": [{ "keyframes": [{ "time": "soon", "state": 1 }] }] });
        assert!(matches!(
            parse_project_value(&data).unwrap_err(),
            ImportError::WrongType { field: "timestamp", .. }
        ));

        let data = json!({ "tracks": [{ "keyframes": [{ "time": 1, "state": "on" }] }] });
        assert!(matches!(
            parse_project_value(&data).unwrap_err(),
            ImportError::WrongType { field: "value", .. }
        ));

        // An explicit null shadows later aliases
        let data = json!({ "tracks": [{ "keyframes": [{ "ts": null, "time": 1, "state": 1 }] }] });
        assert!(matches!(
            parse_project_value(&data).unwrap_err(),
            ImportError::WrongType { field: "timestamp", .. }
        ));
    }

    #[test]
    fn test_missing_value() {
        let data = json!({ "tracks": [{ "keyframes": [{ "time": 1 }] }] });
        let err = parse_project_value(&data).unwrap_err();
        assert!(matches!(err, ImportError::MissingField { field: "value", track: 0, keyframe: 0, .. }));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(parse_project_data("{ tracks"), Err(ImportError::Json(_))));
    }

    #[test]
    fn test_legacy_export_reimports() {
        let mut track = Track::new("0");
        track.insert(Keyframe::new(KeyframeId(1), 0.5, 1.0));
        track.insert(Keyframe::new(KeyframeId(2), 1.5, 0.0));

        let legacy = to_legacy_format(&[track], "show");
        assert_eq!(legacy.project_data.name, "show");
        assert_eq!(legacy.tracks[0].keyframes[1], LegacyKeyframe { time: 1.5, state: 0.0 });

        let json = serde_json::to_value(&legacy).unwrap();
        assert!(json.get("projectData").is_some());

        let parsed = parse_project_value(&json).unwrap();
        assert_eq!(parsed.tracks[0].name, "0");
        assert_eq!(
            parsed.tracks[0].keyframes,
            vec![KeyframeData::new(0.5, 1.0), KeyframeData::new(1.5, 0.0)]
        );
    }

    #[test]
    fn test_new_tracks() {
        let data = new_tracks(3);
        let names: Vec<&str> = data.tracks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["0", "1", "2"]);
        assert_eq!(data.keyframe_count(), 0);
    }
}
