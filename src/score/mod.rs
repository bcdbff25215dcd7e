//! In-memory score model consumed by the light pipeline.
//!
//! A [`Score`] is what a loader produces: a loose list of named tracks plus
//! song-level measure headers. [`AlignedScore`] is the validated form the core
//! works on, with the four instrument roles resolved and measure counts
//! checked.

pub mod load;

use std::fmt;

use serde::Deserialize;
use thiserror::Error;

use crate::{TICKS_PER_QUARTER, Tick};

#[derive(Error, Debug)]
pub enum ScoreError {
    #[error("missing tracks: {}", join_roles(.roles))]
    MissingTracks { roles: Vec<Role> },
    #[error("track '{role}' has {found} measures, expected {expected}")]
    MeasureCountMismatch {
        role: Role,
        expected: usize,
        found: usize,
    },
    #[error("unsupported score format: '{0}'")]
    UnsupportedFormat(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

fn join_roles(roles: &[Role]) -> String {
    roles
        .iter()
        .map(|r| r.track_name())
        .collect::<Vec<_>>()
        .join(", ")
}

/// The four instrument roles a score must provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Guitar,
    Bass,
    /// Auxiliary signal track. Modulates Bass, never lights its own lane.
    BassDrive,
    Drums,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Guitar, Role::Bass, Role::BassDrive, Role::Drums];

    /// Exact track name used to locate the role in a score.
    pub fn track_name(&self) -> &'static str {
        match self {
            Self::Guitar => "Guitar",
            Self::Bass => "Bass",
            Self::BassDrive => "Bass Drive",
            Self::Drums => "Drums",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.track_name())
    }
}

/// Playing technique flags carried by a note.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NoteEffects {
    pub palm_mute: bool,
    pub vibrato: bool,
    pub bend: bool,
    pub harmonic: bool,
    pub tremolo: bool,
    pub trill: bool,
    pub hammer_pull: bool,
    pub distortion: bool,
}

fn default_velocity() -> u8 {
    95
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Note {
    /// MIDI-style pitch value.
    pub pitch: i32,
    #[serde(default = "default_velocity")]
    pub velocity: u8,
    #[serde(default)]
    pub string: u8,
    #[serde(default)]
    pub effects: NoteEffects,
}

impl Note {
    pub fn new(pitch: i32) -> Self {
        Self {
            pitch,
            velocity: default_velocity(),
            string: 0,
            effects: NoteEffects::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Beat {
    /// Measure-relative start tick.
    pub start: Tick,
    pub duration: Tick,
    /// Empty means rest.
    #[serde(default)]
    pub notes: Vec<Note>,
}

impl Beat {
    pub fn is_rest(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn end(&self) -> Tick {
        self.start + self.duration
    }

    pub fn lowest_pitch(&self) -> Option<i32> {
        self.notes.iter().map(|n| n.pitch).min()
    }

    pub fn mean_pitch(&self) -> Option<f64> {
        if self.notes.is_empty() {
            return None;
        }
        let sum: i64 = self.notes.iter().map(|n| n.pitch as i64).sum();
        Some(sum as f64 / self.notes.len() as f64)
    }

    pub fn mean_velocity(&self) -> Option<f64> {
        if self.notes.is_empty() {
            return None;
        }
        let sum: u32 = self.notes.iter().map(|n| n.velocity as u32).sum();
        Some(sum as f64 / self.notes.len() as f64)
    }

    /// True if any note in the beat carries the effect selected by `flag`.
    pub fn any_effect(&self, flag: impl Fn(&NoteEffects) -> bool) -> bool {
        self.notes.iter().any(|n| flag(&n.effects))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Voice {
    #[serde(default)]
    pub beats: Vec<Beat>,
}

/// One measure of one instrument track.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Measure {
    #[serde(default)]
    pub key_signature: Option<KeySignature>,
    #[serde(default)]
    pub voices: Vec<Voice>,
}

impl Measure {
    /// All beats of all voices, voice by voice.
    pub fn beats(&self) -> impl Iterator<Item = &Beat> {
        self.voices.iter().flat_map(|v| v.beats.iter())
    }

    /// Beats that carry at least one note.
    pub fn sounding_beats(&self) -> impl Iterator<Item = &Beat> {
        self.beats().filter(|b| !b.is_rest())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TimeSignature {
    pub numerator: u32,
    pub denominator: u32,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self {
            numerator: 4,
            denominator: 4,
        }
    }
}

impl TimeSignature {
    /// Nominal measure length in ticks.
    pub fn measure_ticks(&self) -> Tick {
        let whole = TICKS_PER_QUARTER * 4;
        whole * self.numerator as Tick / self.denominator.max(1) as Tick
    }
}

/// Key signature metadata. Exporters disagree on the field names, so both
/// shapes are accepted and read through [`KeySignature::key`] and
/// [`KeySignature::is_minor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum KeySignature {
    Explicit {
        key: i8,
        #[serde(default)]
        minor: Option<bool>,
    },
    /// `mode == 1` means minor.
    Encoded {
        value: i8,
        #[serde(default)]
        mode: Option<u8>,
    },
}

impl KeySignature {
    pub fn key(&self) -> Option<i8> {
        match self {
            Self::Explicit { key, .. } => Some(*key),
            Self::Encoded { value, .. } => Some(*value),
        }
    }

    pub fn is_minor(&self) -> Option<bool> {
        match self {
            Self::Explicit { minor, .. } => *minor,
            Self::Encoded { mode, .. } => mode.map(|m| m == 1),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Direction {
    #[serde(default)]
    pub tempo: Option<u32>,
}

/// Song-level tempo change entry, keyed by 0-based measure index.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TempoMark {
    pub measure: usize,
    pub tempo: u32,
}

/// Song-level metadata for one measure, independent of the instrument tracks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MeasureHeader {
    /// Explicit tick length. Falls back to the time signature's length.
    pub length: Option<Tick>,
    pub time_signature: TimeSignature,
    pub marker: Option<String>,
    pub tempo: Option<u32>,
    pub direction: Option<Direction>,
    pub key_signature: Option<KeySignature>,
}

impl MeasureHeader {
    pub fn ticks(&self) -> Tick {
        self.length
            .unwrap_or_else(|| self.time_signature.measure_ticks())
    }

    pub fn key(&self) -> Option<i8> {
        self.key_signature.and_then(|ks| ks.key())
    }

    pub fn is_minor(&self) -> Option<bool> {
        self.key_signature.and_then(|ks| ks.is_minor())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Track {
    pub name: String,
    #[serde(default)]
    pub measures: Vec<Measure>,
}

/// A score as loaded from disk, before role validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Score {
    pub title: String,
    /// Absolute tick at which the first measure starts.
    pub origin_tick: Tick,
    pub measure_headers: Vec<MeasureHeader>,
    pub tracks: Vec<Track>,
    pub tempo_changes: Vec<TempoMark>,
}

/// A score whose four role tracks have been located and aligned 1:1 with the
/// measure headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedScore {
    pub title: String,
    pub origin_tick: Tick,
    pub headers: Vec<MeasureHeader>,
    pub guitar: Vec<Measure>,
    pub bass: Vec<Measure>,
    pub bass_drive: Vec<Measure>,
    pub drums: Vec<Measure>,
    pub tempo_changes: Vec<TempoMark>,
}

impl AlignedScore {
    /// Resolve the four roles by track name and check measure counts.
    ///
    /// Every missing role is reported in a single error.
    pub fn from_score(score: Score) -> Result<Self, ScoreError> {
        let Score {
            title,
            origin_tick,
            measure_headers,
            mut tracks,
            tempo_changes,
        } = score;

        let missing: Vec<Role> = Role::ALL
            .into_iter()
            .filter(|role| !tracks.iter().any(|t| t.name == role.track_name()))
            .collect();
        if !missing.is_empty() {
            return Err(ScoreError::MissingTracks { roles: missing });
        }

        let expected = measure_headers.len();
        let mut take = |role: Role| -> Result<Vec<Measure>, ScoreError> {
            let idx = tracks
                .iter()
                .position(|t| t.name == role.track_name())
                .ok_or(ScoreError::MissingTracks { roles: vec![role] })?;
            let measures = std::mem::take(&mut tracks[idx].measures);
            if measures.len() != expected {
                return Err(ScoreError::MeasureCountMismatch {
                    role,
                    expected,
                    found: measures.len(),
                });
            }
            Ok(measures)
        };

        let guitar = take(Role::Guitar)?;
        let bass = take(Role::Bass)?;
        let bass_drive = take(Role::BassDrive)?;
        let drums = take(Role::Drums)?;

        Ok(Self {
            title,
            origin_tick,
            headers: measure_headers,
            guitar,
            bass,
            bass_drive,
            drums,
            tempo_changes,
        })
    }

    pub fn measure_count(&self) -> usize {
        self.headers.len()
    }

    pub fn track(&self, role: Role) -> &[Measure] {
        match role {
            Role::Guitar => &self.guitar,
            Role::Bass => &self.bass,
            Role::BassDrive => &self.bass_drive,
            Role::Drums => &self.drums,
        }
    }

    /// Absolute start tick of every measure: origin plus running sum of lengths.
    pub fn measure_offsets(&self) -> Vec<Tick> {
        let mut offsets = Vec::with_capacity(self.headers.len());
        let mut tick = self.origin_tick;
        for header in &self.headers {
            offsets.push(tick);
            tick += header.ticks();
        }
        offsets
    }

    /// Absolute tick just past the last measure.
    pub fn end_tick(&self) -> Tick {
        self.origin_tick + self.headers.iter().map(|h| h.ticks()).sum::<Tick>()
    }

    /// Tempo of a measure, looked up on the header, then its direction, then
    /// the song-level change list. `None` if no source knows it.
    pub fn tempo_at(&self, index: usize) -> Option<u32> {
        let header = self.headers.get(index)?;
        header
            .tempo
            .or_else(|| header.direction.as_ref().and_then(|d| d.tempo))
            .or_else(|| {
                self.tempo_changes
                    .iter()
                    .find(|tc| tc.measure == index)
                    .map(|tc| tc.tempo)
            })
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    fn track(name: &str, measures: usize) -> Track {
        Track {
            name: name.to_string(),
            measures: vec![empty_measure(); measures],
        }
    }

    #[test]
    fn missing_roles_are_reported_together() {
        let score = Score {
            measure_headers: vec![header()],
            tracks: vec![track("Guitar", 1), track("Bass", 1)],
            ..Score::default()
        };
        let err = AlignedScore::from_score(score).unwrap_err();
        match &err {
            ScoreError::MissingTracks { roles } => {
                assert_eq!(roles, &vec![Role::BassDrive, Role::Drums]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.to_string(), "missing tracks: Bass Drive, Drums");
    }

    #[test]
    fn measure_count_mismatch_is_rejected() {
        let score = Score {
            measure_headers: vec![header(), header()],
            tracks: vec![
                track("Guitar", 2),
                track("Bass", 2),
                track("Bass Drive", 1),
                track("Drums", 2),
            ],
            ..Score::default()
        };
        assert!(matches!(
            AlignedScore::from_score(score),
            Err(ScoreError::MeasureCountMismatch {
                role: Role::BassDrive,
                expected: 2,
                found: 1
            })
        ));
    }

    #[test]
    fn offsets_are_running_sum_from_origin() {
        let mut score = guitar_only(
            vec![
                header(),
                MeasureHeader {
                    time_signature: TimeSignature {
                        numerator: 3,
                        denominator: 4,
                    },
                    ..MeasureHeader::default()
                },
                MeasureHeader {
                    length: Some(1000),
                    ..MeasureHeader::default()
                },
            ],
            vec![empty_measure(); 3],
        );
        score.origin_tick = 960;
        assert_eq!(score.measure_offsets(), vec![960, 4800, 7680]);
        assert_eq!(score.end_tick(), 8680);
    }

    #[test]
    fn six_eight_measure_length() {
        let ts = TimeSignature {
            numerator: 6,
            denominator: 8,
        };
        assert_eq!(ts.measure_ticks(), 2880);
    }

    #[test]
    fn key_signature_shapes() {
        let explicit: KeySignature = serde_json::from_str(r#"{"key": -3, "minor": true}"#).unwrap();
        assert_eq!(explicit.key(), Some(-3));
        assert_eq!(explicit.is_minor(), Some(true));

        let encoded: KeySignature = serde_json::from_str(r#"{"value": 2, "mode": 1}"#).unwrap();
        assert_eq!(encoded.key(), Some(2));
        assert_eq!(encoded.is_minor(), Some(true));

        let bare: KeySignature = serde_json::from_str(r#"{"value": 0}"#).unwrap();
        assert_eq!(bare.is_minor(), None);
    }

    #[test]
    fn tempo_resolves_through_each_source() {
        let mut score = guitar_only(
            vec![
                MeasureHeader {
                    tempo: Some(120),
                    ..header()
                },
                MeasureHeader {
                    direction: Some(Direction { tempo: Some(140) }),
                    ..header()
                },
                header(),
                header(),
            ],
            vec![empty_measure(); 4],
        );
        score.tempo_changes = vec![TempoMark {
            measure: 2,
            tempo: 90,
        }];
        assert_eq!(score.tempo_at(0), Some(120));
        assert_eq!(score.tempo_at(1), Some(140));
        assert_eq!(score.tempo_at(2), Some(90));
        assert_eq!(score.tempo_at(3), None);
        assert_eq!(score.tempo_at(9), None);
    }
}
