//! Per-measure groove metrics.
//!
//! [`analyze_measure`] combines the three lit instruments into one rhythm
//! summary (density, syncopation, dominance). [`analyze_groove`] looks deeper
//! at a single instrument, classifying its groove and picking out the
//! structurally important onsets. The bass producer uses it to weight notes.
//!
//! The numeric thresholds are tuned by ear and kept as constants so output
//! stays reproducible.

use std::collections::{BTreeMap, BTreeSet};

use super::rhythm::RhythmPattern;
use crate::light::Channel;
use crate::score::Measure;
use crate::{TICKS_PER_QUARTER, Tick};

const QUARTER: Tick = TICKS_PER_QUARTER;

/// Window around a grid line within which an onset counts as on the grid.
pub const GRID_TOLERANCE: Tick = QUARTER / 16;
/// Window around beats 1 and 3 for strong-beat detection.
const STRONG_BEAT_TOLERANCE: Tick = QUARTER / 8;

/// Max/min interval ratio below which intervals count as uniform.
const UNIFORM_VARIATION: f64 = 1.2;
/// Max/min interval ratio below which a line counts as a riff.
const RIFF_VARIATION: f64 = 2.0;
/// Share of onsets on one lowest pitch that makes a pedal tone.
const PEDAL_SHARE: f64 = 0.6;
/// Onset louder than this multiple of the measure mean is important.
const INTENSITY_SPIKE: f64 = 1.3;
/// Onset longer than this multiple of the measure mean is important.
const LONG_NOTE: f64 = 1.5;
/// Softer spike threshold used when weighting a single onset.
const IMPORTANCE_SPIKE: f64 = 1.2;
/// Minimum syncopation before off-grid onsets get extra weight.
const SYNCOPATED_WEIGHTING: f64 = 0.3;

/// Importance returned when there is nothing to judge against.
pub const DEFAULT_IMPORTANCE: f64 = 0.5;

/// True if `position` lies within [`GRID_TOLERANCE`] of a quarter- or
/// eighth-note line. The quarter grid is a subset of the eighth grid.
pub fn is_on_grid(position: Tick) -> bool {
    let eighth = QUARTER / 2;
    let r = position.rem_euclid(eighth);
    r < GRID_TOLERANCE || eighth - r < GRID_TOLERANCE
}

/// Fraction of positions that sit off the quarter/eighth grid.
pub fn syncopation_of<'a>(positions: impl IntoIterator<Item = &'a Tick>) -> f64 {
    let mut total = 0usize;
    let mut off = 0usize;
    for &p in positions {
        total += 1;
        if !is_on_grid(p) {
            off += 1;
        }
    }
    off as f64 / total.max(1) as f64
}

/// Cross-instrument rhythm summary of one measure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasureRhythm {
    /// Union of Guitar, Bass and Drums onsets.
    pub positions: BTreeSet<Tick>,
    /// Notes per beat per instrument.
    pub density: f64,
    /// Instrument with the most notes. `None` for a silent measure.
    pub dominant: Option<Channel>,
    pub syncopation: f64,
    pub complexity: f64,
}

pub fn analyze_measure(
    guitar: &RhythmPattern,
    bass: &RhythmPattern,
    drums: &RhythmPattern,
    beats_per_measure: u32,
) -> MeasureRhythm {
    let patterns = [(Channel::Guitar, guitar), (Channel::Bass, bass), (Channel::Drums, drums)];

    let positions: BTreeSet<Tick> = patterns
        .iter()
        .flat_map(|(_, p)| p.positions.iter().copied())
        .collect();
    let durations: BTreeSet<Tick> = patterns
        .iter()
        .flat_map(|(_, p)| p.durations.iter().copied())
        .collect();

    let total_notes: usize = patterns.iter().map(|(_, p)| p.note_count).sum();
    let density =
        total_notes as f64 / (beats_per_measure.max(1) as f64 * patterns.len() as f64);

    // Strict comparison keeps the earlier channel on ties.
    let mut dominant: Option<(Channel, usize)> = None;
    for (channel, pattern) in &patterns {
        if pattern.note_count == 0 {
            continue;
        }
        match dominant {
            Some((_, best)) if pattern.note_count <= best => {}
            _ => dominant = Some((*channel, pattern.note_count)),
        }
    }

    MeasureRhythm {
        syncopation: syncopation_of(&positions),
        complexity: (durations.len() as f64 / 8.0).min(1.0),
        positions,
        density,
        dominant: dominant.map(|(c, _)| c),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GrooveType {
    #[default]
    Default,
    FourOnFloor,
    EighthNoteWalk,
    SixteenthNoteDrive,
    Riff,
    Syncopated,
    PedalTone,
}

impl GrooveType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::FourOnFloor => "four_on_floor",
            Self::EighthNoteWalk => "eighth_note_walk",
            Self::SixteenthNoteDrive => "sixteenth_note_drive",
            Self::Riff => "riff",
            Self::Syncopated => "syncopated",
            Self::PedalTone => "pedal_tone",
        }
    }
}

/// Single-instrument groove analysis of one measure.
#[derive(Debug, Clone, PartialEq)]
pub struct GrooveInfo {
    /// Onset positions, sorted. One entry per sounding beat.
    pub positions: Vec<Tick>,
    pub durations: Vec<Tick>,
    /// Mean velocity / 127 per onset.
    pub intensities: Vec<f64>,
    pub groove_type: GrooveType,
    pub subdivision: Tick,
    pub syncopation: f64,
    /// Structurally emphasised onsets, sorted and deduplicated.
    pub important_beats: Vec<Tick>,
}

impl Default for GrooveInfo {
    fn default() -> Self {
        Self {
            positions: Vec::new(),
            durations: Vec::new(),
            intensities: Vec::new(),
            groove_type: GrooveType::Default,
            subdivision: QUARTER / 4,
            syncopation: 0.0,
            important_beats: Vec::new(),
        }
    }
}

fn mean(values: impl ExactSizeIterator<Item = f64>) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    values.sum::<f64>() / n as f64
}

pub fn analyze_groove(measure: &Measure) -> GrooveInfo {
    let mut onsets: Vec<(Tick, Tick, f64, i32)> = measure
        .sounding_beats()
        .map(|b| {
            (
                b.start,
                b.duration,
                b.mean_velocity().unwrap_or(0.0) / 127.0,
                b.lowest_pitch().unwrap_or(0),
            )
        })
        .collect();
    onsets.sort_by_key(|o| o.0);

    let mut info = GrooveInfo {
        positions: onsets.iter().map(|o| o.0).collect(),
        durations: onsets.iter().map(|o| o.1).collect(),
        intensities: onsets.iter().map(|o| o.2).collect(),
        ..GrooveInfo::default()
    };
    if info.positions.is_empty() {
        return info;
    }

    if info.positions.len() >= 4 {
        classify(&mut info);
        let lowest: Vec<i32> = onsets.iter().map(|o| o.3).collect();
        if is_pedal_tone(&lowest) {
            info.groove_type = GrooveType::PedalTone;
        }
    }

    info.syncopation = syncopation_of(&info.positions);
    info.important_beats = important_beats(&info);
    info
}

fn classify(info: &mut GrooveInfo) {
    let intervals: Vec<Tick> = info.positions.windows(2).map(|w| w[1] - w[0]).collect();
    let (Some(&min), Some(&max)) = (intervals.iter().min(), intervals.iter().max()) else {
        return;
    };
    let avg = intervals.iter().sum::<Tick>() as f64 / intervals.len() as f64;
    let variation = if min > 0 { max as f64 / min as f64 } else { 1.0 };
    let near = |target: Tick| (avg - target as f64).abs() < GRID_TOLERANCE as f64;

    if variation < UNIFORM_VARIATION {
        if near(QUARTER) {
            info.groove_type = GrooveType::FourOnFloor;
            info.subdivision = QUARTER;
        } else if near(QUARTER / 2) {
            info.groove_type = GrooveType::EighthNoteWalk;
            info.subdivision = QUARTER / 2;
        } else if near(QUARTER / 4) {
            info.groove_type = GrooveType::SixteenthNoteDrive;
            info.subdivision = QUARTER / 4;
        }
    } else if variation < RIFF_VARIATION {
        info.groove_type = GrooveType::Riff;
        info.subdivision = min;
    } else {
        info.groove_type = GrooveType::Syncopated;
        info.subdivision = QUARTER / 2;
    }
}

fn is_pedal_tone(lowest: &[i32]) -> bool {
    let mut counts: BTreeMap<i32, usize> = BTreeMap::new();
    for &p in lowest {
        *counts.entry(p).or_default() += 1;
    }
    let top = counts.values().copied().max().unwrap_or(0);
    !lowest.is_empty() && top as f64 / lowest.len() as f64 > PEDAL_SHARE
}

fn important_beats(info: &GrooveInfo) -> Vec<Tick> {
    let positions = &info.positions;
    let mut important = BTreeSet::new();

    if let (Some(&first), Some(&last)) = (positions.first(), positions.last()) {
        important.insert(first);
        important.insert(last);
    }

    for &pos in positions {
        if [0, QUARTER * 2]
            .iter()
            .any(|strong| (pos - strong).abs() < STRONG_BEAT_TOLERANCE)
        {
            important.insert(pos);
        }
    }

    if info.intensities.len() > 2 {
        let avg = mean(info.intensities.iter().copied());
        for (pos, &intensity) in positions.iter().zip(&info.intensities) {
            if intensity > avg * INTENSITY_SPIKE {
                important.insert(*pos);
            }
        }
    }

    let avg_duration = mean(info.durations.iter().map(|&d| d as f64));
    for (pos, &duration) in positions.iter().zip(&info.durations) {
        if duration as f64 > avg_duration * LONG_NOTE {
            important.insert(*pos);
        }
    }

    important.into_iter().collect()
}

impl GrooveInfo {
    /// Rhythmic weight of an onset at `position`, 0–1.
    ///
    /// Starts at [`DEFAULT_IMPORTANCE`] and takes the highest of: proximity
    /// to an important beat, metric position, the groove type's own emphasis,
    /// a velocity spike, or being the first/last onset.
    pub fn importance(&self, position: Tick) -> f64 {
        let mut importance = DEFAULT_IMPORTANCE;
        let (Some(&first), Some(&last)) = (self.positions.first(), self.positions.last()) else {
            return importance;
        };
        let close = |a: Tick, b: Tick| (a - b).abs() < GRID_TOLERANCE;

        if self.important_beats.iter().any(|&b| close(position, b)) {
            importance = 0.9;
        }

        let beat_in_measure = (position as f64 / QUARTER as f64).rem_euclid(4.0);
        // Beat 1 strongest, then 3, then 4 (leads back to 1), then 2.
        let metric = match beat_in_measure {
            b if b < 0.25 => 1.0,
            b if (2.0..2.25).contains(&b) => 0.8,
            b if (3.0..3.25).contains(&b) => 0.7,
            b if (1.0..1.25).contains(&b) => 0.6,
            _ => 0.0,
        };
        importance = importance.max(metric);

        match self.groove_type {
            GrooveType::FourOnFloor => {
                if (0..4).any(|i| (position - i * QUARTER).abs() < STRONG_BEAT_TOLERANCE) {
                    importance = importance.max(0.8);
                }
            }
            GrooveType::Riff => {
                let phase = position.rem_euclid(QUARTER);
                let repeats = self
                    .positions
                    .iter()
                    .filter(|&&p| (p.rem_euclid(QUARTER) - phase).abs() < GRID_TOLERANCE)
                    .count();
                if repeats > 1 {
                    importance = importance.max(0.75);
                }
            }
            GrooveType::Syncopated | GrooveType::PedalTone => {
                if !is_on_grid(position) && self.syncopation > SYNCOPATED_WEIGHTING {
                    importance = importance.max(0.85);
                }
            }
            _ => {}
        }

        if !self.intensities.is_empty() {
            let avg = mean(self.intensities.iter().copied());
            let spiked = self
                .positions
                .iter()
                .zip(&self.intensities)
                .any(|(&p, &i)| close(position, p) && i > avg * IMPORTANCE_SPIKE);
            if spiked {
                importance = importance.max(0.8);
            }
        }

        if close(position, first) {
            importance = importance.max(0.9);
        } else if close(position, last) {
            importance = importance.max(0.8);
        }

        importance
    }
}
