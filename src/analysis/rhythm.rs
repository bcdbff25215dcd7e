use std::collections::BTreeSet;

use crate::Tick;
use crate::score::Measure;

/// Onsets, distinct durations and note count of one instrument in one measure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RhythmPattern {
    pub positions: BTreeSet<Tick>,
    pub durations: BTreeSet<Tick>,
    pub note_count: usize,
}

impl RhythmPattern {
    pub fn is_empty(&self) -> bool {
        self.note_count == 0
    }
}

/// Flatten every voice of a measure into one onset/duration set.
/// Rests contribute nothing.
pub fn extract_rhythm(measure: &Measure) -> RhythmPattern {
    let mut pattern = RhythmPattern::default();
    for beat in measure.sounding_beats() {
        pattern.positions.insert(beat.start);
        pattern.durations.insert(beat.duration);
        pattern.note_count += beat.notes.len();
    }
    pattern
}
