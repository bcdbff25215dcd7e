//! Song-level structure: sections from markers, tempo and key changes, and
//! harmonic-density transitions.

use std::sync::LazyLock;

use regex::Regex;

use crate::score::{AlignedScore, Measure, Role};

/// Section vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SectionKind {
    Intro,
    Verse,
    PreChorus,
    Chorus,
    Bridge,
    Solo,
    Outro,
    Breakdown,
    #[default]
    Default,
}

impl SectionKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Intro => "intro",
            Self::Verse => "verse",
            Self::PreChorus => "pre_chorus",
            Self::Chorus => "chorus",
            Self::Bridge => "bridge",
            Self::Solo => "solo",
            Self::Outro => "outro",
            Self::Breakdown => "breakdown",
            Self::Default => "default",
        }
    }
}

/// A contiguous run of measures, inclusive on both ends, 0-based.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub kind: SectionKind,
    pub start_measure: usize,
    pub end_measure: usize,
    pub intensity: f64,
}

impl Section {
    pub fn contains(&self, measure: usize) -> bool {
        (self.start_measure..=self.end_measure).contains(&measure)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempoChange {
    pub measure: usize,
    pub tempo: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyChange {
    pub measure: usize,
    pub key: Option<i8>,
    pub minor: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    Buildup,
    Breakdown,
}

impl TransitionKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Buildup => "buildup",
            Self::Breakdown => "breakdown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub measure: usize,
    pub kind: TransitionKind,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SongStructure {
    pub sections: Vec<Section>,
    pub tempo_changes: Vec<TempoChange>,
    pub key_changes: Vec<KeyChange>,
    pub transitions: Vec<Transition>,
}

impl SongStructure {
    pub fn section_for(&self, measure: usize) -> Option<&Section> {
        self.sections.iter().find(|s| s.contains(measure))
    }
}

// ── Marker classification ─────────────────────────────────────────────
// Three independent passes over the lowercased marker text:
// section keyword → mood modifier → explicit [intensity:x] override.

/// Ordered keyword table; first hit wins. "pre-chorus" must precede "chorus".
const SECTION_KEYWORDS: &[(&[&str], SectionKind, f64)] = &[
    (&["intro"], SectionKind::Intro, 0.8),
    (&["verse"], SectionKind::Verse, 0.9),
    (&["pre-chorus", "pre chorus"], SectionKind::PreChorus, 1.1),
    (&["chorus"], SectionKind::Chorus, 1.3),
    (&["bridge"], SectionKind::Bridge, 1.0),
    (&["solo"], SectionKind::Solo, 1.4),
    (&["outro"], SectionKind::Outro, 0.85),
    (&["breakdown"], SectionKind::Breakdown, 1.5),
];

/// Ordered mood modifiers; first hit applies, the rest are ignored.
const MOOD_MODIFIERS: &[(&[&str], f64)] = &[
    (&["quiet", "soft"], 0.7),
    (&["loud", "heavy"], 1.3),
    (&["intense"], 1.5),
];

static INTENSITY_OVERRIDE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[intensity:\s*(?P<value>\d+(?:\.\d+)?|\.\d+)\s*\]").unwrap()
});

/// Section keyword lookup on lowercased text.
pub fn section_keyword(lower: &str) -> (SectionKind, f64) {
    SECTION_KEYWORDS
        .iter()
        .find(|(words, _, _)| words.iter().any(|w| lower.contains(w)))
        .map(|&(_, kind, intensity)| (kind, intensity))
        .unwrap_or((SectionKind::Default, 1.0))
}

/// Mood multiplier found in lowercased text, 1.0 if none.
pub fn mood_modifier(lower: &str) -> f64 {
    MOOD_MODIFIERS
        .iter()
        .find(|(words, _)| words.iter().any(|w| lower.contains(w)))
        .map(|&(_, factor)| factor)
        .unwrap_or(1.0)
}

/// Explicit `[intensity:<float>]` tag, if present and parseable.
pub fn intensity_override(lower: &str) -> Option<f64> {
    INTENSITY_OVERRIDE_RE
        .captures(lower)
        .and_then(|c| c.name("value"))
        .and_then(|m| m.as_str().parse().ok())
}

/// Classify free marker text into a section kind and intensity multiplier.
pub fn classify_marker(text: &str) -> (SectionKind, f64) {
    let lower = text.to_lowercase();
    let (kind, base) = section_keyword(&lower);
    let intensity = intensity_override(&lower).unwrap_or(base * mood_modifier(&lower));
    (kind, intensity)
}

// ── Structure analysis ────────────────────────────────────────────────

/// Density change ratio above which a measure is a buildup.
const BUILDUP_RATIO: f64 = 1.5;
/// Density change ratio below which a measure is a breakdown.
const BREAKDOWN_RATIO: f64 = 0.67;

/// Walk the measure headers once and derive the song structure.
pub fn analyze_structure(score: &AlignedScore) -> SongStructure {
    let headers = &score.headers;
    let mut structure = SongStructure::default();
    if headers.is_empty() {
        return structure;
    }

    // Before the first marker the song is treated as a neutral intro.
    let mut current = Section {
        kind: SectionKind::Intro,
        start_measure: 0,
        end_measure: 0,
        intensity: 1.0,
    };

    for (i, header) in headers.iter().enumerate() {
        if let Some(marker) = &header.marker {
            if i > 0 {
                current.end_measure = i - 1;
                structure.sections.push(current.clone());
            }
            let (kind, intensity) = classify_marker(marker);
            log::debug!("Measure {}: marker '{}' → {} ×{:.2}", i + 1, marker, kind.label(), intensity);
            current = Section {
                kind,
                start_measure: i,
                end_measure: i,
                intensity,
            };
        }

        if i == 0 {
            continue;
        }

        match (score.tempo_at(i), score.tempo_at(i - 1)) {
            (Some(tempo), Some(prev)) if tempo != prev => {
                structure.tempo_changes.push(TempoChange { measure: i, tempo });
            }
            (None, _) | (_, None) => {
                log::trace!("Measure {}: tempo not resolvable, skipped", i + 1);
            }
            _ => {}
        }

        let prev = &headers[i - 1];
        if header.key_signature.is_some() && prev.key_signature.is_some() {
            let key_changed = matches!((header.key(), prev.key()), (Some(a), Some(b)) if a != b);
            let mode_changed =
                matches!((header.is_minor(), prev.is_minor()), (Some(a), Some(b)) if a != b);
            if key_changed || mode_changed {
                structure.key_changes.push(KeyChange {
                    measure: i,
                    key: header.key(),
                    minor: header.is_minor(),
                });
            }
        }
    }

    current.end_measure = headers.len() - 1;
    structure.sections.push(current);

    let densities: Vec<f64> = (0..headers.len())
        .map(|i| harmonic_density(score, i))
        .collect();
    for i in 1..densities.len() {
        let (prev, cur) = (densities[i - 1], densities[i]);
        let kind = if cur > prev * BUILDUP_RATIO {
            Some(TransitionKind::Buildup)
        } else if cur < prev * BREAKDOWN_RATIO {
            Some(TransitionKind::Breakdown)
        } else {
            None
        };
        if let Some(kind) = kind {
            structure.transitions.push(Transition { measure: i, kind });
        }
    }

    log::debug!(
        "Structure: {} sections, {} tempo changes, {} key changes, {} transitions",
        structure.sections.len(),
        structure.tempo_changes.len(),
        structure.key_changes.len(),
        structure.transitions.len()
    );
    structure
}

/// Mean notes per beat across Guitar, Bass and Drums for one measure.
/// Rests count as beats. Bass Drive is excluded.
pub fn harmonic_density(score: &AlignedScore, index: usize) -> f64 {
    let mut notes = 0usize;
    let mut beats = 0usize;
    for role in [Role::Guitar, Role::Bass, Role::Drums] {
        if let Some(measure) = score.track(role).get(index) {
            let (n, b) = count_notes(measure);
            notes += n;
            beats += b;
        }
    }
    notes as f64 / beats.max(1) as f64
}

fn count_notes(measure: &Measure) -> (usize, usize) {
    measure
        .beats()
        .fold((0, 0), |(n, b), beat| (n + beat.notes.len(), b + 1))
}
