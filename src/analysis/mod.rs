//! Musical analysis feeding the light producers.

pub mod groove;
pub mod rhythm;
pub mod structure;

pub use groove::{GrooveInfo, GrooveType, MeasureRhythm, analyze_groove, analyze_measure};
pub use rhythm::{RhythmPattern, extract_rhythm};
pub use structure::{Section, SectionKind, SongStructure, analyze_structure};
