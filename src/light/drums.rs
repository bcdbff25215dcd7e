//! Drums lane: one flash per kit piece struck, staggered so simultaneous hits
//! stay distinguishable.

use super::{Channel, LightEvent, MeasureContext, Rgb};
use crate::analysis::structure::SectionKind;
use crate::score::{Beat, Measure};
use crate::{TICKS_PER_QUARTER, Tick};

const QUARTER: Tick = TICKS_PER_QUARTER;

/// Velocity that maps to unit intensity.
const REFERENCE_VELOCITY: f64 = 90.0;
const COMBINED_BOOST: f64 = 1.25;
const COMBINED_DURATION: Tick = QUARTER / 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KitPiece {
    Kick,
    Snare,
    HiHat,
    Crash,
    Tom,
}

impl KitPiece {
    pub const ALL: [KitPiece; 5] = [
        KitPiece::Kick,
        KitPiece::Snare,
        KitPiece::HiHat,
        KitPiece::Crash,
        KitPiece::Tom,
    ];

    /// General MIDI percussion mapping.
    pub fn from_pitch(pitch: i32) -> Option<Self> {
        match pitch {
            35 | 36 => Some(Self::Kick),
            38 | 40 => Some(Self::Snare),
            42 | 44 | 46 => Some(Self::HiHat),
            49 | 57 => Some(Self::Crash),
            41 | 43 | 45 | 47 | 48 | 50 => Some(Self::Tom),
            _ => None,
        }
    }

    fn base_color(self) -> Rgb {
        match self {
            Self::Kick => Rgb::new(200, 50, 50),
            Self::Snare => Rgb::new(100, 150, 100),
            Self::HiHat => Rgb::new(50, 100, 150),
            Self::Crash => Rgb::new(200, 200, 200),
            Self::Tom => Rgb::new(100, 80, 120),
        }
    }

    /// Kit colour re-tinted for a section.
    pub fn color(self, kind: SectionKind) -> Rgb {
        let base = self.base_color();
        match (kind, self) {
            (SectionKind::Chorus, Self::Kick | Self::Snare) => base.scale(1.2),
            (SectionKind::Chorus, Self::Crash) => base.scale(1.3),
            (SectionKind::Verse, Self::Kick | Self::Snare) => base.scale(0.9),
            (SectionKind::Breakdown, Self::Kick) => Rgb::new(255, 40, 40),
            (SectionKind::Breakdown, Self::Snare) => Rgb::new(40, 255, 40),
            _ => base,
        }
    }

    fn duration(self) -> Tick {
        match self {
            Self::Kick => QUARTER / 4,
            Self::Snare | Self::Tom => QUARTER / 3,
            Self::HiHat => QUARTER / 6,
            Self::Crash => QUARTER / 2,
        }
    }

    /// Sub-beat delay so coincident hits do not flash on the same tick.
    fn offset(self) -> Tick {
        match self {
            Self::Kick | Self::Crash => 0,
            Self::Snare => QUARTER / 32,
            Self::HiHat => QUARTER / 24,
            Self::Tom => QUARTER / 16,
        }
    }

    /// Accent for where the hit lands in the bar.
    fn emphasis(self, position: Tick) -> f64 {
        let beat_in_measure = (position as f64 / QUARTER as f64).rem_euclid(4.0);
        match self {
            Self::Kick if beat_in_measure < 0.25 || (2.0..2.25).contains(&beat_in_measure) => 1.2,
            Self::Snare
                if (0.9..1.1).contains(&beat_in_measure) || (2.9..3.1).contains(&beat_in_measure) =>
            {
                1.15
            }
            Self::Crash => 1.3,
            _ => 1.0,
        }
    }
}

fn pieces_in(beat: &Beat) -> Vec<KitPiece> {
    KitPiece::ALL
        .into_iter()
        .filter(|piece| {
            beat.notes
                .iter()
                .any(|n| KitPiece::from_pitch(n.pitch) == Some(*piece))
        })
        .collect()
}

/// Light events for one drum measure.
pub fn produce(measure: &Measure, ctx: &MeasureContext) -> Vec<LightEvent> {
    let kind = ctx.section.kind;
    let mut events = Vec::new();

    for beat in measure.sounding_beats() {
        let pieces = pieces_in(beat);
        if pieces.is_empty() {
            continue;
        }
        let velocity = beat.mean_velocity().unwrap_or(REFERENCE_VELOCITY);
        let intensity = ctx.intensity() * velocity / REFERENCE_VELOCITY;
        let start = ctx.at(beat.start);

        for &piece in &pieces {
            let color = piece.color(kind).scale(intensity * piece.emphasis(beat.start));
            events.push(LightEvent::new(
                Channel::Drums,
                start + piece.offset(),
                piece.duration(),
                color,
            ));
        }

        if pieces.len() >= 2 {
            let colors: Vec<Rgb> = pieces.iter().map(|p| p.color(kind)).collect();
            if let Some([r, g, b]) = Rgb::mean(&colors) {
                let mixed = Rgb::from_f64(r, g, b).scale(intensity * COMBINED_BOOST);
                events.push(LightEvent::new(Channel::Drums, start, COMBINED_DURATION, mixed));
            }
        }
    }

    log::trace!("Measure {}: {} drum events", ctx.index + 1, events.len());
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light::test_support::*;
    use crate::score::fixtures::*;

    #[test]
    fn pitch_mapping() {
        assert_eq!(KitPiece::from_pitch(36), Some(KitPiece::Kick));
        assert_eq!(KitPiece::from_pitch(40), Some(KitPiece::Snare));
        assert_eq!(KitPiece::from_pitch(46), Some(KitPiece::HiHat));
        assert_eq!(KitPiece::from_pitch(57), Some(KitPiece::Crash));
        assert_eq!(KitPiece::from_pitch(48), Some(KitPiece::Tom));
        assert_eq!(KitPiece::from_pitch(60), None);
    }

    #[test]
    fn kick_on_one_is_emphasised() {
        let m = measure(vec![
            beat(0, 480, vec![note_vel(36, 90)]),
            beat(960, 480, vec![note_vel(36, 90)]),
        ]);
        let events = produce(&m, &neutral());
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], LightEvent::new(Channel::Drums, 0, 240, Rgb::new(240, 60, 60)));
        assert_eq!(events[1], LightEvent::new(Channel::Drums, 960, 240, Rgb::new(200, 50, 50)));
    }

    #[test]
    fn snare_is_offset_and_backbeat_brightened() {
        let m = measure(vec![beat(960, 480, vec![note_vel(38, 90)])]);
        let events = produce(&m, &neutral());
        assert_eq!(events[0].start, 990);
        assert_eq!(events[0].duration, 320);
        // f64 1.15 sits just below 1.15, so 100 truncates to 114.
        assert_eq!(events[0].color, Rgb::new(114, 172, 114));
    }

    #[test]
    fn coincident_hits_add_combined_accent() {
        let m = measure(vec![beat(0, 480, vec![note_vel(36, 90), note_vel(42, 90)])]);
        let events = produce(&m, &neutral());
        let spans: Vec<(Tick, Tick)> = events.iter().map(|e| (e.start, e.duration)).collect();
        assert_eq!(spans, vec![(0, 240), (40, 160), (0, 120)]);
        // mean of (200,50,50) and (50,100,150) = (125,75,100), ×1.25
        assert_eq!(events[2].color, Rgb::new(156, 93, 125));
    }

    #[test]
    fn velocity_scales_intensity() {
        let m = measure(vec![beat(480, 480, vec![note_vel(42, 45)])]);
        let events = produce(&m, &neutral());
        assert_eq!(events[0].color, Rgb::new(25, 50, 75));
    }

    #[test]
    fn section_retints_the_kit() {
        assert_eq!(KitPiece::Kick.color(SectionKind::Breakdown), Rgb::new(255, 40, 40));
        assert_eq!(KitPiece::Crash.color(SectionKind::Chorus), Rgb::new(255, 255, 255));
        assert_eq!(KitPiece::Snare.color(SectionKind::Verse), Rgb::new(90, 135, 90));
        assert_eq!(KitPiece::HiHat.color(SectionKind::Chorus), Rgb::new(50, 100, 150));
    }

    #[test]
    fn unmapped_pitches_are_ignored() {
        let m = measure(vec![beat(0, 480, vec![note(60)])]);
        assert!(produce(&m, &neutral()).is_empty());
    }
}
