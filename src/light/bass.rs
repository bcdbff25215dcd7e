//! Bass lane. Colour follows the lowest note of each beat; brightness follows
//! the Bass Drive signal and the beat's weight in the groove.

use super::color::normalize;
use super::{Channel, LightEvent, MeasureContext, Palette, Rgb};
use crate::Tick;
use crate::analysis::groove::analyze_groove;
use crate::analysis::structure::SectionKind;
use crate::score::Measure;

const MAJOR: Palette = Palette::new(
    Rgb::new(160, 40, 20),
    Rgb::new(150, 75, 30),
    Rgb::new(140, 110, 40),
);

const MINOR: Palette = Palette::new(
    Rgb::new(140, 30, 60),
    Rgb::new(120, 55, 90),
    Rgb::new(100, 80, 120),
);

/// Typical bass range, E1 to G3.
const PITCH_LOW: f64 = 28.0;
const PITCH_HIGH: f64 = 55.0;

/// Notes longer than this get a fading tail.
const TAIL_THRESHOLD: Tick = crate::TICKS_PER_QUARTER / 2;
const TAIL_MAX: Tick = crate::TICKS_PER_QUARTER / 4;
const TAIL_LEVEL: f64 = 0.5;

/// Strength of the Bass Drive signal at a measure-relative `position`, 0–1.
///
/// Every sounding drive beat that covers the position contributes its mean
/// velocity, fading to half strength across the beat. Distortion and palm
/// mute push it harder. The strongest contribution wins.
pub fn drive_at(drive: &Measure, position: Tick) -> f64 {
    drive
        .sounding_beats()
        .filter(|b| b.start <= position && position < b.end())
        .map(|b| {
            let velocity = b.mean_velocity().unwrap_or(0.0) / 127.0;
            let relative = if b.duration > 0 {
                (position - b.start) as f64 / b.duration as f64
            } else {
                0.0
            };
            let mut level = velocity * (1.0 - relative * 0.5);
            if b.any_effect(|e| e.distortion) {
                level *= 1.3;
            }
            if b.any_effect(|e| e.palm_mute) {
                level *= 1.2;
            }
            level.min(1.0)
        })
        .fold(0.0, f64::max)
}

fn section_tint(color: Rgb, kind: SectionKind) -> Rgb {
    match kind {
        SectionKind::Chorus => color.scale_each(1.2, 1.1, 1.0),
        SectionKind::Breakdown => color.scale_each(1.4, 0.8, 0.7),
        _ => color,
    }
}

/// Light events for one bass measure, modulated by the aligned drive measure.
pub fn produce(bass: &Measure, drive: &Measure, ctx: &MeasureContext) -> Vec<LightEvent> {
    let groove = analyze_groove(bass);
    let palette = if ctx.minor { MINOR } else { MAJOR };
    let mut events = Vec::new();

    for beat in bass.sounding_beats() {
        let Some(lowest) = beat.lowest_pitch() else {
            continue;
        };
        let mut color = palette.at(normalize(lowest as f64, PITCH_LOW, PITCH_HIGH));

        let drive_level = drive_at(drive, beat.start);
        if drive_level > 0.0 {
            color = color.scale_each(1.0 + 0.3 * drive_level, 1.0, 1.0 - 0.3 * drive_level);
        }
        let importance = groove.importance(beat.start);
        let intensity = ctx.intensity() * (1.0 + drive_level * 0.5) * (1.0 + importance * 0.3);
        color = section_tint(color.scale(intensity), ctx.section.kind);

        let start = ctx.at(beat.start);
        events.push(LightEvent::new(Channel::Bass, start, beat.duration, color));

        if beat.duration > TAIL_THRESHOLD {
            let tail = TAIL_MAX.min(beat.duration / 3);
            events.push(LightEvent::new(
                Channel::Bass,
                start + beat.duration - tail,
                tail,
                color.scale(TAIL_LEVEL),
            ));
        }
    }

    log::trace!(
        "Measure {}: {} bass events ({})",
        ctx.index + 1,
        events.len(),
        groove.groove_type.label()
    );
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light::test_support::*;
    use crate::score::fixtures::*;
    use crate::score::{Note, NoteEffects};

    #[test]
    fn drive_fades_across_its_beat() {
        let drive = measure(vec![beat(0, 960, vec![note_vel(40, 127)])]);
        assert_eq!(drive_at(&drive, 0), 1.0);
        assert!((drive_at(&drive, 480) - 0.75).abs() < 1e-9);
        assert_eq!(drive_at(&drive, 960), 0.0);
        assert_eq!(drive_at(&empty_measure(), 0), 0.0);
    }

    #[test]
    fn drive_effects_and_overlap_take_strongest() {
        let distorted = Note {
            effects: NoteEffects { distortion: true, ..NoteEffects::default() },
            ..note_vel(40, 50)
        };
        let mut drive = measure(vec![beat(0, 1920, vec![distorted])]);
        drive.voices[0].beats.push(beat(0, 960, vec![note_vel(40, 30)]));
        let expected = 50.0 / 127.0 * 1.3;
        assert!((drive_at(&drive, 0) - expected).abs() < 1e-9);

        let loud = Note {
            effects: NoteEffects { distortion: true, palm_mute: true, ..NoteEffects::default() },
            ..note_vel(40, 127)
        };
        assert_eq!(drive_at(&measure(vec![beat(0, 960, vec![loud])]), 0), 1.0);
    }

    #[test]
    fn downbeat_gets_full_importance_and_a_tail() {
        let bass = quarters(&[28, 31, 33, 35]);
        let events = produce(&bass, &empty_measure(), &neutral());
        // Each quarter gets a base event and a tail.
        assert_eq!(events.len(), 8);

        // importance 1.0 → ×1.3
        assert_eq!(events[0], LightEvent::new(Channel::Bass, 0, 960, Rgb::new(208, 52, 26)));
        assert_eq!(events[1], LightEvent::new(Channel::Bass, 720, 240, Rgb::new(104, 26, 13)));
    }

    #[test]
    fn short_notes_have_no_tail() {
        let bass = measure(vec![beat(0, 480, vec![note(28)]), beat(480, 480, vec![note(28)])]);
        let events = produce(&bass, &empty_measure(), &neutral());
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.duration == 480));
    }

    #[test]
    fn drive_warms_the_colour() {
        let bass = measure(vec![beat(0, 480, vec![note(28)])]);
        let drive = measure(vec![beat(0, 480, vec![note_vel(28, 127)])]);
        let dry = produce(&bass, &empty_measure(), &neutral());
        let driven = produce(&bass, &drive, &neutral());
        let blue_share = |c: Rgb| c.b as f64 / c.r as f64;
        assert!(driven[0].color.r > dry[0].color.r);
        assert!(blue_share(driven[0].color) < blue_share(dry[0].color));
    }

    #[test]
    fn breakdown_pushes_red() {
        let bass = measure(vec![beat(0, 480, vec![note(28)])]);
        let ctx = context(SectionKind::Breakdown, 1.0);
        let events = produce(&bass, &empty_measure(), &ctx);
        // 160×1.3 → 208 ×1.4 → 255; 40×1.3 → 52 ×0.8 → 41; 20×1.3 → 26 ×0.7 → 18
        assert_eq!(events[0].color, Rgb::new(255, 41, 18));
    }

    #[test]
    fn silent_bass_is_dark() {
        assert!(produce(&empty_measure(), &empty_measure(), &neutral()).is_empty());
    }
}
