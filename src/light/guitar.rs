//! Guitar lane: pitch-mapped palette colours shaped by chord quality and
//! playing technique.

use std::collections::BTreeSet;

use super::color::normalize;
use super::{Channel, LightEvent, MeasureContext, Palette, Rgb};
use crate::Tick;
use crate::score::{Beat, Measure};

const MAJOR: Palette = Palette::new(
    Rgb::new(220, 60, 40),
    Rgb::new(220, 160, 40),
    Rgb::new(140, 200, 60),
);

const MINOR: Palette = Palette::new(
    Rgb::new(180, 50, 90),
    Rgb::new(100, 80, 180),
    Rgb::new(70, 130, 200),
);

/// Typical guitar range, E2 to E5.
const PITCH_LOW: f64 = 40.0;
const PITCH_HIGH: f64 = 88.0;

const VIBRATO_PULSE: Tick = crate::TICKS_PER_QUARTER / 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChordKind {
    Single,
    Power,
    MajorThird,
    MinorThird,
    Other,
}

fn chord_kind(beat: &Beat) -> ChordKind {
    if beat.notes.len() < 2 {
        return ChordKind::Single;
    }
    let classes: BTreeSet<i32> = beat.notes.iter().map(|n| n.pitch.rem_euclid(12)).collect();
    let has_interval = |semitones: i32| {
        classes
            .iter()
            .any(|pc| classes.contains(&(pc + semitones).rem_euclid(12)))
    };
    if classes.len() <= 2 {
        ChordKind::Power
    } else if has_interval(4) {
        ChordKind::MajorThird
    } else if has_interval(3) {
        ChordKind::MinorThird
    } else {
        ChordKind::Other
    }
}

fn chord_tint(color: Rgb, kind: ChordKind) -> Rgb {
    match kind {
        ChordKind::Power => color.scale_each(1.3, 1.0, 1.0),
        ChordKind::MajorThird => color.scale_each(1.0, 1.2, 1.0),
        ChordKind::MinorThird => color.scale_each(1.0, 1.0, 1.2),
        ChordKind::Single | ChordKind::Other => color,
    }
}

/// Techniques that replace the plain event with a burst of sub-events.
/// Only one texture applies per beat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Texture {
    Tremolo,
    Trill,
    Vibrato,
}

/// Intensity multiplier, tint and texture for one beat's technique flags.
fn techniques(beat: &Beat, mut color: Rgb) -> (f64, Rgb, Option<Texture>) {
    let mut factor = 1.0;
    if beat.any_effect(|e| e.palm_mute) {
        factor *= 0.8;
    }
    if beat.any_effect(|e| e.vibrato) {
        factor *= 1.1;
    }
    if beat.any_effect(|e| e.bend) {
        factor *= 1.2;
        color = color.scale_each(0.9, 1.0, 1.3);
    }
    if beat.any_effect(|e| e.harmonic) {
        factor *= 1.15;
        color = color.scale_each(1.0, 1.2, 1.2);
    }
    if beat.any_effect(|e| e.tremolo) {
        factor *= 1.3;
    }
    if beat.any_effect(|e| e.trill) {
        factor *= 1.25;
    }
    if beat.any_effect(|e| e.hammer_pull) {
        factor *= 1.05;
    }
    if beat.any_effect(|e| e.distortion) {
        factor *= 1.1;
    }

    let texture = if beat.any_effect(|e| e.tremolo) {
        Some(Texture::Tremolo)
    } else if beat.any_effect(|e| e.trill) {
        Some(Texture::Trill)
    } else if beat.any_effect(|e| e.vibrato) {
        Some(Texture::Vibrato)
    } else {
        None
    };
    (factor, color, texture)
}

fn textured(texture: Texture, start: Tick, duration: Tick, color: Rgb) -> Vec<LightEvent> {
    let event = |s: Tick, d: Tick, c: Rgb| LightEvent::new(Channel::Guitar, s, d, c);
    let events: Vec<LightEvent> = match texture {
        Texture::Tremolo => {
            let sub = duration / 4;
            (0..4)
                .map(|i| {
                    let factor = if i % 2 == 0 { 0.7 } else { 1.0 };
                    event(start + i * sub, sub, color.scale(factor))
                })
                .collect()
        }
        Texture::Trill => {
            let sub = duration / 3;
            (0..3)
                .map(|i| {
                    let c = if i % 2 == 0 { color } else { color.rotated() };
                    event(start + i * sub, sub, c)
                })
                .collect()
        }
        Texture::Vibrato => {
            let spacing = duration / 3;
            let pulse = VIBRATO_PULSE.min(spacing);
            (0..3)
                .map(|i| {
                    let factor = if i % 2 == 0 { 0.8 } else { 1.2 };
                    event(start + i * spacing, pulse, color.scale(factor))
                })
                .collect()
        }
    };
    events.into_iter().filter(|e| e.duration > 0).collect()
}

/// Light events for one guitar measure.
pub fn produce(measure: &Measure, ctx: &MeasureContext) -> Vec<LightEvent> {
    let palette = if ctx.minor { MINOR } else { MAJOR }.retint(ctx.section.kind);
    let mut events = Vec::new();

    for beat in measure.sounding_beats() {
        let Some(pitch) = beat.mean_pitch() else {
            continue;
        };
        let base = chord_tint(
            palette.at(normalize(pitch, PITCH_LOW, PITCH_HIGH)),
            chord_kind(beat),
        );
        let (factor, tinted, texture) = techniques(beat, base);
        let color = tinted.scale(ctx.intensity() * factor);
        let start = ctx.at(beat.start);

        match texture {
            Some(t) => events.extend(textured(t, start, beat.duration, color)),
            None => events.push(LightEvent::new(Channel::Guitar, start, beat.duration, color)),
        }
    }

    log::trace!("Measure {}: {} guitar events", ctx.index + 1, events.len());
    events
}
