//! Cross-instrument coordination.
//!
//! The producers each see one instrument. This stage looks at a measure as a
//! whole and adds events for what only shows up between instruments: shared
//! syncopated accents, bass/drum lock-in, and emphasis on whichever
//! instrument is carrying the measure.

use std::collections::BTreeSet;

use crate::analysis::groove::{MeasureRhythm, is_on_grid};
use crate::analysis::rhythm::RhythmPattern;
use crate::analysis::structure::SectionKind;
use crate::light::color::vivid_complement;
use crate::light::{Channel, ChannelEvents, LightEvent, MeasureContext, Rgb};
use crate::{TICKS_PER_QUARTER, Tick};

const QUARTER: Tick = TICKS_PER_QUARTER;

// ── Unified accents ───────────────────────────────────────────────────

const ACCENT_SYNCOPATION: f64 = 0.5;
const ACCENT_DENSITY: f64 = 0.7;
/// Minimum spacing between two chosen accents.
const ACCENT_SPACING: Tick = QUARTER / 4;
const ACCENT_DURATION: Tick = QUARTER / 6;
/// Guitar leads and Drums trail the accent by this much.
const ACCENT_STAGGER: Tick = QUARTER / 32;

fn accent_color(syncopation: f64) -> Rgb {
    if syncopation > 0.7 {
        Rgb::new(230, 70, 180)
    } else if syncopation > 0.5 {
        Rgb::new(230, 160, 50)
    } else {
        Rgb::new(70, 180, 210)
    }
}

/// Staggered three-lane accents on the off-grid onsets of a busy,
/// syncopated measure. Accents near mid-measure are brightest.
pub fn unified_accents(ctx: &MeasureContext, rhythm: &MeasureRhythm) -> ChannelEvents {
    let mut out = ChannelEvents::default();
    if rhythm.syncopation <= ACCENT_SYNCOPATION || rhythm.density <= ACCENT_DENSITY {
        return out;
    }

    let mut chosen: Vec<Tick> = Vec::new();
    for &pos in &rhythm.positions {
        if is_on_grid(pos) || chosen.iter().any(|c| (c - pos).abs() < ACCENT_SPACING) {
            continue;
        }
        chosen.push(pos);
    }

    let base = accent_color(rhythm.syncopation);
    let length = ctx.length.max(1) as f64;
    for pos in chosen {
        let relative = pos.rem_euclid(ctx.length.max(1)) as f64 / length;
        let position_factor = 0.8 + 0.4 * (1.0 - (relative - 0.5).abs() * 2.0);
        let color = base.scale(ctx.intensity() * position_factor);
        let start = ctx.at(pos);
        out.push(LightEvent::new(Channel::Guitar, start - ACCENT_STAGGER, ACCENT_DURATION, color));
        out.push(LightEvent::new(Channel::Bass, start, ACCENT_DURATION, color));
        out.push(LightEvent::new(Channel::Drums, start + ACCENT_STAGGER, ACCENT_DURATION, color));
    }
    out
}

// ── Rhythm-section lock ───────────────────────────────────────────────

/// Sync points closer than this merge into one.
const CLUSTER_GAP: Tick = QUARTER / 4;
const MIN_SYNC_POINTS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockGroove {
    Driving,
    Funky,
    Steady,
}

impl LockGroove {
    fn classify(points: &[f64]) -> Self {
        let intervals: Vec<f64> = points.windows(2).map(|w| w[1] - w[0]).collect();
        let avg = intervals.iter().sum::<f64>() / intervals.len().max(1) as f64;
        let min = intervals.iter().copied().fold(f64::INFINITY, f64::min);
        let max = intervals.iter().copied().fold(0.0, f64::max);
        let variation = if min > 0.0 { (max / min).max(1.0) } else { 1.0 };

        if avg < (QUARTER / 2) as f64 {
            Self::Driving
        } else if variation > 1.5 {
            Self::Funky
        } else {
            Self::Steady
        }
    }

    fn color(self) -> Rgb {
        match self {
            Self::Driving => Rgb::new(180, 60, 80),
            Self::Funky => Rgb::new(80, 180, 120),
            Self::Steady => Rgb::new(80, 100, 180),
        }
    }

    fn pulse(self) -> Tick {
        match self {
            Self::Driving => QUARTER / 4,
            Self::Funky => QUARTER / 3,
            Self::Steady => QUARTER / 2,
        }
    }

    fn bounces(self) -> bool {
        matches!(self, Self::Driving | Self::Funky)
    }
}

/// Onsets shared exactly by Bass and Drums, with nearby ones collapsed to
/// their mean.
pub fn sync_points(bass: &RhythmPattern, drums: &RhythmPattern) -> Vec<f64> {
    let shared: BTreeSet<Tick> = bass.positions.intersection(&drums.positions).copied().collect();

    let mut points = Vec::new();
    let mut group: Vec<Tick> = Vec::new();
    for pos in shared {
        if let Some(&last) = group.last() {
            if pos - last >= CLUSTER_GAP {
                points.push(group.iter().sum::<Tick>() as f64 / group.len() as f64);
                group.clear();
            }
        }
        group.push(pos);
    }
    if !group.is_empty() {
        points.push(group.iter().sum::<Tick>() as f64 / group.len() as f64);
    }
    points
}

/// Paired Bass and Drums pulses where the two instruments hit together.
pub fn rhythm_lock(ctx: &MeasureContext, bass: &RhythmPattern, drums: &RhythmPattern) -> ChannelEvents {
    let mut out = ChannelEvents::default();
    let points = sync_points(bass, drums);
    if points.len() < MIN_SYNC_POINTS {
        return out;
    }

    let groove = LockGroove::classify(&points);
    let base = match ctx.section.kind {
        SectionKind::Chorus => groove.color().scale(1.2),
        SectionKind::Breakdown => groove.color().scale_each(1.4, 0.9, 0.8),
        _ => groove.color(),
    };
    let pulse = groove.pulse();
    log::trace!("Measure {}: {:?} lock on {} points", ctx.index + 1, groove, points.len());

    for (i, &point) in points.iter().enumerate() {
        let cycle = (i % 4) as f64 / 4.0;
        let color = base.scale(ctx.intensity() * (0.85 + 0.3 * cycle));
        let start = ctx.offset + point as Tick;

        out.push(LightEvent::new(Channel::Bass, start, pulse, color));
        out.push(LightEvent::new(Channel::Drums, start, scaled(pulse, 0.8), color));

        if groove.bounces() && pulse > QUARTER / 8 {
            let delay = pulse as f64 * 1.2;
            let length = pulse as f64 * 0.7;
            let room = match points.get(i + 1) {
                Some(next) => next - point > delay + length,
                None => true,
            };
            if room {
                let soft = color.scale(0.7);
                let bounce_start = ctx.offset + (point + delay) as Tick;
                let bounce = length as Tick;
                out.push(LightEvent::new(Channel::Bass, bounce_start, bounce, soft));
                out.push(LightEvent::new(Channel::Drums, bounce_start, scaled(bounce, 0.8), soft));
            }
        }
    }
    out
}

fn scaled(ticks: Tick, factor: f64) -> Tick {
    (ticks as f64 * factor) as Tick
}

// ── Dominant-instrument enhancement ───────────────────────────────────

const DOMINANT_DENSITY: f64 = 1.0;
const ECHO_MIN_SOURCE: Tick = QUARTER / 8;
const ECHO_LONG_NOTE: Tick = QUARTER / 2;
const ECHO_GAP: Tick = QUARTER / 16;
const RUN_SPACING: Tick = QUARTER / 4;
const RUN_ACCENT: Tick = QUARTER / 16;
/// Bass intervals are bucketed to this grid before taking the mode.
const INTERVAL_BUCKET: Tick = QUARTER / 8;
const OFFBEAT_PULSE: Tick = QUARTER / 8;
const MIRROR_MAX: Tick = QUARTER / 8;

fn tone(color: [f64; 3], factor: f64) -> Rgb {
    Rgb::from_f64(color[0] * factor, color[1] * factor, color[2] * factor)
}

/// Extra complementary-coloured events around the dominant instrument, for
/// solo sections and very dense measures.
pub fn enhance_dominant(
    ctx: &MeasureContext,
    rhythm: &MeasureRhythm,
    produced: &ChannelEvents,
) -> ChannelEvents {
    let mut out = ChannelEvents::default();
    if ctx.section.kind != SectionKind::Solo && rhythm.density <= DOMINANT_DENSITY {
        return out;
    }
    let Some(dominant) = rhythm.dominant else {
        return out;
    };

    let end = ctx.offset + ctx.length;
    let mut lights: Vec<LightEvent> = produced
        .get(dominant)
        .iter()
        .filter(|e| e.start >= ctx.offset && e.start < end)
        .copied()
        .collect();
    lights.sort_by_key(|e| e.start);

    let colors: Vec<Rgb> = lights.iter().map(|e| e.color).collect();
    let Some(mean) = Rgb::mean(&colors) else {
        return out;
    };
    let comp = vivid_complement(mean);
    let section = ctx.intensity();
    log::trace!("Measure {}: enhancing {}", ctx.index + 1, dominant);

    match dominant {
        Channel::Guitar => {
            guitar_echoes(&lights, mean, comp, section, &mut out);
            guitar_runs(&lights, comp, section, &mut out);
        }
        Channel::Bass => bass_offbeats(&lights, comp, section, &mut out),
        Channel::Drums => drum_mirrors(&lights, comp, section, &mut out),
    }
    out
}

fn guitar_echoes(lights: &[LightEvent], mean: [f64; 3], comp: [f64; 3], section: f64, out: &mut ChannelEvents) {
    let bright = (mean[0] + mean[1] + mean[2]) * 1.2;
    for (i, light) in lights.iter().enumerate() {
        if light.duration < ECHO_MIN_SOURCE {
            continue;
        }
        let significant = light.duration > ECHO_LONG_NOTE || light.color.brightness() as f64 > bright;
        if !significant {
            continue;
        }

        let start = light.end();
        let mut duration = light.duration as f64 * 0.7;
        if let Some(next) = lights.get(i + 1) {
            if start as f64 + duration > next.start as f64 {
                duration = ((next.start - start - ECHO_GAP) as f64).max(0.0);
            }
        }
        if duration > ECHO_GAP as f64 {
            let [r, g, b] = light.color.components();
            let color = Rgb::from_f64(
                (r * 0.4 + comp[0] * 0.2) * section,
                (g * 0.4 + comp[1] * 0.2) * section,
                (b * 0.4 + comp[2] * 0.2) * section,
            );
            out.push(LightEvent::new(Channel::Guitar, start, duration as Tick, color));
        }
    }
}

fn guitar_runs(lights: &[LightEvent], comp: [f64; 3], section: f64, out: &mut ChannelEvents) {
    for run in lights.windows(3) {
        if run[1].start - run[0].start < RUN_SPACING && run[2].start - run[1].start < RUN_SPACING {
            out.push(LightEvent::new(
                Channel::Guitar,
                run[0].start,
                RUN_ACCENT,
                tone(comp, section * 1.3),
            ));
        }
    }
}

/// Most common onset interval after bucketing. Ties go to the interval seen
/// first.
fn modal_interval(lights: &[LightEvent]) -> Option<Tick> {
    let mut counts: Vec<(Tick, usize)> = Vec::new();
    for pair in lights.windows(2) {
        let interval = pair[1].start - pair[0].start;
        if interval <= 0 {
            continue;
        }
        let bucket = (interval + INTERVAL_BUCKET / 2) / INTERVAL_BUCKET * INTERVAL_BUCKET;
        match counts.iter_mut().find(|(b, _)| *b == bucket) {
            Some((_, n)) => *n += 1,
            None => counts.push((bucket, 1)),
        }
    }
    let mut best: Option<(Tick, usize)> = None;
    for &(bucket, n) in &counts {
        if best.is_none_or(|(_, top)| n > top) {
            best = Some((bucket, n));
        }
    }
    best.map(|(bucket, _)| bucket)
}

fn bass_offbeats(lights: &[LightEvent], comp: [f64; 3], section: f64, out: &mut ChannelEvents) {
    let Some(mode) = modal_interval(lights) else {
        return;
    };
    if mode <= QUARTER / 4 || mode >= QUARTER {
        return;
    }
    let color = tone(comp, section * 0.5);
    for light in lights {
        let offbeat = light.start + mode / 2;
        let occupied = lights.iter().any(|l| (l.start - offbeat).abs() < ECHO_GAP);
        if !occupied {
            out.push(LightEvent::new(Channel::Bass, offbeat, OFFBEAT_PULSE, color));
        }
    }
}

fn drum_mirrors(lights: &[LightEvent], comp: [f64; 3], section: f64, out: &mut ChannelEvents) {
    let level = |e: &LightEvent| e.color.brightness() as f64 / 3.0;
    let threshold = lights.iter().map(level).sum::<f64>() / lights.len().max(1) as f64 * 1.2;
    let color = tone(comp, section * 0.7);
    for hit in lights.iter().filter(|e| level(e) > threshold) {
        let duration = hit.duration.min(MIRROR_MAX);
        out.push(LightEvent::new(Channel::Guitar, hit.start, duration, color));
        out.push(LightEvent::new(Channel::Bass, hit.start, duration, color));
    }
}

// ── Entry point ───────────────────────────────────────────────────────

/// All coordination events for one measure, given what the producers made
/// for it.
pub fn coordinate(
    ctx: &MeasureContext,
    rhythm: &MeasureRhythm,
    bass: &RhythmPattern,
    drums: &RhythmPattern,
    produced: &ChannelEvents,
) -> ChannelEvents {
    let mut out = unified_accents(ctx, rhythm);
    out.append(rhythm_lock(ctx, bass, drums));
    out.append(enhance_dominant(ctx, rhythm, produced));
    out
}
