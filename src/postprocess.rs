//! Final pass over every candidate event: overlap resolution, boundary
//! blending and brightness balance.
//!
//! Each step is a pure function from one event list to the next, so they can
//! be tested in isolation. [`post_process`] chains them. Running it on its
//! own output leaves timing untouched; colours are also stable once the
//! lanes sit within the balance tolerance.

use crate::light::{Channel, LightEvent};
use crate::{TICKS_PER_QUARTER, Tick};

const QUARTER: Tick = TICKS_PER_QUARTER;

/// Truncated events shorter than this are dropped.
pub const MIN_DURATION: Tick = QUARTER / 16;
/// How far from a boundary a neighbour may sit and still be blended.
const BLEND_REACH: Tick = QUARTER / 2;
/// Half-width of a blend event; the full blend is an eighth of a quarter.
const BLEND_HALF: Tick = QUARTER / 16;
/// Allowed deviation of a channel mean from the cross-channel mean.
const BALANCE_TOLERANCE: f64 = 0.3;
const BALANCE_MIN: f64 = 0.8;
const BALANCE_MAX: f64 = 1.2;

/// One lane per channel, in [`Channel::ALL`] order.
pub type Lanes = [Vec<LightEvent>; 3];

/// Split by channel and stable-sort each lane by start. Events with no
/// duration are discarded here.
pub fn group_by_channel(events: Vec<LightEvent>) -> Lanes {
    let mut lanes: Lanes = Default::default();
    for event in events {
        if event.duration > 0 {
            lanes[event.channel.slot()].push(event);
        }
    }
    for lane in lanes.iter_mut() {
        lane.sort_by_key(|e| e.start);
    }
    lanes
}

/// Truncate each event at its immediate successor's start. Events that end
/// up shorter than [`MIN_DURATION`] are dropped. Single greedy pass over a
/// start-sorted lane.
pub fn resolve_overlaps(lane: Vec<LightEvent>) -> Vec<LightEvent> {
    let mut out = Vec::with_capacity(lane.len());
    for (i, event) in lane.iter().enumerate() {
        let mut event = *event;
        if let Some(next) = lane.get(i + 1) {
            if next.start < event.end() {
                event.duration = next.start - event.start;
                if event.duration < MIN_DURATION {
                    continue;
                }
            }
        }
        out.push(event);
    }
    out
}

/// Insert a short transition at each boundary where the lane has an event
/// ending just before it and another starting just after. The transition
/// takes the average colour and fills only free time.
pub fn blend_boundaries(lane: Vec<LightEvent>, boundaries: &[Tick]) -> Vec<LightEvent> {
    let mut blends = Vec::new();
    for &b in boundaries {
        let prev = lane
            .iter()
            .rev()
            .find(|e| e.start < b)
            .filter(|e| e.end() > b - BLEND_REACH && e.end() <= b);
        let next = lane
            .iter()
            .find(|e| e.start > b)
            .filter(|e| e.start < b + BLEND_REACH);
        let (Some(prev), Some(next)) = (prev, next) else {
            continue;
        };

        let start = (b - BLEND_HALF).max(prev.end());
        let end = (b + BLEND_HALF).min(next.start);
        if end - start < MIN_DURATION {
            continue;
        }
        let overlaps = |e: &LightEvent| e.start < end && e.end() > start;
        if lane.iter().any(overlaps) || blends.iter().any(overlaps) {
            continue;
        }
        blends.push(LightEvent::new(
            prev.channel,
            start,
            end - start,
            prev.color.midpoint(next.color),
        ));
    }

    if blends.is_empty() {
        return lane;
    }
    let mut out = lane;
    out.extend(blends);
    out.sort_by_key(|e| e.start);
    out
}

fn mean_brightness(lane: &[LightEvent]) -> Option<f64> {
    if lane.is_empty() {
        return None;
    }
    Some(lane.iter().map(|e| e.color.brightness() as f64).sum::<f64>() / lane.len() as f64)
}

/// Scale factor per lane. `None` if every lane is within tolerance.
fn balance_factors(lanes: &Lanes) -> Option<[f64; 3]> {
    let means: Vec<Option<f64>> = lanes.iter().map(|l| mean_brightness(l)).collect();
    let present: Vec<f64> = means.iter().flatten().copied().collect();
    if present.is_empty() {
        return None;
    }
    let overall = present.iter().sum::<f64>() / present.len() as f64;

    let mut factors = [1.0; 3];
    let mut any = false;
    for (slot, mean) in means.iter().enumerate() {
        let Some(mean) = *mean else { continue };
        if (mean - overall).abs() > overall * BALANCE_TOLERANCE {
            factors[slot] = (overall / mean.max(1.0)).clamp(BALANCE_MIN, BALANCE_MAX);
            any = true;
        }
    }
    any.then_some(factors)
}

/// Pull any lane whose mean brightness strays more than 30% from the
/// cross-lane mean toward it. One pass, one factor per lane, clamped to
/// ×0.8–×1.2. A lane far out of line stays out of line.
pub fn balance(mut lanes: Lanes) -> Lanes {
    let Some(factors) = balance_factors(&lanes) else {
        return lanes;
    };
    log::debug!(
        "Balance factors: G={:.2} B={:.2} D={:.2}",
        factors[0],
        factors[1],
        factors[2]
    );
    for (lane, factor) in lanes.iter_mut().zip(factors) {
        if factor == 1.0 {
            continue;
        }
        for event in lane.iter_mut() {
            event.color = event.color.scale(factor);
        }
    }
    lanes
}

/// Run all four steps and merge the lanes into one start-sorted sequence.
/// `boundaries` are absolute measure-boundary ticks.
pub fn post_process(events: Vec<LightEvent>, boundaries: &[Tick]) -> Vec<LightEvent> {
    let lanes = group_by_channel(events)
        .map(resolve_overlaps)
        .map(|lane| blend_boundaries(lane, boundaries));
    let lanes = balance(lanes);

    let mut merged: Vec<LightEvent> = lanes.into_iter().flatten().collect();
    merged.sort_by_key(|e| e.start);
    log::debug!(
        "Post-processed {} events ({} guitar, {} bass, {} drums)",
        merged.len(),
        merged.iter().filter(|e| e.channel == Channel::Guitar).count(),
        merged.iter().filter(|e| e.channel == Channel::Bass).count(),
        merged.iter().filter(|e| e.channel == Channel::Drums).count(),
    );
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light::Rgb;

    fn ev(channel: Channel, start: Tick, duration: Tick, c: u8) -> LightEvent {
        LightEvent::new(channel, start, duration, Rgb::new(c, c, c))
    }

    fn g(start: Tick, duration: Tick) -> LightEvent {
        ev(Channel::Guitar, start, duration, 100)
    }

    fn assert_lanes_disjoint(events: &[LightEvent]) {
        for channel in Channel::ALL {
            let lane: Vec<&LightEvent> = events.iter().filter(|e| e.channel == channel).collect();
            for pair in lane.windows(2) {
                assert!(pair[0].end() <= pair[1].start, "{:?} overlaps {:?}", pair[0], pair[1]);
            }
        }
    }

    #[test]
    fn overlap_truncates_to_successor() {
        let out = resolve_overlaps(vec![g(0, 500), g(300, 200)]);
        assert_eq!(out[0].duration, 300);
        assert_eq!(out[1], g(300, 200));
    }

    #[test]
    fn short_truncation_is_dropped() {
        let out = resolve_overlaps(vec![g(0, 500), g(40, 200), g(240, 100)]);
        assert_eq!(out, vec![g(40, 200), g(240, 100)]);

        // Exactly MIN_DURATION survives, one tick less does not.
        assert_eq!(resolve_overlaps(vec![g(0, 500), g(60, 100)]), vec![g(0, 60), g(60, 100)]);
        assert_eq!(resolve_overlaps(vec![g(0, 500), g(59, 100)]), vec![g(59, 100)]);
    }

    #[test]
    fn chains_resolve_greedily() {
        let out = resolve_overlaps(vec![g(0, 1000), g(100, 1000), g(400, 100)]);
        assert_eq!(out, vec![g(0, 100), g(100, 300), g(400, 100)]);
    }

    #[test]
    fn grouping_is_stable_and_drops_empty() {
        let a = ev(Channel::Bass, 480, 100, 1);
        let b = ev(Channel::Bass, 0, 100, 2);
        let c = ev(Channel::Bass, 480, 100, 3);
        let lanes = group_by_channel(vec![a, ev(Channel::Drums, 0, 0, 9), b, c]);
        assert_eq!(lanes[1], vec![b, a, c]);
        assert!(lanes[2].is_empty());
    }

    #[test]
    fn blend_bridges_a_boundary_gap() {
        let before = LightEvent::new(Channel::Guitar, 0, 3800, Rgb::new(200, 0, 0));
        let after = LightEvent::new(Channel::Guitar, 3900, 480, Rgb::new(0, 0, 200));
        let out = blend_boundaries(vec![before, after], &[0, 3840]);
        assert_eq!(out.len(), 3);
        assert_eq!(out[1], LightEvent::new(Channel::Guitar, 3800, 100, Rgb::new(100, 0, 100)));
    }

    #[test]
    fn blend_needs_neighbours_on_both_sides() {
        let before = g(0, 3800);
        assert_eq!(blend_boundaries(vec![before], &[3840]).len(), 1);

        // Downbeat event already covers the boundary.
        let lane = vec![g(0, 3800), g(3840, 480), g(3900, 100)];
        assert_eq!(blend_boundaries(lane.clone(), &[3840]), lane);

        // Neighbour too far away.
        let far = vec![g(0, 3000), g(3900, 100)];
        assert_eq!(blend_boundaries(far.clone(), &[3840]), far);
    }

    #[test]
    fn close_boundaries_do_not_stack_blends() {
        let out = post_process(vec![g(0, 1000), g(1080, 200)], &[1000, 1040]);
        let spans: Vec<(Tick, Tick)> = out.iter().map(|e| (e.start, e.duration)).collect();
        assert_eq!(spans, vec![(0, 1000), (1000, 60), (1080, 200)]);
        assert_lanes_disjoint(&out);
    }

    #[test]
    fn bright_lane_is_scaled_down_once() {
        let lanes: Lanes = [
            vec![ev(Channel::Guitar, 0, 100, 140)],
            vec![ev(Channel::Bass, 0, 100, 80)],
            vec![ev(Channel::Drums, 0, 100, 80)],
        ];
        let out = balance(lanes);
        // 420 vs mean 300 is 40% high: 1/1.4 clamps to 0.8.
        assert_eq!(out[0][0].color, Rgb::new(112, 112, 112));
        assert_eq!(out[1][0].color, Rgb::new(80, 80, 80));
        assert_eq!(out[2][0].color, Rgb::new(80, 80, 80));
    }

    #[test]
    fn extreme_lane_moves_by_one_clamped_factor() {
        let lanes: Lanes = [
            vec![ev(Channel::Guitar, 0, 100, 255)],
            vec![ev(Channel::Bass, 0, 100, 10)],
            vec![ev(Channel::Drums, 0, 100, 10)],
        ];
        let out = balance(lanes);
        assert_eq!(out[0][0].color, Rgb::new(204, 204, 204));
        assert_eq!(out[1][0].color, Rgb::new(12, 12, 12));
        assert_eq!(out[2][0].color, Rgb::new(12, 12, 12));
    }

    #[test]
    fn balance_ignores_empty_lanes() {
        let lanes: Lanes = [vec![ev(Channel::Guitar, 0, 100, 200)], Vec::new(), Vec::new()];
        assert_eq!(balance(lanes.clone()), lanes);
    }

    fn messy() -> Vec<LightEvent> {
        vec![
            ev(Channel::Drums, 3900, 480, 190),
            ev(Channel::Guitar, 0, 2000, 100),
            ev(Channel::Guitar, 960, 3000, 120),
            ev(Channel::Guitar, 990, 100, 90),
            ev(Channel::Bass, 0, 960, 90),
            ev(Channel::Bass, 720, 240, 80),
            ev(Channel::Bass, 960, 0, 10),
            ev(Channel::Drums, 0, 3780, 240),
            ev(Channel::Drums, 30, 20, 180),
            ev(Channel::Guitar, 4000, 500, 140),
        ]
    }

    #[test]
    fn output_is_sorted_disjoint_and_positive() {
        let out = post_process(messy(), &[0, 3840, 7680]);
        assert!(out.windows(2).all(|w| w[0].start <= w[1].start));
        assert!(out.iter().all(|e| e.duration > 0));
        assert_lanes_disjoint(&out);
    }

    #[test]
    fn post_processing_is_idempotent() {
        let boundaries = [0, 3840, 7680];
        let once = post_process(messy(), &boundaries);
        let twice = post_process(once.clone(), &boundaries);
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_input_is_fine() {
        assert!(post_process(Vec::new(), &[0]).is_empty());
    }
}
