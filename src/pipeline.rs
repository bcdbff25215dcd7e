//! Score → light show.
//!
//! Structure is analysed once up front. Measures are then analysed and lit
//! in parallel, each returning its own event lists, and the coordinator and
//! post-processor run over the collected results in measure order.

use rayon::prelude::*;

use crate::analysis::groove::{MeasureRhythm, analyze_measure};
use crate::analysis::rhythm::{RhythmPattern, extract_rhythm};
use crate::analysis::structure::{Section, SectionKind, SongStructure, analyze_structure};
use crate::coordinate::coordinate;
use crate::light::{Channel, ChannelEvents, LightEvent, MeasureContext, bass, drums, guitar};
use crate::postprocess::post_process;
use crate::score::AlignedScore;

/// Everything generated for one song.
#[derive(Debug, Clone)]
pub struct LightShow {
    pub title: String,
    pub structure: SongStructure,
    /// Final events, sorted by absolute start tick.
    pub events: Vec<LightEvent>,
}

impl LightShow {
    pub fn count(&self, channel: Channel) -> usize {
        self.events.iter().filter(|e| e.channel == channel).count()
    }
}

/// Per-measure output of the parallel phase.
struct MeasureWork {
    ctx: MeasureContext,
    rhythm: MeasureRhythm,
    bass: RhythmPattern,
    drums: RhythmPattern,
    produced: ChannelEvents,
}

fn measure_context(
    score: &AlignedScore,
    structure: &SongStructure,
    offsets: &[crate::Tick],
    index: usize,
) -> MeasureContext {
    let header = &score.headers[index];
    let section = structure.section_for(index).cloned().unwrap_or(Section {
        kind: SectionKind::Default,
        start_measure: index,
        end_measure: index,
        intensity: 1.0,
    });
    let minor = score.guitar[index]
        .key_signature
        .and_then(|ks| ks.is_minor())
        .or_else(|| header.is_minor())
        .unwrap_or(false);

    MeasureContext {
        index,
        offset: offsets[index],
        length: header.ticks(),
        section,
        minor,
    }
}

fn light_measure(score: &AlignedScore, ctx: MeasureContext) -> MeasureWork {
    let i = ctx.index;
    let guitar_rhythm = extract_rhythm(&score.guitar[i]);
    let bass_rhythm = extract_rhythm(&score.bass[i]);
    let drums_rhythm = extract_rhythm(&score.drums[i]);
    let beats = score.headers[i].time_signature.numerator;
    let rhythm = analyze_measure(&guitar_rhythm, &bass_rhythm, &drums_rhythm, beats);

    let produced = ChannelEvents {
        guitar: guitar::produce(&score.guitar[i], &ctx),
        bass: bass::produce(&score.bass[i], &score.bass_drive[i], &ctx),
        drums: drums::produce(&score.drums[i], &ctx),
    };
    log::trace!(
        "Measure {}: density {:.2}, syncopation {:.2}, dominant {:?}",
        i + 1,
        rhythm.density,
        rhythm.syncopation,
        rhythm.dominant
    );

    MeasureWork {
        ctx,
        rhythm,
        bass: bass_rhythm,
        drums: drums_rhythm,
        produced,
    }
}

/// Generate the light show for a validated score. Output depends only on
/// the score.
pub fn generate(score: &AlignedScore) -> LightShow {
    log::info!("Generating lights for '{}' ({} measures)", score.title, score.measure_count());
    let structure = analyze_structure(score);
    let offsets = score.measure_offsets();

    let contexts: Vec<MeasureContext> = (0..score.measure_count())
        .map(|i| measure_context(score, &structure, &offsets, i))
        .collect();
    let work: Vec<MeasureWork> = contexts
        .into_par_iter()
        .map(|ctx| light_measure(score, ctx))
        .collect();

    let mut candidates = Vec::new();
    for w in work {
        let extra = coordinate(&w.ctx, &w.rhythm, &w.bass, &w.drums, &w.produced);
        candidates.extend(w.produced.into_vec());
        candidates.extend(extra.into_vec());
    }
    log::debug!("{} candidate events before post-processing", candidates.len());

    let mut boundaries = offsets;
    boundaries.push(score.end_tick());
    let events = post_process(candidates, &boundaries);
    log::info!("'{}': {} light events", score.title, events.len());

    LightShow {
        title: score.title.clone(),
        structure,
        events,
    }
}
