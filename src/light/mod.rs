//! Light events and the per-instrument producers that create them.

pub mod bass;
pub mod color;
pub mod drums;
pub mod guitar;

use std::fmt;

use crate::Tick;
use crate::analysis::structure::Section;
pub use color::{Palette, Rgb};

/// One of the three light output lanes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Guitar,
    Bass,
    Drums,
}

impl Channel {
    /// Fixed lane order, also the tie-break priority for dominance.
    pub const ALL: [Channel; 3] = [Channel::Guitar, Channel::Bass, Channel::Drums];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Guitar => "Guitar",
            Self::Bass => "Bass",
            Self::Drums => "Drums",
        }
    }

    /// Lane index in the `.light` file format.
    pub fn file_index(&self) -> u8 {
        match self {
            Self::Guitar => 2,
            Self::Bass => 3,
            Self::Drums => 4,
        }
    }

    /// Position in [`Channel::ALL`].
    pub fn slot(&self) -> usize {
        match self {
            Self::Guitar => 0,
            Self::Bass => 1,
            Self::Drums => 2,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A timed colour on one channel. Start is absolute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightEvent {
    pub channel: Channel,
    pub start: Tick,
    pub duration: Tick,
    pub color: Rgb,
}

impl LightEvent {
    pub fn new(channel: Channel, start: Tick, duration: Tick, color: Rgb) -> Self {
        Self {
            channel,
            start,
            duration,
            color,
        }
    }

    pub fn end(&self) -> Tick {
        self.start + self.duration
    }
}

/// Producer output for one measure, one list per channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelEvents {
    pub guitar: Vec<LightEvent>,
    pub bass: Vec<LightEvent>,
    pub drums: Vec<LightEvent>,
}

impl ChannelEvents {
    pub fn get(&self, channel: Channel) -> &[LightEvent] {
        match channel {
            Channel::Guitar => &self.guitar,
            Channel::Bass => &self.bass,
            Channel::Drums => &self.drums,
        }
    }

    fn lane_mut(&mut self, channel: Channel) -> &mut Vec<LightEvent> {
        match channel {
            Channel::Guitar => &mut self.guitar,
            Channel::Bass => &mut self.bass,
            Channel::Drums => &mut self.drums,
        }
    }

    /// Append to the lane named by the event's channel.
    pub fn push(&mut self, event: LightEvent) {
        self.lane_mut(event.channel).push(event);
    }

    pub fn append(&mut self, other: ChannelEvents) {
        self.guitar.extend(other.guitar);
        self.bass.extend(other.bass);
        self.drums.extend(other.drums);
    }

    pub fn len(&self) -> usize {
        self.guitar.len() + self.bass.len() + self.drums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All events in lane order.
    pub fn into_vec(self) -> Vec<LightEvent> {
        let mut all = self.guitar;
        all.extend(self.bass);
        all.extend(self.drums);
        all
    }
}

/// What a producer knows about the measure it is lighting.
#[derive(Debug, Clone)]
pub struct MeasureContext {
    /// 0-based measure index.
    pub index: usize,
    /// Absolute start tick.
    pub offset: Tick,
    pub length: Tick,
    pub section: Section,
    /// Minor-leaning palette.
    pub minor: bool,
}

impl MeasureContext {
    pub fn intensity(&self) -> f64 {
        self.section.intensity
    }

    /// Absolute tick of a measure-relative position.
    pub fn at(&self, position: Tick) -> Tick {
        self.offset + position
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::analysis::structure::SectionKind;

    pub fn context(kind: SectionKind, intensity: f64) -> MeasureContext {
        MeasureContext {
            index: 0,
            offset: 0,
            length: crate::TICKS_PER_QUARTER * 4,
            section: Section {
                kind,
                start_measure: 0,
                end_measure: 0,
                intensity,
            },
            minor: false,
        }
    }

    pub fn neutral() -> MeasureContext {
        context(SectionKind::Default, 1.0)
    }
}
