//! `.light` text serializer.

use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::pipeline::LightShow;
use crate::score::AlignedScore;

pub const HEADER: &str = "MIDILightDrawer_BarEvents_v1.0";
pub const LIGHT_EXTENSION: &str = "light";

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Render the file contents. Start ticks are shifted by the score origin so
/// the first measure begins at zero.
pub fn render_light_file(score: &AlignedScore, show: &LightShow) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(out, "{HEADER}");
    let _ = writeln!(out, "{}", score.measure_count());
    for header in &score.headers {
        let ts = header.time_signature;
        let _ = writeln!(out, "{},{}", ts.numerator, ts.denominator);
    }
    let _ = writeln!(out, "{}", show.events.len());
    for e in &show.events {
        let _ = writeln!(
            out,
            "{},{},{},{},{},{},{}",
            e.start - score.origin_tick,
            e.duration,
            e.channel.file_index(),
            e.color.r,
            e.color.g,
            e.color.b,
            e.channel.name()
        );
    }
    out
}

/// `<dir>/<stem>_<suffix>.light`, next to the score when no directory is given.
pub fn output_path(score_path: &Path, output_dir: Option<&Path>, suffix: &str) -> PathBuf {
    let stem = score_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("untitled");
    let name = format!("{stem}_{suffix}.{LIGHT_EXTENSION}");
    match output_dir {
        Some(dir) => dir.join(name),
        None => score_path.with_file_name(name),
    }
}

pub fn write_light_file(path: &Path, score: &AlignedScore, show: &LightShow) -> Result<(), WriteError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    file.write_all(render_light_file(score, show).as_bytes())?;
    file.flush()?;
    log::info!("Wrote {} events to {}", show.events.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light::{Channel, LightEvent, Rgb};
    use crate::pipeline::generate;
    use crate::score::TimeSignature;
    use crate::score::fixtures::*;

    fn two_bar_score() -> AlignedScore {
        let waltz = crate::score::MeasureHeader {
            time_signature: TimeSignature {
                numerator: 3,
                denominator: 4,
            },
            ..header()
        };
        let mut score = guitar_only(
            vec![header(), waltz],
            vec![measure(vec![beat(0, 960, vec![note(64)])]), empty_measure()],
        );
        score.origin_tick = 960;
        score
    }

    #[test]
    fn renders_header_signatures_and_events() {
        let score = two_bar_score();
        let show = generate(&score);
        let text = render_light_file(&score, &show);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![HEADER, "2", "4,4", "3,4", "1", "0,960,2,220,160,40,Guitar"]
        );
    }

    #[test]
    fn channel_indices_and_names() {
        let score = two_bar_score();
        let mut show = generate(&score);
        show.events = vec![
            LightEvent::new(Channel::Bass, 1920, 100, Rgb::new(1, 2, 3)),
            LightEvent::new(Channel::Drums, 2000, 50, Rgb::new(4, 5, 6)),
        ];
        let text = render_light_file(&score, &show);
        assert!(text.ends_with("960,100,3,1,2,3,Bass\n1040,50,4,4,5,6,Drums\n"));
    }

    #[test]
    fn output_path_naming() {
        let score = Path::new("/songs/Tune.json");
        assert_eq!(
            output_path(score, None, "lights"),
            PathBuf::from("/songs/Tune_lights.light")
        );
        assert_eq!(
            output_path(score, Some(Path::new("/out")), "show"),
            PathBuf::from("/out/Tune_show.light")
        );
    }

    #[test]
    fn writes_to_disk() {
        let dir = std::env::temp_dir().join(format!("lightgen-writer-{}", std::process::id()));
        let score = two_bar_score();
        let show = generate(&score);
        let path = dir.join("nested").join("song_lights.light");
        write_light_file(&path, &score, &show).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, render_light_file(&score, &show));
        std::fs::remove_dir_all(&dir).ok();
    }
}
