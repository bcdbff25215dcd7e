use std::path::Path;

use super::{AlignedScore, Score, ScoreError};

/// Score document formats, picked by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreFormat {
    Json,
    Yaml,
    Toml,
}

impl ScoreFormat {
    pub fn from_path(path: &Path) -> Result<Self, ScoreError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        match ext.as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            "toml" => Ok(Self::Toml),
            _ => Err(ScoreError::UnsupportedFormat(ext)),
        }
    }
}

/// Parse a score document from text.
pub fn parse_score(text: &str, format: ScoreFormat) -> Result<Score, ScoreError> {
    let score = match format {
        ScoreFormat::Json => serde_json::from_str(text)?,
        ScoreFormat::Yaml => serde_yaml::from_str(text)?,
        ScoreFormat::Toml => toml::from_str(text)?,
    };
    Ok(score)
}

/// Read a score file. The title falls back to the file stem.
pub fn load_score(path: &Path) -> Result<Score, ScoreError> {
    let format = ScoreFormat::from_path(path)?;
    let text = std::fs::read_to_string(path)?;
    let mut score = parse_score(&text, format)?;
    if score.title.is_empty() {
        score.title = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("untitled")
            .to_string();
    }
    log::debug!(
        "Loaded '{}': {} measures, {} tracks",
        score.title,
        score.measure_headers.len(),
        score.tracks.len()
    );
    Ok(score)
}

/// Read a score file and validate its role tracks.
pub fn load_aligned(path: &Path) -> Result<AlignedScore, ScoreError> {
    AlignedScore::from_score(load_score(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::Role;

    const JSON_SCORE: &str = r#"{
        "title": "Demo",
        "origin_tick": 960,
        "measure_headers": [
            {"marker": "Verse", "tempo": 120},
            {"time_signature": {"numerator": 3, "denominator": 4}}
        ],
        "tracks": [
            {"name": "Guitar", "measures": [
                {"voices": [{"beats": [{"start": 0, "duration": 960, "notes": [{"pitch": 64}]}]}]},
                {}
            ]},
            {"name": "Bass", "measures": [{}, {}]},
            {"name": "Bass Drive", "measures": [{}, {}]},
            {"name": "Drums", "measures": [{}, {}]}
        ]
    }"#;

    #[test]
    fn json_score_with_defaults() {
        let score = parse_score(JSON_SCORE, ScoreFormat::Json).unwrap();
        let aligned = AlignedScore::from_score(score).unwrap();
        assert_eq!(aligned.title, "Demo");
        assert_eq!(aligned.measure_count(), 2);
        assert_eq!(aligned.headers[1].ticks(), 2880);
        let beat = &aligned.guitar[0].voices[0].beats[0];
        assert_eq!(beat.notes[0].velocity, 95);
        assert!(!beat.notes[0].effects.vibrato);
        assert_eq!(aligned.tempo_at(0), Some(120));
    }

    #[test]
    fn yaml_score_missing_drums() {
        let yaml = r#"
measure_headers:
  - marker: Intro
tracks:
  - name: Guitar
    measures: [{}]
  - name: Bass
    measures: [{}]
  - name: Bass Drive
    measures: [{}]
"#;
        let score = parse_score(yaml, ScoreFormat::Yaml).unwrap();
        match AlignedScore::from_score(score) {
            Err(ScoreError::MissingTracks { roles }) => assert_eq!(roles, vec![Role::Drums]),
            other => panic!("expected missing drums, got {other:?}"),
        }
    }

    #[test]
    fn toml_score_parses() {
        let text = r#"
title = "Toml Song"

[[measure_headers]]
marker = "Chorus"

[[tracks]]
name = "Guitar"
[[tracks.measures]]

[[tracks]]
name = "Bass"
[[tracks.measures]]

[[tracks]]
name = "Bass Drive"
[[tracks.measures]]

[[tracks]]
name = "Drums"
[[tracks.measures]]
"#;
        let score = parse_score(text, ScoreFormat::Toml).unwrap();
        let aligned = AlignedScore::from_score(score).unwrap();
        assert_eq!(aligned.headers[0].marker.as_deref(), Some("Chorus"));
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(ScoreFormat::from_path(Path::new("a.JSON")).unwrap(), ScoreFormat::Json);
        assert_eq!(ScoreFormat::from_path(Path::new("a.yml")).unwrap(), ScoreFormat::Yaml);
        assert!(matches!(
            ScoreFormat::from_path(Path::new("a.gp5")),
            Err(ScoreError::UnsupportedFormat(ext)) if ext == "gp5"
        ));
    }

    #[test]
    fn load_from_disk_uses_stem_as_title() {
        let dir = std::env::temp_dir().join(format!("lightgen-load-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("stem_title.json");
        std::fs::write(&path, JSON_SCORE.replace("\"title\": \"Demo\",", "")).unwrap();
        let aligned = load_aligned(&path).unwrap();
        assert_eq!(aligned.title, "stem_title");
        std::fs::remove_dir_all(&dir).ok();
    }
}
