//! Directory scanning and parallel batch generation.

use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;
use walkdir::WalkDir;

use crate::SCORE_EXTENSIONS;
use crate::pipeline::generate;
use crate::score::ScoreError;
use crate::score::load::load_aligned;
use crate::writer::{WriteError, output_path, write_light_file};

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Score error: {0}")]
    Score(#[from] ScoreError),
    #[error("Write error: {0}")]
    Write(#[from] WriteError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Thread pool error: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Where and how batch output is written.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// `None` writes next to each score.
    pub output_dir: Option<PathBuf>,
    pub suffix: String,
    pub jobs: usize,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct BatchResult {
    pub processed: u64,
    pub failed: u64,
}

pub fn is_score_file(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    SCORE_EXTENSIONS.contains(&ext.as_str())
}

/// Every score file under `paths`, sorted. Plain file arguments are taken as-is
/// when their extension matches.
pub fn collect_scores<P: AsRef<Path>>(paths: &[P]) -> Vec<PathBuf> {
    let mut scores = Vec::new();
    for path in paths {
        for entry in WalkDir::new(path).follow_links(true).into_iter().filter_map(|e| e.ok()) {
            if entry.file_type().is_file() && is_score_file(entry.path()) {
                scores.push(entry.into_path());
            }
        }
    }
    scores.sort();
    scores.dedup();
    scores
}

/// Load, light and write one score. Returns the output path.
pub fn process_score(path: &Path, options: &BatchOptions) -> Result<PathBuf, BatchError> {
    let score = load_aligned(path)?;
    let show = generate(&score);
    let out = output_path(path, options.output_dir.as_deref(), &options.suffix);
    write_light_file(&out, &score, &show)?;
    Ok(out)
}

/// Process every score in parallel. A failing score is counted and logged;
/// the rest of the batch carries on.
pub fn run_batch(scores: &[PathBuf], options: &BatchOptions) -> Result<BatchResult, BatchError> {
    if scores.is_empty() {
        log::info!("No scores to process");
        return Ok(BatchResult::default());
    }
    if let Some(dir) = &options.output_dir {
        std::fs::create_dir_all(dir)?;
    }

    let jobs = options.jobs.max(1);
    log::info!("Processing {} scores with {} workers", scores.len(), jobs);

    let pb = ProgressBar::new(scores.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;
    let results: Vec<(&PathBuf, Result<PathBuf, BatchError>)> = pool.install(|| {
        use rayon::prelude::*;
        scores
            .par_iter()
            .map(|path| {
                let result = process_score(path, options);
                pb.inc(1);
                (path, result)
            })
            .collect()
    });

    let mut result = BatchResult::default();
    for (path, outcome) in results {
        match outcome {
            Ok(out) => {
                log::debug!("{} -> {}", path.display(), out.display());
                result.processed += 1;
            }
            Err(e) => {
                log::warn!("Failed to process {}: {}", path.display(), e);
                result.failed += 1;
            }
        }
    }

    pb.finish_with_message(format!(
        "Done: {} written, {} failed",
        result.processed, result.failed
    ));
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = r#"{
        "measure_headers": [{"marker": "Intro"}],
        "tracks": [
            {"name": "Guitar", "measures": [
                {"voices": [{"beats": [{"start": 0, "duration": 960, "notes": [{"pitch": 64}]}]}]}
            ]},
            {"name": "Bass", "measures": [{}]},
            {"name": "Bass Drive", "measures": [{}]},
            {"name": "Drums", "measures": [{}]}
        ]
    }"#;

    const MISSING_BASS: &str = r#"{
        "measure_headers": [{}],
        "tracks": [
            {"name": "Guitar", "measures": [{}]},
            {"name": "Bass Drive", "measures": [{}]},
            {"name": "Drums", "measures": [{}]}
        ]
    }"#;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lightgen-batch-{name}-{}", std::process::id()));
        std::fs::create_dir_all(dir.join("sub")).unwrap();
        dir
    }

    #[test]
    fn collects_only_score_extensions() {
        let dir = scratch("collect");
        std::fs::write(dir.join("b.json"), GOOD).unwrap();
        std::fs::write(dir.join("sub").join("a.YAML"), "").unwrap();
        std::fs::write(dir.join("notes.txt"), "").unwrap();
        std::fs::write(dir.join("old.light"), "").unwrap();

        let found = collect_scores(&[&dir]);
        let names: Vec<String> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["b.json", "a.YAML"]);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn failures_are_counted_not_fatal() {
        let dir = scratch("run");
        std::fs::write(dir.join("good.json"), GOOD).unwrap();
        std::fs::write(dir.join("broken.json"), "{ not json").unwrap();
        std::fs::write(dir.join("sub").join("partial.json"), MISSING_BASS).unwrap();

        let out = dir.join("out");
        let options = BatchOptions {
            output_dir: Some(out.clone()),
            suffix: "lights".to_string(),
            jobs: 2,
        };
        let result = run_batch(&collect_scores(&[&dir]), &options).unwrap();
        assert_eq!(result, BatchResult { processed: 1, failed: 2 });

        let written = std::fs::read_to_string(out.join("good_lights.light")).unwrap();
        assert!(written.starts_with(crate::writer::HEADER));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn empty_batch() {
        let options = BatchOptions {
            output_dir: None,
            suffix: "lights".to_string(),
            jobs: 0,
        };
        assert_eq!(run_batch(&[], &options).unwrap(), BatchResult::default());
    }
}
