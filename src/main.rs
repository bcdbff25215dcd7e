use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lightgen::batch::{BatchOptions, collect_scores, run_batch};
use lightgen::light::Channel;
use lightgen::pipeline::{LightShow, generate};
use lightgen::render::write_png;
use lightgen::score::load::load_aligned;
use lightgen::writer::{output_path, write_light_file};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lightgen", version, about = "Light show generator for band scores")]
struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a .light file for one score
    Generate {
        /// Score file (.json, .yaml, .toml)
        score: PathBuf,

        /// Output file (defaults to <stem>_<suffix>.light in the output dir)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write a PNG overview next to the .light file
        #[arg(long)]
        png: bool,
    },

    /// Generate .light files for every score under the given directories
    Batch {
        /// Directories to scan (defaults to config file score_dirs)
        paths: Vec<PathBuf>,

        /// Number of parallel workers (0 = auto-detect from config)
        #[arg(short = 'j', long, default_value = "0")]
        jobs: usize,

        /// Output directory (overrides config output_dir)
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },

    /// Print the detected structure and event counts for a score
    Inspect {
        /// Score file (.json, .yaml, .toml)
        score: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = lightgen::config::AppConfig::load();

    match cli.command {
        Commands::Generate { score, output, png } => {
            let aligned = load_aligned(&score)
                .with_context(|| format!("Failed to load {}", score.display()))?;
            let show = generate(&aligned);
            let out = output.unwrap_or_else(|| {
                output_path(&score, config.output_dir.as_deref(), &config.output_suffix)
            });
            write_light_file(&out, &aligned, &show)
                .with_context(|| format!("Failed to write {}", out.display()))?;
            println!("Wrote {} events to {}", show.events.len(), out.display());
            if png {
                let image = out.with_extension("png");
                write_png(&image, &aligned, &show)
                    .with_context(|| format!("Failed to write {}", image.display()))?;
                println!("Wrote overview to {}", image.display());
            }
        }

        Commands::Batch { paths, jobs, out_dir } => {
            // Resolve score paths: CLI args > config score_dirs
            let roots = if !paths.is_empty() {
                paths
            } else if !config.score_dirs.is_empty() {
                config.score_dirs.clone()
            } else {
                anyhow::bail!(
                    "No directories to scan. Pass paths as arguments or set score_dirs in config."
                );
            };

            let scores = collect_scores(&roots);
            let options = BatchOptions {
                output_dir: out_dir.or(config.output_dir.clone()),
                suffix: config.output_suffix.clone(),
                jobs: if jobs > 0 { jobs } else { config.resolve_workers() },
            };
            let result = run_batch(&scores, &options).context("Batch failed")?;
            println!(
                "Batch complete: {} scores found, {} written, {} failed",
                scores.len(),
                result.processed,
                result.failed
            );
        }

        Commands::Inspect { score } => {
            let aligned = load_aligned(&score)
                .with_context(|| format!("Failed to load {}", score.display()))?;
            let show = generate(&aligned);
            print_inspection(&show, aligned.measure_count());
        }
    }

    Ok(())
}

fn print_inspection(show: &LightShow, measures: usize) {
    let structure = &show.structure;
    println!("{} ({} measures)", show.title, measures);
    println!();

    println!("{:<12} {:>9} {:>9}", "Section", "Measures", "Intensity");
    println!("{}", "-".repeat(32));
    for s in &structure.sections {
        println!(
            "{:<12} {:>4}-{:<4} {:>9.2}",
            s.kind.label(),
            s.start_measure + 1,
            s.end_measure + 1,
            s.intensity
        );
    }

    if !structure.tempo_changes.is_empty() {
        println!();
        println!("Tempo changes:");
        for t in &structure.tempo_changes {
            println!("  measure {:>4}: {} bpm", t.measure + 1, t.tempo);
        }
    }

    if !structure.key_changes.is_empty() {
        println!();
        println!("Key changes:");
        for k in &structure.key_changes {
            let key = k.key.map(|v| v.to_string()).unwrap_or_else(|| "?".to_string());
            let mode = match k.minor {
                Some(true) => "minor",
                Some(false) => "major",
                None => "?",
            };
            println!("  measure {:>4}: key {} {}", k.measure + 1, key, mode);
        }
    }

    if !structure.transitions.is_empty() {
        println!();
        println!("Transitions:");
        for t in &structure.transitions {
            println!("  measure {:>4}: {}", t.measure + 1, t.kind.label());
        }
    }

    println!();
    println!("Events:");
    for channel in Channel::ALL {
        println!("  {:<7} {:>6}", channel.name(), show.count(channel));
    }
    println!("  {:<7} {:>6}", "Total", show.events.len());
}
