pub mod analysis;
pub mod batch;
pub mod config;
pub mod coordinate;
pub mod light;
pub mod pipeline;
pub mod postprocess;
pub mod render;
pub mod score;
pub mod writer;

/// Absolute or relative score time.
pub type Tick = i64;

/// Score resolution.
pub const TICKS_PER_QUARTER: Tick = 960;

/// Score document extensions we read
pub const SCORE_EXTENSIONS: &[&str] = &["json", "yaml", "yml", "toml"];

/// Application name for XDG paths
pub const APP_NAME: &str = "lightgen";
