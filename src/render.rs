//! PNG overview of a light show: one horizontal lane per channel on a fixed
//! 32nd-note grid, with measure numbers, bar lines and marker text above.

use std::path::Path;

use image::{ImageError, ImageFormat, RgbImage};
use thiserror::Error;

use crate::Tick;
use crate::light::{Channel, Rgb};
use crate::pipeline::LightShow;
use crate::score::AlignedScore;

const LEFT_PX: u32 = 100;
const RIGHT_PX: u32 = 50;
const LANE_HEIGHT_PX: u32 = 50;
const LANE_GAP_PX: u32 = 20;
const PX_PER_32ND: i64 = 5;
const TICKS_PER_32ND: Tick = crate::TICKS_PER_QUARTER / 8;

const MARKER_ROW_PX: u32 = 45;
const NUMBER_ROW_PX: u32 = 30;
const BAR_ROW_PX: u32 = 30;
/// Top of the first lane.
pub const LANES_TOP_PX: u32 = MARKER_ROW_PX + NUMBER_ROW_PX + BAR_ROW_PX;

const BACKGROUND: [u8; 3] = [0, 0, 0];
const FOREGROUND: [u8; 3] = [255, 255, 255];
const FEATURE: [u8; 3] = [255, 0, 0];

/// Glyph scale for measure numbers and lane labels.
const BIG: u32 = 4;
/// Glyph scale for marker text.
const SMALL: u32 = 2;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Image error: {0}")]
    Image(#[from] ImageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Top row of a channel's lane.
pub fn lane_top(channel: Channel) -> u32 {
    LANES_TOP_PX + channel.slot() as u32 * (LANE_HEIGHT_PX + LANE_GAP_PX)
}

/// Horizontal pixel for a tick relative to the first measure.
pub fn tick_to_x(tick: Tick) -> i64 {
    (tick / TICKS_PER_32ND) * PX_PER_32ND + LEFT_PX as i64
}

pub fn image_size(score: &AlignedScore) -> (u32, u32) {
    let length: Tick = score.headers.iter().map(|h| h.ticks()).sum();
    let width = LEFT_PX as i64 + (length / TICKS_PER_32ND) * PX_PER_32ND + RIGHT_PX as i64;
    let height = LANES_TOP_PX + 3 * LANE_HEIGHT_PX + 2 * LANE_GAP_PX;
    (width.max(1) as u32, height)
}

fn put(img: &mut RgbImage, x: i64, y: i64, color: [u8; 3]) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, image::Rgb(color));
    }
}

fn fill_rect(img: &mut RgbImage, x0: i64, y0: i64, x1: i64, y1: i64, color: [u8; 3]) {
    for y in y0..y1 {
        for x in x0..x1 {
            put(img, x, y, color);
        }
    }
}

/// 3×5 bitmap rows, most significant of the low three bits on the left.
fn glyph(c: char) -> [u8; 5] {
    match c.to_ascii_uppercase() {
        '0' => [7, 5, 5, 5, 7],
        '1' => [2, 6, 2, 2, 7],
        '2' => [7, 1, 7, 4, 7],
        '3' => [7, 1, 7, 1, 7],
        '4' => [5, 5, 7, 1, 1],
        '5' => [7, 4, 7, 1, 7],
        '6' => [7, 4, 7, 5, 7],
        '7' => [7, 1, 1, 1, 1],
        '8' => [7, 5, 7, 5, 7],
        '9' => [7, 5, 7, 1, 7],
        'A' => [2, 5, 7, 5, 5],
        'B' => [6, 5, 6, 5, 6],
        'C' => [3, 4, 4, 4, 3],
        'D' => [6, 5, 5, 5, 6],
        'E' => [7, 4, 6, 4, 7],
        'F' => [7, 4, 6, 4, 4],
        'G' => [3, 4, 5, 5, 3],
        'H' => [5, 5, 7, 5, 5],
        'I' => [7, 2, 2, 2, 7],
        'J' => [1, 1, 1, 5, 2],
        'K' => [5, 5, 6, 5, 5],
        'L' => [4, 4, 4, 4, 7],
        'M' => [5, 7, 7, 5, 5],
        'N' => [6, 5, 5, 5, 5],
        'O' => [2, 5, 5, 5, 2],
        'P' => [6, 5, 6, 4, 4],
        'Q' => [2, 5, 5, 6, 3],
        'R' => [6, 5, 6, 5, 5],
        'S' => [3, 4, 2, 1, 6],
        'T' => [7, 2, 2, 2, 2],
        'U' => [5, 5, 5, 5, 7],
        'V' => [5, 5, 5, 5, 2],
        'W' => [5, 5, 7, 7, 5],
        'X' => [5, 5, 2, 5, 5],
        'Y' => [5, 5, 2, 2, 2],
        'Z' => [7, 1, 2, 4, 7],
        '[' => [6, 4, 4, 4, 6],
        ']' => [3, 1, 1, 1, 3],
        ':' => [0, 2, 0, 2, 0],
        '.' => [0, 0, 0, 0, 2],
        '-' => [0, 0, 7, 0, 0],
        '|' => [2, 2, 2, 2, 2],
        _ => [0; 5],
    }
}

pub fn text_width(text: &str, scale: u32) -> i64 {
    text.chars().count() as i64 * 4 * scale as i64
}

/// Draw `text` with its top-left corner at (x, y).
pub fn draw_text(img: &mut RgbImage, text: &str, x: i64, y: i64, scale: u32, color: [u8; 3]) {
    let s = scale as i64;
    for (i, c) in text.chars().enumerate() {
        let left = x + i as i64 * 4 * s;
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..3 {
                if bits & (4 >> col) != 0 {
                    let px = left + col * s;
                    let py = y + row as i64 * s;
                    fill_rect(img, px, py, px + s, py + s, color);
                }
            }
        }
    }
}

/// Split a marker into its caption and the bracketed light-feature part.
fn split_marker(marker: &str) -> (&str, Option<String>) {
    match marker.split_once('[') {
        Some((caption, feature)) => (
            caption.trim(),
            Some(format!("[{}", feature.trim().replace(';', " | "))),
        ),
        None => (marker.trim(), None),
    }
}

/// Paint the overview.
pub fn render_show(score: &AlignedScore, show: &LightShow) -> RgbImage {
    let (width, height) = image_size(score);
    let mut img = RgbImage::from_pixel(width, height, image::Rgb(BACKGROUND));

    for event in &show.events {
        let top = lane_top(event.channel) as i64;
        let x0 = tick_to_x(event.start - score.origin_tick);
        let x1 = x0 + (event.duration / TICKS_PER_32ND) * PX_PER_32ND;
        let Rgb { r, g, b } = event.color;
        fill_rect(&mut img, x0, top, x1.max(x0 + 1), top + LANE_HEIGHT_PX as i64, [r, g, b]);
    }

    let bar_top = (MARKER_ROW_PX + NUMBER_ROW_PX) as i64;
    let mut last_feature_right = i64::MIN;
    for (i, (header, offset)) in score.headers.iter().zip(score.measure_offsets()).enumerate() {
        let x = tick_to_x(offset - score.origin_tick);

        if let Some(marker) = header.marker.as_deref() {
            let (caption, feature) = split_marker(marker);
            let w = text_width(caption, SMALL);
            draw_text(&mut img, caption, x - w / 2, 0, SMALL, FOREGROUND);
            if let Some(feature) = feature {
                let w = text_width(&feature, SMALL);
                let row = if x - w / 2 < last_feature_right { 30 } else { 15 };
                draw_text(&mut img, &feature, x - w / 2, row, SMALL, FEATURE);
                last_feature_right = x + w / 2;
            }
        }

        let number = (i + 1).to_string();
        draw_text(
            &mut img,
            &number,
            x - text_width(&number, BIG) / 2,
            MARKER_ROW_PX as i64,
            BIG,
            FOREGROUND,
        );
        fill_rect(&mut img, x, bar_top, x + 1, height as i64, FOREGROUND);
    }

    for channel in Channel::ALL {
        let label = channel.name();
        let y = lane_top(channel) as i64 + 12;
        draw_text(&mut img, label, 5, y, SMALL, FOREGROUND);
    }

    img
}

pub fn write_png(path: &Path, score: &AlignedScore, show: &LightShow) -> Result<(), RenderError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    render_show(score, show).save_with_format(path, ImageFormat::Png)?;
    log::info!("Wrote light overview to {}", path.display());
    Ok(())
}
