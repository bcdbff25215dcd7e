use crate::analysis::structure::SectionKind;

/// 8-bit RGB colour. Every constructor clamps each component to [0, 255].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

fn channel(v: f64) -> u8 {
    if v.is_nan() {
        0
    } else {
        v.clamp(0.0, 255.0) as u8
    }
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Build from floating-point components, truncating toward zero.
    pub fn from_f64(r: f64, g: f64, b: f64) -> Self {
        Self {
            r: channel(r),
            g: channel(g),
            b: channel(b),
        }
    }

    pub fn components(self) -> [f64; 3] {
        [self.r as f64, self.g as f64, self.b as f64]
    }

    pub fn scale(self, factor: f64) -> Self {
        self.scale_each(factor, factor, factor)
    }

    pub fn scale_each(self, fr: f64, fg: f64, fb: f64) -> Self {
        Self::from_f64(
            self.r as f64 * fr,
            self.g as f64 * fg,
            self.b as f64 * fb,
        )
    }

    /// Linear interpolation, `t` clamped to [0, 1].
    pub fn lerp(self, other: Rgb, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| a as f64 * (1.0 - t) + b as f64 * t;
        Self::from_f64(
            mix(self.r, other.r),
            mix(self.g, other.g),
            mix(self.b, other.b),
        )
    }

    /// Integer component-wise average of two colours.
    pub fn midpoint(self, other: Rgb) -> Self {
        Self {
            r: ((self.r as u16 + other.r as u16) / 2) as u8,
            g: ((self.g as u16 + other.g as u16) / 2) as u8,
            b: ((self.b as u16 + other.b as u16) / 2) as u8,
        }
    }

    /// Component-wise mean of a set of colours, unrounded.
    pub fn mean(colors: &[Rgb]) -> Option<[f64; 3]> {
        if colors.is_empty() {
            return None;
        }
        let mut sum = [0.0_f64; 3];
        for c in colors {
            for (acc, v) in sum.iter_mut().zip(c.components()) {
                *acc += v;
            }
        }
        let n = colors.len() as f64;
        Some(sum.map(|s| s / n))
    }

    /// Sum of the three components.
    pub fn brightness(self) -> u32 {
        self.r as u32 + self.g as u32 + self.b as u32
    }

    /// The (r, g, b) → (g, b, r) rotation used for alternating textures.
    pub fn rotated(self) -> Self {
        Self {
            r: self.g,
            g: self.b,
            b: self.r,
        }
    }
}

/// Inverse of a mean colour, made more vivid: the strongest component is
/// pushed up ×1.2 (capped at 255) and the weakest pulled down ×0.8.
pub fn vivid_complement(mean: [f64; 3]) -> [f64; 3] {
    let mut comp = mean.map(|v| 255.0 - v);
    let max = comp.iter().copied().fold(f64::MIN, f64::max);
    let min = comp.iter().copied().fold(f64::MAX, f64::min);
    for v in comp.iter_mut() {
        if *v == max {
            *v = (*v * 1.2).min(255.0);
        } else if *v == min {
            *v *= 0.8;
        }
    }
    comp
}

/// Position of `value` within `[low, high]`, clamped to [0, 1].
pub fn normalize(value: f64, low: f64, high: f64) -> f64 {
    if high <= low {
        return 0.0;
    }
    ((value - low) / (high - low)).clamp(0.0, 1.0)
}

/// Three anchor colours interpolated by normalised pitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub low: Rgb,
    pub mid: Rgb,
    pub high: Rgb,
}

impl Palette {
    pub const fn new(low: Rgb, mid: Rgb, high: Rgb) -> Self {
        Self { low, mid, high }
    }

    /// Continuous colour at `position` in [0, 1]: low→mid over the lower
    /// half, mid→high over the upper half.
    pub fn at(&self, position: f64) -> Rgb {
        let p = position.clamp(0.0, 1.0);
        if p < 0.5 {
            self.low.lerp(self.mid, p * 2.0)
        } else {
            self.mid.lerp(self.high, (p - 0.5) * 2.0)
        }
    }

    pub fn map(self, f: impl Fn(Rgb) -> Rgb) -> Self {
        Self {
            low: f(self.low),
            mid: f(self.mid),
            high: f(self.high),
        }
    }

    /// Section re-tint: saturated for chorus, muted for verse, and a
    /// fixed high-contrast set for breakdown.
    pub fn retint(self, kind: SectionKind) -> Self {
        match kind {
            SectionKind::Chorus => self.map(|c| c.scale(1.2)),
            SectionKind::Verse => self.map(|c| c.scale(0.9)),
            SectionKind::Breakdown => Palette::new(
                Rgb::new(255, 30, 30),
                Rgb::new(30, 30, 255),
                Rgb::new(255, 255, 255),
            ),
            _ => self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn components_clamp_and_truncate() {
        assert_eq!(Rgb::from_f64(300.0, -5.0, 12.9), Rgb::new(255, 0, 12));
        assert_eq!(Rgb::new(200, 100, 10).scale(1.5), Rgb::new(255, 150, 15));
        assert_eq!(Rgb::from_f64(f64::NAN, 1.0, 1.0), Rgb::new(0, 1, 1));
    }

    #[test]
    fn palette_hits_anchors() {
        let p = Palette::new(Rgb::new(0, 0, 0), Rgb::new(100, 100, 100), Rgb::new(200, 200, 200));
        assert_eq!(p.at(0.0), p.low);
        assert_eq!(p.at(0.5), p.mid);
        assert_eq!(p.at(1.0), p.high);
        assert_eq!(p.at(0.25), Rgb::new(50, 50, 50));
        assert_eq!(p.at(7.0), p.high);
    }

    #[test]
    fn complement_boosts_strongest_and_cuts_weakest() {
        let comp = vivid_complement([55.0, 155.0, 205.0]);
        assert!((comp[0] - 240.0).abs() < 1e-9);
        assert!((comp[1] - 100.0).abs() < 1e-9);
        assert!((comp[2] - 40.0).abs() < 1e-9);
    }

    #[test]
    fn complement_caps_at_255() {
        let comp = vivid_complement([0.0, 100.0, 200.0]);
        assert_eq!(comp[0], 255.0);
    }

    #[test]
    fn midpoint_and_rotation() {
        assert_eq!(Rgb::new(10, 20, 31).midpoint(Rgb::new(20, 40, 60)), Rgb::new(15, 30, 45));
        assert_eq!(Rgb::new(1, 2, 3).rotated(), Rgb::new(2, 3, 1));
    }

    #[test]
    fn normalize_clamps() {
        assert_eq!(normalize(64.0, 40.0, 88.0), 0.5);
        assert_eq!(normalize(10.0, 40.0, 88.0), 0.0);
        assert_eq!(normalize(100.0, 40.0, 88.0), 1.0);
    }

    #[test]
    fn chorus_retint_brightens() {
        let p = Palette::new(Rgb::new(100, 100, 100), Rgb::new(220, 160, 40), Rgb::new(0, 0, 0));
        let chorus = p.retint(SectionKind::Chorus);
        assert_eq!(chorus.mid, Rgb::new(255, 192, 48));
        assert_eq!(p.retint(SectionKind::Solo), p);
    }
}
