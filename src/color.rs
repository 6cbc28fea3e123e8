//! Continuous color scales for coverage and trend values.
//!
//! Scales interpolate linearly in sRGB between fixed control points. The
//! legend is banded, the render is not.

use crate::data::{StatRecord, Year};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    const fn hex(v: u32) -> Self {
        Self::new((v >> 16) as u8, (v >> 8) as u8, v as u8)
    }

    /// Mixes toward `other` by `t` in [0, 1].
    pub fn mix(self, other: Rgb, t: f64) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let ch = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Rgb::new(ch(self.r, other.r), ch(self.g, other.g), ch(self.b, other.b))
    }
}

/// Fill for features without statistics.
pub const NO_DATA: Rgb = Rgb::hex(0x1a1a1a);

/// ColorBrewer Greens, 9 classes.
pub const GREENS: [Rgb; 9] = [
    Rgb::hex(0xf7fcf5),
    Rgb::hex(0xe5f5e0),
    Rgb::hex(0xc7e9c0),
    Rgb::hex(0xa1d99b),
    Rgb::hex(0x74c476),
    Rgb::hex(0x41ab5d),
    Rgb::hex(0x238b45),
    Rgb::hex(0x006d2c),
    Rgb::hex(0x00441b),
];

/// ColorBrewer RdYlBu, 11 classes.
pub const RD_YL_BU: [Rgb; 11] = [
    Rgb::hex(0xa50026),
    Rgb::hex(0xd73027),
    Rgb::hex(0xf46d43),
    Rgb::hex(0xfdae61),
    Rgb::hex(0xfee090),
    Rgb::hex(0xffffbf),
    Rgb::hex(0xe0f3f8),
    Rgb::hex(0xabd9e9),
    Rgb::hex(0x74add1),
    Rgb::hex(0x4575b4),
    Rgb::hex(0x313695),
];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Domain {
    pub lo: f64,
    pub hi: f64,
}

impl Domain {
    /// Absolute forest coverage in percent.
    pub const COVERAGE: Domain = Domain { lo: 0.0, hi: 100.0 };
    /// Percentage-point change between the snapshot years.
    pub const TREND: Domain = Domain { lo: -50.0, hi: 50.0 };

    /// Position of `value` in the domain, clamped to [0, 1].
    pub fn normalize(self, value: f64) -> f64 {
        let span = self.hi - self.lo;
        if span <= 0.0 {
            return 0.0;
        }
        ((value - self.lo) / span).clamp(0.0, 1.0)
    }
}

/// Samples `ramp` at `t` in [0, 1], piecewise linear between stops.
pub fn interpolate(ramp: &[Rgb], t: f64) -> Rgb {
    match ramp {
        [] => NO_DATA,
        [only] => *only,
        _ => {
            let pos = t.clamp(0.0, 1.0) * (ramp.len() - 1) as f64;
            let i = (pos.floor() as usize).min(ramp.len() - 2);
            ramp[i].mix(ramp[i + 1], pos - i as f64)
        }
    }
}

pub fn color_on(ramp: &[Rgb], value: Option<f64>, domain: Domain) -> Rgb {
    match value {
        Some(v) if v.is_finite() => interpolate(ramp, domain.normalize(v)),
        _ => NO_DATA,
    }
}

/// Coverage color on the sequential ramp.
pub fn color_for(value: Option<f64>, domain: Domain) -> Rgb {
    color_on(&GREENS, value, domain)
}

/// Which statistic drives the fill.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorMode {
    Coverage,
    Trend,
}

impl ColorMode {
    pub fn toggled(self) -> Self {
        match self {
            ColorMode::Coverage => ColorMode::Trend,
            ColorMode::Trend => ColorMode::Coverage,
        }
    }

    pub fn domain(self) -> Domain {
        match self {
            ColorMode::Coverage => Domain::COVERAGE,
            ColorMode::Trend => Domain::TREND,
        }
    }

    pub fn ramp(self) -> &'static [Rgb] {
        match self {
            ColorMode::Coverage => &GREENS,
            ColorMode::Trend => &RD_YL_BU,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ColorMode::Coverage => "Forest density",
            ColorMode::Trend => "Change 2000-2020",
        }
    }

    /// The trend does not depend on the displayed year.
    pub fn value_of(self, record: &StatRecord, year: Year) -> Option<f64> {
        match self {
            ColorMode::Coverage => record.value(year),
            ColorMode::Trend => record.trend,
        }
    }

    pub fn color(self, value: Option<f64>) -> Rgb {
        match self {
            ColorMode::Coverage => color_for(value, Domain::COVERAGE),
            ColorMode::Trend => color_on(self.ramp(), value, self.domain()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LegendBand {
    pub lo: f64,
    pub hi: f64,
    pub color: Rgb,
}

/// Five equal bands, lowest first, each colored at its midpoint.
pub fn legend(mode: ColorMode) -> Vec<LegendBand> {
    let Domain { lo, hi } = mode.domain();
    let step = (hi - lo) / 5.0;
    (0..5)
        .map(|i| {
            let band_lo = lo + step * i as f64;
            let band_hi = band_lo + step;
            LegendBand { lo: band_lo, hi: band_hi, color: mode.color(Some((band_lo + band_hi) / 2.0)) }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn no_data_ignores_domain() {
        assert_eq!(color_for(None, Domain::COVERAGE), NO_DATA);
        assert_eq!(color_for(None, Domain::TREND), NO_DATA);
        assert_eq!(color_for(Some(f64::NAN), Domain::COVERAGE), NO_DATA);
        assert_eq!(ColorMode::Trend.color(None), NO_DATA);
    }

    #[test]
    fn extremes_and_midpoint() {
        assert_eq!(color_for(Some(0.0), Domain::COVERAGE), GREENS[0]);
        assert_eq!(color_for(Some(100.0), Domain::COVERAGE), GREENS[8]);
        assert_eq!(color_for(Some(50.0), Domain::COVERAGE), GREENS[4]);

        assert_eq!(ColorMode::Trend.color(Some(-50.0)), RD_YL_BU[0]);
        assert_eq!(ColorMode::Trend.color(Some(0.0)), RD_YL_BU[5]);
        assert_eq!(ColorMode::Trend.color(Some(50.0)), RD_YL_BU[10]);
    }

    #[test]
    fn out_of_domain_values_clamp() {
        assert_eq!(color_for(Some(-5.0), Domain::COVERAGE), GREENS[0]);
        assert_eq!(color_for(Some(250.0), Domain::COVERAGE), GREENS[8]);
    }

    #[test]
    fn no_data_is_not_an_in_domain_color() {
        for v in 0..=100 {
            assert_ne!(color_for(Some(v as f64), Domain::COVERAGE), NO_DATA);
            assert_ne!(ColorMode::Trend.color(Some(v as f64 - 50.0)), NO_DATA);
        }
    }

    #[test]
    fn scale_is_continuous_between_stops() {
        let a = color_for(Some(6.25), Domain::COVERAGE);
        assert_eq!(a, GREENS[0].mix(GREENS[1], 0.5));
        assert_ne!(a, GREENS[0]);
        assert_ne!(a, GREENS[1]);
    }

    #[test]
    fn legend_has_five_bands() {
        let bands = legend(ColorMode::Coverage);
        assert_eq!(bands.len(), 5);
        assert_eq!((bands[0].lo, bands[4].hi), (0.0, 100.0));
        assert_eq!(bands[2].color, color_for(Some(50.0), Domain::COVERAGE));

        let trend = legend(ColorMode::Trend);
        assert_eq!((trend[0].lo, trend[4].hi), (-50.0, 50.0));
    }
}
