//! Globe rendering on a Braille canvas.
//!
//! Everything is computed in viewport units (the engine's screen space, y
//! down) and flipped into canvas coordinates at the last moment. One
//! terminal cell spans 1 x 2 viewport units and 2 x 4 Braille dots.

use ratatui::{
    Frame,
    layout::Rect,
    style::Color,
    symbols::Marker,
    widgets::{
        Block,
        canvas::{Canvas, Circle, Context, Line, Points},
    },
};

use crate::{
    color::{NO_DATA, Rgb},
    data::{RecordId, StatsTable, Year},
    filter::Filter,
    matcher::EnrichedFeature,
    projection::{ProjectedPoint, Projection},
};

/// Viewport units between neighbouring Braille dots, on both axes.
const DOT: f64 = 0.5;
const GRATICULE_STEP: f64 = 30.0;
const GRATICULE_SAMPLE: f64 = 2.0;
/// How far filtered-out countries fade toward the no-data color.
const DIM: f64 = 0.75;

pub fn tui_color(c: Rgb) -> Color {
    Color::Rgb(c.r, c.g, c.b)
}

/// One frame of the globe.
pub struct GlobeView<'a> {
    pub features: &'a [EnrichedFeature],
    pub table: &'a StatsTable,
    pub filter: &'a Filter,
    pub year: Year,
    pub projection: Projection,
    pub selected: Option<RecordId>,
    pub hovered: Option<usize>,
}

impl GlobeView<'_> {
    pub fn render(&self, f: &mut Frame, area: Rect, block: Block) {
        let viewport = self.projection.viewport();
        let height = viewport.height;
        let flip = |(x, y): (f64, f64)| (x, height - y);

        let graticule = graticule(&self.projection);
        let fills: Vec<(Color, Vec<(f64, f64)>)> = self
            .features
            .iter()
            .filter_map(|ef| {
                let rings = self.projection.project_shape(&ef.feature.shape);
                if !rings.iter().flatten().any(|p| p.visible) {
                    return None;
                }
                let admitted = self.filter.admits(&ef.feature.name, ef.record(self.table), self.year);
                let color = if admitted { ef.fill } else { ef.fill.mix(NO_DATA, DIM) };
                let dots: Vec<(f64, f64)> = scanline_fill(&rings, viewport.width, height).into_iter().map(flip).collect();
                Some((tui_color(color), dots))
            })
            .collect();

        let mut outlines = Vec::new();
        if let Some(ef) = self.hovered.and_then(|i| self.features.get(i)) {
            outlines.push((Color::White, self.projection.project_shape(&ef.feature.shape)));
        }
        if let Some(selected) = self.selected {
            for ef in self.features.iter().filter(|ef| ef.record == Some(selected)) {
                outlines.push((Color::Yellow, self.projection.project_shape(&ef.feature.shape)));
            }
        }
        let ((cx, cy), radius) = self.projection.limb();

        let canvas = Canvas::default()
            .block(block)
            .marker(Marker::Braille)
            .x_bounds([0.0, viewport.width])
            .y_bounds([0.0, height])
            .paint(move |ctx| {
                for [a, b] in &graticule {
                    draw_segment(ctx, flip(*a), flip(*b), Color::DarkGray);
                }
                ctx.draw(&Circle { x: cx, y: height - cy, radius, color: Color::Gray });
                ctx.layer();

                for (color, dots) in &fills {
                    ctx.draw(&Points { coords: dots, color: *color });
                }
                ctx.layer();

                for (color, rings) in &outlines {
                    for ring in rings {
                        for (a, b) in visible_segments(ring) {
                            draw_segment(ctx, flip(a), flip(b), *color);
                        }
                    }
                }
            });
        f.render_widget(canvas, area);
    }
}

fn draw_segment(ctx: &mut Context, a: (f64, f64), b: (f64, f64), color: Color) {
    ctx.draw(&Line { x1: a.0, y1: a.1, x2: b.0, y2: b.1, color });
}

/// Consecutive point pairs with both ends on the near hemisphere.
fn visible_segments(ring: &[ProjectedPoint]) -> impl Iterator<Item = ((f64, f64), (f64, f64))> + '_ {
    ring.windows(2)
        .filter(|w| w[0].visible && w[1].visible)
        .map(|w| ((w[0].x, w[0].y), (w[1].x, w[1].y)))
}

/// Meridians and parallels every 30 degrees, as visible screen segments.
fn graticule(projection: &Projection) -> Vec<[(f64, f64); 2]> {
    let samples = |from: f64, to: f64| {
        let n = ((to - from) / GRATICULE_SAMPLE).round() as usize;
        (0..=n).map(move |i| from + i as f64 * GRATICULE_SAMPLE)
    };
    let mut lines: Vec<Vec<ProjectedPoint>> = Vec::new();
    for i in 0..(360.0 / GRATICULE_STEP) as usize {
        let lon = -180.0 + i as f64 * GRATICULE_STEP;
        lines.push(samples(-90.0, 90.0).map(|lat| projection.project(lon, lat)).collect());
    }
    for i in 1..(180.0 / GRATICULE_STEP) as usize {
        let lat = -90.0 + i as f64 * GRATICULE_STEP;
        lines.push(samples(-180.0, 180.0).map(|lon| projection.project(lon, lat)).collect());
    }
    lines.iter().flat_map(|l| visible_segments(l).map(|(a, b)| [a, b])).collect()
}

/// Dot centers inside `rings` under the even-odd rule, clipped to the
/// viewport. Holes fall out of the parity count.
pub fn scanline_fill(rings: &[Vec<ProjectedPoint>], width: f64, height: f64) -> Vec<(f64, f64)> {
    let mut dots = Vec::new();
    let (mut top, mut bottom) = (f64::INFINITY, f64::NEG_INFINITY);
    for p in rings.iter().flatten() {
        top = top.min(p.y);
        bottom = bottom.max(p.y);
    }
    if !top.is_finite() || bottom < 0.0 || top > height {
        return dots;
    }

    let last_col = (width / DOT).ceil() as i64 - 1;
    let first_row = (top.max(0.0) / DOT).floor() as i64;
    let last_row = (bottom.min(height) / DOT).ceil() as i64;
    let mut crossings = Vec::new();
    for row in first_row..=last_row {
        let y = (row as f64 + 0.5) * DOT;
        if y > height {
            break;
        }
        crossings.clear();
        for ring in rings {
            let closing = ring.last().zip(ring.first());
            for (a, b) in ring.windows(2).map(|w| (&w[0], &w[1])).chain(closing) {
                if (a.y <= y) != (b.y <= y) {
                    crossings.push(a.x + (y - a.y) / (b.y - a.y) * (b.x - a.x));
                }
            }
        }
        crossings.sort_by(f64::total_cmp);
        for span in crossings.chunks_exact(2) {
            let from = ((span[0] / DOT) - 0.5).ceil().max(0.0) as i64;
            let to = (((span[1] / DOT) - 0.5).floor() as i64).min(last_col);
            dots.extend((from..=to).map(|col| ((col as f64 + 0.5) * DOT, y)));
        }
    }
    dots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::{Rotation, ViewTransform, Viewport, ZoomTransform};

    fn ring(points: &[(f64, f64)]) -> Vec<ProjectedPoint> {
        points.iter().map(|&(x, y)| ProjectedPoint { x, y, visible: true }).collect()
    }

    #[test]
    fn fills_a_square() {
        let square = ring(&[(2.0, 2.0), (7.0, 2.0), (7.0, 7.0), (2.0, 7.0), (2.0, 2.0)]);
        let dots = scanline_fill(&[square], 20.0, 20.0);
        assert_eq!(dots.len(), 100);
        assert!(dots.iter().all(|&(x, y)| (2.0..=7.0).contains(&x) && (2.0..=7.0).contains(&y)));
    }

    #[test]
    fn holes_stay_empty() {
        let outer = ring(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (0.0, 0.0)]);
        let hole = ring(&[(4.0, 4.0), (6.0, 4.0), (6.0, 6.0), (4.0, 6.0), (4.0, 4.0)]);
        let dots = scanline_fill(&[outer, hole], 20.0, 20.0);
        assert_eq!(dots.len(), 400 - 16);
        assert!(!dots.contains(&(5.25, 5.25)));
    }

    #[test]
    fn fill_is_clipped_to_viewport() {
        let big = ring(&[(-50.0, -50.0), (50.0, -50.0), (50.0, 50.0), (-50.0, 50.0)]);
        let dots = scanline_fill(&[big], 4.0, 2.0);
        assert_eq!(dots.len(), 8 * 4);
        assert!(dots.iter().all(|&(x, y)| (0.0..=4.0).contains(&x) && (0.0..=2.0).contains(&y)));
    }

    #[test]
    fn graticule_stays_on_the_disc() {
        let projection = Projection::new(
            Viewport::new(200.0, 100.0),
            ViewTransform { rotation: Rotation { lambda: 15.0, phi: -20.0 }, zoom: ZoomTransform::IDENTITY },
        );
        let ((cx, cy), r) = projection.limb();
        let segments = graticule(&projection);
        assert!(!segments.is_empty());
        for [a, b] in segments {
            assert!((a.0 - cx).hypot(a.1 - cy) <= r + 1e-6);
            assert!((b.0 - cx).hypot(b.1 - cy) <= r + 1e-6);
        }
    }
}
