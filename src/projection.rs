//! Orthographic globe projection with a rotation and a pan/zoom transform.
//!
//! Screen space has its origin at the top left with y pointing down. Angles
//! are stored in degrees; `lambda` spins around the polar axis and `phi`
//! tilts toward the viewer.

use geo::MultiPolygon;

/// Share of the smaller viewport side used as the globe radius.
const RADIUS_SHARE: f64 = 0.45;

/// Wraps a longitude into [-180, 180).
pub fn wrap_longitude(deg: f64) -> f64 {
    (deg + 180.0).rem_euclid(360.0) - 180.0
}

/// Signed shortest turn from `from` to `to`, in (-180, 180].
pub fn shortest_delta(from: f64, to: f64) -> f64 {
    let d = wrap_longitude(to - from);
    if d == -180.0 { 180.0 } else { d }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rotation {
    pub lambda: f64,
    pub phi: f64,
}

impl Rotation {
    pub const ZERO: Rotation = Rotation { lambda: 0.0, phi: 0.0 };

    /// The rotation that puts (`lon`, `lat`) at the center of the disc.
    pub fn centering(lon: f64, lat: f64) -> Self {
        Rotation { lambda: wrap_longitude(-lon), phi: (-lat).clamp(-90.0, 90.0) }
    }

    pub fn normalized(self) -> Self {
        Rotation { lambda: wrap_longitude(self.lambda), phi: self.phi.clamp(-90.0, 90.0) }
    }

    pub fn approx_eq(self, other: Rotation) -> bool {
        shortest_delta(self.lambda, other.lambda).abs() < 1e-6 && (self.phi - other.phi).abs() < 1e-6
    }
}

/// Pan/zoom applied after projection: `p' = (x + k * px, y + k * py)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ZoomTransform {
    pub k: f64,
    pub x: f64,
    pub y: f64,
}

impl ZoomTransform {
    pub const IDENTITY: ZoomTransform = ZoomTransform { k: 1.0, x: 0.0, y: 0.0 };

    pub fn apply(&self, (px, py): (f64, f64)) -> (f64, f64) {
        (self.x + self.k * px, self.y + self.k * py)
    }

    pub fn invert(&self, (sx, sy): (f64, f64)) -> (f64, f64) {
        ((sx - self.x) / self.k, (sy - self.y) / self.k)
    }

    /// Rescales about a fixed screen point, clamping `k` to `extent`.
    pub fn zoomed_at(&self, factor: f64, (fx, fy): (f64, f64), extent: (f64, f64)) -> Self {
        let k = (self.k * factor).clamp(extent.0, extent.1);
        let ratio = k / self.k;
        ZoomTransform { k, x: fx - (fx - self.x) * ratio, y: fy - (fy - self.y) * ratio }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width: width.max(1.0), height: height.max(1.0) }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.width / 2.0, self.height / 2.0)
    }

    pub fn radius(&self) -> f64 {
        self.width.min(self.height) * RADIUS_SHARE
    }

    pub fn contains(&self, (x, y): (f64, f64)) -> bool {
        x >= 0.0 && y >= 0.0 && x <= self.width && y <= self.height
    }
}

/// Rotation and zoom together: everything needed to place geometry.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransform {
    pub rotation: Rotation,
    pub zoom: ZoomTransform,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self { rotation: Rotation::ZERO, zoom: ZoomTransform::IDENTITY }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProjectedPoint {
    pub x: f64,
    pub y: f64,
    /// False for points on the far hemisphere. Their position is pushed out
    /// to the limb so fills stay closed.
    pub visible: bool,
}

/// A frozen projection. Every path of a frame is projected from one of these.
#[derive(Clone, Copy, Debug)]
pub struct Projection {
    view: ViewTransform,
    viewport: Viewport,
    cos_dphi: f64,
    sin_dphi: f64,
}

impl Projection {
    pub fn new(viewport: Viewport, view: ViewTransform) -> Self {
        let dphi = view.rotation.phi.to_radians();
        Self { view, viewport, cos_dphi: dphi.cos(), sin_dphi: dphi.sin() }
    }

    /// Same rotation, no pan/zoom.
    pub fn unzoomed(&self) -> Self {
        Self { view: ViewTransform { zoom: ZoomTransform::IDENTITY, ..self.view }, ..*self }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Limb circle in screen space: center and radius.
    pub fn limb(&self) -> ((f64, f64), f64) {
        let center = self.view.zoom.apply(self.viewport.center());
        (center, self.viewport.radius() * self.view.zoom.k)
    }

    /// Rotated spherical coordinates in radians.
    fn rotate(&self, lon: f64, lat: f64) -> (f64, f64) {
        let lambda = (lon + self.view.rotation.lambda).to_radians();
        let phi = lat.to_radians();
        let cos_phi = phi.cos();
        let x = lambda.cos() * cos_phi;
        let y = lambda.sin() * cos_phi;
        let z = phi.sin();
        let k = z * self.cos_dphi + x * self.sin_dphi;
        (y.atan2(x * self.cos_dphi - z * self.sin_dphi), k.clamp(-1.0, 1.0).asin())
    }

    pub fn project(&self, lon: f64, lat: f64) -> ProjectedPoint {
        let (lambda, phi) = self.rotate(lon, lat);
        let cos_phi = phi.cos();
        let mut px = cos_phi * lambda.sin();
        let mut py = phi.sin();
        let visible = cos_phi * lambda.cos() >= 0.0;
        if !visible {
            let len = px.hypot(py);
            if len > 0.0 {
                px /= len;
                py /= len;
            }
        }
        let (cx, cy) = self.viewport.center();
        let r = self.viewport.radius();
        let (x, y) = self.view.zoom.apply((cx + r * px, cy - r * py));
        ProjectedPoint { x, y, visible }
    }

    /// Screen point back to (lon, lat), or `None` off the disc.
    pub fn invert(&self, sx: f64, sy: f64) -> Option<(f64, f64)> {
        if !self.viewport.contains((sx, sy)) {
            return None;
        }
        let (ux, uy) = self.view.zoom.invert((sx, sy));
        let (cx, cy) = self.viewport.center();
        let r = self.viewport.radius();
        let px = (ux - cx) / r;
        let py = (cy - uy) / r;
        let rho2 = px * px + py * py;
        if rho2 > 1.0 {
            return None;
        }
        let lambda = px.atan2((1.0 - rho2).sqrt());
        let phi = py.clamp(-1.0, 1.0).asin();

        let cos_phi = phi.cos();
        let x = lambda.cos() * cos_phi;
        let y = lambda.sin() * cos_phi;
        let z = phi.sin();
        let lon = y.atan2(x * self.cos_dphi + z * self.sin_dphi).to_degrees();
        let lat = (z * self.cos_dphi - x * self.sin_dphi).clamp(-1.0, 1.0).asin().to_degrees();
        Some((wrap_longitude(lon - self.view.rotation.lambda), lat))
    }

    /// Projects every ring of `shape`: exteriors and holes alike.
    pub fn project_shape(&self, shape: &MultiPolygon<f64>) -> Vec<Vec<ProjectedPoint>> {
        shape
            .0
            .iter()
            .flat_map(|poly| std::iter::once(poly.exterior()).chain(poly.interiors()))
            .map(|ring| ring.0.iter().map(|c| self.project(c.x, c.y)).collect())
            .collect()
    }

    /// Screen bounds of the visible part of `shape`: `[min, max]`.
    pub fn bounds(&self, shape: &MultiPolygon<f64>) -> Option<[(f64, f64); 2]> {
        let mut out: Option<[(f64, f64); 2]> = None;
        for ring in self.project_shape(shape) {
            for p in ring.into_iter().filter(|p| p.visible) {
                let b = out.get_or_insert([(p.x, p.y), (p.x, p.y)]);
                b[0] = (b[0].0.min(p.x), b[0].1.min(p.y));
                b[1] = (b[1].0.max(p.x), b[1].1.max(p.y));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    const EPS: f64 = 1e-9;

    fn close(a: (f64, f64), b: (f64, f64)) -> bool {
        (a.0 - b.0).abs() < 1e-6 && (a.1 - b.1).abs() < 1e-6
    }

    fn projection(rotation: Rotation) -> Projection {
        Projection::new(
            Viewport::new(200.0, 100.0),
            ViewTransform { rotation, zoom: ZoomTransform::IDENTITY },
        )
    }

    #[test]
    fn longitude_wrapping() {
        assert!((wrap_longitude(190.0) + 170.0).abs() < EPS);
        assert!((wrap_longitude(-190.0) - 170.0).abs() < EPS);
        assert!((wrap_longitude(180.0) + 180.0).abs() < EPS);
        assert!((shortest_delta(170.0, -170.0) - 20.0).abs() < EPS);
        assert!((shortest_delta(-170.0, 170.0) + 20.0).abs() < EPS);
        assert_eq!(shortest_delta(0.0, 180.0), 180.0);
    }

    #[test]
    fn centering_rotation_puts_point_in_the_middle() {
        for (lon, lat) in [(-51.9, -14.2), (139.7, 35.7), (0.0, 0.0), (-179.0, 64.0)] {
            let p = projection(Rotation::centering(lon, lat)).project(lon, lat);
            assert!(p.visible);
            assert!(close((p.x, p.y), (100.0, 50.0)), "{lon},{lat} -> {p:?}");
        }
    }

    #[test]
    fn north_is_up_and_east_is_right() {
        let proj = projection(Rotation::ZERO);
        let north = proj.project(0.0, 30.0);
        let east = proj.project(30.0, 0.0);
        assert!(north.y < 50.0);
        assert!(east.x > 100.0);
    }

    #[test]
    fn far_side_is_hidden_and_clamped_to_limb() {
        let proj = projection(Rotation::ZERO);
        let p = proj.project(170.0, 10.0);
        assert!(!p.visible);
        let ((cx, cy), r) = proj.limb();
        assert!(((p.x - cx).hypot(p.y - cy) - r).abs() < 1e-6);
    }

    #[test]
    fn invert_undoes_project() {
        let rotation = Rotation { lambda: 40.0, phi: -25.0 };
        let zoom = ZoomTransform { k: 2.0, x: -60.0, y: -20.0 };
        let proj = Projection::new(Viewport::new(200.0, 100.0), ViewTransform { rotation, zoom });
        for (lon, lat) in [(-40.0, 25.0), (-20.0, 30.0), (-50.0, 20.0)] {
            let p = proj.project(lon, lat);
            assert!(p.visible);
            let back = proj.invert(p.x, p.y).unwrap();
            assert!(close(back, (lon, lat)), "{lon},{lat} -> {back:?}");
        }
    }

    #[test]
    fn invert_outside_disc_is_none() {
        let proj = projection(Rotation::ZERO);
        assert_eq!(proj.invert(1.0, 1.0), None);
        assert_eq!(proj.invert(-5.0, 50.0), None);
        assert_eq!(proj.invert(500.0, 50.0), None);
    }

    #[test]
    fn zoom_about_point_keeps_point_fixed() {
        let z = ZoomTransform::IDENTITY.zoomed_at(2.0, (40.0, 30.0), (0.5, 8.0));
        assert!(close(z.apply((40.0, 30.0)), (40.0, 30.0)));
        assert_eq!(z.k, 2.0);
        let clamped = z.zoomed_at(100.0, (0.0, 0.0), (0.5, 8.0));
        assert_eq!(clamped.k, 8.0);
    }

    #[test]
    fn bounds_cover_visible_points() {
        let square = polygon![(x: -10.0, y: -10.0), (x: 10.0, y: -10.0), (x: 10.0, y: 10.0), (x: -10.0, y: 10.0)];
        let shape = MultiPolygon(vec![square]);
        let [min, max] = projection(Rotation::ZERO).bounds(&shape).unwrap();
        assert!(min.0 < 100.0 && max.0 > 100.0);
        assert!(min.1 < 50.0 && max.1 > 50.0);
        assert!(((min.0 + max.0) / 2.0 - 100.0).abs() < 1e-6);
    }
}
