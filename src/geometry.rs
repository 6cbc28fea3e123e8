use anyhow::{Context, Result, bail};
use geo::{Area, BoundingRect, Centroid, Contains, Geometry, LineString, MultiPolygon, Point, Polygon, Rect};
use geojson::{GeoJson, feature::Id};
use serde_json::{Map, Value};
use std::{
    fs,
    path::PathBuf,
    sync::mpsc::{self, Receiver},
    thread,
    time::Duration,
};

use crate::topology;

/// Parts smaller than this share of the largest part are left out of the focus
/// geometry used for centering and zoom-to-fit.
const FOCUS_AREA_SHARE: f64 = 0.20;

const NAME_KEYS: [&str; 5] = ["name", "NAME", "ADMIN", "name_long", "formal_en"];
const CODE_KEYS: [&str; 5] = ["ISO_A3", "iso_a3", "ADM0_A3", "adm0_a3", "ISO3166-1-Alpha-3"];

/// A country boundary in lon/lat degrees.
#[derive(Clone, Debug)]
pub struct GeoFeature {
    pub name: String,
    pub code: Option<String>,
    pub shape: MultiPolygon<f64>,
    /// Main landmass parts of `shape`.
    pub focus: MultiPolygon<f64>,
    pub bounds: Option<Rect<f64>>,
}

impl GeoFeature {
    pub fn new(name: String, code: Option<String>, shape: MultiPolygon<f64>) -> Self {
        let focus = focus_parts(&shape);
        let bounds = shape.bounding_rect();
        Self { name, code, shape, focus, bounds }
    }

    /// Area-weighted centroid on the sphere, so parts split by the antimeridian
    /// and rings around a pole land where the country is.
    pub fn centroid(&self) -> Option<Point<f64>> {
        spherical_centroid(&self.focus)
            .or_else(|| spherical_centroid(&self.shape))
            .or_else(|| self.shape.centroid())
    }

    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        let p = Point::new(lon, lat);
        match self.bounds {
            Some(b) if lon < b.min().x || lon > b.max().x || lat < b.min().y || lat > b.max().y => false,
            Some(_) => self.shape.contains(&p),
            None => false,
        }
    }
}

type Vec3 = [f64; 3];

fn unit_vector(lon: f64, lat: f64) -> Vec3 {
    let (lambda, phi) = (lon.to_radians(), lat.to_radians());
    [phi.cos() * lambda.cos(), phi.cos() * lambda.sin(), phi.sin()]
}

fn cross(a: Vec3, b: Vec3) -> Vec3 {
    [a[1] * b[2] - a[2] * b[1], a[2] * b[0] - a[0] * b[2], a[0] * b[1] - a[1] * b[0]]
}

fn dot(a: Vec3, b: Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn norm(a: Vec3) -> f64 {
    dot(a, a).sqrt()
}

fn add(a: Vec3, b: Vec3, weight: f64) -> Vec3 {
    [a[0] + b[0] * weight, a[1] + b[1] * weight, a[2] + b[2] * weight]
}

/// First moment of the spherical region bounded by `ring`, up to a constant.
/// Points into the region regardless of winding.
fn ring_moment(ring: &LineString<f64>) -> Vec3 {
    let points: Vec<Vec3> = ring.0.iter().map(|c| unit_vector(c.x, c.y)).collect();
    let mut moment = [0.0; 3];
    let mut mean = [0.0; 3];
    for pair in points.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let n = cross(a, b);
        let len = norm(n);
        mean = add(mean, a, 1.0);
        if len < 1e-12 {
            continue;
        }
        moment = add(moment, n, len.atan2(dot(a, b)) / len);
    }
    if dot(moment, mean) < 0.0 { moment.map(|v| -v) } else { moment }
}

fn spherical_centroid(shape: &MultiPolygon<f64>) -> Option<Point<f64>> {
    let mut sum = [0.0; 3];
    for poly in &shape.0 {
        sum = add(sum, ring_moment(poly.exterior()), 1.0);
        for hole in poly.interiors() {
            sum = add(sum, ring_moment(hole), -1.0);
        }
    }
    let len = norm(sum);
    if len < 1e-12 {
        return None;
    }
    let lon = sum[1].atan2(sum[0]).to_degrees();
    let lat = (sum[2] / len).clamp(-1.0, 1.0).asin().to_degrees();
    Some(Point::new(lon, lat))
}

/// Drops small fragments when a country has several parts.
fn focus_parts(shape: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    if shape.0.len() <= 1 {
        return shape.clone();
    }
    let areas: Vec<f64> = shape.0.iter().map(|p| p.unsigned_area()).collect();
    let max_area = areas.iter().cloned().fold(0.0, f64::max);
    let threshold = max_area * FOCUS_AREA_SHARE;
    let kept: Vec<Polygon<f64>> = shape
        .0
        .iter()
        .zip(areas)
        .filter(|(_, area)| *area >= threshold)
        .map(|(poly, _)| poly.clone())
        .collect();
    if kept.is_empty() { shape.clone() } else { MultiPolygon(kept) }
}

/// First non-empty value among `keys`; `-99` is the Natural Earth placeholder.
fn string_property(props: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| props.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty() && *s != "-99")
        .map(str::to_string)
}

/// Builds a feature from raw properties. Non-areal geometry is skipped.
pub(crate) fn build_feature(
    props: &Map<String, Value>,
    id: Option<&str>,
    geometry: Geometry<f64>,
) -> Option<GeoFeature> {
    let shape = match geometry {
        Geometry::Polygon(p) => MultiPolygon(vec![p]),
        Geometry::MultiPolygon(m) => m,
        _ => return None,
    };
    let name = string_property(props, &NAME_KEYS).unwrap_or_default();
    let code = string_property(props, &CODE_KEYS)
        .or_else(|| {
            id.map(str::trim)
                .filter(|s| s.len() == 3 && s.chars().all(|c| c.is_ascii_alphabetic()))
                .map(str::to_string)
        });
    Some(GeoFeature::new(name, code, shape))
}

/// Parses a GeoJSON FeatureCollection or a TopoJSON Topology.
pub fn parse_geometry(bytes: &[u8]) -> Result<Vec<GeoFeature>> {
    let value: Value = serde_json::from_slice(bytes).context("geometry is not valid JSON")?;

    if value.get("type").and_then(Value::as_str) == Some("Topology") {
        let decoded = topology::decode(value)?;
        return Ok(decoded
            .into_iter()
            .filter_map(|d| build_feature(&d.properties, d.id.as_deref(), d.geometry))
            .collect());
    }

    let fc = match GeoJson::from_json_value(value)? {
        GeoJson::FeatureCollection(fc) => fc,
        GeoJson::Feature(f) => geojson::FeatureCollection {
            bbox: None,
            features: vec![f],
            foreign_members: None,
        },
        GeoJson::Geometry(_) => bail!("expected features, found a bare geometry"),
    };

    let empty = Map::new();
    let mut features = Vec::with_capacity(fc.features.len());
    for feature in fc.features {
        let Some(gj) = feature.geometry else { continue };
        let geom: Geometry<f64> = match gj.value.try_into() {
            Ok(g) => g,
            Err(e) => {
                tracing::warn!(error = %e, "skipping feature with unreadable geometry");
                continue;
            }
        };
        let id = feature.id.map(|id| match id {
            Id::String(s) => s,
            Id::Number(n) => n.to_string(),
        });
        let props = feature.properties.as_ref().unwrap_or(&empty);
        if let Some(f) = build_feature(props, id.as_deref(), geom) {
            features.push(f);
        }
    }
    Ok(features)
}

/// Where boundaries come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GeometrySource {
    Url(String),
    File(PathBuf),
}

impl GeometrySource {
    pub fn parse(s: &str) -> Self {
        if s.starts_with("http://") || s.starts_with("https://") {
            GeometrySource::Url(s.to_string())
        } else {
            GeometrySource::File(PathBuf::from(s))
        }
    }

    fn fetch(&self) -> Result<Vec<u8>> {
        match self {
            GeometrySource::File(path) => {
                fs::read(path).with_context(|| format!("reading geometry from {}", path.display()))
            }
            GeometrySource::Url(url) => {
                let client = reqwest::blocking::Client::builder()
                    .user_agent(concat!("forest-globe/", env!("CARGO_PKG_VERSION")))
                    .timeout(Duration::from_secs(30))
                    .build()?;
                let body = client
                    .get(url)
                    .send()
                    .and_then(|r| r.error_for_status())
                    .and_then(|r| r.bytes())
                    .with_context(|| format!("fetching geometry from {url}"))?;
                Ok(body.to_vec())
            }
        }
    }

    pub fn load(&self) -> Result<Vec<GeoFeature>> {
        let bytes = self.fetch()?;
        let features = parse_geometry(&bytes)?;
        if features.is_empty() {
            bail!("geometry contains no polygon features");
        }
        Ok(features)
    }
}

/// Loads the geometry on a background thread. The single result arrives on
/// the returned channel.
pub fn spawn_loader(source: GeometrySource) -> Result<Receiver<Result<Vec<GeoFeature>>>> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("geometry-loader".into())
        .spawn(move || {
            tracing::info!(?source, "loading geometry");
            let result = source.load();
            match &result {
                Ok(features) => tracing::info!(features = features.len(), "geometry loaded"),
                Err(e) => tracing::warn!(error = %format!("{e:#}"), "geometry load failed"),
            }
            // The receiver is gone only when the app is shutting down.
            let _ = tx.send(result);
        })
        .context("spawning geometry loader")?;
    Ok(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const COLLECTION: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "id": "FRA",
             "properties": {"ADMIN": "France", "ISO_A3": "-99"},
             "geometry": {"type": "MultiPolygon", "coordinates": [
                [[[-5, 42], [8, 42], [8, 51], [-5, 51], [-5, 42]]],
                [[[-54, 2], [-52, 2], [-52, 5], [-54, 5], [-54, 2]]]
             ]}},
            {"type": "Feature",
             "properties": {"name": "Iceland", "iso_a3": "ISL"},
             "geometry": {"type": "Polygon", "coordinates":
                [[[-24, 63], [-13, 63], [-13, 67], [-24, 67], [-24, 63]]]}},
            {"type": "Feature", "properties": {"name": "A point"},
             "geometry": {"type": "Point", "coordinates": [0, 0]}},
            {"type": "Feature", "properties": {"name": "Nothing"}, "geometry": null}
        ]
    }"#;

    #[test]
    fn parses_feature_collection() {
        let features = parse_geometry(COLLECTION.as_bytes()).unwrap();
        let names: Vec<&str> = features.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["France", "Iceland"]);
        // -99 falls back to the feature id.
        assert_eq!(features[0].code.as_deref(), Some("FRA"));
        assert_eq!(features[1].code.as_deref(), Some("ISL"));
    }

    #[test]
    fn focus_drops_overseas_fragments() {
        let features = parse_geometry(COLLECTION.as_bytes()).unwrap();
        let france = &features[0];
        assert_eq!(france.shape.0.len(), 2);
        assert_eq!(france.focus.0.len(), 1);
        let c = france.centroid().unwrap();
        assert!((c.x() - 1.5).abs() < 1e-6, "{c:?}");
        assert!((c.y() - 46.5).abs() < 0.5, "{c:?}");
    }

    fn lon_lat_box(lon: (f64, f64), lat: (f64, f64)) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![(lon.0, lat.0), (lon.1, lat.0), (lon.1, lat.1), (lon.0, lat.1), (lon.0, lat.0)]),
            vec![],
        )
    }

    #[test]
    fn centroid_of_small_box_is_near_its_middle() {
        let f = GeoFeature::new("Box".into(), None, MultiPolygon(vec![lon_lat_box((20.0, 30.0), (10.0, 20.0))]));
        let c = f.centroid().unwrap();
        assert!((c.x() - 25.0).abs() < 1e-6, "{c:?}");
        assert!((c.y() - 15.0).abs() < 0.5, "{c:?}");

        // Winding does not matter.
        let mut reversed = lon_lat_box((20.0, 30.0), (10.0, 20.0));
        reversed.exterior_mut(|ring| ring.0.reverse());
        let r = GeoFeature::new("Box".into(), None, MultiPolygon(vec![reversed])).centroid().unwrap();
        assert!((r.x() - c.x()).abs() < 1e-9 && (r.y() - c.y()).abs() < 1e-9);
    }

    #[test]
    fn centroid_across_antimeridian_stays_on_it() {
        let shape = MultiPolygon(vec![
            lon_lat_box((170.0, 180.0), (0.0, 10.0)),
            lon_lat_box((-180.0, -170.0), (0.0, 10.0)),
        ]);
        let c = GeoFeature::new("Split".into(), None, shape).centroid().unwrap();
        assert!(c.x().abs() > 179.0, "{c:?}");
        assert!(c.y() > 0.0 && c.y() < 10.0, "{c:?}");
    }

    #[test]
    fn centroid_of_polar_cap_is_near_the_pole() {
        let ring: Vec<(f64, f64)> = (0..=36).map(|i| (-180.0 + 10.0 * i as f64, -70.0)).collect();
        let cap = Polygon::new(LineString::from(ring), vec![]);
        let c = GeoFeature::new("Cap".into(), None, MultiPolygon(vec![cap])).centroid().unwrap();
        assert!(c.y() < -85.0, "{c:?}");
    }

    #[test]
    fn hole_pulls_centroid_away() {
        let mut with_hole = lon_lat_box((0.0, 20.0), (0.0, 10.0));
        with_hole.interiors_push(LineString::from(vec![
            (1.0, 1.0), (9.0, 1.0), (9.0, 9.0), (1.0, 9.0), (1.0, 1.0),
        ]));
        let c = GeoFeature::new("Ring".into(), None, MultiPolygon(vec![with_hole])).centroid().unwrap();
        assert!(c.x() > 11.0, "{c:?}");
    }

    #[test]
    fn point_in_feature() {
        let features = parse_geometry(COLLECTION.as_bytes()).unwrap();
        assert!(features[1].contains(-18.0, 65.0));
        assert!(!features[1].contains(0.0, 65.0));
        assert!(features[0].contains(-53.0, 3.0));
    }

    #[test]
    fn rejects_bare_geometry() {
        let bare = r#"{"type": "Point", "coordinates": [0, 0]}"#;
        assert!(parse_geometry(bare.as_bytes()).is_err());
        assert!(parse_geometry(b"not json").is_err());
    }

    #[test]
    fn source_kind_from_string() {
        assert_eq!(
            GeometrySource::parse("https://example.org/world.geojson"),
            GeometrySource::Url("https://example.org/world.geojson".into())
        );
        assert_eq!(
            GeometrySource::parse("data/world.geojson"),
            GeometrySource::File(PathBuf::from("data/world.geojson"))
        );
    }

    #[test]
    fn missing_file_is_an_error() {
        let source = GeometrySource::File(PathBuf::from("does/not/exist.geojson"));
        assert!(source.load().is_err());
    }
}
