//! TopoJSON decoding into plain polygon geometry.
//!
//! Arcs may be quantized (delta-encoded integers plus a `transform`). A
//! negative arc index `i` refers to arc `!i` traversed in reverse.

use anyhow::{Context, Result, bail};
use geo::{Coord, Geometry, LineString, MultiPolygon, Polygon};
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
struct Topology {
    #[serde(default)]
    transform: Option<Transform>,
    arcs: Vec<Vec<Vec<f64>>>,
    objects: Map<String, Value>,
}

#[derive(Clone, Copy, Debug, Deserialize)]
struct Transform {
    scale: [f64; 2],
    translate: [f64; 2],
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum TopoGeometry {
    GeometryCollection {
        geometries: Vec<TopoGeometry>,
    },
    Polygon {
        arcs: Vec<Vec<i64>>,
        #[serde(default)]
        properties: Option<Map<String, Value>>,
        #[serde(default)]
        id: Option<Value>,
    },
    MultiPolygon {
        arcs: Vec<Vec<Vec<i64>>>,
        #[serde(default)]
        properties: Option<Map<String, Value>>,
        #[serde(default)]
        id: Option<Value>,
    },
    #[serde(other)]
    Unsupported,
}

/// One areal object of the topology.
#[derive(Debug)]
pub struct DecodedFeature {
    pub properties: Map<String, Value>,
    pub id: Option<String>,
    pub geometry: Geometry<f64>,
}

/// Decodes the `countries` object, or the first object when that is absent.
pub fn decode(value: Value) -> Result<Vec<DecodedFeature>> {
    let mut topology: Topology = serde_json::from_value(value).context("malformed topology")?;

    let object = match topology.objects.remove("countries") {
        Some(o) => o,
        None => match topology.objects.into_iter().next() {
            Some((_, o)) => o,
            None => bail!("topology has no objects"),
        },
    };
    let root: TopoGeometry = serde_json::from_value(object).context("malformed topology object")?;

    let arcs = absolute_arcs(&topology.arcs, topology.transform);
    let mut out = Vec::new();
    collect(root, &arcs, &mut out)?;
    Ok(out)
}

fn absolute_arcs(arcs: &[Vec<Vec<f64>>], transform: Option<Transform>) -> Vec<Vec<Coord<f64>>> {
    arcs.iter()
        .map(|arc| {
            let positions = arc.iter().filter(|p| p.len() >= 2);
            match transform {
                Some(t) => {
                    let (mut x, mut y) = (0.0, 0.0);
                    positions
                        .map(|p| {
                            x += p[0];
                            y += p[1];
                            Coord {
                                x: x * t.scale[0] + t.translate[0],
                                y: y * t.scale[1] + t.translate[1],
                            }
                        })
                        .collect()
                }
                None => positions.map(|p| Coord { x: p[0], y: p[1] }).collect(),
            }
        })
        .collect()
}

fn ring(indices: &[i64], arcs: &[Vec<Coord<f64>>]) -> Result<LineString<f64>> {
    let mut coords: Vec<Coord<f64>> = Vec::new();
    for &index in indices {
        let (arc_index, reversed) = if index < 0 { (!index as usize, true) } else { (index as usize, false) };
        let Some(arc) = arcs.get(arc_index) else {
            bail!("arc index {index} out of range ({} arcs)", arcs.len());
        };
        let points: Box<dyn Iterator<Item = &Coord<f64>>> =
            if reversed { Box::new(arc.iter().rev()) } else { Box::new(arc.iter()) };
        // Consecutive arcs share their joining point.
        let skip = usize::from(!coords.is_empty());
        coords.extend(points.skip(skip).copied());
    }
    Ok(LineString::new(coords))
}

fn polygon(rings: &[Vec<i64>], arcs: &[Vec<Coord<f64>>]) -> Result<Option<Polygon<f64>>> {
    let mut built = rings.iter().map(|r| ring(r, arcs));
    let Some(exterior) = built.next().transpose()? else {
        return Ok(None);
    };
    let interiors = built.collect::<Result<Vec<_>>>()?;
    Ok(Some(Polygon::new(exterior, interiors)))
}

fn id_string(id: Option<Value>) -> Option<String> {
    match id? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn collect(geometry: TopoGeometry, arcs: &[Vec<Coord<f64>>], out: &mut Vec<DecodedFeature>) -> Result<()> {
    match geometry {
        TopoGeometry::GeometryCollection { geometries } => {
            for g in geometries {
                collect(g, arcs, out)?;
            }
        }
        TopoGeometry::Polygon { arcs: rings, properties, id } => {
            if let Some(p) = polygon(&rings, arcs)? {
                out.push(DecodedFeature {
                    properties: properties.unwrap_or_default(),
                    id: id_string(id),
                    geometry: Geometry::Polygon(p),
                });
            }
        }
        TopoGeometry::MultiPolygon { arcs: parts, properties, id } => {
            let mut polygons = Vec::with_capacity(parts.len());
            for rings in &parts {
                if let Some(p) = polygon(rings, arcs)? {
                    polygons.push(p);
                }
            }
            out.push(DecodedFeature {
                properties: properties.unwrap_or_default(),
                id: id_string(id),
                geometry: Geometry::MultiPolygon(MultiPolygon(polygons)),
            });
        }
        TopoGeometry::Unsupported => {}
    }
    Ok(())
}
