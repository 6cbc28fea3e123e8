use clap::Parser;
use std::{path::PathBuf, time::Duration};

use crate::{data::Year, engine::EngineConfig, geometry::GeometrySource};

pub const DEFAULT_GEOMETRY_URL: &str =
    "https://raw.githubusercontent.com/datasets/geo-countries/master/data/countries.geojson";

#[derive(Parser, Debug)]
#[command(author, version, about = "Terminal globe of forest coverage by country")]
pub struct Config {
    /// Forest statistics JSON
    #[arg(long, default_value = "data/forest_density.json")]
    pub stats: PathBuf,

    /// Country boundaries: http(s) URL or file path, GeoJSON or TopoJSON
    #[arg(long, default_value = DEFAULT_GEOMETRY_URL)]
    pub geometry: String,

    /// Year shown at startup (2000 or 2020)
    #[arg(long, default_value = "2020", value_parser = parse_year)]
    pub year: Year,

    /// Log file; the terminal is taken by the UI
    #[arg(long, default_value = "forest-globe.log")]
    pub log_file: PathBuf,

    /// Idle spin in degrees per second
    #[arg(long, default_value_t = 6.25)]
    pub rotation_speed: f64,

    /// Degrees of rotation per unit of pointer travel
    #[arg(long, default_value_t = 0.5)]
    pub drag_sensitivity: f64,

    /// Frame tick in milliseconds
    #[arg(long, default_value_t = 16)]
    pub tick_ms: u64,
}

fn parse_year(s: &str) -> Result<Year, String> {
    let year: u16 = s.trim().parse().map_err(|e| format!("{s:?}: {e}"))?;
    Year::from_u16(year).ok_or_else(|| format!("no data for {year}; use 2000 or 2020"))
}

impl Config {
    pub fn geometry_source(&self) -> GeometrySource {
        GeometrySource::parse(&self.geometry)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            rotation_speed: self.rotation_speed,
            drag_sensitivity: self.drag_sensitivity,
            ..EngineConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let config = Config::parse_from(["forest-globe"]);
        assert_eq!(config.stats, PathBuf::from("data/forest_density.json"));
        assert_eq!(config.year, Year::Y2020);
        assert_eq!(config.geometry_source(), GeometrySource::Url(DEFAULT_GEOMETRY_URL.into()));
        assert_eq!(config.engine_config(), EngineConfig::default());
        assert_eq!(config.tick(), Duration::from_millis(16));
    }

    #[test]
    fn flags_override() {
        let config = Config::parse_from([
            "forest-globe",
            "--year",
            "2000",
            "--geometry",
            "world.topojson",
            "--rotation-speed",
            "0",
        ]);
        assert_eq!(config.year, Year::Y2000);
        assert_eq!(config.geometry_source(), GeometrySource::File("world.topojson".into()));
        assert_eq!(config.engine_config().rotation_speed, 0.0);
    }

    #[test]
    fn rejects_unknown_year() {
        assert!(Config::try_parse_from(["forest-globe", "--year", "2010"]).is_err());
        assert!(Config::try_parse_from(["forest-globe", "--year", "soon"]).is_err());
    }
}
