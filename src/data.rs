use anyhow::{Context, Result, bail};
use serde::{Deserialize, Deserializer};
use serde_json::{Value, from_slice};
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt, fs,
    path::Path,
};

use crate::matcher::normalize_name;

/// Snapshot years present in the dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Year {
    Y2000,
    Y2020,
}

impl Year {
    pub fn as_u16(self) -> u16 {
        match self {
            Year::Y2000 => 2000,
            Year::Y2020 => 2020,
        }
    }

    pub fn from_u16(year: u16) -> Option<Self> {
        match year {
            2000 => Some(Year::Y2000),
            2020 => Some(Year::Y2020),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Year::Y2000 => Year::Y2020,
            Year::Y2020 => Year::Y2000,
        }
    }
}

impl fmt::Display for Year {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

/// Uppercase, trimmed country code.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Index of a record inside a [`StatsTable`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(pub usize);

/// One country's forest statistics.
#[derive(Clone, Debug, PartialEq)]
pub struct StatRecord {
    pub code: String,
    pub name: String,
    pub region: Option<String>,
    pub forest_2000: Option<f64>,
    pub forest_2020: Option<f64>,
    pub trend: Option<f64>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    /// Dataset columns outside the fixed field set.
    pub extra: BTreeMap<String, Value>,
}

impl StatRecord {
    pub fn value(&self, year: Year) -> Option<f64> {
        match year {
            Year::Y2000 => self.forest_2000,
            Year::Y2020 => self.forest_2020,
        }
    }

    /// Representative point as `14.2°S, 51.9°W`, when both coordinates are known.
    pub fn center_label(&self) -> Option<String> {
        let (lat, lng) = (self.lat?, self.lng?);
        let ns = if lat < 0.0 { 'S' } else { 'N' };
        let ew = if lng < 0.0 { 'W' } else { 'E' };
        Some(format!("{:.1}°{ns}, {:.1}°{ew}", lat.abs(), lng.abs()))
    }
}

/// Record shape as found in the bundled JSON.
#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(default)]
    country_code: String,
    #[serde(default)]
    country_name: String,
    #[serde(default)]
    region: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    forest_2000: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    forest_2020: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    forest_trend: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    lng: Option<f64>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

/// Numbers and numeric strings become `Some`, everything else `None`.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64().filter(|v| v.is_finite()),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    })
}

/// A published trend may be rounded to one decimal.
const TREND_TOLERANCE: f64 = 0.05 + 1e-9;

fn percentage(code: &str, field: &str, value: Option<f64>) -> Option<f64> {
    match value {
        Some(v) if (0.0..=100.0).contains(&v) => Some(v),
        Some(v) => {
            tracing::warn!(code, field, value = v, "percentage out of range, treated as missing");
            None
        }
        None => None,
    }
}

impl RawRecord {
    fn into_record(self) -> Result<StatRecord> {
        let code = normalize_code(&self.country_code);
        let forest_2000 = percentage(&code, "forest_2000", self.forest_2000);
        let forest_2020 = percentage(&code, "forest_2020", self.forest_2020);

        let derived = forest_2000.zip(forest_2020).map(|(a, b)| b - a);
        let trend = match (self.forest_trend, derived) {
            (Some(given), Some(derived)) => {
                if (given - derived).abs() > TREND_TOLERANCE {
                    bail!(
                        "trend for {code} is {given:.1} but 2020 - 2000 gives {derived:.1}"
                    );
                }
                Some(given)
            }
            (given, derived) => given.or(derived),
        };

        let region = self
            .region
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        Ok(StatRecord {
            code,
            name: self.country_name.trim().to_string(),
            region,
            forest_2000,
            forest_2020,
            trend,
            lat: self.lat,
            lng: self.lng,
            extra: self.extra,
        })
    }
}

/// Read-only statistics with code and name indexes.
#[derive(Debug, Default)]
pub struct StatsTable {
    records: Vec<StatRecord>,
    normalized_names: Vec<String>,
    by_code: HashMap<String, RecordId>,
    by_name: HashMap<String, RecordId>,
}

impl StatsTable {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)
            .with_context(|| format!("reading statistics from {}", path.display()))?;
        let table = Self::from_json(&bytes)
            .with_context(|| format!("parsing statistics from {}", path.display()))?;
        tracing::info!(records = table.len(), path = %path.display(), "statistics loaded");
        Ok(table)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let raw: Vec<RawRecord> = from_slice(bytes)?;
        let mut records = Vec::with_capacity(raw.len());
        for r in raw {
            if r.country_code.trim().is_empty() && r.country_name.trim().is_empty() {
                tracing::warn!("skipping record with neither code nor name");
                continue;
            }
            records.push(r.into_record()?);
        }
        Ok(Self::from_records(records))
    }

    pub fn from_records(records: Vec<StatRecord>) -> Self {
        let mut by_code = HashMap::with_capacity(records.len());
        let mut by_name = HashMap::with_capacity(records.len());
        let mut normalized_names = Vec::with_capacity(records.len());

        for (i, record) in records.iter().enumerate() {
            let id = RecordId(i);
            if !record.code.is_empty() {
                if let Some(first) = by_code.get(&record.code) {
                    tracing::warn!(code = %record.code, ?first, "duplicate country code, keeping first");
                } else {
                    by_code.insert(record.code.clone(), id);
                }
            }
            let name = normalize_name(&record.name);
            if !name.is_empty() {
                by_name.entry(name.clone()).or_insert(id);
            }
            normalized_names.push(name);
        }

        Self { records, normalized_names, by_code, by_name }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: RecordId) -> Option<&StatRecord> {
        self.records.get(id.0)
    }

    /// Looks up an already-normalized code.
    pub fn by_code(&self, code: &str) -> Option<RecordId> {
        self.by_code.get(code).copied()
    }

    /// Looks up an already-normalized name.
    pub fn by_name(&self, name: &str) -> Option<RecordId> {
        self.by_name.get(name).copied()
    }

    /// Records paired with their normalized names, in table order.
    pub fn normalized(&self) -> impl Iterator<Item = (RecordId, &str)> {
        self.normalized_names
            .iter()
            .enumerate()
            .map(|(i, n)| (RecordId(i), n.as_str()))
    }

    /// Distinct regions, sorted.
    pub fn regions(&self) -> Vec<String> {
        self.records
            .iter()
            .filter_map(|r| r.region.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
