use crate::{
    color::{ColorMode, NO_DATA, Rgb},
    data::{RecordId, StatRecord, StatsTable, Year, normalize_code},
    geometry::GeoFeature,
};

/// Which rule joined a feature to its record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchStrategy {
    Code,
    Name,
    Partial,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CountryMatch {
    pub record: RecordId,
    pub strategy: MatchStrategy,
}

/// Lowercase, keep ASCII letters, digits and single spaces.
pub fn normalize_name(name: &str) -> String {
    let kept: String = name
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace())
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolves a feature against the table: code, then exact name, then
/// containment in either direction. First success wins.
pub fn find_match(feature: &GeoFeature, table: &StatsTable) -> Option<CountryMatch> {
    if let Some(code) = feature.code.as_deref().map(normalize_code).filter(|c| !c.is_empty()) {
        if let Some(record) = table.by_code(&code) {
            return Some(CountryMatch { record, strategy: MatchStrategy::Code });
        }
    }

    let name = normalize_name(&feature.name);
    if name.is_empty() {
        return None;
    }

    if let Some(record) = table.by_name(&name) {
        return Some(CountryMatch { record, strategy: MatchStrategy::Name });
    }

    table
        .normalized()
        .find(|(_, candidate)| {
            !candidate.is_empty() && (candidate.contains(name.as_str()) || name.contains(candidate))
        })
        .map(|(record, _)| CountryMatch { record, strategy: MatchStrategy::Partial })
}

/// A boundary joined to its statistics, with its current fill.
#[derive(Clone, Debug)]
pub struct EnrichedFeature {
    pub feature: GeoFeature,
    pub record: Option<RecordId>,
    pub fill: Rgb,
}

impl EnrichedFeature {
    pub fn record<'t>(&self, table: &'t StatsTable) -> Option<&'t StatRecord> {
        self.record.and_then(|id| table.get(id))
    }
}

/// Joins every feature once; unmatched features keep `record: None`.
pub fn join(features: Vec<GeoFeature>, table: &StatsTable) -> Vec<EnrichedFeature> {
    let mut matched = 0usize;
    let enriched: Vec<EnrichedFeature> = features
        .into_iter()
        .map(|feature| {
            let found = find_match(&feature, table);
            match found {
                Some(m) => {
                    matched += 1;
                    if m.strategy == MatchStrategy::Partial {
                        tracing::debug!(feature = %feature.name, record = ?m.record, "partial name match");
                    }
                }
                None => tracing::debug!(
                    feature = %feature.name,
                    code = feature.code.as_deref().unwrap_or("-"),
                    "no statistics match"
                ),
            }
            EnrichedFeature { feature, record: found.map(|m| m.record), fill: NO_DATA }
        })
        .collect();

    tracing::info!(
        features = enriched.len(),
        matched,
        unmatched = enriched.len() - matched,
        "geometry joined with statistics"
    );
    enriched
}

/// Recomputes fills for the displayed year and scale. Geometry is untouched.
pub fn recolor(features: &mut [EnrichedFeature], table: &StatsTable, year: Year, mode: ColorMode) {
    for f in features {
        let value = f.record(table).and_then(|r| mode.value_of(r, year));
        f.fill = mode.color(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::StatRecord;
    use geo::{MultiPolygon, polygon};
    use pretty_assertions::assert_eq;

    fn record(code: &str, name: &str, v2000: Option<f64>) -> StatRecord {
        StatRecord {
            code: normalize_code(code),
            name: name.to_string(),
            region: None,
            forest_2000: v2000,
            forest_2020: v2000,
            trend: v2000.map(|_| 0.0),
            lat: None,
            lng: None,
            extra: Default::default(),
        }
    }

    fn feature(name: &str, code: Option<&str>) -> GeoFeature {
        let square = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)];
        GeoFeature::new(name.to_string(), code.map(str::to_string), MultiPolygon(vec![square]))
    }

    fn table() -> StatsTable {
        StatsTable::from_records(vec![
            record("usa", "United States", Some(33.9)),
            record("NER", "Niger", Some(0.9)),
            record("NGA", "Nigeria", Some(7.2)),
            record("GRL", "Greenland", Some(0.0)),
            record("CIV", "Côte d'Ivoire", Some(8.9)),
        ])
    }

    #[test]
    fn name_normalization() {
        assert_eq!(normalize_name("  Bosnia and   Herzegovina "), "bosnia and herzegovina");
        assert_eq!(normalize_name("Côte d'Ivoire"), "cte divoire");
        assert_eq!(normalize_name("Timor-Leste"), "timorleste");
        let once = normalize_name("S. Sudan");
        assert_eq!(normalize_name(&once), once);
    }

    #[test]
    fn code_match_ignores_case() {
        let table = table();
        let found = find_match(&feature("Whatever", Some("USA")), &table).unwrap();
        assert_eq!(found, CountryMatch { record: RecordId(0), strategy: MatchStrategy::Code });
    }

    #[test]
    fn exact_name_beats_containment() {
        let table = table();
        let found = find_match(&feature("NIGER", None), &table).unwrap();
        assert_eq!(found, CountryMatch { record: RecordId(1), strategy: MatchStrategy::Name });
    }

    #[test]
    fn containment_match_in_either_direction() {
        let table = table();
        let found = find_match(&feature("United States of America", Some("-99")), &table).unwrap();
        assert_eq!(found, CountryMatch { record: RecordId(0), strategy: MatchStrategy::Partial });

        let found = find_match(&feature("Greenl", None), &table).unwrap();
        assert_eq!(found.record, RecordId(3));
    }

    #[test]
    fn containment_ties_go_to_table_order() {
        let table = table();
        // "nige" is contained in both Niger and Nigeria.
        let found = find_match(&feature("Nige", None), &table).unwrap();
        assert_eq!(found.record, RecordId(1));
    }

    #[test]
    fn diacritics_normalize_on_both_sides() {
        let table = table();
        let found = find_match(&feature("Côte d'Ivoire", None), &table).unwrap();
        assert_eq!(found.strategy, MatchStrategy::Name);
    }

    #[test]
    fn no_match_is_distinct_from_zero_forest() {
        let table = table();
        assert_eq!(find_match(&feature("Atlantis", None), &table), None);
        assert_eq!(find_match(&feature("", None), &table), None);

        let greenland = find_match(&feature("Greenland", None), &table).unwrap();
        assert_eq!(table.get(greenland.record).unwrap().forest_2000, Some(0.0));
    }

    #[test]
    fn join_and_recolor() {
        let table = table();
        let mut joined = join(
            vec![feature("Greenland", Some("GRL")), feature("Atlantis", None)],
            &table,
        );
        assert_eq!(joined[0].record, Some(RecordId(3)));
        assert_eq!(joined[1].record, None);

        recolor(&mut joined, &table, Year::Y2000, ColorMode::Coverage);
        assert_eq!(joined[0].fill, ColorMode::Coverage.color(Some(0.0)));
        assert_eq!(joined[1].fill, NO_DATA);
    }
}
