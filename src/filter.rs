use crate::data::{StatRecord, Year};

pub const FULL_RANGE: (f64, f64) = (0.0, 100.0);

/// Side panel filters. They only decide which features are drawn dimmed.
#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    pub search: String,
    pub region: Option<String>,
    /// Inclusive coverage bounds in percent.
    pub range: (f64, f64),
}

impl Default for Filter {
    fn default() -> Self {
        Self { search: String::new(), region: None, range: FULL_RANGE }
    }
}

impl Filter {
    pub fn is_active(&self) -> bool {
        !self.search.trim().is_empty() || self.region.is_some() || self.range != FULL_RANGE
    }

    /// Moves one bound by `step`, keeping `lo <= hi` inside [0, 100].
    pub fn nudge(&mut self, lower: bool, step: f64) {
        let (lo, hi) = self.range;
        self.range = if lower {
            ((lo + step).clamp(FULL_RANGE.0, hi), hi)
        } else {
            (lo, (hi + step).clamp(lo, FULL_RANGE.1))
        };
    }

    /// Whether a feature passes every active filter.
    pub fn admits(&self, feature_name: &str, record: Option<&StatRecord>, year: Year) -> bool {
        let needle = self.search.trim().to_lowercase();
        if !needle.is_empty() {
            let hit = feature_name.to_lowercase().contains(&needle)
                || record.is_some_and(|r| r.name.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }

        if let Some(region) = &self.region {
            if record.and_then(|r| r.region.as_deref()) != Some(region.as_str()) {
                return false;
            }
        }

        if self.range != FULL_RANGE {
            let Some(value) = record.and_then(|r| r.value(year)) else {
                return false;
            };
            if value < self.range.0 || value > self.range.1 {
                return false;
            }
        }
        true
    }
}
