use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provider-assigned city identifier.
///
/// This is the dedup key everywhere in this crate: two different query
/// strings ("Warsaw", "Warszawa") can resolve to the same id and must not
/// produce two entries.
pub type CityId = i64;

/// One snapshot of conditions for a city at fetch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub temperature_c: f64,
    pub humidity_pct: u8,
    /// Provider icon code, e.g. "04d".
    pub icon: String,
}

/// A watched city and its latest known reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct City {
    pub id: CityId,
    pub name: String,
    pub latest: Option<Reading>,
}

/// One retained sample in a city's rolling time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub observed_at: DateTime<Utc>,
    pub temperature_c: f64,
    pub humidity_pct: u8,
}

/// One hit from the provider's city search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitySuggestion {
    pub id: CityId,
    pub name: String,
    pub country: String,
}

/// One future sample from the short-term forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastEntry {
    pub time: DateTime<Utc>,
    pub temperature_c: f64,
    pub humidity_pct: u8,
}

/// What the provider returns for one current-weather fetch: the resolved
/// city identity plus its reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub city_id: CityId,
    pub city_name: String,
    pub observed_at: DateTime<Utc>,
    pub reading: Reading,
}

impl CurrentConditions {
    /// The history sample derived from this fetch.
    pub fn history_entry(&self) -> HistoryEntry {
        HistoryEntry {
            observed_at: self.observed_at,
            temperature_c: self.reading.temperature_c,
            humidity_pct: self.reading.humidity_pct,
        }
    }
}
