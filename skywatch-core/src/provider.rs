use crate::{
    error::WeatherError,
    model::{CitySuggestion, CurrentConditions, ForecastEntry},
};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod openweather;

/// Shortest query string worth sending to the provider's city search.
pub const MIN_QUERY_LEN: usize = 2;

/// Maximum number of samples returned by [`WeatherProvider::forecast`].
pub const FORECAST_SAMPLES: usize = 5;

/// Abstraction over the remote weather provider.
///
/// The manager only talks to this trait; the CLI injects
/// [`openweather::OpenWeatherProvider`], tests inject doubles.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    /// Resolve `city_name` and fetch its current conditions.
    async fn current(&self, city_name: &str) -> Result<CurrentConditions, WeatherError>;

    /// Search cities matching `query`.
    ///
    /// Fails with [`WeatherError::InvalidQuery`] for queries shorter than
    /// [`MIN_QUERY_LEN`] characters. The manager pre-filters such queries
    /// and never forwards them; implementations still guard their own
    /// contract so direct callers get a typed error instead of a remote
    /// rejection.
    async fn search(&self, query: &str) -> Result<Vec<CitySuggestion>, WeatherError>;

    /// Short-term forecast for `city_name`: at most [`FORECAST_SAMPLES`]
    /// future samples, nearest first.
    async fn forecast(&self, city_name: &str) -> Result<Vec<ForecastEntry>, WeatherError>;
}
