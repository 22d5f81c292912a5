//! Core library for the `skywatch` city watcher.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Abstraction over the weather provider, with an OpenWeather implementation
//! - The polling manager: city registry, bounded history, per-city schedules
//!
//! It is used by `skywatch-cli`, but can also be reused by other binaries or services.

pub mod config;
pub mod error;
pub mod history;
pub mod manager;
pub mod model;
pub mod provider;
pub mod registry;

pub use config::{Config, ManagerConfig};
pub use error::WeatherError;
pub use manager::{ManagerEvent, WeatherManager};
pub use model::{
    City, CityId, CitySuggestion, CurrentConditions, ForecastEntry, HistoryEntry, Reading,
};
pub use provider::{WeatherProvider, openweather::OpenWeatherProvider};
