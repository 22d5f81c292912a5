use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use chrono::Local;
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;

use skywatch_core::{
    Config, ManagerEvent, OpenWeatherProvider, Reading, WeatherManager, WeatherProvider,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "skywatch", version, about = "City weather watcher")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeather API key.
    Configure,

    /// Show current weather for a city.
    Current {
        /// City name, e.g. "Warsaw".
        city: String,
    },

    /// Show the short-term forecast for a city.
    Forecast {
        city: String,
    },

    /// Search city names.
    Search {
        query: String,
    },

    /// Watch one or more cities, refreshing on a schedule until Ctrl-C.
    Watch {
        /// City names to watch.
        #[arg(required = true)]
        cities: Vec<String>,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Current { city } => current(&city).await,
            Command::Forecast { city } => forecast(&city).await,
            Command::Search { query } => search(&query).await,
            Command::Watch { cities } => watch(cities).await,
        }
    }
}

fn provider_from_config(config: &Config) -> Result<OpenWeatherProvider> {
    let api_key = config.api_key().ok_or_else(|| {
        anyhow!(
            "No API key configured.\n\
             Hint: run `skywatch configure` and enter your OpenWeather API key."
        )
    })?;

    OpenWeatherProvider::new(api_key.to_owned(), config.manager.request_timeout())
        .context("Failed to build HTTP client")
}

fn configure() -> Result<()> {
    let mut config = Config::load()?;

    let api_key = inquire::Password::new("OpenWeather API key:")
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    config.set_api_key(api_key);
    config.save()?;

    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

fn print_reading(name: &str, id: i64, reading: &Reading) {
    println!(
        "[{}] {name} (#{id}): {:>5.1} °C, {}% humidity ({})",
        Local::now().format("%H:%M:%S"),
        reading.temperature_c,
        reading.humidity_pct,
        reading.icon,
    );
}

async fn current(city: &str) -> Result<()> {
    let config = Config::load()?;
    let provider = provider_from_config(&config)?;

    let conditions = provider.current(city).await?;
    println!(
        "{} (#{}) at {}",
        conditions.city_name,
        conditions.city_id,
        conditions.observed_at.format("%Y-%m-%d %H:%M UTC"),
    );
    println!(
        "  {:>5.1} °C, {}% humidity ({})",
        conditions.reading.temperature_c, conditions.reading.humidity_pct, conditions.reading.icon,
    );
    Ok(())
}

async fn forecast(city: &str) -> Result<()> {
    let config = Config::load()?;
    let provider = provider_from_config(&config)?;

    let samples = provider.forecast(city).await?;
    if samples.is_empty() {
        println!("No forecast available for {city}.");
        return Ok(());
    }

    println!("Forecast for {city}:");
    for sample in samples {
        println!(
            "  {}  {:>5.1} °C, {}% humidity",
            sample.time.format("%a %H:%M"),
            sample.temperature_c,
            sample.humidity_pct,
        );
    }
    Ok(())
}

async fn search(query: &str) -> Result<()> {
    let config = Config::load()?;
    let provider = Arc::new(provider_from_config(&config)?);
    let manager = WeatherManager::new(provider, config.manager.clone());

    let hits = manager.search_cities(query).await;
    if hits.is_empty() {
        println!("No matching cities.");
        return Ok(());
    }

    for hit in hits {
        println!("  {} ({}) — #{}", hit.name, hit.country, hit.id);
    }
    Ok(())
}

async fn watch(cities: Vec<String>) -> Result<()> {
    let config = Config::load()?;
    let provider = Arc::new(provider_from_config(&config)?);
    let manager = WeatherManager::new(provider, config.manager.clone());
    let mut events = manager.subscribe();

    for city in &cities {
        match manager.add_or_refresh_city(city).await {
            Ok(added) => println!("watching {} (#{})", added.name, added.id),
            Err(err) => eprintln!("skipping '{city}': {err}"),
        }
    }
    if manager.current_cities().is_empty() {
        bail!("no city could be added");
    }

    println!(
        "refreshing every {:?}; press Ctrl-C to stop",
        config.manager.poll_interval()
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(ManagerEvent::ReadingUpdated { id, name, reading }) => {
                    print_reading(&name, id, &reading);
                }
                Ok(ManagerEvent::RefreshFailed { name, error, .. }) => {
                    eprintln!("refresh failed for {name}: {error}");
                }
                Ok(_) => {}
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            },
        }
    }

    manager.reset_all();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_watch_with_multiple_cities() {
        let cli = Cli::try_parse_from(["skywatch", "watch", "Warsaw", "Lviv"]).expect("must parse");
        match cli.command {
            Command::Watch { cities } => assert_eq!(cities, vec!["Warsaw", "Lviv"]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn watch_requires_at_least_one_city() {
        assert!(Cli::try_parse_from(["skywatch", "watch"]).is_err());
    }

    #[test]
    fn parses_search() {
        let cli = Cli::try_parse_from(["skywatch", "search", "War"]).expect("must parse");
        assert!(matches!(cli.command, Command::Search { query } if query == "War"));
    }
}
