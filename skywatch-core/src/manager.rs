use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::{
    config::ManagerConfig,
    error::WeatherError,
    history::HistoryBuffer,
    model::{City, CityId, CitySuggestion, CurrentConditions, ForecastEntry, HistoryEntry, Reading},
    provider::{MIN_QUERY_LEN, WeatherProvider},
    registry::CityRegistry,
};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Notifications emitted by the manager.
///
/// Subscribe via [`WeatherManager::subscribe`]; hosts that want plain logs
/// can rely on the `tracing` output instead.
#[derive(Debug, Clone)]
pub enum ManagerEvent {
    /// A city entered the watch set.
    CityAdded { id: CityId, name: String },
    /// A fetch (interactive or scheduled) refreshed a city's reading.
    ReadingUpdated {
        id: CityId,
        name: String,
        reading: Reading,
    },
    /// A scheduled refresh failed; the schedule keeps running.
    RefreshFailed {
        id: CityId,
        name: String,
        error: String,
    },
    CityRemoved { id: CityId },
    /// Everything was cleared by [`WeatherManager::reset_all`].
    Cleared,
}

struct State {
    registry: CityRegistry,
    history: HistoryBuffer,
    schedules: HashMap<CityId, JoinHandle<()>>,
}

struct Inner {
    provider: Arc<dyn WeatherProvider>,
    config: ManagerConfig,
    state: Mutex<State>,
    events: broadcast::Sender<ManagerEvent>,
}

/// Tracks a set of watched cities: latest reading per city, a bounded
/// rolling history, and one recurring refresh task per city.
///
/// All state sits behind a single coarse mutex, so registry, history and
/// schedule bookkeeping always mutate together. Poll tasks hold only a
/// weak reference to the shared state: dropping the manager (or calling
/// [`reset_all`](Self::reset_all)) stops them.
#[derive(Clone)]
pub struct WeatherManager {
    inner: Arc<Inner>,
}

impl WeatherManager {
    pub fn new(provider: Arc<dyn WeatherProvider>, config: ManagerConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let state = Mutex::new(State {
            registry: CityRegistry::new(),
            history: HistoryBuffer::new(config.history_capacity, config.history_min_gap()),
            schedules: HashMap::new(),
        });

        Self {
            inner: Arc::new(Inner {
                provider,
                config,
                state,
                events,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ManagerEvent> {
        self.inner.events.subscribe()
    }

    /// Fetch current conditions for `name` and fold them into the watch
    /// set: a new city id gets a registry entry, an empty history series
    /// and a recurring refresh schedule; a known id only has its latest
    /// reading refreshed (and a gated history append applied).
    ///
    /// On failure the error is returned and no state changes.
    pub async fn add_or_refresh_city(&self, name: &str) -> Result<City, WeatherError> {
        let conditions = self.inner.fetch_current(name).await?;

        let mut state = self.inner.lock_state();
        let (city, created) = self.inner.apply_reading(&mut state, &conditions);
        if created {
            self.inner
                .start_schedule(&mut state, city.id, city.name.clone());
        }
        Ok(city)
    }

    /// Stop watching `id`. Idempotent: unknown ids are a no-op.
    pub fn remove_city(&self, id: CityId) {
        let mut state = self.inner.lock_state();
        // cancel-before-clear: no late tick may resurrect this city
        if let Some(handle) = state.schedules.remove(&id) {
            handle.abort();
        }
        let removed = state.registry.remove(id);
        state.history.remove(id);
        drop(state);

        if removed {
            debug!(city_id = id, "city removed");
            let _ = self.inner.events.send(ManagerEvent::CityRemoved { id });
        }
    }

    /// Stop every schedule and clear registry and history.
    pub fn reset_all(&self) {
        let mut state = self.inner.lock_state();
        for (_, handle) in state.schedules.drain() {
            handle.abort();
        }
        state.registry.clear();
        state.history.clear();
        drop(state);

        debug!("manager reset");
        let _ = self.inner.events.send(ManagerEvent::Cleared);
    }

    /// Watched cities in insertion order, each with its latest reading.
    pub fn current_cities(&self) -> Vec<City> {
        self.inner.lock_state().registry.cities().to_vec()
    }

    /// Retained samples for `id`, oldest first; empty for unknown ids.
    pub fn history(&self, id: CityId) -> Vec<HistoryEntry> {
        self.inner.lock_state().history.entries(id)
    }

    /// Number of cities with a running refresh schedule.
    pub fn active_schedules(&self) -> usize {
        self.inner.lock_state().schedules.len()
    }

    /// City-name suggestions for `query`.
    ///
    /// Queries shorter than two characters return an empty list without a
    /// network call; adapter failures degrade to an empty list as well,
    /// since suggestions are advisory.
    pub async fn search_cities(&self, query: &str) -> Vec<CitySuggestion> {
        let trimmed = query.trim();
        if trimmed.chars().count() < MIN_QUERY_LEN {
            return Vec::new();
        }

        let timeout = self.inner.config.request_timeout();
        match time::timeout(timeout, self.inner.provider.search(trimmed)).await {
            Ok(Ok(suggestions)) => suggestions,
            Ok(Err(err)) => {
                warn!(query = trimmed, error = %err, "city search failed");
                Vec::new()
            }
            Err(_) => {
                warn!(query = trimmed, "city search timed out");
                Vec::new()
            }
        }
    }

    /// Short-term forecast pass-through for `name`.
    pub async fn forecast(&self, name: &str) -> Result<Vec<ForecastEntry>, WeatherError> {
        let timeout = self.inner.config.request_timeout();
        time::timeout(timeout, self.inner.provider.forecast(name))
            .await
            .map_err(|_| WeatherError::Timeout(timeout))?
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn fetch_current(&self, name: &str) -> Result<CurrentConditions, WeatherError> {
        let timeout = self.config.request_timeout();
        time::timeout(timeout, self.provider.current(name))
            .await
            .map_err(|_| WeatherError::Timeout(timeout))?
    }

    /// Registry upsert plus gated history append for one successful fetch.
    /// Returns the updated city and whether it was newly created.
    fn apply_reading(&self, state: &mut State, conditions: &CurrentConditions) -> (City, bool) {
        let id = conditions.city_id;

        let created = state
            .registry
            .upsert(id, &conditions.city_name, conditions.reading.clone());
        if created {
            state.history.ensure(id);
            let _ = self.events.send(ManagerEvent::CityAdded {
                id,
                name: conditions.city_name.clone(),
            });
        }

        state
            .history
            .append(id, conditions.history_entry(), Instant::now());

        let _ = self.events.send(ManagerEvent::ReadingUpdated {
            id,
            name: conditions.city_name.clone(),
            reading: conditions.reading.clone(),
        });

        let city = state.registry.get(id).cloned().unwrap_or_else(|| City {
            id,
            name: conditions.city_name.clone(),
            latest: Some(conditions.reading.clone()),
        });
        (city, created)
    }

    /// Install the recurring refresh task for `id`, replacing any running
    /// one first so there is never more than one handle per city.
    fn start_schedule(self: &Arc<Self>, state: &mut State, id: CityId, name: String) {
        if let Some(handle) = state.schedules.remove(&id) {
            handle.abort();
        }

        let weak = Arc::downgrade(self);
        let period = self.config.poll_interval();
        let handle = tokio::spawn(async move {
            // the add that started this schedule already fetched once, so
            // the first tick comes a full period later
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else { return };
                inner.refresh_tick(id, &name).await;
            }
        });

        state.schedules.insert(id, handle);
        debug!(city_id = id, ?period, "schedule started");
    }

    /// One scheduled refresh. Failures are reported and swallowed: a bad
    /// tick must never stop future ticks.
    async fn refresh_tick(&self, id: CityId, name: &str) {
        match self.fetch_current(name).await {
            Ok(conditions) => {
                let mut state = self.lock_state();
                // a removal may have won the race against this fetch, and
                // the provider may have re-resolved the name; either way
                // this tick must not write for a city it does not own
                if conditions.city_id != id || !state.registry.contains(id) {
                    return;
                }
                self.apply_reading(&mut state, &conditions);
            }
            Err(err) => {
                warn!(city_id = id, city = name, error = %err, "scheduled refresh failed");
                let _ = self.events.send(ManagerEvent::RefreshFailed {
                    id,
                    name: name.to_string(),
                    error: err.to_string(),
                });
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self
            .state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        for handle in state.schedules.values() {
            handle.abort();
        }
    }
}
