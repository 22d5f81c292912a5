use crate::model::{City, CityId, Reading};

/// The set of currently watched cities, insertion-ordered.
///
/// Lookup is always by provider id, never by name: the remote search can
/// resolve name variants ("Warsaw", "Warszawa") to the same city, and a
/// second fetch for an id already present must only refresh its latest
/// reading.
#[derive(Debug, Default)]
pub struct CityRegistry {
    cities: Vec<City>,
}

impl CityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new city, or overwrite the latest reading of an existing
    /// one in place. Returns `true` when the entry was newly created.
    pub fn upsert(&mut self, id: CityId, name: &str, reading: Reading) -> bool {
        if let Some(existing) = self.cities.iter_mut().find(|c| c.id == id) {
            existing.latest = Some(reading);
            false
        } else {
            self.cities.push(City {
                id,
                name: name.to_string(),
                latest: Some(reading),
            });
            true
        }
    }

    /// Delete the entry for `id`. Returns `false` (not an error) if absent.
    pub fn remove(&mut self, id: CityId) -> bool {
        let before = self.cities.len();
        self.cities.retain(|c| c.id != id);
        self.cities.len() != before
    }

    pub fn clear(&mut self) {
        self.cities.clear();
    }

    pub fn contains(&self, id: CityId) -> bool {
        self.cities.iter().any(|c| c.id == id)
    }

    pub fn get(&self, id: CityId) -> Option<&City> {
        self.cities.iter().find(|c| c.id == id)
    }

    pub fn cities(&self) -> &[City] {
        &self.cities
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(temp: f64) -> Reading {
        Reading {
            temperature_c: temp,
            humidity_pct: 50,
            icon: "01d".to_string(),
        }
    }

    #[test]
    fn upsert_creates_then_refreshes() {
        let mut registry = CityRegistry::new();

        assert!(registry.upsert(756135, "Warsaw", reading(7.0)));
        assert!(!registry.upsert(756135, "Warszawa", reading(8.5)));

        assert_eq!(registry.len(), 1);
        let city = registry.get(756135).expect("city must exist");
        // the original name sticks; only the reading is replaced
        assert_eq!(city.name, "Warsaw");
        assert_eq!(city.latest.as_ref().map(|r| r.temperature_c), Some(8.5));
    }

    #[test]
    fn insertion_order_is_preserved() {
        let mut registry = CityRegistry::new();
        registry.upsert(2, "B", reading(1.0));
        registry.upsert(1, "A", reading(2.0));
        registry.upsert(3, "C", reading(3.0));

        let ids: Vec<_> = registry.cities().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut registry = CityRegistry::new();
        registry.upsert(1, "A", reading(1.0));

        assert!(registry.remove(1));
        assert!(!registry.remove(1));
        assert!(registry.is_empty());
    }

    #[test]
    fn clear_drops_everything() {
        let mut registry = CityRegistry::new();
        registry.upsert(1, "A", reading(1.0));
        registry.upsert(2, "B", reading(2.0));

        registry.clear();
        assert!(registry.is_empty());
        assert!(!registry.contains(1));
    }
}
