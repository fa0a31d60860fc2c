//! Named counters for tracking storage events

use std::collections::BTreeMap;

/// Monotonic event counters keyed by static names.
///
/// Keys are kept sorted so `iter` yields a stable order for log output.
#[derive(Debug, Default, Clone)]
pub struct Counter {
    counters: BTreeMap<&'static str, u64>,
}

impl Counter {
    pub fn new() -> Self {
        Self {
            counters: BTreeMap::new(),
        }
    }

    pub fn increment(&mut self, name: &'static str, value: u64) {
        *self.counters.entry(name).or_insert(0) += value;
    }

    pub fn set(&mut self, name: &'static str, value: u64) {
        self.counters.insert(name, value);
    }

    pub fn get(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    pub fn reset_all(&mut self) {
        self.counters.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ {
        self.counters.iter().map(|(name, value)| (*name, *value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iterates_in_name_order() {
        let mut counter = Counter::new();
        counter.increment("entity_moves", 1);
        counter.increment("archetypes_created", 3);
        counter.increment("entity_moves", 2);
        let names: Vec<_> = counter.iter().collect();
        assert_eq!(names, vec![("archetypes_created", 3), ("entity_moves", 3)]);
    }
}
