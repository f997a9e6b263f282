//! API key selection for a rate limited provider.
//!
//! Selection is a pure function of the pool and either a random source or a
//! rotation counter. The mutable part lives in a [`KeyCursor`] that each job
//! creates for itself and passes to the fetcher explicitly.

use std::sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
};

use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyRotation {
    #[default]
    Random,
    RoundRobin,
}

pub fn select_random<'a, R: Rng + ?Sized>(keys: &'a [String], rng: &mut R) -> Option<&'a str> {
    keys.choose(rng).map(String::as_str)
}

pub fn select_round_robin(keys: &[String], counter: usize) -> Option<&str> {
    if keys.is_empty() {
        return None;
    }
    keys.get(counter % keys.len()).map(String::as_str)
}

/// Per-job rotation state.
#[derive(Debug)]
pub enum KeyCursor {
    Random(Mutex<StdRng>),
    RoundRobin(AtomicUsize),
}

impl KeyCursor {
    pub fn new(rotation: KeyRotation) -> Self {
        match rotation {
            KeyRotation::Random => KeyCursor::Random(Mutex::new(StdRng::from_entropy())),
            KeyRotation::RoundRobin => KeyCursor::RoundRobin(AtomicUsize::new(0)),
        }
    }

    /// Reproducible random cursor.
    pub fn seeded(seed: u64) -> Self {
        KeyCursor::Random(Mutex::new(StdRng::seed_from_u64(seed)))
    }

    pub fn next<'a>(&self, keys: &'a [String]) -> Option<&'a str> {
        match self {
            KeyCursor::Random(rng) => {
                let mut rng = rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                select_random(keys, &mut *rng)
            }
            KeyCursor::RoundRobin(counter) => {
                if keys.is_empty() {
                    return None;
                }
                select_round_robin(keys, counter.fetch_add(1, Ordering::Relaxed))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn pool(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("KEY{i}")).collect()
    }

    #[test]
    fn empty_pool_never_yields_a_key() {
        let keys = pool(0);
        assert_eq!(select_round_robin(&keys, 3), None);
        assert_eq!(select_random(&keys, &mut StdRng::seed_from_u64(1)), None);
        assert_eq!(KeyCursor::new(KeyRotation::Random).next(&keys), None);
        assert_eq!(KeyCursor::new(KeyRotation::RoundRobin).next(&keys), None);
    }

    #[test]
    fn round_robin_cycles_in_order() {
        let keys = pool(3);
        let cursor = KeyCursor::new(KeyRotation::RoundRobin);
        let picked: Vec<_> = (0..6).map(|_| cursor.next(&keys).unwrap()).collect();
        assert_eq!(picked, ["KEY0", "KEY1", "KEY2", "KEY0", "KEY1", "KEY2"]);
    }

    #[test]
    fn random_visits_every_key() {
        for n in 1..=5 {
            let keys = pool(n);
            let cursor = KeyCursor::seeded(42);
            let seen: HashSet<_> = (0..200).map(|_| cursor.next(&keys).unwrap()).collect();
            assert_eq!(seen.len(), n);
        }
    }

    #[test]
    fn separate_cursors_do_not_share_state() {
        let keys = pool(2);
        let a = KeyCursor::new(KeyRotation::RoundRobin);
        let b = KeyCursor::new(KeyRotation::RoundRobin);
        assert_eq!(a.next(&keys), Some("KEY0"));
        assert_eq!(b.next(&keys), Some("KEY0"));
        assert_eq!(a.next(&keys), Some("KEY1"));
    }

    #[test]
    fn rotation_parses_from_toml_names() {
        #[derive(Deserialize)]
        struct Wrap {
            rotation: KeyRotation,
        }
        let w: Wrap = toml::from_str("rotation = \"round_robin\"").unwrap();
        assert_eq!(w.rotation, KeyRotation::RoundRobin);
    }
}
