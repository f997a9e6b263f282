//! Fuzzy matching of user supplied city names against a known-city list.
//!
//! Scoring is on a 0..=100 scale and takes the best of a plain edit-distance
//! ratio, a token-sorted ratio and a token-set ratio, so that case, minor
//! misspellings and word order do not matter much.

use tracing::debug;

pub const DEFAULT_THRESHOLD: u8 = 80;

/// Token based scores are scaled down slightly so an exact full-string match
/// always outranks a subset match.
const TOKEN_SCALE: f64 = 0.95;

#[derive(Debug, Clone)]
pub struct CityNormalizer {
    known_cities: Vec<String>,
    threshold: u8,
}

impl CityNormalizer {
    pub fn new(known_cities: Vec<String>, threshold: u8) -> Self {
        Self {
            known_cities,
            threshold,
        }
    }

    /// Map raw input to a canonical city name.
    ///
    /// Returns `None` for blank input. A best match scoring above the threshold
    /// is returned as is; anything else passes through trimmed and unchanged.
    pub fn normalize(&self, raw: &str) -> Option<String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        match self.best_match(trimmed) {
            Some((city, score)) if score > self.threshold => {
                debug!(input = trimmed, matched = city, score, "normalized city");
                Some(city.to_string())
            }
            best => {
                debug!(input = trimmed, best = ?best, "no known city above threshold");
                Some(trimmed.to_string())
            }
        }
    }

    /// Highest scoring known city. Earlier entries win ties.
    pub fn best_match(&self, query: &str) -> Option<(&str, u8)> {
        let mut best: Option<(&str, u8)> = None;
        for city in &self.known_cities {
            let score = similarity(query, city);
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((city.as_str(), score));
            }
        }
        best
    }
}

/// Similarity of two strings on a 0..=100 scale.
pub fn similarity(a: &str, b: &str) -> u8 {
    let a = preprocess(a);
    let b = preprocess(b);
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let plain = ratio(&a, &b);
    let tokens = token_sort_ratio(&a, &b).max(token_set_ratio(&a, &b)) * TOKEN_SCALE;

    plain.max(tokens).round().clamp(0.0, 100.0) as u8
}

fn preprocess(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn ratio(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b) * 100.0
}

fn sorted_tokens(s: &str) -> Vec<&str> {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.dedup();
    tokens
}

fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&sorted_tokens(a).join(" "), &sorted_tokens(b).join(" "))
}

fn token_set_ratio(a: &str, b: &str) -> f64 {
    let ta = sorted_tokens(a);
    let tb = sorted_tokens(b);

    let common: Vec<&str> = ta.iter().filter(|t| tb.contains(*t)).copied().collect();
    let only_a: Vec<&str> = ta.iter().filter(|t| !tb.contains(*t)).copied().collect();
    let only_b: Vec<&str> = tb.iter().filter(|t| !ta.contains(*t)).copied().collect();

    let base = common.join(" ");
    let with_a = join_nonempty(&base, &only_a.join(" "));
    let with_b = join_nonempty(&base, &only_b.join(" "));

    let mut best = ratio(&with_a, &with_b);
    if !base.is_empty() {
        best = best.max(ratio(&base, &with_a)).max(ratio(&base, &with_b));
    }
    best
}

fn join_nonempty(a: &str, b: &str) -> String {
    match (a.is_empty(), b.is_empty()) {
        (true, _) => b.to_string(),
        (_, true) => a.to_string(),
        _ => format!("{a} {b}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> CityNormalizer {
        let cities = ["Kyiv", "London", "New York", "Tokyo", "Paris", "Berlin"]
            .iter()
            .map(|c| c.to_string())
            .collect();
        CityNormalizer::new(cities, DEFAULT_THRESHOLD)
    }

    #[test]
    fn blank_input_is_rejected() {
        let n = normalizer();
        assert_eq!(n.normalize(""), None);
        assert_eq!(n.normalize("   \t"), None);
    }

    #[test]
    fn exact_and_case_insensitive_matches() {
        let n = normalizer();
        assert_eq!(n.normalize("Kyiv").as_deref(), Some("Kyiv"));
        assert_eq!(n.normalize("  tokyo ").as_deref(), Some("Tokyo"));
        assert_eq!(n.normalize("NEW YORK").as_deref(), Some("New York"));
    }

    #[test]
    fn minor_misspelling_maps_to_known_city() {
        let n = normalizer();
        assert_eq!(n.normalize("Lndon").as_deref(), Some("London"));
        assert_eq!(n.normalize("Berlln").as_deref(), Some("Berlin"));
    }

    #[test]
    fn reordered_tokens_match() {
        let n = normalizer();
        assert_eq!(n.normalize("York New").as_deref(), Some("New York"));
    }

    #[test]
    fn below_threshold_passes_through_trimmed() {
        let n = normalizer();
        assert_eq!(n.normalize("  Atlantis ").as_deref(), Some("Atlantis"));
        assert_eq!(n.normalize("Reykjavik").as_deref(), Some("Reykjavik"));
    }

    #[test]
    fn threshold_is_strict() {
        // "Lndon" scores 83 against "London".
        assert_eq!(similarity("Lndon", "London"), 83);
        let strict = CityNormalizer::new(vec!["London".into()], 83);
        assert_eq!(strict.normalize("Lndon").as_deref(), Some("Lndon"));
        let loose = CityNormalizer::new(vec!["London".into()], 82);
        assert_eq!(loose.normalize("Lndon").as_deref(), Some("London"));
    }

    #[test]
    fn similarity_bounds() {
        assert_eq!(similarity("Paris", "paris"), 100);
        assert_eq!(similarity("", "Paris"), 0);
        assert!(similarity("Atlantis", "Paris") < DEFAULT_THRESHOLD);
    }

    #[test]
    fn empty_known_list_passes_everything_through() {
        let n = CityNormalizer::new(vec![], DEFAULT_THRESHOLD);
        assert_eq!(n.best_match("London"), None);
        assert_eq!(n.normalize("London").as_deref(), Some("London"));
    }

    #[test]
    fn deterministic_for_fixed_inputs() {
        let n = normalizer();
        for input in ["Lndon", "Atlantis", "pari", "Tokio"] {
            assert_eq!(n.normalize(input), n.normalize(input));
        }
    }
}
