use std::sync::Arc;

use tracing::{debug, warn};

use crate::{geocode::GeocodingProvider, model::Region};

/// Substring rules applied to a geocoder display name. The first rule with a
/// matching keyword wins, so the order here is significant.
const REGION_RULES: &[(Region, &[&str])] = &[
    (Region::Europe, &["Europe"]),
    (Region::Asia, &["Asia", "Middle East"]),
    (Region::America, &["North America", "South America", "America"]),
    (Region::Africa, &["Africa"]),
    (Region::Oceania, &["Australia", "Oceania"]),
];

/// Region for a free-text location descriptor.
pub fn region_from_display_name(display_name: &str) -> Region {
    REGION_RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| display_name.contains(k)))
        .map(|(region, _)| *region)
        .unwrap_or(Region::Unknown)
}

#[derive(Debug, Clone)]
pub struct RegionClassifier {
    geocoder: Arc<dyn GeocodingProvider>,
}

impl RegionClassifier {
    pub fn new(geocoder: Arc<dyn GeocodingProvider>) -> Self {
        Self { geocoder }
    }

    /// Never fails: lookup errors and empty results classify as `Unknown`.
    pub async fn classify(&self, city: &str) -> Region {
        match self.geocoder.display_name(city).await {
            Ok(Some(name)) => {
                let region = region_from_display_name(&name);
                debug!(city, display_name = %name, %region, "classified city");
                region
            }
            Ok(None) => {
                debug!(city, "geocoder returned no result");
                Region::Unknown
            }
            Err(e) => {
                warn!(city, error = %e, "error getting region");
                Region::Unknown
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::error::ProviderError;

    #[test]
    fn keyword_table() {
        let cases = [
            ("Berlin, Germany, Europe", Region::Europe),
            ("Tokyo, Japan, Asia", Region::Asia),
            ("Dubai, United Arab Emirates, Middle East", Region::Asia),
            ("Lima, Peru, South America", Region::America),
            ("New York, United States of America", Region::America),
            ("Nairobi, Kenya, Africa", Region::Africa),
            ("Sydney, New South Wales, Australia", Region::Oceania),
            ("Suva, Fiji, Oceania", Region::Oceania),
            ("Київ, Україна", Region::Unknown),
            ("", Region::Unknown),
        ];
        for (name, expected) in cases {
            assert_eq!(region_from_display_name(name), expected, "{name}");
        }
    }

    #[test]
    fn earlier_rules_win_overlaps() {
        assert_eq!(region_from_display_name("Istanbul, Europe, Asia"), Region::Europe);
        assert_eq!(region_from_display_name("Cairo, Africa, Middle East"), Region::Asia);
        assert_eq!(region_from_display_name("Central African Republic, America"), Region::America);
    }

    #[test]
    fn matching_is_case_sensitive() {
        assert_eq!(region_from_display_name("somewhere in europe"), Region::Unknown);
    }

    #[derive(Debug)]
    enum Fixed {
        Name(&'static str),
        Nothing,
        Fail,
    }

    #[async_trait]
    impl GeocodingProvider for Fixed {
        async fn display_name(&self, _city: &str) -> Result<Option<String>, ProviderError> {
            match self {
                Fixed::Name(n) => Ok(Some(n.to_string())),
                Fixed::Nothing => Ok(None),
                Fixed::Fail => Err(ProviderError::MissingField("display_name")),
            }
        }
    }

    #[tokio::test]
    async fn classify_maps_lookup_outcomes() {
        let europe = RegionClassifier::new(Arc::new(Fixed::Name("Paris, France, Europe")));
        assert_eq!(europe.classify("Paris").await, Region::Europe);

        let none = RegionClassifier::new(Arc::new(Fixed::Nothing));
        assert_eq!(none.classify("Atlantis").await, Region::Unknown);

        let failing = RegionClassifier::new(Arc::new(Fixed::Fail));
        assert_eq!(failing.classify("Paris").await, Region::Unknown);
    }
}
