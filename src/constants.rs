use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use strum::{Display, EnumString};

/// Approximate circumference of the Earth in meters.
pub const EARTH_CIRCUMFERENCE: f64 = 40_000_000.0;

/// Hash value reserved for [`AccuracyClass::None`], distinct from every finite ceiling.
const NONE_HASH: u64 = u32::MAX as u64;

/// Where a piece of location information came from. The names are used in metrics.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ObservationSource {
    /// Internal crowd-sourced data.
    #[default]
    Internal,
    /// Data from an external fallback service.
    Fallback,
    /// GeoIP database.
    Geoip,
}

/// Coarse accuracy tier of a position estimate.
///
/// Each class carries a ceiling in meters. Classes compare against each
/// other and against raw numbers using that ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum AccuracyClass {
    /// Probably Bluetooth or WiFi based.
    High,
    /// Probably cell based.
    Medium,
    /// Large cell, cell area or GeoIP.
    Low,
    /// No accuracy at all.
    None,
}

impl AccuracyClass {
    pub const ALL: [AccuracyClass; 4] = [
        AccuracyClass::High,
        AccuracyClass::Medium,
        AccuracyClass::Low,
        AccuracyClass::None,
    ];

    pub fn ceiling(&self) -> f64 {
        match self {
            AccuracyClass::High => 500.0,
            AccuracyClass::Medium => 50_000.0,
            AccuracyClass::Low => EARTH_CIRCUMFERENCE,
            AccuracyClass::None => f64::INFINITY,
        }
    }

    /// Smallest class whose ceiling is at least `num`.
    pub fn from_number(num: f64) -> AccuracyClass {
        Self::ALL
            .into_iter()
            .find(|class| num <= class.ceiling())
            .unwrap_or(AccuracyClass::None)
    }
}

impl Hash for AccuracyClass {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            AccuracyClass::None => NONE_HASH.hash(state),
            other => (other.ceiling() as u64).hash(state),
        }
    }
}

impl PartialOrd for AccuracyClass {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AccuracyClass {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ceiling().total_cmp(&other.ceiling())
    }
}

impl PartialEq<f64> for AccuracyClass {
    fn eq(&self, other: &f64) -> bool {
        self.ceiling() == *other
    }
}

impl PartialOrd<f64> for AccuracyClass {
    fn partial_cmp(&self, other: &f64) -> Option<Ordering> {
        self.ceiling().partial_cmp(other)
    }
}

impl PartialEq<AccuracyClass> for f64 {
    fn eq(&self, other: &AccuracyClass) -> bool {
        *self == other.ceiling()
    }
}

impl PartialOrd<AccuracyClass> for f64 {
    fn partial_cmp(&self, other: &AccuracyClass) -> Option<Ordering> {
        self.partial_cmp(&other.ceiling())
    }
}

#[cfg(test)]
mod test {
    use super::{AccuracyClass, ObservationSource, EARTH_CIRCUMFERENCE};
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    use std::str::FromStr;

    fn hash(class: AccuracyClass) -> u64 {
        let mut hasher = DefaultHasher::new();
        class.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn from_number() {
        assert_eq!(AccuracyClass::High, AccuracyClass::from_number(1.0));
        assert_eq!(AccuracyClass::High, AccuracyClass::from_number(500.0));
        assert_eq!(AccuracyClass::Medium, AccuracyClass::from_number(500.1));
        assert_eq!(AccuracyClass::Medium, AccuracyClass::from_number(50_000.0));
        assert_eq!(AccuracyClass::Low, AccuracyClass::from_number(50_000.1));
        assert_eq!(
            AccuracyClass::Low,
            AccuracyClass::from_number(EARTH_CIRCUMFERENCE)
        );
        assert_eq!(
            AccuracyClass::None,
            AccuracyClass::from_number(EARTH_CIRCUMFERENCE + 1.0)
        );
        assert_eq!(AccuracyClass::None, AccuracyClass::from_number(f64::INFINITY));
    }

    #[test]
    fn compare_to_class() {
        assert!(AccuracyClass::High < AccuracyClass::Medium);
        assert!(AccuracyClass::Medium < AccuracyClass::Low);
        assert!(AccuracyClass::Low < AccuracyClass::None);
        assert!(AccuracyClass::High < AccuracyClass::None);
        assert!(AccuracyClass::Low >= AccuracyClass::Low);
        assert!(AccuracyClass::None > AccuracyClass::High);
        assert!(AccuracyClass::Medium <= AccuracyClass::Medium);
    }

    #[test]
    fn compare_to_number() {
        assert!(AccuracyClass::High == 500.0);
        assert!(500.0_f64 == AccuracyClass::High);
        assert!(AccuracyClass::High != 501.0);
        assert!(AccuracyClass::High < 501.0);
        assert!(AccuracyClass::Medium > 500.0);
        assert!(AccuracyClass::Medium <= 50_000.0);
        assert!(AccuracyClass::Low >= 50_000.0);
        assert!(1000.0_f64 < AccuracyClass::Medium);
        assert!(AccuracyClass::None == f64::INFINITY);
        assert!(AccuracyClass::None > EARTH_CIRCUMFERENCE);
    }

    #[test]
    fn ordering_matches_numbers() {
        for a in AccuracyClass::ALL {
            for b in AccuracyClass::ALL {
                assert_eq!(a < b, a < b.ceiling());
                assert_eq!(a == b, a == b.ceiling());
            }
        }
    }

    #[test]
    fn hash_none_is_distinct() {
        let hashes: Vec<u64> = AccuracyClass::ALL.into_iter().map(hash).collect();
        for (i, a) in hashes.iter().enumerate() {
            for b in &hashes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn names() {
        assert_eq!("internal", ObservationSource::Internal.to_string());
        assert_eq!(
            ObservationSource::Geoip,
            ObservationSource::from_str("geoip").unwrap()
        );
        assert_eq!("none", AccuracyClass::None.to_string());
    }
}
