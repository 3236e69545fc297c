//! The five-station line and journeys along it

use rand::Rng;
use std::fmt;

/// A station on the `A-B-C-D-E` line
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Station {
    A,
    B,
    C,
    D,
    E,
}

/// All stations in line order
pub const STATIONS: [Station; 5] = [Station::A, Station::B, Station::C, Station::D, Station::E];

impl Station {
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        STATIONS.get(index).copied()
    }

    /// Short ID used in requests and ledger keys
    pub fn id(self) -> &'static str {
        match self {
            Station::A => "A",
            Station::B => "B",
            Station::C => "C",
            Station::D => "D",
            Station::E => "E",
        }
    }

    /// Full name used in schedule segment keys
    pub fn name(self) -> &'static str {
        match self {
            Station::A => "Arena",
            Station::B => "Bridge",
            Station::C => "Cave",
            Station::D => "Dock",
            Station::E => "Edge",
        }
    }

    /// Accepts either the short ID or the full name
    pub fn parse(value: &str) -> Option<Self> {
        STATIONS
            .iter()
            .copied()
            .find(|station| station.id() == value || station.name() == value)
    }

    /// Adjacent station one step towards `to`
    pub fn step_towards(self, to: Station) -> Option<Station> {
        match self.index().cmp(&to.index()) {
            std::cmp::Ordering::Less => Station::from_index(self.index() + 1),
            std::cmp::Ordering::Greater => Station::from_index(self.index() - 1),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn distance(self, other: Station) -> u32 {
        self.index().abs_diff(other.index()) as u32
    }
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Schedule JSON key of a unit segment, e.g. `Arena->Bridge`
pub fn segment_key(from: Station, to: Station) -> String {
    format!("{}->{}", from.name(), to.name())
}

/// Unit legs travelled between `from` and `to`, in travel order
pub fn unit_sections(from: Station, to: Station) -> Vec<(Station, Station)> {
    let mut sections = Vec::with_capacity(from.distance(to) as usize);
    let mut current = from;
    while let Some(next) = current.step_towards(to) {
        sections.push((current, next));
        current = next;
    }
    sections
}

/// Expand a two-letter journey such as `AD` into `["AB", "BC", "CD"]`.
///
/// Anything that is not exactly two known station IDs expands to nothing.
pub fn expand_sections(from_to: &str) -> Vec<String> {
    let mut chars = from_to.chars();
    let (Some(from), Some(to), None) = (chars.next(), chars.next(), chars.next()) else {
        return Vec::new();
    };
    let (Some(from), Some(to)) = (
        Station::parse(from.encode_utf8(&mut [0; 4])),
        Station::parse(to.encode_utf8(&mut [0; 4])),
    ) else {
        return Vec::new();
    };

    unit_sections(from, to)
        .into_iter()
        .map(|(a, b)| format!("{}{}", a.id(), b.id()))
        .collect()
}

/// A planned trip: 2 to 5 stations with no station repeated back to back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Itinerary {
    stations: Vec<Station>,
}

impl Itinerary {
    pub const MIN_STOPS: usize = 2;
    pub const MAX_STOPS: usize = 5;

    /// Build from an explicit stop list. Rejects lists that break the invariants.
    pub fn new(stations: Vec<Station>) -> Option<Self> {
        let valid_len = (Self::MIN_STOPS..=Self::MAX_STOPS).contains(&stations.len());
        let no_repeats = stations.windows(2).all(|pair| pair[0] != pair[1]);
        (valid_len && no_repeats).then_some(Self { stations })
    }

    /// Uniformly random stop count and stops, re-drawing equal neighbours
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let stops = rng.random_range(Self::MIN_STOPS..=Self::MAX_STOPS);
        let mut stations = Vec::with_capacity(stops);
        stations.push(STATIONS[rng.random_range(0..STATIONS.len())]);

        while stations.len() < stops {
            let candidate = STATIONS[rng.random_range(0..STATIONS.len())];
            if stations.last() != Some(&candidate) {
                stations.push(candidate);
            }
        }
        Self { stations }
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    /// Consecutive `(from, to)` legs
    pub fn legs(&self) -> impl Iterator<Item = (Station, Station)> + '_ {
        self.stations.windows(2).map(|pair| (pair[0], pair[1]))
    }

    /// Sum of unit sections over all legs
    pub fn total_distance(&self) -> u32 {
        self.legs().map(|(from, to)| from.distance(to)).sum()
    }
}

impl fmt::Display for Itinerary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<&str> = self.stations.iter().map(|s| s.id()).collect();
        f.write_str(&ids.join("->"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_expand_sections() {
        assert_eq!(expand_sections("AD"), vec!["AB", "BC", "CD"]);
        assert_eq!(expand_sections("DA"), vec!["DC", "CB", "BA"]);
        assert_eq!(expand_sections("EB"), vec!["ED", "DC", "CB"]);
        assert!(expand_sections("AA").is_empty());
        assert!(expand_sections("A").is_empty());
        assert!(expand_sections("AXD").is_empty());
        assert!(expand_sections("AZ").is_empty());
    }

    #[test]
    fn test_parse_accepts_ids_and_names() {
        assert_eq!(Station::parse("C"), Some(Station::C));
        assert_eq!(Station::parse("Dock"), Some(Station::D));
        assert_eq!(Station::parse("dock"), None);
    }

    #[test]
    fn test_segment_key_uses_full_names() {
        assert_eq!(segment_key(Station::A, Station::B), "Arena->Bridge");
        assert_eq!(segment_key(Station::B, Station::A), "Bridge->Arena");
    }

    #[test]
    fn test_random_itineraries_hold_invariants() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1_000 {
            let itinerary = Itinerary::random(&mut rng);
            let stops = itinerary.stations().len();
            assert!((2..=5).contains(&stops), "bad length {}", stops);
            for pair in itinerary.stations().windows(2) {
                assert_ne!(pair[0], pair[1], "repeated stop in {}", itinerary);
            }
        }
    }

    #[test]
    fn test_itinerary_rejects_invalid_stop_lists() {
        assert!(Itinerary::new(vec![Station::A]).is_none());
        assert!(Itinerary::new(vec![Station::A, Station::A]).is_none());
        assert!(Itinerary::new(vec![Station::A; 6]).is_none());
        assert!(Itinerary::new(vec![Station::A, Station::C, Station::A]).is_some());
    }

    #[test]
    fn test_total_distance_counts_direction_changes() {
        let itinerary = Itinerary::new(vec![Station::A, Station::D, Station::B]).unwrap();
        assert_eq!(itinerary.total_distance(), 5);
        assert_eq!(itinerary.to_string(), "A->D->B");
    }
}
