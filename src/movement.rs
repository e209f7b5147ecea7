//! Movement data for the inspect panel.
//!
//! Decodes `GET /api/hex-movement/{x}/{y}`. The backend computes travel
//! times; this side only names the six neighbours and formats the figures.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Compass direction to a neighbouring hex.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Direction {
    N,
    NE,
    SE,
    S,
    SW,
    NW,
}

impl Direction {
    /// Fixed display order of the compass.
    pub const ALL: [Direction; 6] = [
        Direction::N,
        Direction::NE,
        Direction::SE,
        Direction::S,
        Direction::SW,
        Direction::NW,
    ];

    pub fn abbrev(&self) -> &'static str {
        match self {
            Direction::N => "N",
            Direction::NE => "NE",
            Direction::SE => "SE",
            Direction::S => "S",
            Direction::SW => "SW",
            Direction::NW => "NW",
        }
    }

    /// Accepts "NE", "ne", "northeast", "north_east" and "north-east".
    pub fn parse(name: &str) -> Option<Direction> {
        let normalized: String = name
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "n" | "north" => Some(Direction::N),
            "ne" | "northeast" => Some(Direction::NE),
            "se" | "southeast" => Some(Direction::SE),
            "s" | "south" => Some(Direction::S),
            "sw" | "southwest" => Some(Direction::SW),
            "nw" | "northwest" => Some(Direction::NW),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.abbrev())
    }
}

/// Travel time in days, or a marker that the way is blocked.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TravelTime {
    Days(f64),
    Impassable(ImpassableMarker),
}

/// The literal string `"impassable"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpassableMarker {
    Impassable,
}

impl TravelTime {
    pub const IMPASSABLE: TravelTime = TravelTime::Impassable(ImpassableMarker::Impassable);

    pub fn is_impassable(&self) -> bool {
        matches!(self, TravelTime::Impassable(_))
    }

    pub fn days(&self) -> Option<f64> {
        match self {
            TravelTime::Days(d) => Some(*d),
            TravelTime::Impassable(_) => None,
        }
    }
}

impl fmt::Display for TravelTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TravelTime::Days(d) => write!(f, "{:.1}d", d),
            TravelTime::Impassable(_) => f.write_str("impassable"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TravelTimes {
    pub walking: TravelTime,
    pub riding: TravelTime,
    pub flying: TravelTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl TravelTimes {
    /// Blocked for walkers and riders alike.
    pub fn is_impassable(&self) -> bool {
        self.walking.is_impassable()
    }
}

/// What lies in one direction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Neighbour {
    pub destination: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
    pub terrain: String,
    pub movement: TravelTimes,
}

/// Wire shape of the movement endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MovementResponse {
    pub directions: BTreeMap<String, Neighbour>,
}

/// Movement data for one hex, keyed by direction.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MovementReport {
    neighbours: BTreeMap<Direction, Neighbour>,
}

impl MovementReport {
    /// Entries under direction names we do not recognise are skipped.
    pub fn from_response(response: MovementResponse) -> Self {
        let neighbours = response
            .directions
            .into_iter()
            .filter_map(|(name, neighbour)| Direction::parse(&name).map(|d| (d, neighbour)))
            .collect();
        Self { neighbours }
    }

    pub fn get(&self, direction: Direction) -> Option<&Neighbour> {
        self.neighbours.get(&direction)
    }

    /// All six directions in compass order, with gaps for edges of the map.
    pub fn compass(&self) -> impl Iterator<Item = (Direction, Option<&Neighbour>)> {
        Direction::ALL.into_iter().map(move |d| (d, self.neighbours.get(&d)))
    }

    pub fn len(&self) -> usize {
        self.neighbours.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbours.is_empty()
    }
}
