//! Settlement name generation.
//!
//! Each terrain maps to one or more cultural styles. A `CulturalStyle`
//! carries the prefix/middle/suffix token banks and the patterns that join
//! them, plus curated lists of special and unique city names. The
//! `SettlementNameGenerator` draws from these and keeps names unique within
//! one world.

pub mod styles;
pub mod generator;

pub use styles::{CulturalStyle, NamingConfig};
pub use generator::SettlementNameGenerator;
