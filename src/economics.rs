//! Local economics approximation.
//!
//! Recomputed on every terrain edit. The backend recomputes on its own terms
//! during the next sync, so these figures are provisional.

use serde::{Deserialize, Serialize};

use crate::world::{Settlement, SettlementType};

/// Base rural wage before modifiers.
pub const BASE_WAGE: u64 = 10;
/// Rural tax rate, in percent.
pub const RURAL_TAX_PERCENT: u64 = 15;

/// Guards the floor against products like 9.999999999999998.
const FLOOR_EPSILON: f64 = 1e-9;

/// Rural part of a hex's economy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuralEconomics {
    pub population: u64,
    pub wages: u64,
    pub taxes: u64,
}

/// Economy of the settlement in a hex.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementEconomics {
    pub population: u64,
    pub wages: u64,
    pub taxes: u64,
    #[serde(rename = "type")]
    pub kind: SettlementType,
    pub name: String,
}

/// Derived wage/tax figures of one hex.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Economics {
    pub rural: RuralEconomics,
    #[serde(default)]
    pub settlement: Option<SettlementEconomics>,
}

impl Economics {
    /// Compute the economy of a hex with `population` people in total.
    ///
    /// Rural population is whatever the settlement does not account for,
    /// clamped at zero.
    pub fn compute(
        population: u64,
        settlement: Option<&Settlement>,
        terrain_modifier: f64,
    ) -> Self {
        let rural_population = match settlement {
            Some(s) => population.saturating_sub(s.population),
            None => population,
        };

        let rural_wages =
            floor_u64(BASE_WAGE as f64 * population_modifier(population) * terrain_modifier);
        let rural = RuralEconomics {
            population: rural_population,
            wages: rural_wages,
            taxes: tax_due(rural_population, rural_wages, RURAL_TAX_PERCENT),
        };

        let settlement = settlement.map(|s| {
            let wages = rural_wages.saturating_mul(wage_multiplier_tenths(s.kind)) / 10;
            SettlementEconomics {
                population: s.population,
                wages,
                taxes: tax_due(s.population, wages, tax_percent(s.kind)),
                kind: s.kind,
                name: s.name.clone(),
            }
        });

        Self { rural, settlement }
    }

    /// Rural plus settlement taxes.
    pub fn total_taxes(&self) -> u64 {
        self.rural
            .taxes
            .saturating_add(self.settlement.as_ref().map_or(0, |s| s.taxes))
    }
}

/// Wage modifier by total population bracket.
pub fn population_modifier(population: u64) -> f64 {
    match population {
        0..=99 => 1.3,
        100..=499 => 1.1,
        500..=1999 => 1.0,
        2000..=4999 => 0.9,
        _ => 0.8,
    }
}

/// Settlement wage multiplier over rural wages, in tenths.
pub fn wage_multiplier_tenths(kind: SettlementType) -> u64 {
    match kind {
        SettlementType::City => 20,
        SettlementType::Town => 15,
        SettlementType::Village => 12,
    }
}

/// Settlement tax rate, in percent.
pub fn tax_percent(kind: SettlementType) -> u64 {
    match kind {
        SettlementType::City => 28,
        SettlementType::Town => 22,
        SettlementType::Village => 18,
    }
}

/// `population * wages * percent / 100`, saturating at `u64::MAX`.
fn tax_due(population: u64, wages: u64, percent: u64) -> u64 {
    let due = population as u128 * wages as u128 * percent as u128 / 100;
    u64::try_from(due).unwrap_or(u64::MAX)
}

fn floor_u64(value: f64) -> u64 {
    if value <= 0.0 || !value.is_finite() {
        return 0;
    }
    (value + FLOOR_EPSILON).floor() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settlement(kind: SettlementType, population: u64) -> Settlement {
        Settlement {
            name: "Redford".to_string(),
            kind,
            population,
            race: None,
        }
    }

    #[test]
    fn test_brackets() {
        assert_eq!(population_modifier(0), 1.3);
        assert_eq!(population_modifier(99), 1.3);
        assert_eq!(population_modifier(100), 1.1);
        assert_eq!(population_modifier(1999), 1.0);
        assert_eq!(population_modifier(2000), 0.9);
        assert_eq!(population_modifier(5000), 0.8);
    }

    #[test]
    fn test_rural_only() {
        // 10 * 1.3 * 1.0 = 13; 50 * 13 * 0.15 = 97.5
        let eco = Economics::compute(50, None, 1.0);
        assert_eq!(eco.rural.population, 50);
        assert_eq!(eco.rural.wages, 13);
        assert_eq!(eco.rural.taxes, 97);
        assert!(eco.settlement.is_none());
    }

    #[test]
    fn test_terrain_modifier_applies_before_floor() {
        // 10 * 1.0 * 1.3 = 13 (mountains), 10 * 1.0 * 1.05 = 10.5 -> 10 (forests)
        assert_eq!(Economics::compute(1000, None, 1.3).rural.wages, 13);
        assert_eq!(Economics::compute(1000, None, 1.05).rural.wages, 10);
        // 10 * 0.8 * 1.25 = 10 exactly
        assert_eq!(Economics::compute(9000, None, 1.25).rural.wages, 10);
    }

    #[test]
    fn test_settlement_split() {
        // Bracket 1.0, wages 10; town wages floor(10 * 1.5) = 15
        let town = settlement(SettlementType::Town, 400);
        let eco = Economics::compute(1000, Some(&town), 1.0);
        assert_eq!(eco.rural.population, 600);
        assert_eq!(eco.rural.taxes, 600 * 10 * 15 / 100);
        let s = eco.settlement.as_ref().unwrap();
        assert_eq!(s.population, 400);
        assert_eq!(s.wages, 15);
        assert_eq!(s.taxes, 400 * 15 * 22 / 100);
        assert_eq!(s.name, "Redford");
        assert_eq!(s.population + eco.rural.population, 1000);
    }

    #[test]
    fn test_village_wage_floors() {
        // Bracket 1.3, hills 1.1: floor(14.3) = 14; village floor(14 * 1.2) = 16
        let village = settlement(SettlementType::Village, 30);
        let eco = Economics::compute(80, Some(&village), 1.1);
        assert_eq!(eco.rural.wages, 14);
        let s = eco.settlement.unwrap();
        assert_eq!(s.wages, 16);
        // floor(30 * 16 * 0.18) = floor(86.4)
        assert_eq!(s.taxes, 86);
    }

    #[test]
    fn test_rural_clamps_at_zero() {
        let city = settlement(SettlementType::City, 3000);
        let eco = Economics::compute(1200, Some(&city), 1.0);
        assert_eq!(eco.rural.population, 0);
        assert_eq!(eco.rural.taxes, 0);
        assert_eq!(eco.settlement.unwrap().wages, 20);
    }

    #[test]
    fn test_huge_population_saturates() {
        let eco = Economics::compute(1_000_000_000_000_000_000, None, 1.1);
        assert_eq!(eco.rural.wages, 8);
        // 1e18 * 8 * 15 / 100 fits; the intermediate product does not
        assert_eq!(eco.rural.taxes, 1_200_000_000_000_000_000);

        let city = settlement(SettlementType::City, u64::MAX);
        let eco = Economics::compute(u64::MAX, Some(&city), 1.0);
        assert_eq!(eco.rural.population, 0);
        assert_eq!(eco.settlement.as_ref().unwrap().taxes, u64::MAX);
        assert_eq!(eco.total_taxes(), u64::MAX);
    }

    #[test]
    fn test_serialized_shape() {
        let eco = Economics::compute(10, None, 1.0);
        let json = serde_json::to_value(&eco).unwrap();
        assert_eq!(json["rural"]["wages"], 13);
        assert!(json["settlement"].is_null());
    }
}
