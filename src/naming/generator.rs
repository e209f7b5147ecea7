//! Unique settlement names from cultural styles.
//!
//! One generator belongs to one world. It remembers every name it issued (or
//! was told about via `reserve`) and never hands the same name out twice,
//! falling back to a numeric suffix when the style is exhausted.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::styles::{CulturalStyle, NamingConfig};
use crate::terrain::TerrainKind;
use crate::world::SettlementType;

/// Chance of drawing a curated special name for the terrain and style.
const SPECIAL_NAME_CHANCE: f64 = 0.30;
/// Chance of a city drawing from the style's unique city names.
const UNIQUE_CITY_CHANCE: f64 = 0.40;
/// Extra attempts after the first colliding candidate.
const MAX_RETRIES: usize = 50;
/// Highest numeric suffix tried before giving up on uniqueness.
const MAX_SUFFIX: u32 = 100;

/// Settlement name generator scoped to one world.
pub struct SettlementNameGenerator {
    config: NamingConfig,
    fallback: CulturalStyle,
    used: HashSet<String>,
    rng: ChaCha8Rng,
}

impl SettlementNameGenerator {
    pub fn new(config: NamingConfig, seed: u64) -> Self {
        Self::with_rng(config, ChaCha8Rng::seed_from_u64(seed))
    }

    /// Generator seeded from OS entropy.
    pub fn from_entropy(config: NamingConfig) -> Self {
        Self::with_rng(config, ChaCha8Rng::from_entropy())
    }

    fn with_rng(config: NamingConfig, rng: ChaCha8Rng) -> Self {
        Self {
            config,
            fallback: CulturalStyle::fallback(),
            used: HashSet::new(),
            rng,
        }
    }

    pub fn config(&self) -> &NamingConfig {
        &self.config
    }

    /// Swap in a new configuration (e.g. fetched from the backend).
    ///
    /// The used-name set is kept.
    pub fn set_config(&mut self, config: NamingConfig) {
        self.config = config;
    }

    /// Forget all issued names. Called when a new world is generated.
    pub fn clear(&mut self) {
        self.used.clear();
    }

    /// Mark existing names as taken, e.g. the settlements of a loaded world.
    pub fn reserve<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.used.extend(names.into_iter().map(Into::into));
    }

    pub fn is_used(&self, name: &str) -> bool {
        self.used.contains(name)
    }

    pub fn used_count(&self) -> usize {
        self.used.len()
    }

    /// Generate a name unique within this generator and record it.
    pub fn generate(&mut self, terrain: &TerrainKind, kind: SettlementType) -> String {
        let mut candidate = self.candidate(terrain, kind);
        let mut retries = 0;
        while self.used.contains(&candidate) && retries < MAX_RETRIES {
            candidate = self.candidate(terrain, kind);
            retries += 1;
        }

        if self.used.contains(&candidate) {
            let base = candidate;
            let mut n = 2;
            candidate = format!("{} {}", base, n);
            // Past the bound a duplicate is accepted
            while self.used.contains(&candidate) && n < MAX_SUFFIX {
                n += 1;
                candidate = format!("{} {}", base, n);
            }
        }

        self.used.insert(candidate.clone());
        candidate
    }

    /// One attempt at a name, without the uniqueness check.
    fn candidate(&mut self, terrain: &TerrainKind, kind: SettlementType) -> String {
        let style_name = self.pick_style(terrain);

        let specials = self.special_names(terrain, style_name.as_deref());
        if !specials.is_empty() && self.rng.gen_bool(SPECIAL_NAME_CHANCE) {
            if let Some(name) = self.unused_pick(specials) {
                return name;
            }
            // Every special name is taken
            return self.synthesize(style_name.as_deref());
        }

        if kind == SettlementType::City {
            let unique = self
                .style(style_name.as_deref())
                .unique_city_names
                .clone();
            if !unique.is_empty() && self.rng.gen_bool(UNIQUE_CITY_CHANCE) {
                if let Some(name) = self.unused_pick(unique) {
                    return name;
                }
            }
        }

        self.synthesize(style_name.as_deref())
    }

    /// Style for a terrain; the default style when the terrain has none.
    ///
    /// `None` means the built-in fallback style.
    fn pick_style(&mut self, terrain: &TerrainKind) -> Option<String> {
        let options = self.config.styles_for_terrain(terrain.as_str());
        if let Some(name) = options.choose(&mut self.rng) {
            return Some(name.to_string());
        }
        let default = &self.config.default_style;
        if self.config.style(default).is_some() {
            Some(default.clone())
        } else {
            None
        }
    }

    fn style(&self, name: Option<&str>) -> &CulturalStyle {
        name.and_then(|n| self.config.style(n))
            .unwrap_or(&self.fallback)
    }

    fn special_names(&self, terrain: &TerrainKind, style: Option<&str>) -> Vec<String> {
        match style {
            Some(style) => self.config.special_names(terrain.as_str(), style).to_vec(),
            None => Vec::new(),
        }
    }

    /// Uniform pick among the names not yet used.
    fn unused_pick(&mut self, names: Vec<String>) -> Option<String> {
        let unused: Vec<String> = names
            .into_iter()
            .filter(|name| !self.used.contains(name))
            .collect();
        unused.choose(&mut self.rng).cloned()
    }

    /// Join tokens according to one of the style's patterns.
    fn synthesize(&mut self, style_name: Option<&str>) -> String {
        let style = self.style(style_name).clone();
        let style = if style.can_synthesize() {
            style
        } else {
            self.fallback.clone()
        };

        let pattern = style
            .patterns
            .choose(&mut self.rng)
            .cloned()
            .unwrap_or_else(|| "prefix+suffix".to_string());

        let mut tokens: Vec<&[String]> = Vec::new();
        for part in pattern.split('+') {
            let bank = match part.trim() {
                "prefix" => &style.prefixes,
                "middle" => &style.middles,
                "suffix" => &style.suffixes,
                _ => {
                    tokens.clear();
                    break;
                }
            };
            if bank.is_empty() {
                tokens.clear();
                break;
            }
            tokens.push(bank.as_slice());
        }
        if tokens.is_empty() {
            tokens = vec![style.prefixes.as_slice(), style.suffixes.as_slice()];
        }

        let mut name = String::new();
        for bank in tokens {
            if let Some(token) = bank.choose(&mut self.rng) {
                name.push_str(token);
            }
        }
        capitalize(&name)
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fallback_generator(seed: u64) -> SettlementNameGenerator {
        SettlementNameGenerator::new(NamingConfig::fallback(), seed)
    }

    #[test]
    fn test_fallback_name_is_prefix_plus_suffix() {
        let mut generator = fallback_generator(42);
        let name = generator.generate(&TerrainKind::Plains, SettlementType::Village);
        let style = CulturalStyle::fallback();
        let prefix = style
            .prefixes
            .iter()
            .find(|p| name.starts_with(p.as_str()))
            .unwrap_or_else(|| panic!("'{}' has no fallback prefix", name));
        let rest = &name[prefix.len()..];
        assert!(style.suffixes.iter().any(|s| s == rest), "'{}' has no fallback suffix", name);
        assert!(!name.contains(' '));
        assert!(generator.is_used(&name));
    }

    #[test]
    fn test_hundred_names_are_unique() {
        for config in [NamingConfig::fallback(), NamingConfig::defaults()] {
            let mut generator = SettlementNameGenerator::new(config, 7);
            let names: Vec<String> = (0..100)
                .map(|i| {
                    let kind = match i % 3 {
                        0 => SettlementType::Village,
                        1 => SettlementType::Town,
                        _ => SettlementType::City,
                    };
                    generator.generate(&TerrainKind::all()[i % 8], kind)
                })
                .collect();
            let unique: HashSet<&String> = names.iter().collect();
            assert_eq!(unique.len(), 100, "duplicates in {:?}", names);
            assert_eq!(generator.used_count(), 100);
        }
    }

    #[test]
    fn test_tiny_style_uses_numeric_suffix() {
        let mut config = NamingConfig::fallback();
        let style = config.cultural_styles.get_mut("fallback").unwrap();
        style.prefixes = vec!["Ash".to_string(), "Elm".to_string()];
        style.suffixes = vec!["by".to_string(), "ton".to_string()];
        let mut generator = SettlementNameGenerator::new(config, 3);

        let names: Vec<String> = (0..100)
            .map(|_| generator.generate(&TerrainKind::Hills, SettlementType::Town))
            .collect();
        let unique: HashSet<&String> = names.iter().collect();
        assert_eq!(unique.len(), 100, "duplicates in {:?}", names);
        assert!(names.iter().any(|n| n.ends_with(" 2")), "{:?}", names);
        assert!(names.iter().any(|n| n.ends_with(" 20")), "{:?}", names);
        let bases = ["Ashby", "Ashton", "Elmby", "Elmton"];
        assert!(names
            .iter()
            .all(|n| bases.iter().any(|b| n.as_str() == *b || n.starts_with(&format!("{} ", b)))));
    }

    #[test]
    fn test_unique_city_rate_without_specials() {
        let mut config = NamingConfig::fallback();
        config
            .cultural_styles
            .get_mut("fallback")
            .unwrap()
            .unique_city_names = vec!["Capitalia".to_string()];
        assert!(config.special_names("plains", "fallback").is_empty());

        let runs = 4000;
        let hits = (0..runs)
            .filter(|&seed| {
                let mut generator = SettlementNameGenerator::new(config.clone(), seed);
                generator.generate(&TerrainKind::Plains, SettlementType::City) == "Capitalia"
            })
            .count();
        let rate = hits as f64 / runs as f64;
        assert!((0.35..0.45).contains(&rate), "unique city rate {}", rate);
    }

    #[test]
    fn test_exhausted_specials_fall_back_to_synthesis() {
        let mut generator = SettlementNameGenerator::new(NamingConfig::defaults(), 13);
        let mut config = generator.config().clone();
        config.terrain_styles.insert("mountains".to_string(), vec!["harsh".to_string()]);
        let specials = config.special_names("mountains", "harsh").to_vec();
        assert!(!specials.is_empty());
        generator.set_config(config);
        generator.reserve(specials.clone());

        for _ in 0..30 {
            let name = generator.generate(&TerrainKind::Mountains, SettlementType::Village);
            assert!(!specials.contains(&name), "{} was already taken", name);
        }
    }

    #[test]
    fn test_reserve_and_clear() {
        let mut generator = fallback_generator(1);
        generator.reserve(["Goldvale", "Ironford"]);
        assert!(generator.is_used("Goldvale"));
        assert_eq!(generator.used_count(), 2);
        for _ in 0..40 {
            let name = generator.generate(&TerrainKind::Plains, SettlementType::Village);
            assert_ne!(name, "Goldvale");
            assert_ne!(name, "Ironford");
        }
        generator.clear();
        assert_eq!(generator.used_count(), 0);
        assert!(!generator.is_used("Goldvale"));
    }

    #[test]
    fn test_special_names_are_drawn_for_terrain() {
        let mut generator = SettlementNameGenerator::new(NamingConfig::defaults(), 11);
        let specials: Vec<String> = generator
            .config()
            .special_names("mountains", "harsh")
            .to_vec();
        let names: Vec<String> = (0..60)
            .map(|_| generator.generate(&TerrainKind::Mountains, SettlementType::Village))
            .collect();
        assert!(
            names.iter().any(|n| specials.contains(n)),
            "no special mountain names in {:?}",
            names
        );
    }

    #[test]
    fn test_cities_draw_unique_names() {
        let mut generator = SettlementNameGenerator::new(NamingConfig::defaults(), 5);
        let uniques: Vec<String> = generator
            .config()
            .style("compound")
            .unwrap()
            .unique_city_names
            .clone();
        let mut config = generator.config().clone();
        config.terrain_styles.insert("plains".to_string(), vec!["compound".to_string()]);
        generator.set_config(config);

        let names: Vec<String> = (0..40)
            .map(|_| generator.generate(&TerrainKind::Plains, SettlementType::City))
            .collect();
        let drawn = names.iter().filter(|n| uniques.contains(n)).count();
        assert!(drawn > 0 && drawn <= uniques.len(), "{:?}", names);
    }

    #[test]
    fn test_unknown_terrain_uses_default_style() {
        let mut generator = SettlementNameGenerator::new(NamingConfig::defaults(), 9);
        let name = generator.generate(&TerrainKind::from("lava"), SettlementType::Town);
        assert!(!name.is_empty());
        assert!(name.chars().next().unwrap().is_uppercase());
    }

    #[test]
    fn test_same_seed_same_names() {
        let mut a = SettlementNameGenerator::new(NamingConfig::defaults(), 42);
        let mut b = SettlementNameGenerator::new(NamingConfig::defaults(), 42);
        for terrain in TerrainKind::all() {
            assert_eq!(
                a.generate(terrain, SettlementType::City),
                b.generate(terrain, SettlementType::City)
            );
        }
    }
}
