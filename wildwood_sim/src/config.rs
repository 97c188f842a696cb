// Data-driven simulation configuration.
//
// All tunable parameters live in `SimConfig`, loaded from JSON at startup.
// The sim never uses magic numbers for them; it reads the config. Parameters
// are grouped by the subsystem that consumes them:
// - `PathfindingConfig`: the default and maximum search window radius.
// - `IndexConfig`: slot-array pre-sizing for the `SpatialIndex`.
// - `species`: per-species `SpeciesData` (see `species.rs`).
//
// `SimConfig::from_json()` parses and validates in one go; `validate()` is
// also public for configs built in code. Every field has a value in
// `Default`, which is what tests and benches use.
//
// See also: `sim.rs` which owns the `SimConfig` as part of `SimState`,
// `species.rs` for `SpeciesData`, `error.rs` for `ConfigError`.
//
// **Critical constraint: determinism.** Config values feed directly into
// simulation logic. Runs compared for equality must use identical configs.

use crate::error::ConfigError;
use crate::species::SpeciesData;
use crate::types::Species;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Search window sizing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathfindingConfig {
    /// Radius for species that do not set their own.
    pub default_radius: i32,
    /// Upper bound on any radius. A search allocates `(2R + 1)^3` cells of
    /// scratch, so this caps per-call memory.
    pub max_radius: i32,
}

/// Spatial index sizing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Creatures to pre-size the slot array for.
    pub initial_capacity: usize,
}

/// Top-level simulation configuration. Loaded from JSON, never mutated at
/// runtime.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimConfig {
    /// World dimensions in voxels (x, y, z).
    pub world_size: (u32, u32, u32),

    /// The meadow's first open layer: soil and grass fill everything below.
    pub ground_height: i32,

    pub pathfinding: PathfindingConfig,

    pub index: IndexConfig,

    /// Per-species behavioral data. Keyed by `Species` enum.
    pub species: BTreeMap<Species, SpeciesData>,
}

impl Default for SimConfig {
    fn default() -> Self {
        let mut species = BTreeMap::new();
        species.insert(
            Species::Deer,
            SpeciesData {
                perception_radius: 8,
                search_radius: None,
                body_height: 2,
                flying: false,
                grazing: true,
                prey: vec![],
            },
        );
        species.insert(
            Species::Wolf,
            SpeciesData {
                perception_radius: 12,
                search_radius: Some(8),
                body_height: 1,
                flying: false,
                grazing: false,
                prey: vec![Species::Deer],
            },
        );
        species.insert(
            Species::Hawk,
            SpeciesData {
                perception_radius: 16,
                search_radius: None,
                body_height: 1,
                flying: true,
                grazing: false,
                prey: vec![],
            },
        );

        Self {
            world_size: (64, 32, 64),
            ground_height: 8,
            pathfinding: PathfindingConfig {
                default_radius: 6,
                max_radius: 16,
            },
            index: IndexConfig {
                initial_capacity: 256,
            },
            species,
        }
    }
}

impl SimConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configs the sim cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (sx, sy, sz) = self.world_size;
        positive("world_size.x", sx as i64)?;
        positive("world_size.y", sy as i64)?;
        positive("world_size.z", sz as i64)?;
        positive("ground_height", self.ground_height as i64)?;

        let PathfindingConfig {
            default_radius,
            max_radius,
        } = self.pathfinding;
        positive("pathfinding.default_radius", default_radius as i64)?;
        positive("pathfinding.max_radius", max_radius as i64)?;
        if default_radius > max_radius {
            return Err(ConfigError::DefaultRadiusTooLarge {
                radius: default_radius,
                max: max_radius,
            });
        }

        for (&species, data) in &self.species {
            let field = |name: &str| format!("species.{species:?}.{name}");
            positive(field("perception_radius"), data.perception_radius as i64)?;
            positive(field("body_height"), data.body_height as i64)?;
            if let Some(radius) = data.search_radius {
                positive(field("search_radius"), radius as i64)?;
                if radius > max_radius {
                    return Err(ConfigError::RadiusTooLarge {
                        species,
                        radius,
                        max: max_radius,
                    });
                }
            }
            if data.hunts(species) {
                return Err(ConfigError::SelfPredation(species));
            }
        }
        Ok(())
    }

    /// Pathfinding window radius for `species`.
    pub fn search_radius(&self, species: Species) -> i32 {
        self.species
            .get(&species)
            .and_then(|d| d.search_radius)
            .unwrap_or(self.pathfinding.default_radius)
    }
}

fn positive(field: impl Into<String>, value: i64) -> Result<(), ConfigError> {
    if value > 0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive {
            field: field.into(),
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        SimConfig::default().validate().unwrap();
    }

    #[test]
    fn default_config_serializes() {
        let config = SimConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let restored = SimConfig::from_json(&json).unwrap();
        assert_eq!(config, restored);
        assert_eq!(restored.species[&Species::Wolf].prey, vec![Species::Deer]);
    }

    #[test]
    fn config_loads_from_json_string() {
        let json = r#"{
            "world_size": [32, 16, 32],
            "ground_height": 4,
            "pathfinding": { "default_radius": 5, "max_radius": 10 },
            "index": { "initial_capacity": 16 },
            "species": {
                "Deer": {
                    "perception_radius": 6,
                    "body_height": 2,
                    "flying": false,
                    "grazing": true
                },
                "Wolf": {
                    "perception_radius": 9,
                    "search_radius": 7,
                    "body_height": 1,
                    "flying": false,
                    "grazing": false,
                    "prey": ["Deer"]
                }
            }
        }"#;
        let config = SimConfig::from_json(json).unwrap();
        assert_eq!(config.world_size, (32, 16, 32));
        assert_eq!(config.search_radius(Species::Deer), 5);
        assert_eq!(config.search_radius(Species::Wolf), 7);
        // Unknown species fall back to the default as well.
        assert_eq!(config.search_radius(Species::Hawk), 5);
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let err = SimConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)), "{err}");
    }

    #[test]
    fn non_positive_values_rejected() {
        let mut config = SimConfig::default();
        config.pathfinding.default_radius = 0;
        let err = config.validate().unwrap_err();
        assert!(
            matches!(
                &err,
                ConfigError::NonPositive { field, value: 0 }
                    if field == "pathfinding.default_radius"
            ),
            "{err}"
        );

        let mut config = SimConfig::default();
        config.species.get_mut(&Species::Deer).unwrap().body_height = -1;
        let err = config.validate().unwrap_err();
        assert_eq!(err.to_string(), "species.Deer.body_height must be positive, got -1");
    }

    #[test]
    fn oversized_radius_rejected() {
        let mut config = SimConfig::default();
        config.species.get_mut(&Species::Hawk).unwrap().search_radius = Some(17);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::RadiusTooLarge {
                species: Species::Hawk,
                radius: 17,
                max: 16
            })
        ));

        let mut config = SimConfig::default();
        config.pathfinding.default_radius = 20;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DefaultRadiusTooLarge {
                radius: 20,
                max: 16
            })
        ));
    }

    #[test]
    fn self_predation_rejected() {
        let mut config = SimConfig::default();
        config
            .species
            .get_mut(&Species::Wolf)
            .unwrap()
            .prey
            .push(Species::Wolf);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::SelfPredation(Species::Wolf))
        ));
    }
}
