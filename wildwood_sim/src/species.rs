// Species data: data-driven creature configuration.
//
// All behavioral differences between species (deer, wolves, hawks) are data
// in `SpeciesData`, keyed by `Species` in the sim config. The tick driver uses
// one `Creature` type and reads these values at runtime: whether a creature
// flies decides its path profile, `prey` decides whom it hunts and who it
// flees from, `grazing` decides whether it looks for grass when idle.
//
// See also: `config.rs` where the species table lives, `profile.rs` for the
// footprint presets built here, `sim.rs` for the planner that consumes them.
//
// **Critical constraint: determinism.** Species data is part of the config and
// must be identical across runs being compared.

use crate::profile::Profile;
use crate::types::Species;
use serde::{Deserialize, Serialize};

/// Data-driven behavioral parameters for a creature species.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesData {
    /// Half-extent of the cube scanned for other creatures each tick.
    pub perception_radius: i32,

    /// Pathfinding window radius. `None` uses
    /// `PathfindingConfig::default_radius`.
    #[serde(default)]
    pub search_radius: Option<i32>,

    /// Body height in cells (the column of open cells a creature occupies).
    pub body_height: i32,

    /// Fliers ignore footing while travelling but still need it to spawn.
    pub flying: bool,

    /// Seeks grass when nothing else is going on.
    pub grazing: bool,

    /// Species this one hunts. Creatures of those species flee from it.
    #[serde(default)]
    pub prey: Vec<Species>,
}

impl SpeciesData {
    /// Footprint every cell of a route must pass (and, with placement
    /// semantics, every spawn position).
    pub fn path_profile(&self) -> Profile {
        if self.flying {
            Profile::flyer(self.body_height)
        } else {
            Profile::walker(self.body_height)
        }
    }

    /// Destination footprint for grazers, `None` for everyone else.
    pub fn grazing_profile(&self) -> Option<Profile> {
        self.grazing.then(|| Profile::grazing_spot(self.body_height))
    }

    pub fn hunts(&self, other: Species) -> bool {
        self.prey.contains(&other)
    }
}
