//! Level topology input contract: tile grid, routes, wave structure and
//! battle options.
//!
//! These types describe a level exactly as the simulation consumes it;
//! parsing external file formats into them is an adapter concern. The
//! wave structure compiles into an absolute-time spawn list with
//! [`compile_spawn_times`] before a run begins, so the scheduler always
//! knows the exact next spawn instant.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{DeployClass, GridPos, RouteId, TileKind};

/// Terrain and deployability of a single tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileSpec {
    /// Terrain classification.
    pub kind: TileKind,
    /// Deployability classification.
    pub deploy: DeployClass,
}

/// One enemy route through the level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteSpec {
    /// Tile the route begins on.
    pub start: GridPos,
    /// Tile the route ends on; reaching it leaks the enemy.
    pub end: GridPos,
    /// Intermediate tiles visited in order between start and end.
    pub checkpoints: Vec<GridPos>,
    /// Whether legs of the route may cut diagonally across tiles.
    pub allow_diagonal: bool,
}

/// One spawn action within a wave fragment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpawnActionSpec {
    /// Template identifier of the enemy class to spawn.
    pub enemy: String,
    /// Number of enemies emitted by this action.
    pub count: u32,
    /// Delay after the fragment starts before the first spawn.
    pub pre_delay: Duration,
    /// Spacing between consecutive spawns of this action.
    pub interval: Duration,
    /// Route assigned to every enemy this action spawns.
    pub route: RouteId,
}

/// One fragment of a wave; fragments within a wave run concurrently.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FragmentSpec {
    /// Delay after the wave starts before this fragment's actions run.
    pub pre_delay: Duration,
    /// Spawn actions contained in the fragment.
    pub actions: Vec<SpawnActionSpec>,
}

/// One wave of the level's spawn schedule; waves run sequentially.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaveSpec {
    /// Delay between the wave becoming current and its fragments
    /// starting.
    pub pre_delay: Duration,
    /// Delay between the wave's last spawn and the next wave becoming
    /// current.
    pub post_delay: Duration,
    /// Fragments contained in the wave.
    pub fragments: Vec<FragmentSpec>,
}

/// Battle parameters of the level.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelOptions {
    /// Lives available before the run is lost.
    pub max_lives: u32,
    /// Maximum number of concurrently deployed units.
    pub roster_limit: u32,
    /// Deploy cost available when the battle starts.
    pub initial_cost: u32,
    /// Ceiling the regenerating deploy cost saturates at.
    pub max_cost: u32,
    /// Time required to regenerate one point of deploy cost.
    pub cost_interval: Duration,
}

impl Default for LevelOptions {
    fn default() -> Self {
        Self {
            max_lives: 3,
            roster_limit: 8,
            initial_cost: 10,
            max_cost: 99,
            cost_interval: Duration::from_secs(1),
        }
    }
}

/// Complete read-only description of one level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelData {
    /// Display name of the level.
    pub name: String,
    /// Row-major tile grid; row 0 is the top of the map.
    pub tiles: Vec<Vec<TileSpec>>,
    /// Enemy routes referenced by spawn actions.
    pub routes: Vec<RouteSpec>,
    /// Sequential wave schedule.
    pub waves: Vec<WaveSpec>,
    /// Battle parameters.
    pub options: LevelOptions,
}

impl LevelData {
    /// Number of tile rows in the grid.
    #[must_use]
    pub fn rows(&self) -> u32 {
        self.tiles.len() as u32
    }

    /// Number of tile columns in the grid.
    #[must_use]
    pub fn cols(&self) -> u32 {
        self.tiles.first().map_or(0, |row| row.len() as u32)
    }
}

/// One entry of the compiled spawn list.
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledSpawn {
    /// Absolute simulated time of the spawn.
    pub time: Duration,
    /// Template identifier of the enemy class.
    pub enemy: String,
    /// Route the enemy follows.
    pub route: RouteId,
}

/// Flattens the wave structure into absolute spawn times.
///
/// Wave `i` becomes current when wave `i-1` has emitted its last spawn
/// plus its post-delay; a fragment starts at the wave's current time
/// plus the wave and fragment pre-delays; spawn `j` of an action fires
/// at the fragment start plus the action pre-delay plus `j` intervals.
/// The result is sorted by time; entries sharing an instant keep their
/// declaration order, which fixes their spawn ids.
#[must_use]
pub fn compile_spawn_times(waves: &[WaveSpec]) -> Vec<CompiledSpawn> {
    let mut spawns = Vec::new();
    let mut wave_start = Duration::ZERO;

    for wave in waves {
        let mut last_spawn = wave_start;

        for fragment in &wave.fragments {
            let fragment_start = wave_start + wave.pre_delay + fragment.pre_delay;

            for action in &fragment.actions {
                let first = fragment_start + action.pre_delay;
                for index in 0..action.count {
                    let time = first + action.interval * index;
                    if time > last_spawn {
                        last_spawn = time;
                    }
                    spawns.push(CompiledSpawn {
                        time,
                        enemy: action.enemy.clone(),
                        route: action.route,
                    });
                }
            }
        }

        wave_start = last_spawn + wave.post_delay;
    }

    spawns.sort_by_key(|spawn| spawn.time);
    spawns
}
