//! Battle-plan file format.
//!
//! Plans are the one input meant to be written by hand, so the format
//! stays friendly: times are plain seconds and directions are words.
//! Level and template files are machine dumps and parse straight into
//! the core input types instead.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use gatefall_core::{Facing, GridPos, OperatorConfig, PlayerAction, PlayerOp, SkillSlot};

/// Root of a battle-plan JSON document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct PlanFile {
    /// Overrides the level's starting lives when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) initial_lives: Option<u32>,
    /// Operator loadouts available to the plan.
    pub(crate) operators: Vec<OperatorEntry>,
    /// Timed actions, in any order; they are sorted before the run.
    pub(crate) actions: Vec<ActionEntry>,
}

/// One operator loadout.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct OperatorEntry {
    /// Template identifier.
    pub(crate) operator: String,
    /// Custom id the plan's actions refer to.
    pub(crate) custom_id: String,
    #[serde(default = "default_level")]
    pub(crate) level: u32,
    #[serde(default)]
    pub(crate) elite: u8,
    #[serde(default)]
    pub(crate) potential: u8,
    #[serde(default = "default_skill_level")]
    pub(crate) skill_level: u8,
    /// Losing this operator loses the run.
    #[serde(default)]
    pub(crate) mandatory: bool,
}

fn default_level() -> u32 {
    1
}

fn default_skill_level() -> u8 {
    1
}

/// One timed action of the plan.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum ActionEntry {
    /// Place an operator on a tile.
    Deploy {
        time: f64,
        operator: String,
        position: PositionEntry,
        #[serde(default)]
        direction: DirectionEntry,
    },
    /// Withdraw an operator from the field.
    Retreat { time: f64, operator: String },
    /// Fire one of an operator's skills.
    ActivateSkill {
        time: f64,
        operator: String,
        #[serde(default)]
        skill_index: u8,
    },
}

/// Tile coordinates as written in plan files.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub(crate) struct PositionEntry {
    pub(crate) row: u32,
    pub(crate) col: u32,
}

/// Deploy direction as written in plan files.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub(crate) enum DirectionEntry {
    #[default]
    Right,
    Down,
    Left,
    Up,
}

impl From<DirectionEntry> for Facing {
    fn from(direction: DirectionEntry) -> Self {
        match direction {
            DirectionEntry::Right => Facing::Right,
            DirectionEntry::Down => Facing::Down,
            DirectionEntry::Left => Facing::Left,
            DirectionEntry::Up => Facing::Up,
        }
    }
}

impl PlanFile {
    /// Operator configurations in declaration order.
    pub(crate) fn operator_configs(&self) -> Vec<OperatorConfig> {
        self.operators
            .iter()
            .map(|entry| OperatorConfig {
                operator: entry.operator.clone(),
                custom_id: entry.custom_id.clone(),
                level: entry.level,
                elite: entry.elite,
                potential: entry.potential,
                skill_level: entry.skill_level,
                mandatory: entry.mandatory,
            })
            .collect()
    }

    /// The action timeline, sorted by trigger time with declaration
    /// order preserved among equal times.
    pub(crate) fn timeline(&self) -> Vec<PlayerAction> {
        let mut actions: Vec<PlayerAction> = self.actions.iter().map(to_player_action).collect();
        actions.sort_by_key(|action| action.time);
        actions
    }
}

fn to_player_action(entry: &ActionEntry) -> PlayerAction {
    match entry {
        ActionEntry::Deploy {
            time,
            operator,
            position,
            direction,
        } => PlayerAction {
            time: seconds(*time),
            operator: operator.clone(),
            op: PlayerOp::Deploy {
                position: GridPos::new(position.row, position.col),
                facing: (*direction).into(),
            },
        },
        ActionEntry::Retreat { time, operator } => PlayerAction {
            time: seconds(*time),
            operator: operator.clone(),
            op: PlayerOp::Retreat,
        },
        ActionEntry::ActivateSkill {
            time,
            operator,
            skill_index,
        } => PlayerAction {
            time: seconds(*time),
            operator: operator.clone(),
            op: PlayerOp::ActivateSkill {
                skill: SkillSlot::new(*skill_index),
            },
        },
    }
}

fn seconds(value: f64) -> Duration {
    Duration::from_secs_f64(value.max(0.0))
}

/// The sample plan written by `--create-example`.
pub(crate) fn example() -> PlanFile {
    PlanFile {
        initial_lives: None,
        operators: vec![
            OperatorEntry {
                operator: "guard".to_owned(),
                custom_id: "guard_1".to_owned(),
                level: 30,
                elite: 0,
                potential: 0,
                skill_level: 4,
                mandatory: false,
            },
            OperatorEntry {
                operator: "caster".to_owned(),
                custom_id: "caster_1".to_owned(),
                level: 50,
                elite: 1,
                potential: 0,
                skill_level: 7,
                mandatory: false,
            },
        ],
        actions: vec![
            ActionEntry::Deploy {
                time: 2.0,
                operator: "guard_1".to_owned(),
                position: PositionEntry { row: 3, col: 2 },
                direction: DirectionEntry::Right,
            },
            ActionEntry::Deploy {
                time: 5.0,
                operator: "caster_1".to_owned(),
                position: PositionEntry { row: 2, col: 1 },
                direction: DirectionEntry::Right,
            },
            ActionEntry::ActivateSkill {
                time: 15.0,
                operator: "caster_1".to_owned(),
                skill_index: 0,
            },
        ],
    }
}
