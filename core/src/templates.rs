//! Entity templates and the pure stat derivation rules.
//!
//! Templates are the read-only input shape describing how a combatant
//! grows: per-elite-phase keyframe tables, potential bonus rows, range
//! shapes and skill definitions. [`derive_stats`] and [`derive_skill`]
//! turn a template plus progression parameters into the concrete
//! [`StatBlock`] and [`SkillSpec`] values a run is built from. Lookups
//! go through an explicitly passed [`TemplateSet`] — there is no global
//! template registry.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::stats::{Stat, StatBlock};
use crate::{DeployKind, HitKind, RangeOffset, RouteId, SetupError};

/// Behavior capabilities of an entity; dispatch keys off these tags
/// rather than off an entity type hierarchy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityTags {
    /// The entity attacks hostile targets.
    pub attacker: bool,
    /// The entity halts enemies standing on its tile.
    pub blocker: bool,
    /// The entity restores allied hit points instead of attacking.
    pub healer: bool,
    /// The entity advances along a route.
    pub mover: bool,
}

/// One row of a phase's growth table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatKeyFrame {
    /// Level this row anchors.
    pub level: u32,
    /// Maximum hit points at the anchored level.
    pub max_hp: f64,
    /// Attack power at the anchored level.
    pub atk: f64,
    /// Flat physical damage reduction at the anchored level.
    pub def: f64,
    /// Arts resistance in percentage points at the anchored level.
    pub res: f64,
    /// Deploy cost at the anchored level.
    pub deploy_cost: u32,
    /// Block capacity at the anchored level.
    pub block_capacity: u32,
    /// Reference seconds between attacks at 100 attack speed.
    pub base_attack_interval: f64,
    /// Attack speed in percentage points; 100 leaves the reference
    /// interval unchanged.
    pub attack_speed: f64,
    /// Movement speed in tiles per second; zero for stationary units.
    pub move_speed: f64,
}

/// Growth data for one elite promotion tier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ElitePhase {
    /// Keyframe rows in ascending level order.
    pub key_frames: Vec<StatKeyFrame>,
    /// Attack range shape, authored facing [`crate::Facing::Right`].
    pub range: Vec<RangeOffset>,
}

/// Attributes a potential rank may raise.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PotentialStat {
    /// Maximum hit points.
    MaxHp,
    /// Attack power.
    Atk,
    /// Flat physical damage reduction.
    Def,
    /// Arts resistance in percentage points.
    Res,
    /// Deploy cost; bonuses here are reductions.
    DeployCost,
}

/// One cumulative potential rank bonus.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PotentialBonus {
    /// Attribute the rank raises.
    pub stat: PotentialStat,
    /// Amount added to the attribute; negative for cost reductions.
    pub amount: f64,
}

/// Trigger model of a skill.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerKind {
    /// Fired by a scripted action once charged.
    Manual,
    /// Fires on its own the moment it is charged.
    Auto,
    /// Never fires; its presence is informational only.
    Passive,
}

/// How a skill accumulates its charge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpChargeKind {
    /// Charge accrues with the passage of time.
    Time,
    /// Charge accrues when the owner lands an attack.
    OnAttack,
    /// Charge accrues when the owner takes damage.
    OnDamage,
    /// Charge accrues when the owner defeats an enemy.
    OnKill,
}

/// Charge parameters of a skill.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpModel {
    /// Accumulation model.
    pub charge: SpChargeKind,
    /// Skill points required per activation.
    pub cost: f64,
    /// Skill points banked when the battle starts.
    pub initial: f64,
    /// Points gained per second or per qualifying event.
    pub gain: f64,
}

/// Lifetime model of a skill activation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum DurationKind {
    /// Effects resolve immediately and the skill ends within the step.
    Instant,
    /// Effects persist for the given span of simulated time.
    Timed(Duration),
    /// Effects persist until the owner lands the given number of hits.
    Ammo(u32),
}

/// One instruction in a skill's effect program.
///
/// Skills are data: each activation is interpreted against this fixed
/// instruction set. Instructions outside the set degrade to a logged
/// no-op rather than failing the run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EffectOp {
    /// Adds a flat amount to one of the owner's stats for the skill's
    /// lifetime.
    StatAdd {
        /// Attribute addressed.
        stat: Stat,
        /// Flat amount added.
        amount: f64,
    },
    /// Scales one of the owner's stats for the skill's lifetime.
    StatScale {
        /// Attribute addressed.
        stat: Stat,
        /// Multiplier applied after additive entries.
        factor: f64,
    },
    /// Immediately restores hit points to the owner.
    Heal {
        /// Healing as a multiple of the owner's effective ATK.
        atk_scale: f64,
    },
    /// Stuns every enemy the owner currently blocks for the skill's
    /// duration.
    StunBlocked,
    /// An effect the engine does not model; ignored with a warning.
    Unmodeled {
        /// Source key of the unmodeled effect, kept for diagnostics.
        key: String,
    },
}

/// One skill at a specific mastery rank.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SkillSpec {
    /// Display name of the skill.
    pub name: String,
    /// Trigger model.
    pub trigger: TriggerKind,
    /// Charge parameters.
    pub sp: SpModel,
    /// Lifetime model.
    pub duration: DurationKind,
    /// Effect program interpreted on activation.
    pub effects: Vec<EffectOp>,
}

/// Per-mastery-rank table for one skill slot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SkillTable {
    /// Rank rows in ascending mastery order; index 0 is rank 1.
    pub levels: Vec<SkillSpec>,
}

/// Immutable growth and behavior description of one entity class.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityTemplate {
    /// Display name of the entity class.
    pub name: String,
    /// Positioning class, matched against tile deployability.
    pub deploy_kind: DeployKind,
    /// Damage classification of the entity's hits.
    pub damage_kind: HitKind,
    /// Behavior capabilities.
    pub capabilities: CapabilityTags,
    /// Growth tables indexed by elite tier.
    pub phases: Vec<ElitePhase>,
    /// Cumulative potential bonuses; rank `p` applies the first `p`.
    pub potential: Vec<PotentialBonus>,
    /// Skill slot tables.
    pub skills: Vec<SkillTable>,
}

impl EntityTemplate {
    /// Lowest level anchored by the requested elite phase, used when a
    /// caller wants an entity at its baseline tier.
    #[must_use]
    pub fn base_level(&self, elite: u8) -> Option<u32> {
        self.phases
            .get(usize::from(elite))
            .and_then(|phase| phase.key_frames.first())
            .map(|frame| frame.level)
    }
}

/// Read-only template registry, passed explicitly wherever derivation
/// happens.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateSet {
    templates: BTreeMap<String, EntityTemplate>,
}

impl TemplateSet {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a template under the provided identifier, replacing
    /// any previous entry.
    pub fn insert(&mut self, id: impl Into<String>, template: EntityTemplate) {
        let _ = self.templates.insert(id.into(), template);
    }

    /// Looks up a template, failing with a setup error when absent.
    pub fn get(&self, id: &str) -> Result<&EntityTemplate, SetupError> {
        self.templates.get(id).ok_or_else(|| SetupError::UnknownTemplate {
            id: id.to_owned(),
        })
    }

    /// Number of registered templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Reports whether the registry holds no templates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// Derives the concrete stats of an entity at the requested progression.
///
/// The elite tier selects a phase; stats interpolate linearly between
/// the keyframes bracketing `level` (exact keyframe levels are returned
/// as-is); the potential rank then applies its cumulative bonuses. The
/// attack interval resolves as `base_attack_interval * 100 /
/// attack_speed`, quantized to whole milliseconds.
///
/// Fails with [`SetupError::InvalidTemplate`] when the phase is absent,
/// its table is empty, or `level` falls outside the table's span.
pub fn derive_stats(
    id: &str,
    template: &EntityTemplate,
    level: u32,
    elite: u8,
    potential: u8,
) -> Result<StatBlock, SetupError> {
    let invalid = || SetupError::InvalidTemplate {
        id: id.to_owned(),
        elite,
        level,
    };

    let phase = template.phases.get(usize::from(elite)).ok_or_else(invalid)?;
    let frames = &phase.key_frames;
    let (first, last) = match (frames.first(), frames.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(invalid()),
    };

    if level < first.level || level > last.level {
        return Err(invalid());
    }

    let upper_index = frames
        .iter()
        .position(|frame| frame.level >= level)
        .ok_or_else(invalid)?;
    let upper = &frames[upper_index];
    let lower = if upper.level == level {
        upper
    } else {
        &frames[upper_index.saturating_sub(1)]
    };

    let t = if upper.level == lower.level {
        0.0
    } else {
        f64::from(level - lower.level) / f64::from(upper.level - lower.level)
    };

    let mut max_hp = lerp(lower.max_hp, upper.max_hp, t);
    let mut atk = lerp(lower.atk, upper.atk, t);
    let mut def = lerp(lower.def, upper.def, t);
    let mut res = lerp(lower.res, upper.res, t);
    let mut deploy_cost = f64::from(lower.deploy_cost);

    for bonus in template.potential.iter().take(usize::from(potential)) {
        match bonus.stat {
            PotentialStat::MaxHp => max_hp += bonus.amount,
            PotentialStat::Atk => atk += bonus.amount,
            PotentialStat::Def => def += bonus.amount,
            PotentialStat::Res => res += bonus.amount,
            PotentialStat::DeployCost => deploy_cost += bonus.amount,
        }
    }

    Ok(StatBlock {
        max_hp,
        atk,
        def,
        res,
        attack_interval: attack_interval(lower.base_attack_interval, lower.attack_speed),
        move_speed: lerp(lower.move_speed, upper.move_speed, t),
        deploy_cost: deploy_cost.max(0.0) as u32,
        block_capacity: lower.block_capacity,
    })
}

/// Derives the [`SkillSpec`] for one slot at the requested mastery rank.
///
/// Ranks beyond the table clamp to its last row. Fails with
/// [`SetupError::InvalidTemplate`] when the slot's table is empty.
pub fn derive_skill(
    id: &str,
    table: &SkillTable,
    skill_level: u8,
) -> Result<SkillSpec, SetupError> {
    if table.levels.is_empty() {
        return Err(SetupError::InvalidTemplate {
            id: id.to_owned(),
            elite: 0,
            level: u32::from(skill_level),
        });
    }

    let index = usize::from(skill_level.saturating_sub(1)).min(table.levels.len() - 1);
    Ok(table.levels[index].clone())
}

/// Seed for one roster unit, produced by the driver from an operator
/// configuration and consumed by the world when building initial state.
#[derive(Clone, Debug)]
pub struct UnitSeed {
    /// Caller-supplied custom id, used in reporting.
    pub name: String,
    /// Derived base stats.
    pub stats: StatBlock,
    /// Positioning class.
    pub deploy_kind: DeployKind,
    /// Damage classification of the unit's hits.
    pub damage_kind: HitKind,
    /// Behavior capabilities.
    pub capabilities: CapabilityTags,
    /// Attack range shape facing right, before deploy rotation.
    pub range: Vec<RangeOffset>,
    /// Skill specs at the configured mastery rank, one per slot.
    pub skills: Vec<SkillSpec>,
    /// Losing this unit to damage loses the run.
    pub mandatory: bool,
}

/// Seed for one scheduled enemy, produced by compiling the level's wave
/// structure into absolute spawn times.
#[derive(Clone, Debug)]
pub struct SpawnSeed {
    /// Template identifier of the enemy class, kept for reporting.
    pub key: String,
    /// Absolute simulated time at which the enemy enters the field.
    pub time: Duration,
    /// Derived stats.
    pub stats: StatBlock,
    /// Damage classification of the enemy's hits.
    pub damage_kind: HitKind,
    /// Route the enemy follows.
    pub route: RouteId,
}

fn lerp(lower: f64, upper: f64, t: f64) -> f64 {
    lower + (upper - lower) * t
}

fn attack_interval(base_interval: f64, attack_speed: f64) -> Duration {
    let speed = if attack_speed > 0.0 { attack_speed } else { 100.0 };
    let seconds = base_interval * 100.0 / speed;
    Duration::from_millis((seconds * 1000.0).round().max(0.0) as u64)
}

#[cfg(test)]
mod tests {
    use super::{
        derive_skill, derive_stats, CapabilityTags, DurationKind, EffectOp, ElitePhase,
        EntityTemplate, PotentialBonus, PotentialStat, SkillSpec, SkillTable, SpChargeKind,
        SpModel, StatKeyFrame, TemplateSet, TriggerKind,
    };
    use crate::stats::Stat;
    use crate::{DeployKind, HitKind, RangeOffset, SetupError};
    use std::time::Duration;

    fn frame(level: u32, max_hp: f64, atk: f64) -> StatKeyFrame {
        StatKeyFrame {
            level,
            max_hp,
            atk,
            def: 100.0,
            res: 0.0,
            deploy_cost: 10,
            block_capacity: 2,
            base_attack_interval: 1.2,
            attack_speed: 100.0,
            move_speed: 0.0,
        }
    }

    fn template() -> EntityTemplate {
        EntityTemplate {
            name: "Test Guard".to_owned(),
            deploy_kind: DeployKind::Melee,
            damage_kind: HitKind::Physical,
            capabilities: CapabilityTags {
                attacker: true,
                blocker: true,
                healer: false,
                mover: false,
            },
            phases: vec![ElitePhase {
                key_frames: vec![frame(1, 1000.0, 300.0), frame(50, 2000.0, 500.0)],
                range: vec![RangeOffset::new(0, 0), RangeOffset::new(0, 1)],
            }],
            potential: vec![
                PotentialBonus {
                    stat: PotentialStat::DeployCost,
                    amount: -1.0,
                },
                PotentialBonus {
                    stat: PotentialStat::Atk,
                    amount: 25.0,
                },
            ],
            skills: vec![SkillTable {
                levels: vec![SkillSpec {
                    name: "Power Strike".to_owned(),
                    trigger: TriggerKind::Manual,
                    sp: SpModel {
                        charge: SpChargeKind::Time,
                        cost: 30.0,
                        initial: 10.0,
                        gain: 1.0,
                    },
                    duration: DurationKind::Timed(Duration::from_secs(20)),
                    effects: vec![EffectOp::StatScale {
                        stat: Stat::Atk,
                        factor: 1.5,
                    }],
                }],
            }],
        }
    }

    #[test]
    fn exact_keyframe_levels_are_returned_verbatim() {
        let stats = derive_stats("test", &template(), 1, 0, 0).expect("derives");
        assert_eq!(stats.max_hp, 1000.0);
        assert_eq!(stats.atk, 300.0);

        let stats = derive_stats("test", &template(), 50, 0, 0).expect("derives");
        assert_eq!(stats.max_hp, 2000.0);
        assert_eq!(stats.atk, 500.0);
    }

    #[test]
    fn intermediate_levels_interpolate_linearly() {
        // Level 25 sits 24/49 of the way from level 1 to level 50.
        let stats = derive_stats("test", &template(), 25, 0, 0).expect("derives");
        let t = 24.0 / 49.0;
        assert_eq!(stats.max_hp, 1000.0 + 1000.0 * t);
        assert_eq!(stats.atk, 300.0 + 200.0 * t);
    }

    #[test]
    fn missing_phase_is_a_setup_error() {
        let error = derive_stats("test", &template(), 1, 3, 0).expect_err("no phase 3");
        assert_eq!(
            error,
            SetupError::InvalidTemplate {
                id: "test".to_owned(),
                elite: 3,
                level: 1,
            }
        );
    }

    #[test]
    fn out_of_range_level_is_a_setup_error() {
        assert!(derive_stats("test", &template(), 0, 0, 0).is_err());
        assert!(derive_stats("test", &template(), 51, 0, 0).is_err());
    }

    #[test]
    fn potential_ranks_apply_cumulatively() {
        let none = derive_stats("test", &template(), 1, 0, 0).expect("derives");
        assert_eq!(none.deploy_cost, 10);
        assert_eq!(none.atk, 300.0);

        let one = derive_stats("test", &template(), 1, 0, 1).expect("derives");
        assert_eq!(one.deploy_cost, 9);
        assert_eq!(one.atk, 300.0);

        let two = derive_stats("test", &template(), 1, 0, 2).expect("derives");
        assert_eq!(two.deploy_cost, 9);
        assert_eq!(two.atk, 325.0);
    }

    #[test]
    fn attack_interval_scales_with_attack_speed() {
        let mut custom = template();
        custom.phases[0].key_frames[0].attack_speed = 120.0;
        let stats = derive_stats("test", &custom, 1, 0, 0).expect("derives");
        assert_eq!(stats.attack_interval, Duration::from_millis(1000));

        let stats = derive_stats("test", &template(), 1, 0, 0).expect("derives");
        assert_eq!(stats.attack_interval, Duration::from_millis(1200));
    }

    #[test]
    fn skill_rank_clamps_to_table_length() {
        let spec = derive_skill("test", &template().skills[0], 7).expect("derives");
        assert_eq!(spec.name, "Power Strike");
    }

    #[test]
    fn empty_skill_table_is_a_setup_error() {
        let table = SkillTable { levels: Vec::new() };
        assert!(derive_skill("test", &table, 1).is_err());
    }

    #[test]
    fn template_set_lookup_reports_unknown_ids() {
        let mut set = TemplateSet::new();
        set.insert("guard", template());
        assert!(set.get("guard").is_ok());
        assert_eq!(set.len(), 1);
        assert!(!set.is_empty());

        let error = set.get("missing").expect_err("unknown id");
        assert_eq!(
            error,
            SetupError::UnknownTemplate {
                id: "missing".to_owned(),
            }
        );
    }

    #[test]
    fn base_level_reads_the_first_keyframe() {
        assert_eq!(template().base_level(0), Some(1));
        assert_eq!(template().base_level(2), None);
    }
}
