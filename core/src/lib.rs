#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Gatefall battle simulator.
//!
//! This crate defines the message surface that connects the authoritative
//! battle state, the pure systems, and the engine that drives them. The
//! engine and systems submit [`Command`] values describing desired
//! mutations, the world executes those commands via its `apply` entry
//! point, and then broadcasts [`Event`] values for systems to react to
//! deterministically. Systems consume event streams, query immutable
//! snapshots, and respond exclusively with new command batches.
//!
//! The crate also carries the pure half of the entity model: stat
//! vocabulary and the reversible modifier stack ([`stats`]), and entity
//! templates with their derivation rules ([`templates`]).

pub mod level;
pub mod stats;
pub mod templates;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use crate::level::{
    compile_spawn_times, CompiledSpawn, FragmentSpec, LevelData, LevelOptions, RouteSpec,
    SpawnActionSpec, TileSpec, WaveSpec,
};
pub use crate::stats::{ModifierHandle, ModifierOp, Stat, StatBlock, StatModifier, StatSheet};
pub use crate::templates::{
    derive_skill, derive_stats, CapabilityTags, DurationKind, EffectOp, ElitePhase,
    EntityTemplate, PotentialBonus, PotentialStat, SkillSpec, SkillTable, SpChargeKind, SpModel,
    SpawnSeed, StatKeyFrame, TemplateSet, TriggerKind, UnitSeed,
};

/// Canonical banner emitted when the simulator boots.
pub const WELCOME_BANNER: &str = "Gatefall battle simulator.";

/// Fraction of ATK that physical damage never drops below.
pub const MIN_DAMAGE_FRACTION: f64 = 0.05;

/// Unique identifier assigned to a player unit, in roster order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(u32);

impl UnitId {
    /// Creates a new unit identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to an enemy, in spawn order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EnemyId(u32);

impl EnemyId {
    /// Creates a new enemy identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Index of a precomputed enemy route within the level topology.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RouteId(u32);

impl RouteId {
    /// Creates a new route index wrapper.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the underlying route index.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Position of an entry within the compiled spawn schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpawnIndex(u32);

impl SpawnIndex {
    /// Creates a new spawn schedule index.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the underlying schedule position.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Index of a skill slot on a unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SkillSlot(u8);

impl SkillSlot {
    /// Creates a new skill slot index.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// Retrieves the underlying slot index.
    #[must_use]
    pub const fn get(&self) -> u8 {
        self.0
    }
}

/// Reference to a live combatant of either side.
///
/// The derived ordering (units before enemies, then ascending id) is the
/// canonical entity order used whenever a simultaneous batch of acts must
/// be dispatched deterministically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityRef {
    /// A player unit identified by its roster id.
    Unit(UnitId),
    /// An enemy identified by its spawn id.
    Enemy(EnemyId),
}

/// Location of a single grid tile expressed as row and column coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPos {
    row: u32,
    col: u32,
}

impl GridPos {
    /// Creates a new grid position.
    #[must_use]
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Zero-based row index of the tile.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    /// Zero-based column index of the tile.
    #[must_use]
    pub const fn col(&self) -> u32 {
        self.col
    }

    /// Applies a relative offset, returning `None` when the result would
    /// leave the non-negative coordinate space.
    #[must_use]
    pub fn offset_by(self, offset: RangeOffset) -> Option<GridPos> {
        let row = i64::from(self.row) + i64::from(offset.row_delta());
        let col = i64::from(self.col) + i64::from(offset.col_delta());
        if row < 0 || col < 0 {
            return None;
        }
        Some(GridPos::new(u32::try_from(row).ok()?, u32::try_from(col).ok()?))
    }
}

/// Relative tile offset used by attack range shapes.
///
/// Offsets are authored for a unit facing [`Facing::Right`]; positive
/// columns extend forward and positive rows extend toward the bottom of
/// the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RangeOffset {
    row_delta: i32,
    col_delta: i32,
}

impl RangeOffset {
    /// Creates a new relative offset.
    #[must_use]
    pub const fn new(row_delta: i32, col_delta: i32) -> Self {
        Self {
            row_delta,
            col_delta,
        }
    }

    /// Row component of the offset.
    #[must_use]
    pub const fn row_delta(&self) -> i32 {
        self.row_delta
    }

    /// Column component of the offset.
    #[must_use]
    pub const fn col_delta(&self) -> i32 {
        self.col_delta
    }
}

/// Deploy direction of a unit, controlling range shape rotation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Facing {
    /// Facing toward increasing column indices. Range shapes are
    /// authored for this direction.
    Right,
    /// Facing toward increasing row indices.
    Down,
    /// Facing toward decreasing column indices.
    Left,
    /// Facing toward decreasing row indices.
    Up,
}

impl Facing {
    /// Rotates a right-facing range offset into this direction.
    ///
    /// Each step from [`Facing::Right`] is a quarter-turn clockwise on
    /// the grid: `Right -> Down -> Left -> Up`.
    #[must_use]
    pub const fn rotate(self, offset: RangeOffset) -> RangeOffset {
        let (row, col) = (offset.row_delta, offset.col_delta);
        match self {
            Self::Right => RangeOffset::new(row, col),
            Self::Down => RangeOffset::new(col, -row),
            Self::Left => RangeOffset::new(-row, -col),
            Self::Up => RangeOffset::new(-col, row),
        }
    }
}

/// Terrain classification of a single tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileKind {
    /// Ground-level tile that enemies traverse.
    Road,
    /// Elevated tile reachable only by ranged deployments.
    Highland,
    /// Tile that neither side may enter or occupy.
    Forbidden,
    /// Ground-level tile with concealment foliage.
    Grass,
    /// Pit tile; traversable by route but never deployable.
    Hole,
}

/// Deployability classification of a tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeployClass {
    /// No unit may be deployed here.
    None,
    /// Only melee units may be deployed here.
    Melee,
    /// Only ranged units may be deployed here.
    Ranged,
    /// Any unit may be deployed here.
    Any,
}

/// Positioning class of a unit, matched against [`DeployClass`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeployKind {
    /// Ground-level unit that blocks and fights in melee.
    Melee,
    /// Elevated unit that attacks from range.
    Ranged,
}

impl DeployClass {
    /// Reports whether a unit of the provided kind may be placed on a
    /// tile of this class.
    #[must_use]
    pub const fn admits(self, kind: DeployKind) -> bool {
        match self {
            Self::None => false,
            Self::Any => true,
            Self::Melee => matches!(kind, DeployKind::Melee),
            Self::Ranged => matches!(kind, DeployKind::Ranged),
        }
    }
}

/// Classification of a damaging hit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HitKind {
    /// Damage reduced by the defender's DEF.
    Physical,
    /// Damage reduced by the defender's RES percentage.
    Arts,
}

/// Commands that express all permissible battle state mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Advances the simulation clock by the provided delta time,
    /// updating every time-driven accumulator.
    Tick {
        /// Duration of simulated time elapsed since the previous advance.
        dt: Duration,
    },
    /// Requests placement of a roster unit on a tile.
    Deploy {
        /// Unit to place.
        unit: UnitId,
        /// Tile that the unit should occupy.
        position: GridPos,
        /// Direction the unit should face.
        facing: Facing,
    },
    /// Requests withdrawal of a deployed unit.
    Retreat {
        /// Unit to withdraw.
        unit: UnitId,
    },
    /// Requests activation of one of a unit's skills.
    ActivateSkill {
        /// Unit whose skill should fire.
        unit: UnitId,
        /// Slot of the skill to fire.
        skill: SkillSlot,
    },
    /// Ends a timed skill, unwinding the modifiers it applied.
    ExpireSkill {
        /// Unit whose skill has run out.
        unit: UnitId,
        /// Slot of the expiring skill.
        skill: SkillSlot,
    },
    /// Requests that a scheduled enemy enter the field.
    SpawnEnemy {
        /// Schedule entry to materialize.
        spawn: SpawnIndex,
    },
    /// Requests that an enemy advance one waypoint along its route.
    StepEnemy {
        /// Enemy attempting to advance.
        enemy: EnemyId,
    },
    /// Applies a resolved hit to a defender.
    Strike {
        /// Entity dealing the hit.
        attacker: EntityRef,
        /// Entity receiving the hit.
        target: EntityRef,
        /// Damage classification of the hit.
        kind: HitKind,
        /// Resolved damage amount before the defender's floor clamp.
        amount: f64,
    },
    /// Applies a resolved heal to a friendly unit.
    HealUnit {
        /// Unit providing the heal.
        healer: UnitId,
        /// Unit receiving the heal.
        target: UnitId,
        /// Resolved healing amount before the missing-HP clamp.
        amount: f64,
    },
}

/// Player-visible classification of a scripted action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    /// Placement of a roster unit.
    Deploy,
    /// Withdrawal of a deployed unit.
    Retreat,
    /// Manual skill activation.
    ActivateSkill,
}

/// Reasons an individual scripted action may be rejected.
///
/// Rejections are never fatal: the action is skipped, logged, and the
/// simulation continues.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectReason {
    /// The action referenced a custom id absent from the roster.
    UnknownUnit,
    /// The target tile lies outside the grid.
    OutOfBounds,
    /// The target tile does not admit deployments.
    NotDeployable,
    /// The target tile admits deployments of the other positioning class.
    DeployKindMismatch,
    /// The target tile is already occupied by a unit.
    Occupied,
    /// The unit is already standing on the field.
    AlreadyDeployed,
    /// The unit is not currently deployed.
    NotDeployed,
    /// The unit has been defeated and cannot return.
    UnitDefeated,
    /// Deploy cost exceeds the currently available amount.
    InsufficientCost,
    /// The concurrent deployment cap has been reached.
    RosterFull,
    /// The skill slot does not exist on the unit.
    UnknownSkill,
    /// The skill has not accumulated the charge it needs.
    SkillNotReady,
    /// The skill is passive and can never be activated.
    SkillPassive,
}

/// Status conditions that suppress entity behavior while present.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusKind {
    /// The entity can neither move nor attack.
    Stunned,
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed.
        dt: Duration,
    },
    /// Confirms that a unit was placed on the field.
    Deployed {
        /// Unit that entered the field.
        unit: UnitId,
        /// Tile the unit occupies.
        position: GridPos,
        /// Direction the unit faces.
        facing: Facing,
    },
    /// Confirms that a unit left the field voluntarily.
    Retreated {
        /// Unit that withdrew.
        unit: UnitId,
    },
    /// Reports that a scripted action was rejected and skipped.
    ActionRejected {
        /// Classification of the rejected action.
        action: ActionKind,
        /// Unit the action referenced, when it resolved to one.
        unit: Option<UnitId>,
        /// Specific reason the action was rejected.
        reason: RejectReason,
    },
    /// Confirms that a skill fired.
    SkillActivated {
        /// Unit whose skill fired.
        unit: UnitId,
        /// Slot of the skill that fired.
        skill: SkillSlot,
        /// Absolute expiry time for timed skills; `None` for instant
        /// and ammunition-bound skills.
        until: Option<Duration>,
    },
    /// Confirms that an active skill ended and its modifiers unwound.
    SkillExpired {
        /// Unit whose skill ended.
        unit: UnitId,
        /// Slot of the skill that ended.
        skill: SkillSlot,
    },
    /// Warns that a skill carried an effect the engine does not model.
    EffectIgnored {
        /// Unit whose skill carried the effect.
        unit: UnitId,
        /// Slot of the skill carrying the effect.
        skill: SkillSlot,
    },
    /// Confirms that a scheduled enemy entered the field.
    EnemySpawned {
        /// Identifier assigned to the new enemy.
        enemy: EnemyId,
        /// Schedule entry that produced it.
        spawn: SpawnIndex,
        /// Route waypoint the enemy starts on.
        position: GridPos,
    },
    /// Confirms that an enemy advanced one waypoint.
    EnemyAdvanced {
        /// Enemy that moved.
        enemy: EnemyId,
        /// Tile the enemy left.
        from: GridPos,
        /// Tile the enemy now occupies.
        to: GridPos,
    },
    /// Reports that an enemy reached the exit and cost a life.
    EnemyLeaked {
        /// Enemy that escaped; it is no longer on the field.
        enemy: EnemyId,
        /// Lives remaining after the leak.
        lives_remaining: u32,
    },
    /// Confirms that an enemy was halted by a blocking unit.
    EnemyBlocked {
        /// Enemy that was halted.
        enemy: EnemyId,
        /// Unit now blocking it.
        unit: UnitId,
    },
    /// Confirms that a block relation was dissolved.
    BlockReleased {
        /// Enemy that resumed movement.
        enemy: EnemyId,
        /// Unit that had been blocking it.
        unit: UnitId,
    },
    /// Reports a resolved hit landing on a defender.
    DamageDealt {
        /// Entity that dealt the hit.
        attacker: EntityRef,
        /// Entity that received the hit.
        target: EntityRef,
        /// Damage classification of the hit.
        kind: HitKind,
        /// Hit points removed after clamping.
        amount: u32,
        /// Defender hit points remaining after the hit.
        remaining_hp: u32,
    },
    /// Reports a resolved heal landing on a unit.
    UnitHealed {
        /// Unit that provided the heal.
        healer: UnitId,
        /// Unit that received the heal.
        target: UnitId,
        /// Hit points restored after the missing-HP clamp.
        amount: u32,
    },
    /// Reports that an enemy died to damage.
    EnemyDefeated {
        /// Enemy removed from the field.
        enemy: EnemyId,
    },
    /// Reports that a unit died and was removed from the field.
    UnitDefeated {
        /// Unit removed from the field.
        unit: UnitId,
    },
    /// Reports that a status condition took hold of an entity.
    StatusApplied {
        /// Entity the status attached to.
        target: EntityRef,
        /// Condition that took hold.
        status: StatusKind,
        /// Absolute time at which the condition lapses.
        until: Duration,
    },
}

/// Terminal classification of a simulation run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    /// Every spawn was defeated or absorbed and lives remained.
    Won,
    /// A defeat condition triggered before the schedule completed.
    Lost,
    /// The simulated-time ceiling elapsed with events still pending.
    TimedOut,
}

/// Machine-readable cause attached to non-winning verdicts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureReason {
    /// Remaining lives dropped to zero.
    LivesExhausted,
    /// A unit the plan marked as mandatory was defeated.
    MandatoryUnitLost,
    /// The simulated-time ceiling elapsed.
    Timeout,
}

/// Scripted instruction consumed from the action timeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerAction {
    /// Simulated time at which the action triggers.
    pub time: Duration,
    /// Caller-supplied custom id of the operator the action references.
    pub operator: String,
    /// Operation to perform.
    pub op: PlayerOp,
}

/// Type-specific payload of a [`PlayerAction`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PlayerOp {
    /// Place the operator on a tile.
    Deploy {
        /// Tile to occupy.
        position: GridPos,
        /// Direction to face.
        facing: Facing,
    },
    /// Withdraw the operator from the field.
    Retreat,
    /// Manually fire one of the operator's skills.
    ActivateSkill {
        /// Slot of the skill to fire.
        skill: SkillSlot,
    },
}

impl PlayerAction {
    /// Player-visible classification of this action.
    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        match self.op {
            PlayerOp::Deploy { .. } => ActionKind::Deploy,
            PlayerOp::Retreat => ActionKind::Retreat,
            PlayerOp::ActivateSkill { .. } => ActionKind::ActivateSkill,
        }
    }
}

/// Progression parameters selecting an operator's growth table rows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OperatorConfig {
    /// Template identifier the operator is derived from.
    pub operator: String,
    /// Caller-supplied id that the action timeline references.
    pub custom_id: String,
    /// Level within the selected elite phase.
    pub level: u32,
    /// Elite promotion tier.
    pub elite: u8,
    /// Potential rank selecting cumulative bonus rows.
    pub potential: u8,
    /// Skill mastery rank shared by all skill slots.
    pub skill_level: u8,
    /// When set, losing this operator to damage loses the run.
    pub mandatory: bool,
}

/// How a resolved assignment affects its target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AssignmentKind {
    /// The attacker damages the target.
    Attack,
    /// The attacker restores the target's hit points.
    Heal,
}

/// One attacker paired with the target its priority rules selected.
///
/// Produced by the targeting system from snapshots; the combat system
/// turns assignments of ready attackers into strike and heal commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AttackAssignment {
    /// Entity that acts.
    pub attacker: EntityRef,
    /// Entity acted upon.
    pub target: EntityRef,
    /// Whether the act damages or heals.
    pub kind: AssignmentKind,
}

/// Priority rule a unit uses to order in-range enemies.
///
/// Ties after the primary key always break toward the earliest spawn
/// id, so every ordering is total and reproducible.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetingPolicy {
    /// Prefer enemies the unit is blocking, then the enemy furthest
    /// along its route.
    #[default]
    PathProgress,
    /// Prefer enemies the unit is blocking, then the enemy closest to
    /// the unit's tile.
    AttackerDistance,
}

/// Immutable representation of one skill slot's state used for queries.
#[derive(Clone, Debug, PartialEq)]
pub struct SkillStateSnapshot {
    /// Slot the skill occupies.
    pub slot: SkillSlot,
    /// Trigger model of the skill.
    pub trigger: TriggerKind,
    /// Accumulated skill points.
    pub sp: f64,
    /// Skill points required per activation.
    pub sp_cost: f64,
    /// Whether the skill currently holds enough charge to fire.
    pub charged: bool,
    /// Whether the skill is currently active.
    pub active: bool,
}

/// Immutable representation of a single unit's state used for queries.
#[derive(Clone, Debug, PartialEq)]
pub struct UnitSnapshot {
    /// Unique identifier assigned to the unit.
    pub id: UnitId,
    /// Tile occupied while deployed.
    pub position: Option<GridPos>,
    /// Direction faced while deployed.
    pub facing: Facing,
    /// Current hit points.
    pub hp: u32,
    /// Effective stats after the active modifier stack.
    pub stats: StatBlock,
    /// Damage classification of the unit's hits.
    pub damage_kind: HitKind,
    /// Behavior capabilities of the unit.
    pub capabilities: CapabilityTags,
    /// Range offsets already rotated into the deploy facing.
    pub range: Vec<RangeOffset>,
    /// Time remaining until the next attack may fire.
    pub cooldown: Duration,
    /// Enemies currently held by this unit, in ascending id order.
    pub blocked: Vec<EnemyId>,
    /// Per-slot skill state.
    pub skills: Vec<SkillStateSnapshot>,
    /// Whether the unit currently stands on the field.
    pub deployed: bool,
    /// Whether the unit is alive.
    pub alive: bool,
}

/// Read-only snapshot describing all roster units.
#[derive(Clone, Debug, Default)]
pub struct UnitView {
    snapshots: Vec<UnitSnapshot>,
}

impl UnitView {
    /// Creates a new unit view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<UnitSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured unit snapshots in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &UnitSnapshot> {
        self.snapshots.iter()
    }

    /// Looks up a snapshot by unit id.
    #[must_use]
    pub fn get(&self, id: UnitId) -> Option<&UnitSnapshot> {
        self.snapshots
            .binary_search_by_key(&id, |snapshot| snapshot.id)
            .ok()
            .map(|index| &self.snapshots[index])
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<UnitSnapshot> {
        self.snapshots
    }
}

/// Immutable representation of a single enemy's state used for queries.
#[derive(Clone, Debug, PartialEq)]
pub struct EnemySnapshot {
    /// Unique identifier assigned to the enemy.
    pub id: EnemyId,
    /// Route waypoint the enemy currently occupies.
    pub position: GridPos,
    /// Index of the occupied waypoint within the route.
    pub waypoint: usize,
    /// Number of waypoints in the enemy's route.
    pub route_len: usize,
    /// Fractional progress toward the next waypoint.
    pub progress: f64,
    /// Current hit points.
    pub hp: u32,
    /// Effective stats after the active modifier stack.
    pub stats: StatBlock,
    /// Damage classification of the enemy's hits.
    pub damage_kind: HitKind,
    /// Time remaining until the next attack may fire.
    pub cooldown: Duration,
    /// Unit currently blocking this enemy, if any.
    pub blocked_by: Option<UnitId>,
    /// Whether the enemy is held by a stun condition.
    pub stunned: bool,
    /// Whether the enemy has banked enough progress to advance.
    pub ready_to_step: bool,
}

impl EnemySnapshot {
    /// Total route progress used as the targeting priority key.
    ///
    /// Whole waypoints already traversed plus the fractional progress
    /// banked toward the next one; larger values are nearer the exit.
    #[must_use]
    pub fn goal_progress(&self) -> f64 {
        self.waypoint as f64 + self.progress
    }
}

/// Read-only snapshot describing all live enemies.
#[derive(Clone, Debug, Default)]
pub struct EnemyView {
    snapshots: Vec<EnemySnapshot>,
}

impl EnemyView {
    /// Creates a new enemy view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<EnemySnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured enemy snapshots in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &EnemySnapshot> {
        self.snapshots.iter()
    }

    /// Looks up a snapshot by enemy id.
    #[must_use]
    pub fn get(&self, id: EnemyId) -> Option<&EnemySnapshot> {
        self.snapshots
            .binary_search_by_key(&id, |snapshot| snapshot.id)
            .ok()
            .map(|index| &self.snapshots[index])
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<EnemySnapshot> {
        self.snapshots
    }
}

/// Fatal problems detected before the simulation starts.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum SetupError {
    /// The template lacks growth data for the requested tier.
    #[error("template `{id}` has no tier data for elite {elite} level {level}")]
    InvalidTemplate {
        /// Template identifier that failed derivation.
        id: String,
        /// Requested elite phase.
        elite: u8,
        /// Requested level.
        level: u32,
    },
    /// An operator config or spawn referenced an unknown template.
    #[error("unknown template id `{id}`")]
    UnknownTemplate {
        /// Identifier that failed the lookup.
        id: String,
    },
    /// A spawn action referenced a route the level does not define.
    #[error("spawn references undefined route {route:?}")]
    UnknownRoute {
        /// Route index that failed the lookup.
        route: RouteId,
    },
    /// A route waypoint lies outside the level grid.
    #[error("route {route:?} leaves the {rows}x{cols} grid")]
    RouteOutOfBounds {
        /// Route index with the offending waypoint.
        route: RouteId,
        /// Grid height in tiles.
        rows: u32,
        /// Grid width in tiles.
        cols: u32,
    },
    /// Two operator configs share a custom id.
    #[error("duplicate custom id `{custom_id}` in operator configs")]
    DuplicateCustomId {
        /// The id that appears more than once.
        custom_id: String,
    },
    /// The action timeline is not sorted by trigger time.
    #[error("action timeline is unordered at index {index}")]
    UnorderedTimeline {
        /// Index of the first action that precedes its predecessor.
        index: usize,
    },
}

/// Runtime invariant breaches that halt the simulation as defects.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum InvariantViolation {
    /// Two units claim the same tile.
    #[error("units {first:?} and {second:?} both occupy {position:?}")]
    DuplicateOccupancy {
        /// Unit recorded first on the tile.
        first: UnitId,
        /// Unit recorded second on the tile.
        second: UnitId,
        /// The contested tile.
        position: GridPos,
    },
    /// A unit holds more enemies than its block capacity allows.
    #[error("unit {unit:?} blocks {held} enemies with capacity {capacity}")]
    BlockCapacityExceeded {
        /// The overloaded unit.
        unit: UnitId,
        /// Number of enemies held.
        held: usize,
        /// Block capacity of the unit.
        capacity: u32,
    },
    /// A block relation is recorded on only one of its two sides.
    #[error("block relation between {unit:?} and {enemy:?} is one-sided")]
    AsymmetricBlock {
        /// Unit side of the relation.
        unit: UnitId,
        /// Enemy side of the relation.
        enemy: EnemyId,
    },
    /// An entity flagged alive carries zero hit points.
    #[error("{entity:?} is alive at zero hit points")]
    DeadEntityAlive {
        /// The offending entity.
        entity: EntityRef,
    },
}

#[cfg(test)]
mod tests {
    use super::{
        DeployClass, DeployKind, EnemyId, EntityRef, Facing, GridPos, RangeOffset, RejectReason,
        SkillSlot, UnitId, Verdict,
    };
    use serde::{de::DeserializeOwned, Serialize};

    fn assert_round_trip<T>(value: &T)
    where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let bytes = bincode::serialize(value).expect("serialize");
        let restored: T = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(&restored, value);
    }

    #[test]
    fn unit_id_round_trips_through_bincode() {
        assert_round_trip(&UnitId::new(42));
    }

    #[test]
    fn enemy_id_round_trips_through_bincode() {
        assert_round_trip(&EnemyId::new(7));
    }

    #[test]
    fn reject_reason_round_trips_through_bincode() {
        assert_round_trip(&RejectReason::InsufficientCost);
    }

    #[test]
    fn verdict_round_trips_through_bincode() {
        assert_round_trip(&Verdict::TimedOut);
    }

    #[test]
    fn grid_pos_round_trips_through_bincode() {
        assert_round_trip(&GridPos::new(3, 9));
    }

    #[test]
    fn entity_order_puts_units_before_enemies() {
        let unit = EntityRef::Unit(UnitId::new(99));
        let enemy = EntityRef::Enemy(EnemyId::new(0));
        assert!(unit < enemy);
        assert!(EntityRef::Unit(UnitId::new(0)) < EntityRef::Unit(UnitId::new(1)));
        assert!(EntityRef::Enemy(EnemyId::new(3)) < EntityRef::Enemy(EnemyId::new(4)));
    }

    #[test]
    fn facing_rotation_turns_forward_offsets() {
        let forward = RangeOffset::new(0, 1);
        assert_eq!(Facing::Right.rotate(forward), RangeOffset::new(0, 1));
        assert_eq!(Facing::Down.rotate(forward), RangeOffset::new(1, 0));
        assert_eq!(Facing::Left.rotate(forward), RangeOffset::new(0, -1));
        assert_eq!(Facing::Up.rotate(forward), RangeOffset::new(-1, 0));
    }

    #[test]
    fn facing_rotation_preserves_side_offsets() {
        let side = RangeOffset::new(1, 2);
        assert_eq!(Facing::Down.rotate(side), RangeOffset::new(2, -1));
        assert_eq!(Facing::Left.rotate(side), RangeOffset::new(-1, -2));
        assert_eq!(Facing::Up.rotate(side), RangeOffset::new(-2, 1));
    }

    #[test]
    fn offset_application_rejects_negative_coordinates() {
        let origin = GridPos::new(0, 2);
        assert_eq!(
            origin.offset_by(RangeOffset::new(0, -2)),
            Some(GridPos::new(0, 0))
        );
        assert_eq!(origin.offset_by(RangeOffset::new(-1, 0)), None);
    }

    #[test]
    fn deploy_classes_admit_matching_kinds() {
        assert!(DeployClass::Any.admits(DeployKind::Melee));
        assert!(DeployClass::Any.admits(DeployKind::Ranged));
        assert!(DeployClass::Melee.admits(DeployKind::Melee));
        assert!(!DeployClass::Melee.admits(DeployKind::Ranged));
        assert!(DeployClass::Ranged.admits(DeployKind::Ranged));
        assert!(!DeployClass::Ranged.admits(DeployKind::Melee));
        assert!(!DeployClass::None.admits(DeployKind::Melee));
    }

    #[test]
    fn skill_slot_round_trips_through_bincode() {
        assert_round_trip(&SkillSlot::new(2));
    }
}
