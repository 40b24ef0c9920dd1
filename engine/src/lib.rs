#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Battle loop scheduler and simulation driver for Gatefall.
//!
//! The driver builds the initial battle state from its inputs, then the
//! loop repeatedly finds the next instant anything is due — a scripted
//! player action, a scheduled skill expiry, a spawn, or the next
//! autonomous tick boundary — advances the world's continuous state to
//! that instant, and dispatches everything due there in one fixed
//! category order: expirations, scripted actions, spawns, autonomous
//! acts. Within a category, work is ordered by ascending entity id, so
//! two runs over identical inputs produce identical event logs.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Duration;

use gatefall_core::{
    compile_spawn_times, derive_skill, derive_stats, AttackAssignment, Command, Event,
    FailureReason, InvariantViolation, LevelData, OperatorConfig, PlayerAction, PlayerOp,
    RejectReason, SetupError, SkillSlot, SpawnSeed, TargetingPolicy, TemplateSet, UnitId,
    UnitSeed, Verdict,
};
use gatefall_system_combat::Combat;
use gatefall_system_movement::Movement;
use gatefall_system_skills::AutoSkills;
use gatefall_system_spawning::Spawning;
use gatefall_system_targeting::Targeting;
use gatefall_world::{apply, query, verify_invariants, World};

/// How a run that hits the simulated-time ceiling is judged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TimeoutPolicy {
    /// A timeout fails the run, like any other defeat.
    #[default]
    Defeat,
    /// A timeout is reported as its own verdict without counting the
    /// run as failed.
    Inconclusive,
}

/// Knobs controlling one simulation run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimulationConfig {
    /// Autonomous cadence boundary: the longest span the clock may
    /// advance when no discrete occurrence is due sooner.
    pub tick: Duration,
    /// Simulated-time ceiling; crossing it ends the run as a timeout.
    pub time_ceiling: Duration,
    /// Judgment applied when the ceiling is crossed.
    pub timeout_policy: TimeoutPolicy,
    /// Priority rule for unit target selection.
    pub targeting: TargetingPolicy,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(100),
            time_ceiling: Duration::from_secs(60),
            timeout_policy: TimeoutPolicy::default(),
            targeting: TargetingPolicy::default(),
        }
    }
}

/// One entry of the ordered event log.
#[derive(Clone, Debug, PartialEq)]
pub struct TimedEvent {
    /// Simulated time the event occurred at.
    pub time: Duration,
    /// The event itself.
    pub event: Event,
}

/// Packaged outcome of one simulation run.
#[derive(Clone, Debug)]
pub struct SimulationResult {
    /// Terminal classification of the run.
    pub verdict: Verdict,
    /// Machine-readable cause for non-winning verdicts.
    pub failure_reason: Option<FailureReason>,
    /// Whether the run counts as successful under the configured
    /// timeout policy.
    pub passed: bool,
    /// Simulated time at which the run ended.
    pub final_time: Duration,
    /// Lives remaining when the run ended.
    pub lives_remaining: u32,
    /// Enemies defeated over the whole run.
    pub enemies_defeated: u32,
    /// Custom ids of operators that entered the field, in first-deploy
    /// order.
    pub operators_deployed: Vec<String>,
    /// Custom ids of every roster operator, indexed by unit id.
    pub unit_names: Vec<String>,
    /// Enemy template keys of the spawn schedule, indexed by spawn id.
    pub spawn_keys: Vec<String>,
    /// Every event of the run in dispatch order.
    pub event_log: Vec<TimedEvent>,
}

/// Failures that end a run without a verdict.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum SimulationError {
    /// The inputs were rejected before simulation started.
    #[error(transparent)]
    Setup(#[from] SetupError),
    /// The engine detected a broken invariant mid-run and halted.
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

/// Orchestrates one full simulation run.
#[derive(Clone, Debug, Default)]
pub struct Driver {
    config: SimulationConfig,
}

impl Driver {
    /// Creates a driver with the provided configuration.
    #[must_use]
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    /// Builds initial state from the inputs, drives the battle loop to
    /// a terminal state, and packages the outcome.
    ///
    /// Setup problems — unknown templates, missing tier data, an
    /// unordered timeline — abort before any simulated time passes.
    pub fn run(
        &self,
        level: &LevelData,
        templates: &TemplateSet,
        operators: &[OperatorConfig],
        timeline: &[PlayerAction],
    ) -> Result<SimulationResult, SimulationError> {
        validate_timeline(timeline)?;
        let roster = build_roster(templates, operators)?;
        let spawns = build_spawns(level, templates)?;

        let spawn_keys: Vec<String> = spawns.iter().map(|seed| seed.key.clone()).collect();
        let spawn_times: Vec<Duration> = spawns.iter().map(|seed| seed.time).collect();
        let mandatory: Vec<bool> = operators.iter().map(|config| config.mandatory).collect();

        let world = World::new(level, roster.seeds, spawns)?;

        let mut battle = BattleLoop {
            config: self.config,
            world,
            spawning: Spawning::new(spawn_times),
            movement: Movement::new(),
            targeting: Targeting::with_policy(self.config.targeting),
            combat: Combat::new(),
            auto_skills: AutoSkills::new(),
            heap: BinaryHeap::new(),
            timeline,
            names: roster.names,
            mandatory,
            mandatory_lost: false,
            log: Vec::new(),
            now: Duration::ZERO,
        };
        battle.seed_timeline();

        let (verdict, failure_reason, final_time) = battle.run_to_completion()?;

        let passed = match verdict {
            Verdict::Won => true,
            Verdict::Lost => false,
            Verdict::TimedOut => self.config.timeout_policy == TimeoutPolicy::Inconclusive,
        };

        Ok(SimulationResult {
            verdict,
            failure_reason,
            passed,
            final_time,
            lives_remaining: query::lives(&battle.world),
            enemies_defeated: query::enemies_defeated(&battle.world),
            operators_deployed: query::deployed_names(&battle.world),
            unit_names: query::roster_names(&battle.world),
            spawn_keys,
            event_log: battle.log,
        })
    }
}

fn validate_timeline(timeline: &[PlayerAction]) -> Result<(), SetupError> {
    for (index, pair) in timeline.windows(2).enumerate() {
        if pair[1].time < pair[0].time {
            return Err(SetupError::UnorderedTimeline { index: index + 1 });
        }
    }
    Ok(())
}

struct RosterBuild {
    seeds: Vec<UnitSeed>,
    names: Vec<String>,
}

fn build_roster(
    templates: &TemplateSet,
    operators: &[OperatorConfig],
) -> Result<RosterBuild, SetupError> {
    let mut seeds = Vec::with_capacity(operators.len());
    let mut names = Vec::with_capacity(operators.len());

    for config in operators {
        if names.contains(&config.custom_id) {
            return Err(SetupError::DuplicateCustomId {
                custom_id: config.custom_id.clone(),
            });
        }

        let template = templates.get(&config.operator)?;
        let stats = derive_stats(
            &config.operator,
            template,
            config.level,
            config.elite,
            config.potential,
        )?;
        let range = template.phases[usize::from(config.elite)].range.clone();
        let skills = template
            .skills
            .iter()
            .map(|table| derive_skill(&config.operator, table, config.skill_level))
            .collect::<Result<Vec<_>, _>>()?;

        names.push(config.custom_id.clone());
        seeds.push(UnitSeed {
            name: config.custom_id.clone(),
            stats,
            deploy_kind: template.deploy_kind,
            damage_kind: template.damage_kind,
            capabilities: template.capabilities,
            range,
            skills,
            mandatory: config.mandatory,
        });
    }

    Ok(RosterBuild { seeds, names })
}

fn build_spawns(level: &LevelData, templates: &TemplateSet) -> Result<Vec<SpawnSeed>, SetupError> {
    let compiled = compile_spawn_times(&level.waves);
    let mut seeds = Vec::with_capacity(compiled.len());

    for spawn in compiled {
        let template = templates.get(&spawn.enemy)?;
        let level_anchor =
            template
                .base_level(0)
                .ok_or_else(|| SetupError::InvalidTemplate {
                    id: spawn.enemy.clone(),
                    elite: 0,
                    level: 0,
                })?;
        let stats = derive_stats(&spawn.enemy, template, level_anchor, 0, 0)?;
        seeds.push(SpawnSeed {
            key: spawn.enemy,
            time: spawn.time,
            stats,
            damage_kind: template.damage_kind,
            route: spawn.route,
        });
    }

    Ok(seeds)
}

/// Discrete occurrence categories, in dispatch order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Category {
    Expiry,
    Scripted,
}

/// A discrete occurrence awaiting dispatch. Field order doubles as the
/// heap ordering: time, then category, then the entity/sequence key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Occurrence {
    time: Duration,
    category: Category,
    order: u64,
    payload: Payload,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Payload {
    Expiry { unit: UnitId, skill: SkillSlot },
    Scripted { index: usize },
}

struct BattleLoop<'run> {
    config: SimulationConfig,
    world: World,
    spawning: Spawning,
    movement: Movement,
    targeting: Targeting,
    combat: Combat,
    auto_skills: AutoSkills,
    heap: BinaryHeap<Reverse<Occurrence>>,
    timeline: &'run [PlayerAction],
    names: Vec<String>,
    mandatory: Vec<bool>,
    mandatory_lost: bool,
    log: Vec<TimedEvent>,
    now: Duration,
}

impl BattleLoop<'_> {
    fn seed_timeline(&mut self) {
        for (index, action) in self.timeline.iter().enumerate() {
            self.heap.push(Reverse(Occurrence {
                time: action.time,
                category: Category::Scripted,
                order: index as u64,
                payload: Payload::Scripted { index },
            }));
        }
    }

    fn run_to_completion(
        &mut self,
    ) -> Result<(Verdict, Option<FailureReason>, Duration), SimulationError> {
        loop {
            if let Some(outcome) = self.evaluate_termination() {
                return Ok(outcome);
            }

            let next = self.next_event_time();
            if next > self.config.time_ceiling {
                return Ok((Verdict::TimedOut, Some(FailureReason::Timeout), self.now));
            }

            self.step(next)?;
            self.now = next;
        }
    }

    /// Terminal conditions, checked at every step boundary.
    fn evaluate_termination(&self) -> Option<(Verdict, Option<FailureReason>, Duration)> {
        if query::lives(&self.world) == 0 {
            return Some((
                Verdict::Lost,
                Some(FailureReason::LivesExhausted),
                self.now,
            ));
        }
        if self.mandatory_lost {
            return Some((
                Verdict::Lost,
                Some(FailureReason::MandatoryUnitLost),
                self.now,
            ));
        }
        if self.spawning.exhausted() && query::live_enemy_count(&self.world) == 0 {
            return Some((Verdict::Won, None, self.now));
        }
        None
    }

    /// The minimum of the next scripted or scheduled occurrence, the
    /// next spawn, and the next autonomous tick boundary.
    fn next_event_time(&self) -> Duration {
        let mut next = self.now + self.config.tick;
        if let Some(Reverse(occurrence)) = self.heap.peek() {
            next = next.min(occurrence.time);
        }
        if let Some(spawn) = self.spawning.next_due() {
            next = next.min(spawn.max(self.now));
        }
        next
    }

    /// One scheduler step: advance continuous state to `next`, then
    /// dispatch everything due there in category order.
    fn step(&mut self, next: Duration) -> Result<(), SimulationError> {
        let mut events = Vec::new();

        if next > self.now {
            self.dispatch(Command::Tick { dt: next - self.now }, next, &mut events);
        }

        while let Some(payload) = self.pop_due(next, Category::Expiry) {
            if let Payload::Expiry { unit, skill } = payload {
                self.dispatch(Command::ExpireSkill { unit, skill }, next, &mut events);
            }
        }

        while let Some(payload) = self.pop_due(next, Category::Scripted) {
            if let Payload::Scripted { index } = payload {
                self.dispatch_scripted(index, next, &mut events);
            }
        }

        let mut spawn_commands = Vec::new();
        self.spawning.handle(next, &mut spawn_commands);
        for command in spawn_commands {
            self.dispatch(command, next, &mut events);
        }

        self.pump_autonomous(next, events);

        verify_invariants(&self.world)?;
        Ok(())
    }

    fn pop_due(&mut self, time: Duration, category: Category) -> Option<Payload> {
        let due = self
            .heap
            .peek()
            .is_some_and(|Reverse(occurrence)| {
                occurrence.time == time && occurrence.category == category
            });
        if due {
            self.heap.pop().map(|Reverse(occurrence)| occurrence.payload)
        } else {
            None
        }
    }

    fn dispatch_scripted(&mut self, index: usize, time: Duration, events: &mut Vec<Event>) {
        let timeline = self.timeline;
        let action = &timeline[index];
        let Some(unit) = self.resolve_operator(&action.operator) else {
            // The reference never resolved to a roster unit; reject it
            // here since the world cannot name it either.
            let rejected = Event::ActionRejected {
                action: action.kind(),
                unit: None,
                reason: RejectReason::UnknownUnit,
            };
            events.push(rejected.clone());
            self.log.push(TimedEvent {
                time,
                event: rejected,
            });
            return;
        };

        let command = match &action.op {
            PlayerOp::Deploy { position, facing } => Command::Deploy {
                unit,
                position: *position,
                facing: *facing,
            },
            PlayerOp::Retreat => Command::Retreat { unit },
            PlayerOp::ActivateSkill { skill } => Command::ActivateSkill {
                unit,
                skill: *skill,
            },
        };
        self.dispatch(command, time, events);
    }

    fn resolve_operator(&self, custom_id: &str) -> Option<UnitId> {
        self.names
            .iter()
            .position(|name| name == custom_id)
            .map(|index| UnitId::new(index as u32))
    }

    /// Applies one command, logs its events, and reacts to the ones the
    /// scheduler must track.
    fn dispatch(&mut self, command: Command, time: Duration, events: &mut Vec<Event>) {
        let mut produced = Vec::new();
        apply(&mut self.world, command, &mut produced);

        for event in &produced {
            match event {
                Event::SkillActivated {
                    unit,
                    skill,
                    until: Some(until),
                } => {
                    self.heap.push(Reverse(Occurrence {
                        time: *until,
                        category: Category::Expiry,
                        order: (u64::from(unit.get()) << 8) | u64::from(skill.get()),
                        payload: Payload::Expiry {
                            unit: *unit,
                            skill: *skill,
                        },
                    }));
                }
                Event::UnitDefeated { unit } => {
                    if self
                        .mandatory
                        .get(unit.get() as usize)
                        .copied()
                        .unwrap_or(false)
                    {
                        self.mandatory_lost = true;
                    }
                }
                _ => {}
            }
            self.log.push(TimedEvent {
                time,
                event: event.clone(),
            });
        }

        events.extend(produced);
    }

    /// Autonomous dispatch: movement arrivals, auto skills, then
    /// attacks, re-run until no system has anything left to propose.
    fn pump_autonomous(&mut self, time: Duration, mut events: Vec<Event>) {
        let mut assignments: Vec<AttackAssignment> = Vec::new();

        loop {
            let unit_view = query::unit_view(&self.world);
            let enemy_view = query::enemy_view(&self.world);

            let mut commands = Vec::new();
            self.movement.handle(&events, &enemy_view, &mut commands);
            self.auto_skills.handle(&unit_view, &mut commands);
            self.targeting.handle(&unit_view, &enemy_view, &mut assignments);
            self.combat
                .handle(&unit_view, &enemy_view, &assignments, &mut commands);

            if commands.is_empty() {
                break;
            }

            events.clear();
            for command in commands {
                self.dispatch(command, time, &mut events);
            }
        }
    }
}
