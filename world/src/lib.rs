#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative battle state management for Gatefall.
//!
//! The [`World`] owns every mutable fact of one battle: the clock, the
//! deploy cost pool, remaining lives, roster units, live enemies, block
//! relations and active skill state. All mutation flows through
//! [`apply`], which executes one [`Command`] and appends the [`Event`]s
//! it produced; systems and the engine read back through [`query`].

mod grid;

use std::time::Duration;

use gatefall_core::{
    ActionKind, CapabilityTags, Command, DeployClass, DeployKind, DurationKind, EffectOp, EnemyId,
    EntityRef, Event, Facing, GridPos, HitKind, InvariantViolation, LevelData, LevelOptions,
    ModifierHandle, ModifierOp, RangeOffset, RejectReason, SetupError, SkillSlot, SkillSpec,
    SpChargeKind, SpawnIndex, SpawnSeed, StatModifier, StatSheet, StatusKind, TriggerKind, UnitId,
    UnitSeed, WELCOME_BANNER,
};

use crate::grid::TerrainGrid;

/// Represents the authoritative Gatefall battle state.
#[derive(Debug)]
pub struct World {
    banner: &'static str,
    grid: TerrainGrid,
    options: LevelOptions,
    clock: Duration,
    cost: f64,
    lives: u32,
    units: Vec<Unit>,
    enemies: Vec<Enemy>,
    spawns: Vec<SpawnSeed>,
    spawn_done: Vec<bool>,
    next_enemy: u32,
    occupancy: OccupancyGrid,
    defeated: u32,
    deploy_order: Vec<UnitId>,
}

impl World {
    /// Creates the battle state for one run.
    ///
    /// Routes are expanded and validated eagerly; a spawn referencing a
    /// route the level does not define is a setup error.
    pub fn new(
        level: &LevelData,
        units: Vec<UnitSeed>,
        spawns: Vec<SpawnSeed>,
    ) -> Result<Self, SetupError> {
        let grid = TerrainGrid::build(level)?;

        for seed in &spawns {
            if seed.route.get() as usize >= grid.route_count() {
                return Err(SetupError::UnknownRoute { route: seed.route });
            }
        }

        let (rows, cols) = grid.dimensions();
        let spawn_done = vec![false; spawns.len()];
        let units = units
            .into_iter()
            .enumerate()
            .map(|(index, seed)| Unit::from_seed(UnitId::new(index as u32), seed))
            .collect();

        Ok(Self {
            banner: WELCOME_BANNER,
            grid,
            options: level.options,
            clock: Duration::ZERO,
            cost: f64::from(level.options.initial_cost),
            lives: level.options.max_lives,
            units,
            enemies: Vec::new(),
            spawns,
            spawn_done,
            next_enemy: 0,
            occupancy: OccupancyGrid::new(rows, cols),
            defeated: 0,
            deploy_order: Vec::new(),
        })
    }

    fn unit_index(&self, unit: UnitId) -> Option<usize> {
        let index = unit.get() as usize;
        (index < self.units.len()).then_some(index)
    }

    fn enemy_index(&self, enemy: EnemyId) -> Option<usize> {
        self.enemies.iter().position(|held| held.id == enemy)
    }

    fn deployed_count(&self) -> usize {
        self.units.iter().filter(|unit| unit.deployed()).count()
    }

    fn advance_time(&mut self, dt: Duration, out_events: &mut Vec<Event>) {
        self.clock += dt;

        let seconds = dt.as_secs_f64();
        let regen = seconds / self.options.cost_interval.as_secs_f64().max(f64::EPSILON);
        self.cost = (self.cost + regen).min(f64::from(self.options.max_cost));

        for unit in &mut self.units {
            if !unit.deployed() {
                continue;
            }
            unit.cooldown = unit.cooldown.saturating_sub(dt);
            for skill in &mut unit.skills {
                if !skill.active && skill.spec.sp.charge == SpChargeKind::Time {
                    skill.gain_sp(skill.spec.sp.gain * seconds);
                }
            }
        }

        for enemy in &mut self.enemies {
            enemy.cooldown = enemy.cooldown.saturating_sub(dt);
            if enemy
                .stunned_until
                .is_some_and(|until| until <= self.clock)
            {
                enemy.stunned_until = None;
            }
            if enemy.blocked_by.is_none()
                && enemy.stunned_until.is_none()
                && enemy.waypoint + 1 < enemy.path.len()
            {
                enemy.progress += enemy.sheet.effective().move_speed * seconds;
            }
        }

        out_events.push(Event::TimeAdvanced { dt });
    }

    fn deploy_unit(
        &mut self,
        unit_id: UnitId,
        position: GridPos,
        facing: Facing,
        out_events: &mut Vec<Event>,
    ) {
        let reject = |reason: RejectReason, out_events: &mut Vec<Event>| {
            out_events.push(Event::ActionRejected {
                action: ActionKind::Deploy,
                unit: Some(unit_id),
                reason,
            });
        };

        let Some(index) = self.unit_index(unit_id) else {
            reject(RejectReason::UnknownUnit, out_events);
            return;
        };

        if !self.units[index].alive {
            reject(RejectReason::UnitDefeated, out_events);
            return;
        }
        if self.units[index].deployed() {
            reject(RejectReason::AlreadyDeployed, out_events);
            return;
        }

        let Some(tile) = self.grid.tile(position) else {
            reject(RejectReason::OutOfBounds, out_events);
            return;
        };
        if tile.deploy == DeployClass::None {
            reject(RejectReason::NotDeployable, out_events);
            return;
        }
        if self.occupancy.occupant(position).is_some() {
            reject(RejectReason::Occupied, out_events);
            return;
        }
        if !tile.deploy.admits(self.units[index].deploy_kind) {
            reject(RejectReason::DeployKindMismatch, out_events);
            return;
        }

        let deploy_cost = f64::from(self.units[index].sheet.base().deploy_cost);
        if self.cost + 1e-9 < deploy_cost {
            reject(RejectReason::InsufficientCost, out_events);
            return;
        }
        if self.deployed_count() >= self.options.roster_limit as usize {
            reject(RejectReason::RosterFull, out_events);
            return;
        }

        self.cost -= deploy_cost;
        let unit = &mut self.units[index];
        unit.position = Some(position);
        unit.facing = facing;
        unit.rotated_range = unit
            .base_range
            .iter()
            .map(|offset| facing.rotate(*offset))
            .collect();
        unit.cooldown = Duration::ZERO;
        self.occupancy.occupy(unit_id, position);
        if !self.deploy_order.contains(&unit_id) {
            self.deploy_order.push(unit_id);
        }

        out_events.push(Event::Deployed {
            unit: unit_id,
            position,
            facing,
        });

        self.capture_enemies_at(position, unit_id, out_events);
    }

    /// Establishes block relations for unblocked enemies standing on
    /// the unit's tile, in ascending enemy-id order, until the unit's
    /// capacity is spent.
    fn capture_enemies_at(
        &mut self,
        position: GridPos,
        unit_id: UnitId,
        out_events: &mut Vec<Event>,
    ) {
        let Some(index) = self.unit_index(unit_id) else {
            return;
        };
        if !self.units[index].capabilities.blocker {
            return;
        }

        let capacity = self.units[index].sheet.base().block_capacity as usize;
        let mut captured: Vec<EnemyId> = Vec::new();
        {
            let mut held = self.units[index].blocked.len();
            let mut candidates: Vec<&mut Enemy> = self
                .enemies
                .iter_mut()
                .filter(|enemy| enemy.blocked_by.is_none() && enemy.position() == position)
                .collect();
            candidates.sort_by_key(|enemy| enemy.id);
            for enemy in candidates {
                if held >= capacity {
                    break;
                }
                enemy.blocked_by = Some(unit_id);
                captured.push(enemy.id);
                held += 1;
            }
        }

        for enemy in captured {
            self.units[index].blocked.push(enemy);
            out_events.push(Event::EnemyBlocked {
                enemy,
                unit: unit_id,
            });
        }
    }

    fn retreat_unit(&mut self, unit_id: UnitId, out_events: &mut Vec<Event>) {
        let Some(index) = self.unit_index(unit_id) else {
            out_events.push(Event::ActionRejected {
                action: ActionKind::Retreat,
                unit: None,
                reason: RejectReason::UnknownUnit,
            });
            return;
        };
        if !self.units[index].deployed() {
            out_events.push(Event::ActionRejected {
                action: ActionKind::Retreat,
                unit: Some(unit_id),
                reason: RejectReason::NotDeployed,
            });
            return;
        }

        self.remove_from_field(unit_id, out_events);
        for skill in &mut self.units[index].skills {
            skill.sp = 0.0;
        }
        out_events.push(Event::Retreated { unit: unit_id });
    }

    /// Clears a unit off the field: block relations dissolve, active
    /// skills unwind, the tile is vacated. Shared by retreat and death.
    fn remove_from_field(&mut self, unit_id: UnitId, out_events: &mut Vec<Event>) {
        let Some(index) = self.unit_index(unit_id) else {
            return;
        };

        let held = std::mem::take(&mut self.units[index].blocked);
        for enemy_id in held {
            if let Some(enemy_index) = self.enemy_index(enemy_id) {
                self.enemies[enemy_index].blocked_by = None;
                out_events.push(Event::BlockReleased {
                    enemy: enemy_id,
                    unit: unit_id,
                });
            }
        }

        for slot in 0..self.units[index].skills.len() {
            self.expire_skill(unit_id, SkillSlot::new(slot as u8), out_events);
        }

        if let Some(position) = self.units[index].position.take() {
            self.occupancy.vacate(position);
        }
    }

    fn activate_skill(&mut self, unit_id: UnitId, slot: SkillSlot, out_events: &mut Vec<Event>) {
        let reject = |reason: RejectReason, out_events: &mut Vec<Event>| {
            out_events.push(Event::ActionRejected {
                action: ActionKind::ActivateSkill,
                unit: Some(unit_id),
                reason,
            });
        };

        let Some(index) = self.unit_index(unit_id) else {
            reject(RejectReason::UnknownUnit, out_events);
            return;
        };
        if !self.units[index].deployed() {
            reject(RejectReason::NotDeployed, out_events);
            return;
        }

        let slot_index = usize::from(slot.get());
        let Some(skill) = self.units[index].skills.get(slot_index) else {
            reject(RejectReason::UnknownSkill, out_events);
            return;
        };
        if skill.spec.trigger == TriggerKind::Passive {
            reject(RejectReason::SkillPassive, out_events);
            return;
        }
        if skill.active || skill.sp < skill.spec.sp.cost {
            reject(RejectReason::SkillNotReady, out_events);
            return;
        }

        let spec = skill.spec.clone();
        let until = match spec.duration {
            DurationKind::Timed(duration) => Some(self.clock + duration),
            DurationKind::Instant | DurationKind::Ammo(_) => None,
        };
        {
            let skill = &mut self.units[index].skills[slot_index];
            skill.sp -= spec.sp.cost;
            skill.active = true;
            skill.until = until;
            if let DurationKind::Ammo(rounds) = spec.duration {
                skill.remaining_ammo = rounds;
            }
        }
        out_events.push(Event::SkillActivated {
            unit: unit_id,
            skill: slot,
            until,
        });

        self.interpret_effects(unit_id, slot, &spec, out_events);

        if matches!(spec.duration, DurationKind::Instant) {
            self.expire_skill(unit_id, slot, out_events);
        }
    }

    /// Runs a skill's effect program against the fixed instruction set.
    ///
    /// Duration-bound instructions need a timed or ammunition lifetime;
    /// an instant skill carrying one warns and skips it, as does any
    /// instruction outside the modeled set.
    fn interpret_effects(
        &mut self,
        unit_id: UnitId,
        slot: SkillSlot,
        spec: &SkillSpec,
        out_events: &mut Vec<Event>,
    ) {
        let Some(index) = self.unit_index(unit_id) else {
            return;
        };
        let instant = matches!(spec.duration, DurationKind::Instant);

        for effect in &spec.effects {
            match effect {
                EffectOp::StatAdd { stat, amount } if !instant => {
                    let handle = self.units[index].sheet.apply(StatModifier {
                        stat: *stat,
                        op: ModifierOp::Add(*amount),
                    });
                    self.units[index].skills[usize::from(slot.get())]
                        .applied
                        .push(handle);
                }
                EffectOp::StatScale { stat, factor } if !instant => {
                    let handle = self.units[index].sheet.apply(StatModifier {
                        stat: *stat,
                        op: ModifierOp::Scale(*factor),
                    });
                    self.units[index].skills[usize::from(slot.get())]
                        .applied
                        .push(handle);
                }
                EffectOp::Heal { atk_scale } => {
                    let effective = self.units[index].sheet.effective();
                    let amount = effective.atk * atk_scale;
                    let missing = effective.max_hp - self.units[index].hp;
                    let healed = amount.min(missing).max(0.0);
                    self.units[index].hp += healed;
                    if healed > 0.0 {
                        out_events.push(Event::UnitHealed {
                            healer: unit_id,
                            target: unit_id,
                            amount: healed.round() as u32,
                        });
                    }
                }
                EffectOp::StunBlocked => {
                    if let DurationKind::Timed(duration) = spec.duration {
                        let until = self.clock + duration;
                        let held = self.units[index].blocked.clone();
                        for enemy_id in held {
                            if let Some(enemy_index) = self.enemy_index(enemy_id) {
                                self.enemies[enemy_index].stunned_until = Some(until);
                                out_events.push(Event::StatusApplied {
                                    target: EntityRef::Enemy(enemy_id),
                                    status: StatusKind::Stunned,
                                    until,
                                });
                            }
                        }
                    } else {
                        out_events.push(Event::EffectIgnored {
                            unit: unit_id,
                            skill: slot,
                        });
                    }
                }
                EffectOp::StatAdd { .. } | EffectOp::StatScale { .. } | EffectOp::Unmodeled { .. } => {
                    out_events.push(Event::EffectIgnored {
                        unit: unit_id,
                        skill: slot,
                    });
                }
            }
        }
    }

    /// Applies a scheduled expiry. The expiry is honored only when the
    /// skill's current activation is actually due — a stale entry for
    /// an activation that was already unwound (retreat, death, a fresh
    /// activation after redeploying) is ignored.
    fn expire_skill_due(&mut self, unit_id: UnitId, slot: SkillSlot, out_events: &mut Vec<Event>) {
        let due = self
            .unit_index(unit_id)
            .and_then(|index| self.units[index].skills.get(usize::from(slot.get())))
            .is_some_and(|skill| {
                skill.active && skill.until.is_some_and(|until| until <= self.clock)
            });
        if due {
            self.expire_skill(unit_id, slot, out_events);
        }
    }

    fn expire_skill(&mut self, unit_id: UnitId, slot: SkillSlot, out_events: &mut Vec<Event>) {
        let Some(index) = self.unit_index(unit_id) else {
            return;
        };
        let slot_index = usize::from(slot.get());
        let Some(skill) = self.units[index].skills.get_mut(slot_index) else {
            return;
        };
        if !skill.active {
            return;
        }

        skill.active = false;
        skill.until = None;
        skill.remaining_ammo = 0;
        let handles: Vec<ModifierHandle> = std::mem::take(&mut skill.applied);
        for handle in handles {
            let _ = self.units[index].sheet.remove(handle);
        }

        let max_hp = self.units[index].sheet.effective().max_hp;
        if self.units[index].hp > max_hp {
            self.units[index].hp = max_hp;
        }

        out_events.push(Event::SkillExpired {
            unit: unit_id,
            skill: slot,
        });
    }

    fn spawn_enemy(&mut self, spawn: SpawnIndex, out_events: &mut Vec<Event>) {
        let index = spawn.get() as usize;
        let already = self.spawn_done.get(index).copied().unwrap_or(true);
        if already {
            return;
        }
        self.spawn_done[index] = true;

        let seed = self.spawns[index].clone();
        let path = match self.grid.route(seed.route) {
            Some(path) => path.to_vec(),
            None => return,
        };
        let Some(&start) = path.first() else {
            return;
        };

        let enemy_id = EnemyId::new(self.next_enemy);
        self.next_enemy += 1;

        self.enemies.push(Enemy {
            id: enemy_id,
            sheet: StatSheet::new(seed.stats),
            hp: seed.stats.max_hp,
            damage_kind: seed.damage_kind,
            path,
            waypoint: 0,
            progress: 0.0,
            cooldown: Duration::ZERO,
            blocked_by: None,
            stunned_until: None,
        });

        out_events.push(Event::EnemySpawned {
            enemy: enemy_id,
            spawn,
            position: start,
        });

        let enemy_index = self.enemies.len() - 1;
        if self.enemies[enemy_index].at_exit() {
            self.leak_enemy(enemy_id, out_events);
        } else if let Some(unit_id) = self.occupancy.occupant(start) {
            self.capture_enemies_at(start, unit_id, out_events);
        }
    }

    fn step_enemy(&mut self, enemy_id: EnemyId, out_events: &mut Vec<Event>) {
        let Some(index) = self.enemy_index(enemy_id) else {
            return;
        };

        {
            let enemy = &self.enemies[index];
            if enemy.blocked_by.is_some()
                || enemy.stunned_until.is_some()
                || enemy.progress < 1.0
                || enemy.waypoint + 1 >= enemy.path.len()
            {
                return;
            }
        }

        let (from, to) = {
            let enemy = &mut self.enemies[index];
            let from = enemy.position();
            enemy.progress -= 1.0;
            enemy.waypoint += 1;
            (from, enemy.position())
        };
        out_events.push(Event::EnemyAdvanced {
            enemy: enemy_id,
            from,
            to,
        });

        if self.enemies[index].at_exit() {
            self.leak_enemy(enemy_id, out_events);
        } else if let Some(unit_id) = self.occupancy.occupant(to) {
            self.capture_enemies_at(to, unit_id, out_events);
        }
    }

    fn leak_enemy(&mut self, enemy_id: EnemyId, out_events: &mut Vec<Event>) {
        self.lives = self.lives.saturating_sub(1);
        self.discard_enemy(enemy_id);
        out_events.push(Event::EnemyLeaked {
            enemy: enemy_id,
            lives_remaining: self.lives,
        });
    }

    /// Removes an enemy from the field and from any block list holding
    /// it.
    fn discard_enemy(&mut self, enemy_id: EnemyId) {
        if let Some(index) = self.enemy_index(enemy_id) {
            let _ = self.enemies.remove(index);
        }
        for unit in &mut self.units {
            unit.blocked.retain(|held| *held != enemy_id);
        }
    }

    fn strike(
        &mut self,
        attacker: EntityRef,
        target: EntityRef,
        kind: HitKind,
        amount: f64,
        out_events: &mut Vec<Event>,
    ) {
        // Reject stale assignments: both sides must still be fighting.
        let attacker_live = match attacker {
            EntityRef::Unit(unit_id) => self
                .unit_index(unit_id)
                .is_some_and(|index| self.units[index].deployed()),
            EntityRef::Enemy(enemy_id) => self.enemy_index(enemy_id).is_some(),
        };
        let target_live = match target {
            EntityRef::Unit(unit_id) => self
                .unit_index(unit_id)
                .is_some_and(|index| self.units[index].deployed()),
            EntityRef::Enemy(enemy_id) => self.enemy_index(enemy_id).is_some(),
        };
        if !attacker_live || !target_live {
            return;
        }

        match attacker {
            EntityRef::Unit(unit_id) => {
                if let Some(index) = self.unit_index(unit_id) {
                    let interval = self.units[index].sheet.effective().attack_interval;
                    self.units[index].cooldown = interval;
                    self.gain_event_sp(index, SpChargeKind::OnAttack);
                }
                self.consume_ammo(unit_id, out_events);
            }
            EntityRef::Enemy(enemy_id) => {
                if let Some(index) = self.enemy_index(enemy_id) {
                    let interval = self.enemies[index].sheet.effective().attack_interval;
                    self.enemies[index].cooldown = interval;
                }
            }
        }

        let damage = amount.max(0.0);
        match target {
            EntityRef::Unit(unit_id) => {
                let Some(index) = self.unit_index(unit_id) else {
                    return;
                };
                if !self.units[index].deployed() {
                    return;
                }
                self.units[index].hp = (self.units[index].hp - damage).max(0.0);
                let remaining = self.units[index].hp;
                out_events.push(Event::DamageDealt {
                    attacker,
                    target,
                    kind,
                    amount: damage.round() as u32,
                    remaining_hp: remaining.ceil() as u32,
                });
                self.gain_event_sp(index, SpChargeKind::OnDamage);
                if remaining <= 0.0 {
                    self.defeat_unit(unit_id, out_events);
                }
            }
            EntityRef::Enemy(enemy_id) => {
                let Some(index) = self.enemy_index(enemy_id) else {
                    return;
                };
                self.enemies[index].hp = (self.enemies[index].hp - damage).max(0.0);
                let remaining = self.enemies[index].hp;
                out_events.push(Event::DamageDealt {
                    attacker,
                    target,
                    kind,
                    amount: damage.round() as u32,
                    remaining_hp: remaining.ceil() as u32,
                });
                if remaining <= 0.0 {
                    self.defeated += 1;
                    self.discard_enemy(enemy_id);
                    out_events.push(Event::EnemyDefeated { enemy: enemy_id });
                    if let EntityRef::Unit(unit_id) = attacker {
                        if let Some(unit_index) = self.unit_index(unit_id) {
                            self.gain_event_sp(unit_index, SpChargeKind::OnKill);
                        }
                    }
                }
            }
        }
    }

    fn defeat_unit(&mut self, unit_id: UnitId, out_events: &mut Vec<Event>) {
        out_events.push(Event::UnitDefeated { unit: unit_id });
        self.remove_from_field(unit_id, out_events);
        if let Some(index) = self.unit_index(unit_id) {
            self.units[index].alive = false;
        }
    }

    fn gain_event_sp(&mut self, unit_index: usize, charge: SpChargeKind) {
        for skill in &mut self.units[unit_index].skills {
            if !skill.active && skill.spec.sp.charge == charge {
                skill.gain_sp(skill.spec.sp.gain);
            }
        }
    }

    /// Counts down the active ammunition skill, expiring it on the
    /// final round.
    fn consume_ammo(&mut self, unit_id: UnitId, out_events: &mut Vec<Event>) {
        let Some(index) = self.unit_index(unit_id) else {
            return;
        };

        let mut exhausted: Option<SkillSlot> = None;
        for (slot, skill) in self.units[index].skills.iter_mut().enumerate() {
            if skill.active && matches!(skill.spec.duration, DurationKind::Ammo(_)) {
                skill.remaining_ammo = skill.remaining_ammo.saturating_sub(1);
                if skill.remaining_ammo == 0 {
                    exhausted = Some(SkillSlot::new(slot as u8));
                }
                break;
            }
        }

        if let Some(slot) = exhausted {
            self.expire_skill(unit_id, slot, out_events);
        }
    }

    fn heal_unit(
        &mut self,
        healer: UnitId,
        target: UnitId,
        amount: f64,
        out_events: &mut Vec<Event>,
    ) {
        let healer_deployed = self
            .unit_index(healer)
            .map(|index| self.units[index].deployed())
            .unwrap_or(false);
        if !healer_deployed {
            return;
        }
        let Some(target_index) = self.unit_index(target) else {
            return;
        };
        if !self.units[target_index].deployed() {
            return;
        }

        if let Some(healer_index) = self.unit_index(healer) {
            let interval = self.units[healer_index].sheet.effective().attack_interval;
            self.units[healer_index].cooldown = interval;
            self.gain_event_sp(healer_index, SpChargeKind::OnAttack);
        }

        let effective = self.units[target_index].sheet.effective();
        let missing = effective.max_hp - self.units[target_index].hp;
        let healed = amount.min(missing).max(0.0);
        self.units[target_index].hp += healed;
        if healed > 0.0 {
            out_events.push(Event::UnitHealed {
                healer,
                target,
                amount: healed.round() as u32,
            });
        }
    }
}

/// Applies the provided command to the world, mutating state
/// deterministically and appending the events it produced.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::Tick { dt } => world.advance_time(dt, out_events),
        Command::Deploy {
            unit,
            position,
            facing,
        } => world.deploy_unit(unit, position, facing, out_events),
        Command::Retreat { unit } => world.retreat_unit(unit, out_events),
        Command::ActivateSkill { unit, skill } => world.activate_skill(unit, skill, out_events),
        Command::ExpireSkill { unit, skill } => world.expire_skill_due(unit, skill, out_events),
        Command::SpawnEnemy { spawn } => world.spawn_enemy(spawn, out_events),
        Command::StepEnemy { enemy } => world.step_enemy(enemy, out_events),
        Command::Strike {
            attacker,
            target,
            kind,
            amount,
        } => world.strike(attacker, target, kind, amount, out_events),
        Command::HealUnit {
            healer,
            target,
            amount,
        } => world.heal_unit(healer, target, amount, out_events),
    }
}

/// Checks the structural invariants of the battle state.
///
/// A violation is a defect in the engine, never a recoverable game
/// situation; the caller is expected to halt the run with the returned
/// diagnostic.
pub fn verify_invariants(world: &World) -> Result<(), InvariantViolation> {
    let mut seen: Vec<(GridPos, UnitId)> = Vec::new();
    for unit in &world.units {
        let Some(position) = unit.position else {
            continue;
        };
        if let Some(&(_, first)) = seen.iter().find(|(held, _)| *held == position) {
            return Err(InvariantViolation::DuplicateOccupancy {
                first,
                second: unit.id,
                position,
            });
        }
        seen.push((position, unit.id));

        let capacity = unit.sheet.base().block_capacity;
        if unit.blocked.len() > capacity as usize {
            return Err(InvariantViolation::BlockCapacityExceeded {
                unit: unit.id,
                held: unit.blocked.len(),
                capacity,
            });
        }

        for &enemy_id in &unit.blocked {
            let mutual = world
                .enemies
                .iter()
                .find(|enemy| enemy.id == enemy_id)
                .is_some_and(|enemy| enemy.blocked_by == Some(unit.id));
            if !mutual {
                return Err(InvariantViolation::AsymmetricBlock {
                    unit: unit.id,
                    enemy: enemy_id,
                });
            }
        }

        if unit.alive && unit.hp <= 0.0 && unit.deployed() {
            return Err(InvariantViolation::DeadEntityAlive {
                entity: EntityRef::Unit(unit.id),
            });
        }
    }

    for enemy in &world.enemies {
        if let Some(unit_id) = enemy.blocked_by {
            let mutual = world
                .units
                .iter()
                .find(|unit| unit.id == unit_id)
                .is_some_and(|unit| unit.blocked.contains(&enemy.id));
            if !mutual {
                return Err(InvariantViolation::AsymmetricBlock {
                    unit: unit_id,
                    enemy: enemy.id,
                });
            }
        }
        if enemy.hp <= 0.0 {
            return Err(InvariantViolation::DeadEntityAlive {
                entity: EntityRef::Enemy(enemy.id),
            });
        }
    }

    Ok(())
}

/// Query functions that provide read-only access to the battle state.
pub mod query {
    use std::time::Duration;

    use gatefall_core::{
        EnemySnapshot, EnemyView, SkillStateSnapshot, SkillSlot, UnitSnapshot, UnitView,
    };

    use super::World;

    /// Retrieves the welcome banner that adapters may display.
    #[must_use]
    pub fn welcome_banner(world: &World) -> &'static str {
        world.banner
    }

    /// Current simulated time.
    #[must_use]
    pub fn clock(world: &World) -> Duration {
        world.clock
    }

    /// Remaining lives.
    #[must_use]
    pub fn lives(world: &World) -> u32 {
        world.lives
    }

    /// Currently available deploy cost.
    #[must_use]
    pub fn deploy_cost(world: &World) -> f64 {
        world.cost
    }

    /// Number of enemies currently on the field.
    #[must_use]
    pub fn live_enemy_count(world: &World) -> usize {
        world.enemies.len()
    }

    /// Number of enemies defeated so far.
    #[must_use]
    pub fn enemies_defeated(world: &World) -> u32 {
        world.defeated
    }

    /// Custom ids of all roster units in id order.
    #[must_use]
    pub fn roster_names(world: &World) -> Vec<String> {
        world.units.iter().map(|unit| unit.name.clone()).collect()
    }

    /// Custom ids of units that entered the field, in first-deploy
    /// order.
    #[must_use]
    pub fn deployed_names(world: &World) -> Vec<String> {
        world
            .deploy_order
            .iter()
            .filter_map(|unit_id| {
                world
                    .units
                    .get(unit_id.get() as usize)
                    .map(|unit| unit.name.clone())
            })
            .collect()
    }

    /// Captures a read-only view of the roster.
    #[must_use]
    pub fn unit_view(world: &World) -> UnitView {
        let snapshots = world
            .units
            .iter()
            .map(|unit| UnitSnapshot {
                id: unit.id,
                position: unit.position,
                facing: unit.facing,
                hp: unit.hp.ceil() as u32,
                stats: unit.sheet.effective(),
                damage_kind: unit.damage_kind,
                capabilities: unit.capabilities,
                range: unit.rotated_range.clone(),
                cooldown: unit.cooldown,
                blocked: {
                    let mut blocked = unit.blocked.clone();
                    blocked.sort_unstable();
                    blocked
                },
                skills: unit
                    .skills
                    .iter()
                    .enumerate()
                    .map(|(slot, skill)| SkillStateSnapshot {
                        slot: SkillSlot::new(slot as u8),
                        trigger: skill.spec.trigger,
                        sp: skill.sp,
                        sp_cost: skill.spec.sp.cost,
                        charged: !skill.active && skill.sp >= skill.spec.sp.cost,
                        active: skill.active,
                    })
                    .collect(),
                deployed: unit.deployed(),
                alive: unit.alive,
            })
            .collect();
        UnitView::from_snapshots(snapshots)
    }

    /// Captures a read-only view of the live enemies.
    #[must_use]
    pub fn enemy_view(world: &World) -> EnemyView {
        let snapshots = world
            .enemies
            .iter()
            .map(|enemy| EnemySnapshot {
                id: enemy.id,
                position: enemy.position(),
                waypoint: enemy.waypoint,
                route_len: enemy.path.len(),
                progress: enemy.progress,
                hp: enemy.hp.ceil() as u32,
                stats: enemy.sheet.effective(),
                damage_kind: enemy.damage_kind,
                cooldown: enemy.cooldown,
                blocked_by: enemy.blocked_by,
                stunned: enemy.stunned_until.is_some(),
                ready_to_step: enemy.blocked_by.is_none()
                    && enemy.stunned_until.is_none()
                    && enemy.progress >= 1.0
                    && enemy.waypoint + 1 < enemy.path.len(),
            })
            .collect();
        EnemyView::from_snapshots(snapshots)
    }
}

#[derive(Debug)]
struct Unit {
    id: UnitId,
    name: String,
    sheet: StatSheet,
    hp: f64,
    deploy_kind: DeployKind,
    damage_kind: HitKind,
    capabilities: CapabilityTags,
    base_range: Vec<RangeOffset>,
    rotated_range: Vec<RangeOffset>,
    facing: Facing,
    position: Option<GridPos>,
    cooldown: Duration,
    blocked: Vec<EnemyId>,
    skills: Vec<SkillRuntime>,
    alive: bool,
}

impl Unit {
    fn from_seed(id: UnitId, seed: UnitSeed) -> Self {
        let skills = seed
            .skills
            .into_iter()
            .map(SkillRuntime::from_spec)
            .collect();
        Self {
            id,
            name: seed.name,
            hp: seed.stats.max_hp,
            sheet: StatSheet::new(seed.stats),
            deploy_kind: seed.deploy_kind,
            damage_kind: seed.damage_kind,
            capabilities: seed.capabilities,
            base_range: seed.range,
            rotated_range: Vec::new(),
            facing: Facing::Right,
            position: None,
            cooldown: Duration::ZERO,
            blocked: Vec::new(),
            skills,
            alive: true,
        }
    }

    fn deployed(&self) -> bool {
        self.alive && self.position.is_some()
    }
}

#[derive(Debug)]
struct SkillRuntime {
    spec: SkillSpec,
    sp: f64,
    active: bool,
    until: Option<Duration>,
    remaining_ammo: u32,
    applied: Vec<ModifierHandle>,
}

impl SkillRuntime {
    fn from_spec(spec: SkillSpec) -> Self {
        let sp = spec.sp.initial.min(spec.sp.cost);
        Self {
            spec,
            sp,
            active: false,
            until: None,
            remaining_ammo: 0,
            applied: Vec::new(),
        }
    }

    fn gain_sp(&mut self, amount: f64) {
        self.sp = (self.sp + amount).min(self.spec.sp.cost);
    }
}

#[derive(Debug)]
struct Enemy {
    id: EnemyId,
    sheet: StatSheet,
    hp: f64,
    damage_kind: HitKind,
    path: Vec<GridPos>,
    waypoint: usize,
    progress: f64,
    cooldown: Duration,
    blocked_by: Option<UnitId>,
    stunned_until: Option<Duration>,
}

impl Enemy {
    fn position(&self) -> GridPos {
        self.path[self.waypoint]
    }

    fn at_exit(&self) -> bool {
        self.waypoint + 1 >= self.path.len()
    }
}

#[derive(Clone, Debug)]
struct OccupancyGrid {
    rows: u32,
    cols: u32,
    cells: Vec<Option<UnitId>>,
}

impl OccupancyGrid {
    fn new(rows: u32, cols: u32) -> Self {
        let capacity = rows as usize * cols as usize;
        Self {
            rows,
            cols,
            cells: vec![None; capacity],
        }
    }

    fn occupant(&self, position: GridPos) -> Option<UnitId> {
        self.index(position)
            .and_then(|index| self.cells.get(index).copied().flatten())
    }

    fn occupy(&mut self, unit: UnitId, position: GridPos) {
        if let Some(index) = self.index(position) {
            if let Some(slot) = self.cells.get_mut(index) {
                *slot = Some(unit);
            }
        }
    }

    fn vacate(&mut self, position: GridPos) {
        if let Some(index) = self.index(position) {
            if let Some(slot) = self.cells.get_mut(index) {
                *slot = None;
            }
        }
    }

    fn index(&self, position: GridPos) -> Option<usize> {
        if position.row() < self.rows && position.col() < self.cols {
            let row = usize::try_from(position.row()).ok()?;
            let col = usize::try_from(position.col()).ok()?;
            let width = usize::try_from(self.cols).ok()?;
            Some(row * width + col)
        } else {
            None
        }
    }
}
