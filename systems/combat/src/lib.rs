#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure system that turns targeting assignments into strike and heal
//! commands, applying the damage formulas to stat snapshots.
//!
//! An assignment only fires when its attacker's cooldown has fully
//! elapsed; the world resets the cooldown when it applies the strike.
//! Damage resolves from the two effective stat snapshots at call time:
//! additive and multiplicative modifiers are already folded into the
//! snapshots, so the resolver itself is stateless.

use gatefall_core::{
    AssignmentKind, AttackAssignment, Command, EnemyView, EntityRef, HitKind, StatBlock, UnitView,
    MIN_DAMAGE_FRACTION,
};

/// Physical damage: DEF subtracts flat, but a hit never drops below
/// the minimum fraction of ATK.
#[must_use]
pub fn physical_damage(atk: f64, def: f64) -> f64 {
    (atk - def).max(atk * MIN_DAMAGE_FRACTION)
}

/// Arts damage: RES reduces proportionally, clamped to the 0–100
/// percentage range.
#[must_use]
pub fn arts_damage(atk: f64, res: f64) -> f64 {
    atk * (1.0 - res.clamp(0.0, 100.0) / 100.0)
}

/// Resolves a hit between two effective stat snapshots, finishing with
/// the floor clamp at zero.
#[must_use]
pub fn resolve_damage(attacker: &StatBlock, defender: &StatBlock, kind: HitKind) -> f64 {
    let amount = match kind {
        HitKind::Physical => physical_damage(attacker.atk, defender.def),
        HitKind::Arts => arts_damage(attacker.atk, defender.res),
    };
    amount.max(0.0)
}

/// Resolves a heal from the healer's effective snapshot. Healing runs
/// the same chain as damage — base, additive, then multiplicative
/// amplification, all folded into the effective ATK — without any
/// mitigation on the receiving side.
#[must_use]
pub fn resolve_heal(healer: &StatBlock) -> f64 {
    healer.atk.max(0.0)
}

/// Combat system that queues strike and heal commands for attackers
/// whose cadence permits acting.
#[derive(Debug, Default)]
pub struct Combat {
    scratch: Vec<Command>,
}

impl Combat {
    /// Creates a new combat system with empty scratch buffers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Emits commands for every assignment whose attacker is ready.
    pub fn handle(
        &mut self,
        units: &UnitView,
        enemies: &EnemyView,
        assignments: &[AttackAssignment],
        out: &mut Vec<Command>,
    ) {
        if assignments.is_empty() {
            return;
        }

        self.scratch.clear();

        for assignment in assignments {
            match (assignment.attacker, assignment.kind) {
                (EntityRef::Unit(unit_id), AssignmentKind::Attack) => {
                    let Some(attacker) = units.get(unit_id) else {
                        continue;
                    };
                    if !attacker.cooldown.is_zero() {
                        continue;
                    }
                    let EntityRef::Enemy(enemy_id) = assignment.target else {
                        continue;
                    };
                    let Some(defender) = enemies.get(enemy_id) else {
                        continue;
                    };
                    self.scratch.push(Command::Strike {
                        attacker: assignment.attacker,
                        target: assignment.target,
                        kind: attacker.damage_kind,
                        amount: resolve_damage(&attacker.stats, &defender.stats, attacker.damage_kind),
                    });
                }
                (EntityRef::Unit(unit_id), AssignmentKind::Heal) => {
                    let Some(healer) = units.get(unit_id) else {
                        continue;
                    };
                    if !healer.cooldown.is_zero() {
                        continue;
                    }
                    let EntityRef::Unit(target_id) = assignment.target else {
                        continue;
                    };
                    self.scratch.push(Command::HealUnit {
                        healer: unit_id,
                        target: target_id,
                        amount: resolve_heal(&healer.stats),
                    });
                }
                (EntityRef::Enemy(enemy_id), AssignmentKind::Attack) => {
                    let Some(attacker) = enemies.get(enemy_id) else {
                        continue;
                    };
                    if !attacker.cooldown.is_zero() || attacker.stunned {
                        continue;
                    }
                    let EntityRef::Unit(unit_id) = assignment.target else {
                        continue;
                    };
                    let Some(defender) = units.get(unit_id) else {
                        continue;
                    };
                    self.scratch.push(Command::Strike {
                        attacker: assignment.attacker,
                        target: assignment.target,
                        kind: attacker.damage_kind,
                        amount: resolve_damage(&attacker.stats, &defender.stats, attacker.damage_kind),
                    });
                }
                (EntityRef::Enemy(_), AssignmentKind::Heal) => {}
            }
        }

        if self.scratch.is_empty() {
            return;
        }

        out.reserve(self.scratch.len());
        out.append(&mut self.scratch);
    }
}
