#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure system that computes deterministic attack and heal assignments
//! from battle snapshots.
//!
//! Units select enemies inside their rotated range shape by the
//! configured [`TargetingPolicy`]; healers select the most wounded ally
//! in range instead; a blocked enemy always selects the unit holding
//! it. The system never mutates anything — it pairs attackers with
//! targets and leaves cadence and damage to the combat system.

use gatefall_core::{
    AssignmentKind, AttackAssignment, EnemyId, EnemySnapshot, EnemyView, EntityRef, GridPos,
    TargetingPolicy, UnitId, UnitSnapshot, UnitView,
};

/// Targeting system that reuses scratch buffers to avoid repeated
/// allocations.
#[derive(Debug, Default)]
pub struct Targeting {
    policy: TargetingPolicy,
    coverage: Vec<GridPos>,
}

impl Targeting {
    /// Creates a targeting system using the default priority rules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a targeting system with an explicit priority rule.
    #[must_use]
    pub fn with_policy(policy: TargetingPolicy) -> Self {
        Self {
            policy,
            coverage: Vec::new(),
        }
    }

    /// Computes assignments for the provided snapshots.
    ///
    /// The output buffer is cleared before being repopulated. Units are
    /// visited in ascending id order and enemies afterwards, so the
    /// assignment order itself is deterministic.
    pub fn handle(&mut self, units: &UnitView, enemies: &EnemyView, out: &mut Vec<AttackAssignment>) {
        out.clear();

        for unit in units.iter() {
            if !unit.deployed {
                continue;
            }

            if unit.capabilities.healer {
                if let Some(target) = self.select_heal_target(unit, units) {
                    out.push(AttackAssignment {
                        attacker: EntityRef::Unit(unit.id),
                        target: EntityRef::Unit(target),
                        kind: AssignmentKind::Heal,
                    });
                }
                continue;
            }

            if !unit.capabilities.attacker {
                continue;
            }

            if let Some(target) = self.select_enemy_target(unit, enemies) {
                out.push(AttackAssignment {
                    attacker: EntityRef::Unit(unit.id),
                    target: EntityRef::Enemy(target),
                    kind: AssignmentKind::Attack,
                });
            }
        }

        // A held enemy fights the unit holding it; unblocked enemies
        // keep walking.
        for enemy in enemies.iter() {
            if let Some(unit) = enemy.blocked_by {
                out.push(AttackAssignment {
                    attacker: EntityRef::Enemy(enemy.id),
                    target: EntityRef::Unit(unit),
                    kind: AssignmentKind::Attack,
                });
            }
        }
    }

    fn prepare_coverage(&mut self, unit: &UnitSnapshot) -> bool {
        self.coverage.clear();
        let Some(position) = unit.position else {
            return false;
        };
        for offset in &unit.range {
            if let Some(covered) = position.offset_by(*offset) {
                self.coverage.push(covered);
            }
        }
        !self.coverage.is_empty()
    }

    fn select_enemy_target(&mut self, unit: &UnitSnapshot, enemies: &EnemyView) -> Option<EnemyId> {
        if !self.prepare_coverage(unit) {
            return None;
        }

        let origin = unit.position?;
        let mut best: Option<Candidate> = None;

        for enemy in enemies.iter() {
            if !self.coverage.contains(&enemy.position) {
                continue;
            }

            let candidate = Candidate::rank(unit, enemy, origin, self.policy);
            best = Some(match best {
                None => candidate,
                Some(existing) => {
                    if candidate.precedes(&existing) {
                        candidate
                    } else {
                        existing
                    }
                }
            });
        }

        best.map(|candidate| candidate.enemy)
    }

    fn select_heal_target(
        &mut self,
        healer: &UnitSnapshot,
        units: &UnitView,
    ) -> Option<UnitId> {
        if !self.prepare_coverage(healer) {
            return None;
        }

        let mut best: Option<(f64, UnitId)> = None;
        for unit in units.iter() {
            if !unit.deployed || unit.id == healer.id {
                continue;
            }
            let Some(position) = unit.position else {
                continue;
            };
            if !self.coverage.contains(&position) {
                continue;
            }

            let max_hp = unit.stats.max_hp;
            if max_hp <= 0.0 || f64::from(unit.hp) >= max_hp {
                continue;
            }

            let fraction = f64::from(unit.hp) / max_hp;
            let better = match best {
                None => true,
                Some((held, held_id)) => {
                    fraction < held || (fraction == held && unit.id < held_id)
                }
            };
            if better {
                best = Some((fraction, unit.id));
            }
        }

        best.map(|(_, id)| id)
    }
}

#[derive(Clone, Copy, Debug)]
struct Candidate {
    enemy: EnemyId,
    blocked_by_attacker: bool,
    primary: f64,
}

impl Candidate {
    fn rank(
        unit: &UnitSnapshot,
        enemy: &EnemySnapshot,
        origin: GridPos,
        policy: TargetingPolicy,
    ) -> Self {
        let primary = match policy {
            // Larger progress is better; store negated so smaller
            // always precedes.
            TargetingPolicy::PathProgress => -enemy.goal_progress(),
            TargetingPolicy::AttackerDistance => {
                let dr = f64::from(enemy.position.row()) - f64::from(origin.row());
                let dc = f64::from(enemy.position.col()) - f64::from(origin.col());
                dr * dr + dc * dc
            }
        };
        Self {
            enemy: enemy.id,
            blocked_by_attacker: enemy.blocked_by == Some(unit.id),
            primary,
        }
    }

    fn precedes(&self, other: &Self) -> bool {
        if self.blocked_by_attacker != other.blocked_by_attacker {
            return self.blocked_by_attacker;
        }
        if self.primary != other.primary {
            return self.primary < other.primary;
        }
        self.enemy < other.enemy
    }
}
