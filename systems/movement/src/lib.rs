#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic movement system that proposes enemy waypoint steps.
//!
//! The world banks fractional route progress for every unblocked enemy
//! as time advances; this system reads the resulting snapshots and
//! proposes one step command per enemy that has a full tile of
//! progress banked. The world validates each step again on
//! application, so a proposal that raced with a block or a defeat is
//! simply dropped.

use gatefall_core::{Command, EnemyView, Event};

/// Pure system that reacts to world events and emits step commands.
#[derive(Debug, Default)]
pub struct Movement;

impl Movement {
    /// Creates a new movement system.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Consumes events and the enemy snapshot to emit step commands in
    /// ascending enemy-id order.
    ///
    /// Steps are only proposed in response to events that can change
    /// readiness: time advancing, a prior step landing, a spawn, or a
    /// block dissolving. An enemy with several tiles of banked
    /// progress advances one waypoint per proposal round; the step it
    /// lands emits another event, which re-triggers this system until
    /// the bank runs dry.
    pub fn handle(&mut self, events: &[Event], enemies: &EnemyView, out: &mut Vec<Command>) {
        let relevant = events.iter().any(|event| {
            matches!(
                event,
                Event::TimeAdvanced { .. }
                    | Event::EnemyAdvanced { .. }
                    | Event::EnemySpawned { .. }
                    | Event::BlockReleased { .. }
            )
        });
        if !relevant {
            return;
        }

        for enemy in enemies.iter() {
            if enemy.ready_to_step {
                out.push(Command::StepEnemy { enemy: enemy.id });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Movement;
    use gatefall_core::{
        Command, EnemyId, EnemySnapshot, EnemyView, Event, GridPos, HitKind, StatBlock,
    };
    use std::time::Duration;

    fn snapshot(id: u32, ready: bool) -> EnemySnapshot {
        EnemySnapshot {
            id: EnemyId::new(id),
            position: GridPos::new(0, 0),
            waypoint: 0,
            route_len: 5,
            progress: if ready { 1.5 } else { 0.5 },
            hp: 100,
            stats: StatBlock {
                max_hp: 100.0,
                atk: 10.0,
                def: 0.0,
                res: 0.0,
                attack_interval: Duration::from_secs(1),
                move_speed: 1.0,
                deploy_cost: 0,
                block_capacity: 0,
            },
            damage_kind: HitKind::Physical,
            cooldown: Duration::ZERO,
            blocked_by: None,
            stunned: false,
            ready_to_step: ready,
        }
    }

    fn tick() -> Vec<Event> {
        vec![Event::TimeAdvanced {
            dt: Duration::from_millis(100),
        }]
    }

    #[test]
    fn ready_enemies_step_in_ascending_id_order() {
        let mut movement = Movement::new();
        let enemies =
            EnemyView::from_snapshots(vec![snapshot(4, true), snapshot(1, true), snapshot(2, false)]);

        let mut out = Vec::new();
        movement.handle(&tick(), &enemies, &mut out);
        assert_eq!(
            out,
            vec![
                Command::StepEnemy {
                    enemy: EnemyId::new(1),
                },
                Command::StepEnemy {
                    enemy: EnemyId::new(4),
                },
            ]
        );
    }

    #[test]
    fn unrelated_events_propose_nothing() {
        let mut movement = Movement::new();
        let enemies = EnemyView::from_snapshots(vec![snapshot(0, true)]);

        let mut out = Vec::new();
        movement.handle(&[], &enemies, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn a_landed_step_retriggers_proposals() {
        let mut movement = Movement::new();
        let enemies = EnemyView::from_snapshots(vec![snapshot(0, true)]);
        let events = vec![Event::EnemyAdvanced {
            enemy: EnemyId::new(0),
            from: GridPos::new(0, 0),
            to: GridPos::new(0, 1),
        }];

        let mut out = Vec::new();
        movement.handle(&events, &enemies, &mut out);
        assert_eq!(out.len(), 1);
    }
}
