#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure system that fires automatically triggered skills.
//!
//! Charge bookkeeping lives in the world; this system only scans the
//! roster snapshot for auto-trigger skills holding a full charge and
//! proposes their activation, in ascending unit and slot order. Manual
//! skills fire through the scripted timeline and passive skills never
//! fire at all.

use gatefall_core::{Command, TriggerKind, UnitView};

/// Pure system that emits activation commands for charged auto skills.
#[derive(Debug, Default)]
pub struct AutoSkills;

impl AutoSkills {
    /// Creates a new auto-skill system.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Scans the roster snapshot and proposes due activations.
    ///
    /// Skills with a zero activation cost are never auto-fired: they
    /// would read as charged again the instant they resolve.
    pub fn handle(&mut self, units: &UnitView, out: &mut Vec<Command>) {
        for unit in units.iter() {
            if !unit.deployed {
                continue;
            }
            for skill in &unit.skills {
                if skill.trigger == TriggerKind::Auto && skill.charged && skill.sp_cost > 0.0 {
                    out.push(Command::ActivateSkill {
                        unit: unit.id,
                        skill: skill.slot,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AutoSkills;
    use gatefall_core::{
        CapabilityTags, Command, Facing, HitKind, SkillSlot, SkillStateSnapshot, StatBlock,
        TriggerKind, UnitId, UnitSnapshot, UnitView,
    };
    use std::time::Duration;

    fn skill(slot: u8, trigger: TriggerKind, charged: bool) -> SkillStateSnapshot {
        SkillStateSnapshot {
            slot: SkillSlot::new(slot),
            trigger,
            sp: if charged { 30.0 } else { 5.0 },
            sp_cost: 30.0,
            charged,
            active: false,
        }
    }

    fn unit(id: u32, deployed: bool, skills: Vec<SkillStateSnapshot>) -> UnitSnapshot {
        UnitSnapshot {
            id: UnitId::new(id),
            position: deployed.then(|| gatefall_core::GridPos::new(0, id)),
            facing: Facing::Right,
            hp: 100,
            stats: StatBlock {
                max_hp: 100.0,
                atk: 100.0,
                def: 0.0,
                res: 0.0,
                attack_interval: Duration::from_secs(1),
                move_speed: 0.0,
                deploy_cost: 10,
                block_capacity: 1,
            },
            damage_kind: HitKind::Physical,
            capabilities: CapabilityTags {
                attacker: true,
                blocker: true,
                healer: false,
                mover: false,
            },
            range: Vec::new(),
            cooldown: Duration::ZERO,
            blocked: Vec::new(),
            skills,
            deployed,
            alive: true,
        }
    }

    #[test]
    fn charged_auto_skills_fire_in_unit_and_slot_order() {
        let mut system = AutoSkills::new();
        let units = UnitView::from_snapshots(vec![
            unit(
                1,
                true,
                vec![
                    skill(0, TriggerKind::Auto, true),
                    skill(1, TriggerKind::Auto, true),
                ],
            ),
            unit(0, true, vec![skill(0, TriggerKind::Auto, true)]),
        ]);

        let mut out = Vec::new();
        system.handle(&units, &mut out);
        assert_eq!(
            out,
            vec![
                Command::ActivateSkill {
                    unit: UnitId::new(0),
                    skill: SkillSlot::new(0),
                },
                Command::ActivateSkill {
                    unit: UnitId::new(1),
                    skill: SkillSlot::new(0),
                },
                Command::ActivateSkill {
                    unit: UnitId::new(1),
                    skill: SkillSlot::new(1),
                },
            ]
        );
    }

    #[test]
    fn manual_and_uncharged_skills_stay_quiet() {
        let mut system = AutoSkills::new();
        let units = UnitView::from_snapshots(vec![unit(
            0,
            true,
            vec![
                skill(0, TriggerKind::Manual, true),
                skill(1, TriggerKind::Auto, false),
                skill(2, TriggerKind::Passive, true),
            ],
        )]);

        let mut out = Vec::new();
        system.handle(&units, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn benched_units_never_fire() {
        let mut system = AutoSkills::new();
        let units =
            UnitView::from_snapshots(vec![unit(0, false, vec![skill(0, TriggerKind::Auto, true)])]);

        let mut out = Vec::new();
        system.handle(&units, &mut out);
        assert!(out.is_empty());
    }
}
