use std::time::Duration;

use gatefall_core::{
    CapabilityTags, DeployClass, DeployKind, DurationKind, EffectOp, ElitePhase, EntityTemplate,
    Event, Facing, FailureReason, FragmentSpec, GridPos, HitKind, LevelData, LevelOptions,
    OperatorConfig, PlayerAction, PlayerOp, RangeOffset, RejectReason, RouteId, RouteSpec,
    SetupError, SkillSlot, SkillSpec, SkillTable, SpChargeKind, SpModel, SpawnActionSpec, Stat,
    StatKeyFrame, TemplateSet, TileKind, TileSpec, TriggerKind, Verdict, WaveSpec,
};
use gatefall_engine::{Driver, SimulationConfig, SimulationError, TimeoutPolicy};

fn road(deploy: DeployClass) -> TileSpec {
    TileSpec {
        kind: TileKind::Road,
        deploy,
    }
}

/// A 1x5 corridor with a single west-to-east route.
fn corridor(waves: Vec<WaveSpec>) -> LevelData {
    LevelData {
        name: "corridor".to_owned(),
        tiles: vec![vec![
            road(DeployClass::Any),
            road(DeployClass::Any),
            road(DeployClass::Any),
            road(DeployClass::None),
            road(DeployClass::Any),
        ]],
        routes: vec![RouteSpec {
            start: GridPos::new(0, 0),
            end: GridPos::new(0, 4),
            checkpoints: Vec::new(),
            allow_diagonal: false,
        }],
        waves,
        options: LevelOptions {
            max_lives: 3,
            roster_limit: 8,
            initial_cost: 20,
            max_cost: 99,
            cost_interval: Duration::from_secs(1),
        },
    }
}

fn wave_of(enemy: &str, count: u32, first: u64, interval: u64) -> WaveSpec {
    WaveSpec {
        pre_delay: Duration::from_secs(first),
        post_delay: Duration::ZERO,
        fragments: vec![FragmentSpec {
            pre_delay: Duration::ZERO,
            actions: vec![SpawnActionSpec {
                enemy: enemy.to_owned(),
                count,
                pre_delay: Duration::ZERO,
                interval: Duration::from_secs(interval),
                route: RouteId::new(0),
            }],
        }],
    }
}

fn operator_frame(level: u32, max_hp: f64, atk: f64, def: f64) -> StatKeyFrame {
    StatKeyFrame {
        level,
        max_hp,
        atk,
        def,
        res: 0.0,
        deploy_cost: 10,
        block_capacity: 2,
        base_attack_interval: 1.0,
        attack_speed: 100.0,
        move_speed: 0.0,
    }
}

fn guard_template(def: f64) -> EntityTemplate {
    EntityTemplate {
        name: "Line Guard".to_owned(),
        deploy_kind: DeployKind::Melee,
        damage_kind: HitKind::Physical,
        capabilities: CapabilityTags {
            attacker: true,
            blocker: true,
            healer: false,
            mover: false,
        },
        phases: vec![ElitePhase {
            key_frames: vec![
                operator_frame(1, 1000.0, 300.0, def),
                operator_frame(30, 1600.0, 400.0, def),
            ],
            range: vec![RangeOffset::new(0, 0), RangeOffset::new(0, 1)],
        }],
        potential: Vec::new(),
        skills: vec![SkillTable {
            levels: vec![SkillSpec {
                name: "War Cry".to_owned(),
                trigger: TriggerKind::Manual,
                sp: SpModel {
                    charge: SpChargeKind::Time,
                    cost: 10.0,
                    initial: 10.0,
                    gain: 1.0,
                },
                duration: DurationKind::Timed(Duration::from_secs(10)),
                effects: vec![EffectOp::StatScale {
                    stat: Stat::Atk,
                    factor: 1.5,
                }],
            }],
        }],
    }
}

fn enemy_template(max_hp: f64, atk: f64, tiles_per_second: f64) -> EntityTemplate {
    EntityTemplate {
        name: "Slug".to_owned(),
        deploy_kind: DeployKind::Melee,
        damage_kind: HitKind::Physical,
        capabilities: CapabilityTags {
            attacker: true,
            blocker: false,
            healer: false,
            mover: true,
        },
        phases: vec![ElitePhase {
            key_frames: vec![StatKeyFrame {
                level: 0,
                max_hp,
                atk,
                def: 0.0,
                res: 0.0,
                deploy_cost: 0,
                block_capacity: 0,
                base_attack_interval: 2.0,
                attack_speed: 100.0,
                move_speed: tiles_per_second,
            }],
            range: Vec::new(),
        }],
        potential: Vec::new(),
        skills: Vec::new(),
    }
}

fn templates() -> TemplateSet {
    let mut set = TemplateSet::new();
    set.insert("guard", guard_template(100.0));
    set.insert("slug", enemy_template(500.0, 100.0, 0.5));
    set.insert("brute", enemy_template(100_000.0, 5000.0, 0.5));
    set
}

fn guard_config(custom_id: &str, mandatory: bool) -> OperatorConfig {
    OperatorConfig {
        operator: "guard".to_owned(),
        custom_id: custom_id.to_owned(),
        level: 1,
        elite: 0,
        potential: 0,
        skill_level: 1,
        mandatory,
    }
}

fn deploy(operator: &str, seconds: u64, col: u32) -> PlayerAction {
    PlayerAction {
        time: Duration::from_secs(seconds),
        operator: operator.to_owned(),
        op: PlayerOp::Deploy {
            position: GridPos::new(0, col),
            facing: Facing::Right,
        },
    }
}

fn activate(operator: &str, seconds: u64) -> PlayerAction {
    PlayerAction {
        time: Duration::from_secs(seconds),
        operator: operator.to_owned(),
        op: PlayerOp::ActivateSkill {
            skill: SkillSlot::new(0),
        },
    }
}

#[test]
fn a_level_without_spawns_is_won_immediately() {
    let driver = Driver::default();
    let result = driver
        .run(&corridor(Vec::new()), &templates(), &[], &[])
        .expect("runs");

    assert_eq!(result.verdict, Verdict::Won);
    assert_eq!(result.failure_reason, None);
    assert!(result.passed);
    assert_eq!(result.final_time, Duration::ZERO);
    assert!(result.event_log.is_empty());
}

#[test]
fn unopposed_enemies_exhaust_lives_before_the_schedule_completes() {
    let mut level = corridor(vec![wave_of("slug", 2, 0, 50)]);
    level.options.max_lives = 1;

    let driver = Driver::default();
    let result = driver.run(&level, &templates(), &[], &[]).expect("runs");

    assert_eq!(result.verdict, Verdict::Lost);
    assert_eq!(result.failure_reason, Some(FailureReason::LivesExhausted));
    assert!(!result.passed);
    assert_eq!(result.lives_remaining, 0);

    // The second spawn was still pending when the run ended.
    let spawned = result
        .event_log
        .iter()
        .filter(|entry| matches!(entry.event, Event::EnemySpawned { .. }))
        .count();
    assert_eq!(result.spawn_keys.len(), 2);
    assert_eq!(spawned, 1);
}

#[test]
fn a_deployed_guard_holds_and_clears_the_wave() {
    let level = corridor(vec![wave_of("slug", 1, 0, 1)]);
    let driver = Driver::default();
    let result = driver
        .run(
            &level,
            &templates(),
            &[guard_config("guard_1", false)],
            &[deploy("guard_1", 1, 2)],
        )
        .expect("runs");

    assert_eq!(result.verdict, Verdict::Won);
    assert!(result.passed);
    assert_eq!(result.lives_remaining, 3);
    assert_eq!(result.enemies_defeated, 1);
    assert_eq!(result.operators_deployed, vec!["guard_1".to_owned()]);

    // ATK 300 against DEF 0 lands the full amount.
    assert!(result.event_log.iter().any(|entry| matches!(
        entry.event,
        Event::DamageDealt {
            amount: 300,
            kind: HitKind::Physical,
            ..
        }
    )));
    assert!(result
        .event_log
        .iter()
        .any(|entry| matches!(entry.event, Event::EnemyBlocked { .. })));
    assert!(result
        .event_log
        .iter()
        .any(|entry| matches!(entry.event, Event::EnemyDefeated { .. })));
}

#[test]
fn rejected_deploys_are_logged_and_do_not_end_the_run() {
    let level = corridor(vec![wave_of("slug", 1, 0, 1)]);
    let driver = Driver::default();
    let result = driver
        .run(
            &level,
            &templates(),
            &[guard_config("guard_1", false)],
            &[deploy("guard_1", 1, 3)],
        )
        .expect("runs");

    // Tile (0, 3) admits no deployments; the action is skipped, nobody
    // enters the field, and the battle plays out to its own end.
    assert!(result.event_log.iter().any(|entry| matches!(
        entry.event,
        Event::ActionRejected {
            reason: RejectReason::NotDeployable,
            ..
        }
    )));
    assert!(result.operators_deployed.is_empty());
    assert_eq!(result.verdict, Verdict::Won);
    assert_eq!(result.lives_remaining, 2);
}

#[test]
fn simultaneous_actions_dispatch_in_timeline_order() {
    let level = corridor(vec![wave_of("slug", 1, 0, 1)]);
    let driver = Driver::default();
    let result = driver
        .run(
            &level,
            &templates(),
            &[guard_config("guard_1", false)],
            &[deploy("guard_1", 1, 2), activate("guard_1", 1)],
        )
        .expect("runs");

    let deployed_at = result
        .event_log
        .iter()
        .position(|entry| matches!(entry.event, Event::Deployed { .. }))
        .expect("deploy logged");
    let activated_at = result
        .event_log
        .iter()
        .position(|entry| matches!(entry.event, Event::SkillActivated { .. }))
        .expect("activation logged");

    assert_eq!(result.event_log[deployed_at].time, Duration::from_secs(1));
    assert_eq!(result.event_log[activated_at].time, Duration::from_secs(1));
    assert!(deployed_at < activated_at);
}

#[test]
fn expirations_dispatch_before_scripted_actions_at_the_same_instant() {
    // The late spawn keeps the battle running past the instant under
    // test.
    let level = corridor(vec![wave_of("slug", 1, 20, 1)]);
    let driver = Driver::default();
    let result = driver
        .run(
            &level,
            &templates(),
            &[guard_config("guard_1", false)],
            &[
                deploy("guard_1", 1, 2),
                activate("guard_1", 1),
                // Lands exactly when the 10-second skill expires.
                PlayerAction {
                    time: Duration::from_secs(11),
                    operator: "guard_1".to_owned(),
                    op: PlayerOp::Retreat,
                },
            ],
        )
        .expect("runs");

    let expired_at = result
        .event_log
        .iter()
        .position(|entry| matches!(entry.event, Event::SkillExpired { .. }))
        .expect("expiry logged");
    let retreated_at = result
        .event_log
        .iter()
        .position(|entry| matches!(entry.event, Event::Retreated { .. }))
        .expect("retreat logged");

    assert_eq!(result.event_log[expired_at].time, Duration::from_secs(11));
    assert_eq!(result.event_log[retreated_at].time, Duration::from_secs(11));
    assert!(expired_at < retreated_at);
}

#[test]
fn unordered_timelines_abort_before_simulation() {
    let level = corridor(Vec::new());
    let driver = Driver::default();
    let error = driver
        .run(
            &level,
            &templates(),
            &[guard_config("guard_1", false)],
            &[deploy("guard_1", 5, 2), deploy("guard_1", 2, 1)],
        )
        .expect_err("unordered");

    assert_eq!(
        error,
        SimulationError::Setup(SetupError::UnorderedTimeline { index: 1 })
    );
}

#[test]
fn unknown_operator_references_reject_without_ending_the_run() {
    let level = corridor(vec![wave_of("slug", 1, 0, 1)]);
    let driver = Driver::default();
    let result = driver
        .run(&level, &templates(), &[], &[deploy("ghost", 1, 2)])
        .expect("runs");

    assert!(result.event_log.iter().any(|entry| matches!(
        entry.event,
        Event::ActionRejected {
            unit: None,
            reason: RejectReason::UnknownUnit,
            ..
        }
    )));
    assert_eq!(result.verdict, Verdict::Won);
}

#[test]
fn losing_a_mandatory_operator_loses_the_run() {
    let level = corridor(vec![wave_of("brute", 1, 0, 1)]);
    let driver = Driver::default();
    let result = driver
        .run(
            &level,
            &templates(),
            &[guard_config("guard_1", true)],
            &[deploy("guard_1", 1, 2)],
        )
        .expect("runs");

    assert_eq!(result.verdict, Verdict::Lost);
    assert_eq!(result.failure_reason, Some(FailureReason::MandatoryUnitLost));
    assert!(result
        .event_log
        .iter()
        .any(|entry| matches!(entry.event, Event::UnitDefeated { .. })));
}

#[test]
fn stalemates_time_out_with_their_own_verdict() {
    let mut set = TemplateSet::new();
    set.insert("guard", guard_template(200.0));
    set.insert("slug", enemy_template(1.0e9, 100.0, 0.5));
    let level = corridor(vec![wave_of("slug", 1, 0, 1)]);

    let config = SimulationConfig {
        time_ceiling: Duration::from_secs(10),
        ..SimulationConfig::default()
    };
    let result = Driver::new(config)
        .run(
            &level,
            &set,
            &[guard_config("guard_1", false)],
            &[deploy("guard_1", 1, 2)],
        )
        .expect("runs");

    assert_eq!(result.verdict, Verdict::TimedOut);
    assert_eq!(result.failure_reason, Some(FailureReason::Timeout));
    assert!(!result.passed);

    let tolerant = SimulationConfig {
        time_ceiling: Duration::from_secs(10),
        timeout_policy: TimeoutPolicy::Inconclusive,
        ..SimulationConfig::default()
    };
    let result = Driver::new(tolerant)
        .run(
            &level,
            &set,
            &[guard_config("guard_1", false)],
            &[deploy("guard_1", 1, 2)],
        )
        .expect("runs");
    assert_eq!(result.verdict, Verdict::TimedOut);
    assert!(result.passed);
}

#[test]
fn missing_tier_data_is_fatal_at_setup() {
    let level = corridor(Vec::new());
    let mut config = guard_config("guard_1", false);
    config.elite = 2;

    let error = Driver::default()
        .run(&level, &templates(), &[config], &[])
        .expect_err("no elite 2 phase");

    assert_eq!(
        error,
        SimulationError::Setup(SetupError::InvalidTemplate {
            id: "guard".to_owned(),
            elite: 2,
            level: 1,
        })
    );
}
