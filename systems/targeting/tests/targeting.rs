//! Targeting over real world snapshots: deploy facing rotates the
//! range shape, and assignments follow the rotated coverage.

use std::time::Duration;

use gatefall_core::{
    AssignmentKind, AttackAssignment, CapabilityTags, Command, DeployClass, DeployKind, EnemyId,
    EntityRef, Event, Facing, GridPos, HitKind, LevelData, LevelOptions, RangeOffset, RouteId,
    RouteSpec, SpawnIndex, SpawnSeed, StatBlock, TileKind, TileSpec, UnitId, UnitSeed,
};
use gatefall_system_targeting::Targeting;
use gatefall_world::{apply, query, World};

fn tile() -> TileSpec {
    TileSpec {
        kind: TileKind::Road,
        deploy: DeployClass::Any,
    }
}

/// A 3x3 yard; the strays spawned here have zero movement speed, so
/// each one stays parked on its route's first waypoint.
fn yard() -> LevelData {
    let parked = |start: (u32, u32), end: (u32, u32)| RouteSpec {
        start: GridPos::new(start.0, start.1),
        end: GridPos::new(end.0, end.1),
        checkpoints: Vec::new(),
        allow_diagonal: false,
    };

    LevelData {
        name: "yard".to_owned(),
        tiles: vec![vec![tile(); 3]; 3],
        routes: vec![parked((0, 1), (0, 0)), parked((1, 2), (2, 2))],
        waves: Vec::new(),
        options: LevelOptions::default(),
    }
}

fn stats(block_capacity: u32) -> StatBlock {
    StatBlock {
        max_hp: 1000.0,
        atk: 300.0,
        def: 50.0,
        res: 0.0,
        attack_interval: Duration::from_secs(1),
        move_speed: 0.0,
        deploy_cost: 5,
        block_capacity,
    }
}

fn watcher() -> UnitSeed {
    UnitSeed {
        name: "watcher".to_owned(),
        stats: stats(1),
        deploy_kind: DeployKind::Melee,
        damage_kind: HitKind::Physical,
        capabilities: CapabilityTags {
            attacker: true,
            blocker: true,
            healer: false,
            mover: false,
        },
        // Own tile plus one tile forward, authored facing right.
        range: vec![RangeOffset::new(0, 0), RangeOffset::new(0, 1)],
        skills: Vec::new(),
        mandatory: false,
    }
}

fn stray(route: u32) -> SpawnSeed {
    SpawnSeed {
        key: "stray".to_owned(),
        time: Duration::ZERO,
        stats: stats(0),
        damage_kind: HitKind::Physical,
        route: RouteId::new(route),
    }
}

fn spawn_all(world: &mut World, count: u32) {
    for index in 0..count {
        let mut events = Vec::new();
        apply(
            world,
            Command::SpawnEnemy {
                spawn: SpawnIndex::new(index),
            },
            &mut events,
        );
        assert!(
            events
                .iter()
                .any(|event| matches!(event, Event::EnemySpawned { .. })),
            "spawn {index} must land"
        );
    }
}

fn deploy(world: &mut World, facing: Facing) {
    let mut events = Vec::new();
    apply(
        world,
        Command::Deploy {
            unit: UnitId::new(0),
            position: GridPos::new(1, 1),
            facing,
        },
        &mut events,
    );
    assert!(events
        .iter()
        .any(|event| matches!(event, Event::Deployed { .. })));
}

#[test]
fn facing_right_covers_the_east_neighbor() {
    let mut world = World::new(&yard(), vec![watcher()], vec![stray(0), stray(1)])
        .expect("world builds");
    spawn_all(&mut world, 2);
    deploy(&mut world, Facing::Right);

    let mut targeting = Targeting::new();
    let mut out = Vec::new();
    targeting.handle(
        &query::unit_view(&world),
        &query::enemy_view(&world),
        &mut out,
    );

    // Only the enemy on (1, 2) sits in the rotated shape.
    let unit_attacks: Vec<&AttackAssignment> = out
        .iter()
        .filter(|held| held.attacker == EntityRef::Unit(UnitId::new(0)))
        .collect();
    assert_eq!(unit_attacks.len(), 1);
    assert_eq!(unit_attacks[0].target, EntityRef::Enemy(EnemyId::new(1)));
    assert_eq!(unit_attacks[0].kind, AssignmentKind::Attack);
}

#[test]
fn facing_up_rotates_coverage_to_the_north_neighbor() {
    let mut world = World::new(&yard(), vec![watcher()], vec![stray(0), stray(1)])
        .expect("world builds");
    spawn_all(&mut world, 2);
    deploy(&mut world, Facing::Up);

    let mut targeting = Targeting::new();
    let mut out = Vec::new();
    targeting.handle(
        &query::unit_view(&world),
        &query::enemy_view(&world),
        &mut out,
    );

    let unit_attacks: Vec<&AttackAssignment> = out
        .iter()
        .filter(|held| held.attacker == EntityRef::Unit(UnitId::new(0)))
        .collect();
    assert_eq!(unit_attacks.len(), 1);
    assert_eq!(unit_attacks[0].target, EntityRef::Enemy(EnemyId::new(0)));
}
