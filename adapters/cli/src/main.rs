#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs one battle plan through the
//! simulation driver and reports the outcome.
//!
//! All parsing lives here: level and template files are machine dumps
//! deserialized straight into the core input types, the plan file is
//! the hand-written format defined in [`plan`]. The simulation core
//! itself never touches a file.

mod plan;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

use gatefall_core::{
    EnemyId, EntityRef, Event, LevelData, TemplateSet, UnitId, Verdict, WELCOME_BANNER,
};
use gatefall_engine::{Driver, SimulationConfig, SimulationResult};

/// Deterministic tower-defense battle simulator.
#[derive(Debug, Parser)]
#[command(name = "gatefall", version, about)]
struct Cli {
    /// Battle plan JSON file.
    plan: Option<PathBuf>,

    /// Level data JSON file.
    #[arg(long)]
    level: Option<PathBuf>,

    /// Entity template JSON file.
    #[arg(long)]
    templates: Option<PathBuf>,

    /// Write a machine-readable result document here.
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Print every event, including clock ticks and movement.
    #[arg(long, short)]
    verbose: bool,

    /// Simulated-time ceiling in seconds.
    #[arg(long)]
    ceiling: Option<f64>,

    /// Write an example battle plan and exit.
    #[arg(long)]
    create_example: bool,
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<bool> {
    if cli.create_example {
        let path = Path::new("example_battle_plan.json");
        let text = serde_json::to_string_pretty(&plan::example())?;
        fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
        println!("example battle plan written to {}", path.display());
        return Ok(true);
    }

    let plan_path = cli.plan.context("a battle plan file is required")?;
    let level_path = cli.level.context("--level is required")?;
    let templates_path = cli.templates.context("--templates is required")?;

    let plan: plan::PlanFile = load_json(&plan_path)?;
    let mut level: LevelData = load_json(&level_path)?;
    let templates: TemplateSet = load_json(&templates_path)?;

    if let Some(lives) = plan.initial_lives {
        level.options.max_lives = lives;
    }

    let mut config = SimulationConfig::default();
    if let Some(ceiling) = cli.ceiling {
        config.time_ceiling = Duration::from_secs_f64(ceiling.max(0.0));
    }

    println!("{WELCOME_BANNER}");
    println!("level: {}", level.name);

    let result = Driver::new(config)
        .run(&level, &templates, &plan.operator_configs(), &plan.timeline())
        .context("simulation failed")?;

    let lines = render_log(&result);
    for line in &lines {
        if cli.verbose || !line.routine {
            println!("[{:6.2}s] {}", line.time, line.message);
        }
    }
    print_summary(&result);

    if let Some(path) = cli.output {
        let report = Report::from_run(&result, &lines);
        let text = serde_json::to_string_pretty(&report)?;
        fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
        println!("result written to {}", path.display());
    }

    Ok(result.passed)
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn print_summary(result: &SimulationResult) {
    println!();
    println!("verdict:            {}", verdict_text(result.verdict));
    if let Some(reason) = result.failure_reason {
        println!("reason:             {reason:?}");
    }
    println!("battle time:        {:.2}s", result.final_time.as_secs_f64());
    println!("lives remaining:    {}", result.lives_remaining);
    println!("enemies defeated:   {}", result.enemies_defeated);
    println!(
        "operators deployed: {}",
        if result.operators_deployed.is_empty() {
            "none".to_owned()
        } else {
            result.operators_deployed.join(", ")
        }
    );
}

fn verdict_text(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::Won => "won",
        Verdict::Lost => "lost",
        Verdict::TimedOut => "timed out",
    }
}

/// One rendered log line; routine lines only print under `--verbose`.
struct LogLine {
    time: f64,
    message: String,
    routine: bool,
}

fn render_log(result: &SimulationResult) -> Vec<LogLine> {
    let mut enemy_names: HashMap<EnemyId, String> = HashMap::new();
    let unit_name = |unit: UnitId| -> String {
        result
            .unit_names
            .get(unit.get() as usize)
            .cloned()
            .unwrap_or_else(|| format!("unit#{}", unit.get()))
    };

    let mut lines = Vec::with_capacity(result.event_log.len());
    for entry in &result.event_log {
        if let Event::EnemySpawned { enemy, spawn, .. } = &entry.event {
            let key = result
                .spawn_keys
                .get(spawn.get() as usize)
                .cloned()
                .unwrap_or_else(|| "enemy".to_owned());
            let _ = enemy_names.insert(*enemy, format!("{key}#{}", enemy.get()));
        }

        let enemy_name = |enemy: EnemyId| -> String {
            enemy_names
                .get(&enemy)
                .cloned()
                .unwrap_or_else(|| format!("enemy#{}", enemy.get()))
        };
        let entity_name = |entity: &EntityRef| -> String {
            match entity {
                EntityRef::Unit(unit) => unit_name(*unit),
                EntityRef::Enemy(enemy) => enemy_name(*enemy),
            }
        };

        let (message, routine) = match &entry.event {
            Event::TimeAdvanced { dt } => {
                (format!("clock advanced {:.2}s", dt.as_secs_f64()), true)
            }
            Event::Deployed {
                unit,
                position,
                facing,
            } => (
                format!(
                    "deployed {} at ({}, {}) facing {facing:?}",
                    unit_name(*unit),
                    position.row(),
                    position.col()
                ),
                false,
            ),
            Event::Retreated { unit } => (format!("{} retreated", unit_name(*unit)), false),
            Event::ActionRejected {
                action,
                unit,
                reason,
            } => (
                format!(
                    "rejected {action:?} for {}: {reason:?}",
                    unit.map_or_else(|| "unknown operator".to_owned(), unit_name)
                ),
                false,
            ),
            Event::SkillActivated { unit, skill, .. } => (
                format!(
                    "{} activated skill {}",
                    unit_name(*unit),
                    skill.get() + 1
                ),
                false,
            ),
            Event::SkillExpired { unit, skill } => (
                format!("{} skill {} wore off", unit_name(*unit), skill.get() + 1),
                false,
            ),
            Event::EffectIgnored { unit, skill } => (
                format!(
                    "warning: {} skill {} carries an unmodeled effect",
                    unit_name(*unit),
                    skill.get() + 1
                ),
                false,
            ),
            Event::EnemySpawned {
                enemy, position, ..
            } => (
                format!(
                    "{} entered at ({}, {})",
                    enemy_name(*enemy),
                    position.row(),
                    position.col()
                ),
                false,
            ),
            Event::EnemyAdvanced { enemy, to, .. } => (
                format!(
                    "{} advanced to ({}, {})",
                    enemy_name(*enemy),
                    to.row(),
                    to.col()
                ),
                true,
            ),
            Event::EnemyLeaked {
                enemy,
                lives_remaining,
            } => (
                format!(
                    "{} breached the line, {lives_remaining} lives remain",
                    enemy_name(*enemy)
                ),
                false,
            ),
            Event::EnemyBlocked { enemy, unit } => (
                format!("{} blocked by {}", enemy_name(*enemy), unit_name(*unit)),
                false,
            ),
            Event::BlockReleased { enemy, unit } => (
                format!(
                    "{} no longer held by {}",
                    enemy_name(*enemy),
                    unit_name(*unit)
                ),
                false,
            ),
            Event::DamageDealt {
                attacker,
                target,
                kind,
                amount,
                remaining_hp,
            } => (
                format!(
                    "{} hit {} for {amount} ({kind:?}), {remaining_hp} hp left",
                    entity_name(attacker),
                    entity_name(target)
                ),
                true,
            ),
            Event::UnitHealed {
                healer,
                target,
                amount,
            } => (
                format!(
                    "{} healed {} for {amount}",
                    unit_name(*healer),
                    unit_name(*target)
                ),
                true,
            ),
            Event::EnemyDefeated { enemy } => {
                (format!("{} defeated", enemy_name(*enemy)), false)
            }
            Event::UnitDefeated { unit } => {
                (format!("{} was defeated", unit_name(*unit)), false)
            }
            Event::StatusApplied {
                target, status, ..
            } => (
                format!("{} is {status:?}", entity_name(target)),
                false,
            ),
        };

        lines.push(LogLine {
            time: entry.time.as_secs_f64(),
            message,
            routine,
        });
    }

    lines
}

/// Machine-readable result document written by `--output`.
#[derive(Debug, Serialize)]
struct Report {
    success: bool,
    verdict: &'static str,
    reason: Option<String>,
    final_life_points: u32,
    battle_time_seconds: f64,
    enemies_defeated: u32,
    operators_deployed: Vec<String>,
    detailed_log: Vec<ReportLine>,
}

#[derive(Debug, Serialize)]
struct ReportLine {
    time: f64,
    message: String,
}

impl Report {
    fn from_run(result: &SimulationResult, lines: &[LogLine]) -> Self {
        Self {
            success: result.passed,
            verdict: verdict_text(result.verdict),
            reason: result.failure_reason.map(|reason| format!("{reason:?}")),
            final_life_points: result.lives_remaining,
            battle_time_seconds: result.final_time.as_secs_f64(),
            enemies_defeated: result.enemies_defeated,
            operators_deployed: result.operators_deployed.clone(),
            detailed_log: lines
                .iter()
                .filter(|line| !line.routine)
                .map(|line| ReportLine {
                    time: line.time,
                    message: line.message.clone(),
                })
                .collect(),
        }
    }
}
