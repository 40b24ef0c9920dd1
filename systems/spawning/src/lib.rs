#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic spawning system that feeds the compiled spawn
//! schedule into the battle.
//!
//! The schedule is flattened to absolute times before the run starts;
//! this system only walks a cursor over it, emitting one spawn command
//! per due entry. The scheduler reads [`Spawning::next_due`] to decide
//! how far it may advance the clock without skipping a spawn.

use std::time::Duration;

use gatefall_core::{Command, SpawnIndex};

/// Pure system that emits spawn commands for schedule entries whose
/// time has come.
#[derive(Debug)]
pub struct Spawning {
    schedule: Vec<Duration>,
    cursor: usize,
}

impl Spawning {
    /// Creates a spawning system over the compiled schedule times.
    ///
    /// Times must be in non-decreasing order, which is what the spawn
    /// compiler produces; entry `i` corresponds to spawn id `i`.
    #[must_use]
    pub fn new(schedule: Vec<Duration>) -> Self {
        debug_assert!(
            schedule.windows(2).all(|pair| pair[0] <= pair[1]),
            "spawn schedule must be sorted",
        );
        Self {
            schedule,
            cursor: 0,
        }
    }

    /// Absolute time of the next unfired spawn, if any remain.
    #[must_use]
    pub fn next_due(&self) -> Option<Duration> {
        self.schedule.get(self.cursor).copied()
    }

    /// Reports whether every schedule entry has fired.
    #[must_use]
    pub fn exhausted(&self) -> bool {
        self.cursor >= self.schedule.len()
    }

    /// Number of entries in the full schedule.
    #[must_use]
    pub fn total(&self) -> usize {
        self.schedule.len()
    }

    /// Emits spawn commands for every entry due at or before `now`, in
    /// schedule order.
    pub fn handle(&mut self, now: Duration, out: &mut Vec<Command>) {
        while let Some(time) = self.next_due() {
            if time > now {
                break;
            }
            out.push(Command::SpawnEnemy {
                spawn: SpawnIndex::new(self.cursor as u32),
            });
            self.cursor += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Spawning;
    use gatefall_core::{Command, SpawnIndex};
    use std::time::Duration;

    fn seconds(values: &[u64]) -> Vec<Duration> {
        values.iter().copied().map(Duration::from_secs).collect()
    }

    #[test]
    fn due_entries_fire_in_schedule_order() {
        let mut spawning = Spawning::new(seconds(&[1, 1, 3]));
        let mut out = Vec::new();

        spawning.handle(Duration::from_secs(1), &mut out);
        assert_eq!(
            out,
            vec![
                Command::SpawnEnemy {
                    spawn: SpawnIndex::new(0),
                },
                Command::SpawnEnemy {
                    spawn: SpawnIndex::new(1),
                },
            ]
        );
        assert_eq!(spawning.next_due(), Some(Duration::from_secs(3)));
        assert!(!spawning.exhausted());
    }

    #[test]
    fn early_clocks_fire_nothing() {
        let mut spawning = Spawning::new(seconds(&[5]));
        let mut out = Vec::new();

        spawning.handle(Duration::from_secs(4), &mut out);
        assert!(out.is_empty());
        assert_eq!(spawning.next_due(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn an_empty_schedule_is_exhausted_from_the_start() {
        let spawning = Spawning::new(Vec::new());
        assert!(spawning.exhausted());
        assert_eq!(spawning.next_due(), None);
        assert_eq!(spawning.total(), 0);
    }

    #[test]
    fn entries_fire_exactly_once() {
        let mut spawning = Spawning::new(seconds(&[2]));
        let mut out = Vec::new();

        spawning.handle(Duration::from_secs(2), &mut out);
        spawning.handle(Duration::from_secs(9), &mut out);
        assert_eq!(out.len(), 1);
        assert!(spawning.exhausted());
    }
}
