//! Stat vocabulary and the reversible modifier stack.
//!
//! Every combatant owns a [`StatSheet`]: an immutable base [`StatBlock`]
//! plus an ordered stack of [`StatModifier`] entries contributed by
//! skills and effects. Effective stats are recomputed from the base on
//! every read — additive entries are summed first, multiplicative
//! entries applied after — so repeated apply/expire cycles can never
//! accumulate drift.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Attributes that modifiers may address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stat {
    /// Maximum hit points.
    MaxHp,
    /// Attack power feeding the damage and healing formulas.
    Atk,
    /// Flat physical damage reduction.
    Def,
    /// Arts resistance expressed in percentage points.
    Res,
    /// Movement speed in tiles per second.
    MoveSpeed,
}

/// How a modifier combines with the stat it addresses.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ModifierOp {
    /// Added to the base value before any scaling.
    Add(f64),
    /// Multiplied into the sum of base and additive entries.
    Scale(f64),
}

/// A single entry in an entity's modifier stack.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatModifier {
    /// Attribute the modifier addresses.
    pub stat: Stat,
    /// Combination rule and magnitude.
    pub op: ModifierOp,
}

/// Token returned by [`StatSheet::apply`], used to unwind exactly the
/// modifier it was issued for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModifierHandle(u32);

/// Base attributes of a combatant, fixed for the run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StatBlock {
    /// Maximum hit points.
    pub max_hp: f64,
    /// Attack power.
    pub atk: f64,
    /// Flat physical damage reduction.
    pub def: f64,
    /// Arts resistance in percentage points.
    pub res: f64,
    /// Time between consecutive attacks.
    pub attack_interval: Duration,
    /// Movement speed in tiles per second; zero for stationary units.
    pub move_speed: f64,
    /// Deploy cost charged on placement.
    pub deploy_cost: u32,
    /// Number of enemies the entity can hold simultaneously.
    pub block_capacity: u32,
}

/// Ordered, reversible modifier stack over an immutable base block.
#[derive(Clone, Debug)]
pub struct StatSheet {
    base: StatBlock,
    next_handle: u32,
    modifiers: Vec<(ModifierHandle, StatModifier)>,
}

impl StatSheet {
    /// Creates a sheet with an empty modifier stack.
    #[must_use]
    pub const fn new(base: StatBlock) -> Self {
        Self {
            base,
            next_handle: 0,
            modifiers: Vec::new(),
        }
    }

    /// Base attributes the sheet was created with.
    #[must_use]
    pub const fn base(&self) -> &StatBlock {
        &self.base
    }

    /// Pushes a modifier onto the stack, returning the handle that
    /// removes it again.
    pub fn apply(&mut self, modifier: StatModifier) -> ModifierHandle {
        let handle = ModifierHandle(self.next_handle);
        self.next_handle = self.next_handle.wrapping_add(1);
        self.modifiers.push((handle, modifier));
        handle
    }

    /// Removes the modifier issued under the provided handle.
    ///
    /// Returns `false` when the handle was already removed; removal is
    /// idempotent so expiry paths need not track double-delivery.
    pub fn remove(&mut self, handle: ModifierHandle) -> bool {
        let before = self.modifiers.len();
        self.modifiers.retain(|(held, _)| *held != handle);
        self.modifiers.len() != before
    }

    /// Number of modifiers currently on the stack.
    #[must_use]
    pub fn active_modifiers(&self) -> usize {
        self.modifiers.len()
    }

    /// Computes effective attributes: per stat, additive entries are
    /// summed onto the base, then multiplicative entries are applied,
    /// in that fixed order.
    #[must_use]
    pub fn effective(&self) -> StatBlock {
        let mut block = self.base;
        block.max_hp = self.resolve(Stat::MaxHp, self.base.max_hp);
        block.atk = self.resolve(Stat::Atk, self.base.atk);
        block.def = self.resolve(Stat::Def, self.base.def);
        block.res = self.resolve(Stat::Res, self.base.res);
        block.move_speed = self.resolve(Stat::MoveSpeed, self.base.move_speed);
        block
    }

    fn resolve(&self, stat: Stat, base: f64) -> f64 {
        let mut value = base;
        for (_, modifier) in &self.modifiers {
            if modifier.stat == stat {
                if let ModifierOp::Add(amount) = modifier.op {
                    value += amount;
                }
            }
        }
        for (_, modifier) in &self.modifiers {
            if modifier.stat == stat {
                if let ModifierOp::Scale(factor) = modifier.op {
                    value *= factor;
                }
            }
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::{ModifierOp, Stat, StatBlock, StatModifier, StatSheet};
    use std::time::Duration;

    fn block() -> StatBlock {
        StatBlock {
            max_hp: 1500.0,
            atk: 400.0,
            def: 120.0,
            res: 10.0,
            attack_interval: Duration::from_millis(1300),
            move_speed: 0.0,
            deploy_cost: 12,
            block_capacity: 2,
        }
    }

    #[test]
    fn additive_entries_apply_before_multiplicative() {
        let mut sheet = StatSheet::new(block());
        let _ = sheet.apply(StatModifier {
            stat: Stat::Atk,
            op: ModifierOp::Scale(1.5),
        });
        let _ = sheet.apply(StatModifier {
            stat: Stat::Atk,
            op: ModifierOp::Add(100.0),
        });

        // (400 + 100) * 1.5, regardless of stack insertion order.
        assert_eq!(sheet.effective().atk, 750.0);
    }

    #[test]
    fn apply_then_remove_restores_exact_base() {
        let mut sheet = StatSheet::new(block());
        let before = sheet.effective();

        for _ in 0..100 {
            let scale = sheet.apply(StatModifier {
                stat: Stat::Atk,
                op: ModifierOp::Scale(1.37),
            });
            let add = sheet.apply(StatModifier {
                stat: Stat::Def,
                op: ModifierOp::Add(55.5),
            });
            assert!(sheet.remove(scale));
            assert!(sheet.remove(add));
        }

        assert_eq!(sheet.effective(), before);
        assert_eq!(sheet.active_modifiers(), 0);
    }

    #[test]
    fn removal_is_idempotent() {
        let mut sheet = StatSheet::new(block());
        let handle = sheet.apply(StatModifier {
            stat: Stat::Res,
            op: ModifierOp::Add(20.0),
        });

        assert!(sheet.remove(handle));
        assert!(!sheet.remove(handle));
        assert_eq!(sheet.effective().res, 10.0);
    }

    #[test]
    fn modifiers_address_only_their_stat() {
        let mut sheet = StatSheet::new(block());
        let _ = sheet.apply(StatModifier {
            stat: Stat::MaxHp,
            op: ModifierOp::Scale(2.0),
        });

        let effective = sheet.effective();
        assert_eq!(effective.max_hp, 3000.0);
        assert_eq!(effective.atk, 400.0);
        assert_eq!(effective.def, 120.0);
    }
}
