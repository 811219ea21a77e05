//! Idle production simulator.
//!
//! Owned modules produce energy every second in proportion to their level.
//! While the engine runs, [`IdleEconomy::tick`] credits one interval at a
//! time; on start, [`IdleEconomy::catch_up`] credits the whole time the
//! learner was away in a single lump.
//!
//! Stored energy and currency may come from corrupted storage, so every read
//! goes through [`sanitize`] before any arithmetic.

use std::collections::BTreeMap;

use questline_types::{IdleSnapshot, ModuleId};
use tracing::debug;

use crate::config::EconomyConfig;
use crate::modules;
use crate::stats::sanitize;

/// Resources credited by a single live tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TickYield {
    /// Energy added.
    pub energy: f64,
    /// Currency added by passive conversion.
    pub currency: f64,
}

/// Resources credited for time spent away.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CatchUp {
    /// Whole seconds credited.
    pub elapsed_seconds: u64,
    /// Energy added.
    pub energy: f64,
    /// Currency added.
    pub currency: f64,
}

/// Result of an upgrade request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpgradeOutcome {
    /// The module was not owned and is now at level 1, free of charge.
    Acquired,
    /// The module moved up one level.
    Upgraded {
        /// Currency spent.
        cost: f64,
        /// Level after the upgrade.
        level: u32,
    },
    /// Not enough currency; nothing changed.
    InsufficientFunds {
        /// Currency required.
        cost: f64,
    },
    /// No module with that id exists in the catalog.
    UnknownModule,
}

impl UpgradeOutcome {
    /// Whether the module level changed.
    pub const fn succeeded(&self) -> bool {
        matches!(self, Self::Acquired | Self::Upgraded { .. })
    }
}

/// Energy per second produced by `modules`.
///
/// Modules at level 0 and ids missing from the catalog contribute nothing.
pub fn instantaneous_production(modules: &BTreeMap<ModuleId, u32>) -> f64 {
    modules
        .iter()
        .filter_map(|(id, level)| {
            modules::find(id.as_str()).map(|entry| entry.base_production * f64::from(*level))
        })
        .sum()
}

/// In-memory state of the idle economy.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IdleEconomy {
    energy: f64,
    currency: f64,
    modules: BTreeMap<ModuleId, u32>,
}

impl IdleEconomy {
    /// Restore the economy from a persisted snapshot.
    pub fn from_snapshot(snapshot: &IdleSnapshot) -> Self {
        Self {
            energy: sanitize(snapshot.energy),
            currency: sanitize(snapshot.resource_currency),
            modules: snapshot
                .modules
                .iter()
                .filter(|(_, level)| **level > 0)
                .map(|(id, level)| (id.clone(), *level))
                .collect(),
        }
    }

    /// Capture the economy for persistence at `saved_at_epoch_ms`.
    pub fn to_snapshot(&self, saved_at_epoch_ms: i64) -> IdleSnapshot {
        IdleSnapshot {
            energy: self.energy(),
            resource_currency: self.currency(),
            modules: self.modules.clone(),
            saved_at_epoch_ms,
        }
    }

    /// Accumulated energy.
    pub fn energy(&self) -> f64 {
        sanitize(self.energy)
    }

    /// Spendable currency.
    pub fn currency(&self) -> f64 {
        sanitize(self.currency)
    }

    /// Owned module levels.
    pub const fn modules(&self) -> &BTreeMap<ModuleId, u32> {
        &self.modules
    }

    /// Level of one module, 0 when not owned.
    pub fn level(&self, id: &ModuleId) -> u32 {
        self.modules.get(id).copied().unwrap_or(0)
    }

    /// Number of distinct modules owned.
    pub fn owned_count(&self) -> u32 {
        let owned = self.modules.values().filter(|level| **level > 0).count();
        u32::try_from(owned).unwrap_or(u32::MAX)
    }

    /// Current energy production per second.
    pub fn production(&self) -> f64 {
        instantaneous_production(&self.modules)
    }

    /// Replace the currency balance.
    pub fn set_currency(&mut self, currency: f64) {
        self.currency = sanitize(currency);
    }

    /// Add currency. Negative and non-finite deltas are ignored.
    pub fn add_currency(&mut self, delta: f64) {
        self.currency = self.currency() + sanitize(delta);
    }

    /// Spend `amount` currency if the balance covers it.
    pub fn spend_currency(&mut self, amount: f64) -> bool {
        let amount = sanitize(amount);
        let balance = self.currency();
        if balance < amount {
            return false;
        }
        self.currency = balance - amount;
        true
    }

    /// Spend `amount` energy if the store covers it.
    ///
    /// A zero amount is rejected.
    pub fn spend_energy(&mut self, amount: f64) -> bool {
        let amount = sanitize(amount);
        let stored = self.energy();
        if amount <= 0.0 || stored < amount {
            return false;
        }
        self.energy = stored - amount;
        true
    }

    /// Credit one live production interval.
    ///
    /// Passive conversion adds `max(1, floor(production / divisor))`
    /// currency once production reaches the threshold.
    pub fn tick(&mut self, config: &EconomyConfig) -> TickYield {
        let production = self.production();
        if production <= 0.0 {
            return TickYield::default();
        }
        let currency = if production >= config.passive_threshold {
            (production / config.passive_divisor).floor().max(1.0)
        } else {
            0.0
        };
        self.energy = self.energy() + production;
        self.currency = self.currency() + currency;
        TickYield {
            energy: production,
            currency,
        }
    }

    /// Credit production for the time between `saved_at_epoch_ms` and
    /// `now_epoch_ms` in one lump.
    ///
    /// The credited span is capped at `u32::MAX` seconds; the reported
    /// `elapsed_seconds` is the credited span.
    ///
    /// Returns `None` when nothing accrued: no elapsed whole seconds, a clock
    /// that went backwards, or no production.
    pub fn catch_up(
        &mut self,
        saved_at_epoch_ms: i64,
        now_epoch_ms: i64,
        config: &EconomyConfig,
    ) -> Option<CatchUp> {
        let elapsed_ms = now_epoch_ms.checked_sub(saved_at_epoch_ms)?;
        let seconds = u32::try_from(elapsed_ms.checked_div(1000)?.max(0)).unwrap_or(u32::MAX);
        let production = self.production();
        if seconds == 0 || production <= 0.0 {
            return None;
        }
        let elapsed_seconds = u64::from(seconds);
        let energy = production * f64::from(seconds);
        let currency = (energy * config.offline_currency_rate).floor();
        self.energy = self.energy() + energy;
        self.currency = self.currency() + currency;
        debug!(elapsed_seconds, energy, currency, "offline production credited");
        Some(CatchUp {
            elapsed_seconds,
            energy,
            currency,
        })
    }

    /// Acquire or upgrade a module.
    ///
    /// The first level is free. Later levels cost
    /// `floor(base_cost * cost_growth_factor ^ level)` and are paid out of
    /// the currency read in this same call.
    pub fn upgrade(&mut self, id: &ModuleId) -> UpgradeOutcome {
        let Some(entry) = modules::find(id.as_str()) else {
            return UpgradeOutcome::UnknownModule;
        };
        let level = self.level(id);
        if level == 0 {
            self.modules.insert(id.clone(), 1);
            return UpgradeOutcome::Acquired;
        }
        let cost = entry.upgrade_cost(level);
        if !self.spend_currency(cost) {
            return UpgradeOutcome::InsufficientFunds { cost };
        }
        let next = level.saturating_add(1);
        self.modules.insert(id.clone(), next);
        UpgradeOutcome::Upgraded { cost, level: next }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn economy_with(modules: &[(&str, u32)], energy: f64, currency: f64) -> IdleEconomy {
        IdleEconomy::from_snapshot(&IdleSnapshot {
            energy,
            resource_currency: currency,
            modules: modules
                .iter()
                .map(|(id, level)| (ModuleId::from(*id), *level))
                .collect(),
            saved_at_epoch_ms: 0,
        })
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn production_sums_levels_times_base() {
        let economy = economy_with(&[("solar", 2), ("wind", 1), ("coal", 9)], 0.0, 0.0);
        assert!(close(economy.production(), 45.0));
    }

    #[test]
    fn solar_level_two_away_for_a_hundred_seconds() {
        let mut economy = economy_with(&[("solar", 2)], 0.0, 0.0);
        let summary = economy
            .catch_up(1_000_000, 1_100_000, &EconomyConfig::default())
            .unwrap();
        assert_eq!(summary.elapsed_seconds, 100);
        assert!(close(summary.energy, 2000.0));
        assert!(close(summary.currency, 200.0));
        assert!(close(economy.energy(), 2000.0));
        assert!(close(economy.currency(), 200.0));
    }

    #[test]
    fn decades_away_credits_the_capped_span_it_reports() {
        let mut economy = economy_with(&[("solar", 1)], 0.0, 0.0);
        let summary = economy
            .catch_up(0, i64::MAX, &EconomyConfig::default())
            .unwrap();
        assert_eq!(summary.elapsed_seconds, u64::from(u32::MAX));
        let credited = economy.production() * f64::from(u32::MAX);
        assert!(close(summary.energy, credited));
        assert!(close(economy.energy(), credited));
    }

    #[test]
    fn catch_up_ignores_sub_second_and_backwards_time() {
        let config = EconomyConfig::default();
        let mut economy = economy_with(&[("solar", 1)], 0.0, 0.0);
        assert!(economy.catch_up(1_000, 1_999, &config).is_none());
        assert!(economy.catch_up(5_000, 1_000, &config).is_none());
        assert!(close(economy.energy(), 0.0));
    }

    #[test]
    fn catch_up_without_modules_grants_nothing() {
        let mut economy = IdleEconomy::default();
        assert!(economy.catch_up(0, 60_000, &EconomyConfig::default()).is_none());
    }

    #[test]
    fn live_tick_below_threshold_makes_no_currency() {
        let config = EconomyConfig {
            passive_threshold: 20.0,
            ..EconomyConfig::default()
        };
        let mut economy = economy_with(&[("solar", 1)], 0.0, 0.0);
        let produced = economy.tick(&config);
        assert!(close(produced.energy, 10.0));
        assert!(close(produced.currency, 0.0));
    }

    #[test]
    fn live_tick_passive_conversion_has_floor_of_one() {
        let mut economy = economy_with(&[("solar", 1)], 0.0, 0.0);
        let produced = economy.tick(&EconomyConfig::default());
        assert!(close(produced.currency, 1.0));

        let mut bigger = economy_with(&[("hydro", 1)], 0.0, 0.0);
        let produced = bigger.tick(&EconomyConfig::default());
        assert!(close(produced.currency, 3.0));
    }

    #[test]
    fn first_acquisition_is_free() {
        let mut economy = IdleEconomy::default();
        let outcome = economy.upgrade(&ModuleId::from("solar"));
        assert_eq!(outcome, UpgradeOutcome::Acquired);
        assert_eq!(economy.level(&ModuleId::from("solar")), 1);
        assert!(close(economy.currency(), 0.0));
    }

    #[test]
    fn upgrade_charges_geometric_cost() {
        let mut economy = economy_with(&[("solar", 1)], 0.0, 100.0);
        let outcome = economy.upgrade(&ModuleId::from("solar"));
        assert_eq!(
            outcome,
            UpgradeOutcome::Upgraded {
                cost: 57.0,
                level: 2
            }
        );
        assert!(close(economy.currency(), 43.0));
    }

    #[test]
    fn upgrade_without_funds_changes_nothing() {
        let mut economy = economy_with(&[("solar", 1)], 0.0, 10.0);
        let outcome = economy.upgrade(&ModuleId::from("solar"));
        assert!(!outcome.succeeded());
        assert_eq!(economy.level(&ModuleId::from("solar")), 1);
        assert!(close(economy.currency(), 10.0));
    }

    #[test]
    fn unknown_module_is_rejected() {
        let mut economy = IdleEconomy::default();
        assert_eq!(
            economy.upgrade(&ModuleId::from("coal")),
            UpgradeOutcome::UnknownModule
        );
        assert_eq!(economy.owned_count(), 0);
    }

    #[test]
    fn corrupt_snapshot_values_read_as_zero() {
        let economy = economy_with(&[], f64::NAN, f64::NEG_INFINITY);
        assert!(close(economy.energy(), 0.0));
        assert!(close(economy.currency(), 0.0));
    }

    #[test]
    fn spending_more_than_balance_fails() {
        let mut economy = economy_with(&[], 0.0, 50.0);
        assert!(!economy.spend_currency(60.0));
        assert!(close(economy.currency(), 50.0));
        assert!(economy.spend_currency(50.0));
        assert!(close(economy.currency(), 0.0));
    }

    #[test]
    fn spending_zero_energy_is_rejected() {
        let mut economy = economy_with(&[], 30.0, 0.0);
        assert!(!economy.spend_energy(0.0));
        assert!(economy.spend_energy(30.0));
        assert!(!economy.spend_energy(1.0));
    }
}
