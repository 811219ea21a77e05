//! Stat keys and their update semantics.
//!
//! Most stats are counters that only move up; a few are gauges that are
//! replaced wholesale from an authoritative source. The distinction decides
//! how [`apply_delta`] treats negative deltas and how the merge rule treats
//! conflicting values.

use std::collections::BTreeMap;

/// XP mirror of `score`.
pub const XP: &str = "xp";
/// Number of days a daily bonus was collected.
pub const LOGINS: &str = "logins";
/// Minutes spent with an active session.
pub const TIME_SPENT: &str = "time_spent";
/// Login streak copied from the account record.
pub const STREAK: &str = "streak";
/// Level derived from score.
pub const LEVEL: &str = "level";
/// Number of distinct production modules owned.
pub const MODULES_OWNED: &str = "modules_owned";
/// Total energy exchanged for score.
pub const ENERGY_CONVERTED: &str = "energy_converted";
/// Prefix of per-minigame win counters (`wins_sudoku`, `wins_quiz`, ...).
pub const WINS_PREFIX: &str = "wins_";
/// Prefix of the idle snapshot embedded for remote transport.
pub const SAVED_PREFIX: &str = "saved_";

/// How a stat reacts to updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatKind {
    /// Only increases; negative deltas are ignored.
    Counter,
    /// Replaced from an authoritative source; deltas may be negative.
    Gauge,
}

/// Classify a stat key.
pub fn stat_kind(key: &str) -> StatKind {
    match key {
        STREAK | LEVEL | MODULES_OWNED => StatKind::Gauge,
        k if k.starts_with(SAVED_PREFIX) => StatKind::Gauge,
        _ => StatKind::Counter,
    }
}

/// The win-counter key for a minigame.
pub fn wins_key(game_id: &str) -> String {
    format!("{WINS_PREFIX}{game_id}")
}

/// Coerce a stored number to a finite, non-negative value.
pub fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Apply `delta` to `key` with the key's semantics.
///
/// Returns the stored value after the update.
pub fn apply_delta(stats: &mut BTreeMap<String, f64>, key: &str, delta: f64) -> f64 {
    let current = sanitize(stats.get(key).copied().unwrap_or(0.0));
    let delta = if delta.is_finite() { delta } else { 0.0 };
    let next = match stat_kind(key) {
        StatKind::Counter => current + delta.max(0.0),
        StatKind::Gauge => sanitize(current + delta),
    };
    stats.insert(key.to_owned(), next);
    next
}

/// Level reached at a given score: `floor(sqrt(score / 100)) + 1`.
pub fn level_for_score(score: u64) -> u32 {
    let root = score.checked_div(100).unwrap_or(0).isqrt();
    u32::try_from(root.saturating_add(1)).unwrap_or(u32::MAX)
}

/// Widen a counter for storage in the stats map.
#[allow(clippy::cast_precision_loss)]
pub const fn count_to_f64(count: u64) -> f64 {
    count as f64
}

/// Narrow a stored number to a whole, non-negative counter.
///
/// Fractions are floored; non-finite and negative values become 0 and
/// values past `u64::MAX` saturate.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn f64_to_count(value: f64) -> u64 {
    sanitize(value).floor() as u64
}

/// Like [`f64_to_count`], saturating at `u32::MAX`.
pub fn f64_to_level(value: f64) -> u32 {
    u32::try_from(f64_to_count(value)).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_ignore_negative_deltas() {
        let mut stats = BTreeMap::new();
        apply_delta(&mut stats, "wins_quiz", 3.0);
        let after = apply_delta(&mut stats, "wins_quiz", -2.0);
        assert!((after - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn gauges_accept_negative_deltas_but_stay_non_negative() {
        let mut stats = BTreeMap::new();
        apply_delta(&mut stats, STREAK, 2.0);
        let after = apply_delta(&mut stats, STREAK, -5.0);
        assert!(after.abs() < f64::EPSILON);
    }

    #[test]
    fn corrupt_values_restart_from_zero() {
        let mut stats = BTreeMap::new();
        stats.insert(XP.to_owned(), f64::INFINITY);
        let after = apply_delta(&mut stats, XP, 5.0);
        assert!((after - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn level_thresholds() {
        assert_eq!(level_for_score(0), 1);
        assert_eq!(level_for_score(99), 1);
        assert_eq!(level_for_score(100), 2);
        assert_eq!(level_for_score(399), 2);
        assert_eq!(level_for_score(400), 3);
        assert_eq!(level_for_score(10_000), 11);
    }

    #[test]
    fn narrowing_floors_and_clamps() {
        assert_eq!(f64_to_count(12.9), 12);
        assert_eq!(f64_to_count(-4.0), 0);
        assert_eq!(f64_to_count(f64::NAN), 0);
        assert_eq!(f64_to_level(1e12), u32::MAX);
    }

    #[test]
    fn saved_keys_are_gauges() {
        assert_eq!(stat_kind("saved_energy"), StatKind::Gauge);
        assert_eq!(stat_kind(LOGINS), StatKind::Counter);
        assert_eq!(wins_key("memory"), "wins_memory");
    }
}
