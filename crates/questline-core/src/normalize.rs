//! Progress normalizer.
//!
//! Turns a stored progress document of unknown shape into a complete
//! [`ProgressDocument`]. Input may be missing, partial, written by an older
//! client under legacy field names, or corrupt in individual fields. Each
//! field is read on its own; a bad field falls back to its default without
//! affecting the rest of the document.
//!
//! Normalization also decides the daily login bonus and lifts the idle
//! snapshot out of the `saved_*` stats it travels in.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use questline_types::{Account, BadgeId, DailyBonus, IdleSnapshot, ModuleId, ProgressDocument};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::catalog;
use crate::clock::DayClock;
use crate::config::RewardsConfig;
use crate::stats::{self, count_to_f64, f64_to_count, f64_to_level, sanitize};

/// Stat key holding the embedded idle energy.
pub const SAVED_ENERGY: &str = "saved_energy";
/// Stat key holding the embedded idle currency.
pub const SAVED_CURRENCY: &str = "saved_currency";
/// Stat key holding the embedded save time in Unix milliseconds.
pub const SAVED_AT: &str = "saved_at";
/// Prefix of the embedded per-module levels (`saved_module_solar`).
pub const SAVED_MODULE_PREFIX: &str = "saved_module_";

/// Everything the normalizer needs besides the document itself.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeContext<'a> {
    /// The authoritative account record.
    pub account: Account,
    /// The instant normalization happens at.
    pub now: DateTime<Utc>,
    /// Fixed zone for "today".
    pub day_clock: &'a DayClock,
    /// Daily bonus amounts.
    pub rewards: &'a RewardsConfig,
    /// Whether this load may grant today's bonus. A document read only to
    /// merge into the live one is repaired but never credited.
    pub grant_bonus: bool,
}

/// Output of [`normalize`].
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    /// The complete document, with `saved_*` stats removed.
    pub document: ProgressDocument,
    /// The bonus granted by this call, if any.
    pub daily_bonus: Option<DailyBonus>,
    /// The idle snapshot that was embedded in `stats`, if any.
    pub idle: Option<IdleSnapshot>,
}

/// Normalize a raw stored document.
///
/// Never fails: `None`, non-objects, and malformed fields all degrade to
/// defaults. Calling it again on its own output within the same day grants
/// no second bonus.
pub fn normalize(raw: Option<&Value>, ctx: &NormalizeContext<'_>) -> Normalized {
    let empty = Map::new();
    let obj = match raw {
        Some(Value::Object(obj)) => obj,
        Some(Value::Null) | None => &empty,
        Some(other) => {
            warn!(kind = json_kind(other), "progress document is not an object, starting fresh");
            &empty
        }
    };

    let mut document = ProgressDocument {
        score: field(obj, &["score", "xp"])
            .and_then(|v| read_or_warn("score", as_count(v)))
            .unwrap_or(0),
        currency: field(obj, &["currency"])
            .and_then(|v| read_or_warn("currency", as_amount(v)))
            .unwrap_or(0.0),
        completed_levels: field(obj, &["completedLevels", "completed_levels"])
            .and_then(|v| read_or_warn("completedLevels", as_levels(v)))
            .unwrap_or_default(),
        last_daily_bonus_date: field(obj, &["lastDailyBonusDate", "last_daily_bonus_date"])
            .and_then(|v| read_or_warn("lastDailyBonusDate", v.as_str().map(str::to_owned))),
        ..ProgressDocument::default()
    };

    let badge_order = field(obj, &["badges", "achievements"])
        .and_then(|v| read_or_warn("badges", as_ids(v)))
        .unwrap_or_default();
    document.badges = badge_order.into_iter().collect();

    let now_iso = ctx.day_clock.timestamp_iso(ctx.now);
    let mut timestamps = field(obj, &["badgeUnlockTimestamps", "badge_unlock_timestamps"])
        .and_then(|v| read_or_warn("badgeUnlockTimestamps", as_timestamps(v)))
        .unwrap_or_default();
    timestamps.retain(|id, _| document.badges.contains(id));
    for badge in &document.badges {
        timestamps
            .entry(badge.clone())
            .or_insert_with(|| now_iso.clone());
    }
    document.badge_unlock_timestamps = timestamps;

    let mut stats_map = match field(obj, &["stats"])
        .and_then(|v| read_or_warn("stats", as_stats(v)))
    {
        Some(stats_map) => stats_map,
        None => synthesize_stats(&document),
    };
    let idle = extract_idle(&mut stats_map);
    document.stats = stats_map;
    document
        .stats
        .insert(stats::STREAK.to_owned(), f64::from(ctx.account.streak));

    let daily_bonus = if ctx.grant_bonus {
        grant_daily_bonus(&mut document, ctx)
    } else {
        None
    };
    mirror_score(&mut document);

    let queued = field(obj, &["unclaimedRewards", "unclaimed_rewards"])
        .and_then(|v| read_or_warn("unclaimedRewards", as_ids(v)))
        .unwrap_or_default();
    document.unclaimed_rewards = queued
        .into_iter()
        .filter(|id| {
            let known = catalog::find(id.as_str()).is_some() && document.badges.contains(id);
            if !known {
                warn!(badge_id = %id, "dropping unknown badge from reward queue");
            }
            known
        })
        .collect();

    Normalized {
        document,
        daily_bonus,
        idle,
    }
}

/// Write the `xp` and `level` mirrors of `score` into `stats`.
pub fn mirror_score(document: &mut ProgressDocument) {
    document
        .stats
        .insert(stats::XP.to_owned(), count_to_f64(document.score));
    document.stats.insert(
        stats::LEVEL.to_owned(),
        f64::from(stats::level_for_score(document.score)),
    );
}

/// Embed an idle snapshot into `stats` under `saved_*` keys.
///
/// Any previously embedded snapshot is replaced.
pub fn embed_idle(stats_map: &mut BTreeMap<String, f64>, snapshot: &IdleSnapshot) {
    stats_map.retain(|key, _| !key.starts_with(stats::SAVED_PREFIX));
    stats_map.insert(SAVED_ENERGY.to_owned(), sanitize(snapshot.energy));
    stats_map.insert(
        SAVED_CURRENCY.to_owned(),
        sanitize(snapshot.resource_currency),
    );
    let saved_at = u64::try_from(snapshot.saved_at_epoch_ms).unwrap_or(0);
    stats_map.insert(SAVED_AT.to_owned(), count_to_f64(saved_at));
    for (id, level) in &snapshot.modules {
        stats_map.insert(format!("{SAVED_MODULE_PREFIX}{id}"), f64::from(*level));
    }
}

/// Remove the `saved_*` keys from `stats`, returning the snapshot they
/// encode.
///
/// Returns `None` when no save time was embedded.
pub fn extract_idle(stats_map: &mut BTreeMap<String, f64>) -> Option<IdleSnapshot> {
    let saved: Vec<(String, f64)> = stats_map
        .iter()
        .filter(|(key, _)| key.starts_with(stats::SAVED_PREFIX))
        .map(|(key, value)| (key.clone(), *value))
        .collect();
    stats_map.retain(|key, _| !key.starts_with(stats::SAVED_PREFIX));

    let mut snapshot = IdleSnapshot::default();
    let mut saved_at = None;
    for (key, value) in saved {
        match key.as_str() {
            SAVED_ENERGY => snapshot.energy = sanitize(value),
            SAVED_CURRENCY => snapshot.resource_currency = sanitize(value),
            SAVED_AT => saved_at = Some(f64_to_count(value)),
            other => {
                if let Some(id) = other.strip_prefix(SAVED_MODULE_PREFIX) {
                    let level = f64_to_level(value);
                    if level > 0 {
                        snapshot.modules.insert(ModuleId::from(id), level);
                    }
                }
            }
        }
    }
    snapshot.saved_at_epoch_ms = i64::try_from(saved_at?).unwrap_or(i64::MAX);
    Some(snapshot)
}

fn grant_daily_bonus(document: &mut ProgressDocument, ctx: &NormalizeContext<'_>) -> Option<DailyBonus> {
    let today = ctx.day_clock.date_only(ctx.now);
    if document.last_daily_bonus_date.as_deref() == Some(today.as_str()) {
        return None;
    }
    let streak = ctx.account.streak;
    let amount = ctx
        .rewards
        .daily_per_streak
        .saturating_mul(streak)
        .saturating_add(ctx.rewards.daily_base);
    document.score = document.score.saturating_add(u64::from(amount));
    stats::apply_delta(&mut document.stats, stats::LOGINS, 1.0);
    debug!(%today, amount, streak, "daily bonus granted");
    document.last_daily_bonus_date = Some(today);
    Some(DailyBonus { amount, streak })
}

/// Stats for a document stored before stats were tracked.
fn synthesize_stats(document: &ProgressDocument) -> BTreeMap<String, f64> {
    let mut synthesized = BTreeMap::new();
    synthesized.insert(stats::XP.to_owned(), count_to_f64(document.score));
    for (game, level) in &document.completed_levels {
        if *level > 0 {
            synthesized.insert(stats::wins_key(game), 1.0);
        }
    }
    synthesized
}

fn field<'a>(obj: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .find_map(|name| obj.get(*name))
        .filter(|value| !value.is_null())
}

fn read_or_warn<T>(name: &'static str, value: Option<T>) -> Option<T> {
    if value.is_none() {
        warn!(field = name, "discarding malformed progress field");
    }
    value
}

fn as_amount(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().map(sanitize),
        Value::String(s) => s.trim().parse::<f64>().ok().map(sanitize),
        _ => None,
    }
}

fn as_count(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| as_amount(value).map(f64_to_count))
}

fn as_ids(value: &Value) -> Option<Vec<BadgeId>> {
    let items = value.as_array()?;
    let mut seen = BTreeSet::new();
    Some(
        items
            .iter()
            .filter_map(Value::as_str)
            .filter(|id| !id.is_empty() && seen.insert(*id))
            .map(BadgeId::from)
            .collect(),
    )
}

fn as_timestamps(value: &Value) -> Option<BTreeMap<BadgeId, String>> {
    Some(
        value
            .as_object()?
            .iter()
            .filter_map(|(id, ts)| ts.as_str().map(|ts| (BadgeId::from(id.as_str()), ts.to_owned())))
            .collect(),
    )
}

fn as_stats(value: &Value) -> Option<BTreeMap<String, f64>> {
    Some(
        value
            .as_object()?
            .iter()
            .filter_map(|(key, v)| as_amount(v).map(|amount| (key.clone(), amount)))
            .collect(),
    )
}

fn as_levels(value: &Value) -> Option<BTreeMap<String, u32>> {
    Some(
        value
            .as_object()?
            .iter()
            .filter_map(|(game, v)| as_amount(v).map(|level| (game.clone(), f64_to_level(level))))
            .collect(),
    )
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use questline_types::UserId;
    use serde_json::json;

    use super::*;

    fn day(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).single().unwrap()
    }

    fn run(raw: Option<&Value>, streak: u32, now: DateTime<Utc>) -> Normalized {
        let day_clock = DayClock::utc();
        let rewards = RewardsConfig::default();
        let ctx = NormalizeContext {
            account: Account {
                id: UserId::new(),
                streak,
            },
            now,
            day_clock: &day_clock,
            rewards: &rewards,
            grant_bonus: true,
        };
        normalize(raw, &ctx)
    }

    #[test]
    fn repair_only_load_grants_no_bonus() {
        let day_clock = DayClock::utc();
        let rewards = RewardsConfig::default();
        let ctx = NormalizeContext {
            account: Account {
                id: UserId::new(),
                streak: 2,
            },
            now: day(2024, 1, 10, 12),
            day_clock: &day_clock,
            rewards: &rewards,
            grant_bonus: false,
        };
        let raw = json!({ "score": 60, "lastDailyBonusDate": "2024-01-09" });
        let out = normalize(Some(&raw), &ctx);
        assert!(out.daily_bonus.is_none());
        assert_eq!(out.document.score, 60);
        assert_eq!(out.document.last_daily_bonus_date.as_deref(), Some("2024-01-09"));
    }

    fn doc_json(doc: &ProgressDocument) -> Value {
        serde_json::to_value(doc).unwrap()
    }

    #[test]
    fn new_user_gets_streak_bonus_once_per_day() {
        let first = run(None, 3, day(2024, 1, 10, 12));
        let bonus = first.daily_bonus.unwrap();
        assert_eq!(bonus.amount, 80);
        assert_eq!(first.document.score, 80);
        assert_eq!(first.document.last_daily_bonus_date.as_deref(), Some("2024-01-10"));
        assert!((first.document.stat(stats::LOGINS) - 1.0).abs() < f64::EPSILON);
        assert!((first.document.stat(stats::XP) - 80.0).abs() < f64::EPSILON);

        let stored = doc_json(&first.document);
        let second = run(Some(&stored), 3, day(2024, 1, 10, 20));
        assert!(second.daily_bonus.is_none());
        assert_eq!(second.document.score, 80);
        assert!((second.document.stat(stats::LOGINS) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn next_day_grants_again() {
        let first = run(None, 0, day(2024, 1, 10, 12));
        let stored = doc_json(&first.document);
        let second = run(Some(&stored), 1, day(2024, 1, 11, 12));
        assert_eq!(second.daily_bonus.map(|b| b.amount), Some(60));
        assert_eq!(second.document.score, 110);
    }

    #[test]
    fn legacy_field_names_are_read() {
        let raw = json!({
            "xp": 250,
            "achievements": ["first_login", "first_login", "xp_100"],
            "completed_levels": { "sudoku": 3 },
            "lastDailyBonusDate": "2024-01-10",
        });
        let out = run(Some(&raw), 0, day(2024, 1, 10, 12));
        assert_eq!(out.document.score, 250);
        assert_eq!(out.document.badges.len(), 2);
        assert_eq!(out.document.completed_levels.get("sudoku"), Some(&3));
        assert!(out.daily_bonus.is_none());
    }

    #[test]
    fn corrupt_field_does_not_spoil_the_rest() {
        let raw = json!({
            "score": "lots",
            "currency": 42.5,
            "badges": "first_login",
            "stats": { "wins_quiz": 2, "logins": "oops" },
            "lastDailyBonusDate": "2024-01-10",
        });
        let out = run(Some(&raw), 0, day(2024, 1, 10, 12));
        assert_eq!(out.document.score, 0);
        assert!((out.document.currency - 42.5).abs() < f64::EPSILON);
        assert!(out.document.badges.is_empty());
        assert!((out.document.stat("wins_quiz") - 2.0).abs() < f64::EPSILON);
        assert!(!out.document.stats.contains_key(stats::LOGINS));
    }

    #[test]
    fn non_object_input_starts_fresh() {
        let out = run(Some(&json!([1, 2, 3])), 0, day(2024, 1, 10, 12));
        assert_eq!(out.document.score, 50);
        assert!(out.document.badges.is_empty());
    }

    #[test]
    fn missing_timestamps_are_backfilled_with_now() {
        let raw = json!({ "badges": ["first_login"], "lastDailyBonusDate": "2024-01-10" });
        let out = run(Some(&raw), 0, day(2024, 1, 10, 12));
        let ts = out.document.badge_unlock_timestamps.get("first_login").unwrap();
        assert_eq!(ts, "2024-01-10T12:00:00.000+00:00");
    }

    #[test]
    fn existing_timestamps_are_kept() {
        let raw = json!({
            "badges": ["first_login"],
            "badgeUnlockTimestamps": { "first_login": "2023-05-01T00:00:00.000+00:00" },
            "lastDailyBonusDate": "2024-01-10",
        });
        let out = run(Some(&raw), 0, day(2024, 1, 10, 12));
        let ts = out.document.badge_unlock_timestamps.get("first_login").unwrap();
        assert_eq!(ts, "2023-05-01T00:00:00.000+00:00");
    }

    #[test]
    fn stats_are_synthesized_when_absent() {
        let raw = json!({
            "score": 120,
            "completedLevels": { "quiz": 2, "memory": 1 },
            "lastDailyBonusDate": "2024-01-10",
        });
        let out = run(Some(&raw), 4, day(2024, 1, 10, 12));
        assert!((out.document.stat("wins_quiz") - 1.0).abs() < f64::EPSILON);
        assert!((out.document.stat("wins_memory") - 1.0).abs() < f64::EPSILON);
        assert!((out.document.stat(stats::XP) - 120.0).abs() < f64::EPSILON);
        assert!((out.document.stat(stats::STREAK) - 4.0).abs() < f64::EPSILON);
        assert!((out.document.stat(stats::LEVEL) - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn streak_comes_from_account_not_document() {
        let raw = json!({ "stats": { "streak": 40 }, "lastDailyBonusDate": "2024-01-10" });
        let out = run(Some(&raw), 2, day(2024, 1, 10, 12));
        assert!((out.document.stat(stats::STREAK) - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn reward_queue_keeps_order_and_drops_strays() {
        let raw = json!({
            "badges": ["xp_100", "first_login", "mystery"],
            "unclaimedRewards": ["xp_100", "mystery", "first_login", "xp_100", "regular"],
            "lastDailyBonusDate": "2024-01-10",
        });
        let out = run(Some(&raw), 0, day(2024, 1, 10, 12));
        let queue: Vec<&str> = out
            .document
            .unclaimed_rewards
            .iter()
            .map(BadgeId::as_str)
            .collect();
        assert_eq!(queue, ["xp_100", "first_login"]);
        assert!(out.document.badges.contains("mystery"));
    }

    #[test]
    fn idle_snapshot_is_lifted_out_of_stats() {
        let raw = json!({
            "stats": {
                "logins": 3,
                "saved_energy": 120.5,
                "saved_currency": 30,
                "saved_at": 1_700_000_000_000_i64,
                "saved_module_solar": 2,
                "saved_module_wind": 0,
            },
            "lastDailyBonusDate": "2024-01-10",
        });
        let out = run(Some(&raw), 0, day(2024, 1, 10, 12));
        let idle = out.idle.unwrap();
        assert!((idle.energy - 120.5).abs() < f64::EPSILON);
        assert!((idle.resource_currency - 30.0).abs() < f64::EPSILON);
        assert_eq!(idle.saved_at_epoch_ms, 1_700_000_000_000);
        assert_eq!(idle.modules.get("solar"), Some(&2));
        assert!(!idle.modules.contains_key("wind"));
        assert!(out.document.stats.keys().all(|k| !k.starts_with("saved_")));
    }

    #[test]
    fn embedded_snapshot_survives_extraction() {
        let mut stats_map = BTreeMap::new();
        let snapshot = IdleSnapshot {
            energy: 5.0,
            resource_currency: 7.0,
            modules: [(ModuleId::from("hydro"), 3)].into_iter().collect(),
            saved_at_epoch_ms: 1_000,
        };
        embed_idle(&mut stats_map, &snapshot);
        assert_eq!(extract_idle(&mut stats_map), Some(snapshot));
        assert!(stats_map.is_empty());
    }

    #[test]
    fn no_saved_at_means_no_snapshot() {
        let mut stats_map: BTreeMap<String, f64> =
            [("saved_energy".to_owned(), 9.0)].into_iter().collect();
        assert!(extract_idle(&mut stats_map).is_none());
        assert!(stats_map.is_empty());
    }
}
