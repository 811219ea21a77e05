//! The persisted progress document and its idle-economy sub-entity.
//!
//! A [`ProgressDocument`] is the single record of one learner's score,
//! badges, stats, and reward backlog. The engine owns it exclusively while
//! a session is active; every persisted copy (local or remote) is a
//! snapshot.
//!
//! The idle economy's [`IdleSnapshot`] is logically part of the document but
//! travels inside `stats` under `saved_*` keys so that remote stores only
//! ever see one JSON object per user.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::{BadgeId, ModuleId, UserId};

/// One learner's complete progress record.
///
/// Field names serialize in `camelCase` to stay compatible with documents
/// written by the web client.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct ProgressDocument {
    /// Cumulative XP. Never decreases outside of a reset.
    pub score: u64,

    /// Spendable idle-economy currency.
    pub currency: f64,

    /// Unlocked badges. Append-only; merged by union.
    pub badges: BTreeSet<BadgeId>,

    /// First-unlock time per badge (ISO-8601 with fixed offset).
    pub badge_unlock_timestamps: BTreeMap<BadgeId, String>,

    /// Named counters (wins per game, logins, time spent, streak, xp mirror).
    pub stats: BTreeMap<String, f64>,

    /// Best level reached per minigame.
    pub completed_levels: BTreeMap<String, u32>,

    /// Last calendar day (`YYYY-MM-DD`, fixed zone) a daily bonus was granted.
    pub last_daily_bonus_date: Option<String>,

    /// FIFO backlog of badges whose reward has not been collected.
    pub unclaimed_rewards: Vec<BadgeId>,
}

impl ProgressDocument {
    /// Read a stat, treating missing and non-finite values as zero.
    pub fn stat(&self, key: &str) -> f64 {
        self.stats
            .get(key)
            .copied()
            .filter(|v| v.is_finite())
            .unwrap_or(0.0)
    }

    /// Whether the badge has been unlocked.
    pub fn has_badge(&self, id: &BadgeId) -> bool {
        self.badges.contains(id)
    }
}

/// Persisted state of the idle economy.
///
/// Mirrored in two places: standalone local keys (fast path) and the
/// `saved_*` stats of the progress document (remote transport).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct IdleSnapshot {
    /// Accumulated energy.
    pub energy: f64,

    /// Spendable currency at save time.
    pub resource_currency: f64,

    /// Owned module levels (0 or absent = not owned).
    pub modules: BTreeMap<ModuleId, u32>,

    /// Wall-clock time of the save in Unix milliseconds.
    #[ts(type = "number")]
    pub saved_at_epoch_ms: i64,
}

/// The account record supplied by the account service.
///
/// Read-only to the engine: the streak here is the source of truth for
/// `stats.streak` and for the daily bonus amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Account {
    /// The learner's id.
    pub id: UserId,

    /// Current consecutive-day login streak.
    pub streak: u32,
}

/// A daily bonus granted during normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct DailyBonus {
    /// XP granted.
    pub amount: u32,

    /// Streak the amount was computed from.
    pub streak: u32,
}
