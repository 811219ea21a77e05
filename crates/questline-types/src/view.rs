//! Read-only projections handed to consumers.
//!
//! Nothing outside the engine may depend on the internals of a
//! [`ProgressDocument`](crate::ProgressDocument); the web client and the HTTP
//! surface consume these views instead.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::{BadgeId, ModuleId, UserId};
use crate::progress::DailyBonus;

/// The badge currently presented for claiming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct RewardNotice {
    /// Badge whose reward is waiting.
    pub badge_id: BadgeId,

    /// XP granted on claim.
    pub reward_xp: u32,
}

/// Consistent snapshot of one learner's progress and idle economy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct ProgressView {
    /// Owner of the progress.
    pub user_id: UserId,

    /// Cumulative XP.
    #[ts(type = "number")]
    pub score: u64,

    /// Level derived from score.
    pub level: u32,

    /// Spendable currency.
    pub currency: f64,

    /// Accumulated energy.
    pub energy: f64,

    /// Current energy production per second.
    pub production_per_second: f64,

    /// Unlocked badges.
    pub badges: BTreeSet<BadgeId>,

    /// Named counters.
    pub stats: BTreeMap<String, f64>,

    /// Best level per minigame.
    pub completed_levels: BTreeMap<String, u32>,

    /// Owned module levels.
    pub modules: BTreeMap<ModuleId, u32>,

    /// Head of the reward queue, if any.
    pub current_reward: Option<RewardNotice>,

    /// Number of rewards waiting, including the presented one.
    pub pending_rewards: u32,
}

/// Catalog badge with the learner's progress towards it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct BadgeStatus {
    /// Catalog key.
    pub id: BadgeId,

    /// XP granted on claim.
    pub reward_xp: u32,

    /// Whether the badge is unlocked.
    pub unlocked: bool,

    /// Progress towards unlocking, 0 to 100.
    pub progress: f64,
}

/// Notifications emitted by a running session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ProgressEvent {
    /// A daily login bonus was granted.
    DailyBonus {
        /// The bonus granted.
        bonus: DailyBonus,
    },
    /// Production accrued while the engine was not running.
    OfflineProduction {
        /// Seconds credited.
        #[ts(type = "number")]
        elapsed_seconds: u64,
        /// Energy granted.
        energy: f64,
        /// Currency granted.
        currency: f64,
    },
    /// A badge was unlocked and queued for claiming.
    BadgeUnlocked {
        /// The new badge.
        badge_id: BadgeId,
    },
    /// A reward was claimed.
    RewardClaimed {
        /// The claimed badge.
        badge_id: BadgeId,
        /// XP granted.
        reward_xp: u32,
    },
    /// The remote document replaced the local one.
    RemoteApplied,
}
