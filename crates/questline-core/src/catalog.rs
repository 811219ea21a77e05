//! The static achievement catalog.
//!
//! Each [`BadgeDefinition`] pairs an opaque id and an XP reward with a
//! [`Criterion`] evaluated over the stats map. Catalog order is the order in
//! which simultaneous unlocks are queued. Adding a badge means adding an
//! entry here; the engine needs no other change.
//!
//! Presentation data (icons, colours) is not part of the catalog: nothing
//! in the unlock rules depends on it.

use std::collections::BTreeMap;

use questline_types::BadgeId;

use crate::stats::{self, sanitize};

/// What a learner must achieve to unlock a badge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Criterion {
    /// A single stat reaches a target value.
    StatAtLeast {
        /// Stat key.
        key: &'static str,
        /// Value required.
        target: f64,
    },
    /// Wins recorded in at least `target` distinct minigames.
    DistinctGamesWon {
        /// Number of distinct games required.
        target: u32,
    },
}

impl Criterion {
    /// Whether the criterion holds for `stats`.
    pub fn is_met(&self, stats: &BTreeMap<String, f64>) -> bool {
        match *self {
            Self::StatAtLeast { key, target } => stat(stats, key) >= target,
            Self::DistinctGamesWon { target } => distinct_games_won(stats) >= target,
        }
    }

    /// Progress towards the criterion, clamped to `0..=100`.
    pub fn progress(&self, stats: &BTreeMap<String, f64>) -> f64 {
        let (current, target) = match *self {
            Self::StatAtLeast { key, target } => (stat(stats, key), target),
            Self::DistinctGamesWon { target } => {
                (f64::from(distinct_games_won(stats)), f64::from(target))
            }
        };
        if target <= 0.0 {
            return 100.0;
        }
        (current / target * 100.0).clamp(0.0, 100.0)
    }
}

/// A badge in the catalog.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BadgeDefinition {
    /// Catalog key, stored in progress documents.
    pub id: &'static str,
    /// XP granted when the reward is claimed.
    pub reward_xp: u32,
    /// Unlock rule.
    pub criterion: Criterion,
}

impl BadgeDefinition {
    /// The badge id as a typed key.
    pub fn badge_id(&self) -> BadgeId {
        BadgeId::from(self.id)
    }

    /// Whether the badge unlocks for `stats`.
    pub fn is_unlocked_by(&self, stats: &BTreeMap<String, f64>) -> bool {
        self.criterion.is_met(stats)
    }

    /// Progress towards the badge, 0 to 100.
    pub fn progress(&self, stats: &BTreeMap<String, f64>) -> f64 {
        self.criterion.progress(stats)
    }
}

/// Every badge, in unlock-queue order.
pub const BADGES: &[BadgeDefinition] = &[
    BadgeDefinition {
        id: "first_login",
        reward_xp: 10,
        criterion: Criterion::StatAtLeast {
            key: stats::LOGINS,
            target: 1.0,
        },
    },
    BadgeDefinition {
        id: "regular",
        reward_xp: 50,
        criterion: Criterion::StatAtLeast {
            key: stats::LOGINS,
            target: 7.0,
        },
    },
    BadgeDefinition {
        id: "streak_3",
        reward_xp: 30,
        criterion: Criterion::StatAtLeast {
            key: stats::STREAK,
            target: 3.0,
        },
    },
    BadgeDefinition {
        id: "streak_7",
        reward_xp: 100,
        criterion: Criterion::StatAtLeast {
            key: stats::STREAK,
            target: 7.0,
        },
    },
    BadgeDefinition {
        id: "xp_100",
        reward_xp: 20,
        criterion: Criterion::StatAtLeast {
            key: stats::XP,
            target: 100.0,
        },
    },
    BadgeDefinition {
        id: "xp_1000",
        reward_xp: 100,
        criterion: Criterion::StatAtLeast {
            key: stats::XP,
            target: 1_000.0,
        },
    },
    BadgeDefinition {
        id: "sudoku_first_win",
        reward_xp: 25,
        criterion: Criterion::StatAtLeast {
            key: "wins_sudoku",
            target: 1.0,
        },
    },
    BadgeDefinition {
        id: "quiz_master",
        reward_xp: 75,
        criterion: Criterion::StatAtLeast {
            key: "wins_quiz",
            target: 10.0,
        },
    },
    BadgeDefinition {
        id: "memory_ace",
        reward_xp: 50,
        criterion: Criterion::StatAtLeast {
            key: "wins_memory",
            target: 5.0,
        },
    },
    BadgeDefinition {
        id: "all_rounder",
        reward_xp: 100,
        criterion: Criterion::DistinctGamesWon { target: 3 },
    },
    BadgeDefinition {
        id: "power_plant",
        reward_xp: 60,
        criterion: Criterion::StatAtLeast {
            key: stats::MODULES_OWNED,
            target: 3.0,
        },
    },
    BadgeDefinition {
        id: "time_well_spent",
        reward_xp: 50,
        criterion: Criterion::StatAtLeast {
            key: stats::TIME_SPENT,
            target: 60.0,
        },
    },
];

/// Look up a badge by id.
pub fn find(id: &str) -> Option<&'static BadgeDefinition> {
    BADGES.iter().find(|badge| badge.id == id)
}

fn stat(stats: &BTreeMap<String, f64>, key: &str) -> f64 {
    sanitize(stats.get(key).copied().unwrap_or(0.0))
}

fn distinct_games_won(stats: &BTreeMap<String, f64>) -> u32 {
    let count = stats
        .iter()
        .filter(|(key, value)| key.starts_with(stats::WINS_PREFIX) && sanitize(**value) >= 1.0)
        .count();
    u32::try_from(count).unwrap_or(u32::MAX)
}
