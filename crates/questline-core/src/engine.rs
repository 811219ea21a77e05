//! The engine facade.
//!
//! [`ProgressEngine`] owns one learner's in-memory progress document and idle
//! economy and is the only thing allowed to mutate them. Every command is
//! synchronous and runs to completion; after each one the engine re-syncs
//! derived fields (currency mirror, `xp`, `level`, `modules_owned`) and
//! re-runs achievement detection.
//!
//! Persistence is the caller's job. The engine hands out
//! [`persisted_document`](ProgressEngine::persisted_document) and
//! [`idle_snapshot`](ProgressEngine::idle_snapshot) for that purpose.

use std::sync::Arc;

use questline_types::{
    Account, BadgeId, BadgeStatus, DailyBonus, IdleSnapshot, ModuleId, ProgressDocument,
    ProgressView, RewardNotice,
};
use serde_json::Value;
use tracing::{debug, info};

use crate::achievements;
use crate::catalog;
use crate::clock::{Clock, ClockError, DayClock};
use crate::config::{EconomyConfig, EngineConfig, RewardsConfig};
use crate::idle::{CatchUp, IdleEconomy, TickYield, UpgradeOutcome};
use crate::merge::merge;
use crate::normalize::{self, NormalizeContext, Normalized};
use crate::rewards::RewardQueue;
use crate::stats::{self, f64_to_count, sanitize};

/// What happened while a stored document was applied.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LoadReport {
    /// Daily bonus granted during normalization.
    pub daily_bonus: Option<DailyBonus>,
    /// Offline production credited.
    pub catch_up: Option<CatchUp>,
}

/// One learner's progress and idle economy.
#[derive(Debug)]
pub struct ProgressEngine {
    account: Account,
    document: ProgressDocument,
    economy: IdleEconomy,
    rewards: RewardQueue,
    idle_restored: bool,
    unlocked: Vec<BadgeId>,
    clock: Arc<dyn Clock>,
    day_clock: DayClock,
    economy_config: EconomyConfig,
    rewards_config: RewardsConfig,
}

impl ProgressEngine {
    /// Create an engine holding an empty document for `account`.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidOffset`] if the configured zone is invalid.
    pub fn new(
        account: Account,
        clock: Arc<dyn Clock>,
        config: &EngineConfig,
    ) -> Result<Self, ClockError> {
        Ok(Self {
            account,
            document: ProgressDocument::default(),
            economy: IdleEconomy::default(),
            rewards: RewardQueue::default(),
            idle_restored: false,
            unlocked: Vec::new(),
            clock,
            day_clock: DayClock::new(config.clock.utc_offset_minutes)?,
            economy_config: config.economy.clone(),
            rewards_config: config.rewards.clone(),
        })
    }

    /// The learner this engine belongs to.
    pub const fn account(&self) -> Account {
        self.account
    }

    /// The in-memory document, without the embedded idle snapshot.
    pub const fn document(&self) -> &ProgressDocument {
        &self.document
    }

    /// The in-memory idle economy.
    pub const fn economy(&self) -> &IdleEconomy {
        &self.economy
    }

    /// Apply the locally stored document and idle state.
    ///
    /// `local_idle` takes precedence over a snapshot embedded in the
    /// document. Offline production is credited once, here, when a snapshot
    /// is available.
    pub fn load_local(
        &mut self,
        raw: Option<&Value>,
        local_idle: Option<IdleSnapshot>,
    ) -> LoadReport {
        let normalized = self.normalize(raw, true);
        let idle = local_idle.or(normalized.idle);
        self.document = normalized.document;
        self.rewards.clear();
        let catch_up = match idle {
            Some(snapshot) => self.restore_idle(&snapshot),
            None => {
                self.economy = IdleEconomy::default();
                self.economy.set_currency(self.document.currency);
                None
            }
        };
        self.after_change();
        LoadReport {
            daily_bonus: normalized.daily_bonus,
            catch_up,
        }
    }

    /// Replace the in-memory document with a fetched remote one.
    ///
    /// The idle economy is kept when it was already restored this session;
    /// otherwise the remote's embedded snapshot is adopted and caught up.
    pub fn apply_remote(&mut self, raw: &Value) -> LoadReport {
        let normalized = self.normalize(Some(raw), true);
        self.document = normalized.document;
        let catch_up = match normalized.idle {
            Some(snapshot) if !self.idle_restored => self.restore_idle(&snapshot),
            _ => None,
        };
        self.after_change();
        info!(user_id = %self.account.id, score = self.document.score, "remote progress applied");
        LoadReport {
            daily_bonus: normalized.daily_bonus,
            catch_up,
        }
    }

    /// Merge a fetched remote document into the in-memory one field by
    /// field.
    ///
    /// A missing remote leaves the document untouched. The remote copy is
    /// repaired but not credited a daily bonus: the live document already
    /// carries today's, and `max(score)` would otherwise count it twice.
    pub fn merge_remote(&mut self, raw: Option<&Value>) {
        let Some(raw) = raw else {
            return;
        };
        let remote = self.normalize(Some(raw), false).document;
        self.document = merge(&self.document, &remote);
        self.after_change();
        debug!(user_id = %self.account.id, score = self.document.score, "remote progress merged");
    }

    /// Add XP. Returns the new score.
    pub fn add_score(&mut self, delta: u64) -> u64 {
        self.document.score = self.document.score.saturating_add(delta);
        self.after_change();
        self.document.score
    }

    /// Add currency. Returns the new balance.
    pub fn add_currency(&mut self, delta: f64) -> f64 {
        self.economy.add_currency(delta);
        self.after_change();
        self.economy.currency()
    }

    /// Spend currency. Returns `false`, changing nothing, when the balance
    /// is too low.
    pub fn spend_currency(&mut self, amount: f64) -> bool {
        let spent = self.economy.spend_currency(amount);
        if spent {
            self.after_change();
        }
        spent
    }

    /// Apply `delta` to a stat. Returns the stored value.
    ///
    /// Keys reserved for the embedded idle snapshot are left alone.
    pub fn update_stat(&mut self, key: &str, delta: f64) -> f64 {
        if key.is_empty() || key.starts_with(stats::SAVED_PREFIX) {
            debug!(key, "ignoring update to reserved stat");
            return self.document.stat(key);
        }
        stats::apply_delta(&mut self.document.stats, key, delta);
        self.after_change();
        self.document.stat(key)
    }

    /// Record a finished level of a minigame and count the win.
    ///
    /// Returns the best level reached in that game.
    pub fn complete_level(&mut self, game_id: &str, level: u32) -> u32 {
        let best = self
            .document
            .completed_levels
            .entry(game_id.to_owned())
            .or_insert(0);
        *best = (*best).max(level);
        let best = *best;
        stats::apply_delta(&mut self.document.stats, &stats::wins_key(game_id), 1.0);
        self.after_change();
        best
    }

    /// Acquire or upgrade a production module.
    pub fn upgrade_module(&mut self, id: &ModuleId) -> UpgradeOutcome {
        let outcome = self.economy.upgrade(id);
        if outcome.succeeded() {
            self.after_change();
        }
        debug!(module = %id, ?outcome, "module upgrade");
        outcome
    }

    /// Claim the presented reward, if any.
    pub fn claim_reward(&mut self) -> Option<RewardNotice> {
        let claimed = self.rewards.claim(&mut self.document)?;
        self.after_change();
        Some(claimed)
    }

    /// Exchange `amount` energy for score at the configured ratio.
    ///
    /// Returns `false`, changing nothing, when `amount` is not positive or
    /// exceeds the stored energy.
    pub fn convert_resource_to_score(&mut self, amount: f64) -> bool {
        if !self.economy.spend_energy(amount) {
            return false;
        }
        let amount = sanitize(amount);
        let ratio = f64::from(self.economy_config.energy_per_xp.max(1));
        let gained = f64_to_count(amount / ratio);
        self.document.score = self.document.score.saturating_add(gained);
        stats::apply_delta(&mut self.document.stats, stats::ENERGY_CONVERTED, amount);
        self.after_change();
        true
    }

    /// Credit one live production interval.
    pub fn tick_production(&mut self) -> TickYield {
        let produced = self.economy.tick(&self.economy_config);
        self.after_change();
        produced
    }

    /// Count one minute of active presence.
    pub fn record_presence(&mut self) {
        stats::apply_delta(&mut self.document.stats, stats::TIME_SPENT, 1.0);
        self.after_change();
    }

    /// Drain the badges unlocked since the last call.
    pub fn take_unlocked(&mut self) -> Vec<BadgeId> {
        std::mem::take(&mut self.unlocked)
    }

    /// Consumer-facing snapshot.
    ///
    /// Presents the head of the reward queue if nothing is presented yet.
    pub fn view(&mut self) -> ProgressView {
        let current_reward = self.rewards.present(&self.document);
        ProgressView {
            user_id: self.account.id,
            score: self.document.score,
            level: stats::level_for_score(self.document.score),
            currency: self.economy.currency(),
            energy: self.economy.energy(),
            production_per_second: self.economy.production(),
            badges: self.document.badges.clone(),
            stats: self.document.stats.clone(),
            completed_levels: self.document.completed_levels.clone(),
            modules: self.economy.modules().clone(),
            current_reward,
            pending_rewards: u32::try_from(self.document.unclaimed_rewards.len())
                .unwrap_or(u32::MAX),
        }
    }

    /// Every catalog badge with the learner's progress towards it.
    pub fn badge_statuses(&self) -> Vec<BadgeStatus> {
        catalog::BADGES
            .iter()
            .map(|badge| {
                let unlocked = self.document.badges.contains(badge.id);
                BadgeStatus {
                    id: badge.badge_id(),
                    reward_xp: badge.reward_xp,
                    unlocked,
                    progress: if unlocked {
                        100.0
                    } else {
                        badge.progress(&self.document.stats)
                    },
                }
            })
            .collect()
    }

    /// The idle economy stamped with the current time.
    pub fn idle_snapshot(&self) -> IdleSnapshot {
        self.economy.to_snapshot(self.clock.now_millis())
    }

    /// The document as it is written to storage, with the idle snapshot
    /// embedded in `stats`.
    pub fn persisted_document(&self) -> ProgressDocument {
        let mut document = self.document.clone();
        normalize::embed_idle(&mut document.stats, &self.idle_snapshot());
        document
    }

    fn normalize(&self, raw: Option<&Value>, grant_bonus: bool) -> Normalized {
        let ctx = NormalizeContext {
            account: self.account,
            now: self.clock.now(),
            day_clock: &self.day_clock,
            rewards: &self.rewards_config,
            grant_bonus,
        };
        normalize::normalize(raw, &ctx)
    }

    fn restore_idle(&mut self, snapshot: &IdleSnapshot) -> Option<CatchUp> {
        self.economy = IdleEconomy::from_snapshot(snapshot);
        self.idle_restored = true;
        self.economy.catch_up(
            snapshot.saved_at_epoch_ms,
            self.clock.now_millis(),
            &self.economy_config,
        )
    }

    fn after_change(&mut self) {
        self.document.currency = self.economy.currency();
        self.document.stats.insert(
            stats::MODULES_OWNED.to_owned(),
            f64::from(self.economy.owned_count()),
        );
        normalize::mirror_score(&mut self.document);
        let timestamp = self.day_clock.timestamp_iso(self.clock.now());
        let unlocked = achievements::evaluate(&mut self.document, &timestamp);
        for id in &unlocked {
            info!(user_id = %self.account.id, badge_id = %id, "badge unlocked");
        }
        self.unlocked.extend(unlocked);
    }
}
