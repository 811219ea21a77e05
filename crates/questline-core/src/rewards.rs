//! One-at-a-time reward delivery.
//!
//! The head of `unclaimedRewards` is presented by peeking; it leaves the
//! queue only when claimed. Claiming twice without a fresh presentation is
//! a no-op, so a reward is granted at most once.

use questline_types::{BadgeId, ProgressDocument, RewardNotice};
use tracing::{debug, warn};

use crate::catalog;

/// The "currently presented" slot of the reward queue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewardQueue {
    presented: Option<BadgeId>,
}

impl RewardQueue {
    /// The presented badge, if any.
    pub const fn presented(&self) -> Option<&BadgeId> {
        self.presented.as_ref()
    }

    /// Present the head of the queue if nothing is presented yet.
    ///
    /// A presented id that has left the queue (for example because a remote
    /// document replaced the local one) is dropped first.
    pub fn present(&mut self, document: &ProgressDocument) -> Option<RewardNotice> {
        if self
            .presented
            .as_ref()
            .is_some_and(|id| !document.unclaimed_rewards.contains(id))
        {
            self.presented = None;
        }
        if self.presented.is_none() {
            self.presented = document.unclaimed_rewards.first().cloned();
        }
        self.presented.as_ref().map(notice)
    }

    /// Claim the presented reward.
    ///
    /// Returns the notice for the claimed badge, or `None` when nothing was
    /// presented or the presented id had already left the queue.
    pub fn claim(&mut self, document: &mut ProgressDocument) -> Option<RewardNotice> {
        let id = self.presented.take()?;
        let position = document.unclaimed_rewards.iter().position(|q| *q == id)?;
        document.unclaimed_rewards.remove(position);
        let claimed = notice(&id);
        document.score = document.score.saturating_add(u64::from(claimed.reward_xp));
        debug!(badge_id = %id, reward_xp = claimed.reward_xp, "reward claimed");
        Some(claimed)
    }

    /// Forget the presented badge.
    pub fn clear(&mut self) {
        self.presented = None;
    }
}

fn notice(id: &BadgeId) -> RewardNotice {
    let reward_xp = catalog::find(id.as_str()).map_or_else(
        || {
            warn!(badge_id = %id, "presented badge missing from catalog");
            0
        },
        |badge| badge.reward_xp,
    );
    RewardNotice {
        badge_id: id.clone(),
        reward_xp,
    }
}
