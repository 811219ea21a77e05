//! Field-wise merge of a local and a remote progress document.
//!
//! Used by the explicit sync command. Loading does not merge: a fetched
//! remote document replaces the local one outright.

use questline_types::ProgressDocument;

use crate::stats;

/// Combine `local` and `remote` into one document.
///
/// - `score`: the larger value.
/// - `badges`: union. Unlock timestamps keep the local value and add
///   remote-only keys.
/// - `stats` and `completedLevels`: shallow merge, remote wins per key;
///   `streak` and `level` then take the larger of the two sides.
/// - `unclaimedRewards`: local order followed by remote-only entries.
/// - `lastDailyBonusDate`: the later day.
/// - `currency`: local; the idle economy owns it.
///
/// Merging is idempotent: `merge(&merge(a, b), b) == merge(a, b)`.
pub fn merge(local: &ProgressDocument, remote: &ProgressDocument) -> ProgressDocument {
    let mut merged = local.clone();

    merged.score = local.score.max(remote.score);

    merged.badges.extend(remote.badges.iter().cloned());
    for (id, ts) in &remote.badge_unlock_timestamps {
        merged
            .badge_unlock_timestamps
            .entry(id.clone())
            .or_insert_with(|| ts.clone());
    }

    merged
        .stats
        .extend(remote.stats.iter().map(|(k, v)| (k.clone(), *v)));
    for key in [stats::STREAK, stats::LEVEL] {
        let larger = local.stat(key).max(remote.stat(key));
        merged.stats.insert(key.to_owned(), larger);
    }

    merged
        .completed_levels
        .extend(remote.completed_levels.iter().map(|(k, v)| (k.clone(), *v)));

    for id in &remote.unclaimed_rewards {
        if !merged.unclaimed_rewards.contains(id) {
            merged.unclaimed_rewards.push(id.clone());
        }
    }
    merged
        .unclaimed_rewards
        .retain(|id| merged.badges.contains(id));

    merged.last_daily_bonus_date = match (&local.last_daily_bonus_date, &remote.last_daily_bonus_date) {
        (Some(l), Some(r)) => Some(l.max(r).clone()),
        (l, r) => l.clone().or_else(|| r.clone()),
    };

    merged
}

#[cfg(test)]
mod tests {
    use questline_types::BadgeId;

    use super::*;

    fn doc(score: u64, badges: &[&str]) -> ProgressDocument {
        ProgressDocument {
            score,
            badges: badges.iter().map(|b| BadgeId::from(*b)).collect(),
            ..ProgressDocument::default()
        }
    }

    #[test]
    fn score_takes_max_and_badges_union() {
        let merged = merge(&doc(100, &["a"]), &doc(80, &["b"]));
        assert_eq!(merged.score, 100);
        assert_eq!(merged, {
            let mut expected = doc(100, &["a", "b"]);
            expected.stats.insert("streak".to_owned(), 0.0);
            expected.stats.insert("level".to_owned(), 0.0);
            expected
        });
    }

    #[test]
    fn remote_wins_per_stat_key_but_streak_and_level_take_max() {
        let mut local = doc(0, &[]);
        local.stats.insert("wins_quiz".to_owned(), 9.0);
        local.stats.insert("streak".to_owned(), 5.0);
        local.stats.insert("time_spent".to_owned(), 3.0);
        let mut remote = doc(0, &[]);
        remote.stats.insert("wins_quiz".to_owned(), 4.0);
        remote.stats.insert("streak".to_owned(), 2.0);
        remote.stats.insert("level".to_owned(), 3.0);

        let merged = merge(&local, &remote);
        assert!((merged.stat("wins_quiz") - 4.0).abs() < f64::EPSILON);
        assert!((merged.stat("streak") - 5.0).abs() < f64::EPSILON);
        assert!((merged.stat("level") - 3.0).abs() < f64::EPSILON);
        assert!((merged.stat("time_spent") - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn completed_levels_remote_wins_per_key() {
        let mut local = doc(0, &[]);
        local.completed_levels.insert("sudoku".to_owned(), 5);
        local.completed_levels.insert("quiz".to_owned(), 1);
        let mut remote = doc(0, &[]);
        remote.completed_levels.insert("sudoku".to_owned(), 2);

        let merged = merge(&local, &remote);
        assert_eq!(merged.completed_levels.get("sudoku"), Some(&2));
        assert_eq!(merged.completed_levels.get("quiz"), Some(&1));
    }

    #[test]
    fn reward_queue_keeps_local_order_then_remote_extras() {
        let mut local = doc(0, &["x", "y"]);
        local.unclaimed_rewards = vec![BadgeId::from("y")];
        let mut remote = doc(0, &["x", "z"]);
        remote.unclaimed_rewards = vec![BadgeId::from("z"), BadgeId::from("y")];

        let merged = merge(&local, &remote);
        let queue: Vec<&str> = merged.unclaimed_rewards.iter().map(BadgeId::as_str).collect();
        assert_eq!(queue, ["y", "z"]);
    }

    #[test]
    fn later_bonus_day_wins() {
        let mut local = doc(0, &[]);
        local.last_daily_bonus_date = Some("2024-01-09".to_owned());
        let mut remote = doc(0, &[]);
        remote.last_daily_bonus_date = Some("2024-01-10".to_owned());
        assert_eq!(
            merge(&local, &remote).last_daily_bonus_date.as_deref(),
            Some("2024-01-10")
        );
        assert_eq!(
            merge(&doc(0, &[]), &local).last_daily_bonus_date.as_deref(),
            Some("2024-01-09")
        );
    }

    #[test]
    fn merge_is_idempotent() {
        let mut local = doc(30, &["a"]);
        local.stats.insert("logins".to_owned(), 2.0);
        let mut remote = doc(70, &["b"]);
        remote.stats.insert("logins".to_owned(), 5.0);
        remote.unclaimed_rewards = vec![BadgeId::from("b")];

        let once = merge(&local, &remote);
        let twice = merge(&once, &remote);
        assert_eq!(once, twice);
    }
}
