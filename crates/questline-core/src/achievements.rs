//! Achievement detection.
//!
//! [`detect_new_unlocks`] is a pure diff of the catalog against owned
//! badges. [`record_unlocks`] applies its result to a document; it is
//! idempotent, so running it twice on the same state changes nothing.

use std::collections::{BTreeMap, BTreeSet};

use questline_types::{BadgeId, ProgressDocument};

use crate::catalog::{self, BadgeDefinition};

/// Catalog badges not in `owned` whose criterion holds for `stats`, in
/// catalog order.
pub fn detect_new_unlocks(
    stats: &BTreeMap<String, f64>,
    owned: &BTreeSet<BadgeId>,
) -> Vec<&'static BadgeDefinition> {
    catalog::BADGES
        .iter()
        .filter(|badge| !owned.contains(badge.id) && badge.is_unlocked_by(stats))
        .collect()
}

/// Add `unlocks` to the document's badges, stamp them with `timestamp`, and
/// queue their rewards.
///
/// Ids already owned or already queued are skipped. Returns the ids that
/// were newly recorded, in order.
pub fn record_unlocks(
    document: &mut ProgressDocument,
    unlocks: &[&BadgeDefinition],
    timestamp: &str,
) -> Vec<BadgeId> {
    let mut recorded = Vec::new();
    for badge in unlocks {
        let id = badge.badge_id();
        if !document.badges.insert(id.clone()) {
            continue;
        }
        document
            .badge_unlock_timestamps
            .entry(id.clone())
            .or_insert_with(|| timestamp.to_owned());
        if !document.unclaimed_rewards.contains(&id) {
            document.unclaimed_rewards.push(id.clone());
        }
        recorded.push(id);
    }
    recorded
}

/// Detect and record in one step.
pub fn evaluate(document: &mut ProgressDocument, timestamp: &str) -> Vec<BadgeId> {
    let unlocks = detect_new_unlocks(&document.stats, &document.badges);
    if unlocks.is_empty() {
        return Vec::new();
    }
    record_unlocks(document, &unlocks, timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats_of(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| ((*k).to_owned(), *v)).collect()
    }

    #[test]
    fn unlocks_follow_catalog_order() {
        let stats = stats_of(&[("xp", 150.0), ("logins", 1.0)]);
        let ids: Vec<&str> = detect_new_unlocks(&stats, &BTreeSet::new())
            .iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(ids, ["first_login", "xp_100"]);
    }

    #[test]
    fn owned_badges_are_not_detected_again() {
        let stats = stats_of(&[("logins", 1.0)]);
        let owned: BTreeSet<BadgeId> = [BadgeId::from("first_login")].into_iter().collect();
        assert!(detect_new_unlocks(&stats, &owned).is_empty());
    }

    #[test]
    fn recording_is_idempotent() {
        let mut document = ProgressDocument {
            stats: stats_of(&[("logins", 7.0)]),
            ..ProgressDocument::default()
        };
        let first = evaluate(&mut document, "2024-01-10T00:00:00.000+00:00");
        assert_eq!(first.len(), 2);
        assert_eq!(document.unclaimed_rewards, first);

        let refs: Vec<&BadgeDefinition> = catalog::find("first_login").into_iter().collect();
        assert!(record_unlocks(&mut document, &refs, "later").is_empty());
        assert_eq!(document.unclaimed_rewards.len(), 2);
        assert_eq!(
            document.badge_unlock_timestamps.get("first_login").map(String::as_str),
            Some("2024-01-10T00:00:00.000+00:00")
        );
    }

    #[test]
    fn nothing_to_unlock_on_empty_stats() {
        let mut document = ProgressDocument::default();
        assert!(evaluate(&mut document, "now").is_empty());
        assert!(document.badges.is_empty());
    }
}
