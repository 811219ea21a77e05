//! Shared type definitions for the Questline progress engine.
//!
//! This crate is the single source of truth for the data model exchanged
//! between the engine, its persistence layers, and the web client. Types
//! flow downstream to `TypeScript` via `ts-rs`.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe wrappers for user ids and catalog keys
//! - [`progress`] -- The persisted progress document and idle snapshot
//! - [`view`] -- Read-only projections and session events for consumers

pub mod ids;
pub mod progress;
pub mod view;

// Re-export all public types at crate root for convenience.
pub use ids::{BadgeId, ModuleId, UserId};
pub use progress::{Account, DailyBonus, IdleSnapshot, ProgressDocument};
pub use view::{BadgeStatus, ProgressEvent, ProgressView, RewardNotice};

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    //! Serialization shape and `TypeScript` binding generation.

    use super::*;

    #[test]
    fn export_bindings() {
        use ts_rs::TS;

        // IDs
        let _ = crate::ids::UserId::export_all();
        let _ = crate::ids::BadgeId::export_all();
        let _ = crate::ids::ModuleId::export_all();

        // Progress
        let _ = crate::progress::ProgressDocument::export_all();
        let _ = crate::progress::IdleSnapshot::export_all();
        let _ = crate::progress::Account::export_all();
        let _ = crate::progress::DailyBonus::export_all();

        // Views
        let _ = crate::view::RewardNotice::export_all();
        let _ = crate::view::ProgressView::export_all();
        let _ = crate::view::BadgeStatus::export_all();
        let _ = crate::view::ProgressEvent::export_all();
    }

    #[test]
    fn document_uses_camel_case_field_names() {
        let doc = ProgressDocument {
            last_daily_bonus_date: Some("2024-01-10".to_owned()),
            ..ProgressDocument::default()
        };
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["lastDailyBonusDate"], "2024-01-10");
        assert!(json.get("unclaimedRewards").is_some());
        assert!(json.get("badgeUnlockTimestamps").is_some());
    }

    #[test]
    fn stat_ignores_non_finite_values() {
        let mut doc = ProgressDocument::default();
        doc.stats.insert("xp".to_owned(), f64::NAN);
        doc.stats.insert("logins".to_owned(), 3.0);
        assert!(doc.stat("xp").abs() < f64::EPSILON);
        assert!((doc.stat("logins") - 3.0).abs() < f64::EPSILON);
        assert!(doc.stat("missing").abs() < f64::EPSILON);
    }

    #[test]
    fn event_is_tagged_by_type() {
        let json = serde_json::to_value(ProgressEvent::RemoteApplied).unwrap();
        assert_eq!(json["type"], "remote_applied");
    }
}
