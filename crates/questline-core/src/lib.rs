//! Progress reconciliation and idle-economy engine for Questline.
//!
//! Everything in this crate is synchronous and free of I/O. The session
//! runtime in `questline-sync` drives it and owns persistence.
//!
//! # Modules
//!
//! - [`clock`] -- Injected wall clock and fixed-zone day rendering.
//! - [`config`] -- Configuration loading from `questline-config.yaml` into
//!   strongly-typed structs.
//! - [`stats`] -- Stat keys, counter/gauge semantics, derived level.
//! - [`catalog`] -- The static badge catalog.
//! - [`modules`] -- The static production module catalog.
//! - [`normalize`] -- Repair of stored documents, daily bonus, idle
//!   snapshot extraction.
//! - [`merge`] -- Field-wise merge of local and remote documents.
//! - [`idle`] -- Live and offline idle production, module upgrades.
//! - [`achievements`] -- Unlock detection and recording.
//! - [`rewards`] -- One-at-a-time reward claiming.
//! - [`engine`] -- The [`ProgressEngine`] facade.
//!
//! [`ProgressEngine`]: engine::ProgressEngine

pub mod achievements;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod engine;
pub mod idle;
pub mod merge;
pub mod modules;
pub mod normalize;
pub mod rewards;
pub mod stats;

pub use engine::{LoadReport, ProgressEngine};
