//! Device-local progress persistence.
//!
//! A small file-backed key/value store, one directory per learner. Every
//! write replaces the whole value through a temporary file and a rename, so
//! a crash mid-write leaves the previous value intact.
//!
//! # Key Patterns
//!
//! | Key | Type | Description |
//! |-----|------|-------------|
//! | `{user}/progress` | JSON | Full progress document |
//! | `{user}/modules` | JSON | Owned module levels |
//! | `{user}/energy` | Number | Accumulated energy |
//! | `{user}/currency` | Number | Spendable currency |
//! | `{user}/last_save` | Integer | Save time in Unix milliseconds |
//!
//! The last four mirror the idle snapshot embedded in the progress
//! document. They are the fast path on load.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use questline_types::{IdleSnapshot, ModuleId, ProgressDocument, UserId};

use crate::error::DbError;

/// The values stored per learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalKey {
    /// The progress document.
    Progress,
    /// Idle module levels.
    Modules,
    /// Idle energy.
    Energy,
    /// Idle currency.
    Currency,
    /// Idle save time.
    LastSave,
}

impl LocalKey {
    /// File name of the key inside a learner's directory.
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Progress => "progress.json",
            Self::Modules => "modules.json",
            Self::Energy => "energy.json",
            Self::Currency => "currency.json",
            Self::LastSave => "last_save.json",
        }
    }
}

/// File-backed key/value store rooted at one directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Open (creating if needed) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Io`] if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, DbError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        tracing::debug!(root = %root.display(), "Opened local progress store");
        Ok(Self { root })
    }

    /// The store's root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, user: UserId, key: LocalKey) -> PathBuf {
        self.root.join(user.to_string()).join(key.file_name())
    }

    // =========================================================================
    // Generic JSON get/set/delete
    // =========================================================================

    /// Serialize `value` as JSON and store it at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Serialization`] if serialization fails.
    /// Returns [`DbError::Io`] if the write fails.
    pub fn set_json<T: Serialize>(
        &self,
        user: UserId,
        key: LocalKey,
        value: &T,
    ) -> Result<(), DbError> {
        let path = self.path(user, key);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_vec(value)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Read the value at `key` and deserialize from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::KeyNotFound`] if the key does not exist.
    /// Returns [`DbError::Serialization`] if deserialization fails.
    /// Returns [`DbError::Io`] if the read fails.
    pub fn get_json<T: DeserializeOwned>(&self, user: UserId, key: LocalKey) -> Result<T, DbError> {
        let path = self.path(user, key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(DbError::KeyNotFound(format!("{user}/{}", key.file_name())));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Delete `key`. Deleting a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Io`] if the file exists but cannot be removed.
    pub fn delete(&self, user: UserId, key: LocalKey) -> Result<(), DbError> {
        match fs::remove_file(self.path(user, key)) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    // =========================================================================
    // Progress document
    // =========================================================================

    /// Store the progress document.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if serialization or the write fails.
    pub fn save_document(&self, user: UserId, document: &ProgressDocument) -> Result<(), DbError> {
        self.set_json(user, LocalKey::Progress, document)
    }

    /// Load the stored document as raw JSON, for the normalizer to repair.
    ///
    /// Returns `Ok(None)` when nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Serialization`] if the file is not JSON at all.
    pub fn load_document(&self, user: UserId) -> Result<Option<serde_json::Value>, DbError> {
        optional(self.get_json(user, LocalKey::Progress))
    }

    // =========================================================================
    // Idle mirror keys
    // =========================================================================

    /// Store the idle snapshot under its four mirror keys.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if any write fails.
    pub fn save_idle(&self, user: UserId, snapshot: &IdleSnapshot) -> Result<(), DbError> {
        self.set_json(user, LocalKey::Modules, &snapshot.modules)?;
        self.set_json(user, LocalKey::Energy, &snapshot.energy)?;
        self.set_json(user, LocalKey::Currency, &snapshot.resource_currency)?;
        self.set_json(user, LocalKey::LastSave, &snapshot.saved_at_epoch_ms)
    }

    /// Load the idle snapshot from its mirror keys.
    ///
    /// Returns `Ok(None)` when no save time is stored. A corrupt value in
    /// any of the other keys reads as its default without failing the rest.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the save time exists but cannot be read.
    pub fn load_idle(&self, user: UserId) -> Result<Option<IdleSnapshot>, DbError> {
        let Some(saved_at_epoch_ms) = optional(self.get_json::<i64>(user, LocalKey::LastSave))?
        else {
            return Ok(None);
        };
        let modules: BTreeMap<ModuleId, u32> = self.read_or_default(user, LocalKey::Modules);
        let energy: f64 = self.read_or_default(user, LocalKey::Energy);
        let resource_currency: f64 = self.read_or_default(user, LocalKey::Currency);
        Ok(Some(IdleSnapshot {
            energy,
            resource_currency,
            modules,
            saved_at_epoch_ms,
        }))
    }

    /// Remove everything stored for `user`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Io`] if the directory exists but cannot be removed.
    pub fn clear_user(&self, user: UserId) -> Result<(), DbError> {
        match fs::remove_dir_all(self.root.join(user.to_string())) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn read_or_default<T: DeserializeOwned + Default>(&self, user: UserId, key: LocalKey) -> T {
        match self.get_json(user, key) {
            Ok(value) => value,
            Err(DbError::KeyNotFound(_)) => T::default(),
            Err(e) => {
                tracing::warn!(user_id = %user, key = key.file_name(), error = %e, "Discarding corrupt local value");
                T::default()
            }
        }
    }
}

fn optional<T>(result: Result<T, DbError>) -> Result<Option<T>, DbError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(DbError::KeyNotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}
