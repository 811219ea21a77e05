//! Resolution of the learner account the binary serves.
//!
//! The id comes from config when set. Otherwise the binary keeps one
//! generated id in `<data_dir>/user_id` so restarts reopen the same
//! progress.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use questline_core::config::AccountConfig;
use questline_types::{Account, UserId};
use tracing::info;
use uuid::Uuid;

use crate::error::EngineError;

const USER_ID_FILE: &str = "user_id";

/// Build the account from config, falling back to the id stored under
/// `data_dir` and generating one on first start.
///
/// # Errors
///
/// Returns [`EngineError::Account`] if the stored id is unreadable or a
/// new one cannot be written.
pub fn resolve(config: &AccountConfig, data_dir: &Path) -> Result<Account, EngineError> {
    let id = match config.user_id {
        Some(id) => UserId::from(id),
        None => stored_or_generated(data_dir)?,
    };
    Ok(Account {
        id,
        streak: config.streak,
    })
}

fn stored_or_generated(data_dir: &Path) -> Result<UserId, EngineError> {
    let path = data_dir.join(USER_ID_FILE);
    match fs::read_to_string(&path) {
        Ok(contents) => Uuid::parse_str(contents.trim())
            .map(UserId::from)
            .map_err(|e| EngineError::Account {
                message: format!("{} holds an invalid id: {e}", path.display()),
            }),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            let id = UserId::new();
            fs::create_dir_all(data_dir)
                .and_then(|()| fs::write(&path, id.to_string()))
                .map_err(|e| EngineError::Account {
                    message: format!("failed to write {}: {e}", path.display()),
                })?;
            info!(user_id = %id, "Generated a new learner id");
            Ok(id)
        }
        Err(e) => Err(EngineError::Account {
            message: format!("failed to read {}: {e}", path.display()),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn configured_id_wins() {
        let dir = tempfile::tempdir().unwrap();
        let id = Uuid::new_v4();
        let config = AccountConfig {
            user_id: Some(id),
            streak: 4,
        };
        let account = resolve(&config, dir.path()).unwrap();
        assert_eq!(account.id, UserId::from(id));
        assert_eq!(account.streak, 4);
        assert!(!dir.path().join(USER_ID_FILE).exists());
    }

    #[test]
    fn generated_id_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let config = AccountConfig::default();
        let first = resolve(&config, dir.path()).unwrap();
        let second = resolve(&config, dir.path()).unwrap();
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn garbage_id_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(USER_ID_FILE), "not-a-uuid").unwrap();
        assert!(matches!(
            resolve(&AccountConfig::default(), dir.path()),
            Err(EngineError::Account { .. })
        ));
    }
}
