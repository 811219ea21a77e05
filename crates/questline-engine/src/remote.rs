//! Remote store selection for the binary.
//!
//! Nothing here waits on the network. The pool connects on first use, so
//! the session applies its local copy first and a dead database surfaces
//! as a logged remote fetch failure instead of a failed startup.

use questline_core::config::InfrastructureConfig;
use questline_db::{PostgresConfig, PostgresPool, RemoteBackend};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// `PostgreSQL` when a usable URL is configured, otherwise no remote.
pub fn select(config: &InfrastructureConfig) -> RemoteBackend {
    let Some(url) = &config.postgres_url else {
        return RemoteBackend::Disabled;
    };
    match PostgresPool::connect_lazy(&PostgresConfig::new(url)) {
        Ok(pool) => RemoteBackend::Postgres(pool),
        Err(e) => {
            warn!(error = %e, "Remote store disabled; continuing with local progress only");
            RemoteBackend::Disabled
        }
    }
}

/// Apply the remote schema in the background.
///
/// A failure is logged; remote calls keep failing softly until the
/// database is fixed, and the next change retries the write.
pub fn spawn_migrations(remote: &RemoteBackend) -> Option<JoinHandle<()>> {
    let RemoteBackend::Postgres(pool) = remote else {
        return None;
    };
    let pool = pool.clone();
    Some(tokio::spawn(async move {
        match pool.run_migrations().await {
            Ok(()) => info!("Remote store ready"),
            Err(e) => warn!(error = %e, "Remote schema migration failed; remote sync will retry on later changes"),
        }
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn no_url_means_no_remote() {
        let backend = select(&InfrastructureConfig::default());
        assert!(!backend.is_enabled());
        assert!(spawn_migrations(&backend).is_none());
    }

    #[test]
    fn malformed_url_falls_back_to_local_only() {
        let config = InfrastructureConfig {
            postgres_url: Some("definitely not a url".to_owned()),
            server_port: 8080,
        };
        assert!(!select(&config).is_enabled());
    }

    #[tokio::test]
    async fn unreachable_database_does_not_block_selection() {
        let config = InfrastructureConfig {
            postgres_url: Some("postgresql://questline@127.0.0.1:1/questline".to_owned()),
            server_port: 8080,
        };
        let backend = select(&config);
        assert_eq!(backend.kind(), "postgres");

        // Migration failure is logged, not propagated.
        let migrations = spawn_migrations(&backend).unwrap();
        migrations.await.unwrap();
    }
}
