//! A running learner session.
//!
//! [`Session`] wraps a [`ProgressEngine`] with the I/O it needs: it loads
//! the local copy, fetches the remote copy in the background, persists every
//! mutation locally before arming the debounced remote write, and drives
//! the production and presence timers.
//!
//! # Concurrency
//!
//! All engine state sits behind one async mutex. Commands, ticks, and the
//! remote apply each take the lock, mutate, save locally, and re-arm the
//! debounce without awaiting in between, so each is atomic with respect to
//! the others. Remote reads and writes run outside the lock.

use std::sync::{Arc, PoisonError};
use std::time::Duration;

use questline_core::clock::{Clock, ClockError};
use questline_core::config::EngineConfig;
use questline_core::idle::UpgradeOutcome;
use questline_core::{LoadReport, ProgressEngine};
use questline_db::{DbError, LocalStore, RemoteBackend};
use questline_types::{
    Account, BadgeStatus, ModuleId, ProgressDocument, ProgressEvent, ProgressView, RewardNotice,
    UserId,
};
use tokio::sync::{Mutex, MutexGuard, broadcast};
use tokio::task::AbortHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::debounce::Debouncer;

/// Capacity of the session event channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Errors returned by session commands.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The session was deactivated.
    #[error("session for user {user_id} is no longer active")]
    Inactive {
        /// The session's user.
        user_id: UserId,
    },

    /// The configured time zone is invalid.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },

    /// An explicit remote operation failed.
    #[error("remote store error: {source}")]
    Remote {
        /// The underlying store error.
        #[from]
        source: DbError,
    },

    /// An explicit remote operation was requested with no remote store.
    #[error("no remote store is configured")]
    RemoteDisabled,
}

/// Collaborators a session is built from.
#[derive(Debug, Clone)]
pub struct SessionDeps {
    /// Device-local persistence.
    pub store: LocalStore,
    /// Remote persistence.
    pub remote: RemoteBackend,
    /// Source of "now".
    pub clock: Arc<dyn Clock>,
    /// Engine configuration.
    pub config: EngineConfig,
}

struct SessionState {
    engine: ProgressEngine,
    debouncer: Debouncer,
    active: bool,
    bonus_announced: bool,
}

struct Shared {
    user_id: UserId,
    store: LocalStore,
    remote: RemoteBackend,
    events: broadcast::Sender<ProgressEvent>,
    state: Mutex<SessionState>,
}

/// One learner's live progress session.
pub struct Session {
    shared: Arc<Shared>,
    startup: Vec<ProgressEvent>,
    tasks: std::sync::Mutex<Vec<AbortHandle>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.shared.user_id)
            .field("remote", &self.shared.remote.kind())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Start a session for `account`.
    ///
    /// The local copy is applied before this returns; it is written back
    /// remotely only if loading changed it. The remote fetch and the timers
    /// run as background tasks.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Clock`] if the configured zone is invalid.
    pub async fn activate(account: Account, deps: SessionDeps) -> Result<Self, SessionError> {
        let SessionDeps {
            store,
            remote,
            clock,
            config,
        } = deps;
        let user_id = account.id;
        let mut engine = ProgressEngine::new(account, clock, &config)?;

        let raw = store.load_document(user_id).unwrap_or_else(|e| {
            warn!(%user_id, error = %e, "Discarding corrupt local progress");
            None
        });
        let idle = store.load_idle(user_id).unwrap_or_else(|e| {
            warn!(%user_id, error = %e, "Discarding corrupt local idle state");
            None
        });
        let report = engine.load_local(raw.as_ref(), idle);

        let (events, mut startup_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let shared = Arc::new(Shared {
            user_id,
            store,
            remote,
            events,
            state: Mutex::new(SessionState {
                engine,
                debouncer: Debouncer::new(Duration::from_millis(config.sync.debounce_ms)),
                active: true,
                bonus_announced: false,
            }),
        });

        {
            let mut state = shared.state.lock().await;
            let changed = report.daily_bonus.is_some() || report.catch_up.is_some();
            shared.announce(&mut state, report);
            if changed {
                shared.commit(&mut state);
            } else {
                shared.save_local(&state);
                shared.publish_unlocks(&mut state);
            }
        }
        let mut startup = Vec::new();
        while let Ok(event) = startup_rx.try_recv() {
            startup.push(event);
        }
        info!(%user_id, remote = shared.remote.kind(), "Session activated");

        let mut tasks = Vec::new();
        if shared.remote.is_enabled() {
            tasks.push(tokio::spawn(fetch_remote(Arc::clone(&shared))).abort_handle());
        }
        tasks.push(
            tokio::spawn(run_production(
                Arc::clone(&shared),
                Duration::from_millis(config.economy.tick_interval_ms),
            ))
            .abort_handle(),
        );
        tasks.push(
            tokio::spawn(run_presence(
                Arc::clone(&shared),
                Duration::from_millis(config.sync.presence_interval_ms),
            ))
            .abort_handle(),
        );

        Ok(Self {
            shared,
            startup,
            tasks: std::sync::Mutex::new(tasks),
        })
    }

    /// The session's user.
    pub fn user_id(&self) -> UserId {
        self.shared.user_id
    }

    /// Whether the session still accepts commands.
    pub async fn is_active(&self) -> bool {
        self.shared.state.lock().await.active
    }

    /// Events raised while the local copy was loaded, before anyone could
    /// subscribe.
    pub fn startup_events(&self) -> &[ProgressEvent] {
        &self.startup
    }

    /// Receive session events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.shared.events.subscribe()
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Add XP. Returns the new score.
    pub async fn add_score(&self, delta: u64) -> Result<u64, SessionError> {
        self.command(|engine| (engine.add_score(delta), delta > 0))
            .await
    }

    /// Add currency. Returns the new balance.
    pub async fn add_currency(&self, delta: f64) -> Result<f64, SessionError> {
        self.command(|engine| (engine.add_currency(delta), true))
            .await
    }

    /// Spend currency. `Ok(false)` means the balance was too low.
    pub async fn spend_currency(&self, amount: f64) -> Result<bool, SessionError> {
        self.command(|engine| {
            let spent = engine.spend_currency(amount);
            (spent, spent)
        })
        .await
    }

    /// Apply a delta to a stat. Returns the stored value.
    pub async fn update_stat(&self, key: &str, delta: f64) -> Result<f64, SessionError> {
        self.command(|engine| (engine.update_stat(key, delta), true))
            .await
    }

    /// Record a finished minigame level. Returns the best level reached.
    pub async fn complete_level(&self, game_id: &str, level: u32) -> Result<u32, SessionError> {
        self.command(|engine| (engine.complete_level(game_id, level), true))
            .await
    }

    /// Acquire or upgrade a production module.
    pub async fn upgrade_module(&self, id: &ModuleId) -> Result<UpgradeOutcome, SessionError> {
        self.command(|engine| {
            let outcome = engine.upgrade_module(id);
            (outcome, outcome.succeeded())
        })
        .await
    }

    /// Claim the presented reward.
    pub async fn claim_reward(&self) -> Result<Option<RewardNotice>, SessionError> {
        let claimed = self
            .command(|engine| {
                let claimed = engine.claim_reward();
                let changed = claimed.is_some();
                (claimed, changed)
            })
            .await?;
        if let Some(notice) = &claimed {
            self.shared.publish(ProgressEvent::RewardClaimed {
                badge_id: notice.badge_id.clone(),
                reward_xp: notice.reward_xp,
            });
        }
        Ok(claimed)
    }

    /// Exchange energy for score. `Ok(false)` means not enough energy.
    pub async fn convert_resource_to_score(&self, amount: f64) -> Result<bool, SessionError> {
        self.command(|engine| {
            let converted = engine.convert_resource_to_score(amount);
            (converted, converted)
        })
        .await
    }

    /// Consumer-facing snapshot.
    pub async fn view(&self) -> Result<ProgressView, SessionError> {
        let mut state = self.active_state().await?;
        Ok(state.engine.view())
    }

    /// Every catalog badge with progress.
    pub async fn badges(&self) -> Result<Vec<BadgeStatus>, SessionError> {
        let state = self.active_state().await?;
        Ok(state.engine.badge_statuses())
    }

    /// Fetch the remote document, merge it field by field, and write the
    /// result both locally and remotely at once.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::RemoteDisabled`] without a remote store and
    /// [`SessionError::Remote`] if the fetch or the write fails.
    pub async fn sync_now(&self) -> Result<ProgressView, SessionError> {
        if !self.shared.remote.is_enabled() {
            return Err(SessionError::RemoteDisabled);
        }
        let user_id = self.shared.user_id;
        let remote = self.shared.remote.get_progress(user_id).await?;

        let (document, view) = {
            let mut state = self.active_state().await?;
            state.engine.merge_remote(remote.as_ref());
            state.debouncer.cancel();
            self.shared.save_local(&state);
            self.shared.publish_unlocks(&mut state);
            (state.engine.persisted_document(), state.engine.view())
        };
        self.shared.remote.upsert_progress(user_id, &document).await?;
        info!(%user_id, score = document.score, "Explicit sync completed");
        Ok(view)
    }

    /// Write the current document remotely now, disarming the debounce.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Remote`] if the write fails.
    pub async fn flush(&self) -> Result<(), SessionError> {
        if !self.shared.remote.is_enabled() {
            return Ok(());
        }
        let document = {
            let mut state = self.shared.state.lock().await;
            state.debouncer.cancel();
            state.engine.persisted_document()
        };
        self.shared
            .remote
            .upsert_progress(self.shared.user_id, &document)
            .await?;
        debug!(user_id = %self.shared.user_id, "Flushed progress to remote");
        Ok(())
    }

    /// Stop the session: cancel every timer and reject further commands.
    ///
    /// A remote write that already started is left to finish.
    pub async fn deactivate(&self) {
        self.abort_tasks();
        let mut state = self.shared.state.lock().await;
        if state.active {
            state.active = false;
            state.debouncer.cancel();
            info!(user_id = %self.shared.user_id, "Session deactivated");
        }
    }

    async fn command<T>(
        &self,
        f: impl FnOnce(&mut ProgressEngine) -> (T, bool),
    ) -> Result<T, SessionError> {
        let mut state = self.active_state().await?;
        let (result, changed) = f(&mut state.engine);
        if changed {
            self.shared.commit(&mut state);
        }
        Ok(result)
    }

    async fn active_state(&self) -> Result<MutexGuard<'_, SessionState>, SessionError> {
        let state = self.shared.state.lock().await;
        if !state.active {
            return Err(SessionError::Inactive {
                user_id: self.shared.user_id,
            });
        }
        Ok(state)
    }

    fn abort_tasks(&self) {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        for task in tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}

impl Shared {
    fn publish(&self, event: ProgressEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn publish_unlocks(&self, state: &mut SessionState) {
        for badge_id in state.engine.take_unlocked() {
            self.publish(ProgressEvent::BadgeUnlocked { badge_id });
        }
    }

    fn announce(&self, state: &mut SessionState, report: LoadReport) {
        if let Some(bonus) = report.daily_bonus {
            if state.bonus_announced {
                debug!(user_id = %self.user_id, amount = bonus.amount, "Daily bonus already announced");
            } else {
                state.bonus_announced = true;
                info!(user_id = %self.user_id, amount = bonus.amount, streak = bonus.streak, "Daily bonus granted");
                self.publish(ProgressEvent::DailyBonus { bonus });
            }
        }
        if let Some(catch_up) = report.catch_up {
            info!(
                user_id = %self.user_id,
                elapsed_seconds = catch_up.elapsed_seconds,
                energy = catch_up.energy,
                currency = catch_up.currency,
                "Offline production credited"
            );
            self.publish(ProgressEvent::OfflineProduction {
                elapsed_seconds: catch_up.elapsed_seconds,
                energy: catch_up.energy,
                currency: catch_up.currency,
            });
        }
    }

    fn save_local(&self, state: &SessionState) {
        let document = state.engine.persisted_document();
        let idle = state.engine.idle_snapshot();
        let saved = self
            .store
            .save_document(self.user_id, &document)
            .and_then(|()| self.store.save_idle(self.user_id, &idle));
        if let Err(e) = saved {
            warn!(user_id = %self.user_id, error = %e, "Failed to save progress locally");
        }
    }

    /// Persist locally, publish unlocks, then re-arm the remote write.
    fn commit(&self, state: &mut SessionState) {
        self.save_local(state);
        self.publish_unlocks(state);
        if self.remote.is_enabled() {
            let document = state.engine.persisted_document();
            state
                .debouncer
                .schedule(write_remote(self.remote.clone(), self.user_id, document));
        }
    }
}

/// The debounced remote write. Targets `user_id` explicitly so it stays
/// valid after the session ends.
async fn write_remote(remote: RemoteBackend, user_id: UserId, document: ProgressDocument) {
    match remote.upsert_progress(user_id, &document).await {
        Ok(()) => debug!(%user_id, score = document.score, "Remote progress written"),
        Err(e) => warn!(%user_id, error = %e, "Remote write failed; the next change will retry"),
    }
}

async fn fetch_remote(shared: Arc<Shared>) {
    let user_id = shared.user_id;
    let raw = match shared.remote.get_progress(user_id).await {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!(%user_id, "No remote progress stored");
            return;
        }
        Err(e) => {
            warn!(%user_id, error = %e, "Remote fetch failed; keeping local progress");
            return;
        }
    };
    let mut state = shared.state.lock().await;
    if !state.active {
        return;
    }
    let report = state.engine.apply_remote(&raw);
    shared.publish(ProgressEvent::RemoteApplied);
    shared.announce(&mut state, report);
    shared.commit(&mut state);
}

async fn run_production(shared: Arc<Shared>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let mut state = shared.state.lock().await;
        if !state.active {
            break;
        }
        let produced = state.engine.tick_production();
        if produced.energy > 0.0 {
            shared.commit(&mut state);
        }
    }
}

async fn run_presence(shared: Arc<Shared>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let mut state = shared.state.lock().await;
        if !state.active {
            break;
        }
        state.engine.record_presence();
        shared.commit(&mut state);
    }
}
