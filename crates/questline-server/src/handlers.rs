//! REST API endpoint handlers for the progress server.
//!
//! Every handler forwards to the shared [`questline_sync::Session`] held in
//! [`AppState`]. Mutating endpoints return the resulting value together with
//! a fresh [`ProgressView`] so clients never have to issue a second read.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `GET` | `/api/progress` | Current progress view |
//! | `GET` | `/api/badges` | Catalog badges with unlock progress |
//! | `GET` | `/api/modules` | Module catalog with owned levels and next cost |
//! | `POST` | `/api/score` | Add XP |
//! | `POST` | `/api/currency/add` | Add currency |
//! | `POST` | `/api/currency/spend` | Spend currency if affordable |
//! | `POST` | `/api/stats` | Adjust a named counter |
//! | `POST` | `/api/levels` | Record a completed minigame level |
//! | `POST` | `/api/modules/{id}/upgrade` | Acquire or upgrade a module |
//! | `POST` | `/api/rewards/claim` | Claim the presented reward |
//! | `POST` | `/api/convert` | Convert energy to XP |
//! | `POST` | `/api/sync` | Fetch, merge, and write back now |

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::response::{Html, IntoResponse};
use questline_core::idle::UpgradeOutcome;
use questline_core::modules::{self, MODULES};
use questline_types::{ModuleId, ProgressView, RewardNotice};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request and response bodies
// ---------------------------------------------------------------------------

/// Body of `POST /api/score`.
#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    /// XP to add.
    pub delta: u64,
}

/// Body of the currency endpoints and `POST /api/convert`.
#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    /// Amount of currency or energy.
    pub amount: f64,
}

/// Body of `POST /api/stats`.
#[derive(Debug, Deserialize)]
pub struct StatRequest {
    /// Counter name.
    pub key: String,
    /// Signed change.
    pub delta: f64,
}

/// Body of `POST /api/levels`.
#[derive(Debug, Deserialize)]
pub struct LevelRequest {
    /// Minigame identifier.
    pub game_id: String,
    /// Level just completed.
    pub level: u32,
}

/// Result of a command together with the view after it.
#[derive(Debug, Serialize)]
pub struct CommandResponse<T> {
    /// Command-specific result.
    pub result: T,
    /// Progress after the command.
    pub progress: ProgressView,
}

/// Serializable form of [`UpgradeOutcome`].
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UpgradeResult {
    /// The module was acquired at level 1.
    Acquired,
    /// The module moved up one level.
    Upgraded {
        /// Currency spent.
        cost: f64,
        /// New level.
        level: u32,
    },
    /// The learner could not afford the next level.
    InsufficientFunds {
        /// Currency required.
        cost: f64,
    },
}

/// One catalog module as listed by `GET /api/modules`.
#[derive(Debug, Serialize)]
pub struct ModuleListing {
    /// Catalog key.
    pub id: ModuleId,
    /// Owned level, 0 if not owned.
    pub level: u32,
    /// Energy per second per level.
    pub base_production: f64,
    /// Currency needed for the next level, 0 to acquire.
    pub next_cost: f64,
}

fn finite(amount: f64, field: &str) -> Result<f64, ApiError> {
    if amount.is_finite() && amount >= 0.0 {
        Ok(amount)
    } else {
        Err(ApiError::BadRequest(format!(
            "{field} must be a non-negative finite number"
        )))
    }
}

async fn respond<T: Serialize>(
    state: &AppState,
    result: T,
) -> Result<Json<CommandResponse<T>>, ApiError> {
    let progress = state.session.view().await?;
    Ok(Json(CommandResponse { result, progress }))
}

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page with the learner's headline numbers.
pub async fn index(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let view = state.session.view().await?;
    let user = view.user_id;
    let score = view.score;
    let level = view.level;
    let badges = view.badges.len();
    let pending = view.pending_rewards;
    let currency = view.currency.floor();
    let energy = view.energy.floor();

    Ok(Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Questline</title>
    <style>
        body {{ font-family: monospace; padding: 2rem; max-width: 720px; margin: 0 auto; }}
        .metric {{ display: inline-block; border: 1px solid #ccc; border-radius: 6px;
                   padding: 0.75rem 1.25rem; margin: 0.25rem; min-width: 100px; }}
        .label {{ color: #666; font-size: 0.85rem; }}
        .value {{ font-size: 1.4rem; font-weight: bold; }}
    </style>
</head>
<body>
    <h1>Questline</h1>
    <p>Learner <code>{user}</code></p>
    <div>
        <div class="metric"><div class="label">Score</div><div class="value">{score}</div></div>
        <div class="metric"><div class="label">Level</div><div class="value">{level}</div></div>
        <div class="metric"><div class="label">Badges</div><div class="value">{badges}</div></div>
        <div class="metric"><div class="label">Rewards</div><div class="value">{pending}</div></div>
        <div class="metric"><div class="label">Currency</div><div class="value">{currency}</div></div>
        <div class="metric"><div class="label">Energy</div><div class="value">{energy}</div></div>
    </div>
    <ul>
        <li><a href="/api/progress">/api/progress</a></li>
        <li><a href="/api/badges">/api/badges</a></li>
        <li><a href="/api/modules">/api/modules</a></li>
        <li><code>/ws/events</code> live session events</li>
    </ul>
</body>
</html>"#
    )))
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Return the current progress view.
///
/// Reading the view presents the head of the reward queue.
pub async fn get_progress(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ProgressView>, ApiError> {
    Ok(Json(state.session.view().await?))
}

/// List every catalog badge with unlock state and progress.
pub async fn list_badges(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let badges = state.session.badges().await?;
    Ok(Json(serde_json::json!({
        "count": badges.len(),
        "badges": badges,
    })))
}

/// List the module catalog with owned levels and the next upgrade cost.
pub async fn list_modules(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.session.view().await?;
    let listings: Vec<ModuleListing> = MODULES
        .iter()
        .map(|entry| {
            let level = view.modules.get(entry.id).copied().unwrap_or(0);
            ModuleListing {
                id: entry.module_id(),
                level,
                base_production: entry.base_production,
                next_cost: if level == 0 {
                    0.0
                } else {
                    entry.upgrade_cost(level)
                },
            }
        })
        .collect();
    Ok(Json(serde_json::json!({
        "count": listings.len(),
        "modules": listings,
    })))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Add XP. Returns the new score.
pub async fn add_score(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ScoreRequest>,
) -> Result<Json<CommandResponse<u64>>, ApiError> {
    let score = state.session.add_score(body.delta).await?;
    respond(&state, score).await
}

/// Add currency. Returns the new balance.
pub async fn add_currency(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AmountRequest>,
) -> Result<Json<CommandResponse<f64>>, ApiError> {
    let amount = finite(body.amount, "amount")?;
    let balance = state.session.add_currency(amount).await?;
    respond(&state, balance).await
}

/// Spend currency. Returns whether the balance covered it.
pub async fn spend_currency(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AmountRequest>,
) -> Result<Json<CommandResponse<bool>>, ApiError> {
    let amount = finite(body.amount, "amount")?;
    let spent = state.session.spend_currency(amount).await?;
    respond(&state, spent).await
}

/// Adjust a named counter. Returns its new value.
pub async fn update_stat(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StatRequest>,
) -> Result<Json<CommandResponse<f64>>, ApiError> {
    if body.key.is_empty() {
        return Err(ApiError::BadRequest("key must not be empty".to_owned()));
    }
    if !body.delta.is_finite() {
        return Err(ApiError::BadRequest("delta must be finite".to_owned()));
    }
    let value = state.session.update_stat(&body.key, body.delta).await?;
    respond(&state, value).await
}

/// Record a completed minigame level. Returns the best level for the game.
pub async fn complete_level(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LevelRequest>,
) -> Result<Json<CommandResponse<u32>>, ApiError> {
    if body.game_id.is_empty() {
        return Err(ApiError::BadRequest("game_id must not be empty".to_owned()));
    }
    let best = state.session.complete_level(&body.game_id, body.level).await?;
    respond(&state, best).await
}

/// Acquire a module or upgrade it by one level.
pub async fn upgrade_module(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CommandResponse<UpgradeResult>>, ApiError> {
    if modules::find(&id).is_none() {
        return Err(ApiError::NotFound(format!("module {id}")));
    }
    let outcome = state.session.upgrade_module(&ModuleId::from(id.as_str())).await?;
    let result = match outcome {
        UpgradeOutcome::Acquired => UpgradeResult::Acquired,
        UpgradeOutcome::Upgraded { cost, level } => UpgradeResult::Upgraded { cost, level },
        UpgradeOutcome::InsufficientFunds { cost } => UpgradeResult::InsufficientFunds { cost },
        UpgradeOutcome::UnknownModule => return Err(ApiError::NotFound(format!("module {id}"))),
    };
    respond(&state, result).await
}

/// Claim the presented reward, if any.
pub async fn claim_reward(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CommandResponse<Option<RewardNotice>>>, ApiError> {
    let claimed = state.session.claim_reward().await?;
    respond(&state, claimed).await
}

/// Convert energy to XP. Returns whether enough energy was available.
pub async fn convert(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AmountRequest>,
) -> Result<Json<CommandResponse<bool>>, ApiError> {
    let amount = finite(body.amount, "amount")?;
    let converted = state.session.convert_resource_to_score(amount).await?;
    respond(&state, converted).await
}

/// Fetch the remote copy, merge it, and write the result back at once.
pub async fn sync(State(state): State<Arc<AppState>>) -> Result<Json<ProgressView>, ApiError> {
    Ok(Json(state.session.sync_now().await?))
}
