//! The per-account automation loop.
//!
//! Each cycle runs, in order:
//! 1. Login (no token ends the run after a cooldown)
//! 2. Balance check, picking up a running farming cycle
//! 3. Farming claim and restart once the tracked end has passed
//! 4. Star bonus and hidden combo, each behind its own timer
//! 5. Daily reward
//! 6. Mini-game plays, one per ticket
//! 7. Task catalog: start, wait, check, claim
//!
//! then sleeps until the farming cycle ends. Transient request failures skip
//! the step they happened in; a rejected session ends the run.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::rules::{self, BonusAction};
use super::state::{FarmState, Pacing, now_unix, parse_server_time, pause};
use crate::api::{
    ApiError, ApiResponse, Balance, ComboTask, DailyClaim, FarmClaim, Farming, GameApi, GameClaim,
    StarsReward, StarsTask, Task, flatten_catalog,
};
use crate::config::FarmSettings;

/// Body status of a farm claim with nothing to claim.
const NOTHING_TO_CLAIM: i64 = 500;

/// Conditions that end an account's run.
#[derive(Debug, Error)]
pub enum FarmError {
    #[error("Game API rejected the session: {0}")]
    Rejected(#[source] ApiError),
}

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Every step ran (or was skipped); sleep and go again.
    Completed,
    /// No access token was issued; the run ends.
    LoginFailed,
}

/// Drives the game loop for one account.
pub struct Farmer {
    /// Game API client.
    api: GameApi,

    /// Login payload derived from the launch URL.
    init_data: String,

    /// Referral code chosen for this run.
    ref_id: String,

    /// Feature toggles.
    settings: FarmSettings,

    /// Sleeps between steps.
    pacing: Pacing,
}

impl Farmer {
    /// Creates a farmer for an account whose launch data has been extracted.
    #[must_use]
    pub fn new(
        api: GameApi,
        init_data: impl Into<String>,
        ref_id: impl Into<String>,
        settings: FarmSettings,
    ) -> Self {
        Self {
            api,
            init_data: init_data.into(),
            ref_id: ref_id.into(),
            settings,
            pacing: Pacing::default(),
        }
    }

    /// Replaces the default pacing.
    #[must_use]
    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Runs cycles until login fails or the session is rejected.
    pub async fn run(&mut self) -> Result<(), FarmError> {
        let mut state = FarmState::new();

        loop {
            match self.run_cycle(&mut state).await? {
                CycleOutcome::LoginFailed => {
                    info!("Failed login");
                    info!("Sleep {}s", self.pacing.login_cooldown.as_secs());
                    pause(self.pacing.login_cooldown).await;
                    return Ok(());
                }
                CycleOutcome::Completed => {
                    let sleep = self.pacing.cycle_sleep(&state, now_unix());
                    #[allow(clippy::cast_precision_loss)]
                    let minutes = sleep.as_secs() as f64 / 60.0;
                    info!("Sleep {:.2}m", minutes);
                    pause(sleep).await;
                }
            }
        }
    }

    /// Runs one pass over every step.
    pub async fn run_cycle(&mut self, state: &mut FarmState) -> Result<CycleOutcome, FarmError> {
        if !self.login().await {
            return Ok(CycleOutcome::LoginFailed);
        }
        pause(self.pacing.after_login).await;

        let balance = self.check_balance(state).await?;

        self.farm(state).await?;

        if self.settings.auto_claim_stars {
            self.claim_stars(state).await?;
        }
        pause(self.pacing.step).await;

        if self.settings.auto_claim_combo {
            self.claim_combo(state).await?;
        }
        pause(self.pacing.step).await;

        if self.settings.auto_daily_reward {
            self.claim_daily().await?;
        }
        pause(self.pacing.step).await;

        if self.settings.auto_play_game {
            match &balance {
                Some(balance) => {
                    state.tickets = balance.play_passes;
                    self.play_games(state).await?;
                }
                None => debug!("No balance this cycle, skipping games"),
            }
        }

        if self.settings.auto_task {
            self.run_tasks().await?;
        }

        Ok(CycleOutcome::Completed)
    }

    /// Turns a request result into "value", "skip" or "stop".
    async fn attempt<T>(
        &self,
        operation: &'static str,
        result: Result<T, ApiError>,
    ) -> Result<Option<T>, FarmError> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_fatal() => {
                error!("{} error: {}", operation, e);
                Err(FarmError::Rejected(e))
            }
            Err(e) => {
                warn!("{} error: {}", operation, e);
                pause(self.pacing.backoff).await;
                Ok(None)
            }
        }
    }

    /// Logs in and stores the token.
    ///
    /// Returns `false` when no token was issued, including on a rejected login,
    /// so the run always ends through the login cooldown.
    async fn login(&mut self) -> bool {
        let token = match self.api.login(&self.init_data, &self.ref_id).await {
            Ok(token) => token,
            Err(e) => {
                warn!("login error: {}", e);
                None
            }
        };
        let Some(token) = token else {
            return false;
        };

        info!("Login successful");
        self.api.set_token(token);
        true
    }

    async fn check_balance(&self, state: &mut FarmState) -> Result<Option<Balance>, FarmError> {
        let result = self.api.balance().await;
        let Some(response) = self.attempt("get_balance", result).await? else {
            return Ok(None);
        };

        let balance: Balance = match response.data() {
            Ok(balance) => balance,
            Err(e) => {
                warn!("get_balance error: {}", e);
                return Ok(None);
            }
        };
        info!("Current balance: {}", balance.available_balance);

        let now = now_unix();
        if let Some(farming) = &balance.farming
            && state.observe_farming(farming.end_at, now)
        {
            info!(
                "Farming in progress, next claim in {}m.",
                state.seconds_until_farming(now) / 60
            );
        }

        Ok(Some(balance))
    }

    /// Claims and restarts farming once the tracked end has passed.
    async fn farm(&self, state: &mut FarmState) -> Result<(), FarmError> {
        if !state.farming_due(now_unix()) {
            return Ok(());
        }

        let result = self.api.claim_farming().await;
        let Some(claim) = self.attempt("claim_farming", result).await? else {
            return Ok(());
        };

        match claim.status {
            0 => match claim.data::<FarmClaim>() {
                Ok(reward) => info!("Success claim farm. Reward: {}", reward.claim_this_time),
                Err(e) => warn!("claim_farming returned an unreadable reward: {}", e),
            },
            NOTHING_TO_CLAIM => debug!("Nothing to claim from farming"),
            status => warn!("claim_farming returned status {}: {:?}", status, claim.message),
        }

        let result = self.api.start_farming().await;
        if let Some(start) = self.attempt("start_farming", result).await? {
            match start.data::<Farming>() {
                Ok(farming) => {
                    info!("Farm started..");
                    state.track_farming_end(farming.end_at);
                    info!(
                        "Next farming claim in {}m.",
                        state.seconds_until_farming(now_unix()) / 60
                    );
                }
                Err(e) => warn!("start_farming returned no end time ({}): {:?}", e, start.message),
            }
        }

        pause(self.pacing.step).await;
        Ok(())
    }

    async fn claim_stars(&self, state: &mut FarmState) -> Result<(), FarmError> {
        let now = now_unix();
        if !state.stars_due(now) {
            return Ok(());
        }

        let result = self.api.stars().await;
        let Some(response) = self.attempt("get_stars", result).await? else {
            return Ok(());
        };
        if !response.is_ok() || response.data_is_empty() {
            return Ok(());
        }
        let stars: StarsTask = match response.data() {
            Ok(stars) => stars,
            Err(e) => {
                warn!("get_stars error: {}", e);
                return Ok(());
            }
        };

        match rules::stars_action(&stars, now) {
            BonusAction::AlreadyClaimed => info!("Stars already claimed | Skipping...."),
            BonusAction::Claim => {
                let result = self.api.start_stars_claim(stars.task_id).await;
                match self.attempt("start_stars_claim", result).await? {
                    Some(started) if started.is_ok() => {
                        let result = self.api.claim_task(stars.task_id).await;
                        if let Some(claimed) = self.attempt("claim_task", result).await?
                            && claimed.is_ok()
                        {
                            let reward = started.data::<StarsReward>().map_or(0.0, |r| r.stars);
                            info!("Claimed stars | Stars: +{}", reward);
                        }
                    }
                    _ => warn!("Star bonus claim did not start"),
                }
            }
            BonusAction::Unavailable => debug!("Star bonus window is closed"),
        }

        if let Some(end) = stars.end_time.as_deref().and_then(parse_server_time) {
            state.next_stars_check = end;
        }
        Ok(())
    }

    async fn claim_combo(&self, state: &mut FarmState) -> Result<(), FarmError> {
        let now = now_unix();
        if !state.combo_due(now) {
            return Ok(());
        }

        let result = self.api.combo().await;
        let Some(response) = self.attempt("get_combo", result).await? else {
            return Ok(());
        };
        if !response.is_ok() {
            return Ok(());
        }
        let first = match response.data::<Vec<Value>>() {
            Ok(list) => list.into_iter().next(),
            Err(e) => {
                warn!("get_combo error: {}", e);
                return Ok(());
            }
        };
        let Some(first) = first else {
            debug!("No combo this cycle");
            return Ok(());
        };
        let combo = match ComboTask::deserialize(&first) {
            Ok(combo) => combo,
            Err(e) => {
                warn!("get_combo returned an unreadable entry: {}", e);
                return Ok(());
            }
        };

        match rules::combo_action(&combo, now) {
            BonusAction::AlreadyClaimed => info!("Combo already claimed | Skipping...."),
            BonusAction::Claim => {
                let result = self.api.claim_task(combo.task_id).await;
                if let Some(claimed) = self.attempt("claim_task", result).await?
                    && claimed.is_ok()
                {
                    let code = match &combo.code {
                        Some(Value::String(code)) => code.clone(),
                        Some(code) => code.to_string(),
                        None => String::new(),
                    };
                    info!("Claimed combo | Points: +{} | Combo code: {}", combo.score, code);
                }
            }
            BonusAction::Unavailable => debug!("Combo window is closed"),
        }

        if let Some(end) = combo.end.as_deref().and_then(parse_server_time) {
            state.next_combo_check = end;
        }
        Ok(())
    }

    async fn claim_daily(&self) -> Result<(), FarmError> {
        let result = self.api.claim_daily().await;
        let Some(response) = self.attempt("claim_daily", result).await? else {
            return Ok(());
        };

        match response.data::<DailyClaim>() {
            Ok(daily) if response.is_ok() => {
                info!("Daily: {} reward: {}", daily.today_game, daily.today_points);
            }
            _ => debug!("Daily reward not claimed: {:?}", response.message),
        }
        Ok(())
    }

    /// Plays while tickets remain; a failed play or claim ends the session of games.
    async fn play_games(&self, state: &mut FarmState) -> Result<(), FarmError> {
        info!("Tickets: {}", state.tickets);
        pause(self.pacing.step).await;

        while state.tickets > 0 {
            info!("Start game...");
            let result = self.api.play_game().await;
            let played = self.attempt("play_game", result).await?;
            if !played.as_ref().is_some_and(ApiResponse::is_ok) {
                warn!("Game did not start, keeping {} tickets", state.tickets);
                break;
            }

            info!("Game in progress...");
            pause(self.pacing.game_duration).await;

            let points = rules::game_points(&mut rand::rng());
            let result = self.api.claim_game(points).await;
            match self.attempt("claim_game", result).await? {
                Some(claim) if claim.is_ok() => {
                    let claimed = claim.data::<GameClaim>().map_or(f64::from(points), |c| c.points);
                    info!("Game finish! Claimed points: {}", claimed);
                    state.use_ticket();
                    pause(self.pacing.step).await;
                }
                _ => {
                    warn!("Game claim failed, keeping {} tickets", state.tickets);
                    break;
                }
            }
        }
        Ok(())
    }

    async fn run_tasks(&self) -> Result<(), FarmError> {
        info!("Start checking tasks.");

        let result = self.api.tasks().await;
        let Some(response) = self.attempt("get_tasks", result).await? else {
            return Ok(());
        };
        if !response.is_ok() {
            return Ok(());
        }

        let selected = rules::select_tasks(flatten_catalog(&response.data), now_unix());
        debug!("{} tasks selected", selected.len());

        for task in &selected {
            self.run_task(task).await?;
        }
        Ok(())
    }

    async fn run_task(&self, task: &Task) -> Result<(), FarmError> {
        let result = self.api.start_task(task.task_id).await;
        self.attempt("start_task", result).await?;
        pause(std::time::Duration::from_secs(task.wait_second)).await;

        let result = self.api.check_task(task.task_id).await;
        let Some(check) = self.attempt("check_task", result).await? else {
            return Ok(());
        };
        if check.is_ok() {
            return Ok(());
        }

        info!("Start claim task {}", task.name);
        let result = self.api.claim_task(task.task_id).await;
        if let Some(claim) = self.attempt("claim_task", result).await?
            && claim.is_ok()
        {
            info!("Task {} claimed!", task.name);
            pause(self.pacing.after_task).await;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Farmer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Farmer")
            .field("ref_id", &self.ref_id)
            .field("pacing", &self.pacing)
            .finish_non_exhaustive()
    }
}
